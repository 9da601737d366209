use chrono::NaiveDate;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};

use crate::{
    config::SeedConfig,
    models::{NewTeacher, NewTimeSlot},
    schedule::{self, DayOfWeek},
    store::{Store, StoreError},
};

const MALE_FIRST_NAMES: &[&str] = &[
    "Александр", "Алексей", "Андрей", "Антон", "Борис", "Василий", "Виктор", "Владимир", "Георгий",
    "Дмитрий", "Евгений", "Иван", "Игорь", "Кирилл", "Максим", "Михаил", "Николай", "Олег", "Павел",
    "Роман", "Сергей", "Степан", "Юрий", "Ярослав",
];

const FEMALE_FIRST_NAMES: &[&str] = &[
    "Александра", "Алина", "Анастасия", "Анна", "Валентина", "Вера", "Виктория", "Галина", "Дарья",
    "Евгения", "Екатерина", "Елена", "Ирина", "Ксения", "Лариса", "Людмила", "Марина", "Мария",
    "Надежда", "Наталья", "Ольга", "Полина", "Светлана", "Татьяна", "Юлия",
];

const MALE_MIDDLE_NAMES: &[&str] = &[
    "Александрович", "Алексеевич", "Андреевич", "Борисович", "Васильевич", "Викторович",
    "Владимирович", "Дмитриевич", "Иванович", "Игоревич", "Михайлович", "Николаевич",
    "Олегович", "Павлович", "Петрович", "Сергеевич", "Юрьевич",
];

const FEMALE_MIDDLE_NAMES: &[&str] = &[
    "Александровна", "Алексеевна", "Андреевна", "Борисовна", "Васильевна", "Викторовна",
    "Владимировна", "Дмитриевна", "Ивановна", "Игоревна", "Михайловна", "Николаевна",
    "Олеговна", "Павловна", "Петровна", "Сергеевна", "Юрьевна",
];

const LAST_NAMES: &[&str] = &[
    "Иванов", "Смирнов", "Кузнецов", "Попов", "Васильев", "Петров", "Соколов", "Михайлов",
    "Новиков", "Федоров", "Морозов", "Волков", "Алексеев", "Лебедев", "Семенов", "Егоров",
    "Павлов", "Козлов", "Степанов", "Николаев", "Орлов", "Андреев", "Макаров", "Никитин",
    "Захаров", "Зайцев", "Соловьев", "Борисов", "Яковлев", "Григорьев", "Романов", "Воробьев",
    "Сергеев", "Фролов", "Королев", "Гусев", "Киселев", "Ильин", "Максимов", "Поляков",
    "Сорокин", "Виноградов", "Ковалев", "Белов", "Медведев", "Антонов", "Тарасов", "Жуков",
];

pub const SUBJECTS: &[&str] = &[
    "Математика", "Русский язык", "Литература", "Физика", "Химия", "Биология", "История",
    "Обществознание", "География", "Информатика", "Английский язык", "Немецкий язык",
    "Французский язык", "Испанский язык", "Китайский язык", "Экономика", "Право", "Астрономия",
    "Алгебра", "Геометрия", "Начальные классы", "Окружающий мир", "Программирование",
    "Робототехника", "Экология", "Психология", "Финансовая грамотность", "Шахматы",
];

const RATINGS: &[&str] = &[
    "4.0/5", "4.1/5", "4.2/5", "4.3/5", "4.4/5", "4.5/5", "4.6/5", "4.7/5", "4.8/5", "4.9/5", "5.0/5",
];

const SLOT_HOURS: std::ops::RangeInclusive<u32> = 9..=19;
const MAX_WEEKDAY_SLOTS: usize = 5;
const MAX_WEEKEND_SLOTS: usize = 3;
const MALE_RATIO: f64 = 0.3;
const AVAILABLE_RATIO: f64 = 0.8;
const EMAIL_DOMAIN: &str = "tutors.example";

#[derive(Debug, Clone)]
pub struct SeedTeacher {
    pub teacher: NewTeacher,
    pub slots: Vec<NewTimeSlot>,
}

fn pick<'a, R: Rng>(rng: &mut R, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

/// Russian feminine surname from the masculine form ("Иванов" → "Иванова",
/// "Соколов" → "Соколова", "Толстой" → "Толстая").
fn feminine_last_name(last_name: &str) -> String {
    for (masculine, feminine) in [("ский", "ская"), ("цкий", "цкая"), ("ой", "ая"), ("ый", "ая")] {
        if let Some(stem) = last_name.strip_suffix(masculine) {
            return format!("{stem}{feminine}");
        }
    }
    format!("{last_name}а")
}

fn generate_teacher<R: Rng>(rng: &mut R) -> NewTeacher {
    let is_male = rng.gen_bool(MALE_RATIO);
    let (first_name, middle_name, last_name) = if is_male {
        (
            pick(rng, MALE_FIRST_NAMES),
            pick(rng, MALE_MIDDLE_NAMES),
            pick(rng, LAST_NAMES).to_string(),
        )
    } else {
        (
            pick(rng, FEMALE_FIRST_NAMES),
            pick(rng, FEMALE_MIDDLE_NAMES),
            feminine_last_name(pick(rng, LAST_NAMES)),
        )
    };

    let all_grades: Vec<u32> = (1..=11).collect();
    let grade_count = rng.gen_range(3..=9);
    let mut grades: Vec<u32> = all_grades.choose_multiple(rng, grade_count).copied().collect();
    grades.sort_unstable();
    let grades = grades.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");

    let gender = if is_male { "men" } else { "women" };
    let avatar_id = rng.gen_range(1..=99);

    NewTeacher {
        name: format!("{last_name} {first_name} {middle_name}"),
        subject: pick(rng, SUBJECTS).to_string(),
        email: format!(
            "{}.{}@{EMAIL_DOMAIN}",
            first_name.to_lowercase(),
            last_name.to_lowercase()
        ),
        grades,
        rating: pick(rng, RATINGS).to_string(),
        review_count: rng.gen_range(10..=59),
        avatar: format!("https://randomuser.me/api/portraits/{gender}/{avatar_id}.jpg"),
        is_available: rng.gen_bool(AVAILABLE_RATIO),
    }
}

fn generate_slots<R: Rng>(rng: &mut R, week_start: NaiveDate, config: &SeedConfig) -> Vec<NewTimeSlot> {
    let hours: Vec<u32> = SLOT_HOURS.collect();
    let mut slots = Vec::new();
    for date in schedule::week_days(week_start) {
        let day = DayOfWeek::of(date);
        let max_slots = if day.is_weekend() { MAX_WEEKEND_SLOTS } else { MAX_WEEKDAY_SLOTS };
        let count = rng.gen_range(1..=max_slots);
        let mut picked: Vec<u32> = hours.choose_multiple(rng, count).copied().collect();
        picked.sort_unstable();

        for hour in picked {
            let is_overbooking = rng.gen_bool(config.overbooking_ratio);
            let end_time = if is_overbooking {
                format!("{hour:02}:45")
            } else {
                format!("{:02}:00", hour + 1)
            };
            slots.push(NewTimeSlot {
                day_of_week: day,
                date: schedule::format_date(date),
                start_time: format!("{hour:02}:00"),
                end_time,
                is_booked: rng.gen_bool(config.booked_ratio),
                is_overbooking,
            });
        }
    }
    slots
}

/// Builds the fixture: `config.teachers` teachers, each with slots across the
/// Monday-based week containing `config.week_start`.
pub fn generate<R: Rng>(rng: &mut R, config: &SeedConfig) -> Vec<SeedTeacher> {
    let week_start = schedule::week_start_of(config.week_start);
    (0..config.teachers)
        .map(|_| {
            let teacher = generate_teacher(rng);
            let slots = generate_slots(rng, week_start, config);
            SeedTeacher { teacher, slots }
        })
        .collect()
}

/// Fills an empty store. A store that already has teachers is left alone.
pub async fn seed_defaults(store: &dyn Store, config: &SeedConfig) -> Result<usize, StoreError> {
    if store.teacher_count().await? > 0 {
        log::info!("Store already populated, skipping seed");
        return Ok(0);
    }

    let fixture = match config.rng_seed {
        Some(seed) => generate(&mut StdRng::seed_from_u64(seed), config),
        None => {
            log::warn!("SEED_RNG not set. Generating a random fixture.");
            generate(&mut StdRng::from_entropy(), config)
        }
    };

    let mut slot_count = 0;
    for SeedTeacher { teacher, slots } in fixture {
        let (_, created) = store.insert_teacher(teacher, slots).await?;
        slot_count += created.len();
    }
    log::info!("Seeded {} teachers with {} time slots", config.teachers, slot_count);
    Ok(config.teachers)
}
