use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

pub const MONTHS_RU: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DayOfWeek {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Mon,
        DayOfWeek::Tue,
        DayOfWeek::Wed,
        DayOfWeek::Thu,
        DayOfWeek::Fri,
        DayOfWeek::Sat,
        DayOfWeek::Sun,
    ];

    pub fn code(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "mon",
            DayOfWeek::Tue => "tue",
            DayOfWeek::Wed => "wed",
            DayOfWeek::Thu => "thu",
            DayOfWeek::Fri => "fri",
            DayOfWeek::Sat => "sat",
            DayOfWeek::Sun => "sun",
        }
    }

    pub fn name_ru(self) -> &'static str {
        match self {
            DayOfWeek::Mon => "Понедельник",
            DayOfWeek::Tue => "Вторник",
            DayOfWeek::Wed => "Среда",
            DayOfWeek::Thu => "Четверг",
            DayOfWeek::Fri => "Пятница",
            DayOfWeek::Sat => "Суббота",
            DayOfWeek::Sun => "Воскресенье",
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => DayOfWeek::Mon,
            Weekday::Tue => DayOfWeek::Tue,
            Weekday::Wed => DayOfWeek::Wed,
            Weekday::Thu => DayOfWeek::Thu,
            Weekday::Fri => DayOfWeek::Fri,
            Weekday::Sat => DayOfWeek::Sat,
            Weekday::Sun => DayOfWeek::Sun,
        }
    }

    pub fn is_weekend(self) -> bool {
        matches!(self, DayOfWeek::Sat | DayOfWeek::Sun)
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown day code: {0}")]
pub struct UnknownDay(pub String);

impl FromStr for DayOfWeek {
    type Err = UnknownDay;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DayOfWeek::ALL
            .into_iter()
            .find(|day| day.code() == value)
            .ok_or_else(|| UnknownDay(value.to_string()))
    }
}

/// Wall-clock time of day as stored on slots ("HH:MM", no timezone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    /// Accepts one- or two-digit hours ("9:00" and "09:00") and two-digit minutes.
    pub fn parse(value: &str) -> Option<Self> {
        let (hour, minute) = value.trim().split_once(':')?;
        if hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return None;
        }
        if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }
        let hour: u32 = hour.parse().ok()?;
        let minute: u32 = minute.parse().ok()?;
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self { hour, minute })
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Strict `YYYY-MM-DD`; chrono alone would also take unpadded fields.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Monday of the week containing `date`.
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

pub fn week_days(week_start: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    (0..7).map(move |offset| week_start + Duration::days(offset))
}

/// "7 апреля"
pub fn format_day_month(date: NaiveDate) -> String {
    format!("{} {}", date.day(), MONTHS_RU[date.month0() as usize])
}

/// "7 апреля — 13 апреля"; the end day is zero-padded like the calendar header.
pub fn format_week_range(week_start: NaiveDate) -> String {
    let week_end = week_start + Duration::days(6);
    format!(
        "{} — {:02} {}",
        format_day_month(week_start),
        week_end.day(),
        MONTHS_RU[week_end.month0() as usize]
    )
}

/// "Понедельник, 7 апреля, 10:00 - 11:00". Falls back to the raw date text
/// when it does not parse.
pub fn format_slot_range(day: DayOfWeek, date: &str, start_time: &str, end_time: &str) -> String {
    let date = parse_date(date)
        .map(format_day_month)
        .unwrap_or_else(|| date.to_string());
    format!("{}, {}, {} - {}", day.name_ru(), date, start_time, end_time)
}
