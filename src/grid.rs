use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    models::{Teacher, TimeSlot},
    schedule::{self, ClockTime},
};

pub const FIRST_HOUR: u32 = 9;
pub const LAST_HOUR: u32 = 19;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeBand {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "1-4")]
    Primary,
    #[serde(rename = "5-9")]
    Middle,
    #[serde(rename = "9-11")]
    Senior,
}

impl GradeBand {
    pub fn grades(self) -> &'static [&'static str] {
        match self {
            GradeBand::All => &[],
            GradeBand::Primary => &["1", "2", "3", "4"],
            GradeBand::Middle => &["5", "6", "7", "8", "9"],
            GradeBand::Senior => &["9", "10", "11"],
        }
    }

    pub fn matches(self, teacher: &Teacher) -> bool {
        if self == GradeBand::All {
            return true;
        }
        let band = self.grades();
        teacher.grade_labels().any(|grade| band.contains(&grade))
    }
}

/// Calendar and sidebar filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filters {
    pub search_text: String,
    /// `None` or `"all"` means any subject.
    pub subject: Option<String>,
    pub grade_group: GradeBand,
    /// Slots are shown when `is_overbooking` equals this flag.
    pub overbooking_only: bool,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            search_text: String::new(),
            subject: None,
            grade_group: GradeBand::All,
            overbooking_only: true,
        }
    }
}

impl Filters {
    fn subject_filter(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .map(str::trim)
            .filter(|subject| !subject.is_empty() && *subject != "all")
    }

    /// Teacher-level predicates: search text, subject and grade band.
    pub fn matches_teacher(&self, teacher: &Teacher) -> bool {
        let needle = self.search_text.trim().to_lowercase();
        if !needle.is_empty()
            && !teacher.name.to_lowercase().contains(&needle)
            && !teacher.subject.to_lowercase().contains(&needle)
        {
            return false;
        }
        if let Some(subject) = self.subject_filter() {
            if teacher.subject != subject {
                return false;
            }
        }
        self.grade_group.matches(teacher)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub available: Vec<TimeSlot>,
    pub booked: Vec<TimeSlot>,
}

impl HourBucket {
    pub fn is_empty(&self) -> bool {
        self.available.is_empty() && self.booked.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WarningKind {
    InvalidDate,
    InvalidStartTime,
    UnknownTeacher,
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WarningKind::InvalidDate => "invalid date",
            WarningKind::InvalidStartTime => "invalid start time",
            WarningKind::UnknownTeacher => "unknown teacher",
        })
    }
}

/// A slot left out of the grid because its data could not be used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataQualityWarning {
    pub slot_id: i64,
    pub kind: WarningKind,
    pub value: String,
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot {}: {} {:?}", self.slot_id, self.kind, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekGrid {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub previous_week: NaiveDate,
    pub next_week: NaiveDate,
    pub label: String,
    pub days: BTreeMap<NaiveDate, BTreeMap<u32, HourBucket>>,
    pub warnings: Vec<DataQualityWarning>,
}

impl WeekGrid {
    pub fn bucket(&self, date: NaiveDate, hour: u32) -> Option<&HourBucket> {
        self.days.get(&date)?.get(&hour)
    }

    pub fn slot_count(&self) -> usize {
        self.days
            .values()
            .flat_map(BTreeMap::values)
            .map(|bucket| bucket.available.len() + bucket.booked.len())
            .sum()
    }
}

/// Buckets the slots of one Monday-based week by `(date, hour)`.
///
/// Never fails: slots with an unusable date, start time or teacher reference
/// are dropped and listed in `warnings`. Hours `FIRST_HOUR..=LAST_HOUR` exist
/// for every day even when empty.
pub fn project_week(
    week_start: NaiveDate,
    filters: &Filters,
    teachers: &[Teacher],
    slots: &[TimeSlot],
) -> WeekGrid {
    let week_start = schedule::week_start_of(week_start);
    let week_end = week_start + Duration::days(6);
    let teachers: HashMap<i64, &Teacher> = teachers.iter().map(|t| (t.id, t)).collect();

    let mut days: BTreeMap<NaiveDate, BTreeMap<u32, HourBucket>> = schedule::week_days(week_start)
        .map(|day| {
            let hours = (FIRST_HOUR..=LAST_HOUR)
                .map(|hour| (hour, HourBucket::default()))
                .collect();
            (day, hours)
        })
        .collect();
    let mut warnings = Vec::new();

    for slot in slots {
        let Some(date) = schedule::parse_date(&slot.date) else {
            warnings.push(DataQualityWarning {
                slot_id: slot.id,
                kind: WarningKind::InvalidDate,
                value: slot.date.clone(),
            });
            continue;
        };
        let Some(start) = ClockTime::parse(&slot.start_time) else {
            warnings.push(DataQualityWarning {
                slot_id: slot.id,
                kind: WarningKind::InvalidStartTime,
                value: slot.start_time.clone(),
            });
            continue;
        };
        if date < week_start || date > week_end {
            continue;
        }
        let Some(teacher) = teachers.get(&slot.teacher_id) else {
            warnings.push(DataQualityWarning {
                slot_id: slot.id,
                kind: WarningKind::UnknownTeacher,
                value: slot.teacher_id.to_string(),
            });
            continue;
        };
        if slot.is_overbooking != filters.overbooking_only || !filters.matches_teacher(teacher) {
            continue;
        }

        let bucket = days
            .entry(date)
            .or_default()
            .entry(start.hour)
            .or_default();
        if slot.is_booked {
            bucket.booked.push(slot.clone());
        } else {
            bucket.available.push(slot.clone());
        }
    }

    WeekGrid {
        week_start,
        week_end,
        previous_week: week_start - Duration::days(7),
        next_week: week_start + Duration::days(7),
        label: schedule::format_week_range(week_start),
        days,
        warnings,
    }
}

/// Sidebar teacher list; the overbooking flag is a slot property and does not
/// apply here.
pub fn list_available_teachers(filters: &Filters, teachers: &[Teacher]) -> Vec<Teacher> {
    teachers
        .iter()
        .filter(|teacher| filters.matches_teacher(teacher))
        .cloned()
        .collect()
}

/// Distinct subjects in first-seen order.
pub fn list_subjects(teachers: &[Teacher]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    teachers
        .iter()
        .filter(|teacher| seen.insert(teacher.subject.as_str()))
        .map(|teacher| teacher.subject.clone())
        .collect()
}

/// Distinct grade labels, numeric ones first in numeric order.
pub fn list_grades(teachers: &[Teacher]) -> Vec<String> {
    let grades: BTreeSet<&str> = teachers.iter().flat_map(Teacher::grade_labels).collect();
    let mut grades: Vec<String> = grades.into_iter().map(str::to_string).collect();
    grades.sort_by_key(|grade| (grade.parse::<u32>().unwrap_or(u32::MAX), grade.clone()));
    grades
}
