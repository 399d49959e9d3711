// src/model.rs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UnknownLabel;

/// Which dimension the dashboard rows represent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryAxis {
    Manufacturer,
    VehicleCategory,
}

impl CategoryAxis {
    pub fn entity_type(&self) -> EntityType {
        match self {
            CategoryAxis::Manufacturer => EntityType::Manufacturer,
            CategoryAxis::VehicleCategory => EntityType::VehicleCategory,
        }
    }
}

/// How the dashboard groups the time dimension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAxis {
    CalendarYear,
    MonthWise,
}

/// One unit of harvest work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterCombination {
    pub category: CategoryAxis,
    pub time_axis: TimeAxis,
    pub year: i32,
}

impl FilterCombination {
    pub fn new(category: CategoryAxis, time_axis: TimeAxis, year: i32) -> Self {
        Self {
            category,
            time_axis,
            year,
        }
    }

    /// `Y_<category>_X_<time axis>_Year_<year>` with every non-alphanumeric
    /// replaced by `_`. Legacy CSV snapshots use the same naming.
    pub fn slug(&self, category_label: &str, time_label: &str) -> String {
        format!(
            "Y_{}_X_{}_Year_{}",
            safe_name(category_label),
            safe_name(time_label),
            self.year
        )
    }
}

impl fmt::Display for FilterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{}", self.category, self.time_axis, self.year)
    }
}

pub fn safe_name(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityType {
    Manufacturer,
    VehicleCategory,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Manufacturer => "Manufacturer",
            EntityType::VehicleCategory => "Vehicle Category",
        }
    }

}

impl FromStr for EntityType {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manufacturer" | "maker" => Ok(EntityType::Manufacturer),
            "vehicle category" | "vehiclecategory" => Ok(EntityType::VehicleCategory),
            _ => Err(UnknownLabel {
                kind: "entity type",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::Jan => "JAN",
            Month::Feb => "FEB",
            Month::Mar => "MAR",
            Month::Apr => "APR",
            Month::May => "MAY",
            Month::Jun => "JUN",
            Month::Jul => "JUL",
            Month::Aug => "AUG",
            Month::Sep => "SEP",
            Month::Oct => "OCT",
            Month::Nov => "NOV",
            Month::Dec => "DEC",
        }
    }

    /// 1-based month number.
    pub fn number(&self) -> u32 {
        *self as u32 + 1
    }

    pub fn quarter(&self) -> u32 {
        (self.number() - 1) / 3 + 1
    }
}

impl FromStr for Month {
    type Err = UnknownLabel;

    /// Accepts the three-letter abbreviation or the full English name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Month::ALL
            .into_iter()
            .find(|m| upper == m.as_str() || (upper.len() > 3 && full_name(*m) == upper))
            .ok_or_else(|| UnknownLabel {
                kind: "month",
                value: s.to_string(),
            })
    }
}

fn full_name(m: Month) -> &'static str {
    match m {
        Month::Jan => "JANUARY",
        Month::Feb => "FEBRUARY",
        Month::Mar => "MARCH",
        Month::Apr => "APRIL",
        Month::May => "MAY",
        Month::Jun => "JUNE",
        Month::Jul => "JULY",
        Month::Aug => "AUGUST",
        Month::Sep => "SEPTEMBER",
        Month::Oct => "OCTOBER",
        Month::Nov => "NOVEMBER",
        Month::Dec => "DECEMBER",
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnualRecord {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub year: i32,
    pub registrations: u64,
}

impl AnnualRecord {
    pub fn key(&self) -> (&str, EntityType, i32) {
        (&self.entity_name, self.entity_type, self.year)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthlyRecord {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub year: i32,
    pub month: Month,
    pub monthly_registrations: u64,
}

impl MonthlyRecord {
    pub fn key(&self) -> (&str, EntityType, i32, Month) {
        (&self.entity_name, self.entity_type, self.year, self.month)
    }
}

/// A normalized batch, ready for the store. One batch per combination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordBatch {
    Annual(Vec<AnnualRecord>),
    Monthly(Vec<MonthlyRecord>),
}

impl RecordBatch {
    pub fn len(&self) -> usize {
        match self {
            RecordBatch::Annual(r) => r.len(),
            RecordBatch::Monthly(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeStatus {
    Success,
    NoTableFound,
    NavigationFailed,
    ExtractionFailed,
    PersistenceFailed,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "Success",
            OutcomeStatus::NoTableFound => "NoTableFound",
            OutcomeStatus::NavigationFailed => "NavigationFailed",
            OutcomeStatus::ExtractionFailed => "ExtractionFailed",
            OutcomeStatus::PersistenceFailed => "PersistenceFailed",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarvestOutcome {
    pub combination: FilterCombination,
    pub status: OutcomeStatus,
    pub records_written: usize,
    pub detail: Option<String>,
}
