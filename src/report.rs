// src/report.rs
//
// Read-side view over the canonical tables: coarse vehicle classes and
// period-over-period growth.

use std::collections::BTreeMap;
use std::fmt;

use crate::model::{AnnualRecord, EntityType, MonthlyRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CoarseCategory {
    TwoWheeler,
    ThreeWheeler,
    FourWheeler,
    Other,
}

impl CoarseCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoarseCategory::TwoWheeler => "2W",
            CoarseCategory::ThreeWheeler => "3W",
            CoarseCategory::FourWheeler => "4W",
            CoarseCategory::Other => "Other",
        }
    }
}

const FOUR_WHEELER_KEYWORDS: [&str; 11] = [
    "FOUR WHEELER",
    "LIGHT MOTOR VEHICLE",
    "MEDIUM MOTOR VEHICLE",
    "HEAVY MOTOR VEHICLE",
    "GOODS VEHICLE",
    "PASSENGER VEHICLE",
    "BUS",
    "TRAC",
    "EARTH MOVING",
    "DUMPER",
    "CRANE",
];

/// Keyword match on a raw vehicle category name.
pub fn coarse_category(name: &str) -> CoarseCategory {
    let upper = name.trim().to_uppercase();
    if upper.contains("TWO WHEELER") {
        CoarseCategory::TwoWheeler
    } else if upper.contains("THREE WHEELER") {
        CoarseCategory::ThreeWheeler
    } else if FOUR_WHEELER_KEYWORDS.iter().any(|k| upper.contains(k)) {
        CoarseCategory::FourWheeler
    } else {
        CoarseCategory::Other
    }
}

/// How rows are grouped before growth is computed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Grouping {
    Raw,
    /// Vehicle categories collapse onto 2W/3W/4W/Other; manufacturers stay raw.
    Coarse,
}

/// A year, or a quarter of a year.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub quarter: Option<u32>,
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quarter {
            Some(q) => write!(f, "{}-Q{}", self.year, q),
            None => write!(f, "{}", self.year),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrowthPoint {
    pub entity_type: EntityType,
    pub entity: String,
    pub period: Period,
    pub value: u64,
    pub previous: Option<u64>,
    /// `None` for an entity's first period and when the baseline is zero.
    pub growth_pct: Option<f64>,
}

fn group_name(entity_type: EntityType, name: &str, grouping: Grouping) -> String {
    match (grouping, entity_type) {
        (Grouping::Coarse, EntityType::VehicleCategory) => coarse_category(name).as_str().to_string(),
        _ => name.to_string(),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Sum values per (entity, period), order each entity's periods and compare
/// every period with the one before it.
pub fn growth<I>(series: I) -> Vec<GrowthPoint>
where
    I: IntoIterator<Item = (EntityType, String, Period, u64)>,
{
    let mut sums: BTreeMap<(EntityType, String), BTreeMap<Period, u64>> = BTreeMap::new();
    for (entity_type, entity, period, value) in series {
        *sums
            .entry((entity_type, entity))
            .or_default()
            .entry(period)
            .or_default() += value;
    }

    let mut out = Vec::new();
    for ((entity_type, entity), periods) in sums {
        let mut previous: Option<u64> = None;
        for (period, value) in periods {
            let growth_pct = match previous {
                Some(prev) if prev > 0 => Some(round2((value as f64 - prev as f64) / prev as f64 * 100.0)),
                _ => None,
            };
            out.push(GrowthPoint {
                entity_type,
                entity: entity.clone(),
                period,
                value,
                previous,
                growth_pct,
            });
            previous = Some(value);
        }
    }
    out
}

/// Year-over-year growth.
pub fn yoy(records: &[AnnualRecord], grouping: Grouping) -> Vec<GrowthPoint> {
    growth(records.iter().map(|r| {
        (
            r.entity_type,
            group_name(r.entity_type, &r.entity_name, grouping),
            Period {
                year: r.year,
                quarter: None,
            },
            r.registrations,
        )
    }))
}

/// Quarter-over-quarter growth; months are summed into calendar quarters.
pub fn qoq(records: &[MonthlyRecord], grouping: Grouping) -> Vec<GrowthPoint> {
    growth(records.iter().map(|r| {
        (
            r.entity_type,
            group_name(r.entity_type, &r.entity_name, grouping),
            Period {
                year: r.year,
                quarter: Some(r.month.quarter()),
            },
            r.monthly_registrations,
        )
    }))
}

/// The most recent point of every entity.
pub fn latest(points: &[GrowthPoint]) -> Vec<&GrowthPoint> {
    let mut last: BTreeMap<(EntityType, &str), &GrowthPoint> = BTreeMap::new();
    for p in points {
        let slot = last.entry((p.entity_type, p.entity.as_str())).or_insert(p);
        if p.period > slot.period {
            *slot = p;
        }
    }
    last.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Month;

    #[test]
    fn test_coarse_category() {
        assert_eq!(coarse_category("TWO WHEELER(NT)"), CoarseCategory::TwoWheeler);
        assert_eq!(coarse_category("three wheeler(t)"), CoarseCategory::ThreeWheeler);
        assert_eq!(coarse_category("LIGHT MOTOR VEHICLE"), CoarseCategory::FourWheeler);
        assert_eq!(coarse_category("BUS"), CoarseCategory::FourWheeler);
        assert_eq!(coarse_category("TRACTOR (COMMERCIAL)"), CoarseCategory::FourWheeler);
        assert_eq!(coarse_category("E-RICKSHAW(P)"), CoarseCategory::Other);
    }

    fn annual(name: &str, year: i32, n: u64) -> AnnualRecord {
        AnnualRecord {
            entity_name: name.into(),
            entity_type: EntityType::VehicleCategory,
            year,
            registrations: n,
        }
    }

    #[test]
    fn test_yoy_with_zero_baseline() {
        let pts = yoy(
            &[
                annual("BUS", 2021, 0),
                annual("BUS", 2022, 50),
                annual("BUS", 2023, 75),
                annual("BUS", 2020, 10),
            ],
            Grouping::Raw,
        );
        let years: Vec<i32> = pts.iter().map(|p| p.period.year).collect();
        assert_eq!(years, vec![2020, 2021, 2022, 2023]);
        assert_eq!(pts[0].growth_pct, None);
        assert_eq!(pts[1].growth_pct, Some(-100.0));
        assert_eq!(pts[2].growth_pct, None, "zero baseline");
        assert_eq!(pts[3].growth_pct, Some(50.0));
    }

    #[test]
    fn test_coarse_grouping_sums_before_growth() {
        let pts = yoy(
            &[
                annual("TWO WHEELER(NT)", 2022, 100),
                annual("TWO WHEELER(T)", 2022, 50),
                annual("TWO WHEELER(NT)", 2023, 200),
                annual("TWO WHEELER(T)", 2023, 25),
            ],
            Grouping::Coarse,
        );
        assert_eq!(pts.len(), 2);
        assert_eq!(pts[1].entity, "2W");
        assert_eq!(pts[1].value, 225);
        assert_eq!(pts[1].growth_pct, Some(50.0));
    }

    #[test]
    fn test_qoq_aggregates_months() {
        let m = |month: Month, n: u64| MonthlyRecord {
            entity_name: "HONDA".into(),
            entity_type: EntityType::Manufacturer,
            year: 2023,
            month,
            monthly_registrations: n,
        };
        let pts = qoq(
            &[m(Month::Jan, 10), m(Month::Feb, 10), m(Month::Apr, 15), m(Month::Jun, 15), m(Month::Jul, 7)],
            Grouping::Coarse,
        );
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[0].period.to_string(), "2023-Q1");
        assert_eq!(pts[1].value, 30);
        assert_eq!(pts[1].growth_pct, Some(50.0));
        assert_eq!(pts[2].growth_pct, Some(-76.67));

        let last = latest(&pts);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].period.quarter, Some(3));
    }
}
