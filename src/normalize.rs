// src/normalize.rs

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

use crate::error::NormalizeError;
use crate::extract::{is_serial_label, Cell, RawTableCandidate};
use crate::model::{
    AnnualRecord, EntityType, FilterCombination, Month, MonthlyRecord, RecordBatch, TimeAxis,
};

static TOTAL_ROW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(grand\s+)?total[\s:.-]*$").expect("valid regex"));
static YEAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^0-9])((?:19|20)\d{2})(?:$|[^0-9])").expect("valid regex"));

#[derive(Clone, Copy, Debug, Default)]
pub struct NormalizerOptions {
    /// Persist zero counts instead of dropping them. The dashboard shows 0
    /// both for "none registered" and for "not reported", so these rows are
    /// suspect.
    pub keep_zero: bool,
}

/// Reshapes a wide dashboard table into long-form records.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    opts: NormalizerOptions,
}

pub fn is_total_label(label: &str) -> bool {
    label.to_uppercase().contains("TOTAL")
}

/// Four-digit year embedded in a column label.
pub fn label_year(label: &str) -> Option<i32> {
    YEAR_RE
        .captures(label)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Month named by any `_`/whitespace separated segment of a label.
pub fn label_month(label: &str) -> Option<Month> {
    label
        .split(|c: char| c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse::<Month>().ok())
        .last()
}

impl Normalizer {
    pub fn new(opts: NormalizerOptions) -> Self {
        Self { opts }
    }

    pub fn normalize(
        &self,
        table: &RawTableCandidate,
        combo: &FilterCombination,
    ) -> Result<RecordBatch, NormalizeError> {
        let entity_type = combo.category.entity_type();
        match combo.time_axis {
            TimeAxis::CalendarYear => self.annual(table, entity_type).map(RecordBatch::Annual),
            TimeAxis::MonthWise => self
                .monthly(table, entity_type, combo.year)
                .map(RecordBatch::Monthly),
        }
    }

    /// One record per (entity row × year column).
    pub fn annual(
        &self,
        table: &RawTableCandidate,
        entity_type: EntityType,
    ) -> Result<Vec<AnnualRecord>, NormalizeError> {
        let periods: Vec<(usize, i32)> = period_columns(table, label_year);
        if periods.is_empty() {
            return Err(NormalizeError::NoPeriodColumns("calendar year", table.columns.clone()));
        }
        let entity_col = entity_column(table, &periods)?;

        let mut out: Vec<AnnualRecord> = Vec::new();
        let mut seen: HashMap<(String, i32), usize> = HashMap::new();
        let mut dropped = 0usize;
        for row in &table.rows {
            let Some(name) = entity_name(&row[entity_col]) else {
                continue;
            };
            for &(col, year) in &periods {
                let Some(registrations) = self.count(&row[col]) else {
                    dropped += 1;
                    continue;
                };
                let rec = AnnualRecord {
                    entity_name: name.clone(),
                    entity_type,
                    year,
                    registrations,
                };
                match seen.get(&(name.clone(), year)) {
                    Some(&i) => out[i] = rec,
                    None => {
                        seen.insert((name.clone(), year), out.len());
                        out.push(rec);
                    }
                }
            }
        }
        debug!(records = out.len(), dropped, "annual table normalized");
        Ok(out)
    }

    /// One record per (entity row × month column); the year comes from the
    /// combination, not the table.
    pub fn monthly(
        &self,
        table: &RawTableCandidate,
        entity_type: EntityType,
        year: i32,
    ) -> Result<Vec<MonthlyRecord>, NormalizeError> {
        let periods: Vec<(usize, Month)> = period_columns(table, label_month);
        if periods.is_empty() {
            return Err(NormalizeError::NoPeriodColumns("month", table.columns.clone()));
        }
        let entity_col = entity_column(table, &periods)?;

        let mut out: Vec<MonthlyRecord> = Vec::new();
        let mut seen: HashMap<(String, Month), usize> = HashMap::new();
        let mut dropped = 0usize;
        for row in &table.rows {
            let Some(name) = entity_name(&row[entity_col]) else {
                continue;
            };
            for &(col, month) in &periods {
                let Some(monthly_registrations) = self.count(&row[col]) else {
                    dropped += 1;
                    continue;
                };
                let rec = MonthlyRecord {
                    entity_name: name.clone(),
                    entity_type,
                    year,
                    month,
                    monthly_registrations,
                };
                match seen.get(&(name.clone(), month)) {
                    Some(&i) => out[i] = rec,
                    None => {
                        seen.insert((name.clone(), month), out.len());
                        out.push(rec);
                    }
                }
            }
        }
        debug!(records = out.len(), dropped, year, "monthly table normalized");
        Ok(out)
    }

    /// Non-negative whole counts; zero only when `keep_zero` is set.
    fn count(&self, cell: &Cell) -> Option<u64> {
        let n = cell.as_number()?;
        if !n.is_finite() || n < 0.0 || n.fract() != 0.0 || n > u64::MAX as f64 {
            return None;
        }
        let v = n as u64;
        if v == 0 && !self.opts.keep_zero {
            return None;
        }
        Some(v)
    }
}

fn period_columns<T>(table: &RawTableCandidate, parse: impl Fn(&str) -> Option<T>) -> Vec<(usize, T)> {
    table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, label)| !is_total_label(label) && !is_serial_label(label))
        .filter_map(|(i, label)| parse(label).map(|p| (i, p)))
        .collect()
}

fn entity_column<T>(table: &RawTableCandidate, periods: &[(usize, T)]) -> Result<usize, NormalizeError> {
    table
        .columns
        .iter()
        .enumerate()
        .find(|(i, label)| {
            !is_serial_label(label)
                && !is_total_label(label)
                && !periods.iter().any(|(p, _)| p == i)
        })
        .map(|(i, _)| i)
        .ok_or_else(|| NormalizeError::NoEntityColumn(table.columns.clone()))
}

/// Footer rows such as "Total" or "Grand Total :".
pub fn is_total_row(name: &str) -> bool {
    TOTAL_ROW_RE.is_match(name)
}

/// Text in the entity column; numeric, empty and total cells do not name an
/// entity.
fn entity_name(cell: &Cell) -> Option<String> {
    cell.as_text()
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_total_row(s))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CategoryAxis;

    fn table(columns: &[&str], rows: Vec<Vec<&str>>) -> RawTableCandidate {
        RawTableCandidate::from_text_rows(
            columns.iter().map(|s| s.to_string()).collect(),
            rows.into_iter()
                .map(|r| r.into_iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_calendar_year_table_skips_total() {
        let t = table(
            &["S No", "Name", "Calendar Year_2021", "Calendar Year_2022", "TOTAL"],
            vec![
                vec!["1", "HONDA", "1,200", "1,500", "2,700"],
                vec!["2", "TVS", "900", "1,100", "2,000"],
            ],
        );
        let combo = FilterCombination::new(CategoryAxis::Manufacturer, TimeAxis::CalendarYear, 2022);
        let RecordBatch::Annual(recs) = Normalizer::default().normalize(&t, &combo).unwrap() else {
            panic!("expected annual batch");
        };
        assert_eq!(recs.len(), 4);
        assert!(recs.iter().all(|r| r.entity_type == EntityType::Manufacturer));
        assert!(recs.iter().all(|r| r.year == 2021 || r.year == 2022));
        let honda_2022 = recs
            .iter()
            .find(|r| r.entity_name == "HONDA" && r.year == 2022)
            .unwrap();
        assert_eq!(honda_2022.registrations, 1500);
    }

    #[test]
    fn test_month_wise_drops_zero_months() {
        let mut row = vec!["1", "TWO WHEELER(NT)", "10", "0", "5"];
        row.extend(std::iter::repeat("0").take(9));
        row.push("15");
        let mut cols = vec!["S No", "Vehicle Category"];
        cols.extend(Month::ALL.iter().map(|m| m.as_str()));
        cols.push("TOTAL");
        let t = table(&cols, vec![row.clone(), row]);

        let combo = FilterCombination::new(CategoryAxis::VehicleCategory, TimeAxis::MonthWise, 2023);
        let RecordBatch::Monthly(recs) = Normalizer::default().normalize(&t, &combo).unwrap() else {
            panic!("expected monthly batch");
        };
        assert_eq!(recs.len(), 2, "duplicate rows collapse onto one key");
        assert_eq!(recs[0].month, Month::Jan);
        assert_eq!(recs[0].monthly_registrations, 10);
        assert_eq!(recs[1].month, Month::Mar);
        assert_eq!(recs[1].monthly_registrations, 5);
        assert!(recs.iter().all(|r| r.year == 2023 && r.entity_type == EntityType::VehicleCategory));
        assert!(!recs.iter().any(|r| r.month == Month::Feb));
    }

    #[test]
    fn test_keep_zero_switch() {
        let t = table(
            &["S No", "Maker", "Month Wise_JAN", "Month Wise_FEB", "TOTAL_TOTAL"],
            vec![vec!["1", "BAJAJ", "3", "0", "3"], vec!["2", "HERO", "0", "0", "0"]],
        );
        let n = Normalizer::new(NormalizerOptions { keep_zero: true });
        let recs = n.monthly(&t, EntityType::Manufacturer, 2024).unwrap();
        assert_eq!(recs.len(), 4);
        let recs = Normalizer::default()
            .monthly(&t, EntityType::Manufacturer, 2024)
            .unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn test_bad_rows_and_values_dropped() {
        let t = table(
            &["S No", "Name", "Calendar Year_2020"],
            vec![
                vec!["1", "", "10"],
                vec!["2", "OK", "12.5"],
                vec!["3", "NEG", "-4"],
                vec!["4", "TXT", "n/a"],
                vec!["5", "GOOD", "7"],
            ],
        );
        let recs = Normalizer::default()
            .annual(&t, EntityType::VehicleCategory)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].entity_name, "GOOD");
    }

    #[test]
    fn test_missing_period_columns_is_an_error() {
        let t = table(&["S No", "Name", "Value"], vec![vec!["1", "A", "3"], vec!["2", "B", "4"]]);
        let err = Normalizer::default()
            .annual(&t, EntityType::Manufacturer)
            .unwrap_err();
        assert!(matches!(err, NormalizeError::NoPeriodColumns("calendar year", _)));

        let err = Normalizer::default()
            .monthly(&t, EntityType::Manufacturer, 2020)
            .unwrap_err();
        assert!(matches!(err, NormalizeError::NoPeriodColumns("month", _)));
    }

    #[test]
    fn test_footer_total_row_is_not_an_entity() {
        let html = r#"<table>
            <thead><tr><th>S No</th><th>Maker</th><th>Calendar Year_2023</th></tr></thead>
            <tbody>
              <tr><td>1</td><td>HONDA</td><td>1,000</td></tr>
              <tr><td>2</td><td>TVS</td><td>500</td></tr>
            </tbody>
            <tfoot><tr><td colspan="2">Total</td><td>1,500</td></tr></tfoot>
        </table>"#;
        let t = crate::extract::TableExtractor::new().extract(html).unwrap();
        let combo = FilterCombination::new(CategoryAxis::Manufacturer, TimeAxis::CalendarYear, 2023);
        let RecordBatch::Annual(recs) = Normalizer::default().normalize(&t, &combo).unwrap() else {
            panic!("expected annual batch");
        };
        let got: Vec<(&str, u64)> = recs
            .iter()
            .map(|r| (r.entity_name.as_str(), r.registrations))
            .collect();
        assert_eq!(got, vec![("HONDA", 1000), ("TVS", 500)]);

        let t = table(
            &["S No", "Vehicle Category", "JAN"],
            vec![vec!["1", "BUS", "4"], vec!["", "Grand Total :", "4"]],
        );
        let recs = Normalizer::default()
            .monthly(&t, EntityType::VehicleCategory, 2023)
            .unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].entity_name, "BUS");
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!(label_year("Calendar Year_2021"), Some(2021));
        assert_eq!(label_year("12021"), None);
        assert_eq!(label_month("Month Wise_SEP"), Some(Month::Sep));
        assert_eq!(label_month("Maker"), None);
        assert!(is_total_label("TOTAL_TOTAL"));
        assert!(is_total_row("Total"));
        assert!(is_total_row("GRAND TOTAL:"));
        assert!(!is_total_row("TOTAL MOTORS LTD"));
    }
}
