// src/import.rs
//
// Ingests the wide-table CSV files written by the older file-based harvester.

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::extract::RawTableCandidate;
use crate::model::{CategoryAxis, FilterCombination, TimeAxis};
use crate::normalize::Normalizer;
use crate::store::RegistrationStore;

static LEGACY_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Y_(.+)_X_(Calendar_Year|Month_Wise)_Year_(\d{4})\.csv$").expect("valid regex")
});

/// Recover the combination encoded in a legacy CSV file name.
pub fn parse_legacy_name(file_name: &str) -> Option<FilterCombination> {
    let caps = LEGACY_NAME_RE.captures(file_name)?;
    let category = if &caps[1] == "Vehicle_Category" {
        CategoryAxis::VehicleCategory
    } else {
        CategoryAxis::Manufacturer
    };
    let time_axis = match &caps[2] {
        "Calendar_Year" => TimeAxis::CalendarYear,
        _ => TimeAxis::MonthWise,
    };
    let year = caps[3].parse().ok()?;
    Some(FilterCombination::new(category, time_axis, year))
}

/// pandas writes its row index as an unnamed leading column.
fn is_index_header(h: &str) -> bool {
    let h = h.trim();
    h.is_empty() || h.starts_with("Unnamed")
}

/// Read a legacy wide table. Cells go through the same coercion as scraped
/// tables.
pub fn read_legacy_csv(path: &Path) -> Result<RawTableCandidate> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {:?}", path))?;

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {:?}", path))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let keep: Vec<usize> = (0..headers.len())
        .filter(|&i| !is_index_header(&headers[i]))
        .collect();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("parsing CSV record in {:?}", path))?;
        rows.push(
            keep.iter()
                .map(|&i| record.get(i).unwrap_or("").to_string())
                .collect::<Vec<String>>(),
        );
    }
    let columns = keep.iter().map(|&i| headers[i].clone()).collect();
    Ok(RawTableCandidate::from_text_rows(columns, rows))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
    pub records: usize,
}

#[tracing::instrument(level = "info", skip(store, normalizer), fields(file = %path.display()))]
fn import_file(
    path: &Path,
    combo: &FilterCombination,
    store: &mut RegistrationStore,
    normalizer: &Normalizer,
) -> Result<usize> {
    let table = read_legacy_csv(path)?;
    let batch = normalizer
        .normalize(&table, combo)
        .with_context(|| format!("normalizing {:?}", path))?;
    store.upsert(&batch)
}

/// Import every `Y_*_X_*_Year_*.csv` under `dir`. A failing file is logged and
/// counted; it never aborts the import.
pub fn import_dir(dir: &Path, store: &mut RegistrationStore, normalizer: &Normalizer) -> Result<ImportReport> {
    let pattern = format!("{}/**/Y_*.csv", dir.display());
    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("bad glob pattern {}", pattern))?
        .filter_map(|p| p.ok())
        .collect();
    files.sort();

    let mut report = ImportReport::default();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let Some(combo) = parse_legacy_name(&name) else {
            warn!(file = %name, "unrecognised file name; skipping");
            report.skipped += 1;
            continue;
        };
        match import_file(&path, &combo, store, normalizer) {
            Ok(0) => {
                warn!(file = %name, "file produced no records");
                report.imported += 1;
            }
            Ok(n) => {
                info!(file = %name, records = n, "imported");
                report.imported += 1;
                report.records += n;
            }
            Err(e) => {
                error!(file = %name, error = %format!("{:#}", e), "import failed");
                report.failed += 1;
            }
        }
    }
    info!(?report, "legacy import finished");
    Ok(report)
}
