// src/harvest/summary.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, StringArray, TimestampMicrosecondArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Local};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{info, warn};

use crate::model::{HarvestOutcome, OutcomeStatus};

/// What a sweep did, combination by combination.
#[derive(Debug)]
pub struct HarvestSummary {
    pub outcomes: Vec<HarvestOutcome>,
    pub cancelled: bool,
    pub started: DateTime<Local>,
    pub elapsed: Duration,
}

impl HarvestSummary {
    pub fn new(
        outcomes: Vec<HarvestOutcome>,
        cancelled: bool,
        started: DateTime<Local>,
        elapsed: Duration,
    ) -> Self {
        Self {
            outcomes,
            cancelled,
            started,
            elapsed,
        }
    }

    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn records_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_written).sum()
    }

    pub fn by_status(&self) -> BTreeMap<OutcomeStatus, Vec<&HarvestOutcome>> {
        let mut map: BTreeMap<OutcomeStatus, Vec<&HarvestOutcome>> = BTreeMap::new();
        for o in &self.outcomes {
            map.entry(o.status).or_default().push(o);
        }
        map
    }

    /// Enumerate combinations by outcome in the log.
    pub fn log(&self) {
        info!(
            combinations = self.outcomes.len(),
            records = self.records_written(),
            elapsed = ?self.elapsed,
            cancelled = self.cancelled,
            "harvest summary"
        );
        for (status, outcomes) in self.by_status() {
            let combos: Vec<String> = outcomes.iter().map(|o| o.combination.to_string()).collect();
            if status == OutcomeStatus::Success {
                info!(status = %status, count = outcomes.len(), combinations = ?combos, "outcome group");
            } else {
                warn!(status = %status, count = outcomes.len(), combinations = ?combos, "outcome group");
            }
        }
    }

    /// Write every outcome as one row of `run_<YYYYmmdd_HHMMSS>.parquet` in
    /// `dir`.
    pub fn write_parquet(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating outcomes directory {:?}", dir))?;
        let name = format!("run_{}.parquet", self.started.format("%Y%m%d_%H%M%S"));
        let path = dir.join(&name);
        let tmp = dir.join(format!("{}.tmp", name));

        let schema = Arc::new(Schema::new(vec![
            Field::new("category", DataType::Utf8, false),
            Field::new("time_axis", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("status", DataType::Utf8, false),
            Field::new("records_written", DataType::UInt64, false),
            Field::new("detail", DataType::Utf8, true),
            Field::new(
                "run_started",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                false,
            ),
        ]));

        let o = &self.outcomes;
        let ts = self.started.timestamp_micros();
        let columns: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from_iter_values(
                o.iter().map(|x| format!("{:?}", x.combination.category)),
            )),
            Arc::new(StringArray::from_iter_values(
                o.iter().map(|x| format!("{:?}", x.combination.time_axis)),
            )),
            Arc::new(Int32Array::from_iter_values(o.iter().map(|x| x.combination.year))),
            Arc::new(StringArray::from_iter_values(o.iter().map(|x| x.status.as_str()))),
            Arc::new(UInt64Array::from_iter_values(
                o.iter().map(|x| x.records_written as u64),
            )),
            Arc::new(StringArray::from(
                o.iter().map(|x| x.detail.clone()).collect::<Vec<Option<String>>>(),
            )),
            Arc::new(TimestampMicrosecondArray::from_iter_values(o.iter().map(|_| ts))),
        ];

        let batch = RecordBatch::try_new(schema.clone(), columns)
            .context("building outcome record batch")?;
        let file = File::create(&tmp).with_context(|| format!("creating {:?}", &tmp))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))
            .context("creating Arrow writer for outcomes")?;
        writer.write(&batch).context("writing outcome batch")?;
        writer.close().context("closing outcome writer")?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {:?} to {:?}", &tmp, &path))?;
        info!(path = %path.display(), rows = o.len(), "outcome log written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryAxis, FilterCombination, TimeAxis};
    use anyhow::Result;
    use parquet::file::reader::{FileReader, SerializedFileReader};
    use tempfile::tempdir;

    fn outcome(year: i32, status: OutcomeStatus, n: usize) -> HarvestOutcome {
        HarvestOutcome {
            combination: FilterCombination::new(CategoryAxis::Manufacturer, TimeAxis::CalendarYear, year),
            status,
            records_written: n,
            detail: (status != OutcomeStatus::Success).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_counts_and_grouping() {
        let s = HarvestSummary::new(
            vec![
                outcome(2021, OutcomeStatus::Success, 10),
                outcome(2022, OutcomeStatus::NoTableFound, 0),
                outcome(2023, OutcomeStatus::Success, 5),
            ],
            false,
            Local::now(),
            Duration::from_secs(1),
        );
        assert_eq!(s.count(OutcomeStatus::Success), 2);
        assert_eq!(s.records_written(), 15);
        let groups = s.by_status();
        assert_eq!(groups[&OutcomeStatus::NoTableFound].len(), 1);
        assert!(!groups.contains_key(&OutcomeStatus::ExtractionFailed));
    }

    #[test]
    fn test_outcome_parquet_written() -> Result<()> {
        let dir = tempdir()?;
        let s = HarvestSummary::new(
            vec![
                outcome(2021, OutcomeStatus::Success, 10),
                outcome(2022, OutcomeStatus::NavigationFailed, 0),
            ],
            false,
            Local::now(),
            Duration::from_millis(5),
        );
        let path = s.write_parquet(&dir.path().join("outcomes"))?;
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run_") && name.ends_with(".parquet"));

        let reader = SerializedFileReader::new(File::open(&path)?)?;
        assert_eq!(reader.metadata().file_metadata().num_rows(), 2);
        Ok(())
    }
}
