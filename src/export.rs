// src/export.rs

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int32Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

use crate::model::{AnnualRecord, MonthlyRecord};
use crate::store::RegistrationStore;

pub const ANNUAL_FILE: &str = "annual_registrations.parquet";
pub const MONTHLY_FILE: &str = "monthly_registrations.parquet";

pub fn annual_schema() -> Schema {
    Schema::new(vec![
        Field::new("entity_name", DataType::Utf8, false),
        Field::new("entity_type", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("registrations", DataType::UInt64, false),
    ])
}

pub fn monthly_schema() -> Schema {
    Schema::new(vec![
        Field::new("entity_name", DataType::Utf8, false),
        Field::new("entity_type", DataType::Utf8, false),
        Field::new("year", DataType::Int32, false),
        Field::new("month", DataType::Utf8, false),
        Field::new("monthly_registrations", DataType::UInt64, false),
    ])
}

fn annual_batch(rows: &[AnnualRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.entity_name.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.entity_type.as_str()))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.registrations))),
    ];
    RecordBatch::try_new(Arc::new(annual_schema()), columns).context("building annual batch")
}

fn monthly_batch(rows: &[MonthlyRecord]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.entity_name.as_str()))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.entity_type.as_str()))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.year))),
        Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.month.as_str()))),
        Arc::new(UInt64Array::from_iter_values(
            rows.iter().map(|r| r.monthly_registrations),
        )),
    ];
    RecordBatch::try_new(Arc::new(monthly_schema()), columns).context("building monthly batch")
}

/// Write `batch` to `path` through a `.tmp` sibling.
fn write_batch(path: &Path, batch: &RecordBatch) -> Result<()> {
    let tmp = path.with_extension("parquet.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {:?}", &tmp))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .with_context(|| format!("creating Arrow writer for {:?}", path))?;
    writer
        .write(batch)
        .with_context(|| format!("writing {:?}", path))?;
    writer.close().with_context(|| format!("closing {:?}", path))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming {:?} to {:?}", &tmp, path))?;
    Ok(())
}

/// Export both canonical tables as Parquet files under `dir`.
#[tracing::instrument(level = "info", skip(store), fields(dir = %dir.display()))]
pub fn export_tables(store: &RegistrationStore, dir: &Path) -> Result<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("creating export directory {:?}", dir))?;

    let annual = store.annual_records()?;
    let annual_path = dir.join(ANNUAL_FILE);
    write_batch(&annual_path, &annual_batch(&annual)?)?;

    let monthly = store.monthly_records()?;
    let monthly_path = dir.join(MONTHLY_FILE);
    write_batch(&monthly_path, &monthly_batch(&monthly)?)?;

    info!(annual = annual.len(), monthly = monthly.len(), "tables exported");
    Ok((annual_path, monthly_path))
}
