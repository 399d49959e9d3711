// src/store/mod.rs

use anyhow::{Context, Result};
use duckdb::{params, Connection};
use std::{fs, path::Path};
use tracing::{debug, info};

use crate::model::{AnnualRecord, EntityType, Month, MonthlyRecord, RecordBatch};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS annual_registrations (
    entity_name   VARCHAR NOT NULL,
    entity_type   VARCHAR NOT NULL,
    year          INTEGER NOT NULL,
    registrations BIGINT  NOT NULL,
    PRIMARY KEY (entity_name, entity_type, year)
);
CREATE TABLE IF NOT EXISTS monthly_registrations (
    entity_name           VARCHAR NOT NULL,
    entity_type           VARCHAR NOT NULL,
    year                  INTEGER NOT NULL,
    month                 VARCHAR NOT NULL,
    monthly_registrations BIGINT  NOT NULL,
    PRIMARY KEY (entity_name, entity_type, year, month)
);
";

const UPSERT_ANNUAL: &str = "
INSERT INTO annual_registrations (entity_name, entity_type, year, registrations)
VALUES (?, ?, ?, ?)
ON CONFLICT (entity_name, entity_type, year)
DO UPDATE SET registrations = EXCLUDED.registrations";

const UPSERT_MONTHLY: &str = "
INSERT INTO monthly_registrations (entity_name, entity_type, year, month, monthly_registrations)
VALUES (?, ?, ?, ?, ?)
ON CONFLICT (entity_name, entity_type, year, month)
DO UPDATE SET monthly_registrations = EXCLUDED.monthly_registrations";

/// The two canonical registration tables, keyed by natural key.
pub struct RegistrationStore {
    conn: Connection,
}

impl RegistrationStore {
    /// Open (or create) the database file at `path` and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database {:?}", path))?;
        let store = Self::with_connection(conn)?;
        info!(path = %path.display(), "registration store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("creating registration tables")?;
        Ok(Self { conn })
    }

    /// Insert-or-replace every record of `batch` in one transaction. Either
    /// the whole batch lands or none of it does.
    pub fn upsert(&mut self, batch: &RecordBatch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let tx = self
            .conn
            .transaction()
            .context("starting upsert transaction")?;
        {
            match batch {
                RecordBatch::Annual(records) => {
                    let mut stmt = tx.prepare(UPSERT_ANNUAL)?;
                    for r in records {
                        stmt.execute(params![
                            r.entity_name,
                            r.entity_type.as_str(),
                            r.year,
                            to_i64(r.registrations)?,
                        ])
                        .with_context(|| format!("upserting annual record {:?}", r.key()))?;
                    }
                }
                RecordBatch::Monthly(records) => {
                    let mut stmt = tx.prepare(UPSERT_MONTHLY)?;
                    for r in records {
                        stmt.execute(params![
                            r.entity_name,
                            r.entity_type.as_str(),
                            r.year,
                            r.month.as_str(),
                            to_i64(r.monthly_registrations)?,
                        ])
                        .with_context(|| format!("upserting monthly record {:?}", r.key()))?;
                    }
                }
            }
        }
        tx.commit().context("committing upsert transaction")?;
        debug!(records = batch.len(), "batch upserted");
        Ok(batch.len())
    }

    pub fn annual_records(&self) -> Result<Vec<AnnualRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_name, entity_type, year, registrations
             FROM annual_registrations
             ORDER BY entity_type, entity_name, year",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (entity_name, entity_type, year, registrations) = row?;
            out.push(AnnualRecord {
                entity_name,
                entity_type: parse_entity_type(&entity_type)?,
                year,
                registrations: from_i64(registrations)?,
            });
        }
        Ok(out)
    }

    /// Ordered by entity, year and calendar month.
    pub fn monthly_records(&self) -> Result<Vec<MonthlyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_name, entity_type, year, month, monthly_registrations
             FROM monthly_registrations
             ORDER BY entity_type, entity_name, year",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i32>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (entity_name, entity_type, year, month, count) = row?;
            out.push(MonthlyRecord {
                entity_name,
                entity_type: parse_entity_type(&entity_type)?,
                year,
                month: month.parse::<Month>().context("reading monthly_registrations")?,
                monthly_registrations: from_i64(count)?,
            });
        }
        // month names do not sort chronologically in SQL
        out.sort_by(|a, b| {
            (a.entity_type, &a.entity_name, a.year, a.month)
                .cmp(&(b.entity_type, &b.entity_name, b.year, b.month))
        });
        Ok(out)
    }

    pub fn annual_count(&self) -> Result<usize> {
        self.count("annual_registrations")
    }

    pub fn monthly_count(&self) -> Result<usize> {
        self.count("monthly_registrations")
    }

    fn count(&self, table: &str) -> Result<usize> {
        let n: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))
            .with_context(|| format!("counting rows of {}", table))?;
        Ok(n as usize)
    }
}

fn to_i64(v: u64) -> Result<i64> {
    i64::try_from(v).with_context(|| format!("count {} out of range", v))
}

fn from_i64(v: i64) -> Result<u64> {
    u64::try_from(v).with_context(|| format!("negative count {} in store", v))
}

fn parse_entity_type(s: &str) -> Result<EntityType> {
    s.parse::<EntityType>().context("reading stored entity type")
}
