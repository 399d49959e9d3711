use anyhow::{Context, Result};
use clap::Parser;
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use vahan_harvest::{
    config::HarvestConfig,
    dom::chrome::ChromeSession,
    export,
    harvest::Harvester,
    model::OutcomeStatus,
    snapshot::SnapshotWriter,
    store::RegistrationStore,
};

#[derive(Parser)]
#[command(author, version, about = "Harvest vehicle registration tables from the Vahan dashboard")]
struct Args {
    /// YAML config file; every key is optional
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    db: Option<PathBuf>,
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,
    #[arg(long)]
    no_snapshots: bool,
    #[arg(long)]
    from_year: Option<i32>,
    #[arg(long)]
    to_year: Option<i32>,
    /// Store zero counts instead of dropping them
    #[arg(long)]
    keep_zero: bool,
    /// Show the browser window
    #[arg(long)]
    headful: bool,
    /// Also export both tables as Parquet into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<(HarvestConfig, Option<PathBuf>)> {
        let mut cfg = match &self.config {
            Some(path) => HarvestConfig::load(path)?,
            None => HarvestConfig::default(),
        };
        if let Some(db) = self.db {
            cfg.paths.database = db;
        }
        if let Some(dir) = self.snapshot_dir {
            cfg.paths.snapshots_dir = dir;
        }
        if self.no_snapshots {
            cfg.paths.snapshots_enabled = false;
        }
        if let Some(y) = self.from_year {
            cfg.sweep.from_year = y;
        }
        if self.to_year.is_some() {
            cfg.sweep.to_year = self.to_year;
        }
        if self.keep_zero {
            cfg.sweep.keep_zero = true;
        }
        if self.headful {
            cfg.browser.headless = false;
        }
        cfg.validate()?;
        Ok((cfg, self.export_dir))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,headless_chrome=warn"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) configuration ────────────────────────────────────────────
    let (cfg, export_dir) = Args::parse().into_config()?;
    info!(
        url = %cfg.dashboard_url,
        db = %cfg.paths.database.display(),
        from = cfg.sweep.from_year,
        to = cfg.sweep.last_year(),
        keep_zero = cfg.sweep.keep_zero,
        "configured"
    );

    // ─── 3) cancellation on Ctrl-C ───────────────────────────────────
    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; finishing the current combination");
                cancel.store(true, Ordering::SeqCst);
            }
        });
    }

    // ─── 4) sweep on the blocking pool ───────────────────────────────
    let summary = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut store = RegistrationStore::open(&cfg.paths.database)?;
        let snapshots = if cfg.paths.snapshots_enabled {
            SnapshotWriter::new(&cfg.paths.snapshots_dir)?
        } else {
            SnapshotWriter::disabled()
        };

        let session = ChromeSession::launch(&cfg.browser, cfg.timing.poll_interval())?;
        session.open_dashboard(
            &cfg.dashboard_url,
            &cfg.locators.overlay(),
            cfg.timing.wait_timeout(),
        )?;

        let summary = Harvester::new(&session, &cfg, &mut store, &snapshots)
            .with_cancel_flag(cancel)
            .run();

        summary.log();
        if let Err(e) = summary.write_parquet(&cfg.paths.outcomes_dir) {
            error!(error = %format!("{:#}", e), "could not write outcome log");
        }
        if let Some(dir) = export_dir {
            export::export_tables(&store, &dir)?;
        }
        info!(
            annual = store.annual_count()?,
            monthly = store.monthly_count()?,
            "store totals"
        );
        Ok(summary)
    })
    .await
    .context("harvest worker panicked")??;

    let failed = summary.outcomes.len() - summary.count(OutcomeStatus::Success);
    info!(
        succeeded = summary.count(OutcomeStatus::Success),
        failed,
        cancelled = summary.cancelled,
        "all done"
    );
    Ok(())
}
