use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vahan_harvest::{
    normalize::{Normalizer, NormalizerOptions},
    store::RegistrationStore,
};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Load Y_<category>_X_<axis>_Year_<yyyy>.csv files from the old file-based harvester"
)]
struct Args {
    /// Directory searched recursively for legacy CSV files
    #[arg(short, long, default_value = "./output")]
    dir: PathBuf,
    #[arg(long, default_value = "vahan_data.duckdb")]
    db: PathBuf,
    /// Store zero counts instead of dropping them
    #[arg(long)]
    keep_zero: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    info!(dir = %args.dir.display(), db = %args.db.display(), "starting legacy import");

    let mut store = RegistrationStore::open(&args.db)?;
    let normalizer = Normalizer::new(NormalizerOptions {
        keep_zero: args.keep_zero,
    });
    let report = vahan_harvest::import::import_dir(&args.dir, &mut store, &normalizer)?;

    info!(
        imported = report.imported,
        skipped = report.skipped,
        failed = report.failed,
        records = report.records,
        annual_rows = store.annual_count()?,
        monthly_rows = store.monthly_count()?,
        "import finished"
    );
    Ok(())
}
