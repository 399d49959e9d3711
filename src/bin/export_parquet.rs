use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use vahan_harvest::{export::export_tables, store::RegistrationStore};

#[derive(Parser)]
#[command(author, version, about = "Dump the annual and monthly tables to Parquet")]
struct Args {
    #[arg(long, default_value = "vahan_data.duckdb")]
    db: PathBuf,
    #[arg(short, long, default_value = "./export")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let store = RegistrationStore::open(&args.db)?;
    let (annual, monthly) = export_tables(&store, &args.out)?;
    info!(annual = %annual.display(), monthly = %monthly.display(), "wrote parquet");
    Ok(())
}
