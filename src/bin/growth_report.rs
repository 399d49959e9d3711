use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use vahan_harvest::{
    model::EntityType,
    report::{self, GrowthPoint, Grouping},
    store::RegistrationStore,
};

#[derive(Parser)]
#[command(author, version, about = "Latest YoY or QoQ growth per entity")]
struct Args {
    #[arg(long, default_value = "vahan_data.duckdb")]
    db: PathBuf,
    /// Collapse vehicle categories into 2W/3W/4W/Other
    #[arg(long)]
    coarse: bool,
    /// Quarter-over-quarter from the monthly table instead of YoY
    #[arg(long)]
    quarterly: bool,
    /// Only this entity type ("Manufacturer" or "Vehicle Category")
    #[arg(long)]
    entity_type: Option<EntityType>,
}

fn print_row(p: &GrowthPoint) {
    let growth = p
        .growth_pct
        .map(|g| format!("{:>9.2}%", g))
        .unwrap_or_else(|| format!("{:>10}", "NA"));
    let previous = p
        .previous
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:<18} {:<48} {:>8} {:>12} {:>12} {}",
        p.entity_type.as_str(),
        p.entity,
        p.period.to_string(),
        p.value,
        previous,
        growth
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();

    let args = Args::parse();
    let store = RegistrationStore::open(&args.db)?;
    let grouping = if args.coarse {
        Grouping::Coarse
    } else {
        Grouping::Raw
    };

    let points = if args.quarterly {
        report::qoq(&store.monthly_records()?, grouping)
    } else {
        report::yoy(&store.annual_records()?, grouping)
    };

    println!(
        "{:<18} {:<48} {:>8} {:>12} {:>12} {:>10}",
        "type", "entity", "period", "value", "previous", "growth"
    );
    for p in report::latest(&points)
        .into_iter()
        .filter(|p| args.entity_type.map_or(true, |t| t == p.entity_type))
    {
        print_row(p);
    }
    Ok(())
}
