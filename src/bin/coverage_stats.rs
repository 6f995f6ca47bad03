use anyhow::{Context, Result};
use std::{env, path::Path, process::exit};
use tracing_subscriber::{fmt, EnvFilter};

use youthjobs::{schema::Metric, session::Session};

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr) // Log to stderr
        .init();

    // Expect exactly one CLI argument: the merged table.
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <merged.csv|merged.parquet>", args[0]);
        exit(1);
    }
    let path = Path::new(&args[1]);
    let session = Session::from_merged_path(path)
        .with_context(|| format!("loading merged table {}", path.display()))?;

    println!("=== Merged table: {} ===", path.display());
    println!("Rows:     {}", session.table().len());
    match (session.quarters().first(), session.quarters().last()) {
        (Some(first), Some(last)) => println!(
            "Quarters: {} ({}..{})",
            session.quarters().len(),
            first,
            last
        ),
        _ => println!("Quarters: 0"),
    }
    let states: Vec<&str> = session.states().iter().map(String::as_str).collect();
    println!("States:   {} [{}]", states.len(), states.join(", "));
    println!();

    println!("=== Coverage ===");
    print!("{}", session.coverage());

    let core_gaps: Vec<&str> = Metric::CORE
        .iter()
        .filter(|m| session.coverage().get(**m).is_some_and(|e| !e.has_data()))
        .map(|m| m.column_name())
        .collect();
    if !core_gaps.is_empty() {
        println!();
        println!("core series without data: {}", core_gaps.join(", "));
    }

    tracing::info!("coverage statistics finished");
    Ok(())
}
