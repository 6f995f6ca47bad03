use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use youthjobs::{
    config::{Config, DEFAULT_CONFIG},
    load::load_sources,
    process,
    session::Session,
};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();
    info!("startup");

    // ─── 2) config ───────────────────────────────────────────────────
    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let config = if path.exists() {
        Config::load(&path)?
    } else {
        warn!(config = %path.display(), "config not found, using defaults");
        Config::default()
    };

    // ─── 3) build the session ────────────────────────────────────────
    let session = match &config.merged {
        Some(merged) => Session::from_merged_path(merged)
            .with_context(|| format!("loading merged table {}", merged.display()))?,
        None => {
            let sources = load_sources(&config.sources, config.bundle.as_deref());
            process::run(sources, &config.pipeline_options()).map_err(|e| {
                error!(error = %e, "pipeline aborted");
                e
            })?
        }
    };

    // ─── 4) publish ──────────────────────────────────────────────────
    let written = session.write_outputs(&config.output)?;
    for p in &written {
        info!(file = %p.display(), "written");
    }

    let quarters = session.quarters();
    match (quarters.first(), quarters.last()) {
        (Some(first), Some(last)) => println!(
            "{} rows, {} quarters ({}..{}), {} states{}",
            session.table().len(),
            quarters.len(),
            first,
            last,
            session.states().len(),
            if session.trimmed() { ", trimmed to core range" } else { "" }
        ),
        _ => println!("no rows published"),
    }
    println!();
    print!("{}", session.coverage());

    let diagnostics = session.diagnostics().items();
    if !diagnostics.is_empty() {
        println!();
        println!("{} diagnostics:", diagnostics.len());
        for d in diagnostics {
            println!("  - {}", serde_json::to_string(d)?);
        }
    }
    Ok(())
}
