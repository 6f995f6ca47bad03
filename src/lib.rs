pub mod analytics;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geo;
pub mod load;
pub mod process;
pub mod quarter;
pub mod schema;
pub mod session;
pub mod sources;

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,youthjobs::process=debug")),
        )
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
