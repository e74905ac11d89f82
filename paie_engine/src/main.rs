//! Entry point for the Paie Engine binary.
//!
//! Running this binary starts an HTTP server exposing the payroll
//! engine.  Configuration is read from the environment (and an optional
//! `.env` file): `PAIE_PARAMETERS_DIR` names the directory of
//! fiscal-year parameter files, `PAIE_BIND_ADDR` the listen address and
//! `PAIE_DEFAULT_FISCAL_YEAR` the year used when a request names none.
//! Log verbosity follows `RUST_LOG`.

use paie_engine::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Config::from_env()?;
    if let Err(err) = paie_engine::api::serve(config).await {
        tracing::error!(error = %err, "server stopped");
        return Err(err);
    }
    Ok(())
}
