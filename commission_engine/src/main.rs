//! Entry point for the Commission Engine binary.
//!
//! Running this binary starts an HTTP server exposing the rule store,
//! the scenario test runner and the tier calculator.  Configuration is
//! read from the environment; see [`commission_engine::config`].  Log
//! verbosity follows `RUST_LOG` and defaults to `commission_engine=info`.

use commission_engine::config::EngineConfig;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "commission_engine=info".into()),
        )
        .init();

    let config = EngineConfig::from_env();
    if let Err(err) = commission_engine::api::serve(&config).await {
        tracing::error!("error running server: {:#}", err);
        std::process::exit(1);
    }
}
