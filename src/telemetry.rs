use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};

/// Install a global tracing subscriber. Respects RUST_LOG if set, default to info for
/// this crate and warn for HTTP and database dependencies.
///
/// Fails instead of panicking when the host application already installed one.
pub fn init_tracing() -> anyhow::Result<()> {
    let default_filter = format!(
        "{}=info,reqwest=warn,sea_orm=warn,sqlx=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .finish()
        .with(ErrorLayer::default())
        .try_init()?;
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "tracing initialized");
    Ok(())
}
