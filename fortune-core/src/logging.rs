use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::errors::{FortuneError, Result};

/// Initializes the default tracing subscriber used by the fortune binaries.
///
/// Events go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` wins over `level` when both are present.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    let default_level = level.unwrap_or("info");
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .try_init()
        .map_err(|err| FortuneError::GeneralError(err.to_string()))?;

    Ok(())
}
