//! Process-wide `tracing` subscriber setup.

use crate::config::LogConfig;
use crate::error::{SdkError, SdkResult};

/// Install a formatting subscriber filtered at `config.level`.
///
/// Fails if the level is unknown or a global subscriber is already set.
pub fn init(config: &LogConfig) -> SdkResult<()> {
    let level = config.max_level()?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| SdkError::Telemetry(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let config = LogConfig { level: "warn".into() };
        // Another test in this binary may have won the race for the global slot.
        let _ = init(&config);
        assert!(matches!(init(&config), Err(SdkError::Telemetry(_))));
    }

    #[test]
    fn unknown_level_fails_before_installing() {
        let config = LogConfig { level: "chatty".into() };
        assert!(matches!(init(&config), Err(SdkError::Config(_))));
    }
}
