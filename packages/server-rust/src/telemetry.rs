//! `tracing-subscriber` bootstrap for console output.

use logweave_core::LogLevel;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::ConsoleConfig;
use crate::error::ConfigError;
use crate::logger::console::tracing_level;

/// Default filter directive for `level`, used when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(level: LogLevel) -> String {
    tracing_level(level).as_str().to_ascii_lowercase()
}

/// Installs the global fmt subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `config.json` set, events
/// are written as JSON lines.
///
/// # Errors
///
/// [`ConfigError::Subscriber`] if a global subscriber is already installed.
pub fn init_tracing(config: &ConsoleConfig, level: LogLevel) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(config.colorize && !config.json);

    let result = if config.json {
        builder.json().finish().try_init()
    } else {
        builder.finish().try_init()
    };
    result.map_err(|err| ConfigError::Subscriber(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_follow_console_level_mapping() {
        assert_eq!(default_directive(LogLevel::Error), "error");
        assert_eq!(default_directive(LogLevel::Info), "info");
        assert_eq!(default_directive(LogLevel::Http), "debug");
        assert_eq!(default_directive(LogLevel::Debug), "trace");
    }

    #[test]
    fn second_install_is_reported() {
        let config = ConsoleConfig {
            json: true,
            ..ConsoleConfig::default()
        };
        let _ = init_tracing(&config, LogLevel::Info);
        assert!(matches!(
            init_tracing(&config, LogLevel::Info),
            Err(ConfigError::Subscriber(_))
        ));
    }
}
