//! Logging setup and configuration

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Crates whose events follow the configured level; everything else logs at `warn`
const OWN_TARGETS: &[&str] = &["deck", "deckd", "common", "protocol"];

/// Build the filter directive for a bare level such as `debug`
///
/// Full directives (anything containing `=` or `,`) are used verbatim.
pub fn filter_directive(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }

    let mut directive = String::from("warn");
    for target in OWN_TARGETS {
        directive.push_str(&format!(",{}={}", target, level));
    }
    directive
}

/// Setup tracing subscriber for the application
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn setup_logging(default_level: &str) -> crate::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(default_level)))
        .map_err(|e| crate::Error::Config(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| crate::Error::Config(format!("Logging already initialised: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_level_scopes_own_crates() {
        let directive = filter_directive("debug");
        assert!(directive.starts_with("warn,"));
        assert!(directive.contains("deck=debug"));
        assert!(directive.contains("deckd=debug"));
    }

    #[test]
    fn test_full_directive_is_kept() {
        assert_eq!(filter_directive("deck=trace"), "deck=trace");
        assert_eq!(filter_directive("info,hidapi=off"), "info,hidapi=off");
    }
}
