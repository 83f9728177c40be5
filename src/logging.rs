//! Diagnostic logging setup.
//!
//! Diagnostics go to stderr through `tracing-subscriber` so answers streamed to
//! stdout stay clean. The transcript log written by `--log` lives in
//! [`crate::utils::logging`].

use tracing_subscriber::EnvFilter;

pub const LOG_ENV_VAR: &str = "MANDE_LOG";
pub const FALLBACK_DIRECTIVE: &str = "warn";

/// Pick the filter directive: the environment wins over the config file.
pub fn filter_directive(env_value: Option<String>, configured: Option<&str>) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .or_else(|| configured.map(str::to_string))
        .unwrap_or_else(|| FALLBACK_DIRECTIVE.to_string())
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(configured: Option<&str>) {
    let directive = filter_directive(std::env::var(LOG_ENV_VAR).ok(), configured);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_config() {
        assert_eq!(
            filter_directive(Some("mande=debug".into()), Some("info")),
            "mande=debug"
        );
    }

    #[test]
    fn config_then_fallback() {
        assert_eq!(filter_directive(None, Some("info")), "info");
        assert_eq!(filter_directive(Some("  ".into()), None), "warn");
    }
}
