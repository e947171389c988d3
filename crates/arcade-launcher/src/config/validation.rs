use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &LauncherConfig) -> Result<()> {
    validate_launcher_options(&config.launcher)
}

/// Validate launcher options
fn validate_launcher_options(options: &LauncherOptions) -> Result<()> {
    if options.idle_limit.is_zero() {
        return Err(anyhow!("Idle limit must be greater than 0"));
    }

    if options.grace_delay.is_zero() {
        return Err(anyhow!("Grace delay must be greater than 0"));
    }

    if options.watch_interval.is_zero() {
        return Err(anyhow!("Watch interval must be greater than 0"));
    }

    validate_log_level(&options.log_level)
}

pub fn validate_log_level(level: &str) -> Result<()> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(anyhow!(
            "Invalid log level: {}, must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_durations_rejected() {
        let mut config = LauncherConfig::default();
        config.launcher.grace_delay = Duration::ZERO;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Grace delay"));

        let err = LauncherConfig::load_from_string("launcher:\n  idle_limit: 0s\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Idle limit"));
    }

    #[test]
    fn test_log_level() {
        assert!(validate_log_level("INFO").is_ok());
        assert!(validate_log_level("verbose").is_err());
    }

    #[test]
    fn test_game_entries_not_validated() {
        let yaml = "games:\n  - name: \"\"\n    exe: \"\"\n  - name: \"\"\n    exe: \"\"\n";
        assert!(LauncherConfig::load_from_string(yaml).is_ok());
    }
}
