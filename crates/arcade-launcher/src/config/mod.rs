use anyhow::{Context, Result};
use arcade_monitoring::settings::{DEFAULT_GRACE_DELAY, DEFAULT_IDLE_LIMIT, DEFAULT_WATCH_INTERVAL};
use arcade_monitoring::MonitorSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod validation;

/// Top-level configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    #[serde(default)]
    pub launcher: LauncherOptions,
    #[serde(default)]
    pub games: Vec<GameEntry>,
}

/// Launcher timing and logging options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherOptions {
    /// Idle time after which a running game is closed.
    #[serde(default = "default_idle_limit", with = "duration_serde")]
    pub idle_limit: Duration,

    /// Wait between the graceful close request and the forced kill.
    #[serde(default = "default_grace_delay", with = "duration_serde")]
    pub grace_delay: Duration,

    /// Period of the fallback "is the game still running" poll.
    #[serde(default = "default_watch_interval", with = "duration_serde")]
    pub watch_interval: Duration,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for LauncherOptions {
    fn default() -> Self {
        Self {
            idle_limit: default_idle_limit(),
            grace_delay: default_grace_delay(),
            watch_interval: default_watch_interval(),
            log_level: default_log_level(),
        }
    }
}

/// One entry of the game catalog.
///
/// Only `name` and `exe` matter to the launcher; the media fields are carried
/// through for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEntry {
    pub name: String,
    pub exe: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
}

impl LauncherConfig {
    /// Load configuration from a YAML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        Self::load_from_string(&content)
    }

    /// Load configuration from a YAML string
    pub fn load_from_string(content: &str) -> Result<Self> {
        let config: LauncherConfig =
            serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// First game whose name matches, ignoring case.
    pub fn find_game(&self, name: &str) -> Option<&GameEntry> {
        self.games
            .iter()
            .find(|game| game.name.eq_ignore_ascii_case(name))
    }

    /// Timing settings for the idle monitors.
    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            idle_limit: self.launcher.idle_limit,
            grace_delay: self.launcher.grace_delay,
            watch_interval: self.launcher.watch_interval,
        }
    }
}

// Default value functions
fn default_idle_limit() -> Duration {
    DEFAULT_IDLE_LIMIT
}

fn default_grace_delay() -> Duration {
    DEFAULT_GRACE_DELAY
}

fn default_watch_interval() -> Duration {
    DEFAULT_WATCH_INTERVAL
}

fn default_log_level() -> String {
    "info".to_string()
}

// Custom serialization for Duration
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() != 0 {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        } else {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let invalid = || format!("Invalid duration: {}", s);

        // Check for "ms" BEFORE "s" since "ms" ends with 's'
        if let Some(num_str) = s.strip_suffix("ms") {
            let millis: u64 = num_str.trim().parse().map_err(|_| invalid())?;
            Ok(Duration::from_millis(millis))
        } else if let Some(num_str) = s.strip_suffix('s') {
            let secs: u64 = num_str.trim().parse().map_err(|_| invalid())?;
            Ok(Duration::from_secs(secs))
        } else if let Some(num_str) = s.strip_suffix('m') {
            let mins: u64 = num_str.trim().parse().map_err(|_| invalid())?;
            mins.checked_mul(60)
                .map(Duration::from_secs)
                .ok_or_else(invalid)
        } else {
            Err(format!("Duration must end with 's', 'ms', or 'm': {}", s))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
launcher:
  idle_limit: 90s
  grace_delay: 1500ms
  watch_interval: 5s
  log_level: debug
games:
  - name: Foo
    exe: /games/foo.exe
    video: videos/foo.mp4
    font: Foo Sans
    font_path: fonts/foo.ttf
  - name: Bar
    exe: /games/bar.exe
"#;

    #[test]
    fn test_parse_full_config() {
        let config = LauncherConfig::load_from_string(SAMPLE).unwrap();

        assert_eq!(config.launcher.idle_limit, Duration::from_secs(90));
        assert_eq!(config.launcher.grace_delay, Duration::from_millis(1500));
        assert_eq!(config.launcher.log_level, "debug");
        assert_eq!(config.games.len(), 2);
        assert_eq!(config.games[0].video.as_deref(), Some("videos/foo.mp4"));
        assert_eq!(config.games[1].font, None);
    }

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = LauncherConfig::load_from_string("games: []").unwrap();
        assert_eq!(config.monitor_settings(), MonitorSettings::default());
        assert_eq!(config.launcher.log_level, "info");

        let config = LauncherConfig::load_from_string("{}").unwrap();
        assert!(config.games.is_empty());
    }

    #[test]
    fn test_find_game_is_case_insensitive_first_match() {
        let yaml = r#"
games:
  - name: Foo
    exe: /games/foo.exe
  - name: FOO
    exe: /games/other.exe
"#;
        let config = LauncherConfig::load_from_string(yaml).unwrap();
        let game = config.find_game("foo").unwrap();
        assert_eq!(game.exe, PathBuf::from("/games/foo.exe"));
        assert!(config.find_game("baz").is_none());
    }

    #[test]
    fn test_parse_duration_suffixes() {
        use duration_serde::parse_duration;

        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("3m").unwrap(), Duration::from_secs(180));
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("xs").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = LauncherConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.find_game("bar").unwrap().name, "Bar");
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = LauncherConfig::load_from_file("/nonexistent/arcade.yaml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/arcade.yaml"));
    }

    #[test]
    fn test_settings_serialize_round_trip_format() {
        let yaml = serde_yaml::to_string(&LauncherConfig::default()).unwrap();
        assert!(yaml.contains("idle_limit: 120s"));
        assert!(yaml.contains("grace_delay: 2s"));
    }
}
