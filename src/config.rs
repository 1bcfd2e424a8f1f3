// Playground Configuration
//
// Startup settings read from a TOML file: initial dialect, debounce delays,
// hint overlay size, sandbox limits and the tiny-screen layout switch.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::dialect::Dialect;
use crate::script::ExecutionLimits;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PLAYGROUND_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "playground.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlaygroundConfig {
    /// Dialect selected at startup
    pub dialect: Dialect,

    /// Run automatically after the editor goes quiet
    pub auto_run: bool,

    pub scheduler: SchedulerConfig,
    pub hints: HintsConfig,
    pub sandbox: ExecutionLimits,
    pub ui: UiConfig,
}

/// Debounce delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub auto_run_ms: u64,
    /// Auto-run delay on tiny screens
    pub tiny_auto_run_ms: u64,
    pub hint_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HintsConfig {
    pub enabled: bool,
    pub max_visible: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Force the tiny-screen layout on or off; unset means decide by width
    pub tiny_screen: Option<bool>,

    /// Window widths below this (in points) count as tiny
    pub tiny_width: f32,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::JavaScript,
            auto_run: true,
            scheduler: SchedulerConfig::default(),
            hints: HintsConfig::default(),
            sandbox: ExecutionLimits::default(),
            ui: UiConfig::default(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            auto_run_ms: 1000,
            tiny_auto_run_ms: 800,
            hint_ms: 300,
        }
    }
}

impl Default for HintsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_visible: crate::hints::overlay::DEFAULT_MAX_VISIBLE,
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            tiny_screen: None,
            tiny_width: 768.0,
        }
    }
}

impl SchedulerConfig {
    pub fn auto_run_delay(&self, tiny: bool) -> Duration {
        Duration::from_millis(if tiny { self.tiny_auto_run_ms } else { self.auto_run_ms })
    }

    pub fn hint_delay(&self) -> Duration {
        Duration::from_millis(self.hint_ms)
    }
}

impl UiConfig {
    pub fn is_tiny(&self, screen_width: f32) -> bool {
        self.tiny_screen.unwrap_or(screen_width < self.tiny_width)
    }
}

impl PlaygroundConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: PlaygroundConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scheduler;
        if s.auto_run_ms == 0 || s.tiny_auto_run_ms == 0 || s.hint_ms == 0 {
            return Err(ConfigError::ValidationError(
                "scheduler: delays must be greater than zero".into(),
            ));
        }
        if s.hint_ms > 10_000 || s.auto_run_ms > 60_000 || s.tiny_auto_run_ms > 60_000 {
            return Err(ConfigError::ValidationError(
                "scheduler: delays above one minute (ten seconds for hints) are not supported".into(),
            ));
        }

        if self.hints.max_visible == 0 {
            return Err(ConfigError::ValidationError(
                "hints: max_visible must be at least 1".into(),
            ));
        }

        let limits = &self.sandbox;
        if limits.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "sandbox: max_steps must be greater than zero".into(),
            ));
        }
        // Engine threads get a fixed native stack.
        if limits.max_call_depth == 0 || limits.max_call_depth > 2000 {
            return Err(ConfigError::ValidationError(
                "sandbox: max_call_depth must be between 1 and 2000".into(),
            ));
        }
        if limits.max_array_length > u32::MAX as usize || limits.max_string_bytes > 1 << 30 {
            return Err(ConfigError::ValidationError(
                "sandbox: max_array_length is capped at 2^32 - 1 and max_string_bytes at 1 GiB".into(),
            ));
        }

        if !(self.ui.tiny_width > 0.0) {
            return Err(ConfigError::ValidationError(
                "ui: tiny_width must be positive".into(),
            ));
        }

        Ok(())
    }

    /// `$PLAYGROUND_CONFIG`, else `./playground.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Loads the startup config. A missing default file is silent; any
    /// other failure falls back to defaults with a warning.
    pub fn load() -> Self {
        let path = Self::default_path();
        let explicit = std::env::var_os(CONFIG_ENV).is_some();
        if !explicit && !path.exists() {
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(config) => {
                info!(path = %path.display(), "loaded config");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "using default config");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = PlaygroundConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.auto_run_delay(false), Duration::from_millis(1000));
        assert_eq!(config.scheduler.auto_run_delay(true), Duration::from_millis(800));
        assert_eq!(config.scheduler.hint_delay(), Duration::from_millis(300));
        assert_eq!(config.hints.max_visible, 8);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PlaygroundConfig::from_toml(
            r#"
            dialect = "typescript"

            [scheduler]
            hint_ms = 150

            [sandbox]
            max_steps = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.dialect, Dialect::TypeScript);
        assert!(config.auto_run);
        assert_eq!(config.scheduler.hint_ms, 150);
        assert_eq!(config.scheduler.auto_run_ms, 1000);
        assert_eq!(config.sandbox.max_steps, 1000);
        assert_eq!(config.sandbox.max_call_depth, ExecutionLimits::default().max_call_depth);
    }

    #[test]
    fn test_validation_errors() {
        let result = PlaygroundConfig::from_toml("[hints]\nmax_visible = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = PlaygroundConfig::from_toml("[scheduler]\nauto_run_ms = 0\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = PlaygroundConfig::from_toml("[sandbox]\nmax_call_depth = 100000\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let result = PlaygroundConfig::from_toml("[sandbox]\nmax_string_bytes = 4294967296\n");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_parse_errors() {
        let result = PlaygroundConfig::from_toml("dialect = \"python\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "auto_run = false\n\n[ui]\ntiny_screen = true").unwrap();
        let config = PlaygroundConfig::from_file(file.path()).unwrap();
        assert!(!config.auto_run);
        assert!(config.ui.is_tiny(4000.0));

        let missing = file.path().with_extension("missing");
        assert!(matches!(PlaygroundConfig::from_file(&missing), Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_tiny_screen_by_width() {
        let ui = UiConfig::default();
        assert!(ui.is_tiny(500.0));
        assert!(!ui.is_tiny(1024.0));
    }
}
