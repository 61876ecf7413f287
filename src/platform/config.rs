// LogTab - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::core::classify::{LogPattern, PatternSet};
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for LogTab configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtab/ or %APPDATA%\LogTab\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility -- a newer
/// config file can be used with an older binary without crashing.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[tail]` section.
    pub tail: TailSection,
    /// `[classify]` section.
    pub classify: ClassifySection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[tail]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct TailSection {
    /// Poll interval for the watched log in ms.
    pub poll_interval_ms: Option<u64>,
}

/// `[classify]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ClassifySection {
    /// Dotted name of the job's primary module.
    pub module: Option<String>,
    /// Extra `[[classify.patterns]]`, evaluated after the built-ins.
    pub patterns: Vec<PatternDefinition>,
}

/// One user-defined classification pattern.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct PatternDefinition {
    pub label: String,
    pub pattern: String,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Tail --
    /// Poll interval for the watched log.
    pub poll_interval: Duration,

    // -- Classify --
    /// Primary module name, if configured.
    pub module: Option<String>,
    /// Compiled user patterns, in declaration order.
    pub extra_patterns: Vec<LogPattern>,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    /// Log file path.
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(constants::TAIL_POLL_INTERVAL_MS),
            module: None,
            extra_patterns: Vec::new(),
            log_level: None,
            log_file: None,
        }
    }
}

impl AppConfig {
    /// Built-in patterns for `module`, followed by the configured extras.
    pub fn pattern_set(&self, module: &str) -> PatternSet {
        let mut set = PatternSet::for_module(module);
        for pattern in &self.extra_patterns {
            set.push(pattern.clone());
        }
        set
    }
}

/// Load and validate `config.toml` from the given config directory.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// If the file does not exist, returns defaults with no warnings (first-run).
/// If the file is unparseable, returns defaults with a warning; the
/// application still starts but the user is informed.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), Vec::new());
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(e) => {
            let err = ConfigError::Io {
                path: config_path.clone(),
                source: e,
            };
            let msg = format!("{err}. Using defaults.");
            tracing::warn!("{}", msg);
            return (AppConfig::default(), vec![msg]);
        }
    };

    let (config, warnings) = parse_config(&content, &config_path);
    tracing::info!(path = %config_path.display(), "Loaded config.toml");
    (config, warnings)
}

/// Validate config.toml `content`; `origin` is only used in messages.
pub fn parse_config(content: &str, origin: &Path) -> (AppConfig, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();

    let raw: RawConfig = match toml::from_str(content) {
        Ok(r) => r,
        Err(e) => {
            let err = ConfigError::TomlParse {
                path: origin.to_path_buf(),
                source: e,
            };
            let msg = format!(
                "{err}. Using defaults. See config.example.toml for the expected format."
            );
            tracing::warn!("{}", msg);
            warnings.push(msg);
            return (AppConfig::default(), warnings);
        }
    };

    // Validate each field against named constants, accumulating all errors.
    let mut config = AppConfig::default();

    // -- Tail: poll_interval_ms --
    if let Some(ms) = raw.tail.poll_interval_ms {
        if (constants::MIN_TAIL_POLL_INTERVAL_MS..=constants::MAX_TAIL_POLL_INTERVAL_MS)
            .contains(&ms)
        {
            config.poll_interval = Duration::from_millis(ms);
        } else {
            let err = ConfigError::ValueOutOfRange {
                field: "tail.poll_interval_ms".to_string(),
                value: ms.to_string(),
                expected: format!(
                    "{}-{}",
                    constants::MIN_TAIL_POLL_INTERVAL_MS,
                    constants::MAX_TAIL_POLL_INTERVAL_MS
                ),
            };
            warnings.push(format!(
                "{err}. Using default ({}).",
                constants::TAIL_POLL_INTERVAL_MS
            ));
        }
    }

    // -- Classify: module --
    if let Some(module) = raw.classify.module {
        let module = module.trim().to_string();
        if module.is_empty() {
            warnings.push("[classify] module is empty. Ignoring.".to_string());
        } else {
            config.module = Some(module);
        }
    }

    // -- Classify: patterns --
    let definitions = raw.classify.patterns;
    if definitions.len() > constants::MAX_USER_PATTERNS {
        warnings.push(format!(
            "[classify] {} patterns defined, maximum is {}. Extra patterns ignored.",
            definitions.len(),
            constants::MAX_USER_PATTERNS,
        ));
    }
    for def in definitions.into_iter().take(constants::MAX_USER_PATTERNS) {
        match LogPattern::new(&def.label, &def.pattern) {
            Ok(p) => config.extra_patterns.push(p),
            Err(e) => warnings.push(format!("[classify] {e}. Pattern ignored.")),
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.clone());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default (info).",
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(
            count = warnings.len(),
            "Config validation produced warnings"
        );
    }

    (config, warnings)
}
