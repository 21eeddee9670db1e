//! Configuration system for kartpad

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{KartpadError, Result};

/// Environment variable that overrides [`PathConfig::filesystem_root`]
pub const FILESYSTEM_ROOT_ENV: &str = "KARTPAD_FILESYSTEM_ROOT";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub playback: PlaybackConfig,
    pub paths: PathConfig,
    pub debug: DebugConfig,
}

/// Ghost playback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Auto transmission for the replayed player
    pub drift_is_auto: bool,
    /// Scan every tuple of a recording before replaying it
    pub validate_on_load: bool,
    /// What the replay session does with a frame that fails validation
    pub invalid_frame_policy: InvalidFramePolicy,
    /// Frames spent in the intro stage before the countdown
    pub intro_duration: u16,
    /// Frames spent in the countdown stage before the race
    pub countdown_duration: u16,
}

/// Handling of frames whose decoded input state is invalid
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum InvalidFramePolicy {
    /// Pass the frame through silently
    Ignore,
    /// Pass the frame through and log a warning
    #[default]
    Warn,
    /// Stop the replay with an error
    Abort,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    /// Root that relative game file paths resolve against
    pub filesystem_root: Option<PathBuf>,
    pub ghosts: PathBuf,
}

/// Debug settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub log_level: LogLevel,
    /// Log every decoded frame at trace level
    pub trace_frames: bool,
}

/// Logging level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_directive(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            drift_is_auto: false,
            validate_on_load: true,
            invalid_frame_policy: InvalidFramePolicy::default(),
            intro_duration: 172,
            countdown_duration: 240,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kartpad");

        Self {
            filesystem_root: None,
            ghosts: base.join("ghosts"),
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            trace_frames: false,
        }
    }
}

impl PathConfig {
    /// Resolve a game file path.
    ///
    /// A leading `/` is ignored. The path is joined onto
    /// `KARTPAD_FILESYSTEM_ROOT` when set and non-empty, then onto
    /// `filesystem_root`, and otherwise onto the working directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let env_root = std::env::var_os(FILESYSTEM_ROOT_ENV)
            .filter(|root| !root.is_empty())
            .map(PathBuf::from);
        self.resolve_with_root(path.as_ref(), env_root)
    }

    fn resolve_with_root(&self, path: &Path, env_root: Option<PathBuf>) -> PathBuf {
        let relative = path.strip_prefix("/").unwrap_or(path);
        let root = env_root
            .or_else(|| self.filesystem_root.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        root.join(relative)
    }
}

impl Config {
    /// Load configuration from the default path, or create it if it doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Self::default();
            info!("Writing default configuration to {}", path.display());
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| KartpadError::FileLoad {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| KartpadError::Config(e.to_string()))
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| KartpadError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kartpad")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.playback.drift_is_auto);
        assert!(config.playback.validate_on_load);
        assert_eq!(config.playback.invalid_frame_policy, InvalidFramePolicy::Warn);
        assert_eq!(config.playback.intro_duration, 172);
        assert_eq!(config.playback.countdown_duration, 240);
        assert_eq!(config.debug.log_level, LogLevel::Info);
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.playback.invalid_frame_policy = InvalidFramePolicy::Abort;
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.playback.invalid_frame_policy, InvalidFramePolicy::Abort);
        assert_eq!(parsed.playback.intro_duration, config.playback.intro_duration);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str("[playback]\ndrift_is_auto = true\n").unwrap();
        assert!(parsed.playback.drift_is_auto);
        assert_eq!(parsed.playback.countdown_duration, 240);
        assert!(!parsed.debug.trace_frames);
    }

    #[test]
    fn test_save_and_load_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.debug.trace_frames = true;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!(loaded.debug.trace_frames);
    }

    #[test]
    fn test_load_logs_config_path() {
        use std::sync::{Arc, Mutex};
        use tracing_subscriber::layer::{Context, SubscriberExt};
        use tracing_subscriber::Layer;

        #[derive(Clone, Default)]
        struct Levels(Arc<Mutex<Vec<tracing::Level>>>);

        impl<S: tracing::Subscriber> Layer<S> for Levels {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
                self.0.lock().unwrap().push(*event.metadata().level());
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();

        let levels = Levels::default();
        let subscriber = tracing_subscriber::registry().with(levels.clone());
        tracing::subscriber::with_default(subscriber, || Config::load_from(&path).unwrap());

        assert_eq!(*levels.0.lock().unwrap(), vec![tracing::Level::DEBUG]);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, KartpadError::FileLoad { .. }));
    }

    #[test]
    fn test_resolve_paths() {
        let paths = PathConfig {
            filesystem_root: Some(PathBuf::from("/data/game")),
            ghosts: PathBuf::from("ghosts"),
        };

        assert_eq!(
            paths.resolve_with_root(Path::new("/Race/Course/ghost.bin"), None),
            PathBuf::from("/data/game/Race/Course/ghost.bin")
        );
        assert_eq!(
            paths.resolve_with_root(Path::new("ghost.bin"), Some(PathBuf::from("/env"))),
            PathBuf::from("/env/ghost.bin")
        );

        let no_root = PathConfig {
            filesystem_root: None,
            ..paths
        };
        assert_eq!(
            no_root.resolve_with_root(Path::new("/ghost.bin"), None),
            PathBuf::from("./ghost.bin")
        );
    }
}
