//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file; runtime settings that
//! supervisors change live in the database `settings` table.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sampling::{check_bounds, DEFAULT_INTERVAL_MINUTES, DEFAULT_MAX_SUBGROUPS};
use crate::shift::ShiftPattern;
use crate::tolerance::ToleranceSpec;
use crate::{Error, Result};

/// Config file name looked up inside the root folder
pub const CONFIG_FILE_NAME: &str = "qv.toml";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "qv.db";

pub const DEFAULT_PORT: u16 = 5780;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QvConfig {
    /// Folder holding the database and export template
    pub root_folder: Option<PathBuf>,
    pub port: u16,
    pub bind_address: String,
    pub logging: LoggingConfig,
    pub sampling: SamplingDefaults,
    pub shifts: ShiftConfig,
    pub tolerances: Vec<ToleranceSpec>,
    pub export: ExportConfig,
}

impl Default for QvConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: DEFAULT_PORT,
            bind_address: "127.0.0.1".to_string(),
            logging: LoggingConfig::default(),
            sampling: SamplingDefaults::default(),
            shifts: ShiftConfig::default(),
            tolerances: Vec::new(),
            export: ExportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Seed values for the runtime sampling settings
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SamplingDefaults {
    pub interval_minutes: i64,
    pub max_subgroups: i64,
}

impl Default for SamplingDefaults {
    fn default() -> Self {
        Self {
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_subgroups: DEFAULT_MAX_SUBGROUPS as i64,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub pattern: ShiftPattern,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Cell layout file, relative paths resolve against the root folder
    pub template: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            template: PathBuf::from("report_template.toml"),
        }
    }
}

impl QvConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: QvConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_bounds(self.sampling.interval_minutes, self.sampling.max_subgroups)
            .map_err(|e| Error::Config(format!("[sampling] {}", e)))?;
        for spec in &self.tolerances {
            if spec.min > spec.max {
                return Err(Error::Config(format!(
                    "Tolerance for '{}' has min {} above max {}",
                    spec.field, spec.min, spec.max
                )));
            }
        }
        Ok(())
    }

    /// Export template path, resolved against the root folder when relative
    pub fn export_template_path(&self, root_folder: &Path) -> PathBuf {
        if self.export.template.is_absolute() {
            self.export.template.clone()
        } else {
            root_folder.join(&self.export.template)
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config: Option<&QvConfig>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(root) = config.and_then(|c| c.root_folder.clone()) {
        return root;
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("qv"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\qv"))
    } else {
        // ~/.local/share/qv (or /var/lib/qv for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("qv"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/qv"))
    }
}

/// Locate the config file: explicit path, then `<root>/qv.toml`, then the
/// user config directory
pub fn locate_config_file(explicit: Option<&Path>, root_hint: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let candidates = [
        root_hint.map(|r| r.join(CONFIG_FILE_NAME)),
        dirs::config_dir().map(|d| d.join("qv").join(CONFIG_FILE_NAME)),
    ];
    candidates.into_iter().flatten().find(|p| p.exists())
}

/// Create the root folder if needed
pub fn ensure_root_folder(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

pub fn database_path(root: &Path) -> PathBuf {
    root.join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = QvConfig::from_toml("").unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.sampling.interval_minutes, 120);
        assert_eq!(config.sampling.max_subgroups, 6);
        assert_eq!(config.shifts.pattern, ShiftPattern::Rotating);
        assert!(config.tolerances.is_empty());
    }

    #[test]
    fn test_full_toml() {
        let config = QvConfig::from_toml(
            r#"
            root_folder = "/srv/qv"
            port = 9000

            [logging]
            level = "debug"

            [sampling]
            interval_minutes = 60
            max_subgroups = 8

            [shifts]
            pattern = "twelve_hour"

            [[tolerances]]
            field = "line_pressure"
            min = 4.0
            max = 6.0
            unit = "bar"

            [export]
            template = "/etc/qv/layout.toml"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/qv")));
        assert_eq!(config.port, 9000);
        assert_eq!(config.sampling.max_subgroups, 8);
        assert_eq!(config.shifts.pattern, ShiftPattern::TwelveHour);
        assert_eq!(config.tolerances[0].max, 6.0);
        assert_eq!(
            config.export_template_path(Path::new("/srv/qv")),
            PathBuf::from("/etc/qv/layout.toml")
        );
    }

    #[test]
    fn test_inverted_tolerance_rejected() {
        let err = QvConfig::from_toml(
            r#"
            [[tolerances]]
            field = "uv_flow_value"
            min = 40.0
            max = 30.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_out_of_range_sampling_seed_rejected() {
        let err = QvConfig::from_toml(
            r#"
            [sampling]
            interval_minutes = 100000000000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = QvConfig::from_toml("[sampling]\nmax_subgroups = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_cli_arg_wins_root_resolution() {
        let config = QvConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let root = resolve_root_folder(
            Some(Path::new("/from/cli")),
            "QV_TEST_ROOT_UNSET_VARIABLE",
            Some(&config),
        );
        assert_eq!(root, PathBuf::from("/from/cli"));

        let root = resolve_root_folder(None, "QV_TEST_ROOT_UNSET_VARIABLE", Some(&config));
        assert_eq!(root, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_relative_template_resolves_under_root() {
        let config = QvConfig::default();
        assert_eq!(
            config.export_template_path(Path::new("/srv/qv")),
            PathBuf::from("/srv/qv/report_template.toml")
        );
    }
}
