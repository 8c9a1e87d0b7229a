//! Loader configuration.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI
//! overrides. The file is TOML; environment variables use the `LANDING_LOADER_` prefix
//! (`LANDING_LOADER_LANDING_ZONE`, `LANDING_LOADER_CATALOG`, ...).

use std::path::{Component, Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::catalog::Namespace;
use crate::error::{LoaderError, LoaderResult};
use crate::pipeline::Severity;

/// Environment variable prefix for configuration keys.
pub const ENV_PREFIX: &str = "LANDING_LOADER_";

/// Config file picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "landing-loader.toml";

/// Settings for one invocation. Fixed once the invocation starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Directory scanned for new files.
    pub landing_zone: PathBuf,
    /// Directory processed files are moved to, keeping their relative path.
    pub archive_zone: PathBuf,
    /// First namespace level of destination tables.
    pub catalog: String,
    /// Second namespace level of destination tables.
    pub schema: String,
    /// Base directory for per-table schema tracking.
    pub checkpoint_root: PathBuf,
    /// Root of the local warehouse.
    pub warehouse: PathBuf,
    /// List the landing zone recursively.
    pub recursive: bool,
    /// Failures at or above this severity are raised as alerts.
    pub alert_at_or_above: Severity,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            landing_zone: PathBuf::from("landing-zone"),
            archive_zone: PathBuf::from("archive-zone"),
            catalog: "entity_resolution_dev".to_string(),
            schema: "bronze".to_string(),
            checkpoint_root: PathBuf::from("/tmp/autoloader/checkpoints"),
            warehouse: PathBuf::from("warehouse"),
            recursive: false,
            alert_at_or_above: Severity::Critical,
        }
    }
}

impl LoaderConfig {
    /// The namespace destination tables live in.
    pub fn namespace(&self) -> Namespace {
        Namespace::new(&self.catalog, &self.schema)
    }

    /// Reject settings that cannot produce a safe run.
    pub fn validate(&self) -> LoaderResult<()> {
        validate_identifier("catalog", &self.catalog)?;
        validate_identifier("schema", &self.schema)?;

        if self.landing_zone == self.archive_zone {
            return Err(config_err(format!(
                "landing_zone and archive_zone are the same directory ({})",
                self.landing_zone.display()
            )));
        }
        if self.recursive && self.archive_zone.starts_with(&self.landing_zone) {
            return Err(config_err(format!(
                "archive_zone ({}) is inside the recursively listed landing_zone ({})",
                self.archive_zone.display(),
                self.landing_zone.display()
            )));
        }
        Ok(())
    }
}

/// Values that override every other configuration layer. `None` leaves a key alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landing_zone: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_zone: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_at_or_above: Option<Severity>,
}

/// Load configuration.
///
/// Priority (highest to lowest):
/// 1. `overrides`
/// 2. Environment variables (prefixed with `LANDING_LOADER_`)
/// 3. `file`, or `./landing-loader.toml` when `file` is `None` and it exists
/// 4. Built-in defaults
///
/// An explicitly named file must exist. The result is validated.
pub fn load_config(file: Option<&Path>, overrides: &ConfigOverrides) -> LoaderResult<LoaderConfig> {
    let mut figment = Figment::from(Serialized::defaults(LoaderConfig::default()));

    match file {
        Some(path) => {
            if !path.is_file() {
                return Err(config_err(format!("config file not found: {}", path.display())));
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let local = Path::new(DEFAULT_CONFIG_FILE);
            if local.is_file() {
                figment = figment.merge(Toml::file(local));
            }
        }
    }

    figment = figment
        .merge(Env::prefixed(ENV_PREFIX))
        .merge(Serialized::defaults(overrides));

    let config: LoaderConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Check that `value` is one plain path segment, usable as a catalog, schema or table name.
pub fn validate_identifier(key: &str, value: &str) -> LoaderResult<()> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if value.trim().is_empty() || !single_normal || value.contains(['/', '\\']) {
        return Err(config_err(format!("{key} must be a single name, got '{value}'")));
    }
    Ok(())
}

fn config_err(message: String) -> LoaderError {
    LoaderError::Config { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        LoaderConfig::default().validate().unwrap();
        assert_eq!(
            LoaderConfig::default().namespace().to_string(),
            "entity_resolution_dev.bronze"
        );
    }

    #[test]
    fn same_landing_and_archive_is_rejected() {
        let cfg = LoaderConfig {
            archive_zone: PathBuf::from("landing-zone"),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn archive_inside_recursive_landing_is_rejected() {
        let cfg = LoaderConfig {
            landing_zone: PathBuf::from("/data/in"),
            archive_zone: PathBuf::from("/data/in/archive"),
            recursive: true,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let flat = LoaderConfig {
            recursive: false,
            ..cfg
        };
        flat.validate().unwrap();
    }

    #[test]
    fn path_like_namespace_names_are_rejected() {
        for bad in ["", "..", "a/b", "."] {
            let cfg = LoaderConfig {
                schema: bad.to_string(),
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "accepted schema '{bad}'");
        }
    }

    #[test]
    fn table_names_must_be_single_segments() {
        validate_identifier("table", "edm_entity").unwrap();
        for bad in ["../x", "x/../../y", "..", "a\\b", "  "] {
            let err = validate_identifier("table", bad).unwrap_err();
            assert!(err.to_string().contains("table must be a single name"), "{err}");
        }
    }

    #[test]
    fn file_env_and_overrides_layer_in_order() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "loader.toml",
                r#"
                landing_zone = "/srv/landing"
                archive_zone = "/srv/archive"
                catalog = "from_file"
                schema = "silver"
                "#,
            )?;
            jail.set_env("LANDING_LOADER_CATALOG", "from_env");
            jail.set_env("LANDING_LOADER_RECURSIVE", "true");

            let overrides = ConfigOverrides {
                schema: Some("gold".to_string()),
                ..Default::default()
            };
            let cfg = load_config(Some(Path::new("loader.toml")), &overrides)
                .map_err(|e| e.to_string())?;

            assert_eq!(cfg.landing_zone, PathBuf::from("/srv/landing"));
            assert_eq!(cfg.catalog, "from_env");
            assert_eq!(cfg.schema, "gold");
            assert!(cfg.recursive);
            assert_eq!(cfg.alert_at_or_above, Severity::Critical);
            Ok(())
        });
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = load_config(Some(Path::new("/definitely/not/here.toml")), &ConfigOverrides::default())
            .unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
