//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/hierreg/hierreg.toml`
//! 3. Local config: `<project_dir>/.hierreg.toml`
//! 4. Environment variables: `HIERREG_*` prefix

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::ApplicationError;
use crate::domain::DEFAULT_SORT_KEY_STEP;

/// Unified configuration for hierreg.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Scene document used when no `--scene` is given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_file: Option<PathBuf>,
    /// Spacing of sort keys when moving nodes to the ends or renumbering
    pub sort_key_step: f64,
    /// Print sort keys next to node ids in tree output
    pub show_sort_keys: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scene_file: None,
            sort_key_step: DEFAULT_SORT_KEY_STEP,
            show_sort_keys: false,
        }
    }
}

/// Raw settings for intermediate parsing (`None` = not specified, inherit).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub scene_file: Option<PathBuf>,
    pub sort_key_step: Option<f64>,
    pub show_sort_keys: Option<bool>,
}

/// Get the XDG config directory for hierreg.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "hierreg").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("hierreg.toml"))
}

/// Get the path to the local config file in a project directory.
pub fn local_config_path(project_dir: &Path) -> PathBuf {
    project_dir.join(".hierreg.toml")
}

/// Expand `~`, `$VAR` and `${VAR}`; unexpandable input is returned unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    ///
    /// A relative `scene_file` is resolved against `base`, the directory of
    /// the file the overlay came from.
    fn merge_with(&self, overlay: &RawSettings, base: Option<&Path>) -> Self {
        let scene_file = overlay
            .scene_file
            .as_ref()
            .map(|p| {
                let expanded = PathBuf::from(expand_env_vars(&p.to_string_lossy()));
                match base {
                    Some(dir) if expanded.is_relative() => dir.join(expanded),
                    _ => expanded,
                }
            })
            .or_else(|| self.scene_file.clone());

        Self {
            scene_file,
            sort_key_step: overlay.sort_key_step.unwrap_or(self.sort_key_step),
            show_sort_keys: overlay.show_sort_keys.unwrap_or(self.show_sort_keys),
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `project_dir` - Optional directory holding a local `.hierreg.toml`
    ///
    /// # Errors
    /// Unreadable or malformed config files, unparsable `HIERREG_*` values,
    /// and a `sort_key_step` that is not finite and positive.
    pub fn load(project_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        // 1. Start with defaults
        let mut current = Self::default();

        // 2. Global config
        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                debug!("global config: {}", global_path.display());
                let raw = load_raw_settings(&global_path)?;
                current = current.merge_with(&raw, None);
            }
        }

        // 3. Local config, relative paths resolved against its directory
        if let Some(dir) = project_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                debug!("local config: {}", local_path.display());
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw, Some(dir));
            }
        }

        // 4. Environment variables
        current = Self::apply_env_overrides(current)?;

        current.validate()?;
        Ok(current)
    }

    /// Apply HIERREG_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("HIERREG")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(config_err)?;

        if let Some(val) = optional(config.get_string("scene_file"))? {
            settings.scene_file = Some(PathBuf::from(expand_env_vars(&val)));
        }
        if let Some(val) = optional(config.get_float("sort_key_step"))? {
            settings.sort_key_step = val;
        }
        if let Some(val) = optional(config.get_bool("show_sort_keys"))? {
            settings.show_sort_keys = val;
        }

        Ok(settings)
    }

    fn validate(&self) -> Result<(), ApplicationError> {
        if !(self.sort_key_step.is_finite() && self.sort_key_step > 0.0) {
            return Err(ApplicationError::Config {
                message: format!(
                    "sort_key_step must be a positive number, got {}",
                    self.sort_key_step
                ),
            });
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# hierreg configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/hierreg/hierreg.toml
#   Local:  <project_dir>/.hierreg.toml
#   Env:    HIERREG_* environment variables

# Scene document used when --scene is not given
# (relative paths in the local file resolve against its directory)
# scene_file = "scene.toml"

# Spacing of sort keys when a node moves to either end of its siblings
# or when all siblings are renumbered
# sort_key_step = 1.0

# Show sort keys in tree output
# show_sort_keys = false
"#
        .to_string()
    }
}

/// Treat a missing key as "not set" and everything else as an error.
fn optional<T>(result: Result<T, ConfigError>) -> Result<Option<T>, ApplicationError> {
    match result {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_then_step_is_positive_and_no_scene() {
        let settings = Settings::default();
        assert_eq!(settings.sort_key_step, DEFAULT_SORT_KEY_STEP);
        assert!(settings.scene_file.is_none());
        assert!(!settings.show_sort_keys);
    }

    #[test]
    fn given_overlay_when_merged_then_specified_fields_win() {
        let base = Settings::default();
        let overlay = RawSettings {
            scene_file: None,
            sort_key_step: Some(10.0),
            show_sort_keys: None,
        };

        let merged = base.merge_with(&overlay, None);

        assert_eq!(merged.sort_key_step, 10.0);
        assert!(!merged.show_sort_keys);
        assert!(merged.scene_file.is_none());
    }

    #[test]
    fn given_relative_scene_file_when_merged_then_resolved_against_base() {
        let overlay = RawSettings {
            scene_file: Some(PathBuf::from("scene.toml")),
            ..Default::default()
        };

        let merged = Settings::default().merge_with(&overlay, Some(Path::new("/work/project")));

        assert_eq!(
            merged.scene_file,
            Some(PathBuf::from("/work/project/scene.toml"))
        );
    }

    #[test]
    fn given_tilde_in_scene_file_when_merged_then_expands_to_home() {
        let overlay = RawSettings {
            scene_file: Some(PathBuf::from("~/scene.toml")),
            ..Default::default()
        };

        let merged = Settings::default().merge_with(&overlay, Some(Path::new("/ignored")));

        let home = std::env::var("HOME").expect("HOME should be set");
        let scene = merged.scene_file.unwrap();
        assert!(scene.starts_with(&home), "{}", scene.display());
    }

    #[test]
    fn given_zero_step_when_validated_then_config_error() {
        let settings = Settings {
            sort_key_step: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ApplicationError::Config { .. })
        ));
    }

    #[test]
    fn given_template_when_parsed_then_yields_defaults() {
        let raw: RawSettings = toml::from_str(&Settings::template()).unwrap();
        assert!(raw.sort_key_step.is_none());
        assert!(raw.scene_file.is_none());
    }
}
