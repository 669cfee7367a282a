//! Collision environment configuration – read from a TOML file, overridable
//! from `COLLENV_*` environment variables.
//!
//! Keys use camelCase in the file:
//!
//! ```toml
//! objectNameIndex = 2
//! namespaceDelimiter = "::"
//! meshSourceDirectory = "data/mesh"
//! meshFileExtension = "stl"
//! surfaceAnchorFrameName = "tableTF"
//! useFixedParentFrame = false
//! fixedParentFrameName = "base_link"
//! renewSurfaceEachCycle = true
//! ```
//!
//! Every key is optional; a missing file yields [`CollisionEnvConfig::default`].

use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use collenv_perception::NameClassifier;
use collenv_types::CollisionEnvError;
use serde::{Deserialize, Serialize};

/// Upper bound on the per-frame transform wait.
pub const MAX_TRANSFORM_TIMEOUT_MS: u64 = 500;

/// Configuration for a [`CollisionEnvironment`][crate::CollisionEnvironment]
/// and the `collenv` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollisionEnvConfig {
    /// 1-based token index holding the object name.  A frame is an object
    /// frame iff it has more tokens than this.
    #[serde(default = "default_object_name_index")]
    pub object_name_index: usize,

    /// Promote per-cycle diagnostics from `debug` to `info`.
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_namespace_delimiter")]
    pub namespace_delimiter: String,

    #[serde(default = "default_mesh_source_directory")]
    pub mesh_source_directory: String,

    #[serde(default = "default_mesh_file_extension")]
    pub mesh_file_extension: String,

    /// Frame marking the top of the support surface.
    #[serde(default = "default_surface_anchor_frame_name")]
    pub surface_anchor_frame_name: String,

    #[serde(default)]
    pub use_fixed_parent_frame: bool,

    /// Only read when `use_fixed_parent_frame` is set.
    #[serde(default = "default_fixed_parent_frame_name")]
    pub fixed_parent_frame_name: String,

    #[serde(default = "default_true")]
    pub renew_surface_each_cycle: bool,

    /// Per-frame transform wait bound.
    #[serde(default = "default_transform_timeout_ms")]
    pub transform_timeout_ms: u64,

    /// Delay between cycles of the `collenv` polling loop.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long the in-memory transform buffer keeps a frame that is no
    /// longer published.
    #[serde(default = "default_frame_cache_seconds")]
    pub frame_cache_seconds: f64,
}

fn default_object_name_index() -> usize {
    2
}
fn default_namespace_delimiter() -> String {
    "::".to_string()
}
fn default_mesh_source_directory() -> String {
    "data/mesh".to_string()
}
fn default_mesh_file_extension() -> String {
    "stl".to_string()
}
fn default_surface_anchor_frame_name() -> String {
    "tableTF".to_string()
}
fn default_fixed_parent_frame_name() -> String {
    "base_link".to_string()
}
fn default_true() -> bool {
    true
}
fn default_transform_timeout_ms() -> u64 {
    MAX_TRANSFORM_TIMEOUT_MS
}
fn default_poll_interval_ms() -> u64 {
    1000
}
fn default_frame_cache_seconds() -> f64 {
    10.0
}

impl Default for CollisionEnvConfig {
    fn default() -> Self {
        Self {
            object_name_index: default_object_name_index(),
            debug: false,
            namespace_delimiter: default_namespace_delimiter(),
            mesh_source_directory: default_mesh_source_directory(),
            mesh_file_extension: default_mesh_file_extension(),
            surface_anchor_frame_name: default_surface_anchor_frame_name(),
            use_fixed_parent_frame: false,
            fixed_parent_frame_name: default_fixed_parent_frame_name(),
            renew_surface_each_cycle: true,
            transform_timeout_ms: default_transform_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            frame_cache_seconds: default_frame_cache_seconds(),
        }
    }
}

impl CollisionEnvConfig {
    /// Check the values the collision environment cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::Config`] naming the first offending key.
    pub fn validate(&self) -> Result<(), CollisionEnvError> {
        if self.object_name_index == 0 {
            return Err(CollisionEnvError::Config(
                "objectNameIndex must be at least 1".to_string(),
            ));
        }
        if self.namespace_delimiter.is_empty() {
            return Err(CollisionEnvError::Config(
                "namespaceDelimiter must not be empty".to_string(),
            ));
        }
        if self.mesh_file_extension.is_empty() {
            return Err(CollisionEnvError::Config(
                "meshFileExtension must not be empty".to_string(),
            ));
        }
        if self.surface_anchor_frame_name.is_empty() {
            return Err(CollisionEnvError::Config(
                "surfaceAnchorFrameName must not be empty".to_string(),
            ));
        }
        if self.use_fixed_parent_frame && self.fixed_parent_frame_name.is_empty() {
            return Err(CollisionEnvError::Config(
                "fixedParentFrameName must not be empty when useFixedParentFrame is set"
                    .to_string(),
            ));
        }
        if self.transform_timeout_ms > MAX_TRANSFORM_TIMEOUT_MS {
            return Err(CollisionEnvError::Config(format!(
                "transformTimeoutMs must not exceed {MAX_TRANSFORM_TIMEOUT_MS}"
            )));
        }
        self.frame_cache()?;
        Ok(())
    }

    /// The classifier described by `namespaceDelimiter` and `objectNameIndex`.
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::Config`] when `objectNameIndex` is zero.
    pub fn classifier(&self) -> Result<NameClassifier, CollisionEnvError> {
        let index = NonZeroUsize::new(self.object_name_index).ok_or_else(|| {
            CollisionEnvError::Config("objectNameIndex must be at least 1".to_string())
        })?;
        Ok(NameClassifier::new(self.namespace_delimiter.clone(), index))
    }

    /// The fixed parent frame, when `useFixedParentFrame` is set.
    pub fn fixed_parent(&self) -> Option<&str> {
        self.use_fixed_parent_frame
            .then_some(self.fixed_parent_frame_name.as_str())
    }

    pub fn transform_timeout(&self) -> Duration {
        Duration::from_millis(self.transform_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `frameCacheSeconds` as a [`Duration`].
    ///
    /// # Errors
    ///
    /// Returns [`CollisionEnvError::Config`] unless the value is a positive
    /// number of seconds a [`Duration`] can hold.
    pub fn frame_cache(&self) -> Result<Duration, CollisionEnvError> {
        Duration::try_from_secs_f64(self.frame_cache_seconds)
            .ok()
            .filter(|window| !window.is_zero())
            .ok_or_else(|| {
                CollisionEnvError::Config(
                    "frameCacheSeconds must be a positive, representable number of seconds"
                        .to_string(),
                )
            })
    }
}

/// Parse a configuration from TOML text.
pub fn parse(raw: &str) -> Result<CollisionEnvConfig, CollisionEnvError> {
    toml::from_str(raw).map_err(|e| CollisionEnvError::Config(format!("failed to parse config: {e}")))
}

/// Load the config at `path` as written, without environment overrides.
/// Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<CollisionEnvConfig>, CollisionEnvError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        CollisionEnvError::Config(format!("failed to read config at {}: {e}", path.display()))
    })?;
    parse(&raw).map(Some)
}

/// Load the config at `path` (defaults when missing), apply `COLLENV_*`
/// overrides and validate the result.
pub fn load(path: &Path) -> Result<CollisionEnvConfig, CollisionEnvError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `COLLENV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `COLLENV_OBJECT_NAME_INDEX` | `objectNameIndex` |
/// | `COLLENV_DELIMITER` | `namespaceDelimiter` |
/// | `COLLENV_MESH_SOURCE` | `meshSourceDirectory` |
/// | `COLLENV_FIXED_PARENT` | `fixedParentFrameName`, and sets `useFixedParentFrame` |
/// | `COLLENV_DEBUG` | `debug` (`1` or `true`) |
///
/// Unparsable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut CollisionEnvConfig) {
    if let Ok(v) = std::env::var("COLLENV_OBJECT_NAME_INDEX")
        && let Ok(index) = v.parse::<usize>()
    {
        cfg.object_name_index = index;
    }
    if let Ok(v) = std::env::var("COLLENV_DELIMITER") {
        cfg.namespace_delimiter = v;
    }
    if let Ok(v) = std::env::var("COLLENV_MESH_SOURCE") {
        cfg.mesh_source_directory = v;
    }
    if let Ok(v) = std::env::var("COLLENV_FIXED_PARENT") {
        cfg.use_fixed_parent_frame = true;
        cfg.fixed_parent_frame_name = v;
    }
    if let Ok(v) = std::env::var("COLLENV_DEBUG") {
        cfg.debug = matches!(v.as_str(), "1" | "true");
    }
}

/// Write `cfg` to `path` as pretty TOML, creating parent directories.
pub fn save_to(cfg: &CollisionEnvConfig, path: &Path) -> Result<(), CollisionEnvError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| {
            CollisionEnvError::Config(format!("failed to create config directory: {e}"))
        })?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| CollisionEnvError::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        CollisionEnvError::Config(format!("failed to write config at {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = CollisionEnvConfig::default();
        assert_eq!(cfg.object_name_index, 2);
        assert!(!cfg.debug);
        assert_eq!(cfg.namespace_delimiter, "::");
        assert_eq!(cfg.mesh_source_directory, "data/mesh");
        assert_eq!(cfg.mesh_file_extension, "stl");
        assert_eq!(cfg.surface_anchor_frame_name, "tableTF");
        assert!(!cfg.use_fixed_parent_frame);
        assert_eq!(cfg.fixed_parent_frame_name, "base_link");
        assert!(cfg.renew_surface_each_cycle);
        assert_eq!(cfg.transform_timeout(), Duration::from_millis(500));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn empty_file_parses_to_defaults() {
        assert_eq!(parse("").unwrap(), CollisionEnvConfig::default());
    }

    #[test]
    fn camel_case_keys_are_read() {
        let cfg = parse(
            r#"
            objectNameIndex = 3
            namespaceDelimiter = "/"
            useFixedParentFrame = true
            fixedParentFrameName = "world"
            renewSurfaceEachCycle = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.object_name_index, 3);
        assert_eq!(cfg.namespace_delimiter, "/");
        assert_eq!(cfg.fixed_parent(), Some("world"));
        assert!(!cfg.renew_surface_each_cycle);
        assert_eq!(cfg.mesh_file_extension, "stl");
    }

    #[test]
    fn fixed_parent_ignored_unless_enabled() {
        let cfg = CollisionEnvConfig {
            fixed_parent_frame_name: "world".to_string(),
            ..CollisionEnvConfig::default()
        };
        assert_eq!(cfg.fixed_parent(), None);
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        let err = parse("objectNameIndex = \"two\"").unwrap_err();
        assert!(matches!(err, CollisionEnvError::Config(_)));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let zero_index = CollisionEnvConfig {
            object_name_index: 0,
            ..CollisionEnvConfig::default()
        };
        assert!(zero_index.validate().is_err());
        assert!(zero_index.classifier().is_err());

        let empty_delimiter = CollisionEnvConfig {
            namespace_delimiter: String::new(),
            ..CollisionEnvConfig::default()
        };
        assert!(empty_delimiter.validate().is_err());

        let slow = CollisionEnvConfig {
            transform_timeout_ms: 2_000,
            ..CollisionEnvConfig::default()
        };
        assert!(slow.validate().is_err());

        let no_cache = CollisionEnvConfig {
            frame_cache_seconds: 0.0,
            ..CollisionEnvConfig::default()
        };
        assert!(no_cache.validate().is_err());
    }

    #[test]
    fn classifier_uses_configured_delimiter() {
        let cfg = CollisionEnvConfig {
            namespace_delimiter: "/".to_string(),
            object_name_index: 1,
            ..CollisionEnvConfig::default()
        };
        let classifier = cfg.classifier().unwrap();
        assert_eq!(classifier.object_name("cup/3"), Some("cup"));
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("conf").join("collenv.toml");

        let cfg = CollisionEnvConfig {
            mesh_source_directory: "/opt/meshes".to_string(),
            debug: true,
            ..CollisionEnvConfig::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("missing.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn apply_env_overrides_changes_mesh_source() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("COLLENV_MESH_SOURCE", "/srv/meshes") };
        let mut cfg = CollisionEnvConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.mesh_source_directory, "/srv/meshes");
        unsafe { std::env::remove_var("COLLENV_MESH_SOURCE") };
    }

    #[test]
    fn apply_env_overrides_fixed_parent_enables_override() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("COLLENV_FIXED_PARENT", "world") };
        let mut cfg = CollisionEnvConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.fixed_parent(), Some("world"));
        unsafe { std::env::remove_var("COLLENV_FIXED_PARENT") };
    }

    #[test]
    fn apply_env_overrides_ignores_invalid_index() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { std::env::set_var("COLLENV_OBJECT_NAME_INDEX", "not-a-number") };
        let mut cfg = CollisionEnvConfig::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.object_name_index, 2);
        unsafe { std::env::set_var("COLLENV_OBJECT_NAME_INDEX", "4") };
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.object_name_index, 4);
        unsafe { std::env::remove_var("COLLENV_OBJECT_NAME_INDEX") };
    }

    #[test]
    fn oversized_frame_cache_is_rejected() {
        let cfg = CollisionEnvConfig {
            frame_cache_seconds: 1e30,
            ..CollisionEnvConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(CollisionEnvError::Config(_))));
        assert!(cfg.frame_cache().is_err());

        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            let cfg = CollisionEnvConfig {
                frame_cache_seconds: bad,
                ..CollisionEnvConfig::default()
            };
            assert!(cfg.validate().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn frame_cache_converts_seconds() {
        let cfg = CollisionEnvConfig {
            frame_cache_seconds: 2.5,
            ..CollisionEnvConfig::default()
        };
        assert_eq!(cfg.frame_cache(), Ok(Duration::from_millis(2500)));
    }
}
