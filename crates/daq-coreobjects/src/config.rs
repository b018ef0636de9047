//! Runtime configuration for the property system using Figment
//!
//! Configuration is loaded from:
//! 1. a TOML file (base configuration)
//! 2. Environment variables (prefixed with `DAQ_COREOBJECTS_`)
//!
//! Every field has a default, so an empty or missing file yields
//! [`CoreObjectsConfig::default`].
//!
//! # Example
//! ```no_run
//! use daq_coreobjects::config::CoreObjectsConfig;
//!
//! let config = CoreObjectsConfig::load_from("config/coreobjects.toml")?;
//! println!("Reference depth limit: {}", config.max_reference_depth);
//! # Ok::<(), daq_coreobjects::CoreObjectsError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use crate::error::{CoreObjectsError, CoreResult};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DAQ_COREOBJECTS_";

/// Limits and behaviour switches shared by property objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreObjectsConfig {
    /// Maximum number of hops followed when resolving a reference property
    /// chain. Longer chains (including cycles) fail with `InvalidState`.
    #[serde(default = "default_max_reference_depth")]
    pub max_reference_depth: usize,

    /// Maximum nesting depth accepted by the expression parser.
    #[serde(default = "default_max_expression_depth")]
    pub max_expression_depth: usize,

    /// Skip nested dispatch of a handler that is already executing.
    #[serde(default = "default_true")]
    pub guard_recursive_handlers: bool,

    /// Dispatch `on_property_value_read` events from value getters.
    #[serde(default = "default_true")]
    pub fire_read_events: bool,
}

fn default_max_reference_depth() -> usize {
    32
}

fn default_max_expression_depth() -> usize {
    64
}

fn default_true() -> bool {
    true
}

impl Default for CoreObjectsConfig {
    fn default() -> Self {
        Self {
            max_reference_depth: default_max_reference_depth(),
            max_expression_depth: default_max_expression_depth(),
            guard_recursive_handlers: true,
            fire_read_events: true,
        }
    }
}

impl CoreObjectsConfig {
    /// Load configuration from a TOML file and `DAQ_COREOBJECTS_*` variables.
    ///
    /// A missing file is not an error; defaults fill every absent key.
    pub fn load_from<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        config.validate()?;
        tracing::debug!(
            path = %path.as_ref().display(),
            max_reference_depth = config.max_reference_depth,
            "Loaded coreobjects configuration"
        );
        Ok(config)
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> CoreResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_reference_depth == 0 {
            return Err(CoreObjectsError::InvalidParameter(
                "max_reference_depth must be at least 1".into(),
            ));
        }
        if self.max_expression_depth == 0 {
            return Err(CoreObjectsError::InvalidParameter(
                "max_expression_depth must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string(self).map_err(|e| CoreObjectsError::InvalidState(e.to_string()))
    }

    /// Shared default instance used by objects created without a type manager.
    pub fn shared_default() -> Arc<Self> {
        static DEFAULT: OnceLock<Arc<CoreObjectsConfig>> = OnceLock::new();
        DEFAULT.get_or_init(|| Arc::new(Self::default())).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CoreObjectsConfig::default();
        assert_eq!(config.max_reference_depth, 32);
        assert_eq!(config.max_expression_depth, 64);
        assert!(config.guard_recursive_handlers);
        assert!(config.fire_read_events);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_reference_depth = 4").unwrap();
        writeln!(file, "fire_read_events = false").unwrap();

        let config = CoreObjectsConfig::load_from(file.path()).unwrap();
        assert_eq!(config.max_reference_depth, 4);
        assert!(!config.fire_read_events);
        assert_eq!(config.max_expression_depth, 64);
    }

    #[test]
    #[serial]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoreObjectsConfig::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CoreObjectsConfig::default());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        std::env::set_var("DAQ_COREOBJECTS_MAX_EXPRESSION_DEPTH", "8");
        let config = CoreObjectsConfig::from_env();
        std::env::remove_var("DAQ_COREOBJECTS_MAX_EXPRESSION_DEPTH");

        assert_eq!(config.unwrap().max_expression_depth, 8);
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = CoreObjectsConfig {
            max_reference_depth: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_rendering() {
        let text = CoreObjectsConfig::default().to_toml_string().unwrap();
        assert!(text.contains("max_reference_depth = 32"));
    }
}
