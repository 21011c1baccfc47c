//! Runtime configuration.
//!
//! Settings come from environment variables, or from a YAML file when a
//! deployment prefers checked-in config. Environment variables:
//!
//! - `TURNSTILE_VIEW_ROOT`: view template root (default `app/views`)
//! - `TURNSTILE_USE_MUTEX`: serialize all dispatches behind one global
//!   mutex (`1`/`true`). Off by default; turn it on when a template engine
//!   or library in the request path is not reentrant.
//! - `TURNSTILE_ERROR_CONTROLLER`: name of the error controller
//!   (default `exceptions`)
//! - `TURNSTILE_DEFAULT_LAYOUT`: fallback layout name (default
//!   `application`)

use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Root directory scanned for view templates.
    pub view_root: PathBuf,
    /// Serialize the entire `handle()` call behind a global mutex.
    pub use_mutex: bool,
    /// Controller name targeted by exception redispatch.
    pub error_controller: String,
    /// Layout name used when neither the controller nor the render options
    /// name one.
    pub default_layout: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            view_root: PathBuf::from("app/views"),
            use_mutex: false,
            error_controller: "exceptions".to_string(),
            default_layout: "application".to_string(),
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    env::var(name)
        .ok()
        .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
}

impl RuntimeConfig {
    /// Load configuration from `TURNSTILE_*` environment variables, falling
    /// back to the defaults for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(root) = env::var("TURNSTILE_VIEW_ROOT") {
            config.view_root = PathBuf::from(root);
        }
        if let Some(flag) = env_flag("TURNSTILE_USE_MUTEX") {
            config.use_mutex = flag;
        }
        if let Ok(name) = env::var("TURNSTILE_ERROR_CONTROLLER") {
            config.error_controller = name;
        }
        if let Ok(name) = env::var("TURNSTILE_DEFAULT_LAYOUT") {
            config.default_layout = name;
        }
        config
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_yaml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.view_root, PathBuf::from("app/views"));
        assert!(!config.use_mutex);
        assert_eq!(config.error_controller, "exceptions");
        assert_eq!(config.default_layout, "application");
    }

    #[test]
    fn test_from_yaml() {
        let config: RuntimeConfig = serde_yaml::from_str(
            "view_root: web/views\nuse_mutex: true\nerror_controller: errors\n",
        )
        .unwrap();
        assert_eq!(config.view_root, PathBuf::from("web/views"));
        assert!(config.use_mutex);
        assert_eq!(config.error_controller, "errors");
        assert_eq!(config.default_layout, "application");
    }
}
