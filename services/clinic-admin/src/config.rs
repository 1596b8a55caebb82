//! Configuration types and loading
//!
//! Precedence: env vars > config file > defaults. The file is optional; a
//! missing file means defaults. Tokens never live here, they go to the
//! credentials file named by `session.credentials_path`.

use clinic_auth::{BASE_URL_ENV, DEFAULT_BASE_URL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "clinic-admin.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub session: SessionConfig,
}

/// Remote API settings. Request timeouts are left to the HTTP client's
/// defaults.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// Local session persistence
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub credentials_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

/// `$HOME/.clinic-admin/credentials.json`, or relative to the working
/// directory when `HOME` is unset.
fn default_credentials_path() -> PathBuf {
    let base = std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default();
    base.join(".clinic-admin").join("credentials.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    pub fn load(path: &Path) -> common::Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents)?
        } else {
            debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };

        // An empty override is treated as unset
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            config.api.base_url = url.trim().to_string();
        }

        validate_base_url(&config.api.base_url)?;

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}

fn validate_base_url(url: &str) -> common::Result<()> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));
    match rest {
        None => Err(common::Error::BaseUrl {
            url: url.to_string(),
            reason: "must start with http:// or https://".into(),
        }),
        Some(host) if host.trim_end_matches('/').is_empty() => Err(common::Error::BaseUrl {
            url: url.to_string(),
            reason: "missing host".into(),
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that mutate environment variables.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("clinic-admin.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_full_config() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(BASE_URL_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[api]
base_url = "https://api.clinic.example"

[session]
credentials_path = "/tmp/clinic/credentials.json"
"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, "https://api.clinic.example");
        assert_eq!(
            config.session.credentials_path,
            PathBuf::from("/tmp/clinic/credentials.json")
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(BASE_URL_ENV) };

        let config = Config::load(Path::new("/nonexistent/clinic-admin.toml")).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert!(config.session.credentials_path.ends_with(".clinic-admin/credentials.json"));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(BASE_URL_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[session]\ncredentials_path = \"creds.json\"\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.session.credentials_path, PathBuf::from("creds.json"));
    }

    #[test]
    fn test_env_overrides_file() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"http://file.example\"\n");

        unsafe { set_env(BASE_URL_ENV, "https://env.example") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(BASE_URL_ENV) };

        assert_eq!(config.api.base_url, "https://env.example");
    }

    #[test]
    fn test_empty_env_override_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"http://file.example\"\n");

        unsafe { set_env(BASE_URL_ENV, "  ") };
        let config = Config::load(&path).unwrap();
        unsafe { remove_env(BASE_URL_ENV) };

        assert_eq!(config.api.base_url, "http://file.example");
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(BASE_URL_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\nbase_url = \"localhost:3000\"\n");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, common::Error::BaseUrl { .. }), "got: {err:?}");
    }

    #[test]
    fn test_rejects_base_url_without_host() {
        assert!(validate_base_url("https://").is_err());
        assert!(validate_base_url("http://localhost:3000/").is_ok());
    }

    #[test]
    fn test_stale_timeout_key_is_ignored() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { remove_env(BASE_URL_ENV) };
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[api]\ntimeout_secs = 0\n");

        let config = Config::load(&path).unwrap();
        assert_eq!(config.api.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_invalid_toml() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "not valid {{{{ toml");

        assert!(matches!(
            Config::load(&path).unwrap_err(),
            common::Error::Toml(_)
        ));
    }

    #[test]
    fn test_resolve_path_prefers_cli() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/etc/clinic-admin/env.toml") };
        assert_eq!(
            Config::resolve_path(Some(Path::new("/cli.toml"))),
            PathBuf::from("/cli.toml")
        );
        assert_eq!(
            Config::resolve_path(None),
            PathBuf::from("/etc/clinic-admin/env.toml")
        );
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(Config::resolve_path(None), PathBuf::from(DEFAULT_CONFIG_FILE));
    }
}
