//! Configuration loading and API-key resolution

use crate::{Error, Result};
use std::path::PathBuf;
use tracing::debug;

/// Synthesis API key resolution, following the priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`api_key` key)
///
/// Returns `Err(Config)` when no source yields a key; callers that can run
/// without the networked synthesis path may treat that as a soft failure.
pub fn resolve_api_key(cli_arg: Option<&str>, env_var_name: &str) -> Result<String> {
    // Priority 1: Command-line argument
    if let Some(key) = cli_arg {
        if !key.is_empty() {
            return Ok(key.to_string());
        }
    }

    // Priority 2: Environment variable
    if let Ok(key) = std::env::var(env_var_name) {
        if !key.is_empty() {
            debug!("Resolved API key from ${}", env_var_name);
            return Ok(key);
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Some(key) = read_toml_key(&config_path, "api_key") {
            debug!("Resolved API key from {}", config_path.display());
            return Ok(key);
        }
    }

    Err(Error::Config(format!(
        "No synthesis API key found (checked CLI argument, ${}, config file)",
        env_var_name
    )))
}

/// Read a single string key from a TOML file, if present
pub fn read_toml_key(path: &PathBuf, key: &str) -> Option<String> {
    let toml_content = std::fs::read_to_string(path).ok()?;
    let config = toml::from_str::<toml::Value>(&toml_content).ok()?;
    config.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

/// Locate the configuration file for the platform
///
/// Looks for `lectern/config.toml` under the user config directory, falling
/// back to `/etc/lectern/config.toml` on Linux.
pub fn find_config_file() -> Result<PathBuf> {
    if let Some(user_config) = dirs::config_dir().map(|d| d.join("lectern").join("config.toml")) {
        if user_config.exists() {
            return Ok(user_config);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/lectern/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_arg_takes_priority() {
        let key = resolve_api_key(Some("cli-key"), "LECTERN_TEST_KEY_UNSET").unwrap();
        assert_eq!(key, "cli-key");
    }

    #[test]
    fn test_empty_cli_arg_is_skipped() {
        // An empty CLI value should not shadow the environment
        std::env::set_var("LECTERN_TEST_KEY_A", "env-key");
        let key = resolve_api_key(Some(""), "LECTERN_TEST_KEY_A").unwrap();
        assert_eq!(key, "env-key");
        std::env::remove_var("LECTERN_TEST_KEY_A");
    }

    #[test]
    fn test_missing_everywhere_is_config_error() {
        let result = resolve_api_key(None, "LECTERN_TEST_KEY_MISSING");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_read_toml_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "api_key = \"toml-key\"\nport = 5750").unwrap();

        assert_eq!(read_toml_key(&path, "api_key"), Some("toml-key".to_string()));
        assert_eq!(read_toml_key(&path, "missing"), None);
    }
}
