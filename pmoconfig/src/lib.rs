//! # PMONowPlaying Configuration Module
//!
//! YAML-backed configuration store shared by the PMONowPlaying crates:
//! - An embedded default configuration (`pmonowplaying.yaml`)
//! - Merged with an optional `config.yaml` from the configuration directory
//! - Environment variable overrides (`PMONOWPLAYING_CONFIG__SECTION__KEY=value`)
//! - Path-addressed getters and setters, plain or typed through serde
//! - A lazily loaded process-wide instance
//!
//! Domain crates do not add their settings here; they extend [`Config`] with
//! their own extension traits (see `pmonowplaying::NowPlayingConfigExt`).
//!
//! ## Usage
//!
//! ```no_run
//! use pmoconfig::get_config;
//!
//! let config = get_config();
//! let level = config.get_log_min_level()?;
//! config.set_value(&["host", "logger", "min_level"], "DEBUG".into())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{anyhow, Result};
use dirs::home_dir;
use lazy_static::lazy_static;
use serde::{de::DeserializeOwned, Serialize};
use serde_yaml::{Mapping, Value};
use std::{
    env, fs,
    path::Path,
    sync::{Arc, Mutex},
};
use tracing::{debug, info};

const DEFAULT_CONFIG: &str = include_str!("pmonowplaying.yaml");

lazy_static! {
    static ref CONFIG: Arc<Config> =
        Arc::new(Config::load_config("").expect("Failed to load PMONowPlaying configuration"));
}

const ENV_CONFIG_DIR: &str = "PMONOWPLAYING_CONFIG";
const ENV_PREFIX: &str = "PMONOWPLAYING_CONFIG__";
const CONFIG_DIR_NAME: &str = ".pmonowplaying";
const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_LOG_MIN_LEVEL: &str = "INFO";
const DEFAULT_LOG_ENABLE_CONSOLE: bool = true;

/// Generates a getter/setter pair for a boolean value with a default
macro_rules! impl_bool_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<bool> {
            match self.get_value($path) {
                Ok(Value::Bool(b)) => Ok(b),
                _ => Ok($default),
            }
        }

        pub fn $setter(&self, value: bool) -> Result<()> {
            self.set_value($path, Value::Bool(value))
        }
    };
}

/// Generates a getter/setter pair for a string value with a default
macro_rules! impl_string_config {
    ($getter:ident, $setter:ident, $path:expr, $default:expr) => {
        pub fn $getter(&self) -> Result<String> {
            match self.get_value($path) {
                Ok(Value::String(s)) if !s.is_empty() => Ok(s),
                _ => Ok($default.to_string()),
            }
        }

        pub fn $setter(&self, value: impl Into<String>) -> Result<()> {
            self.set_value($path, Value::String(value.into()))
        }
    };
}

/// Configuration store
///
/// Holds the merged YAML tree behind a mutex so a single instance can be
/// shared between tasks. Every setter persists the whole tree to
/// `config.yaml`, unless the instance is detached (see
/// [`Config::from_yaml_str`]).
#[derive(Debug)]
pub struct Config {
    config_dir: Option<String>,
    path: Option<String>,
    data: Mutex<Value>,
}

impl Clone for Config {
    fn clone(&self) -> Self {
        let data = self.data.lock().unwrap().clone();
        Self {
            config_dir: self.config_dir.clone(),
            path: self.path.clone(),
            data: Mutex::new(data),
        }
    }
}

impl Config {
    fn find_config_dir(directory: &str) -> String {
        if !directory.is_empty() {
            return directory.to_string();
        }

        if let Ok(env_path) = env::var(ENV_CONFIG_DIR) {
            info!(env_var = ENV_CONFIG_DIR, path = %env_path, "Using config directory from env");
            return env_path;
        }

        if Path::new(CONFIG_DIR_NAME).exists() {
            return CONFIG_DIR_NAME.to_string();
        }

        if let Some(home) = home_dir() {
            let home_config = home.join(CONFIG_DIR_NAME);
            if home_config.exists() {
                return home_config.to_string_lossy().to_string();
            }
        }

        CONFIG_DIR_NAME.to_string()
    }

    fn prepare_config_dir(path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(anyhow!("{} is not a directory", path.display()));
        }

        Ok(())
    }

    /// Loads the configuration from a directory
    ///
    /// The directory is searched in the following order:
    /// 1. `directory` if not empty
    /// 2. the `PMONOWPLAYING_CONFIG` environment variable
    /// 3. `.pmonowplaying` in the current directory
    /// 4. `.pmonowplaying` in the user's home directory
    ///
    /// The embedded defaults are merged with `config.yaml` when present,
    /// environment overrides are applied, and the result is written back.
    pub fn load_config(directory: &str) -> Result<Self> {
        let config_dir = Self::find_config_dir(directory);
        Self::prepare_config_dir(Path::new(&config_dir))?;
        info!(config_dir = %config_dir, "Using config directory");

        let path = Path::new(&config_dir)
            .join(CONFIG_FILE_NAME)
            .to_string_lossy()
            .to_string();

        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        match fs::read(&path) {
            Ok(data) => {
                info!(config_file = %path, "Loaded config file");
                let external: Value = serde_yaml::from_slice(&data)?;
                merge_yaml(&mut value, &lower_keys_value(external));
            }
            Err(_) => {
                info!(config_file = %path, "Config file not found, using embedded defaults");
            }
        }

        let mut value = lower_keys_value(value);
        apply_env_overrides(&mut value, env::vars());

        let config = Config {
            config_dir: Some(config_dir),
            path: Some(path),
            data: Mutex::new(value),
        };
        config.save()?;
        Ok(config)
    }

    /// Builds a detached configuration from a YAML document
    ///
    /// The document is merged over the embedded defaults. Nothing is read
    /// from or written to disk and environment overrides are not applied.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG)?;
        if !yaml.trim().is_empty() {
            let external: Value = serde_yaml::from_str(yaml)?;
            merge_yaml(&mut value, &lower_keys_value(external));
        }

        Ok(Config {
            config_dir: None,
            path: None,
            data: Mutex::new(lower_keys_value(value)),
        })
    }

    /// Directory holding `config.yaml`, `None` for a detached configuration
    pub fn directory(&self) -> Option<&str> {
        self.config_dir.as_deref()
    }

    /// Writes the current tree to `config.yaml`
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let yaml = {
            let data = self.data.lock().unwrap();
            serde_yaml::to_string(&*data)?
        };
        fs::write(path, yaml)?;
        debug!(config_file = %path, "Configuration saved");
        Ok(())
    }

    /// Sets the value at `path` (e.g. `&["nowplaying", "stations"]`) and saves
    pub fn set_value(&self, path: &[&str], value: Value) -> Result<()> {
        {
            let mut data = self.data.lock().unwrap();
            set_value_internal(&mut data, path, value)?;
        }
        self.save()
    }

    /// Returns a copy of the value at `path`
    ///
    /// Fails when any segment of the path is missing.
    pub fn get_value(&self, path: &[&str]) -> Result<Value> {
        let data = self.data.lock().unwrap();
        get_value_internal(&data, path)
    }

    /// Removes the value at `path` and saves; a missing path is not an error
    pub fn remove_value(&self, path: &[&str]) -> Result<()> {
        let Some((last, parents)) = path.split_last() else {
            return Ok(());
        };

        {
            let mut data = self.data.lock().unwrap();
            let mut current = &mut *data;
            for key in parents {
                match current {
                    Value::Mapping(map) => match map.get_mut(&Value::String(key.to_lowercase())) {
                        Some(next) => current = next,
                        None => return Ok(()),
                    },
                    _ => return Ok(()),
                }
            }
            if let Value::Mapping(map) = current {
                map.remove(&Value::String(last.to_lowercase()));
            }
        }
        self.save()
    }

    /// Deserializes the value at `path` into `T`
    pub fn get_typed<T: DeserializeOwned>(&self, path: &[&str]) -> Result<T> {
        let value = self.get_value(path)?;
        Ok(serde_yaml::from_value(value)?)
    }

    /// Serializes `value` and stores it at `path`
    pub fn set_typed<T: Serialize>(&self, path: &[&str], value: &T) -> Result<()> {
        self.set_value(path, serde_yaml::to_value(value)?)
    }

    impl_bool_config!(
        get_log_enable_console,
        set_log_enable_console,
        &["host", "logger", "enable_console"],
        DEFAULT_LOG_ENABLE_CONSOLE
    );

    impl_string_config!(
        get_log_min_level,
        set_log_min_level,
        &["host", "logger", "min_level"],
        DEFAULT_LOG_MIN_LEVEL
    );
}

/// Returns the process-wide configuration, loading it on first access
///
/// # Panics
///
/// Panics if the configuration directory cannot be prepared or the YAML is
/// invalid.
pub fn get_config() -> Arc<Config> {
    CONFIG.clone()
}

fn set_value_internal(data: &mut Value, path: &[&str], value: Value) -> Result<()> {
    let Some((first, rest)) = path.split_first() else {
        *data = value;
        return Ok(());
    };

    if data.is_null() {
        *data = Value::Mapping(Mapping::new());
    }

    match data {
        Value::Mapping(map) => {
            let key = Value::String(first.to_lowercase());
            if rest.is_empty() {
                map.insert(key, value);
                Ok(())
            } else {
                let entry = map.entry(key).or_insert(Value::Mapping(Mapping::new()));
                set_value_internal(entry, rest, value)
            }
        }
        _ => Err(anyhow!("Cannot set {}: parent is not a mapping", path.join("."))),
    }
}

fn get_value_internal(data: &Value, path: &[&str]) -> Result<Value> {
    let mut current = data;
    for (i, key) in path.iter().enumerate() {
        match current {
            Value::Mapping(map) => match map.get(&Value::String(key.to_lowercase())) {
                Some(next) => current = next,
                None => return Err(anyhow!("Path {} does not exist", path[..=i].join("."))),
            },
            _ => return Err(anyhow!("Path {} is not a mapping", path[..i].join("."))),
        }
    }
    Ok(current.clone())
}

fn apply_env_overrides(config: &mut Value, vars: impl Iterator<Item = (String, String)>) {
    for (key, value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key_path: Vec<&str> = stripped.split("__").collect();
        if let Err(e) = set_value_internal(config, &key_path, convert_env_value(&value)) {
            tracing::warn!(env_var = %key, error = %e, "Ignoring environment override");
        }
    }
}

fn convert_env_value(value: &str) -> Value {
    serde_yaml::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.to_string()))
}

fn lower_keys_value(value: Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let k = match k {
                        Value::String(s) => Value::String(s.to_lowercase()),
                        other => other,
                    };
                    (k, lower_keys_value(v))
                })
                .collect(),
        ),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(lower_keys_value).collect()),
        _ => value,
    }
}

/// Merges `external` into `default`
///
/// Mappings are merged key by key; scalars and sequences from `external`
/// replace the default.
fn merge_yaml(default: &mut Value, external: &Value) {
    match (default, external) {
        (Value::Mapping(dmap), Value::Mapping(emap)) => {
            for (k, v) in emap {
                match dmap.get_mut(k) {
                    Some(dv) => merge_yaml(dv, v),
                    None => {
                        dmap.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (d, e) => *d = e.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_embedded() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config.get_log_min_level().unwrap(), "INFO");
        assert!(config.get_log_enable_console().unwrap());
        let timeout: u64 = config
            .get_typed(&["nowplaying", "request_timeout_secs"])
            .unwrap();
        assert_eq!(timeout, 10);
    }

    #[test]
    fn test_external_yaml_overrides_defaults() {
        let config = Config::from_yaml_str("Host:\n  Logger:\n    Min_Level: DEBUG\n").unwrap();
        assert_eq!(config.get_log_min_level().unwrap(), "DEBUG");
        // Sibling keys survive the merge
        assert!(config.get_log_enable_console().unwrap());
    }

    #[test]
    fn test_set_and_get_nested_value() {
        let config = Config::from_yaml_str("").unwrap();
        config
            .set_value(&["a", "b", "c"], Value::String("x".into()))
            .unwrap();
        assert_eq!(
            config.get_value(&["A", "b", "C"]).unwrap(),
            Value::String("x".into())
        );
        assert!(config.get_value(&["a", "missing"]).is_err());
    }

    #[test]
    fn test_remove_value() {
        let config = Config::from_yaml_str("").unwrap();
        config.set_value(&["a", "b"], Value::Bool(true)).unwrap();
        config.remove_value(&["a", "b"]).unwrap();
        assert!(config.get_value(&["a", "b"]).is_err());
        config.remove_value(&["nope", "nothing"]).unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut value: Value = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        let vars = vec![
            (
                "PMONOWPLAYING_CONFIG__NOWPLAYING__REQUEST_TIMEOUT_SECS".to_string(),
                "3".to_string(),
            ),
            ("UNRELATED".to_string(), "1".to_string()),
        ];
        apply_env_overrides(&mut value, vars.into_iter());
        let timeout = get_value_internal(&value, &["nowplaying", "request_timeout_secs"]).unwrap();
        assert_eq!(timeout, Value::Number(3.into()));
    }

    #[test]
    fn test_convert_env_value() {
        assert_eq!(convert_env_value("true"), Value::Bool(true));
        assert_eq!(convert_env_value("42"), Value::Number(42.into()));
        assert_eq!(convert_env_value("hello"), Value::String("hello".into()));
    }

    #[test]
    fn test_load_config_persists_file() {
        let dir = tempfile::tempdir().unwrap();
        let dir_str = dir.path().to_string_lossy().to_string();

        let config = Config::load_config(&dir_str).unwrap();
        config.set_log_min_level("WARN").unwrap();

        let reloaded = Config::load_config(&dir_str).unwrap();
        assert_eq!(reloaded.get_log_min_level().unwrap(), "WARN");
        assert!(dir.path().join(CONFIG_FILE_NAME).exists());
    }
}
