//! Now-playing settings stored in pmoconfig
//!
//! Provides the [`NowPlayingConfigExt`] trait, which adds station management
//! and transport settings to `pmoconfig::Config`. Everything lives under the
//! `nowplaying` key:
//!
//! ```yaml
//! nowplaying:
//!   request_timeout_secs: 10
//!   user_agent: "Mozilla/5.0 ..."
//!   stations:
//!     - name: jazz
//!       adapter: shoutcast2
//!       url: http://jazz.example:8000
//!       mount: "1"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pmoconfig::get_config;
//! use pmonowplaying::{Adapter, NowPlayingConfigExt};
//!
//! # async fn example() -> pmonowplaying::Result<()> {
//! let config = get_config();
//! let adapter = config.build_nowplaying_adapter("jazz")?;
//! let np = adapter.now_playing(None, false).await;
//! println!("{}", np.current_song.text);
//! # Ok(())
//! # }
//! ```

use crate::adapter::Adapter;
use crate::error::Error;
use crate::factory::Station;
use crate::http::{DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use anyhow::Result;
use pmoconfig::Config;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT_PATH: &[&str] = &["nowplaying", "request_timeout_secs"];
const USER_AGENT_PATH: &[&str] = &["nowplaying", "user_agent"];
const STATIONS_PATH: &[&str] = &["nowplaying", "stations"];

/// Extension trait for now-playing settings in pmoconfig
///
/// Getters persist the default value when the key is missing.
pub trait NowPlayingConfigExt {
    /// Per-request timeout in seconds (default: 10)
    fn get_nowplaying_request_timeout_secs(&self) -> Result<u64>;

    fn set_nowplaying_request_timeout_secs(&self, secs: u64) -> Result<()>;

    /// User-Agent sent to servers (default: a browser string)
    fn get_nowplaying_user_agent(&self) -> Result<String>;

    fn set_nowplaying_user_agent(&self, user_agent: &str) -> Result<()>;

    /// Configured stations, in file order
    fn get_nowplaying_stations(&self) -> Result<Vec<Station>>;

    fn set_nowplaying_stations(&self, stations: &[Station]) -> Result<()>;

    /// Station with the given name
    fn get_nowplaying_station(&self, name: &str) -> Result<Option<Station>>;

    /// Add a station, replacing any station with the same name
    fn add_nowplaying_station(&self, station: Station) -> Result<()>;

    /// Remove a station by name
    ///
    /// # Returns
    ///
    /// `true` if a station was removed.
    fn remove_nowplaying_station(&self, name: &str) -> Result<bool>;

    /// Build the adapter for a configured station with the configured
    /// timeout and User-Agent
    ///
    /// # Errors
    ///
    /// [`Error::StationNotFound`] for an unknown name, [`Error::Config`] for
    /// unreadable settings.
    fn build_nowplaying_adapter(&self, name: &str) -> crate::Result<Arc<dyn Adapter>>;
}

impl NowPlayingConfigExt for Config {
    fn get_nowplaying_request_timeout_secs(&self) -> Result<u64> {
        let configured = match self.get_value(TIMEOUT_PATH) {
            Ok(Value::Number(n)) => n.as_u64().filter(|secs| *secs > 0),
            _ => None,
        };

        match configured {
            Some(secs) => Ok(secs),
            None => {
                self.set_nowplaying_request_timeout_secs(DEFAULT_REQUEST_TIMEOUT_SECS)?;
                Ok(DEFAULT_REQUEST_TIMEOUT_SECS)
            }
        }
    }

    fn set_nowplaying_request_timeout_secs(&self, secs: u64) -> Result<()> {
        self.set_value(TIMEOUT_PATH, Value::Number(secs.into()))
    }

    fn get_nowplaying_user_agent(&self) -> Result<String> {
        match self.get_value(USER_AGENT_PATH) {
            Ok(Value::String(ua)) if !ua.trim().is_empty() => Ok(ua),
            _ => {
                self.set_nowplaying_user_agent(DEFAULT_USER_AGENT)?;
                Ok(DEFAULT_USER_AGENT.to_string())
            }
        }
    }

    fn set_nowplaying_user_agent(&self, user_agent: &str) -> Result<()> {
        self.set_value(USER_AGENT_PATH, Value::String(user_agent.to_string()))
    }

    fn get_nowplaying_stations(&self) -> Result<Vec<Station>> {
        match self.get_value(STATIONS_PATH) {
            Ok(Value::Null) => Ok(Vec::new()),
            Ok(value) => Ok(serde_yaml::from_value(value)?),
            Err(_) => {
                self.set_nowplaying_stations(&[])?;
                Ok(Vec::new())
            }
        }
    }

    fn set_nowplaying_stations(&self, stations: &[Station]) -> Result<()> {
        self.set_typed(STATIONS_PATH, &stations)
    }

    fn get_nowplaying_station(&self, name: &str) -> Result<Option<Station>> {
        Ok(self
            .get_nowplaying_stations()?
            .into_iter()
            .find(|station| station.name == name))
    }

    fn add_nowplaying_station(&self, station: Station) -> Result<()> {
        let mut stations = self.get_nowplaying_stations()?;
        match stations.iter_mut().find(|s| s.name == station.name) {
            Some(existing) => *existing = station,
            None => stations.push(station),
        }
        self.set_nowplaying_stations(&stations)
    }

    fn remove_nowplaying_station(&self, name: &str) -> Result<bool> {
        let mut stations = self.get_nowplaying_stations()?;
        let before = stations.len();
        stations.retain(|station| station.name != name);

        if stations.len() == before {
            return Ok(false);
        }
        self.set_nowplaying_stations(&stations)?;
        Ok(true)
    }

    fn build_nowplaying_adapter(&self, name: &str) -> crate::Result<Arc<dyn Adapter>> {
        let station = self
            .get_nowplaying_station(name)?
            .ok_or_else(|| Error::StationNotFound(name.to_string()))?;

        let timeout = self.get_nowplaying_request_timeout_secs()?;
        let user_agent = self.get_nowplaying_user_agent()?;

        station
            .builder()
            .timeout(Duration::from_secs(timeout))
            .user_agent(user_agent)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::AdapterType;

    fn config(yaml: &str) -> Config {
        Config::from_yaml_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config("");
        assert_eq!(
            config.get_nowplaying_request_timeout_secs().unwrap(),
            DEFAULT_REQUEST_TIMEOUT_SECS
        );
        assert_eq!(config.get_nowplaying_user_agent().unwrap(), DEFAULT_USER_AGENT);
        assert!(config.get_nowplaying_stations().unwrap().is_empty());

        // The default user agent was persisted
        assert!(matches!(
            config.get_value(USER_AGENT_PATH),
            Ok(Value::String(_))
        ));
    }

    #[test]
    fn test_invalid_timeout_falls_back_to_default() {
        let config = config("nowplaying:\n  request_timeout_secs: soon\n");
        assert_eq!(
            config.get_nowplaying_request_timeout_secs().unwrap(),
            DEFAULT_REQUEST_TIMEOUT_SECS
        );

        config.set_nowplaying_request_timeout_secs(3).unwrap();
        assert_eq!(config.get_nowplaying_request_timeout_secs().unwrap(), 3);
    }

    #[test]
    fn test_stations_from_yaml() {
        let config = config(
            r#"
nowplaying:
  stations:
    - name: rock
      adapter: icecast
      url: http://rock.example:8000
      mount: /live
    - name: oldies
      adapter: shoutcast1
      url: http://oldies.example:8000
"#,
        );

        let stations = config.get_nowplaying_stations().unwrap();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].adapter, AdapterType::Icecast);
        assert_eq!(stations[0].mount.as_deref(), Some("/live"));

        let oldies = config.get_nowplaying_station("oldies").unwrap();
        assert_eq!(oldies.map(|s| s.adapter), Some(AdapterType::Shoutcast1));
        assert!(config.get_nowplaying_station("jazz").unwrap().is_none());
    }

    #[test]
    fn test_add_replace_remove_station() {
        let config = config("");

        config
            .add_nowplaying_station(Station::new("jazz", AdapterType::Shoutcast2, "http://a:8000"))
            .unwrap();
        config
            .add_nowplaying_station(
                Station::new("jazz", AdapterType::Shoutcast2, "http://b:8000").with_mount("2"),
            )
            .unwrap();

        let stations = config.get_nowplaying_stations().unwrap();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].url, "http://b:8000");

        assert!(config.remove_nowplaying_station("jazz").unwrap());
        assert!(!config.remove_nowplaying_station("jazz").unwrap());
        assert!(config.get_nowplaying_stations().unwrap().is_empty());
    }

    #[test]
    fn test_build_nowplaying_adapter() {
        let config = config("");
        config
            .add_nowplaying_station(
                Station::new("rock", AdapterType::Icecast, "http://rock.example:8000")
                    .with_admin(None, "hackme"),
            )
            .unwrap();

        let adapter = config.build_nowplaying_adapter("rock").unwrap();
        assert_eq!(adapter.adapter_type(), AdapterType::Icecast);

        assert!(matches!(
            config.build_nowplaying_adapter("missing"),
            Err(Error::StationNotFound(_))
        ));
    }
}
