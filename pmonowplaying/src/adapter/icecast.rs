//! Icecast 2 adapter
//!
//! With admin credentials the per-mount `/admin/stats` XML is read first and
//! the public `/status-json.xsl` listing is the fallback. The client roster
//! comes from `/admin/listclients` and needs both credentials and a mount.

use super::{
    assemble, fetch_now_playing, mount_path, parse_json, parse_xml, requested, with_fallback,
    Adapter, AdapterType,
};
use crate::error::{Error, Result};
use crate::http::Endpoint;
use crate::listeners::Listeners;
use crate::models::{
    deserialize_optional_count, deserialize_optional_text, parse_count, unique_clients, Client,
    Meta, NowPlaying,
};
use crate::song::{CurrentSong, DEFAULT_DELIMITER};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};
use url::Url;

const ADMIN_STATS_PATH: &str = "/admin/stats";
const STATUS_JSON_PATH: &str = "/status-json.xsl";
const LIST_CLIENTS_PATH: &str = "/admin/listclients";

/// Icecast 2 server
#[derive(Debug, Clone)]
pub struct Icecast {
    endpoint: Endpoint,
}

impl Icecast {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    async fn admin_now_playing(&self, mount: Option<&str>) -> Option<NowPlaying> {
        fetch_now_playing(&self.endpoint, ADMIN_STATS_PATH, &[], |payload| {
            parse_admin_stats(payload, mount)
        })
        .await
    }

    async fn public_now_playing(&self, mount: Option<&str>) -> Option<NowPlaying> {
        let mount_param = mount.map(mount_path);
        let query: Vec<(&str, &str)> = mount_param
            .iter()
            .map(|m| ("mount", m.as_ref()))
            .collect();

        fetch_now_playing(&self.endpoint, STATUS_JSON_PATH, &query, |payload| {
            parse_status_json(payload, mount)
        })
        .await
    }
}

#[async_trait]
impl Adapter for Icecast {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Icecast
    }

    async fn now_playing(&self, mount: Option<&str>, include_clients: bool) -> NowPlaying {
        let mount = requested(mount);

        if !self.endpoint.has_credentials() {
            if include_clients {
                debug!("No admin credentials, client roster not requested");
            }
            return self
                .public_now_playing(mount)
                .await
                .unwrap_or_else(NowPlaying::blank);
        }

        let now_playing = with_fallback(self.admin_now_playing(mount), || {
            self.public_now_playing(mount)
        });

        let clients = match (include_clients, mount) {
            (true, Some(mount)) => Some(self.clients(Some(mount), true)),
            (true, None) => {
                warn!("Client roster needs a mount point, returning result without clients");
                None
            }
            (false, _) => None,
        };

        assemble(now_playing, clients).await
    }

    async fn clients(&self, mount: Option<&str>, unique_only: bool) -> Result<Vec<Client>> {
        if !self.endpoint.has_credentials() {
            return Err(Error::CredentialsRequired(
                "Icecast client listing is an admin page".to_string(),
            ));
        }

        let Some(mount) = requested(mount) else {
            error!("Icecast client listing requires a mount point name");
            return Ok(Vec::new());
        };

        let mount = mount_path(mount);
        let payload = self
            .endpoint
            .get(LIST_CLIENTS_PATH, &[("mount", mount.as_ref())])
            .await?;

        if payload.trim().is_empty() {
            return Ok(Vec::new());
        }

        let clients = parse_list_clients(&payload, &mount).inspect_err(|e| {
            error!(mount = %mount, error = %e, response = %payload, "Could not read client listing");
        })?;

        Ok(if unique_only {
            unique_clients(clients)
        } else {
            clients
        })
    }
}

// ============ /admin/stats ============

#[derive(Debug, Deserialize)]
struct AdminStats {
    #[serde(rename = "source", default)]
    sources: Vec<AdminSource>,
}

#[derive(Debug, Deserialize)]
struct AdminSource {
    #[serde(rename = "@mount", default)]
    mount: String,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    audio_bitrate: Option<String>,
    #[serde(default)]
    bitrate: Option<String>,
    #[serde(default)]
    server_type: Option<String>,
    #[serde(default)]
    listeners: Option<String>,
}

impl AdminSource {
    fn into_now_playing(self) -> NowPlaying {
        let current_song = CurrentSong::new(
            "",
            self.title.as_deref().unwrap_or_default(),
            self.artist.as_deref().unwrap_or_default(),
            DEFAULT_DELIMITER,
        );

        let bitrate = count(&self.audio_bitrate).max(count(&self.bitrate));
        let online = !current_song.text.is_empty();

        NowPlaying::new(
            current_song,
            Listeners::new(count(&self.listeners), None),
            Meta::new(online, u32::try_from(bitrate).ok(), self.server_type),
        )
    }
}

fn count(raw: &Option<String>) -> u64 {
    raw.as_deref().map(parse_count).unwrap_or(0)
}

/// Read the admin statistics page
///
/// A requested mount must be listed; without one every source is
/// aggregated.
fn parse_admin_stats(payload: &str, mount: Option<&str>) -> Result<NowPlaying> {
    let stats: AdminStats = parse_xml(payload)?;

    if stats.sources.is_empty() {
        return Err(Error::parse("remote server has no mount points listed"));
    }

    match mount {
        Some(mount) => {
            let wanted = mount_path(mount);
            stats
                .sources
                .into_iter()
                .find(|source| source.mount == wanted)
                .map(AdminSource::into_now_playing)
                .ok_or_else(|| Error::MountNotFound(wanted.to_string()))
        }
        None => Ok(NowPlaying::aggregate(
            stats.sources.into_iter().map(AdminSource::into_now_playing),
        )),
    }
}

// ============ /status-json.xsl ============

#[derive(Debug, Deserialize)]
struct StatusJson {
    #[serde(default)]
    icestats: Option<IceStatsJson>,
}

#[derive(Debug, Deserialize)]
struct IceStatsJson {
    #[serde(default)]
    source: Option<OneOrMany<SourceJson>>,
}

/// Icecast emits a bare object for a single mount and an array otherwise
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceJson {
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    yp_currently_playing: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    title: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    artist: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    audio_bitrate: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    bitrate: Option<u64>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    server_type: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    listeners: Option<u64>,
    #[serde(default)]
    listenurl: Option<String>,
}

impl SourceJson {
    /// Mount name: the path of the listen URL
    fn mount(&self) -> Option<String> {
        let listenurl = self.listenurl.as_deref()?;
        Url::parse(listenurl).ok().map(|url| url.path().to_string())
    }

    fn into_now_playing(self) -> NowPlaying {
        let current_song = CurrentSong::new(
            self.yp_currently_playing.as_deref().unwrap_or_default(),
            self.title.as_deref().unwrap_or_default(),
            self.artist.as_deref().unwrap_or_default(),
            DEFAULT_DELIMITER,
        );

        let bitrate = self
            .audio_bitrate
            .or(self.bitrate)
            .and_then(|b| u32::try_from(b).ok());
        let online = !current_song.text.is_empty();

        NowPlaying::new(
            current_song,
            Listeners::new(self.listeners.unwrap_or(0), None),
            Meta::new(online, bitrate, self.server_type),
        )
    }
}

/// Icecast writes `"title": -` for a lone hyphen title, which is not JSON
fn repair_status_json(payload: &str) -> String {
    payload.replace("\"title\": -", "\"title\": \" - \"")
}

/// Read the public JSON listing
fn parse_status_json(payload: &str, mount: Option<&str>) -> Result<NowPlaying> {
    let status: StatusJson = parse_json(&repair_status_json(payload))?;

    let sources = status
        .icestats
        .and_then(|stats| stats.source)
        .map(OneOrMany::into_vec)
        .ok_or_else(|| {
            Error::parse("no \"source\" listing; the stream may be hidden or misspelled")
        })?;

    if sources.is_empty() {
        return Err(Error::parse("remote server has no mount points listed"));
    }

    match mount {
        Some(mount) => {
            let wanted = mount_path(mount);
            sources
                .into_iter()
                .find(|source| source.mount().as_deref() == Some(wanted.as_ref()))
                .map(SourceJson::into_now_playing)
                .ok_or_else(|| Error::MountNotFound(wanted.to_string()))
        }
        None => Ok(NowPlaying::aggregate(
            sources.into_iter().map(SourceJson::into_now_playing),
        )),
    }
}

// ============ /admin/listclients ============

#[derive(Debug, Deserialize)]
struct ListClients {
    #[serde(rename = "source", default)]
    sources: Vec<ListClientsSource>,
}

#[derive(Debug, Deserialize)]
struct ListClientsSource {
    #[serde(rename = "listener", default)]
    listeners: Vec<ListenerXml>,
}

#[derive(Debug, Deserialize)]
struct ListenerXml {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "IP", default)]
    ip: String,
    #[serde(rename = "UserAgent", default)]
    user_agent: String,
    #[serde(rename = "Connected", default)]
    connected: String,
}

fn parse_list_clients(payload: &str, mount: &str) -> Result<Vec<Client>> {
    let listing: ListClients = parse_xml(payload)?;

    Ok(listing
        .sources
        .into_iter()
        .flat_map(|source| source.listeners)
        .map(|listener| {
            Client::new(
                listener.id.trim(),
                listener.ip.trim(),
                listener.user_agent.trim(),
                parse_count(&listener.connected),
                Some(mount.to_string()),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_STATS: &str = r#"<?xml version="1.0"?>
<icestats>
  <admin>icemaster@localhost</admin>
  <host>localhost</host>
  <listeners>5</listeners>
  <source mount="/live">
    <artist>Daft Punk</artist>
    <audio_bitrate>128</audio_bitrate>
    <bitrate>128</bitrate>
    <listeners>3</listeners>
    <server_type>audio/mpeg</server_type>
    <title>Around the World</title>
  </source>
  <source mount="/lofi">
    <artist>Nujabes</artist>
    <bitrate>64</bitrate>
    <listeners>2</listeners>
    <server_type>audio/aac</server_type>
    <title>Aruarian Dance & Reflection</title>
  </source>
</icestats>"#;

    const STATUS_JSON_SINGLE: &str = r#"{"icestats":{"admin":"icemaster@localhost","source":{
        "audio_bitrate":"128000","listeners":"4","listenurl":"http://radio.example:8000/live",
        "server_type":"audio/mpeg","title":"Around the World","artist":"Daft Punk"}}}"#;

    const STATUS_JSON_MANY: &str = r#"{"icestats":{"source":[
        {"bitrate":128,"listeners":4,"listenurl":"http://radio.example:8000/live",
         "server_type":"audio/mpeg","yp_currently_playing":"Daft Punk - Around the World"},
        {"bitrate":64,"listeners":1,"listenurl":"http://radio.example:8000/lofi",
         "server_type":"audio/aac","title": -}
    ]}}"#;

    #[test]
    fn test_admin_stats_selects_mount() {
        let np = parse_admin_stats(ADMIN_STATS, Some("live")).unwrap();
        assert_eq!(np.current_song.text, "Daft Punk - Around the World");
        assert_eq!(np.current_song.artist, "Daft Punk");
        assert_eq!(np.listeners.current, 3);
        assert_eq!(np.listeners.unique, None);
        assert_eq!(np.meta.bitrate, Some(128));
        assert_eq!(np.meta.format.as_deref(), Some("audio/mpeg"));
        assert!(np.meta.online);
    }

    #[test]
    fn test_admin_stats_aggregates_without_mount() {
        let np = parse_admin_stats(ADMIN_STATS, None).unwrap();
        assert_eq!(np.current_song.title, "Around the World");
        assert_eq!(np.listeners.current, 5);
        assert_eq!(np.listeners.total, 5);
    }

    #[test]
    fn test_admin_stats_unescaped_ampersand() {
        let np = parse_admin_stats(ADMIN_STATS, Some("/lofi")).unwrap();
        assert_eq!(np.current_song.title, "Aruarian Dance & Reflection");
        assert_eq!(np.meta.bitrate, Some(64));
    }

    #[test]
    fn test_admin_stats_missing_mount() {
        assert!(matches!(
            parse_admin_stats(ADMIN_STATS, Some("/nope")),
            Err(Error::MountNotFound(_))
        ));
        assert!(parse_admin_stats("<icestats><source mount=", None).is_err());
        assert!(parse_admin_stats("<icestats></icestats>", None).is_err());
    }

    #[test]
    fn test_status_json_single_source() {
        let np = parse_status_json(STATUS_JSON_SINGLE, None).unwrap();
        assert_eq!(np.current_song.text, "Daft Punk - Around the World");
        assert_eq!(np.listeners.current, 4);
        assert_eq!(np.meta.bitrate, Some(128000));
    }

    #[test]
    fn test_status_json_list_and_title_repair() {
        let np = parse_status_json(STATUS_JSON_MANY, Some("/lofi")).unwrap();
        assert!(np.current_song.is_empty());
        assert!(!np.meta.online);
        assert_eq!(np.listeners.current, 1);
        assert_eq!(np.meta.bitrate, Some(64));

        let np = parse_status_json(STATUS_JSON_MANY, Some("live")).unwrap();
        assert_eq!(np.current_song.title, "Around the World");

        let np = parse_status_json(STATUS_JSON_MANY, None).unwrap();
        assert_eq!(np.listeners.current, 5);
        assert!(np.meta.online);
        assert_eq!(np.meta.format.as_deref(), Some("audio/mpeg"));
    }

    #[test]
    fn test_status_json_without_sources() {
        assert!(parse_status_json(r#"{"icestats":{"admin":"x"}}"#, None).is_err());
        assert!(parse_status_json(r#"{"icestats":{"source":[]}}"#, None).is_err());
        assert!(matches!(
            parse_status_json(STATUS_JSON_SINGLE, Some("/other")),
            Err(Error::MountNotFound(_))
        ));
    }

    #[test]
    fn test_list_clients() {
        let payload = r#"<?xml version="1.0"?>
<icestats>
  <source mount="/live">
    <Listeners>2</Listeners>
    <listener id="12">
      <IP>10.0.0.1</IP>
      <UserAgent>VLC/3.0</UserAgent>
      <Connected>120</Connected>
      <ID>12</ID>
    </listener>
    <listener id="13">
      <IP>10.0.0.2</IP>
      <UserAgent>Winamp</UserAgent>
      <Connected>5</Connected>
      <ID>13</ID>
    </listener>
  </source>
</icestats>"#;

        let clients = parse_list_clients(payload, "/live").unwrap();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[0].uid, "12");
        assert_eq!(clients[0].ip, "10.0.0.1");
        assert_eq!(clients[0].user_agent, "VLC/3.0");
        assert_eq!(clients[0].connected_seconds, 120);
        assert_eq!(clients[1].mount.as_deref(), Some("/live"));
    }
}
