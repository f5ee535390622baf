//! SHOUTcast 2.x adapter
//!
//! Stream ids (`sid`) play the role of mounts. The admin XML page
//! (`/admin.cgi?mode=viewxml&page=7`) and the public `/stats` page carry the
//! same `SHOUTCASTSERVER` fields; the admin one is preferred when credentials
//! are configured. The client roster is JSON (`mode=viewjson&page=3`).

use super::{
    assemble, fetch_now_playing, parse_json, parse_xml, requested, with_fallback, Adapter,
    AdapterType,
};
use crate::error::{Error, Result};
use crate::http::Endpoint;
use crate::listeners::Listeners;
use crate::models::{
    deserialize_optional_count, deserialize_optional_text, parse_count, unique_clients, Client,
    Meta, NowPlaying,
};
use crate::song::{repair_delimiter, CurrentSong};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error};

const ADMIN_PATH: &str = "/admin.cgi";
const STATS_PATH: &str = "/stats";

/// Stream id used for the client roster when none is requested
const DEFAULT_STREAM_ID: &str = "1";

/// SHOUTcast 2.x server
#[derive(Debug, Clone)]
pub struct Shoutcast2 {
    endpoint: Endpoint,
}

impl Shoutcast2 {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    async fn admin_now_playing(&self, sid: Option<&str>) -> Option<NowPlaying> {
        let mut query = Vec::with_capacity(3);
        if let Some(sid) = sid {
            query.push(("sid", sid));
        }
        query.push(("mode", "viewxml"));
        query.push(("page", "7"));

        fetch_now_playing(&self.endpoint, ADMIN_PATH, &query, parse_stats_xml).await
    }

    async fn public_now_playing(&self, sid: Option<&str>) -> Option<NowPlaying> {
        let query: Vec<(&str, &str)> = sid.map(|sid| ("sid", sid)).into_iter().collect();

        fetch_now_playing(&self.endpoint, STATS_PATH, &query, parse_stats_xml).await
    }
}

#[async_trait]
impl Adapter for Shoutcast2 {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Shoutcast2
    }

    async fn now_playing(&self, mount: Option<&str>, include_clients: bool) -> NowPlaying {
        let sid = requested(mount);

        if !self.endpoint.has_credentials() {
            if include_clients {
                debug!("No admin credentials, client roster not requested");
            }
            return self
                .public_now_playing(sid)
                .await
                .unwrap_or_else(NowPlaying::blank);
        }

        let now_playing = with_fallback(self.admin_now_playing(sid), || {
            self.public_now_playing(sid)
        });
        let clients = include_clients.then(|| self.clients(sid, true));

        assemble(now_playing, clients).await
    }

    async fn clients(&self, mount: Option<&str>, unique_only: bool) -> Result<Vec<Client>> {
        if !self.endpoint.has_credentials() {
            return Err(Error::CredentialsRequired(
                "SHOUTcast 2 client listing is an admin page".to_string(),
            ));
        }

        let requested_sid = requested(mount);
        let sid = requested_sid.unwrap_or(DEFAULT_STREAM_ID);
        let payload = self
            .endpoint
            .get(
                ADMIN_PATH,
                &[("sid", sid), ("mode", "viewjson"), ("page", "3")],
            )
            .await?;

        if payload.trim().is_empty() {
            return Ok(Vec::new());
        }

        let clients = parse_clients_json(&payload, requested_sid).inspect_err(|e| {
            error!(sid, error = %e, response = %payload, "Could not read client listing");
        })?;

        Ok(if unique_only {
            unique_clients(clients)
        } else {
            clients
        })
    }
}

#[derive(Debug, Deserialize)]
struct ShoutcastServer {
    #[serde(rename = "SONGTITLE", default)]
    song_title: Option<String>,
    #[serde(rename = "CURRENTLISTENERS", default)]
    current_listeners: Option<String>,
    #[serde(rename = "UNIQUELISTENERS", default)]
    unique_listeners: Option<String>,
    #[serde(rename = "BITRATE", default)]
    bitrate: Option<String>,
    #[serde(rename = "CONTENT", default)]
    content: Option<String>,
}

/// Read a `SHOUTCASTSERVER` document (admin page 7 or `/stats`)
fn parse_stats_xml(payload: &str) -> Result<NowPlaying> {
    let server: ShoutcastServer = parse_xml(payload)?;

    if server.song_title.is_none() && server.current_listeners.is_none() {
        return Err(Error::parse("not a SHOUTCASTSERVER document"));
    }

    let text = repair_delimiter(server.song_title.as_deref().unwrap_or_default());
    let current_song = CurrentSong::from_text(&text);
    let online = !current_song.text.is_empty();

    let current = server.current_listeners.as_deref().map(parse_count).unwrap_or(0);
    let unique = server.unique_listeners.as_deref().map(parse_count);
    let bitrate = server
        .bitrate
        .as_deref()
        .map(parse_count)
        .and_then(|b| u32::try_from(b).ok());

    Ok(NowPlaying::new(
        current_song,
        Listeners::new(current, unique),
        Meta::new(online, bitrate, server.content),
    ))
}

#[derive(Debug, Deserialize)]
struct ListenerJson {
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    uid: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    xff: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    hostname: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_text")]
    useragent: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    connecttime: Option<u64>,
}

impl ListenerJson {
    /// Forwarded-for address when the server is proxied, else the peer
    fn ip(&self) -> &str {
        [self.xff.as_deref(), self.hostname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|ip| !ip.is_empty())
            .unwrap_or_default()
    }
}

fn parse_clients_json(payload: &str, sid: Option<&str>) -> Result<Vec<Client>> {
    let listeners: Vec<ListenerJson> = parse_json(payload)?;

    Ok(listeners
        .into_iter()
        .map(|listener| {
            Client::new(
                listener.uid.clone().unwrap_or_default(),
                listener.ip(),
                listener.useragent.as_deref().unwrap_or_default().trim(),
                listener.connecttime.unwrap_or(0),
                sid.map(str::to_string),
            )
        })
        .collect())
}
