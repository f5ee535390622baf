//! Canonical now-playing result shared by every adapter

use crate::error::Result;
use crate::listeners::Listeners;
use crate::song::CurrentSong;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

/// Deserialize a string or number into a String
pub(crate) fn deserialize_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    })
}

/// Deserialize an optional string or number into Option<String>
pub(crate) fn deserialize_optional_text<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => s,
            StringOrNumber::Number(n) => n.to_string(),
        }),
    )
}

/// Deserialize an optional string or number into Option<u64>
///
/// Strings are read leniently (see [`parse_count`]); negative or fractional
/// numbers are truncated to their non-negative integer part.
pub(crate) fn deserialize_optional_count<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<StringOrNumber>::deserialize(deserializer)?.map(|value| match value {
            StringOrNumber::String(s) => parse_count(&s),
            StringOrNumber::Number(n) => n
                .as_u64()
                .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
                .unwrap_or(0),
        }),
    )
}

/// Read the leading digits of a server-reported figure
///
/// `"128"`, `" 128 "` and `"128kbps"` all read as 128; anything without
/// leading digits reads as 0.
pub fn parse_count(raw: &str) -> u64 {
    let raw = raw.trim();
    let end = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    raw[..end].parse().unwrap_or(0)
}

/// Stream metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Whether the stream is on air
    pub online: bool,
    /// Bitrate in kbps; never zero
    pub bitrate: Option<u32>,
    /// Server or content description (e.g. `audio/mpeg`)
    pub format: Option<String>,
}

impl Meta {
    /// Build metadata, treating a zero bitrate and an empty format as unknown
    pub fn new(online: bool, bitrate: Option<u32>, format: Option<String>) -> Self {
        Self {
            online,
            bitrate: bitrate.filter(|b| *b > 0),
            format: format.filter(|f| !f.trim().is_empty()),
        }
    }
}

/// One connected listener from a server's client roster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Server-assigned connection id
    pub uid: String,
    pub ip: String,
    pub user_agent: String,
    /// Seconds since the listener connected
    pub connected_seconds: u64,
    /// Mount point or stream id the listener is tuned to
    pub mount: Option<String>,
}

impl Client {
    pub fn new(
        uid: impl Into<String>,
        ip: impl Into<String>,
        user_agent: impl Into<String>,
        connected_seconds: u64,
        mount: Option<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            ip: ip.into(),
            user_agent: user_agent.into(),
            connected_seconds,
            mount,
        }
    }
}

/// Keep the first client seen for each `(ip, user agent)` pair
///
/// Order of first appearance is preserved; later duplicates are dropped.
pub fn unique_clients(clients: Vec<Client>) -> Vec<Client> {
    let mut seen = HashSet::new();
    clients
        .into_iter()
        .filter(|client| seen.insert((client.ip.clone(), client.user_agent.clone())))
        .collect()
}

/// Canonical now-playing result
///
/// Every adapter produces one of these per fetch. Results are combined with
/// [`NowPlaying::merge`], which never mutates its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    pub current_song: CurrentSong,
    pub listeners: Listeners,
    pub meta: Meta,
    /// Client roster, when it was requested and could be fetched
    pub clients: Option<Vec<Client>>,
}

impl NowPlaying {
    pub fn new(current_song: CurrentSong, listeners: Listeners, meta: Meta) -> Self {
        Self {
            current_song,
            listeners,
            meta,
            clients: None,
        }
    }

    /// Result returned when nothing could be fetched: empty, zero, offline
    pub fn blank() -> Self {
        Self::default()
    }

    /// True when the result carries no information at all
    pub fn is_blank(&self) -> bool {
        *self == Self::blank()
    }

    /// Combine `self` (destination) with `source` into a new result
    ///
    /// - the song of `self` is kept unless it is empty
    /// - listener counts are summed (see [`Listeners::combine`])
    /// - `online` is OR-ed; `format` and `bitrate` are taken from `self` when
    ///   present
    /// - client rosters are concatenated without deduplication
    pub fn merge(&self, source: &NowPlaying) -> NowPlaying {
        let mut dest = self.clone();

        if dest.current_song.is_empty() && !source.current_song.is_empty() {
            dest.current_song = source.current_song.clone();
        }

        dest.listeners = dest.listeners.combine(&source.listeners);

        dest.meta.online |= source.meta.online;
        if dest.meta.format.is_none() {
            dest.meta.format = source.meta.format.clone();
        }
        if dest.meta.bitrate.is_none() {
            dest.meta.bitrate = source.meta.bitrate;
        }

        if let Some(clients) = &source.clients {
            dest.clients
                .get_or_insert_with(Vec::new)
                .extend(clients.iter().cloned());
        }

        dest
    }

    /// Fold results (e.g. one per mount) into a single aggregate
    pub fn aggregate<I>(results: I) -> NowPlaying
    where
        I: IntoIterator<Item = NowPlaying>,
    {
        results
            .into_iter()
            .fold(NowPlaying::blank(), |acc, np| acc.merge(&np))
    }

    /// Attach a client roster
    ///
    /// The roster length becomes the unique listener count and the total is
    /// reconciled against the server's current count.
    pub fn with_clients(mut self, clients: Vec<Client>) -> NowPlaying {
        self.listeners = Listeners::new(self.listeners.current, Some(clients.len() as u64));
        self.clients = Some(clients);
        self
    }

    /// Plain key/value form for handing the result to another process
    pub fn to_value(&self) -> serde_json::Value {
        // Only strings, integers, booleans and sequences: serialization cannot fail.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Rebuild a result from its key/value form
    ///
    /// Accepts camelCase and snake_case keys. A missing listener `total`
    /// falls back to `current`; `meta.status == "online"` is accepted in
    /// place of `meta.online`.
    pub fn from_value(value: serde_json::Value) -> Result<NowPlaying> {
        let raw: RawNowPlaying = serde_json::from_value(value)?;

        let current_song = CurrentSong::new(
            &raw.current_song.text,
            &raw.current_song.title,
            &raw.current_song.artist,
            crate::song::DEFAULT_DELIMITER,
        );

        let current = raw.listeners.current.or(raw.listeners.total).unwrap_or(0);
        let total = raw.listeners.total.or(raw.listeners.current).unwrap_or(0);
        let listeners = Listeners::with_total(current, raw.listeners.unique, total);

        let online = match raw.meta.status {
            Some(status) => status == "online",
            None => raw.meta.online.unwrap_or(false),
        };
        let meta = Meta::new(online, raw.meta.bitrate, raw.meta.format);

        let clients = raw.clients.map(|rows| {
            rows.into_iter()
                .map(|row| {
                    Client::new(
                        row.uid,
                        row.ip,
                        row.user_agent,
                        row.connected_seconds,
                        row.mount,
                    )
                })
                .collect()
        });

        Ok(NowPlaying {
            current_song,
            listeners,
            meta,
            clients,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNowPlaying {
    #[serde(default, alias = "current_song")]
    current_song: RawSong,
    #[serde(default)]
    listeners: RawListeners,
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    clients: Option<Vec<RawClient>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSong {
    #[serde(default)]
    text: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    artist: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawListeners {
    current: Option<u64>,
    unique: Option<u64>,
    total: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    online: Option<bool>,
    status: Option<String>,
    bitrate: Option<u32>,
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawClient {
    #[serde(deserialize_with = "deserialize_string_or_number")]
    uid: String,
    ip: String,
    #[serde(default, alias = "user_agent")]
    user_agent: String,
    #[serde(default, alias = "connected_seconds")]
    connected_seconds: u64,
    #[serde(default)]
    mount: Option<String>,
}
