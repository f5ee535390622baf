//! Protocol adapters
//!
//! Each supported server family has its own adapter behind the [`Adapter`]
//! trait. Adapters hold only immutable configuration (an [`Endpoint`]), so a
//! single instance can serve concurrent fetches.
//!
//! The fetch flow shared by the adapters lives here:
//!
//! 1. With admin credentials, the credentialed source is tried first and the
//!    public source only after it failed ([`with_fallback`]).
//! 2. Without credentials only the public source is used.
//! 3. A requested client roster is fetched concurrently with the now-playing
//!    data and attached once both are done; a roster failure only drops the
//!    roster ([`assemble`]).
//! 4. When no source delivers, the result is [`NowPlaying::blank`].

use crate::error::{Error, Result};
use crate::http::Endpoint;
use crate::models::{Client, NowPlaying};
use crate::song::decode_reference;
use async_trait::async_trait;
use quick_xml::escape::escape;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tracing::{error, warn};

pub mod icecast;
pub mod shoutcast1;
pub mod shoutcast2;

pub use icecast::Icecast;
pub use shoutcast1::Shoutcast1;
pub use shoutcast2::Shoutcast2;

/// Supported server families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    /// Icecast 2 (`/status-json.xsl`, `/admin/stats`)
    Icecast,
    /// SHOUTcast 1.x (`/7.html`)
    Shoutcast1,
    /// SHOUTcast 2.x (`/stats`, `/admin.cgi`)
    Shoutcast2,
}

impl AdapterType {
    pub const ALL: [AdapterType; 3] = [
        AdapterType::Icecast,
        AdapterType::Shoutcast1,
        AdapterType::Shoutcast2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterType::Icecast => "icecast",
            AdapterType::Shoutcast1 => "shoutcast1",
            AdapterType::Shoutcast2 => "shoutcast2",
        }
    }
}

impl fmt::Display for AdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdapterType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| Error::UnknownAdapter(s.to_string()))
    }
}

/// Now-playing capability of a streaming server
#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Server family handled by this adapter
    fn adapter_type(&self) -> AdapterType;

    /// Fetch what is playing on `mount` (mount point or stream id)
    ///
    /// Without a mount, every live mount is aggregated where the protocol
    /// allows it. Never fails: unreachable servers and unreadable payloads
    /// give [`NowPlaying::blank`].
    async fn now_playing(&self, mount: Option<&str>, include_clients: bool) -> NowPlaying;

    /// Fetch the client roster of `mount`
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`] when the protocol has no roster,
    /// [`Error::CredentialsRequired`] without admin credentials, transport
    /// and parse errors otherwise.
    async fn clients(&self, mount: Option<&str>, unique_only: bool) -> Result<Vec<Client>>;
}

/// Try `primary`, then `fallback` only once `primary` has failed
pub(crate) async fn with_fallback<P, F, Fut>(primary: P, fallback: F) -> Option<NowPlaying>
where
    P: Future<Output = Option<NowPlaying>>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Option<NowPlaying>>,
{
    if let Some(result) = primary.await {
        return Some(result);
    }

    warn!("Credentialed now playing request failed, falling back to public endpoint");
    fallback().await
}

/// Run the now-playing and (optional) roster fetches concurrently and
/// combine them
pub(crate) async fn assemble<N, C>(now_playing: N, clients: Option<C>) -> NowPlaying
where
    N: Future<Output = Option<NowPlaying>>,
    C: Future<Output = Result<Vec<Client>>>,
{
    let (result, clients) = match clients {
        Some(clients) => {
            let (result, clients) = tokio::join!(now_playing, clients);
            (result, Some(clients))
        }
        None => (now_playing.await, None),
    };

    let Some(result) = result else {
        return NowPlaying::blank();
    };

    match clients {
        Some(Ok(clients)) => result.with_clients(clients),
        Some(Err(e)) => {
            warn!(error = %e, "Client roster unavailable, returning result without clients");
            result
        }
        None => result,
    }
}

/// GET a status page and parse it, logging any failure
///
/// Returns `None` when the request fails, the body is empty or `parse`
/// rejects it.
pub(crate) async fn fetch_now_playing<F>(
    endpoint: &Endpoint,
    path: &str,
    query: &[(&str, &str)],
    parse: F,
) -> Option<NowPlaying>
where
    F: FnOnce(&str) -> Result<NowPlaying>,
{
    let payload = match endpoint.get(path, query).await {
        Ok(payload) => payload,
        Err(e) => {
            error!(path, error = %e, "Now playing request failed");
            return None;
        }
    };

    if payload.trim().is_empty() {
        error!(path, "Now playing request returned an empty body");
        return None;
    }

    match parse(&payload) {
        Ok(result) => Some(result),
        Err(e) => {
            error!(path, error = %e, response = %payload, "Could not read now playing response");
            None
        }
    }
}

/// Parse an XML payload after escaping stray ampersands
pub(crate) fn parse_xml<T: DeserializeOwned>(payload: &str) -> Result<T> {
    let sanitized = sanitize_xml(payload);
    Ok(quick_xml::de::from_str(&sanitized)?)
}

/// Parse a JSON payload
pub(crate) fn parse_json<T: DeserializeOwned>(payload: &str) -> Result<T> {
    Ok(serde_json::from_str(payload)?)
}

const XML_ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "apos;"];

/// Escape every `&` that does not start an XML entity or character reference
///
/// HTML named entities are decoded to text first.
fn sanitize_xml(payload: &str) -> Cow<'_, str> {
    if !payload.contains('&') {
        return Cow::Borrowed(payload);
    }

    let mut sanitized = String::with_capacity(payload.len() + 16);
    let mut rest = payload;
    while let Some(start) = rest.find('&') {
        sanitized.push_str(&rest[..start]);
        let candidate = &rest[start..];
        if starts_reference(&candidate[1..]) {
            sanitized.push('&');
            rest = &candidate[1..];
        } else if let Some((text, len)) = decode_reference(candidate) {
            sanitized.push_str(&escape(text.as_ref()));
            rest = &candidate[len..];
        } else {
            sanitized.push_str("&amp;");
            rest = &candidate[1..];
        }
    }
    sanitized.push_str(rest);

    Cow::Owned(sanitized)
}

fn starts_reference(rest: &str) -> bool {
    let Some(numeric) = rest.strip_prefix('#') else {
        return XML_ENTITIES.iter().any(|entity| rest.starts_with(entity));
    };

    let (digits, radix) = match numeric
        .strip_prefix('x')
        .or_else(|| numeric.strip_prefix('X'))
    {
        Some(hex) => (hex, 16),
        None => (numeric, 10),
    };

    match digits.find(';') {
        Some(end) if end > 0 => digits[..end].chars().all(|c| c.is_digit(radix)),
        _ => false,
    }
}

/// Mount names as servers report them, with a leading slash
pub(crate) fn mount_path(mount: &str) -> Cow<'_, str> {
    if mount.starts_with('/') {
        Cow::Borrowed(mount)
    } else {
        Cow::Owned(format!("/{mount}"))
    }
}

/// Requested mount, with an empty string meaning "no mount"
pub(crate) fn requested(mount: Option<&str>) -> Option<&str> {
    mount.map(str::trim).filter(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::Listeners;
    use crate::models::Meta;
    use crate::song::CurrentSong;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn sample() -> NowPlaying {
        NowPlaying::new(
            CurrentSong::from_text("Artist - Title"),
            Listeners::new(5, None),
            Meta::new(true, Some(128), None),
        )
    }

    #[test]
    fn test_adapter_type_from_str() {
        assert_eq!("icecast".parse::<AdapterType>().unwrap(), AdapterType::Icecast);
        assert_eq!(" SHOUTcast2 ".parse::<AdapterType>().unwrap(), AdapterType::Shoutcast2);
        assert!(matches!(
            "winamp".parse::<AdapterType>(),
            Err(Error::UnknownAdapter(_))
        ));
        assert_eq!(AdapterType::Shoutcast1.to_string(), "shoutcast1");
    }

    #[test]
    fn test_adapter_type_serde() {
        let json = serde_json::to_string(&AdapterType::Shoutcast1).unwrap();
        assert_eq!(json, "\"shoutcast1\"");
        let parsed: AdapterType = serde_json::from_str("\"icecast\"").unwrap();
        assert_eq!(parsed, AdapterType::Icecast);
    }

    #[test]
    fn test_sanitize_xml() {
        assert_eq!(sanitize_xml("<a>Tom &amp; Jerry</a>"), "<a>Tom &amp; Jerry</a>");
        assert_eq!(sanitize_xml("<a>Tom & Jerry</a>"), "<a>Tom &amp; Jerry</a>");
        assert_eq!(sanitize_xml("<a>&#233;&#xE9;</a>"), "<a>&#233;&#xE9;</a>");
        assert_eq!(sanitize_xml("<a>R&B;</a>"), "<a>R&amp;B;</a>");
        assert_eq!(sanitize_xml("<a>&#;</a>"), "<a>&amp;#;</a>");
        assert_eq!(sanitize_xml("<a>Beyonc&eacute;</a>"), "<a>Beyoncé</a>");
        assert_eq!(sanitize_xml("<a>&LT;3 &amp; &nbsp;</a>"), "<a>&lt;3 &amp; \u{a0}</a>");
    }

    #[test]
    fn test_mount_path() {
        assert_eq!(mount_path("/live"), "/live");
        assert_eq!(mount_path("live"), "/live");
        assert_eq!(requested(Some("  ")), None);
        assert_eq!(requested(Some("1")), Some("1"));
    }

    #[tokio::test]
    async fn test_fallback_not_called_when_primary_succeeds() {
        let called = AtomicBool::new(false);
        let result = with_fallback(async { Some(sample()) }, || async {
            called.store(true, Ordering::SeqCst);
            None::<NowPlaying>
        })
        .await;

        assert!(result.is_some());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let result = with_fallback(async { None::<NowPlaying> }, || async { Some(sample()) }).await;
        assert_eq!(result.unwrap().current_song.title, "Title");
    }

    #[tokio::test]
    async fn test_assemble_blank_when_nothing_available() {
        let clients: Option<std::future::Ready<Result<Vec<Client>>>> = None;
        let result = assemble(async { None::<NowPlaying> }, clients).await;
        assert!(result.is_blank());
    }

    #[tokio::test]
    async fn test_assemble_attaches_clients() {
        let roster = vec![Client::new("1", "10.0.0.1", "VLC", 5, None)];
        let result = assemble(
            async { Some(sample()) },
            Some(async move { Ok::<_, Error>(roster) }),
        )
        .await;

        assert_eq!(result.clients.as_ref().map(Vec::len), Some(1));
        assert_eq!(result.listeners.unique, Some(1));
        assert_eq!(result.listeners.total, 1);
    }

    #[tokio::test]
    async fn test_assemble_roster_failure_degrades() {
        let result = assemble(
            async { Some(sample()) },
            Some(async { Err::<Vec<Client>, _>(Error::Status(500)) }),
        )
        .await;

        assert!(result.clients.is_none());
        assert_eq!(result.listeners.total, 5);
    }
}
