//! SHOUTcast 1.x adapter
//!
//! The only status page is `/7.html`: a single comma separated line inside
//! the HTML body,
//!
//! ```text
//! current,_,_,_,unique,bitrate,title
//! ```
//!
//! The title is the last field and may itself contain commas. There is no
//! client roster and no notion of mounts.

use super::{fetch_now_playing, Adapter, AdapterType};
use crate::error::{Error, Result};
use crate::http::Endpoint;
use crate::listeners::Listeners;
use crate::models::{parse_count, Client, Meta, NowPlaying};
use crate::song::CurrentSong;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

const STATUS_PATH: &str = "/7.html";
const FIELD_COUNT: usize = 7;

/// SHOUTcast 1.x server
#[derive(Debug, Clone)]
pub struct Shoutcast1 {
    endpoint: Endpoint,
}

impl Shoutcast1 {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Adapter for Shoutcast1 {
    fn adapter_type(&self) -> AdapterType {
        AdapterType::Shoutcast1
    }

    async fn now_playing(&self, mount: Option<&str>, include_clients: bool) -> NowPlaying {
        if mount.is_some() || include_clients {
            debug!(mount = ?mount, include_clients, "SHOUTcast 1 ignores mount and client roster");
        }

        fetch_now_playing(&self.endpoint, STATUS_PATH, &[], parse_seven_html)
            .await
            .unwrap_or_else(NowPlaying::blank)
    }

    async fn clients(&self, _mount: Option<&str>, _unique_only: bool) -> Result<Vec<Client>> {
        Err(Error::unsupported(
            "SHOUTcast 1 servers do not publish a client listing",
        ))
    }
}

/// Read the `/7.html` status line
fn parse_seven_html(payload: &str) -> Result<NowPlaying> {
    let re = Regex::new(r"(?is)<body[^>]*>(.*?)</body>")?;
    let body = re
        .captures(payload)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| Error::parse("no <body> in status page"))?;

    let fields: Vec<&str> = body.splitn(FIELD_COUNT, ',').collect();
    if fields.len() < FIELD_COUNT {
        return Err(Error::parse(format!(
            "expected {} fields in status line, found {}",
            FIELD_COUNT,
            fields.len()
        )));
    }

    let current_song = CurrentSong::from_text(fields[6]);
    let online = !current_song.text.is_empty();
    let bitrate = u32::try_from(parse_count(fields[5])).ok();

    Ok(NowPlaying::new(
        current_song,
        Listeners::new(parse_count(fields[0]), Some(parse_count(fields[4]))),
        Meta::new(online, bitrate, None),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seven_html() {
        let payload = "<html><meta http-equiv=\"Pragma\" content=\"no-cache\"></head>\
            <body>12,1,40,500,9,128,Pink Floyd - Time, Live</body></html>";

        let np = parse_seven_html(payload).unwrap();
        assert_eq!(np.current_song.artist, "Pink Floyd");
        assert_eq!(np.current_song.title, "Time, Live");
        assert_eq!(np.listeners.current, 12);
        assert_eq!(np.listeners.unique, Some(9));
        assert_eq!(np.listeners.total, 9);
        assert_eq!(np.meta.bitrate, Some(128));
        assert!(np.meta.online);
        assert!(np.meta.format.is_none());
    }

    #[test]
    fn test_parse_seven_html_entities_and_body_attributes() {
        let payload = "<HTML><BODY class=\"x\">3,1,3,32,0,64,Simon &amp; Garfunkel - America</BODY></HTML>";

        let np = parse_seven_html(payload).unwrap();
        assert_eq!(np.current_song.artist, "Simon & Garfunkel");
        assert_eq!(np.listeners.total, 3);
    }

    #[test]
    fn test_parse_seven_html_too_few_fields() {
        assert!(parse_seven_html("<body>1,1,1</body>").is_err());
        assert!(parse_seven_html("no html here").is_err());
    }

    #[test]
    fn test_offline_when_no_title() {
        let np = parse_seven_html("<body>0,0,0,32,0,0,</body>").unwrap();
        assert!(!np.meta.online);
        assert!(np.meta.bitrate.is_none());
    }
}
