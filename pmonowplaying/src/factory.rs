//! Adapter construction
//!
//! ```no_run
//! use pmonowplaying::{Adapter, AdapterBuilder};
//!
//! # async fn example() -> pmonowplaying::Result<()> {
//! let adapter = AdapterBuilder::icecast("http://radio.example:8000")
//!     .admin_password("hackme")
//!     .build()?;
//!
//! let np = adapter.now_playing(Some("/live"), true).await;
//! println!("{} ({} listeners)", np.current_song.text, np.listeners.total);
//! # Ok(())
//! # }
//! ```

use crate::adapter::{Adapter, AdapterType, Icecast, Shoutcast1, Shoutcast2};
use crate::error::Result;
use crate::http::{Credentials, Endpoint, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder for a protocol adapter
#[derive(Debug)]
pub struct AdapterBuilder {
    adapter_type: AdapterType,
    base_url: String,
    client: Option<Client>,
    admin_username: Option<String>,
    admin_password: Option<String>,
    timeout: Duration,
    user_agent: String,
}

impl AdapterBuilder {
    /// Create a builder for `adapter_type` talking to `base_url`
    pub fn new(adapter_type: AdapterType, base_url: impl Into<String>) -> Self {
        Self {
            adapter_type,
            base_url: base_url.into(),
            client: None,
            admin_username: None,
            admin_password: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn icecast(base_url: impl Into<String>) -> Self {
        Self::new(AdapterType::Icecast, base_url)
    }

    pub fn shoutcast1(base_url: impl Into<String>) -> Self {
        Self::new(AdapterType::Shoutcast1, base_url)
    }

    pub fn shoutcast2(base_url: impl Into<String>) -> Self {
        Self::new(AdapterType::Shoutcast2, base_url)
    }

    /// Share an existing HTTP client (connection pool) with other adapters
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Admin username (defaults to `admin`)
    pub fn admin_username(mut self, username: impl Into<String>) -> Self {
        self.admin_username = Some(username.into());
        self
    }

    /// Admin password; enables the credentialed endpoints
    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin_password = Some(password.into());
        self
    }

    /// Set the per-request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the adapter
    ///
    /// # Errors
    ///
    /// [`crate::Error::InvalidUrl`] for an unparsable base URL,
    /// [`crate::Error::Http`] when the HTTP client cannot be created.
    pub fn build(self) -> Result<Arc<dyn Adapter>> {
        let client = match self.client {
            Some(client) => client,
            None => Client::builder().build()?,
        };

        let credentials = Credentials::new(
            self.admin_username.as_deref(),
            self.admin_password.as_deref(),
        );
        let endpoint = Endpoint::new(
            client,
            &self.base_url,
            credentials,
            self.user_agent,
            self.timeout,
        )?;

        debug!(
            adapter = %self.adapter_type,
            url = %endpoint.base_url(),
            credentials = endpoint.has_credentials(),
            "Building now playing adapter"
        );

        Ok(match self.adapter_type {
            AdapterType::Icecast => Arc::new(Icecast::new(endpoint)),
            AdapterType::Shoutcast1 => Arc::new(Shoutcast1::new(endpoint)),
            AdapterType::Shoutcast2 => Arc::new(Shoutcast2::new(endpoint)),
        })
    }
}

/// A configured streaming server
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    /// Name used to look the station up
    pub name: String,
    pub adapter: AdapterType,
    /// Server base URL
    pub url: String,
    /// Mount point or stream id; the whole server when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

impl Station {
    pub fn new(name: impl Into<String>, adapter: AdapterType, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adapter,
            url: url.into(),
            mount: None,
            admin_username: None,
            admin_password: None,
        }
    }

    pub fn with_mount(mut self, mount: impl Into<String>) -> Self {
        self.mount = Some(mount.into());
        self
    }

    pub fn with_admin(mut self, username: Option<&str>, password: impl Into<String>) -> Self {
        self.admin_username = username.map(str::to_string);
        self.admin_password = Some(password.into());
        self
    }

    /// Builder preloaded with this station's URL and credentials
    pub fn builder(&self) -> AdapterBuilder {
        let mut builder = AdapterBuilder::new(self.adapter, self.url.clone());
        if let Some(username) = &self.admin_username {
            builder = builder.admin_username(username.clone());
        }
        if let Some(password) = &self.admin_password {
            builder = builder.admin_password(password.clone());
        }
        builder
    }

    /// Build the adapter with default transport settings
    pub fn adapter(&self) -> Result<Arc<dyn Adapter>> {
        self.builder().build()
    }
}

impl fmt::Debug for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("name", &self.name)
            .field("adapter", &self.adapter)
            .field("url", &self.url)
            .field("mount", &self.mount)
            .field("admin_username", &self.admin_username)
            .field(
                "admin_password",
                &self.admin_password.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
