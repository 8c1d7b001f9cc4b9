//! UCS Manager Domain Session
//!
//! One login/logout cycle against a single domain's XML API.
//!
//! ```text
//! Disconnected ──connect──▶ LoggingIn ──cookie──▶ Active ──disconnect──▶ LoggingOut ──▶ Closed
//!                               │                   │
//!                               └──transport/HTTP───┴──────────▶ Failed
//! ```
//!
//! A refused login drops back to `Disconnected`. Logout is still attempted
//! from `Failed` when a cookie was issued.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::xml::{self, COMPUTE_ITEM_CLASS, TOP_SYSTEM_CLASS};
use crate::domain::{DomainCredential, ServerRecord};
use crate::error::{Error, Result};

/// Path every XML API request is posted to.
pub const API_SUFFIX: &str = "/nuova";

// =============================================================================
// Configuration
// =============================================================================

/// HTTP settings shared by all domain sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Per-request timeout
    pub request_timeout: Duration,

    /// UCS Manager ships with a self-signed certificate
    pub accept_invalid_certs: bool,

    /// Upper bound on the logout exchange
    pub logout_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            accept_invalid_certs: true,
            logout_timeout: Duration::from_secs(10),
        }
    }
}

impl SessionConfig {
    /// Build the HTTP client used for every domain.
    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(self.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of a domain session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    LoggingIn,
    Active,
    LoggingOut,
    Closed,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::LoggingIn => "logging-in",
            SessionState::Active => "active",
            SessionState::LoggingOut => "logging-out",
            SessionState::Closed => "closed",
            SessionState::Failed => "failed",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Turn a configured address into the XML API endpoint.
///
/// `ucs-a.lab` becomes `https://ucs-a.lab/nuova`. An explicit scheme is kept.
pub fn normalize_endpoint(address: &str) -> String {
    let address = address.trim();
    let mut endpoint = if address.starts_with("https://") || address.starts_with("http://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    while endpoint.ends_with('/') {
        endpoint.pop();
    }
    if !endpoint.ends_with(API_SUFFIX) {
        endpoint.push_str(API_SUFFIX);
    }
    endpoint
}

/// Reformat a blade's `chassis/slot` server id.
///
/// Anything that is not exactly two `/`-separated parts passes through.
pub fn format_position(raw: &str) -> String {
    let parts: Vec<&str> = raw.split('/').collect();
    if parts.len() == 2 {
        format!("Chassis: {} | Blade: {}", parts[0], parts[1])
    } else {
        raw.to_string()
    }
}

// =============================================================================
// Domain Session
// =============================================================================

/// Session against one UCS Manager domain.
pub struct DomainSession {
    client: Client,
    credential: DomainCredential,
    endpoint: String,
    state: SessionState,
    cookie: Option<String>,
    version: String,
    domain_name: String,
}

impl DomainSession {
    /// Create a disconnected session.
    pub fn new(client: Client, credential: DomainCredential) -> Self {
        let endpoint = normalize_endpoint(&credential.address);
        Self {
            client,
            credential,
            endpoint,
            state: SessionState::Disconnected,
            cookie: None,
            version: String::new(),
            domain_name: String::new(),
        }
    }

    /// Create a session and log in.
    pub async fn open(client: Client, credential: DomainCredential) -> Result<Self> {
        let mut session = Self::new(client, credential);
        session.connect().await?;
        Ok(session)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Firmware version reported at login
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn domain_name(&self) -> &str {
        &self.domain_name
    }

    /// A cookie was issued and has not been handed back yet.
    pub fn has_cookie(&self) -> bool {
        self.cookie.is_some()
    }

    /// Log in and keep the session cookie.
    #[instrument(skip(self), fields(domain = %self.endpoint))]
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == SessionState::Active {
            return Ok(());
        }

        self.state = SessionState::LoggingIn;
        let body = xml::login_request(&self.credential.username, &self.credential.password)?;

        let text = match self.exchange(body).await {
            Ok(text) => text,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        let login = match xml::parse_login_response(&text) {
            Ok(login) => login,
            Err(e) => {
                self.state = SessionState::Failed;
                return Err(e);
            }
        };

        match login.cookie {
            Some(cookie) => {
                self.cookie = Some(cookie);
                self.version = login.version.unwrap_or_default();
                self.state = SessionState::Active;
                info!(version = %self.version, "Logged in to UCS domain");
                Ok(())
            }
            None => {
                self.state = SessionState::Disconnected;
                let reason = login
                    .error_description
                    .or(login.error_code)
                    .unwrap_or_else(|| "no session cookie in response".to_string());
                Err(Error::Login {
                    endpoint: self.endpoint.clone(),
                    reason,
                })
            }
        }
    }

    /// Resolve the domain's `topSystem` name. Empty on any failure.
    #[instrument(skip(self), fields(domain = %self.endpoint))]
    pub async fn fetch_server_name(&mut self) -> String {
        let name = match self.resolve_system_name().await {
            Ok(name) => name.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to resolve domain name: {}", e);
                String::new()
            }
        };
        self.domain_name = name.clone();
        name
    }

    /// List the DN of every compute item in the domain.
    #[instrument(skip(self), fields(domain = %self.endpoint))]
    pub async fn enumerate_servers(&mut self) -> Result<Vec<String>> {
        let body = xml::find_dns_by_class_request(self.require_cookie()?, COMPUTE_ITEM_CLASS)?;
        let text = self.exchange_active(body).await?;
        let dns = xml::parse_dn_list(&text)?;
        debug!(count = dns.len(), "Enumerated compute items");
        Ok(dns)
    }

    /// Resolve one DN into a server record.
    ///
    /// `Ok(None)` when the DN is neither a rack unit nor a blade.
    #[instrument(skip(self), fields(domain = %self.endpoint))]
    pub async fn describe_server(&mut self, dn: &str) -> Result<Option<ServerRecord>> {
        let body = xml::resolve_dn_request(self.require_cookie()?, dn)?;
        let text = self.exchange_active(body).await?;

        let Some(attrs) = xml::parse_server_detail(&text)? else {
            return Ok(None);
        };

        Ok(Some(ServerRecord {
            dn: dn.to_string(),
            name: attrs.name,
            model: attrs.model,
            part_number: attrs.part_number,
            serial: attrs.serial,
            uuid: attrs.uuid,
            original_uuid: attrs.original_uuid,
            position: attrs.position.map(|p| format_position(&p)),
            description: attrs.description,
            domain_name: self.domain_name.clone(),
            domain_version: self.version.clone(),
        }))
    }

    /// Name the domain, enumerate it and describe every compute item.
    ///
    /// A malformed or refused detail response drops only that DN. A
    /// transport or HTTP failure abandons the domain.
    pub async fn collect_servers(&mut self, cancel: &CancellationToken) -> Result<Vec<ServerRecord>> {
        self.fetch_server_name().await;
        let dns = self.enumerate_servers().await?;

        let mut records = Vec::with_capacity(dns.len());
        for dn in &dns {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match self.describe_server(dn).await {
                Ok(Some(record)) => {
                    debug!(dn = %dn, uuid = ?record.uuid, "Described server");
                    records.push(record);
                }
                Ok(None) => debug!(dn = %dn, "Not a rack unit or blade, skipping"),
                Err(e @ (Error::XmlParse(_) | Error::Protocol { .. })) => {
                    warn!(domain = %self.endpoint, dn = %dn, "Skipping server: {}", e)
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            domain = %self.endpoint,
            name = %self.domain_name,
            servers = records.len(),
            "Collected domain servers"
        );
        Ok(records)
    }

    /// Hand the cookie back. Returns whether the logout was acknowledged.
    #[instrument(skip(self), fields(domain = %self.endpoint))]
    pub async fn disconnect(&mut self) -> bool {
        let Some(cookie) = self.cookie.take() else {
            return false;
        };

        self.state = SessionState::LoggingOut;
        let result = self.logout(&cookie).await;
        self.state = SessionState::Closed;

        match result {
            Ok(_) => {
                debug!("Logged out of UCS domain");
                true
            }
            Err(e) => {
                warn!("Logout failed: {}", e);
                false
            }
        }
    }

    async fn resolve_system_name(&self) -> Result<Option<String>> {
        let body = xml::resolve_class_request(self.require_cookie()?, TOP_SYSTEM_CLASS)?;
        let text = self.exchange(body).await?;
        let text = self.reject_error_reply(text)?;
        xml::parse_system_name(&text)
    }

    async fn logout(&self, cookie: &str) -> Result<()> {
        let body = xml::logout_request(cookie)?;
        self.exchange(body).await.map(|_| ())
    }

    fn require_cookie(&self) -> Result<&str> {
        match (&self.state, &self.cookie) {
            (SessionState::Active, Some(cookie)) => Ok(cookie),
            _ => Err(Error::NotConnected(self.endpoint.clone())),
        }
    }

    /// Exchange on an active session, failing it on transport or HTTP errors.
    ///
    /// A request refused with an `errorCode` comes back as `Error::Protocol`.
    async fn exchange_active(&mut self, body: String) -> Result<String> {
        let result = self.exchange(body).await;
        if let Err(Error::Transport(_) | Error::HttpStatus { .. }) = &result {
            self.state = SessionState::Failed;
        }
        self.reject_error_reply(result?)
    }

    /// Malformed text passes through so the caller's parser reports it.
    fn reject_error_reply(&self, text: String) -> Result<String> {
        match xml::parse_error_reply(&text) {
            Ok(Some(reply)) => Err(Error::Protocol {
                endpoint: self.endpoint.clone(),
                code: reply.code,
                reason: reply.description,
            }),
            _ => Ok(text),
        }
    }

    async fn exchange(&self, body: String) -> Result<String> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/xml")
            .body(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(Error::HttpStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(Error::Transport)
    }
}
