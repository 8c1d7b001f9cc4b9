//! Performance Manager JSON-RPC router client.
//!
//! Every request is a numbered envelope posted to a named router:
//!
//! ```text
//! POST <base>/<path>/device_router
//! {"action": "DeviceRouter", "method": "getDevices", "data": [...], "tid": 7}
//! ```
//!
//! The transaction id is shared by every request made through one client
//! and is consumed even when the request fails.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use reqwest::header::{ACCEPT_CHARSET, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use super::types::RouterResponse;
use crate::domain::MonitorCredential;
use crate::error::{Error, Result};

/// Remote routers addressed by this client. Inventory only needs the
/// device router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Router {
    Device,
}

impl Router {
    /// Value of the `action` field
    pub fn action(&self) -> &'static str {
        match self {
            Router::Device => "DeviceRouter",
        }
    }

    /// Last path segment the router is mounted at
    pub fn endpoint(&self) -> &'static str {
        match self {
            Router::Device => "device_router",
        }
    }
}

/// Ensure the base URL has a scheme and a trailing slash.
pub fn normalize_base_url(address: &str) -> String {
    let address = address.trim();
    let mut base = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };
    if !base.ends_with('/') {
        base.push('/');
    }
    base
}

// =============================================================================
// Router Client
// =============================================================================

/// Authenticated client for one Performance Manager instance.
pub struct RouterClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    next_tid: AtomicU64,
    healthy: RwLock<bool>,
}

impl RouterClient {
    pub fn new(client: Client, credential: &MonitorCredential) -> Self {
        Self {
            client,
            base_url: normalize_base_url(&credential.address),
            username: credential.username.clone(),
            password: credential.password.clone(),
            next_tid: AtomicU64::new(1),
            healthy: RwLock::new(true),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Transaction id of the most recent request, 0 before the first.
    pub fn last_tid(&self) -> u64 {
        self.next_tid.load(Ordering::SeqCst) - 1
    }

    /// False after a transport failure, true again after any answer.
    pub fn is_healthy(&self) -> bool {
        *self.healthy.read()
    }

    fn take_tid(&self) -> u64 {
        self.next_tid.fetch_add(1, Ordering::SeqCst)
    }

    fn router_url(&self, path: &str, router: Router) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}{}", self.base_url, router.endpoint())
        } else {
            format!("{}{}/{}", self.base_url, path, router.endpoint())
        }
    }

    /// Call `method` on `router` mounted under `path` and decode `result`.
    ///
    /// `Ok(None)` when the server answered with anything but a non-empty 200.
    #[instrument(skip(self, data), fields(router = router.action()))]
    pub async fn call<T: DeserializeOwned>(
        &self,
        path: &str,
        router: Router,
        method: &str,
        data: Value,
    ) -> Result<Option<T>> {
        let tid = self.take_tid();
        let url = self.router_url(path, router);
        let envelope = json!({
            "action": router.action(),
            "method": method,
            "data": data,
            "tid": tid,
        });

        debug!(tid, url = %url, "Router request");
        let Some(body) = self.post_json(&url, &envelope).await? else {
            return Ok(None);
        };

        let response: RouterResponse<T> = serde_json::from_str(&body)?;
        Ok(response.result)
    }

    /// POST a JSON document with the client's credentials.
    ///
    /// Returns the body of a non-empty 200 answer.
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<Option<String>> {
        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT_CHARSET, "utf-8")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                *self.healthy.write() = false;
                Error::Transport(e)
            })?;

        *self.healthy.write() = true;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "Performance Manager returned no data");
            return Ok(None);
        }

        let text = response.text().await.map_err(Error::Transport)?;
        if text.trim().is_empty() {
            debug!(url = %url, "Empty response body");
            return Ok(None);
        }
        Ok(Some(text))
    }

    /// Resolve a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}
