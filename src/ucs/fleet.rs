//! Multi-domain hardware collection.
//!
//! Every configured domain gets its own session. Sessions run concurrently
//! under a semaphore so a large fleet does not exhaust the session limit of
//! any single UCS Manager, and results are concatenated in configuration
//! order.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::session::{DomainSession, SessionConfig};
use crate::domain::{DomainCredential, HardwareCollection, HardwareInventory, ServerRecord};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for fleet-wide collection
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Domains collected at the same time
    pub max_concurrent_domains: usize,

    /// Per-session HTTP settings
    pub session: SessionConfig,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            max_concurrent_domains: 4,
            session: SessionConfig::default(),
        }
    }
}

/// What one domain contributed.
#[derive(Debug, Default)]
struct DomainOutcome {
    connected: bool,
    records: Vec<ServerRecord>,
}

// =============================================================================
// Fleet
// =============================================================================

/// Collects server records from every configured UCS domain.
pub struct UcsFleet {
    client: Client,
    credentials: Vec<DomainCredential>,
    config: FleetConfig,
    semaphore: Arc<Semaphore>,
}

impl UcsFleet {
    pub fn new(credentials: Vec<DomainCredential>, config: FleetConfig) -> Result<Self> {
        let client = config.session.build_client()?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_domains.max(1)));

        Ok(Self {
            client,
            credentials,
            config,
            semaphore,
        })
    }

    pub fn domain_count(&self) -> usize {
        self.credentials.len()
    }

    async fn collect_domain(
        &self,
        credential: DomainCredential,
        cancel: &CancellationToken,
    ) -> DomainOutcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("Domain semaphore closed: {}", e);
                return DomainOutcome::default();
            }
        };

        let mut session = DomainSession::new(self.client.clone(), credential);
        let endpoint = session.endpoint().to_string();

        let login = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = session.connect() => result,
        };
        if let Err(e) = login {
            warn!(domain = %endpoint, state = %session.state(), "Skipping domain: {}", e);
            return DomainOutcome::default();
        }

        let collected = tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = session.collect_servers(cancel) => result,
        };

        if cancel.is_cancelled() {
            warn!(domain = %endpoint, "Run cancelled, skipping logout");
        } else {
            match tokio::time::timeout(self.config.session.logout_timeout, session.disconnect())
                .await
            {
                Ok(true) => {}
                Ok(false) => debug!(domain = %endpoint, "Logout not acknowledged"),
                Err(_) => warn!(domain = %endpoint, "Logout timed out"),
            }
        }

        match collected {
            Ok(records) => DomainOutcome {
                connected: true,
                records,
            },
            Err(e) => {
                warn!(domain = %endpoint, "Abandoning domain: {}", e);
                DomainOutcome {
                    connected: true,
                    records: Vec::new(),
                }
            }
        }
    }
}

#[async_trait]
impl HardwareInventory for UcsFleet {
    async fn collect_servers(&self, cancel: &CancellationToken) -> HardwareCollection {
        let outcomes = join_all(
            self.credentials
                .iter()
                .cloned()
                .map(|credential| self.collect_domain(credential, cancel)),
        )
        .await;

        let mut collection = HardwareCollection {
            domains_attempted: self.credentials.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            if outcome.connected {
                collection.domains_connected += 1;
            }
            collection.records.extend(outcome.records);
        }

        info!(
            attempted = collection.domains_attempted,
            connected = collection.domains_connected,
            servers = collection.records.len(),
            "Hardware collection complete"
        );
        collection
    }
}
