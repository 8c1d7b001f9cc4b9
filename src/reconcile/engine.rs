//! Reconciliation Engine
//!
//! Correlates UCS Manager server records with the hardware UUIDs reported by
//! Performance Manager.
//!
//! Every server is compared with every discovered UUID against both its
//! primary and its original UUID. A discovered UUID matching anything is
//! consumed; whatever is left over is unmatched.
//!
//! ```text
//! servers × discovered ──▶ matched records
//!                     └──▶ unmatched UUIDs (+ optional unmanaged records)
//! ```

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{DiscoveredUuid, ReconciledRecord, ServerRecord};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for a reconciliation pass
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Emit an unmanaged record for every unmatched device
    pub include_unmanaged: bool,
}

// =============================================================================
// Result
// =============================================================================

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Reconciliation {
    /// Managed records in server order, then unmanaged ones
    pub records: Vec<ReconciledRecord>,
    /// Discovered UUIDs nothing matched, in discovery order
    pub unmatched: Vec<String>,
}

impl Reconciliation {
    pub fn managed(&self) -> impl Iterator<Item = &ReconciledRecord> {
        self.records.iter().filter(|r| r.is_managed)
    }

    pub fn managed_count(&self) -> usize {
        self.managed().count()
    }

    /// Distinct UUIDs that matched at least one server, first match first.
    pub fn matched_uuids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.managed()
            .filter(|r| seen.insert(r.uuid.as_str()))
            .map(|r| r.uuid.clone())
            .collect()
    }
}

/// Trim discovered UUIDs, drop blanks and keep the first of each duplicate.
pub fn collapse_discovered(discovered: &[DiscoveredUuid]) -> Vec<DiscoveredUuid> {
    let mut seen = HashSet::new();
    let mut collapsed = Vec::with_capacity(discovered.len());

    for entry in discovered {
        let uuid = entry.uuid.trim();
        if uuid.is_empty() {
            continue;
        }
        if seen.insert(uuid.to_string()) {
            collapsed.push(DiscoveredUuid {
                uuid: uuid.to_string(),
                device: entry.device.clone(),
            });
        } else {
            debug!(uuid = %uuid, "Collapsing duplicate discovered UUID");
        }
    }
    collapsed
}

// =============================================================================
// Reconciler
// =============================================================================

/// Matches server records against discovered UUIDs.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    options: ReconcileOptions,
}

impl Reconciler {
    pub fn new(options: ReconcileOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReconcileOptions {
        &self.options
    }

    /// Correlate `servers` with `discovered`.
    ///
    /// A UUID matching several servers yields one record per server.
    pub fn reconcile(
        &self,
        servers: &[ServerRecord],
        discovered: &[DiscoveredUuid],
    ) -> Reconciliation {
        let discovered = collapse_discovered(discovered);
        let mut consumed = vec![false; discovered.len()];
        let mut records = Vec::new();

        for server in servers {
            for (index, entry) in discovered.iter().enumerate() {
                if server.matches_uuid(&entry.uuid) {
                    debug!(uuid = %entry.uuid, dn = %server.dn, domain = %server.domain_name, "Matched server");
                    records.push(ReconciledRecord::managed(
                        entry.uuid.clone(),
                        server.clone(),
                        entry.device.clone(),
                    ));
                    consumed[index] = true;
                }
            }
        }

        let mut unmatched = Vec::new();
        for (entry, used) in discovered.iter().zip(&consumed) {
            if *used {
                continue;
            }
            unmatched.push(entry.uuid.clone());

            if self.options.include_unmanaged {
                if let Some(device) = &entry.device {
                    records.push(ReconciledRecord::unmanaged(entry.uuid.clone(), device.clone()));
                }
            }
        }

        let reconciliation = Reconciliation { records, unmatched };
        info!(
            servers = servers.len(),
            discovered = discovered.len(),
            matched = reconciliation.matched_uuids().len(),
            unmatched = reconciliation.unmatched.len(),
            "Reconciliation complete"
        );
        reconciliation
    }
}
