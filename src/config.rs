//! Run configuration.
//!
//! A YAML file lists the UCS domains, the Performance Manager instance and
//! where outputs go:
//!
//! ```yaml
//! domains:
//!   - url: ucs-a.lab
//!     username: admin
//!     password_env: UCS_A_PASSWORD
//! monitor:
//!   url: https://ucspm.lab
//!   username: admin
//!   password: zenoss
//! output:
//!   directory: ./reports
//! ```
//!
//! Passwords arrive decrypted, either inline or from an environment variable.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::domain::{Credential, DomainCredential, MonitorCredential};
use crate::error::{Error, Result};
use crate::report::OutputConfig;
use crate::ucs::normalize_endpoint;

/// One endpoint login as written in the run file.
#[derive(Clone, Default, Deserialize)]
pub struct CredentialEntry {
    #[serde(alias = "address")]
    pub url: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    /// Environment variable holding the password
    #[serde(default)]
    pub password_env: Option<String>,
}

impl std::fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "********"))
            .field("password_env", &self.password_env)
            .finish()
    }
}

impl CredentialEntry {
    /// Resolve the password, looking variables up through `env`.
    pub fn resolve_with<F>(&self, label: &str, env: F) -> Result<Credential>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.url.trim().is_empty() {
            return Err(Error::Config(format!("{}: url is empty", label)));
        }
        if self.username.trim().is_empty() {
            return Err(Error::Config(format!("{} ({}): username is empty", label, self.url)));
        }

        let password = match (&self.password, &self.password_env) {
            (Some(password), _) => password.clone(),
            (None, Some(var)) => env(var).ok_or_else(|| {
                Error::Config(format!(
                    "{} ({}): environment variable {} is not set",
                    label, self.url, var
                ))
            })?,
            (None, None) => String::new(),
        };
        if password.is_empty() {
            return Err(Error::Config(format!("{} ({}): password is empty", label, self.url)));
        }

        Ok(Credential::new(self.url.trim(), self.username.trim(), password))
    }

    pub fn resolve(&self, label: &str) -> Result<Credential> {
        self.resolve_with(label, |var| std::env::var(var).ok())
    }
}

/// Contents of the run file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub domains: Vec<CredentialEntry>,
    #[serde(default)]
    pub monitor: Option<CredentialEntry>,
    #[serde(default)]
    pub output: OutputConfig,
}

impl RunConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
    }

    /// Resolved domain logins. Repeated endpoints are dropped with a warning.
    pub fn domain_credentials_with<F>(&self, env: F) -> Result<Vec<DomainCredential>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut seen = HashSet::new();
        let mut credentials = Vec::with_capacity(self.domains.len());

        for (index, entry) in self.domains.iter().enumerate() {
            let credential = entry.resolve_with(&format!("domains[{}]", index), &env)?;
            if !seen.insert(normalize_endpoint(&credential.address)) {
                warn!(domain = %credential.address, "Duplicate domain in configuration, skipping");
                continue;
            }
            credentials.push(credential);
        }
        Ok(credentials)
    }

    pub fn domain_credentials(&self) -> Result<Vec<DomainCredential>> {
        self.domain_credentials_with(|var| std::env::var(var).ok())
    }

    pub fn monitor_credential_with<F>(&self, env: F) -> Result<MonitorCredential>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.monitor
            .as_ref()
            .ok_or_else(|| Error::Config("monitor section is missing".to_string()))?
            .resolve_with("monitor", env)
    }

    pub fn monitor_credential(&self) -> Result<MonitorCredential> {
        self.monitor_credential_with(|var| std::env::var(var).ok())
    }
}
