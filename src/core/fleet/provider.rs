//! Fact provider abstraction and the ordered registry.
//!
//! Every provider is run through [`run_isolated`], which turns whatever the
//! provider returns into a [`ProviderResult`]. Nothing a provider does can stop
//! the providers after it.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, warn};

use super::clock::Clock;
use super::transport::RemoteTransport;
use super::types::{FieldMap, HostTarget, ProviderFailure, ProviderResult};
use crate::error::{HostFactsError, Result};

/// Collaborators handed to providers for a single host.
pub struct ProviderContext<'a> {
    pub transport: &'a dyn RemoteTransport,
    pub clock: &'a dyn Clock,
}

/// Successful provider output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Collected {
    pub fields: FieldMap,
    /// Non-fatal problems worth surfacing on the record
    pub notes: Vec<String>,
}

impl Collected {
    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl From<FieldMap> for Collected {
    fn from(fields: FieldMap) -> Self {
        Self {
            fields,
            notes: Vec::new(),
        }
    }
}

/// A pluggable unit that retrieves one category of facts for one host.
pub trait FactProvider: Send + Sync {
    /// Stable identifier used to enable the provider and to tag failures.
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn collect(&self, host: &HostTarget, ctx: &ProviderContext<'_>) -> Result<Collected>;
}

/// Run one provider and capture its outcome, success or failure. A panic in
/// the provider is recorded as a failure of that provider only.
pub fn run_isolated(
    provider: &dyn FactProvider,
    host: &HostTarget,
    ctx: &ProviderContext<'_>,
) -> ProviderResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| provider.collect(host, ctx)));
    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            error!("Provider {} crashed on {}: {}", provider.name(), host, reason);
            Err(HostFactsError::other(format!("provider crashed: {}", reason)))
        }
    };

    match outcome {
        Ok(collected) => {
            debug!(
                "{} on {}: {} fields",
                provider.name(),
                host,
                collected.fields.len()
            );
            ProviderResult::Success {
                provider: provider.name().to_string(),
                fields: collected.fields,
                notes: collected.notes,
            }
        }
        Err(e) => {
            warn!("Provider {} failed on {}: {}", provider.name(), host, e);
            ProviderResult::Failure(ProviderFailure {
                provider: provider.name().to_string(),
                host: host.name().to_string(),
                detail: e.to_string(),
            })
        }
    }
}

/// Text of a panic payload, for `&str` and `String` payloads.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Providers in registration order.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn FactProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider. Names must be unique.
    pub fn register(&mut self, provider: Arc<dyn FactProvider>) -> Result<()> {
        if self.get(provider.name()).is_some() {
            return Err(HostFactsError::config(format!(
                "provider '{}' is already registered",
                provider.name()
            )));
        }
        self.providers.push(provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn FactProvider>> {
        self.providers
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn FactProvider>> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Resolve requested names to providers, in registration order.
    ///
    /// An empty request enables everything. Unknown names are an error so a
    /// typo is reported before any host is contacted.
    pub fn select(&self, requested: &[String]) -> Result<Vec<Arc<dyn FactProvider>>> {
        if requested.is_empty() {
            return Ok(self.providers.clone());
        }

        if let Some(unknown) = requested.iter().find(|name| self.get(name).is_none()) {
            return Err(HostFactsError::unknown_provider(format!(
                "{} (available: {})",
                unknown,
                self.names().join(", ")
            )));
        }

        Ok(self
            .providers
            .iter()
            .filter(|p| requested.iter().any(|r| p.name().eq_ignore_ascii_case(r)))
            .cloned()
            .collect())
    }
}
