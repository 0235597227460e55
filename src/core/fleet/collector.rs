//! Per-host collection: probe, then run each enabled provider in order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::clock::Clock;
use super::probe::ReachabilityProbe;
use super::provider::{run_isolated, FactProvider, ProviderContext};
use super::transport::RemoteTransport;
use super::types::{FieldMap, HostRecord, HostStatus, HostTarget, ProviderResult};

/// Shared cancellation flag, raised from the Ctrl+C handler.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Builds one [`HostRecord`] from a host and the enabled providers.
pub struct HostCollector {
    prober: Arc<dyn ReachabilityProbe>,
    transport: Arc<dyn RemoteTransport>,
    clock: Arc<dyn Clock>,
}

impl HostCollector {
    pub fn new(
        prober: Arc<dyn ReachabilityProbe>,
        transport: Arc<dyn RemoteTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prober,
            transport,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Collect a single host. Never fails: every problem ends up on the record.
    pub fn collect(
        &self,
        host: &HostTarget,
        providers: &[Arc<dyn FactProvider>],
        cancel: &CancelToken,
    ) -> HostRecord {
        let started = self.clock.now();

        if !self.prober.probe(host) {
            info!("{} is unreachable", host);
            return HostRecord::unreachable(host, "host did not answer the reachability probe", started);
        }

        let ctx = ProviderContext {
            transport: self.transport.as_ref(),
            clock: self.clock.as_ref(),
        };

        let mut results = Vec::with_capacity(providers.len());
        let mut skipped: Vec<&str> = Vec::new();
        for provider in providers {
            if cancel.is_cancelled() {
                skipped.push(provider.name());
                continue;
            }
            results.push(run_isolated(provider.as_ref(), host, &ctx));
        }

        let mut record = build_record(host, results, started);
        if !skipped.is_empty() {
            debug!("Cancelled on {} before: {}", host, skipped.join(", "));
            record
                .warnings
                .push(format!("cancelled before providers ran: {}", skipped.join(", ")));
        }
        record
    }
}

/// Fold provider outcomes, in order, into a collected record.
pub fn build_record(
    host: &HostTarget,
    results: Vec<ProviderResult>,
    collected_at: DateTime<Utc>,
) -> HostRecord {
    let mut fields = FieldMap::new();
    let mut providers_run = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    let mut warnings = Vec::new();

    for result in results {
        providers_run.push(result.provider().to_string());
        match result {
            ProviderResult::Success {
                provider,
                fields: provided,
                notes,
            } => {
                fields.merge(provided);
                warnings.extend(notes.into_iter().map(|n| format!("{}: {}", provider, n)));
            }
            ProviderResult::Failure(failure) => failures.push(failure),
        }
    }

    HostRecord {
        host: host.name().to_string(),
        status: HostStatus::Collected,
        error: None,
        fields,
        providers_run,
        failures,
        warnings,
        collected_at,
    }
}
