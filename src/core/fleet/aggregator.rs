//! Fleet-wide fan-out with bounded concurrency.
//!
//! Hosts are dispatched in input order onto the blocking pool, at most
//! `workers` at a time. Each outcome lands in the slot of its input index, so
//! the result order never depends on completion order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::collector::{CancelToken, HostCollector};
use super::provider::{panic_message, ProviderRegistry};
use super::types::{CollectionRequest, CollectionResult, HostRecord, HostStatus};
use crate::error::{HostFactsError, Result};

pub struct FleetAggregator {
    registry: ProviderRegistry,
    collector: Arc<HostCollector>,
    workers: usize,
}

impl FleetAggregator {
    pub fn new(registry: ProviderRegistry, collector: HostCollector, workers: usize) -> Self {
        Self {
            registry,
            collector: Arc::new(collector),
            workers: workers.max(1),
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Collect every requested host.
    ///
    /// The only error is a request naming an unknown provider, reported before
    /// any host is contacted. Everything else is recorded on the host records.
    pub async fn run(
        &self,
        request: &CollectionRequest,
        cancel: &CancelToken,
    ) -> Result<CollectionResult> {
        let providers = Arc::new(self.registry.select(&request.providers)?);
        let total = request.hosts.len();
        info!(
            "Collecting {} host(s) with {} provider(s), {} worker(s)",
            total,
            providers.len(),
            self.workers
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut slots: Vec<Option<HostRecord>> = vec![None; total];
        let mut tasks = JoinSet::new();
        let mut cancelled = false;

        for (index, host) in request.hosts.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| HostFactsError::other(format!("worker pool closed: {}", e)))?;
            // Cancellation may have arrived while waiting for a free worker
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let host = host.clone();
            let collector = Arc::clone(&self.collector);
            let providers = Arc::clone(&providers);
            let cancel = cancel.clone();

            tasks.spawn_blocking(move || {
                let _permit = permit;
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    collector.collect(&host, &providers, &cancel)
                }));
                let record = match outcome {
                    Ok(record) => record,
                    Err(payload) => {
                        let reason = panic_message(payload.as_ref());
                        error!("Collector crashed on {}: {}", host, reason);
                        HostRecord::unreachable(
                            &host,
                            format!("collector crashed: {}", reason),
                            collector.now(),
                        )
                    }
                };
                (index, record)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, record)) => {
                    debug!("{} finished with status {}", record.host, record.status);
                    slots[index] = Some(record);
                }
                Err(e) => error!("Collection task failed: {}", e),
            }
        }

        let records: Vec<HostRecord> = request
            .hosts
            .iter()
            .zip(slots)
            .map(|(host, slot)| {
                slot.unwrap_or_else(|| {
                    let reason = if cancelled {
                        "run cancelled before host was dispatched"
                    } else {
                        "collection task did not complete"
                    };
                    HostRecord::skipped(host, reason, self.collector.now())
                })
            })
            .collect();

        let result = CollectionResult { records, cancelled };
        info!(
            "Collected {}/{} host(s), {} unreachable, {} skipped, {} provider failure(s)",
            result.count_status(HostStatus::Collected),
            total,
            result.count_status(HostStatus::Unreachable),
            result.count_status(HostStatus::Skipped),
            result.provider_failure_count()
        );
        Ok(result)
    }
}
