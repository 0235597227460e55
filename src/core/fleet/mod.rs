//! Multi-host fact collection engine.
//!
//! Data flow: host list → reachability probe → per-host collector (providers)
//! → merged [`HostRecord`] → fleet aggregator → output formatter / sink.

pub mod aggregator;
pub mod clock;
pub mod collector;
pub mod probe;
pub mod provider;
pub mod providers;
pub mod transport;
pub mod types;

pub use aggregator::FleetAggregator;
pub use clock::{Clock, FixedClock, SystemClock};
pub use collector::{build_record, CancelToken, HostCollector};
pub use probe::{build_prober, PingProber, ProbeKind, ReachabilityProbe, TcpProber};
pub use provider::{run_isolated, Collected, FactProvider, ProviderContext, ProviderRegistry};
pub use providers::{builtin_registry, ProviderSettings};
pub use transport::{Capability, RemoteTransport};
pub use types::{
    CollectionRequest, CollectionResult, FieldMap, FieldValue, HostRecord, HostStatus,
    HostTarget, OutputMode, ProviderFailure, ProviderResult,
};
