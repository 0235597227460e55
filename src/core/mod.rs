// Core business logic module

pub mod activity_log;
pub mod config;
pub mod fleet;
pub mod hosts;
pub mod output;
pub mod public_ip;
pub mod sink;

// Re-export commonly used items
pub use activity_log::{ActivityLevel, ActivityLog};
pub use config::{CollectorSettings, Config};
pub use output::{format, Rendering};
pub use public_ip::{lookup_public_ip, PublicIpLookup, ServiceFailure};
pub use sink::{deliver, ConsoleSink, CsvFileSink, JsonFileSink, RecordSink};
