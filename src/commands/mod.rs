// Command handlers module
pub mod collect;
pub mod completions;
pub mod config;
pub mod providers;
pub mod public_ip;
pub mod version;
