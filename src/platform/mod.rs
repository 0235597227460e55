// Platform-specific code module

pub mod powershell;
pub mod process;

pub use powershell::PowerShellTransport;
pub use process::{run_with_timeout, CommandOutput};
