// UI and formatting module

pub mod messages;
pub mod record_tree;

// Re-export commonly used items for cleaner imports
pub use messages::{dimmed, success, warn};
pub use record_tree::{render_record, render_summary};
