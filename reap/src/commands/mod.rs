/// Purge command handler and logic
pub mod purge;

/// Version command handlers
pub mod version;
