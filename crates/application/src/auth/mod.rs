//! Session lifecycle for the clinic dashboard.
//!
//! This module provides:
//! - The `SessionManager` facade every outbound request authorizes through
//! - A single-slot `RefreshScheduler` for proactive token refresh
//! - An in-memory `TokenStore` implementation

mod memory_store;
mod scheduler;
mod session_manager;
mod settings;

pub use memory_store::MemoryTokenStore;
pub use scheduler::RefreshScheduler;
pub use session_manager::SessionManager;
pub use settings::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_LEAD_TIME, SessionSettings};
