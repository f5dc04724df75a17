//! Port adapters backed by the operating system.

mod system_clock;

pub use system_clock::SystemClock;
