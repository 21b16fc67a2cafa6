//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Ctrl-C (signals.rs) or Shutdown::trigger
//!     → broadcast to every subscriber (shutdown.rs)
//!     → HTTP server stops accepting and drains in-flight requests
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::spawn_signal_handler;
