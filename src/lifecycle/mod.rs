//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! connect():
//!     Build transport → Start health-check BackgroundTask
//!
//! disconnect():
//!     Signal BackgroundTask → Join it → Client idle
//!
//! serve binary:
//!     SIGINT/SIGTERM → Shutdown::trigger → admin server drains → disconnect()
//! ```
//!
//! # Design Decisions
//! - Background work is cancelled cooperatively, never aborted
//! - Shutdown is signalled on every exit path (Drop), joined on the normal one

pub mod shutdown;
pub mod signals;

pub use shutdown::{BackgroundTask, Shutdown};
pub use signals::{forward_signals, shutdown_signal};
