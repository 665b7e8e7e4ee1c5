//! # vista-core
//!
//! Core errors, logging and scoped timers for the Vista dashboard engine.
//!
//! This crate provides:
//! - [`VistaError`] - Error taxonomy shared by every Vista crate
//! - [`logging`] - Tracing setup and log file locations
//! - [`debounce`] - A debounce timer torn down with its owner
//!
//! ## Example
//!
//! ```no_run
//! use vista_core::{logging, VistaError};
//!
//! fn main() -> vista_core::Result<()> {
//!     let _guard = logging::init_logging(None, false)?;
//!     let name = "  ";
//!     if name.trim().is_empty() {
//!         return Err(VistaError::validation("name", "View name is required"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod debounce;
pub mod error;
pub mod logging;

pub use debounce::Debouncer;
pub use error::{Result, VistaError};
pub use logging::{init_logging, LogGuard};
