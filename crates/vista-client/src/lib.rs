//! # vista-client
//!
//! reqwest client for the Vista dashboard backend.
//!
//! [`BackendClient`] implements the entity, widget-data, saved-view and
//! schedule seams. Non-2xx responses become [`ClientError::Status`] and map
//! onto [`vista_core::VistaError`] (401/403 forbidden, 404 not found, anything
//! else a retryable fetch failure).
//!
//! ## Example
//!
//! ```no_run
//! use vista_client::BackendClient;
//! use vista_config::VistaConfig;
//! use vista_views::EntitySource;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = VistaConfig::load_default()?;
//! let client = BackendClient::from_config(&config.backend)?;
//! let detail = client.entity_detail("stock", "AAPL", None).await?;
//! println!("{} widgets", detail.widgets.len());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::BackendClient;
pub use error::ClientError;
