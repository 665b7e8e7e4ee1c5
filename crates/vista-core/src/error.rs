//! Error types for Vista operations.
//!
//! [`VistaError`] covers every failure the engine surfaces. Errors stay local
//! to the component that produced them: a widget fetch failure renders a retry
//! affordance on that widget, a validation failure is shown inline, and an
//! authorization failure leaves the page state untouched.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`VistaError`].
pub type Result<T> = std::result::Result<T, VistaError>;

/// Error type for all Vista operations.
#[derive(Debug, Error)]
pub enum VistaError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    /// Network failure or non-2xx response from a backend collaborator
    #[error("Request to {target} failed: {message}")]
    Fetch { target: String, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode response from {target}: {message}")]
    Decode { target: String, message: String },

    /// Requested resource does not exist
    #[error("Not found: {what}")]
    NotFound { what: String },

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Input rejected before submission
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// Mutation attempted on a view owned by someone else
    #[error("View {view_id} is owned by {owner}")]
    NotOwner { view_id: String, owner: String },

    /// Mutation requires an active view but Default is selected
    #[error("No saved view is active")]
    NoActiveView,

    /// Backend refused the operation
    #[error("Operation rejected by server: {message}")]
    Forbidden { message: String },

    /// A mutation was stored but the page could not be reloaded afterwards
    #[error("{action} succeeded but reloading the page failed")]
    Reload {
        action: String,
        #[source]
        source: Box<VistaError>,
    },

    // =========================================================================
    // Widget Errors
    // =========================================================================
    /// Widget id not present on the current page
    #[error("Unknown widget: {widget_id}")]
    UnknownWidget { widget_id: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in Vista)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl VistaError {
    // =========================================================================
    // Constructor helpers
    // =========================================================================

    /// Create a ConfigNotFound error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound {
            path: path.into(),
            source: None,
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a fetch error
    pub fn fetch(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Create a decode error from a serde_json failure
    pub fn decode(target: impl Into<String>, source: &serde_json::Error) -> Self {
        Self::Decode {
            target: target.into(),
            message: source.to_string(),
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Wrap the failure of a reload that followed a stored mutation
    pub fn reload(action: impl Into<String>, source: VistaError) -> Self {
        Self::Reload {
            action: action.into(),
            source: Box::new(source),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if the request never left the client.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true for ownership and permission failures.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotOwner { .. } | Self::NoActiveView | Self::Forbidden { .. }
        )
    }

    /// Returns true if the user can retry the same operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::Decode { .. })
    }

    /// Returns true when the mutation itself went through.
    pub fn is_reload(&self) -> bool {
        matches!(self, Self::Reload { .. })
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. } | Self::ConfigValidation { .. }
        )
    }

    /// Short message suitable for an inline error line.
    pub fn friendly_message(&self) -> String {
        match self {
            Self::Fetch { .. } | Self::Decode { .. } => "Failed to load data".to_string(),
            Self::Validation { message, .. } => message.clone(),
            Self::NotOwner { .. } => "Only the owner can change this view".to_string(),
            Self::NoActiveView => "Select a saved view first".to_string(),
            Self::Forbidden { message } => format!("Not allowed: {}", message),
            Self::Reload { action, .. } => format!("{action}, but the page failed to reload"),
            _ => self.to_string(),
        }
    }
}
