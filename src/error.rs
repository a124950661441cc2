//! Error types for each stage of the reporting workflow.
//!
//! None of these are fatal. Validation and attachment errors are shown to
//! the user and cleared on the next valid input, submission errors leave the
//! draft in place for a retry, and lookup errors degrade to inline notices.

use thiserror::Error;

/// Message shown when the server gives no usable reason for a failure.
pub const GENERIC_SUBMIT_MESSAGE: &str = "Failed to submit report. Please try again.";

/// Rejection of a selected evidence file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    #[error("File size must be less than 10MB")]
    TooLarge { size: u64, limit: u64 },

    #[error("Only JPG, PNG, or PDF files are allowed")]
    UnsupportedType { mime_type: String },

    #[error("Could not read the selected file: {0}")]
    Unreadable(String),
}

/// Failure to submit a report.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The server rejected the report.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never completed.
    #[error("{}", GENERIC_SUBMIT_MESSAGE)]
    Transport(#[source] reqwest::Error),
}

impl SubmitError {
    /// Text to show the user.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Failure of the nearest-services lookup.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("nearest-services request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("nearest-services endpoint returned status {0}")]
    Status(u16),
}

/// Failure to compute a route between two points.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("routing request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("routing service returned status {0}")]
    Status(u16),

    #[error("routing service found no route ({0})")]
    NoRoute(String),
}

/// Why a position could not be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("Location access denied. Please enable permissions.")]
    PermissionDenied,

    #[error("Couldn't determine your location")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Your device doesn't support geolocation")]
    Unsupported,
}

impl PositionError {
    /// Whether the locator should silently continue from the default
    /// coordinate instead of stopping to offer a retry.
    pub fn falls_back_to_default(&self) -> bool {
        matches!(
            self,
            PositionError::PermissionDenied
                | PositionError::PositionUnavailable
                | PositionError::Unsupported
        )
    }
}
