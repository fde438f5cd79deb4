//! Transport and identity collaborator contracts.
//!
//! The wire format of the upload request is not owned here; the pipeline
//! hands the transport a batch of serialized payloads and only interprets
//! the response status plus the four server-advised limits.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from a transport attempt. Every variant is retriable.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("no response from event endpoint")]
    NoResponse,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server response to an event batch upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventResponse {
    /// HTTP-style status; only 200 counts as success.
    pub status: u16,
    /// Advised cap on total stored event bytes.
    pub max_total_size: u64,
    /// Advised cap on bytes per batch.
    pub max_batch_size: u64,
    /// Advised maximum wait before events must be uploaded (ms).
    pub max_wait: u64,
    /// Advised minimum interval between uploads (ms).
    pub min_batch_interval: u64,
}

impl EventResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Sends one batch of serialized event payloads.
pub trait Transport: Send + Sync {
    fn send(&self, batch: &[String]) -> Result<EventResponse, TransportError>;
}

/// Source of the channel/identity token that makes this install eligible
/// to upload. Until registration completes this returns `None` and upload
/// attempts terminate successfully without a network call.
pub trait ChannelRegistry: Send + Sync {
    fn channel_id(&self) -> Option<String>;
}

/// Device/associated identifiers refreshed on foreground transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedIdentifiers {
    pub device_id: Option<String>,
    pub limited_tracking: bool,
}

/// Errors from the identifier provider. Retriable.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("identifier provider unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches current device identifiers from the platform.
pub trait IdentifierProvider: Send + Sync {
    fn fetch(&self) -> Result<AssociatedIdentifiers, IdentityError>;
}
