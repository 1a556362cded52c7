use std::error::Error;
use std::sync::Arc;
use std::{borrow::Cow, fmt::Display};

use http_client::http_types::StatusCode;
use thiserror::Error;

/// A [RawProgressError], but shared.
///
/// Errors are stored in [crate::ProgressStatusData] snapshots and handed to every pending
/// [crate::ProgressEngine::flush] call, so they need to be cheap to clone.
#[derive(Debug, Clone)]
pub struct ProgressError {
    inner: Arc<RawProgressError>,
}

impl ProgressError {
    pub(crate) fn argument_error(desc: impl Into<Cow<'static, str>>) -> Self {
        RawProgressError::ArgumentError { desc: desc.into() }.into()
    }

    pub(crate) fn unauthenticated() -> Self {
        RawProgressError::Unauthenticated.into()
    }

    pub(crate) fn detached() -> Self {
        RawProgressError::Detached.into()
    }

    /// The category of this error, for callers deciding how to present it.
    pub fn kind(&self) -> ProgressErrorKind {
        match &*self.inner {
            RawProgressError::Unauthenticated => ProgressErrorKind::Unauthenticated,
            RawProgressError::Network { .. } => ProgressErrorKind::Network,
            RawProgressError::Rejected { .. } => ProgressErrorKind::Rejected,
            RawProgressError::ShelfCheckFailed { .. } => ProgressErrorKind::ShelfCheckFailed,
            RawProgressError::Detached => ProgressErrorKind::Detached,
            RawProgressError::ArgumentError { .. }
            | RawProgressError::InvalidEndpoint { .. }
            | RawProgressError::JsonConversion { .. } => ProgressErrorKind::Other,
        }
    }

    /// For [ProgressErrorKind::Rejected] errors, the status code and response body sent by the
    /// reading service.
    pub fn rejection(&self) -> Option<(StatusCode, &str)> {
        match &*self.inner {
            RawProgressError::Rejected { code, body } => Some((*code, body.as_str())),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProgressError {
    fn from(value: serde_json::Error) -> Self {
        RawProgressError::JsonConversion { inner: value }.into()
    }
}

impl From<http_client::Error> for ProgressError {
    fn from(value: http_client::Error) -> Self {
        RawProgressError::Network { inner: value }.into()
    }
}

impl From<RawProgressError> for ProgressError {
    fn from(value: RawProgressError) -> Self {
        ProgressError {
            inner: Arc::new(value),
        }
    }
}

impl Display for ProgressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.inner.fmt(f)
    }
}

impl Error for ProgressError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressErrorKind {
    /// No token could be obtained, or the service did not accept it.
    Unauthenticated,
    /// The request could not be sent or its response could not be read.
    Network,
    /// The service answered with a non-success status code.
    Rejected,
    /// Reading shelf membership could not be confirmed.
    ShelfCheckFailed,
    /// The engine was detached before the operation could complete.
    Detached,
    Other,
}

/// A structured enumeration of possible errors that can occur while synchronizing progress.
#[derive(Error, Debug)]
pub(crate) enum RawProgressError {
    /// An invalid argument was passed to the engine.
    #[error("invalid argument: {desc}")]
    ArgumentError { desc: Cow<'static, str> },
    /// The token provider had no token, or the service responded with `401 Unauthorized`.
    #[error("No valid token available for the reading service")]
    Unauthenticated,
    /// Transport errors while talking to the reading service.
    #[error("Network error: {inner}")]
    Network { inner: http_client::Error },
    #[error("Reading service rejected the request ({code}): {body}")]
    Rejected { code: StatusCode, body: String },
    /// Used when a token provider returns an invalid URI as a service URL.
    #[error("Invalid reading service endpoint: {inner}")]
    InvalidEndpoint { inner: url::ParseError },
    /// Wraps `serde_json` errors.
    #[error("Internal error while converting JSON: {inner}")]
    JsonConversion { inner: serde_json::Error },
    #[error("Could not check reading shelf: {inner}")]
    ShelfCheckFailed { inner: ProgressError },
    #[error("The progress engine has been detached")]
    Detached,
}
