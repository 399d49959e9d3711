//! Error taxonomy for a single harvest unit.
//!
//! Every variant of [`HarvestError`] is caught at the combination boundary and
//! turned into an [`OutcomeStatus`]; none of them ends the sweep.

use std::time::Duration;
use thiserror::Error;

use crate::dom::Locator;
use crate::model::OutcomeStatus;

/// A month or entity type name that is not recognised.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

/// What a bounded DOM wait was waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitKind {
    Visible,
    Invisible,
    Clickable,
}

impl std::fmt::Display for WaitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaitKind::Visible => f.write_str("visible"),
            WaitKind::Invisible => f.write_str("invisible"),
            WaitKind::Clickable => f.write_str("clickable"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DomError {
    #[error("timed out after {timeout:?} waiting for {locator} to become {kind}")]
    Timeout {
        locator: Locator,
        kind: WaitKind,
        timeout: Duration,
    },

    #[error("element not found: {0}")]
    NotFound(Locator),

    #[error("option `{option}` not offered by `{control}`")]
    OptionMissing { control: String, option: String },

    #[error("browser interaction with {locator} failed: {message}")]
    Interaction { locator: Locator, message: String },
}

impl DomError {
    pub fn interaction(locator: &Locator, err: impl std::fmt::Display) -> Self {
        Self::Interaction {
            locator: locator.clone(),
            message: err.to_string(),
        }
    }
}

/// Reshaping a found table failed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no {0} columns recognised in table header {1:?}")]
    NoPeriodColumns(&'static str, Vec<String>),

    #[error("no entity name column in table header {0:?}")]
    NoEntityColumn(Vec<String>),
}

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("navigation failed: {0}")]
    Navigation(#[from] DomError),

    #[error("no qualifying table found: {0}")]
    NoTableFound(String),

    #[error("extraction failed: {0}")]
    Extraction(#[from] NormalizeError),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl HarvestError {
    pub fn status(&self) -> OutcomeStatus {
        match self {
            HarvestError::Navigation(_) => OutcomeStatus::NavigationFailed,
            HarvestError::NoTableFound(_) => OutcomeStatus::NoTableFound,
            HarvestError::Extraction(_) => OutcomeStatus::ExtractionFailed,
            HarvestError::Persistence(_) => OutcomeStatus::PersistenceFailed,
        }
    }
}
