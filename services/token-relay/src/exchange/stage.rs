//! Exchange state machine.

use std::fmt;

use crate::error::RelayError;

/// Progress of one exchange.
///
/// `Received → Validated → AssertionBuilt → Exchanged → Verified → Resigned
/// → Responded`. Validation failures end in `Rejected`, everything later in
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeStage {
    /// Request accepted by the handler
    Received,
    /// Client identity checked
    Validated,
    /// Client assertion signed
    AssertionBuilt,
    /// IDP answered with a token set
    Exchanged,
    /// IDP identity token verified
    Verified,
    /// Identity token re-signed
    Resigned,
    /// Token set returned to the caller
    Responded,
    /// Client identity check failed
    Rejected,
    /// Upstream, key or verification failure
    Failed,
}

impl ExchangeStage {
    /// Stage name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Validated => "validated",
            Self::AssertionBuilt => "assertion_built",
            Self::Exchanged => "exchanged",
            Self::Verified => "verified",
            Self::Resigned => "resigned",
            Self::Responded => "responded",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }

    /// The stage that follows on success, or `None` for terminal stages.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Validated),
            Self::Validated => Some(Self::AssertionBuilt),
            Self::AssertionBuilt => Some(Self::Exchanged),
            Self::Exchanged => Some(Self::Verified),
            Self::Verified => Some(Self::Resigned),
            Self::Resigned => Some(Self::Responded),
            Self::Responded | Self::Rejected | Self::Failed => None,
        }
    }

    /// Terminal stage an exchange ends in after `error`.
    #[must_use]
    pub const fn terminal_for(error: &RelayError) -> Self {
        if error.is_validation() {
            Self::Rejected
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for ExchangeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_order() {
        let mut stage = ExchangeStage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(seen.len(), 7);
        assert_eq!(stage, ExchangeStage::Responded);
    }

    #[test]
    fn test_terminal_for_error_class() {
        assert_eq!(
            ExchangeStage::terminal_for(&RelayError::InvalidClientId),
            ExchangeStage::Rejected
        );
        assert_eq!(
            ExchangeStage::terminal_for(&RelayError::UpstreamNetwork("x".to_string())),
            ExchangeStage::Failed
        );
        assert!(ExchangeStage::Failed.next().is_none());
        assert!(ExchangeStage::Rejected.next().is_none());
    }
}
