use cellar_ledger::types::Digest;
use thiserror::Error;

/// What the caller should do with a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Safe to run again with a fresh sponsorship
    Retry,

    /// Report to the end user as is
    Surface,

    /// Fault of the service instance rather than of the request
    Alert,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    InsufficientBalance(String),

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("sponsorship declined: {0}")]
    SponsorshipDeclined(String),

    #[error("sponsorship unavailable: {0}")]
    SponsorshipUnavailable(String),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// The transaction may still finalize, its outcome is unknown
    #[error("transaction {digest} not confirmed in time")]
    ConfirmationTimeout { digest: Digest },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::SponsorshipUnavailable(_) => Disposition::Retry,
            Self::Configuration(_) => Disposition::Alert,
            _ => Disposition::Surface,
        }
    }

    /// Short identifier of the error, used as a metric and log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::GasEstimation(_) => "gas_estimation",
            Self::SponsorshipDeclined(_) => "sponsorship_declined",
            Self::SponsorshipUnavailable(_) => "sponsorship_unavailable",
            Self::SigningRejected(_) => "signing_rejected",
            Self::SubmissionRejected(_) => "submission_rejected",
            Self::ConfirmationTimeout { .. } => "confirmation_timeout",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Message that can be shown to the end user. Configuration faults never expose their
    /// detail and a confirmation timeout never claims the transaction failed.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidRequest(reason) => format!("The request is invalid: {}", reason),
            Self::InsufficientBalance(reason) => format!("Your balance is too low for this purchase: {}", reason),
            Self::GasEstimation(reason) => format!("The transaction cost could not be estimated: {}", reason),
            Self::SponsorshipDeclined(reason) => format!("The transaction could not be sponsored: {}", reason),
            Self::SponsorshipUnavailable(_) => "The sponsorship service is temporarily unavailable, please try again".to_string(),
            Self::SigningRejected(_) => "The signature request was declined".to_string(),
            Self::SubmissionRejected(reason) => format!("The network rejected the transaction: {}", reason),
            Self::ConfirmationTimeout { digest } => {
                format!("Transaction {} was submitted but is not confirmed yet. It may still complete, check its status later", digest)
            },
            Self::Configuration(_) => "The service is not available".to_string(),
        }
    }

    /// Maps an error raised while building a transaction. Node failures at this stage all
    /// come from estimating its cost.
    pub(crate) fn from_build(value: cellar_ledger::Error) -> Self {
        match value {
            cellar_ledger::Error::Ledger(e) | cellar_ledger::Error::Transport(e) | cellar_ledger::Error::Internal(e) => Self::GasEstimation(e),
            e => e.into(),
        }
    }

    /// Maps an error raised while connecting to the ledger, before anything is sent
    pub(crate) fn from_connect(value: cellar_ledger::Error) -> Self {
        match value {
            cellar_ledger::Error::Ledger(e) | cellar_ledger::Error::Transport(e) | cellar_ledger::Error::Internal(e) => {
                Self::Configuration(format!("ledger is unavailable: {}", e))
            },
            e => e.into(),
        }
    }
}

impl From<cellar_ledger::Error> for Error {
    fn from(value: cellar_ledger::Error) -> Self {
        use cellar_ledger::Error as LedgerError;

        match value {
            e @ LedgerError::InsufficientBalance { .. } => Self::InsufficientBalance(e.to_string()),
            LedgerError::GasEstimation(e) => Self::GasEstimation(e),
            LedgerError::SigningRejected(e) => Self::SigningRejected(e),
            LedgerError::InvalidKey(e) => Self::Configuration(e),
            e @ LedgerError::ChainMismatch { .. } => Self::Configuration(e.to_string()),
            LedgerError::Ledger(e) | LedgerError::Transport(e) | LedgerError::Internal(e) => Self::SubmissionRejected(e),
            e @ (LedgerError::InvalidAddress(_)
            | LedgerError::InvalidDigest(_)
            | LedgerError::InvalidTypeTag(_)
            | LedgerError::InvalidRequest(_)
            | LedgerError::Encoding(_)) => Self::InvalidRequest(e.to_string()),
        }
    }
}

impl From<cellar_sponsoring::Error> for Error {
    fn from(value: cellar_sponsoring::Error) -> Self {
        use cellar_sponsoring::Error as SponsoringError;

        match value {
            SponsoringError::InvalidRequest(e) => Self::InvalidRequest(e),
            SponsoringError::Configuration(e) => Self::Configuration(e),
            SponsoringError::Declined(e) => Self::SponsorshipDeclined(e),
            SponsoringError::Unavailable(e) => Self::SponsorshipUnavailable(e),
        }
    }
}
