//! Error types for the signal pipeline and the execution gateway.

/// Errors from gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Connection could not be established, timed out, or was lost.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// Symbol did not resolve to exactly one tradable instrument.
    #[error("unknown instrument `{0}`")]
    UnknownInstrument(String),

    /// Gateway refused an individual order leg.
    #[error("order rejected: {0}")]
    Rejected(String),

    /// Some legs went live before a later leg failed. The gateway now
    /// holds an incomplete bracket that must be reconciled by hand.
    #[error("partial submission: {placed} of {total} legs live at the gateway ({reason})")]
    PartialSubmission {
        placed: usize,
        total: usize,
        reason: String,
    },
}

impl GatewayError {
    /// Partial submissions leave inconsistent external state and warrant
    /// an escalated notification.
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PartialSubmission { .. })
    }
}

/// Terminal failures of the webhook pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Body was empty or not well-formed JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Token missing or not matching the configured secret.
    #[error("unauthorized")]
    Unauthorized,

    /// A required field was absent or not coercible to its expected type.
    #[error("missing or invalid field `{0}`")]
    MissingField(&'static str),

    /// Entry equals stop; risk per unit is undefined.
    #[error("invalid risk: entry equals stop")]
    InvalidRisk,

    /// Signal arrived outside the permitted trading window.
    #[error("signal blocked: outside trading window ({0})")]
    SessionBlocked(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
