// Provider failure taxonomy shared by every upstream client.
//
// `Empty` is a legitimate terminal state (valid response, no matching
// record) and must drive fallback to the next provider, never a retry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport failure or non-2xx status after the retry budget.
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// Explicit throttling signal from the upstream.
    #[error("provider rate limited")]
    RateLimited,

    /// The upstream answered but has no record for the identifier.
    #[error("no matching record")]
    Empty,

    /// Login rejected. Implies a configuration problem, not transient
    /// load, so callers surface this instead of retrying.
    #[error("authentication rejected: {0}")]
    AuthFailed(String),

    /// Upstream payload missing fields required to build a record.
    #[error("malformed upstream payload: {0}")]
    InvalidPayload(String),
}

impl ProviderError {
    /// Whether the failure can be absorbed by falling back to another
    /// source. Auth failures cannot: they need operator attention.
    pub fn is_absorbable(&self) -> bool {
        !matches!(self, ProviderError::AuthFailed(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Unavailable(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
