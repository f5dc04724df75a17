//! Identity provider port

use async_trait::async_trait;
use clinic_session_domain::{ExchangeFailure, IssuedToken, TokenGrant};

/// Client for the identity provider's token endpoint.
///
/// Implementations perform a single grant exchange per call and never
/// retry; retry and fallback policy belongs to the session manager.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchanges a grant for a new access/refresh token pair.
    ///
    /// # Errors
    /// - `ExchangeFailure::Status` when the provider rejects the grant
    /// - `ExchangeFailure::MalformedResponse` when the body is not a token response
    /// - `ExchangeFailure::Timeout` / `ExchangeFailure::Transport` when the
    ///   provider cannot be reached in time
    async fn exchange(&self, grant: &TokenGrant) -> Result<IssuedToken, ExchangeFailure>;
}
