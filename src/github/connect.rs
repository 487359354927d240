//! Completes the OAuth callback for a user.
//!
//! The state is decoded before the code is exchanged so that a forged or
//! corrupted callback never burns a valid authorization code.

use tracing::{info, instrument};

use super::error::GitHubError;
use super::gateway::GitHubGateway;
use super::locator::AccessToken;
use super::oauth::{Credential, TokenExchange};
use super::state::{UserId, decode_state};

/// A GitHub account linked to an application user.
///
/// The caller persists the credential; it is not stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedAccount {
    /// The application user who started the authorization.
    pub user_id: UserId,
    /// GitHub login of the connected account.
    pub login: String,
    /// Credential for subsequent API calls.
    pub credential: Credential,
}

/// Decodes `state`, exchanges `code`, and fetches the connected profile
/// through the gateway returned by `connect`.
///
/// # Errors
///
/// Returns [`GitHubError::InvalidState`] for a malformed state (without
/// contacting GitHub), [`GitHubError::AuthExchangeFailed`] when the code is
/// rejected, or the gateway's error when the profile cannot be fetched.
#[instrument(skip_all)]
pub async fn complete_authorization<E, G, F>(
    exchange: &E,
    state: &str,
    code: &str,
    connect: F,
) -> Result<ConnectedAccount, GitHubError>
where
    E: TokenExchange + ?Sized,
    G: GitHubGateway,
    F: FnOnce(&AccessToken) -> Result<G, GitHubError> + Send,
{
    let user_id = decode_state(state)?;
    let credential = exchange.exchange_code_for_token(code).await?;
    let gateway = connect(&credential.access_token)?;
    let profile = gateway.user_profile().await?;

    info!(
        user_id = %user_id,
        login = %profile.login,
        token = %credential.access_token.preview(),
        "GitHub account connected"
    );

    Ok(ConnectedAccount {
        user_id,
        login: profile.login,
        credential,
    })
}
