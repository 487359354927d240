//! Tests for operation mode determination.

use rstest::rstest;

use crate::GitHubIntegrationConfig;
use crate::config::OperationMode;

fn with_inputs(
    user_id: Option<&str>,
    code: Option<&str>,
    state: Option<&str>,
    token: Option<&str>,
) -> GitHubIntegrationConfig {
    GitHubIntegrationConfig {
        user_id: user_id.map(str::to_owned),
        code: code.map(str::to_owned),
        state: state.map(str::to_owned),
        token: token.map(str::to_owned),
        ..Default::default()
    }
}

#[rstest]
#[case::authorization_url(with_inputs(Some("42"), None, None, None), OperationMode::AuthorizationUrl)]
#[case::callback(with_inputs(None, Some("c"), Some("s"), None), OperationMode::CompleteCallback)]
#[case::callback_wins_over_token(with_inputs(Some("42"), Some("c"), Some("s"), Some("t")), OperationMode::CompleteCallback)]
#[case::inspect(with_inputs(Some("42"), None, None, Some("t")), OperationMode::InspectAccount)]
#[case::code_without_state(with_inputs(None, Some("c"), None, None), OperationMode::Usage)]
#[case::nothing(with_inputs(None, None, None, None), OperationMode::Usage)]
fn selects_operation_mode(#[case] config: GitHubIntegrationConfig, #[case] expected: OperationMode) {
    assert_eq!(config.operation_mode(), expected);
}
