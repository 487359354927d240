//! Operator CLI for the DevSync GitHub connector.
//!
//! `--user-id` prints an authorize URL, `--code` with `--state` completes a
//! callback, and `--token` inspects the account behind an access token.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use devsync_github::config::OperationMode;
use devsync_github::github::state::UserId;
use devsync_github::telemetry::StderrJsonlTelemetrySink;
use devsync_github::{
    GitHubClient, GitHubError, GitHubIntegrationConfig, OAuthFlow, complete_authorization,
    encode_state,
};
use ortho_config::OrthoConfig;
use tracing_subscriber::EnvFilter;

const FIRST_PAGE: u32 = 1;
const INSPECT_PAGE_SIZE: u32 = 30;

const USAGE: &str = "nothing to do: pass --user-id <id>, --code <code> --state <state>, or --token <token>";

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let _ignored = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

async fn run() -> Result<(), GitHubError> {
    let config = load_config()?;

    match config.operation_mode() {
        OperationMode::AuthorizationUrl => print_authorization_url(&config),
        OperationMode::CompleteCallback => complete_callback(&config).await,
        OperationMode::InspectAccount => inspect_account(&config).await,
        OperationMode::Usage => Err(GitHubError::Configuration {
            message: USAGE.to_owned(),
        }),
    }
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`GitHubError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<GitHubIntegrationConfig, GitHubError> {
    GitHubIntegrationConfig::load().map_err(|error| GitHubError::Configuration {
        message: error.to_string(),
    })
}

fn required<'a>(value: Option<&'a String>, flag: &str) -> Result<&'a str, GitHubError> {
    value
        .map(String::as_str)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| GitHubError::Configuration {
            message: format!("{flag} must not be empty"),
        })
}

fn print_authorization_url(config: &GitHubIntegrationConfig) -> Result<(), GitHubError> {
    let user_id = UserId::new(required(config.user_id.as_ref(), "--user-id")?.trim());
    let flow = OAuthFlow::new(config.oauth_settings()?)?;
    let url = flow.authorization_url(&encode_state(&user_id));

    write_lines(&[format!("Authorize DevSync user {user_id} at:"), url])
}

async fn complete_callback(config: &GitHubIntegrationConfig) -> Result<(), GitHubError> {
    let code = required(config.code.as_ref(), "--code")?;
    let state = required(config.state.as_ref(), "--state")?;
    let flow = OAuthFlow::new(config.oauth_settings()?)?;
    let client_config = config.client_config();

    let account = complete_authorization(&flow, state, code, |token| {
        GitHubClient::new(token.clone(), client_config)
            .map(|client| client.with_telemetry(Arc::new(StderrJsonlTelemetrySink)))
    })
    .await?;

    write_lines(&[format!(
        "Connected GitHub account {} for DevSync user {} (scope: {})",
        account.login, account.user_id, account.credential.scope
    )])
}

async fn inspect_account(config: &GitHubIntegrationConfig) -> Result<(), GitHubError> {
    let client = GitHubClient::new(config.resolve_token()?, config.client_config())?
        .with_telemetry(Arc::new(StderrJsonlTelemetrySink));
    let profile = client.get_user_profile().await?;
    let repositories = client
        .list_user_repositories(FIRST_PAGE, INSPECT_PAGE_SIZE)
        .await?;

    let mut lines = vec![format!(
        "Signed in as {} ({} public repositories)",
        profile.login, profile.public_repos
    )];
    lines.extend(repositories.iter().map(|repository| {
        let visibility = if repository.private { "private" } else { "public" };
        format!("  {} [{visibility}]", repository.full_name)
    }));
    if let Some(rate_limit) = client.rate_limit() {
        lines.push(format!(
            "Rate limit: {}/{} remaining",
            rate_limit.remaining(),
            rate_limit.limit()
        ));
    }

    write_lines(&lines)
}

fn write_lines(lines: &[String]) -> Result<(), GitHubError> {
    let mut stdout = io::stdout().lock();
    lines
        .iter()
        .try_for_each(|line| writeln!(stdout, "{line}"))
        .map_err(|error| GitHubError::Io {
            message: error.to_string(),
        })
}
