//! Behavioural tests for cached, rate limit aware GitHub reads.

mod support;

use chrono::Utc;
use devsync_github::github::{GitHubUser, Repository};
use devsync_github::{AccessToken, ClientConfig, GitHubClient, GitHubError, RepositorySlug};
use rstest::fixture;
use rstest_bdd::Slot;
use rstest_bdd_macros::{ScenarioState, given, scenario, then, when};
use serde_json::json;
use support::{SharedRuntime, ensure_runtime_and_server, server_uri, step_failure};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(ScenarioState, Default)]
struct ClientState {
    runtime: Slot<SharedRuntime>,
    server: Slot<MockServer>,
    client: Slot<GitHubClient>,
    profiles: Slot<Vec<GitHubUser>>,
    repository: Slot<Repository>,
    error: Slot<GitHubError>,
}

#[fixture]
fn client_state() -> ClientState {
    ClientState::default()
}

/// Starts the server, mounts `mock`, and binds a client to the server.
fn serve(client_state: &ClientState, mock: Mock) -> Result<(), GitHubError> {
    let runtime = ensure_runtime_and_server(&client_state.runtime, &client_state.server)?;
    client_state
        .server
        .with_ref(|server| runtime.block_on(mock.mount(server)))
        .ok_or_else(|| step_failure("mock server not initialised"))?;

    let token = AccessToken::new("ghp_bdd0123456789")?;
    let client = GitHubClient::new(
        token,
        ClientConfig::for_api_base(server_uri(&client_state.server)?),
    )?;
    client_state.client.set(client);
    Ok(())
}

fn client(client_state: &ClientState) -> Result<GitHubClient, GitHubError> {
    client_state
        .client
        .get()
        .ok_or_else(|| step_failure("client not initialised"))
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "rstest-bdd passes owned step arguments"
)]
#[given("a GitHub API whose profile belongs to {login}")]
fn seed_profile(client_state: &ClientState, login: String) -> Result<(), GitHubError> {
    let mock = Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "login": login,
            "public_repos": 2
        })));
    serve(client_state, mock)
}

#[given("a GitHub API that is rate limited for {seconds:u64} seconds")]
fn seed_rate_limited(client_state: &ClientState, seconds: u64) -> Result<(), GitHubError> {
    let reset_at = Utc::now()
        .timestamp()
        .saturating_add(i64::try_from(seconds).unwrap_or(i64::MAX));
    let response = ResponseTemplate::new(403)
        .insert_header("x-ratelimit-limit", "5000")
        .insert_header("x-ratelimit-remaining", "0")
        .insert_header("x-ratelimit-reset", reset_at.to_string().as_str())
        .set_body_json(json!({
            "message": "API rate limit exceeded for user ID 1.",
            "documentation_url": "https://docs.github.com/rest/overview/rate-limits-for-the-rest-api"
        }));

    let mock = Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(response);
    serve(client_state, mock)
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "rstest-bdd passes owned step arguments"
)]
#[given("a GitHub API without repository {slug}")]
fn seed_missing_repository(client_state: &ClientState, slug: String) -> Result<(), GitHubError> {
    let mock = Mock::given(method("GET"))
        .and(path(format!("/repos/{slug}")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "message": "Not Found",
            "documentation_url": "https://docs.github.com/rest/repos/repos#get-a-repository"
        })));
    serve(client_state, mock)
}

#[when("the profile is read {times:u64} times")]
fn read_profile(client_state: &ClientState, times: u64) -> Result<(), GitHubError> {
    let runtime = ensure_runtime_and_server(&client_state.runtime, &client_state.server)?;
    let github = client(client_state)?;

    let result = runtime.block_on(async {
        let mut profiles = Vec::new();
        for _ in 0..times {
            profiles.push(github.get_user_profile().await?);
        }
        Ok::<_, GitHubError>(profiles)
    });

    match result {
        Ok(profiles) => client_state.profiles.set(profiles),
        Err(error) => client_state.error.set(error),
    }
    Ok(())
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "rstest-bdd passes owned step arguments"
)]
#[when("repository {slug} is fetched")]
fn fetch_repository(client_state: &ClientState, slug: String) -> Result<(), GitHubError> {
    let runtime = ensure_runtime_and_server(&client_state.runtime, &client_state.server)?;
    let github = client(client_state)?;
    let repository = RepositorySlug::parse(&slug)?;

    match runtime.block_on(github.get_repository(&repository)) {
        Ok(found) => client_state.repository.set(found),
        Err(error) => client_state.error.set(error),
    }
    Ok(())
}

#[expect(
    clippy::needless_pass_by_value,
    reason = "rstest-bdd passes owned step arguments"
)]
#[then("every read returns {login}")]
fn assert_profiles(client_state: &ClientState, login: String) -> Result<(), GitHubError> {
    let profiles = client_state.profiles.get().ok_or_else(|| {
        step_failure(format!(
            "expected profiles, got {:?}",
            client_state.error.get()
        ))
    })?;

    if !profiles.is_empty() && profiles.iter().all(|profile| profile.login == login) {
        Ok(())
    } else {
        Err(step_failure(format!("unexpected profiles {profiles:?}")))
    }
}

#[then("the API received {count:u64} profile request")]
fn assert_request_count(client_state: &ClientState, count: u64) -> Result<(), GitHubError> {
    let runtime = ensure_runtime_and_server(&client_state.runtime, &client_state.server)?;
    let received = client_state
        .server
        .with_ref(|server| runtime.block_on(server.received_requests()))
        .flatten()
        .ok_or_else(|| step_failure("request recording is disabled"))?;

    let profile_requests = received
        .iter()
        .filter(|request| request.url.path() == "/user")
        .count();
    if u64::try_from(profile_requests).is_ok_and(|seen| seen == count) {
        Ok(())
    } else {
        Err(step_failure(format!(
            "expected {count} profile requests but GitHub saw {profile_requests}"
        )))
    }
}

fn recorded_error(client_state: &ClientState) -> Result<GitHubError, GitHubError> {
    client_state
        .error
        .get()
        .ok_or_else(|| step_failure("expected the read to fail"))
}

#[then("the read fails with a rate limit error reporting {remaining:u32} remaining")]
fn assert_rate_limited(client_state: &ClientState, remaining: u32) -> Result<(), GitHubError> {
    match recorded_error(client_state)? {
        GitHubError::RateLimitExceeded {
            rate_limit: Some(info),
            ..
        } if info.remaining() == remaining => Ok(()),
        other => Err(step_failure(format!(
            "expected RateLimitExceeded with {remaining} remaining, got {other:?}"
        ))),
    }
}

#[then("the read fails with status {status:u16}")]
fn assert_status(client_state: &ClientState, status: u16) -> Result<(), GitHubError> {
    match recorded_error(client_state)? {
        GitHubError::PermanentApi {
            status: actual, ..
        } if actual == status => Ok(()),
        other => Err(step_failure(format!(
            "expected PermanentApi with status {status}, got {other:?}"
        ))),
    }
}

#[scenario(path = "tests/features/github_client.feature", index = 0)]
fn repeated_reads_hit_the_cache(client_state: ClientState) {
    let _ = client_state;
}

#[scenario(path = "tests/features/github_client.feature", index = 1)]
fn distant_reset_fails_fast(client_state: ClientState) {
    let _ = client_state;
}

#[scenario(path = "tests/features/github_client.feature", index = 2)]
fn missing_repository_is_permanent(client_state: ClientState) {
    let _ = client_state;
}
