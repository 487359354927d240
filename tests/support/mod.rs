//! Shared helpers for the behavioural suites.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use devsync_github::GitHubError;
use rstest_bdd::Slot;
use tokio::runtime::Runtime;
use wiremock::MockServer;

/// Shared runtime wrapper that can be stored in an `rstest-bdd` Slot.
#[derive(Clone)]
pub struct SharedRuntime(Rc<RefCell<Runtime>>);

impl SharedRuntime {
    pub fn new(runtime: Runtime) -> Self {
        Self(Rc::new(RefCell::new(runtime)))
    }

    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.0.borrow().block_on(future)
    }
}

/// Ensures a Tokio runtime and a Wiremock server standing in for GitHub are
/// initialised.
///
/// # Errors
///
/// Returns [`GitHubError::Io`] if the Tokio runtime cannot be created.
pub fn ensure_runtime_and_server(
    runtime: &Slot<SharedRuntime>,
    server: &Slot<MockServer>,
) -> Result<SharedRuntime, GitHubError> {
    if runtime.with_ref(|_| ()).is_none() {
        let created = Runtime::new().map_err(|error| GitHubError::Io {
            message: format!("failed to create Tokio runtime: {error}"),
        })?;
        runtime.set(SharedRuntime::new(created));
    }

    let shared_runtime = runtime.get().ok_or_else(|| GitHubError::Io {
        message: "runtime not initialised after set".to_owned(),
    })?;

    if server.with_ref(|_| ()).is_none() {
        server.set(shared_runtime.block_on(MockServer::start()));
    }

    Ok(shared_runtime)
}

/// Base URL of the mock server.
///
/// # Errors
///
/// Returns [`GitHubError::Configuration`] when the server has not started.
pub fn server_uri(server: &Slot<MockServer>) -> Result<String, GitHubError> {
    server
        .with_ref(MockServer::uri)
        .ok_or_else(|| GitHubError::Configuration {
            message: "mock server not initialised".to_owned(),
        })
}

/// Builds a step failure with `message`.
pub fn step_failure(message: impl Into<String>) -> GitHubError {
    GitHubError::Configuration {
        message: message.into(),
    }
}
