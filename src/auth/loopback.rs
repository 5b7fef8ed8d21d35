//! Loopback redirect receiver for the OAuth installed-app flow.
//!
//! The browser is sent back to `http://127.0.0.1:<port>/?code=...&state=...`.
//! Three things race to finish the wait: a redirect carrying a code, a
//! redirect carrying an error, and a timer. Whichever completes first wins;
//! the outcome slot is written at most once and later completions are
//! dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::error::AuthError;

/// How long answered requests get to flush before the server is dropped.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Code { code: String, state: Option<String> },
    Denied(String),
    TimedOut,
}

/// Single-fulfillment slot for a [`CallbackOutcome`].
#[derive(Clone)]
struct Completion {
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>,
}

impl Completion {
    fn new() -> (Self, oneshot::Receiver<CallbackOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Deliver `outcome` if nothing has been delivered yet. Returns whether
    /// this call was the one that completed the slot.
    fn complete(&self, outcome: CallbackOutcome) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(outcome).is_ok(),
            None => false,
        }
    }
}

pub struct LoopbackServer {
    listener: TcpListener,
    port: u16,
}

impl LoopbackServer {
    /// Bind an ephemeral port on the loopback interface.
    pub async fn bind() -> Result<Self, AuthError> {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    pub fn redirect_uri(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Wait for the authorization redirect and return the code, checking the
    /// `state` parameter against `expected_state`.
    pub async fn wait_for_code(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<String, AuthError> {
        let (completion, rx) = Completion::new();

        let timer = {
            let completion = completion.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                completion.complete(CallbackOutcome::TimedOut);
            })
        };
        let shutdown = CancellationToken::new();
        let mut server = tokio::spawn(serve(self.listener, completion, shutdown.clone()));

        let outcome = rx.await.unwrap_or(CallbackOutcome::TimedOut);
        timer.abort();
        shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            server.abort();
        }

        match outcome {
            CallbackOutcome::Code { code, state } => {
                if state.as_deref() != Some(expected_state) {
                    return Err(AuthError::StateMismatch);
                }
                Ok(code)
            }
            CallbackOutcome::Denied(reason) => Err(AuthError::Denied(reason)),
            CallbackOutcome::TimedOut => Err(AuthError::Timeout(timeout.as_secs())),
        }
    }
}

async fn serve(listener: TcpListener, completion: Completion, shutdown: CancellationToken) {
    let app = Router::new()
        .route("/", get(callback))
        .with_state(completion);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;
    if let Err(e) = result {
        tracing::warn!("Loopback server failed: {}", e);
    }
}

async fn callback(
    State(completion): State<Completion>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, &'static str) {
    let Some(outcome) = callback_outcome(&params) else {
        return (StatusCode::NOT_FOUND, "Not found");
    };
    let body = match &outcome {
        CallbackOutcome::Code { .. } => "Authentication complete. You can close this window.",
        _ => "Authentication failed. Check the terminal.",
    };
    if !completion.complete(outcome) {
        tracing::debug!("Ignoring redirect received after the wait finished");
    }
    (StatusCode::OK, body)
}

/// Interpret the query of a redirect such as `/?code=abc&state=xyz`.
fn callback_outcome(params: &HashMap<String, String>) -> Option<CallbackOutcome> {
    if let Some(error) = params.get("error") {
        return Some(CallbackOutcome::Denied(error.clone()));
    }
    params.get("code").map(|code| CallbackOutcome::Code {
        code: code.clone(),
        state: params.get("state").cloned(),
    })
}
