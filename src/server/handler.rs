// Axum request handlers: turn HTTP requests into dispatcher jobs and render the results.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::dispatch::{
    DispatchError, Dispatcher, Job, JobPayload, JobResult, StatsSnapshot,
};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, request_timeout: Duration) -> Self {
        Self {
            dispatcher,
            request_timeout,
        }
    }

    async fn run(&self, job: Job) -> Result<JobResult, DispatchError> {
        self.dispatcher.run(job, self.request_timeout).await
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransliterationResponse {
    pub error: Vec<String>,
    pub input: String,
    pub result: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReverseTransliterationResponse {
    pub error: Vec<String>,
    pub result: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnForm {
    #[serde(default)]
    pub lang_code: String,
    #[serde(default)]
    pub word: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub languages: Vec<String>,
    pub jobs: StatsSnapshot,
}

pub struct DaemonServer {
    port: u16,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl DaemonServer {
    /// Bind `addr` and serve in the background. Learn-only daemons expose only `/learn` and `/status`.
    pub async fn start(addr: &str, state: AppState, learn_only: bool) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let app = router(state, learn_only);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!("http server stopped: {}", e);
            }
        });

        if learn_only {
            info!("learn service started on port {}", port);
        } else {
            info!("tl, rtl and learn services started on port {}", port);
        }

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Shutdown the server gracefully.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

pub fn router(state: AppState, learn_only: bool) -> Router {
    let mut router = Router::new()
        .route("/learn", post(learn_handler))
        .route("/status", get(status_handler));
    if !learn_only {
        router = router
            .route("/tl/{lang_code}/{word}", get(transliteration_handler))
            .route("/rtl/{lang_code}/{word}", get(reverse_transliteration_handler));
    }
    router.with_state(state)
}

/// GET /tl/{langCode}/{word}. Errors are reported inline with HTTP 200.
async fn transliteration_handler(
    State(state): State<AppState>,
    Path((lang_code, word)): Path<(String, String)>,
) -> Json<TransliterationResponse> {
    debug!("tl request lang={} word={}", lang_code, word);
    let response = match state.run(Job::transliterate(lang_code, word.clone())).await {
        Ok(JobResult {
            errors,
            payload: JobPayload::Transliterated(result),
        }) => TransliterationResponse {
            error: errors,
            input: word,
            result,
        },
        Ok(JobResult { errors, .. }) => TransliterationResponse {
            error: errors,
            input: word,
            result: Vec::new(),
        },
        Err(e) => TransliterationResponse {
            error: vec![e.to_string()],
            input: word,
            result: Vec::new(),
        },
    };
    Json(response)
}

/// GET /rtl/{langCode}/{word}. Errors are reported inline with HTTP 200.
async fn reverse_transliteration_handler(
    State(state): State<AppState>,
    Path((lang_code, word)): Path<(String, String)>,
) -> Json<ReverseTransliterationResponse> {
    debug!("rtl request lang={} word={}", lang_code, word);
    let response = match state.run(Job::reverse_transliterate(lang_code, word)).await {
        Ok(JobResult {
            errors,
            payload: JobPayload::Reversed(result),
        }) => ReverseTransliterationResponse {
            error: errors,
            result,
        },
        Ok(JobResult { errors, .. }) => ReverseTransliterationResponse {
            error: errors,
            result: String::new(),
        },
        Err(e) => ReverseTransliterationResponse {
            error: vec![e.to_string()],
            result: String::new(),
        },
    };
    Json(response)
}

/// POST /learn with form fields `langCode` and `word`. Answers plain text `Done`.
///
/// A word the engine rejects is reported inline with HTTP 200, like `/tl`.
/// Status codes are reserved for requests that never reached an engine.
async fn learn_handler(State(state): State<AppState>, Form(form): Form<LearnForm>) -> Response {
    debug!("learn request lang={} word={}", form.lang_code, form.word);
    match state.run(Job::learn(form.lang_code, form.word)).await {
        Ok(result) if result.is_ok() => "Done".into_response(),
        Ok(result) => result.errors.join("\n").into_response(),
        Err(e @ DispatchError::UnsupportedLanguage { .. }) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        Err(e @ DispatchError::Timeout(_)) => {
            (StatusCode::GATEWAY_TIMEOUT, e.to_string()).into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// GET /status
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        languages: state.dispatcher.languages(),
        jobs: state.dispatcher.stats(),
    })
}
