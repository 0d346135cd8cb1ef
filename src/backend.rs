//! Client for the external vision service.
//!
//! The connection lives on its own thread with a small tokio runtime. The
//! game only ever calls [`DetectionClient::try_recv`], which never blocks.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::{BackendConfig, DetectionMode};
use crate::error::BackendError;
use crate::input::{DetectionResult, parse_detection};

const HTTP_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BackendStatus {
    Unavailable,
    Connecting,
    Connected,
    Disconnected,
}

impl BackendStatus {
    pub fn label(self) -> &'static str {
        match self {
            BackendStatus::Unavailable => "backend offline",
            BackendStatus::Connecting => "connecting",
            BackendStatus::Connected => "connected",
            BackendStatus::Disconnected => "disconnected",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub supported_modes: Vec<String>,
}

pub struct DetectionClient {
    config: BackendConfig,
    inbound_rx: Arc<Mutex<UnboundedReceiver<DetectionResult>>>,
    status: Arc<Mutex<BackendStatus>>,
}

impl DetectionClient {
    pub fn connect(config: BackendConfig) -> Self {
        let (inbound_tx, inbound_rx) = unbounded_channel::<DetectionResult>();
        let status = Arc::new(Mutex::new(BackendStatus::Connecting));
        let thread_status = status.clone();
        let thread_config = config.clone();

        std::thread::spawn(move || {
            if let Err(e) = run(&thread_config, inbound_tx, &thread_status) {
                warn!(error = %e, "detection backend");
            }
        });

        Self { config, inbound_rx: Arc::new(Mutex::new(inbound_rx)), status }
    }

    /// Switches the backend's detection mode. Returns at once; the request
    /// runs on its own thread and failures are only logged.
    pub fn set_mode(&self, mode: DetectionMode) {
        let url = self.config.endpoint("/set_detection_mode");
        std::thread::spawn(move || {
            if let Err(e) = post_mode(&url, mode) {
                warn!(error = %e, mode = mode.as_str(), "could not change detection mode");
            }
        });
    }

    /// Same as [`DetectionClient::set_mode`] for the sensitivity (percent).
    pub fn set_sensitivity(&self, sensitivity: u8) {
        let url = self.config.endpoint("/set_sensitivity");
        std::thread::spawn(move || {
            if let Err(e) = post_sensitivity(&url, sensitivity) {
                warn!(error = %e, sensitivity, "could not change detection sensitivity");
            }
        });
    }

    pub fn try_recv(&self) -> Option<DetectionResult> {
        self.inbound_rx.lock().ok()?.try_recv().ok()
    }

    pub fn status(&self) -> BackendStatus {
        self.status.lock().map(|s| *s).unwrap_or(BackendStatus::Disconnected)
    }
}

fn set_status(status: &Mutex<BackendStatus>, next: BackendStatus) {
    if let Ok(mut guard) = status.lock() {
        *guard = next;
    }
}

fn run(
    config: &BackendConfig,
    inbound_tx: UnboundedSender<DetectionResult>,
    status: &Mutex<BackendStatus>,
) -> Result<(), BackendError> {
    let health = match check_health(config) {
        Ok(health) => health,
        Err(e) => {
            set_status(status, BackendStatus::Unavailable);
            return Err(e);
        }
    };
    info!(status = %health.status, modes = ?health.supported_modes, "detection backend is up");

    // Settings are best effort; the stream is still useful with defaults.
    if let Err(e) = push_settings(config) {
        warn!(error = %e, "could not configure detection backend");
    }

    open_stream(config.stream_url(), inbound_tx, status)
}

/// Runs the detection stream to completion. Whatever the outcome, the
/// status ends up `Disconnected`.
fn open_stream(
    url: String,
    inbound_tx: UnboundedSender<DetectionResult>,
    status: &Mutex<BackendStatus>,
) -> Result<(), BackendError> {
    let result = tokio::runtime::Runtime::new()
        .map_err(|e| BackendError::DetectionStream(e.to_string()))
        .and_then(|rt| rt.block_on(stream(url, inbound_tx, status)));
    set_status(status, BackendStatus::Disconnected);
    result
}

pub fn check_health(config: &BackendConfig) -> Result<HealthResponse, BackendError> {
    ureq::get(&config.endpoint("/health"))
        .timeout(HTTP_TIMEOUT)
        .call()
        .map_err(|e| BackendError::BackendUnavailable(e.to_string()))?
        .into_json::<HealthResponse>()
        .map_err(|e| BackendError::BackendUnavailable(e.to_string()))
}

pub fn push_settings(config: &BackendConfig) -> Result<(), BackendError> {
    post_mode(&config.endpoint("/set_detection_mode"), config.mode)?;
    post_sensitivity(&config.endpoint("/set_sensitivity"), config.sensitivity)
}

fn post_mode(url: &str, mode: DetectionMode) -> Result<(), BackendError> {
    ureq::post(url)
        .timeout(HTTP_TIMEOUT)
        .send_json(serde_json::json!({ "mode": mode.as_str() }))
        .map_err(|e| BackendError::Request(e.to_string()))?;
    Ok(())
}

fn post_sensitivity(url: &str, sensitivity: u8) -> Result<(), BackendError> {
    ureq::post(url)
        .timeout(HTTP_TIMEOUT)
        .send_json(serde_json::json!({ "sensitivity": sensitivity.min(100) }))
        .map_err(|e| BackendError::Request(e.to_string()))?;
    Ok(())
}

async fn stream(
    url: String,
    inbound_tx: UnboundedSender<DetectionResult>,
    status: &Mutex<BackendStatus>,
) -> Result<(), BackendError> {
    let (mut ws_stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| BackendError::DetectionStream(e.to_string()))?;
    set_status(status, BackendStatus::Connected);
    info!(%url, "detection stream open");

    while let Some(message) = ws_stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => return Err(BackendError::DetectionStream(e.to_string())),
        };
        match parse_detection(&text) {
            Ok(Some(result)) => {
                if inbound_tx.send(result).is_err() {
                    // Receiver dropped: the game is gone.
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => debug!(error = %e, "detection message skipped"),
        }
    }
    info!("detection stream closed");
    Ok(())
}
