//! Badge indicator renderer
//!
//! Both controllers talk to the renderer through an [`IndicatorHandle`]. Each call
//! is a request to the renderer task followed by an acknowledgement, so callers
//! learn whether the badge actually changed.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::{error::IndicatorError, state::PresentationState};

pub const RUNNING_COLOR: &str = "#ff6b35";
pub const PAUSED_COLOR: &str = "#9e9e9e";

const REQUEST_QUEUE: usize = 32;

/// Compact text/color pair shown in the status indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: String,
}

impl Badge {
    pub fn new(text: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: color.into(),
        }
    }

    /// Whole minutes left, or `None` when the badge should be cleared
    pub fn for_state(state: &PresentationState) -> Option<Self> {
        if !state.is_running || state.time_remaining == 0 {
            return None;
        }
        let color = if state.is_paused { PAUSED_COLOR } else { RUNNING_COLOR };
        Some(Self::new((state.time_remaining / 60).to_string(), color))
    }
}

/// Destination that actually displays the badge
pub trait BadgeSink: Send + 'static {
    /// Show `badge`, or clear the indicator when `None`
    fn apply(&mut self, badge: Option<&Badge>) -> Result<(), String>;
}

/// Sink that reports badge changes through the log
#[derive(Debug, Default)]
pub struct LogBadgeSink;

impl BadgeSink for LogBadgeSink {
    fn apply(&mut self, badge: Option<&Badge>) -> Result<(), String> {
        match badge {
            Some(badge) => info!("Badge: {} ({})", badge.text, badge.color),
            None => info!("Badge cleared"),
        }
        Ok(())
    }
}

struct IndicatorRequest {
    badge: Option<Badge>,
    ack: oneshot::Sender<Result<(), IndicatorError>>,
}

/// Cloneable handle to the renderer task
#[derive(Debug, Clone)]
pub struct IndicatorHandle {
    request_tx: mpsc::Sender<IndicatorRequest>,
    badge_rx: watch::Receiver<Option<Badge>>,
}

impl IndicatorHandle {
    /// Spawn the renderer task on the current runtime
    pub fn spawn<S: BadgeSink>(sink: S) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (badge_tx, badge_rx) = watch::channel(None);
        tokio::spawn(render_loop(sink, request_rx, badge_tx));
        Self { request_tx, badge_rx }
    }

    /// Show `text` in `color`
    pub async fn render(&self, text: &str, color: &str) -> Result<(), IndicatorError> {
        self.request(Some(Badge::new(text, color))).await
    }

    /// Remove the badge
    pub async fn clear(&self) -> Result<(), IndicatorError> {
        self.request(None).await
    }

    /// Render or clear according to `state`, logging instead of failing
    pub async fn show_state(&self, state: Option<&PresentationState>) {
        let result = match state.and_then(Badge::for_state) {
            Some(badge) => self.request(Some(badge)).await,
            None => self.request(None).await,
        };
        if let Err(e) = result {
            warn!("Failed to update badge: {}", e);
        }
    }

    /// Badge most recently acknowledged by the sink
    pub fn current(&self) -> Option<Badge> {
        self.badge_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Badge>> {
        self.badge_rx.clone()
    }

    async fn request(&self, badge: Option<Badge>) -> Result<(), IndicatorError> {
        let (ack, ack_rx) = oneshot::channel();
        self.request_tx
            .send(IndicatorRequest { badge, ack })
            .await
            .map_err(|_| IndicatorError::Unavailable)?;
        ack_rx.await.map_err(|_| IndicatorError::Unavailable)?
    }
}

async fn render_loop<S: BadgeSink>(
    mut sink: S,
    mut request_rx: mpsc::Receiver<IndicatorRequest>,
    badge_tx: watch::Sender<Option<Badge>>,
) {
    while let Some(IndicatorRequest { badge, ack }) = request_rx.recv().await {
        let result = sink.apply(badge.as_ref()).map_err(IndicatorError::Sink);
        if result.is_ok() {
            badge_tx.send_replace(badge);
        }
        // The caller may have stopped waiting
        let _ = ack.send(result);
    }
    debug!("Badge renderer stopped");
}
