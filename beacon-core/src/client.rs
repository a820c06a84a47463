//! Client facade used by host applications
//!
//! [`Beacon`] owns one session: it starts the event pipeline and the gesture
//! tracker, records the session start, and offers thin producers for the
//! record kinds collectors generate.
//!
//! ```rust,no_run
//! # async fn demo() -> beacon_core::Result<()> {
//! use beacon_core::{Beacon, Config};
//!
//! let config = Config::load()?;
//! let beacon = Beacon::from_config(&config)?;
//!
//! beacon.track_screen("home");
//! beacon.track_event("signup_started", serde_json::json!({"plan": "pro"}));
//! if let Some(gestures) = beacon.gestures() {
//!     gestures.on_touch_start(120.0, 300.0, None);
//!     gestures.on_touch_end(121.0, 301.0);
//! }
//!
//! beacon.shutdown().await;
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use tokio::time::Instant;

use crate::config::Config;
use crate::error::Result;
use crate::gesture::{GestureClassifier, GestureHandle, GestureTracker};
use crate::pipeline::{BeforeSend, Delivery, FlushReport, Pipeline, PipelineHandle, PublishStats};
use crate::session::SessionContext;
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    CrashReport, CustomEvent, NetworkRequest, PerformanceMetric, ScreenView, SessionStart,
};

/// Optional collaborators for [`Beacon::start`]
#[derive(Default)]
pub struct BeaconOptions {
    /// Device/app snapshot attached to the session start record
    pub device_info: Option<serde_json::Value>,
    /// Hook that may rewrite or veto each record before it is sent
    pub before_send: Option<BeforeSend>,
    /// Use this session id instead of a random one
    pub session_id: Option<String>,
}

struct ActiveScreen {
    name: String,
    since: Instant,
}

/// One telemetry session of a host application
pub struct Beacon {
    session: Arc<SessionContext>,
    pipeline: Pipeline,
    tracker: Option<GestureTracker>,
    screen: Mutex<Option<ActiveScreen>>,
}

impl Beacon {
    /// Start a session that sends over HTTP
    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.pipeline.enabled {
            return Self::start(config, Arc::new(Disconnected), BeaconOptions::default());
        }
        let transport = HttpTransport::new(&config.pipeline)?;
        Self::start(config, Arc::new(transport), BeaconOptions::default())
    }

    /// Start a session with an explicit transport
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(
        config: &Config,
        transport: Arc<dyn Transport>,
        options: BeaconOptions,
    ) -> Result<Self> {
        config.validate()?;

        let session = match options.session_id {
            Some(id) => SessionContext::with_id(id),
            None => SessionContext::new(),
        };

        let pipeline = Pipeline::start(&config.pipeline, transport, options.before_send)?;
        let handle = pipeline.handle();

        let tracker = handle.is_active().then(|| {
            let classifier = GestureClassifier::new(config.gestures.clone(), session.clone());
            GestureTracker::start(classifier, handle.clone(), config.pipeline.flush_interval())
        });

        handle.submit(session.record(SessionStart {
            device: options.device_info,
        }));

        tracing::info!(session_id = session.session_id(), "Session started");

        Ok(Self {
            session,
            pipeline,
            tracker,
            screen: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        self.session.session_id()
    }

    /// Attach (or clear) the user id on records created from now on
    pub fn set_user(&self, user_id: Option<String>) {
        self.session.set_user_id(user_id);
    }

    /// Producer handle for collectors that build their own records
    pub fn pipeline(&self) -> PipelineHandle {
        self.pipeline.handle()
    }

    /// Handle for platform touch/scroll callbacks; None when disabled
    pub fn gestures(&self) -> Option<GestureHandle> {
        self.tracker.as_ref().map(GestureTracker::handle)
    }

    pub fn track_event(&self, name: impl Into<String>, properties: serde_json::Value) {
        self.pipeline.handle().submit(self.session.record(CustomEvent {
            name: name.into(),
            properties,
        }));
    }

    /// Record a screen view and make it the active screen for gestures
    pub fn track_screen(&self, name: impl Into<String>) {
        let name = name.into();
        let now = Instant::now();

        let previous = {
            let mut active = match self.screen.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            active.replace(ActiveScreen {
                name: name.clone(),
                since: now,
            })
        };

        let view = ScreenView {
            screen: name.clone(),
            duration_ms: previous
                .as_ref()
                .map(|p| now.saturating_duration_since(p.since).as_millis() as u64),
            previous_screen: previous.map(|p| p.name),
        };
        self.pipeline.handle().submit(self.session.record(view));

        if let Some(gestures) = self.gestures() {
            gestures.set_screen(name);
        }
    }

    /// Report an error or crash, racing it to the network first
    pub async fn track_error(&self, report: CrashReport) -> Delivery {
        self.pipeline
            .handle()
            .send_immediate(self.session.record(report))
            .await
    }

    pub fn track_network(&self, request: NetworkRequest) {
        self.pipeline.handle().submit(self.session.record(request));
    }

    pub fn track_performance(&self, name: impl Into<String>, value: f64, unit: impl Into<String>) {
        self.pipeline
            .handle()
            .submit(self.session.record(PerformanceMetric {
                name: name.into(),
                value,
                unit: unit.into(),
            }));
    }

    /// Forward buffered interactions, then flush the queue
    pub async fn flush(&self) -> FlushReport {
        if let Some(gestures) = self.gestures() {
            gestures.flush().await;
        }
        self.pipeline.handle().flush().await
    }

    /// Stop tracking, flush once more and return the session's totals
    pub async fn shutdown(self) -> PublishStats {
        if let Some(tracker) = self.tracker {
            tracker.shutdown().await;
        }
        let stats = self.pipeline.shutdown().await;
        tracing::info!(
            session_id = self.session.session_id(),
            sent = stats.records_sent,
            dropped = stats.records_dropped,
            "Session ended"
        );
        stats
    }
}

/// Transport for a disabled pipeline; nothing is ever sent through it
struct Disconnected;

#[async_trait::async_trait]
impl Transport for Disconnected {
    async fn send(
        &self,
        endpoint: crate::transport::Endpoint,
        _payload: &serde_json::Value,
    ) -> Result<()> {
        Err(crate::error::Error::Transport(format!(
            "pipeline disabled, cannot send to {}",
            endpoint
        )))
    }
}
