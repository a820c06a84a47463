//! Core telemetry types for beacon
//!
//! A [`Record`] is one immutable unit of telemetry: shared metadata
//! ([`RecordMeta`]) plus a variant body ([`RecordBody`]). Every record maps to
//! exactly one [`Category`], which decides its endpoint and batching rule.
//!
//! Records serialize to camelCase JSON with a `type` tag:
//!
//! ```json
//! {"sessionId":"…","timestamp":"2024-05-01T10:00:00Z","type":"touch","gesture":"tap","x":3.0,"y":4.0}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================
// Category
// ============================================

/// Dispatch grouping of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Custom named events (batched)
    Event,
    /// Session start records
    Session,
    /// Errors and crash reports
    Error,
    /// HTTP calls made by the host app
    Network,
    /// Performance samples
    Performance,
    /// Touch and scroll records
    Interaction,
    /// Screen views
    ScreenView,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Event,
        Category::Session,
        Category::Error,
        Category::Network,
        Category::Performance,
        Category::Interaction,
        Category::ScreenView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Event => "event",
            Category::Session => "session",
            Category::Error => "error",
            Category::Network => "network",
            Category::Performance => "performance",
            Category::Interaction => "interaction",
            Category::ScreenView => "screenview",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

// ============================================
// Record
// ============================================

/// Metadata carried by every record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Stable for the lifetime of a session
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Assigned at creation
    pub timestamp: DateTime<Utc>,
}

impl RecordMeta {
    /// Metadata stamped with the current wall-clock time
    pub fn now(session_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id,
            timestamp: Utc::now(),
        }
    }
}

/// One immutable unit of telemetry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(flatten)]
    pub body: RecordBody,
}

/// Variant-specific record contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordBody {
    Event(CustomEvent),
    ScreenView(ScreenView),
    NetworkRequest(NetworkRequest),
    PerformanceMetric(PerformanceMetric),
    Touch(TouchRecord),
    Scroll(ScrollRecord),
    CrashReport(CrashReport),
    SessionStart(SessionStart),
}

impl Record {
    pub fn new(meta: RecordMeta, body: impl Into<RecordBody>) -> Self {
        Self {
            meta,
            body: body.into(),
        }
    }

    /// The dispatch category this record belongs to
    pub fn category(&self) -> Category {
        match self.body {
            RecordBody::Event(_) => Category::Event,
            RecordBody::ScreenView(_) => Category::ScreenView,
            RecordBody::NetworkRequest(_) => Category::Network,
            RecordBody::PerformanceMetric(_) => Category::Performance,
            RecordBody::Touch(_) | RecordBody::Scroll(_) => Category::Interaction,
            RecordBody::CrashReport(_) => Category::Error,
            RecordBody::SessionStart(_) => Category::Session,
        }
    }

    /// Wire name of the record variant
    pub fn kind(&self) -> &'static str {
        match self.body {
            RecordBody::Event(_) => "event",
            RecordBody::ScreenView(_) => "screen_view",
            RecordBody::NetworkRequest(_) => "network_request",
            RecordBody::PerformanceMetric(_) => "performance_metric",
            RecordBody::Touch(_) => "touch",
            RecordBody::Scroll(_) => "scroll",
            RecordBody::CrashReport(_) => "crash_report",
            RecordBody::SessionStart(_) => "session_start",
        }
    }

    /// Content-based hash the backend can use to drop resent duplicates
    ///
    /// Returns a 32-character hex digest of SHA-256(kind + timestamp + session + body)
    pub fn event_hash(&self) -> String {
        let body = serde_json::to_string(&self.body).unwrap_or_default();
        let hash_input = format!(
            "{}:{}:{}:{}",
            self.kind(),
            self.meta.timestamp.to_rfc3339(),
            self.meta.session_id,
            body
        );

        let mut hasher = Sha256::new();
        hasher.update(hash_input.as_bytes());
        let result = hasher.finalize();

        hex::encode(&result[..16])
    }
}

/// A named custom event with free-form properties
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub name: String,
    #[serde(default)]
    pub properties: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenView {
    pub screen: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_screen: Option<String>,
    /// Time spent on the previous screen
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub method: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

/// Semantic interaction resolved from raw pointer samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Tap,
    LongPress,
    Swipe,
    Pinch,
}

impl GestureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureKind::Tap => "tap",
            GestureKind::LongPress => "long_press",
            GestureKind::Swipe => "swipe",
            GestureKind::Pinch => "pinch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchRecord {
    pub gesture: GestureKind,
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<SwipeDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// px/ms
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl TouchRecord {
    /// A touch record with only the gesture and position set
    pub fn at(gesture: GestureKind, x: f64, y: f64) -> Self {
        Self {
            gesture,
            x,
            y,
            screen: None,
            force: None,
            direction: None,
            distance: None,
            velocity: None,
            duration_ms: None,
            scale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    /// Percentage of the scrollable range, 0-100
    pub depth: u8,
    pub direction: ScrollDirection,
    pub scroll_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashReport {
    pub message: String,
    pub error_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub fatal: bool,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// First record of a session, enriched with an opaque device snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<serde_json::Value>,
}

macro_rules! impl_into_body {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for RecordBody {
                fn from(value: $ty) -> Self {
                    RecordBody::$variant(value)
                }
            }
        )*
    };
}

impl_into_body! {
    CustomEvent => Event,
    ScreenView => ScreenView,
    NetworkRequest => NetworkRequest,
    PerformanceMetric => PerformanceMetric,
    TouchRecord => Touch,
    ScrollRecord => Scroll,
    CrashReport => CrashReport,
    SessionStart => SessionStart,
}
