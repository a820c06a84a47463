//! Payload construction and delivery shared by the dispatcher and the
//! immediate-send path.
//!
//! Every payload is a JSON object that carries the credentials
//! (`apiKey`, `applicationId`) next to the record fields:
//!
//! ```text
//! single: {"apiKey","applicationId","sessionId","timestamp","type",...,"eventHash"}
//! batch:  {"apiKey","applicationId","sessionId","timestamp","events":[{...},{...}]}
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::transport::{Endpoint, Transport};
use crate::types::{Category, Record};

/// Hook that may rewrite a record or veto it by returning `None`
pub type BeforeSend = Arc<dyn Fn(Record) -> Option<Record> + Send + Sync>;

/// Credentials, transport and hook needed to put a record on the wire
pub(crate) struct Outbound {
    transport: Arc<dyn Transport>,
    api_key: String,
    application_id: String,
    before_send: Option<BeforeSend>,
}

impl Outbound {
    pub(crate) fn new(
        config: &PipelineConfig,
        transport: Arc<dyn Transport>,
        before_send: Option<BeforeSend>,
    ) -> Self {
        Self {
            transport,
            api_key: config.api_key().to_string(),
            application_id: config.application_id().to_string(),
            before_send,
        }
    }

    /// Run the `before_send` hook; None means the record was vetoed
    pub(crate) fn screen(&self, record: Record) -> Option<Record> {
        match &self.before_send {
            Some(hook) => hook(record),
            None => Some(record),
        }
    }

    pub(crate) async fn send_single(&self, category: Category, record: &Record) -> Result<()> {
        let payload = self.single_payload(record);
        self.transport
            .send(Endpoint::for_category(category), &payload)
            .await
    }

    pub(crate) async fn send_batch(&self, endpoint: Endpoint, records: &[&Record]) -> Result<()> {
        let payload = self.batch_payload(records);
        self.transport.send(endpoint, &payload).await
    }

    fn credentials(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("apiKey".to_string(), Value::String(self.api_key.clone()));
        map.insert(
            "applicationId".to_string(),
            Value::String(self.application_id.clone()),
        );
        map
    }

    /// Payload for one record
    pub(crate) fn single_payload(&self, record: &Record) -> Value {
        let mut payload = self.credentials();
        if let Value::Object(fields) = record_json(record) {
            payload.extend(fields);
        }
        Value::Object(payload)
    }

    /// Payload for several records sent in one request
    pub(crate) fn batch_payload(&self, records: &[&Record]) -> Value {
        let mut payload = self.credentials();
        let session_id = records
            .first()
            .map(|r| r.meta.session_id.clone())
            .unwrap_or_default();
        payload.insert("sessionId".to_string(), Value::String(session_id));
        payload.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        payload.insert(
            "events".to_string(),
            Value::Array(records.iter().map(|r| record_json(r)).collect()),
        );
        Value::Object(payload)
    }
}

/// Record fields plus its dedup hash
fn record_json(record: &Record) -> Value {
    let mut value = serde_json::to_value(record).unwrap_or_else(|e| {
        tracing::warn!(kind = record.kind(), error = %e, "Failed to serialize record");
        Value::Object(Map::new())
    });
    if let Value::Object(fields) = &mut value {
        fields.insert("eventHash".to_string(), Value::String(record.event_hash()));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{CustomEvent, RecordMeta};
    use async_trait::async_trait;

    struct NullTransport;

    #[async_trait]
    impl Transport for NullTransport {
        async fn send(&self, _endpoint: Endpoint, _payload: &Value) -> Result<()> {
            Err(Error::Transport("offline".to_string()))
        }
    }

    fn outbound(before_send: Option<BeforeSend>) -> Outbound {
        let config = PipelineConfig {
            api_key: Some("key".to_string()),
            application_id: Some("app".to_string()),
            ..Default::default()
        };
        Outbound::new(&config, Arc::new(NullTransport), before_send)
    }

    fn event(name: &str) -> Record {
        Record::new(
            RecordMeta::now("sess", Some("user".to_string())),
            CustomEvent {
                name: name.to_string(),
                properties: serde_json::json!({"k": 1}),
            },
        )
    }

    #[test]
    fn test_single_payload_has_credentials_and_fields() {
        let payload = outbound(None).single_payload(&event("open"));
        assert_eq!(payload["apiKey"], "key");
        assert_eq!(payload["applicationId"], "app");
        assert_eq!(payload["sessionId"], "sess");
        assert_eq!(payload["userId"], "user");
        assert_eq!(payload["name"], "open");
        assert_eq!(payload["properties"]["k"], 1);
        assert!(payload["timestamp"].is_string());
        assert_eq!(payload["eventHash"].as_str().map(str::len), Some(32));
    }

    #[test]
    fn test_batch_payload_wraps_events() {
        let a = event("a");
        let b = event("b");
        let payload = outbound(None).batch_payload(&[&a, &b]);
        assert_eq!(payload["apiKey"], "key");
        assert_eq!(payload["sessionId"], "sess");
        assert!(payload["timestamp"].is_string());
        let events = payload["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["name"], "a");
        assert_eq!(events[1]["name"], "b");
    }

    #[test]
    fn test_screen_applies_hook() {
        let hook: BeforeSend = Arc::new(|mut record: Record| {
            record.meta.user_id = None;
            Some(record)
        });
        let screened = outbound(Some(hook)).screen(event("a")).unwrap();
        assert_eq!(screened.meta.user_id, None);

        let veto: BeforeSend = Arc::new(|_| None);
        assert!(outbound(Some(veto)).screen(event("a")).is_none());
    }
}
