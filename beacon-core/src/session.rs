//! Session identity stamped onto every record.

use std::sync::{Arc, RwLock};

use crate::types::{Record, RecordBody, RecordMeta};

/// Session id plus the (changeable) user id for one telemetry session
#[derive(Debug)]
pub struct SessionContext {
    session_id: String,
    user_id: RwLock<Option<String>>,
}

impl SessionContext {
    /// Start a session with a fresh random id
    pub fn new() -> Arc<Self> {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_id(session_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            session_id: session_id.into(),
            user_id: RwLock::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn user_id(&self) -> Option<String> {
        match self.user_id.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Attach (or clear) the user for records created from now on
    pub fn set_user_id(&self, user_id: Option<String>) {
        match self.user_id.write() {
            Ok(mut guard) => *guard = user_id,
            Err(poisoned) => *poisoned.into_inner() = user_id,
        }
    }

    /// Metadata for a record created now
    pub fn meta(&self) -> RecordMeta {
        RecordMeta::now(self.session_id.clone(), self.user_id())
    }

    /// Build a record stamped with this session
    pub fn record(&self, body: impl Into<RecordBody>) -> Record {
        Record::new(self.meta(), body)
    }
}
