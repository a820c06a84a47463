//! Shared helpers for beacon-core integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use beacon_core::config::{Config, PipelineConfig};
use beacon_core::{Endpoint, Error, Result, Transport};

/// Transport that records every payload and can be switched to failing
/// or made to hold sends until released
#[derive(Default)]
pub struct RecordingTransport {
    fail: AtomicBool,
    calls: Mutex<Vec<(Endpoint, serde_json::Value)>>,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        beacon_core::logging::init_test();
        Arc::new(Self::default())
    }

    /// Make the next send wait until [`release`](Self::release)
    pub fn hold(&self) {
        *self.gate.lock().unwrap() = Some(Arc::new(Notify::new()));
    }

    /// Let a held send complete; later sends go through directly
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().unwrap().take() {
            gate.notify_one();
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<(Endpoint, serde_json::Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.calls().into_iter().map(|(e, _)| e).collect()
    }

    /// Poll (in virtual time) until at least `count` calls were made or `limit` passes
    pub async fn wait_for(&self, count: usize, limit: Duration) -> usize {
        let deadline = tokio::time::Instant::now() + limit;
        loop {
            let made = self.calls.lock().unwrap().len();
            if made >= count || tokio::time::Instant::now() >= deadline {
                return made;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, endpoint: Endpoint, payload: &serde_json::Value) -> Result<()> {
        self.calls.lock().unwrap().push((endpoint, payload.clone()));
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail.load(Ordering::SeqCst) {
            Err(Error::Transport("API error (503): unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        server_url: Some("https://collect.example.com".to_string()),
        api_key: Some("bk_test".to_string()),
        application_id: Some("com.example.app".to_string()),
        ..Default::default()
    }
}

pub fn config() -> Config {
    Config {
        pipeline: pipeline_config(),
        ..Default::default()
    }
}
