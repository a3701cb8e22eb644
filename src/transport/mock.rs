//! Mock debugger host for testing

use super::traits::{DebuggerHost, HostEvent, Tab, TabId, TabStatus};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A command recorded by the mock
#[derive(Debug, Clone)]
pub struct RecordedCommand {
    pub tab_id: TabId,
    pub method: String,
    pub params: Value,
}

/// Scriptable in-memory debugger host.
///
/// Commands are recorded; responses come from per-method queues, falling back
/// to canned defaults for the common protocol methods.
#[derive(Debug, Default)]
pub struct MockDebuggerHost {
    tabs: Mutex<Vec<Tab>>,
    attached: Mutex<HashSet<TabId>>,
    commands: Mutex<Vec<RecordedCommand>>,
    responses: Mutex<HashMap<String, VecDeque<Result<Value>>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>,
    available: Mutex<bool>,
}

impl MockDebuggerHost {
    /// Create a mock host with one debuggable tab
    pub fn new() -> Self {
        let host = Self {
            available: Mutex::new(true),
            ..Default::default()
        };
        host.set_tabs(vec![Tab {
            id: "tab-1".to_string(),
            window_id: 1,
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            status: TabStatus::Complete,
        }]);
        host
    }

    /// Replace the tab list returned by `query_tabs`
    pub fn set_tabs(&self, tabs: Vec<Tab>) {
        *self.tabs.lock().unwrap() = tabs;
    }

    /// Simulate the host debugger API being missing entirely
    pub fn set_unavailable(&self) {
        *self.available.lock().unwrap() = false;
    }

    /// Queue the next result for a method
    pub fn push_response(&self, method: &str, result: Value) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(result));
    }

    /// Queue the next result for a method as a failure
    pub fn push_error(&self, method: &str, error: Error) {
        self.responses
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(Err(error));
    }

    /// Queue a `Runtime.evaluate` result wrapping the given value
    pub fn push_evaluation(&self, value: Value) {
        self.push_response(
            "Runtime.evaluate",
            serde_json::json!({ "result": { "type": "object", "value": value } }),
        );
    }

    /// Emit an event on the global listener stream
    pub fn emit(&self, event: HostEvent) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.retain(|sender| sender.send(event.clone()).is_ok());
    }

    /// All commands sent so far
    pub fn sent_commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Commands sent for one method
    pub fn sent(&self, method: &str) -> Vec<RecordedCommand> {
        self.sent_commands()
            .into_iter()
            .filter(|c| c.method == method)
            .collect()
    }

    /// Tabs the host is currently attached to
    pub fn attached_tabs(&self) -> HashSet<TabId> {
        self.attached.lock().unwrap().clone()
    }

    fn check_available(&self) -> Result<()> {
        if *self.available.lock().unwrap() {
            Ok(())
        } else {
            Err(Error::transport_unavailable("Debugger API is missing"))
        }
    }

    fn default_response(method: &str) -> Value {
        match method {
            "Runtime.evaluate" => serde_json::json!({
                "result": { "type": "string", "value": "default" }
            }),
            "Page.getLayoutMetrics" => serde_json::json!({
                "cssLayoutViewport": { "pageX": 0, "pageY": 0, "clientWidth": 1280, "clientHeight": 720 }
            }),
            _ => serde_json::json!({}),
        }
    }
}

#[async_trait]
impl DebuggerHost for MockDebuggerHost {
    async fn attach(&self, tab_id: &TabId) -> Result<()> {
        self.check_available()?;
        self.attached.lock().unwrap().insert(tab_id.clone());
        Ok(())
    }

    async fn detach(&self, tab_id: &TabId) -> Result<()> {
        self.check_available()?;
        self.attached.lock().unwrap().remove(tab_id);
        Ok(())
    }

    async fn send_command(&self, tab_id: &TabId, method: &str, params: Value) -> Result<Value> {
        self.check_available()?;

        self.commands.lock().unwrap().push(RecordedCommand {
            tab_id: tab_id.clone(),
            method: method.to_string(),
            params,
        });

        let queued = self
            .responses
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(|queue| queue.pop_front());

        match queued {
            Some(result) => result,
            None => Ok(Self::default_response(method)),
        }
    }

    async fn listen(&self) -> Result<mpsc::UnboundedReceiver<HostEvent>> {
        self.check_available()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        self.check_available()?;
        Ok(self.tabs.lock().unwrap().clone())
    }
}
