//! Shared in-memory session for the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use ruleforge::{GraphSession, SessionError, UriExpander};

/// Canned-response knowledge-graph session.
///
/// SPARQL and graph-search results are served in FIFO order; index
/// results are keyed by the active index view so similarity flows can
/// route embedding, statistics, and boosting lookups differently.
/// Executed calls are recorded for assertions.
#[derive(Default)]
pub struct MockSession {
    uri_base: String,
    sparql_results: Mutex<Vec<Vec<Value>>>,
    graph_results: Mutex<Vec<Vec<Value>>>,
    index_results: Mutex<HashMap<String, Vec<Vec<Value>>>>,
    resources: Mutex<HashMap<String, Value>>,
    sparql_view: Mutex<Option<String>>,
    index_view: Mutex<Option<String>>,
    pub executed_sparql: Mutex<Vec<(String, Option<usize>)>>,
    pub executed_patterns: Mutex<Vec<(Value, Option<usize>)>>,
    pub executed_index_bodies: Mutex<Vec<(Option<String>, Value)>>,
}

impl MockSession {
    pub fn new(uri_base: &str) -> Self {
        Self {
            uri_base: uri_base.to_string(),
            ..Self::default()
        }
    }

    pub fn push_sparql_result(&self, records: Vec<Value>) {
        self.sparql_results.lock().unwrap().push(records);
    }

    pub fn push_graph_result(&self, records: Vec<Value>) {
        self.graph_results.lock().unwrap().push(records);
    }

    /// Queues index records served while `view` is active; "" queues for
    /// the default view.
    pub fn push_index_result(&self, view: &str, records: Vec<Value>) {
        self.index_results
            .lock()
            .unwrap()
            .entry(view.to_string())
            .or_default()
            .push(records);
    }

    pub fn insert_resource(&self, id: &str, resource: Value) {
        self.resources
            .lock()
            .unwrap()
            .insert(id.to_string(), resource);
    }

    fn pop(queue: &Mutex<Vec<Vec<Value>>>) -> Vec<Value> {
        let mut guard = queue.lock().unwrap();
        if guard.is_empty() {
            Vec::new()
        } else {
            guard.remove(0)
        }
    }
}

impl UriExpander for MockSession {
    fn expand_short_uri(&self, short_form: &str) -> Result<String, SessionError> {
        if short_form.starts_with("http") {
            return Ok(short_form.to_string());
        }
        Ok(format!("{}{short_form}", self.uri_base))
    }
}

impl GraphSession for MockSession {
    fn run_graph_search(
        &self,
        pattern: &Value,
        limit: Option<usize>,
        _debug: bool,
    ) -> Result<Vec<Value>, SessionError> {
        self.executed_patterns
            .lock()
            .unwrap()
            .push((pattern.clone(), limit));
        Ok(Self::pop(&self.graph_results))
    }

    fn run_sparql(
        &self,
        query_text: &str,
        limit: Option<usize>,
        _debug: bool,
    ) -> Result<Vec<Value>, SessionError> {
        self.executed_sparql
            .lock()
            .unwrap()
            .push((query_text.to_string(), limit));
        Ok(Self::pop(&self.sparql_results))
    }

    fn run_index_query(
        &self,
        body: &Value,
        _limit: Option<usize>,
        _debug: bool,
    ) -> Result<Vec<Value>, SessionError> {
        let view = self.active_index_view();
        self.executed_index_bodies
            .lock()
            .unwrap()
            .push((view.clone(), body.clone()));
        let key = view.unwrap_or_default();
        let mut guard = self.index_results.lock().unwrap();
        let records = match guard.get_mut(&key) {
            Some(queue) if !queue.is_empty() => queue.remove(0),
            _ => Vec::new(),
        };
        Ok(records)
    }

    fn retrieve_by_id(&self, id: &str, _revision: Option<u64>) -> Result<Value, SessionError> {
        self.resources
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| SessionError::new(format!("resource not found: {id}")))
    }

    fn active_sparql_view(&self) -> Option<String> {
        self.sparql_view.lock().unwrap().clone()
    }

    fn set_active_sparql_view(&self, view: Option<&str>) -> Result<(), SessionError> {
        *self.sparql_view.lock().unwrap() = view.map(ToString::to_string);
        Ok(())
    }

    fn active_index_view(&self) -> Option<String> {
        self.index_view.lock().unwrap().clone()
    }

    fn set_active_index_view(&self, view: Option<&str>) -> Result<(), SessionError> {
        *self.index_view.lock().unwrap() = view.map(ToString::to_string);
        Ok(())
    }
}
