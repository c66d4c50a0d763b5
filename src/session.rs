//! Knowledge-graph session collaborator.
//!
//! The engine never talks to a backend directly: every network capability
//! it needs is expressed by the [`GraphSession`] trait and provided
//! externally. The session may hold one active "view" (index/endpoint
//! override) at a time; the scoped guards in this module guarantee that a
//! view switched for one query is restored afterwards on every exit path,
//! so view state cannot leak into unrelated executions.

use serde_json::Value;
use tracing::warn;

use crate::error::SessionError;

/// Expands a short-form identifier to its full URI.
///
/// Split out of [`GraphSession`] so the parameter formatter depends on
/// exactly the capability it uses.
pub trait UriExpander {
    /// Expands `short_form` to a full URI.
    fn expand_short_uri(&self, short_form: &str) -> Result<String, SessionError>;
}

/// Capability contract the engine requires from the knowledge-graph
/// client session.
///
/// All executions are synchronous round-trips. Result records are plain
/// JSON objects as normalized by the implementation; records returned by
/// [`run_index_query`](Self::run_index_query) preserve the backend-native
/// `@id` and `_score` fields, which the similarity engine reads.
///
/// Mutating the active view takes `&self`: implementations are expected
/// to use interior mutability, since one session is typically shared
/// across many rule evaluations.
pub trait GraphSession: UriExpander + Send + Sync {
    /// Runs a structured graph search.
    fn run_graph_search(
        &self,
        pattern: &Value,
        limit: Option<usize>,
        debug: bool,
    ) -> Result<Vec<Value>, SessionError>;

    /// Runs a raw SPARQL query against the active SPARQL view.
    fn run_sparql(
        &self,
        query_text: &str,
        limit: Option<usize>,
        debug: bool,
    ) -> Result<Vec<Value>, SessionError>;

    /// Runs a raw Elasticsearch query against the active index view.
    fn run_index_query(
        &self,
        body: &Value,
        limit: Option<usize>,
        debug: bool,
    ) -> Result<Vec<Value>, SessionError>;

    /// Retrieves a resource by id, optionally at a pinned revision.
    fn retrieve_by_id(&self, id: &str, revision: Option<u64>) -> Result<Value, SessionError>;

    /// Currently active SPARQL view override, if any.
    fn active_sparql_view(&self) -> Option<String>;

    /// Switches the active SPARQL view; `None` restores the default.
    fn set_active_sparql_view(&self, view: Option<&str>) -> Result<(), SessionError>;

    /// Currently active index view override, if any.
    fn active_index_view(&self) -> Option<String>;

    /// Switches the active index view; `None` restores the default.
    fn set_active_index_view(&self, view: Option<&str>) -> Result<(), SessionError>;
}

/// Scoped SPARQL view override; restores the prior view on drop.
pub struct SparqlViewGuard<'a> {
    session: &'a dyn GraphSession,
    previous: Option<String>,
}

impl<'a> SparqlViewGuard<'a> {
    /// Switches the session's active SPARQL view to `view`.
    pub fn switch(session: &'a dyn GraphSession, view: &str) -> Result<Self, SessionError> {
        let previous = session.active_sparql_view();
        session.set_active_sparql_view(Some(view))?;
        Ok(Self { session, previous })
    }
}

impl Drop for SparqlViewGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self
            .session
            .set_active_sparql_view(self.previous.as_deref())
        {
            warn!(%error, "failed to restore SPARQL view");
        }
    }
}

/// Scoped index view override; restores the prior view on drop.
pub struct IndexViewGuard<'a> {
    session: &'a dyn GraphSession,
    previous: Option<String>,
}

impl<'a> IndexViewGuard<'a> {
    /// Switches the session's active index view to `view`.
    pub fn switch(session: &'a dyn GraphSession, view: &str) -> Result<Self, SessionError> {
        let previous = session.active_index_view();
        session.set_active_index_view(Some(view))?;
        Ok(Self { session, previous })
    }
}

impl Drop for IndexViewGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.session.set_active_index_view(self.previous.as_deref()) {
            warn!(%error, "failed to restore index view");
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! In-memory session used by the unit tests of the execution modules.

    use std::collections::HashMap;
    use std::sync::Mutex;

    use serde_json::Value;

    use super::{GraphSession, SessionError, UriExpander};

    /// Canned-response session.
    ///
    /// Graph/SPARQL results are served in FIFO order; index results are
    /// keyed by the active index view so similarity flows can route
    /// embedding, statistics, and boosting lookups differently. Executed
    /// query texts and bodies are recorded for assertions.
    #[derive(Default)]
    pub struct FixtureSession {
        pub uri_base: String,
        sparql_results: Mutex<Vec<Vec<Value>>>,
        graph_results: Mutex<Vec<Vec<Value>>>,
        index_results: Mutex<HashMap<String, Vec<Vec<Value>>>>,
        resources: Mutex<HashMap<String, Value>>,
        sparql_view: Mutex<Option<String>>,
        index_view: Mutex<Option<String>>,
        pub executed_sparql: Mutex<Vec<String>>,
        pub executed_patterns: Mutex<Vec<Value>>,
        pub executed_index_bodies: Mutex<Vec<(Option<String>, Value)>>,
    }

    impl FixtureSession {
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

        /// Queues index records served while `view` is active. Use ""
        /// for the default view.
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

    impl UriExpander for FixtureSession {
        fn expand_short_uri(&self, short_form: &str) -> Result<String, SessionError> {
            if short_form.starts_with("http") {
                return Ok(short_form.to_string());
            }
            Ok(format!("{}{short_form}", self.uri_base))
        }
    }

    impl GraphSession for FixtureSession {
        fn run_graph_search(
            &self,
            pattern: &Value,
            _limit: Option<usize>,
            _debug: bool,
        ) -> Result<Vec<Value>, SessionError> {
            self.executed_patterns.lock().unwrap().push(pattern.clone());
            Ok(Self::pop(&self.graph_results))
        }

        fn run_sparql(
            &self,
            query_text: &str,
            _limit: Option<usize>,
            _debug: bool,
        ) -> Result<Vec<Value>, SessionError> {
            self.executed_sparql
                .lock()
                .unwrap()
                .push(query_text.to_string());
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
}

#[cfg(test)]
mod tests {
    use super::fixtures::FixtureSession;
    use super::*;

    #[test]
    fn test_sparql_view_guard_restores_previous_view() {
        let session = FixtureSession::new("http://example.org/");
        session.set_active_sparql_view(Some("default-ish")).unwrap();

        {
            let _guard = SparqlViewGuard::switch(&session, "override").unwrap();
            assert_eq!(session.active_sparql_view().as_deref(), Some("override"));
        }
        assert_eq!(session.active_sparql_view().as_deref(), Some("default-ish"));
    }

    #[test]
    fn test_index_view_guard_restores_default() {
        let session = FixtureSession::new("http://example.org/");
        {
            let _guard = IndexViewGuard::switch(&session, "override").unwrap();
            assert_eq!(session.active_index_view().as_deref(), Some("override"));
        }
        assert_eq!(session.active_index_view(), None);
    }
}
