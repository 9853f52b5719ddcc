//! Concurrent route registry.
//!
//! # Responsibilities
//! - Own the current set of registered endpoints
//! - Publish every mutation as a fresh immutable snapshot
//! - Resolve (method, path) to an endpoint plus extracted path params
//!
//! # Design Decisions
//! - Readers are lock-free: `resolve` loads the current snapshot through
//!   `ArcSwap` and never blocks on writers
//! - Writers serialize on a mutex, rebuild the table and publish it whole,
//!   so no reader ever observes a partially-updated table
//! - Tie-break: more literal segments wins, then earliest registration;
//!   redefinition keeps the original slot's sequence number

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use axum::http::Method;

use crate::routing::endpoint::{
    now_epoch, EndpointDefinition, EndpointRef, EndpointSummary, RegisteredEndpoint,
};
use crate::routing::template::PathTemplate;
use crate::script::CompiledScript;

/// A successful route resolution.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub endpoint: EndpointRef,
    pub path_params: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct RouteTable {
    routes: Vec<EndpointRef>,
}

/// Concurrent-safe mapping from (method, path template) to endpoints.
#[derive(Debug)]
pub struct RouteRegistry {
    table: ArcSwap<RouteTable>,
    writer: Mutex<()>,
    seq: AtomicU64,
}

impl Default for RouteRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(RouteTable::default()),
            writer: Mutex::new(()),
            seq: AtomicU64::new(0),
        }
    }

    /// Insert or atomically replace the endpoint for (method, template).
    ///
    /// The script must already be compiled; a failed compile never reaches
    /// the registry. Returns true when an existing endpoint was replaced.
    pub fn register(
        &self,
        definition: EndpointDefinition,
        method: Method,
        template: PathTemplate,
        script: CompiledScript,
    ) -> bool {
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();
        let mut routes = current.routes.clone();

        let now = now_epoch();
        let existing = routes
            .iter()
            .position(|r| r.method == method && r.template.raw() == template.raw());

        let replaced = existing.is_some();
        let (seq, created_at) = match existing {
            Some(i) => (routes[i].seq, routes[i].created_at),
            None => (self.seq.fetch_add(1, Ordering::Relaxed), now),
        };

        let endpoint = Arc::new(RegisteredEndpoint {
            definition,
            method,
            template,
            script,
            seq,
            created_at,
            updated_at: now,
        });

        match existing {
            Some(i) => routes[i] = endpoint,
            None => routes.push(endpoint),
        }

        self.table.store(Arc::new(RouteTable { routes }));
        replaced
    }

    /// Remove the endpoint for (method, template). Returns true if removed.
    pub fn unregister(&self, method: &Method, template: &str) -> bool {
        let normalized = crate::routing::template::normalize(template);
        let _guard = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.table.load_full();
        let mut routes = current.routes.clone();

        let before = routes.len();
        routes.retain(|r| !(r.method == *method && r.template.raw() == normalized));
        let removed = routes.len() != before;

        if removed {
            self.table.store(Arc::new(RouteTable { routes }));
        }
        removed
    }

    /// Resolve a request against the current snapshot.
    ///
    /// Candidates are filtered by method, then template match. Of the
    /// matches, the template with the most literal segments wins; remaining
    /// ties go to the earliest-registered endpoint.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let table = self.table.load();
        let mut best: Option<RouteMatch> = None;

        for route in table.routes.iter().filter(|r| r.method == *method) {
            if let Some(params) = route.template.matches(path) {
                let better = match &best {
                    None => true,
                    Some(current) => {
                        let (lit, seq) = (
                            current.endpoint.template.literal_count(),
                            current.endpoint.seq,
                        );
                        route.template.literal_count() > lit
                            || (route.template.literal_count() == lit && route.seq < seq)
                    }
                };
                if better {
                    best = Some(RouteMatch {
                        endpoint: route.clone(),
                        path_params: params,
                    });
                }
            }
        }

        best
    }

    /// Summaries of all registered endpoints, in registration order.
    pub fn list(&self) -> Vec<EndpointSummary> {
        let table = self.table.load();
        let mut routes: Vec<&EndpointRef> = table.routes.iter().collect();
        routes.sort_by_key(|r| r.seq);
        routes.iter().map(|r| r.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.table.load().routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
