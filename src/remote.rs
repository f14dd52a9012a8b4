//! The seam between the resolver and the remote evaluation source.
//!
//! The resolver never talks to the network itself. It consumes a [`RemoteTransport`], which owns
//! the wire protocol, caching, retries and its own I/O resources.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        RwLock,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::watch;

/// The remote source's answer for one flag.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// The remote evaluated the flag. `null` is the disabled representation of a non-boolean
    /// feature, `false` the disabled representation of a boolean one.
    Success(serde_json::Value),
    /// The remote could not evaluate the flag and already applied its own fallback, returned as
    /// `value`.
    Error {
        cause: String,
        value: serde_json::Value,
    },
    /// The remote could not be reached or is not configured.
    Unavailable(String),
}

/// Per-call options forwarded to the remote transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub user: Option<String>,
    pub context: Option<String>,
    /// Extra input for script-based features.
    pub payload: Option<String>,
    pub ignore_cache: bool,
    /// Deadline for the remote round trip. Enforcing it is up to the transport.
    pub timeout: Option<Duration>,
}

impl QueryOptions {
    pub fn new() -> Self {
        QueryOptions::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Client of the remote evaluation source.
///
/// Implementations must not fail: transport-level faults are reported as
/// [`RawResult::Unavailable`].
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    async fn query_one(&self, flag_id: &str, options: &QueryOptions) -> RawResult;

    /// Query several flags at once. The default implementation issues concurrent single
    /// queries; transports that support bulk requests should override it with one round trip.
    ///
    /// Flags missing from the returned map are treated as unavailable.
    async fn query_many(
        &self,
        flag_ids: &[String],
        options: &QueryOptions,
    ) -> HashMap<String, RawResult> {
        let results = futures::future::join_all(
            flag_ids
                .iter()
                .map(|flag_id| self.query_one(flag_id, options)),
        )
        .await;

        flag_ids.iter().cloned().zip(results).collect()
    }

    fn is_ready(&self) -> bool;

    /// Wait until the transport is able to answer queries.
    async fn wait_ready(&self);
}

/// A [`RemoteTransport`] answering from a fixed in-memory table.
///
/// Useful for offline mode and tests. Flags with no entry are answered with
/// [`RawResult::Unavailable`].
pub struct InMemoryTransport {
    results: RwLock<HashMap<String, RawResult>>,
    ready: watch::Sender<bool>,
    queries: AtomicUsize,
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        let (ready, _) = watch::channel(true);
        InMemoryTransport {
            results: RwLock::new(HashMap::new()),
            ready,
            queries: AtomicUsize::new(0),
        }
    }
}

impl InMemoryTransport {
    /// Create an empty transport that reports itself ready.
    pub fn new() -> Self {
        InMemoryTransport::default()
    }

    /// Set the result returned for `flag_id`.
    pub fn set_result(&self, flag_id: impl Into<String>, result: RawResult) -> &Self {
        self.results
            .write()
            .expect("thread holding results lock should not panic")
            .insert(flag_id.into(), result);
        self
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.send_replace(ready);
    }

    /// Number of flag lookups served so far. A bulk query counts each flag.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::Relaxed)
    }

    fn lookup(&self, flag_id: &str) -> RawResult {
        self.queries.fetch_add(1, Ordering::Relaxed);

        if !self.is_ready() {
            return RawResult::Unavailable("remote source is not ready".to_owned());
        }

        self.results
            .read()
            .expect("thread holding results lock should not panic")
            .get(flag_id)
            .cloned()
            .unwrap_or_else(|| RawResult::Unavailable(format!("no result for {flag_id:?}")))
    }
}

#[async_trait]
impl RemoteTransport for InMemoryTransport {
    async fn query_one(&self, flag_id: &str, _options: &QueryOptions) -> RawResult {
        self.lookup(flag_id)
    }

    async fn query_many(
        &self,
        flag_ids: &[String],
        _options: &QueryOptions,
    ) -> HashMap<String, RawResult> {
        flag_ids
            .iter()
            .map(|flag_id| (flag_id.clone(), self.lookup(flag_id)))
            .collect()
    }

    fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    async fn wait_ready(&self) {
        let mut receiver = self.ready.subscribe();
        // Err means the sender is gone, which cannot happen while `self` is alive.
        let _ = receiver.wait_for(|ready| *ready).await;
    }
}
