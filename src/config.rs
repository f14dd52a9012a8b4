use std::{sync::Arc, time::Duration};

use crate::{configuration_store::FlagConfigStore, Evaluator, RemoteTransport};

/// Configuration for [`Evaluator`].
#[derive(Clone)]
pub struct EvaluatorConfig {
    pub(crate) store: Arc<FlagConfigStore>,
    pub(crate) transport: Arc<dyn RemoteTransport>,
    pub(crate) default_timeout: Option<Duration>,
    pub(crate) ignore_cache: bool,
}

impl EvaluatorConfig {
    /// Create a configuration evaluating flags of `store` against `transport`.
    ///
    /// ```
    /// # use std::sync::Arc;
    /// # use izanami_resolver::{EvaluatorConfig, FlagConfigStore, InMemoryTransport};
    /// let store = FlagConfigStore::builder().build().unwrap();
    /// EvaluatorConfig::new(Arc::new(store), Arc::new(InMemoryTransport::new()));
    /// ```
    pub fn new(store: Arc<FlagConfigStore>, transport: Arc<dyn RemoteTransport>) -> Self {
        EvaluatorConfig {
            store,
            transport,
            default_timeout: None,
            ignore_cache: false,
        }
    }

    /// Deadline forwarded to the transport when a call does not set its own.
    pub fn default_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Ask the transport to bypass its cache on every call.
    pub fn ignore_cache(&mut self, ignore_cache: bool) -> &mut Self {
        self.ignore_cache = ignore_cache;
        self
    }

    /// Create a new [`Evaluator`] using the specified configuration.
    ///
    /// ```
    /// # use std::{sync::Arc, time::Duration};
    /// # use izanami_resolver::{Evaluator, EvaluatorConfig, FlagConfigStore, InMemoryTransport};
    /// let store = FlagConfigStore::builder().build().unwrap();
    /// let mut config = EvaluatorConfig::new(Arc::new(store), Arc::new(InMemoryTransport::new()));
    /// config.default_timeout(Duration::from_millis(500));
    /// let evaluator: Evaluator = config.to_evaluator();
    /// ```
    pub fn to_evaluator(self) -> Evaluator {
        Evaluator::new(self)
    }
}

impl std::fmt::Debug for EvaluatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorConfig")
            .field("flags", &self.store.len())
            .field("default_timeout", &self.default_timeout)
            .field("ignore_cache", &self.ignore_cache)
            .finish_non_exhaustive()
    }
}
