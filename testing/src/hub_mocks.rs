//! In-memory [`HubTransport`] for registry tests.
//!
//! - [`MockHubTransport`]: records every connection it builds, can script
//!   start failures and handshake latency
//! - [`MockHubConnection`]: counts start/stop calls and lets tests
//!   [`emit`](MockHubConnection::emit) server events to registered handlers
//!   or [`close`](MockHubConnection::close) the connection under the registry

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use boxoffice_core::hub::{
    EventHandler, HubConnection, HubError, HubFuture, HubOptions, HubTransport,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable hub transport.
///
/// # Example
///
/// ```
/// use boxoffice_testing::MockHubTransport;
/// use boxoffice_core::hub::{HubOptions, HubTransport};
///
/// let transport = MockHubTransport::new();
/// let _connection = transport.build(HubOptions::new("http://localhost/hubs/newsHub"));
/// assert_eq!(transport.built_count(), 1);
/// ```
#[derive(Default)]
pub struct MockHubTransport {
    built: Mutex<Vec<Arc<MockHubConnection>>>,
    start_failures: Mutex<VecDeque<HubError>>,
    start_delay: Mutex<Option<Duration>>,
}

impl MockHubTransport {
    /// Transport whose connections start successfully and immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next built connection fail its `start` with `error`.
    pub fn fail_next_start(&self, error: HubError) {
        self.start_failures.lock().unwrap().push_back(error);
    }

    /// Delay the handshake of every connection built from now on.
    pub fn set_start_delay(&self, delay: Duration) {
        *self.start_delay.lock().unwrap() = Some(delay);
    }

    /// Number of connection objects built so far.
    #[must_use]
    pub fn built_count(&self) -> usize {
        self.built.lock().unwrap().len()
    }

    /// The `index`-th connection built (0-based).
    #[must_use]
    pub fn connection(&self, index: usize) -> Option<Arc<MockHubConnection>> {
        self.built.lock().unwrap().get(index).cloned()
    }
}

impl HubTransport for MockHubTransport {
    fn build(&self, options: HubOptions) -> Arc<dyn HubConnection> {
        let connection = Arc::new(MockHubConnection {
            options,
            handlers: Mutex::new(HashMap::new()),
            start_failure: Mutex::new(self.start_failures.lock().unwrap().pop_front()),
            stop_failure: Mutex::new(None),
            start_delay: *self.start_delay.lock().unwrap(),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.built.lock().unwrap().push(Arc::clone(&connection));
        connection
    }
}

/// Connection object produced by [`MockHubTransport`].
pub struct MockHubConnection {
    options: HubOptions,
    handlers: Mutex<HashMap<String, Vec<EventHandler>>>,
    start_failure: Mutex<Option<HubError>>,
    stop_failure: Mutex<Option<HubError>>,
    start_delay: Option<Duration>,
    starts: AtomicUsize,
    stops: AtomicUsize,
    closed: AtomicBool,
}

impl MockHubConnection {
    /// Options the connection was built with.
    #[must_use]
    pub fn options(&self) -> HubOptions {
        self.options.clone()
    }

    /// Number of `start` calls.
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of `stop` calls.
    #[must_use]
    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Make the next `stop` fail with `error`.
    pub fn fail_stop(&self, error: HubError) {
        *self.stop_failure.lock().unwrap() = Some(error);
    }

    /// Handlers registered for `event` (case-insensitive).
    #[must_use]
    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers
            .lock()
            .unwrap()
            .get(&event.to_lowercase())
            .map_or(0, Vec::len)
    }

    /// Simulate the transport giving up: the server closed without allowing
    /// a reconnect or every reconnect attempt failed.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Deliver a server event to the registered handlers, as the hub would.
    pub fn emit(&self, event: &str, args: &[Value]) {
        let handlers = self
            .handlers
            .lock()
            .unwrap()
            .get(&event.to_lowercase())
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            handler(args);
        }
    }
}

impl HubConnection for MockHubConnection {
    fn url(&self) -> &str {
        &self.options.url
    }

    fn start(&self) -> HubFuture<'_> {
        Box::pin(async move {
            self.starts.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.start_delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.start_failure.lock().unwrap().take() {
                return Err(error);
            }
            if self.stop_count() > 0 {
                return Err(HubError::Transport(
                    "connection was stopped during the handshake".to_string(),
                ));
            }
            Ok(())
        })
    }

    fn stop(&self) -> HubFuture<'_> {
        Box::pin(async move {
            self.stops.fetch_add(1, Ordering::SeqCst);
            match self.stop_failure.lock().unwrap().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn on(&self, event: &str, handler: EventHandler) {
        self.handlers
            .lock()
            .unwrap()
            .entry(event.to_lowercase())
            .or_default()
            .push(handler);
    }

    fn off(&self, event: &str) {
        self.handlers.lock().unwrap().remove(&event.to_lowercase());
    }
}
