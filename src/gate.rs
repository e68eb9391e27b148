//! Initialization gate: no tool runs before the backend is ready
//!
//! The first caller of [`InitGate::await_ready`] starts a single polling
//! loop against [`Backend::is_ready`]; every concurrent or later caller
//! shares its outcome. Transient probe failures are polled through; a
//! rejected credential or unknown environment fails the gate on the spot.
//! A failed gate stays failed.

use crate::error::{AdapterError, BackendError, ErrorKind, Result};
use crate::provider::Backend;
use crate::translate::table_for;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::{Instant, MissedTickBehavior};

/// Default time allowed for the backend to become ready
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default readiness probe interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle of the backend connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Nobody asked for the backend yet
    Uninitialized,
    /// The polling loop is running
    Initializing,
    /// Probe succeeded; tools may run
    Ready,
    /// Timed out; no tool will ever run
    Failed,
    /// Shut down; resources released
    Closed,
}

/// Readiness gate shared by every dispatch
pub struct InitGate {
    backend: Arc<dyn Backend>,
    state: RwLock<ClientState>,
    outcome: OnceCell<Result<()>>,
    timeout: Duration,
    poll_interval: Duration,
}

impl InitGate {
    /// Gate with the default 100 ms probe interval
    pub fn new(backend: Arc<dyn Backend>, timeout: Duration) -> Self {
        Self {
            backend,
            state: RwLock::new(ClientState::Uninitialized),
            outcome: OnceCell::new(),
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override the probe interval
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait until the backend is ready, starting the polling loop if needed
    ///
    /// Returns immediately once ready. After a timeout every call returns
    /// the same `InitTimeout` error.
    pub async fn await_ready(&self) -> Result<()> {
        if self.state() == ClientState::Closed {
            return Err(self.closed_error());
        }

        self.outcome
            .get_or_init(|| self.initialize())
            .await
            .clone()?;

        if self.state() == ClientState::Closed {
            return Err(self.closed_error());
        }
        Ok(())
    }

    /// Release backend resources; later calls to `await_ready` fail
    pub async fn shutdown(&self) {
        let previous = {
            let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, ClientState::Closed)
        };

        if previous == ClientState::Closed {
            return;
        }

        self.backend.close().await;
        tracing::info!(
            backend = self.backend.name(),
            previous = ?previous,
            "Backend shut down"
        );
    }

    async fn initialize(&self) -> Result<()> {
        self.set_state(ClientState::Initializing);
        tracing::info!(
            backend = self.backend.name(),
            timeout_ms = self.timeout.as_millis() as u64,
            "Waiting for backend to become ready"
        );

        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_error: Option<String> = None;
        let mut attempts: u32 = 0;

        loop {
            ticker.tick().await;
            attempts += 1;

            match tokio::time::timeout_at(deadline, self.backend.is_ready()).await {
                Ok(Ok(true)) => {
                    self.set_state(ClientState::Ready);
                    tracing::info!(
                        backend = self.backend.name(),
                        attempts,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Backend ready"
                    );
                    return Ok(());
                }
                Ok(Ok(false)) => {
                    tracing::debug!(backend = self.backend.name(), attempts, "Backend not ready");
                }
                Ok(Err(e)) if !is_retryable(self.backend.name(), &e) => {
                    let err = self.probe_rejected(e);
                    self.set_state(ClientState::Failed);
                    tracing::error!(
                        backend = self.backend.name(),
                        attempts,
                        error = %err,
                        "Backend rejected readiness probe"
                    );
                    return Err(err);
                }
                Ok(Err(e)) => {
                    tracing::debug!(
                        backend = self.backend.name(),
                        attempts,
                        error = %e,
                        "Readiness probe failed"
                    );
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    tracing::debug!(
                        backend = self.backend.name(),
                        attempts,
                        "Readiness probe hung"
                    );
                }
            }

            if Instant::now() >= deadline {
                break;
            }
        }

        self.set_state(ClientState::Failed);
        let err = AdapterError::InitTimeout {
            backend: self.backend.name().to_string(),
            elapsed: started.elapsed(),
            timeout: self.timeout,
            last_error,
        };
        tracing::error!(
            backend = self.backend.name(),
            attempts,
            error = %err,
            "Backend initialization failed"
        );
        Err(err)
    }

    /// Forward transition; a closed gate stays closed
    fn set_state(&self, next: ClientState) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != ClientState::Closed {
            *state = next;
        }
    }

    /// Error for a probe failure that polling cannot fix
    fn probe_rejected(&self, err: BackendError) -> AdapterError {
        let name = self.backend.name();
        let table = table_for(name);
        match table.classify(&err) {
            ErrorKind::UnauthorizedError => AdapterError::Configuration(format!(
                "{} rejected the credential, check {}: {}",
                name, table.credential_hint, err
            )),
            ErrorKind::NotFoundError => AdapterError::Configuration(format!(
                "{} does not know the configured project or environment: {}",
                name, err
            )),
            _ => AdapterError::backend(name, "Readiness probe failed", err),
        }
    }

    fn closed_error(&self) -> AdapterError {
        AdapterError::Closed {
            backend: self.backend.name().to_string(),
        }
    }
}

/// Only transient failures (transport, throttling, 5xx) are worth polling again
fn is_retryable(backend: &str, err: &BackendError) -> bool {
    table_for(backend).classify(err) == ErrorKind::UpstreamError
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::memory::{ops, MemoryBackend, Readiness};
    use crate::provider::Platform;

    fn backend(readiness: Readiness) -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new(Platform::FeatureFlags).with_readiness(readiness))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_immediately() {
        let b = backend(Readiness::Immediate);
        let gate = InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT);
        assert_eq!(gate.state(), ClientState::Uninitialized);

        gate.await_ready().await.unwrap();
        assert_eq!(gate.state(), ClientState::Ready);

        gate.await_ready().await.unwrap();
        assert_eq!(b.calls(ops::IS_READY).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_ready_times_out() {
        let b = backend(Readiness::Never);
        let gate = InitGate::new(b.clone(), Duration::from_secs(1));

        let started = Instant::now();
        let err = gate.await_ready().await.unwrap_err();
        let waited = started.elapsed();

        assert!(matches!(err, AdapterError::InitTimeout { .. }));
        assert!(waited >= Duration::from_secs(1));
        assert!(waited <= Duration::from_millis(1100));
        assert_eq!(gate.state(), ClientState::Failed);

        // Probes every 100ms: t=0, 100, ..., 1000
        assert_eq!(b.calls(ops::IS_READY).await, 11);

        // Failure is sticky and does not start another loop
        assert!(gate.await_ready().await.is_err());
        assert_eq!(b.calls(ops::IS_READY).await, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_a_few_polls() {
        let b = backend(Readiness::After(Duration::from_millis(250)));
        let gate = InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT);
        gate.await_ready().await.unwrap();
        // t=0, 100, 200 not ready; t=300 ready
        assert_eq!(b.calls(ops::IS_READY).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_loop() {
        let b = backend(Readiness::After(Duration::from_millis(250)));
        let gate = Arc::new(InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.await_ready().await })
            })
            .collect();
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(b.calls(ops::IS_READY).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_probe_errors_are_retried_and_kept() {
        let b = Arc::new(
            MemoryBackend::new(Platform::FeatureFlags)
                .with_failure(ops::IS_READY, BackendError::status(503, "maintenance")),
        );
        let gate = InitGate::new(b.clone(), Duration::from_millis(300));

        match gate.await_ready().await.unwrap_err() {
            AdapterError::InitTimeout { last_error, .. } => {
                assert!(last_error.unwrap().contains("maintenance"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // t=0, 100, 200, 300
        assert_eq!(b.calls(ops::IS_READY).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_errors_are_retried() {
        let b = Arc::new(
            MemoryBackend::new(Platform::FeatureFlags)
                .with_failure(ops::IS_READY, BackendError::Transport("refused".into())),
        );
        let gate = InitGate::new(b.clone(), Duration::from_millis(200));

        let err = gate.await_ready().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InitTimeoutError);
        assert_eq!(b.calls(ops::IS_READY).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_credential_fails_on_first_probe() {
        let b = Arc::new(
            MemoryBackend::new(Platform::FeatureFlags)
                .with_failure(ops::IS_READY, BackendError::status(401, "bad token")),
        );
        let gate = InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT);

        let started = Instant::now();
        let err = gate.await_ready().await.unwrap_err();

        assert!(started.elapsed() < DEFAULT_POLL_INTERVAL);
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert!(err.to_string().contains("bad token"));
        assert_eq!(gate.state(), ClientState::Failed);
        assert_eq!(b.calls(ops::IS_READY).await, 1);

        // Sticky, like a timeout
        assert_eq!(
            gate.await_ready().await.unwrap_err().kind(),
            ErrorKind::ConfigurationError
        );
        assert_eq!(b.calls(ops::IS_READY).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_environment_fails_on_first_probe() {
        let b = Arc::new(
            MemoryBackend::new(Platform::FeatureFlags)
                .with_failure(ops::IS_READY, BackendError::not_found("environment staging")),
        );
        let gate = InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT);

        let err = gate.await_ready().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert_eq!(b.calls(ops::IS_READY).await, 1);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable("launchdarkly", &BackendError::status(502, "bad gateway")));
        assert!(is_retryable("launchdarkly", &BackendError::status(429, "slow down")));
        assert!(is_retryable("sentry", &BackendError::Transport("reset".into())));
        assert!(!is_retryable("launchdarkly", &BackendError::status(403, "forbidden")));
        assert!(!is_retryable("sentry", &BackendError::Decode("eof".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_backend() {
        let b = backend(Readiness::Immediate);
        let gate = InitGate::new(b.clone(), DEFAULT_INIT_TIMEOUT);
        gate.await_ready().await.unwrap();

        gate.shutdown().await;
        assert_eq!(gate.state(), ClientState::Closed);
        assert!(b.is_closed());
        assert!(matches!(
            gate.await_ready().await,
            Err(AdapterError::Closed { .. })
        ));

        // Second shutdown is a no-op
        gate.shutdown().await;
    }
}
