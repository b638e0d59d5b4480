//! Handler readiness and the startup retry policy

use std::time::Duration;

use tokio::sync::watch;

use crate::domain::CacheError;

/// Default pause between liveness probes
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(10);

/// How the startup liveness probe is retried after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause between two probes
    pub interval: Duration,
    /// Maximum number of retries, `None` retries until success and zero
    /// gives up after the initial probe
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Sets the pause between probes
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Bounds the number of retries
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Returns true once `attempt` retries have used up the policy
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempt >= max)
    }
}

/// Readiness of a cache handler, published on a watch channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessState {
    /// `initialize` has not been called
    #[default]
    Pending,
    /// A liveness probe is running; attempt 0 is the initial probe
    Probing { attempt: u32 },
    /// The store answered, operations are permitted
    Ready,
    /// The retry policy gave up
    Exhausted { attempts: u32 },
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Exhausted { .. })
    }
}

/// Outcome of `CacheHandler::initialize`
#[derive(Debug)]
pub enum Initialization {
    /// The store answered the first probe
    Ready,
    /// The first probe failed and a background retry loop is running
    Retrying(RetryHandle),
}

impl Initialization {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Waits until the handler is ready or the retry loop gives up
    pub async fn wait(self) -> Result<(), CacheError> {
        match self {
            Self::Ready => Ok(()),
            Self::Retrying(handle) => handle.wait().await,
        }
    }
}

/// Observes a running retry loop
#[derive(Debug, Clone)]
pub struct RetryHandle {
    state: watch::Receiver<ReadinessState>,
}

impl RetryHandle {
    pub fn new(state: watch::Receiver<ReadinessState>) -> Self {
        Self { state }
    }

    /// Current readiness state
    pub fn state(&self) -> ReadinessState {
        *self.state.borrow()
    }

    /// Resolves once the loop settles.
    ///
    /// Returns `NotReady` if the handler was dropped before becoming ready.
    pub async fn wait(mut self) -> Result<(), CacheError> {
        let state = *self
            .state
            .wait_for(ReadinessState::is_settled)
            .await
            .map_err(|_| CacheError::NotReady)?;

        match state {
            ReadinessState::Exhausted { attempts } => Err(CacheError::RetriesExhausted { attempts }),
            _ => Ok(()),
        }
    }
}
