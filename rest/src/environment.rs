//! Dependencies injected into resources

use crate::transport::Transport;
use composable_rest_core::environment::{Clock, SystemClock};
use std::fmt;
use std::sync::Arc;

/// Environment of a resource reducer and its orchestrator
///
/// A resource without a transport can still run in local mode; a resource
/// with an API target needs one.
#[derive(Clone)]
pub struct RestEnvironment {
    /// Performs HTTP round trips
    pub transport: Option<Arc<dyn Transport>>,
    /// Stamps settled requests
    pub clock: Arc<dyn Clock>,
}

impl RestEnvironment {
    /// Environment with a transport and the system clock
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
            clock: Arc::new(SystemClock),
        }
    }

    /// Environment without a transport, for local-only resources
    #[must_use]
    pub fn local() -> Self {
        Self {
            transport: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl Default for RestEnvironment {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Debug for RestEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestEnvironment")
            .field("transport", &self.transport.as_ref().map(|_| "<transport>"))
            .finish_non_exhaustive()
    }
}
