//! Shared collaborators handed to every controller

use std::sync::Arc;

use pulse_core::{Clock, ConnectionStatus, ConnectivityProvider, ExceptionReporter};

/// Read-only platform services used by all controllers
#[derive(Clone)]
pub struct PipelineContext {
    pub clock: Arc<dyn Clock>,
    pub connectivity: Arc<dyn ConnectivityProvider>,
    pub exception_reporter: Arc<dyn ExceptionReporter>,
}

impl PipelineContext {
    pub fn new(
        clock: Arc<dyn Clock>,
        connectivity: Arc<dyn ConnectivityProvider>,
        exception_reporter: Arc<dyn ExceptionReporter>,
    ) -> Self {
        Self {
            clock,
            connectivity,
            exception_reporter,
        }
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.current_time_millis()
    }

    pub(crate) fn connection_status(&self) -> ConnectionStatus {
        self.connectivity.current_status()
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("connection_status", &self.connection_status())
            .finish_non_exhaustive()
    }
}
