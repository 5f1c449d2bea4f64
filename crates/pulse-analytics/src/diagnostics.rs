//! Failure reporting for swallowed telemetry errors

use pulse_core::ExceptionReporter;
use tracing::error;

use crate::error::TelemetryError;

/// Log a failure and forward it to the exception sink
///
/// Telemetry never fails user-facing code, so fire-and-forget entry points
/// end here instead of returning the error.
pub(crate) fn report_failure(
    reporter: &dyn ExceptionReporter,
    component: &'static str,
    message: &str,
    err: &TelemetryError,
) {
    error!(component, error = %err, "{}", message);
    reporter.report(err);
}
