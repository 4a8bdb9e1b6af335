//! Reporter hook: an external sink notified of every metric record.
//!
//! The sink lives outside the ledger's failure domain. Errors and panics
//! raised by a sink are logged and dropped; the local ledger append has
//! already happened by the time the sink is called.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::experiment::{Fields, MetricRecord};

/// External metric sink (a hyperparameter tuner, a dashboard client).
///
/// Any `FnMut(u64, &Fields) -> anyhow::Result<()>` closure is a sink.
///
/// ```rust
/// use track_ml::{Fields, MetricSink};
///
/// let mut seen = Vec::new();
/// let mut sink = |iteration: u64, _fields: &Fields| -> anyhow::Result<()> {
///     seen.push(iteration);
///     Ok(())
/// };
/// sink.report(4, &Fields::new()).unwrap();
/// drop(sink);
/// assert_eq!(seen, vec![4]);
/// ```
pub trait MetricSink: Send {
    /// Receive one metric record.
    ///
    /// # Errors
    ///
    /// Any error is logged by the trial and otherwise ignored.
    fn report(&mut self, iteration: u64, fields: &Fields) -> anyhow::Result<()>;
}

impl<F> MetricSink for F
where
    F: FnMut(u64, &Fields) -> anyhow::Result<()> + Send,
{
    fn report(&mut self, iteration: u64, fields: &Fields) -> anyhow::Result<()> {
        self(iteration, fields)
    }
}

/// Forward a record to `sink`, isolating its failures.
///
/// Returns `true` when the sink accepted the record.
pub(crate) fn forward(sink: &mut dyn MetricSink, record: &MetricRecord) -> bool {
    let iteration = record.iteration();
    match catch_unwind(AssertUnwindSafe(|| sink.report(iteration, record.fields()))) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            warn!(iteration, error = %format!("{err:#}"), "metric reporter failed");
            false
        }
        Err(_) => {
            warn!(iteration, "metric reporter panicked");
            false
        }
    }
}
