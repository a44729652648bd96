use crate::catalog::Selection;
use crate::error::PublishError;
use crate::meter::Snapshot;

/// Output side of the pipeline.
pub trait MetricCollector {
    /// Publishes one discovery document per selected measurement. Returns the
    /// number of documents published; any failure aborts the batch.
    fn publish_discovery(
        &mut self,
        selection: &Selection,
        snapshot: &Snapshot,
    ) -> Result<usize, PublishError>;

    /// Publishes the current values of all selected measurements as one message.
    fn publish_state(&mut self, selection: &Selection, snapshot: &Snapshot)
        -> Result<(), PublishError>;

    fn shutdown(&mut self) -> Result<(), PublishError>;
}
