use crate::catalog::Selection;
use crate::error::{FetchError, PublishError};
use crate::meter::{MeasurementSource, Snapshot};
use crate::metric_collector::MetricCollector;
use crate::registration::Registration;
use log::{debug, error, warn};

/// What a single cycle ended with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing was published.
    FetchFailed,
    /// Discovery was due and failed; state was still published.
    DiscoveryFailed,
    /// State publishing failed. `registered` tells whether discovery went out this cycle.
    StateFailed { registered: bool },
    Published { registered: bool },
}

/// Poll, transform and publish for one device.
///
/// Cycles take `&mut self`, so a pipeline can only ever run one cycle at a
/// time and the registration check-and-set is never raced.
pub struct Pipeline<S: MeasurementSource, C: MetricCollector> {
    source: S,
    collector: C,
    selection: Selection,
    registration: Registration,
}

impl<S: MeasurementSource, C: MetricCollector> Pipeline<S, C> {
    pub fn new(source: S, collector: C, selection: Selection) -> Self {
        Self {
            source,
            collector,
            selection,
            registration: Registration::new(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn is_registered(&self) -> bool {
        self.registration.is_registered()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }

    pub fn collector_mut(&mut self) -> &mut C {
        &mut self.collector
    }

    /// Runs one fetch, registers discovery metadata if that has not happened
    /// yet, then publishes the current state. Every error is logged and
    /// contained; the pipeline stays usable for the next cycle.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        let snapshot = match self.fetch() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Unable to fetch data from the Meetstekker: {e}");
                return CycleOutcome::FetchFailed;
            }
        };
        debug!("snapshot with {} measurements", snapshot.len());

        let collector = &mut self.collector;
        let selection = &self.selection;
        let registered = match self.registration.register_with(|| {
            let published = collector.publish_discovery(selection, &snapshot)?;
            debug!("published {published} discovery documents");
            Ok::<(), PublishError>(())
        }) {
            Ok(registered) => Some(registered),
            Err(e) => {
                error!("Discovery publishing failed, retrying next cycle: {e}");
                None
            }
        };

        // state goes out whether or not discovery succeeded
        let state = self.collector.publish_state(&self.selection, &snapshot);
        if let Err(e) = &state {
            warn!("State publishing failed: {e}");
        }

        match (registered, state.is_ok()) {
            (Some(registered), true) => CycleOutcome::Published { registered },
            (Some(registered), false) => CycleOutcome::StateFailed { registered },
            (None, true) => CycleOutcome::DiscoveryFailed,
            (None, false) => CycleOutcome::StateFailed { registered: false },
        }
    }

    /// A snapshot that carries every selected measurement.
    fn fetch(&mut self) -> Result<Snapshot, FetchError> {
        let snapshot = self.source.fetch()?;
        self.selection.readings(&snapshot)?;
        Ok(snapshot)
    }

    /// Tears down the broker session.
    pub fn stop(mut self) -> Result<(), PublishError> {
        self.collector.shutdown()
    }
}
