//! Concurrent application of classified changes to a target calendar.
//!
//! Every change is dispatched as its own task, with at most `concurrency`
//! in flight. A failing change never stops its siblings: failures are
//! collected and reported together once everything dispatched has finished.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_CONCURRENCY;
use crate::desired::DesiredEvent;
use crate::diff::DiffKind;
use crate::error::{MirrorError, MirrorResult};
use crate::follow::recurring::{self, ExceptionOverride, Propagation};
use crate::identity::SyncIdentity;
use crate::transport::{EventTransport, TransportError};

/// One write against the target calendar.
#[derive(Debug, Clone)]
pub enum Change {
    /// Import the desired event, replacing `target_event_id` when set
    Upsert(DesiredEvent),
    /// Delete a target event by its own id
    Delete {
        event_id: String,
        identity: SyncIdentity,
    },
    /// Delete every target event carrying this identity
    Retract(SyncIdentity),
    /// Overwrite matching instances of an already-mirrored series
    Exception(ExceptionOverride),
}

impl Change {
    pub fn kind(&self) -> DiffKind {
        match self {
            Change::Upsert(desired) if desired.target_event_id.is_some() => DiffKind::Update,
            Change::Upsert(_) => DiffKind::Create,
            Change::Delete { .. } | Change::Retract(_) => DiffKind::Delete,
            Change::Exception(_) => DiffKind::Update,
        }
    }

    /// What the change is addressed by, for logs and error reports.
    pub fn key(&self) -> String {
        match self {
            Change::Upsert(desired) => desired.identity.to_string(),
            Change::Delete { event_id, .. } => event_id.clone(),
            Change::Retract(identity) => identity.to_string(),
            Change::Exception(exception) => exception.source_event_id.clone(),
        }
    }

    /// Write the change and return how many target events it touched.
    async fn execute(
        &self,
        transport: &dyn EventTransport,
        calendar_id: &str,
    ) -> Result<usize, TransportError> {
        match self {
            Change::Upsert(desired) => {
                transport.upsert_event(calendar_id, &desired.to_event()).await?;
                Ok(1)
            }
            Change::Delete { event_id, .. } => {
                transport.delete_event(calendar_id, event_id).await?;
                Ok(1)
            }
            Change::Retract(identity) => recurring::retract(transport, calendar_id, identity).await,
            Change::Exception(exception) => {
                match recurring::propagate(transport, calendar_id, exception).await? {
                    Propagation::Updated(count) => Ok(count),
                    Propagation::ParentMissing => Ok(0),
                }
            }
        }
    }
}

/// A change that could not be applied.
#[derive(Debug, Error)]
#[error("{} event {:?}: {}", .kind.verb(), .key, .source)]
pub struct ApplyError {
    pub kind: DiffKind,
    pub key: String,
    #[source]
    pub source: TransportError,
}

/// Outcome of one apply pass. Counts are target events actually written.
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failures: Vec<ApplyError>,
}

impl ApplyReport {
    fn record(&mut self, kind: DiffKind, count: usize) {
        match kind {
            DiffKind::Create => self.created += count,
            DiffKind::Update => self.updated += count,
            DiffKind::Delete => self.deleted += count,
        }
    }

    pub fn applied(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn merge(&mut self, other: ApplyReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.failures.extend(other.failures);
    }

    /// Fail with every collected error when anything went wrong.
    pub fn into_result(self) -> MirrorResult<ApplyReport> {
        if self.failures.is_empty() {
            Ok(self)
        } else {
            Err(MirrorError::Apply(self.failures))
        }
    }
}

pub struct Applicator {
    transport: Arc<dyn EventTransport>,
    calendar_id: String,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Applicator {
    pub fn new(transport: Arc<dyn EventTransport>, calendar_id: &str) -> Self {
        Applicator {
            transport,
            calendar_id: calendar_id.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply every change and wait for all of them.
    ///
    /// Returns `Err(Cancelled)` as soon as cancellation is observed while
    /// waiting for a free slot; already dispatched writes keep running
    /// detached. Individual write failures end up in the report instead.
    pub async fn apply(&self, changes: Vec<Change>) -> MirrorResult<ApplyReport> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let failures = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();
        let mut report = ApplyReport::default();

        for change in changes {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                tracing::warn!(in_flight = tasks.len(), "cancelled while dispatching changes");
                tasks.detach_all();
                return Err(MirrorError::Cancelled);
            };

            let transport = Arc::clone(&self.transport);
            let failures = Arc::clone(&failures);
            let calendar_id = self.calendar_id.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let kind = change.kind();
                let key = change.key();

                tracing::debug!(event = %key, "{} event", kind.verb());

                match change.execute(transport.as_ref(), &calendar_id).await {
                    Ok(count) => Some((kind, count)),
                    Err(source) => {
                        tracing::error!(event = %key, error = %source, "{} event failed", kind.verb());
                        failures.lock().await.push(ApplyError { kind, key, source });
                        None
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some((kind, count))) => report.record(kind, count),
                Ok(None) => {}
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => {}
            }
        }

        report.failures = std::mem::take(&mut *failures.lock().await);

        Ok(report)
    }
}
