//! Full reconciliation of one mirror scope.
//!
//! Build the desired state from every source, drop excluded identities,
//! diff against the target, then apply. Everything before the apply phase
//! is read-only and sequential.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::apply::{Applicator, ApplyReport};
use crate::config::{DEFAULT_CONCURRENCY, MirrorScope};
use crate::date_range::DateRange;
use crate::desired::DesiredState;
use crate::diff::ChangeSet;
use crate::error::{MirrorError, MirrorResult};
use crate::transport::EventTransport;

/// Result of one mirror run.
#[derive(Debug)]
pub struct MirrorOutcome {
    pub report: ApplyReport,
    pub unchanged: usize,
}

pub struct Mirror {
    transport: Arc<dyn EventTransport>,
    scope: MirrorScope,
    range: DateRange,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Mirror {
    pub fn new(transport: Arc<dyn EventTransport>, scope: MirrorScope, range: DateRange) -> Self {
        Mirror {
            transport,
            scope,
            range,
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

    /// Compute the changes a run would apply, without writing anything.
    pub async fn plan(&self) -> MirrorResult<ChangeSet> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(MirrorError::Cancelled),
            planned = self.compute_changes() => planned,
        }
    }

    /// Plan and apply.
    ///
    /// Apply failures are collected in the report rather than returned.
    pub async fn run(&self) -> MirrorResult<MirrorOutcome> {
        let changes = self.plan().await?;
        let unchanged = changes.unchanged.len();

        if changes.is_empty() {
            tracing::info!(scope = %self.scope.id, "target already up to date");
        }

        let report = Applicator::new(Arc::clone(&self.transport), &self.scope.target_calendar_id)
            .with_concurrency(self.concurrency)
            .with_cancellation(self.cancel.clone())
            .apply(changes.into_changes())
            .await?;

        Ok(MirrorOutcome { report, unchanged })
    }

    async fn compute_changes(&self) -> MirrorResult<ChangeSet> {
        let transport = self.transport.as_ref();

        let mut desired = DesiredState::build(transport, &self.scope, &self.range).await?;
        let excluded = desired.apply_exclusions(transport, &self.scope, &self.range).await?;

        tracing::info!(
            scope = %self.scope.id,
            desired = desired.len(),
            excluded,
            "built desired state"
        );

        ChangeSet::against_target(transport, &self.scope.target_calendar_id, desired, &self.range)
            .await
    }
}
