//! Incremental follow of one source calendar into a target.
//!
//! Each run lists only what changed since the stored watermark, with series
//! unexpanded and deletions included, and turns every changed event into a
//! single change against the target.

pub mod recurring;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::apply::{Applicator, ApplyReport, Change};
use crate::config::{DEFAULT_CONCURRENCY, FollowScope, effective_mask};
use crate::desired::DesiredEvent;
use crate::error::{MirrorError, MirrorResult};
use crate::event::{Event, EventStatus};
use crate::identity::SyncIdentity;
use crate::transport::{EventTransport, ListFilter, for_each_event};
use crate::watermark::WatermarkStore;

use recurring::ExceptionOverride;

/// Result of one follow run.
#[derive(Debug)]
pub struct FollowOutcome {
    /// Watermark to store for the next run
    pub watermark: Option<String>,
    pub report: ApplyReport,
}

/// Changes drawn from one incremental listing, split by apply wave.
#[derive(Debug, Default)]
struct Waves {
    direct: Vec<Change>,
    exceptions: Vec<Change>,
}

pub struct Follower {
    transport: Arc<dyn EventTransport>,
    scope: FollowScope,
    concurrency: usize,
    cancel: CancellationToken,
}

impl Follower {
    pub fn new(transport: Arc<dyn EventTransport>, scope: FollowScope) -> Self {
        Follower {
            transport,
            scope,
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

    /// Decide what a changed source event means for the target.
    ///
    /// A cancelled or hidden occurrence of a series is carried onto the
    /// mirrored instance as a cancelled exception. Any other cancelled or
    /// hidden event retracts its copies.
    pub fn classify(&self, event: &Event) -> Option<Change> {
        let hidden = event.is_cancelled() || !self.scope.is_visible(event);

        if event.recurring_event_id.is_some() {
            let Some(mut exception) = ExceptionOverride::from_source(event, &self.scope) else {
                tracing::warn!(event = %event.id, "exception without original start, skipping");
                return None;
            };
            if hidden {
                exception.status = EventStatus::Cancelled;
            }
            return Some(Change::Exception(exception));
        }

        let identity = SyncIdentity::followed(&event.id, &self.scope.id);
        if hidden {
            return Some(Change::Retract(identity));
        }

        Some(Change::Upsert(DesiredEvent::from_source(
            event,
            identity,
            effective_mask(&self.scope.mask),
            &self.scope.prefix,
        )))
    }

    /// Follow changes made since `watermark`.
    ///
    /// Masters, plain events and retractions are applied first, exceptions
    /// second, so an exception always finds a series written in the same run.
    /// Apply failures land in the report; listing failures and cancellation
    /// are errors, and no watermark should be stored for them.
    pub async fn run(&self, watermark: Option<&str>) -> MirrorResult<FollowOutcome> {
        let (waves, latest) = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(MirrorError::Cancelled),
            listed = self.list_changes(watermark) => listed?,
        };

        tracing::info!(
            scope = %self.scope.id,
            direct = waves.direct.len(),
            exceptions = waves.exceptions.len(),
            "classified changed events"
        );

        let applicator = Applicator::new(Arc::clone(&self.transport), &self.scope.target_calendar_id)
            .with_concurrency(self.concurrency)
            .with_cancellation(self.cancel.clone());

        let mut report = applicator.apply(waves.direct).await?;
        report.merge(applicator.apply(waves.exceptions).await?);

        Ok(FollowOutcome {
            watermark: latest.or_else(|| watermark.map(String::from)),
            report,
        })
    }

    /// Run from the stored watermark and store the new one.
    ///
    /// The watermark is saved even when some changes failed to apply; the
    /// failures are then returned as the error.
    pub async fn run_with_store(&self, store: &dyn WatermarkStore) -> MirrorResult<ApplyReport> {
        let mut watermarks = store.load()?;
        let prior = watermarks.get(&self.scope.id).cloned();

        let outcome = self.run(prior.as_deref()).await?;

        if let Some(watermark) = outcome.watermark {
            if prior.as_ref() != Some(&watermark) {
                tracing::debug!(scope = %self.scope.id, %watermark, "storing watermark");
                watermarks.insert(self.scope.id.clone(), watermark);
                store.save(&watermarks)?;
            }
        }

        outcome.report.into_result()
    }

    async fn list_changes(&self, watermark: Option<&str>) -> MirrorResult<(Waves, Option<String>)> {
        let calendar_id = &self.scope.source_calendar_id;
        tracing::info!(
            scope = %self.scope.id,
            calendar = %calendar_id,
            since = watermark.unwrap_or("the beginning"),
            "listing changed source events"
        );

        let mut waves = Waves::default();
        let latest = for_each_event(
            self.transport.as_ref(),
            calendar_id,
            &ListFilter::changed_since(watermark),
            |event| match self.classify(&event) {
                Some(change @ Change::Exception(_)) => waves.exceptions.push(change),
                Some(change) => waves.direct.push(change),
                None => {}
            },
        )
        .await
        .map_err(|e| MirrorError::listing(calendar_id, e))?;

        Ok((waves, latest))
    }
}
