use std::sync::Arc;

use anyhow::Result;
use calmirror_core::{DateRange, EventTransport, Mirror, MirrorError, MirrorScope};
use tokio_util::sync::CancellationToken;

use crate::render::{self, Render};

pub async fn run(
    transport: Arc<dyn EventTransport>,
    scopes: Vec<MirrorScope>,
    range: DateRange,
    concurrency: usize,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<()> {
    if scopes.is_empty() {
        anyhow::bail!("No [[mirror]] scopes configured");
    }

    let mut failed = Vec::new();

    for (i, scope) in scopes.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", render::render_scope("mirror", &scope.id));

        let id = scope.id.clone();
        let mirror = Mirror::new(Arc::clone(&transport), scope, range.clone())
            .with_concurrency(concurrency)
            .with_cancellation(cancel.clone());

        let result = if dry_run {
            mirror.plan().await.map(|changes| println!("{}", changes.render()))
        } else {
            match mirror.run().await {
                Ok(outcome) => {
                    println!("{}", render::render_counts(&outcome.report, Some(outcome.unchanged)));
                    outcome.report.into_result().map(|_| ())
                }
                Err(e) => Err(e),
            }
        };

        match result {
            Ok(()) => {}
            Err(MirrorError::Cancelled) => anyhow::bail!(MirrorError::Cancelled),
            Err(e) => {
                println!("{}", render::render_error(&e));
                failed.push((id, e.to_string()));
            }
        }
    }

    super::finish(failed)
}
