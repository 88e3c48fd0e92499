use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use calmirror_core::{EventTransport, FileWatermarkStore, FollowScope, Follower, MirrorError};
use tokio_util::sync::CancellationToken;

use crate::render;

pub async fn run(
    transport: Arc<dyn EventTransport>,
    scopes: Vec<FollowScope>,
    status_path: &Path,
    concurrency: usize,
    cancel: CancellationToken,
) -> Result<()> {
    if scopes.is_empty() {
        anyhow::bail!("No [[follow]] scopes configured");
    }

    let store = FileWatermarkStore::new(status_path);
    let mut failed = Vec::new();

    for (i, scope) in scopes.into_iter().enumerate() {
        if i > 0 {
            println!();
        }
        println!("{}", render::render_scope("follow", &scope.id));

        let id = scope.id.clone();
        let follower = Follower::new(Arc::clone(&transport), scope)
            .with_concurrency(concurrency)
            .with_cancellation(cancel.clone());

        match follower.run_with_store(&store).await {
            Ok(report) => println!("{}", render::render_counts(&report, None)),
            Err(MirrorError::Cancelled) => anyhow::bail!(MirrorError::Cancelled),
            Err(e) => {
                println!("{}", render::render_error(&e));
                failed.push((id, e.to_string()));
            }
        }
    }

    super::finish(failed)
}
