pub mod follow;
pub mod mirror;

use anyhow::Result;

/// Fail with every scope error once all scopes have been attempted.
fn finish(failed: Vec<(String, String)>) -> Result<()> {
    if failed.is_empty() {
        return Ok(());
    }

    let details: Vec<_> = failed
        .iter()
        .map(|(scope, error)| format!("{scope}: {error}"))
        .collect();

    anyhow::bail!(
        "{} scope(s) failed\n{}",
        failed.len(),
        details.join("\n")
    )
}
