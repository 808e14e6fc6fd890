//! CDN invalidation batching
//!
//! One invalidation per run, covering every changed path, sent to the
//! first distribution that lists the target domain as an alias.

use chrono::Utc;
use uuid::Uuid;

use super::collector::ChangedKeySet;
use crate::cloud::CdnClient;
use crate::error::{Result, SyncError};

/// Unique reference for one invalidation request
pub fn caller_reference() -> String {
    format!(
        "sitesync-{}-{}",
        Utc::now().timestamp_millis(),
        Uuid::new_v4().simple()
    )
}

/// Id of the first distribution whose aliases contain `domain`
///
/// Pages are fetched only until a match is found. No match is an error;
/// an invalidation is never sent with an empty distribution id.
pub async fn resolve_distribution(cdn: &dyn CdnClient, domain: &str) -> Result<String> {
    let mut marker = None;

    loop {
        let page = cdn.list_distributions(marker.take()).await?;

        if let Some(distribution) = page
            .distributions
            .into_iter()
            .find(|d| d.aliases.iter().any(|alias| alias == domain))
        {
            return Ok(distribution.id);
        }

        match page.next {
            Some(next) => marker = Some(next),
            None => break,
        }
    }

    tracing::error!("No CDN distribution serves {}", domain);
    Err(SyncError::DistributionNotFound(domain.to_string()))
}

/// Invalidate every changed path for `domain`
///
/// Makes no CDN calls at all when nothing changed. Returns the CDN's
/// invalidation id when a batch was submitted.
pub async fn invalidate(
    cdn: &dyn CdnClient,
    domain: &str,
    changed: ChangedKeySet,
) -> Result<Option<String>> {
    if changed.is_empty() {
        tracing::info!("Nothing changed, skipping invalidation");
        return Ok(None);
    }

    let distribution_id = resolve_distribution(cdn, domain).await?;
    let reference = caller_reference();
    let paths = changed.into_vec();

    tracing::info!(
        "Invalidating {} paths on distribution {}",
        paths.len(),
        distribution_id
    );
    for path in &paths {
        tracing::debug!("Invalidate {}", path);
    }

    let id = cdn
        .create_invalidation(&distribution_id, &reference, &paths)
        .await?;
    tracing::info!("Created invalidation {} ({})", id, reference);
    Ok(Some(id))
}
