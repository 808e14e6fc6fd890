//! CloudFront invalidation client

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_cloudfront::error::DisplayErrorContext;
use aws_sdk_cloudfront::types::{InvalidationBatch, Paths};
use aws_sdk_cloudfront::Client as CloudFrontClient;

use super::CdnClient;
use crate::error::{Result, SyncError};
use crate::types::{Distribution, DistributionPage};

/// CDN client backed by the CloudFront API
#[derive(Clone)]
pub struct CloudFrontCdn {
    client: CloudFrontClient,
}

impl CloudFrontCdn {
    pub fn new(client: CloudFrontClient) -> Self {
        Self { client }
    }

    /// Load credentials from the environment
    pub async fn from_env() -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self {
            client: CloudFrontClient::new(&config),
        }
    }
}

#[async_trait]
impl CdnClient for CloudFrontCdn {
    async fn list_distributions(&self, marker: Option<String>) -> Result<DistributionPage> {
        let response = self
            .client
            .list_distributions()
            .set_marker(marker)
            .send()
            .await
            .map_err(|e| SyncError::Cdn(DisplayErrorContext(&e).to_string()))?;

        let Some(list) = response.distribution_list() else {
            return Ok(DistributionPage::default());
        };

        let distributions = list
            .items()
            .iter()
            .map(|summary| Distribution {
                id: summary.id().to_string(),
                aliases: summary
                    .aliases()
                    .map(|aliases| aliases.items().to_vec())
                    .unwrap_or_default(),
            })
            .collect();

        let next = if list.is_truncated() {
            list.next_marker().map(String::from)
        } else {
            None
        };

        Ok(DistributionPage {
            distributions,
            next,
        })
    }

    async fn create_invalidation(
        &self,
        distribution_id: &str,
        caller_reference: &str,
        paths: &[String],
    ) -> Result<String> {
        let paths = Paths::builder()
            .quantity(paths.len() as i32)
            .set_items(Some(paths.to_vec()))
            .build()
            .map_err(|e| SyncError::Cdn(e.to_string()))?;

        let batch = InvalidationBatch::builder()
            .paths(paths)
            .caller_reference(caller_reference)
            .build()
            .map_err(|e| SyncError::Cdn(e.to_string()))?;

        let response = self
            .client
            .create_invalidation()
            .distribution_id(distribution_id)
            .invalidation_batch(batch)
            .send()
            .await
            .map_err(|e| SyncError::Cdn(DisplayErrorContext(&e).to_string()))?;

        Ok(response
            .invalidation()
            .map(|invalidation| invalidation.id().to_string())
            .unwrap_or_default())
    }
}
