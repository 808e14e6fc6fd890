//! S3-compatible object store (S3, R2, MinIO)

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client as S3Client;

use super::ObjectStore;
use crate::error::{Result, SyncError};
use crate::types::{ObjectPage, PutObjectRequest, RemoteObject};

/// Object store backed by the AWS S3 API
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    /// Wrap an already configured client
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    /// Load credentials and region from the environment
    ///
    /// `endpoint` points the client at an S3-compatible service and switches
    /// to path-style addressing.
    pub async fn from_env(endpoint: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(builder.build()),
        }
    }
}

/// Transient failures: timeouts, dispatch failures, 5xx and throttling
fn is_transient<E>(err: &SdkError<E, HttpResponse>) -> bool {
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            true
        }
        SdkError::ServiceError(service) => {
            let status = service.raw().status().as_u16();
            status == 429 || status >= 500
        }
        _ => false,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(
        &self,
        bucket: &str,
        continuation: Option<String>,
    ) -> Result<ObjectPage> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(|e| SyncError::Store(DisplayErrorContext(&e).to_string()))?;

        let objects = response
            .contents()
            .iter()
            .filter_map(|object| {
                Some(RemoteObject {
                    key: object.key()?.to_string(),
                    etag: object.e_tag().unwrap_or_default().to_string(),
                })
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(String::from)
        } else {
            None
        };

        Ok(ObjectPage { objects, next })
    }

    async fn put_object(&self, request: &PutObjectRequest) -> Result<()> {
        let body = ByteStream::from_path(&request.source)
            .await
            .map_err(|e| SyncError::Upload {
                key: request.key.clone(),
                message: e.to_string(),
                retryable: false,
            })?;

        self.client
            .put_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .body(body)
            .cache_control(&request.cache_control)
            .set_content_encoding(request.content_encoding.clone())
            .content_type(&request.content_type)
            .acl(ObjectCannedAcl::from(request.acl.as_str()))
            .send()
            .await
            .map_err(|e| SyncError::Upload {
                key: request.key.clone(),
                retryable: is_transient(&e),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        tracing::debug!("Put s3://{}/{}", request.bucket, request.key);
        Ok(())
    }
}
