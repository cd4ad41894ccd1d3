//! AWS SDK transport for the S3 datastore.
//!
//! [`AwsObjectClient`] implements [`ObjectClient`] on top of `aws-sdk-s3`,
//! so an [`s3ds_store::S3Datastore`] can talk to Amazon S3 or any
//! S3-compatible service (MinIO, Ceph RGW, ...). A custom endpoint switches
//! the client to path-style addressing.

use std::io::Cursor;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, info};

use s3ds_store::{
    DeleteFault, ListPage, ListRequest, ObjectBody, ObjectClient, ObjectMeta, ObjectSummary,
    RemoteError, RemoteResult, S3Config,
};

/// Code used for faults that never produced a service response.
pub const TRANSPORT_ERROR: &str = "TransportError";

/// Code used for requests rejected before they were sent.
pub const INVALID_REQUEST: &str = "InvalidRequest";

/// Code used for service responses missing required data.
pub const INVALID_RESPONSE: &str = "InvalidResponse";

/// [`ObjectClient`] backed by the AWS SDK.
#[derive(Clone, Debug)]
pub struct AwsObjectClient {
    client: Client,
}

impl AwsObjectClient {
    /// Build a client from datastore settings.
    ///
    /// Static credentials are used when configured, otherwise the default
    /// AWS provider chain (environment, profile, instance metadata).
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(Region::new(config.region.clone()));
        }
        if config.has_static_credentials() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                config.session_token.clone(),
                None,
                "s3ds",
            ));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone()).force_path_style(true);
        }
        info!(
            region = %config.region,
            endpoint = config.endpoint.as_deref().unwrap_or("aws"),
            "s3 client configured"
        );
        Self::from_client(Client::from_conf(builder.build()))
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Convert an SDK failure, keeping the service error code when there is one.
fn remote_error<E, R>(err: SdkError<E, R>) -> RemoteError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match err.code() {
        Some(code) => RemoteError::new(code, err.message().unwrap_or_default()),
        None => RemoteError::new(TRANSPORT_ERROR, DisplayErrorContext(&err).to_string()),
    }
}

/// Object size from a HEAD response. A missing or negative length is a
/// malformed response, not an empty object.
fn content_length(path: &str, length: Option<i64>) -> RemoteResult<u64> {
    length
        .and_then(|len| u64::try_from(len).ok())
        .ok_or_else(|| RemoteError::new(INVALID_RESPONSE, format!("no content length for {path}")))
}

fn identifiers(paths: &[String]) -> RemoteResult<Vec<ObjectIdentifier>> {
    paths
        .iter()
        .map(|path| {
            ObjectIdentifier::builder()
                .key(path)
                .build()
                .map_err(|e| RemoteError::new(INVALID_REQUEST, e.to_string()))
        })
        .collect()
}

#[async_trait]
impl ObjectClient for AwsObjectClient {
    async fn put_object(&self, bucket: &str, path: &str, body: Vec<u8>) -> RemoteResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(path)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectBody> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    RemoteError::no_such_key(path)
                } else {
                    remote_error(err)
                }
            })?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| RemoteError::new(TRANSPORT_ERROR, e.to_string()))?
            .into_bytes();
        Ok(Box::pin(Cursor::new(data)))
    }

    async fn head_object(&self, bucket: &str, path: &str) -> RemoteResult<ObjectMeta> {
        let resp = self
            .client
            .head_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    RemoteError::not_found(path)
                } else {
                    remote_error(err)
                }
            })?;
        let content_length = content_length(path, resp.content_length())?;
        Ok(ObjectMeta { content_length })
    }

    async fn delete_object(&self, bucket: &str, path: &str) -> RemoteResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(path)
            .send()
            .await
            .map_err(remote_error)?;
        Ok(())
    }

    async fn delete_objects(&self, bucket: &str, paths: &[String]) -> RemoteResult<Vec<DeleteFault>> {
        let delete = Delete::builder()
            .set_objects(Some(identifiers(paths)?))
            .quiet(true)
            .build()
            .map_err(|e| RemoteError::new(INVALID_REQUEST, e.to_string()))?;
        let resp = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(remote_error)?;
        debug!(bucket, requested = paths.len(), failed = resp.errors().len(), "multi-object delete");
        Ok(resp
            .errors()
            .iter()
            .map(|e| DeleteFault {
                path: e.key().unwrap_or_default().to_string(),
                code: e.code().unwrap_or_default().to_string(),
                message: e.message().unwrap_or_default().to_string(),
            })
            .collect())
    }

    async fn list_objects_v2(&self, request: &ListRequest) -> RemoteResult<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&request.bucket)
            .prefix(&request.prefix)
            .max_keys(i32::try_from(request.max_keys).unwrap_or(i32::MAX))
            .set_continuation_token(request.continuation_token.clone())
            .send()
            .await
            .map_err(remote_error)?;
        let objects = resp
            .contents()
            .iter()
            .filter_map(|object| {
                object.key().map(|key| ObjectSummary {
                    path: key.to_string(),
                    size: object.size().and_then(|s| u64::try_from(s).ok()),
                })
            })
            .collect();
        Ok(ListPage {
            objects,
            truncated: resp.is_truncated().unwrap_or(false),
            next_continuation_token: resp.next_continuation_token().map(String::from),
        })
    }
}
