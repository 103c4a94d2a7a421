use crate::{
    aws_clients::{create_s3_client, create_sdk_config},
    config::{BackendKind, Config},
    domain::SnapshotBackend,
    local::{EphemeralBackend, LocalSnapshotBackend},
    storage::RemoteSnapshotBackend,
};
use aws_sdk_s3::{
    error::SdkError,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use std::sync::Arc;
use tracing;

/// Ensures the S3 bucket exists, creating it with the correct location constraint if needed.
/// Failure is not fatal: the remote backend will fail its first load and the
/// store falls through to the next backend.
async fn ensure_s3_bucket_exists(client: &S3Client, bucket_name: &str, region_str: &str) {
    let mut request = client.create_bucket().bucket(bucket_name);
    if region_str != "us-east-1" {
        request = request.create_bucket_configuration(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region_str))
                .build(),
        );
    }

    match request.send().await {
        Ok(_) => tracing::info!("Startup: S3 bucket '{}' created.", bucket_name),
        Err(sdk_err) => {
            if let SdkError::ServiceError(service_err) = &sdk_err {
                let code = service_err.err().meta().code();
                if code == Some("BucketAlreadyOwnedByYou") || code == Some("BucketAlreadyExists") {
                    tracing::info!("Startup: S3 bucket '{}' already exists.", bucket_name);
                    return;
                }
            }
            tracing::warn!(bucket = %bucket_name, error = %sdk_err, "Startup: Could not create or verify S3 bucket");
        }
    }
}

async fn remote_backend(config: &Config) -> Option<Arc<dyn SnapshotBackend>> {
    let bucket = match config.require_bucket() {
        Ok(bucket) => bucket.to_string(),
        Err(e) => {
            tracing::warn!("Startup: Skipping remote backend: {}", e);
            return None;
        }
    };

    let sdk_config = create_sdk_config(config).await;
    let client = create_s3_client(&sdk_config);
    ensure_s3_bucket_exists(&client, &bucket, &config.aws_region).await;

    Some(Arc::new(RemoteSnapshotBackend::new(
        client,
        bucket,
        config.snapshot_object_key.clone(),
    )))
}

/// Builds the backend chain in the configured preference order.
pub async fn build_backends(config: &Config) -> Vec<Arc<dyn SnapshotBackend>> {
    tracing::info!(order = ?config.backends, "Startup: Building backend chain");
    let mut chain: Vec<Arc<dyn SnapshotBackend>> = Vec::with_capacity(config.backends.len());

    for kind in &config.backends {
        match kind {
            BackendKind::Remote => {
                if let Some(remote) = remote_backend(config).await {
                    chain.push(remote);
                }
            }
            BackendKind::Local => chain.push(Arc::new(LocalSnapshotBackend::new(
                config.local_store_dir.clone(),
                config.local_store_key.clone(),
            ))),
            BackendKind::Ephemeral => chain.push(Arc::new(EphemeralBackend)),
        }
    }
    chain
}
