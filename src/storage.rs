use crate::{
    domain::{decode_snapshot, SnapshotBackend},
    errors::BackendError,
    models::Snapshot,
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    Client as S3Client,
    error::SdkError,
};
use tracing;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Snapshot kept as one JSON object in an S3-compatible bucket.
///
/// GetObject reads the whole collection, PutObject replaces it. There is no
/// partial update.
#[derive(Debug, Clone)]
pub struct RemoteSnapshotBackend {
    client: S3Client,
    bucket_name: String,
    key: String,
}

impl RemoteSnapshotBackend {
    pub fn new(client: S3Client, bucket_name: String, key: String) -> Self {
        tracing::info!(bucket = %bucket_name, key = %key, "Initializing RemoteSnapshotBackend");
        Self { client, bucket_name, key }
    }
}

/// A missing content type is tolerated; anything else must be JSON.
fn is_json_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => true,
        Some(ct) => {
            let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            essence == JSON_CONTENT_TYPE || essence.ends_with("+json")
        }
    }
}

#[async_trait]
impl SnapshotBackend for RemoteSnapshotBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load(&self) -> Result<Option<Snapshot>, BackendError> {
        tracing::debug!(s3_key = %self.key, bucket = %self.bucket_name, "S3: Fetching snapshot");

        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket_name)
            .key(&self.key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(sdk_err) => {
                if let SdkError::ServiceError(service_err) = &sdk_err {
                    if service_err.err().is_no_such_key() {
                        tracing::info!(s3_key = %self.key, bucket = %self.bucket_name, "S3: No snapshot saved yet");
                        return Ok(None);
                    }
                }
                tracing::error!(s3_key = %self.key, bucket = %self.bucket_name, error = %sdk_err, "S3: Error fetching snapshot");
                return Err(BackendError::Remote(
                    anyhow::Error::new(sdk_err)
                        .context(format!("S3: Failed to get object with key '{}'", self.key)),
                ));
            }
        };

        if !is_json_content_type(output.content_type()) {
            tracing::warn!(
                s3_key = %self.key,
                content_type = ?output.content_type(),
                "S3: Snapshot object has unexpected content type, treating as absent"
            );
            return Ok(None);
        }

        let data = output
            .body
            .collect()
            .await
            .context("S3: Failed to collect snapshot bytes")?;

        Ok(decode_snapshot(self.name(), &data.into_bytes()))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), BackendError> {
        let payload = serde_json::to_vec(snapshot)?;
        tracing::debug!(
            s3_key = %self.key,
            bucket = %self.bucket_name,
            version = snapshot.version,
            bytes = payload.len(),
            "S3: Uploading snapshot"
        );

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&self.key)
            .body(ByteStream::from(payload))
            .content_type(JSON_CONTENT_TYPE)
            .send()
            .await
            .context(format!("S3: Failed to upload object with key '{}'", self.key))?;

        tracing::debug!(s3_key = %self.key, bucket = %self.bucket_name, "S3: Upload successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::{retry::RetryConfig, BehaviorVersion, Credentials, Region};
    use axum::{
        body::Bytes,
        http::{header, HeaderMap, Method, StatusCode, Uri},
        Router,
    };
    use std::sync::{Arc, Mutex};

    type Recorded = (Method, String, Option<String>, Bytes);

    /// Serves `app` on a loopback port and returns a backend whose client
    /// talks to it path-style.
    async fn backend_for(app: Router) -> RemoteSnapshotBackend {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(Credentials::new("test", "test", None, None, "static"))
            .endpoint_url(format!("http://{}", addr))
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();
        RemoteSnapshotBackend::new(
            S3Client::from_conf(config),
            "emm-bucket".to_string(),
            "emm_database.json".to_string(),
        )
    }

    /// Answers every request with the same response.
    fn respond(status: StatusCode, content_type: &'static str, body: String) -> Router {
        Router::new().fallback(move || {
            let body = body.clone();
            async move { (status, [(header::CONTENT_TYPE, content_type)], body) }
        })
    }

    fn s3_error(code: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><Error><Code>{}</Code><Message>stub</Message><RequestId>r1</RequestId></Error>"#,
            code
        )
    }

    #[tokio::test]
    async fn missing_object_loads_as_absent() {
        let backend = backend_for(respond(StatusCode::NOT_FOUND, "application/xml", s3_error("NoSuchKey"))).await;
        assert!(matches!(backend.load().await, Ok(None)));
    }

    #[tokio::test]
    async fn other_service_errors_are_reported() {
        let backend = backend_for(respond(StatusCode::FORBIDDEN, "application/xml", s3_error("AccessDenied"))).await;
        assert!(matches!(backend.load().await, Err(BackendError::Remote(_))));
    }

    #[tokio::test]
    async fn non_json_object_loads_as_absent() {
        let backend = backend_for(respond(StatusCode::OK, "text/html", "<html></html>".to_string())).await;
        assert!(matches!(backend.load().await, Ok(None)));
    }

    #[tokio::test]
    async fn malformed_json_object_loads_as_absent() {
        let backend = backend_for(respond(StatusCode::OK, JSON_CONTENT_TYPE, "{\"media_items\":".to_string())).await;
        assert!(matches!(backend.load().await, Ok(None)));
    }

    #[tokio::test]
    async fn json_object_loads_as_snapshot() {
        let mut stored = Snapshot::builtin("admin");
        stored.version = 7;
        let body = serde_json::to_string(&stored).unwrap();
        let backend = backend_for(respond(StatusCode::OK, JSON_CONTENT_TYPE, body)).await;

        let loaded = backend.load().await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn save_puts_json_object_at_key() {
        let seen: Arc<Mutex<Vec<Recorded>>> = Arc::default();
        let recorder = Arc::clone(&seen);
        let app = Router::new().fallback(move |method: Method, uri: Uri, headers: HeaderMap, body: Bytes| {
            let recorder = Arc::clone(&recorder);
            async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                recorder
                    .lock()
                    .unwrap()
                    .push((method, uri.path().to_string(), content_type, body));
                StatusCode::OK
            }
        });
        let backend = backend_for(app).await;

        let mut snapshot = Snapshot::builtin("admin");
        snapshot.version = 3;
        backend.save(&snapshot).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let (method, path, content_type, body) = &seen[0];
        assert_eq!(*method, Method::PUT);
        assert_eq!(path, "/emm-bucket/emm_database.json");
        assert_eq!(content_type.as_deref(), Some(JSON_CONTENT_TYPE));
        let body = String::from_utf8_lossy(body);
        assert!(body.contains("\"media_items\""));
        assert!(body.contains("\"version\":3"));
    }

    #[tokio::test]
    async fn rejected_save_is_reported() {
        let backend = backend_for(respond(StatusCode::FORBIDDEN, "application/xml", s3_error("AccessDenied"))).await;
        let result = backend.save(&Snapshot::builtin("admin")).await;
        assert!(matches!(result, Err(BackendError::Remote(_))));
    }

    #[test]
    fn json_content_types_are_accepted() {
        assert!(is_json_content_type(None));
        assert!(is_json_content_type(Some("application/json")));
        assert!(is_json_content_type(Some("Application/JSON; charset=utf-8")));
        assert!(is_json_content_type(Some("application/vnd.emm+json")));
    }

    #[test]
    fn other_content_types_are_rejected() {
        assert!(!is_json_content_type(Some("text/html")));
        assert!(!is_json_content_type(Some("application/octet-stream")));
    }
}
