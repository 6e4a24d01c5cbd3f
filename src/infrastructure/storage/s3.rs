use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{Client, config::BehaviorVersion, config::Credentials, config::Region};
use std::path::Path;
use tracing::info;
use url::Url;
use uuid::Uuid;

use crate::pipeline::collaborators::{ArtifactUploader, UploadedArtifacts};

#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
    public_base_url: Url,
}

impl StorageService {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_base_url: &str,
    ) -> Result<Self> {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO and R2
            .build();

        let client = Client::from_conf(config);
        let public_base_url = parse_base_url(public_base_url)?;

        info!("✅ Connected to object storage (bucket: {})", bucket);

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            public_base_url,
        })
    }

    pub async fn put_file(&self, key: &str, path: &Path) -> Result<()> {
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .to_string();

        let body = ByteStream::from_path(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| anyhow!("Failed to upload {}: {}", key, e))?;

        Ok(())
    }

    pub fn public_url(&self, key: &str) -> Result<String> {
        let url = self
            .public_base_url
            .join(key)
            .with_context(|| format!("Invalid object key {}", key))?;
        Ok(url.to_string())
    }
}

/// `Url::join` drops the last path segment unless the base ends in a slash.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).with_context(|| format!("Invalid public media base URL {}", raw))
}

pub fn video_key(job_id: Uuid) -> String {
    format!("videos/{}.mp4", job_id)
}

pub fn thumbnail_key(job_id: Uuid) -> String {
    format!("thumbnails/{}.jpg", job_id)
}

#[async_trait]
impl ArtifactUploader for StorageService {
    async fn upload(
        &self,
        job_id: Uuid,
        video: &Path,
        thumbnail: &Path,
    ) -> Result<UploadedArtifacts> {
        let video_key = video_key(job_id);
        let thumbnail_key = thumbnail_key(job_id);

        self.put_file(&video_key, video).await?;
        self.put_file(&thumbnail_key, thumbnail).await?;

        Ok(UploadedArtifacts {
            video_url: self.public_url(&video_key)?,
            thumbnail_url: self.public_url(&thumbnail_key)?,
        })
    }
}
