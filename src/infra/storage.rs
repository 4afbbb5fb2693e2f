use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use url::Url;

use crate::config::AppConfig;
use crate::domain::movie::{ImageStore, StoredImage};

#[derive(Clone)]
pub struct ObjectStorage {
    client: Client,
    bucket: String,
    public_url: Url,
}

impl ObjectStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let region_provider = RegionProviderChain::first_try(Region::new(config.s3_region.clone()));
        let shared_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .load()
            .await;

        let mut s3_builder = aws_sdk_s3::config::Builder::from(&shared_config)
            .region(shared_config.region().cloned())
            .endpoint_url(config.s3_endpoint.clone())
            .force_path_style(true);
        if let Some(provider) = shared_config.credentials_provider() {
            s3_builder = s3_builder.credentials_provider(provider);
        }
        let client = Client::from_conf(s3_builder.build());

        Ok(Self {
            client,
            bucket: config.s3_bucket.clone(),
            public_url: parse_public_base(&config.s3_public_url)?,
        })
    }

    fn public_url_for(&self, key: &str) -> Result<String> {
        public_url_for(&self.public_url, key)
    }
}

/// The base must end with `/` for `Url::join` to append instead of
/// replacing the last path segment.
fn parse_public_base(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    let url = if normalized.contains("://") {
        Url::parse(&normalized)?
    } else {
        Url::parse(&format!("http://{}", normalized))?
    };
    if url.cannot_be_a_base() {
        return Err(anyhow!("invalid S3_PUBLIC_URL: {}", raw));
    }
    Ok(url)
}

fn public_url_for(base: &Url, key: &str) -> Result<String> {
    Ok(base.join(key)?.to_string())
}

#[async_trait]
impl ImageStore for ObjectStorage {
    async fn upload(&self, bytes: Bytes, filename: &str, content_type: &str) -> Result<StoredImage> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(filename)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await?;

        Ok(StoredImage {
            url: self.public_url_for(filename)?,
            id: filename.to_string(),
        })
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await?;
        Ok(())
    }
}
