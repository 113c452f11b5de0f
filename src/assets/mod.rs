//! Asset store adapter backed by an S3-compatible drive.
//!
//! Course thumbnails and lecture videos are uploaded here and referenced
//! by their public URL everywhere else. The bucket is served path-style
//! so the URL layout is `{server}/{bucket}/{folder}/{key}`.

use crate::config::DriveConfig;
use anyhow::{anyhow, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{config::Builder as S3ConfigBuilder, Client as S3Client};
use uuid::Uuid;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub async fn init_drive(config: &DriveConfig) -> Result<S3Client, Box<dyn std::error::Error>> {
    let endpoint = if !config.server.ends_with('/') {
        format!("{}/", config.server)
    } else {
        config.server.clone()
    };

    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .endpoint_url(endpoint)
        .region("auto")
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "static",
        ))
        .load()
        .await;

    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();

    Ok(S3Client::from_conf(s3_config))
}

/// Rejects thumbnails the frontend should never have sent: wrong mime
/// family or oversized payloads.
pub fn validate_image(file_name: &str, size: usize) -> Result<(), String> {
    if size > MAX_IMAGE_BYTES {
        return Err("Thumbnail file size should be less than 5MB".to_string());
    }
    let ext = file_name.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "jpeg" | "jpg" | "png" | "webp" => Ok(()),
        _ => Err("Only JPEG, JPG, PNG, and WebP images are allowed".to_string()),
    }
}

/// Uploads one asset and returns its public URL.
pub async fn upload_asset(
    client: &S3Client,
    config: &DriveConfig,
    file_name: &str,
    data: Vec<u8>,
) -> Result<String> {
    let key = object_key(&config.folder, file_name);
    let content_type = mime_guess::from_path(file_name)
        .first()
        .map(|m| m.to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());

    log::info!(
        "Uploading asset {} ({} bytes) to s3://{}/{}",
        file_name,
        data.len(),
        config.bucket,
        key
    );

    client
        .put_object()
        .bucket(&config.bucket)
        .key(&key)
        .body(ByteStream::from(data))
        .content_type(content_type)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to upload asset: {}", e))?;

    Ok(public_url(config, &key))
}

/// Deletes an asset previously returned by [`upload_asset`]. URLs that do
/// not point into our bucket are ignored so stale rows cannot wedge a
/// course delete.
pub async fn delete_asset(client: &S3Client, config: &DriveConfig, url: &str) -> Result<()> {
    let key = match key_from_url(config, url) {
        Some(key) => key,
        None => {
            log::warn!("Asset URL {} is not in bucket {}, skipping delete", url, config.bucket);
            return Ok(());
        }
    };

    log::info!("Deleting asset s3://{}/{}", config.bucket, key);

    client
        .delete_object()
        .bucket(&config.bucket)
        .key(&key)
        .send()
        .await
        .map_err(|e| anyhow!("Failed to delete asset: {}", e))?;

    Ok(())
}

/// Keys are prefixed with a fresh UUID so repeated uploads of the same
/// filename never collide.
fn object_key(folder: &str, file_name: &str) -> String {
    let safe_name: String = file_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}/{}-{}", folder, Uuid::new_v4(), safe_name)
}

fn public_url(config: &DriveConfig, key: &str) -> String {
    format!(
        "{}/{}/{}",
        config.server.trim_end_matches('/'),
        config.bucket,
        key
    )
}

fn key_from_url(config: &DriveConfig, url: &str) -> Option<String> {
    let prefix = format!("{}/{}/", config.server.trim_end_matches('/'), config.bucket);
    url.strip_prefix(&prefix).map(|key| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::test_util;

    fn test_config() -> DriveConfig {
        DriveConfig {
            server: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "course-assets".to_string(),
            folder: "courseserver".to_string(),
        }
    }

    #[test]
    fn test_validate_image_accepts_supported_types() {
        test_util::setup();
        for name in ["a.jpg", "b.jpeg", "c.png", "d.webp", "UPPER.PNG"] {
            assert!(validate_image(name, 1024).is_ok(), "{} should pass", name);
        }
    }

    #[test]
    fn test_validate_image_rejects_wrong_type() {
        test_util::setup();
        let err = validate_image("movie.mp4", 1024).unwrap_err();
        assert_eq!(err, "Only JPEG, JPG, PNG, and WebP images are allowed");
    }

    #[test]
    fn test_validate_image_rejects_oversized() {
        test_util::setup();
        let err = validate_image("big.png", MAX_IMAGE_BYTES + 1).unwrap_err();
        assert_eq!(err, "Thumbnail file size should be less than 5MB");
    }

    #[test]
    fn test_object_key_sanitizes_name() {
        test_util::setup();
        let key = object_key("courseserver", "my photo (1).png");
        assert!(key.starts_with("courseserver/"));
        assert!(key.ends_with("-my_photo__1_.png"));
        assert!(!key.contains(' '));
    }

    #[test]
    fn test_url_round_trip() {
        test_util::setup();
        let config = test_config();
        let url = public_url(&config, "courseserver/abc-file.png");
        assert_eq!(
            url,
            "http://localhost:9000/course-assets/courseserver/abc-file.png"
        );
        assert_eq!(
            key_from_url(&config, &url).as_deref(),
            Some("courseserver/abc-file.png")
        );
    }

    #[test]
    fn test_key_from_url_rejects_foreign_host() {
        test_util::setup();
        let config = test_config();
        assert!(key_from_url(&config, "https://elsewhere.example/file.png").is_none());
    }
}
