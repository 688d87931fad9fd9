use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use tracing::debug;
use uuid::Uuid;

use crate::storage::StorageClient;

/// What the media host reports back for one stored file.
#[derive(Debug, Clone)]
pub struct UploadDescriptor {
    pub url: String,
    pub key: String,
    pub content_type: &'static str,
    pub bytes: usize,
}

/// Push a local file to the media host.
///
/// A missing path means there is nothing to upload and yields `Ok(None)`.
pub async fn upload_on_host(
    storage: &dyn StorageClient,
    key_prefix: &str,
    path: Option<&Path>,
) -> anyhow::Result<Option<UploadDescriptor>> {
    let Some(path) = path else {
        return Ok(None);
    };

    let body = tokio::fs::read(path)
        .await
        .with_context(|| format!("read staged file {}", path.display()))?;

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".into());
    let content_type = mime_from_ext(&ext);
    let key = format!("{}/{}.{}", key_prefix.trim_end_matches('/'), Uuid::new_v4(), ext);
    let size = body.len();

    storage
        .put_object(&key, Bytes::from(body), content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;

    debug!(%key, size, content_type, "media uploaded");
    Ok(Some(UploadDescriptor {
        url: storage.public_url(&key),
        key,
        content_type,
        bytes: size,
    }))
}

fn mime_from_ext(ext: &str) -> &'static str {
    match ext {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}
