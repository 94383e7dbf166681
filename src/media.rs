//! Media upload: incoming files are staged on local disk, then pushed to
//! object storage. A staged file is removed after every upload attempt.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use axum::extract::Multipart;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::storage::StorageClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedMedia {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct MediaUploader {
    storage: Arc<dyn StorageClient>,
    tmp_dir: PathBuf,
}

impl MediaUploader {
    pub fn new(storage: Arc<dyn StorageClient>, tmp_dir: PathBuf) -> Self {
        Self { storage, tmp_dir }
    }

    /// Writes an incoming file into the temp directory.
    pub async fn stage(&self, file_name: Option<&str>, body: &[u8]) -> anyhow::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.tmp_dir)
            .await
            .with_context(|| format!("create temp dir {}", self.tmp_dir.display()))?;
        let ext = file_name.and_then(ext_from_name).unwrap_or_else(|| "bin".into());
        let path = self.tmp_dir.join(format!("{}.{}", Uuid::new_v4(), ext));
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("write staged file {}", path.display()))?;
        debug!(path = %path.display(), bytes = body.len(), "file staged");
        Ok(path)
    }

    /// Uploads a local file and returns its public URL. The local file is
    /// removed whether or not the upload succeeds.
    pub async fn upload(&self, local_path: &Path) -> anyhow::Result<UploadedMedia> {
        let result = self.put_file(local_path).await;
        discard(local_path).await;
        result
    }

    async fn put_file(&self, local_path: &Path) -> anyhow::Result<UploadedMedia> {
        let body = tokio::fs::read(local_path)
            .await
            .with_context(|| format!("read {}", local_path.display()))?;
        anyhow::ensure!(!body.is_empty(), "refusing to upload an empty file");

        let ext = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ext_from_name)
            .unwrap_or_else(|| "bin".into());
        let content_type = mime_from_ext(&ext).unwrap_or("application/octet-stream");
        let key = format!("media/{}.{}", Uuid::new_v4(), ext);

        self.storage
            .put_object(&key, Bytes::from(body), content_type)
            .await
            .with_context(|| format!("put_object {}", key))?;

        let url = format!("{}/{}", self.storage.public_base(), key);
        debug!(%key, %url, "media uploaded");
        Ok(UploadedMedia { key, url })
    }

    /// Deletes an object previously returned by `upload`. URLs that do not
    /// point into our bucket are left alone and reported as `false`.
    pub async fn delete_by_url(&self, url: &str) -> anyhow::Result<bool> {
        let prefix = format!("{}/", self.storage.public_base());
        let Some(key) = url.strip_prefix(&prefix) else {
            return Ok(false);
        };
        self.storage.delete_object(key).await?;
        Ok(true)
    }

    /// Deletes objects uploaded for a write that did not go through.
    /// Failures are logged, not returned.
    pub async fn remove_uploaded<'a>(&self, urls: impl IntoIterator<Item = &'a str>) {
        for url in urls {
            match self.delete_by_url(url).await {
                Ok(_) => debug!(%url, "orphaned upload removed"),
                Err(e) => warn!(error = %e, %url, "failed to remove orphaned upload"),
            }
        }
    }
}

/// Removes a staged file; a file that is already gone is fine.
pub async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(error = %e, path = %path.display(), "failed to remove staged file"),
    }
}

fn ext_from_name(name: &str) -> Option<String> {
    let (_, ext) = name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then_some(ext)
}

fn mime_from_ext(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "mp4" => Some("video/mp4"),
        "webm" => Some("video/webm"),
        _ => None,
    }
}

/// A parsed multipart body: text fields in memory, file fields staged on disk.
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, PathBuf>,
}

impl MultipartForm {
    pub async fn read(mut mp: Multipart, media: &MediaUploader) -> ApiResult<Self> {
        let mut form = Self {
            fields: HashMap::new(),
            files: HashMap::new(),
        };
        loop {
            let field = match mp.next_field().await {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "malformed multipart body");
                    form.discard().await;
                    return Err(ApiError::validation("Invalid multipart body"));
                }
            };
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let data = match field.bytes().await {
                Ok(d) => d,
                Err(e) => {
                    warn!(error = %e, field = %name, "failed to read multipart field");
                    form.discard().await;
                    return Err(ApiError::validation("Invalid multipart body"));
                }
            };

            match file_name {
                // only the first non-empty file per field counts
                Some(file_name) if !data.is_empty() && !form.files.contains_key(&name) => {
                    let path = media.stage(Some(&file_name), &data).await.map_err(|e| {
                        tracing::error!(error = %e, "staging upload failed");
                        ApiError::Internal("Failed to store uploaded file".into())
                    });
                    match path {
                        Ok(path) => {
                            form.files.insert(name, path);
                        }
                        Err(e) => {
                            form.discard().await;
                            return Err(e);
                        }
                    }
                }
                Some(_) => {}
                None => {
                    form.fields
                        .insert(name, String::from_utf8_lossy(&data).into_owned());
                }
            }
        }
        Ok(form)
    }

    /// Trimmed text field; blank counts as missing.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn take_file(&mut self, name: &str) -> Option<PathBuf> {
        self.files.remove(name)
    }

    /// Removes staged files that were never taken.
    pub async fn discard(&mut self) {
        for (_, path) in self.files.drain() {
            discard(&path).await;
        }
    }
}
