use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart,
    },
    http::StatusCode,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::ApiError;

/// A file part written to the local upload directory.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: usize,
}

/// Text fields and staged files of one multipart request.
#[derive(Debug, Default)]
pub struct StagedUpload {
    text: HashMap<String, String>,
    files: HashMap<String, Vec<StagedFile>>,
}

impl StagedUpload {
    /// Drain a multipart body, writing every file part under `dir`.
    ///
    /// On failure anything already written is removed again.
    pub async fn from_multipart(dir: &Path, mut mp: Multipart) -> Result<Self, ApiError> {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            error!(error = %e, dir = %dir.display(), "create upload dir failed");
            ApiError::Internal("Failed to stage upload".into())
        })?;

        let mut staged = Self::default();
        loop {
            let field = match mp.next_field().await {
                Ok(Some(f)) => f,
                Ok(None) => break,
                Err(e) => {
                    staged.discard().await;
                    return Err(multipart_error(e));
                }
            };
            if let Err(e) = staged.accept(dir, field).await {
                staged.discard().await;
                return Err(e);
            }
        }
        Ok(staged)
    }

    async fn accept(&mut self, dir: &Path, field: Field<'_>) -> Result<(), ApiError> {
        let Some(name) = field.name().map(|s| s.to_string()) else {
            return Ok(());
        };
        let file_name = field.file_name().map(|s| s.to_string());

        let data = field.bytes().await.map_err(multipart_error)?;

        let Some(file_name) = file_name else {
            let value = String::from_utf8_lossy(&data).into_owned();
            self.text.entry(name).or_insert(value);
            return Ok(());
        };

        let path = dir.join(format!("{}{}", Uuid::new_v4(), ext_suffix(&file_name)));
        tokio::fs::write(&path, &data).await.map_err(|e| {
            error!(error = %e, path = %path.display(), "write staged file failed");
            ApiError::Internal("Failed to stage upload".into())
        })?;
        debug!(field = %name, path = %path.display(), size = data.len(), "file staged");

        self.files.entry(name).or_default().push(StagedFile {
            path,
            file_name,
            size: data.len(),
        });
        Ok(())
    }

    /// Removes and returns a text field.
    pub fn take_text(&mut self, name: &str) -> Option<String> {
        self.text.remove(name)
    }

    pub fn files(&self, name: &str) -> &[StagedFile] {
        self.files.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Delete every staged file. Failures are logged only.
    pub async fn discard(&self) {
        for file in self.files.values().flatten() {
            if let Err(e) = tokio::fs::remove_file(&file.path).await {
                warn!(error = %e, path = %file.path.display(), "remove staged file failed");
            }
        }
    }
}

/// Body-limit overruns become 413; anything else is a malformed body.
/// Parser details stay in the log.
fn multipart_error(e: MultipartError) -> ApiError {
    let status = e.status();
    warn!(error = %e, %status, "multipart body rejected");
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Request body is too large".into())
    } else {
        ApiError::InvalidInput("Malformed multipart body".into())
    }
}

fn ext_suffix(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}
