//! File submission: stores an uploaded artifact and binds it to a step.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::catalog::StepKey;
use super::state::{Actor, StepCommand};
use crate::error::{Error, ValidationError};
use crate::storage::BlobStore;

/// Fallback extension when the upload name has none we can use.
const DEFAULT_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 10;

/// Extension and MIME type pairs the portal knows how to label.
const KNOWN_TYPES: &[(&str, &str)] = &[
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("heic", "image/heic"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("txt", "text/plain"),
];

const OCTET_STREAM: &str = "application/octet-stream";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    /// MIME type the client declared, if any.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Extension from the file name, else from the declared content type,
    /// else `bin`.
    pub fn extension(&self) -> String {
        name_extension(&self.file_name)
            .or_else(|| {
                let mime = self.content_type.as_deref()?;
                let essence = mime.split(';').next()?.trim().to_ascii_lowercase();
                KNOWN_TYPES
                    .iter()
                    .find(|(_, m)| *m == essence)
                    .map(|(ext, _)| ext.to_string())
            })
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }
}

/// A stored artifact fetched for download.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

impl StoredFile {
    /// MIME type implied by the stored path's extension.
    pub fn content_type(&self) -> &'static str {
        content_type_for_path(&self.path)
    }
}

fn name_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}

/// Lower-cased ASCII extension of `file_name`, or `bin`.
pub fn file_extension(file_name: &str) -> String {
    name_extension(file_name).unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

pub fn content_type_for_path(path: &str) -> &'static str {
    let ext = file_extension(path);
    KNOWN_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or(OCTET_STREAM, |&(_, mime)| mime)
}

/// Storage path for a submission: `{coach_id}/{prefix}{step}-{millis}.{ext}`.
///
/// The millisecond timestamp keeps resubmissions from colliding.
pub fn storage_path(
    coach_id: Uuid,
    key: StepKey,
    submitted_at: DateTime<Utc>,
    extension: &str,
    actor: Actor,
) -> String {
    let prefix = match actor {
        Actor::Coach => "",
        Actor::Admin => "admin-",
    };
    format!(
        "{coach_id}/{prefix}{key}-{millis}.{extension}",
        millis = submitted_at.timestamp_millis(),
    )
}

/// Upload `upload` and return the step command that records it.
///
/// Nothing is returned on storage failure, so the caller's step stays as it
/// was.
pub async fn store_upload(
    blobs: &dyn BlobStore,
    coach_id: Uuid,
    key: StepKey,
    upload: &Upload,
    actor: Actor,
    now: DateTime<Utc>,
) -> Result<StepCommand, Error> {
    if upload.bytes.is_empty() {
        return Err(ValidationError::EmptyUpload.into());
    }

    let path = storage_path(coach_id, key, now, &upload.extension(), actor);
    blobs.upload(&path, &upload.bytes).await.map_err(|e| {
        tracing::error!(%coach_id, step = %key, path = %path, error = %e, "Upload failed");
        Error::Storage(e)
    })?;
    tracing::info!(%coach_id, step = %key, path = %path, size = upload.bytes.len(), %actor, "Stored submission");

    Ok(match actor {
        Actor::Coach => StepCommand::SubmitArtifact { file_path: path },
        Actor::Admin => StepCommand::AttachContract {
            admin_file_path: path,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use chrono::TimeZone;

    #[test]
    fn extension_rules() {
        assert_eq!(file_extension("w9.PDF"), "pdf");
        assert_eq!(file_extension("photo.final.jpeg"), "jpeg");
        assert_eq!(file_extension("noext"), "bin");
        assert_eq!(file_extension("weird.p d f"), "bin");
        assert_eq!(file_extension("trailing."), "bin");
        assert_eq!(file_extension("a.thisiswaytoolong"), "bin");
    }

    #[test]
    fn declared_content_type_fills_missing_extension() {
        let named = Upload::new("scan.PDF", b"x".to_vec())
            .with_content_type(Some("image/png".into()));
        assert_eq!(named.extension(), "pdf");

        let unnamed = Upload::new("", b"x".to_vec())
            .with_content_type(Some("image/jpeg; charset=binary".into()));
        assert_eq!(unnamed.extension(), "jpg");

        let unknown = Upload::new("blob", b"x".to_vec())
            .with_content_type(Some("application/x-made-up".into()));
        assert_eq!(unknown.extension(), "bin");
    }

    #[test]
    fn downloads_are_labelled_by_extension() {
        let file = StoredFile {
            path: "abc/w9-1.pdf".into(),
            bytes: Vec::new(),
        };
        assert_eq!(file.content_type(), "application/pdf");
        assert_eq!(content_type_for_path("abc/headshot-1.JPEG"), "image/jpeg");
        assert_eq!(content_type_for_path("abc/misc-1.bin"), "application/octet-stream");
    }

    #[test]
    fn path_is_deterministic_and_time_scoped() {
        let id = Uuid::nil();
        let t1 = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(1_700_000_000_001).unwrap();

        let p1 = storage_path(id, StepKey::W9, t1, "pdf", Actor::Coach);
        assert_eq!(p1, format!("{id}/w9-1700000000000.pdf"));
        assert_eq!(p1, storage_path(id, StepKey::W9, t1, "pdf", Actor::Coach));
        assert_ne!(p1, storage_path(id, StepKey::W9, t2, "pdf", Actor::Coach));

        let admin = storage_path(id, StepKey::Contract1099, t1, "pdf", Actor::Admin);
        assert_eq!(admin, format!("{id}/admin-1099-1700000000000.pdf"));
    }

    #[tokio::test]
    async fn coach_upload_yields_submit_command() {
        let blobs = MemoryBlobStore::new();
        let id = Uuid::new_v4();
        let cmd = store_upload(
            &blobs,
            id,
            StepKey::Headshot,
            &Upload::new("me.png", b"png".to_vec()),
            Actor::Coach,
            Utc::now(),
        )
        .await
        .unwrap();
        match cmd {
            StepCommand::SubmitArtifact { file_path } => {
                assert!(file_path.starts_with(&format!("{id}/headshot-")));
                assert_eq!(blobs.download(&file_path).await.unwrap(), b"png");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn admin_upload_yields_attach_command() {
        let blobs = MemoryBlobStore::new();
        let cmd = store_upload(
            &blobs,
            Uuid::new_v4(),
            StepKey::Contract1099,
            &Upload::new("contract.pdf", b"pdf".to_vec()),
            Actor::Admin,
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(matches!(cmd, StepCommand::AttachContract { .. }));
    }

    #[tokio::test]
    async fn empty_upload_is_rejected_without_storing() {
        let blobs = MemoryBlobStore::new();
        let err = store_upload(
            &blobs,
            Uuid::new_v4(),
            StepKey::W9,
            &Upload::new("w9.pdf", Vec::new()),
            Actor::Coach,
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Validation(ValidationError::EmptyUpload)));
        assert!(blobs.is_empty().await);
    }

    #[tokio::test]
    async fn storage_collision_surfaces_as_storage_error() {
        let blobs = MemoryBlobStore::new();
        let id = Uuid::new_v4();
        let now = Utc::now();
        let upload = Upload::new("w9.pdf", b"a".to_vec());
        store_upload(&blobs, id, StepKey::W9, &upload, Actor::Coach, now)
            .await
            .unwrap();
        let err = store_upload(&blobs, id, StepKey::W9, &upload, Actor::Coach, now)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }
}
