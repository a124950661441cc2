//! Evidence attachment checks.
//!
//! A single file may be attached to a draft. It is checked for size and type
//! when selected and kept in memory until the report is submitted; nothing is
//! uploaded at selection time.

use std::path::Path;

use tracing::{debug, warn};

use crate::error::AttachmentError;
use crate::model::{EvidenceFile, ReportDraft};

/// Largest evidence file accepted (10 MiB).
pub const MAX_EVIDENCE_BYTES: u64 = 10 * 1024 * 1024;

/// MIME types accepted as evidence.
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

/// Check a file against the size and type limits.
pub fn check_evidence(file: &EvidenceFile) -> Result<(), AttachmentError> {
    if file.size() > MAX_EVIDENCE_BYTES {
        return Err(AttachmentError::TooLarge {
            size: file.size(),
            limit: MAX_EVIDENCE_BYTES,
        });
    }

    let mime_type = file.mime_type.trim().to_ascii_lowercase();
    if !ALLOWED_MIME_TYPES.contains(&mime_type.as_str()) {
        return Err(AttachmentError::UnsupportedType {
            mime_type: file.mime_type.clone(),
        });
    }

    Ok(())
}

/// Attach `file` to a copy of `draft`, or explain why it was rejected.
///
/// On rejection the caller keeps its existing draft, including any evidence
/// that was attached before.
pub fn attach_evidence(
    draft: &ReportDraft,
    file: EvidenceFile,
) -> Result<ReportDraft, AttachmentError> {
    match check_evidence(&file) {
        Ok(()) => {
            debug!(
                size = file.size(),
                mime_type = %file.mime_type,
                "Evidence attached"
            );
            Ok(draft.with_evidence(Some(file)))
        }
        Err(e) => {
            warn!(
                size = file.size(),
                mime_type = %file.mime_type,
                error = %e,
                "Evidence rejected"
            );
            Err(e)
        }
    }
}

/// Guess a MIME type from a file name's extension.
pub fn mime_type_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

impl EvidenceFile {
    /// Read a file from disk, inferring its MIME type from the extension.
    ///
    /// The size limit is checked against metadata before reading so that an
    /// oversized file is never loaded into memory.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AttachmentError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("evidence")
            .to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AttachmentError::Unreadable(e.to_string()))?;
        if metadata.len() > MAX_EVIDENCE_BYTES {
            return Err(AttachmentError::TooLarge {
                size: metadata.len(),
                limit: MAX_EVIDENCE_BYTES,
            });
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AttachmentError::Unreadable(e.to_string()))?;

        Ok(Self::new(file_name.clone(), mime_type_for(&file_name), bytes))
    }
}
