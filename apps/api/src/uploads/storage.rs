use aws_sdk_s3::primitives::ByteStream;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::uploads::extract::DocumentKind;

/// Object key for an archived upload: `uploads/{upload_id}/{role}.{ext}`.
pub fn upload_key(upload_id: Uuid, role: &str, kind: DocumentKind) -> String {
    format!("uploads/{}/{}.{}", upload_id, role, kind.extension())
}

/// Stores the original uploaded bytes so extractions can be audited later.
pub async fn archive_upload(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    key: &str,
    kind: DocumentKind,
    data: bytes::Bytes,
) -> Result<(), AppError> {
    s3.put_object()
        .bucket(bucket)
        .key(key)
        .body(ByteStream::from(data))
        .content_type(kind.content_type())
        .send()
        .await
        .map_err(|e| AppError::S3(format!("upload of {key} failed: {e}")))?;

    info!("Archived upload to s3://{}/{}", bucket, key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_key_layout() {
        let id = Uuid::nil();
        assert_eq!(
            upload_key(id, "cv", DocumentKind::Pdf),
            "uploads/00000000-0000-0000-0000-000000000000/cv.pdf"
        );
        assert!(upload_key(id, "project", DocumentKind::Docx).ends_with("/project.docx"));
    }
}
