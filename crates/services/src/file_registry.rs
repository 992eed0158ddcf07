use bson::{DateTime, oid::ObjectId};
use huddle_config::UploadSettings;
use huddle_db::models::UploadedFile;
use mongodb::Database;
use tracing::info;

use crate::auth::Identity;
use crate::dao::file::FileDao;
use crate::error::{EngineError, EngineResult};

/// Checks a prospective upload against the extension allow-list and
/// size ceiling. Runs before any byte is written or row inserted.
pub fn validate_upload(
    settings: &UploadSettings,
    original_name: &str,
    size: u64,
) -> EngineResult<String> {
    let extension = original_name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_ascii_lowercase()))
        .filter(|(stem, ext)| !stem.is_empty() && !ext.is_empty())
        .map(|(_, ext)| ext)
        .ok_or_else(|| {
            EngineError::Validation(format!("file {original_name:?} has no extension"))
        })?;

    if !settings.allowed_extensions.iter().any(|e| *e == extension) {
        return Err(EngineError::Validation(format!(
            "file type .{extension} is not allowed"
        )));
    }

    if size == 0 {
        return Err(EngineError::Validation("file is empty".to_string()));
    }
    if size > settings.max_file_size {
        return Err(EngineError::Validation(format!(
            "file exceeds the {} byte limit",
            settings.max_file_size
        )));
    }

    Ok(extension)
}

/// Metadata registry for uploaded files; the bytes themselves live in
/// the external blob store under a generated name.
pub struct FileRegistryService {
    dao: FileDao,
    settings: UploadSettings,
}

impl FileRegistryService {
    pub fn new(db: &Database, settings: UploadSettings) -> Self {
        Self {
            dao: FileDao::new(db),
            settings,
        }
    }

    /// Validation half, exposed so the upload route can reject before
    /// streaming bytes to disk. Returns the generated stored name.
    pub fn prepare(&self, original_name: &str, size: u64) -> EngineResult<String> {
        let extension = validate_upload(&self.settings, original_name, size)?;
        Ok(format!("{}.{extension}", ObjectId::new().to_hex()))
    }

    pub async fn register(
        &self,
        room_id: &ObjectId,
        identity: &Identity,
        original_name: &str,
        stored_name: &str,
        size: u64,
    ) -> EngineResult<UploadedFile> {
        let mut file = UploadedFile {
            id: None,
            room_id: *room_id,
            original_name: original_name.to_string(),
            stored_name: stored_name.to_string(),
            size,
            uploaded_by: identity.user_id,
            created_at: DateTime::now(),
        };
        let id = self.dao.insert(&file).await?;
        file.id = Some(id);
        info!(room_id = %room_id.to_hex(), %original_name, size, "File registered");
        Ok(file)
    }

    pub async fn list(&self, room_id: &ObjectId) -> EngineResult<Vec<UploadedFile>> {
        Ok(self.dao.find_in_room(*room_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> UploadSettings {
        UploadSettings::default()
    }

    #[test]
    fn rejects_disallowed_extension() {
        let err = validate_upload(&settings(), "malware.exe", 100).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn rejects_missing_extension() {
        assert!(validate_upload(&settings(), "README", 100).is_err());
        assert!(validate_upload(&settings(), ".gitignore", 100).is_err());
    }

    #[test]
    fn rejects_oversize_and_empty() {
        let s = settings();
        assert!(validate_upload(&s, "big.pdf", s.max_file_size + 1).is_err());
        assert!(validate_upload(&s, "empty.pdf", 0).is_err());
    }

    #[test]
    fn accepts_allowed_extension_case_insensitively() {
        assert_eq!(validate_upload(&settings(), "Notes.PDF", 100).unwrap(), "pdf");
    }
}
