use directories::ProjectDirs;
use doc_model::Preferences;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const PREFS_SCHEMA_VERSION: u32 = 1;

/// Environment variable that relocates the storage root
pub const HOME_VAR: &str = "REDPEN_HOME";

const DOCUMENTS_DIR: &str = "documents";
const EXPORTS_DIR: &str = "exports";
const EXPORT_SUFFIX: &str = "_annotated.pdf";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("invalid document identifier {0:?}: use letters, digits, '_' or '-' followed by .pdf")]
    InvalidIdentifier(String),
    #[error("document {0:?} not found")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Local document store
///
/// ```text
/// <root>/preferences.json
/// <root>/documents/<id>.pdf
/// <root>/exports/<id>_annotated.pdf
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: Preferences,
}

/// Check that `id` is a bare PDF file name such as `annual-report_2024.pdf`
pub fn validate_identifier(id: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidIdentifier(id.to_owned());

    let stem = id
        .len()
        .checked_sub(4)
        .filter(|split| id.is_char_boundary(*split))
        .filter(|split| id[*split..].eq_ignore_ascii_case(".pdf"))
        .map(|split| &id[..split])
        .ok_or_else(invalid)?;

    let valid_stem = !stem.is_empty()
        && stem.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid_stem {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// `report.pdf` → `report_annotated.pdf`
pub fn export_file_name(id: &str) -> Result<String, StorageError> {
    validate_identifier(id)?;
    Ok(format!("{}{EXPORT_SUFFIX}", &id[..id.len() - 4]))
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs =
            ProjectDirs::from("dev", "redpen", "redpen").ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    /// `REDPEN_HOME` when set, otherwise the platform data directory
    pub fn from_env() -> Result<Self, StorageError> {
        match std::env::var_os(HOME_VAR).filter(|value| !value.is_empty()) {
            Some(home) => Ok(Self::with_root(home)),
            None => Self::from_default_project(),
        }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    pub fn exports_dir(&self) -> PathBuf {
        self.root.join(EXPORTS_DIR)
    }

    pub fn load_preferences(&self) -> Result<Preferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(Preferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;

        if envelope.version != PREFS_SCHEMA_VERSION {
            tracing::warn!(version = envelope.version, "unexpected preferences schema version");
        }

        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &Preferences) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: preferences.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.preferences_path(), bytes)?;
        Ok(())
    }

    /// Path of a stored source document
    pub fn locate(&self, id: &str) -> Result<PathBuf, StorageError> {
        validate_identifier(id)?;
        let path = self.documents_dir().join(id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StorageError::NotFound(id.to_owned()))
        }
    }

    pub fn read_document(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.locate(id)?;
        Ok(fs::read(path)?)
    }

    /// Copy a file into the store under its own file name
    pub fn import_document(&self, source: &Path) -> Result<String, StorageError> {
        let id = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| StorageError::InvalidIdentifier(source.display().to_string()))?
            .to_owned();
        validate_identifier(&id)?;

        fs::create_dir_all(self.documents_dir())?;
        fs::copy(source, self.documents_dir().join(&id))?;
        tracing::debug!(%id, "document imported");
        Ok(id)
    }

    /// Identifiers of every stored document, sorted
    pub fn list_documents(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.documents_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_identifier(name).is_ok() {
                    ids.push(name.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Store exported bytes as `<stem>_annotated.pdf` and return the path
    pub fn write_export(&self, id: &str, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let name = export_file_name(id)?;
        fs::create_dir_all(self.exports_dir())?;

        let path = self.exports_dir().join(name);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), size = bytes.len(), "export written");
        Ok(path)
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let prefs = Preferences {
            default_author: "Dana".to_owned(),
            analysis_model: Some("review-large".to_owned()),
            ..Preferences::default()
        };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, Preferences::default());
    }

    #[test]
    fn identifiers_are_validated() {
        for ok in ["report.pdf", "Q3_results-final.PDF", "a.pdf"] {
            assert!(validate_identifier(ok).is_ok(), "{ok} should be accepted");
        }
        for bad in ["", ".pdf", "report", "my report.pdf", "../secret.pdf", "a/b.pdf", "x.txt", "é.pdf"] {
            assert!(
                matches!(validate_identifier(bad), Err(StorageError::InvalidIdentifier(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn export_names_replace_the_extension() {
        assert_eq!(export_file_name("paper.pdf").unwrap(), "paper_annotated.pdf");
        assert_eq!(export_file_name("PAPER.PDF").unwrap(), "PAPER_annotated.pdf");
    }

    #[test]
    fn documents_import_read_and_export() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path().join("store"));

        let source = temp.path().join("draft.pdf");
        fs::write(&source, b"%PDF-1.4 fake").expect("write source");

        let id = store.import_document(&source).expect("import");
        assert_eq!(id, "draft.pdf");
        assert_eq!(store.list_documents().expect("list"), vec!["draft.pdf".to_owned()]);
        assert_eq!(store.read_document(&id).expect("read"), b"%PDF-1.4 fake");

        let out = store.write_export(&id, b"annotated").expect("export");
        assert_eq!(out, store.exports_dir().join("draft_annotated.pdf"));
        assert_eq!(fs::read(out).expect("read export"), b"annotated");
    }

    #[test]
    fn missing_documents_are_reported() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        assert!(matches!(store.read_document("absent.pdf"), Err(StorageError::NotFound(_))));
        assert!(matches!(store.locate("bad name.pdf"), Err(StorageError::InvalidIdentifier(_))));
    }
}
