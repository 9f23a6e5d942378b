//! Field mapping between [`CodeDocument`]s / hint words and store documents.

use crate::error::{IndexerError, Result};
use codesearch_protocol::CodeDocument;
use codesearch_store::{Document, IndexSchema};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Field names of the content index.
pub mod fields {
    pub const CODE_PK: &str = "code_pk";
    pub const FILE_NAME: &str = "file_name";
    pub const FILE_EXTENSION: &str = "file_extension";
    pub const FILE_PATH: &str = "file_path";
    /// Untokenized twin of [`FILE_PATH`], used for exact lookups.
    pub const FILE_PATH_EXACT: &str = "file_path_exact";
    pub const CONTENT: &str = "content";
    /// Case-sensitive twin of [`CONTENT`]; indexed only.
    pub const CONTENT_CS: &str = "content_cs";
    pub const INDEX_DATE: &str = "index_date";
    pub const LAST_WRITE_TIME: &str = "last_write_time";
}

/// Field names of the hint index.
pub mod hint_fields {
    pub const WORD: &str = "word";
    pub const WORD_LOWER: &str = "word_lower";
}

/// Layout of the content index; must agree with [`to_document`].
pub fn content_schema() -> IndexSchema {
    IndexSchema::new()
        .keyword(fields::CODE_PK)
        .text(fields::FILE_NAME, true)
        .keyword(fields::FILE_EXTENSION)
        .text(fields::FILE_PATH, true)
        .keyword(fields::FILE_PATH_EXACT)
        .text(fields::CONTENT, true)
        .case_sensitive_text(fields::CONTENT_CS, false)
        .int(fields::INDEX_DATE)
        .int(fields::LAST_WRITE_TIME)
}

pub fn hint_schema() -> IndexSchema {
    IndexSchema::new()
        .keyword(hint_fields::WORD)
        .keyword(hint_fields::WORD_LOWER)
}

pub fn new_code_pk() -> String {
    Uuid::new_v4().to_string()
}

pub fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn to_document(doc: &CodeDocument) -> Document {
    let mut out = Document::new();
    out.add_keyword(fields::CODE_PK, doc.code_pk.as_str())
        .add_text(fields::FILE_NAME, doc.file_name.as_str(), true)
        .add_keyword(fields::FILE_EXTENSION, doc.file_extension.to_lowercase())
        .add_text(fields::FILE_PATH, doc.file_path.as_str(), true)
        .add_keyword(fields::FILE_PATH_EXACT, doc.file_path.as_str())
        .add_text(fields::CONTENT, doc.content.as_str(), true)
        .add_case_sensitive_text(fields::CONTENT_CS, doc.content.as_str(), false)
        .add_int(fields::INDEX_DATE, doc.index_date)
        .add_int(fields::LAST_WRITE_TIME, doc.last_write_time);
    out
}

/// Rebuild a [`CodeDocument`] from the stored fields of a search hit.
pub fn from_document(doc: &Document) -> Result<CodeDocument> {
    let text = |name: &str| {
        doc.get_str(name)
            .map(str::to_string)
            .ok_or_else(|| IndexerError::Other(format!("stored document lacks field {name}")))
    };
    Ok(CodeDocument {
        code_pk: text(fields::CODE_PK)?,
        file_name: text(fields::FILE_NAME)?,
        file_extension: text(fields::FILE_EXTENSION)?,
        file_path: text(fields::FILE_PATH_EXACT)?,
        content: text(fields::CONTENT)?,
        index_date: doc.get_int(fields::INDEX_DATE).unwrap_or_default(),
        last_write_time: doc.get_int(fields::LAST_WRITE_TIME).unwrap_or_default(),
    })
}

pub fn hint_document(word: &str) -> Document {
    let mut out = Document::new();
    out.add_keyword(hint_fields::WORD, word)
        .add_keyword(hint_fields::WORD_LOWER, word.to_lowercase());
    out
}

/// Name, extension and both path fields for a file at `path`.
pub fn apply_path(doc: &mut CodeDocument, path: &Path) {
    doc.file_path = path_key(path);
    doc.file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    doc.file_extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
}

/// Read a file into a new [`CodeDocument`].
///
/// Returns `Ok(None)` for files larger than `max_bytes`.
pub fn read_code_document(path: &Path, max_bytes: u64) -> Result<Option<CodeDocument>> {
    let meta = std::fs::metadata(path)?;
    if !meta.is_file() {
        return Err(IndexerError::InvalidPath(path.display().to_string()));
    }
    if meta.len() > max_bytes {
        log::debug!(
            "Skipping large file {} ({} bytes > {max_bytes})",
            path.display(),
            meta.len()
        );
        return Ok(None);
    }
    let bytes = std::fs::read(path)?;
    let mut doc = CodeDocument {
        code_pk: new_code_pk(),
        file_name: String::new(),
        file_extension: String::new(),
        file_path: String::new(),
        content: String::from_utf8_lossy(&bytes).into_owned(),
        index_date: unix_millis(SystemTime::now()),
        last_write_time: unix_millis(meta.modified()?),
    };
    apply_path(&mut doc, path);
    Ok(Some(doc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample() -> CodeDocument {
        CodeDocument {
            code_pk: "pk-1".to_string(),
            file_name: "Main.RS".to_string(),
            file_extension: "RS".to_string(),
            file_path: "/work/src/Main.RS".to_string(),
            content: "fn Main() {}".to_string(),
            index_date: 10,
            last_write_time: 20,
        }
    }

    #[test]
    fn mapping_lowercases_extension_and_hides_case_sensitive_content() {
        let doc = to_document(&sample());
        assert_eq!(doc.get_str(fields::FILE_EXTENSION), Some("rs"));
        assert!(doc.stored().field(fields::CONTENT_CS).is_none());

        let back = from_document(&doc.stored()).unwrap();
        assert_eq!(back.file_path, "/work/src/Main.RS");
        assert_eq!(back.file_extension, "rs");
        assert_eq!(back.last_write_time, 20);
    }

    #[test]
    fn schemas_cover_every_mapped_field() {
        let schema = content_schema();
        for field in to_document(&sample()).fields() {
            let spec = schema.field(&field.name).unwrap();
            assert_eq!(spec.kind, field.kind, "{}", field.name);
            assert_eq!(spec.stored, field.stored, "{}", field.name);
        }
        let hints = hint_schema();
        for field in hint_document("Widget").fields() {
            assert!(hints.field(&field.name).is_some());
        }
    }

    #[test]
    fn missing_stored_field_is_an_error() {
        let mut doc = Document::new();
        doc.add_keyword(fields::CODE_PK, "x");
        assert!(from_document(&doc).is_err());
    }

    #[test]
    fn read_respects_size_limit() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("notes.TXT");
        std::fs::write(&path, "hello world").unwrap();

        let doc = read_code_document(&path, 1024).unwrap().unwrap();
        assert_eq!(doc.file_name, "notes.TXT");
        assert_eq!(doc.file_extension, "txt");
        assert_eq!(doc.content, "hello world");
        assert!(doc.last_write_time > 0);

        assert!(read_code_document(&path, 4).unwrap().is_none());
    }
}
