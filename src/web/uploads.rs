use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use axum::extract::{Multipart, multipart::Field};
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

/// Extensions accepted for study materials, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "mp4", "mov", "pdf", "epub"];

/// Multipart field that carries the material file.
pub const FILE_FIELD: &str = "file";

const FALLBACK_STEM: &str = "arquivo";
const MAX_NAME_ATTEMPTS: usize = 10_000;
/// Leaves room for `_N.ext` under the usual 255-byte filename limit.
const MAX_STEM_BYTES: usize = 200;

pub type UploadResult<T> = Result<T, UploadError>;

/// Why an upload was refused before anything touched the disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingFile,
    EmptyFilename,
    DisallowedExtension(String),
}

#[derive(Debug)]
pub enum UploadError {
    Rejected(RejectReason),
    Multipart(String),
    Io { context: String, source: io::Error },
}

impl UploadError {
    fn io(context: impl Into<String>, source: io::Error) -> Self {
        UploadError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self, UploadError::Rejected(_))
    }

    /// Text shown to the administrator.
    pub fn message(&self) -> String {
        match self {
            UploadError::Rejected(_) => {
                "Erro: Arquivo inválido, não selecionado ou tipo não permitido.".to_string()
            }
            UploadError::Multipart(_) => "Erro ao ler o formulário de upload.".to_string(),
            UploadError::Io { .. } => "Erro ao salvar o arquivo enviado.".to_string(),
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::Rejected(RejectReason::MissingFile) => write!(f, "no file was sent"),
            UploadError::Rejected(RejectReason::EmptyFilename) => write!(f, "file has no name"),
            UploadError::Rejected(RejectReason::DisallowedExtension(ext)) => {
                write!(f, "extension `{ext}` is not allowed")
            }
            UploadError::Multipart(message) => write!(f, "malformed upload form: {message}"),
            UploadError::Io { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Client filename split into a safe stem and its whitelisted extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedName {
    stem: String,
    extension: String,
}

impl AcceptedName {
    /// Validates `raw` and strips everything that could escape the upload directory.
    pub fn parse(raw: &str) -> UploadResult<Self> {
        if raw.trim().is_empty() {
            return Err(UploadError::Rejected(RejectReason::EmptyFilename));
        }

        let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
        let Some((stem, extension)) = base.rsplit_once('.') else {
            return Err(UploadError::Rejected(RejectReason::DisallowedExtension(
                String::new(),
            )));
        };

        let lowered = extension.to_ascii_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&lowered.as_str()) {
            return Err(UploadError::Rejected(RejectReason::DisallowedExtension(
                lowered,
            )));
        }

        let stem = secure_stem(stem);
        Ok(Self {
            stem: if stem.is_empty() {
                FALLBACK_STEM.to_string()
            } else {
                stem
            },
            extension: extension.to_string(),
        })
    }

    /// `name.ext` for the first attempt, `name_N.ext` afterwards.
    pub fn candidate(&self, attempt: usize) -> String {
        if attempt == 0 {
            format!("{}.{}", self.stem, self.extension)
        } else {
            format!("{}_{}.{}", self.stem, attempt, self.extension)
        }
    }
}

fn secure_stem(raw: &str) -> String {
    let cleaned = sanitize_filename::sanitize(raw);
    let mut safe = String::with_capacity(cleaned.len());
    for ch in cleaned.nfkd() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
            safe.push(ch);
        } else if ch.is_whitespace() {
            safe.push('_');
        }
    }
    let trimmed = safe.trim_matches(|ch| ch == '.' || ch == '_');
    truncate_on_char_boundary(trimmed, MAX_STEM_BYTES)
        .trim_end_matches(|ch| ch == '.' || ch == '_')
        .to_string()
}

fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// A file that has been written into the upload directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub original_name: String,
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

impl StoredUpload {
    /// Removes the file again, used when the rest of the submission turns out invalid.
    pub async fn discard(&self) {
        if let Err(err) = tokio::fs::remove_file(&self.stored_path).await {
            warn!(?err, file = %self.stored_path.display(), "failed to remove discarded upload");
        }
    }
}

/// Destination opened for writing under a name nobody else holds.
pub struct ReservedFile {
    original_name: String,
    stored_name: String,
    stored_path: PathBuf,
    file: File,
    written: u64,
}

impl ReservedFile {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> UploadResult<()> {
        self.written += chunk.len() as u64;
        self.file
            .write_all(chunk)
            .await
            .map_err(|err| UploadError::io("failed to write upload", err))
    }

    pub async fn finish(mut self) -> UploadResult<StoredUpload> {
        self.file
            .flush()
            .await
            .map_err(|err| UploadError::io("failed to flush upload", err))?;
        Ok(StoredUpload {
            original_name: self.original_name,
            stored_name: self.stored_name,
            stored_path: self.stored_path,
            file_size: self.written,
        })
    }

    async fn abandon(self) {
        let path = self.stored_path.clone();
        drop(self.file);
        if let Err(err) = tokio::fs::remove_file(&path).await {
            warn!(?err, file = %path.display(), "failed to remove partial upload");
        }
    }
}

/// Validates `original_name` and creates the first free `name[_N].ext` inside `dir`.
///
/// The file is created with `create_new`, so two concurrent uploads of the same name end up
/// with different suffixes instead of overwriting each other.
pub async fn reserve(dir: &Path, original_name: &str) -> UploadResult<ReservedFile> {
    let accepted = AcceptedName::parse(original_name)?;

    for attempt in 0..MAX_NAME_ATTEMPTS {
        let stored_name = accepted.candidate(attempt);
        let stored_path = dir.join(&stored_name);
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&stored_path)
            .await
        {
            Ok(file) => {
                return Ok(ReservedFile {
                    original_name: original_name.to_string(),
                    stored_name,
                    stored_path,
                    file,
                    written: 0,
                });
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(UploadError::io(
                    format!("failed to create {}", stored_path.display()),
                    err,
                ));
            }
        }
    }

    Err(UploadError::io(
        "no free upload name",
        io::Error::new(io::ErrorKind::AlreadyExists, accepted.candidate(0)),
    ))
}

/// Text fields and the stored file of one multipart submission.
#[derive(Debug, Default)]
pub struct UploadOutcome {
    pub text_fields: Vec<(String, String)>,
    pub file: Option<StoredUpload>,
}

impl UploadOutcome {
    pub fn first_text(&self, field_name: &str) -> Option<&str> {
        self.text_fields
            .iter()
            .find(|(name, _)| name == field_name)
            .map(|(_, value)| value.as_str())
    }

    /// The stored file, or a rejection when the form carried none.
    pub fn require_file(&self) -> UploadResult<&StoredUpload> {
        self.file
            .as_ref()
            .ok_or(UploadError::Rejected(RejectReason::MissingFile))
    }
}

/// Reads a multipart form, streaming the [`FILE_FIELD`] part into `dest_dir`.
///
/// On any error the partially stored file is removed before returning.
pub async fn process_upload_form(
    mut multipart: Multipart,
    dest_dir: &Path,
) -> UploadResult<UploadOutcome> {
    let mut outcome = UploadOutcome::default();

    let result = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| UploadError::Multipart(err.to_string()))?
        {
            let field_name = field.name().unwrap_or_default().to_string();

            let Some(file_name) = field.file_name().map(str::to_string) else {
                let value = field
                    .text()
                    .await
                    .map_err(|err| UploadError::Multipart(err.to_string()))?;
                outcome.text_fields.push((field_name, value));
                continue;
            };

            if field_name != FILE_FIELD {
                continue;
            }
            if outcome.file.is_some() {
                return Err(UploadError::Multipart(
                    "more than one file part".to_string(),
                ));
            }

            outcome.file = Some(store_field(field, dest_dir, &file_name).await?);
        }
        Ok::<(), UploadError>(())
    }
    .await;

    match result {
        Ok(()) => Ok(outcome),
        Err(err) => {
            if let Some(stored) = &outcome.file {
                stored.discard().await;
            }
            Err(err)
        }
    }
}

async fn store_field(
    mut field: Field<'_>,
    dest_dir: &Path,
    file_name: &str,
) -> UploadResult<StoredUpload> {
    let mut reserved = reserve(dest_dir, file_name).await?;

    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if let Err(err) = reserved.write_chunk(&chunk).await {
                    reserved.abandon().await;
                    return Err(err);
                }
            }
            Ok(None) => break,
            Err(err) => {
                reserved.abandon().await;
                return Err(UploadError::Multipart(err.to_string()));
            }
        }
    }

    reserved.finish().await
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    async fn store_bytes(dir: &Path, name: &str, bytes: &[u8]) -> UploadResult<StoredUpload> {
        let mut reserved = reserve(dir, name).await?;
        reserved.write_chunk(bytes).await?;
        reserved.finish().await
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn accepts_whitelisted_extensions_case_insensitively() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.Mp4", "e.mov", "f.PDF", "g.epub"] {
            assert!(AcceptedName::parse(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_missing_or_disallowed_extensions() {
        assert!(matches!(
            AcceptedName::parse("virus.exe"),
            Err(UploadError::Rejected(RejectReason::DisallowedExtension(ext))) if ext == "exe"
        ));
        assert!(matches!(
            AcceptedName::parse("pdf"),
            Err(UploadError::Rejected(RejectReason::DisallowedExtension(_)))
        ));
        assert!(matches!(
            AcceptedName::parse("notes.pdf.exe"),
            Err(UploadError::Rejected(_))
        ));
        assert!(matches!(
            AcceptedName::parse("   "),
            Err(UploadError::Rejected(RejectReason::EmptyFilename))
        ));
    }

    #[test]
    fn strips_traversal_and_unsafe_characters() {
        let name = AcceptedName::parse("../../etc/passwd.png").expect("accepted");
        assert_eq!(name.candidate(0), "passwd.png");

        let name = AcceptedName::parse(r"C:\Users\ana\Minha Aula.PDF").expect("accepted");
        assert_eq!(name.candidate(0), "Minha_Aula.PDF");

        let name = AcceptedName::parse("Álgebra Básica.pdf").expect("accepted");
        assert_eq!(name.candidate(0), "Algebra_Basica.pdf");

        let name = AcceptedName::parse("..png").expect("accepted");
        assert_eq!(name.candidate(0), "arquivo.png");
    }

    #[test]
    fn long_stems_are_capped_before_suffixing() {
        let raw = format!("{}.pdf", "a".repeat(300));
        let name = AcceptedName::parse(&raw).expect("accepted");
        assert_eq!(name.candidate(0), format!("{}.pdf", "a".repeat(MAX_STEM_BYTES)));
        assert!(name.candidate(9_999).len() < 255);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_on_char_boundary("abc", 10), "abc");
        assert_eq!(truncate_on_char_boundary("aé", 2), "a");
        assert_eq!(truncate_on_char_boundary("aéb", 3), "aé");
    }

    #[tokio::test]
    async fn long_name_uploads_store_without_io_failure() {
        let dir = tempdir().expect("tempdir");
        let raw = format!("{}.png", "x".repeat(254));
        let first = store_bytes(dir.path(), &raw, b"1").await.expect("first");
        let second = store_bytes(dir.path(), &raw, b"2").await.expect("second");
        assert!(first.stored_name.len() <= MAX_STEM_BYTES + ".png".len());
        assert!(second.stored_name.ends_with("_1.png"));
    }

    #[test]
    fn candidates_insert_suffix_before_extension() {
        let name = AcceptedName::parse("relatorio.final.pdf").expect("accepted");
        assert_eq!(name.candidate(0), "relatorio.final.pdf");
        assert_eq!(name.candidate(1), "relatorio.final_1.pdf");
        assert_eq!(name.candidate(12), "relatorio.final_12.pdf");
    }

    #[tokio::test]
    async fn same_name_uploads_get_distinct_files() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("outro.pdf"), b"existing").expect("seed");

        let first = store_bytes(dir.path(), "x.png", b"first").await.expect("first");
        let second = store_bytes(dir.path(), "x.png", b"second").await.expect("second");
        let third = store_bytes(dir.path(), "x.png", b"third").await.expect("third");

        assert_eq!(first.stored_name, "x.png");
        assert_eq!(second.stored_name, "x_1.png");
        assert_eq!(third.stored_name, "x_2.png");
        assert_eq!(second.file_size, 6);

        assert_eq!(std::fs::read(&first.stored_path).expect("read"), b"first");
        assert_eq!(std::fs::read(&second.stored_path).expect("read"), b"second");
        assert_eq!(std::fs::read(&third.stored_path).expect("read"), b"third");
    }

    #[tokio::test]
    async fn identical_content_with_different_names_is_not_deduplicated() {
        let dir = tempdir().expect("tempdir");
        store_bytes(dir.path(), "a.pdf", b"same").await.expect("a");
        store_bytes(dir.path(), "b.pdf", b"same").await.expect("b");
        assert_eq!(files_in(dir.path()), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn rejected_name_leaves_directory_untouched() {
        let dir = tempdir().expect("tempdir");
        let err = reserve(dir.path(), "virus.exe").await.err().expect("rejected");
        assert!(err.is_rejection());
        assert!(files_in(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn discard_removes_stored_file() {
        let dir = tempdir().expect("tempdir");
        let stored = store_bytes(dir.path(), "aula.mp4", b"video").await.expect("stored");
        stored.discard().await;
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn outcome_requires_file() {
        let outcome = UploadOutcome {
            text_fields: vec![("titulo".to_string(), "Aula".to_string())],
            file: None,
        };
        assert_eq!(outcome.first_text("titulo"), Some("Aula"));
        assert!(matches!(
            outcome.require_file(),
            Err(UploadError::Rejected(RejectReason::MissingFile))
        ));
    }
}
