use crate::services::workspace::ScratchFile;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest extension we will hand to the engine.
pub const MAX_FORMAT_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("target format is empty")]
    Empty,
    #[error("target format '{0}' is longer than {max} characters", max = MAX_FORMAT_LEN)]
    TooLong(String),
    #[error("target format '{0}' contains characters other than ASCII letters and digits")]
    InvalidCharacters(String),
}

/// Extension of the file the caller wants back, e.g. `docx` or `pdf`.
///
/// Any well-formed token is passed to the engine, which decides whether it
/// can produce it. The token only has to be usable as a file-name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetFormat(String);

impl TargetFormat {
    pub fn new(raw: &str) -> Result<Self, FormatError> {
        let trimmed = raw.trim();
        let token = trimmed.strip_prefix('.').unwrap_or(trimmed);

        if token.is_empty() {
            return Err(FormatError::Empty);
        }
        if token.len() > MAX_FORMAT_LEN {
            return Err(FormatError::TooLong(token.to_string()));
        }
        if !token.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(FormatError::InvalidCharacters(token.to_string()));
        }

        Ok(Self(token.to_ascii_lowercase()))
    }

    /// The caller's `to` field, falling back to `default` when it is
    /// missing or blank.
    pub fn resolve(raw: Option<&str>, default: &TargetFormat) -> Result<Self, FormatError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(default.clone()),
            Some(value) => Self::new(value),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn content_type(&self) -> &'static str {
        match self.0.as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            "doc" => "application/msword",
            "xls" => "application/vnd.ms-excel",
            "ppt" => "application/vnd.ms-powerpoint",
            "odt" => "application/vnd.oasis.opendocument.text",
            "ods" => "application/vnd.oasis.opendocument.spreadsheet",
            "odp" => "application/vnd.oasis.opendocument.presentation",
            "rtf" => "application/rtf",
            "txt" => "text/plain; charset=utf-8",
            "html" | "htm" => "text/html; charset=utf-8",
            "csv" => "text/csv; charset=utf-8",
            "epub" => "application/epub+zip",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "svg" => "image/svg+xml",
            _ => "application/octet-stream",
        }
    }
}

impl FromStr for TargetFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bytes received from the client, persisted in the working directory.
#[derive(Debug)]
pub struct UploadedFile {
    pub original_name: Option<String>,
    pub file: ScratchFile,
    pub size: u64,
}

#[derive(Debug)]
pub struct ConversionRequest {
    pub source: UploadedFile,
    pub target: TargetFormat,
}

/// Engine output waiting to be streamed back. Removed from disk when the
/// value (or the response body holding it) is dropped.
#[derive(Debug)]
pub struct ConvertedFile {
    pub file: ScratchFile,
    pub format: TargetFormat,
    pub size: u64,
}

impl ConvertedFile {
    /// Name offered to the client in `Content-Disposition`.
    pub fn download_name(&self) -> String {
        self.file.file_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docx() -> TargetFormat {
        TargetFormat::new("docx").unwrap()
    }

    #[test]
    fn missing_or_blank_falls_back_to_default() {
        assert_eq!(TargetFormat::resolve(None, &docx()).unwrap(), docx());
        assert_eq!(TargetFormat::resolve(Some("   "), &docx()).unwrap(), docx());
    }

    #[test]
    fn leading_dot_and_case_are_normalised() {
        let format = TargetFormat::resolve(Some(".PDF"), &docx()).unwrap();
        assert_eq!(format.as_str(), "pdf");
        assert_eq!(format.content_type(), "application/pdf");
    }

    #[test]
    fn path_like_tokens_are_rejected() {
        assert!(matches!(
            TargetFormat::new("../../etc/passwd"),
            Err(FormatError::InvalidCharacters(_))
        ));
        assert!(matches!(
            TargetFormat::new("pdf:writer"),
            Err(FormatError::InvalidCharacters(_))
        ));
        assert!(matches!(
            TargetFormat::new("pdf:writer_pdf_Export"),
            Err(FormatError::TooLong(_))
        ));
        assert_eq!(TargetFormat::new("."), Err(FormatError::Empty));
    }

    #[test]
    fn overlong_tokens_are_rejected() {
        let long = "x".repeat(MAX_FORMAT_LEN + 1);
        assert!(matches!(
            TargetFormat::new(&long),
            Err(FormatError::TooLong(_))
        ));
    }

    #[test]
    fn unknown_formats_are_accepted_as_opaque() {
        let format: TargetFormat = "abw".parse().unwrap();
        assert_eq!(format.to_string(), "abw");
        assert_eq!(format.content_type(), "application/octet-stream");
    }
}
