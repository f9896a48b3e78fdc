use std::path::Path;
use thiserror::Error;

#[cfg(feature = "docx")]
mod docx;
#[cfg(feature = "docx")]
mod numbering;

#[cfg(feature = "docx")]
pub use docx::DocxConverter;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "docx")]
    #[error("not a valid .docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("document part missing: {0}")]
    MissingPart(String),
    #[error("malformed XML in {part}: {message}")]
    Xml { part: String, message: String },
    #[error("DOCX support not compiled in (enable the `docx` feature of citecheck-docx)")]
    NoDocxSupport,
}

/// The Markdown rendering of a document plus any advisory conversion warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversion {
    pub markdown: String,
    pub warnings: Vec<String>,
}

/// Turns raw document bytes into Markdown.
///
/// Warnings are advisory: an implementation returns `Err` only when no
/// usable Markdown can be produced at all.
pub trait Converter {
    fn convert(&self, bytes: &[u8]) -> Result<Conversion, ConvertError>;
}

/// Passes Markdown or plain text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughConverter;

impl Converter for PassthroughConverter {
    fn convert(&self, bytes: &[u8]) -> Result<Conversion, ConvertError> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut warnings = Vec::new();
        let markdown = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                warnings.push("input is not valid UTF-8; invalid sequences were replaced".to_string());
                String::from_utf8_lossy(bytes).into_owned()
            }
        };
        Ok(Conversion { markdown, warnings })
    }
}

/// Whether the path names a document that is already Markdown or plain text.
pub fn is_markup_path(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    matches!(ext.as_str(), "md" | "markdown" | "txt")
}

/// Pick a converter for the given path.
///
/// Dispatches on file extension:
/// - `.md`, `.markdown`, `.txt` → passthrough
/// - anything else → DOCX converter (requires the `docx` feature)
pub fn converter_for(path: &Path) -> Result<Box<dyn Converter>, ConvertError> {
    if is_markup_path(path) {
        return Ok(Box::new(PassthroughConverter));
    }
    docx_converter()
}

#[cfg(feature = "docx")]
fn docx_converter() -> Result<Box<dyn Converter>, ConvertError> {
    Ok(Box::new(DocxConverter))
}

#[cfg(not(feature = "docx"))]
fn docx_converter() -> Result<Box<dyn Converter>, ConvertError> {
    Err(ConvertError::NoDocxSupport)
}
