//! Naming rules for the files a session carries: program sources,
//! statements, support files and case archive entries.

use std::path::Path;

use rand::Rng;
use rand::distr::Alphanumeric;

/// Length of the random stem given to uploaded support files.
pub const UPLOAD_NAME_LEN: usize = 16;

/// Result of validating a flat filename.
#[derive(Debug)]
pub enum FilenameError {
    /// Filename is empty or whitespace-only.
    Empty,
    /// Filename contains path separators (`/` or `\`).
    ContainsPathSeparator,
    /// Filename is the `..` traversal component.
    PathTraversal,
    /// Filename contains null bytes.
    NullByte,
    /// Filename starts with a dot (hidden file).
    Hidden,
    /// Filename contains control characters (CR, LF, etc.).
    ControlCharacter,
}

impl FilenameError {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Empty => "Filename cannot be empty",
            Self::ContainsPathSeparator => "Invalid filename: path separators are not allowed",
            Self::PathTraversal => "Invalid filename: '..' is not allowed",
            Self::NullByte => "Invalid filename: null bytes are not allowed",
            Self::Hidden => "Invalid filename: hidden files (starting with '.') are not allowed",
            Self::ControlCharacter => "Invalid filename: control characters are not allowed",
        }
    }
}

/// Validate a filename that must not carry directory components.
///
/// Applies to program, statement and support file names, which live in
/// flat per-session maps. Returns the trimmed name.
pub fn validate_flat_filename(filename: &str) -> Result<&str, FilenameError> {
    let trimmed = filename.trim();

    if trimmed.is_empty() {
        return Err(FilenameError::Empty);
    }
    if trimmed.contains('\0') {
        return Err(FilenameError::NullByte);
    }
    // Control characters would end up in Content-Disposition headers on
    // download; reject them outright.
    if trimmed.chars().any(|c| c.is_ascii_control()) {
        return Err(FilenameError::ControlCharacter);
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        return Err(FilenameError::ContainsPathSeparator);
    }
    if trimmed == ".." {
        return Err(FilenameError::PathTraversal);
    }
    if trimmed.starts_with('.') {
        return Err(FilenameError::Hidden);
    }

    Ok(trimmed)
}

/// Whether a path string contains a `..` traversal component.
///
/// Used on archive entry names, which are untrusted paths.
pub fn contains_path_traversal(path: &str) -> bool {
    path == ".."
        || path.starts_with("../")
        || path.contains("/../")
        || path.ends_with("/..")
        || path.starts_with("..\\")
        || path.contains("\\..\\")
        || path.ends_with("\\..")
}

/// Split an archive entry path into its stem (directory included) and
/// extension: `"sample/1.in"` becomes `("sample/1", "in")`.
///
/// Entries without an extension, or with nothing before the dot, yield
/// `None`; case pairing has no use for them.
pub fn extract_stem(path: &str) -> Option<(&str, &str)> {
    let filename = Path::new(path).file_name()?.to_str()?;
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }

    let stem_end = path.len() - ext.len() - 1; // -1 for the dot
    Some((&path[..stem_end], ext))
}

/// Split a path into directory and final component.
pub fn split_dir_filename(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(pos) => (&path[..pos], &path[pos + 1..]),
        None => ("", path),
    }
}

/// Whether an archive directory marks its cases as samples.
pub fn is_sample_directory(dir: &str) -> bool {
    let lower = dir.to_lowercase();
    lower == "sample" || lower.ends_with("/sample")
}

/// Random storage name for an uploaded support file, keeping the original
/// extension: `"diagram.png"` becomes e.g. `"x7Qw...K2.png"`.
pub fn random_upload_name(original: &str) -> String {
    let stem: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(UPLOAD_NAME_LEN)
        .map(char::from)
        .collect();
    match extract_stem(original) {
        Some((_, ext)) => format!("{stem}.{ext}"),
        None => stem,
    }
}
