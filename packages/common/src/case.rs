//! Test-case identity and text normalization.
//!
//! A case is identified by a fingerprint over its input and output bytes,
//! so identical data entered twice collapses to one case and any content
//! change produces a new identity.

use crate::storage::ContentHash;

/// Compute the fingerprint of a test case from its input and output bytes.
///
/// Segments are length-framed (see [`ContentHash::compute_parts`]), so an
/// input-only case is distinct from one with an empty output, and moving
/// bytes across the input/output boundary changes the fingerprint.
pub fn case_fingerprint(input: &[u8], output: Option<&[u8]>) -> ContentHash {
    match output {
        Some(out) => ContentHash::compute_parts([input, out]),
        None => ContentHash::compute_parts([input]),
    }
}

/// Normalize test-case text.
///
/// Strips surrounding whitespace, removes trailing whitespace from each
/// line and terminates non-empty text with exactly one newline. CRLF line
/// endings become LF. Applying the function twice yields the same result
/// as applying it once.
pub fn well_form_text(text: &str) -> String {
    let stripped = text.trim();
    if stripped.is_empty() {
        return String::new();
    }

    let mut out = String::with_capacity(stripped.len() + 1);
    for line in stripped.lines() {
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Byte-level wrapper around [`well_form_text`].
///
/// Well-forming is defined for text; invalid UTF-8 sequences are replaced
/// with U+FFFD before normalization.
pub fn well_form_bytes(data: &[u8]) -> Vec<u8> {
    well_form_text(&String::from_utf8_lossy(data)).into_bytes()
}
