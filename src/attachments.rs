// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Attachment text extraction
//!
//! Best-effort conversion of an uploaded file into prompt text. Extraction
//! never fails the submit path: unsupported or undecodable content yields an
//! empty string, which the message composer then ignores.

/// Extract prompt text from an attachment. Plain-text media decodes with
/// invalid UTF-8 sequences replaced; anything else is skipped with a warning.
pub fn extract_text(media_type: &str, bytes: &[u8]) -> String {
    if !is_text_media(media_type) {
        tracing::warn!(media_type, "unsupported attachment type, skipping");
        return String::new();
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn is_text_media(media_type: &str) -> bool {
    media_type.starts_with("text/")
}

/// Guess a media type from a file extension, for CLI attachments where no
/// declared type exists.
pub fn media_type_for_path(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("txt") | Some("md") | Some("csv") | Some("log") => "text/plain",
        _ => "application/octet-stream",
    }
}
