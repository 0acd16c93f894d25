//! File identifier protocol.
//!
//! Files exposed to or returned from tool calls are referenced inline inside
//! message text as short tokens of the form `<file>{id}</file>`, optionally
//! followed by `<url>{temporary-url}</url>`. Ids carry a fixed kind-specific
//! prefix plus a unique suffix, so arbitrary text can be scanned and
//! classified as "possibly a file reference" without a registry lookup.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use uuid::Uuid;

/// Prefix for ids minted for files backed by local disk.
pub const LOCAL_FILE_ID_PREFIX: &str = "file-local-";

/// Prefix for ids minted for files backed by a remote store.
pub const REMOTE_FILE_ID_PREFIX: &str = "file-remote-";

static FILE_TOKEN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<file>(file-(?:local|remote)-[0-9A-Za-z-]+)</file>")
        .expect("file token pattern must compile")
});

/// Kind of backing store a file id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileIdKind {
    Local,
    Remote,
}

/// Mint a globally unique file id: kind prefix, UTC timestamp, uuid suffix.
pub fn generate_file_id(kind: FileIdKind) -> String {
    let prefix = match kind {
        FileIdKind::Local => LOCAL_FILE_ID_PREFIX,
        FileIdKind::Remote => REMOTE_FILE_ID_PREFIX,
    };
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let suffix = Uuid::new_v4().simple();
    format!("{}{}-{}", prefix, stamp, suffix)
}

/// Classify a string as a local or remote file id by prefix alone.
///
/// Ids issued by a remote backend keep whatever form the backend chose, so a
/// `None` here means "not one of ours", not "not a file".
pub fn classify_file_id(id: &str) -> Option<FileIdKind> {
    if id.starts_with(LOCAL_FILE_ID_PREFIX) {
        Some(FileIdKind::Local)
    } else if id.starts_with(REMOTE_FILE_ID_PREFIX) {
        Some(FileIdKind::Remote)
    } else {
        None
    }
}

/// Whether the string looks like a file id this crate minted.
pub fn is_file_id(text: &str) -> bool {
    classify_file_id(text).is_some()
}

/// Canonical inline reference token for a file id.
pub fn file_token(id: &str) -> String {
    format!("<file>{}</file>", id)
}

/// Reference token followed by a temporary URL, for callers that requested
/// URL inclusion.
pub fn file_token_with_url(id: &str, url: &str) -> String {
    format!("<file>{}</file><url>{}</url>", id, url)
}

/// Extract every well-formed file id referenced in `text`, in order of
/// appearance. Tokens whose id does not match a known prefix are skipped.
pub fn scan_file_references(text: &str) -> Vec<String> {
    FILE_TOKEN_PATTERN
        .captures_iter(text)
        .map(|captures| captures[1].to_string())
        .collect()
}
