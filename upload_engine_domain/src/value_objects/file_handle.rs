// /////////////////////////////////////////////////////////////////////////////
// Chunked Upload Engine
// SPDX-License-Identifier: BSD-3-Clause
// /////////////////////////////////////////////////////////////////////////////

//! Opaque reference to a source byte stream. The engine never
//! reads through a `FileHandle` directly; it only carries the attributes
//! needed to fingerprint and validate the file; actual bytes are fetched
//! through the `Adapter` port's `read_chunk`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileHandle {
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
    pub last_modified: Option<i64>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        FileHandle {
            name: name.into(),
            size,
            mime_type: None,
            last_modified: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_last_modified(mut self, last_modified: i64) -> Self {
        self.last_modified = Some(last_modified);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_set_optional_fields() {
        let handle = FileHandle::new("movie.mp4", 1024).with_mime_type("video/mp4").with_last_modified(42);
        assert_eq!(handle.mime_type.as_deref(), Some("video/mp4"));
        assert_eq!(handle.last_modified, Some(42));
    }
}
