// Data sources that can be bound to an engine session

use crate::error::{PlayerError, Result};
use std::collections::BTreeMap;

/// Where the engine should read media from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// URI (file path, http(s) URL, ...) with optional request headers
    Uri {
        uri: String,
        headers: BTreeMap<String, String>,
    },
    /// Already opened file descriptor, read from `offset` for `length` bytes
    Descriptor { fd: i32, offset: i64, length: i64 },
}

impl DataSource {
    pub fn uri(uri: impl Into<String>) -> Self {
        DataSource::Uri {
            uri: uri.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn uri_with_headers(uri: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        DataSource::Uri {
            uri: uri.into(),
            headers,
        }
    }

    pub fn descriptor(fd: i32, offset: i64, length: i64) -> Self {
        DataSource::Descriptor { fd, offset, length }
    }

    /// Reject sources no engine could open.
    pub fn validate(&self) -> Result<()> {
        match self {
            DataSource::Uri { uri, .. } => {
                if uri.trim().is_empty() {
                    return Err(PlayerError::BadValue("empty URI".to_string()));
                }
            }
            DataSource::Descriptor { fd, offset, length } => {
                if *fd < 0 {
                    return Err(PlayerError::BadValue(format!("invalid descriptor {}", fd)));
                }
                if *offset < 0 || *length < 0 {
                    return Err(PlayerError::BadValue(format!(
                        "invalid range offset={} length={}",
                        offset, length
                    )));
                }
            }
        }
        Ok(())
    }

    /// Short description for logs. Headers are left out.
    pub fn describe(&self) -> String {
        match self {
            DataSource::Uri { uri, .. } => format!("uri {}", uri),
            DataSource::Descriptor { fd, offset, length } => {
                format!("fd {} offset={} length={}", fd, offset, length)
            }
        }
    }
}
