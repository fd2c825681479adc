//! Playback entry types.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use url::Url;
use uuid::Uuid;

use super::OutputFormat;

/// Opaque identifier for one playback item.
///
/// Equality is by value; two entries built from the same id compare equal
/// as far as the scheduler and observers are concerned.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AudioEntryId(String);

impl AudioEntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AudioEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AudioEntryId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<Url> for AudioEntryId {
    fn from(url: Url) -> Self {
        Self(url.into())
    }
}

/// Where the bytes for an entry come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AudioSource {
    /// Remote file or live stream fetched over HTTP.
    Remote {
        url: Url,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
    /// File on the local filesystem.
    Local(PathBuf),
    /// Bytes pushed by the host through a custom stream.
    Stream { name: String },
}

impl AudioSource {
    pub fn remote(url: Url) -> Self {
        Self::Remote {
            url,
            headers: HashMap::new(),
        }
    }

    /// Whether this source is fetched over the network.
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Human readable location, used for logging.
    pub fn describe(&self) -> String {
        match self {
            Self::Remote { url, .. } => url.to_string(),
            Self::Local(path) => path.display().to_string(),
            Self::Stream { name } => format!("stream:{name}"),
        }
    }
}

/// One playback item: an id, its data source, and the format it decodes to.
///
/// Owned by exactly one scheduler lane at a time; moved in and out by value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioEntry {
    pub id: AudioEntryId,
    pub source: AudioSource,
    pub output_format: OutputFormat,
}

impl AudioEntry {
    pub const fn new(id: AudioEntryId, source: AudioSource, output_format: OutputFormat) -> Self {
        Self {
            id,
            source,
            output_format,
        }
    }

    /// Build an entry for a remote URL, using the URL as its id.
    pub fn from_url(url: Url) -> Self {
        Self::new(
            AudioEntryId::from(url.clone()),
            AudioSource::remote(url),
            OutputFormat::default(),
        )
    }

    /// Build an entry for a local file with a generated id.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::new(
            AudioEntryId::generate(),
            AudioSource::Local(path.into()),
            OutputFormat::default(),
        )
    }
}

/// Selects one of the two ordered collections of the entry scheduler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueueLane {
    /// Entries currently being fetched and parsed.
    Buffering,
    /// Entries waiting their turn.
    Upcoming,
}

impl QueueLane {
    pub const ALL: [Self; 2] = [Self::Upcoming, Self::Buffering];
}
