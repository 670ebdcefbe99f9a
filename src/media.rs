//! Local media devices
//!
//! The coordinator shows a local camera preview while idle, releases it when a
//! call takes over the camera, and re-arms it once the call is over.

use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// Opaque handle to a media stream (a renderable stream URL on most platforms)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamHandle(String);

impl StreamHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Trait defining access to local capture devices
#[async_trait::async_trait]
pub trait LocalMedia: Send + Sync {
    /// Open the local camera preview
    async fn acquire_preview(&self) -> Result<StreamHandle, MediaError>;

    /// Release a stream previously handed out by this device or by the signaling client
    async fn release(&self, stream: StreamHandle);
}
