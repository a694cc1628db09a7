//! Bounded screenshot queues.
//!
//! Both the primary and the extra queue share one policy: insertion order
//! is kept, ids are unique, and pushing past capacity evicts the oldest.

use crate::llm::types::ImagePayload;
use base64::Engine;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

/// One captured screenshot, held in memory as base64 PNG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub id: String,
    pub image_data: String,
    /// Capture time, milliseconds since the Unix epoch.
    pub captured_at: u64,
}

impl Screenshot {
    pub fn new(id: impl Into<String>, image_data: impl Into<String>, captured_at: u64) -> Self {
        Self {
            id: id.into(),
            image_data: image_data.into(),
            captured_at,
        }
    }

    /// Wrap already-encoded PNG bytes. The id is derived from the payload
    /// and the capture time.
    pub fn from_png_bytes(png_bytes: &[u8]) -> Self {
        let captured_at = now_epoch_ms();
        let mut hasher = Sha256::new();
        hasher.update(png_bytes);
        hasher.update(captured_at.to_le_bytes());
        let digest = hasher.finalize();
        let id: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();

        Self {
            id,
            image_data: base64::engine::general_purpose::STANDARD.encode(png_bytes),
            captured_at,
        }
    }

    /// Encode a decoded image (e.g. a fresh screen capture) to PNG.
    pub fn from_image(image: &image::DynamicImage) -> Result<Self, image::ImageError> {
        let mut png_bytes = Vec::new();
        image.write_to(
            &mut std::io::Cursor::new(&mut png_bytes),
            image::ImageFormat::Png,
        )?;
        Ok(Self::from_png_bytes(&png_bytes))
    }

    pub fn payload(&self) -> ImagePayload {
        ImagePayload::png(self.image_data.clone())
    }
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Result of pushing onto a queue.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    Added,
    /// Added, and the oldest entry was dropped to stay within capacity.
    Evicted(Screenshot),
    /// A screenshot with the same id is already queued; nothing changed.
    Duplicate,
}

/// Ordered, bounded, id-unique screenshot queue.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotQueue {
    items: VecDeque<Screenshot>,
    capacity: usize,
}

impl ScreenshotQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, screenshot: Screenshot) -> PushOutcome {
        if self.contains(&screenshot.id) {
            return PushOutcome::Duplicate;
        }
        self.items.push_back(screenshot);
        if self.items.len() > self.capacity {
            match self.items.pop_front() {
                Some(oldest) => PushOutcome::Evicted(oldest),
                None => PushOutcome::Added,
            }
        } else {
            PushOutcome::Added
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Screenshot> {
        let index = self.items.iter().position(|s| s.id == id)?;
        self.items.remove(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|s| s.id == id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Screenshot> {
        self.items.iter()
    }

    /// Image payloads in capture order.
    pub fn payloads(&self) -> Vec<ImagePayload> {
        self.items.iter().map(Screenshot::payload).collect()
    }
}

// The UI only needs the ordered list, not the capacity.
impl Serialize for ScreenshotQueue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.items.iter())
    }
}
