//! Sense events — screen-capture-derived observations with OCR text.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SenseKind {
    #[default]
    Text,
    Visual,
    Context,
}

/// Capture metadata attached to every sense event.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SenseMeta {
    #[serde(default)]
    pub app: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<String>,
    #[serde(default)]
    pub screen: u32,
    /// Structural-similarity score of the capture against the previous frame.
    #[serde(default)]
    pub ssim: f64,
}

/// Optional binary payload (region-of-interest or diff image). `data` is
/// base64 on the wire and is stripped by meta-only queries.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BinaryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenseEvent {
    pub id: u64,
    /// Producer clock, milliseconds since epoch. Future-dated values are
    /// accepted as-is.
    pub ts: i64,
    /// Local clock at ingest.
    pub received_at: i64,
    #[serde(rename = "type")]
    pub kind: SenseKind,
    #[serde(default)]
    pub ocr: String,
    #[serde(default)]
    pub meta: SenseMeta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roi: Option<BinaryPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<BinaryPayload>,
}

impl SenseEvent {
    /// Copy with binary image data removed (meta-only view).
    pub fn strip_binary(&self) -> SenseEvent {
        let mut out = self.clone();
        if let Some(roi) = out.roi.as_mut() {
            roi.data = None;
        }
        if let Some(diff) = out.diff.as_mut() {
            diff.data = None;
        }
        out
    }
}

/// A sense event before the buffer assigns identity. `ts` comes from the
/// producer; `received_at` is stamped at push time.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSenseEvent {
    pub ts: i64,
    #[serde(rename = "type")]
    pub kind: SenseKind,
    #[serde(default)]
    pub ocr: String,
    #[serde(default)]
    pub meta: SenseMeta,
    #[serde(default)]
    pub roi: Option<BinaryPayload>,
    #[serde(default)]
    pub diff: Option<BinaryPayload>,
}
