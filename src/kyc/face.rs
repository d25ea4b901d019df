//! Face image quality checks and face-to-document comparison.
//!
//! [`FaceEngine`] is the seam for a real biometric stack. The bundled
//! [`HeuristicFaceEngine`] only inspects image headers for dimensions and
//! derives a simulated similarity score; production deployments must swap in
//! an engine backed by an actual detector/matcher. Callers never depend on
//! the heuristic directly, only on the trait contract.

use rand::Rng;

const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MIN_DIMENSION: u32 = 300;
const REFERENCE_PIXELS: f32 = 640.0 * 480.0;
const MATCH_THRESHOLD: f32 = 0.70;

/// Pixel dimensions reported by the engine's decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Outcome of a single-shot quality evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEvaluation {
    pub accepted: bool,
    pub message: &'static str,
    pub quality_score: f32,
}

/// Similarity verdict between two face images.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceComparison {
    pub similarity: f32,
    pub is_match: bool,
}

/// Pluggable face detection/comparison engine.
pub trait FaceEngine: Send + Sync {
    /// Decode enough of the image to report its dimensions, or `None` when
    /// the bytes are not a supported image.
    fn probe(&self, bytes: &[u8]) -> Option<ImageDimensions>;

    /// Compare two face images, returning a similarity in [0, 1].
    fn compare(&self, a: &[u8], b: &[u8]) -> FaceComparison;

    /// Evaluate an uploaded image: size cap, minimum resolution, face
    /// detectability, then a quality score. The detectability check is
    /// approximated by the resolution gate until a real detector is plugged
    /// in through this trait.
    fn evaluate(&self, bytes: &[u8]) -> FaceEvaluation {
        if bytes.len() > MAX_IMAGE_BYTES {
            return rejected("Image file too large");
        }

        let Some(dims) = self.probe(bytes) else {
            return rejected("Image could not be decoded");
        };

        if dims.width < MIN_DIMENSION || dims.height < MIN_DIMENSION {
            return rejected("Image resolution too low");
        }

        if !self.detect_face(dims) {
            return rejected("No face detected in image");
        }

        FaceEvaluation {
            accepted: true,
            message: "Face detected successfully",
            quality_score: quality_score(dims),
        }
    }

    /// Face presence check given decoded dimensions. The default mirrors the
    /// resolution gate; a real engine overrides this with detector output.
    fn detect_face(&self, dims: ImageDimensions) -> bool {
        dims.width >= MIN_DIMENSION && dims.height >= MIN_DIMENSION
    }
}

fn rejected(message: &'static str) -> FaceEvaluation {
    FaceEvaluation {
        accepted: false,
        message,
        quality_score: 0.0,
    }
}

fn quality_score(dims: ImageDimensions) -> f32 {
    let pixel_count = dims.width as f32 * dims.height as f32;
    let size_score = (pixel_count / REFERENCE_PIXELS).min(1.0);

    let aspect_ratio = dims.width as f32 / dims.height as f32;
    let aspect_score = if (0.7..=1.4).contains(&aspect_ratio) {
        1.0
    } else {
        0.5
    };

    let quality = (size_score * 0.6 + aspect_score * 0.4) * 0.9;
    (quality * 100.0).round() / 100.0
}

/// Header-only engine: reads PNG/JPEG dimensions and simulates comparison.
#[derive(Debug, Default, Clone)]
pub struct HeuristicFaceEngine;

impl FaceEngine for HeuristicFaceEngine {
    fn probe(&self, bytes: &[u8]) -> Option<ImageDimensions> {
        png_dimensions(bytes).or_else(|| jpeg_dimensions(bytes))
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> FaceComparison {
        let (Some(dims_a), Some(dims_b)) = (self.probe(a), self.probe(b)) else {
            return FaceComparison {
                similarity: 0.0,
                is_match: false,
            };
        };

        let wa = dims_a.width as f32;
        let wb = dims_b.width as f32;
        let size_similarity = (wa / wb).min(wb / wa);

        // Simulated matcher: scale by a random factor the way the stand-in
        // biometric backend does. Not business logic, only the contract that
        // similarity lands in [0, 1] and matches clear the 0.70 threshold.
        let random_factor = rand::thread_rng().gen_range(0.60..0.95);
        let similarity = (size_similarity * random_factor).min(0.95);

        FaceComparison {
            similarity,
            is_match: similarity > MATCH_THRESHOLD,
        }
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

fn png_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    (width > 0 && height > 0).then_some(ImageDimensions { width, height })
}

fn jpeg_dimensions(bytes: &[u8]) -> Option<ImageDimensions> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return None;
    }

    let mut offset = 2usize;
    while offset + 9 <= bytes.len() {
        if bytes[offset] != 0xFF {
            return None;
        }
        let marker = bytes[offset + 1];
        // Start-of-frame markers carry the dimensions; C4/C8/CC do not.
        if (0xC0..=0xCF).contains(&marker) && ![0xC4, 0xC8, 0xCC].contains(&marker) {
            let height = u16::from_be_bytes([bytes[offset + 5], bytes[offset + 6]]) as u32;
            let width = u16::from_be_bytes([bytes[offset + 7], bytes[offset + 8]]) as u32;
            return (width > 0 && height > 0).then_some(ImageDimensions { width, height });
        }
        let segment_len = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if segment_len < 2 {
            return None;
        }
        offset += 2 + segment_len;
    }
    None
}

/// Build a minimal PNG header with the given dimensions. Only the bytes the
/// probe inspects are meaningful; used by tests and demos to exercise the
/// quality rules without shipping binary fixtures.
pub fn synthetic_png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(24);
    bytes.extend_from_slice(&PNG_SIGNATURE);
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}
