//! Deterministic name-to-color hashing for events without an explicit color.
//!
//! A presentation convenience, not a correctness contract: the same name
//! always maps to the same color within a build. CPU and GPU events draw
//! from disjoint hue ranges so the two families are visually separable.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hue range for CPU events.
pub const CPU_HUE_RANGE: (f32, f32) = (0.5, 1.0);

/// Hue range for GPU events.
pub const GPU_HUE_RANGE: (f32, f32) = (0.0, 0.5);

const SATURATION: f32 = 0.5;
const VALUE: f32 = 0.6;

/// Derive a packed `0xBBGGRR` color from an event name.
///
/// The name hash selects a hue inside `[hue_min, hue_max)`; saturation and
/// value are fixed so all generated colors sit in the same muted palette.
pub fn color_for_name(name: &str, hue_range: (f32, f32)) -> u32 {
    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let unit = hasher.finish() as f32 / u64::MAX as f32;
    let hue = hue_range.0 + unit * (hue_range.1 - hue_range.0);

    let r = ((hue * 6.0 - 3.0).abs() - 1.0).clamp(0.0, 1.0);
    let g = (2.0 - (hue * 6.0 - 2.0).abs()).clamp(0.0, 1.0);
    let b = (2.0 - (hue * 6.0 - 4.0).abs()).clamp(0.0, 1.0);

    let r = ((r - 1.0) * SATURATION + 1.0) * VALUE;
    let g = ((g - 1.0) * SATURATION + 1.0) * VALUE;
    let b = ((b - 1.0) * SATURATION + 1.0) * VALUE;

    let to_byte = |c: f32| (c * 255.0).round() as u32;
    to_byte(r) | (to_byte(g) << 8) | (to_byte(b) << 16)
}
