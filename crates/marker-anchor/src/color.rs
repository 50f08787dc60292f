//! Deterministic identifier hashing.
//!
//! Both the node color and the unlocated fallback position are derived from
//! the same 31-multiplier hash over the identifier's UTF-16 code units, so
//! they are stable across runs and platforms.

use crate::scene::MaterialColor;

/// `h = h * 31 + c` over UTF-16 code units with 32-bit wrap-around.
pub fn identifier_hash(identifier: &str) -> i32 {
    identifier.encode_utf16().fold(0i32, |h, c| {
        h.wrapping_shl(5).wrapping_sub(h).wrapping_add(i32::from(c))
    })
}

/// Absolute value of [`identifier_hash`].
#[inline]
pub fn identifier_hash_abs(identifier: &str) -> u32 {
    identifier_hash(identifier).unsigned_abs()
}

/// Hue in degrees, `[0, 360)`.
pub fn identifier_hue(identifier: &str) -> u32 {
    identifier_hash_abs(identifier) % 360
}

/// Node color for an identifier at fixed saturation and lightness.
pub fn identifier_color(identifier: &str, saturation: f64, lightness: f64) -> MaterialColor {
    MaterialColor::from_hsl(
        f64::from(identifier_hue(identifier)) / 360.0,
        saturation,
        lightness,
    )
}
