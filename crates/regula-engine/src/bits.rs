//! Bit-level helpers shared by the analyses.
//!
//! A relevant-bit pattern stores the bits of the relevant positions
//! least-significant first: bit `k` of the pattern is the `k`-th relevant
//! position counting up from bit 0 of the encoding. Printed and field-spec
//! forms reverse this to MSB-first.

use crate::error::AnalysisError;

/// Largest table width supported. Tables are dense and hold `2^W` entries.
pub const MAX_WIDTH: u32 = 24;

/// Mask with the low `width` bits set.
pub fn low_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    }
}

/// Number of points in a `width`-bit domain.
pub fn domain_size(width: u32) -> u64 {
    1u64 << width
}

pub fn check_width(width: u32) -> Result<(), AnalysisError> {
    if width > MAX_WIDTH {
        return Err(AnalysisError::WidthTooLarge {
            width,
            max: MAX_WIDTH,
        });
    }
    Ok(())
}

/// Collect the bits of `value` selected by `mask` into the low bits of the
/// result, keeping their relative order.
pub fn gather(value: u64, mask: u64) -> u64 {
    let mut out = 0u64;
    let mut k = 0;
    let mut m = mask;
    while m != 0 {
        let bit = m.trailing_zeros();
        if value >> bit & 1 == 1 {
            out |= 1 << k;
        }
        k += 1;
        m &= m - 1;
    }
    out
}

/// Inverse of [`gather`]: spread the low bits of `value` over the set bits of
/// `mask`.
pub fn scatter(value: u64, mask: u64) -> u64 {
    let mut out = 0u64;
    let mut k = 0;
    let mut m = mask;
    while m != 0 {
        let bit = m.trailing_zeros();
        if value >> k & 1 == 1 {
            out |= 1 << bit;
        }
        k += 1;
        m &= m - 1;
    }
    out
}

/// Rebuild a `width`-bit relevant pattern from a left and a right source.
///
/// Walking `mask` from its most significant position down, each position
/// marked in `mask` takes the next most significant unused bit of `right`,
/// every other position takes the next bit of `left`.
pub fn interleave(
    left: u64,
    left_width: u32,
    right: u64,
    right_width: u32,
    mask: u64,
    width: u32,
) -> Result<u64, AnalysisError> {
    if left_width + right_width != width {
        return Err(AnalysisError::DimensionMismatch(format!(
            "sources of {left_width} and {right_width} bits do not fill a {width}-bit mask"
        )));
    }
    if mask & !low_mask(width) != 0 || mask.count_ones() != right_width {
        return Err(AnalysisError::DimensionMismatch(format!(
            "mask {mask:#b} does not select {right_width} of {width} bits"
        )));
    }
    if left & !low_mask(left_width) != 0 || right & !low_mask(right_width) != 0 {
        return Err(AnalysisError::DimensionMismatch(
            "interleave source wider than its declared width".into(),
        ));
    }
    let left_mask = !mask & low_mask(width);
    Ok(scatter(right, mask) | scatter(left, left_mask))
}

/// Render the low `width` bits MSB-first.
pub fn to_bit_string(value: u64, width: u32) -> String {
    (0..width)
        .rev()
        .map(|i| if value >> i & 1 == 1 { '1' } else { '0' })
        .collect()
}
