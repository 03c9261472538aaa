//! Compressed 16-bit floats used on the uplink.
//!
//! Both formats carry a value whose magnitude lies below 1.0; callers scale
//! the physical quantity by a fixed divisor first (for example CO2 ppm by
//! 40 000).
//!
//! ```text
//!  uflt16:  ┌──────────┬──────────────────────────────┐
//!           │ exp (4b) │ significand (12b)            │   value = sig · 2^(exp-27)
//!           └──────────┴──────────────────────────────┘
//!  sflt16:  ┌───┬──────────┬─────────────────────────┐
//!           │ s │ exp (4b) │ significand (11b)       │   value = ±sig · 2^(exp-26)
//!           └───┴──────────┴─────────────────────────┘
//! ```
//!
//! Out-of-range inputs saturate (`0xFFFF` / `0x7FFF`), negatives and NaN
//! encode as zero in the unsigned format.  Magnitudes below the smallest
//! normal value lose leading significand bits instead of flushing to zero.

const UFLT16_SIG_BITS: i32 = 12;
const SFLT16_SIG_BITS: i32 = 11;
const EXP_BIAS: i32 = 15;

/// Split a positive finite `f` into `(m, e)` with `m` in `[0.5, 1.0)` and
/// `f == m · 2^e`.  Scaling by two is exact, so the loop is lossless.
fn frexp(f: f32) -> (f32, i32) {
    let mut m = f;
    let mut e = 0;
    while m >= 1.0 {
        m *= 0.5;
        e += 1;
    }
    while m < 0.5 {
        m *= 2.0;
        e -= 1;
    }
    (m, e)
}

/// Encode magnitude `mag` (in `(0, 1)`) as `(exp, significand)` with
/// `sig_bits` of significand.  `None` means the exponent overflowed.
fn pack(mag: f32, sig_bits: i32) -> Option<(u16, u16)> {
    let (normal, e) = frexp(mag);
    let mut exp = e + EXP_BIAS;
    let mut shift = sig_bits;
    if exp < 0 {
        shift += exp;
        exp = 0;
        if shift < 0 {
            return Some((0, 0));
        }
    }

    let mut sig = (normal * 2f32.powi(shift) + 0.5) as u32;
    if sig >= 1 << sig_bits {
        sig = 1 << (sig_bits - 1);
        exp += 1;
    }
    if exp > EXP_BIAS {
        return None;
    }
    Some((exp as u16, sig as u16))
}

/// Unsigned 16-bit float for a value in `[0, 1)`.
pub fn f2uflt16(f: f32) -> u16 {
    if f.is_nan() || f <= 0.0 {
        return 0;
    }
    if f >= 1.0 {
        return 0xFFFF;
    }
    match pack(f, UFLT16_SIG_BITS) {
        Some((exp, sig)) => (exp << UFLT16_SIG_BITS) | sig,
        None => 0xFFFF,
    }
}

/// Signed 16-bit float for a value in `(-1, 1)`.
pub fn f2sflt16(f: f32) -> u16 {
    if f.is_nan() || f == 0.0 {
        return 0;
    }
    if f <= -1.0 {
        return 0xFFFF;
    }
    if f >= 1.0 {
        return 0x7FFF;
    }
    let sign = if f < 0.0 { 0x8000 } else { 0 };
    match pack(f.abs(), SFLT16_SIG_BITS) {
        Some((exp, sig)) => sign | (exp << SFLT16_SIG_BITS) | sig,
        None => sign | 0x7FFF,
    }
}

/// Decode an [`f2uflt16`] value.  Collector-side helper, used by tests and
/// the diagnostic dump.
pub fn uflt16_to_f32(v: u16) -> f32 {
    let exp = i32::from(v >> UFLT16_SIG_BITS);
    let sig = f32::from(v & 0x0FFF);
    sig * 2f32.powi(exp - EXP_BIAS - UFLT16_SIG_BITS)
}

/// Decode an [`f2sflt16`] value.
pub fn sflt16_to_f32(v: u16) -> f32 {
    let exp = i32::from((v >> SFLT16_SIG_BITS) & 0x0F);
    let sig = f32::from(v & 0x07FF);
    let mag = sig * 2f32.powi(exp - EXP_BIAS - SFLT16_SIG_BITS);
    if v & 0x8000 != 0 { -mag } else { mag }
}
