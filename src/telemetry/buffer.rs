//! Fixed-capacity uplink buffer with big-endian put helpers.

use heapless::Vec;

use super::float16::{f2sflt16, f2uflt16};

/// Largest message the node ever builds.  The longest possible 0x27
/// message (every group present) is 59 bytes.
pub const UPLINK_CAPACITY: usize = 64;

/// One uplink message under construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UplinkBuffer {
    bytes: Vec<u8, UPLINK_CAPACITY>,
    overflowed: bool,
}

impl UplinkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty the buffer for a new message.
    pub fn begin(&mut self) {
        self.bytes.clear();
        self.overflowed = false;
    }

    /// Replace the contents with a copy of `other`.
    pub fn copy_from(&mut self, other: &Self) {
        self.bytes.clone_from(&other.bytes);
        self.overflowed = other.overflowed;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `true` if a put was dropped because the buffer was full.
    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    // ── Raw puts ─────────────────────────────────────────────

    pub fn put(&mut self, b: u8) {
        self.put_bytes(&[b]);
    }

    pub fn put2u(&mut self, v: u16) {
        self.put_bytes(&v.to_be_bytes());
    }

    pub fn put2i(&mut self, v: i16) {
        self.put_bytes(&v.to_be_bytes());
    }

    pub fn put4u(&mut self, v: u32) {
        self.put_bytes(&v.to_be_bytes());
    }

    pub fn put4i(&mut self, v: i32) {
        self.put_bytes(&v.to_be_bytes());
    }

    fn put_bytes(&mut self, data: &[u8]) {
        if self.bytes.extend_from_slice(data).is_err() {
            self.overflowed = true;
        }
    }

    // ── Scaled puts ──────────────────────────────────────────

    /// Voltage as signed 1/4096 V.
    pub fn put_v(&mut self, volts: f32) {
        self.put2i(saturate_i16(volts * 4096.0));
    }

    /// Low byte of the boot counter.
    pub fn put_boot_count_lsb(&mut self, count: u32) {
        self.put((count & 0xFF) as u8);
    }

    /// Temperature as signed 1/256 °C.
    pub fn put_t(&mut self, celsius: f32) {
        self.put2i(saturate_i16(celsius * 256.0));
    }

    /// Fraction in `[0, 1]` as an unsigned 16-bit value.
    pub fn put2uf(&mut self, fraction: f32) {
        let scaled = (fraction * 65535.0).round();
        let v = if scaled.is_nan() {
            0
        } else {
            scaled.clamp(0.0, 65535.0) as u16
        };
        self.put2u(v);
    }

    pub fn put_uflt16(&mut self, v: f32) {
        self.put2u(f2uflt16(v));
    }

    pub fn put_sflt16(&mut self, v: f32) {
        self.put2u(f2sflt16(v));
    }
}

fn saturate_i16(v: f32) -> i16 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}
