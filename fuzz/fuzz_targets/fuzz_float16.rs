//! Fuzz target: the 16-bit float encoders.
//!
//! Any `f32` bit pattern must encode without panicking, and decoding the
//! result must land back in the representable range.
//!
//! cargo fuzz run fuzz_float16

#![no_main]

use libfuzzer_sys::fuzz_target;
use multigas_node::telemetry::float16::{
    f2sflt16, f2uflt16, sflt16_to_f32, uflt16_to_f32,
};

fuzz_target!(|bits: u32| {
    let f = f32::from_bits(bits);

    let u = uflt16_to_f32(f2uflt16(f));
    assert!((0.0..1.0).contains(&u), "uflt16 decodes into [0, 1)");

    let s = sflt16_to_f32(f2sflt16(f));
    assert!(s > -1.0 && s < 1.0, "sflt16 decodes into (-1, 1)");
});
