//! Fuzz target: `fill_tx_buffer`
//!
//! Builds a snapshot from arbitrary bytes (any mix of groups, any float
//! bit patterns including NaN and infinities) and checks that the encoder
//! never panics, never overflows the uplink buffer, and always writes the
//! tag and the low flag byte first.
//!
//! cargo fuzz run fuzz_encoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use multigas_node::telemetry::measurement::PM_BINS;
use multigas_node::telemetry::{
    Environment, GasChannel, Measurement, Particulate, Position, Reading, UplinkBuffer,
    fill_tx_buffer,
};

struct Bytes<'a>(&'a [u8]);

impl Bytes<'_> {
    fn u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        let n = self.0.len().min(4);
        b[..n].copy_from_slice(&self.0[..n]);
        self.0 = &self.0[n..];
        u32::from_le_bytes(b)
    }

    fn f32(&mut self) -> f32 {
        f32::from_bits(self.u32())
    }

    fn f64(&mut self) -> f64 {
        f64::from(self.f32())
    }
}

fuzz_target!(|data: &[u8]| {
    let Some((&groups, rest)) = data.split_first() else {
        return;
    };
    let mut b = Bytes(rest);
    let mut m = Measurement::new();

    if groups & 0x01 != 0 {
        m.record(Reading::Battery(b.f32()));
    }
    if groups & 0x02 != 0 {
        m.record(Reading::BootCount(b.u32()));
    }
    if groups & 0x04 != 0 {
        m.record(Reading::Environment(Environment {
            temperature_c: b.f32(),
            humidity: b.f32(),
        }));
    }
    if groups & 0x08 != 0 {
        m.record(Reading::Position(Position {
            latitude: b.f64(),
            longitude: b.f64(),
            unix_time: b.u32(),
        }));
    }
    if groups & 0x10 != 0 {
        let mut pm = Particulate::default();
        for i in 0..PM_BINS {
            pm.mass[i] = b.f32();
            pm.count[i] = b.u32();
        }
        m.record(Reading::Particulate(pm));
    }
    if groups & 0x20 != 0 {
        m.record(Reading::Co2(b.f32()));
    }
    for (bit, channel) in [0x40u8, 0x80].into_iter().zip(GasChannel::ALL) {
        if groups & bit != 0 {
            m.record(Reading::Gas(channel, b.f32()));
        }
    }
    m.record(Reading::Supply {
        vsystem: b.f32(),
        vbus: b.f32(),
    });

    let mut buf = UplinkBuffer::new();
    fill_tx_buffer(&mut buf, &m);

    assert!(!buf.overflowed(), "every snapshot fits the uplink buffer");
    assert_eq!(buf.as_slice()[0], 0x27);
    assert_eq!(buf.as_slice()[1], (m.flags().bits() & 0xFF) as u8);
    assert!(buf.len() <= 59);
});
