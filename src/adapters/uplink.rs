//! Loopback uplink adapter.
//!
//! Implements [`UplinkPort`] without a radio: every launched frame is logged
//! as hex, kept as the last frame, and reported delivered on the next
//! `take_completion()`.  Used by the simulator and on boards brought up
//! before the network stack is provisioned.

use log::info;

use crate::app::ports::UplinkPort;
use crate::error::TransmitError;
use crate::telemetry::UplinkBuffer;

pub struct LoopbackUplink {
    provisioned: bool,
    last: UplinkBuffer,
    completion: Option<bool>,
    frames: u32,
}

impl LoopbackUplink {
    pub fn new(provisioned: bool) -> Self {
        Self {
            provisioned,
            last: UplinkBuffer::new(),
            completion: None,
            frames: 0,
        }
    }

    /// Last frame accepted by `send`.
    pub fn last_frame(&self) -> &[u8] {
        self.last.as_slice()
    }

    /// Frames accepted since start.
    pub fn frames(&self) -> u32 {
        self.frames
    }
}

impl UplinkPort for LoopbackUplink {
    fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    fn send(&mut self, payload: &[u8], confirmed: bool) -> Result<(), TransmitError> {
        if !self.provisioned {
            return Err(TransmitError::NotProvisioned);
        }
        if self.completion.is_some() {
            return Err(TransmitError::Busy);
        }

        self.last.begin();
        for &b in payload {
            self.last.put(b);
        }
        if self.last.overflowed() {
            return Err(TransmitError::Rejected);
        }

        self.frames = self.frames.wrapping_add(1);
        self.completion = Some(true);
        info!(
            "Uplink: frame {} ({} bytes{}) {}",
            self.frames,
            payload.len(),
            if confirmed { ", confirmed" } else { "" },
            Hex(payload)
        );
        Ok(())
    }

    fn take_completion(&mut self) -> Option<bool> {
        self.completion.take()
    }
}

/// Space-separated hex rendering for log lines.
struct Hex<'a>(&'a [u8]);

impl core::fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}
