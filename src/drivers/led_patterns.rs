//! Blink pattern engine for the single-colour status LED.
//!
//! The measurement loop only names a pattern; the engine turns it into an
//! on/off level.  The board calls `tick()` from its idle loop and drives the
//! LED pin with the result.
//!
//! | Pattern     | Meaning                         | Shape                       |
//! |-------------|---------------------------------|-----------------------------|
//! | Off         | LED dark                        |:                           |
//! | On          | LED lit                         |:                           |
//! | Measuring   | sweep in progress               | 50 % square wave, 2 Hz      |
//! | Sending     | uplink in flight                | 50 % square wave, 8 Hz      |
//! | Sleeping    | idle between uplinks            | 50 ms flash every 4 s       |
//! | TwoShort    | deep sleep imminent             | two 100 ms flashes per 1 s  |

/// Named LED pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedPattern {
    #[default]
    Off,
    On,
    Measuring,
    Sending,
    Sleeping,
    TwoShort,
}

/// Pattern phase tracker.  Stack-allocated, no heap.
#[derive(Debug, Default)]
pub struct LedPatternEngine {
    pattern: LedPattern,
    phase_ms: u32,
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch pattern and restart its phase.  Returns the previous pattern.
    pub fn set(&mut self, pattern: LedPattern) -> LedPattern {
        let previous = core::mem::replace(&mut self.pattern, pattern);
        if previous != pattern {
            self.phase_ms = 0;
        }
        previous
    }

    pub fn pattern(&self) -> LedPattern {
        self.pattern
    }

    /// Advance by `delta_ms` and return the LED level.
    pub fn tick(&mut self, delta_ms: u32) -> bool {
        self.phase_ms = self.phase_ms.wrapping_add(delta_ms);
        Self::level(self.pattern, self.phase_ms)
    }

    fn level(pattern: LedPattern, phase_ms: u32) -> bool {
        match pattern {
            LedPattern::Off => false,
            LedPattern::On => true,
            LedPattern::Measuring => phase_ms % 500 < 250,
            LedPattern::Sending => phase_ms % 125 < 63,
            LedPattern::Sleeping => phase_ms % 4000 < 50,
            LedPattern::TwoShort => {
                let cycle = phase_ms % 1000;
                cycle < 100 || (200..300).contains(&cycle)
            }
        }
    }
}
