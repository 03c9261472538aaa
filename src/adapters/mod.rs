//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements     | Connects to                      |
//! |------------|----------------|----------------------------------|
//! | `hardware` | PowerPort      | ESP32 timer, light sleep, GPIO   |
//! |            | PlatformPort   | ESP32 ADC (supply rails)         |
//! |            | IndicatorPort  | Status LED                       |
//! |            | UplinkPort     | Delegates to the transport       |
//! | `log_sink` | EventSink      | Serial log output                |
//! | `nvs`      | ConfigPort     | NVS / in-memory store            |
//! |            | StoragePort    |                                  |
//! | `time`     | (clock)        | ESP32 system timer               |
//! | `uplink`   | UplinkPort     | Loopback transport (log only)    |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uplink;
