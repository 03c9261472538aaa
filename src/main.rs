//! Multigas node firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  BoardAdapter        LogEventSink   NvsAdapter   MonotonicClock│
//! │  (Power+Platform+    (EventSink)    (Config+NVS) (clock)       │
//! │   Indicator+Uplink)  LoopbackUplink (UplinkPort)               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │          MeasurementLoop (pure logic)                  │    │
//! │  │  FSM · sleep policy · 0x27 encoder · gas conversion    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! On the host this binary is the simulator: sensors are the `sim` adapters,
//! the clock fast-forwards through sleeps, and uplinks are logged as hex.
#![deny(unused_must_use)]

use anyhow::{Context, Result};
use log::{info, warn};

use multigas_node::adapters::hardware::BoardAdapter;
use multigas_node::adapters::log_sink::LogEventSink;
use multigas_node::adapters::nvs::NvsAdapter;
use multigas_node::adapters::time::MonotonicClock;
use multigas_node::adapters::uplink::LoopbackUplink;
use multigas_node::app::commands::AppCommand;
use multigas_node::app::ports::ConfigPort;
use multigas_node::app::service::MeasurementLoop;
use multigas_node::config::SystemConfig;
use multigas_node::drivers::hw_init;
use multigas_node::drivers::status_led::StatusLed;
use multigas_node::fsm::StateId;
use multigas_node::pins;
use multigas_node::sensors::SensorHub;
use multigas_node::sensors::gas::GasSensor;
use multigas_node::sensors::sim::{SimAnalogFrontEnd, SimCo2, SimGps, SimParticulate, SimThSensor};
use multigas_node::telemetry::Position;
use multigas_node::telemetry::measurement::PM_BINS;

/// Environment variable naming a JSON file that overrides the stored config.
const CONFIG_ENV: &str = "MULTIGAS_CONFIG";

fn init_logger() -> Result<()> {
    #[cfg(target_os = "espidf")]
    {
        esp_idf_svc::sys::link_patches();
        esp_idf_logger::init().context("logger init")?;
    }
    #[cfg(not(target_os = "espidf"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init()
            .context("logger init")?;
    }
    Ok(())
}

/// Stored config, replaced by the JSON file named in `MULTIGAS_CONFIG` if set.
fn load_config(nvs: &NvsAdapter) -> Result<SystemConfig> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config override {}", path))?;
        let config: SystemConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config override {}", path))?;
        config
            .validate()
            .with_context(|| format!("validating config override {}", path))?;
        info!("Config loaded from {}", path);
        return Ok(config);
    }

    match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            Ok(cfg)
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            Ok(SystemConfig::default())
        }
    }
}

/// The fitted sensors.  Both builds use the simulated devices until the
/// board drivers land behind the same adapter traits.
fn build_sensor_hub(config: &SystemConfig) -> SensorHub {
    let mut mass = [0.0_f32; PM_BINS];
    let mut count = [0_u32; PM_BINS];
    for (i, (m, c)) in mass.iter_mut().zip(count.iter_mut()).enumerate() {
        *m = 2.5 * (i as f32 + 1.0);
        *c = 40 * (i as u32 + 1);
    }

    SensorHub::new()
        .with_sensor(SimThSensor::new(21.5, 48.0))
        .with_sensor(SimParticulate::new(mass, count))
        .with_sensor(GasSensor::new(SimAnalogFrontEnd::new(1.65), config.gas))
        .with_sensor(SimGps::new(Some(Position {
            latitude: 40.4427,
            longitude: -79.9430,
            unix_time: 1_700_000_000,
        })))
        .with_co2(SimCo2::new(415.0))
}

fn idle(ms: u32) {
    #[cfg(target_os = "espidf")]
    esp_idf_svc::hal::delay::FreeRtos::delay_ms(ms);
    #[cfg(not(target_os = "espidf"))]
    std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
}

fn main() -> Result<()> {
    // ── 1. Bootstrap ──────────────────────────────────────────
    init_logger()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Multigas node v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    hw_init::init_peripherals().context("peripheral init")?;

    // ── 2. Persistent state ───────────────────────────────────
    let mut nvs = NvsAdapter::new().context("NVS init")?;
    let config = load_config(&nvs)?;
    let boot_count = nvs.next_boot_count();
    match boot_count {
        Some(n) => info!("Boot #{}", n),
        None => warn!("Boot counter unavailable"),
    }

    // ── 3. Adapters ───────────────────────────────────────────
    let sensors = build_sensor_hub(&config);
    let board = BoardAdapter::new(
        MonotonicClock::new(),
        StatusLed::new(pins::STATUS_LED_GPIO),
        LoopbackUplink::new(true),
        boot_count,
    );
    let mut sink = LogEventSink::new();

    // ── 4. Measurement loop ───────────────────────────────────
    let mut app = MeasurementLoop::new(config, board, sensors);
    app.begin(&mut sink);
    app.handle_command(AppCommand::Activate, &mut sink);

    info!("System ready. Entering poll loop.");

    let mut stored_uplinks = 0;
    loop {
        app.poll(&mut sink);
        app.board_mut().service_led();

        app.auto_save_if_needed(&nvs);

        if app.uplinks() != stored_uplinks {
            stored_uplinks = app.uplinks();
            if let Err(e) = nvs.store_last_uplink(app.last_uplink()) {
                warn!("Last uplink not stored: {}", e);
            }
        }

        if app.state() == StateId::Final {
            app.force_save_if_dirty(&nvs);
            info!("Measurement loop finished after {} uplinks", app.uplinks());
            return Ok(());
        }

        idle(app.idle_hint());
    }
}
