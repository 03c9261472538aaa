//! End-to-end tests of the measurement loop: activation, warmup, the
//! measure/transmit cycle, interval adaptation, and the uplink bytes that
//! reach the radio.

use multigas_node::app::commands::AppCommand;
use multigas_node::app::events::AppEvent;
use multigas_node::config::{OperatingFlags, SystemConfig};
use multigas_node::drivers::led_patterns::LedPattern;
use multigas_node::error::{SensorError, TransmitError};
use multigas_node::fsm::StateId;
use multigas_node::sensors::SensorHub;
use multigas_node::sensors::gas::GasSensor;
use multigas_node::sensors::sim::{
    SimAnalogFrontEnd, SimCo2, SimGps, SimParticulate, SimThSensor,
};
use multigas_node::telemetry::measurement::PM_BINS;
use multigas_node::telemetry::{GasChannel, Position};

use multigas_node::app::ports::ConfigPort;

use crate::mock_hw::{MockConfigStore, RecordingSink, started_loop, step};

fn th_only() -> SensorHub {
    SensorHub::new().with_sensor(SimThSensor::new(21.3, 47.8))
}

fn entered(sink: &RecordingSink, state: StateId) -> usize {
    sink.count(|e| matches!(e, AppEvent::StateChanged { to, .. } if *to == state))
}

// ── First uplink ──────────────────────────────────────────────

#[test]
fn first_uplink_carries_temperature_and_humidity() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    assert_eq!(app.state(), StateId::Inactive);

    app.handle_command(AppCommand::Activate, &mut sink);
    assert_eq!(app.state(), StateId::Warmup);
    assert!(app.is_active());

    // Warmup is five seconds; nothing goes out before it ends.
    step(&mut app, &mut sink, 4_999);
    assert_eq!(app.state(), StateId::Warmup);
    assert!(app.board().sent.is_empty());

    step(&mut app, &mut sink, 1);
    assert_eq!(app.state(), StateId::Transmit);
    assert_eq!(
        app.board().payloads(),
        vec![vec![0x27, 0x04, 0x15, 0x4D, 0x7A, 0x5E]]
    );
    assert!(sink.contains(&AppEvent::UplinkQueued {
        len: 6,
        flags: 0x0004,
        confirmed: false,
    }));

    app.poll(&mut sink);
    assert_eq!(app.state(), StateId::Sleeping);
    assert!(sink.contains(&AppEvent::UplinkDone(Ok(()))));
    assert_eq!(app.last_uplink(), &[0x27, 0x04, 0x15, 0x4D, 0x7A, 0x5E]);
    assert_eq!(app.uplinks(), 1);
    assert_eq!(app.board().led(), LedPattern::Sleeping);
}

#[test]
fn led_follows_the_cycle() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    let patterns = &app.board().patterns;
    let measuring = patterns.iter().position(|p| *p == LedPattern::Measuring);
    let sending = patterns.iter().position(|p| *p == LedPattern::Sending);
    let sleeping = patterns.iter().position(|p| *p == LedPattern::Sleeping);
    assert!(measuring < sending);
    assert!(sending < sleeping);
}

// ── Cycle timing ──────────────────────────────────────────────

#[test]
fn warmup_only_follows_activation() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    // Next tick is one period after the first measurement.
    step(&mut app, &mut sink, 24_000);
    assert_eq!(app.state(), StateId::Sleeping);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(app.state(), StateId::Transmit);

    let sent = &app.board().sent;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].at_ms, 5_000);
    assert_eq!(sent[1].at_ms, 30_000);
    assert_eq!(entered(&sink, StateId::Warmup), 1);
    assert_eq!(entered(&sink, StateId::Measure), 2);
}

#[test]
fn fast_cycles_count_down_to_the_permanent_period() {
    let config = SystemConfig {
        tx_cycle_count: 3,
        ..SystemConfig::default()
    };
    let (mut app, mut sink) = started_loop(config, th_only());
    app.handle_command(AppCommand::Activate, &mut sink);

    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);
    assert_eq!((app.tx_cycle_secs(), app.tx_cycle_count()), (30, 2));

    step(&mut app, &mut sink, 25_000);
    app.poll(&mut sink);
    assert_eq!((app.tx_cycle_secs(), app.tx_cycle_count()), (30, 1));

    step(&mut app, &mut sink, 30_000);
    app.poll(&mut sink);
    assert_eq!((app.tx_cycle_secs(), app.tx_cycle_count()), (360, 0));
    assert_eq!(app.board().sent.len(), 3);

    // Permanent period: the next uplink is six minutes after the third.
    step(&mut app, &mut sink, 359_000);
    assert_eq!(app.board().sent.len(), 3);
    step(&mut app, &mut sink, 1_000);
    assert_eq!(app.board().sent.len(), 4);
    assert_eq!(app.board().sent[3].at_ms, 420_000);

    // Count zero stays on the permanent period.
    app.poll(&mut sink);
    assert_eq!((app.tx_cycle_secs(), app.tx_cycle_count()), (360, 0));
}

#[test]
fn zero_tx_cycle_command_is_ignored() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(AppCommand::SetTxCycle { secs: 0, count: 4 }, &mut sink);
    assert_eq!((app.tx_cycle_secs(), app.tx_cycle_count()), (30, 10));
}

#[test]
fn late_poll_does_not_shift_later_deadlines() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    // Poll 7 s late for the second tick.
    step(&mut app, &mut sink, 32_000);
    app.poll(&mut sink);
    assert_eq!(app.board().sent[1].at_ms, 37_000);

    step(&mut app, &mut sink, 22_999);
    assert_eq!(app.board().sent.len(), 2);
    step(&mut app, &mut sink, 1);
    assert_eq!(app.board().sent.len(), 3);
    assert_eq!(app.board().sent[2].at_ms, 60_000);
}

// ── Uplink outcomes ───────────────────────────────────────────

#[test]
fn unprovisioned_network_parks_in_final() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.board_mut().provisioned = false;
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    assert_eq!(app.state(), StateId::Final);
    assert!(!app.is_active());
    assert_eq!(app.uplinks(), 0);

    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 60_000);
    assert_eq!(app.state(), StateId::Final);
}

#[test]
fn launch_failure_still_moves_to_sleeping() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.board_mut().launch = Err(TransmitError::Busy);
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);

    assert_eq!(app.state(), StateId::Sleeping);
    assert!(app.board().sent.is_empty());
    assert!(sink.contains(&AppEvent::UplinkDone(Err(TransmitError::Busy))));
    assert_eq!(app.tx_cycle_count(), 9);
    // The encoded message is still mirrored to the log buffer.
    assert_eq!(app.last_uplink()[0], 0x27);
}

#[test]
fn permanent_period_longer_than_half_the_clock_still_fires() {
    let config = SystemConfig {
        tx_cycle_count: 1,
        tx_cycle_permanent_secs: 2_500_000,
        ..SystemConfig::default()
    };
    let (mut app, mut sink) = started_loop(config, th_only());
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);
    assert_eq!(app.tx_cycle_secs(), 2_500_000);

    for _ in 0..742 {
        step(&mut app, &mut sink, 3_600_000);
    }
    assert_eq!(app.board().sent.len(), 2);
    assert_eq!(app.state(), StateId::Sleeping);
}

#[test]
fn pending_uplink_waits_for_completion() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.board_mut().outcome = None;
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);

    for _ in 0..5 {
        step(&mut app, &mut sink, 10_000);
        assert_eq!(app.state(), StateId::Transmit);
    }
    assert_eq!(app.board().sent.len(), 1);
}

#[test]
fn confirmed_flag_requests_acknowledged_uplink() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(
        AppCommand::SetOperatingFlags(OperatingFlags::CONFIRMED_UPLINK),
        &mut sink,
    );
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);

    assert!(app.board().sent[0].confirmed);
    assert!(sink.contains(&AppEvent::UplinkQueued {
        len: 6,
        flags: 0x0004,
        confirmed: true,
    }));
}

// ── Activation control ────────────────────────────────────────

#[test]
fn measurement_timer_is_ignored_while_inactive() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    for _ in 0..10 {
        step(&mut app, &mut sink, 30_000);
    }
    assert_eq!(app.state(), StateId::Inactive);
    assert!(app.board().sent.is_empty());
}

#[test]
fn deactivate_from_sleeping_stops_uplinks() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    app.handle_command(AppCommand::Deactivate, &mut sink);
    assert_eq!(app.state(), StateId::Inactive);
    assert!(!app.is_active());
    assert_eq!(app.board().led(), LedPattern::Off);

    step(&mut app, &mut sink, 120_000);
    assert_eq!(app.board().sent.len(), 1);

    // Reactivation goes through warmup again.
    app.handle_command(AppCommand::Activate, &mut sink);
    assert_eq!(app.state(), StateId::Warmup);
    step(&mut app, &mut sink, 5_000);
    assert_eq!(app.board().sent.len(), 2);
    assert_eq!(entered(&sink, StateId::Warmup), 2);
}

#[test]
fn stop_while_transmitting_is_final() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    app.board_mut().outcome = None;
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    assert_eq!(app.state(), StateId::Transmit);

    app.handle_command(AppCommand::Stop, &mut sink);
    assert_eq!(app.state(), StateId::Final);
    assert!(!app.is_active());
}

// ── Message content ───────────────────────────────────────────

#[test]
fn failed_co_channel_still_sends_whole_gas_block() {
    let afe = SimAnalogFrontEnd::new(1.70);
    afe.handle()
        .set_channel_error(GasChannel::Co, Some(SensorError::BusError));
    let sensors = SensorHub::new().with_sensor(GasSensor::new(afe, Default::default()));
    let (mut app, mut sink) = started_loop(SystemConfig::default(), sensors);

    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);

    let payload = &app.board().sent[0].payload;
    // NO2 is the only gas bit in the low byte; O3 and SO2 are above it.
    assert_eq!(payload[1], 0x80);
    assert_eq!(payload.len(), 2 + 8);
    assert_eq!(&payload[2..4], &[0, 0]);
    assert_ne!(&payload[4..6], &[0, 0]);
}

#[test]
fn absent_sensor_is_skipped_every_cycle() {
    let pm = SimParticulate::new([0.0; PM_BINS], [0; PM_BINS]);
    pm.handle().set_present(false);
    let sensors = SensorHub::new()
        .with_sensor(SimThSensor::new(21.3, 47.8))
        .with_sensor(SimGps::new(None))
        .with_sensor(pm);
    let (mut app, mut sink) = started_loop(SystemConfig::default(), sensors);
    assert!(sink.contains(&AppEvent::SensorAbsent("IPS-7100")));

    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    // GPS without a fix and the missing particle counter leave only T/RH.
    assert_eq!(app.board().sent[0].payload[1], 0x04);
}

#[test]
fn full_sensor_set_fills_the_message() {
    let mut mass = [0.0_f32; PM_BINS];
    let mut count = [0_u32; PM_BINS];
    for i in 0..PM_BINS {
        mass[i] = i as f32 + 1.0;
        count[i] = 10 * (i as u32 + 1);
    }
    let sensors = SensorHub::new()
        .with_sensor(SimThSensor::new(21.3, 47.8))
        .with_sensor(SimParticulate::new(mass, count))
        .with_sensor(GasSensor::new(SimAnalogFrontEnd::new(1.66), Default::default()))
        .with_sensor(SimGps::new(Some(Position {
            latitude: 40.4427,
            longitude: -79.943,
            unix_time: 1_700_000_000,
        })))
        .with_co2(SimCo2::new(415.0));
    let (mut app, mut sink) = started_loop(SystemConfig::default(), sensors);
    app.board_mut().vbat = Ok(3.9);
    app.board_mut().boot = Some(0x123);

    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);

    let payload = &app.board().sent[0].payload;
    assert_eq!(payload.len(), 59);
    assert_eq!(payload[0], 0x27);
    assert_eq!(payload[1], 0xFF);
    // Boot count travels as its low byte.
    assert_eq!(payload[4], 0x23);
    // Trailing GNSS time, big-endian.
    assert_eq!(&payload[55..59], &1_700_000_000_u32.to_be_bytes());
}

#[test]
fn snapshot_is_reset_between_cycles() {
    let th = SimThSensor::new(21.3, 47.8);
    let handle = th.handle();
    let sensors = SensorHub::new().with_sensor(th);
    let (mut app, mut sink) = started_loop(SystemConfig::default(), sensors);
    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    app.poll(&mut sink);

    handle.fail_always(Some(SensorError::DeviceError));
    step(&mut app, &mut sink, 25_000);
    assert_eq!(app.board().sent[1].payload, vec![0x27, 0x00]);
}

// ── Runtime configuration ─────────────────────────────────────

#[test]
fn config_update_reaches_gas_cells_and_cadence() {
    let gas = GasSensor::new(SimAnalogFrontEnd::new(1.70), Default::default());
    let (mut app, mut sink) = started_loop(
        SystemConfig::default(),
        SensorHub::new().with_sensor(gas),
    );
    let mut config = SystemConfig {
        tx_cycle_secs: 60,
        ..SystemConfig::default()
    };
    config.gas.no2_ppm_per_volt = 0.0;
    app.handle_command(AppCommand::UpdateConfig(config), &mut sink);

    app.handle_command(AppCommand::Activate, &mut sink);
    step(&mut app, &mut sink, 5_000);
    assert_eq!(app.tx_cycle_secs(), 60);
    // tag, flags, CO, NO2, O3, SO2
    assert_eq!(app.board().sent[0].payload[4..6], [0x00, 0x00]);

    app.poll(&mut sink);
    step(&mut app, &mut sink, 55_000);
    assert_eq!(app.board().sent[1].at_ms, 60_000);
}

#[test]
fn flag_change_is_saved_after_quiet_period() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    let store = MockConfigStore::default();

    app.handle_command(
        AppCommand::SetOperatingFlags(OperatingFlags::UNATTENDED),
        &mut sink,
    );
    assert!(!app.auto_save_if_needed(&store));

    step(&mut app, &mut sink, 5_000);
    assert!(app.auto_save_if_needed(&store));
    assert_eq!(*store.saves.borrow(), 1);
    let saved = store.load().unwrap();
    assert_eq!(saved.operating_flags, OperatingFlags::UNATTENDED);

    // Nothing new to save.
    step(&mut app, &mut sink, 5_000);
    assert!(!app.auto_save_if_needed(&store));
}

#[test]
fn rejected_config_is_never_saved() {
    let (mut app, mut sink) = started_loop(SystemConfig::default(), th_only());
    let store = MockConfigStore::default();
    let bad = SystemConfig {
        tx_cycle_permanent_secs: 10,
        ..SystemConfig::default()
    };
    app.handle_command(AppCommand::UpdateConfig(bad), &mut sink);
    app.force_save_if_dirty(&store);
    assert_eq!(*store.saves.borrow(), 0);
    assert_eq!(app.current_config(), SystemConfig::default());
}
