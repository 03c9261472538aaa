//! Sleep episodes driven through the full loop: mode choice, the
//! pre-sleep countdown, peripheral handling, and sensor recovery.

use multigas_node::app::commands::AppCommand;
use multigas_node::app::events::AppEvent;
use multigas_node::app::ports::PowerPort;
use multigas_node::config::{OperatingFlags, SystemConfig};
use multigas_node::drivers::led_patterns::LedPattern;
use multigas_node::fsm::StateId;
use multigas_node::power::SleepMode;
use multigas_node::sensors::sim::{SimCo2, SimParticulate, SimThSensor};
use multigas_node::sensors::{CO2_NAME, SensorHub};
use multigas_node::telemetry::measurement::PM_BINS;

use crate::mock_hw::{MockBoard, RecordingSink, started_loop, step};
use multigas_node::app::service::MeasurementLoop;

/// Six-minute cadence from the start, so a sleep episode has room.
fn permanent(flags: OperatingFlags) -> SystemConfig {
    SystemConfig {
        tx_cycle_secs: 360,
        tx_cycle_count: 0,
        tx_cycle_permanent_secs: 360,
        operating_flags: flags,
        ..SystemConfig::default()
    }
}

fn th_only() -> SensorHub {
    SensorHub::new().with_sensor(SimThSensor::new(21.3, 47.8))
}

/// Activate and run until the first uplink has completed.
fn to_first_sleep(app: &mut MeasurementLoop<MockBoard>, sink: &mut RecordingSink) {
    app.handle_command(AppCommand::Activate, sink);
    step(app, sink, 5_000);
    assert_eq!(app.state(), StateId::Transmit);
    app.poll(sink);
}

fn sleep_plans(sink: &RecordingSink) -> usize {
    sink.count(|e| matches!(e, AppEvent::SleepPlanned { .. }))
}

#[test]
fn unattended_node_sleeps_deep_for_the_rest_of_the_interval() {
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::UNATTENDED), th_only());
    to_first_sleep(&mut app, &mut sink);

    assert!(sink.contains(&AppEvent::SleepPlanned {
        mode: SleepMode::Deep,
        secs: 355,
    }));
    // 30 s countdown plus the settle pause, then whole seconds to the tick.
    assert_eq!(app.board().deep_sleeps, vec![324]);
    assert!(sink.contains(&AppEvent::Woke { slept_secs: 324 }));
    assert_eq!(app.board().now_millis(), 359_100);
    assert_eq!(app.board().suspend_calls, 1);
    assert_eq!(app.board().resume_calls, 1);
    assert_eq!(app.state(), StateId::Sleeping);

    // Less than the sleep threshold left: just wait.
    app.poll(&mut sink);
    assert_eq!(app.board().deep_sleeps.len(), 1);
    step(&mut app, &mut sink, 900);
    assert_eq!(app.state(), StateId::Transmit);
    assert_eq!(app.board().sent[1].at_ms, 360_000);
}

#[test]
fn led_shows_alert_then_goes_dark_for_deep_sleep() {
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::UNATTENDED), th_only());
    to_first_sleep(&mut app, &mut sink);

    let patterns = &app.board().patterns;
    let alert = patterns.iter().rposition(|p| *p == LedPattern::TwoShort);
    let dark = patterns.iter().rposition(|p| *p == LedPattern::Off);
    assert!(alert.is_some());
    assert!(alert < dark);
    assert_eq!(app.board().led(), LedPattern::Sleeping);
}

#[test]
fn debug_link_keeps_the_node_in_light_sleep() {
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::UNATTENDED), th_only());
    app.board_mut().debug_link = true;
    to_first_sleep(&mut app, &mut sink);

    assert!(sink.contains(&AppEvent::SleepPlanned {
        mode: SleepMode::Light,
        secs: 355,
    }));
    assert!(app.board().deep_sleeps.is_empty());
    assert_eq!(app.board().now_millis(), 5_000);

    // The sleep notice is printed once per interval.
    for _ in 0..5 {
        step(&mut app, &mut sink, 1_000);
    }
    assert_eq!(sleep_plans(&sink), 1);
    assert_eq!(app.state(), StateId::Sleeping);
}

#[test]
fn disable_flag_keeps_the_node_in_light_sleep() {
    let flags = OperatingFlags::UNATTENDED | OperatingFlags::DISABLE_DEEP_SLEEP;
    let (mut app, mut sink) = started_loop(permanent(flags), th_only());
    to_first_sleep(&mut app, &mut sink);
    assert!(app.board().deep_sleeps.is_empty());
    assert!(sink.contains(&AppEvent::SleepPlanned {
        mode: SleepMode::Light,
        secs: 355,
    }));
}

#[test]
fn attended_default_never_sleeps_deep() {
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::empty()), th_only());
    to_first_sleep(&mut app, &mut sink);
    for _ in 0..400 {
        step(&mut app, &mut sink, 1_000);
    }
    assert!(app.board().deep_sleeps.is_empty());
    assert_eq!(app.board().sent.len(), 2);
}

#[test]
fn test_flag_forces_deep_sleep_with_short_alert() {
    let (mut app, mut sink) =
        started_loop(permanent(OperatingFlags::DEEP_SLEEP_TEST), th_only());
    app.board_mut().debug_link = true;
    to_first_sleep(&mut app, &mut sink);

    // 10 s countdown plus the settle pause.
    assert_eq!(app.board().deep_sleeps, vec![344]);
}

#[test]
fn countdown_that_eats_the_interval_skips_the_sleep() {
    let config = SystemConfig {
        operating_flags: OperatingFlags::UNATTENDED,
        ..SystemConfig::default()
    };
    let (mut app, mut sink) = started_loop(config, th_only());
    to_first_sleep(&mut app, &mut sink);

    // 25 s left, 30 s of countdown: the tick is due when it ends.
    assert!(sink.contains(&AppEvent::SleepPlanned {
        mode: SleepMode::Deep,
        secs: 25,
    }));
    assert!(app.board().deep_sleeps.is_empty());
    assert_eq!(app.state(), StateId::Transmit);
    assert_eq!(app.board().sent[1].at_ms, 35_100);
}

#[test]
fn sensors_are_cycled_across_deep_sleep() {
    let pm = SimParticulate::new([1.0; PM_BINS], [10; PM_BINS]);
    let pm_handle = pm.handle();
    let co2 = SimCo2::new(415.0);
    let co2_handle = co2.handle();
    let sensors = SensorHub::new()
        .with_sensor(SimThSensor::new(21.3, 47.8))
        .with_sensor(pm)
        .with_co2(co2);
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::UNATTENDED), sensors);
    to_first_sleep(&mut app, &mut sink);

    assert_eq!(pm_handle.shutdown_calls(), 1);
    assert_eq!(pm_handle.init_calls(), 2);
    assert_eq!(co2_handle.shutdown_calls(), 1);
    assert_eq!(co2_handle.init_calls(), 2);
    assert!(!co2_handle.is_ended());
    assert!(app.sensors().is_present(CO2_NAME));
    assert!(app.sensors().is_present("IPS-7100"));
}

#[test]
fn sensor_that_does_not_come_back_is_dropped() {
    let co2 = SimCo2::new(415.0);
    let co2_handle = co2.handle();
    let sensors = th_only().with_co2(co2);
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::UNATTENDED), sensors);

    co2_handle.set_begin_ok(false);
    to_first_sleep(&mut app, &mut sink);
    assert!(sink.contains(&AppEvent::SensorAbsent(CO2_NAME)));
    assert!(!app.sensors().is_present(CO2_NAME));

    // The next uplink carries T/RH only.
    step(&mut app, &mut sink, 900);
    let payload = &app.board().sent[1].payload;
    assert_eq!(payload[1], 0x04);
}

#[test]
fn deactivate_is_honoured_while_sleeping() {
    let (mut app, mut sink) = started_loop(permanent(OperatingFlags::empty()), th_only());
    to_first_sleep(&mut app, &mut sink);
    app.handle_command(AppCommand::Deactivate, &mut sink);
    assert_eq!(app.state(), StateId::Inactive);
    for _ in 0..10 {
        step(&mut app, &mut sink, 60_000);
    }
    assert_eq!(app.board().sent.len(), 1);
}
