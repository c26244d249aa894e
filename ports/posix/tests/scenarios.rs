//! End-to-end scenarios on the simulated platform, with real time shrunk to
//! a few milliseconds per sleep.

use std::sync::Arc;
use std::time::Duration;

use pmcycle::{PmError, PowerCounter, ScenarioConfig, SleepState, Timeout, WorkerSpec};
use pmcycle_port_posix::{spawn_presser, PosixBench, SimulatedButton, SimulatedPlatformConfig};

fn platform() -> SimulatedPlatformConfig {
    SimulatedPlatformConfig {
        light_residency: Duration::from_millis(10),
        deep_residency: Duration::from_millis(40),
        entry_latency: Duration::ZERO,
    }
}

fn scenario() -> ScenarioConfig {
    ScenarioConfig::builder()
        .margins(Duration::from_millis(10), Duration::from_millis(20))
        .workers(vec![
            WorkerSpec::new("A", Duration::from_millis(2)),
            WorkerSpec::new("B", Duration::from_millis(7)),
        ])
        .idle_entry_delay(Duration::ZERO)
        .idle_timeout(Timeout::After(Duration::from_secs(5)))
        .build()
}

#[test]
fn singlethread_balances_both_states() {
    let bench = PosixBench::new(platform(), scenario());

    let report = bench
        .test()
        .run_singlethread(false, 3)
        .expect("single-thread run");

    assert!(report.is_consistent(), "{report:?}");
    for state in SleepState::ALL {
        assert_eq!(report.counter(state), Some(PowerCounter::new(3, 3)));
        assert!(bench.test().context().counter(state).is_zero());
    }
}

#[test]
fn multithread_balances_both_states() {
    let bench = PosixBench::new(platform(), scenario());

    let report = bench.test().run_multithread(true, 3).expect("multi-thread run");

    assert!(report.is_consistent(), "{report:?}");
    assert_eq!(report.latency.too_high, 0);
}

#[test]
fn async_bouts_follow_presses() {
    let bench = PosixBench::new(platform(), scenario());
    let presser = spawn_presser(
        bench.button().clone(),
        Arc::clone(bench.test().idle()),
        2,
        Duration::from_millis(50),
    )
    .expect("presser thread");

    let report = bench
        .test()
        .run_multithread_async(true, 2)
        .expect("async run");
    presser.join().expect("presser finished");

    assert!(report.is_consistent(), "{report:?}");
    assert_eq!(
        report.counter(SleepState::DeepSleep),
        Some(PowerCounter::new(2, 2))
    );
    assert!(!bench.test().idle().is_idle());
}

#[test]
fn unbound_button_times_out() {
    let config = ScenarioConfig {
        idle_timeout: Timeout::After(Duration::from_millis(30)),
        ..scenario()
    };
    let bench = PosixBench::with_button(platform(), config, SimulatedButton::unbound("sw0"));
    bench.button().press();

    let result = bench.test().run_multithread_async(true, 1);

    assert!(matches!(
        result,
        Err(PmError::Incomplete {
            completed: 0,
            requested: 1
        })
    ));
}

#[test]
fn slow_entry_is_counted_in_report() {
    let config = SimulatedPlatformConfig {
        entry_latency: Duration::from_millis(25),
        ..platform()
    };
    let scenario = ScenarioConfig {
        latency_threshold: Duration::from_millis(10),
        ..scenario()
    };
    let bench = PosixBench::new(config, scenario);

    let report = bench
        .test()
        .run_singlethread(true, 2)
        .expect("single-thread run");

    assert_eq!(report.latency.elevated, 2);
    assert!(report.latency.last_ms.unwrap_or(0) >= 25);
}
