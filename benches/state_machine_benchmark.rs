use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::rc::Rc;
use std::time::Duration;
use wifi_phy_cca::phy::{Band, CcaThreshold, NullTraceSink, PhyStateMachine, SignalSet, Signal};
use wifi_phy_cca::{ChannelBondingManager, ManualClock, PhyConfig, SimTime, WifiMode};

fn benchmark_state_query(c: &mut Criterion) {
    let clock = Rc::new(ManualClock::new());
    let mut phy = PhyStateMachine::new(clock.clone(), Rc::new(NullTraceSink));
    let primary = Band::new(5170, 5190);
    let threshold = CcaThreshold::from_dbm(-82.0);
    phy.track(primary, threshold);
    for index in 1..8 {
        let low = 5170 + index * 20;
        phy.track(Band::new(low, low + 20), CcaThreshold::from_dbm(-72.0));
    }
    phy.switch_maybe_to_cca_busy(Duration::from_micros(50), primary, true, threshold);
    clock.advance_to(SimTime::from_micros(20));

    c.bench_function("state_query", |b| {
        b.iter(|| black_box(phy.state(black_box(primary), black_box(threshold))))
    });
}

fn benchmark_tx_cycle(c: &mut Criterion) {
    let clock = Rc::new(ManualClock::new());
    let mut phy = PhyStateMachine::new(clock.clone(), Rc::new(NullTraceSink));
    let primary = Band::new(5170, 5190);
    let threshold = CcaThreshold::from_dbm(-82.0);
    phy.track(primary, threshold);
    phy.track(Band::new(5190, 5210), CcaThreshold::from_dbm(-72.0));

    c.bench_function("tx_cycle", |b| {
        b.iter(|| {
            let _ = phy.switch_to_tx(black_box(Duration::from_micros(100)), 20.0, primary, threshold);
            clock.advance_by(Duration::from_micros(150));
        })
    });
}

fn benchmark_bonding_decision(c: &mut Criterion) {
    let clock = Rc::new(ManualClock::new());
    let config = PhyConfig::from_json_str(
        r#"{
            "channel": { "center_frequency_mhz": 5250, "channel_width": 160 },
            "bonding": { "policy": "constant_threshold" }
        }"#,
    )
    .unwrap();
    let (mut phy, manager) = config.build(clock.clone(), Rc::new(NullTraceSink)).unwrap();
    phy.maybe_cca_busy(&SignalSet::new(vec![Signal {
        band: Band::new(5250, 5330),
        power_dbm: -60.0,
        remaining: Duration::from_micros(100),
    }]));
    clock.advance_to(SimTime::from_micros(80));
    let mode = WifiMode::new("HeMcs11");

    c.bench_function("bonding_decision_160mhz", |b| {
        b.iter(|| black_box(manager.usable_channel_width(&phy, black_box(&mode))))
    });
}

criterion_group!(benches, benchmark_state_query, benchmark_tx_cycle, benchmark_bonding_decision);
criterion_main!(benches);
