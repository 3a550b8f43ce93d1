#![no_main]

use libfuzzer_sys::fuzz_target;
use std::rc::Rc;
use std::time::Duration;
use wifi_phy_cca::phy::{Band, CcaThreshold, PhyStateMachine, RecordingTraceSink};
use wifi_phy_cca::ManualClock;

fuzz_target!(|data: &[u8]| {
    let clock = Rc::new(ManualClock::new());
    let trace = Rc::new(RecordingTraceSink::new());
    let mut phy = PhyStateMachine::new(clock.clone(), trace.clone());
    let primary = Band::new(5170, 5190);
    let secondary = Band::new(5190, 5210);
    let primary_thr = CcaThreshold::from_dbm(-82.0);
    let secondary_thr = CcaThreshold::from_dbm(-72.0);
    phy.track(primary, primary_thr);
    phy.track(secondary, secondary_thr);

    // Two bytes per event: opcode and a duration in microseconds.
    for chunk in data.chunks_exact(2) {
        let us = Duration::from_micros(u64::from(chunk[1]));
        // Rejected requests must leave the state untouched, so errors are ignored.
        let _ = match chunk[0] % 10 {
            0 => {
                clock.advance_by(us);
                Ok(())
            }
            1 => {
                phy.switch_maybe_to_cca_busy(us, primary, true, primary_thr);
                Ok(())
            }
            2 => {
                phy.switch_maybe_to_cca_busy(us, secondary, false, secondary_thr);
                Ok(())
            }
            3 => phy.switch_to_tx(us, 20.0, primary, primary_thr),
            4 => phy.switch_to_rx(us, primary, primary_thr),
            5 => phy.switch_to_channel_switching(us, primary, primary_thr),
            6 => phy.switch_to_sleep(primary, primary_thr),
            7 => phy.switch_from_sleep(us, primary, true, primary_thr),
            8 => phy.switch_to_off(primary, primary_thr),
            _ => phy.switch_from_rx_abort(chunk[1] & 1 == 1),
        };

        let state = phy.state(primary, primary_thr);
        assert_eq!(state, phy.state(primary, primary_thr));
        assert!(!(phy.is_state_sleep(primary, primary_thr) && phy.is_state_off(primary, primary_thr)));
        if let Ok(delay) = phy.delay_until_idle(primary, primary_thr) {
            assert!(delay <= Duration::from_micros(512));
        }
    }

    assert!(trace.find_tiling_violation().is_none(), "{:?}", trace.intervals());
});
