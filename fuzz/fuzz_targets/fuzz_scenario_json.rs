#![no_main]

use libfuzzer_sys::fuzz_target;
use wifi_phy_cca::Scenario;

fuzz_target!(|data: &[u8]| {
    // Malformed input must be rejected with an error, never a panic
    if let Ok(json) = std::str::from_utf8(data) {
        if let Ok(scenario) = Scenario::from_json_str(json) {
            let _ = scenario.run();
        }
    }
});
