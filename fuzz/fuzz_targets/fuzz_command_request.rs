#![no_main]
use landau::command::CommandKind;
use landau::safety;
use landau::vehicle::VehicleState;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(kind) = serde_json::from_slice::<CommandKind>(data) else {
        return;
    };

    // Validation must never panic, whatever the payload
    for soc in [0.0, 9.99, 50.0, 100.0] {
        let mut state = VehicleState::new(soc);
        let _ = safety::validate_command(&state, &kind);
        state.set_speed(30.0);
        let _ = safety::check_execution_gates(&state, &kind);
    }
});
