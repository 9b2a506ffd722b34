use crate::command::CommandKind;
use crate::safety::{self, CommandRejection};
use crate::vehicle::{LockStatus, VehicleState};

/// Apply a successful command to the vehicle.
///
/// Safety gates are checked again first; on a violation nothing is changed.
/// CLIMATE_ON additionally drains the battery for the time the command took.
pub(super) fn apply(
    state: &mut VehicleState,
    kind: &CommandKind,
    delay_ms: u64,
) -> Result<(), CommandRejection> {
    safety::check_execution_gates(state, kind)?;

    match kind {
        CommandKind::Lock => state.set_lock_status(LockStatus::Locked),
        CommandKind::Unlock => state.set_lock_status(LockStatus::Unlocked),
        CommandKind::ClimateOn { target_temp } => {
            if let Some(temp) = target_temp {
                state.climate_settings.set_temperature(*temp)?;
            }
            state.climate_on = true;
            state.climate_settings.is_active = true;

            let per_10min = state
                .climate_settings
                .estimate_battery_drain_per_10min(state.cabin_temp_celsius);
            state.apply_battery_drain(climate_drain(per_10min, delay_ms));
        }
        CommandKind::ClimateOff => {
            state.climate_on = false;
            state.climate_settings.is_active = false;
        }
        CommandKind::SetTemp { target_temp } => {
            state.climate_settings.set_temperature(*target_temp)?;
        }
        CommandKind::SeatHeat { seat, level } => {
            state.climate_settings.set_seat_heat(*seat, *level);
        }
        CommandKind::SteeringHeat { enabled } => {
            state.climate_settings.steering_wheel_heat = *enabled;
        }
        CommandKind::Defrost { position, enabled } => {
            state.climate_settings.set_defrost(*position, *enabled);
        }
        CommandKind::TrunkOpen => state.trunk_status.rear_trunk_open = true,
        CommandKind::FrunkOpen => state.trunk_status.front_trunk_open = true,
        CommandKind::HonkFlash => {}
    }
    Ok(())
}

/// Share of the 10-minute drain estimate consumed during `delay_ms`
pub(super) fn climate_drain(per_10min: f64, delay_ms: u64) -> f64 {
    per_10min * (delay_ms as f64 / 1000.0) / 600.0
}
