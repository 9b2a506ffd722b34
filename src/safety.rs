//! Safety and precondition checks for remote commands
//!
//! Stateless predicates over a [`VehicleState`]. Every rejection is a distinct
//! [`CommandRejection`] so callers can match on the reason rather than on text.

use crate::command::CommandKind;
use crate::vehicle::{
    DefrostPosition, LockStatus, MAX_TEMP_CELSIUS, MIN_TEMP_CELSIUS, Seat, SeatHeatLevel,
    VehicleState,
};
use thiserror::Error;

/// Minimum state of charge required to run climate control (%)
pub const MIN_CLIMATE_SOC: f64 = 10.0;

/// Why a command was refused before it was queued
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandRejection {
    #[error("Battery too low (<10%) for climate control")]
    BatteryTooLow,

    #[error("Climate control is already on")]
    ClimateAlreadyOn,

    #[error("Climate control is already off")]
    ClimateAlreadyOff,

    #[error("Cannot open trunk/frunk while vehicle is moving")]
    VehicleMoving,

    #[error("Vehicle is already locked")]
    AlreadyLocked,

    #[error("Vehicle is already unlocked")]
    AlreadyUnlocked,

    #[error("Temperature {0}°C out of range (15-28°C)")]
    TemperatureOutOfRange(f64),

    #[error("Invalid seat: {0}")]
    InvalidSeat(String),

    #[error("Invalid heat level: {0}")]
    InvalidHeatLevel(String),

    #[error("Invalid defrost position: {0}")]
    InvalidDefrostPosition(String),
}

/// Climate control needs at least 10 % charge
pub fn check_battery_for_climate(state: &VehicleState) -> Result<(), CommandRejection> {
    if state.battery_soc() < MIN_CLIMATE_SOC {
        return Err(CommandRejection::BatteryTooLow);
    }
    Ok(())
}

/// Trunks may only open while parked
pub fn check_stationary(state: &VehicleState) -> Result<(), CommandRejection> {
    if state.is_moving() {
        return Err(CommandRejection::VehicleMoving);
    }
    Ok(())
}

pub fn check_temperature(temp_celsius: f64) -> Result<(), CommandRejection> {
    if !(MIN_TEMP_CELSIUS..=MAX_TEMP_CELSIUS).contains(&temp_celsius) {
        return Err(CommandRejection::TemperatureOutOfRange(temp_celsius));
    }
    Ok(())
}

/// Full pre-queue validation of a command against the current state
pub fn validate_command(state: &VehicleState, kind: &CommandKind) -> Result<(), CommandRejection> {
    match kind {
        CommandKind::Lock => {
            if state.lock_status == LockStatus::Locked {
                return Err(CommandRejection::AlreadyLocked);
            }
        }
        CommandKind::Unlock => {
            if state.lock_status == LockStatus::Unlocked {
                return Err(CommandRejection::AlreadyUnlocked);
            }
        }
        CommandKind::ClimateOn { .. } => {
            check_battery_for_climate(state)?;
            if state.climate_on {
                return Err(CommandRejection::ClimateAlreadyOn);
            }
        }
        CommandKind::ClimateOff => {
            if !state.climate_on {
                return Err(CommandRejection::ClimateAlreadyOff);
            }
        }
        CommandKind::SetTemp { .. } => check_battery_for_climate(state)?,
        CommandKind::TrunkOpen | CommandKind::FrunkOpen => check_stationary(state)?,
        CommandKind::SeatHeat { .. }
        | CommandKind::SteeringHeat { .. }
        | CommandKind::Defrost { .. }
        | CommandKind::HonkFlash => {}
    }
    check_parameters(kind)
}

/// Safety gates that must still hold when the command is finally applied.
/// Idempotency checks (already locked, ...) are not repeated here.
pub fn check_execution_gates(
    state: &VehicleState,
    kind: &CommandKind,
) -> Result<(), CommandRejection> {
    match kind {
        CommandKind::ClimateOn { .. } | CommandKind::SetTemp { .. } => {
            check_battery_for_climate(state)?
        }
        CommandKind::TrunkOpen | CommandKind::FrunkOpen => check_stationary(state)?,
        _ => {}
    }
    check_parameters(kind)
}

fn check_parameters(kind: &CommandKind) -> Result<(), CommandRejection> {
    match kind {
        CommandKind::ClimateOn {
            target_temp: Some(temp),
        }
        | CommandKind::SetTemp { target_temp: temp } => check_temperature(*temp),
        _ => Ok(()),
    }
}

pub fn parse_seat(value: &str) -> Result<Seat, CommandRejection> {
    value.parse()
}

pub fn parse_heat_level(value: &str) -> Result<SeatHeatLevel, CommandRejection> {
    value.parse()
}

pub fn parse_defrost_position(value: &str) -> Result<DefrostPosition, CommandRejection> {
    value.parse()
}
