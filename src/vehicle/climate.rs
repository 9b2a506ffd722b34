use crate::safety::CommandRejection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest settable cabin temperature (°C)
pub const MIN_TEMP_CELSIUS: f64 = 15.0;
/// Highest settable cabin temperature (°C)
pub const MAX_TEMP_CELSIUS: f64 = 28.0;

/// Seat heater intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatHeatLevel {
    #[default]
    Off,
    Low,
    Medium,
    High,
}

/// Heated seat positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    FrontLeft,
    FrontRight,
    Rear,
}

/// Defrost zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefrostPosition {
    Front,
    Rear,
}

impl SeatHeatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatHeatLevel::Off => "off",
            SeatHeatLevel::Low => "low",
            SeatHeatLevel::Medium => "medium",
            SeatHeatLevel::High => "high",
        }
    }
}

impl Seat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seat::FrontLeft => "front_left",
            Seat::FrontRight => "front_right",
            Seat::Rear => "rear",
        }
    }
}

impl DefrostPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefrostPosition::Front => "front",
            DefrostPosition::Rear => "rear",
        }
    }
}

impl FromStr for SeatHeatLevel {
    type Err = CommandRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(SeatHeatLevel::Off),
            "low" => Ok(SeatHeatLevel::Low),
            "medium" => Ok(SeatHeatLevel::Medium),
            "high" => Ok(SeatHeatLevel::High),
            _ => Err(CommandRejection::InvalidHeatLevel(s.to_string())),
        }
    }
}

impl FromStr for Seat {
    type Err = CommandRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front_left" => Ok(Seat::FrontLeft),
            "front_right" => Ok(Seat::FrontRight),
            "rear" => Ok(Seat::Rear),
            _ => Err(CommandRejection::InvalidSeat(s.to_string())),
        }
    }
}

impl FromStr for DefrostPosition {
    type Err = CommandRejection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" => Ok(DefrostPosition::Front),
            "rear" => Ok(DefrostPosition::Rear),
            _ => Err(CommandRejection::InvalidDefrostPosition(s.to_string())),
        }
    }
}

impl fmt::Display for SeatHeatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DefrostPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Complete climate control state of the vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimateSettings {
    /// Whether climate control is currently running
    pub is_active: bool,

    /// Target cabin temperature, kept within 15-28 °C
    target_temp_celsius: f64,

    pub front_left_seat_heat: SeatHeatLevel,
    pub front_right_seat_heat: SeatHeatLevel,
    pub rear_seat_heat: SeatHeatLevel,
    pub steering_wheel_heat: bool,
    pub front_defrost: bool,
    pub rear_defrost: bool,

    /// Whether the vehicle is connected to a charger
    pub is_plugged_in: bool,
}

impl Default for ClimateSettings {
    fn default() -> Self {
        Self {
            is_active: false,
            target_temp_celsius: 21.0,
            front_left_seat_heat: SeatHeatLevel::Off,
            front_right_seat_heat: SeatHeatLevel::Off,
            rear_seat_heat: SeatHeatLevel::Off,
            steering_wheel_heat: false,
            front_defrost: false,
            rear_defrost: false,
            is_plugged_in: false,
        }
    }
}

impl ClimateSettings {
    pub fn target_temp(&self) -> f64 {
        self.target_temp_celsius
    }

    /// Set the target temperature, rejecting values outside 15-28 °C
    pub fn set_temperature(&mut self, temp_celsius: f64) -> Result<(), CommandRejection> {
        if !(MIN_TEMP_CELSIUS..=MAX_TEMP_CELSIUS).contains(&temp_celsius) {
            return Err(CommandRejection::TemperatureOutOfRange(temp_celsius));
        }
        self.target_temp_celsius = temp_celsius;
        Ok(())
    }

    pub fn seat_heat(&self, seat: Seat) -> SeatHeatLevel {
        match seat {
            Seat::FrontLeft => self.front_left_seat_heat,
            Seat::FrontRight => self.front_right_seat_heat,
            Seat::Rear => self.rear_seat_heat,
        }
    }

    pub fn set_seat_heat(&mut self, seat: Seat, level: SeatHeatLevel) {
        match seat {
            Seat::FrontLeft => self.front_left_seat_heat = level,
            Seat::FrontRight => self.front_right_seat_heat = level,
            Seat::Rear => self.rear_seat_heat = level,
        }
    }

    pub fn defrost(&self, position: DefrostPosition) -> bool {
        match position {
            DefrostPosition::Front => self.front_defrost,
            DefrostPosition::Rear => self.rear_defrost,
        }
    }

    pub fn set_defrost(&mut self, position: DefrostPosition, enabled: bool) {
        match position {
            DefrostPosition::Front => self.front_defrost = enabled,
            DefrostPosition::Rear => self.rear_defrost = enabled,
        }
    }

    /// Estimated battery drain (percent of capacity) per 10 minutes of
    /// climate operation. Zero while climate control is inactive.
    pub fn estimate_battery_drain_per_10min(&self, current_temp_celsius: f64) -> f64 {
        if !self.is_active {
            return 0.0;
        }

        // HVAC base load, capped at 2 % for extreme differentials
        let temp_diff = (self.target_temp_celsius - current_temp_celsius).abs();
        let base_drain = (temp_diff * 0.15).min(2.0);

        let mut accessory_drain = 0.0;
        if self.front_left_seat_heat != SeatHeatLevel::Off {
            accessory_drain += 0.2;
        }
        if self.front_right_seat_heat != SeatHeatLevel::Off {
            accessory_drain += 0.2;
        }
        if self.rear_seat_heat != SeatHeatLevel::Off {
            accessory_drain += 0.3;
        }
        if self.steering_wheel_heat {
            accessory_drain += 0.15;
        }
        if self.front_defrost {
            accessory_drain += 0.3;
        }
        if self.rear_defrost {
            accessory_drain += 0.3;
        }

        ((base_drain + accessory_drain) * 100.0).round() / 100.0
    }
}
