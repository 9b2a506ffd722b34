use crate::config::ChargingConfig;
use crate::error::{LandauError, Result};

/// Charging rate for the given state of charge.
///
/// Full power below 20 %, a slight reduction up to 80 %, then a steep taper.
pub fn calculate_rate(current_soc: f64, max_rate_kw: f64) -> f64 {
    if current_soc < 20.0 {
        max_rate_kw
    } else if current_soc < 80.0 {
        max_rate_kw * 0.95
    } else if current_soc < 90.0 {
        max_rate_kw * 0.6
    } else {
        max_rate_kw * 0.3
    }
}

/// Peak rate and voltage of a charging location
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargerProfile {
    pub max_rate_kw: f64,
    pub voltage: f64,
    pub is_fast: bool,
}

impl ChargerProfile {
    /// Supercharger locations are DC fast chargers, everything else is L2
    pub fn for_location(location: &str, settings: &ChargingConfig) -> Self {
        if location.contains("Supercharger") {
            Self {
                max_rate_kw: settings.max_charging_rate_kw,
                voltage: settings.fast_charger_voltage,
                is_fast: true,
            }
        } else {
            Self {
                max_rate_kw: settings.slow_charging_rate_kw,
                voltage: settings.slow_charger_voltage,
                is_fast: false,
            }
        }
    }
}

/// Result of simulating one tick of charging
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargeStep {
    pub new_soc: f64,
    pub rate_kw: f64,
    pub amperage: f64,
    pub energy_kwh: f64,
}

/// Advance the battery by `seconds` of charging, never past `target_soc`
pub fn charge_step(
    soc: f64,
    target_soc: f64,
    max_rate_kw: f64,
    voltage: f64,
    capacity_kwh: f64,
    seconds: f64,
) -> Result<ChargeStep> {
    if voltage <= 0.0 || !voltage.is_finite() {
        return Err(LandauError::generic(format!(
            "Invalid charger voltage: {}",
            voltage
        )));
    }
    if capacity_kwh <= 0.0 || !capacity_kwh.is_finite() {
        return Err(LandauError::generic(format!(
            "Invalid battery capacity: {}",
            capacity_kwh
        )));
    }

    let rate_kw = calculate_rate(soc, max_rate_kw);
    let amperage = rate_kw * 1000.0 / voltage;
    let energy_kwh = rate_kw * seconds / 3600.0;
    let delta = energy_kwh / capacity_kwh * 100.0;
    let new_soc = (soc + delta).min(target_soc);

    if ![rate_kw, amperage, energy_kwh, new_soc]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(LandauError::generic(format!(
            "Non-finite charging step at {:.2}% (rate {} kW)",
            soc, rate_kw
        )));
    }

    Ok(ChargeStep {
        new_soc,
        rate_kw,
        amperage,
        energy_kwh,
    })
}
