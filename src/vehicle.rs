//! Simulated vehicle state
//!
//! The vehicle is a single aggregate shared by the command dispatcher and the
//! charging simulator. It lives behind [`VehicleHandle`], one mutex covering
//! every field, so each read-modify-write from either path is applied as a
//! whole and no update is lost.

mod climate;

pub use climate::{
    ClimateSettings, DefrostPosition, MAX_TEMP_CELSIUS, MIN_TEMP_CELSIUS, Seat, SeatHeatLevel,
};

use crate::error::{LandauError, Result};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Vehicle lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockStatus {
    Locked,
    Unlocked,
}

/// Open/closed state of the storage compartments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrunkStatus {
    /// Front trunk (frunk)
    pub front_trunk_open: bool,
    pub rear_trunk_open: bool,
}

impl TrunkStatus {
    pub fn any_open(&self) -> bool {
        self.front_trunk_open || self.rear_trunk_open
    }

    pub fn all_closed(&self) -> bool {
        !self.any_open()
    }
}

/// Current state of the vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Battery state of charge, always within 0-100 %
    #[serde(deserialize_with = "deserialize_soc")]
    battery_soc: f64,

    pub estimated_range_km: f64,

    pub lock_status: LockStatus,

    /// When the lock status last changed
    pub lock_timestamp: Option<DateTime<Utc>>,

    pub cabin_temp_celsius: f64,

    pub climate_on: bool,

    #[serde(default)]
    pub climate_settings: ClimateSettings,

    #[serde(default)]
    pub trunk_status: TrunkStatus,

    /// Vehicle speed, only used to gate unsafe commands
    #[serde(default)]
    speed: f64,

    pub last_updated: DateTime<Utc>,
}

fn deserialize_soc<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(clamp_soc(raw, 0.0))
}

fn clamp_soc(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 100.0)
    }
}

impl VehicleState {
    /// Create a parked, locked vehicle with the given charge
    pub fn new(battery_soc: f64) -> Self {
        let now = Utc::now();
        Self {
            battery_soc: clamp_soc(battery_soc, 0.0),
            estimated_range_km: 0.0,
            lock_status: LockStatus::Locked,
            lock_timestamp: Some(now),
            cabin_temp_celsius: 21.0,
            climate_on: false,
            climate_settings: ClimateSettings::default(),
            trunk_status: TrunkStatus::default(),
            speed: 0.0,
            last_updated: now,
        }
        .with_estimated_range()
    }

    /// Build one of the named demo scenarios
    pub fn scenario(name: &str) -> Result<Self> {
        let now = Utc::now();
        let mut state = match name {
            "normal" => {
                let mut s = Self::new(82.0);
                s.cabin_temp_celsius = 22.0;
                s.lock_timestamp = Some(now - Duration::hours(2));
                s.climate_settings.is_plugged_in = true;
                s
            }
            "low_battery" => {
                let mut s = Self::new(18.0);
                s.lock_timestamp = Some(now - Duration::hours(1));
                s.climate_settings.is_plugged_in = true;
                s
            }
            "critical_battery" => {
                let mut s = Self::new(3.0);
                s.cabin_temp_celsius = 20.0;
                s.lock_timestamp = Some(now - Duration::hours(3));
                s
            }
            "unlocked" => {
                let mut s = Self::new(65.0);
                s.cabin_temp_celsius = 23.0;
                s.lock_status = LockStatus::Unlocked;
                s.lock_timestamp = Some(now - Duration::minutes(2));
                s
            }
            "unlocked_too_long" => {
                let mut s = Self::new(70.0);
                s.cabin_temp_celsius = 24.0;
                s.lock_status = LockStatus::Unlocked;
                s.lock_timestamp = Some(now - Duration::minutes(15));
                s
            }
            "climate_active" => {
                let mut s = Self::new(55.0);
                s.cabin_temp_celsius = 18.0;
                s.climate_on = true;
                s.climate_settings.is_active = true;
                s.lock_timestamp = Some(now - Duration::hours(4));
                s
            }
            "stale_data" => {
                let mut s = Self::new(75.0);
                s.last_updated = now - Duration::seconds(90);
                s.lock_timestamp = Some(now - Duration::hours(1));
                s
            }
            other => {
                return Err(LandauError::config(format!(
                    "Unknown vehicle scenario: {}",
                    other
                )));
            }
        };
        state.estimated_range_km = (state.battery_soc * 4.25).round();
        Ok(state)
    }

    fn with_estimated_range(mut self) -> Self {
        self.estimated_range_km = (self.battery_soc * 4.25).round();
        self
    }

    pub fn battery_soc(&self) -> f64 {
        self.battery_soc
    }

    /// Write the state of charge, clamped to 0-100. NaN writes are ignored.
    pub fn set_battery_soc(&mut self, soc: f64) {
        self.battery_soc = clamp_soc(soc, self.battery_soc);
    }

    /// Subtract a drain (percentage points) from the battery
    pub fn apply_battery_drain(&mut self, drain_pct: f64) {
        if drain_pct > 0.0 {
            self.set_battery_soc(self.battery_soc - drain_pct);
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Set the current speed; negative and NaN values read as stationary
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = if speed.is_nan() { 0.0 } else { speed.max(0.0) };
    }

    pub fn is_plugged_in(&self) -> bool {
        self.climate_settings.is_plugged_in
    }

    pub fn is_moving(&self) -> bool {
        self.speed > 0.0
    }

    /// Change the lock status; the lock timestamp always moves forward
    pub fn set_lock_status(&mut self, status: LockStatus) {
        let now = Utc::now();
        let stamp = match self.lock_timestamp {
            Some(prev) if now <= prev => prev + Duration::microseconds(1),
            _ => now,
        };
        self.lock_status = status;
        self.lock_timestamp = Some(stamp);
    }

    /// Refresh the last-updated timestamp after a mutation
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }

    pub fn is_low_battery(&self) -> bool {
        self.battery_soc < 20.0
    }

    pub fn is_critical_battery(&self) -> bool {
        self.battery_soc < 5.0
    }

    pub fn is_stale(&self, threshold_seconds: i64) -> bool {
        (Utc::now() - self.last_updated).num_seconds() > threshold_seconds
    }

    pub fn is_unlocked_too_long(&self, threshold_minutes: i64) -> bool {
        match (self.lock_status, self.lock_timestamp) {
            (LockStatus::Unlocked, Some(ts)) => (Utc::now() - ts).num_minutes() > threshold_minutes,
            _ => false,
        }
    }
}

/// Shared handle to the vehicle state
///
/// The lock is a plain (non-async) mutex and must never be held across an
/// `.await`; every access goes through a closure.
#[derive(Debug, Clone)]
pub struct VehicleHandle {
    state: Arc<Mutex<VehicleState>>,
}

impl VehicleHandle {
    pub fn new(state: VehicleState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> VehicleState {
        self.state.lock().clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&VehicleState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Apply a mutation atomically. `last_updated` is refreshed only when the
    /// closure succeeds.
    pub fn update<R>(&self, f: impl FnOnce(&mut VehicleState) -> Result<R>) -> Result<R> {
        let mut guard = self.state.lock();
        let out = f(&mut guard)?;
        guard.touch();
        Ok(out)
    }

    /// Like [`update`](Self::update), but the closure reports whether it
    /// wrote anything. `last_updated` is refreshed only for `Some`.
    pub fn update_if_changed<R>(
        &self,
        f: impl FnOnce(&mut VehicleState) -> Result<Option<R>>,
    ) -> Result<Option<R>> {
        let mut guard = self.state.lock();
        let out = f(&mut guard)?;
        if out.is_some() {
            guard.touch();
        }
        Ok(out)
    }

    pub fn battery_soc(&self) -> f64 {
        self.state.lock().battery_soc()
    }
}
