//! Charging simulation
//!
//! One background task per session advances the shared battery state every
//! tick following a tapering charging curve. The session manager lock is
//! always taken before the vehicle lock and the task slot.

pub mod curve;
mod runtime;
pub mod stations;

pub use curve::{ChargeStep, ChargerProfile, calculate_rate, charge_step};
pub use stations::{ChargingStation, ConnectorType};

use crate::config::ChargingConfig;
use crate::error::{LandauError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::ChargingStore;
use crate::session::{ChargingSession, ChargingSessionManager, SessionStatus};
use crate::vehicle::VehicleHandle;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Locations a session may be attributed to
pub const CHARGING_LOCATIONS: [&str; 5] = [
    "Home Charger",
    "Supercharger Downtown",
    "Office Parking",
    "Supercharger Highway 101",
    "Shopping Mall Charger",
];

/// Handle to the running charging loop
struct ChargingTask {
    session_id: String,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

struct SimulatorInner {
    vehicle: VehicleHandle,
    settings: ChargingConfig,
    store: Arc<dyn ChargingStore>,
    sessions: Mutex<ChargingSessionManager>,
    charge_limit: Mutex<u8>,
    task: Mutex<Option<ChargingTask>>,
    rng: Mutex<StdRng>,
    logger: StructuredLogger,
}

impl SimulatorInner {
    /// End the active session and persist the archive. Must be called with
    /// the session manager locked.
    fn finalize(
        &self,
        sessions: &mut ChargingSessionManager,
        status: SessionStatus,
    ) -> Option<ChargingSession> {
        let ended = sessions.end_session(status).ok()?;
        self.persist_sessions(sessions);
        Some(ended)
    }

    fn persist_sessions(&self, sessions: &ChargingSessionManager) {
        if let Err(e) = self.store.save_sessions(&sessions.archived()) {
            self.logger
                .error(&format!("Failed to persist charging sessions: {}", e));
        }
    }
}

/// Simulated charger attached to the shared vehicle
#[derive(Clone)]
pub struct ChargingSimulator {
    inner: Arc<SimulatorInner>,
}

impl ChargingSimulator {
    /// Create a simulator, restoring session history and the charge limit
    /// from the store
    pub fn new(
        vehicle: VehicleHandle,
        settings: ChargingConfig,
        store: Arc<dyn ChargingStore>,
    ) -> Result<Self> {
        let logger = get_logger("charging");

        let mut sessions = ChargingSessionManager::new(settings.history_limit);
        sessions.restore_history(store.load_sessions()?);

        let charge_limit = store
            .load_charge_limit()?
            .unwrap_or(settings.default_charge_limit);

        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        logger.info(&format!(
            "Charging simulator ready: {:.0} kWh pack, charge limit {}%",
            settings.battery_capacity_kwh, charge_limit
        ));

        Ok(Self {
            inner: Arc::new(SimulatorInner {
                vehicle,
                settings,
                store,
                sessions: Mutex::new(sessions),
                charge_limit: Mutex::new(charge_limit),
                task: Mutex::new(None),
                rng: Mutex::new(rng),
                logger,
            }),
        })
    }

    fn pick_location(&self) -> String {
        if let Some(ref location) = self.inner.settings.location {
            return location.clone();
        }
        let idx = self.inner.rng.lock().gen_range(0..CHARGING_LOCATIONS.len());
        CHARGING_LOCATIONS[idx].to_string()
    }

    /// Start charging toward `target_soc` and spawn the charging loop.
    /// Must be called from within a Tokio runtime.
    pub fn start_charging(&self, target_soc: f64) -> Result<ChargingSession> {
        let location = self.pick_location();
        let profile = ChargerProfile::for_location(&location, &self.inner.settings);

        let session = {
            let mut sessions = self.inner.sessions.lock();
            if sessions.current_session.is_some() {
                return Err(LandauError::invalid_charging(
                    "Charging session already active",
                ));
            }

            let (soc, plugged_in) = self
                .inner
                .vehicle
                .read(|v| (v.battery_soc(), v.is_plugged_in()));
            if !plugged_in {
                return Err(LandauError::invalid_charging(
                    "Vehicle must be plugged in to start charging",
                ));
            }
            if !(1.0..=100.0).contains(&target_soc) {
                return Err(LandauError::invalid_charging(
                    "target_soc must be between 1 and 100",
                ));
            }
            if target_soc <= soc {
                return Err(LandauError::invalid_charging(format!(
                    "target_soc must be greater than current SoC ({:.0}%)",
                    soc
                )));
            }

            let rate = calculate_rate(soc, profile.max_rate_kw);
            let session = ChargingSession::new(soc, target_soc, &location, rate, profile.voltage);
            sessions.start_session(session.clone())?;

            // Registered before the session lock is released so a concurrent
            // stop always finds the task to join
            let (stop_tx, stop_rx) = watch::channel(false);
            let join = tokio::spawn(runtime::run_charging_loop(
                self.inner.clone(),
                session.id.clone(),
                stop_rx,
            ));
            *self.inner.task.lock() = Some(ChargingTask {
                session_id: session.id.clone(),
                stop_tx,
                join,
            });
            session
        };

        Ok(session)
    }

    /// Stop the active session. If the loop completed the session on its own
    /// in the meantime, the archived session is returned instead.
    pub async fn stop_charging(&self) -> Result<ChargingSession> {
        let active_id = self
            .inner
            .sessions
            .lock()
            .current_session
            .as_ref()
            .map(|s| s.id.clone())
            .ok_or(LandauError::NoActiveSession)?;

        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            let _ = task.stop_tx.send(true);
            let mut join = task.join;
            let wait = Duration::from_millis(self.inner.settings.stop_join_timeout_ms);
            if tokio::time::timeout(wait, &mut join).await.is_err() {
                self.inner.logger.warn(&format!(
                    "Charging loop for session {} did not stop within {:?}, aborting",
                    task.session_id, wait
                ));
                join.abort();
            }
        }

        let mut sessions = self.inner.sessions.lock();
        if sessions
            .current_session
            .as_ref()
            .is_some_and(|s| s.id == active_id)
        {
            return self
                .inner
                .finalize(&mut sessions, SessionStatus::Interrupted)
                .ok_or(LandauError::NoActiveSession);
        }
        sessions
            .find_archived(&active_id)
            .cloned()
            .ok_or(LandauError::NoActiveSession)
    }

    pub fn charge_limit(&self) -> u8 {
        *self.inner.charge_limit.lock()
    }

    /// Persist a new charge limit and retarget the active session
    pub fn set_charge_limit(&self, limit: u8) -> Result<u8> {
        if !(1..=100).contains(&limit) {
            return Err(LandauError::invalid_charging(
                "Charge limit must be between 1 and 100",
            ));
        }
        self.inner.store.save_charge_limit(limit)?;
        *self.inner.charge_limit.lock() = limit;

        let mut sessions = self.inner.sessions.lock();
        if let Some(session) = sessions.current_session.as_mut() {
            session.target_soc = f64::from(limit);
            self.inner
                .logger
                .info(&format!("Retargeted session {} to {}%", session.id, limit));
        }
        Ok(limit)
    }

    pub fn current_session(&self) -> Option<ChargingSession> {
        self.inner.sessions.lock().current_session.clone()
    }

    pub fn is_charging(&self) -> bool {
        self.inner.sessions.lock().current_session.is_some()
    }

    /// Finished sessions, most recent first
    pub fn history(&self, limit: usize) -> Vec<ChargingSession> {
        self.inner.sessions.lock().recent(limit)
    }

    pub fn session_stats(&self) -> serde_json::Value {
        self.inner.sessions.lock().get_session_stats()
    }

    /// Nearby stations from the mock catalogue
    pub fn nearby_stations(
        &self,
        max_distance_km: f64,
        connectors: &[ConnectorType],
        min_power_kw: Option<u32>,
    ) -> Vec<ChargingStation> {
        let mut rng = self.inner.rng.lock();
        stations::nearby_stations(&mut *rng, max_distance_km, connectors, min_power_kw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::vehicle::VehicleState;

    fn plugged(soc: f64) -> VehicleHandle {
        let mut state = VehicleState::new(soc);
        state.climate_settings.is_plugged_in = true;
        VehicleHandle::new(state)
    }

    fn simulator(vehicle: VehicleHandle) -> ChargingSimulator {
        let settings = ChargingConfig {
            location: Some("Home Charger".to_string()),
            seed: Some(1),
            ..Default::default()
        };
        ChargingSimulator::new(vehicle, settings, Arc::new(MemoryStore::new())).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn start_preconditions() {
        let unplugged = VehicleHandle::new(VehicleState::new(40.0));
        let sim = simulator(unplugged);
        assert!(matches!(
            sim.start_charging(80.0),
            Err(LandauError::InvalidCharging { .. })
        ));

        let sim = simulator(plugged(60.0));
        assert!(sim.start_charging(60.0).is_err());
        assert!(sim.start_charging(101.0).is_err());
        assert!(sim.start_charging(f64::NAN).is_err());
        let session = sim.start_charging(80.0).unwrap();
        assert_eq!(session.location, "Home Charger");
        assert_eq!(session.voltage, 240.0);
        assert!(matches!(
            sim.start_charging(90.0),
            Err(LandauError::InvalidCharging { .. })
        ));
        sim.stop_charging().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn target_already_reached_leaves_vehicle_untouched() {
        let vehicle = plugged(50.0);
        let sim = simulator(vehicle.clone());
        sim.start_charging(90.0).unwrap();
        // Retarget below the current SoC before the first tick runs
        sim.set_charge_limit(40).unwrap();
        let before = vehicle.snapshot();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sim.is_charging());
        let after = vehicle.snapshot();
        assert_eq!(after.battery_soc(), 50.0);
        assert_eq!(after.last_updated, before.last_updated);
        assert_eq!(sim.history(1)[0].status, SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_session() {
        let sim = simulator(plugged(50.0));
        assert!(matches!(
            sim.stop_charging().await,
            Err(LandauError::NoActiveSession)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn charge_limit_bounds_and_retarget() {
        let sim = simulator(plugged(50.0));
        assert_eq!(sim.charge_limit(), 80);
        assert!(sim.set_charge_limit(0).is_err());
        assert!(sim.set_charge_limit(101).is_err());

        sim.start_charging(80.0).unwrap();
        sim.set_charge_limit(90).unwrap();
        assert_eq!(sim.current_session().unwrap().target_soc, 90.0);
        assert_eq!(sim.charge_limit(), 90);
        sim.stop_charging().await.unwrap();
    }
}
