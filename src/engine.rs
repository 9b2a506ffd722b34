//! Companion engine
//!
//! Ties the vehicle state, command dispatcher, charging simulator and
//! schedule book together behind the operations exposed over HTTP.

use crate::charging::{ChargingSimulator, ChargingStation, ConnectorType};
use crate::command::{CommandKind, RemoteCommand};
use crate::config::Config;
use crate::dispatcher::{CommandDispatcher, CommandHandle};
use crate::error::Result;
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{ChargingStore, CommandStore, JsonFileStore, MemoryStore, VehicleStore};
use crate::schedule::{ChargingSchedule, ScheduleBook};
use crate::session::ChargingSession;
use crate::vehicle::{VehicleHandle, VehicleState};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use uuid::Uuid;

/// Persistence backends used by the engine
#[derive(Clone)]
pub struct EngineStores {
    pub commands: Arc<dyn CommandStore>,
    pub charging: Arc<dyn ChargingStore>,
    pub vehicle: Arc<dyn VehicleStore>,
}

impl EngineStores {
    /// JSON files under `data_dir`
    pub fn json_files(data_dir: &str) -> Result<Self> {
        let store = Arc::new(JsonFileStore::new(data_dir)?);
        Ok(Self {
            commands: store.clone(),
            charging: store.clone(),
            vehicle: store,
        })
    }

    /// Everything in memory
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            commands: store.clone(),
            charging: store.clone(),
            vehicle: store,
        }
    }
}

pub struct CompanionEngine {
    vehicle: VehicleHandle,
    dispatcher: CommandDispatcher,
    charging: ChargingSimulator,
    schedules: ScheduleBook,
    vehicle_store: Arc<dyn VehicleStore>,
    timezone: Tz,
    logger: StructuredLogger,
}

impl CompanionEngine {
    /// Build the engine. The vehicle starts from the cached snapshot when
    /// one exists, otherwise from the configured scenario.
    pub fn new(config: &Config, stores: EngineStores) -> Result<Self> {
        let logger = get_logger("engine");
        let cached = if config.vehicle.ignore_cache {
            None
        } else {
            stores.vehicle.load_vehicle()?
        };
        let state = match cached {
            Some(state) => {
                logger.info("Restored cached vehicle state");
                state
            }
            None => {
                logger.info(&format!(
                    "Starting from vehicle scenario '{}'",
                    config.vehicle.scenario
                ));
                VehicleState::scenario(&config.vehicle.scenario)?
            }
        };
        Self::with_vehicle(config, stores, state)
    }

    /// Build the engine around an explicit initial vehicle state
    pub fn with_vehicle(config: &Config, stores: EngineStores, state: VehicleState) -> Result<Self> {
        let vehicle = VehicleHandle::new(state);
        let dispatcher =
            CommandDispatcher::new(vehicle.clone(), config.commands.clone(), stores.commands)?;
        let charging = ChargingSimulator::new(
            vehicle.clone(),
            config.charging.clone(),
            stores.charging.clone(),
        )?;
        let schedules = ScheduleBook::new(stores.charging)?;

        Ok(Self {
            vehicle,
            dispatcher,
            charging,
            schedules,
            vehicle_store: stores.vehicle,
            timezone: config.tz(),
            logger: get_logger("engine"),
        })
    }

    pub fn vehicle(&self) -> &VehicleHandle {
        &self.vehicle
    }

    pub fn vehicle_snapshot(&self) -> VehicleState {
        self.vehicle.snapshot()
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    // Remote commands

    pub fn submit_command(&self, kind: CommandKind) -> Result<CommandHandle> {
        self.dispatcher.send(kind)
    }

    pub fn command_status(&self, id: Uuid) -> Result<RemoteCommand> {
        self.dispatcher.get_status(id)
    }

    pub fn cancel_command(&self, id: Uuid) -> bool {
        self.dispatcher.cancel(id)
    }

    pub fn timeout_command(&self, id: Uuid, timeout_ms: u64) -> Result<RemoteCommand> {
        self.dispatcher.timeout(id, timeout_ms)
    }

    pub fn command_history(&self) -> Vec<RemoteCommand> {
        self.dispatcher.history()
    }

    // Charging

    pub fn start_charging(&self, target_soc: f64) -> Result<ChargingSession> {
        self.charging.start_charging(target_soc)
    }

    pub async fn stop_charging(&self) -> Result<ChargingSession> {
        self.charging.stop_charging().await
    }

    pub fn current_session(&self) -> Option<ChargingSession> {
        self.charging.current_session()
    }

    pub fn charging_history(&self, limit: usize) -> Vec<ChargingSession> {
        self.charging.history(limit)
    }

    pub fn charging_stats(&self) -> serde_json::Value {
        self.charging.session_stats()
    }

    pub fn charge_limit(&self) -> u8 {
        self.charging.charge_limit()
    }

    pub fn set_charge_limit(&self, limit: u8) -> Result<u8> {
        self.charging.set_charge_limit(limit)
    }

    pub fn nearby_stations(
        &self,
        max_distance_km: f64,
        connectors: &[ConnectorType],
        min_power_kw: Option<u32>,
    ) -> Vec<ChargingStation> {
        self.charging
            .nearby_stations(max_distance_km, connectors, min_power_kw)
    }

    // Schedules

    pub fn list_schedules(&self) -> Vec<ChargingSchedule> {
        self.schedules.list()
    }

    pub fn schedule(&self, id: &str) -> Option<ChargingSchedule> {
        self.schedules.get(id)
    }

    pub fn create_schedule(&self, schedule: ChargingSchedule) -> Result<ChargingSchedule> {
        self.schedules.create(schedule)
    }

    pub fn update_schedule(&self, schedule: ChargingSchedule) -> Result<ChargingSchedule> {
        self.schedules.update(schedule)
    }

    pub fn delete_schedule(&self, id: &str) -> Result<bool> {
        self.schedules.delete(id)
    }

    /// Start charging for the first due schedule that can run now
    pub fn run_due_schedules(&self, now: DateTime<Utc>) -> Option<ChargingSession> {
        for schedule in self.schedules.due(now, self.timezone) {
            if self.charging.is_charging() {
                return None;
            }
            match self.charging.start_charging(f64::from(schedule.target_soc)) {
                Ok(session) => {
                    self.logger.info(&format!(
                        "Schedule '{}' started session {}",
                        schedule.name, session.id
                    ));
                    return Some(session);
                }
                Err(e) => self
                    .logger
                    .info(&format!("Schedule '{}' skipped: {}", schedule.name, e)),
            }
        }
        None
    }

    // Vehicle simulation controls

    pub fn set_speed(&self, speed: f64) -> Result<()> {
        self.vehicle.update(|v| {
            v.set_speed(speed);
            Ok(())
        })
    }

    /// Plug or unplug the charge cable. Unplugging stops an active session.
    pub async fn set_plugged_in(&self, plugged_in: bool) -> Result<()> {
        self.vehicle.update(|v| {
            v.climate_settings.is_plugged_in = plugged_in;
            Ok(())
        })?;
        if !plugged_in && self.charging.is_charging() {
            self.charging.stop_charging().await?;
        }
        Ok(())
    }

    /// Write the current vehicle snapshot to the vehicle store
    pub fn cache_vehicle_state(&self) -> Result<()> {
        self.vehicle_store.save_vehicle(&self.vehicle.snapshot())
    }
}
