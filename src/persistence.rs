//! Persistence layer for command history, charging data and vehicle state
//!
//! The engine only talks to the store traits. [`JsonFileStore`] keeps one JSON
//! file per concern under a data directory and replaces files atomically
//! (write to a temp file, then rename). [`MemoryStore`] keeps everything in
//! process.

use crate::command::RemoteCommand;
use crate::error::{LandauError, Result};
use crate::logging::get_logger;
use crate::schedule::ChargingSchedule;
use crate::session::ChargingSession;
use crate::vehicle::VehicleState;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const COMMAND_HISTORY_FILE: &str = "command_history.json";
pub const SESSIONS_FILE: &str = "charging_sessions.json";
pub const PREFERENCES_FILE: &str = "charging_preferences.json";
pub const SCHEDULES_FILE: &str = "charging_schedules.json";
pub const VEHICLE_STATE_FILE: &str = "vehicle_state.json";

/// Remote command history
pub trait CommandStore: Send + Sync {
    fn load_commands(&self) -> Result<Vec<RemoteCommand>>;
    fn save_commands(&self, commands: &[RemoteCommand]) -> Result<()>;
}

/// Charging sessions, preferences and schedules
pub trait ChargingStore: Send + Sync {
    fn load_sessions(&self) -> Result<Vec<ChargingSession>>;
    fn save_sessions(&self, sessions: &[ChargingSession]) -> Result<()>;
    fn load_charge_limit(&self) -> Result<Option<u8>>;
    fn save_charge_limit(&self, limit: u8) -> Result<()>;
    fn load_schedules(&self) -> Result<Vec<ChargingSchedule>>;
    fn save_schedules(&self, schedules: &[ChargingSchedule]) -> Result<()>;
}

/// Cached vehicle snapshot
pub trait VehicleStore: Send + Sync {
    fn load_vehicle(&self) -> Result<Option<VehicleState>>;
    fn save_vehicle(&self, state: &VehicleState) -> Result<()>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionsFile {
    sessions: Vec<ChargingSession>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SchedulesFile {
    schedules: Vec<ChargingSchedule>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferencesFile {
    default_charge_limit: Option<u8>,
}

/// JSON files under a data directory
pub struct JsonFileStore {
    data_dir: PathBuf,
    logger: crate::logging::StructuredLogger,
}

impl JsonFileStore {
    /// Create a store rooted at `data_dir`, creating the directory if needed
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir).map_err(|e| {
            LandauError::io(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;
        Ok(Self {
            data_dir,
            logger: get_logger("persistence"),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Read a JSON file. Missing files read as `None`; unreadable or corrupt
    /// files are logged and also read as `None`.
    fn read_json<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let path = self.path(file);
        if !path.exists() {
            return None;
        }
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                self.logger
                    .warn(&format!("Failed to read {}: {}", path.display(), e));
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(v) => Some(v),
            Err(e) => {
                self.logger
                    .warn(&format!("Ignoring corrupt {}: {}", path.display(), e));
                None
            }
        }
    }

    /// Replace a JSON file atomically
    fn write_json<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        let tmp = self.path(&format!("{}.tmp", file));
        let contents = serde_json::to_string_pretty(value)?;
        std::fs::write(&tmp, contents)?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(LandauError::io(format!(
                "Failed to replace {}: {}",
                path.display(),
                e
            )));
        }
        self.logger.debug(&format!("Saved {}", path.display()));
        Ok(())
    }
}

impl CommandStore for JsonFileStore {
    fn load_commands(&self) -> Result<Vec<RemoteCommand>> {
        // Entries are decoded one by one so a single bad record does not drop the history
        let raw: Vec<serde_json::Value> = self.read_json(COMMAND_HISTORY_FILE).unwrap_or_default();
        let total = raw.len();
        let commands: Vec<RemoteCommand> = raw
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect();
        if commands.len() < total {
            self.logger.warn(&format!(
                "Skipped {} invalid command history entries",
                total - commands.len()
            ));
        }
        Ok(commands)
    }

    fn save_commands(&self, commands: &[RemoteCommand]) -> Result<()> {
        self.write_json(COMMAND_HISTORY_FILE, commands)
    }
}

impl ChargingStore for JsonFileStore {
    fn load_sessions(&self) -> Result<Vec<ChargingSession>> {
        Ok(self
            .read_json::<SessionsFile>(SESSIONS_FILE)
            .unwrap_or_default()
            .sessions)
    }

    fn save_sessions(&self, sessions: &[ChargingSession]) -> Result<()> {
        self.write_json(
            SESSIONS_FILE,
            &SessionsFile {
                sessions: sessions.to_vec(),
            },
        )
    }

    fn load_charge_limit(&self) -> Result<Option<u8>> {
        Ok(self
            .read_json::<PreferencesFile>(PREFERENCES_FILE)
            .and_then(|p| p.default_charge_limit)
            .filter(|l| (1..=100).contains(l)))
    }

    fn save_charge_limit(&self, limit: u8) -> Result<()> {
        self.write_json(
            PREFERENCES_FILE,
            &PreferencesFile {
                default_charge_limit: Some(limit),
            },
        )
    }

    fn load_schedules(&self) -> Result<Vec<ChargingSchedule>> {
        let schedules = self
            .read_json::<SchedulesFile>(SCHEDULES_FILE)
            .unwrap_or_default()
            .schedules;
        Ok(schedules.into_iter().filter(|s| s.validate().is_ok()).collect())
    }

    fn save_schedules(&self, schedules: &[ChargingSchedule]) -> Result<()> {
        self.write_json(
            SCHEDULES_FILE,
            &SchedulesFile {
                schedules: schedules.to_vec(),
            },
        )
    }
}

impl VehicleStore for JsonFileStore {
    fn load_vehicle(&self) -> Result<Option<VehicleState>> {
        Ok(self.read_json(VEHICLE_STATE_FILE))
    }

    fn save_vehicle(&self, state: &VehicleState) -> Result<()> {
        self.write_json(VEHICLE_STATE_FILE, state)
    }
}

/// In-process store
#[derive(Default)]
pub struct MemoryStore {
    commands: Mutex<Vec<RemoteCommand>>,
    sessions: Mutex<Vec<ChargingSession>>,
    charge_limit: Mutex<Option<u8>>,
    schedules: Mutex<Vec<ChargingSchedule>>,
    vehicle: Mutex<Option<VehicleState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandStore for MemoryStore {
    fn load_commands(&self) -> Result<Vec<RemoteCommand>> {
        Ok(self.commands.lock().clone())
    }

    fn save_commands(&self, commands: &[RemoteCommand]) -> Result<()> {
        *self.commands.lock() = commands.to_vec();
        Ok(())
    }
}

impl ChargingStore for MemoryStore {
    fn load_sessions(&self) -> Result<Vec<ChargingSession>> {
        Ok(self.sessions.lock().clone())
    }

    fn save_sessions(&self, sessions: &[ChargingSession]) -> Result<()> {
        *self.sessions.lock() = sessions.to_vec();
        Ok(())
    }

    fn load_charge_limit(&self) -> Result<Option<u8>> {
        Ok(*self.charge_limit.lock())
    }

    fn save_charge_limit(&self, limit: u8) -> Result<()> {
        *self.charge_limit.lock() = Some(limit);
        Ok(())
    }

    fn load_schedules(&self) -> Result<Vec<ChargingSchedule>> {
        Ok(self.schedules.lock().clone())
    }

    fn save_schedules(&self, schedules: &[ChargingSchedule]) -> Result<()> {
        *self.schedules.lock() = schedules.to_vec();
        Ok(())
    }
}

impl VehicleStore for MemoryStore {
    fn load_vehicle(&self) -> Result<Option<VehicleState>> {
        Ok(self.vehicle.lock().clone())
    }

    fn save_vehicle(&self, state: &VehicleState) -> Result<()> {
        *self.vehicle.lock() = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(store.load_commands().unwrap().is_empty());
        assert!(store.load_sessions().unwrap().is_empty());
        assert_eq!(store.load_charge_limit().unwrap(), None);
        assert!(store.load_vehicle().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSIONS_FILE), "{not json").unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        assert!(store.load_sessions().unwrap().is_empty());
    }

    #[test]
    fn write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store
            .save_commands(&[RemoteCommand::new(CommandKind::HonkFlash)])
            .unwrap();
        assert!(dir.path().join(COMMAND_HISTORY_FILE).exists());
        assert!(!dir.path().join("command_history.json.tmp").exists());
        assert_eq!(store.load_commands().unwrap().len(), 1);
    }

    #[test]
    fn preferences_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.save_charge_limit(90).unwrap();
        let raw = std::fs::read_to_string(dir.path().join(PREFERENCES_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["default_charge_limit"], 90);
    }
}
