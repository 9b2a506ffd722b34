//! Charging schedules
//!
//! A schedule names the days it applies to and either a fixed start time or a
//! ready-by time, never both. Schedules are validated before they are stored.

use crate::error::{LandauError, Result};
use crate::logging::get_logger;
use crate::persistence::ChargingStore;
use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

fn default_true() -> bool {
    true
}

/// Scheduled charging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSchedule {
    #[serde(default = "new_schedule_id")]
    pub id: String,

    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Days this schedule applies (0=Mon, 6=Sun)
    pub days_of_week: Vec<u8>,

    /// Time to start charging (HH:MM)
    #[serde(default)]
    pub start_time: Option<String>,

    /// Time the vehicle should be ready (HH:MM)
    #[serde(default)]
    pub ready_by_time: Option<String>,

    pub target_soc: u8,
}

fn new_schedule_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn parse_hhmm(value: &str) -> Result<NaiveTime> {
    let invalid = || {
        LandauError::validation("time", "Time must be in HH:MM format (00:00 to 23:59)")
    };
    let (h, m) = value.split_once(':').ok_or_else(invalid)?;
    let hour: u32 = h.trim().parse().map_err(|_| invalid())?;
    let minute: u32 = m.trim().parse().map_err(|_| invalid())?;
    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(invalid)
}

impl ChargingSchedule {
    /// Check every field constraint
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(LandauError::validation("name", "name cannot be empty"));
        }
        if self.days_of_week.is_empty() {
            return Err(LandauError::validation(
                "days_of_week",
                "days_of_week cannot be empty",
            ));
        }
        if self.days_of_week.iter().any(|d| *d > 6) {
            return Err(LandauError::validation(
                "days_of_week",
                "days_of_week must contain values 0-6",
            ));
        }
        if !(1..=100).contains(&self.target_soc) {
            return Err(LandauError::validation(
                "target_soc",
                "target_soc must be between 1 and 100",
            ));
        }
        match (&self.start_time, &self.ready_by_time) {
            (Some(_), Some(_)) => Err(LandauError::validation(
                "start_time",
                "Cannot set both start_time and ready_by_time",
            )),
            (None, None) => Err(LandauError::validation(
                "start_time",
                "Must set either start_time or ready_by_time",
            )),
            (Some(t), None) | (None, Some(t)) => parse_hhmm(t).map(|_| ()),
        }
    }

    /// Whether the schedule covers the given weekday (0=Mon)
    pub fn applies_on(&self, weekday: u8) -> bool {
        self.days_of_week.contains(&weekday)
    }

    /// The configured start or ready-by time
    pub fn trigger_time(&self) -> Option<NaiveTime> {
        self.start_time
            .as_deref()
            .or(self.ready_by_time.as_deref())
            .and_then(|t| parse_hhmm(t).ok())
    }

    /// True during the minute the schedule fires in the given timezone
    pub fn is_due(&self, now: DateTime<Utc>, tz: Tz) -> bool {
        if !self.enabled {
            return false;
        }
        let local = now.with_timezone(&tz);
        let weekday = local.weekday().num_days_from_monday() as u8;
        if !self.applies_on(weekday) {
            return false;
        }
        self.trigger_time()
            .is_some_and(|t| t.hour() == local.hour() && t.minute() == local.minute())
    }
}

/// Stored charging schedules
pub struct ScheduleBook {
    schedules: Mutex<Vec<ChargingSchedule>>,
    store: Arc<dyn ChargingStore>,
    logger: crate::logging::StructuredLogger,
}

impl ScheduleBook {
    /// Load schedules from the store
    pub fn new(store: Arc<dyn ChargingStore>) -> Result<Self> {
        let schedules = store.load_schedules()?;
        Ok(Self {
            schedules: Mutex::new(schedules),
            store,
            logger: get_logger("schedule"),
        })
    }

    pub fn list(&self) -> Vec<ChargingSchedule> {
        self.schedules.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<ChargingSchedule> {
        self.schedules.lock().iter().find(|s| s.id == id).cloned()
    }

    pub fn create(&self, schedule: ChargingSchedule) -> Result<ChargingSchedule> {
        schedule.validate()?;
        let mut schedules = self.schedules.lock();
        if schedules.iter().any(|s| s.id == schedule.id) {
            return Err(LandauError::conflict(format!(
                "Schedule already exists: {}",
                schedule.id
            )));
        }
        let mut next = schedules.clone();
        next.push(schedule.clone());
        self.commit(&mut schedules, next)?;
        self.logger
            .info(&format!("Created schedule '{}' ({})", schedule.name, schedule.id));
        Ok(schedule)
    }

    pub fn update(&self, schedule: ChargingSchedule) -> Result<ChargingSchedule> {
        schedule.validate()?;
        let mut schedules = self.schedules.lock();
        let idx = schedules
            .iter()
            .position(|s| s.id == schedule.id)
            .ok_or_else(|| LandauError::not_found(format!("Schedule not found: {}", schedule.id)))?;
        let mut next = schedules.clone();
        next[idx] = schedule.clone();
        self.commit(&mut schedules, next)?;
        Ok(schedule)
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut schedules = self.schedules.lock();
        let next: Vec<_> = schedules.iter().filter(|s| s.id != id).cloned().collect();
        if next.len() == schedules.len() {
            return Ok(false);
        }
        self.commit(&mut schedules, next)?;
        self.logger.info(&format!("Deleted schedule {}", id));
        Ok(true)
    }

    /// Persist `next` and only then make it the live list
    fn commit(
        &self,
        schedules: &mut Vec<ChargingSchedule>,
        next: Vec<ChargingSchedule>,
    ) -> Result<()> {
        self.store.save_schedules(&next)?;
        *schedules = next;
        Ok(())
    }

    /// Enabled schedules firing at `now`
    pub fn due(&self, now: DateTime<Utc>, tz: Tz) -> Vec<ChargingSchedule> {
        self.schedules
            .lock()
            .iter()
            .filter(|s| s.is_due(now, tz))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::session::ChargingSession;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Memory store whose schedule writes can be made to fail
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_schedules: AtomicBool,
    }

    impl ChargingStore for FlakyStore {
        fn load_sessions(&self) -> Result<Vec<ChargingSession>> {
            self.inner.load_sessions()
        }
        fn save_sessions(&self, sessions: &[ChargingSession]) -> Result<()> {
            self.inner.save_sessions(sessions)
        }
        fn load_charge_limit(&self) -> Result<Option<u8>> {
            self.inner.load_charge_limit()
        }
        fn save_charge_limit(&self, limit: u8) -> Result<()> {
            self.inner.save_charge_limit(limit)
        }
        fn load_schedules(&self) -> Result<Vec<ChargingSchedule>> {
            self.inner.load_schedules()
        }
        fn save_schedules(&self, schedules: &[ChargingSchedule]) -> Result<()> {
            if self.fail_schedules.load(Ordering::SeqCst) {
                return Err(LandauError::io("disk full"));
            }
            self.inner.save_schedules(schedules)
        }
    }

    fn nightly() -> ChargingSchedule {
        ChargingSchedule {
            id: new_schedule_id(),
            name: "Weeknights".to_string(),
            enabled: true,
            days_of_week: vec![0, 1, 2, 3, 4],
            start_time: Some("23:30".to_string()),
            ready_by_time: None,
            target_soc: 80,
        }
    }

    #[test]
    fn valid_schedule_passes() {
        assert!(nightly().validate().is_ok());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut s = nightly();
        s.name = "  ".to_string();
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.days_of_week = vec![];
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.days_of_week = vec![7];
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.target_soc = 0;
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.ready_by_time = Some("07:00".to_string());
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.start_time = None;
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.start_time = Some("24:00".to_string());
        assert!(s.validate().is_err());

        let mut s = nightly();
        s.start_time = Some("7am".to_string());
        assert!(s.validate().is_err());
    }

    #[test]
    fn due_in_local_time() {
        let s = nightly();
        // Monday 2024-01-08 22:30 UTC is 23:30 in Amsterdam
        let now = Utc.with_ymd_and_hms(2024, 1, 8, 22, 30, 10).unwrap();
        assert!(s.is_due(now, chrono_tz::Europe::Amsterdam));
        assert!(!s.is_due(now, chrono_tz::UTC));

        // Saturday is not covered
        let saturday = Utc.with_ymd_and_hms(2024, 1, 13, 22, 30, 0).unwrap();
        assert!(!s.is_due(saturday, chrono_tz::Europe::Amsterdam));

        let mut disabled = nightly();
        disabled.enabled = false;
        assert!(!disabled.is_due(now, chrono_tz::Europe::Amsterdam));
    }

    #[test]
    fn failed_save_leaves_book_unchanged() {
        let store = Arc::new(FlakyStore::default());
        let book = ScheduleBook::new(store.clone()).unwrap();
        let kept = book.create(nightly()).unwrap();

        store.fail_schedules.store(true, Ordering::SeqCst);
        assert!(book.create(nightly()).is_err());
        assert_eq!(book.list(), vec![kept.clone()]);

        let mut changed = kept.clone();
        changed.target_soc = 95;
        assert!(book.update(changed).is_err());
        assert_eq!(book.get(&kept.id).unwrap().target_soc, 80);

        assert!(book.delete(&kept.id).is_err());
        assert_eq!(book.list().len(), 1);

        // A later successful write does not carry the failed changes
        store.fail_schedules.store(false, Ordering::SeqCst);
        let other = book.create(nightly()).unwrap();
        let stored = store.load_schedules().unwrap();
        assert_eq!(stored, vec![kept, other]);
    }
}
