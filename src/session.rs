//! Charging session management for Landau
//!
//! This module tracks the active charging session and a bounded history of
//! finished ones, including energy added, cost and how each session ended.

use crate::error::{LandauError, Result};
use crate::logging::get_logger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Charging session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargingSession {
    /// Unique session ID
    pub id: String,

    /// Start time of the session
    pub start_time: DateTime<Utc>,

    /// End time of the session (if finished)
    pub end_time: Option<DateTime<Utc>>,

    /// State of charge when charging started (%)
    pub start_soc: f64,

    /// Highest state of charge written by this session (%)
    pub current_soc: f64,

    /// State of charge at which the session completes (%)
    pub target_soc: f64,

    /// Current charging power (kW)
    pub charging_rate_kw: f64,

    /// Charger voltage (V)
    pub voltage: f64,

    /// Charging current (A)
    pub amperage: f64,

    /// Total energy delivered in this session
    pub energy_added_kwh: f64,

    /// Session cost
    pub cost: f64,

    /// Charging location name
    pub location: String,

    pub is_active: bool,

    /// Session status
    pub status: SessionStatus,
}

/// Session status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Session is currently active
    Active,

    /// Target reached
    Completed,

    /// Stopped on request
    Interrupted,

    /// Loop hit an internal error
    Failed,
}

impl ChargingSession {
    /// Create an active session starting now
    pub fn new(
        start_soc: f64,
        target_soc: f64,
        location: &str,
        charging_rate_kw: f64,
        voltage: f64,
    ) -> Self {
        let amperage = if voltage > 0.0 {
            charging_rate_kw * 1000.0 / voltage
        } else {
            0.0
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            start_time: Utc::now(),
            end_time: None,
            start_soc,
            current_soc: start_soc,
            target_soc,
            charging_rate_kw,
            voltage,
            amperage,
            energy_added_kwh: 0.0,
            cost: 0.0,
            location: location.to_string(),
            is_active: true,
            status: SessionStatus::Active,
        }
    }

    /// Progress from start to target, 0-100
    pub fn progress_percentage(&self) -> f64 {
        if self.target_soc <= self.start_soc {
            return 100.0;
        }
        let progress = (self.current_soc - self.start_soc) / (self.target_soc - self.start_soc);
        (progress * 100.0).clamp(0.0, 100.0)
    }

    pub fn duration_minutes(&self) -> i64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_minutes()
    }
}

/// Session manager for tracking charging sessions
pub struct ChargingSessionManager {
    /// Current active session
    pub current_session: Option<ChargingSession>,

    /// Session history, oldest first (limited size)
    session_history: VecDeque<ChargingSession>,

    /// Maximum history size
    max_history_size: usize,

    /// Logger
    logger: crate::logging::StructuredLogger,
}

impl ChargingSessionManager {
    /// Create a new session manager
    pub fn new(max_history_size: usize) -> Self {
        let logger = get_logger("session");

        Self {
            current_session: None,
            session_history: VecDeque::with_capacity(max_history_size),
            max_history_size: max_history_size.max(1),
            logger,
        }
    }

    /// Restore previously archived sessions, keeping the most recent ones
    pub fn restore_history(&mut self, mut sessions: Vec<ChargingSession>) {
        sessions.sort_by_key(|s| s.start_time);
        let skip = sessions.len().saturating_sub(self.max_history_size);
        self.session_history = sessions.into_iter().skip(skip).collect();
        self.logger.debug(&format!(
            "Restored {} charging sessions",
            self.session_history.len()
        ));
    }

    /// Start a new charging session
    pub fn start_session(&mut self, session: ChargingSession) -> Result<()> {
        if self.current_session.is_some() {
            return Err(LandauError::invalid_charging("Charging session already active"));
        }

        self.logger.info(&format!(
            "Started charging session {} at {} ({:.1}% -> {:.0}%)",
            session.id, session.location, session.start_soc, session.target_soc
        ));
        self.current_session = Some(session);

        Ok(())
    }

    /// End the current session and archive it
    pub fn end_session(&mut self, status: SessionStatus) -> Result<ChargingSession> {
        let Some(mut session) = self.current_session.take() else {
            return Err(LandauError::NoActiveSession);
        };
        session.is_active = false;
        session.end_time = Some(Utc::now());
        session.status = status;

        // Add to history, maintaining max size
        self.session_history.push_back(session.clone());
        while self.session_history.len() > self.max_history_size {
            self.session_history.pop_front();
        }

        self.logger.info(&format!(
            "Ended charging session {} ({:?}), added {:.3} kWh",
            session.id, status, session.energy_added_kwh
        ));

        Ok(session)
    }

    /// Archived session by id
    pub fn find_archived(&self, id: &str) -> Option<&ChargingSession> {
        self.session_history.iter().find(|s| s.id == id)
    }

    /// Most recent sessions first
    pub fn recent(&self, limit: usize) -> Vec<ChargingSession> {
        self.session_history.iter().rev().take(limit).cloned().collect()
    }

    /// All archived sessions, oldest first
    pub fn archived(&self) -> Vec<ChargingSession> {
        self.session_history.iter().cloned().collect()
    }

    /// Get session statistics
    pub fn get_session_stats(&self) -> serde_json::Value {
        let mut stats = serde_json::Map::new();

        if let Some(ref session) = self.current_session {
            stats.insert("session_active".to_string(), true.into());
            stats.insert(
                "session_duration_min".to_string(),
                session.duration_minutes().into(),
            );
            stats.insert(
                "energy_added_kwh".to_string(),
                session.energy_added_kwh.into(),
            );
            stats.insert(
                "progress_percentage".to_string(),
                session.progress_percentage().into(),
            );
        } else {
            stats.insert("session_active".to_string(), false.into());
            stats.insert("session_duration_min".to_string(), serde_json::Value::Null);
            stats.insert("energy_added_kwh".to_string(), serde_json::Value::Null);
            stats.insert("progress_percentage".to_string(), serde_json::Value::Null);
        }
        stats.insert(
            "archived_sessions".to_string(),
            self.session_history.len().into(),
        );

        serde_json::Value::Object(stats)
    }
}

impl Default for ChargingSessionManager {
    fn default() -> Self {
        Self::new(50)
    }
}
