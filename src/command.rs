//! Remote command model
//!
//! A [`RemoteCommand`] moves from `Pending` to exactly one terminal status.
//! Terminal commands are immutable; any later mark is refused. A command
//! cancelled while queued stays `Pending` for good.

use crate::error::{LandauError, Result};
use crate::vehicle::{DefrostPosition, Seat, SeatHeatLevel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Command payloads, one variant per command type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "parameters",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum CommandKind {
    Lock,
    Unlock,
    ClimateOn {
        #[serde(default)]
        target_temp: Option<f64>,
    },
    ClimateOff,
    SetTemp {
        target_temp: f64,
    },
    SeatHeat {
        seat: Seat,
        level: SeatHeatLevel,
    },
    SteeringHeat {
        enabled: bool,
    },
    Defrost {
        position: DefrostPosition,
        enabled: bool,
    },
    TrunkOpen,
    FrunkOpen,
    HonkFlash,
}

/// Flat command discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    Lock,
    Unlock,
    ClimateOn,
    ClimateOff,
    SetTemp,
    SeatHeat,
    SteeringHeat,
    Defrost,
    TrunkOpen,
    FrunkOpen,
    HonkFlash,
}

impl CommandKind {
    pub fn command_type(&self) -> CommandType {
        match self {
            CommandKind::Lock => CommandType::Lock,
            CommandKind::Unlock => CommandType::Unlock,
            CommandKind::ClimateOn { .. } => CommandType::ClimateOn,
            CommandKind::ClimateOff => CommandType::ClimateOff,
            CommandKind::SetTemp { .. } => CommandType::SetTemp,
            CommandKind::SeatHeat { .. } => CommandType::SeatHeat,
            CommandKind::SteeringHeat { .. } => CommandType::SteeringHeat,
            CommandKind::Defrost { .. } => CommandType::Defrost,
            CommandKind::TrunkOpen => CommandType::TrunkOpen,
            CommandKind::FrunkOpen => CommandType::FrunkOpen,
            CommandKind::HonkFlash => CommandType::HonkFlash,
        }
    }
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Lock => "LOCK",
            CommandType::Unlock => "UNLOCK",
            CommandType::ClimateOn => "CLIMATE_ON",
            CommandType::ClimateOff => "CLIMATE_OFF",
            CommandType::SetTemp => "SET_TEMP",
            CommandType::SeatHeat => "SEAT_HEAT",
            CommandType::SteeringHeat => "STEERING_HEAT",
            CommandType::Defrost => "DEFROST",
            CommandType::TrunkOpen => "TRUNK_OPEN",
            CommandType::FrunkOpen => "FRUNK_OPEN",
            CommandType::HonkFlash => "HONK_FLASH",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandStatus {
    Pending,
    Success,
    Failed,
    Timeout,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CommandStatus::Pending)
    }
}

/// A remote command and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: Uuid,

    #[serde(rename = "command")]
    pub kind: CommandKind,

    pub status: CommandStatus,

    pub created_at: DateTime<Utc>,

    /// Simulated execution time, set once the command is terminal
    pub response_time_ms: Option<u64>,

    pub error_message: Option<String>,

    /// Removed from the queue before it ran
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

impl RemoteCommand {
    pub fn new(kind: CommandKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            status: CommandStatus::Pending,
            created_at: Utc::now(),
            response_time_ms: None,
            error_message: None,
            cancelled: false,
        }
    }

    pub fn command_type(&self) -> CommandType {
        self.kind.command_type()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Freeze a pending command at `Pending`
    pub fn mark_cancelled(&mut self) -> Result<()> {
        if self.is_terminal() {
            return Err(LandauError::conflict(format!(
                "Command {} is already {:?}",
                self.id, self.status
            )));
        }
        self.cancelled = true;
        Ok(())
    }

    pub fn mark_success(&mut self, response_time_ms: u64) -> Result<()> {
        self.finish(CommandStatus::Success, response_time_ms, None)
    }

    pub fn mark_failed<S: Into<String>>(&mut self, message: S, response_time_ms: u64) -> Result<()> {
        self.finish(CommandStatus::Failed, response_time_ms, Some(message.into()))
    }

    pub fn mark_timeout(&mut self, timeout_ms: u64) -> Result<()> {
        self.finish(
            CommandStatus::Timeout,
            timeout_ms,
            Some(format!("Command timed out after {}ms", timeout_ms)),
        )
    }

    fn finish(
        &mut self,
        status: CommandStatus,
        response_time_ms: u64,
        error_message: Option<String>,
    ) -> Result<()> {
        if self.is_terminal() {
            return Err(LandauError::conflict(format!(
                "Command {} is already {:?}",
                self.id, self.status
            )));
        }
        if self.cancelled {
            return Err(LandauError::conflict(format!(
                "Command {} was cancelled",
                self.id
            )));
        }
        self.status = status;
        self.response_time_ms = Some(response_time_ms);
        self.error_message = error_message;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_sticky() {
        let mut cmd = RemoteCommand::new(CommandKind::Lock);
        cmd.mark_success(1200).unwrap();
        assert!(cmd.mark_failed("late", 10).is_err());
        assert!(cmd.mark_timeout(10).is_err());
        assert_eq!(cmd.status, CommandStatus::Success);
        assert_eq!(cmd.response_time_ms, Some(1200));
        assert_eq!(cmd.error_message, None);
    }

    #[test]
    fn cancelled_command_stays_pending() {
        let mut cmd = RemoteCommand::new(CommandKind::HonkFlash);
        cmd.mark_cancelled().unwrap();
        assert!(cmd.mark_timeout(100).is_err());
        assert!(cmd.mark_success(100).is_err());
        assert_eq!(cmd.status, CommandStatus::Pending);

        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["cancelled"], true);
        let fresh = serde_json::to_value(RemoteCommand::new(CommandKind::Lock)).unwrap();
        assert!(fresh.get("cancelled").is_none());
    }

    #[test]
    fn timeout_message() {
        let mut cmd = RemoteCommand::new(CommandKind::HonkFlash);
        cmd.mark_timeout(5000).unwrap();
        assert_eq!(cmd.status, CommandStatus::Timeout);
        assert_eq!(
            cmd.error_message.as_deref(),
            Some("Command timed out after 5000ms")
        );
    }

    #[test]
    fn kind_uses_type_and_parameters_tags() {
        let kind = CommandKind::SeatHeat {
            seat: Seat::FrontRight,
            level: SeatHeatLevel::Medium,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "SEAT_HEAT");
        assert_eq!(json["parameters"]["seat"], "front_right");
        assert_eq!(json["parameters"]["level"], "medium");

        let parsed: CommandKind =
            serde_json::from_str(r#"{"type":"SET_TEMP","parameters":{"target_temp":22}}"#).unwrap();
        assert_eq!(parsed, CommandKind::SetTemp { target_temp: 22.0 });

        let parsed: CommandKind = serde_json::from_str(r#"{"type":"HONK_FLASH"}"#).unwrap();
        assert_eq!(parsed.command_type(), CommandType::HonkFlash);
    }

    #[test]
    fn unknown_seat_is_rejected_by_serde() {
        let res: std::result::Result<CommandKind, _> = serde_json::from_str(
            r#"{"type":"SEAT_HEAT","parameters":{"seat":"roof","level":"low"}}"#,
        );
        assert!(res.is_err());
    }
}
