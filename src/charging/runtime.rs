use super::SimulatorInner;
use super::curve::{ChargerProfile, charge_step};
use crate::logging::{LogContext, get_logger_with_context};
use crate::session::SessionStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Whether the loop keeps running after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum TickOutcome {
    Continue,
    Finished,
}

/// Drive one session until it completes, fails or is told to stop. The first
/// tick fires immediately.
pub(super) async fn run_charging_loop(
    inner: Arc<SimulatorInner>,
    session_id: String,
    mut stop_rx: watch::Receiver<bool>,
) {
    let period = Duration::from_millis(inner.settings.tick_interval_ms.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let logger =
        get_logger_with_context(LogContext::new("charging").with_session_id(session_id.clone()));
    logger.debug(&format!("Charging loop started ({:?} ticks)", period));

    loop {
        tokio::select! {
            biased;
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
                continue;
            }
            _ = ticker.tick() => {}
        }

        if inner.tick(&session_id) == TickOutcome::Finished {
            break;
        }
    }

    logger.debug("Charging loop exited");
}

impl SimulatorInner {
    /// Advance the session by one tick while holding the session lock, then
    /// the vehicle lock
    pub(super) fn tick(&self, session_id: &str) -> TickOutcome {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.current_session.as_mut() else {
            return TickOutcome::Finished;
        };
        if session.id != session_id {
            return TickOutcome::Finished;
        }

        let profile = ChargerProfile::for_location(&session.location, &self.settings);
        let target = session.target_soc;
        let voltage = session.voltage;
        let capacity = self.settings.battery_capacity_kwh;
        let seconds = self.settings.simulated_seconds_per_tick;

        let stepped = self.vehicle.update_if_changed(|v| {
            let soc = v.battery_soc();
            if soc >= target {
                return Ok(None);
            }
            let step = charge_step(soc, target, profile.max_rate_kw, voltage, capacity, seconds)?;
            v.set_battery_soc(step.new_soc);
            Ok(Some(step))
        });

        let finished = match stepped {
            Ok(None) => Some(SessionStatus::Completed),
            Ok(Some(step)) => {
                session.charging_rate_kw = step.rate_kw;
                session.amperage = step.amperage;
                session.current_soc = session.current_soc.max(step.new_soc);
                session.energy_added_kwh += step.energy_kwh;
                session.cost = session.energy_added_kwh * self.settings.price_per_kwh;
                (step.new_soc >= target).then_some(SessionStatus::Completed)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Charging session {} failed: {}", session_id, e));
                Some(SessionStatus::Failed)
            }
        };

        match finished {
            None => TickOutcome::Continue,
            Some(status) => {
                self.finalize(&mut sessions, status);
                TickOutcome::Finished
            }
        }
    }
}
