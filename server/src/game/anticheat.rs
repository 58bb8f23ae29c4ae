//! Passive behavioral monitoring. Observes, never mutates.
//!
//! Reports carry a severity; `Confirmed` is termination-eligible and the
//! session may mark the offender as the loser. Everything else is logged.
//! Action cadence comes from the validator's rate-limit window rather than
//! a second bookkeeping copy here.

use uuid::Uuid;

use crate::game::engine::GameState;

/// Sustained action rates (per minute) that trip the monitor; these are far
/// below the hard validator limits and catch bot-like cadence.
const SUSPICIOUS_APM: usize = 30;
const CONFIRMED_APM: usize = 60;

/// Tolerated drift between a client-asserted resource value and ours.
const DRIFT_SUSPICIOUS: f32 = 5.0;
const DRIFT_CONFIRMED: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Suspicious,
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct CheatReport {
    pub player: Uuid,
    pub severity: Severity,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct CheatMonitor;

impl CheatMonitor {
    pub fn new() -> Self {
        Self
    }

    /// Judge a player's accepted-action cadence; `apm` is the trailing-minute
    /// count reported by `RateLimiter::recent_minute`.
    pub fn check_action_rate(&self, player: Uuid, apm: usize) -> Option<CheatReport> {
        if apm > CONFIRMED_APM {
            Some(CheatReport {
                player,
                severity: Severity::Confirmed,
                detail: format!("sustained {apm} actions/min"),
            })
        } else if apm > SUSPICIOUS_APM {
            Some(CheatReport {
                player,
                severity: Severity::Suspicious,
                detail: format!("sustained {apm} actions/min"),
            })
        } else {
            None
        }
    }

    /// Compare a client-asserted resource value against the server's.
    pub fn check_resource_claim(
        &self,
        player: Uuid,
        claimed: f32,
        actual: f32,
    ) -> Option<CheatReport> {
        let drift = (claimed - actual).abs();
        if drift > DRIFT_CONFIRMED {
            Some(CheatReport {
                player,
                severity: Severity::Confirmed,
                detail: format!("resource drift {drift:.0}"),
            })
        } else if drift > DRIFT_SUSPICIOUS {
            Some(CheatReport {
                player,
                severity: Severity::Suspicious,
                detail: format!("resource drift {drift:.0}"),
            })
        } else {
            None
        }
    }

    /// Sweep the state for impossible unit stats and positions.
    pub fn audit_state(&self, state: &GameState) -> Vec<CheatReport> {
        let mut reports = Vec::new();
        for unit in state.units.values() {
            let expected = unit.kind.stats();
            if unit.max_hp > expected.hp * 1.5
                || unit.attack_damage > expected.damage * 2.0
                || unit.attack_range > expected.range * 2.0
                || unit.speed > expected.speed * 1.5
            {
                reports.push(CheatReport {
                    player: unit.owner,
                    severity: Severity::Confirmed,
                    detail: format!("unit {} exceeds stat envelope for {:?}", unit.id, unit.kind),
                });
            }
            if !state.map.in_bounds(unit.pos) {
                reports.push(CheatReport {
                    player: unit.owner,
                    severity: Severity::Confirmed,
                    detail: format!("unit {} outside the map", unit.id),
                });
            }
        }
        reports
    }
}
