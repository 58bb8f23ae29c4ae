//! Gatekeeper between the transport edge and the engine queue.
//!
//! Gates run in a fixed order: rate limit, clock skew, shape, ownership,
//! bounds, placement, resources, upgrade caps, target legality. The first
//! failure wins and the action never reaches the engine.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::config::settings;
use crate::game::engine::GameState;
use crate::game::types::{
    Action, BuildingKind, UpgradeKind, Vec2, ATTACK_CAP, DEFENSE_CAP, RANGE_CAP,
};

/// Maximum client/server clock drift, in seconds, before an action is
/// dropped.
const MAX_SKEW_SECS: i64 = 5;
/// Required clearance between building footprints, center to center, beyond
/// the mean of their sizes.
pub const PLACEMENT_GAP: f32 = 10.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RejectReason {
    #[error("Rate limit exceeded")]
    RateLimited,
    #[error("Action timestamp out of range")]
    ClockSkew,
    #[error("Malformed action: {0}")]
    Malformed(String),
    #[error("Unknown entity")]
    UnknownEntity,
    #[error("Entity not owned by sender")]
    NotOwner,
    #[error("Position out of bounds")]
    OutOfBounds,
    #[error("Target tile is impassable")]
    Impassable,
    #[error("Invalid placement")]
    InvalidPlacement,
    #[error("Insufficient resources")]
    InsufficientResources,
    #[error("Supply cap reached")]
    SupplyCap,
    #[error("Upgrade already at maximum")]
    UpgradeCapped,
    #[error("Invalid target")]
    InvalidTarget,
    #[error("No such queue entry")]
    NotInQueue,
    #[error("Building cannot do that")]
    WrongBuilding,
    #[error("Unit cannot do that")]
    WrongUnit,
}

/// Sliding-window action rate limiter, one per player.
#[derive(Debug, Default)]
pub struct RateLimiter {
    window: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an attempt at `now`; `false` when either window is full.
    pub fn allow(&mut self, now: Instant) -> bool {
        let minute = Duration::from_secs(60);
        while let Some(front) = self.window.front() {
            if now.duration_since(*front) > minute {
                self.window.pop_front();
            } else {
                break;
            }
        }
        let cfg = settings();
        let last_second = self
            .window
            .iter()
            .rev()
            .take_while(|t| now.duration_since(**t) <= Duration::from_secs(1))
            .count();
        if last_second >= cfg.actions_per_sec || self.window.len() >= cfg.actions_per_min {
            return false;
        }
        self.window.push_back(now);
        true
    }

    /// Accepted actions in the trailing minute (anti-cheat reads this).
    pub fn recent_minute(&self, now: Instant) -> usize {
        self.window
            .iter()
            .filter(|t| now.duration_since(**t) <= Duration::from_secs(60))
            .count()
    }
}

pub fn validate(
    state: &GameState,
    player: Uuid,
    action: &Action,
    limiter: &mut RateLimiter,
    now: Instant,
    timestamp: DateTime<Utc>,
) -> Result<(), RejectReason> {
    if !limiter.allow(now) {
        return Err(RejectReason::RateLimited);
    }
    let skew = Utc::now().signed_duration_since(timestamp);
    if skew.num_seconds().abs() > MAX_SKEW_SECS {
        return Err(RejectReason::ClockSkew);
    }
    check_shape(action)?;
    check_rules(state, player, action)
}

fn finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

fn check_shape(action: &Action) -> Result<(), RejectReason> {
    let positions: &[&Vec2] = match action {
        Action::Move { target, .. }
        | Action::AttackMove { target, .. }
        | Action::AttackGround { target, .. }
        | Action::Patrol { target, .. }
        | Action::SetRally { target, .. } => &[target],
        Action::Build { position, .. } => &[position],
        _ => &[],
    };
    for pos in positions {
        if !finite(**pos) {
            return Err(RejectReason::Malformed("non-finite coordinates".into()));
        }
    }
    Ok(())
}

fn check_rules(state: &GameState, player: Uuid, action: &Action) -> Result<(), RejectReason> {
    match action {
        Action::Move { unit_id, target, .. }
        | Action::AttackMove {
            unit_id, target, ..
        }
        | Action::Patrol { unit_id, target } => {
            own_unit(state, player, unit_id)?;
            passable_target(state, *target)
        }
        Action::AttackGround { unit_id, target } => {
            let unit = own_unit(state, player, unit_id)?;
            if unit.kind != crate::game::types::UnitKind::Catapult {
                return Err(RejectReason::WrongUnit);
            }
            in_bounds(state, *target)
        }
        Action::HoldPosition { unit_id } | Action::Stop { unit_id } => {
            own_unit(state, player, unit_id).map(|_| ())
        }
        Action::Attack { unit_id, target_id } => {
            own_unit(state, player, unit_id)?;
            let hostile = state
                .units
                .get(target_id)
                .map(|t| t.owner != player)
                .or_else(|| state.buildings.get(target_id).map(|t| t.owner != player));
            match hostile {
                Some(true) => Ok(()),
                Some(false) => Err(RejectReason::InvalidTarget),
                None => Err(RejectReason::UnknownEntity),
            }
        }
        Action::Gather { unit_id, node_id } => {
            let unit = own_unit(state, player, unit_id)?;
            if unit.kind != crate::game::types::UnitKind::Worker {
                return Err(RejectReason::WrongUnit);
            }
            match state.nodes.get(node_id) {
                Some(node) if node.amount > 0.0 => Ok(()),
                Some(_) => Err(RejectReason::InvalidTarget),
                None => Err(RejectReason::UnknownEntity),
            }
        }
        Action::Repair {
            unit_id,
            building_id,
        } => {
            let unit = own_unit(state, player, unit_id)?;
            if unit.kind != crate::game::types::UnitKind::Worker {
                return Err(RejectReason::WrongUnit);
            }
            own_building(state, player, building_id).map(|_| ())
        }
        Action::Heal { unit_id, target_id } => {
            let unit = own_unit(state, player, unit_id)?;
            if unit.kind != crate::game::types::UnitKind::Healer {
                return Err(RejectReason::WrongUnit);
            }
            match state.units.get(target_id) {
                Some(t) if t.owner == player => Ok(()),
                Some(_) => Err(RejectReason::InvalidTarget),
                None => Err(RejectReason::UnknownEntity),
            }
        }
        Action::Build {
            unit_id,
            building,
            position,
        } => {
            let unit = own_unit(state, player, unit_id)?;
            if unit.kind != crate::game::types::UnitKind::Worker {
                return Err(RejectReason::WrongUnit);
            }
            in_bounds(state, *position)?;
            check_placement(state, *building, *position)?;
            let stats = building.stats();
            let p = state
                .players
                .get(&player)
                .ok_or(RejectReason::UnknownEntity)?;
            if p.gold < stats.gold || p.wood < stats.wood {
                return Err(RejectReason::InsufficientResources);
            }
            Ok(())
        }
        Action::Produce { building_id, unit } => {
            let b = own_building(state, player, building_id)?;
            if !b.is_complete() || !b.kind.produces().contains(unit) {
                return Err(RejectReason::WrongBuilding);
            }
            let cost = unit.cost();
            let p = state
                .players
                .get(&player)
                .ok_or(RejectReason::UnknownEntity)?;
            if p.gold < cost.gold || p.wood < cost.wood {
                return Err(RejectReason::InsufficientResources);
            }
            if p.supply + cost.supply > p.max_supply {
                return Err(RejectReason::SupplyCap);
            }
            Ok(())
        }
        Action::CancelProduce { building_id, index } => {
            let b = own_building(state, player, building_id)?;
            if *index >= b.queue.len() {
                return Err(RejectReason::NotInQueue);
            }
            Ok(())
        }
        Action::SetRally {
            building_id,
            target,
        } => {
            own_building(state, player, building_id)?;
            passable_target(state, *target)
        }
        Action::Upgrade { upgrade } => {
            let p = state
                .players
                .get(&player)
                .ok_or(RejectReason::UnknownEntity)?;
            let (level, cap) = match upgrade {
                UpgradeKind::Attack => (p.upgrades.attack, ATTACK_CAP),
                UpgradeKind::Defense => (p.upgrades.defense, DEFENSE_CAP),
                UpgradeKind::Range => (p.upgrades.range, RANGE_CAP),
            };
            if level >= cap {
                return Err(RejectReason::UpgradeCapped);
            }
            if !state.has_completed_building(player, BuildingKind::Blacksmith) {
                return Err(RejectReason::WrongBuilding);
            }
            let (gold, wood) = crate::game::types::upgrade_cost(level + 1);
            if p.gold < gold || p.wood < wood {
                return Err(RejectReason::InsufficientResources);
            }
            Ok(())
        }
        Action::Surrender {} => Ok(()),
    }
}

fn own_unit<'a>(
    state: &'a GameState,
    player: Uuid,
    id: &str,
) -> Result<&'a crate::game::types::Unit, RejectReason> {
    let unit = state.units.get(id).ok_or(RejectReason::UnknownEntity)?;
    if unit.owner != player {
        return Err(RejectReason::NotOwner);
    }
    Ok(unit)
}

fn own_building<'a>(
    state: &'a GameState,
    player: Uuid,
    id: &str,
) -> Result<&'a crate::game::types::Building, RejectReason> {
    let b = state.buildings.get(id).ok_or(RejectReason::UnknownEntity)?;
    if b.owner != player {
        return Err(RejectReason::NotOwner);
    }
    Ok(b)
}

fn in_bounds(state: &GameState, pos: Vec2) -> Result<(), RejectReason> {
    if state.map.in_bounds(pos) {
        Ok(())
    } else {
        Err(RejectReason::OutOfBounds)
    }
}

fn passable_target(state: &GameState, pos: Vec2) -> Result<(), RejectReason> {
    in_bounds(state, pos)?;
    if state.map.is_passable(pos) {
        Ok(())
    } else {
        Err(RejectReason::Impassable)
    }
}

/// Footprint must clear other buildings by `PLACEMENT_GAP` and must not
/// straddle impassable terrain.
pub fn check_placement(
    state: &GameState,
    kind: BuildingKind,
    pos: Vec2,
) -> Result<(), RejectReason> {
    let size = kind.stats().size;
    let half = size / 2.0;
    for corner in [
        Vec2::new(pos.x - half, pos.y - half),
        Vec2::new(pos.x + half, pos.y - half),
        Vec2::new(pos.x - half, pos.y + half),
        Vec2::new(pos.x + half, pos.y + half),
        pos,
    ] {
        if !state.map.in_bounds(corner) {
            return Err(RejectReason::OutOfBounds);
        }
        if !state.map.is_passable(corner) {
            return Err(RejectReason::Impassable);
        }
    }
    for existing in state.buildings.values() {
        if pos.distance(existing.pos) < (size + existing.size) / 2.0 + PLACEMENT_GAP {
            return Err(RejectReason::InvalidPlacement);
        }
    }
    Ok(())
}
