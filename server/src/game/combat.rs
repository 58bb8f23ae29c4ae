//! Damage application and projectile flight.
//!
//! Attack upgrades are baked into the damage a shot leaves with; defense
//! upgrades are applied at impact. The AI difficulty multiplier scales only
//! AI-owned projectiles in single-player rooms.

use uuid::Uuid;

use crate::game::engine::GameState;
use crate::game::grid::SpatialGrid;
use crate::game::types::{EntityId, ProjectileKind, Vec2};

/// Damage carried by an attack at launch: base plus the attacker's upgrade
/// bonus (`+2` per level, `+3` for towers).
pub fn launch_damage(base: f32, attack_upgrade: u8, is_tower: bool) -> f32 {
    let per_level = if is_tower { 3.0 } else { 2.0 };
    base + per_level * f32::from(attack_upgrade)
}

/// Damage dealt after the defender's upgrades, floored at 1.
pub fn dealt(launch: f32, defense_upgrade: u8) -> f32 {
    (launch - 2.0 * f32::from(defense_upgrade)).max(1.0)
}

fn ai_projectile_multiplier(state: &GameState, owner: Uuid) -> f32 {
    if state.single_player
        && state
            .players
            .get(&owner)
            .map(|p| p.is_ai())
            .unwrap_or(false)
    {
        state.difficulty.multiplier()
    } else {
        1.0
    }
}

/// Apply `launch` damage to a unit or building. `via_projectile` selects
/// whether the AI difficulty multiplier may apply.
pub fn apply_damage(
    state: &mut GameState,
    target: &EntityId,
    launch: f32,
    attacker_owner: Uuid,
    via_projectile: bool,
) {
    let tick = state.tick;
    let mult = if via_projectile {
        ai_projectile_multiplier(state, attacker_owner)
    } else {
        1.0
    };

    let owner = state
        .units
        .get(target)
        .map(|u| u.owner)
        .or_else(|| state.buildings.get(target).map(|b| b.owner));
    let Some(owner) = owner else { return };
    if owner == attacker_owner {
        return;
    }
    let defense = state
        .players
        .get(&owner)
        .map(|p| p.upgrades.defense)
        .unwrap_or(0);
    let amount = dealt(launch, defense) * mult;

    if let Some(unit) = state.units.get_mut(target) {
        unit.hp -= amount;
        unit.under_attack = true;
        unit.last_hit_tick = tick;
    } else if let Some(building) = state.buildings.get_mut(target) {
        building.hp -= amount;
        building.under_attack = true;
        building.last_hit_tick = tick;
    }
}

/// Restore hit points on a friendly unit, clamped to its maximum.
pub fn apply_heal(state: &mut GameState, target: &EntityId, amount: f32) {
    if let Some(unit) = state.units.get_mut(target) {
        unit.hp = (unit.hp + amount).min(unit.max_hp);
    }
}

/// Splash with radial falloff `dmg * (1 - d/r/2)` around `impact`.
fn apply_splash(
    state: &mut GameState,
    grid: &SpatialGrid,
    impact: Vec2,
    radius: f32,
    launch: f32,
    attacker_owner: Uuid,
) {
    for victim in grid.query_radius(impact, radius) {
        let pos = match state
            .units
            .get(&victim)
            .map(|u| u.pos)
            .or_else(|| state.buildings.get(&victim).map(|b| b.pos))
        {
            Some(p) => p,
            None => continue,
        };
        let d = pos.distance(impact);
        let factor = 1.0 - d / radius / 2.0;
        if factor <= 0.0 {
            continue;
        }
        apply_damage(state, &victim, launch * factor, attacker_owner, true);
    }
}

/// Advance every projectile one tick; resolve impacts.
///
/// Flight continues toward the cached position when the target dies, so no
/// projectile outlives its trajectory.
pub fn step_projectiles(state: &mut GameState, grid: &SpatialGrid) {
    let ids: Vec<EntityId> = state.projectiles.keys().cloned().collect();
    for id in ids {
        let mut p = match state.projectiles.get(&id) {
            Some(p) => p.clone(),
            None => continue,
        };

        // Track a live target; otherwise keep the last known position.
        if let Some(target_id) = &p.target_id {
            let live = state
                .units
                .get(target_id)
                .filter(|u| u.hp > 0.0)
                .map(|u| u.pos)
                .or_else(|| {
                    state
                        .buildings
                        .get(target_id)
                        .filter(|b| b.hp > 0.0)
                        .map(|b| b.pos)
                });
            match live {
                Some(pos) => p.target_pos = pos,
                None => p.target_id = None,
            }
        }

        let dist = p.pos.distance(p.target_pos);
        if dist > p.speed {
            let dir = p.target_pos.sub(p.pos).normalized();
            p.pos = p.pos.add(dir.scale(p.speed));
            state.projectiles.insert(id, p);
            continue;
        }

        // Impact.
        p.pos = p.target_pos;
        match p.kind {
            ProjectileKind::Heal => {
                if let Some(target) = &p.target_id {
                    apply_heal(state, target, p.damage);
                }
            }
            _ if p.splash > 0.0 => {
                apply_splash(state, grid, p.pos, p.splash, p.damage, p.owner);
            }
            _ => {
                if let Some(target) = p.target_id.clone() {
                    apply_damage(state, &target, p.damage, p.owner, true);
                }
            }
        }
        state.projectiles.remove(&id);
    }
}
