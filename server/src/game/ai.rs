//! Scripted opponent for single-player rooms.
//!
//! The planner is a pure function of the current state and emits ordinary
//! actions into the same per-tick queue human input uses; it skips the rate
//! limiter but gets no other shortcuts besides the income trickle.

use uuid::Uuid;

use crate::game::engine::GameState;
use crate::game::types::{
    Action, BuildingKind, CommandState, EntityId, UnitKind, Vec2,
};

/// Ticks between planner runs (twice per second).
pub const PLAN_INTERVAL: u64 = 30;

const WORKER_TARGET: usize = 4;
const ATTACK_ARMY_SIZE: usize = 6;

pub fn plan(state: &GameState) -> Vec<(Uuid, Action)> {
    let mut orders = Vec::new();
    for (pid, player) in &state.players {
        if !player.is_ai() {
            continue;
        }
        plan_for(state, *pid, &mut orders);
    }
    orders
}

fn plan_for(state: &GameState, ai: Uuid, orders: &mut Vec<(Uuid, Action)>) {
    let my_units: Vec<&_> = state.units.values().filter(|u| u.owner == ai).collect();
    let workers: Vec<&_> = my_units
        .iter()
        .filter(|u| u.kind == UnitKind::Worker)
        .copied()
        .collect();
    let soldiers: Vec<&_> = my_units
        .iter()
        .filter(|u| u.kind.is_combatant())
        .copied()
        .collect();

    // Idle workers go back to the nearest live node.
    for w in &workers {
        if w.state == CommandState::Idle {
            if let Some(node) = nearest_node(state, w.pos) {
                orders.push((
                    ai,
                    Action::Gather {
                        unit_id: w.id.clone(),
                        node_id: node,
                    },
                ));
            }
        }
    }

    let player = match state.players.get(&ai) {
        Some(p) => p,
        None => return,
    };
    let base = state
        .buildings
        .values()
        .find(|b| b.owner == ai && b.kind == BuildingKind::Base && b.is_complete());
    let barracks = state
        .buildings
        .values()
        .find(|b| b.owner == ai && b.kind == BuildingKind::Barracks && b.is_complete());

    // Keep the worker line going.
    if let Some(base) = base {
        let queued: usize = base.queue.len();
        if workers.len() + queued < WORKER_TARGET
            && player.gold >= UnitKind::Worker.cost().gold
            && queued == 0
        {
            orders.push((
                ai,
                Action::Produce {
                    building_id: base.id.clone(),
                    unit: UnitKind::Worker,
                },
            ));
        }
    }

    // One barracks, then a steady soldier stream.
    match barracks {
        None => {
            let under_way = state
                .buildings
                .values()
                .any(|b| b.owner == ai && b.kind == BuildingKind::Barracks);
            if !under_way {
                let stats = BuildingKind::Barracks.stats();
                if player.gold >= stats.gold && player.wood >= stats.wood {
                    if let (Some(base), Some(w)) = (base, workers.first()) {
                        if let Some(spot) = build_spot(state, base.pos) {
                            orders.push((
                                ai,
                                Action::Build {
                                    unit_id: w.id.clone(),
                                    building: BuildingKind::Barracks,
                                    position: spot,
                                },
                            ));
                        }
                    }
                }
            }
        }
        Some(rax) => {
            let cost = UnitKind::Soldier.cost();
            if rax.queue.len() < 2
                && player.gold >= cost.gold
                && player.wood >= cost.wood
                && player.supply + cost.supply <= player.max_supply
            {
                orders.push((
                    ai,
                    Action::Produce {
                        building_id: rax.id.clone(),
                        unit: UnitKind::Soldier,
                    },
                ));
            }
        }
    }

    // Push when the army is big enough.
    if soldiers.len() >= ATTACK_ARMY_SIZE {
        if let Some(enemy_base) = state
            .buildings
            .values()
            .find(|b| b.owner != ai && b.kind == BuildingKind::Base)
        {
            for s in &soldiers {
                if matches!(s.state, CommandState::Idle) {
                    orders.push((
                        ai,
                        Action::AttackMove {
                            unit_id: s.id.clone(),
                            target: enemy_base.pos,
                        },
                    ));
                }
            }
        }
    }
}

fn nearest_node(state: &GameState, from: Vec2) -> Option<EntityId> {
    state
        .nodes
        .values()
        .filter(|n| n.amount > 0.0)
        .min_by(|a, b| {
            from.distance(a.pos)
                .partial_cmp(&from.distance(b.pos))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|n| n.id.clone())
}

/// First placement near the base that clears terrain and other buildings.
fn build_spot(state: &GameState, base: Vec2) -> Option<Vec2> {
    let size = BuildingKind::Barracks.stats().size;
    let offsets = [
        Vec2::new(140.0, 0.0),
        Vec2::new(-140.0, 0.0),
        Vec2::new(0.0, 140.0),
        Vec2::new(0.0, -140.0),
        Vec2::new(140.0, 140.0),
        Vec2::new(-140.0, -140.0),
    ];
    offsets.iter().map(|o| base.add(*o)).find(|pos| {
        state.map.is_passable(*pos)
            && state.buildings.values().all(|b| {
                pos.distance(b.pos) >= (size + b.size) / 2.0 + 10.0
            })
    })
}
