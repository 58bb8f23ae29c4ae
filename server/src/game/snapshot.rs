//! Read-only views of the engine state, built at broadcast time.
//!
//! `build_for` is the default broadcast path: entities on tiles the
//! recipient has never discovered are filtered out; own entities always
//! pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::game::engine::GameState;
use crate::game::types::{
    Building, BuildingKind, CommandState, EntityId, Projectile, ProjectileKind, ResourceKind,
    Team, Unit, UnitKind, Upgrades, Vec2,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitView {
    pub id: EntityId,
    pub owner: Uuid,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub kind: UnitKind,
    pub state: CommandState,
    pub carrying: Option<(ResourceKind, f32)>,
    pub under_attack: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingView {
    pub id: EntityId,
    pub owner: Uuid,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub kind: BuildingKind,
    pub progress: f32,
    pub rally: Option<Vec2>,
    pub queue: Vec<UnitKind>,
    pub under_attack: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectileView {
    pub id: EntityId,
    pub kind: ProjectileKind,
    pub owner: Uuid,
    pub pos: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub name: String,
    pub team: Team,
    pub color: String,
    pub gold: f32,
    pub wood: f32,
    pub supply: u32,
    pub max_supply: u32,
    pub upgrades: Upgrades,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub units: Vec<UnitView>,
    pub buildings: Vec<BuildingView>,
    pub projectiles: Vec<ProjectileView>,
    pub players: BTreeMap<Uuid, PlayerView>,
    pub game_over: bool,
    pub winner: Option<Uuid>,
}

fn unit_view(u: &Unit) -> UnitView {
    UnitView {
        id: u.id.clone(),
        owner: u.owner,
        pos: u.pos,
        hp: u.hp,
        max_hp: u.max_hp,
        kind: u.kind,
        state: u.state,
        carrying: u.carrying,
        under_attack: u.under_attack,
    }
}

fn building_view(b: &Building) -> BuildingView {
    BuildingView {
        id: b.id.clone(),
        owner: b.owner,
        pos: b.pos,
        hp: b.hp,
        max_hp: b.max_hp,
        kind: b.kind,
        progress: b.progress,
        rally: b.rally,
        queue: b.queue.iter().map(|q| q.unit).collect(),
        under_attack: b.under_attack,
    }
}

fn projectile_view(p: &Projectile) -> ProjectileView {
    ProjectileView {
        id: p.id.clone(),
        kind: p.kind,
        owner: p.owner,
        pos: p.pos,
    }
}

fn assemble<FU, FB, FP>(state: &GameState, keep_unit: FU, keep_building: FB, keep_proj: FP) -> Snapshot
where
    FU: Fn(&Unit) -> bool,
    FB: Fn(&Building) -> bool,
    FP: Fn(&Projectile) -> bool,
{
    Snapshot {
        tick: state.tick,
        timestamp: Utc::now(),
        units: state
            .units
            .values()
            .filter(|u| keep_unit(u))
            .map(unit_view)
            .collect(),
        buildings: state
            .buildings
            .values()
            .filter(|b| keep_building(b))
            .map(building_view)
            .collect(),
        projectiles: state
            .projectiles
            .values()
            .filter(|p| keep_proj(p))
            .map(projectile_view)
            .collect(),
        players: state
            .players
            .iter()
            .map(|(id, p)| {
                (
                    *id,
                    PlayerView {
                        name: p.name.clone(),
                        team: p.team,
                        color: p.color.clone(),
                        gold: p.gold,
                        wood: p.wood,
                        supply: p.supply,
                        max_supply: p.max_supply,
                        upgrades: p.upgrades,
                    },
                )
            })
            .collect(),
        game_over: state.game_over,
        winner: state.winner,
    }
}

/// Full, unfiltered view.
pub fn build(state: &GameState) -> Snapshot {
    assemble(state, |_| true, |_| true, |_| true)
}

/// Fog-filtered view for one recipient.
pub fn build_for(state: &GameState, viewer: Uuid) -> Snapshot {
    let empty = std::collections::HashSet::new();
    let seen = state.discovered.get(&viewer).unwrap_or(&empty);
    let visible = |pos: Vec2| seen.contains(&state.map.tile_index(pos));
    assemble(
        state,
        |u| u.owner == viewer || visible(u.pos),
        |b| b.owner == viewer || visible(b.pos),
        |p| p.owner == viewer || visible(p.pos),
    )
}
