//! Canonical game state and the fixed-timestep advancement pipeline.
//!
//! One engine instance per room, owned by that room's session task; `tick()`
//! is a bounded synchronous transformation and never suspends. Entity maps
//! are `BTreeMap`s and every pass walks sorted ids, so the same inputs always
//! produce the same state.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::f32::consts::{FRAC_PI_2, FRAC_PI_4};

use uuid::Uuid;

use crate::config::settings;
use crate::game::ai;
use crate::game::combat;
use crate::game::grid::SpatialGrid;
use crate::game::map::{self, GameMap, MapError};
use crate::game::snapshot::{self, Snapshot};
use crate::game::types::*;
use crate::game::victory;

/// A unit stops once within this many pixels of its goal.
pub const ARRIVE_EPS: f32 = 5.0;
/// Pixel radius a resource node occupies (half a tile).
pub const NODE_RADIUS: f32 = 20.0;

#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    pub map: GameMap,
    pub players: BTreeMap<Uuid, Player>,
    pub units: BTreeMap<EntityId, Unit>,
    pub buildings: BTreeMap<EntityId, Building>,
    pub projectiles: BTreeMap<EntityId, Projectile>,
    pub nodes: BTreeMap<EntityId, ResourceNode>,
    /// Tiles each player has ever seen. Grows monotonically.
    pub discovered: BTreeMap<Uuid, HashSet<(u32, u32)>>,
    /// Players flagged as losers by surrender, grace expiry or anti-cheat.
    pub forfeited: BTreeSet<Uuid>,
    pub difficulty: Difficulty,
    pub single_player: bool,
    pub game_over: bool,
    pub winner: Option<Uuid>,
    pub end_reason: Option<String>,
    next_id: u64,
}

impl GameState {
    fn new(map: GameMap, difficulty: Difficulty) -> Self {
        Self {
            tick: 0,
            map,
            players: BTreeMap::new(),
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            nodes: BTreeMap::new(),
            discovered: BTreeMap::new(),
            forfeited: BTreeSet::new(),
            difficulty,
            single_player: false,
            game_over: false,
            winner: None,
            end_reason: None,
            next_id: 0,
        }
    }

    pub fn mint(&mut self, prefix: char) -> EntityId {
        self.next_id += 1;
        format!("{prefix}{}", self.next_id)
    }

    pub fn upgrades(&self, owner: Uuid) -> Upgrades {
        self.players
            .get(&owner)
            .map(|p| p.upgrades)
            .unwrap_or_default()
    }

    /// Position and collision radius of any live unit or building.
    pub fn target_shape(&self, id: &EntityId) -> Option<(Vec2, f32)> {
        self.units
            .get(id)
            .filter(|u| u.hp > 0.0)
            .map(|u| (u.pos, u.size / 2.0))
            .or_else(|| {
                self.buildings
                    .get(id)
                    .filter(|b| b.hp > 0.0)
                    .map(|b| (b.pos, b.size / 2.0))
            })
    }

    /// Nearest completed base or farm owned by `owner`, for deposits.
    pub fn depot_for(&self, owner: Uuid, from: Vec2) -> Option<EntityId> {
        let mut best: Option<(f32, &EntityId)> = None;
        for (id, b) in &self.buildings {
            if b.owner == owner
                && b.is_complete()
                && matches!(b.kind, BuildingKind::Base | BuildingKind::Farm)
            {
                let d = from.distance(b.pos);
                if best.map_or(true, |(bd, _)| d < bd) {
                    best = Some((d, id));
                }
            }
        }
        best.map(|(_, id)| id.clone())
    }

    pub fn has_completed_building(&self, owner: Uuid, kind: BuildingKind) -> bool {
        self.buildings
            .values()
            .any(|b| b.owner == owner && b.kind == kind && b.is_complete())
    }
}

/// One queued action with its cross-player ordering key.
#[derive(Debug, Clone)]
struct Pending {
    player: Uuid,
    action: Action,
    /// Arrival timestamp in milliseconds, as reported by the scheduler.
    arrival_ms: i64,
    seq: u64,
}

pub struct GameEngine {
    state: GameState,
    grid: SpatialGrid,
    pending: Vec<Pending>,
    seq: u64,
}

impl GameEngine {
    /// Build an engine over a freshly generated map.
    pub fn new(seed: u64, difficulty: Difficulty) -> Result<Self, MapError> {
        let cfg = settings();
        let (map, node_seeds) = map::generate(cfg.map_width, cfg.map_height, cfg.tile_size, seed)?;
        let mut state = GameState::new(map, difficulty);
        for seed in node_seeds {
            let id = state.mint('r');
            state.nodes.insert(
                id.clone(),
                ResourceNode {
                    id,
                    pos: seed.pos,
                    kind: seed.kind,
                    amount: seed.amount,
                    max_amount: seed.amount,
                },
            );
        }
        Ok(Self {
            state,
            grid: SpatialGrid::new(),
            pending: Vec::new(),
            seq: 0,
        })
    }

    /// Build an engine over a prepared map (scenario and test setups).
    pub fn with_map(map: GameMap, difficulty: Difficulty) -> Self {
        Self {
            state: GameState::new(map, difficulty),
            grid: SpatialGrid::new(),
            pending: Vec::new(),
            seq: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Direct state access for scenario setup and tooling.
    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn add_player(&mut self, id: Uuid, name: &str, team: Team, color: &str) {
        self.state
            .players
            .insert(id, Player::new(id, name.to_string(), team, color));
        self.state.discovered.entry(id).or_default();
    }

    /// Fill the guest slot with an AI opponent; the room becomes
    /// single-player for damage-multiplier purposes.
    pub fn add_ai(&mut self, id: Uuid) {
        self.add_player(id, "AI", Team::Ai, "red");
        self.state.single_player = true;
    }

    pub fn set_resources(&mut self, player: Uuid, gold: f32, wood: f32) {
        if let Some(p) = self.state.players.get_mut(&player) {
            p.gold = gold;
            p.wood = wood;
        }
    }

    /// Spawn starting bases and workers: host at the 15% corner, guest or
    /// AI at the 85% corner.
    pub fn initialize(&mut self) {
        let spawns = self.state.map.spawn_points();
        let players: Vec<(Uuid, Team)> =
            self.state.players.values().map(|p| (p.id, p.team)).collect();
        for (pid, team) in players {
            let spawn = if team == Team::Host {
                spawns[0]
            } else {
                spawns[1]
            };
            self.spawn_building(pid, BuildingKind::Base, spawn, true);
            for w in 0..3 {
                let offset = Vec2::new((w as f32 - 1.0) * 30.0, 80.0);
                self.spawn_unit(pid, UnitKind::Worker, spawn.add(offset));
            }
        }
        self.update_fog();
    }

    /// Spawn a unit and account for its supply.
    pub fn spawn_unit(&mut self, owner: Uuid, kind: UnitKind, pos: Vec2) -> EntityId {
        let id = self.spawn_unit_raw(owner, kind, pos);
        if let Some(p) = self.state.players.get_mut(&owner) {
            p.supply += kind.cost().supply;
        }
        id
    }

    /// Spawn without touching supply (production completion: the slot was
    /// reserved when the order was queued).
    fn spawn_unit_raw(&mut self, owner: Uuid, kind: UnitKind, pos: Vec2) -> EntityId {
        let id = self.state.mint('u');
        self.state
            .units
            .insert(id.clone(), Unit::new(id.clone(), owner, kind, pos));
        id
    }

    pub fn spawn_building(
        &mut self,
        owner: Uuid,
        kind: BuildingKind,
        pos: Vec2,
        completed: bool,
    ) -> EntityId {
        let id = self.state.mint('b');
        self.state
            .buildings
            .insert(id.clone(), Building::new(id.clone(), owner, kind, pos, completed));
        id
    }

    pub fn spawn_node(&mut self, kind: ResourceKind, pos: Vec2, amount: f32) -> EntityId {
        let id = self.state.mint('r');
        self.state.nodes.insert(
            id.clone(),
            ResourceNode {
                id: id.clone(),
                pos,
                kind,
                amount,
                max_amount: amount,
            },
        );
        id
    }

    /// Queue a validated action; it is applied at the next tick boundary.
    pub fn submit(&mut self, player: Uuid, action: Action) {
        self.submit_at(player, action, self.seq as i64);
    }

    /// Queue with an explicit arrival timestamp (milliseconds). Cross-player
    /// ordering is `(arrival, player id)`; per-player order is preserved.
    pub fn submit_at(&mut self, player: Uuid, action: Action, arrival_ms: i64) {
        self.seq += 1;
        self.pending.push(Pending {
            player,
            action,
            arrival_ms,
            seq: self.seq,
        });
    }

    /// Mark a player as defeated (surrender, grace expiry, anti-cheat).
    pub fn forfeit(&mut self, player: Uuid) {
        self.state.forfeited.insert(player);
    }

    pub fn snapshot(&self) -> Snapshot {
        snapshot::build(&self.state)
    }

    pub fn snapshot_for(&self, viewer: Uuid) -> Snapshot {
        snapshot::build_for(&self.state, viewer)
    }

    // ---------- tick pipeline ----------

    /// Advance one simulation step. Order is fixed: inputs, projectiles,
    /// buildings, units, cleanup, economy, fog, win check.
    pub fn tick(&mut self) {
        if self.state.game_over {
            return;
        }

        if self.state.tick % ai::PLAN_INTERVAL == 0 {
            for (player, action) in ai::plan(&self.state) {
                self.submit(player, action);
            }
        }

        self.drain_actions();
        self.rebuild_grid();
        combat::step_projectiles(&mut self.state, &self.grid);
        self.step_buildings();
        self.step_units();
        self.cleanup();
        self.economy();
        self.update_fog();

        if let Some(outcome) = victory::evaluate(&self.state) {
            self.state.game_over = true;
            self.state.winner = outcome.winner;
            self.state.end_reason = Some(outcome.reason);
        }
        self.state.tick += 1;
    }

    fn drain_actions(&mut self) {
        let mut queued = std::mem::take(&mut self.pending);
        queued.sort_by(|a, b| {
            (a.arrival_ms, a.player, a.seq).cmp(&(b.arrival_ms, b.player, b.seq))
        });
        for pending in queued {
            self.apply_action(pending.player, pending.action);
        }
    }

    fn rebuild_grid(&mut self) {
        self.grid.clear();
        for (id, u) in &self.state.units {
            self.grid.insert(id, u.pos);
        }
        for (id, b) in &self.state.buildings {
            self.grid.insert(id, b.pos);
        }
    }

    // ---------- actions ----------

    /// Apply one already-validated action. Entities are re-resolved here;
    /// anything that died since validation makes the action a no-op.
    fn apply_action(&mut self, player: Uuid, action: Action) {
        match action {
            Action::Move {
                unit_id,
                target,
                queue,
            } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    if queue && u.target_pos.is_some() {
                        u.waypoints.push_back(target);
                    } else {
                        u.state = CommandState::Moving;
                        u.target_pos = Some(target);
                        u.target_id = None;
                        u.attack_ground = None;
                        u.patrol_anchor = None;
                        if !queue {
                            u.waypoints.clear();
                        }
                    }
                }
            }
            Action::Attack { unit_id, target_id } => {
                if self.state.target_shape(&target_id).is_none() {
                    return;
                }
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    u.state = CommandState::Attacking;
                    u.target_id = Some(target_id);
                    u.target_pos = None;
                    u.attack_ground = None;
                    u.patrol_anchor = None;
                }
            }
            Action::AttackMove { unit_id, target } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    u.state = CommandState::AttackMove;
                    u.target_pos = Some(target);
                    u.target_id = None;
                    u.attack_ground = None;
                    u.patrol_anchor = None;
                }
            }
            Action::AttackGround { unit_id, target } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    if u.kind == UnitKind::Catapult {
                        u.state = CommandState::Attacking;
                        u.attack_ground = Some(target);
                        u.target_id = None;
                        u.target_pos = None;
                    }
                }
            }
            Action::Patrol { unit_id, target } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    u.patrol_anchor = Some(u.pos);
                    u.target_pos = Some(target);
                    u.target_id = None;
                    u.state = CommandState::Patrol;
                }
            }
            Action::HoldPosition { unit_id } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    u.state = CommandState::HoldPosition;
                    u.target_id = None;
                    u.target_pos = None;
                    u.waypoints.clear();
                }
            }
            Action::Stop { unit_id } => {
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    u.state = CommandState::Idle;
                    u.target_id = None;
                    u.target_pos = None;
                    u.attack_ground = None;
                    u.patrol_anchor = None;
                    u.waypoints.clear();
                }
            }
            Action::Gather { unit_id, node_id } => {
                if !self.state.nodes.contains_key(&node_id) {
                    return;
                }
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    if u.kind == UnitKind::Worker {
                        u.state = CommandState::Gathering;
                        u.gather_node = Some(node_id);
                        u.target_id = None;
                        u.target_pos = None;
                    }
                }
            }
            Action::Repair {
                unit_id,
                building_id,
            } => {
                if !self.state.buildings.contains_key(&building_id) {
                    return;
                }
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    if u.kind == UnitKind::Worker {
                        u.state = CommandState::Building;
                        u.target_id = Some(building_id);
                        u.target_pos = None;
                    }
                }
            }
            Action::Heal { unit_id, target_id } => {
                if !self.state.units.contains_key(&target_id) {
                    return;
                }
                if let Some(u) = self.owned_unit_mut(player, &unit_id) {
                    if u.kind == UnitKind::Healer {
                        u.state = CommandState::Healing;
                        u.target_id = Some(target_id);
                        u.target_pos = None;
                    }
                }
            }
            Action::Build {
                unit_id,
                building,
                position,
            } => self.apply_build(player, unit_id, building, position),
            Action::Produce { building_id, unit } => self.apply_produce(player, building_id, unit),
            Action::CancelProduce { building_id, index } => {
                let Some(b) = self.state.buildings.get_mut(&building_id) else {
                    return;
                };
                if b.owner != player || index >= b.queue.len() {
                    return;
                }
                let removed = b.queue.remove(index);
                // No resource refund; only the supply reservation is released.
                if let (Some(item), Some(p)) = (removed, self.state.players.get_mut(&player)) {
                    p.supply = p.supply.saturating_sub(item.unit.cost().supply);
                }
            }
            Action::SetRally { building_id, target } => {
                if let Some(b) = self.state.buildings.get_mut(&building_id) {
                    if b.owner == player {
                        b.rally = Some(target);
                    }
                }
            }
            Action::Upgrade { upgrade } => {
                let Some(p) = self.state.players.get_mut(&player) else {
                    return;
                };
                let next = match upgrade {
                    UpgradeKind::Attack => p.upgrades.attack + 1,
                    UpgradeKind::Defense => p.upgrades.defense + 1,
                    UpgradeKind::Range => p.upgrades.range + 1,
                };
                let (gold, wood) = upgrade_cost(next);
                if p.gold < gold || p.wood < wood {
                    return;
                }
                p.gold -= gold;
                p.wood -= wood;
                match upgrade {
                    UpgradeKind::Attack => p.upgrades.attack = next,
                    UpgradeKind::Defense => p.upgrades.defense = next,
                    UpgradeKind::Range => p.upgrades.range = next,
                }
            }
            Action::Surrender {} => {
                self.state.forfeited.insert(player);
            }
        }
    }

    fn apply_build(&mut self, player: Uuid, unit_id: EntityId, kind: BuildingKind, pos: Vec2) {
        let stats = kind.stats();
        {
            let Some(p) = self.state.players.get_mut(&player) else {
                return;
            };
            if p.gold < stats.gold || p.wood < stats.wood {
                return;
            }
            p.gold -= stats.gold;
            p.wood -= stats.wood;
        }
        let bid = self.spawn_building(player, kind, pos, false);
        if let Some(u) = self.owned_unit_mut(player, &unit_id) {
            if u.kind == UnitKind::Worker {
                u.state = CommandState::Building;
                u.target_id = Some(bid);
                u.target_pos = None;
            }
        }
    }

    fn apply_produce(&mut self, player: Uuid, building_id: EntityId, unit: UnitKind) {
        let cost = unit.cost();
        let ok = {
            let Some(b) = self.state.buildings.get(&building_id) else {
                return;
            };
            b.owner == player && b.is_complete() && b.kind.produces().contains(&unit)
        };
        if !ok {
            return;
        }
        let Some(p) = self.state.players.get_mut(&player) else {
            return;
        };
        if p.gold < cost.gold || p.wood < cost.wood || p.supply + cost.supply > p.max_supply {
            return;
        }
        // Cost and supply are reserved up-front.
        p.gold -= cost.gold;
        p.wood -= cost.wood;
        p.supply += cost.supply;
        if let Some(b) = self.state.buildings.get_mut(&building_id) {
            b.queue.push_back(QueueItem { unit, elapsed: 0 });
        }
    }

    fn owned_unit_mut(&mut self, player: Uuid, id: &EntityId) -> Option<&mut Unit> {
        self.state
            .units
            .get_mut(id)
            .filter(|u| u.owner == player && u.hp > 0.0)
    }

    // ---------- buildings ----------

    fn step_buildings(&mut self) {
        let ids: Vec<EntityId> = self.state.buildings.keys().cloned().collect();
        for id in ids {
            let Some(existing) = self.state.buildings.get(&id) else {
                continue;
            };
            if existing.hp <= 0.0 {
                continue;
            }
            let mut b = existing.clone();

            b.cooldown_left = b.cooldown_left.saturating_sub(1);
            if b.under_attack && self.state.tick.saturating_sub(b.last_hit_tick) > UNDER_ATTACK_TICKS
            {
                b.under_attack = false;
            }

            if !b.is_complete() {
                let per_tick = 100.0 / (b.kind.stats().build_time * 60.0);
                b.progress = (b.progress + per_tick).min(100.0);
                b.hp = (b.hp + b.max_hp * 0.9 * per_tick / 100.0).min(b.max_hp);
            } else {
                self.step_production(&mut b);
                if b.kind == BuildingKind::Tower {
                    self.step_tower(&mut b);
                }
            }

            self.state.buildings.insert(id, b);
        }
    }

    fn step_production(&mut self, b: &mut Building) {
        let Some(front) = b.queue.front_mut() else {
            return;
        };
        front.elapsed += 1;
        let need = (front.unit.cost().build_time * 60.0) as u32;
        if front.elapsed < need {
            return;
        }
        let kind = front.unit;
        b.queue.pop_front();

        // Spawn at the building edge facing the rally point (fallback: below).
        let dir = b
            .rally
            .map(|r| r.sub(b.pos).normalized())
            .filter(|d| d.length() > 0.5)
            .unwrap_or(Vec2::new(0.0, 1.0));
        let offset = b.size / 2.0 + kind.stats().size / 2.0 + 4.0;
        let spawn = b.pos.add(dir.scale(offset));
        let uid = self.spawn_unit_raw(b.owner, kind, spawn);
        if let Some(rally) = b.rally {
            if let Some(u) = self.state.units.get_mut(&uid) {
                u.state = CommandState::Moving;
                u.target_pos = Some(rally);
            }
        }
    }

    fn step_tower(&mut self, b: &mut Building) {
        if b.cooldown_left > 0 {
            return;
        }
        let range = TOWER_RANGE + 10.0 * f32::from(self.state.upgrades(b.owner).range);
        let mut best: Option<(f32, EntityId)> = None;
        for id in self.grid.query_radius(b.pos, range) {
            if let Some(u) = self.state.units.get(&id) {
                if u.owner != b.owner && u.hp > 0.0 {
                    let d = b.pos.distance(u.pos);
                    if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                        best = Some((d, id));
                    }
                }
            }
        }
        let Some((_, target)) = best else { return };
        let launch =
            combat::launch_damage(TOWER_DAMAGE, self.state.upgrades(b.owner).attack, true);
        let target_pos = self.state.units.get(&target).map(|u| u.pos).unwrap_or(b.pos);
        self.spawn_projectile(
            ProjectileKind::Arrow,
            b.owner,
            b.pos,
            Some(target),
            target_pos,
            launch,
            0.0,
        );
        b.cooldown_left = TOWER_COOLDOWN;
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_projectile(
        &mut self,
        kind: ProjectileKind,
        owner: Uuid,
        from: Vec2,
        target_id: Option<EntityId>,
        target_pos: Vec2,
        damage: f32,
        splash: f32,
    ) {
        let id = self.state.mint('p');
        self.state.projectiles.insert(
            id.clone(),
            Projectile {
                id,
                kind,
                owner,
                pos: from,
                target_id,
                target_pos,
                speed: kind.speed(),
                damage,
                splash,
                spawn_tick: self.state.tick,
            },
        );
    }

    // ---------- units ----------

    fn step_units(&mut self) {
        let ids: Vec<EntityId> = self.state.units.keys().cloned().collect();
        for id in ids {
            let Some(existing) = self.state.units.get(&id) else {
                continue;
            };
            if existing.hp <= 0.0 {
                continue;
            }
            let mut u = existing.clone();

            u.cooldown_left = u.cooldown_left.saturating_sub(1);
            if u.under_attack && self.state.tick.saturating_sub(u.last_hit_tick) > UNDER_ATTACK_TICKS
            {
                u.under_attack = false;
            }

            match u.state {
                CommandState::Idle => self.step_idle(&mut u),
                CommandState::Moving => self.step_moving(&mut u),
                CommandState::Attacking => self.step_attacking(&mut u),
                CommandState::AttackMove => self.step_attack_move(&mut u),
                CommandState::Patrol => self.step_patrol(&mut u),
                CommandState::HoldPosition => self.step_hold(&mut u),
                CommandState::Gathering => self.step_gathering(&mut u),
                CommandState::Returning => self.step_returning(&mut u),
                CommandState::Building => self.step_worker_build(&mut u),
                CommandState::Healing => self.step_healing(&mut u),
            }

            self.state.units.insert(id, u);
        }
    }

    fn acquisition_radius(&self, u: &Unit) -> f32 {
        1.5 * u.attack_range + 10.0 * f32::from(self.state.upgrades(u.owner).range)
    }

    /// Nearest hostile unit inside `radius`, ties broken by id order.
    fn acquire(&self, u: &Unit, radius: f32) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for id in self.grid.query_radius(u.pos, radius) {
            if id == u.id {
                continue;
            }
            if let Some(o) = self.state.units.get(&id) {
                if o.owner != u.owner && o.hp > 0.0 {
                    let d = u.pos.distance(o.pos);
                    if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                        best = Some((d, id));
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Nearest injured friendly unit inside `radius` (healer scan).
    fn acquire_injured_ally(&self, u: &Unit, radius: f32) -> Option<EntityId> {
        let mut best: Option<(f32, EntityId)> = None;
        for id in self.grid.query_radius(u.pos, radius) {
            if id == u.id {
                continue;
            }
            if let Some(o) = self.state.units.get(&id) {
                if o.owner == u.owner && o.hp > 0.0 && o.hp < o.max_hp {
                    let d = u.pos.distance(o.pos);
                    if best.as_ref().map_or(true, |(bd, _)| d < *bd) {
                        best = Some((d, id));
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    fn step_idle(&mut self, u: &mut Unit) {
        if u.kind == UnitKind::Healer {
            if let Some(t) = self.acquire_injured_ally(u, u.attack_range) {
                u.state = CommandState::Healing;
                u.target_id = Some(t);
            }
            return;
        }
        if u.kind.is_combatant() {
            if let Some(t) = self.acquire(u, self.acquisition_radius(u)) {
                u.state = CommandState::Attacking;
                u.target_id = Some(t);
            }
        }
    }

    fn next_waypoint(&mut self, u: &mut Unit) {
        if let Some(wp) = u.waypoints.pop_front() {
            u.state = CommandState::Moving;
            u.target_pos = Some(wp);
        } else {
            u.state = CommandState::Idle;
            u.target_pos = None;
        }
    }

    fn step_moving(&mut self, u: &mut Unit) {
        let Some(target) = u.target_pos else {
            self.next_waypoint(u);
            return;
        };
        if u.pos.distance(target) <= ARRIVE_EPS {
            u.target_pos = None;
            self.next_waypoint(u);
        } else {
            self.move_toward(u, target);
        }
    }

    fn step_attack_move(&mut self, u: &mut Unit) {
        if u.kind.is_combatant() {
            if let Some(t) = self.acquire(u, self.acquisition_radius(u)) {
                u.state = CommandState::Attacking;
                u.target_id = Some(t);
                return;
            }
        }
        let Some(target) = u.target_pos else {
            u.state = CommandState::Idle;
            return;
        };
        if u.pos.distance(target) <= ARRIVE_EPS {
            u.target_pos = None;
            self.next_waypoint(u);
        } else {
            self.move_toward(u, target);
        }
    }

    fn step_patrol(&mut self, u: &mut Unit) {
        if u.kind.is_combatant() {
            if let Some(t) = self.acquire(u, self.acquisition_radius(u)) {
                u.state = CommandState::Attacking;
                u.target_id = Some(t);
                return;
            }
        }
        let (Some(target), Some(anchor)) = (u.target_pos, u.patrol_anchor) else {
            u.state = CommandState::Idle;
            return;
        };
        if u.pos.distance(target) <= ARRIVE_EPS {
            u.target_pos = Some(anchor);
            u.patrol_anchor = Some(target);
        } else {
            self.move_toward(u, target);
        }
    }

    fn step_hold(&mut self, u: &mut Unit) {
        if !u.kind.is_combatant() && u.kind != UnitKind::Worker {
            return;
        }
        if let Some(t) = self.acquire(u, u.attack_range + u.size) {
            if let Some((tpos, tradius)) = self.state.target_shape(&t) {
                if u.pos.distance(tpos) <= u.attack_range + u.size / 2.0 + tradius {
                    self.fire_at(u, &t, tpos);
                }
            }
        }
    }

    fn step_attacking(&mut self, u: &mut Unit) {
        // Catapult shelling a ground point.
        if let Some(point) = u.attack_ground {
            if u.kind != UnitKind::Catapult {
                u.attack_ground = None;
                u.state = CommandState::Idle;
                return;
            }
            if u.pos.distance(point) <= u.attack_range {
                if u.cooldown_left == 0 {
                    let launch = combat::launch_damage(
                        u.attack_damage,
                        self.state.upgrades(u.owner).attack,
                        false,
                    );
                    self.spawn_projectile(
                        ProjectileKind::Boulder,
                        u.owner,
                        u.pos,
                        None,
                        point,
                        launch,
                        BOULDER_SPLASH,
                    );
                    u.cooldown_left = u.cooldown;
                }
            } else {
                self.move_toward(u, point);
            }
            return;
        }

        let Some(target) = u.target_id.clone() else {
            self.after_target_gone(u);
            return;
        };
        let Some((tpos, tradius)) = self.state.target_shape(&target) else {
            self.after_target_gone(u);
            return;
        };

        let reach = u.attack_range + u.size / 2.0 + tradius;
        if u.pos.distance(tpos) <= reach {
            self.fire_at(u, &target, tpos);
        } else {
            self.move_toward(u, tpos);
        }
    }

    fn fire_at(&mut self, u: &mut Unit, target: &EntityId, tpos: Vec2) {
        if u.cooldown_left > 0 {
            return;
        }
        let launch =
            combat::launch_damage(u.attack_damage, self.state.upgrades(u.owner).attack, false);
        match u.kind.projectile() {
            Some(ProjectileKind::Heal) => {
                self.spawn_projectile(
                    ProjectileKind::Heal,
                    u.owner,
                    u.pos,
                    Some(target.clone()),
                    tpos,
                    u.attack_damage,
                    0.0,
                );
            }
            Some(kind) => {
                let splash = if kind == ProjectileKind::Boulder {
                    BOULDER_SPLASH
                } else {
                    0.0
                };
                self.spawn_projectile(kind, u.owner, u.pos, Some(target.clone()), tpos, launch, splash);
            }
            None => combat::apply_damage(&mut self.state, target, launch, u.owner, false),
        }
        u.cooldown_left = u.cooldown;
    }

    fn after_target_gone(&mut self, u: &mut Unit) {
        u.target_id = None;
        if u.patrol_anchor.is_some() && u.target_pos.is_some() {
            u.state = CommandState::Patrol;
        } else if u.target_pos.is_some() {
            u.state = CommandState::AttackMove;
        } else {
            self.next_waypoint(u);
        }
    }

    fn step_gathering(&mut self, u: &mut Unit) {
        let Some(node_id) = u.gather_node.clone() else {
            u.state = CommandState::Idle;
            return;
        };
        let node = match self.state.nodes.get(&node_id) {
            Some(n) if n.amount > 0.0 => n.clone(),
            _ => {
                // Node ran dry. Deposit leftovers or go idle.
                u.gather_node = None;
                u.state = if u.carrying.is_some() {
                    CommandState::Returning
                } else {
                    CommandState::Idle
                };
                return;
            }
        };

        // Mixed cargo is deposited before switching resource kinds.
        if let Some((kind, amount)) = u.carrying {
            if kind != node.kind && amount > 0.0 {
                u.state = CommandState::Returning;
                return;
            }
        }

        let reach = NODE_RADIUS + u.size / 2.0 + 4.0;
        if u.pos.distance(node.pos) > reach {
            self.move_toward(u, node.pos);
            return;
        }

        let carried = u.carrying.map(|(_, a)| a).unwrap_or(0.0);
        let take = GATHER_RATE.min(node.amount).min(CARRY_CAP - carried);
        if let Some(n) = self.state.nodes.get_mut(&node_id) {
            n.amount -= take;
        }
        u.carrying = Some((node.kind, carried + take));
        if carried + take >= CARRY_CAP {
            u.state = CommandState::Returning;
        }
    }

    fn step_returning(&mut self, u: &mut Unit) {
        let Some((kind, amount)) = u.carrying else {
            u.state = CommandState::Idle;
            return;
        };
        let Some(depot_id) = self.state.depot_for(u.owner, u.pos) else {
            u.state = CommandState::Idle;
            return;
        };
        let Some(depot) = self.state.buildings.get(&depot_id) else {
            u.state = CommandState::Idle;
            return;
        };
        let reach = depot.size / 2.0 + u.size / 2.0 + 10.0;
        let depot_pos = depot.pos;
        if u.pos.distance(depot_pos) > reach {
            self.move_toward(u, depot_pos);
            return;
        }

        if let Some(p) = self.state.players.get_mut(&u.owner) {
            match kind {
                ResourceKind::Gold => p.gold += amount,
                ResourceKind::Wood => p.wood += amount,
            }
        }
        u.carrying = None;

        // Remember the node until it is empty, then idle.
        let node_live = u
            .gather_node
            .as_ref()
            .and_then(|id| self.state.nodes.get(id))
            .map(|n| n.amount > 0.0)
            .unwrap_or(false);
        if node_live {
            u.state = CommandState::Gathering;
        } else {
            u.gather_node = None;
            u.state = CommandState::Idle;
        }
    }

    fn step_worker_build(&mut self, u: &mut Unit) {
        let Some(bid) = u.target_id.clone() else {
            u.state = CommandState::Idle;
            return;
        };
        let Some(b) = self.state.buildings.get(&bid) else {
            u.target_id = None;
            u.state = CommandState::Idle;
            return;
        };
        let (bpos, bsize, complete, hp, max_hp) =
            (b.pos, b.size, b.is_complete(), b.hp, b.max_hp);
        if complete && hp >= max_hp {
            u.target_id = None;
            u.state = CommandState::Idle;
            return;
        }
        let reach = bsize / 2.0 + u.size / 2.0 + 10.0;
        if u.pos.distance(bpos) > reach {
            self.move_toward(u, bpos);
            return;
        }
        if let Some(b) = self.state.buildings.get_mut(&bid) {
            b.hp = (b.hp + REPAIR_RATE).min(b.max_hp);
        }
    }

    fn step_healing(&mut self, u: &mut Unit) {
        let Some(target) = u.target_id.clone() else {
            u.state = CommandState::Idle;
            return;
        };
        let healthy = self
            .state
            .units
            .get(&target)
            .map(|t| t.hp <= 0.0 || t.hp >= t.max_hp || t.owner != u.owner)
            .unwrap_or(true);
        if healthy {
            u.target_id = None;
            u.state = CommandState::Idle;
            return;
        }
        let Some((tpos, tradius)) = self.state.target_shape(&target) else {
            u.target_id = None;
            u.state = CommandState::Idle;
            return;
        };
        if u.pos.distance(tpos) <= u.attack_range + u.size / 2.0 + tradius {
            self.fire_at(u, &target, tpos);
        } else {
            self.move_toward(u, tpos);
        }
    }

    // ---------- movement ----------

    /// Repulsion accumulated from nearby entities and building edges. A
    /// building the unit is actually heading for exerts no push, otherwise
    /// deposits, repairs and melee on structures could never close in.
    fn steering(&self, u: &Unit, goal: Vec2) -> Vec2 {
        let mut push = Vec2::default();
        for id in self.grid.query_radius(u.pos, 50.0) {
            if id == u.id {
                continue;
            }
            if let Some(o) = self.state.units.get(&id) {
                let d = u.pos.distance(o.pos);
                if d > 1e-3 && d < 50.0 {
                    push = push.add(u.pos.sub(o.pos).scale(0.5 / d));
                }
            }
        }
        for b in self.state.buildings.values() {
            if goal.distance(b.pos) <= b.size / 2.0 + 40.0 {
                continue;
            }
            let d = u.pos.distance(b.pos);
            if d > 1e-3 && d - b.size / 2.0 < 30.0 {
                push = push.add(u.pos.sub(b.pos).scale(1.5 / d));
            }
        }
        push
    }

    fn step_blocked(&self, u: &Unit, candidate: Vec2) -> bool {
        if !self.state.map.is_passable(candidate) {
            return true;
        }
        // Incomplete footprints are solid; finished buildings are not.
        for b in self.state.buildings.values() {
            if b.is_complete() {
                continue;
            }
            let half = (b.size + u.size) / 2.0;
            if (candidate.x - b.pos.x).abs() < half && (candidate.y - b.pos.y).abs() < half {
                return true;
            }
        }
        false
    }

    /// Advance toward `target`, steering around neighbors. Alternate
    /// headings at ±π/4 and π/2 are tried before the unit stalls a tick.
    fn move_toward(&mut self, u: &mut Unit, target: Vec2) {
        let dist = u.pos.distance(target);
        if dist < 1e-3 {
            return;
        }
        let speed = u.speed.min(dist);
        let dir = target.sub(u.pos).normalized();
        let heading = dir.add(self.steering(u, target)).normalized();
        for angle in [0.0, FRAC_PI_4, -FRAC_PI_4, FRAC_PI_2] {
            let candidate = u.pos.add(heading.rotated(angle).scale(speed));
            if !self.step_blocked(u, candidate) {
                u.pos = candidate;
                return;
            }
        }
        // All headings blocked; stall this tick.
    }

    // ---------- cleanup, economy, fog ----------

    fn cleanup(&mut self) {
        let dead_units: Vec<EntityId> = self
            .state
            .units
            .iter()
            .filter(|(_, u)| u.hp <= 0.0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in dead_units {
            if let Some(u) = self.state.units.remove(&id) {
                if let Some(p) = self.state.players.get_mut(&u.owner) {
                    p.supply = p.supply.saturating_sub(u.kind.cost().supply);
                }
            }
        }

        self.state.buildings.retain(|_, b| b.hp > 0.0);
        self.state.nodes.retain(|_, n| n.amount > 0.0);

        // Supply caps follow the surviving buildings.
        let players: Vec<Uuid> = self.state.players.keys().cloned().collect();
        for pid in players {
            let farms = self
                .state
                .buildings
                .values()
                .filter(|b| b.owner == pid && b.kind == BuildingKind::Farm && b.is_complete())
                .count() as u32;
            let bases = self
                .state
                .buildings
                .values()
                .filter(|b| b.owner == pid && b.kind == BuildingKind::Base && b.is_complete())
                .count() as u32;
            if let Some(p) = self.state.players.get_mut(&pid) {
                p.max_supply = 10 + 8 * farms + 10 * bases.saturating_sub(1);
            }
        }
    }

    fn economy(&mut self) {
        let mult = self.state.difficulty.multiplier();
        for p in self.state.players.values_mut() {
            if p.is_ai() {
                p.gold += 0.5 * mult;
            }
        }
    }

    fn update_fog(&mut self) {
        let vision = settings().vision_range;
        let tile = self.state.map.tile_size;
        let span = (vision / tile).ceil() as i64;
        let (w, h) = (self.state.map.width as i64, self.state.map.height as i64);

        let mut sights: Vec<(Uuid, Vec2)> = Vec::new();
        for u in self.state.units.values() {
            sights.push((u.owner, u.pos));
        }
        for b in self.state.buildings.values() {
            sights.push((b.owner, b.pos));
        }

        for (owner, pos) in sights {
            let (cx, cy) = self.state.map.tile_index(pos);
            let seen = self.state.discovered.entry(owner).or_default();
            for dy in -span..=span {
                for dx in -span..=span {
                    let (tx, ty) = (cx as i64 + dx, cy as i64 + dy);
                    if tx < 0 || ty < 0 || tx >= w || ty >= h {
                        continue;
                    }
                    let center = self.state.map.tile_center(tx as u32, ty as u32);
                    if center.distance(pos) <= vision {
                        seen.insert((tx as u32, ty as u32));
                    }
                }
            }
        }
    }
}
