//! Entities, stat tables and actions shared by the whole simulation.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Opaque entity handle, unique within a room ("u12", "b3", "p7", "r41").
///
/// Handles are minted from a per-room counter so that identical seeds and
/// scripted inputs reproduce identical ids.
pub type EntityId = String;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit-length copy, or zero when too short to normalize.
    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len < 1e-6 {
            Vec2::default()
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    pub fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    pub fn sub(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn scale(self, f: f32) -> Vec2 {
        Vec2::new(self.x * f, self.y * f)
    }

    /// Rotate counter-clockwise by `angle` radians.
    pub fn rotated(self, angle: f32) -> Vec2 {
        let (sin, cos) = angle.sin_cos();
        Vec2::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Host,
    Guest,
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    /// Scales the AI income trickle and AI projectile damage.
    pub fn multiplier(self) -> f32 {
        match self {
            Difficulty::Easy => 0.7,
            Difficulty::Normal => 1.0,
            Difficulty::Hard => 1.3,
        }
    }
}

/// Research levels. Attack/defense cap at 3, range at 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Upgrades {
    pub attack: u8,
    pub defense: u8,
    pub range: u8,
}

pub const ATTACK_CAP: u8 = 3;
pub const DEFENSE_CAP: u8 = 3;
pub const RANGE_CAP: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpgradeKind {
    Attack,
    Defense,
    Range,
}

/// Gold/wood price of the next research level (`next` is 1-based).
pub fn upgrade_cost(next: u8) -> (f32, f32) {
    (100.0 * f32::from(next), 50.0 * f32::from(next))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub name: String,
    pub team: Team,
    pub color: String,
    pub gold: f32,
    pub wood: f32,
    pub supply: u32,
    pub max_supply: u32,
    pub upgrades: Upgrades,
    pub ready: bool,
}

impl Player {
    pub fn new(id: Uuid, name: String, team: Team, color: &str) -> Self {
        Self {
            id,
            name,
            team,
            color: color.to_string(),
            gold: 200.0,
            wood: 100.0,
            supply: 0,
            max_supply: 10,
            upgrades: Upgrades::default(),
            ready: false,
        }
    }

    pub fn is_ai(&self) -> bool {
        self.team == Team::Ai
    }
}

// ---------- units ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Worker,
    Soldier,
    Archer,
    Healer,
    Catapult,
}

#[derive(Debug, Clone, Copy)]
pub struct UnitStats {
    pub hp: f32,
    pub speed: f32,
    pub range: f32,
    pub damage: f32,
    pub cooldown: u32,
    pub armor: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct UnitCost {
    pub gold: f32,
    pub wood: f32,
    pub supply: u32,
    /// Production time in seconds.
    pub build_time: f32,
}

impl UnitKind {
    pub fn stats(self) -> UnitStats {
        match self {
            UnitKind::Worker => UnitStats {
                hp: 50.0,
                speed: 2.0,
                range: 12.0,
                damage: 3.0,
                cooldown: 60,
                armor: 0.0,
                size: 16.0,
            },
            UnitKind::Soldier => UnitStats {
                hp: 80.0,
                speed: 1.8,
                range: 15.0,
                damage: 10.0,
                cooldown: 60,
                armor: 0.0,
                size: 18.0,
            },
            UnitKind::Archer => UnitStats {
                hp: 50.0,
                speed: 1.9,
                range: 120.0,
                damage: 8.0,
                cooldown: 70,
                armor: 0.0,
                size: 16.0,
            },
            UnitKind::Healer => UnitStats {
                hp: 45.0,
                speed: 1.7,
                range: 100.0,
                damage: 6.0, // heal amount per projectile
                cooldown: 80,
                armor: 0.0,
                size: 16.0,
            },
            UnitKind::Catapult => UnitStats {
                hp: 120.0,
                speed: 1.0,
                range: 200.0,
                damage: 30.0,
                cooldown: 180,
                armor: 0.0,
                size: 26.0,
            },
        }
    }

    pub fn cost(self) -> UnitCost {
        match self {
            UnitKind::Worker => UnitCost {
                gold: 50.0,
                wood: 0.0,
                supply: 1,
                build_time: 4.0,
            },
            UnitKind::Soldier => UnitCost {
                gold: 80.0,
                wood: 20.0,
                supply: 2,
                build_time: 8.0,
            },
            UnitKind::Archer => UnitCost {
                gold: 60.0,
                wood: 40.0,
                supply: 2,
                build_time: 8.0,
            },
            UnitKind::Healer => UnitCost {
                gold: 70.0,
                wood: 50.0,
                supply: 2,
                build_time: 10.0,
            },
            UnitKind::Catapult => UnitCost {
                gold: 150.0,
                wood: 150.0,
                supply: 4,
                build_time: 20.0,
            },
        }
    }

    pub fn is_combatant(self) -> bool {
        matches!(
            self,
            UnitKind::Soldier | UnitKind::Archer | UnitKind::Catapult
        )
    }

    /// Ranged attacks spawn a projectile; melee damage lands instantly.
    pub fn projectile(self) -> Option<ProjectileKind> {
        match self {
            UnitKind::Archer => Some(ProjectileKind::Arrow),
            UnitKind::Catapult => Some(ProjectileKind::Boulder),
            UnitKind::Healer => Some(ProjectileKind::Heal),
            _ => None,
        }
    }
}

/// Worker carry capacity before it must deposit.
pub const CARRY_CAP: f32 = 10.0;
/// Resource units extracted per tick while gathering.
pub const GATHER_RATE: f32 = 0.5;
/// Hit points a worker restores per tick while repairing.
pub const REPAIR_RATE: f32 = 0.5;
/// Ticks after the last hit before the under-attack flag clears.
pub const UNDER_ATTACK_TICKS: u64 = 120;
/// Splash damage of a catapult boulder reaches this far from impact.
pub const BOULDER_SPLASH: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandState {
    Idle,
    Moving,
    Attacking,
    AttackMove,
    Patrol,
    HoldPosition,
    Gathering,
    Returning,
    Building,
    Healing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: EntityId,
    pub owner: Uuid,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub size: f32,
    pub kind: UnitKind,
    pub state: CommandState,
    pub target_id: Option<EntityId>,
    pub target_pos: Option<Vec2>,
    pub waypoints: VecDeque<Vec2>,
    pub attack_range: f32,
    pub attack_damage: f32,
    pub cooldown: u32,
    pub cooldown_left: u32,
    pub speed: f32,
    pub armor: f32,
    /// Worker cargo: what is carried and how much.
    pub carrying: Option<(ResourceKind, f32)>,
    /// Node a worker keeps harvesting until it runs dry.
    pub gather_node: Option<EntityId>,
    /// Catapult ground-attack point.
    pub attack_ground: Option<Vec2>,
    /// Patrol leg origin; swapped with `target_pos` at each end.
    pub patrol_anchor: Option<Vec2>,
    pub under_attack: bool,
    pub last_hit_tick: u64,
}

impl Unit {
    pub fn new(id: EntityId, owner: Uuid, kind: UnitKind, pos: Vec2) -> Self {
        let stats = kind.stats();
        Self {
            id,
            owner,
            pos,
            hp: stats.hp,
            max_hp: stats.hp,
            size: stats.size,
            kind,
            state: CommandState::Idle,
            target_id: None,
            target_pos: None,
            waypoints: VecDeque::new(),
            attack_range: stats.range,
            attack_damage: stats.damage,
            cooldown: stats.cooldown,
            cooldown_left: 0,
            speed: stats.speed,
            armor: stats.armor,
            carrying: None,
            gather_node: None,
            attack_ground: None,
            patrol_anchor: None,
            under_attack: false,
            last_hit_tick: 0,
        }
    }
}

// ---------- buildings ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingKind {
    Base,
    Barracks,
    Farm,
    Tower,
    Blacksmith,
    SiegeWorkshop,
    Wall,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildingStats {
    pub hp: f32,
    pub size: f32,
    pub gold: f32,
    pub wood: f32,
    /// Construction time in seconds.
    pub build_time: f32,
}

/// Base range of a tower before range upgrades.
pub const TOWER_RANGE: f32 = 150.0;
pub const TOWER_DAMAGE: f32 = 12.0;
pub const TOWER_COOLDOWN: u32 = 60;

impl BuildingKind {
    pub fn stats(self) -> BuildingStats {
        match self {
            BuildingKind::Base => BuildingStats {
                hp: 1200.0,
                size: 100.0,
                gold: 400.0,
                wood: 300.0,
                build_time: 60.0,
            },
            BuildingKind::Barracks => BuildingStats {
                hp: 500.0,
                size: 80.0,
                gold: 150.0,
                wood: 100.0,
                build_time: 30.0,
            },
            BuildingKind::Farm => BuildingStats {
                hp: 250.0,
                size: 60.0,
                gold: 80.0,
                wood: 60.0,
                build_time: 20.0,
            },
            BuildingKind::Tower => BuildingStats {
                hp: 400.0,
                size: 50.0,
                gold: 100.0,
                wood: 80.0,
                build_time: 25.0,
            },
            BuildingKind::Blacksmith => BuildingStats {
                hp: 450.0,
                size: 70.0,
                gold: 120.0,
                wood: 100.0,
                build_time: 30.0,
            },
            BuildingKind::SiegeWorkshop => BuildingStats {
                hp: 500.0,
                size: 80.0,
                gold: 200.0,
                wood: 150.0,
                build_time: 35.0,
            },
            BuildingKind::Wall => BuildingStats {
                hp: 300.0,
                size: 40.0,
                gold: 20.0,
                wood: 40.0,
                build_time: 8.0,
            },
        }
    }

    /// Unit kinds this building can queue once complete.
    pub fn produces(self) -> &'static [UnitKind] {
        match self {
            BuildingKind::Base => &[UnitKind::Worker],
            BuildingKind::Barracks => &[UnitKind::Soldier, UnitKind::Archer, UnitKind::Healer],
            BuildingKind::SiegeWorkshop => &[UnitKind::Catapult],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub unit: UnitKind,
    pub elapsed: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Building {
    pub id: EntityId,
    pub owner: Uuid,
    pub pos: Vec2,
    pub hp: f32,
    pub max_hp: f32,
    pub size: f32,
    pub kind: BuildingKind,
    /// 0–100; below 100 the building neither produces nor shoots.
    pub progress: f32,
    pub queue: VecDeque<QueueItem>,
    pub rally: Option<Vec2>,
    pub under_attack: bool,
    pub last_hit_tick: u64,
    /// Tower shot timer.
    pub cooldown_left: u32,
}

impl Building {
    pub fn new(id: EntityId, owner: Uuid, kind: BuildingKind, pos: Vec2, completed: bool) -> Self {
        let stats = kind.stats();
        Self {
            id,
            owner,
            pos,
            hp: if completed { stats.hp } else { stats.hp * 0.1 },
            max_hp: stats.hp,
            size: stats.size,
            kind,
            progress: if completed { 100.0 } else { 0.0 },
            queue: VecDeque::new(),
            rally: None,
            under_attack: false,
            last_hit_tick: 0,
            cooldown_left: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= 100.0
    }
}

// ---------- resources & projectiles ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Gold,
    Wood,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceNode {
    pub id: EntityId,
    pub pos: Vec2,
    pub kind: ResourceKind,
    pub amount: f32,
    pub max_amount: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectileKind {
    Arrow,
    Boulder,
    Heal,
}

impl ProjectileKind {
    pub fn speed(self) -> f32 {
        match self {
            ProjectileKind::Arrow => 6.0,
            ProjectileKind::Boulder => 4.0,
            ProjectileKind::Heal => 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub kind: ProjectileKind,
    pub owner: Uuid,
    pub pos: Vec2,
    pub target_id: Option<EntityId>,
    /// Last known target position; flight continues here if the target dies.
    pub target_pos: Vec2,
    pub speed: f32,
    pub damage: f32,
    /// 0 for single-target.
    pub splash: f32,
    pub spawn_tick: u64,
}

// ---------- actions ----------

/// Player intent, validated before it reaches the engine queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Action {
    Move {
        unit_id: EntityId,
        target: Vec2,
        /// Append as a waypoint instead of replacing the current path.
        #[serde(default)]
        queue: bool,
    },
    Attack {
        unit_id: EntityId,
        target_id: EntityId,
    },
    AttackMove {
        unit_id: EntityId,
        target: Vec2,
    },
    AttackGround {
        unit_id: EntityId,
        target: Vec2,
    },
    Patrol {
        unit_id: EntityId,
        target: Vec2,
    },
    HoldPosition {
        unit_id: EntityId,
    },
    Stop {
        unit_id: EntityId,
    },
    Gather {
        unit_id: EntityId,
        node_id: EntityId,
    },
    Repair {
        unit_id: EntityId,
        building_id: EntityId,
    },
    Heal {
        unit_id: EntityId,
        target_id: EntityId,
    },
    Build {
        unit_id: EntityId,
        building: BuildingKind,
        position: Vec2,
    },
    Produce {
        building_id: EntityId,
        unit: UnitKind,
    },
    CancelProduce {
        building_id: EntityId,
        index: usize,
    },
    SetRally {
        building_id: EntityId,
        target: Vec2,
    },
    Upgrade {
        upgrade: UpgradeKind,
    },
    Surrender {},
}
