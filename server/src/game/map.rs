//! Seeded terrain and resource generation.
//!
//! Generation is a pure function of `(width, height, seed)`: the RNG is a
//! local linear-congruential stream, never a shared or global generator, so
//! identical seeds always reproduce the same map.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::types::{ResourceKind, Vec2};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("map seed must be non-zero")]
    BadSeed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileKind {
    Grass,
    Dirt,
    Sand,
    Forest,
    Gold,
    Water,
    Mountain,
}

impl TileKind {
    pub fn is_passable(self) -> bool {
        !matches!(self, TileKind::Water | TileKind::Mountain)
    }
}

/// Resource deposit produced alongside the terrain; the engine turns these
/// into live `ResourceNode`s.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSeed {
    pub pos: Vec2,
    pub kind: ResourceKind,
    pub amount: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameMap {
    pub width: u32,
    pub height: u32,
    pub tile_size: f32,
    tiles: Vec<TileKind>,
}

impl GameMap {
    /// All-grass map, used by tests and scripted scenarios.
    pub fn flat(width: u32, height: u32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            tiles: vec![TileKind::Grass; (width * height) as usize],
        }
    }

    pub fn tile(&self, tx: u32, ty: u32) -> Option<TileKind> {
        if tx < self.width && ty < self.height {
            Some(self.tiles[(ty * self.width + tx) as usize])
        } else {
            None
        }
    }

    pub fn pixel_width(&self) -> f32 {
        self.width as f32 * self.tile_size
    }

    pub fn pixel_height(&self) -> f32 {
        self.height as f32 * self.tile_size
    }

    pub fn in_bounds(&self, pos: Vec2) -> bool {
        pos.x >= 0.0 && pos.y >= 0.0 && pos.x <= self.pixel_width() && pos.y <= self.pixel_height()
    }

    /// Tile indices covering a pixel position.
    pub fn tile_index(&self, pos: Vec2) -> (u32, u32) {
        let tx = (pos.x / self.tile_size).floor().max(0.0) as u32;
        let ty = (pos.y / self.tile_size).floor().max(0.0) as u32;
        (tx.min(self.width - 1), ty.min(self.height - 1))
    }

    /// Pixel center of a tile.
    pub fn tile_center(&self, tx: u32, ty: u32) -> Vec2 {
        Vec2::new(
            (tx as f32 + 0.5) * self.tile_size,
            (ty as f32 + 0.5) * self.tile_size,
        )
    }

    pub fn is_passable(&self, pos: Vec2) -> bool {
        if !self.in_bounds(pos) {
            return false;
        }
        let (tx, ty) = self.tile_index(pos);
        self.tile(tx, ty).map(TileKind::is_passable).unwrap_or(false)
    }

    /// Host and guest spawn centers, at 15% / 85% of both axes.
    pub fn spawn_points(&self) -> [Vec2; 2] {
        let (hx, hy) = self.spawn_tile(0.15);
        let (gx, gy) = self.spawn_tile(0.85);
        [self.tile_center(hx, hy), self.tile_center(gx, gy)]
    }

    fn spawn_tile(&self, frac: f32) -> (u32, u32) {
        let tx = ((self.width as f32 * frac) as u32).min(self.width - 1);
        let ty = ((self.height as f32 * frac) as u32).min(self.height - 1);
        (tx, ty)
    }
}

/// Deterministic LCG stream for generation (Knuth MMIX constants).
struct MapRng {
    state: u64,
}

impl MapRng {
    fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x2545_F491_4F6C_DD1D,
        }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state >> 16
    }

    fn next_f32(&mut self) -> f32 {
        (self.next() % 10_000) as f32 / 10_000.0
    }

    fn next_range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }
}

const MIN_GOLD_TILES: usize = 6;
const MIN_FOREST_TILES: usize = 12;

/// Generate terrain plus resource deposits for a `width x height` tile map.
///
/// Spawn squares (7x7 at 15% and 85% of both axes) are forced to grass. If a
/// roll leaves too few resource tiles, non-spawn tiles are re-rolled, up to
/// `2 * width * height` iterations.
pub fn generate(
    width: u32,
    height: u32,
    tile_size: f32,
    seed: u64,
) -> Result<(GameMap, Vec<NodeSeed>), MapError> {
    if seed == 0 {
        return Err(MapError::BadSeed);
    }

    let mut rng = MapRng::new(seed);
    let mut map = GameMap {
        width,
        height,
        tile_size,
        tiles: vec![TileKind::Grass; (width * height) as usize],
    };

    let spawn_mask = spawn_mask(width, height);
    let max_attempts = 2 * width as usize * height as usize;
    let mut attempt = 0;
    loop {
        roll_terrain(&mut map, &spawn_mask, &mut rng);
        if count(&map, TileKind::Gold) >= MIN_GOLD_TILES
            && count(&map, TileKind::Forest) >= MIN_FOREST_TILES
        {
            break;
        }
        attempt += 1;
        if attempt >= max_attempts {
            // Give up on randomness and hand-place the shortfall.
            force_minimums(&mut map, &spawn_mask, &mut rng);
            break;
        }
    }

    let mut nodes = Vec::new();
    for ty in 0..height {
        for tx in 0..width {
            let kind = match map.tile(tx, ty) {
                Some(TileKind::Gold) => Some((ResourceKind::Gold, 1500.0, 3000.0)),
                Some(TileKind::Forest) => Some((ResourceKind::Wood, 800.0, 1500.0)),
                _ => None,
            };
            if let Some((kind, lo, hi)) = kind {
                nodes.push(NodeSeed {
                    pos: map.tile_center(tx, ty),
                    kind,
                    amount: rng.next_range(lo, hi).floor(),
                });
            }
        }
    }

    Ok((map, nodes))
}

/// True for tiles inside either 7x7 spawn square.
fn spawn_mask(width: u32, height: u32) -> Vec<bool> {
    let mut mask = vec![false; (width * height) as usize];
    for frac in [0.15_f32, 0.85] {
        let cx = ((width as f32 * frac) as i64).min(i64::from(width) - 1);
        let cy = ((height as f32 * frac) as i64).min(i64::from(height) - 1);
        for dy in -3..=3_i64 {
            for dx in -3..=3_i64 {
                let (nx, ny) = (cx + dx, cy + dy);
                if nx >= 0 && ny >= 0 && nx < i64::from(width) && ny < i64::from(height) {
                    mask[(ny as u32 * width + nx as u32) as usize] = true;
                }
            }
        }
    }
    mask
}

fn roll_terrain(map: &mut GameMap, spawn_mask: &[bool], rng: &mut MapRng) {
    for i in 0..map.tiles.len() {
        if spawn_mask[i] {
            map.tiles[i] = TileKind::Grass;
            continue;
        }
        let roll = rng.next_f32();
        map.tiles[i] = match roll {
            r if r < 0.55 => TileKind::Grass,
            r if r < 0.67 => TileKind::Dirt,
            r if r < 0.75 => TileKind::Sand,
            r if r < 0.87 => TileKind::Forest,
            r if r < 0.89 => TileKind::Gold,
            r if r < 0.95 => TileKind::Water,
            _ => TileKind::Mountain,
        };
    }
}

fn count(map: &GameMap, kind: TileKind) -> usize {
    map.tiles.iter().filter(|t| **t == kind).count()
}

fn force_minimums(map: &mut GameMap, spawn_mask: &[bool], rng: &mut MapRng) {
    let len = map.tiles.len();
    let mut place = |map: &mut GameMap, kind: TileKind, want: usize, rng: &mut MapRng| {
        let mut have = count(map, kind);
        let mut guard = 0;
        while have < want && guard < len * 4 {
            let i = (rng.next() as usize) % len;
            if !spawn_mask[i] && map.tiles[i] == TileKind::Grass {
                map.tiles[i] = kind;
                have += 1;
            }
            guard += 1;
        }
    };
    place(map, TileKind::Gold, MIN_GOLD_TILES, rng);
    place(map, TileKind::Forest, MIN_FOREST_TILES, rng);
}
