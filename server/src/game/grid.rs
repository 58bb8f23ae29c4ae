//! Uniform-grid nearest-neighbor index over units and buildings.
//!
//! Rebuilt once per tick from the engine's live collections. Purely spatial;
//! results come back sorted by id so callers iterate deterministically.

use std::collections::HashMap;

use crate::game::types::{EntityId, Vec2};

/// Bucket edge length in pixels.
pub const CELL_SIZE: f32 = 100.0;

#[derive(Debug, Default)]
pub struct SpatialGrid {
    buckets: HashMap<(i32, i32), Vec<(EntityId, Vec2)>>,
}

impl SpatialGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }

    fn cell(pos: Vec2) -> (i32, i32) {
        (
            (pos.x / CELL_SIZE).floor() as i32,
            (pos.y / CELL_SIZE).floor() as i32,
        )
    }

    pub fn insert(&mut self, id: &EntityId, pos: Vec2) {
        self.buckets
            .entry(Self::cell(pos))
            .or_default()
            .push((id.clone(), pos));
    }

    /// Ids of entities within `radius` of `(x, y)`, sorted by id.
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let min = Self::cell(Vec2::new(center.x - radius, center.y - radius));
        let max = Self::cell(Vec2::new(center.x + radius, center.y + radius));

        let mut hits = Vec::new();
        for cy in min.1..=max.1 {
            for cx in min.0..=max.0 {
                if let Some(bucket) = self.buckets.get(&(cx, cy)) {
                    for (id, pos) in bucket {
                        if pos.distance(center) <= radius {
                            hits.push(id.clone());
                        }
                    }
                }
            }
        }
        hits.sort();
        hits
    }
}
