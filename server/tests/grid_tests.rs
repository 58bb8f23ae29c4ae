//! Spatial index queries.

use skirmish_server::game::grid::SpatialGrid;
use skirmish_server::game::types::Vec2;

#[test]
fn query_radius_returns_only_nearby_entities() {
    let mut grid = SpatialGrid::new();
    grid.insert(&"a".to_string(), Vec2::new(100.0, 100.0));
    grid.insert(&"b".to_string(), Vec2::new(150.0, 100.0));
    grid.insert(&"c".to_string(), Vec2::new(900.0, 900.0));

    let hits = grid.query_radius(Vec2::new(100.0, 100.0), 60.0);
    assert_eq!(hits, vec!["a".to_string(), "b".to_string()]);
}

#[test]
fn query_spans_cell_boundaries() {
    let mut grid = SpatialGrid::new();
    // Either side of the 100px cell border.
    grid.insert(&"left".to_string(), Vec2::new(95.0, 50.0));
    grid.insert(&"right".to_string(), Vec2::new(105.0, 50.0));

    let hits = grid.query_radius(Vec2::new(100.0, 50.0), 10.0);
    assert_eq!(hits.len(), 2);
}

#[test]
fn results_are_sorted_by_id() {
    let mut grid = SpatialGrid::new();
    for id in ["u9", "u10", "u2"] {
        grid.insert(&id.to_string(), Vec2::new(10.0, 10.0));
    }
    let hits = grid.query_radius(Vec2::new(10.0, 10.0), 5.0);
    assert_eq!(hits, vec!["u10".to_string(), "u2".to_string(), "u9".to_string()]);
}

#[test]
fn clear_empties_the_index() {
    let mut grid = SpatialGrid::new();
    grid.insert(&"a".to_string(), Vec2::new(10.0, 10.0));
    grid.clear();
    assert!(grid.query_radius(Vec2::new(10.0, 10.0), 50.0).is_empty());
}
