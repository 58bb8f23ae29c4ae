//! Behavioral monitoring thresholds.

use skirmish_server::game::anticheat::{CheatMonitor, Severity};
use skirmish_server::game::engine::GameEngine;
use skirmish_server::game::map::GameMap;
use skirmish_server::game::types::{Difficulty, Team, UnitKind, Vec2};
use uuid::Uuid;

const P: Uuid = Uuid::from_u128(3);

#[test]
fn sustained_rates_escalate_from_suspicious_to_confirmed() {
    let monitor = CheatMonitor::new();

    assert!(monitor.check_action_rate(P, 30).is_none());
    assert_eq!(
        monitor.check_action_rate(P, 31).map(|r| r.severity),
        Some(Severity::Suspicious)
    );
    assert_eq!(
        monitor.check_action_rate(P, 61).map(|r| r.severity),
        Some(Severity::Confirmed)
    );
}

#[test]
fn resource_drift_tolerates_small_error() {
    let monitor = CheatMonitor::new();
    assert!(monitor.check_resource_claim(P, 100.0, 103.0).is_none());
    assert_eq!(
        monitor
            .check_resource_claim(P, 100.0, 110.0)
            .map(|r| r.severity),
        Some(Severity::Suspicious)
    );
    assert_eq!(
        monitor
            .check_resource_claim(P, 100.0, 200.0)
            .map(|r| r.severity),
        Some(Severity::Confirmed)
    );
}

#[test]
fn inflated_unit_stats_are_confirmed() {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(P, "cheater", Team::Host, "blue");
    let id = eng.spawn_unit(P, UnitKind::Soldier, Vec2::new(500.0, 500.0));
    eng.state_mut().units.get_mut(&id).unwrap().attack_damage = 100.0;

    let monitor = CheatMonitor::new();
    let reports = monitor.audit_state(eng.state());
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].severity, Severity::Confirmed);
    assert_eq!(reports[0].player, P);
}

#[test]
fn out_of_map_positions_are_confirmed() {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(P, "cheater", Team::Host, "blue");
    let id = eng.spawn_unit(P, UnitKind::Soldier, Vec2::new(500.0, 500.0));
    eng.state_mut().units.get_mut(&id).unwrap().pos = Vec2::new(-500.0, 500.0);

    let monitor = CheatMonitor::new();
    let reports = monitor.audit_state(eng.state());
    assert!(reports
        .iter()
        .any(|r| r.severity == Severity::Confirmed && r.detail.contains("outside")));
}

#[test]
fn clean_state_produces_no_reports() {
    let mut eng = GameEngine::with_map(GameMap::flat(60, 60, 40.0), Difficulty::Normal);
    eng.add_player(P, "honest", Team::Host, "blue");
    eng.spawn_unit(P, UnitKind::Soldier, Vec2::new(500.0, 500.0));
    let monitor = CheatMonitor::new();
    assert!(monitor.audit_state(eng.state()).is_empty());
}
