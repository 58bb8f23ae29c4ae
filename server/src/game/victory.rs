//! Elimination detection. Pure over the current state; the only non-state
//! inputs are forfeit flags the room manager injects (surrender, grace
//! expiry, confirmed cheating).

use uuid::Uuid;

use crate::game::engine::GameState;
use crate::game::types::BuildingKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// `None` means a draw.
    pub winner: Option<Uuid>,
    pub reason: String,
}

fn eliminated(state: &GameState, player: Uuid) -> bool {
    if state.forfeited.contains(&player) {
        return true;
    }
    !state
        .buildings
        .values()
        .any(|b| b.owner == player && b.kind == BuildingKind::Base && b.hp > 0.0)
}

/// `Some` exactly when the match just became decided.
pub fn evaluate(state: &GameState) -> Option<Outcome> {
    if state.game_over || state.players.len() < 2 {
        return None;
    }

    let survivors: Vec<Uuid> = state
        .players
        .keys()
        .copied()
        .filter(|p| !eliminated(state, *p))
        .collect();

    match survivors.as_slice() {
        [winner] => {
            let name = state
                .players
                .get(winner)
                .map(|p| p.name.clone())
                .unwrap_or_default();
            Some(Outcome {
                winner: Some(*winner),
                reason: format!("{name} wins by elimination"),
            })
        }
        [] => Some(Outcome {
            winner: None,
            reason: "draw".to_string(),
        }),
        _ => None,
    }
}
