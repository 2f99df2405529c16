//! Thin ASCII presentation of the current state. Pure function of its
//! inputs; every decision about WHAT to show lives in the engine and the
//! state machine.

use crate::engine::dialogue::{InteractionFsm, InteractionState, TerminalKind};
use crate::engine::state::GameState;
use crate::world::{Position, TileKind, MAP_HEIGHT, MAP_WIDTH};

pub fn render_frame(state: &GameState, fsm: &InteractionFsm) -> String {
    let mut out = String::with_capacity(1024);

    for y in 0..MAP_HEIGHT {
        for x in 0..MAP_WIDTH {
            let pos = Position::new(x, y);
            out.push_str(&cell_glyph(state, pos));
        }
        out.push('\n');
    }

    out.push_str(&format!(
        "所持金: {}G  客: {}人\n",
        state.player.wallet,
        state.customers().len()
    ));

    match fsm.state() {
        InteractionState::Idle => {}
        InteractionState::BattlePlayerTurn => {
            if let Some(session) = fsm.session() {
                if let Some(line) = session.current_line() {
                    out.push_str(&format!("▌{}\n", line));
                }
            }
            out.push_str("> （話しかける言葉を入力）\n");
        }
        InteractionState::DialogueScripted | InteractionState::Terminal(TerminalKind::Banned { .. }) => {
            if let Some(session) = fsm.session() {
                if let Some(line) = session.current_line() {
                    let more = if session.has_next_line() { " ▼" } else { "" };
                    out.push_str(&format!("▌{}{}\n", line, more));
                }
            }
        }
        InteractionState::Terminal(TerminalKind::GameOver) => {
            if let Some(session) = fsm.session() {
                if let Some(line) = session.current_line() {
                    out.push_str(&format!("▌{}\n", line));
                }
            }
            out.push_str("— GAME OVER —\n");
        }
    }

    out
}

fn cell_glyph(state: &GameState, pos: Position) -> String {
    if state.player.position == pos {
        return "＠".to_string();
    }
    if let Some(customer) = state.customer_at(pos) {
        return if customer.calling {
            "❗".to_string()
        } else {
            customer.glyph.clone()
        };
    }
    if let Some(machine) = state.map().machine_at(pos) {
        return machine.glyph.to_string();
    }
    if state.coins().iter().any(|c| c.position == pos) {
        return "・".to_string();
    }
    match state.map().tile(pos) {
        Some(TileKind::Wall) => "█".to_string(),
        Some(TileKind::CarpetVertical) => "║".to_string(),
        Some(TileKind::CarpetHorizontal) => "═".to_string(),
        Some(TileKind::Exit) => "🚪".to_string(),
        _ => "　".to_string(),
    }
}
