//! Maps raw input lines to engine actions, gated by the interaction state.
//!
//! The binary feeds one line per player action. Outside battle, single-letter
//! commands drive movement and interaction; inside battle the whole line is
//! free text for the conversation, with slash commands reserved for the few
//! meta actions that must stay reachable while typing.

use crate::engine::dialogue::{InteractionState, TerminalKind};
use crate::world::Direction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    /// Confirm: open a dialogue against the faced cell or advance the
    /// current line.
    Interact,
    SubmitText(String),
    Cancel,
    Ban,
    Quit,
    None,
}

pub fn dispatch(line: &str, state: InteractionState) -> Action {
    match state {
        InteractionState::Idle => match line.trim() {
            "w" | "up" => Action::Move(Direction::Up),
            "s" | "down" => Action::Move(Direction::Down),
            "a" | "left" => Action::Move(Direction::Left),
            "d" | "right" => Action::Move(Direction::Right),
            "" | "e" | "enter" | "space" => Action::Interact,
            "q" | "quit" => Action::Quit,
            _ => Action::None,
        },
        InteractionState::DialogueScripted => match line.trim() {
            "" | "e" | "enter" | "space" => Action::Interact,
            "x" | "cancel" => Action::Cancel,
            "b" | "ban" => Action::Ban,
            "q" | "quit" => Action::Quit,
            _ => Action::Interact,
        },
        InteractionState::BattlePlayerTurn => {
            let trimmed = line.trim();
            match trimmed {
                "" => Action::None,
                "/x" | "/cancel" => Action::Cancel,
                "/ban" => Action::Ban,
                "/q" | "/quit" => Action::Quit,
                _ => Action::SubmitText(trimmed.to_string()),
            }
        }
        InteractionState::Terminal(TerminalKind::GameOver) => match line.trim() {
            "q" | "quit" | "" => Action::Quit,
            _ => Action::None,
        },
        // Farewell display: nothing to do but wait for the eviction deadline.
        InteractionState::Terminal(TerminalKind::Banned { .. }) => match line.trim() {
            "q" | "quit" => Action::Quit,
            _ => Action::None,
        },
    }
}
