//! Reserved-phrase dispatch: magic words short-circuit before any network
//! call, and the legacy crane-game override fires only where it should.

use arcadesim::engine::actor::{Customer, CustomerProfile};
use arcadesim::engine::dialogue::{
    ApiCall, FsmEvent, InteractionFsm, InteractionState, TerminalKind,
};
use arcadesim::engine::state::GameState;
use arcadesim::api::SpellLookup;
use arcadesim::world::{Direction, Position};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn battle_next_to_crane() -> (GameState, InteractionFsm) {
    let mut state = GameState::new();
    // Crane game sits at (12,3); stand beside it at (12,2).
    state.player.position = Position::new(12, 2);
    state.player.facing = Direction::Right;
    let customer = Customer::new(
        CustomerProfile::new(100, "ユウタ", 24, 3200, ""),
        Position::new(13, 2),
    );
    assert!(state.admit_customer(customer));
    let mut fsm = InteractionFsm::new();
    let token = match fsm.interact(&mut state) {
        FsmEvent::Request(ApiCall::Opening { token, .. }) => token,
        other => panic!("expected opening, got {:?}", other),
    };
    fsm.apply_opening(&mut state, token, Some(vec!["なに？".to_string()]));
    assert_eq!(fsm.interact(&mut state), FsmEvent::None);
    assert_eq!(fsm.state(), InteractionState::BattlePlayerTurn);
    (state, fsm)
}

#[test]
fn destructive_phrase_short_circuits_without_spell_lookup() {
    let (mut state, mut fsm) = battle_next_to_crane();
    let mut rng = StdRng::seed_from_u64(1);
    // Whitespace and ASCII case differences do not matter.
    let event = fsm.submit_text(&mut state, "\t MEGANTE  ", &mut rng);
    // GameOver directly: no Request variant means no network call was issued.
    assert_eq!(event, FsmEvent::GameOver);
    assert_eq!(
        fsm.state(),
        InteractionState::Terminal(TerminalKind::GameOver)
    );
}

#[test]
fn destructive_phrase_matches_kana_forms() {
    for phrase in ["メガンテ", "めがんて"] {
        let (mut state, mut fsm) = battle_next_to_crane();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            fsm.submit_text(&mut state, phrase, &mut rng),
            FsmEvent::GameOver,
            "phrase {:?}",
            phrase
        );
    }
}

#[test]
fn near_miss_phrases_go_to_spell_lookup() {
    for phrase in ["メガンテ！", "mega nte", "メガンテス"] {
        let (mut state, mut fsm) = battle_next_to_crane();
        let mut rng = StdRng::seed_from_u64(1);
        let event = fsm.submit_text(&mut state, phrase, &mut rng);
        assert!(
            matches!(event, FsmEvent::Request(ApiCall::Spell { .. })),
            "phrase {:?} should not be reserved",
            phrase
        );
    }
}

/// Beside the 🧸 crane game, the old injection string wins the battle
/// outright once no remote spell matches.
#[test]
fn sql_injection_text_wins_the_crane_game() {
    let (mut state, mut fsm) = battle_next_to_crane();
    let mut rng = StdRng::seed_from_u64(1);
    let token = match fsm.submit_text(&mut state, "' OR 1=1; --", &mut rng) {
        FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
        other => panic!("unexpected {:?}", other),
    };
    let event = fsm.apply_spell(&mut state, token, Some(SpellLookup::NotFound));
    assert_eq!(event, FsmEvent::None);
    let session = fsm.session().expect("session still showing victory");
    assert!(!session.is_battle(), "battle mode must be cleared");
    // Victory narration plays out, then the session closes normally.
    let mut event = FsmEvent::None;
    for _ in 0..5 {
        event = fsm.interact(&mut state);
        if event == FsmEvent::SessionClosed {
            break;
        }
    }
    assert_eq!(event, FsmEvent::SessionClosed);
    assert_eq!(fsm.state(), InteractionState::Idle);
}

#[test]
fn sql_injection_away_from_crane_is_relayed() {
    let mut state = GameState::new();
    // Player in open floor, far from the crane game.
    let customer = Customer::new(
        CustomerProfile::new(100, "ユウタ", 24, 3200, ""),
        Position::new(5, 5),
    );
    assert!(state.admit_customer(customer));
    state.player.position = Position::new(5, 6);
    state.player.facing = Direction::Up;
    let mut fsm = InteractionFsm::new();
    let token = match fsm.interact(&mut state) {
        FsmEvent::Request(ApiCall::Opening { token, .. }) => token,
        other => panic!("unexpected {:?}", other),
    };
    fsm.apply_opening(&mut state, token, None);
    assert_eq!(fsm.interact(&mut state), FsmEvent::None);
    let mut rng = StdRng::seed_from_u64(1);
    let token = match fsm.submit_text(&mut state, "' OR 1=1; --", &mut rng) {
        FsmEvent::Request(ApiCall::Spell { token, .. }) => token,
        other => panic!("unexpected {:?}", other),
    };
    let event = fsm.apply_spell(&mut state, token, Some(SpellLookup::NotFound));
    match event {
        FsmEvent::Request(ApiCall::Relay { text, .. }) => {
            assert_eq!(text, "' OR 1=1; --");
        }
        other => panic!("expected relay, got {:?}", other),
    }
}

#[test]
fn chaos_phrase_keeps_customer_count() {
    let (mut state, mut fsm) = battle_next_to_crane();
    let mut rng = StdRng::seed_from_u64(8);
    let before = state.customers().len();
    assert_eq!(
        fsm.submit_text(&mut state, "パルプンテ", &mut rng),
        FsmEvent::None
    );
    assert_eq!(state.customers().len(), before);
    // Everyone still stands on a legal cell.
    for c in state.customers() {
        assert!(state.map().in_bounds(c.position));
        assert!(state.map().machine_at(c.position).is_none());
    }
}
