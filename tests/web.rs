//! 浏览器环境下的冒烟测试，使用 `wasm-pack test --headless --firefox` 运行。

#![cfg(target_arch = "wasm32")]

use skirmish_core::{create_session, dispatch_action, validate_session, BattleSession, Phase, SkirmishEngine};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn created_session_passes_validation() {
    let session = create_session(Some("skirmish".into())).unwrap();
    assert!(validate_session(session).is_ok());
}

#[wasm_bindgen_test]
fn unknown_scenario_is_an_error() {
    assert!(create_session(Some("moon".into())).is_err());
}

#[wasm_bindgen_test]
fn stateless_dispatch_advances_the_turn() {
    let session = create_session(None).unwrap();
    let before: BattleSession = serde_wasm_bindgen::from_value(session.clone()).unwrap();
    let action = serde_wasm_bindgen::to_value(&skirmish_core::BattleAction::AdvanceTurn).unwrap();
    let result = dispatch_action(session, action, 3).unwrap();
    let resolution: skirmish_core::Resolution = serde_wasm_bindgen::from_value(result).unwrap();
    assert_ne!(resolution.session.active_unit_id, before.active_unit_id);
}

#[wasm_bindgen_test]
async fn preview_does_not_commit() {
    let mut engine = SkirmishEngine::new(Some("boss".into()), Some(9), None).unwrap();
    // 推进到第一个敌方回合。
    for _ in 0..8 {
        if engine.phase() == "ENEMY_TURN" {
            break;
        }
        engine.dispatch_json(r#"{"type":"ADVANCE_TURN"}"#).unwrap();
    }
    let before = engine.session_json().unwrap();
    let preview: JsValue = JsFuture::from(engine.preview_enemy_action(Some(5))).await.unwrap();
    assert!(preview.as_string().is_some());
    assert_eq!(engine.session_json().unwrap(), before);
    let session: BattleSession = serde_json::from_str(&before).unwrap();
    assert!(!matches!(session.phase, Phase::Victory | Phase::Defeat));
}
