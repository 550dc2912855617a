pub mod ai;
pub mod game;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{archetype_of, enemy_action, profile_for, threat_of, EnemyMove, EnemyProfile};
pub use game::{
    build_session, dispatch, ActionContext, BattleAction, BattleConfig, BattleEngine, BattleEvent,
    BattleSession, CardId, CardType, CombatCard, Combatant, ConfigError, EnemyArchetype,
    FloatCategory, IntegrityError, Phase, PlayCardAction, PlayerClass, PrologueKillAction,
    Resolution, RollSource, ScenarioError, ScenarioId, ScriptedRolls, SeededRolls, Side, UnitId,
};

#[cfg(all(feature = "wee_alloc", target_arch = "wasm32"))]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
    web_sys::console::info_1(&JsValue::from_str(concat!(
        "skirmish_core ",
        env!("CARGO_PKG_VERSION"),
        " ready"
    )));
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn integrity_to_js_error(error: IntegrityError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn parse_scenario(scenario: Option<&str>) -> Result<ScenarioId, JsValue> {
    scenario
        .map(ScenarioId::from_str)
        .transpose()
        .map(Option::unwrap_or_default)
        .map_err(serde_to_js_error)
}

fn parse_config(config_json: Option<&str>) -> Result<BattleConfig, JsValue> {
    match config_json {
        Some(json) => BattleConfig::from_json(json).map_err(serde_to_js_error),
        None => Ok(BattleConfig::default()),
    }
}

fn rolls_for(seed: Option<u32>) -> SeededRolls {
    match seed {
        Some(seed) => SeededRolls::from_seed(u64::from(seed)),
        None => SeededRolls::from_entropy(),
    }
}

#[wasm_bindgen]
pub struct SkirmishEngine {
    session: BattleSession,
    engine: BattleEngine<SeededRolls>,
}

#[wasm_bindgen]
impl SkirmishEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        scenario: Option<String>,
        seed: Option<u32>,
        config_json: Option<String>,
    ) -> Result<SkirmishEngine, JsValue> {
        let scenario = parse_scenario(scenario.as_deref())?;
        let config = parse_config(config_json.as_deref())?;
        let session = build_session(scenario, &config);
        Ok(SkirmishEngine {
            session,
            engine: BattleEngine::new(config, rolls_for(seed)),
        })
    }

    pub fn session_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session).map_err(serde_to_js_error)
    }

    pub fn set_session_json(&mut self, json: &str) -> Result<(), JsValue> {
        let session: BattleSession = serde_json::from_str(json).map_err(serde_to_js_error)?;
        session.integrity_check().map_err(integrity_to_js_error)?;
        self.session = session;
        Ok(())
    }

    /// 执行一个动作并提交结果，返回 Resolution 的 JSON。
    pub fn dispatch_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: BattleAction = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        let resolution = self.engine.dispatch(&self.session, &action);
        self.session = resolution.session.clone();
        serde_json::to_string(&resolution).map_err(serde_to_js_error)
    }

    pub fn active_hand_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.active_hand()).map_err(serde_to_js_error)
    }

    pub fn phase(&self) -> String {
        serde_json::to_value(self.session.phase)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_default()
    }

    pub fn is_finished(&self) -> bool {
        self.session.is_finished()
    }

    pub fn reset(&mut self, scenario: Option<String>) -> Result<(), JsValue> {
        let scenario = parse_scenario(scenario.as_deref())?;
        self.session = build_session(scenario, self.engine.config());
        Ok(())
    }

    /// 在会话副本上延迟演算一次敌方行动，不提交结果，供 UI 预演动画。
    pub fn preview_enemy_action(&self, delay_ms: Option<u32>) -> Promise {
        let session = self.session.clone();
        let mut engine = self.engine.clone();
        let delay = delay_ms.unwrap_or(0);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let resolution = engine.dispatch(&session, &BattleAction::EnemyAction { enemy_id: None });
            let json = serde_json::to_string(&resolution).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

/// 按场景编号生成初始会话。
#[wasm_bindgen(js_name = "createSession")]
pub fn create_session(scenario: Option<String>) -> Result<JsValue, JsValue> {
    let scenario = parse_scenario(scenario.as_deref())?;
    to_value(&build_session(scenario, &BattleConfig::default())).map_err(JsValue::from)
}

/// 无状态入口：随机源由调用方给定的种子决定。
#[wasm_bindgen(js_name = "dispatchAction")]
pub fn dispatch_action(session: JsValue, action: JsValue, seed: u32) -> Result<JsValue, JsValue> {
    let session: BattleSession = from_value(session).map_err(JsValue::from)?;
    let action: BattleAction = from_value(action).map_err(JsValue::from)?;
    let mut engine = BattleEngine::seeded(BattleConfig::default(), u64::from(seed));
    to_value(&engine.dispatch(&session, &action)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateSession")]
pub fn validate_session(session: JsValue) -> Result<(), JsValue> {
    let session: BattleSession = from_value(session).map_err(JsValue::from)?;
    session.integrity_check().map_err(integrity_to_js_error)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
