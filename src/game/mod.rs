//! 战斗核心：状态模型、资源与站位规则、命中判定和各动作处理器。

pub mod cards;
pub mod combat;
pub mod config;
pub mod effects;
pub mod positioning;
pub mod resources;
pub mod rules;
pub mod scenario;
pub mod state;


pub use cards::{play_card, playable_attacks};
pub use combat::{
    armor_gate, flat_mitigation, resolve_attack, ArmorOutcome, AttackRoll, RollFn, RollSource,
    ScriptedRolls, SeededRolls,
};
pub use config::{BattleConfig, ConfigError};
pub use effects::{tick_status_effects, AreaOfEffect, CardEffect, StatusEffect};
pub use positioning::{build_turn_queue, compact_ranks, compute_initiative};
pub use resources::{on_turn_end, on_turn_start, restore, spend, ResourceError};
pub use rules::{
    advance_turn, dispatch, scripted_prologue_kill, ActionContext, BattleAction, BattleEngine,
    PlayCardAction, PrologueKillAction, Resolution,
};
pub use scenario::{build_session, spawn_enemy, spawn_player, PlayerClass, ScenarioError, ScenarioId};
pub use state::{
    lane_distance, BattleEvent, BattleSession, CardId, CardType, CombatCard, Combatant,
    EnemyArchetype, FloatCategory, IntegrityError, Phase, Pool, Resources, SessionStats, Side,
    UnitId,
};
