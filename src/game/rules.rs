use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    cards::play_card,
    combat::{RollSource, SeededRolls},
    config::BattleConfig,
    effects::tick_status_effects,
    positioning::{build_turn_queue, compact_ranks},
    resources::{drain_pool, is_limit_break_ready, on_turn_end, on_turn_start, restore_pool},
    scenario::{spawn_player, PlayerClass, PROLOGUE_REINFORCEMENT, PROLOGUE_VICTIM},
    state::{
        BattleEvent, BattleSession, CardId, FloatCategory, Phase, Pool, Side, UnitId,
    },
};
use crate::ai::enemy_action;

/// 回合结束时最多可囤积的 AP。
pub const BANKED_AP: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayCardAction {
    pub card_id: CardId,
    #[serde(default)]
    pub target_id: Option<UnitId>,
    #[serde(default)]
    pub target_rank: Option<u8>,
    /// UI 当前选中的单位，攻击卡没有显式目标时使用。
    #[serde(default)]
    pub selected_target_id: Option<UnitId>,
}

impl PlayCardAction {
    pub fn new(card_id: impl Into<CardId>) -> Self {
        Self {
            card_id: card_id.into(),
            target_id: None,
            target_rank: None,
            selected_target_id: None,
        }
    }

    pub fn at(mut self, target_id: impl Into<UnitId>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn to_rank(mut self, rank: u8) -> Self {
        self.target_rank = Some(rank);
        self
    }

    pub fn with_selection(mut self, selected: impl Into<UnitId>) -> Self {
        self.selected_target_id = Some(selected.into());
        self
    }
}

/// 序章脚本：指定单位阵亡，援军顶上。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrologueKillAction {
    pub victim_id: UnitId,
    pub reinforcement_id: UnitId,
    pub reinforcement_class: PlayerClass,
}

impl Default for PrologueKillAction {
    fn default() -> Self {
        Self {
            victim_id: PROLOGUE_VICTIM.into(),
            reinforcement_id: PROLOGUE_REINFORCEMENT.into(),
            reinforcement_class: PlayerClass::Recruit,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BattleAction {
    AdvanceTurn,
    PlayCard {
        action: PlayCardAction,
    },
    EnemyAction {
        #[serde(default)]
        enemy_id: Option<UnitId>,
    },
    ScriptedEventPrologueKill {
        #[serde(default)]
        event: PrologueKillAction,
    },
    SetSession {
        session: Box<BattleSession>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Resolution {
    pub session: BattleSession,
    pub events: Vec<BattleEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Phase>,
}

impl Resolution {
    pub fn new(session: BattleSession, events: Vec<BattleEvent>) -> Self {
        let outcome = session.is_finished().then_some(session.phase);
        Self {
            session,
            events,
            outcome,
        }
    }

    pub fn unchanged(session: &BattleSession) -> Self {
        Self::new(session.clone(), Vec::new())
    }

    /// 非法行动：原状态加一行日志。
    pub fn rejected(session: &BattleSession, reason: impl Into<String>) -> Self {
        let text = reason.into();
        debug!(reason = %text, "action rejected");
        let mut next = session.clone();
        next.logs.push(text.clone());
        Self::new(next, vec![BattleEvent::Log { text }])
    }

    pub fn log_lines(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|event| match event {
            BattleEvent::Log { text } => Some(text.as_str()),
            _ => None,
        })
    }
}

/// 处理器的注入依赖：随机源与平衡参数。
pub struct ActionContext<'a> {
    pub rng: &'a mut dyn RollSource,
    pub config: &'a BattleConfig,
}

impl<'a> ActionContext<'a> {
    pub fn new(rng: &'a mut dyn RollSource, config: &'a BattleConfig) -> Self {
        Self { rng, config }
    }
}

/// 一次状态转移的工作副本，同时收集旁路事件。
pub(crate) struct Transition {
    pub session: BattleSession,
    pub events: Vec<BattleEvent>,
}

impl Transition {
    pub fn begin(session: &BattleSession) -> Self {
        Self {
            session: session.clone(),
            events: Vec::new(),
        }
    }

    pub fn log(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.session.logs.push(text.clone());
        self.events.push(BattleEvent::Log { text });
    }

    pub fn float(&mut self, unit_id: &str, text: impl Into<String>, category: FloatCategory) {
        self.events.push(BattleEvent::FloatingText {
            unit_id: unit_id.to_string(),
            text: text.into(),
            category,
        });
    }

    pub fn unlock(&mut self, achievement_id: &str) {
        self.events.push(BattleEvent::UnlockRequested {
            achievement_id: achievement_id.to_string(),
        });
    }

    pub fn compact(&mut self) {
        self.session.players = compact_ranks(&self.session.players);
        self.session.enemies = compact_ranks(&self.session.enemies);
        self.session.refresh_player_hand();
    }

    pub fn finish(self) -> Resolution {
        Resolution::new(self.session, self.events)
    }
}

/// 结算一次命中：扣血、扣架势，必要时标记死亡。返回是否击倒。
pub(crate) fn apply_hit(tx: &mut Transition, unit_id: &str, damage: i32, impact: i32) -> bool {
    let Some(unit) = tx.session.unit_mut(unit_id) else {
        return false;
    };
    unit.resources.hp = drain_pool(unit.resources.hp, damage);
    let mut staggered = false;
    if impact > 0 {
        unit.resources.stagger = drain_pool(unit.resources.stagger, impact);
        staggered = unit.resources.stagger.is_depleted();
    }
    let killed = unit.resources.hp.is_depleted() && !unit.is_dead;
    if killed {
        unit.is_dead = true;
    }
    let name = unit.name.clone();

    if staggered {
        tx.float(unit_id, "STAGGERED", FloatCategory::Status);
    }
    if killed {
        tx.log(format!("{name} is down."));
        tx.float(unit_id, "DOWN", FloatCategory::Status);
    }
    killed
}

pub(crate) fn grant_pp(tx: &mut Transition, unit_id: &str, amount: i32) {
    let Some(unit) = tx.session.unit_mut(unit_id) else {
        return;
    };
    let was_ready = is_limit_break_ready(&unit.resources);
    unit.resources.pp = restore_pool(unit.resources.pp, amount);
    if !was_ready && is_limit_break_ready(&unit.resources) {
        let name = unit.name.clone();
        tx.log(format!("{name} is ready to unleash a limit break."));
        tx.float(unit_id, "LIMIT BREAK READY", FloatCategory::Info);
    }
}

pub(crate) fn declare_victory(tx: &mut Transition) {
    tx.session.phase = Phase::Victory;
    info!(turn = tx.session.turn_count, "battle won");
    tx.log("Victory! The enemy line is broken.");
    tx.unlock("first_victory");
    if tx.session.stats.damage_taken == 0 {
        tx.unlock("flawless_victory");
    }
}

pub(crate) fn declare_defeat(tx: &mut Transition) {
    tx.session.phase = Phase::Defeat;
    info!(turn = tx.session.turn_count, "battle lost");
    tx.log("Defeat. The party has fallen.");
}

fn end_unit_turn(tx: &mut Transition, unit_id: &str, config: &BattleConfig) {
    let Some(unit) = tx.session.unit_mut(unit_id) else {
        return;
    };
    if !unit.is_alive() {
        return;
    }
    unit.resources = on_turn_end(&unit.resources, config);
    if unit.side == Side::Player {
        unit.bonus_ap = if unit.resources.ap.current >= 1 {
            BANKED_AP
        } else {
            0
        };
        unit.resources.ap.current = 0;
    }
    let (remaining, expired) = tick_status_effects(&unit.effects);
    unit.effects = remaining;
    let name = unit.name.clone();
    let banked = unit.side == Side::Player && unit.bonus_ap > 0;

    if banked {
        tx.float(unit_id, "+1 AP banked", FloatCategory::Info);
    }
    for effect in expired {
        tx.log(format!("{} on {name} wears off.", effect.name));
    }
}

fn start_new_round(tx: &mut Transition, config: &BattleConfig) {
    for unit in tx.session.players.iter_mut().filter(|unit| unit.is_alive()) {
        let max = unit.resources.ap.max;
        unit.resources.ap = Pool::new(max + unit.bonus_ap, max);
        unit.bonus_ap = 0;
    }
    for unit in tx.session.enemies.iter_mut().filter(|unit| unit.is_alive()) {
        unit.resources = on_turn_start(&unit.resources);
    }

    let session = &mut tx.session;
    session.turn_queue = build_turn_queue(&session.players, &session.enemies, config);
    session.turn_count += 1;
    session.stats.round_count += 1;
    session.stats.attacks_in_one_turn = 0;
    session.active_unit_id = session.turn_queue.first().cloned();
    if let Some(side) = session.active_unit().map(|unit| unit.side) {
        session.phase = Phase::for_side(side);
    }

    let round = session.stats.round_count;
    info!(round, "new round");
    tx.log(format!("Round {round} begins."));
}

/// 结束当前单位的回合并交给队列中下一个存活单位。
pub fn advance_turn(session: &BattleSession, ctx: &mut ActionContext<'_>) -> Resolution {
    if session.is_finished() {
        debug!("advance ignored: battle is over");
        return Resolution::unchanged(session);
    }
    if session.turn_queue.is_empty() {
        return Resolution::rejected(session, "No combatants are waiting to act.");
    }

    let mut tx = Transition::begin(session);
    let ending = session.active_unit_id.clone();
    if let Some(id) = ending.as_deref() {
        end_unit_turn(&mut tx, id, ctx.config);
    }

    let queue = &session.turn_queue;
    let next_index = ending
        .as_deref()
        .and_then(|id| queue.iter().position(|queued| queued == id))
        .map_or(queue.len(), |index| index + 1);

    // 本轮剩余部分里找第一个存活单位，找不到就开新一轮。
    let next_living = queue
        .iter()
        .skip(next_index)
        .find(|id| tx.session.unit(id).map_or(false, |unit| unit.is_alive()))
        .cloned();

    match next_living {
        Some(id) => {
            let side = tx.session.unit(&id).map(|unit| unit.side);
            tx.session.active_unit_id = Some(id);
            tx.session.stats.attacks_in_one_turn = 0;
            if let Some(side) = side {
                tx.session.phase = Phase::for_side(side);
            }
        }
        None => start_new_round(&mut tx, ctx.config),
    }

    if tx.session.phase != session.phase {
        info!(from = ?session.phase, to = ?tx.session.phase, "phase change");
    }
    if let Some(name) = tx.session.active_unit().map(|unit| unit.name.clone()) {
        tx.log(format!("{name} takes the initiative."));
    }
    tx.finish()
}

/// 序章脚本事件，不消耗随机数。
pub fn scripted_prologue_kill(
    session: &BattleSession,
    event: &PrologueKillAction,
    ctx: &mut ActionContext<'_>,
) -> Resolution {
    if session.is_finished() {
        return Resolution::unchanged(session);
    }
    let Some(victim) = session.unit(&event.victim_id) else {
        debug!(victim = %event.victim_id, "scripted kill skipped: victim absent");
        return Resolution::unchanged(session);
    };
    if victim.is_dead {
        debug!(victim = %event.victim_id, "scripted kill skipped: victim already dead");
        return Resolution::unchanged(session);
    }
    let fallen_rank = victim.rank;
    let victim_name = victim.name.clone();

    let mut tx = Transition::begin(session);
    if let Some(unit) = tx.session.unit_mut(&event.victim_id) {
        unit.resources.hp.current = 0;
        unit.is_dead = true;
    }
    tx.log(format!("{victim_name} is cut down before the fight truly begins."));
    tx.float(&event.victim_id, "DOWN", FloatCategory::Status);

    if session.unit(&event.reinforcement_id).is_some() {
        debug!(id = %event.reinforcement_id, "reinforcement already on the field");
    } else {
        let (recruit, cards) = spawn_player(
            event.reinforcement_class,
            &event.reinforcement_id,
            fallen_rank,
        );
        tx.log(format!("{} rushes in to take {victim_name}'s place.", recruit.name));
        tx.session.players.push(recruit);
        tx.session.player_hand.extend(cards);
    }

    tx.compact();
    let session_ref = &mut tx.session;
    session_ref.turn_queue =
        build_turn_queue(&session_ref.players, &session_ref.enemies, ctx.config);
    let keep_active = session_ref
        .active_unit()
        .map_or(false, |unit| unit.is_alive())
        && session_ref
            .active_unit_id
            .as_ref()
            .map_or(false, |id| session_ref.turn_queue.contains(id));
    if !keep_active {
        session_ref.active_unit_id = session_ref.turn_queue.first().cloned();
    }
    if let Some(side) = session_ref.active_unit().map(|unit| unit.side) {
        session_ref.phase = Phase::for_side(side);
    }

    if tx.session.all_enemies_dead() {
        declare_victory(&mut tx);
    } else if tx.session.all_players_dead() {
        declare_defeat(&mut tx);
    }
    tx.finish()
}

/// 唯一的外部入口：按动作类型路由到处理器。
pub fn dispatch(
    session: &BattleSession,
    action: &BattleAction,
    ctx: &mut ActionContext<'_>,
) -> Resolution {
    match action {
        BattleAction::AdvanceTurn => advance_turn(session, ctx),
        BattleAction::PlayCard { action } => play_card(session, action, ctx),
        BattleAction::EnemyAction { enemy_id } => enemy_action(session, enemy_id.as_deref(), ctx),
        BattleAction::ScriptedEventPrologueKill { event } => {
            scripted_prologue_kill(session, event, ctx)
        }
        BattleAction::SetSession { session } => {
            info!(scenario = %session.scenario, "session replaced");
            Resolution::new((**session).clone(), Vec::new())
        }
    }
}

/// 持有注入的随机源和配置，本身不保存战斗状态。
#[derive(Debug, Clone)]
pub struct BattleEngine<R: RollSource = SeededRolls> {
    config: BattleConfig,
    rolls: R,
}

impl<R: RollSource> BattleEngine<R> {
    pub fn new(config: BattleConfig, rolls: R) -> Self {
        Self { config, rolls }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    pub fn rolls(&self) -> &R {
        &self.rolls
    }

    pub fn dispatch(&mut self, session: &BattleSession, action: &BattleAction) -> Resolution {
        let mut ctx = ActionContext::new(&mut self.rolls, &self.config);
        dispatch(session, action, &mut ctx)
    }

    /// 依次执行一串动作，返回最终状态及全部事件。
    pub fn replay(&mut self, session: &BattleSession, actions: &[BattleAction]) -> Resolution {
        let mut current = Resolution::unchanged(session);
        for action in actions {
            let mut next = self.dispatch(&current.session, action);
            let mut events = std::mem::take(&mut current.events);
            events.append(&mut next.events);
            next.events = events;
            current = next;
        }
        current
    }
}

impl BattleEngine<SeededRolls> {
    pub fn seeded(config: BattleConfig, seed: u64) -> Self {
        Self::new(config, SeededRolls::from_seed(seed))
    }
}
