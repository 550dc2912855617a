use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use super::effects::{CardEffect, StatusEffect};

/// 战斗单位的唯一标识。
pub type UnitId = String;
/// 卡牌实例的唯一标识。
pub type CardId = String;

pub const MIN_RANK: u8 = 1;
pub const MAX_RANK: u8 = 4;
pub const PP_MAX: i32 = 100;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Player,
    Enemy,
}

/// (current, max) 资源池。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Pool {
    pub current: i32,
    pub max: i32,
}

impl Pool {
    pub fn new(current: i32, max: i32) -> Self {
        Self { current, max }
    }

    pub fn full(max: i32) -> Self {
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

/// 单位的全部资源池。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Resources {
    pub hp: Pool,
    pub ap: Pool,
    /// 语音/分析行动使用的次级资源，也决定先攻。
    pub sp: Pool,
    pub stamina: Pool,
    pub stagger: Pool,
    pub pp: Pool,
}

impl Resources {
    pub fn new(hp: i32, ap: i32, sp: i32, stamina: i32, stagger: i32) -> Self {
        Self {
            hp: Pool::full(hp),
            ap: Pool::full(ap),
            sp: Pool::full(sp),
            stamina: Pool::full(stamina),
            stagger: Pool::full(stagger),
            pp: Pool::new(0, PP_MAX),
        }
    }
}

/// 敌方行为档位，取代按名字匹配的 AI 分派。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EnemyArchetype {
    Boss,
    Brute,
    Grunt,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Combatant {
    pub id: UnitId,
    pub name: String,
    pub side: Side,
    pub rank: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<EnemyArchetype>,
    pub resources: Resources,
    #[serde(default)]
    pub bonus_ap: i32,
    #[serde(default)]
    pub armor: i32,
    #[serde(default)]
    pub ammo: i32,
    #[serde(default)]
    pub weapon_heat: i32,
    #[serde(default)]
    pub is_jammed: bool,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<StatusEffect>,
    #[serde(default)]
    pub initiative: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub voices: BTreeMap<String, i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threat_level: Option<u8>,
    #[serde(default)]
    pub scanned_level: u8,
}

impl Combatant {
    pub fn new(
        id: impl Into<UnitId>,
        name: impl Into<String>,
        side: Side,
        rank: u8,
        resources: Resources,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            side,
            rank: rank.clamp(MIN_RANK, MAX_RANK),
            template_id: None,
            archetype: None,
            resources,
            bonus_ap: 0,
            armor: 0,
            ammo: 0,
            weapon_heat: 0,
            is_jammed: false,
            is_dead: false,
            effects: Vec::new(),
            initiative: 0,
            voices: BTreeMap::new(),
            threat_level: None,
            scanned_level: 0,
        }
    }

    pub fn with_armor(mut self, armor: i32) -> Self {
        self.armor = armor;
        self
    }

    pub fn with_ammo(mut self, ammo: i32) -> Self {
        self.ammo = ammo;
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>, level: i32) -> Self {
        self.voices.insert(voice.into(), level);
        self
    }

    pub fn with_archetype(mut self, archetype: EnemyArchetype) -> Self {
        self.archetype = Some(archetype);
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    pub fn with_initiative(mut self, initiative: i32) -> Self {
        self.initiative = initiative;
        self
    }

    pub fn with_threat(mut self, threat_level: u8) -> Self {
        self.threat_level = Some(threat_level);
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead
    }

    pub fn voice(&self, name: &str) -> i32 {
        self.voices.get(name).copied().unwrap_or(0)
    }

    pub fn perception(&self) -> i32 {
        self.voice("perception")
    }

    pub fn distance_to(&self, other: &Combatant) -> u8 {
        lane_distance(self.rank, other.rank)
    }
}

/// 两个单位之间的车道距离：rankA + rankB - 1。
pub fn lane_distance(a: u8, b: u8) -> u8 {
    a.saturating_add(b).saturating_sub(1)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Attack,
    Movement,
    Defense,
    Voice,
    Item,
    Analysis,
    Reload,
}

/// 行动卡定义，每张卡绑定一个持有者。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CombatCard {
    pub id: CardId,
    pub name: String,
    #[serde(rename = "type")]
    pub card_type: CardType,
    #[serde(default)]
    pub ap_cost: i32,
    #[serde(default)]
    pub stamina_cost: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ammo_cost: Option<i32>,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub impact: i32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub optimal_range: Vec<u8>,
    #[serde(default)]
    pub jam_chance: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<CardEffect>,
    #[serde(default)]
    pub target_allies: bool,
    pub owner_id: UnitId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<u8>,
}

impl CombatCard {
    pub fn new(
        id: impl Into<CardId>,
        name: impl Into<String>,
        card_type: CardType,
        owner_id: impl Into<UnitId>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            card_type,
            ap_cost: 0,
            stamina_cost: 0,
            ammo_cost: None,
            damage: 0,
            impact: 0,
            optimal_range: Vec::new(),
            jam_chance: 0.0,
            effects: Vec::new(),
            target_allies: false,
            owner_id: owner_id.into(),
            accuracy: None,
        }
    }

    pub fn with_costs(mut self, ap_cost: i32, stamina_cost: i32) -> Self {
        self.ap_cost = ap_cost;
        self.stamina_cost = stamina_cost;
        self
    }

    pub fn with_damage(mut self, damage: i32, impact: i32) -> Self {
        self.damage = damage;
        self.impact = impact;
        self
    }

    pub fn with_range(mut self, range: impl IntoIterator<Item = u8>) -> Self {
        self.optimal_range = range.into_iter().collect();
        self
    }

    pub fn with_ammo(mut self, ammo_cost: i32, jam_chance: f64) -> Self {
        self.ammo_cost = Some(ammo_cost);
        self.jam_chance = jam_chance;
        self
    }

    pub fn with_effect(mut self, effect: CardEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn targeting_allies(mut self) -> Self {
        self.target_allies = true;
        self
    }

    pub fn with_accuracy(mut self, accuracy: u8) -> Self {
        self.accuracy = Some(accuracy);
        self
    }
}

/// 战斗阶段，VICTORY/DEFEAT 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    PlayerTurn,
    EnemyTurn,
    Resolution,
    Victory,
    Defeat,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Victory | Phase::Defeat)
    }

    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Player => Phase::PlayerTurn,
            Side::Enemy => Phase::EnemyTurn,
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Resolution
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SessionStats {
    pub damage_taken: i32,
    pub attacks_in_one_turn: u32,
    pub round_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FloatCategory {
    Damage,
    Heal,
    Miss,
    Block,
    Status,
    Info,
}

/// 处理器返回给驱动层的旁路通知，不影响控制流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BattleEvent {
    Log {
        text: String,
    },
    FloatingText {
        unit_id: UnitId,
        text: String,
        category: FloatCategory,
    },
    UnlockRequested {
        achievement_id: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum IntegrityError {
    #[error("duplicate unit id `{unit_id}`")]
    DuplicateUnitId { unit_id: UnitId },
    #[error("duplicate card id `{card_id}`")]
    DuplicateCardId { card_id: CardId },
    #[error("active unit `{unit_id}` is not a living member of the turn queue")]
    ActiveUnitInvalid { unit_id: UnitId },
    #[error("unit `{unit_id}` has rank {rank} outside 1..=4")]
    RankOutOfRange { unit_id: UnitId, rank: u8 },
    #[error("unit `{unit_id}` has hp {value} outside its pool")]
    HealthOutOfRange { unit_id: UnitId, value: i32 },
    #[error("card `{card_id}` carries a negative cost or effect value")]
    InvalidCardValues { card_id: CardId },
}

/// 整场战斗的聚合根，每次状态转移都整体替换。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BattleSession {
    #[serde(default)]
    pub scenario: String,
    pub phase: Phase,
    pub players: Vec<Combatant>,
    pub enemies: Vec<Combatant>,
    #[serde(default)]
    pub player_hand: Vec<CombatCard>,
    #[serde(default)]
    pub turn_queue: Vec<UnitId>,
    #[serde(default)]
    pub active_unit_id: Option<UnitId>,
    #[serde(default)]
    pub stats: SessionStats,
    #[serde(default)]
    pub turn_count: u32,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub team_sp: i32,
    #[serde(default)]
    pub max_team_sp: i32,
}

impl BattleSession {
    pub fn new(
        scenario: impl Into<String>,
        players: Vec<Combatant>,
        enemies: Vec<Combatant>,
        player_hand: Vec<CombatCard>,
    ) -> Self {
        Self {
            scenario: scenario.into(),
            phase: Phase::default(),
            players,
            enemies,
            player_hand,
            turn_queue: Vec::new(),
            active_unit_id: None,
            stats: SessionStats::default(),
            turn_count: 0,
            logs: Vec::new(),
            team_sp: 0,
            max_team_sp: 0,
        }
    }

    pub fn units(&self) -> impl Iterator<Item = &Combatant> {
        self.players.iter().chain(self.enemies.iter())
    }

    pub fn unit(&self, id: &str) -> Option<&Combatant> {
        self.units().find(|unit| unit.id == id)
    }

    pub fn unit_mut(&mut self, id: &str) -> Option<&mut Combatant> {
        self.players
            .iter_mut()
            .chain(self.enemies.iter_mut())
            .find(|unit| unit.id == id)
    }

    pub fn active_unit(&self) -> Option<&Combatant> {
        self.active_unit_id.as_deref().and_then(|id| self.unit(id))
    }

    pub fn card(&self, card_id: &str) -> Option<&CombatCard> {
        self.player_hand.iter().find(|card| card.id == card_id)
    }

    /// 当前行动单位可用的手牌。
    pub fn active_hand(&self) -> Vec<&CombatCard> {
        match self.active_unit_id.as_deref() {
            Some(active) => self
                .player_hand
                .iter()
                .filter(|card| card.owner_id == active)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn living_players(&self) -> impl Iterator<Item = &Combatant> {
        self.players.iter().filter(|unit| unit.is_alive())
    }

    pub fn living_enemies(&self) -> impl Iterator<Item = &Combatant> {
        self.enemies.iter().filter(|unit| unit.is_alive())
    }

    pub fn all_players_dead(&self) -> bool {
        self.living_players().next().is_none()
    }

    pub fn all_enemies_dead(&self) -> bool {
        self.living_enemies().next().is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    /// 只保留存活玩家方单位的卡牌。
    pub fn refresh_player_hand(&mut self) {
        let living: HashSet<&str> = self
            .players
            .iter()
            .filter(|unit| unit.is_alive())
            .map(|unit| unit.id.as_str())
            .collect();
        let hand = std::mem::take(&mut self.player_hand);
        self.player_hand = hand
            .into_iter()
            .filter(|card| living.contains(card.owner_id.as_str()))
            .collect();
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let mut seen_units = HashSet::new();
        for unit in self.units() {
            if !seen_units.insert(unit.id.as_str()) {
                return Err(IntegrityError::DuplicateUnitId {
                    unit_id: unit.id.clone(),
                });
            }
            if !(MIN_RANK..=MAX_RANK).contains(&unit.rank) {
                return Err(IntegrityError::RankOutOfRange {
                    unit_id: unit.id.clone(),
                    rank: unit.rank,
                });
            }
            let hp = unit.resources.hp;
            if hp.current < 0 || hp.current > hp.max {
                return Err(IntegrityError::HealthOutOfRange {
                    unit_id: unit.id.clone(),
                    value: hp.current,
                });
            }
        }

        let mut seen_cards = HashSet::new();
        for card in &self.player_hand {
            if !seen_cards.insert(card.id.as_str()) {
                return Err(IntegrityError::DuplicateCardId {
                    card_id: card.id.clone(),
                });
            }
            if !card.has_valid_values() {
                return Err(IntegrityError::InvalidCardValues {
                    card_id: card.id.clone(),
                });
            }
        }

        if let Some(active) = &self.active_unit_id {
            let queued = self.turn_queue.iter().any(|id| id == active);
            let alive = self.unit(active).map_or(false, Combatant::is_alive);
            if !queued || !alive {
                return Err(IntegrityError::ActiveUnitInvalid {
                    unit_id: active.clone(),
                });
            }
        }

        Ok(())
    }
}
