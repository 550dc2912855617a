//! 场景工厂：按场景编号生成阵容、手牌和开局的行动顺序。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::config::BattleConfig;
use super::effects::CardEffect;
use super::positioning::{build_turn_queue, compact_ranks};
use super::state::{
    BattleSession, CardType, Combatant, CombatCard, EnemyArchetype, Phase, Resources, Side,
};

/// 序章脚本中阵亡的单位。
pub const PROLOGUE_VICTIM: &str = "marshal";
/// 顶替阵亡者的援军。
pub const PROLOGUE_REINFORCEMENT: &str = "rookie";

const TEAM_SP_MAX: i32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScenarioError {
    #[error("unknown scenario `{0}`")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioId {
    #[default]
    Skirmish,
    Prologue,
    BossFight,
}

impl ScenarioId {
    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioId::Skirmish => "skirmish",
            ScenarioId::Prologue => "prologue",
            ScenarioId::BossFight => "boss_fight",
        }
    }

    fn title(self) -> &'static str {
        match self {
            ScenarioId::Skirmish => "Ambush at the Ford",
            ScenarioId::Prologue => "The Long Night",
            ScenarioId::BossFight => "The Warlord's Hall",
        }
    }
}

impl fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioId {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "skirmish" | "default" => Ok(ScenarioId::Skirmish),
            "prologue" | "tutorial" => Ok(ScenarioId::Prologue),
            "boss_fight" | "boss" => Ok(ScenarioId::BossFight),
            _ => Err(ScenarioError::Unknown(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlayerClass {
    Veteran,
    Scout,
    Medic,
    Recruit,
}

impl PlayerClass {
    fn title(self) -> &'static str {
        match self {
            PlayerClass::Veteran => "Veteran",
            PlayerClass::Scout => "Scout",
            PlayerClass::Medic => "Medic",
            PlayerClass::Recruit => "Recruit",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnemyTemplate {
    pub name: &'static str,
    pub archetype: EnemyArchetype,
    pub resources: Resources,
    pub armor: i32,
    pub initiative: i32,
}

static ENEMY_TEMPLATES: Lazy<HashMap<&'static str, EnemyTemplate>> = Lazy::new(|| {
    let mut templates = HashMap::new();
    templates.insert(
        "raider",
        EnemyTemplate {
            name: "Raider",
            archetype: EnemyArchetype::Grunt,
            resources: Resources::new(32, 2, 10, 40, 15),
            armor: 2,
            initiative: 4,
        },
    );
    templates.insert(
        "cultist",
        EnemyTemplate {
            name: "Cultist",
            archetype: EnemyArchetype::Grunt,
            resources: Resources::new(26, 2, 20, 30, 10),
            armor: 0,
            initiative: 3,
        },
    );
    templates.insert(
        "ravager",
        EnemyTemplate {
            name: "Ravager",
            archetype: EnemyArchetype::Brute,
            resources: Resources::new(55, 2, 10, 60, 30),
            armor: 5,
            initiative: 2,
        },
    );
    templates.insert(
        "warlord",
        EnemyTemplate {
            name: "Warlord",
            archetype: EnemyArchetype::Boss,
            resources: Resources::new(120, 3, 20, 80, 40),
            armor: 8,
            initiative: 5,
        },
    );
    templates
});

pub fn enemy_template(template_id: &str) -> Option<&'static EnemyTemplate> {
    ENEMY_TEMPLATES.get(template_id)
}

pub fn spawn_enemy(template_id: &str, id: &str, rank: u8) -> Option<Combatant> {
    let template = enemy_template(template_id)?;
    Some(
        Combatant::new(id, template.name, Side::Enemy, rank, template.resources)
            .with_template(template_id)
            .with_archetype(template.archetype)
            .with_armor(template.armor)
            .with_initiative(template.initiative),
    )
}

fn card(owner: &str, slug: &str, name: &str, card_type: CardType) -> CombatCard {
    CombatCard::new(format!("{owner}-{slug}"), name, card_type, owner)
}

fn reload(owner: &str) -> CombatCard {
    card(owner, "reload", "Reload", CardType::Reload).with_costs(1, 0)
}

/// 每个职业的起手牌，卡牌 id 为 `{持有者}-{卡名}`。
pub fn starter_hand(class: PlayerClass, owner: &str) -> Vec<CombatCard> {
    match class {
        PlayerClass::Veteran => vec![
            card(owner, "rifle-shot", "Rifle Shot", CardType::Attack)
                .with_costs(1, 5)
                .with_damage(14, 6)
                .with_range(2..=5)
                .with_ammo(1, 0.05),
            card(owner, "bayonet", "Bayonet Thrust", CardType::Attack)
                .with_costs(2, 10)
                .with_damage(18, 12)
                .with_range(1..=2),
            card(owner, "reposition", "Reposition", CardType::Movement).with_costs(1, 5),
            card(owner, "rally", "Rally", CardType::Voice).with_costs(1, 0),
            reload(owner),
        ],
        PlayerClass::Scout => vec![
            card(owner, "snap-shot", "Snap Shot", CardType::Attack)
                .with_costs(1, 5)
                .with_damage(10, 4)
                .with_range(2..=7)
                .with_ammo(1, 0.03)
                .with_accuracy(85),
            card(owner, "frag-grenade", "Frag Grenade", CardType::Attack)
                .with_costs(2, 15)
                .with_damage(8, 10)
                .with_range(3..=6)
                .with_effect(CardEffect::AoeRank),
            card(owner, "survey", "Survey", CardType::Analysis).with_costs(1, 0),
            card(owner, "dash", "Dash", CardType::Movement).with_costs(1, 10),
            reload(owner),
        ],
        PlayerClass::Medic => vec![
            card(owner, "field-dressing", "Field Dressing", CardType::Item)
                .with_costs(1, 0)
                .with_effect(CardEffect::Heal { amount: 15 })
                .targeting_allies(),
            card(owner, "triage", "Triage", CardType::Voice)
                .with_costs(2, 10)
                .with_effect(CardEffect::Heal { amount: 12 })
                .targeting_allies(),
            card(owner, "sidearm", "Sidearm", CardType::Attack)
                .with_costs(1, 5)
                .with_damage(8, 3)
                .with_range(1..=4)
                .with_ammo(1, 0.02),
            card(owner, "brace", "Brace", CardType::Defense).with_costs(1, 0),
            reload(owner),
        ],
        PlayerClass::Recruit => vec![
            card(owner, "shove", "Shove", CardType::Attack)
                .with_costs(1, 10)
                .with_damage(9, 8)
                .with_range(1..=2),
            card(owner, "hold-the-line", "Hold the Line", CardType::Defense).with_costs(1, 0),
            card(owner, "step-up", "Step Up", CardType::Movement).with_costs(1, 5),
            card(owner, "shout", "Shout", CardType::Voice).with_costs(1, 0),
        ],
    }
}

/// 生成玩家单位及其起手牌。
pub fn spawn_player(class: PlayerClass, id: &str, rank: u8) -> (Combatant, Vec<CombatCard>) {
    let unit = match class {
        PlayerClass::Veteran => {
            Combatant::new(id, class.title(), Side::Player, rank, Resources::new(60, 3, 30, 60, 30))
                .with_armor(4)
                .with_ammo(6)
                .with_initiative(3)
                .with_voice("perception", 20)
                .with_voice("authority", 30)
        }
        PlayerClass::Scout => {
            Combatant::new(id, class.title(), Side::Player, rank, Resources::new(45, 3, 40, 50, 20))
                .with_armor(1)
                .with_ammo(4)
                .with_initiative(6)
                .with_voice("perception", 40)
        }
        PlayerClass::Medic => {
            Combatant::new(id, class.title(), Side::Player, rank, Resources::new(40, 3, 30, 50, 20))
                .with_armor(1)
                .with_ammo(2)
                .with_initiative(1)
                .with_voice("perception", 10)
                .with_voice("empathy", 35)
        }
        PlayerClass::Recruit => {
            Combatant::new(id, class.title(), Side::Player, rank, Resources::new(50, 3, 10, 60, 25))
                .with_armor(2)
                .with_initiative(2)
                .with_voice("perception", 5)
        }
    };
    (unit, starter_hand(class, id))
}

fn roster(scenario: ScenarioId) -> (Vec<(PlayerClass, &'static str)>, Vec<(&'static str, &'static str)>) {
    match scenario {
        ScenarioId::Skirmish => (
            vec![
                (PlayerClass::Veteran, "vet"),
                (PlayerClass::Scout, "scout"),
                (PlayerClass::Medic, "medic"),
            ],
            vec![("raider", "raider-1"), ("raider", "raider-2"), ("ravager", "ravager")],
        ),
        ScenarioId::Prologue => (
            vec![(PlayerClass::Veteran, PROLOGUE_VICTIM), (PlayerClass::Scout, "scout")],
            vec![("cultist", "cultist-1"), ("cultist", "cultist-2"), ("raider", "raider")],
        ),
        ScenarioId::BossFight => (
            vec![
                (PlayerClass::Veteran, "vet"),
                (PlayerClass::Recruit, "recruit"),
                (PlayerClass::Scout, "scout"),
                (PlayerClass::Medic, "medic"),
            ],
            vec![("warlord", "warlord"), ("raider", "raider-1"), ("raider", "raider-2")],
        ),
    }
}

/// 会话的唯一构造入口（整体替换除外）。
pub fn build_session(scenario: ScenarioId, config: &BattleConfig) -> BattleSession {
    let (player_slots, enemy_slots) = roster(scenario);

    let mut players = Vec::with_capacity(player_slots.len());
    let mut hand = Vec::new();
    for (slot, (class, id)) in player_slots.into_iter().enumerate() {
        let (unit, cards) = spawn_player(class, id, rank_for(slot));
        players.push(unit);
        hand.extend(cards);
    }
    let enemies: Vec<Combatant> = enemy_slots
        .into_iter()
        .enumerate()
        .filter_map(|(slot, (template, id))| spawn_enemy(template, id, rank_for(slot)))
        .collect();

    let mut session = BattleSession::new(
        scenario.as_str(),
        compact_ranks(&players),
        compact_ranks(&enemies),
        hand,
    );
    session.turn_queue = build_turn_queue(&session.players, &session.enemies, config);
    session.active_unit_id = session.turn_queue.first().cloned();
    session.phase = session
        .active_unit()
        .map_or(Phase::Resolution, |unit| Phase::for_side(unit.side));
    session.turn_count = 1;
    session.stats.round_count = 1;
    session.max_team_sp = TEAM_SP_MAX;

    let opener = session.active_unit().map(|unit| unit.name.clone());
    session.logs.push(format!("{}: battle begins.", scenario.title()));
    if let Some(name) = opener {
        session.logs.push(format!("{name} takes the initiative."));
    }
    info!(%scenario, units = session.turn_queue.len(), "session created");
    session
}

fn rank_for(slot: usize) -> u8 {
    u8::try_from(slot + 1).unwrap_or(u8::MAX)
}
