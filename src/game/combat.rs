//! 命中/闪避判定与护甲格挡。随机数全部来自注入的 [`RollSource`]。

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::config::BattleConfig;
use super::state::Combatant;

/// 每次调用返回一个 [0, 1) 的样本。
pub trait RollSource {
    fn roll(&mut self) -> f64;
}

impl<T: RollSource + ?Sized> RollSource for &mut T {
    fn roll(&mut self) -> f64 {
        (**self).roll()
    }
}

impl<T: RollSource + ?Sized> RollSource for Box<T> {
    fn roll(&mut self) -> f64 {
        (**self).roll()
    }
}

/// 生产环境使用的可复现随机源。
#[derive(Debug, Clone)]
pub struct SeededRolls {
    rng: SmallRng,
}

impl SeededRolls {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }
}

impl RollSource for SeededRolls {
    fn roll(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// 按脚本循环返回固定样本，测试与回放用。
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedRolls {
    values: Vec<f64>,
    cursor: usize,
}

impl ScriptedRolls {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    pub fn drawn(&self) -> usize {
        self.cursor
    }
}

impl RollSource for ScriptedRolls {
    fn roll(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

/// 把任意闭包当作随机源。
pub struct RollFn<F>(pub F);

impl<F: FnMut() -> f64> RollSource for RollFn<F> {
    fn roll(&mut self) -> f64 {
        (self.0)()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AttackRoll {
    pub hit: bool,
    pub roll: f64,
    pub dodge_chance: f64,
    pub needed_threshold: f64,
}

/// 防御方囤积的 AP 越多越难命中。
pub fn dodge_chance(defender: &Combatant, config: &BattleConfig) -> f64 {
    let banked = (defender.resources.ap.current + defender.bonus_ap).max(0);
    (f64::from(banked) * config.dodge_per_ap).min(config.dodge_cap)
}

/// 一次抽样同时决定命中与闪避。
pub fn resolve_attack(
    _attacker: &Combatant,
    defender: &Combatant,
    base_accuracy: u8,
    rng: &mut dyn RollSource,
    config: &BattleConfig,
) -> AttackRoll {
    let roll = rng.roll();
    let dodge_chance = dodge_chance(defender, config);
    let needed_threshold = (f64::from(base_accuracy) / 100.0 - dodge_chance)
        .clamp(config.hit_floor, config.hit_ceiling);
    AttackRoll {
        hit: roll < needed_threshold,
        roll,
        dodge_chance,
        needed_threshold,
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ArmorOutcome {
    pub penetration: f64,
    pub effective_armor: f64,
    pub block_chance: f64,
    pub blocked: bool,
    pub damage: i32,
}

pub fn block_chance(perception: i32, armor: i32, config: &BattleConfig) -> (f64, f64, f64) {
    let penetration = (f64::from(perception.max(0)) * config.penetration_per_perception).min(1.0);
    let effective_armor = f64::from(armor.max(0)) * (1.0 - penetration);
    let block = (effective_armor * config.block_per_armor).min(config.block_cap);
    (penetration, effective_armor, block)
}

/// 玩家攻击卡专用的穿甲/格挡判定，独立抽样一次。
pub fn armor_gate(
    card_damage: i32,
    perception: i32,
    armor: i32,
    rng: &mut dyn RollSource,
    config: &BattleConfig,
) -> ArmorOutcome {
    let (penetration, effective_armor, block_chance) = block_chance(perception, armor, config);
    let blocked = rng.roll() < block_chance;
    let raw = if blocked { card_damage / 2 } else { card_damage };
    ArmorOutcome {
        penetration,
        effective_armor,
        block_chance,
        blocked,
        damage: raw.max(1),
    }
}

/// 敌方攻击不走格挡，直接减去护甲。
pub fn flat_mitigation(damage: i32, armor: i32) -> i32 {
    (damage - armor.max(0)).max(1)
}
