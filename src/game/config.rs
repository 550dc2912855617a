use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse battle config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid battle config: {field} = {value} ({reason})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },
}

/// 平衡参数。所有数值公式都从这里取常量。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BattleConfig {
    /// 玩家攻击卡默认命中率（百分比）。
    pub player_base_accuracy: u8,
    /// 每点未使用 AP 提供的闪避率。
    pub dodge_per_ap: f64,
    pub dodge_cap: f64,
    pub hit_floor: f64,
    pub hit_ceiling: f64,
    pub penetration_per_perception: f64,
    pub block_per_armor: f64,
    pub block_cap: f64,
    pub stamina_regen: i32,
    pub stagger_regen: i32,
    pub player_initiative_bonus: i32,
    pub voice_stamina_restore: i32,
    pub reload_amount: i32,
    pub max_ammo: i32,
    /// 每点枪管热量额外增加的卡壳率。
    pub heat_jam_step: f64,
    pub pp_gain_on_hit: i32,
    pub max_scan_level: u8,
    pub combo_threshold: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            player_base_accuracy: 75,
            dodge_per_ap: 0.05,
            dodge_cap: 0.4,
            hit_floor: 0.05,
            hit_ceiling: 0.95,
            penetration_per_perception: 0.02,
            block_per_armor: 0.1,
            block_cap: 0.9,
            stamina_regen: 15,
            stagger_regen: 5,
            player_initiative_bonus: 5,
            voice_stamina_restore: 20,
            reload_amount: 3,
            max_ammo: 6,
            heat_jam_step: 0.02,
            pp_gain_on_hit: 10,
            max_scan_level: 2,
            combo_threshold: 3,
        }
    }
}

impl BattleConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: BattleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let probabilities = [
            ("dodge_per_ap", self.dodge_per_ap),
            ("dodge_cap", self.dodge_cap),
            ("hit_floor", self.hit_floor),
            ("hit_ceiling", self.hit_ceiling),
            ("block_cap", self.block_cap),
            ("heat_jam_step", self.heat_jam_step),
        ];
        for (field, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    reason: "must be a probability in [0, 1]",
                });
            }
        }
        if self.hit_floor > self.hit_ceiling {
            return Err(ConfigError::OutOfRange {
                field: "hit_floor",
                value: self.hit_floor,
                reason: "must not exceed hit_ceiling",
            });
        }
        if self.player_base_accuracy > 100 {
            return Err(ConfigError::OutOfRange {
                field: "player_base_accuracy",
                value: f64::from(self.player_base_accuracy),
                reason: "is a percentage",
            });
        }
        Ok(())
    }
}
