use serde::{Deserialize, Serialize};

use super::state::{CardType, CombatCard};

/// 卡牌附带的效果描述。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardEffect {
    Heal { amount: i32 },
    /// 命中目标所在 rank 上的全部存活敌人。
    AoeRank,
    AoeAll,
}

/// 攻击卡的波及范围。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaOfEffect {
    Single,
    Rank,
    All,
}

impl CombatCard {
    pub fn heal_amount(&self) -> Option<i32> {
        self.effects.iter().find_map(|effect| match effect {
            CardEffect::Heal { amount } => Some(*amount),
            _ => None,
        })
    }

    pub fn area(&self) -> AreaOfEffect {
        if self.effects.contains(&CardEffect::AoeAll) {
            AreaOfEffect::All
        } else if self.effects.contains(&CardEffect::AoeRank) {
            AreaOfEffect::Rank
        } else {
            AreaOfEffect::Single
        }
    }

    pub fn needs_ammo(&self) -> bool {
        self.card_type == CardType::Attack && self.ammo_cost.map_or(false, |cost| cost > 0)
    }

    /// 消耗、伤害、冲击与治疗量都不能为负。
    pub fn has_valid_values(&self) -> bool {
        let costs = [
            self.ap_cost,
            self.stamina_cost,
            self.ammo_cost.unwrap_or(0),
            self.damage,
            self.impact,
            self.heal_amount().unwrap_or(0),
        ];
        costs.iter().all(|value| *value >= 0) && (0.0..=1.0).contains(&self.jam_chance)
    }

    /// optimal_range 为空表示不限距离。
    pub fn in_range(&self, distance: u8) -> bool {
        self.optimal_range.is_empty() || self.optimal_range.contains(&distance)
    }
}

/// 持续若干回合的状态效果。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusEffect {
    pub id: String,
    pub name: String,
    pub turns_left: u8,
}

impl StatusEffect {
    pub fn new(id: impl Into<String>, name: impl Into<String>, turns_left: u8) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            turns_left,
        }
    }
}

/// 回合结束时递减所有状态效果，返回本次到期的效果。
pub fn tick_status_effects(effects: &[StatusEffect]) -> (Vec<StatusEffect>, Vec<StatusEffect>) {
    let mut remaining = Vec::with_capacity(effects.len());
    let mut expired = Vec::new();
    for effect in effects {
        let mut next = effect.clone();
        next.turns_left = next.turns_left.saturating_sub(1);
        if next.turns_left == 0 {
            expired.push(next);
        } else {
            remaining.push(next);
        }
    }
    (remaining, expired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_prefers_widest_effect() {
        let mut card = CombatCard::new("c1", "Grenade", CardType::Attack, "p1");
        assert_eq!(card.area(), AreaOfEffect::Single);
        card.effects = vec![CardEffect::AoeRank, CardEffect::AoeAll];
        assert_eq!(card.area(), AreaOfEffect::All);
    }

    #[test]
    fn empty_range_is_unrestricted() {
        let mut card = CombatCard::new("c1", "Jab", CardType::Attack, "p1");
        assert!(card.in_range(7));
        card.optimal_range = vec![1, 2];
        assert!(card.in_range(2));
        assert!(!card.in_range(3));
    }

    #[test]
    fn status_effects_expire_at_zero() {
        let effects = vec![
            StatusEffect::new("burn", "Burning", 1),
            StatusEffect::new("guard", "Guarded", 3),
        ];
        let (remaining, expired) = tick_status_effects(&effects);
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "burn");
        assert_eq!(remaining[0].turns_left, 2);
    }

    #[test]
    fn heal_effect_serializes_with_tag() {
        let json = serde_json::to_string(&CardEffect::Heal { amount: 12 }).unwrap();
        assert_eq!(json, r#"{"type":"heal","amount":12}"#);
        let aoe: CardEffect = serde_json::from_str(r#"{"type":"aoe_rank"}"#).unwrap();
        assert_eq!(aoe, CardEffect::AoeRank);
    }
}
