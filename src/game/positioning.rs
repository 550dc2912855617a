//! rank 压缩与先攻顺序。

use super::config::BattleConfig;
use super::state::{Combatant, Side, UnitId, MAX_RANK};

/// 存活单位按 (rank, id) 排序后重新分配 1..N（上限 4），死亡单位保持原 rank。
pub fn compact_ranks(units: &[Combatant]) -> Vec<Combatant> {
    let mut order: Vec<usize> = units
        .iter()
        .enumerate()
        .filter(|(_, unit)| unit.is_alive())
        .map(|(index, _)| index)
        .collect();
    order.sort_by(|&a, &b| {
        units[a]
            .rank
            .cmp(&units[b].rank)
            .then_with(|| units[a].id.cmp(&units[b].id))
    });

    let mut compacted = units.to_vec();
    for (slot, index) in order.into_iter().enumerate() {
        let rank = u8::try_from(slot + 1).unwrap_or(MAX_RANK).min(MAX_RANK);
        compacted[index].rank = rank;
    }
    compacted
}

pub fn compute_initiative(unit: &Combatant, config: &BattleConfig) -> i32 {
    let side_bonus = match unit.side {
        Side::Player => config.player_initiative_bonus,
        Side::Enemy => 0,
    };
    unit.initiative + unit.resources.sp.current / 10 + side_bonus
}

/// 只在开战和新一轮开始时重建；同先攻按原顺序（玩家在前）。
pub fn build_turn_queue(
    players: &[Combatant],
    enemies: &[Combatant],
    config: &BattleConfig,
) -> Vec<UnitId> {
    let mut living: Vec<(i32, &Combatant)> = players
        .iter()
        .chain(enemies.iter())
        .filter(|unit| unit.is_alive())
        .map(|unit| (compute_initiative(unit, config), unit))
        .collect();
    living.sort_by(|a, b| b.0.cmp(&a.0));
    living.into_iter().map(|(_, unit)| unit.id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Resources;

    fn unit(id: &str, side: Side, rank: u8, sp: i32) -> Combatant {
        Combatant::new(id, id, side, rank, Resources::new(30, 3, sp, 50, 20))
    }

    #[test]
    fn compaction_closes_gaps_and_skips_the_dead() {
        let mut units = vec![
            unit("c", Side::Player, 4, 10),
            unit("a", Side::Player, 1, 10),
            unit("b", Side::Player, 2, 10),
        ];
        units[2].is_dead = true;
        let compacted = compact_ranks(&units);
        assert_eq!(compacted[1].rank, 1);
        assert_eq!(compacted[0].rank, 2);
        assert_eq!(compacted[2].rank, 2, "dead unit keeps its rank");
    }

    #[test]
    fn compaction_breaks_rank_ties_by_id() {
        let units = vec![unit("b", Side::Enemy, 1, 10), unit("a", Side::Enemy, 1, 10)];
        let compacted = compact_ranks(&units);
        assert_eq!(compacted[1].rank, 1);
        assert_eq!(compacted[0].rank, 2);
    }

    #[test]
    fn compaction_is_idempotent() {
        let mut units = vec![
            unit("d", Side::Enemy, 3, 10),
            unit("a", Side::Enemy, 3, 10),
            unit("x", Side::Enemy, 1, 10),
        ];
        units[0].is_dead = true;
        let once = compact_ranks(&units);
        assert_eq!(compact_ranks(&once), once);
    }

    #[test]
    fn initiative_reads_sp_and_side() {
        let config = BattleConfig::default();
        let player = unit("p", Side::Player, 1, 35);
        let enemy = unit("e", Side::Enemy, 1, 35).with_initiative(2);
        assert_eq!(compute_initiative(&player, &config), 3 + config.player_initiative_bonus);
        assert_eq!(compute_initiative(&enemy, &config), 5);
    }

    #[test]
    fn turn_queue_sorts_descending_and_keeps_ties_stable() {
        let config = BattleConfig {
            player_initiative_bonus: 0,
            ..BattleConfig::default()
        };
        let players = vec![unit("p1", Side::Player, 1, 10), unit("p2", Side::Player, 2, 50)];
        let mut enemies = vec![unit("e1", Side::Enemy, 1, 10), unit("e2", Side::Enemy, 2, 90)];
        enemies[1].is_dead = true;
        let queue = build_turn_queue(&players, &enemies, &config);
        assert_eq!(queue, vec!["p2", "p1", "e1"]);
    }
}
