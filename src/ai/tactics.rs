use std::collections::HashMap;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use crate::game::combat::{flat_mitigation, resolve_attack};
use crate::game::rules::{apply_hit, declare_defeat, ActionContext, Resolution, Transition};
use crate::game::scenario::enemy_template;
use crate::game::state::{BattleSession, Combatant, EnemyArchetype, FloatCategory, Phase, MIN_RANK};

/// 敌方的一种攻击手段。
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct EnemyMove {
    pub name: &'static str,
    /// 可达的最大车道距离。
    pub reach: u8,
    pub damage: i32,
    pub impact: i32,
    pub accuracy: u8,
    /// 同时波及的目标数，cleave 为 2。
    pub targets: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnemyProfile {
    pub archetype: EnemyArchetype,
    pub threat: u8,
    /// 按优先级排列，取第一个够得着的招式。
    pub moves: Vec<EnemyMove>,
}

impl EnemyProfile {
    pub fn pick(&self, distance: u8) -> Option<&EnemyMove> {
        self.moves.iter().find(|candidate| distance <= candidate.reach)
    }
}

static PROFILES: Lazy<HashMap<EnemyArchetype, EnemyProfile>> = Lazy::new(|| {
    let boss = EnemyProfile {
        archetype: EnemyArchetype::Boss,
        threat: 3,
        moves: vec![
            EnemyMove {
                name: "Crushing Blow",
                reach: 2,
                damage: 18,
                impact: 15,
                accuracy: 80,
                targets: 1,
            },
            EnemyMove {
                name: "Chain Lash",
                reach: 3,
                damage: 12,
                impact: 8,
                accuracy: 70,
                targets: 1,
            },
        ],
    };
    let brute = EnemyProfile {
        archetype: EnemyArchetype::Brute,
        threat: 2,
        moves: vec![EnemyMove {
            name: "Cleave",
            reach: 3,
            damage: 10,
            impact: 10,
            accuracy: 70,
            targets: 2,
        }],
    };
    let grunt = EnemyProfile {
        archetype: EnemyArchetype::Grunt,
        threat: 1,
        moves: vec![EnemyMove {
            name: "Shiv",
            reach: 2,
            damage: 8,
            impact: 5,
            accuracy: 75,
            targets: 1,
        }],
    };
    [boss, brute, grunt]
        .into_iter()
        .map(|profile| (profile.archetype, profile))
        .collect()
});

impl FromStr for EnemyArchetype {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boss" => Ok(EnemyArchetype::Boss),
            "brute" | "elite" => Ok(EnemyArchetype::Brute),
            "grunt" | "minion" => Ok(EnemyArchetype::Grunt),
            _ => Err(()),
        }
    }
}

/// 显式档位优先，其次查模板表，都没有按杂兵处理。
pub fn archetype_of(unit: &Combatant) -> EnemyArchetype {
    unit.archetype
        .or_else(|| {
            unit.template_id
                .as_deref()
                .and_then(enemy_template)
                .map(|template| template.archetype)
        })
        .unwrap_or(EnemyArchetype::Grunt)
}

pub fn profile_for(archetype: EnemyArchetype) -> &'static EnemyProfile {
    &PROFILES[&archetype]
}

pub fn threat_of(unit: &Combatant) -> u8 {
    profile_for(archetype_of(unit)).threat
}

/// 最近的存活玩家，同距离按数组顺序。
fn nearest_player<'a>(session: &'a BattleSession, enemy: &Combatant) -> Option<&'a Combatant> {
    session
        .living_players()
        .fold(None, |best: Option<&Combatant>, unit| match best {
            Some(current) if enemy.distance_to(current) <= enemy.distance_to(unit) => Some(current),
            _ => Some(unit),
        })
}

/// 与主目标相邻 rank 上、招式够得着的最近另一名存活玩家。
fn cleave_partner<'a>(
    session: &'a BattleSession,
    enemy: &Combatant,
    primary: &Combatant,
    chosen: &EnemyMove,
) -> Option<&'a Combatant> {
    session
        .living_players()
        .filter(|unit| unit.id != primary.id && unit.rank.abs_diff(primary.rank) <= 1)
        .filter(|unit| enemy.distance_to(unit) <= chosen.reach)
        .fold(None, |best: Option<&Combatant>, unit| match best {
            Some(current) if enemy.distance_to(current) <= enemy.distance_to(unit) => Some(current),
            _ => Some(unit),
        })
}

pub fn enemy_action(
    session: &BattleSession,
    enemy_id: Option<&str>,
    ctx: &mut ActionContext<'_>,
) -> Resolution {
    if session.phase != Phase::EnemyTurn {
        debug!(phase = ?session.phase, "enemy action ignored outside the enemy turn");
        return Resolution::unchanged(session);
    }
    let acting_id = session.active_unit_id.as_deref();
    if enemy_id.is_some() && enemy_id != acting_id {
        debug!(
            requested = ?enemy_id,
            active = ?acting_id,
            "enemy action ignored: not this unit's turn"
        );
        return Resolution::unchanged(session);
    }
    let Some(enemy) = acting_id
        .and_then(|id| session.living_enemies().find(|unit| unit.id == id))
        .cloned()
    else {
        debug!(enemy = ?acting_id, "enemy action ignored: no living actor");
        return Resolution::unchanged(session);
    };
    let Some(primary) = nearest_player(session, &enemy).cloned() else {
        return Resolution::unchanged(session);
    };

    let archetype = archetype_of(&enemy);
    let profile = profile_for(archetype);
    let distance = enemy.distance_to(&primary);
    let mut tx = Transition::begin(session);

    match profile.pick(distance) {
        Some(chosen) => {
            let mut targets = vec![primary.clone()];
            if chosen.targets >= 2 {
                targets.extend(cleave_partner(session, &enemy, &primary, chosen).cloned());
            }
            debug!(enemy = %enemy.id, ?archetype, attack = chosen.name, "enemy attacks");
            for target in &targets {
                strike_player(&mut tx, &enemy, target, chosen, ctx);
            }
        }
        None => advance_enemy(&mut tx, &enemy),
    }

    tx.compact();
    if tx.session.all_players_dead() {
        declare_defeat(&mut tx);
    }
    tx.finish()
}

fn strike_player(
    tx: &mut Transition,
    enemy: &Combatant,
    target: &Combatant,
    chosen: &EnemyMove,
    ctx: &mut ActionContext<'_>,
) {
    let roll = resolve_attack(enemy, target, chosen.accuracy, ctx.rng, ctx.config);
    if !roll.hit {
        tx.log(format!("{} dodges {}'s {}.", target.name, enemy.name, chosen.name));
        tx.float(&target.id, "MISS", FloatCategory::Miss);
        return;
    }
    let damage = flat_mitigation(chosen.damage, target.armor);
    tx.session.stats.damage_taken += damage;
    tx.log(format!(
        "{} hits {} with {} for {damage} damage.",
        enemy.name, target.name, chosen.name
    ));
    tx.float(&target.id, format!("-{damage}"), FloatCategory::Damage);
    apply_hit(tx, &target.id, damage, chosen.impact);
}

/// 够不着时向前推进一格，与占位的友军交换。
fn advance_enemy(tx: &mut Transition, enemy: &Combatant) {
    if enemy.rank <= MIN_RANK {
        tx.log(format!("{} holds position.", enemy.name));
        return;
    }
    let destination = enemy.rank - 1;
    if let Some(ally) = tx
        .session
        .enemies
        .iter_mut()
        .find(|unit| unit.is_alive() && unit.id != enemy.id && unit.rank == destination)
    {
        ally.rank = enemy.rank;
    }
    if let Some(unit) = tx.session.unit_mut(&enemy.id) {
        unit.rank = destination;
    }
    tx.log(format!("{} advances to rank {destination}.", enemy.name));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::combat::ScriptedRolls;
    use crate::game::config::BattleConfig;
    use crate::game::scenario::{build_session, ScenarioId};
    use crate::game::state::{Resources, Side};

    fn player(id: &str, rank: u8) -> Combatant {
        Combatant::new(id, id, Side::Player, rank, Resources::new(40, 3, 10, 50, 20))
    }

    fn enemy(id: &str, rank: u8, archetype: EnemyArchetype) -> Combatant {
        Combatant::new(id, id, Side::Enemy, rank, Resources::new(60, 3, 10, 50, 20))
            .with_archetype(archetype)
    }

    fn enemy_turn(players: Vec<Combatant>, enemies: Vec<Combatant>) -> BattleSession {
        let mut queue: Vec<String> = enemies.iter().map(|unit| unit.id.clone()).collect();
        queue.extend(players.iter().map(|unit| unit.id.clone()));
        let active = queue.first().cloned();
        let mut session = BattleSession::new("test", players, enemies, Vec::new());
        session.turn_queue = queue;
        session.active_unit_id = active;
        session.phase = Phase::EnemyTurn;
        session
    }

    fn act(session: &BattleSession, rolls: &mut ScriptedRolls) -> Resolution {
        let config = BattleConfig::default();
        let mut ctx = ActionContext::new(rolls, &config);
        enemy_action(session, None, &mut ctx)
    }

    #[test]
    fn guaranteed_hit_wounds_a_full_health_party() {
        let config = BattleConfig::default();
        let mut session = build_session(ScenarioId::Skirmish, &config);
        let enemy_id = session.living_enemies().next().map(|unit| unit.id.clone());
        session.active_unit_id = enemy_id;
        session.phase = Phase::EnemyTurn;
        let before: i32 = session.players.iter().map(|unit| unit.resources.hp.current).sum();

        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        let after: i32 = result.session.players.iter().map(|unit| unit.resources.hp.current).sum();

        assert!(after < before);
        assert!(result.session.stats.damage_taken > 0);
    }

    #[test]
    fn armor_reduces_enemy_damage_to_a_floor_of_one() {
        let session = enemy_turn(
            vec![player("p1", 1).with_armor(50)],
            vec![enemy("e1", 1, EnemyArchetype::Grunt)],
        );
        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        assert_eq!(result.session.unit("p1").unwrap().resources.hp.current, 39);
        assert_eq!(result.session.stats.damage_taken, 1);
    }

    #[test]
    fn out_of_reach_enemy_advances() {
        let mut session = enemy_turn(
            vec![player("p1", 2), player("p0", 1)],
            vec![enemy("e0", 1, EnemyArchetype::Grunt), enemy("e1", 2, EnemyArchetype::Grunt)],
        );
        session.active_unit_id = Some("e1".into());
        let mut rolls = ScriptedRolls::constant(0.0);
        let config = BattleConfig::default();
        let mut ctx = ActionContext::new(&mut rolls, &config);
        let result = enemy_action(&session, Some("e1"), &mut ctx);
        // e1 at rank 2 is distance 2 from p0, inside Shiv reach.
        assert!(result.session.stats.damage_taken > 0);

        let mut far = enemy_turn(
            vec![player("p1", 1)],
            vec![
                enemy("e0", 1, EnemyArchetype::Brute),
                enemy("e1", 2, EnemyArchetype::Brute),
                enemy("e2", 3, EnemyArchetype::Grunt),
            ],
        );
        far.active_unit_id = Some("e2".into());
        let mut rolls = ScriptedRolls::constant(0.0);
        let mut ctx = ActionContext::new(&mut rolls, &config);
        let advanced = enemy_action(&far, Some("e2"), &mut ctx);
        assert_eq!(advanced.session.unit("e2").unwrap().rank, 2);
        assert_eq!(advanced.session.unit("e1").unwrap().rank, 3);
        assert_eq!(advanced.session.stats.damage_taken, 0);
        assert_eq!(rolls.drawn(), 0);
    }

    #[test]
    fn front_rank_enemy_out_of_reach_holds() {
        let mut lone = player("p1", 1);
        lone.rank = 4;
        let session = enemy_turn(vec![lone], vec![enemy("e1", 1, EnemyArchetype::Grunt)]);
        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        assert_eq!(result.session.unit("e1").unwrap().rank, 1);
        assert!(result.log_lines().any(|line| line.contains("holds")));
    }

    #[test]
    fn brute_cleaves_two_adjacent_players() {
        let session = enemy_turn(
            vec![player("p1", 1), player("p2", 2), player("p3", 3)],
            vec![enemy("e1", 1, EnemyArchetype::Brute)],
        );
        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        let hp = |id: &str| result.session.unit(id).unwrap().resources.hp.current;
        assert_eq!(hp("p1"), 30);
        assert_eq!(hp("p2"), 30);
        assert_eq!(hp("p3"), 40);
        assert_eq!(result.session.stats.damage_taken, 20);
    }

    #[test]
    fn cleave_skips_partners_beyond_reach() {
        let mut session = enemy_turn(
            vec![player("p1", 1), player("p2", 2)],
            vec![
                enemy("e1", 1, EnemyArchetype::Grunt),
                enemy("e2", 2, EnemyArchetype::Grunt),
                enemy("e3", 3, EnemyArchetype::Brute),
            ],
        );
        session.active_unit_id = Some("e3".into());
        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        let hp = |id: &str| result.session.unit(id).unwrap().resources.hp.current;
        // p1 sits at distance 3, p2 at distance 4.
        assert_eq!(hp("p1"), 30);
        assert_eq!(hp("p2"), 40);
        assert_eq!(result.session.stats.damage_taken, 10);
    }

    #[test]
    fn only_the_active_enemy_may_act() {
        let session = enemy_turn(
            vec![player("p1", 1)],
            vec![enemy("e1", 1, EnemyArchetype::Grunt), enemy("e2", 2, EnemyArchetype::Grunt)],
        );
        let config = BattleConfig::default();
        let mut rolls = ScriptedRolls::constant(0.0);
        let mut ctx = ActionContext::new(&mut rolls, &config);
        let result = enemy_action(&session, Some("e2"), &mut ctx);
        assert_eq!(result.session, session);
        assert!(result.events.is_empty());

        let result = enemy_action(&session, Some("e1"), &mut ctx);
        assert_eq!(result.session.unit("p1").unwrap().resources.hp.current, 32);
    }

    #[test]
    fn boss_prefers_melee_then_reach() {
        let profile = profile_for(EnemyArchetype::Boss);
        assert_eq!(profile.pick(1).map(|chosen| chosen.name), Some("Crushing Blow"));
        assert_eq!(profile.pick(3).map(|chosen| chosen.name), Some("Chain Lash"));
        assert!(profile.pick(4).is_none());
    }

    #[test]
    fn killing_the_last_player_is_defeat() {
        let mut last = player("p1", 1);
        last.resources.hp.current = 3;
        let session = enemy_turn(vec![last], vec![enemy("e1", 1, EnemyArchetype::Boss)]);
        let mut rolls = ScriptedRolls::constant(0.0);
        let result = act(&session, &mut rolls);
        assert_eq!(result.session.phase, Phase::Defeat);
        assert!(result.session.unit("p1").unwrap().is_dead);
    }

    #[test]
    fn misses_deal_nothing() {
        let session = enemy_turn(vec![player("p1", 1)], vec![enemy("e1", 1, EnemyArchetype::Grunt)]);
        let mut rolls = ScriptedRolls::constant(0.99);
        let result = act(&session, &mut rolls);
        assert_eq!(result.session.unit("p1").unwrap().resources.hp.current, 40);
        assert_eq!(result.session.stats.damage_taken, 0);
    }

    #[test]
    fn ignored_outside_enemy_turn_or_for_dead_actor() {
        let mut session = enemy_turn(vec![player("p1", 1)], vec![enemy("e1", 1, EnemyArchetype::Grunt)]);
        session.enemies[0].is_dead = true;
        let mut rolls = ScriptedRolls::constant(0.0);
        assert_eq!(act(&session, &mut rolls).session, session);

        session.enemies[0].is_dead = false;
        session.phase = Phase::PlayerTurn;
        assert_eq!(act(&session, &mut rolls).session, session);
        assert_eq!(rolls.drawn(), 0);
    }

    #[test]
    fn archetype_falls_back_to_template_then_grunt() {
        let templated = Combatant::new("w", "Warlord", Side::Enemy, 1, Resources::new(90, 3, 10, 50, 20))
            .with_template("warlord");
        assert_eq!(archetype_of(&templated), EnemyArchetype::Boss);
        let unknown = Combatant::new("x", "Stranger", Side::Enemy, 1, Resources::new(10, 3, 10, 50, 20));
        assert_eq!(archetype_of(&unknown), EnemyArchetype::Grunt);
        assert_eq!("ELITE".parse::<EnemyArchetype>(), Ok(EnemyArchetype::Brute));
    }
}
