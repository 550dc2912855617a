//! 玩家出牌。每种卡牌类型一个分支，非法出牌只追加一行日志。

use tracing::debug;

use super::{
    combat::{armor_gate, resolve_attack},
    effects::AreaOfEffect,
    resources::{drain_pool, restore_pool, spend_pool, ResourceError},
    rules::{
        apply_hit, declare_victory, grant_pp, ActionContext, PlayCardAction, Resolution,
        Transition,
    },
    state::{
        BattleSession, CardType, Combatant, CombatCard, FloatCategory, Phase, Side, UnitId,
        MAX_RANK, MIN_RANK,
    },
};
use crate::ai::threat_of;

type Played = Result<(), String>;

pub fn play_card(
    session: &BattleSession,
    action: &PlayCardAction,
    ctx: &mut ActionContext<'_>,
) -> Resolution {
    if session.phase != Phase::PlayerTurn {
        debug!(phase = ?session.phase, "card ignored outside the player turn");
        return Resolution::unchanged(session);
    }
    let Some(card) = session.card(&action.card_id).cloned() else {
        return Resolution::rejected(session, format!("Card {} is not in hand.", action.card_id));
    };
    if !card.has_valid_values() {
        return Resolution::rejected(
            session,
            format!("{} is malformed and cannot be played.", card.name),
        );
    }
    let Some(actor) = session.active_unit().cloned() else {
        return Resolution::rejected(session, "No one is ready to act.");
    };
    if card.owner_id != actor.id || !actor.is_alive() {
        return Resolution::rejected(
            session,
            format!("{} cannot play {} right now.", actor.name, card.name),
        );
    }
    if actor.resources.ap.current < card.ap_cost {
        return Resolution::rejected(session, format!("Not enough AP for {}.", card.name));
    }
    if actor.resources.stamina.current < card.stamina_cost {
        return Resolution::rejected(session, format!("Not enough stamina for {}.", card.name));
    }

    let target_id = action.target_id.clone().or_else(|| match card.card_type {
        CardType::Attack => action.selected_target_id.clone(),
        _ => None,
    });

    let mut tx = Transition::begin(session);
    let played = match card.card_type {
        CardType::Attack => play_attack(&mut tx, &actor, &card, target_id.as_deref(), ctx),
        CardType::Movement => play_movement(&mut tx, &actor, &card, action.target_rank),
        CardType::Voice | CardType::Item => {
            play_support(&mut tx, &actor, &card, target_id.as_deref(), ctx)
        }
        CardType::Analysis => play_analysis(&mut tx, &actor, &card, target_id.as_deref(), ctx),
        CardType::Defense => Err(format!("{} is unavailable for now.", card.name)),
        CardType::Reload => play_reload(&mut tx, &actor, &card, ctx),
    };
    if let Err(reason) = played {
        return Resolution::rejected(session, reason);
    }

    tx.compact();
    if tx.session.all_enemies_dead() {
        declare_victory(&mut tx);
    }
    tx.finish()
}

fn pay_costs(tx: &mut Transition, actor_id: &str, card: &CombatCard) -> Played {
    let Some(unit) = tx.session.unit_mut(actor_id) else {
        return Err(format!("{actor_id} is no longer on the field."));
    };
    let insufficient = |err: ResourceError| format!("Cannot pay for {}: {err}.", card.name);
    unit.resources.ap = spend_pool(unit.resources.ap, card.ap_cost).map_err(insufficient)?;
    unit.resources.stamina =
        spend_pool(unit.resources.stamina, card.stamina_cost).map_err(insufficient)?;
    Ok(())
}

fn play_attack(
    tx: &mut Transition,
    actor: &Combatant,
    card: &CombatCard,
    target_id: Option<&str>,
    ctx: &mut ActionContext<'_>,
) -> Played {
    let Some(target_id) = target_id else {
        return Err(format!("{} needs a target.", card.name));
    };
    let target = tx
        .session
        .enemies
        .iter()
        .find(|unit| unit.id == target_id)
        .cloned()
        .ok_or_else(|| format!("There is no enemy to hit with {}.", card.name))?;
    if !target.is_alive() {
        return Err(format!("{} is already down.", target.name));
    }
    let distance = actor.distance_to(&target);
    if !card.in_range(distance) {
        return Err(format!(
            "{} is out of range for {} (distance {distance}).",
            target.name, card.name
        ));
    }
    if card.needs_ammo() && actor.is_jammed {
        return Err(format!("{}'s weapon is jammed. Reload first.", actor.name));
    }

    let ammo_cost = card.ammo_cost.unwrap_or(0);
    if card.needs_ammo() && actor.ammo < ammo_cost {
        if let Some(unit) = tx.session.unit_mut(&actor.id) {
            unit.resources.ap = drain_pool(unit.resources.ap, 1);
        }
        tx.log(format!("{} pulls the trigger on {}... click. Out of ammo.", actor.name, card.name));
        tx.float(&actor.id, "NO AMMO", FloatCategory::Info);
        return Ok(());
    }

    pay_costs(tx, &actor.id, card)?;
    if card.needs_ammo() {
        if let Some(unit) = tx.session.unit_mut(&actor.id) {
            unit.ammo -= ammo_cost;
            unit.weapon_heat += 1;
        }
    }
    tx.session.stats.attacks_in_one_turn += 1;

    let area = card.area();
    let splash: Vec<UnitId> = tx
        .session
        .living_enemies()
        .filter(|unit| unit.id != target.id)
        .filter(|unit| match area {
            AreaOfEffect::Single => false,
            AreaOfEffect::Rank => unit.rank == target.rank,
            AreaOfEffect::All => true,
        })
        .map(|unit| unit.id.clone())
        .collect();
    let mut struck: Vec<UnitId> = vec![target.id.clone()];
    struck.extend(splash);

    let accuracy = card.accuracy.unwrap_or(ctx.config.player_base_accuracy);
    for (index, victim_id) in struck.iter().enumerate() {
        strike(tx, actor, victim_id, card, accuracy, index == 0, ctx);
    }

    if card.needs_ammo() {
        roll_jam(tx, &actor.id, card, ctx);
    }
    if tx.session.stats.attacks_in_one_turn == ctx.config.combo_threshold {
        tx.unlock("combo_striker");
    }
    Ok(())
}

fn strike(
    tx: &mut Transition,
    actor: &Combatant,
    victim_id: &str,
    card: &CombatCard,
    accuracy: u8,
    main: bool,
    ctx: &mut ActionContext<'_>,
) {
    let Some(defender) = tx.session.unit(victim_id).cloned() else {
        return;
    };
    let roll = resolve_attack(actor, &defender, accuracy, ctx.rng, ctx.config);
    if !roll.hit {
        let line = if main {
            format!("{} evades {}'s {}.", defender.name, actor.name, card.name)
        } else {
            format!("The blast misses {}.", defender.name)
        };
        tx.log(line);
        tx.float(victim_id, "MISS", FloatCategory::Miss);
        return;
    }

    let gate = armor_gate(card.damage, actor.perception(), defender.armor, ctx.rng, ctx.config);
    let line = match (main, gate.blocked) {
        (true, false) => format!(
            "{} hits {} with {} for {} damage.",
            actor.name, defender.name, card.name, gate.damage
        ),
        (true, true) => format!(
            "{}'s armor turns {}'s {}: only {} damage.",
            defender.name, actor.name, card.name, gate.damage
        ),
        (false, _) => format!("Splash: {} takes {} damage.", defender.name, gate.damage),
    };
    tx.log(line);
    let category = if gate.blocked {
        FloatCategory::Block
    } else {
        FloatCategory::Damage
    };
    tx.float(victim_id, format!("-{}", gate.damage), category);
    apply_hit(tx, victim_id, gate.damage, card.impact);
    grant_pp(tx, &actor.id, ctx.config.pp_gain_on_hit);
}

/// 开火后按卡壳率与枪管热量判定卡壳。
fn roll_jam(tx: &mut Transition, actor_id: &str, card: &CombatCard, ctx: &mut ActionContext<'_>) {
    let Some(heat) = tx.session.unit(actor_id).map(|unit| unit.weapon_heat) else {
        return;
    };
    let chance = card.jam_chance + f64::from(heat) * ctx.config.heat_jam_step;
    if chance <= 0.0 || ctx.rng.roll() >= chance {
        return;
    }
    let Some(unit) = tx.session.unit_mut(actor_id) else {
        return;
    };
    unit.is_jammed = true;
    let name = unit.name.clone();
    tx.log(format!("{name}'s weapon jams!"));
    tx.float(actor_id, "JAMMED", FloatCategory::Status);
}

fn play_movement(
    tx: &mut Transition,
    actor: &Combatant,
    card: &CombatCard,
    target_rank: Option<u8>,
) -> Played {
    let Some(rank) = target_rank else {
        return Err(format!("{} needs a destination rank.", card.name));
    };
    if !(MIN_RANK..=MAX_RANK).contains(&rank) {
        return Err(format!("Rank {rank} is outside the line."));
    }
    pay_costs(tx, &actor.id, card)?;

    let from = actor.rank;
    let swapped = tx
        .session
        .players
        .iter_mut()
        .find(|unit| unit.is_alive() && unit.id != actor.id && unit.rank == rank)
        .map(|unit| {
            unit.rank = from;
            unit.name.clone()
        });
    if let Some(unit) = tx.session.unit_mut(&actor.id) {
        unit.rank = rank;
    }
    match swapped {
        Some(other) => tx.log(format!("{} trades places with {other}.", actor.name)),
        None => tx.log(format!("{} moves to rank {rank}.", actor.name)),
    }
    Ok(())
}

/// VOICE 与 ITEM 共用：有治疗效果就治疗，否则 VOICE 回复耐力。
fn play_support(
    tx: &mut Transition,
    actor: &Combatant,
    card: &CombatCard,
    target_id: Option<&str>,
    ctx: &ActionContext<'_>,
) -> Played {
    pay_costs(tx, &actor.id, card)?;

    if let Some(amount) = card.heal_amount() {
        let ally = target_id
            .filter(|_| card.target_allies)
            .and_then(|id| tx.session.living_players().find(|unit| unit.id == id))
            .map(|unit| unit.id.clone());
        let recipient_id = ally.unwrap_or_else(|| actor.id.clone());
        let Some(recipient) = tx.session.unit_mut(&recipient_id) else {
            return Ok(());
        };
        let before = recipient.resources.hp.current;
        recipient.resources.hp = restore_pool(recipient.resources.hp, amount);
        let healed = recipient.resources.hp.current - before;
        let name = recipient.name.clone();
        tx.log(format!("{} uses {}: {name} recovers {healed} HP.", actor.name, card.name));
        tx.float(&recipient_id, format!("+{healed}"), FloatCategory::Heal);
        return Ok(());
    }

    if card.card_type == CardType::Voice {
        let restore = ctx.config.voice_stamina_restore;
        if let Some(unit) = tx.session.unit_mut(&actor.id) {
            unit.resources.stamina = restore_pool(unit.resources.stamina, restore);
        }
        tx.log(format!("{} uses {} and catches their breath.", actor.name, card.name));
        tx.float(&actor.id, format!("+{restore} STA"), FloatCategory::Heal);
    } else {
        tx.log(format!("{} uses {}.", actor.name, card.name));
    }
    Ok(())
}

fn play_analysis(
    tx: &mut Transition,
    actor: &Combatant,
    card: &CombatCard,
    target_id: Option<&str>,
    ctx: &ActionContext<'_>,
) -> Played {
    let target = target_id
        .and_then(|id| tx.session.living_enemies().find(|unit| unit.id == id))
        .cloned()
        .ok_or_else(|| format!("{} needs a living enemy to study.", card.name))?;
    pay_costs(tx, &actor.id, card)?;

    if target.scanned_level >= ctx.config.max_scan_level {
        tx.log(format!("{} learns nothing new about {}.", actor.name, target.name));
        return Ok(());
    }
    let level = target.scanned_level + 1;
    let threat = target.threat_level.unwrap_or_else(|| threat_of(&target));
    if let Some(unit) = tx.session.unit_mut(&target.id) {
        unit.scanned_level = level;
        if level >= 2 {
            unit.threat_level = Some(threat);
        }
    }

    let hp = target.resources.hp;
    let line = if level == 1 {
        format!("Scan: {} has {}/{} HP at rank {}.", target.name, hp.current, hp.max, target.rank)
    } else {
        let ap = target.resources.ap;
        let stagger = target.resources.stagger;
        format!(
            "Deep scan: {} armor {}, AP {}/{}, stagger {}/{}, threat {threat}.",
            target.name, target.armor, ap.current, ap.max, stagger.current, stagger.max
        )
    };
    tx.log(line);
    tx.float(&target.id, format!("SCAN {level}"), FloatCategory::Info);
    Ok(())
}

fn play_reload(
    tx: &mut Transition,
    actor: &Combatant,
    card: &CombatCard,
    ctx: &ActionContext<'_>,
) -> Played {
    pay_costs(tx, &actor.id, card)?;
    let config = ctx.config;
    let Some(unit) = tx.session.unit_mut(&actor.id) else {
        return Ok(());
    };
    unit.ammo = (unit.ammo + config.reload_amount).min(config.max_ammo);
    unit.weapon_heat = 0;
    unit.is_jammed = false;
    let ammo = unit.ammo;
    tx.log(format!("{} reloads ({ammo} rounds).", actor.name));
    tx.float(&actor.id, "RELOADED", FloatCategory::Info);
    Ok(())
}

/// 当前行动单位对某个目标可打出的攻击卡。
pub fn playable_attacks<'a>(session: &'a BattleSession, target: &Combatant) -> Vec<&'a CombatCard> {
    let Some(actor) = session.active_unit() else {
        return Vec::new();
    };
    if actor.side != Side::Player || !target.is_alive() {
        return Vec::new();
    }
    session
        .active_hand()
        .into_iter()
        .filter(|card| card.card_type == CardType::Attack)
        .filter(|card| card.ap_cost <= actor.resources.ap.current)
        .filter(|card| card.stamina_cost <= actor.resources.stamina.current)
        .filter(|card| card.in_range(actor.distance_to(target)))
        .collect()
}
