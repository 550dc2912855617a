//! 资源池的纯函数：消耗、恢复、回合开始/结束的再生。

use thiserror::Error;

use super::config::BattleConfig;
use super::state::{Pool, Resources};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("insufficient resource: need {required}, have {available} (floor {min})")]
    InsufficientResource {
        required: i32,
        available: i32,
        min: i32,
    },
}

/// 严格消耗：结果低于 `min` 时返回错误而不是截断。
pub fn spend(pool: i32, amount: i32, min: i32) -> Result<i32, ResourceError> {
    let remaining = pool - amount;
    if remaining < min {
        return Err(ResourceError::InsufficientResource {
            required: amount,
            available: pool,
            min,
        });
    }
    Ok(remaining)
}

pub fn restore(pool: i32, amount: i32, max: i32) -> i32 {
    pool.saturating_add(amount).min(max)
}

/// 负数消耗按 0 处理，池子不会因此超过上限。
pub fn spend_pool(pool: Pool, amount: i32) -> Result<Pool, ResourceError> {
    let current = spend(pool.current, amount.max(0), 0)?;
    Ok(Pool { current, ..pool })
}

pub fn restore_pool(pool: Pool, amount: i32) -> Pool {
    Pool {
        current: restore(pool.current, amount.max(0), pool.max),
        ..pool
    }
}

/// 扣减并截断到 [0, current]，用于伤害等不会失败的扣减。
pub fn drain_pool(pool: Pool, amount: i32) -> Pool {
    Pool {
        current: (pool.current - amount.max(0)).max(0),
        ..pool
    }
}

/// AP 回满到每回合上限，其余资源不变。
pub fn on_turn_start(resources: &Resources) -> Resources {
    Resources {
        ap: Pool::full(resources.ap.max),
        ..*resources
    }
}

/// 回合结束时恢复固定的耐力与架势，与 AP 无关。
pub fn on_turn_end(resources: &Resources, config: &BattleConfig) -> Resources {
    Resources {
        stamina: restore_pool(resources.stamina, config.stamina_regen),
        stagger: restore_pool(resources.stagger, config.stagger_regen),
        ..*resources
    }
}

pub fn is_limit_break_ready(resources: &Resources) -> bool {
    resources.pp.current >= resources.pp.max
}
