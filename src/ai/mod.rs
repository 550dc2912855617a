//! 敌方行为：按档位选择招式或推进。

pub mod tactics;

pub use tactics::{archetype_of, enemy_action, profile_for, threat_of, EnemyMove, EnemyProfile};
