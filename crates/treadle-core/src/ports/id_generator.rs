//! TaskIdGenerator port - タスク ID 生成の抽象化
//!
//! # ID 形式
//! - `task-` プレフィックス + ULID
//! - 調整なしで一意、生成時刻順にソート可能

use ulid::Ulid;

use crate::domain::TaskId;
use crate::ports::Clock;

pub const TASK_ID_PREFIX: &str = "task-";

pub trait TaskIdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID-based generator. The timestamp part comes from the injected clock,
/// so a `FixedClock` yields ids with a deterministic time component.
pub struct UlidTaskIdGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidTaskIdGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> TaskIdGenerator for UlidTaskIdGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        TaskId::new(format!("{TASK_ID_PREFIX}{ulid}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn generates_unique_prefixed_ids() {
        let id_gen = UlidTaskIdGenerator::new(SystemClock);

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();

        assert_ne!(id1, id2);
        assert!(id1.as_str().starts_with(TASK_ID_PREFIX));
    }

    #[test]
    fn fixed_clock_pins_timestamp_part() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidTaskIdGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_task_id();
        let id2 = id_gen.generate_task_id();
        assert_ne!(id1, id2);

        let ts = |id: &TaskId| {
            let ulid: Ulid = id.as_str()[TASK_ID_PREFIX.len()..].parse().unwrap();
            ulid.timestamp_ms()
        };
        assert_eq!(ts(&id1), ts(&id2));
        assert_eq!(ts(&id1), fixed_time.timestamp_millis() as u64);
    }
}
