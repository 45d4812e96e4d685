use std::collections::VecDeque;

use super::motion::MovementSnapshot;

/// 直近ウィンドウの平均値
///
/// 人数は平均すると端数になるためf32のまま返す
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowAverage {
    pub person_count: f32,
    pub head_movement: f32,
    pub arm_movement: f32,
    pub leg_movement: f32,
    pub total_movement: f32,
}

/// スナップショットの有界履歴（リングバッファ）
///
/// 容量超過時は最古から破棄。永続化はしない
pub struct SnapshotHistory {
    buffer: VecDeque<MovementSnapshot>,
    capacity: usize,
}

impl SnapshotHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, snapshot: MovementSnapshot) {
        self.buffer.push_back(snapshot);
        while self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn latest(&self) -> Option<MovementSnapshot> {
        self.buffer.back().copied()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MovementSnapshot> {
        self.buffer.iter()
    }

    /// 保持中スナップショットの平均。空なら全フィールド0
    pub fn windowed_average(&self) -> WindowAverage {
        if self.buffer.is_empty() {
            return WindowAverage::default();
        }
        let n = self.buffer.len() as f32;
        let mut avg = WindowAverage::default();
        for snapshot in &self.buffer {
            avg.person_count += snapshot.person_count as f32;
            avg.head_movement += snapshot.head_movement;
            avg.arm_movement += snapshot.arm_movement;
            avg.leg_movement += snapshot.leg_movement;
            avg.total_movement += snapshot.total_movement;
        }
        avg.person_count /= n;
        avg.head_movement /= n;
        avg.arm_movement /= n;
        avg.leg_movement /= n;
        avg.total_movement /= n;
        avg
    }
}
