use crate::config::SmoothConfig;

use super::motion::MovementSnapshot;

/// EMAベースの移動量平滑化フィルタ
///
/// 送信値の痙攣的な変化を抑えるため、4つの移動量フィールドを
/// 成分ごとにEMAする。人数は整数のため平滑化しない
pub struct Smoother {
    alpha: f32,
    prev: Option<MovementSnapshot>,
}

impl Smoother {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, prev: None }
    }

    pub fn from_config(config: &SmoothConfig) -> Self {
        Self::new(config.movement)
    }

    pub fn apply(&mut self, snapshot: MovementSnapshot) -> MovementSnapshot {
        let prev = match self.prev {
            Some(prev) => prev,
            None => {
                self.prev = Some(snapshot);
                return snapshot;
            }
        };

        let a = self.alpha;
        let result = MovementSnapshot {
            person_count: snapshot.person_count,
            head_movement: a * snapshot.head_movement + (1.0 - a) * prev.head_movement,
            arm_movement: a * snapshot.arm_movement + (1.0 - a) * prev.arm_movement,
            leg_movement: a * snapshot.leg_movement + (1.0 - a) * prev.leg_movement,
            total_movement: a * snapshot.total_movement + (1.0 - a) * prev.total_movement,
        };
        self.prev = Some(result);
        result
    }

    pub fn reset(&mut self) {
        self.prev = None;
    }
}
