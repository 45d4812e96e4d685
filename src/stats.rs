use crate::tracker::MovementSnapshot;

/// 全期間の累積統計
///
/// 件数・部位別の合計と最大値・人数ピークを保持する。
/// 外部からのリセット要求でのみクリアされ、それ以外で減ることはない
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CumulativeStats {
    pub message_count: u64,
    pub sum_head: f64,
    pub sum_arms: f64,
    pub sum_legs: f64,
    pub sum_total: f64,
    pub max_head: f32,
    pub max_arms: f32,
    pub max_legs: f32,
    pub max_total: f32,
    pub peak_person_count: usize,
}

impl CumulativeStats {
    pub fn record(&mut self, snapshot: &MovementSnapshot) {
        self.message_count += 1;
        self.sum_head += snapshot.head_movement as f64;
        self.sum_arms += snapshot.arm_movement as f64;
        self.sum_legs += snapshot.leg_movement as f64;
        self.sum_total += snapshot.total_movement as f64;
        self.max_head = self.max_head.max(snapshot.head_movement);
        self.max_arms = self.max_arms.max(snapshot.arm_movement);
        self.max_legs = self.max_legs.max(snapshot.leg_movement);
        self.max_total = self.max_total.max(snapshot.total_movement);
        self.peak_person_count = self.peak_person_count.max(snapshot.person_count);
    }

    pub fn mean_head(&self) -> f64 {
        self.mean(self.sum_head)
    }

    pub fn mean_arms(&self) -> f64 {
        self.mean(self.sum_arms)
    }

    pub fn mean_legs(&self) -> f64 {
        self.mean(self.sum_legs)
    }

    pub fn mean_total(&self) -> f64 {
        self.mean(self.sum_total)
    }

    fn mean(&self, sum: f64) -> f64 {
        if self.message_count == 0 {
            0.0
        } else {
            sum / self.message_count as f64
        }
    }

    /// 冪等なクリア
    pub fn reset(&mut self) {
        *self = CumulativeStats::default();
    }
}
