use crate::config::TrackerConfig;
use crate::pose::{BodyRegion, Pose};
use crate::stats::CumulativeStats;

use super::history::SnapshotHistory;
use super::identity::IdentityTracker;

/// 1人分・1フレーム分の部位別移動量（ピクセル）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementDelta {
    pub head: f32,
    pub arms: f32,
    pub legs: f32,
    pub total: f32,
}

impl MovementDelta {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn add(&mut self, other: &MovementDelta) {
        self.head += other.head;
        self.arms += other.arms;
        self.legs += other.legs;
        self.total += other.total;
    }
}

/// 全人数集計後のスナップショット
///
/// 各移動量は追跡中人物の平均値（ピクセル変位、正規化なし）。
/// 最新の1件が「現在値」として参照され、履歴は有界リングに保持される
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementSnapshot {
    pub person_count: usize,
    pub head_movement: f32,
    pub arm_movement: f32,
    pub leg_movement: f32,
    pub total_movement: f32,
}

/// 前後フレームの比較による部位別移動量
///
/// 両フレームで信頼度が閾値を超えるキーポイントのみ使用。
/// 部位ごとの平均変位を計算し、使用可能点が0の部位は0とする。
/// `total`は部位平均の平均ではなく、全使用可能点の平均変位
pub fn per_person_delta(previous: &Pose, current: &Pose, floor: f32) -> MovementDelta {
    let mut delta = MovementDelta::zero();

    let mut total_sum = 0.0f32;
    let mut total_count = 0usize;

    for region in BodyRegion::ALL {
        let mut sum = 0.0f32;
        let mut count = 0usize;
        for &idx in region.keypoints() {
            let prev_kp = previous.get(idx);
            let curr_kp = current.get(idx);
            if !prev_kp.is_usable(floor) || !curr_kp.is_usable(floor) {
                continue;
            }
            let dist = prev_kp.distance_to(curr_kp);
            sum += dist;
            count += 1;
            total_sum += dist;
            total_count += 1;
        }
        let mean = if count > 0 { sum / count as f32 } else { 0.0 };
        match region {
            BodyRegion::Head => delta.head = mean,
            BodyRegion::Arms => delta.arms = mean,
            BodyRegion::Legs => delta.legs = mean,
        }
    }

    delta.total = if total_count > 0 {
        total_sum / total_count as f32
    } else {
        0.0
    };
    delta
}

/// 人数と各部位の算術平均でスナップショットを作る
///
/// `person_count`は追跡中の全人数（このフレームで移動量を出せたかは問わない）。
/// 平均の分母は実際に出た移動量の件数。0件なら全フィールド0（NaNを出さない）
pub fn aggregate(person_count: usize, deltas: &[MovementDelta]) -> MovementSnapshot {
    if deltas.is_empty() {
        return MovementSnapshot {
            person_count,
            ..MovementSnapshot::default()
        };
    }

    let n = deltas.len() as f32;
    let mut snapshot = MovementSnapshot {
        person_count,
        ..MovementSnapshot::default()
    };
    for delta in deltas {
        snapshot.head_movement += delta.head;
        snapshot.arm_movement += delta.arms;
        snapshot.leg_movement += delta.legs;
        snapshot.total_movement += delta.total;
    }
    snapshot.head_movement /= n;
    snapshot.arm_movement /= n;
    snapshot.leg_movement /= n;
    snapshot.total_movement /= n;
    snapshot
}

/// 1フレームごとの移動量計測パイプライン
///
/// ID追跡 → 人物別移動量 → 集計 → 履歴追加 を同期的に実行する。
/// I/Oは持たない。入力はフレーム取得側スレッドが所有する
pub struct MovementQuantifier {
    tracker: IdentityTracker,
    history: SnapshotHistory,
    stats: CumulativeStats,
    confidence_floor: f32,
}

impl MovementQuantifier {
    pub fn new(config: &TrackerConfig, history_capacity: usize) -> Self {
        Self {
            tracker: IdentityTracker::new(config),
            history: SnapshotHistory::new(history_capacity),
            stats: CumulativeStats::default(),
            confidence_floor: config.confidence_floor,
        }
    }

    /// 1フレーム分の検出を処理してスナップショットを返す
    ///
    /// 新規IDの移動量は0。未検出デバウンス中のIDは移動量を出さないが
    /// 人数には数える
    pub fn process_frame(&mut self, detections: &[Pose]) -> MovementSnapshot {
        let assignments = self.tracker.assign(detections);

        let mut deltas = Vec::with_capacity(assignments.len());
        for assignment in &assignments {
            let delta = match &assignment.previous {
                Some(previous) => {
                    per_person_delta(previous, &assignment.current, self.confidence_floor)
                }
                None => MovementDelta::zero(),
            };
            self.tracker.accumulate(assignment.person_id, &delta);
            deltas.push(delta);
        }

        let snapshot = aggregate(self.tracker.person_count(), &deltas);
        self.history.push(snapshot);
        self.stats.record(&snapshot);
        snapshot
    }

    /// 最新スナップショット（未処理ならNone）
    pub fn latest(&self) -> Option<MovementSnapshot> {
        self.history.latest()
    }

    pub fn history(&self) -> &SnapshotHistory {
        &self.history
    }

    pub fn person_count(&self) -> usize {
        self.tracker.person_count()
    }

    pub fn tracker(&self) -> &IdentityTracker {
        &self.tracker
    }

    /// 全期間の累積統計
    pub fn stats(&self) -> &CumulativeStats {
        &self.stats
    }

    /// 累積統計のクリア（冪等）
    ///
    /// 追跡中のID表とスナップショット履歴は自然に入れ替わる一時データ
    /// なので対象外
    pub fn reset(&mut self) {
        self.stats.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KeypointIndex};

    const FLOOR: f32 = 0.3;

    fn quantifier() -> MovementQuantifier {
        MovementQuantifier::new(&TrackerConfig::default(), 300)
    }

    /// 全17点を(x, y)中心の同一座標に置いたポーズ
    fn pose_at(x: f32, y: f32) -> Pose {
        Pose::new([Keypoint::new(x, y, 0.9); KeypointIndex::COUNT])
    }

    fn pose_with(base: &Pose, changes: &[(KeypointIndex, f32, f32, f32)]) -> Pose {
        let mut pose = base.clone();
        for &(idx, x, y, confidence) in changes {
            pose.keypoints[idx as usize] = Keypoint::new(x, y, confidence);
        }
        pose
    }

    #[test]
    fn test_aggregate_empty_population() {
        let snapshot = aggregate(0, &[]);
        assert_eq!(snapshot.person_count, 0);
        assert_eq!(snapshot.head_movement, 0.0);
        assert_eq!(snapshot.arm_movement, 0.0);
        assert_eq!(snapshot.leg_movement, 0.0);
        assert_eq!(snapshot.total_movement, 0.0);
    }

    #[test]
    fn test_aggregate_means_fields() {
        let deltas = [
            MovementDelta { head: 1.0, arms: 2.0, legs: 3.0, total: 2.0 },
            MovementDelta { head: 3.0, arms: 6.0, legs: 5.0, total: 4.0 },
        ];
        let snapshot = aggregate(2, &deltas);
        assert!((snapshot.head_movement - 2.0).abs() < 1e-6);
        assert!((snapshot.arm_movement - 4.0).abs() < 1e-6);
        assert!((snapshot.leg_movement - 4.0).abs() < 1e-6);
        assert!((snapshot.total_movement - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_person_zero_delta() {
        let mut q = quantifier();
        let snapshot = q.process_frame(&[pose_at(100.0, 100.0)]);
        assert_eq!(snapshot.person_count, 1);
        assert_eq!(snapshot.total_movement, 0.0);
        assert_eq!(snapshot.head_movement, 0.0);
        assert_eq!(snapshot.arm_movement, 0.0);
        assert_eq!(snapshot.leg_movement, 0.0);
    }

    #[test]
    fn test_static_people_zero_movement() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0), pose_at(500.0, 500.0)]);
        // 同一座標のまま次フレームへ
        let snapshot = q.process_frame(&[pose_at(100.0, 100.0), pose_at(500.0, 500.0)]);
        assert_eq!(snapshot.person_count, 2);
        assert_eq!(snapshot.total_movement, 0.0);
    }

    #[test]
    fn test_wrist_movement_region_means() {
        let base = pose_at(200.0, 300.0);
        // 右手首だけ10px右へ
        let moved = pose_with(
            &base,
            &[(KeypointIndex::RightWrist, 210.0, 300.0, 0.9)],
        );
        let delta = per_person_delta(&base, &moved, FLOOR);

        // 腕グループ6点のうち1点が10px移動 → 平均 10/6
        assert!((delta.arms - 10.0 / 6.0).abs() < 1e-5);
        assert_eq!(delta.head, 0.0);
        assert_eq!(delta.legs, 0.0);
        // 全17点の平均 → 10/17
        assert!((delta.total - 10.0 / 17.0).abs() < 1e-5);
    }

    #[test]
    fn test_total_is_not_mean_of_region_means() {
        let base = pose_at(0.0, 0.0);
        // 頭5点を全部5px、脚6点を全部2px動かす
        let mut moved = base.clone();
        for &idx in BodyRegion::Head.keypoints() {
            moved.keypoints[idx as usize] = Keypoint::new(5.0, 0.0, 0.9);
        }
        for &idx in BodyRegion::Legs.keypoints() {
            moved.keypoints[idx as usize] = Keypoint::new(0.0, 2.0, 0.9);
        }
        let delta = per_person_delta(&base, &moved, FLOOR);
        assert!((delta.head - 5.0).abs() < 1e-5);
        assert!((delta.legs - 2.0).abs() < 1e-5);
        // total = (5*5 + 2*6 + 0*6) / 17 = 37/17、部位平均の平均(7/3)ではない
        assert!((delta.total - 37.0 / 17.0).abs() < 1e-5);
        assert!((delta.total - (5.0 + 2.0 + 0.0) / 3.0).abs() > 0.1);
    }

    #[test]
    fn test_confidence_at_floor_excluded_both_sides() {
        let base = pose_at(100.0, 100.0);
        // 閾値ちょうどの信頼度: 前後どちらの評価でも不使用
        let prev = pose_with(&base, &[(KeypointIndex::LeftWrist, 100.0, 100.0, FLOOR)]);
        let curr = pose_with(&base, &[(KeypointIndex::LeftWrist, 999.0, 999.0, FLOOR)]);
        let delta = per_person_delta(&prev, &curr, FLOOR);
        assert_eq!(delta.arms, 0.0);
        assert_eq!(delta.total, 0.0);

        // 片側だけ閾値ちょうどでも同様に除外
        let curr2 = pose_with(&base, &[(KeypointIndex::LeftWrist, 999.0, 999.0, 0.9)]);
        let delta2 = per_person_delta(&prev, &curr2, FLOOR);
        assert_eq!(delta2.arms, 0.0);
    }

    #[test]
    fn test_low_confidence_region_zero_not_nan() {
        let mut prev = pose_at(100.0, 100.0);
        let mut curr = pose_at(110.0, 100.0);
        // 頭部5点を両フレームとも低信頼度に
        for &idx in BodyRegion::Head.keypoints() {
            prev.keypoints[idx as usize].confidence = 0.1;
            curr.keypoints[idx as usize].confidence = 0.1;
        }
        let delta = per_person_delta(&prev, &curr, FLOOR);
        assert_eq!(delta.head, 0.0);
        assert!(delta.head.is_finite());
        // 他部位は12点が10px移動
        assert!((delta.arms - 10.0).abs() < 1e-5);
        assert!((delta.total - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_gap_delta_against_pre_gap_pose() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0)]);
        // 1フレーム未検出（k=5未満）
        q.process_frame(&[]);
        // 同じ位置で再検出 → ギャップ直前のポーズと比較して移動量ほぼ0
        let snapshot = q.process_frame(&[pose_at(100.0, 100.0)]);
        assert_eq!(snapshot.person_count, 1);
        assert_eq!(snapshot.total_movement, 0.0);
    }

    #[test]
    fn test_missing_person_counted_but_no_delta() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0), pose_at(500.0, 500.0)]);
        // 片方が消えて、残りが10px動く
        let snapshot = q.process_frame(&[pose_at(110.0, 100.0)]);
        // 未検出デバウンス中も人数には数える
        assert_eq!(snapshot.person_count, 2);
        // 平均の分母は移動量を出せた1人分（0で薄まらない）
        assert!((snapshot.total_movement - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_snapshot_appended_to_history() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0)]);
        q.process_frame(&[pose_at(105.0, 100.0)]);
        assert_eq!(q.history().len(), 2);
        assert!(q.latest().is_some());
    }

    #[test]
    fn test_reset_idempotent() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0)]);
        q.process_frame(&[pose_at(120.0, 100.0)]);
        assert!(q.stats().message_count > 0);

        q.reset();
        let once = q.stats().clone();
        q.reset();
        assert_eq!(&once, q.stats());
        assert_eq!(q.stats().message_count, 0);

        // リセットは履歴と追跡状態に触らない
        assert_eq!(q.history().len(), 2);
        assert_eq!(q.person_count(), 1);
    }

    #[test]
    fn test_cumulative_accumulators_advance() {
        let mut q = quantifier();
        q.process_frame(&[pose_at(100.0, 100.0)]);
        q.process_frame(&[pose_at(110.0, 100.0)]);
        q.process_frame(&[pose_at(120.0, 100.0)]);
        let person = &q.tracker().people()[0];
        // 10px × 2フレーム分
        assert!((person.cumulative().total - 20.0).abs() < 1e-4);
    }
}
