use std::collections::VecDeque;

use crate::config::TrackerConfig;
use crate::pose::Pose;

use super::motion::MovementDelta;

/// 追跡中人物の安定ID。初回検出時に採番され、破棄まで変わらない
pub type PersonId = u32;

/// フレームをまたいで追跡される1人分の状態
///
/// 未検出フレームでは履歴を凍結したまま保持する（ゼロ埋めしない）。
/// 一時的なオクルージョンで移動量が跳ねるのを防ぐため
pub struct TrackedPerson {
    pub id: PersonId,
    history: VecDeque<Pose>,
    miss_count: u32,
    cumulative: MovementDelta,
}

impl TrackedPerson {
    fn new(id: PersonId, pose: Pose, window: usize) -> Self {
        let mut history = VecDeque::with_capacity(window);
        history.push_back(pose);
        Self {
            id,
            history,
            miss_count: 0,
            cumulative: MovementDelta::zero(),
        }
    }

    /// 最後に観測されたポーズ（未検出中は凍結された直前値）
    pub fn last_pose(&self) -> &Pose {
        self.history.back().expect("history is never empty")
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn miss_count(&self) -> u32 {
        self.miss_count
    }

    /// 部位別の累積移動量（ピクセル）
    pub fn cumulative(&self) -> &MovementDelta {
        &self.cumulative
    }

    fn push_pose(&mut self, pose: Pose, window: usize) {
        self.history.push_back(pose);
        while self.history.len() > window {
            self.history.pop_front();
        }
    }
}

/// 1フレーム分の割り当て結果
///
/// `previous`がNoneなら新規ID（このフレームの移動量は0扱い）。
/// 未検出明けの再検出では`previous`はギャップ直前のポーズになる
pub struct FrameAssignment {
    pub person_id: PersonId,
    pub previous: Option<Pose>,
    pub current: Pose,
}

/// 検出結果をフレーム間で同一人物に対応付けるトラッカー
///
/// 代表点の最近傍マッチング。距離昇順のグリーディ割り当てで、
/// 同距離のときは古いID優先（テスト用に決定的）
pub struct IdentityTracker {
    people: Vec<TrackedPerson>,
    next_id: PersonId,
    confidence_floor: f32,
    match_distance: f32,
    miss_timeout: u32,
    history_window: usize,
}

impl IdentityTracker {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            people: Vec::new(),
            next_id: 1,
            confidence_floor: config.confidence_floor,
            match_distance: config.match_distance,
            miss_timeout: config.miss_timeout.max(1),
            history_window: config.history_window.max(2),
        }
    }

    /// 現在追跡中の人数（未検出デバウンス中も含む）
    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    pub fn people(&self) -> &[TrackedPerson] {
        &self.people
    }

    /// 今フレームの検出を既存IDへ割り当てる
    ///
    /// 1. 代表点間距離が閾値未満の(ID, 検出)ペアを距離昇順に確定
    /// 2. 未割り当ての既存IDはミスカウントを加算、タイムアウトで破棄
    /// 3. 未割り当ての検出は新規IDを採番
    pub fn assign(&mut self, detections: &[Pose]) -> Vec<FrameAssignment> {
        let reps: Vec<(f32, f32)> = detections
            .iter()
            .map(|d| d.representative_point(self.confidence_floor))
            .collect();

        // 閾値内の候補ペアを全列挙して (距離, ID) 順でグリーディに確定
        let mut candidates: Vec<(f32, PersonId, usize, usize)> = Vec::new();
        for (pi, person) in self.people.iter().enumerate() {
            let (px, py) = person.last_pose().representative_point(self.confidence_floor);
            for (di, &(dx, dy)) in reps.iter().enumerate() {
                let dist = ((px - dx) * (px - dx) + (py - dy) * (py - dy)).sqrt();
                if dist < self.match_distance {
                    candidates.push((dist, person.id, pi, di));
                }
            }
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let mut person_claimed = vec![false; self.people.len()];
        let mut detection_claimed = vec![false; detections.len()];
        let mut matched: Vec<(usize, usize)> = Vec::new();
        for &(_, _, pi, di) in &candidates {
            if person_claimed[pi] || detection_claimed[di] {
                continue;
            }
            person_claimed[pi] = true;
            detection_claimed[di] = true;
            matched.push((pi, di));
        }

        let mut assignments: Vec<FrameAssignment> = Vec::with_capacity(detections.len());

        // マッチした既存ID: 直前ポーズを控えてから履歴を更新
        matched.sort_by_key(|&(pi, _)| self.people[pi].id);
        for &(pi, di) in &matched {
            let person = &mut self.people[pi];
            let previous = person.last_pose().clone();
            person.push_pose(detections[di].clone(), self.history_window);
            person.miss_count = 0;
            assignments.push(FrameAssignment {
                person_id: person.id,
                previous: Some(previous),
                current: detections[di].clone(),
            });
        }

        // 未検出の既存ID: ミスカウント加算、タイムアウトで破棄
        for (pi, person) in self.people.iter_mut().enumerate() {
            if !person_claimed[pi] {
                person.miss_count += 1;
            }
        }
        let timeout = self.miss_timeout;
        self.people.retain(|p| p.miss_count < timeout);

        // 未割り当ての検出: 新規ID
        for (di, detection) in detections.iter().enumerate() {
            if detection_claimed[di] {
                continue;
            }
            let id = self.next_id;
            self.next_id += 1;
            self.people
                .push(TrackedPerson::new(id, detection.clone(), self.history_window));
            assignments.push(FrameAssignment {
                person_id: id,
                previous: None,
                current: detection.clone(),
            });
        }

        assignments
    }

    /// 部位別移動量を人物の累積値へ加算
    pub fn accumulate(&mut self, id: PersonId, delta: &MovementDelta) {
        if let Some(person) = self.people.iter_mut().find(|p| p.id == id) {
            person.cumulative.add(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{Keypoint, KeypointIndex};

    fn tracker_config() -> TrackerConfig {
        TrackerConfig {
            confidence_floor: 0.3,
            match_distance: 150.0,
            miss_timeout: 5,
            history_window: 30,
        }
    }

    /// 全17点を(x, y)中心の同一座標に置いたポーズ
    fn pose_at(x: f32, y: f32) -> Pose {
        Pose::new([Keypoint::new(x, y, 0.9); KeypointIndex::COUNT])
    }

    #[test]
    fn test_empty_frame_no_assignments() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        let assignments = tracker.assign(&[]);
        assert!(assignments.is_empty());
        assert_eq!(tracker.person_count(), 0);
    }

    #[test]
    fn test_first_detection_spawns_new_id() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        let assignments = tracker.assign(&[pose_at(100.0, 100.0)]);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].person_id, 1);
        assert!(assignments[0].previous.is_none());
        assert_eq!(tracker.person_count(), 1);
    }

    #[test]
    fn test_nearby_detection_keeps_id() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);
        let assignments = tracker.assign(&[pose_at(110.0, 100.0)]);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].person_id, 1);
        assert!(assignments[0].previous.is_some());
        assert_eq!(tracker.person_count(), 1);
    }

    #[test]
    fn test_distant_detection_spawns_new_id() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);
        // 閾値150pxを超える距離 → 別人扱い
        let assignments = tracker.assign(&[pose_at(500.0, 500.0)]);
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].person_id, 2);
        assert!(assignments[0].previous.is_none());
        // 旧IDはミス1回でまだ残っている
        assert_eq!(tracker.person_count(), 2);
    }

    #[test]
    fn test_two_people_keep_distinct_ids() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0), pose_at(500.0, 500.0)]);
        let assignments = tracker.assign(&[pose_at(505.0, 505.0), pose_at(102.0, 100.0)]);

        // 入力順に依らずIDが位置で対応する
        let mut ids: Vec<(PersonId, f32)> = assignments
            .iter()
            .map(|a| (a.person_id, a.current.get(KeypointIndex::Nose).x))
            .collect();
        ids.sort_by_key(|&(id, _)| id);
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].0, 1);
        assert!((ids[0].1 - 102.0).abs() < 1e-4);
        assert_eq!(ids[1].0, 2);
        assert!((ids[1].1 - 505.0).abs() < 1e-4);
    }

    #[test]
    fn test_tie_break_prefers_older_id() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        // ID1とID2が検出点から等距離になる配置
        tracker.assign(&[pose_at(100.0, 100.0), pose_at(200.0, 100.0)]);
        let assignments = tracker.assign(&[pose_at(150.0, 100.0)]);
        assert_eq!(assignments.len(), 1);
        // 等距離なら古いID（小さいID）が勝つ
        assert_eq!(assignments[0].person_id, 1);
    }

    #[test]
    fn test_miss_below_timeout_keeps_id_and_history() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);

        // k=5: 4フレーム連続未検出まではIDが残る
        for _ in 0..4 {
            tracker.assign(&[]);
        }
        assert_eq!(tracker.person_count(), 1);
        assert_eq!(tracker.people()[0].miss_count(), 4);

        // 再検出: 同一ID、ギャップ直前のポーズと比較される
        let assignments = tracker.assign(&[pose_at(100.0, 100.0)]);
        assert_eq!(assignments[0].person_id, 1);
        let prev = assignments[0].previous.as_ref().unwrap();
        assert!((prev.get(KeypointIndex::Nose).x - 100.0).abs() < 1e-4);
    }

    #[test]
    fn test_miss_at_timeout_evicts_and_reissues_new_id() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);

        // k=5フレーム連続未検出で破棄
        for _ in 0..5 {
            tracker.assign(&[]);
        }
        assert_eq!(tracker.person_count(), 0);

        // 同じ場所に現れても新規ID
        let assignments = tracker.assign(&[pose_at(100.0, 100.0)]);
        assert_eq!(assignments[0].person_id, 2);
        assert!(assignments[0].previous.is_none());
    }

    #[test]
    fn test_miss_counter_resets_on_redetection() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);
        for _ in 0..4 {
            tracker.assign(&[]);
        }
        tracker.assign(&[pose_at(100.0, 100.0)]);
        assert_eq!(tracker.people()[0].miss_count(), 0);

        // 再度4フレーム消えてもまだ生きている
        for _ in 0..4 {
            tracker.assign(&[]);
        }
        assert_eq!(tracker.person_count(), 1);
    }

    #[test]
    fn test_history_bounded_by_window() {
        let mut config = tracker_config();
        config.history_window = 4;
        let mut tracker = IdentityTracker::new(&config);
        for i in 0..10 {
            tracker.assign(&[pose_at(100.0 + i as f32, 100.0)]);
        }
        assert_eq!(tracker.people()[0].history_len(), 4);
    }

    #[test]
    fn test_duplicate_identical_detections_degrade_gracefully() {
        let mut tracker = IdentityTracker::new(&tracker_config());
        tracker.assign(&[pose_at(100.0, 100.0)]);
        // 同一座標の重複検出: 片方が既存IDに、もう片方は新規IDに
        let assignments = tracker.assign(&[pose_at(100.0, 100.0), pose_at(100.0, 100.0)]);
        assert_eq!(assignments.len(), 2);
        assert_eq!(tracker.person_count(), 2);
    }
}
