/// MoveNet系モデルの17キーポイントインデックス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum KeypointIndex {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl KeypointIndex {
    pub const COUNT: usize = 17;

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Nose),
            1 => Some(Self::LeftEye),
            2 => Some(Self::RightEye),
            3 => Some(Self::LeftEar),
            4 => Some(Self::RightEar),
            5 => Some(Self::LeftShoulder),
            6 => Some(Self::RightShoulder),
            7 => Some(Self::LeftElbow),
            8 => Some(Self::RightElbow),
            9 => Some(Self::LeftWrist),
            10 => Some(Self::RightWrist),
            11 => Some(Self::LeftHip),
            12 => Some(Self::RightHip),
            13 => Some(Self::LeftKnee),
            14 => Some(Self::RightKnee),
            15 => Some(Self::LeftAnkle),
            16 => Some(Self::RightAnkle),
            _ => None,
        }
    }
}

/// 移動量計測の対象となる部位グループ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyRegion {
    /// 鼻・目・耳
    Head,
    /// 肩・肘・手首
    Arms,
    /// 腰・膝・足首
    Legs,
}

impl BodyRegion {
    pub const ALL: [BodyRegion; 3] = [BodyRegion::Head, BodyRegion::Arms, BodyRegion::Legs];

    /// グループに属するキーポイント
    pub fn keypoints(self) -> &'static [KeypointIndex] {
        use KeypointIndex::*;
        match self {
            BodyRegion::Head => &[Nose, LeftEye, RightEye, LeftEar, RightEar],
            BodyRegion::Arms => &[
                LeftShoulder, RightShoulder,
                LeftElbow, RightElbow,
                LeftWrist, RightWrist,
            ],
            BodyRegion::Legs => &[
                LeftHip, RightHip,
                LeftKnee, RightKnee,
                LeftAnkle, RightAnkle,
            ],
        }
    }
}

/// 単一キーポイント（画像ピクセル座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    /// X座標（ピクセル）
    pub x: f32,
    /// Y座標（ピクセル）
    pub y: f32,
    /// 信頼度スコア (0.0〜1.0)
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    /// 信頼度が閾値を超えているか
    /// 閾値ちょうどの値は前後フレームで一貫して不使用扱い
    pub fn is_usable(&self, floor: f32) -> bool {
        self.confidence > floor
    }

    /// 別キーポイントまでのユークリッド距離（ピクセル）
    pub fn distance_to(&self, other: &Keypoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Default for Keypoint {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            confidence: 0.0,
        }
    }
}

/// 17キーポイントからなる1人分の姿勢
#[derive(Debug, Clone)]
pub struct Pose {
    pub keypoints: [Keypoint; KeypointIndex::COUNT],
}

impl Pose {
    pub fn new(keypoints: [Keypoint; KeypointIndex::COUNT]) -> Self {
        Self { keypoints }
    }

    /// インデックスでキーポイントを取得
    pub fn get(&self, index: KeypointIndex) -> &Keypoint {
        &self.keypoints[index as usize]
    }

    /// 全キーポイントの平均信頼度
    pub fn average_confidence(&self) -> f32 {
        let sum: f32 = self.keypoints.iter().map(|k| k.confidence).sum();
        sum / KeypointIndex::COUNT as f32
    }

    /// 人物マッチング用の代表点
    /// 使用可能キーポイントの重心。1点もなければ全17点の重心にフォールバック
    pub fn representative_point(&self, floor: f32) -> (f32, f32) {
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut n = 0usize;
        for kp in self.keypoints.iter().filter(|k| k.is_usable(floor)) {
            sx += kp.x;
            sy += kp.y;
            n += 1;
        }
        if n == 0 {
            for kp in &self.keypoints {
                sx += kp.x;
                sy += kp.y;
            }
            n = KeypointIndex::COUNT;
        }
        (sx / n as f32, sy / n as f32)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            keypoints: [Keypoint::default(); KeypointIndex::COUNT],
        }
    }
}
