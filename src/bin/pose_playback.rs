//! Synthetic pose source: generates moving dancers and streams pose frames
//! to the motion server over TCP, for end-to-end checks without a camera
//! or pose model.

use anyhow::Result;
use std::time::{Duration, Instant};

use mai_tracker::protocol::{
    self, ClientMessage, ServerMessage, WireKeypoint, WirePose, WIRE_KEYPOINT_COUNT,
};

const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:9000";
const FRAME_RATE: f64 = 30.0;
const DANCER_COUNT: usize = 3;

/// 基準姿勢からの相対オフセット（ピクセル）
/// 順序: 鼻, 目×2, 耳×2, 肩×2, 肘×2, 手首×2, 腰×2, 膝×2, 足首×2
const BASE_OFFSETS: [(f32, f32); WIRE_KEYPOINT_COUNT] = [
    (0.0, -160.0),
    (-8.0, -168.0),
    (8.0, -168.0),
    (-20.0, -160.0),
    (20.0, -160.0),
    (-45.0, -110.0),
    (45.0, -110.0),
    (-60.0, -60.0),
    (60.0, -60.0),
    (-70.0, -10.0),
    (70.0, -10.0),
    (-25.0, 0.0),
    (25.0, 0.0),
    (-28.0, 80.0),
    (28.0, 80.0),
    (-30.0, 160.0),
    (30.0, 160.0),
];

/// ダンサー1人分の合成ポーズ
/// 体全体がゆっくり揺れ、肘と手首が速く振れる
fn dancer_pose(center_x: f32, center_y: f32, t: f32, phase: f32) -> WirePose {
    let sway = (t * 1.2 + phase).sin() * 12.0;
    let arm_swing = (t * 3.0 + phase).sin() * 40.0;

    let mut keypoints = Vec::with_capacity(WIRE_KEYPOINT_COUNT);
    for (i, &(ox, oy)) in BASE_OFFSETS.iter().enumerate() {
        let x = center_x + ox + sway;
        let mut y = center_y + oy;
        // 肘(7,8)と手首(9,10)
        if (7..=10).contains(&i) {
            y += arm_swing;
        }
        keypoints.push(WireKeypoint {
            x,
            y,
            confidence: 0.9,
        });
    }
    WirePose { keypoints }
}

#[tokio::main]
async fn main() -> Result<()> {
    let addr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string());

    println!("Pose Playback - synthetic pose source");
    println!("接続先: {}", addr);
    println!("ダンサー数: {}", DANCER_COUNT);

    let stream = tokio::net::TcpStream::connect(&addr).await?;
    let mut stream = protocol::message_stream(stream);

    // サーバ準備完了を待つ
    let msg: ServerMessage = protocol::recv_message(&mut stream).await?;
    println!("Server: {:?}", msg);

    let start = Instant::now();
    let frame_duration = Duration::from_secs_f64(1.0 / FRAME_RATE);
    let mut frame_count = 0u32;
    let mut sent_total = 0u64;
    let mut fps_timer = Instant::now();

    loop {
        let loop_start = Instant::now();
        let t = start.elapsed().as_secs_f32();

        let people: Vec<WirePose> = (0..DANCER_COUNT)
            .map(|i| {
                let phase = i as f32 * 2.1;
                let center_x = 300.0 + i as f32 * 400.0 + (t * 0.3 + phase).sin() * 80.0;
                dancer_pose(center_x, 400.0, t, phase)
            })
            .collect();

        let msg = ClientMessage::PoseFrame {
            timestamp_us: start.elapsed().as_micros() as u64,
            people,
        };
        protocol::send_message(&mut stream, &msg).await?;
        frame_count += 1;
        sent_total += 1;

        if fps_timer.elapsed().as_secs_f32() >= 1.0 {
            println!("sent {} frames ({} total)", frame_count, sent_total);
            frame_count = 0;
            fps_timer = Instant::now();
        }

        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            tokio::time::sleep(frame_duration - elapsed).await;
        }
    }
}
