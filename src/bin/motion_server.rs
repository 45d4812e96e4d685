//! Motion server: receives pose frames over TCP, tracks person identities,
//! quantifies per-region movement, and fans out OSC telemetry to consumers.

use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use mai_tracker::config::Config;
use mai_tracker::pose::{Keypoint, KeypointIndex, Pose};
use mai_tracker::protocol::{
    self, ClientMessage, ServerMessage, WirePose, WIRE_KEYPOINT_COUNT,
};
use mai_tracker::telemetry::{
    ControlListener, ControlMessage, MovementUpdate, TelemetryClient,
};
use mai_tracker::tracker::{MovementQuantifier, MovementSnapshot, Smoother};

const CONFIG_PATH: &str = "config.toml";

// ===========================================================================
// Logging
// ===========================================================================

type LogFile = Arc<Mutex<std::io::BufWriter<std::fs::File>>>;

fn open_log_file() -> Result<(LogFile, String)> {
    std::fs::create_dir_all("logs")?;
    let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let path = format!("logs/motion_{}.log", ts);
    let file = std::fs::File::create(&path)?;
    eprintln!("Log: {}", path);
    Ok((Arc::new(Mutex::new(std::io::BufWriter::new(file))), path))
}

macro_rules! log {
    ($logfile:expr, $($arg:tt)*) => {{
        let msg = format!($($arg)*);
        eprintln!("{}", msg);
        if let Ok(mut f) = $logfile.lock() {
            let _ = writeln!(f, "{}", msg);
        }
    }};
}

// ===========================================================================
// TCP receive loop
// ===========================================================================

enum TcpEvent {
    PoseFrame { people: Vec<WirePose> },
    Reset,
}

async fn tcp_receive_loop(
    stream: tokio::net::TcpStream,
    tx: mpsc::SyncSender<TcpEvent>,
    frame_drop_count: Arc<AtomicU32>,
) -> Result<()> {
    use futures::StreamExt as _;

    let framed = protocol::message_stream(stream);
    let (mut sink, mut reader) = framed.split();

    protocol::send_to_sink(&mut sink, &ServerMessage::Ready).await?;

    loop {
        let bytes = match reader.next().await {
            Some(Ok(b)) => b,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(anyhow::anyhow!("connection closed")),
        };
        let msg: ClientMessage = bincode::deserialize(&bytes)?;
        match msg {
            ClientMessage::PoseFrame { people, .. } => {
                // 処理が追いつかないフレームは捨てる（最新優先）
                if tx.try_send(TcpEvent::PoseFrame { people }).is_err() {
                    frame_drop_count.fetch_add(1, Ordering::Relaxed);
                }
            }
            ClientMessage::Reset => {
                let _ = tx.send(TcpEvent::Reset);
            }
        }
    }
}

// ===========================================================================
// Boundary validation
// ===========================================================================

/// ワイヤ形式から内部Poseへ変換
/// キーポイント数が17でない検出は信号なし扱いで捨てる（エラーにしない）
fn wire_to_pose(wire: &WirePose) -> Option<Pose> {
    if wire.keypoints.len() != WIRE_KEYPOINT_COUNT {
        return None;
    }
    let mut keypoints = [Keypoint::default(); KeypointIndex::COUNT];
    for (i, kp) in wire.keypoints.iter().enumerate() {
        keypoints[i] = Keypoint::new(kp.x, kp.y, kp.confidence);
    }
    Some(Pose::new(keypoints))
}

// ===========================================================================
// Motion loop (sync, blocking)
// ===========================================================================

#[allow(clippy::too_many_arguments)]
fn run_motion_loop(
    rx: &mpsc::Receiver<TcpEvent>,
    quantifier: &mut MovementQuantifier,
    latest: &Arc<Mutex<Option<MovementSnapshot>>>,
    logfile: &LogFile,
    verbose: bool,
    trigger_reset: &AtomicBool,
    trigger_stats: &AtomicBool,
    reset_smoother: &AtomicBool,
    frame_drop_count: &AtomicU32,
) {
    let mut frame_count = 0u32;
    let mut malformed_count = 0u32;
    let mut status_timer = Instant::now();

    loop {
        // コンソール/OSCからのトリガを確認
        if trigger_reset.swap(false, Ordering::Relaxed) {
            quantifier.reset();
            reset_smoother.store(true, Ordering::Relaxed);
            log!(logfile, "Cumulative stats reset");
        }
        if trigger_stats.swap(false, Ordering::Relaxed) {
            let stats = quantifier.stats();
            log!(
                logfile,
                "[stats] frames={} mean_total={:.2} max_total={:.2} peak_persons={}",
                stats.message_count,
                stats.mean_total(),
                stats.max_total,
                stats.peak_person_count
            );
            let top = quantifier
                .tracker()
                .people()
                .iter()
                .max_by(|a, b| a.cumulative().total.total_cmp(&b.cumulative().total));
            if let Some(top) = top {
                log!(
                    logfile,
                    "[stats] top mover: id {} total {:.1}px",
                    top.id,
                    top.cumulative().total
                );
            }
        }

        let event = match rx.recv_timeout(Duration::from_millis(1)) {
            Ok(ev) => Some(ev),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                log!(logfile, "TCP channel disconnected");
                break;
            }
        };

        if let Some(ev) = event {
            match ev {
                TcpEvent::PoseFrame { people } => {
                    let poses: Vec<Pose> = people.iter().filter_map(wire_to_pose).collect();
                    let malformed = people.len() - poses.len();
                    if malformed > 0 {
                        malformed_count += malformed as u32;
                        if verbose {
                            log!(logfile, "[verbose] dropped {} malformed poses", malformed);
                        }
                    }

                    let snapshot = quantifier.process_frame(&poses);
                    // 読み手はコピーを受け取る。参照は共有しない
                    *latest.lock().unwrap() = Some(snapshot);
                    frame_count += 1;
                }
                TcpEvent::Reset => {
                    quantifier.reset();
                    reset_smoother.store(true, Ordering::Relaxed);
                    log!(logfile, "Cumulative stats reset (pose source)");
                }
            }
        }

        // ステータス表示（1秒に1回）
        let elapsed = status_timer.elapsed().as_secs_f32();
        if elapsed >= 1.0 {
            if frame_count > 0 {
                let current = quantifier.latest().unwrap_or_default();
                let avg = quantifier.history().windowed_average();
                let drops = frame_drop_count.swap(0, Ordering::Relaxed);
                println!(
                    "FPS: {:.1} | persons: {} | total: {:.2} (win avg {:.2}) | malformed: {} | dropped: {}",
                    frame_count as f32 / elapsed,
                    current.person_count,
                    current.total_movement,
                    avg.total_movement,
                    malformed_count,
                    drops
                );
            }
            frame_count = 0;
            malformed_count = 0;
            status_timer = Instant::now();
        }
    }
}

// ===========================================================================
// Emitter / control threads
// ===========================================================================

fn spawn_emitter(
    client: TelemetryClient,
    latest: Arc<Mutex<Option<MovementSnapshot>>>,
    mut smoother: Smoother,
    interval: Duration,
    reset_smoother: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        std::thread::sleep(interval);
        if reset_smoother.swap(false, Ordering::Relaxed) {
            smoother.reset();
        }
        let snapshot = { *latest.lock().unwrap() };
        if let Some(snapshot) = snapshot {
            let smoothed = smoother.apply(snapshot);
            // 送信失敗で止めない（配送保証なし）
            if let Err(e) = client.send(&MovementUpdate::from_snapshot(&smoothed)) {
                eprintln!("telemetry send failed: {}", e);
            }
        }
    })
}

fn spawn_control_listener(
    listener: ControlListener,
    trigger_reset: Arc<AtomicBool>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || loop {
        match listener.recv() {
            Ok(Some(ControlMessage::Reset)) => {
                println!("Reset requested via OSC");
                trigger_reset.store(true, Ordering::Relaxed);
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("OSC listener error: {}", e);
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    })
}

// ===========================================================================
// Main
// ===========================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    let (logfile, _log_path) = open_log_file()?;

    log!(logfile, "Motion server {} starting", env!("GIT_VERSION"));
    log!(logfile, "Pose listen: {}", config.listen.pose_addr);
    log!(logfile, "OSC listen: {}", config.listen.osc_addr);
    log!(
        logfile,
        "Telemetry: {:?} every {}s (smooth alpha {})",
        config.telemetry.targets,
        config.telemetry.interval_secs,
        config.smooth.movement
    );
    log!(
        logfile,
        "Tracker: floor={} match_distance={}px miss_timeout={} window={}",
        config.tracker.confidence_floor,
        config.tracker.match_distance,
        config.tracker.miss_timeout,
        config.tracker.history_window
    );

    let trigger_reset = Arc::new(AtomicBool::new(false));
    let trigger_stats = Arc::new(AtomicBool::new(false));
    let reset_smoother = Arc::new(AtomicBool::new(false));
    let frame_drop_count = Arc::new(AtomicU32::new(0));
    let latest: Arc<Mutex<Option<MovementSnapshot>>> = Arc::new(Mutex::new(None));

    // コンソール入力スレッド (r=リセット, s=統計表示)
    {
        let trigger_reset = trigger_reset.clone();
        let trigger_stats = trigger_stats.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut line = String::new();
            loop {
                line.clear();
                match stdin.read_line(&mut line) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                match line.trim() {
                    "r" => trigger_reset.store(true, Ordering::Relaxed),
                    "s" => trigger_stats.store(true, Ordering::Relaxed),
                    "" => {}
                    other => println!("unknown command: {} (r=reset, s=stats)", other),
                }
            }
        });
    }

    let control = ControlListener::bind(&config.listen.osc_addr)
        .with_context(|| format!("failed to bind OSC listener on {}", config.listen.osc_addr))?;
    let _control_thread = spawn_control_listener(control, trigger_reset.clone());

    let client = TelemetryClient::new(&config.telemetry.targets)?;
    let smoother = Smoother::from_config(&config.smooth);
    let interval = Duration::from_secs_f32(config.telemetry.interval_secs.max(0.1));
    let _emitter_thread = spawn_emitter(
        client,
        latest.clone(),
        smoother,
        interval,
        reset_smoother.clone(),
    );

    let mut quantifier = MovementQuantifier::new(&config.tracker, config.history.capacity);

    let listener = tokio::net::TcpListener::bind(&config.listen.pose_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen.pose_addr))?;
    log!(logfile, "Waiting for pose source on {}", config.listen.pose_addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        log!(logfile, "Pose source connected: {}", peer);

        let (tx, rx) = mpsc::sync_channel::<TcpEvent>(16);
        let drop_count = frame_drop_count.clone();
        let tcp_task = tokio::spawn(async move {
            if let Err(e) = tcp_receive_loop(stream, tx, drop_count).await {
                eprintln!("TCP receive loop ended: {}", e);
            }
        });

        // 追跡と集計はフレーム同期の単一スレッドで回す
        tokio::task::block_in_place(|| {
            run_motion_loop(
                &rx,
                &mut quantifier,
                &latest,
                &logfile,
                config.app.verbose,
                &trigger_reset,
                &trigger_stats,
                &reset_smoother,
                &frame_drop_count,
            )
        });

        tcp_task.abort();
        log!(logfile, "Pose source disconnected");
    }
}
