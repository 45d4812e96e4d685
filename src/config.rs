use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub smooth: SmoothConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub app: AppConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// キーポイント信頼度の下限（ちょうど閾値の値は不使用扱い）
    #[serde(default = "default_confidence_floor")]
    pub confidence_floor: f32,
    /// 同一人物とみなす代表点間距離の上限（ピクセル）
    #[serde(default = "default_match_distance")]
    pub match_distance: f32,
    /// 連続未検出でIDを破棄するまでのフレーム数
    #[serde(default = "default_miss_timeout")]
    pub miss_timeout: u32,
    /// 1人あたりのポーズ履歴長
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_confidence_floor() -> f32 { 0.3 }
fn default_match_distance() -> f32 { 150.0 }
fn default_miss_timeout() -> u32 { 5 }
fn default_history_window() -> usize { 30 }

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            confidence_floor: default_confidence_floor(),
            match_distance: default_match_distance(),
            miss_timeout: default_miss_timeout(),
            history_window: default_history_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// スナップショット履歴の保持件数
    #[serde(default = "default_history_capacity")]
    pub capacity: usize,
}

fn default_history_capacity() -> usize { 300 }

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: default_history_capacity() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SmoothConfig {
    /// 送信値のEMA係数（1.0で平滑化なし）
    #[serde(default = "default_smooth_movement")]
    pub movement: f32,
}

fn default_smooth_movement() -> f32 { 0.4 }

impl Default for SmoothConfig {
    fn default() -> Self {
        Self { movement: default_smooth_movement() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// 送信先アドレス（複数可）
    #[serde(default = "default_telemetry_targets")]
    pub targets: Vec<String>,
    /// 送信間隔（秒）
    #[serde(default = "default_telemetry_interval")]
    pub interval_secs: f32,
}

fn default_telemetry_targets() -> Vec<String> {
    vec!["127.0.0.1:9100".to_string()]
}
fn default_telemetry_interval() -> f32 { 2.0 }

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            targets: default_telemetry_targets(),
            interval_secs: default_telemetry_interval(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ListenConfig {
    /// ポーズフレーム受信用TCPアドレス
    #[serde(default = "default_pose_addr")]
    pub pose_addr: String,
    /// 制御メッセージ受信用OSC/UDPアドレス
    #[serde(default = "default_osc_addr")]
    pub osc_addr: String,
}

fn default_pose_addr() -> String { "0.0.0.0:9000".to_string() }
fn default_osc_addr() -> String { "0.0.0.0:9001".to_string() }

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            pose_addr: default_pose_addr(),
            osc_addr: default_osc_addr(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub verbose: bool,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 読み込み失敗時はデフォルト値を使用
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(_) => {
                eprintln!("{} not found, using defaults", path.as_ref().display());
                Config::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tracker.miss_timeout, 5);
        assert_eq!(config.tracker.history_window, 30);
        assert_eq!(config.history.capacity, 300);
        assert_eq!(config.telemetry.targets.len(), 1);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [tracker]
            miss_timeout = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.tracker.miss_timeout, 8);
        // 未指定のキーはデフォルト値
        assert_eq!(config.tracker.history_window, 30);
        assert!((config.tracker.confidence_floor - 0.3).abs() < 1e-6);
    }
}
