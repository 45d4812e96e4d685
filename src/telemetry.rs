use anyhow::{bail, Result};
use rosc::{decoder, encoder, OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

use crate::tracker::MovementSnapshot;

/// 移動量テレメトリのOSCアドレス
pub const MOVEMENT_ADDR: &str = "/mai/movement";
/// リセット要求のOSCアドレス
pub const RESET_ADDR: &str = "/mai/reset";

/// 送信用の移動量レコード
///
/// 引数: person_count, total, arms, legs, head
/// 値はピクセル変位のまま（スケーリングは受信側の責任）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementUpdate {
    pub person_count: i32,
    pub total_movement: f32,
    pub arm_movement: f32,
    pub leg_movement: f32,
    pub head_movement: f32,
}

impl MovementUpdate {
    pub fn from_snapshot(snapshot: &MovementSnapshot) -> Self {
        Self {
            person_count: snapshot.person_count as i32,
            total_movement: snapshot.total_movement,
            arm_movement: snapshot.arm_movement,
            leg_movement: snapshot.leg_movement,
            head_movement: snapshot.head_movement,
        }
    }
}

/// 消費側へ送るOSCメッセージを構築
pub fn build_movement_message(update: &MovementUpdate) -> OscMessage {
    OscMessage {
        addr: MOVEMENT_ADDR.to_string(),
        args: vec![
            OscType::Int(update.person_count),
            OscType::Float(update.total_movement),
            OscType::Float(update.arm_movement),
            OscType::Float(update.leg_movement),
            OscType::Float(update.head_movement),
        ],
    }
}

/// OSCメッセージをバイト列にエンコード
pub fn encode_message(msg: &OscMessage) -> Result<Vec<u8>> {
    let packet = OscPacket::Message(msg.clone());
    let encoded = encoder::encode(&packet)?;
    Ok(encoded)
}

/// 受信した制御メッセージ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Reset,
}

/// 受信パケットを制御メッセージへ変換
///
/// 境界でアドレスを検証してから型付きメッセージとして中へ渡す。
/// 未知のアドレスや壊れたパケットはNone（エラーにしない）
pub fn parse_control_packet(buf: &[u8]) -> Option<ControlMessage> {
    let (_, packet) = decoder::decode_udp(buf).ok()?;
    packet_to_control(&packet)
}

fn packet_to_control(packet: &OscPacket) -> Option<ControlMessage> {
    match packet {
        OscPacket::Message(msg) if msg.addr == RESET_ADDR => Some(ControlMessage::Reset),
        OscPacket::Message(_) => None,
        // バンドルは先頭から探索して最初の制御メッセージを採用
        OscPacket::Bundle(bundle) => bundle.content.iter().find_map(packet_to_control),
    }
}

/// テレメトリクライアント（UDP・複数宛先ファンアウト）
///
/// 配送保証なしのat-most-once。1宛先の失敗は他の宛先を妨げない
pub struct TelemetryClient {
    socket: UdpSocket,
    targets: Vec<String>,
}

impl TelemetryClient {
    pub fn new(targets: &[String]) -> Result<Self> {
        if targets.is_empty() {
            bail!("no telemetry targets configured");
        }
        let socket = UdpSocket::bind("0.0.0.0:0")?;
        Ok(Self {
            socket,
            targets: targets.to_vec(),
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    /// 全宛先へ送信。失敗した宛先があれば最後にまとめて報告
    pub fn send(&self, update: &MovementUpdate) -> Result<()> {
        let msg = build_movement_message(update);
        let data = encode_message(&msg)?;
        let mut failed = 0usize;
        for target in &self.targets {
            if self.socket.send_to(&data, target).is_err() {
                failed += 1;
            }
        }
        if failed > 0 {
            bail!("failed to send to {}/{} targets", failed, self.targets.len());
        }
        Ok(())
    }
}

/// 制御メッセージ受信（OSC/UDP）
pub struct ControlListener {
    socket: UdpSocket,
}

impl ControlListener {
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self { socket })
    }

    /// ブロッキングで1パケット受信して解釈
    /// 制御メッセージでないパケットはNone
    pub fn recv(&self) -> Result<Option<ControlMessage>> {
        let mut buf = [0u8; 1536];
        let (len, _) = self.socket.recv_from(&mut buf)?;
        Ok(parse_control_packet(&buf[..len]))
    }
}
