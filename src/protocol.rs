//! TCP protocol for pose-source ↔ motion-server communication.
//!
//! Self-contained: no imports from other mai_tracker modules.

use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// ワイヤ上のキーポイント数（MoveNet系の17点固定）
pub const WIRE_KEYPOINT_COUNT: usize = 17;

// --- Message types ---

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct WireKeypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

/// 1人分の検出結果
/// keypointsは17点（解剖学的な固定順）。個数は受信側の境界で検証する
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WirePose {
    pub keypoints: Vec<WireKeypoint>,
}

/// Pose source → Server
#[derive(Serialize, Deserialize, Debug)]
pub enum ClientMessage {
    PoseFrame { timestamp_us: u64, people: Vec<WirePose> },
    Reset,
}

/// Server → Pose source
#[derive(Serialize, Deserialize, Debug)]
pub enum ServerMessage {
    Ready,
}

// --- TCP codec helpers ---

pub type MessageStream = Framed<TcpStream, LengthDelimitedCodec>;
pub type MessageSink = SplitSink<MessageStream, Bytes>;

/// Create a framed message stream with length-delimited framing.
pub fn message_stream(stream: TcpStream) -> MessageStream {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(1024 * 1024) // 1MB
        .new_codec();
    Framed::new(stream, codec)
}

/// Send a serializable message (bincode + length prefix).
pub async fn send_message<T: Serialize>(
    stream: &mut MessageStream,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    stream.send(Bytes::from(data)).await?;
    Ok(())
}

/// Send on a split sink (receive loop keeps the read half).
pub async fn send_to_sink<T: Serialize>(
    sink: &mut MessageSink,
    msg: &T,
) -> anyhow::Result<()> {
    let data = bincode::serialize(msg)?;
    sink.send(Bytes::from(data)).await?;
    Ok(())
}

/// Receive and deserialize a message.
pub async fn recv_message<T: DeserializeOwned>(
    stream: &mut MessageStream,
) -> anyhow::Result<T> {
    match stream.next().await {
        Some(Ok(bytes)) => Ok(bincode::deserialize(&bytes)?),
        Some(Err(e)) => Err(e.into()),
        None => Err(anyhow::anyhow!("connection closed")),
    }
}
