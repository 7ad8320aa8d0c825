//! Connection management and frame correlation.

use crate::error::ClientError;
use bleconf_protocol::{
    cmd, AccessPoint, Cursor, DeviceSetting, FrameAssembler, FrameBuilder, OtaProgress, RawFrame,
};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex};
use tracing::{debug, warn};

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Device address.
    pub addr: SocketAddr,
    /// Session token sent in the authorization envelope.
    pub token: Option<String>,
    /// Maximum bytes per write, mirroring the device's transport limit.
    pub chunk_size: usize,
    /// Pacing delay between chunks in milliseconds.
    pub chunk_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            token: None,
            chunk_size: bleconf_protocol::DEFAULT_CHUNK_SIZE,
            chunk_delay_ms: 20,
            request_timeout_secs: 10,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

/// An unsolicited frame pushed by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    AccessPoints(Vec<AccessPoint>),
    OtaProgress(OtaProgress),
    Property(DeviceSetting),
}

/// Parses a push frame into an event. Returns `None` for commands that
/// are not pushes.
fn parse_push(frame: &RawFrame) -> Option<PushEvent> {
    let mut cur = Cursor::new(&frame.body);
    match frame.cmd {
        cmd::AP_PUSH => Some(PushEvent::AccessPoints(AccessPoint::decode_list(&mut cur))),
        cmd::OTA_PROGRESS => Some(PushEvent::OtaProgress(OtaProgress::decode(&mut cur))),
        cmd::PROPERTY_PUSH => DeviceSetting::decode(&mut cur).map(PushEvent::Property),
        _ => None,
    }
}

/// A connection to a device's provisioning channel.
///
/// Responses are correlated with requests by command id; the protocol
/// has no request ids and allows one in-flight request per command.
pub struct Connection {
    config: ConnectionConfig,
    writer: AsyncMutex<Option<OwnedWriteHalf>>,
    reader: AsyncMutex<Option<OwnedReadHalf>>,
    pending: Mutex<HashMap<u8, oneshot::Sender<Bytes>>>,
    push_tx: broadcast::Sender<PushEvent>,
}

impl Connection {
    pub fn new(config: ConnectionConfig) -> Self {
        let (push_tx, _) = broadcast::channel(64);
        Self {
            config,
            writer: AsyncMutex::new(None),
            reader: AsyncMutex::new(None),
            pending: Mutex::new(HashMap::new()),
            push_tx,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Establishes the TCP connection.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let stream = TcpStream::connect(self.config.addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();
        *self.reader.lock().await = Some(read_half);
        *self.writer.lock().await = Some(write_half);
        debug!(addr = %self.config.addr, "connected");
        Ok(())
    }

    /// Subscribes to unsolicited push frames. Subscribe before
    /// spawning [`read_loop`](Connection::read_loop) to avoid missing
    /// early pushes.
    pub fn subscribe_push(&self) -> broadcast::Receiver<PushEvent> {
        self.push_tx.subscribe()
    }

    /// Reads frames until the connection closes, completing pending
    /// requests and forwarding pushes. Run this in its own task.
    pub async fn read_loop(&self) -> Result<(), ClientError> {
        let mut reader = self
            .reader
            .lock()
            .await
            .take()
            .ok_or(ClientError::NotConnected)?;

        let mut assembler = FrameAssembler::new();
        let mut buf = [0u8; 256];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                debug!("connection closed by peer");
                self.pending.lock().clear();
                return Ok(());
            }
            match assembler.push(&buf[..n]) {
                Ok(Some(frame)) => self.route(frame),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "dropping corrupt inbound frame"),
            }
        }
    }

    fn route(&self, frame: RawFrame) {
        if let Some(event) = parse_push(&frame) {
            let _ = self.push_tx.send(event);
            return;
        }
        match self.pending.lock().remove(&frame.cmd) {
            Some(tx) => {
                let _ = tx.send(frame.body);
            }
            None => warn!(cmd = frame.cmd, "response with no pending request"),
        }
    }

    /// Sends a request and awaits the response body for the same
    /// command id. Token rotation goes out without the authorization
    /// envelope; every other command carries it.
    pub async fn request(&self, command: u8, payload: &[u8]) -> Result<Bytes, ClientError> {
        let frame = if command == cmd::ROTATE_TOKEN {
            FrameBuilder::new(command).push_raw(payload).finish()
        } else {
            let token = self.config.token.clone().unwrap_or_default();
            FrameBuilder::new(command)
                .push_token(&token)
                .push_raw(payload)
                .finish()
        };

        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(command, tx);

        if let Err(e) = self.write_frame(&frame).await {
            self.pending.lock().remove(&command);
            return Err(e);
        }

        match tokio::time::timeout(self.config.request_timeout(), rx).await {
            Ok(Ok(body)) => Ok(body),
            Ok(Err(_)) => Err(ClientError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().remove(&command);
                Err(ClientError::Timeout)
            }
        }
    }

    /// Writes a frame in transport-sized chunks with pacing, the same
    /// way the device side sends.
    async fn write_frame(&self, frame: &Bytes) -> Result<(), ClientError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(ClientError::NotConnected)?;
        for chunk in frame.chunks(self.config.chunk_size) {
            writer.write_all(chunk).await?;
            tokio::time::sleep(self.config.chunk_delay()).await;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Shuts down the write half; the read loop ends when the peer
    /// closes its side.
    pub async fn close(&self) -> Result<(), ClientError> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleconf_protocol::Encoder;

    fn push_frame(command: u8, body: impl FnOnce(&mut Encoder)) -> RawFrame {
        let mut fb = FrameBuilder::new(command);
        body(fb.encoder());
        let bytes = fb.finish();
        FrameAssembler::new().push(&bytes).unwrap().unwrap()
    }

    #[test]
    fn test_parse_ap_push() {
        let frame = push_frame(cmd::AP_PUSH, |enc| {
            AccessPoint::encode_list(
                &[AccessPoint {
                    ssid: "home".into(),
                    rssi: -50,
                    authmode: 3,
                }],
                enc,
            );
        });
        match parse_push(&frame) {
            Some(PushEvent::AccessPoints(aps)) => {
                assert_eq!(aps.len(), 1);
                assert_eq!(aps[0].ssid, "home");
            }
            other => panic!("unexpected parse result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ota_progress_push() {
        let frame = push_frame(cmd::OTA_PROGRESS, |enc| {
            OtaProgress {
                percent: 10,
                bytes_read: 512,
            }
            .encode(enc);
        });
        assert_eq!(
            parse_push(&frame),
            Some(PushEvent::OtaProgress(OtaProgress {
                percent: 10,
                bytes_read: 512
            }))
        );
    }

    #[test]
    fn test_parse_property_push() {
        let frame = push_frame(cmd::PROPERTY_PUSH, |enc| {
            DeviceSetting::Mic(false).encode(enc);
        });
        assert_eq!(
            parse_push(&frame),
            Some(PushEvent::Property(DeviceSetting::Mic(false)))
        );
    }

    #[test]
    fn test_response_frames_are_not_pushes() {
        let frame = push_frame(cmd::DEVICE_INFO, |enc| {
            enc.push_u8(0);
        });
        assert_eq!(parse_push(&frame), None);
    }
}
