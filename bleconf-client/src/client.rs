//! Typed client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use bleconf_protocol::{
    cmd, Cursor, DeviceInfo, DeviceSetting, Encoder, HubConfig, OtaRequest, RemoteEndpoint,
    Status, WifiCredentials,
};
use std::sync::Arc;

/// Successful Wi-Fi connect response: the device's identity, confirmed
/// over the freshly joined network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectResult {
    pub ble_mac: String,
    pub mac: String,
    pub board: String,
    pub version: String,
}

/// High-level provisioning client.
#[derive(Clone)]
pub struct Client {
    connection: Arc<Connection>,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            connection: Arc::new(Connection::new(config)),
        }
    }

    /// The underlying connection, for spawning the read loop and
    /// subscribing to pushes.
    pub fn connection(&self) -> Arc<Connection> {
        self.connection.clone()
    }

    pub async fn connect(&self) -> Result<(), ClientError> {
        self.connection.connect().await
    }

    pub async fn close(&self) -> Result<(), ClientError> {
        self.connection.close().await
    }

    /// Queries device identity and current settings.
    pub async fn device_info(&self) -> Result<DeviceInfo, ClientError> {
        let body = self.connection.request(cmd::DEVICE_INFO, &[]).await?;
        let mut cur = Cursor::new(&body);
        ensure_ok(cmd::DEVICE_INFO, cur.pop_u8(u8::MAX))?;
        let info = DeviceInfo::decode(&mut cur);
        if cur.failed() {
            return Err(ClientError::MalformedResponse {
                command: cmd::DEVICE_INFO,
            });
        }
        Ok(info)
    }

    /// Asks the device to start pushing access-point scan results.
    /// Subscribe to push events on the connection to receive them.
    pub async fn start_ap_push(&self) -> Result<(), ClientError> {
        let body = self.connection.request(cmd::START_AP_PUSH, &[]).await?;
        ensure_ok(cmd::START_AP_PUSH, first_byte(&body))
    }

    /// Provisions Wi-Fi credentials and waits for the join result.
    pub async fn connect_wifi(&self, ssid: &str, password: &str) -> Result<ConnectResult, ClientError> {
        let mut enc = Encoder::new();
        WifiCredentials {
            ssid: ssid.to_string(),
            password: password.to_string(),
        }
        .encode(&mut enc);

        let body = self.connection.request(cmd::CONNECT_WIFI, enc.as_slice()).await?;
        let mut cur = Cursor::new(&body);
        ensure_ok(cmd::CONNECT_WIFI, cur.pop_u8(u8::MAX))?;
        let result = ConnectResult {
            ble_mac: cur.pop_str8(""),
            mac: cur.pop_str8(""),
            board: cur.pop_str8(""),
            version: cur.pop_str8(""),
        };
        if cur.failed() {
            return Err(ClientError::MalformedResponse {
                command: cmd::CONNECT_WIFI,
            });
        }
        Ok(result)
    }

    /// Configures where the device reports once provisioned. The
    /// device leaves configuring mode and restarts after answering.
    pub async fn set_endpoint(&self, url: &str, token: &str) -> Result<(), ClientError> {
        let mut enc = Encoder::new();
        RemoteEndpoint {
            url: url.to_string(),
            token: token.to_string(),
        }
        .encode(&mut enc);
        let body = self.connection.request(cmd::REMOTE_ENDPOINT, enc.as_slice()).await?;
        ensure_ok(cmd::REMOTE_ENDPOINT, first_byte(&body))
    }

    /// Registers the device with a third-party hub. A hub-side
    /// rejection surfaces the HTTP status code it answered with.
    pub async fn set_hub(&self, config: &HubConfig) -> Result<(), ClientError> {
        let mut enc = Encoder::new();
        config.encode(&mut enc);
        let body = self.connection.request(cmd::HUB_CONFIG, enc.as_slice()).await?;

        let mut cur = Cursor::new(&body);
        let status = cur.pop_u8(u8::MAX);
        if status == Status::Ok.as_u8() {
            return Ok(());
        }
        if status == Status::NotPermitted.as_u8() {
            let http_code = cur.pop_i16(0);
            if http_code != 0 {
                return Err(ClientError::HubRejected { http_code });
            }
        }
        Err(ClientError::CommandFailed {
            command: cmd::HUB_CONFIG,
            status,
        })
    }

    /// Starts an OTA update. Progress arrives as push events.
    pub async fn start_ota(&self, url: &str, version: &str) -> Result<(), ClientError> {
        let mut enc = Encoder::new();
        OtaRequest {
            url: url.to_string(),
            version: version.to_string(),
        }
        .encode(&mut enc);
        let body = self.connection.request(cmd::OTA_START, enc.as_slice()).await?;
        ensure_ok(cmd::OTA_START, first_byte(&body))
    }

    /// Applies one device setting.
    pub async fn set_setting(&self, setting: &DeviceSetting) -> Result<(), ClientError> {
        let mut enc = Encoder::new();
        setting.encode(&mut enc);
        let body = self.connection.request(cmd::DEVICE_SETTING, enc.as_slice()).await?;
        ensure_ok(cmd::DEVICE_SETTING, first_byte(&body))
    }

    /// Rotates the session token. Only permitted while the device is
    /// in configuring mode.
    pub async fn rotate_token(&self, new_token: &str) -> Result<(), ClientError> {
        let mut enc = Encoder::new();
        enc.push_str8(new_token);
        let body = self.connection.request(cmd::ROTATE_TOKEN, enc.as_slice()).await?;
        ensure_ok(cmd::ROTATE_TOKEN, first_byte(&body))
    }
}

fn first_byte(body: &[u8]) -> u8 {
    body.first().copied().unwrap_or(u8::MAX)
}

fn ensure_ok(command: u8, status: u8) -> Result<(), ClientError> {
    if status == Status::Ok.as_u8() {
        Ok(())
    } else {
        Err(ClientError::CommandFailed { command, status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bleconf_protocol::{FrameAssembler, FrameBuilder};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const TOKEN: &str = "abcdefghijklmnopqrstuvwxyz012345";

    /// Spawns a fake device that answers each request through
    /// `respond`.
    async fn fake_device<F>(respond: F) -> std::net::SocketAddr
    where
        F: Fn(bleconf_protocol::RawFrame) -> bytes::Bytes + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut assembler = FrameAssembler::new();
            let mut buf = [0u8; 256];
            loop {
                let n = match sock.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                if let Ok(Some(frame)) = assembler.push(&buf[..n]) {
                    let reply = respond(frame);
                    if sock.write_all(&reply).await.is_err() {
                        break;
                    }
                }
            }
        });
        addr
    }

    fn client_for(addr: std::net::SocketAddr) -> Client {
        Client::new(
            ConnectionConfig::new(addr)
                .with_token(TOKEN)
                .with_chunk_size(64)
                .with_request_timeout(2),
        )
    }

    async fn start(client: &Client) {
        client.connect().await.unwrap();
        let conn = client.connection();
        tokio::spawn(async move {
            let _ = conn.read_loop().await;
        });
        tokio::task::yield_now().await;
    }

    #[tokio::test]
    async fn test_device_info_roundtrip() {
        let addr = fake_device(|frame| {
            assert_eq!(frame.cmd, cmd::DEVICE_INFO);
            // The request must carry the authorization envelope.
            assert_eq!(frame.body[0] as usize, bleconf_protocol::TOKEN_LEN);
            assert_eq!(&frame.body[1..33], TOKEN.as_bytes());

            let mut fb = FrameBuilder::new(cmd::DEVICE_INFO).push_u8(0);
            DeviceInfo {
                mac: "aa:bb:cc:dd:ee:ff".into(),
                board: "esp32-s3".into(),
                version: "1.4.2".into(),
                ..Default::default()
            }
            .encode(fb.encoder());
            fb.finish()
        })
        .await;

        let client = client_for(addr);
        start(&client).await;

        let info = client.device_info().await.unwrap();
        assert_eq!(info.mac, "aa:bb:cc:dd:ee:ff");
        assert_eq!(info.board, "esp32-s3");
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_status_becomes_error() {
        let addr = fake_device(|frame| {
            FrameBuilder::new(frame.cmd).push_u8(1).finish()
        })
        .await;

        let client = client_for(addr);
        start(&client).await;

        let err = client.start_ota("url", "1.0").await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::CommandFailed {
                command: cmd::OTA_START,
                status: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_hub_rejection_surfaces_http_code() {
        let addr = fake_device(|frame| {
            FrameBuilder::new(frame.cmd).push_u8(1).push_i16(502).finish()
        })
        .await;

        let client = client_for(addr);
        start(&client).await;

        let err = client.set_hub(&HubConfig::default()).await.unwrap_err();
        assert!(matches!(err, ClientError::HubRejected { http_code: 502 }));
    }

    #[tokio::test]
    async fn test_rotation_request_has_no_envelope() {
        let addr = fake_device(|frame| {
            assert_eq!(frame.cmd, cmd::ROTATE_TOKEN);
            // Body is the bare str8 token, no token_len/token envelope.
            assert_eq!(frame.body[0] as usize, 32);
            FrameBuilder::new(frame.cmd).push_u8(0).finish()
        })
        .await;

        let client = client_for(addr);
        start(&client).await;
        client
            .rotate_token("ABCDEFGHIJKLMNOPQRSTUVWXYZ543210")
            .await
            .unwrap();
    }
}
