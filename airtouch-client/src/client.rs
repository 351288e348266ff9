//! High-level client API.

use crate::connection::{Connection, ConnectionConfig, ConnectionState, ConnectionStats};
use crate::error::ClientError;
use crate::event::StatusEvent;
use airtouch_protocol::{
    AcControl, AcMode, FanSpeed, GroupControl, HeatingCoolingState, SubMessage, SubMessageType,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Airtouch2+ client.
///
/// Commands are fire-and-forget: the controller does not acknowledge them,
/// and their effect shows up in the next status report.
pub struct Client {
    conn: Arc<Connection>,
}

impl Client {
    /// Creates a new client.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Arc::new(Connection::new(config)),
        }
    }

    /// Connects to the controller.
    pub async fn connect(&self) -> Result<(), ClientError> {
        self.conn.connect().await
    }

    /// Connects, falling back to the reconnect schedule if the first
    /// attempt fails.
    pub async fn start(&self) {
        match self.conn.connect().await {
            Ok(()) | Err(ClientError::AlreadyConnected) => {}
            Err(e) => {
                tracing::warn!("Initial connection failed: {}", e);
                self.conn.schedule_reconnect();
            }
        }
    }

    /// Returns the underlying connection.
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn stats(&self) -> &ConnectionStats {
        self.conn.stats()
    }

    /// Subscribes to decoded status events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.conn.subscribe()
    }

    /// Closes the connection. No reconnect follows.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.conn.close().await
    }

    // =========================================================================
    // AC commands
    // =========================================================================

    pub async fn set_ac_power(&self, unit: u8, on: bool) -> Result<(), ClientError> {
        tracing::info!("Setting AC {} power {}", unit, if on { "on" } else { "off" });
        self.send_ac_control(&AcControl::power(unit, on)).await
    }

    pub async fn set_ac_mode(&self, unit: u8, mode: AcMode) -> Result<(), ClientError> {
        tracing::info!("Setting AC {} mode to {:?}", unit, mode);
        self.send_ac_control(&AcControl::new(unit).with_mode(mode))
            .await
    }

    /// Sets power and mode together, as a thermostat would.
    pub async fn set_ac_heating_cooling_state(
        &self,
        unit: u8,
        state: HeatingCoolingState,
    ) -> Result<(), ClientError> {
        tracing::info!("Setting AC {} heating/cooling state to {:?}", unit, state);
        self.send_ac_control(&AcControl::heating_cooling(unit, state))
            .await
    }

    /// Sets the target temperature in °C.
    pub async fn set_ac_target_temperature(
        &self,
        unit: u8,
        temperature: f32,
    ) -> Result<(), ClientError> {
        tracing::info!("Setting AC {} target temperature to {}", unit, temperature);
        self.send_ac_control(&AcControl::target_temperature(unit, temperature))
            .await
    }

    pub async fn set_ac_fan_speed(&self, unit: u8, speed: FanSpeed) -> Result<(), ClientError> {
        tracing::info!("Setting AC {} fan speed to {:?}", unit, speed);
        self.send_ac_control(&AcControl::fan_speed(unit, speed))
            .await
    }

    pub async fn send_ac_control(&self, control: &AcControl) -> Result<(), ClientError> {
        let message = control.to_sub_message()?;
        self.conn.send(&message).await
    }

    // =========================================================================
    // Zone commands
    // =========================================================================

    /// Switches a zone (group) on or off.
    pub async fn set_zone_active(&self, group: u8, active: bool) -> Result<(), ClientError> {
        tracing::info!(
            "Setting zone {} {}",
            group,
            if active { "active" } else { "inactive" }
        );
        self.send_group_control(&GroupControl::active(group, active))
            .await
    }

    /// Sets a zone damper opening, 0-100 %.
    pub async fn set_zone_damper_position(
        &self,
        group: u8,
        percent: u8,
    ) -> Result<(), ClientError> {
        tracing::info!("Setting zone {} damper to {}%", group, percent);
        self.send_group_control(&GroupControl::damper(group, percent))
            .await
    }

    pub async fn send_group_control(&self, control: &GroupControl) -> Result<(), ClientError> {
        let message = control.to_sub_message()?;
        self.conn.send(&message).await
    }

    // =========================================================================
    // Status requests
    // =========================================================================

    /// Requests an AC status report outside the poll schedule.
    pub async fn request_ac_status(&self) -> Result<(), ClientError> {
        self.conn
            .send(&SubMessage::status_request(SubMessageType::AcStatus))
            .await
    }

    /// Requests a group status report outside the poll schedule.
    pub async fn request_group_status(&self) -> Result<(), ClientError> {
        self.conn
            .send(&SubMessage::status_request(SubMessageType::GroupStatus))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use airtouch_protocol::{Decoder, Frame, ProtocolError};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, TcpStream};

    const WAIT: Duration = Duration::from_secs(5);

    async fn connected_client() -> (Client, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let client = Client::new(
            ConnectionConfig::new("127.0.0.1")
                .with_port(port)
                .with_group_poll_delay(Duration::from_secs(60)),
        );
        client.connect().await.unwrap();
        let (peer, _) = listener.accept().await.unwrap();
        (client, peer)
    }

    /// Reads frames until one of `sub_type` arrives, skipping polls.
    async fn expect_frame(peer: &mut TcpStream, sub_type: SubMessageType) -> Frame {
        tokio::time::timeout(WAIT, async {
            let mut decoder = Decoder::new();
            let mut buf = [0u8; 256];
            loop {
                while let Some(frame) = decoder.decode_frame().unwrap() {
                    if frame.sub_message_type() == Some(sub_type) {
                        return frame;
                    }
                }
                let n = peer.read(&mut buf).await.unwrap();
                assert!(n > 0, "client closed the connection");
                decoder.extend(&buf[..n]);
            }
        })
        .await
        .expect("frame not received")
    }

    #[tokio::test]
    async fn test_set_ac_heating_cooling_state() {
        let (client, mut peer) = connected_client().await;

        client
            .set_ac_heating_cooling_state(1, HeatingCoolingState::Heat)
            .await
            .unwrap();

        let frame = expect_frame(&mut peer, SubMessageType::AcControl).await;
        let expected = AcControl::heating_cooling(1, HeatingCoolingState::Heat)
            .encode()
            .unwrap();
        assert_eq!(frame.body, expected);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_zone_damper_position() {
        let (client, mut peer) = connected_client().await;

        client.set_zone_damper_position(4, 35).await.unwrap();

        let frame = expect_frame(&mut peer, SubMessageType::GroupControl).await;
        assert_eq!(frame.body, GroupControl::damper(4, 35).encode().unwrap());

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_request_group_status() {
        let (client, mut peer) = connected_client().await;

        client.request_group_status().await.unwrap();

        let frame = expect_frame(&mut peer, SubMessageType::GroupStatus).await;
        assert_eq!(&frame.body[..], &[0x21, 0, 0, 0, 0, 0, 0, 0]);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_command_not_sent() {
        let (client, _peer) = connected_client().await;
        let sent = client.stats().messages_sent.load(Ordering::Relaxed);

        let err = client.set_ac_target_temperature(0, 50.0).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::TemperatureOutOfRange(_))
        ));
        let err = client.set_zone_active(64, true).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Protocol(ProtocolError::GroupOutOfRange(64))
        ));
        assert_eq!(client.stats().messages_sent.load(Ordering::Relaxed), sent);

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_command_when_disconnected() {
        let client = Client::new(ConnectionConfig::new("127.0.0.1"));
        assert!(matches!(
            client.set_ac_power(0, true).await,
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_start_schedules_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::new(
            ConnectionConfig::new("127.0.0.1")
                .with_port(addr.port())
                .with_reconnect_cooldown(Duration::from_millis(50)),
        );
        client.start().await;
        assert!(!client.is_connected());

        let listener = TcpListener::bind(addr).await.unwrap();
        let _peer = tokio::time::timeout(WAIT, listener.accept())
            .await
            .expect("client did not reconnect")
            .unwrap();

        client.close().await.unwrap();
    }
}
