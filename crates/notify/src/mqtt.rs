//! MQTT notifier

use crate::{Notifier, NotifyError};
use chrono::{DateTime, Utc};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

/// MQTT broker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker_url: String,
    pub broker_port: u16,
    /// Vehicle this monitor runs in; used in the client id and topic
    pub vehicle_id: String,
    /// How long to wait for the broker's CONNACK and PUBACK
    pub ack_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_url: "localhost".to_string(),
            broker_port: 1883,
            vehicle_id: "unknown".to_string(),
            ack_timeout_ms: 2000,
        }
    }
}

/// Alert payload published to the broker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertMessage {
    pub message_type: String,
    pub vehicle_id: String,
    pub timestamp: DateTime<Utc>,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Broker link as seen by the event loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LinkState {
    connected: bool,
    /// PUBACKs received so far
    acks: u64,
}

/// Publishes alerts for the fleet backend to forward
pub struct MqttNotifier {
    config: MqttConfig,
    client: Option<AsyncClient>,
    link: Option<watch::Receiver<LinkState>>,
    /// One publish in flight at a time, so each PUBACK answers our publish
    in_flight: Mutex<()>,
}

impl MqttNotifier {
    pub fn new(config: MqttConfig) -> Self {
        Self {
            config,
            client: None,
            link: None,
            in_flight: Mutex::new(()),
        }
    }

    /// Topic alerts are published on
    pub fn topic(&self) -> String {
        format!("vehicles/{}/alerts", self.config.vehicle_id)
    }

    fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.config.ack_timeout_ms)
    }

    /// Start the client and wait briefly for the broker.
    ///
    /// An unreachable broker is not fatal: the event loop keeps retrying
    /// and `send` fails until the link is up.
    pub async fn connect(&mut self) -> Result<(), NotifyError> {
        let mut options = MqttOptions::new(
            format!("driver-watch-{}", self.config.vehicle_id),
            &self.config.broker_url,
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        let (state_tx, mut state_rx) = watch::channel(LinkState::default());

        // Spawn event loop handler
        tokio::spawn(async move {
            while !state_tx.is_closed() {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("MQTT broker accepted connection");
                        state_tx.send_modify(|s| s.connected = true);
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        state_tx.send_modify(|s| s.acks += 1);
                    }
                    Ok(Event::Incoming(incoming)) => {
                        debug!("MQTT incoming: {:?}", incoming);
                    }
                    Err(e) => {
                        state_tx.send_modify(|s| s.connected = false);
                        error!("MQTT error: {}", e);
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    _ => {}
                }
            }
        });

        let up = matches!(
            tokio::time::timeout(self.ack_timeout(), state_rx.wait_for(|s| s.connected)).await,
            Ok(Ok(_))
        );
        if up {
            info!("Connected to MQTT broker: {}", self.config.broker_url);
        } else {
            warn!(
                "MQTT broker {}:{} not reachable yet; alerts fail until it is",
                self.config.broker_url, self.config.broker_port
            );
        }

        self.client = Some(client);
        self.link = Some(state_rx);
        Ok(())
    }
}

/// Wait until the broker acknowledges a publish made after `acks_before`
async fn await_ack(
    link: &mut watch::Receiver<LinkState>,
    acks_before: u64,
    timeout: Duration,
) -> Result<(), NotifyError> {
    tokio::time::timeout(timeout, next_ack(link, acks_before))
        .await
        .map_err(|_| NotifyError::Timeout(timeout.as_millis() as u64))?
}

async fn next_ack(link: &mut watch::Receiver<LinkState>, acks_before: u64) -> Result<(), NotifyError> {
    loop {
        {
            let state = link.borrow_and_update();
            if state.acks > acks_before {
                return Ok(());
            }
            if !state.connected {
                return Err(NotifyError::Connection("Lost broker connection".to_string()));
            }
        }
        link.changed()
            .await
            .map_err(|_| NotifyError::Connection("MQTT event loop stopped".to_string()))?;
    }
}

impl Notifier for MqttNotifier {
    async fn send(&self, to_email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let (client, link) = match (&self.client, &self.link) {
            (Some(client), Some(link)) => (client, link),
            _ => return Err(NotifyError::Connection("Not connected".to_string())),
        };

        let message = AlertMessage {
            message_type: "alert".to_string(),
            vehicle_id: self.config.vehicle_id.clone(),
            timestamp: Utc::now(),
            to: to_email.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        };
        let payload =
            serde_json::to_vec(&message).map_err(|e| NotifyError::Serialization(e.to_string()))?;

        let _in_flight = self.in_flight.lock().await;
        let mut link = link.clone();
        let state = *link.borrow_and_update();
        if !state.connected {
            return Err(NotifyError::Connection(format!(
                "Broker {} not connected",
                self.config.broker_url
            )));
        }

        client
            .publish(self.topic(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        await_ack(&mut link, state.acks, self.ack_timeout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let notifier = MqttNotifier::new(MqttConfig::default());
        let result = notifier.send("carol@fleet.example", "s", "b").await;
        assert!(matches!(result, Err(NotifyError::Connection(_))));
    }

    #[tokio::test]
    async fn test_send_without_broker_fails() {
        // Nothing listens on the discard port
        let mut notifier = MqttNotifier::new(MqttConfig {
            broker_url: "127.0.0.1".to_string(),
            broker_port: 9,
            ack_timeout_ms: 200,
            ..Default::default()
        });
        notifier.connect().await.unwrap();

        let result = notifier.send("carol@fleet.example", "s", "b").await;
        assert!(matches!(result, Err(NotifyError::Connection(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_completes_send() {
        let (tx, mut rx) = watch::channel(LinkState {
            connected: true,
            acks: 3,
        });

        let waiter = tokio::spawn(async move { await_ack(&mut rx, 3, Duration::from_secs(2)).await });
        tokio::task::yield_now().await;
        tx.send_modify(|s| s.acks += 1);

        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_ack_times_out() {
        let (_tx, mut rx) = watch::channel(LinkState {
            connected: true,
            acks: 0,
        });

        let result = await_ack(&mut rx, 0, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(NotifyError::Timeout(2000))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_before_ack_fails() {
        let (tx, mut rx) = watch::channel(LinkState {
            connected: true,
            acks: 0,
        });

        let waiter = tokio::spawn(async move { await_ack(&mut rx, 0, Duration::from_secs(2)).await });
        tokio::task::yield_now().await;
        tx.send_modify(|s| s.connected = false);

        assert!(matches!(waiter.await.unwrap(), Err(NotifyError::Connection(_))));
    }

    #[test]
    fn test_topic_uses_vehicle() {
        let notifier = MqttNotifier::new(MqttConfig {
            vehicle_id: "truck-17".to_string(),
            ..Default::default()
        });
        assert_eq!(notifier.topic(), "vehicles/truck-17/alerts");
    }
}
