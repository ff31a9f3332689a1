use crate::prelude::*;

use async_trait::async_trait;
use rumqttc::{AsyncClient, EventLoop, LastWill, MqttOptions, QoS};
use std::time::Duration;
use tokio::task::JoinHandle;

const RECONNECT_DELAY_SECS: u64 = 5;

/// Publishes each sample as JSON to a single topic. Availability is kept
/// on `<topic>/status` ("online", with an "offline" last will).
pub struct MqttPublisher {
    client: AsyncClient,
    topic: String,
    eventloop: JoinHandle<()>,
}

impl MqttPublisher {
    pub async fn connect(config: &config::Mqtt) -> Result<Self> {
        let mut options = MqttOptions::new("aurora-bridge", config.host(), config.port());

        let status_topic = Self::status_topic(config.topic());
        options.set_last_will(LastWill::new(
            status_topic.clone(),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));
        options.set_keep_alive(Duration::from_secs(60));
        if let (Some(u), Some(p)) = (config.username(), config.password()) {
            options.set_credentials(u, p);
        }

        info!("initializing mqtt at {}:{}", config.host(), config.port());

        let (client, eventloop) = AsyncClient::new(options, 10);
        let eventloop = tokio::spawn(Self::receiver(eventloop));

        client
            .publish(status_topic, QoS::AtLeastOnce, true, "online")
            .await?;

        Ok(Self {
            client,
            topic: config.topic().to_string(),
            eventloop,
        })
    }

    fn status_topic(topic: &str) -> String {
        format!("{}/status", topic)
    }

    // rumqttc only makes progress while the event loop is polled
    async fn receiver(mut eventloop: EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(event) => trace!("mqtt: {:?}", event),
                Err(e) => {
                    error!("{}", e);
                    info!("reconnecting in {}s", RECONNECT_DELAY_SECS);
                    tokio::time::sleep(Duration::from_secs(RECONNECT_DELAY_SECS)).await;
                }
            }
        }
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        self.eventloop.abort();
    }
}

#[async_trait]
impl Sink for MqttPublisher {
    async fn deliver(&mut self, sample: &Sample) -> Result<()> {
        let payload = serde_json::to_string(sample)?;
        debug!("TX: {} {}", self.topic, payload);

        self.client
            .publish(&self.topic, QoS::AtLeastOnce, false, payload)
            .await?;

        Ok(())
    }
}
