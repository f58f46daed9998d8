//! MQTT sink: publishes per-track JSON (plus optional per-drone topics
//! and Home-Assistant discovery announcements), with a last-will
//! message and retained-state clearing on `mark_inactive`.

use crate::error::SinkError;
use crate::sinks::{Sink, SinkCapabilities};
use async_trait::async_trait;
use dragonsync_formats::Track;
use rumqttc::{AsyncClient, LastWill, MqttOptions, QoS};
use std::time::Duration;
use tracing::warn;

pub struct MqttSink {
    name: String,
    client: AsyncClient,
    base_topic: String,
    retain: bool,
    per_drone_topics: bool,
    ha_discovery: bool,
}

impl MqttSink {
    pub fn connect(
        name: impl Into<String>,
        client_id: &str,
        host: &str,
        port: u16,
        credentials: Option<(String, String)>,
        base_topic: impl Into<String>,
        retain: bool,
        per_drone_topics: bool,
        ha_discovery: bool,
    ) -> Self {
        let name = name.into();
        let base_topic = base_topic.into();
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(Duration::from_secs(30));
        if let Some((user, pass)) = credentials {
            opts.set_credentials(user, pass);
        }
        opts.set_last_will(LastWill::new(
            format!("{base_topic}/status"),
            "offline",
            QoS::AtLeastOnce,
            true,
        ));

        let (client, mut eventloop) = AsyncClient::new(opts, 64);
        let name_bg = name.clone();
        tokio::spawn(async move {
            loop {
                if let Err(err) = eventloop.poll().await {
                    warn!(sink = %name_bg, "mqtt eventloop error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Self { name, client, base_topic, retain, per_drone_topics, ha_discovery }
    }

    async fn publish(&self, topic: String, payload: String) {
        if let Err(err) =
            self.client.publish(topic, QoS::AtLeastOnce, self.retain, payload).await
        {
            warn!(sink = %self.name, "mqtt publish failed: {err}");
        }
    }
}

#[async_trait]
impl Sink for MqttSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> SinkCapabilities {
        SinkCapabilities { track: true, pair: false, system: true, lifecycle: true }
    }

    async fn publish_track(&self, track: &Track, _xml: &str) -> Result<(), SinkError> {
        let payload = serde_json::to_string(track).map_err(|err| {
            warn!(sink = %self.name, "mqtt json encode failed: {err}");
            SinkError::NotConnected
        })?;

        self.publish(format!("{}/tracks", self.base_topic), payload.clone()).await;
        if self.per_drone_topics {
            self.publish(format!("{}/tracks/{}", self.base_topic, track.uid), payload.clone()).await;
        }
        if self.ha_discovery {
            let config_topic = format!("homeassistant/sensor/{}/config", track.uid);
            let config = serde_json::json!({
                "name": format!("DragonSync {}", track.uid),
                "state_topic": format!("{}/tracks/{}", self.base_topic, track.uid),
                "unique_id": track.uid,
            });
            self.publish(config_topic, config.to_string()).await;
        }
        Ok(())
    }

    async fn publish_system(&self, xml: &str) -> Result<(), SinkError> {
        self.publish(format!("{}/system", self.base_topic), xml.to_string()).await;
        Ok(())
    }

    async fn mark_inactive(&self, uid: &str) -> Result<(), SinkError> {
        self.publish(format!("{}/tracks/{}", self.base_topic, uid), String::new()).await;
        Ok(())
    }

    async fn close(&self) -> Result<(), SinkError> {
        self.client.disconnect().await.map_err(SinkError::from)
    }
}
