//! Feed de cambios
//!
//! Difunde los `ChangeEvent` confirmados a los suscriptores en proceso
//! (SSE, dashboard) y, si hay Redis configurado, al canal pub/sub.

use tokio::sync::broadcast;
use tracing::warn;

use crate::models::ChangeEvent;
use crate::realtime::RedisClient;

const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
    redis: Option<RedisClient>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            redis: None,
        }
    }

    pub fn with_redis(mut self, redis: RedisClient) -> Self {
        self.redis = Some(redis);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publicar un evento. Sin suscriptores no es un error.
    pub async fn publish(&self, event: ChangeEvent) {
        if let Some(redis) = &self.redis {
            if let Err(e) = redis.publish(&redis.changes_channel(), &event).await {
                warn!("⚠️ No se pudo reenviar el evento {} a Redis: {}", event.kind(), e);
            }
        }
        let _ = self.sender.send(event);
    }

    pub async fn publish_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        for event in events {
            self.publish(event).await;
        }
    }
}
