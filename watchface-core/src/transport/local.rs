use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};
use tokio::sync::{RwLock, broadcast, watch};
use tracing::{debug, warn};

use super::{Connection, DataEvent, Subscription, Transport, TransportError};
use crate::model::DataMap;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct Hub {
    events: broadcast::Sender<DataEvent>,
    items: RwLock<HashMap<String, DataMap>>,
    available: AtomicBool,
    accepted_writes: AtomicUsize,
}

/// In-process transport shared by a phone side and a watch side.
///
/// Items are stored per path. A push whose data equals the stored item is
/// accepted but raises no `Changed` event, so senders that want every push
/// observed must vary the payload.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    hub: Arc<Hub>,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            hub: Arc::new(Hub {
                events,
                items: RwLock::new(HashMap::new()),
                available: AtomicBool::new(true),
                accepted_writes: AtomicUsize::new(0),
            }),
        }
    }

    /// Make new connections and existing writes fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.hub.available.store(available, Ordering::SeqCst);
    }

    /// Item currently stored under `path`.
    pub async fn item(&self, path: &str) -> Option<DataMap> {
        self.hub.items.read().await.get(path).cloned()
    }

    /// Number of pushes accepted so far, including unchanged ones.
    pub fn accepted_writes(&self) -> usize {
        self.hub.accepted_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError> {
        if !self.hub.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("local transport is offline".to_string()));
        }

        let (closed, _) = watch::channel(false);
        Ok(Box::new(LocalConnection { hub: Arc::clone(&self.hub), closed }))
    }
}

#[derive(Debug)]
struct LocalConnection {
    hub: Arc<Hub>,
    closed: watch::Sender<bool>,
}

impl LocalConnection {
    fn ensure_usable(&self) -> Result<(), TransportError> {
        if *self.closed.borrow() {
            return Err(TransportError::Disconnected);
        }
        if !self.hub.available.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("local transport is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Connection for LocalConnection {
    async fn push(&self, path: &str, data: DataMap) -> Result<(), TransportError> {
        self.ensure_usable()?;

        let changed = {
            let mut items = self.hub.items.write().await;
            if items.get(path) == Some(&data) {
                false
            } else {
                items.insert(path.to_string(), data.clone());
                true
            }
        };
        self.hub.accepted_writes.fetch_add(1, Ordering::SeqCst);

        if changed {
            // No receivers is fine: nobody is listening yet.
            let _ = self.hub.events.send(DataEvent::Changed { path: path.to_string(), data });
        } else {
            debug!(path, "push matches stored item, no change event");
        }

        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.ensure_usable()?;

        let existed = self.hub.items.write().await.remove(path).is_some();
        if existed {
            let _ = self.hub.events.send(DataEvent::Deleted { path: path.to_string() });
        }

        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, TransportError> {
        self.ensure_usable()?;

        let mut events = self.hub.events.subscribe();
        let mut closed = self.closed.subscribe();
        let (tx, subscription) = Subscription::channel(path);
        let path = path.to_string();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = closed.changed() => break,
                    _ = tx.closed() => break,
                    received = events.recv() => match received {
                        Ok(event) => {
                            if event.path() == path && tx.send(event).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(path = %path, skipped, "subscriber fell behind, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!(path = %path, "subscription ended");
        });

        Ok(subscription)
    }

    async fn disconnect(&self) {
        self.closed.send_replace(true);
    }

    fn is_connected(&self) -> bool {
        !*self.closed.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WEATHER_DATA_PATH, WeatherSnapshot};

    fn payload(max: &str) -> DataMap {
        WeatherSnapshot::new("t", 800, max, "10°").to_data_map()
    }

    #[tokio::test]
    async fn push_reaches_subscriber_on_same_path() {
        let transport = LocalTransport::new();
        let watch_side = transport.connect().await.expect("connect");
        let phone_side = transport.connect().await.expect("connect");

        let mut sub = watch_side.subscribe(WEATHER_DATA_PATH).await.expect("subscribe");
        phone_side.push("/other", payload("1°")).await.expect("push");
        phone_side.push(WEATHER_DATA_PATH, payload("20°")).await.expect("push");

        let event = sub.next().await.expect("event");
        assert_eq!(
            event,
            DataEvent::Changed { path: WEATHER_DATA_PATH.to_string(), data: payload("20°") }
        );
        assert_eq!(transport.item(WEATHER_DATA_PATH).await, Some(payload("20°")));
    }

    #[tokio::test]
    async fn events_for_a_path_arrive_in_write_order() {
        let transport = LocalTransport::new();
        let conn = transport.connect().await.expect("connect");
        let mut sub = conn.subscribe(WEATHER_DATA_PATH).await.expect("subscribe");

        conn.push(WEATHER_DATA_PATH, payload("1°")).await.expect("push");
        conn.push(WEATHER_DATA_PATH, payload("2°")).await.expect("push");
        conn.delete(WEATHER_DATA_PATH).await.expect("delete");

        assert!(matches!(sub.next().await, Some(DataEvent::Changed { data, .. }) if data == payload("1°")));
        assert!(matches!(sub.next().await, Some(DataEvent::Changed { data, .. }) if data == payload("2°")));
        assert_eq!(
            sub.next().await,
            Some(DataEvent::Deleted { path: WEATHER_DATA_PATH.to_string() })
        );
    }

    #[tokio::test]
    async fn identical_push_is_accepted_without_event() {
        let transport = LocalTransport::new();
        let conn = transport.connect().await.expect("connect");
        let mut sub = conn.subscribe(WEATHER_DATA_PATH).await.expect("subscribe");

        conn.push(WEATHER_DATA_PATH, payload("5°")).await.expect("push");
        conn.push(WEATHER_DATA_PATH, payload("5°")).await.expect("push");
        conn.push(WEATHER_DATA_PATH, payload("6°")).await.expect("push");

        assert_eq!(transport.accepted_writes(), 3);
        assert!(matches!(sub.next().await, Some(DataEvent::Changed { data, .. }) if data == payload("5°")));
        assert!(matches!(sub.next().await, Some(DataEvent::Changed { data, .. }) if data == payload("6°")));
    }

    #[tokio::test]
    async fn offline_transport_refuses_connections_and_writes() {
        let transport = LocalTransport::new();
        let conn = transport.connect().await.expect("connect");

        transport.set_available(false);
        assert!(matches!(transport.connect().await, Err(TransportError::Unavailable(_))));
        assert!(matches!(
            conn.push(WEATHER_DATA_PATH, payload("1°")).await,
            Err(TransportError::Unavailable(_))
        ));
        assert_eq!(transport.accepted_writes(), 0);
    }

    #[tokio::test]
    async fn disconnect_ends_subscriptions_and_rejects_pushes() {
        let transport = LocalTransport::new();
        let conn = transport.connect().await.expect("connect");
        let mut sub = conn.subscribe(WEATHER_DATA_PATH).await.expect("subscribe");

        conn.disconnect().await;

        assert!(!conn.is_connected());
        assert_eq!(sub.next().await, None);
        assert_eq!(
            conn.push(WEATHER_DATA_PATH, payload("1°")).await,
            Err(TransportError::Disconnected)
        );
        assert!(matches!(
            conn.subscribe(WEATHER_DATA_PATH).await,
            Err(TransportError::Disconnected)
        ));
    }
}
