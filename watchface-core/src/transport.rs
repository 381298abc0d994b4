//! Device-to-device data channel.
//!
//! A [`Transport`] hands out [`Connection`]s. A connection pushes path-addressed
//! [`DataMap`]s and subscribes to the [`DataEvent`]s produced on a path. A push
//! completes once the local transport layer has accepted the write; it says
//! nothing about whether the remote side applied it.

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::model::DataMap;

pub mod local;

pub use local::LocalTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),

    #[error("connection is closed")]
    Disconnected,
}

/// Change observed on a data path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataEvent {
    Changed { path: String, data: DataMap },
    Deleted { path: String },
}

impl DataEvent {
    pub fn path(&self) -> &str {
        match self {
            DataEvent::Changed { path, .. } | DataEvent::Deleted { path } => path,
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync + Debug {
    async fn connect(&self) -> Result<Box<dyn Connection>, TransportError>;
}

#[async_trait]
pub trait Connection: Send + Sync + Debug {
    /// Write `data` under `path`; resolves when the write is accepted locally.
    async fn push(&self, path: &str, data: DataMap) -> Result<(), TransportError>;

    /// Remove whatever is stored under `path`.
    async fn delete(&self, path: &str) -> Result<(), TransportError>;

    /// Start receiving events for `path`. The stream ends only when the
    /// connection closes or the subscription is dropped.
    async fn subscribe(&self, path: &str) -> Result<Subscription, TransportError>;

    async fn disconnect(&self);

    fn is_connected(&self) -> bool;
}

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    path: String,
    events: mpsc::UnboundedReceiver<DataEvent>,
}

impl Subscription {
    /// Create a subscription together with the sender a transport feeds it with.
    pub fn channel(path: impl Into<String>) -> (mpsc::UnboundedSender<DataEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { path: path.into(), events: rx })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Next event, or `None` once the transport side has gone away.
    pub async fn next(&mut self) -> Option<DataEvent> {
        self.events.recv().await
    }
}
