//! Phone side: turns today's weather row into a snapshot and pushes it to the watch.

use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    Config,
    clock::{Clock, SystemClock},
    format::{Units, format_temperature},
    model::WeatherSnapshot,
    source::WeatherSource,
    transport::{Connection, Transport, TransportError},
};

/// The only action that makes the producer publish.
pub const ACTION_UPDATE_WATCHFACE: &str = "ACTION_UPDATE_WATCHFACE";

/// Layout of the snapshot `date` field.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// External signal asking for a publish.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Trigger {
    pub action: Option<String>,
}

impl Trigger {
    pub fn new(action: impl Into<String>) -> Self {
        Self { action: Some(action.into()) }
    }

    pub fn update_watchface() -> Self {
        Self::new(ACTION_UPDATE_WATCHFACE)
    }

    pub fn is_update_watchface(&self) -> bool {
        self.action.as_deref() == Some(ACTION_UPDATE_WATCHFACE)
    }
}

/// What a single `publish` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The trigger carried no recognised action.
    Ignored,
    /// The weather source had no row for today.
    NoData,
    /// The snapshot was accepted by the local transport.
    Published(WeatherSnapshot),
}

#[derive(Debug)]
pub struct SnapshotProducer {
    source: Arc<dyn WeatherSource>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    location: String,
    units: Units,
    path: String,
    connection: Option<Box<dyn Connection>>,
}

impl SnapshotProducer {
    pub fn new(
        config: &Config,
        source: Arc<dyn WeatherSource>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            source,
            transport,
            clock: Arc::new(SystemClock),
            location: config.location().to_string(),
            units: config.units,
            path: config.watchface.snapshot_path.clone(),
            connection: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open the producer's connection. A previous connection is closed first.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        self.stop().await;
        let connection = self.transport.connect().await?;
        info!(location = %self.location, "snapshot producer connected");
        self.connection = Some(connection);
        Ok(())
    }

    pub async fn stop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.disconnect().await;
            info!("snapshot producer disconnected");
        }
    }

    pub fn is_started(&self) -> bool {
        self.connection.as_ref().is_some_and(|c| c.is_connected())
    }

    /// Build today's snapshot, or `None` when the source has nothing.
    pub async fn build_snapshot(&self) -> Option<WeatherSnapshot> {
        let now = self.clock.now();

        let rows = match self.source.query(&self.location, now.date_naive()).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(location = %self.location, error = %err, "weather query failed");
                return None;
            }
        };

        let row = rows.first()?;

        Some(WeatherSnapshot::new(
            now.format(TIMESTAMP_FORMAT).to_string(),
            row.condition_code,
            format_temperature(row.max_temp, self.units),
            format_temperature(row.min_temp, self.units),
        ))
    }

    /// Handle one trigger: at most one push, never retried.
    pub async fn publish(&self, trigger: &Trigger) -> Result<PublishOutcome, TransportError> {
        if !trigger.is_update_watchface() {
            debug!(action = ?trigger.action, "ignoring trigger");
            return Ok(PublishOutcome::Ignored);
        }

        let Some(snapshot) = self.build_snapshot().await else {
            debug!(location = %self.location, "no weather for today, nothing to publish");
            return Ok(PublishOutcome::NoData);
        };

        let connection = self.connection.as_ref().ok_or(TransportError::Disconnected)?;
        connection.push(&self.path, snapshot.to_data_map()).await?;

        info!(
            path = %self.path,
            weather_id = snapshot.condition_code(),
            max = snapshot.max_temperature(),
            min = snapshot.min_temperature(),
            "weather snapshot pushed"
        );

        Ok(PublishOutcome::Published(snapshot))
    }
}

/// Background worker that handles triggers one at a time.
///
/// Raising a trigger never waits for the push. Transport failures are logged
/// and otherwise dropped; the watch keeps showing its last snapshot.
#[derive(Debug)]
pub struct ProducerService {
    triggers: mpsc::UnboundedSender<Trigger>,
    worker: JoinHandle<()>,
}

impl ProducerService {
    pub fn spawn(mut producer: SnapshotProducer) -> Self {
        let (triggers, mut rx) = mpsc::unbounded_channel::<Trigger>();

        let worker = tokio::spawn(async move {
            if let Err(err) = producer.start().await {
                warn!(error = %err, "snapshot producer could not connect");
            }

            while let Some(trigger) = rx.recv().await {
                match producer.publish(&trigger).await {
                    Ok(outcome) => debug!(?outcome, "trigger handled"),
                    Err(err) => warn!(error = %err, "weather snapshot push failed"),
                }
            }

            producer.stop().await;
        });

        Self { triggers, worker }
    }

    /// Queue a trigger. Returns `false` if the worker has already stopped.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.triggers.send(trigger).is_ok()
    }

    /// Finish queued triggers, then disconnect.
    pub async fn shutdown(self) {
        drop(self.triggers);
        if let Err(err) = self.worker.await {
            warn!(error = %err, "producer worker ended abnormally");
        }
    }
}
