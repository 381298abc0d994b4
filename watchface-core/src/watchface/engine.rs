use std::sync::Arc;
use tokio::{
    sync::{mpsc, watch},
    task::{JoinError, JoinHandle},
};
use tracing::{debug, info, warn};

use super::{
    display::DisplayState,
    layout::{FaceMetrics, FixedAdvance, TextMeasure},
    render::{Bounds, Frame, render},
    timer::{RepaintTimer, delay_until_next_tick, should_run},
};
use crate::{
    Config,
    clock::{Clock, SystemClock},
    config::{DimensionsConfig, ScreenShape},
    model::WeatherSnapshot,
    transport::{Connection, DataEvent, Transport, TransportError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapType {
    /// A finger went down.
    Touch,
    /// The touch turned into another gesture.
    TouchCancel,
    /// A completed tap.
    Tap,
}

/// Signals the host delivers to the watch face.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchFaceEvent {
    VisibilityChanged(bool),
    AmbientModeChanged(bool),
    PropertiesChanged { low_bit_ambient: bool },
    WindowInsets(ScreenShape),
    SurfaceChanged(Bounds),
    /// Once-a-minute tick delivered in ambient mode.
    TimeTick,
    Tap(TapType),
    Destroy,
}

/// Everything the engine task consumes.
#[derive(Debug)]
pub enum EngineMessage {
    Host(WatchFaceEvent),
    UpdateTime { generation: u64 },
    Connected { link: u64, connection: Box<dyn Connection> },
    ConnectFailed { link: u64, error: TransportError },
    Data { link: u64, event: DataEvent },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    NotConnected,
    Connecting,
    Listening,
}

#[derive(Debug)]
enum Link {
    NotConnected,
    Connecting { task: JoinHandle<()> },
    Listening { connection: Box<dyn Connection>, listener: JoinHandle<()> },
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Receiving side of the engine's message queue.
#[derive(Debug)]
pub struct Inbox {
    sender: mpsc::UnboundedSender<EngineMessage>,
    receiver: mpsc::UnboundedReceiver<EngineMessage>,
}

impl Inbox {
    pub fn sender(&self) -> mpsc::UnboundedSender<EngineMessage> {
        self.sender.clone()
    }
}

/// Watch-side renderer: owns the display state, the transport link and the
/// repaint timer, and processes one message at a time.
#[derive(Debug)]
pub struct WatchFaceEngine {
    state: DisplayState,
    link: Link,
    link_id: u64,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    measure: Arc<dyn TextMeasure>,
    dimensions: DimensionsConfig,
    snapshot_path: String,
    bounds: Bounds,
    timer: RepaintTimer,
    inbox: mpsc::WeakUnboundedSender<EngineMessage>,
    frames: watch::Sender<Frame>,
    repaints: u64,
}

impl WatchFaceEngine {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> (Self, Inbox) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let measure: Arc<dyn TextMeasure> = Arc::new(FixedAdvance::default());
        let metrics = FaceMetrics::compute(
            ScreenShape::Square,
            config.dimensions.square,
            measure.as_ref(),
        );
        let (frames, _) = watch::channel(Frame::blank());

        let engine = Self {
            state: DisplayState::new(clock.now(), metrics),
            link: Link::NotConnected,
            link_id: 0,
            transport,
            clock,
            measure,
            dimensions: config.dimensions,
            snapshot_path: config.watchface.snapshot_path.clone(),
            bounds: Bounds::default(),
            timer: RepaintTimer::new(config.watchface.interactive_update_rate()),
            inbox: sender.downgrade(),
            frames,
            repaints: 0,
        };

        (engine, Inbox { sender, receiver })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.state.time = clock.now();
        self.clock = clock;
        self
    }

    pub fn with_measure(mut self, measure: Arc<dyn TextMeasure>) -> Self {
        let metrics = FaceMetrics::compute(
            self.state.metrics.shape,
            self.state.metrics.dimensions,
            measure.as_ref(),
        );
        self.measure = measure;
        self.state.apply_metrics(metrics, self.measure.as_ref());
        self
    }

    pub fn state(&self) -> &DisplayState {
        &self.state
    }

    pub fn link_status(&self) -> LinkStatus {
        match self.link {
            Link::NotConnected => LinkStatus::NotConnected,
            Link::Connecting { .. } => LinkStatus::Connecting,
            Link::Listening { .. } => LinkStatus::Listening,
        }
    }

    pub fn timer_scheduled(&self) -> bool {
        self.timer.is_scheduled()
    }

    /// Number of repaints requested so far.
    pub fn repaints(&self) -> u64 {
        self.repaints
    }

    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.subscribe()
    }

    /// Run the engine on its own task.
    pub fn spawn(self, inbox: Inbox) -> EngineHandle {
        let sender = inbox.sender();
        let frames = self.frames();
        let task = tokio::spawn(self.run(inbox));
        EngineHandle { sender, frames, task }
    }

    /// Process messages until destroyed or every sender is gone.
    pub async fn run(mut self, inbox: Inbox) -> DisplayState {
        let Inbox { sender, mut receiver } = inbox;
        drop(sender);

        info!("watch face engine started");
        while let Some(message) = receiver.recv().await {
            if self.handle(message).await == Flow::Stop {
                break;
            }
        }
        self.teardown().await;
        info!(repaints = self.repaints, "watch face engine stopped");

        self.state
    }

    async fn handle(&mut self, message: EngineMessage) -> Flow {
        match message {
            EngineMessage::Host(event) => return self.on_host_event(event).await,
            EngineMessage::UpdateTime { generation } => self.on_update_time(generation),
            EngineMessage::Connected { link, connection } => {
                self.on_connected(link, connection).await
            }
            EngineMessage::ConnectFailed { link, error } => {
                if link == self.link_id && matches!(self.link, Link::Connecting { .. }) {
                    warn!(error = %error, "watch face could not connect to transport");
                    self.link = Link::NotConnected;
                }
            }
            EngineMessage::Data { link, event } => {
                if link == self.link_id {
                    self.on_data_event(event);
                } else {
                    debug!(path = event.path(), "dropping event from a closed listener");
                }
            }
        }
        Flow::Continue
    }

    async fn on_host_event(&mut self, event: WatchFaceEvent) -> Flow {
        match event {
            WatchFaceEvent::VisibilityChanged(visible) => {
                self.state.visible = visible;
                if visible {
                    self.connect();
                    self.state.time = self.clock.now();
                } else {
                    self.disconnect().await;
                }
                self.update_timer();
            }
            WatchFaceEvent::AmbientModeChanged(ambient) => {
                self.state.ambient = ambient;
                self.invalidate();
                self.update_timer();
            }
            WatchFaceEvent::PropertiesChanged { low_bit_ambient } => {
                self.state.low_bit_ambient = low_bit_ambient;
            }
            WatchFaceEvent::WindowInsets(shape) => {
                let metrics = FaceMetrics::compute(
                    shape,
                    *self.dimensions.for_shape(shape),
                    self.measure.as_ref(),
                );
                self.state.apply_metrics(metrics, self.measure.as_ref());
            }
            WatchFaceEvent::SurfaceChanged(bounds) => {
                self.bounds = bounds;
                self.invalidate();
            }
            WatchFaceEvent::TimeTick => self.invalidate(),
            WatchFaceEvent::Tap(tap) => {
                if tap == TapType::Tap {
                    self.state.tap_count += 1;
                }
                self.invalidate();
            }
            WatchFaceEvent::Destroy => return Flow::Stop,
        }
        Flow::Continue
    }

    fn on_update_time(&mut self, generation: u64) {
        if !self.timer.is_current(generation) {
            debug!(generation, "dropping stale timer firing");
            return;
        }
        self.timer.fired();
        self.invalidate();

        if should_run(self.state.visible, self.state.ambient) {
            let now_ms = self.clock.now().timestamp_millis();
            let delay = delay_until_next_tick(now_ms, self.timer.rate());
            self.timer.schedule(delay, self.inbox.clone());
        }
    }

    async fn on_connected(&mut self, link: u64, connection: Box<dyn Connection>) {
        if link != self.link_id || !matches!(self.link, Link::Connecting { .. }) {
            debug!("discarding connection that is no longer wanted");
            connection.disconnect().await;
            return;
        }

        let mut subscription = match connection.subscribe(&self.snapshot_path).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(error = %err, path = %self.snapshot_path, "could not register data listener");
                connection.disconnect().await;
                self.link = Link::NotConnected;
                return;
            }
        };

        // Weak, so a live listener never keeps an abandoned engine running.
        let inbox = self.inbox.clone();
        let listener = tokio::spawn(async move {
            while let Some(event) = subscription.next().await {
                let Some(sender) = inbox.upgrade() else {
                    break;
                };
                if sender.send(EngineMessage::Data { link, event }).is_err() {
                    break;
                }
            }
        });

        info!(path = %self.snapshot_path, "watch face listening for weather");
        self.link = Link::Listening { connection, listener };
    }

    fn on_data_event(&mut self, event: DataEvent) {
        match event {
            DataEvent::Changed { path, data } if path == self.snapshot_path => {
                match WeatherSnapshot::try_from(&data) {
                    Ok(snapshot) => {
                        debug!(
                            weather_id = snapshot.condition_code(),
                            max = snapshot.max_temperature(),
                            min = snapshot.min_temperature(),
                            "applying weather snapshot"
                        );
                        self.state.apply_snapshot(snapshot, self.measure.as_ref());
                    }
                    Err(err) => warn!(error = %err, path = %path, "skipping weather event"),
                }
            }
            DataEvent::Changed { path, .. } => debug!(path = %path, "ignoring unrelated path"),
            DataEvent::Deleted { path } => debug!(path = %path, "ignoring delete"),
        }
    }

    fn connect(&mut self) {
        if !matches!(self.link, Link::NotConnected) {
            return;
        }
        let Some(inbox) = self.inbox.upgrade() else {
            return;
        };

        self.link_id += 1;
        let link = self.link_id;
        let transport = Arc::clone(&self.transport);

        let task = tokio::spawn(async move {
            let message = match transport.connect().await {
                Ok(connection) => EngineMessage::Connected { link, connection },
                Err(error) => EngineMessage::ConnectFailed { link, error },
            };
            let _ = inbox.send(message);
        });
        self.link = Link::Connecting { task };
    }

    /// Unregister the listener and close the connection. Best-effort.
    async fn disconnect(&mut self) {
        // Anything still queued from the old link is now stale.
        self.link_id += 1;

        match std::mem::replace(&mut self.link, Link::NotConnected) {
            Link::NotConnected => {}
            Link::Connecting { task } => task.abort(),
            Link::Listening { connection, listener } => {
                listener.abort();
                connection.disconnect().await;
                info!("watch face stopped listening");
            }
        }
    }

    /// Start or stop the repaint timer to match visibility and ambient mode.
    fn update_timer(&mut self) {
        self.timer.cancel();
        if should_run(self.state.visible, self.state.ambient) {
            self.timer.schedule(std::time::Duration::ZERO, self.inbox.clone());
        }
    }

    fn invalidate(&mut self) {
        self.state.time = self.clock.now();
        self.repaints += 1;
        self.frames.send_replace(render(&self.state, self.bounds, self.repaints));
    }

    async fn teardown(&mut self) {
        self.timer.cancel();
        self.disconnect().await;
    }
}

/// Handle to an engine running on its own task.
#[derive(Debug)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineMessage>,
    frames: watch::Receiver<Frame>,
    task: JoinHandle<DisplayState>,
}

impl EngineHandle {
    /// Deliver a host signal. Returns `false` once the engine has stopped.
    pub fn send(&self, event: WatchFaceEvent) -> bool {
        self.sender.send(EngineMessage::Host(event)).is_ok()
    }

    pub fn frames(&self) -> watch::Receiver<Frame> {
        self.frames.clone()
    }

    /// Tear the engine down and return its final display state.
    pub async fn destroy(self) -> Result<DisplayState, JoinError> {
        let _ = self.sender.send(EngineMessage::Host(WatchFaceEvent::Destroy));
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::FixedClock,
        model::{DataMap, WEATHER_DATA_PATH},
        transport::LocalTransport,
    };
    use chrono::DateTime;
    use std::time::Duration;

    struct Harness {
        engine: WatchFaceEngine,
        inbox: Inbox,
        transport: LocalTransport,
    }

    impl Harness {
        fn new() -> Self {
            let transport = LocalTransport::new();
            let (engine, inbox) = WatchFaceEngine::new(&Config::default(), Arc::new(transport.clone()));
            let now = DateTime::parse_from_rfc3339("2026-10-17T09:30:00.250+00:00").expect("valid");
            let engine = engine.with_clock(Arc::new(FixedClock(now)));
            Self { engine, inbox, transport }
        }

        async fn host(&mut self, event: WatchFaceEvent) -> Flow {
            self.engine.handle(EngineMessage::Host(event)).await
        }

        /// Handle the next queued message.
        async fn pump(&mut self) {
            let message = self.inbox.receiver.recv().await.expect("inbox open");
            self.engine.handle(message).await;
        }

        async fn pump_until_listening(&mut self) {
            while self.engine.link_status() != LinkStatus::Listening {
                self.pump().await;
            }
        }

        /// Handle queued messages until `done` holds.
        async fn pump_until(&mut self, done: impl Fn(&WatchFaceEngine) -> bool) {
            while !done(&self.engine) {
                self.pump().await;
            }
        }
    }

    async fn push(transport: &LocalTransport, data: DataMap) {
        let conn = transport.connect().await.expect("connect");
        conn.push(WEATHER_DATA_PATH, data).await.expect("push");
    }

    #[tokio::test]
    async fn becoming_visible_connects_and_listens() {
        let mut h = Harness::new();
        assert_eq!(h.engine.link_status(), LinkStatus::NotConnected);

        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        assert_eq!(h.engine.link_status(), LinkStatus::Connecting);

        h.pump_until_listening().await;
        assert!(h.engine.state().visible);
    }

    #[tokio::test]
    async fn changed_event_updates_temperatures_verbatim() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;

        push(&h.transport, WeatherSnapshot::new("t", 200, "25°", "15°").to_data_map()).await;
        h.pump_until(|e| e.state().weather.is_some()).await;

        assert_eq!(h.engine.state().temp_max(), Some(" 25° "));
        assert_eq!(h.engine.state().temp_min(), Some("15°"));
    }

    #[tokio::test]
    async fn deleted_and_malformed_events_leave_state_alone() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;

        push(&h.transport, WeatherSnapshot::new("t", 800, "20°", "10°").to_data_map()).await;
        h.pump_until(|e| e.state().weather.is_some()).await;
        let before = h.engine.state().clone();

        h.engine
            .handle(EngineMessage::Data {
                link: h.engine.link_id,
                event: DataEvent::Deleted { path: WEATHER_DATA_PATH.to_string() },
            })
            .await;
        assert_eq!(h.engine.state(), &before);

        let mut broken = DataMap::new();
        broken.put_string("maxTemp", "99°");
        h.engine
            .handle(EngineMessage::Data {
                link: h.engine.link_id,
                event: DataEvent::Changed { path: WEATHER_DATA_PATH.to_string(), data: broken },
            })
            .await;
        assert_eq!(h.engine.state(), &before);
    }

    #[tokio::test]
    async fn other_paths_are_ignored() {
        let mut h = Harness::new();
        let data = WeatherSnapshot::new("t", 800, "20°", "10°").to_data_map();

        h.engine
            .handle(EngineMessage::Data {
                link: h.engine.link_id,
                event: DataEvent::Changed { path: "/settings".to_string(), data },
            })
            .await;

        assert_eq!(h.engine.state().weather, None);
    }

    #[tokio::test]
    async fn hiding_disconnects_and_drops_queued_events() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;
        let old_link = h.engine.link_id;

        h.host(WatchFaceEvent::VisibilityChanged(false)).await;
        assert_eq!(h.engine.link_status(), LinkStatus::NotConnected);

        let data = WeatherSnapshot::new("t", 800, "20°", "10°").to_data_map();
        h.engine
            .handle(EngineMessage::Data {
                link: old_link,
                event: DataEvent::Changed { path: WEATHER_DATA_PATH.to_string(), data },
            })
            .await;
        assert_eq!(h.engine.state().weather, None);
    }

    #[tokio::test]
    async fn connection_arriving_after_hide_is_closed() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        let link = h.engine.link_id;
        h.host(WatchFaceEvent::VisibilityChanged(false)).await;

        let late = h.transport.connect().await.expect("connect");
        let probe = h.transport.connect().await.expect("connect");
        h.engine.handle(EngineMessage::Connected { link, connection: late }).await;

        assert_eq!(h.engine.link_status(), LinkStatus::NotConnected);
        assert!(probe.is_connected());
    }

    #[tokio::test]
    async fn unavailable_transport_leaves_face_unconnected() {
        let mut h = Harness::new();
        h.transport.set_available(false);

        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until(|e| e.link_status() == LinkStatus::NotConnected).await;

        assert!(h.engine.state().visible);
        assert_eq!(h.engine.state().weather, None);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_scheduling_follows_visibility_and_ambient() {
        let mut h = Harness::new();

        for (visible, ambient) in [(true, false), (true, true), (false, true), (false, false), (true, false)] {
            h.host(WatchFaceEvent::VisibilityChanged(visible)).await;
            h.host(WatchFaceEvent::AmbientModeChanged(ambient)).await;
            assert_eq!(
                h.engine.timer_scheduled(),
                visible && !ambient,
                "visible={visible} ambient={ambient}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn each_tick_repaints_and_reschedules() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::AmbientModeChanged(false)).await;
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        let start = h.engine.repaints();

        for n in 1..=3 {
            h.pump_until(|e| e.repaints() == start + n).await;
            assert!(h.engine.timer_scheduled());
        }

        let frame = h.engine.frames().borrow().clone();
        assert_eq!(frame.sequence, start + 3);
        assert_eq!(frame.texts().next(), Some("09:30:00"));
    }

    #[tokio::test(start_paused = true)]
    async fn ambient_stops_ticks_and_renders_short_time() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.host(WatchFaceEvent::PropertiesChanged { low_bit_ambient: true }).await;
        h.host(WatchFaceEvent::AmbientModeChanged(true)).await;
        assert!(!h.engine.timer_scheduled());

        let repaints = h.engine.repaints();
        tokio::time::sleep(Duration::from_secs(5)).await;
        while let Ok(message) = h.inbox.receiver.try_recv() {
            h.engine.handle(message).await;
        }
        assert_eq!(h.engine.repaints(), repaints, "no timer repaints while ambient");

        h.host(WatchFaceEvent::TimeTick).await;
        let frame = h.engine.frames().borrow().clone();
        assert_eq!(frame.texts().collect::<Vec<_>>(), vec!["09:30"]);
    }

    #[tokio::test]
    async fn taps_count_only_completed_taps() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::Tap(TapType::Touch)).await;
        h.host(WatchFaceEvent::Tap(TapType::TouchCancel)).await;
        h.host(WatchFaceEvent::Tap(TapType::Tap)).await;
        h.host(WatchFaceEvent::Tap(TapType::Tap)).await;

        assert_eq!(h.engine.state().tap_count, 2);
        assert_eq!(h.engine.repaints(), 4);
    }

    #[tokio::test]
    async fn window_insets_switch_dimensions() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::WindowInsets(ScreenShape::Round)).await;

        let metrics = h.engine.state().metrics;
        assert_eq!(metrics.shape, ScreenShape::Round);
        assert_eq!(metrics.dimensions, Config::default().dimensions.round);
    }

    #[tokio::test]
    async fn destroy_stops_and_disconnects() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;

        assert_eq!(h.host(WatchFaceEvent::Destroy).await, Flow::Stop);
        h.engine.teardown().await;

        assert_eq!(h.engine.link_status(), LinkStatus::NotConnected);
        assert!(!h.engine.timer_scheduled());
    }

    #[tokio::test]
    async fn reconnect_after_hide_applies_new_events() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;
        push(&h.transport, WeatherSnapshot::new("a", 800, "20°", "10°").to_data_map()).await;
        h.pump_until(|e| e.state().temp_min() == Some("10°")).await;

        h.host(WatchFaceEvent::VisibilityChanged(false)).await;
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;

        push(&h.transport, WeatherSnapshot::new("b", 600, "-1°", "-6°").to_data_map()).await;
        h.pump_until(|e| e.state().temp_min() == Some("-6°")).await;

        assert_eq!(h.engine.state().temp_max(), Some(" -1° "));
        assert_eq!(h.engine.link_status(), LinkStatus::Listening);
    }

    #[tokio::test]
    async fn dropping_handle_while_listening_ends_engine() {
        let mut h = Harness::new();
        h.host(WatchFaceEvent::AmbientModeChanged(true)).await;
        h.host(WatchFaceEvent::VisibilityChanged(true)).await;
        h.pump_until_listening().await;

        let Harness { engine, inbox, .. } = h;
        let handle = engine.spawn(inbox);
        let mut frames = handle.frames();
        drop(handle);

        let ended = tokio::time::timeout(Duration::from_secs(2), async {
            while frames.changed().await.is_ok() {}
        })
        .await;
        assert!(ended.is_ok(), "engine should stop once every handle is gone");
    }

    #[tokio::test]
    async fn spawned_engine_returns_final_state() {
        let transport = LocalTransport::new();
        let (engine, inbox) = WatchFaceEngine::new(&Config::default(), Arc::new(transport.clone()));
        let handle = engine.spawn(inbox);

        assert!(handle.send(WatchFaceEvent::Tap(TapType::Tap)));
        let state = handle.destroy().await.expect("engine task");

        assert_eq!(state.tap_count, 1);
    }
}
