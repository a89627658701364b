// Copyright 2025 JiangLong.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Event recording.
//!
//! An [`EventBroadcaster`] fans events out to every attached [`EventSink`], one
//! background task per sink. The [`RecorderProvider`] does not create or attach
//! to a broadcaster until the first event is published, so a cluster that is
//! built but never used starts no background work.

use crate::infrastructure::constants::EVENT_QUEUE_LENGTH;
use crate::infrastructure::kubernetes::registry::TypeRegistry;
use crate::shared::error::{ClusterError, Result};
use crate::shared::logger::Logger;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{
    Event as KubeEvent, EventType as KubeEventType, Recorder, Reporter,
};
use kube::{Client, Config, Resource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Normal,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub type_: EventType,
    /// Short, machine-readable reason, e.g. `Created`.
    pub reason: String,
    pub note: Option<String>,
    /// What was done or failed, e.g. `Reconciling`.
    pub action: String,
    pub secondary: Option<ObjectReference>,
}

impl Event {
    pub fn normal(reason: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            type_: EventType::Normal,
            reason: reason.into(),
            note: None,
            action: action.into(),
            secondary: None,
        }
    }

    pub fn warning(reason: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            type_: EventType::Warning,
            ..Self::normal(reason, action)
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// An event together with the object it is about and the component that
/// reported it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub source: String,
    pub reference: ObjectReference,
    pub event: Event,
}

/// Destination for broadcast events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    async fn write(&self, record: &EventRecord) -> Result<()>;
}

/// Writes events to the API server as `events.k8s.io/v1` objects.
pub struct KubeEventSink {
    client: Client,
    instance: Option<String>,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            instance: std::env::var("HOSTNAME").ok(),
        }
    }
}

#[async_trait::async_trait]
impl EventSink for KubeEventSink {
    async fn write(&self, record: &EventRecord) -> Result<()> {
        let reporter = Reporter {
            controller: record.source.clone(),
            instance: self.instance.clone(),
        };
        let recorder = Recorder::new(self.client.clone(), reporter, record.reference.clone());
        recorder
            .publish(KubeEvent {
                type_: match record.event.type_ {
                    EventType::Normal => KubeEventType::Normal,
                    EventType::Warning => KubeEventType::Warning,
                },
                reason: record.event.reason.clone(),
                note: record.event.note.clone(),
                action: record.event.action.clone(),
                secondary: record.event.secondary.clone(),
            })
            .await
            .map_err(ClusterError::Api)
    }
}

/// Fans events out to attached sinks.
///
/// Each sink is fed by its own task through a queue of [`EVENT_QUEUE_LENGTH`]
/// events. When a sink falls further behind than that, the oldest queued events
/// are dropped to make room for new ones and a warning is logged.
pub struct EventBroadcaster {
    sender: broadcast::Sender<EventRecord>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    /// Creating a broadcaster starts nothing; tasks are spawned per attached
    /// sink.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_QUEUE_LENGTH);
        Self {
            sender,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Starts a task delivering every subsequent event to `sink`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_recording_to_sink(&self, sink: Arc<dyn EventSink>) {
        let receiver = self.sender.subscribe();
        self.tasks
            .spawn(deliver(receiver, sink, self.shutdown.clone()));
    }

    /// Queues an event for every attached sink. Returns `false` when nothing
    /// will receive it.
    pub fn broadcast(&self, record: EventRecord) -> bool {
        if self.shutdown.is_cancelled() {
            return false;
        }
        self.sender.send(record).is_ok()
    }

    /// Stops every delivery task once it has written what is already queued,
    /// and waits for them to exit.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

async fn deliver(
    mut receiver: broadcast::Receiver<EventRecord>,
    sink: Arc<dyn EventSink>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                // Flush whatever was queued before shutdown.
                loop {
                    match receiver.try_recv() {
                        Ok(record) => write_record(sink.as_ref(), &record).await,
                        Err(TryRecvError::Lagged(dropped)) => {
                            warn!(dropped, "Event queue overflowed, events dropped");
                        }
                        Err(TryRecvError::Empty | TryRecvError::Closed) => break,
                    }
                }
                break;
            }
            received = receiver.recv() => match received {
                Ok(record) => write_record(sink.as_ref(), &record).await,
                Err(RecvError::Lagged(dropped)) => {
                    warn!(dropped, "Event queue overflowed, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn write_record(sink: &dyn EventSink, record: &EventRecord) {
    if let Err(e) = sink.write(record).await {
        warn!(
            source = %record.source,
            reason = %record.event.reason,
            error = %e,
            "Failed to write event"
        );
    }
}

/// Produces the broadcaster on first use, with whether the provider owns it.
pub type BroadcasterFactory = Arc<dyn Fn() -> (Arc<EventBroadcaster>, bool) + Send + Sync>;

/// Builds the recorder provider for a cluster.
pub type RecorderProviderStrategy = Arc<
    dyn Fn(&Config, &Client, &TypeRegistry, Logger, BroadcasterFactory) -> Result<RecorderProvider>
        + Send
        + Sync,
>;

pub fn default_recorder_provider_strategy() -> RecorderProviderStrategy {
    Arc::new(RecorderProvider::new)
}

struct Materialized {
    broadcaster: Arc<EventBroadcaster>,
    owned: bool,
}

struct ProviderInner {
    sink: Arc<dyn EventSink>,
    logger: Logger,
    factory: BroadcasterFactory,
    broadcaster: OnceLock<Materialized>,
    stopped: AtomicBool,
}

impl ProviderInner {
    fn broadcaster(&self) -> &Materialized {
        self.broadcaster.get_or_init(|| {
            let (broadcaster, owned) = (self.factory)();
            broadcaster.start_recording_to_sink(self.sink.clone());
            debug!(logger = %self.logger.name(), owned, "Event broadcaster started");
            Materialized { broadcaster, owned }
        })
    }
}

/// Hands out [`EventRecorder`]s sharing one lazily created broadcaster.
pub struct RecorderProvider {
    inner: Arc<ProviderInner>,
}

impl RecorderProvider {
    pub fn new(
        _config: &Config,
        client: &Client,
        _registry: &TypeRegistry,
        logger: Logger,
        factory: BroadcasterFactory,
    ) -> Result<Self> {
        Ok(Self::with_sink(
            Arc::new(KubeEventSink::new(client.clone())),
            logger,
            factory,
        ))
    }

    pub fn with_sink(sink: Arc<dyn EventSink>, logger: Logger, factory: BroadcasterFactory) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                sink,
                logger,
                factory,
                broadcaster: OnceLock::new(),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn recorder_for(&self, name: &str) -> EventRecorder {
        EventRecorder {
            source: name.to_string(),
            provider: self.inner.clone(),
        }
    }

    /// Whether the broadcaster has been created yet.
    pub fn is_materialized(&self) -> bool {
        self.inner.broadcaster.get().is_some()
    }

    /// Ownership of the broadcaster, once it exists.
    pub fn owns_broadcaster(&self) -> Option<bool> {
        self.inner.broadcaster.get().map(|m| m.owned)
    }

    /// Stops recording. The broadcaster is shut down only if this provider
    /// created it; a caller-supplied broadcaster keeps running.
    pub async fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if let Some(materialized) = self.inner.broadcaster.get() {
            if materialized.owned {
                materialized.broadcaster.shutdown().await;
                debug!(logger = %self.inner.logger.name(), "Event broadcaster stopped");
            }
        }
    }
}

/// Emits events tagged with the name it was created for.
#[derive(Clone)]
pub struct EventRecorder {
    source: String,
    provider: Arc<ProviderInner>,
}

impl EventRecorder {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Queues an event about `reference`. Delivery is asynchronous and
    /// best-effort; events published after the provider stops are dropped.
    ///
    /// The first call creates the broadcaster and must happen inside a Tokio
    /// runtime.
    pub fn publish(&self, reference: &ObjectReference, event: Event) {
        if self.provider.stopped.load(Ordering::SeqCst) {
            debug!(source = %self.source, reason = %event.reason, "Recorder stopped, dropping event");
            return;
        }

        let record = EventRecord {
            source: self.source.clone(),
            reference: reference.clone(),
            event,
        };
        if !self.provider.broadcaster().broadcaster.broadcast(record) {
            debug!(source = %self.source, "No event sink attached, dropping event");
        }
    }

    /// Publishes an event about a typed object.
    pub fn publish_for<K>(&self, obj: &K, event: Event)
    where
        K: Resource<DynamicType = ()>,
    {
        self.publish(&obj.object_ref(&()), event);
    }

    pub fn normal(&self, reference: &ObjectReference, reason: &str, action: &str, note: &str) {
        self.publish(reference, Event::normal(reason, action).with_note(note));
    }

    pub fn warning(&self, reference: &ObjectReference, reason: &str, action: &str, note: &str) {
        self.publish(reference, Event::warning(reason, action).with_note(note));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingSink {
        records: Mutex<Vec<EventRecord>>,
    }

    impl CollectingSink {
        fn sources(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.source.clone())
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl EventSink for CollectingSink {
        async fn write(&self, record: &EventRecord) -> Result<()> {
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn reference() -> ObjectReference {
        ObjectReference {
            kind: Some("Pod".to_string()),
            name: Some("web-0".to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        }
    }

    fn counting_factory(calls: Arc<AtomicUsize>) -> BroadcasterFactory {
        Arc::new(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            (Arc::new(EventBroadcaster::new()), true)
        })
    }

    async fn wait_for(sink: &CollectingSink, count: usize) {
        for _ in 0..100 {
            if sink.records.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn test_factory_invoked_lazily_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sink = Arc::new(CollectingSink::default());
        let provider = RecorderProvider::with_sink(
            sink.clone(),
            Logger::new("events"),
            counting_factory(calls.clone()),
        );

        let recorder = provider.recorder_for("web-controller");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!provider.is_materialized());

        recorder.normal(&reference(), "Created", "Reconciling", "created pod");
        provider
            .recorder_for("db-controller")
            .warning(&reference(), "Failed", "Reconciling", "quota exceeded");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(provider.owns_broadcaster(), Some(true));

        wait_for(&sink, 2).await;
        assert_eq!(sink.sources(), vec!["web-controller", "db-controller"]);
    }

    #[tokio::test]
    async fn test_stop_shuts_down_owned_broadcaster() {
        let sink = Arc::new(CollectingSink::default());
        let provider = RecorderProvider::with_sink(
            sink.clone(),
            Logger::new("events"),
            counting_factory(Arc::new(AtomicUsize::new(0))),
        );
        provider
            .recorder_for("web-controller")
            .normal(&reference(), "Created", "Reconciling", "created pod");

        provider.stop().await;
        let broadcaster = &provider.inner.broadcaster.get().unwrap().broadcaster;
        assert!(broadcaster.is_shut_down());
        assert_eq!(sink.sources(), vec!["web-controller"]);

        provider
            .recorder_for("web-controller")
            .normal(&reference(), "Deleted", "Reconciling", "after stop");
        assert_eq!(sink.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_leaves_external_broadcaster_running() {
        let external = Arc::new(EventBroadcaster::new());
        let factory: BroadcasterFactory = {
            let external = external.clone();
            Arc::new(move || (external.clone(), false))
        };
        let provider = RecorderProvider::with_sink(
            Arc::new(CollectingSink::default()),
            Logger::new("events"),
            factory,
        );
        provider
            .recorder_for("web-controller")
            .normal(&reference(), "Created", "Reconciling", "created pod");
        assert_eq!(provider.owns_broadcaster(), Some(false));

        provider.stop().await;
        assert!(!external.is_shut_down());
        external.shutdown().await;
    }

    /// Holds every write until released.
    struct GatedSink {
        entered: tokio::sync::Notify,
        release: tokio::sync::Semaphore,
        records: Mutex<Vec<EventRecord>>,
    }

    impl GatedSink {
        fn new() -> Self {
            Self {
                entered: tokio::sync::Notify::new(),
                release: tokio::sync::Semaphore::new(0),
                records: Mutex::default(),
            }
        }
    }

    #[async_trait::async_trait]
    impl EventSink for GatedSink {
        async fn write(&self, record: &EventRecord) -> Result<()> {
            self.entered.notify_one();
            let _permit = self.release.acquire().await;
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    fn record(reason: String) -> EventRecord {
        EventRecord {
            source: "web-controller".to_string(),
            reference: reference(),
            event: Event::normal(reason, "Reconciling"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_flushes_overflowed_queue() {
        let sink = Arc::new(GatedSink::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        broadcaster.start_recording_to_sink(sink.clone());

        assert!(broadcaster.broadcast(record("first".to_string())));
        sink.entered.notified().await;

        let overflow = EVENT_QUEUE_LENGTH + 476;
        for i in 0..overflow {
            broadcaster.broadcast(record(format!("queued-{}", i)));
        }

        let stopping = tokio::spawn({
            let broadcaster = broadcaster.clone();
            async move { broadcaster.shutdown().await }
        });
        while !broadcaster.is_shut_down() {
            tokio::task::yield_now().await;
        }
        sink.release.add_permits(1);
        tokio::time::timeout(Duration::from_secs(5), stopping)
            .await
            .expect("shutdown did not finish")
            .unwrap();

        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1 + EVENT_QUEUE_LENGTH);
        assert_eq!(records[0].event.reason, "first");
        // The oldest overflowed events are the ones dropped.
        assert_eq!(
            records[1].event.reason,
            format!("queued-{}", overflow - EVENT_QUEUE_LENGTH)
        );
        assert_eq!(
            records[EVENT_QUEUE_LENGTH].event.reason,
            format!("queued-{}", overflow - 1)
        );
    }

    #[tokio::test]
    async fn test_stop_before_first_event_creates_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = RecorderProvider::with_sink(
            Arc::new(CollectingSink::default()),
            Logger::new("events"),
            counting_factory(calls.clone()),
        );

        provider.stop().await;
        provider
            .recorder_for("web-controller")
            .normal(&reference(), "Created", "Reconciling", "ignored");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_broadcast_fans_out_to_every_sink() {
        let broadcaster = EventBroadcaster::new();
        let first = Arc::new(CollectingSink::default());
        let second = Arc::new(CollectingSink::default());
        broadcaster.start_recording_to_sink(first.clone());
        broadcaster.start_recording_to_sink(second.clone());

        assert!(broadcaster.broadcast(EventRecord {
            source: "web-controller".to_string(),
            reference: reference(),
            event: Event::normal("Created", "Reconciling"),
        }));

        wait_for(&first, 1).await;
        wait_for(&second, 1).await;
        assert_eq!(first.sources(), vec!["web-controller"]);
        assert_eq!(second.sources(), vec!["web-controller"]);

        broadcaster.shutdown().await;
        assert!(!broadcaster.broadcast(EventRecord {
            source: "web-controller".to_string(),
            reference: reference(),
            event: Event::normal("Deleted", "Reconciling"),
        }));
    }

    #[test]
    fn test_broadcast_without_sinks_is_dropped() {
        let broadcaster = EventBroadcaster::new();
        assert!(!broadcaster.broadcast(EventRecord {
            source: "web-controller".to_string(),
            reference: reference(),
            event: Event::warning("Failed", "Reconciling").with_note("no sink"),
        }));
    }
}
