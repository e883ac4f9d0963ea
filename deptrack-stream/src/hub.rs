//! In-process fan-out of notification frames to per-user subscriptions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deptrack_core::NotificationRecord;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::frame::StreamFrame;
use crate::transport::{FrameSource, Transport};

type Senders = HashMap<String, Vec<mpsc::UnboundedSender<String>>>;

#[derive(Default)]
pub struct NotificationHub {
    subscribers: Mutex<Senders>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Senders> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a subscription for `user_id`; the first line it yields is a
    /// `connected` frame.
    pub fn subscribe(&self, user_id: &str) -> HubSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let hello = StreamFrame::Connected {
            message: "Notification stream connected".to_string(),
        };
        if let Ok(line) = hello.encode() {
            let _ = tx.send(line);
        }
        let mut subs = self.lock();
        let senders = subs.entry(user_id.to_string()).or_default();
        senders.retain(|tx| !tx.is_closed());
        senders.push(tx);
        drop(subs);
        debug!(user_id, "hub subscription added");
        HubSubscription { rx }
    }

    /// Deliver `record` to every live subscription of its user.
    /// Returns the number of subscriptions reached.
    pub fn publish(&self, record: &NotificationRecord) -> usize {
        let frame = StreamFrame::Notification {
            notification: record.clone(),
        };
        let line = match frame.encode() {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, id = %record.id, "could not encode notification");
                return 0;
            }
        };

        let mut subs = self.lock();
        let Some(senders) = subs.get_mut(&record.user_id) else {
            return 0;
        };
        senders.retain(|tx| tx.send(line.clone()).is_ok());
        let delivered = senders.len();
        if senders.is_empty() {
            subs.remove(&record.user_id);
        }
        debug!(user_id = %record.user_id, kind = %record.kind, delivered, "published notification");
        delivered
    }

    /// Send a heartbeat frame to every subscription.
    pub fn heartbeat(&self, now: DateTime<Utc>) -> usize {
        let Ok(line) = (StreamFrame::Heartbeat { timestamp: now }).encode() else {
            return 0;
        };
        let mut subs = self.lock();
        let mut reached = 0;
        for senders in subs.values_mut() {
            senders.retain(|tx| tx.send(line.clone()).is_ok());
            reached += senders.len();
        }
        subs.retain(|_, senders| !senders.is_empty());
        reached
    }

    /// Close every subscription of `user_id`. Their readers see end of stream.
    pub fn drop_user(&self, user_id: &str) -> usize {
        self.lock().remove(user_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Live subscriptions of `user_id`; closed ones are pruned on the way.
    pub fn subscriber_count(&self, user_id: &str) -> usize {
        let mut subs = self.lock();
        let Some(senders) = subs.get_mut(user_id) else {
            return 0;
        };
        senders.retain(|tx| !tx.is_closed());
        let live = senders.len();
        if live == 0 {
            subs.remove(user_id);
        }
        live
    }

    /// Users holding at least one subscription entry, live or not yet pruned.
    pub fn tracked_users(&self) -> usize {
        self.lock().len()
    }

    pub fn spawn_heartbeat(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let reached = self.heartbeat(Utc::now());
                debug!(reached, "heartbeat");
            }
        })
    }
}

pub struct HubSubscription {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl FrameSource for HubSubscription {
    async fn next_line(&mut self) -> Option<Result<String>> {
        self.rx.recv().await.map(Ok)
    }
}

/// Transport backed by a [`NotificationHub`] in the same process.
#[derive(Clone)]
pub struct LocalTransport {
    hub: Arc<NotificationHub>,
    tokens: HashMap<String, String>,
}

impl LocalTransport {
    pub fn new(hub: Arc<NotificationHub>) -> Self {
        Self {
            hub,
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn open(&self, _url: &str, credential: &str) -> Result<Box<dyn FrameSource>> {
        let Some(user_id) = self.tokens.get(credential) else {
            bail!("unauthorized: unknown credential");
        };
        Ok(Box::new(self.hub.subscribe(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{parse_frame, FrameOutcome};
    use chrono::TimeZone;
    use deptrack_core::NotificationKind;

    fn record(user: &str) -> NotificationRecord {
        NotificationRecord::new(
            "n1",
            user,
            NotificationKind::TaskAssigned,
            "New task assigned: Ship it",
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        )
    }

    async fn next_frame(sub: &mut HubSubscription) -> StreamFrame {
        let line = sub.next_line().await.unwrap().unwrap();
        match parse_frame(&line) {
            FrameOutcome::Frame(f) => f,
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn subscription_starts_with_connected_frame() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe("u1");
        assert!(matches!(next_frame(&mut sub).await, StreamFrame::Connected { .. }));
    }

    #[tokio::test]
    async fn publish_targets_only_the_owner() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe("u1");
        let mut b = hub.subscribe("u1");
        let _other = hub.subscribe("u2");

        assert_eq!(hub.publish(&record("u1")), 2);
        for sub in [&mut a, &mut b] {
            next_frame(sub).await;
            match next_frame(sub).await {
                StreamFrame::Notification { notification } => assert_eq!(notification.user_id, "u1"),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(hub.publish(&record("nobody")), 0);
    }

    #[tokio::test]
    async fn closed_subscriptions_are_pruned() {
        let hub = NotificationHub::new();
        let keep = hub.subscribe("u1");
        let gone = hub.subscribe("u1");
        drop(gone);

        assert_eq!(hub.subscriber_count("u1"), 1);
        assert_eq!(hub.publish(&record("u1")), 1);
        drop(keep);
        assert_eq!(hub.publish(&record("u1")), 0);
        assert_eq!(hub.subscriber_count("u1"), 0);
    }

    #[tokio::test]
    async fn heartbeat_reaches_everyone() {
        let hub = NotificationHub::new();
        let mut a = hub.subscribe("u1");
        let _b = hub.subscribe("u2");
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 30).unwrap();

        assert_eq!(hub.heartbeat(at), 2);
        next_frame(&mut a).await;
        assert_eq!(next_frame(&mut a).await, StreamFrame::Heartbeat { timestamp: at });
    }

    #[tokio::test]
    async fn dropped_readers_are_pruned_without_traffic() {
        let hub = NotificationHub::new();
        drop(hub.subscribe("u1"));
        drop(hub.subscribe("u2"));
        assert_eq!(hub.tracked_users(), 2);

        assert_eq!(hub.subscriber_count("u1"), 0);
        assert_eq!(hub.tracked_users(), 1);

        let _live = hub.subscribe("u2");
        let senders = hub.lock().get("u2").map(Vec::len);
        assert_eq!(senders, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_task_ticks_on_interval() {
        let hub = Arc::new(NotificationHub::new());
        let mut sub = hub.subscribe("u1");
        next_frame(&mut sub).await;

        let ticker = hub.clone().spawn_heartbeat(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sub.rx.try_recv().is_err());

        for _ in 0..2 {
            assert!(matches!(next_frame(&mut sub).await, StreamFrame::Heartbeat { .. }));
        }
        ticker.abort();
    }

    #[tokio::test]
    async fn local_transport_checks_the_token() {
        let hub = Arc::new(NotificationHub::new());
        let transport = LocalTransport::new(hub.clone()).with_token("secret", "u1");

        assert!(transport.open("local", "wrong").await.is_err());
        let mut source = transport.open("local", "secret").await.unwrap();
        assert!(source.next_line().await.unwrap().unwrap().contains("connected"));
        assert_eq!(hub.subscriber_count("u1"), 1);

        assert_eq!(hub.drop_user("u1"), 1);
        assert!(source.next_line().await.is_none());
    }
}
