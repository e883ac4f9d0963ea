//! Realtime notification client.
//!
//! One tokio task owns the [`ConnectionMachine`], the live channel and the
//! reconnect timer. The [`StreamClient`] handle only enqueues commands and
//! reads the published status.

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use deptrack_core::NotificationRecord;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use crate::frame::{parse_frame, FrameOutcome, StreamFrame};
use crate::machine::{Action, BackoffPolicy, ConnectionMachine, ConnectionState};
use crate::transport::{FrameSource, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub url: String,
    pub credential: Option<String>,
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Buffered notifications per subscriber before the slowest one lags.
    pub channel_capacity: usize,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>, credential: Option<String>) -> Self {
        let backoff = BackoffPolicy::default();
        Self {
            url: url.into(),
            credential,
            max_attempts: backoff.max_attempts,
            base_delay: backoff.base_delay,
            max_delay: backoff.max_delay,
            channel_capacity: 64,
        }
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStatus {
    pub state: ConnectionState,
    pub reconnect_attempt: u32,
    pub connection_error: Option<String>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub reconnect_pending: bool,
}

impl ClientStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

enum Command {
    Connect,
    Disconnect,
    Reconnect,
    SetCredential(Option<String>),
}

impl Command {
    fn label(&self) -> &'static str {
        match self {
            Command::Connect => "connect",
            Command::Disconnect => "disconnect",
            Command::Reconnect => "reconnect",
            Command::SetCredential(_) => "set_credential",
        }
    }
}

pub struct StreamClient {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ClientStatus>,
    notifications: broadcast::Sender<NotificationRecord>,
    worker: JoinHandle<()>,
}

impl StreamClient {
    /// Start the client task. Must be called from within a tokio runtime.
    /// The client starts Disconnected; call [`StreamClient::connect`].
    pub fn spawn(config: StreamConfig, transport: Arc<dyn Transport>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(config.channel_capacity.max(1));
        let machine = ConnectionMachine::new(config.backoff(), config.credential.clone());
        let (status_tx, status) = watch::channel(snapshot(&machine, None));

        let worker = Worker {
            url: config.url,
            transport,
            machine,
            commands: rx,
            opening: None,
            source: None,
            timer: None,
            last_heartbeat: None,
            status: status_tx,
            notifications: notifications.clone(),
        };
        let worker = tokio::spawn(worker.run());

        Self {
            commands,
            status,
            notifications,
            worker,
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            warn!("stream client worker has stopped");
        }
    }

    pub fn connect(&self) {
        self.send(Command::Connect);
    }

    pub fn disconnect(&self) {
        self.send(Command::Disconnect);
    }

    pub fn reconnect(&self) {
        self.send(Command::Reconnect);
    }

    pub fn set_credential(&self, credential: Option<String>) {
        self.send(Command::SetCredential(credential));
    }

    pub fn status(&self) -> ClientStatus {
        self.status.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    pub fn connection_error(&self) -> Option<String> {
        self.status.borrow().connection_error.clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    /// Receive every `notification` frame that arrives after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<NotificationRecord> {
        self.notifications.subscribe()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

fn snapshot(machine: &ConnectionMachine, last_heartbeat: Option<DateTime<Utc>>) -> ClientStatus {
    ClientStatus {
        state: machine.state(),
        reconnect_attempt: machine.reconnect_attempt(),
        connection_error: machine.connection_error().map(str::to_string),
        last_heartbeat,
        reconnect_pending: machine.reconnect_pending(),
    }
}

type OpenFuture = BoxFuture<'static, Result<Box<dyn FrameSource>>>;

enum Event {
    Command(Option<Command>),
    Opened(Result<Box<dyn FrameSource>>),
    Line(Option<Result<String>>),
    Timer,
}

struct Worker {
    url: String,
    transport: Arc<dyn Transport>,
    machine: ConnectionMachine,
    commands: mpsc::UnboundedReceiver<Command>,
    opening: Option<OpenFuture>,
    source: Option<Box<dyn FrameSource>>,
    timer: Option<Pin<Box<Sleep>>>,
    last_heartbeat: Option<DateTime<Utc>>,
    status: watch::Sender<ClientStatus>,
    notifications: broadcast::Sender<NotificationRecord>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                cmd = self.commands.recv() => Event::Command(cmd),
                res = poll_opening(&mut self.opening) => Event::Opened(res),
                line = read_line(&mut self.source) => Event::Line(line),
                _ = wait_timer(&mut self.timer) => Event::Timer,
            };

            let actions = match event {
                Event::Command(None) => break,
                Event::Command(Some(cmd)) => self.on_command(cmd),
                Event::Opened(Ok(source)) => {
                    self.opening = None;
                    self.source = Some(source);
                    self.machine.on_open()
                }
                Event::Opened(Err(e)) => {
                    self.opening = None;
                    self.machine.on_failure(&format!("{e:#}"))
                }
                Event::Line(Some(Ok(line))) => {
                    self.handle_line(&line);
                    Vec::new()
                }
                Event::Line(Some(Err(e))) => {
                    self.source = None;
                    self.machine.on_failure(&format!("{e:#}"))
                }
                Event::Line(None) => {
                    self.source = None;
                    self.machine.on_failure("stream closed by server")
                }
                Event::Timer => {
                    self.timer = None;
                    self.machine.on_timer()
                }
            };

            self.apply(actions);
            self.status.send_replace(snapshot(&self.machine, self.last_heartbeat));
        }
        debug!("stream client handle dropped; worker exiting");
    }

    fn on_command(&mut self, cmd: Command) -> Vec<Action> {
        debug!(command = cmd.label(), "stream command");
        match cmd {
            Command::Connect => self.machine.connect(),
            Command::Disconnect => self.machine.disconnect(),
            Command::Reconnect => self.machine.reconnect(),
            Command::SetCredential(credential) => self.machine.set_credential(credential),
        }
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Open => {
                    let Some(credential) = self.machine.credential().map(str::to_string) else {
                        continue;
                    };
                    let transport = self.transport.clone();
                    let url = self.url.clone();
                    self.source = None;
                    self.opening = Some(Box::pin(async move {
                        transport.open(&url, &credential).await
                    }));
                }
                Action::Close => {
                    self.opening = None;
                    self.source = None;
                }
                Action::ScheduleReconnect(delay) => {
                    self.timer = Some(Box::pin(tokio::time::sleep(delay)));
                }
                Action::CancelReconnect => {
                    self.timer = None;
                }
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        match parse_frame(line) {
            FrameOutcome::Frame(StreamFrame::Connected { message }) => {
                info!(%message, "notification stream acknowledged");
            }
            FrameOutcome::Frame(StreamFrame::Notification { notification }) => {
                debug!(id = %notification.id, kind = %notification.kind, "notification received");
                let _ = self.notifications.send(notification);
            }
            FrameOutcome::Frame(StreamFrame::Heartbeat { timestamp }) => {
                self.last_heartbeat = Some(timestamp);
            }
            FrameOutcome::Ignored(kind) => debug!(%kind, "ignoring unknown frame type"),
            FrameOutcome::Malformed(reason) => warn!(%reason, "dropping malformed frame"),
            FrameOutcome::Skip => {}
        }
    }
}

async fn poll_opening(opening: &mut Option<OpenFuture>) -> Result<Box<dyn FrameSource>> {
    match opening.as_mut() {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn read_line(source: &mut Option<Box<dyn FrameSource>>) -> Option<Result<String>> {
    match source.as_mut() {
        Some(src) => src.next_line().await,
        None => pending().await,
    }
}

async fn wait_timer(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    #[derive(Default)]
    struct FailingTransport {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Transport for FailingTransport {
        async fn open(&self, _url: &str, _credential: &str) -> Result<Box<dyn FrameSource>> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("connection refused")
        }
    }

    struct Pipe(mpsc::UnboundedReceiver<String>);

    #[async_trait]
    impl FrameSource for Pipe {
        async fn next_line(&mut self) -> Option<Result<String>> {
            self.0.recv().await.map(Ok)
        }
    }

    /// Hands out pre-made pipes, one per open.
    #[derive(Default)]
    struct PipeTransport {
        pipes: Mutex<Vec<Pipe>>,
    }

    impl PipeTransport {
        fn push(&self) -> mpsc::UnboundedSender<String> {
            let (tx, rx) = mpsc::unbounded_channel();
            self.pipes.lock().unwrap().push(Pipe(rx));
            tx
        }
    }

    #[async_trait]
    impl Transport for PipeTransport {
        async fn open(&self, _url: &str, _credential: &str) -> Result<Box<dyn FrameSource>> {
            match self.pipes.lock().unwrap().pop() {
                Some(pipe) => Ok(Box::new(pipe)),
                None => anyhow::bail!("no pipe available"),
            }
        }
    }

    fn config(credential: Option<&str>) -> StreamConfig {
        StreamConfig::new("test://stream", credential.map(str::to_string))
    }

    async fn wait(client: &StreamClient, pred: impl FnMut(&ClientStatus) -> bool) -> ClientStatus {
        client.watch_status().wait_for(pred).await.unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget_then_stays_down() {
        let transport = Arc::new(FailingTransport::default());
        let client = StreamClient::spawn(config(Some("t")), transport.clone());
        let started = Instant::now();

        client.connect();
        let status = wait(&client, |s| s.connection_error.is_some()).await;

        assert_eq!(status.state, ConnectionState::Disconnected);
        assert!(!status.reconnect_pending);
        assert!(!client.is_connected());
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 6);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(31), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(32), "{elapsed:?}");

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_resets_budget_and_retries_now() {
        let transport = Arc::new(FailingTransport::default());
        let client = StreamClient::spawn(config(Some("t")), transport.clone());
        client.connect();
        wait(&client, |s| s.connection_error.is_some()).await;

        client.reconnect();
        let status = wait(&client, |s| s.state == ConnectionState::Reconnecting).await;
        assert_eq!(status.reconnect_attempt, 1);
        assert_eq!(status.connection_error, None);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_delay() {
        let transport = Arc::new(FailingTransport::default());
        let client = StreamClient::spawn(config(Some("t")), transport.clone());
        client.connect();
        wait(&client, |s| s.reconnect_pending).await;

        client.disconnect();
        let status = wait(&client, |s| s.state == ConnectionState::Disconnected).await;
        assert!(!status.reconnect_pending);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(client.status().state, ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_without_credential_does_nothing() {
        let transport = Arc::new(FailingTransport::default());
        let client = StreamClient::spawn(config(None), transport.clone());
        client.connect();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(client.status().state, ConnectionState::Disconnected);
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 0);

        client.set_credential(Some("t".to_string()));
        client.connect();
        wait(&client, |s| s.reconnect_pending).await;
        assert_eq!(transport.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn routes_frames_and_survives_garbage() {
        let transport = Arc::new(PipeTransport::default());
        let tx = transport.push();
        let client = StreamClient::spawn(config(Some("t")), transport.clone());
        let mut notifications = client.subscribe();

        client.connect();
        wait(&client, |s| s.is_connected()).await;

        tx.send(r#"{"type":"connected","message":"hello"}"#.to_string()).unwrap();
        tx.send("{oops".to_string()).unwrap();
        tx.send(r#"{"type":"typing","user":"u2"}"#.to_string()).unwrap();
        tx.send(r#"{"type":"heartbeat","timestamp":"2026-03-02T09:00:00Z"}"#.to_string()).unwrap();
        tx.send(
            r#"{"type":"notification","notification":{"id":"n9","userId":"u1","type":"general","message":"hi","isRead":false,"createdAt":"2026-03-02T09:00:01Z"}}"#
                .to_string(),
        )
        .unwrap();

        let record = notifications.recv().await.unwrap();
        assert_eq!(record.id, "n9");
        let status = wait(&client, |s| s.last_heartbeat.is_some()).await;
        assert!(status.is_connected());
        assert_eq!(status.reconnect_attempt, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_channel_is_reopened_after_base_delay() {
        let transport = Arc::new(PipeTransport::default());
        let _second = transport.push();
        let first = transport.push();
        let client = StreamClient::spawn(config(Some("t")), transport.clone());

        client.connect();
        wait(&client, |s| s.is_connected()).await;
        let started = Instant::now();
        drop(first);

        let status = wait(&client, |s| s.state == ConnectionState::Reconnecting).await;
        assert_eq!(status.reconnect_attempt, 1);
        let status = wait(&client, |s| s.is_connected()).await;
        assert_eq!(status.reconnect_attempt, 0);
        assert!(started.elapsed() >= Duration::from_secs(1));
    }
}
