//! Session task: single-owner event loop for one chat session.
//!
//! Every state transition happens on this one task, driven by commands from
//! the handle, inbound link events, and at most one reconnect timer. No two
//! handlers ever run concurrently against the same session's state.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Sleep;
use tracing::{debug, info, warn};

use colloquy_common::{new_client_id, ChatError, Notice};

use crate::config::ChatConfig;
use crate::conversation::{Conversation, Message};
use crate::protocol::{self, ClientIntent, ServerEvent, ToolDescriptor};
use crate::registry::ToolRegistry;

use super::client::ConnectionState;
use super::transport::{LinkEvent, Transport, TransportLink};

pub(crate) enum Command {
    Connect,
    Send {
        text: String,
        ack: oneshot::Sender<Result<(), ChatError>>,
    },
    Disconnect,
}

pub(crate) struct SessionTask {
    config: ChatConfig,
    transport: Arc<dyn Transport>,
    state_tx: watch::Sender<ConnectionState>,
    notice_tx: mpsc::Sender<Notice>,
    registry: ToolRegistry,
    conversation: Conversation,
    /// Reconnect attempts consumed since the last successful open.
    attempts: u32,
    /// Latch so exhaustion is surfaced once per failure run, not once per
    /// exhausted attempt.
    exhausted_notified: bool,
    /// One outstanding reply at a time; a second send is rejected while
    /// this is set.
    awaiting_reply: bool,
}

impl SessionTask {
    pub(crate) fn new(
        config: ChatConfig,
        transport: Arc<dyn Transport>,
        state_tx: watch::Sender<ConnectionState>,
        notice_tx: mpsc::Sender<Notice>,
    ) -> Self {
        Self {
            config,
            transport,
            state_tx,
            notice_tx,
            registry: ToolRegistry::new(),
            conversation: Conversation::new(),
            attempts: 0,
            exhausted_notified: false,
            awaiting_reply: false,
        }
    }

    pub(crate) fn subscribe_messages(&self) -> watch::Receiver<Vec<Message>> {
        self.conversation.subscribe()
    }

    pub(crate) fn subscribe_tools(&self) -> watch::Receiver<Vec<ToolDescriptor>> {
        self.registry.subscribe()
    }

    pub(crate) async fn run(mut self, mut command_rx: mpsc::Receiver<Command>) {
        let mut link: Option<Box<dyn TransportLink>> = None;
        let mut reconnect: Option<Pin<Box<Sleep>>> = None;

        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Connect) => {
                        self.handle_connect(&mut link, &mut reconnect, &mut command_rx, true)
                            .await;
                    }
                    Some(Command::Send { text, ack }) => {
                        let result = self.handle_send(&mut link, &mut reconnect, text).await;
                        let _ = ack.send(result);
                    }
                    Some(Command::Disconnect) => {
                        self.handle_disconnect(&mut link, &mut reconnect).await;
                    }
                    None => {
                        // Every handle dropped; tear down and exit.
                        self.handle_disconnect(&mut link, &mut reconnect).await;
                        return;
                    }
                },

                event = async {
                    match link.as_mut() {
                        Some(active) => active.next_event().await,
                        None => std::future::pending().await,
                    }
                }, if link.is_some() => {
                    self.handle_link_event(&mut link, &mut reconnect, event).await;
                }

                _ = async {
                    match reconnect.as_mut() {
                        Some(timer) => timer.await,
                        None => std::future::pending().await,
                    }
                }, if reconnect.is_some() => {
                    reconnect = None;
                    self.handle_connect(&mut link, &mut reconnect, &mut command_rx, false)
                        .await;
                }
            }
        }
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ConnectionState) {
        let _ = self.state_tx.send(state);
    }

    /// Open a new link. `manual` distinguishes a user-initiated connect from
    /// the reconnect timer firing: a manual connect gets a fresh attempt
    /// budget and clears any pending timer.
    async fn handle_connect(
        &mut self,
        link: &mut Option<Box<dyn TransportLink>>,
        reconnect: &mut Option<Pin<Box<Sleep>>>,
        command_rx: &mut mpsc::Receiver<Command>,
        manual: bool,
    ) {
        if matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            debug!("connect ignored: attempt already in flight");
            return;
        }
        if manual {
            *reconnect = None;
            self.attempts = 0;
            self.exhausted_notified = false;
        }

        let client_id = new_client_id();
        let url = self.config.ws_url(&client_id);
        self.set_state(ConnectionState::Connecting);
        info!(url = %url, "Connecting to agent backend");

        // Keep serving commands while the open is in flight so an explicit
        // disconnect can abort the attempt. The transport handle is cloned
        // out so the pending open does not hold a borrow of the task.
        let transport = self.transport.clone();
        let open = transport.open(&url);
        tokio::pin!(open);
        let outcome = loop {
            tokio::select! {
                result = &mut open => break Some(result),
                cmd = command_rx.recv() => match cmd {
                    Some(Command::Disconnect) | None => break None,
                    Some(Command::Send { ack, .. }) => {
                        let _ = ack.send(Err(ChatError::NotConnected));
                    }
                    Some(Command::Connect) => {}
                },
            }
        };

        let Some(result) = outcome else {
            // The open future is dropped with the attempt; nothing may
            // reconnect on its behalf.
            *reconnect = None;
            self.attempts = 0;
            self.set_state(ConnectionState::Closed);
            info!("Connect aborted by disconnect");
            return;
        };

        match result {
            Ok(mut new_link) => {
                self.attempts = 0;
                self.exhausted_notified = false;
                // Request each configured upstream provider.
                let providers = self.config.providers.clone();
                for provider in providers {
                    let intent = ClientIntent::Connect {
                        server: provider.clone(),
                    };
                    if let Err(e) = new_link.send(intent.encode()).await {
                        warn!(provider = %provider, error = %e, "Provider request failed");
                        self.on_closed(link, reconnect, false).await;
                        return;
                    }
                    debug!(provider = %provider, "Requested upstream provider");
                }
                info!("Channel open");
                *link = Some(new_link);
                self.set_state(ConnectionState::Open);
            }
            Err(e) => {
                warn!(error = %e, "Failed to open channel");
                self.on_closed(link, reconnect, false).await;
            }
        }
    }

    async fn handle_send(
        &mut self,
        link: &mut Option<Box<dyn TransportLink>>,
        reconnect: &mut Option<Pin<Box<Sleep>>>,
        text: String,
    ) -> Result<(), ChatError> {
        match self.state() {
            ConnectionState::Open => {}
            ConnectionState::Failed => return Err(ChatError::ReconnectExhausted),
            _ => return Err(ChatError::NotConnected),
        }
        let Some(active) = link.as_mut() else {
            return Err(ChatError::NotConnected);
        };
        if self.awaiting_reply {
            return Err(ChatError::ReplyPending);
        }

        self.conversation.append_user(text.as_str());
        let intent = ClientIntent::AgentMessage {
            content: text,
            tools: self.registry.snapshot(),
        };
        match active.send(intent.encode()).await {
            Ok(()) => {
                self.conversation.append_placeholder();
                self.awaiting_reply = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Send failed");
                self.conversation
                    .append_error("Sorry, there was an error sending your message.");
                self.on_closed(link, reconnect, false).await;
                Err(ChatError::Transport(e))
            }
        }
    }

    async fn handle_disconnect(
        &mut self,
        link: &mut Option<Box<dyn TransportLink>>,
        reconnect: &mut Option<Pin<Box<Sleep>>>,
    ) {
        *reconnect = None;
        self.attempts = 0;
        if self.awaiting_reply {
            self.conversation
                .append_error("Disconnected before a reply arrived.");
            self.awaiting_reply = false;
        }
        if let Some(mut active) = link.take() {
            self.set_state(ConnectionState::Closing);
            active.close().await;
        }
        if self.state() != ConnectionState::Closed {
            self.set_state(ConnectionState::Closed);
            info!("Disconnected");
        }
    }

    async fn handle_link_event(
        &mut self,
        link: &mut Option<Box<dyn TransportLink>>,
        reconnect: &mut Option<Pin<Box<Sleep>>>,
        event: LinkEvent,
    ) {
        match event {
            LinkEvent::Frame(text) => {
                if let Some(event) = protocol::decode_frame(&text) {
                    self.handle_server_event(event).await;
                }
            }
            LinkEvent::Closed { clean } => self.on_closed(link, reconnect, clean).await,
        }
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ConnectionEstablished => {
                debug!("Backend acknowledged the connection");
            }
            ServerEvent::Tools(tools) => {
                debug!(count = tools.len(), "Provider advertised tools");
                self.registry.ingest(tools);
                let summary = self
                    .registry
                    .by_category()
                    .into_iter()
                    .map(|(category, members)| {
                        let names: Vec<_> =
                            members.iter().map(|t| t.name.clone()).collect();
                        format!("{category}: {}", names.join(", "))
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                let _ = self
                    .notice_tx
                    .send(Notice::info("Available Tools", summary))
                    .await;
            }
            ServerEvent::Response { content } => {
                self.conversation.append_assistant(content);
                self.awaiting_reply = false;
            }
            ServerEvent::Error { message } => {
                warn!(error = %message, "Backend reported an error");
                let _ = self
                    .notice_tx
                    .send(Notice::error("Server error", message))
                    .await;
            }
        }
    }

    /// The only place reconnects are scheduled, so an error followed by a
    /// close can never double-schedule.
    async fn on_closed(
        &mut self,
        link: &mut Option<Box<dyn TransportLink>>,
        reconnect: &mut Option<Pin<Box<Sleep>>>,
        clean: bool,
    ) {
        *link = None;
        if self.awaiting_reply {
            // Never let a placeholder survive the link it was waiting on.
            self.conversation
                .append_error("Connection lost before a reply arrived.");
            self.awaiting_reply = false;
        }

        if clean {
            self.set_state(ConnectionState::Closed);
            info!("Channel closed cleanly");
            return;
        }

        if self.attempts < self.config.reconnect.max_attempts {
            self.attempts += 1;
            self.set_state(ConnectionState::Closed);
            info!(
                attempt = self.attempts,
                max = self.config.reconnect.max_attempts,
                delay_ms = self.config.reconnect.delay_ms,
                "Channel lost, scheduling reconnect"
            );
            *reconnect = Some(Box::pin(tokio::time::sleep(Duration::from_millis(
                self.config.reconnect.delay_ms,
            ))));
        } else {
            self.set_state(ConnectionState::Failed);
            warn!("Reconnect attempts exhausted");
            if !self.exhausted_notified {
                self.exhausted_notified = true;
                let _ = self
                    .notice_tx
                    .send(Notice::error(
                        "Connection failed",
                        "Failed to connect to the agent backend after multiple attempts. \
                         Please try again later.",
                    ))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use colloquy_common::{NoticeLevel, TransportError};

    use crate::conversation::{Role, PLACEHOLDER_CONTENT};
    use crate::protocol::ToolSchema;

    use super::super::client::ChatClient;
    use super::*;

    /// Transport whose open outcomes follow a script; successful opens hand
    /// the test a probe for injecting events and inspecting writes.
    #[derive(Clone)]
    struct ScriptedTransport(Arc<ScriptedInner>);

    struct ScriptedInner {
        script: Mutex<VecDeque<bool>>,
        probes: Mutex<Vec<LinkProbe>>,
        opens: AtomicU32,
    }

    #[derive(Clone)]
    struct LinkProbe {
        events: mpsc::UnboundedSender<LinkEvent>,
        written: Arc<Mutex<Vec<String>>>,
    }

    impl LinkProbe {
        fn emit(&self, event: LinkEvent) {
            let _ = self.events.send(event);
        }

        fn written(&self) -> Vec<String> {
            self.written.lock().unwrap().clone()
        }
    }

    struct ScriptedLink {
        events_rx: mpsc::UnboundedReceiver<LinkEvent>,
        written: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl TransportLink for ScriptedLink {
        async fn send(&mut self, text: String) -> Result<(), TransportError> {
            self.written.lock().unwrap().push(text);
            Ok(())
        }

        async fn next_event(&mut self) -> LinkEvent {
            match self.events_rx.recv().await {
                Some(event) => event,
                None => std::future::pending().await,
            }
        }

        async fn close(&mut self) {}
    }

    impl ScriptedTransport {
        fn with_script(outcomes: &[bool]) -> Self {
            Self(Arc::new(ScriptedInner {
                script: Mutex::new(outcomes.iter().copied().collect()),
                probes: Mutex::new(Vec::new()),
                opens: AtomicU32::new(0),
            }))
        }

        fn always_fail() -> Self {
            Self(Arc::new(ScriptedInner {
                script: Mutex::new(VecDeque::new()),
                probes: Mutex::new(Vec::new()),
                opens: AtomicU32::new(0),
            }))
        }

        fn open_count(&self) -> u32 {
            self.0.opens.load(Ordering::SeqCst)
        }

        fn probe(&self, index: usize) -> LinkProbe {
            self.0.probes.lock().unwrap()[index].clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn open(&self, _url: &str) -> Result<Box<dyn TransportLink>, TransportError> {
            self.0.opens.fetch_add(1, Ordering::SeqCst);
            let succeed = self.0.script.lock().unwrap().pop_front().unwrap_or(false);
            if !succeed {
                return Err(TransportError::Connect("scripted failure".into()));
            }
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let written = Arc::new(Mutex::new(Vec::new()));
            self.0.probes.lock().unwrap().push(LinkProbe {
                events: events_tx,
                written: written.clone(),
            });
            Ok(Box::new(ScriptedLink { events_rx, written }))
        }
    }

    fn test_config() -> ChatConfig {
        let mut config = ChatConfig::default();
        config.providers = vec!["github".into(), "puppeteer".into()];
        config
    }

    async fn wait_for_state(
        rx: &mut watch::Receiver<ConnectionState>,
        wanted: ConnectionState,
    ) {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                if *rx.borrow() == wanted {
                    return;
                }
                rx.changed().await.expect("state watch closed");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("never reached {wanted:?}"));
    }

    async fn wait_for_messages(
        rx: &mut watch::Receiver<Vec<Message>>,
        pred: impl Fn(&[Message]) -> bool,
    ) -> Vec<Message> {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                if pred(&rx.borrow()) {
                    return rx.borrow().clone();
                }
                rx.changed().await.expect("message watch closed");
            }
        })
        .await
        .expect("conversation never reached expected shape")
    }

    fn response_frame(content: &str) -> LinkEvent {
        LinkEvent::Frame(format!(r#"{{"type":"response","content":"{content}"}}"#))
    }

    #[tokio::test(start_paused = true)]
    async fn open_requests_each_configured_provider() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        let written = transport.probe(0).written();
        let servers: Vec<String> = written
            .iter()
            .map(|frame| {
                let json: serde_json::Value = serde_json::from_str(frame).unwrap();
                assert_eq!(json["type"], "connect");
                json["server"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(servers, vec!["github", "puppeteer"]);
    }

    #[tokio::test(start_paused = true)]
    async fn send_is_gated_on_open_state() {
        let transport = ScriptedTransport::always_fail();
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        // Never connected: no transport write may happen.
        let err = client.send("hello").await.unwrap_err();
        assert!(matches!(err, ChatError::NotConnected));
        assert_eq!(transport.open_count(), 0);
        assert!(client.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn user_then_response_order_is_stable() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        client.send("what is the weather").await.unwrap();
        let mut messages_rx = client.subscribe_messages();
        let pending = wait_for_messages(&mut messages_rx, |m| m.len() == 2).await;
        assert_eq!(pending[0].role, Role::User);
        assert_eq!(pending[1].content, PLACEHOLDER_CONTENT);

        transport.probe(0).emit(response_frame("sunny"));
        let settled =
            wait_for_messages(&mut messages_rx, |m| m.len() == 2 && m[1].content == "sunny")
                .await;
        assert_eq!(settled[0].role, Role::User);
        assert_eq!(settled[1].role, Role::Assistant);
        assert!(!settled[1].error);

        // the submitted frame carried the (empty) tool snapshot
        let agent_frames: Vec<_> = transport
            .probe(0)
            .written()
            .into_iter()
            .filter(|f| f.contains("agent_message"))
            .collect();
        assert_eq!(agent_frames.len(), 1);
        let json: serde_json::Value = serde_json::from_str(&agent_frames[0]).unwrap();
        assert_eq!(json["content"], "what is the weather");
        assert!(json["tools"].as_array().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn second_send_rejected_while_reply_pending() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        client.send("first").await.unwrap();
        let err = client.send("second").await.unwrap_err();
        assert!(matches!(err, ChatError::ReplyPending));

        // the reply frees the slot again
        transport.probe(0).emit(response_frame("done"));
        let mut messages_rx = client.subscribe_messages();
        wait_for_messages(&mut messages_rx, |m| {
            m.iter().all(|msg| msg.content != PLACEHOLDER_CONTENT)
        })
        .await;
        client.send("second, again").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reconnects_then_one_exhaustion_notice() {
        let transport = ScriptedTransport::always_fail();
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Failed).await;

        // initial attempt plus exactly three scheduled reconnects
        assert_eq!(transport.open_count(), 4);

        let notice = tokio::time::timeout(Duration::from_secs(60), notices.recv())
            .await
            .expect("no exhaustion notice")
            .expect("notice channel closed");
        assert_eq!(notice.level, NoticeLevel::Error);

        // no further retries and no second notice, ever
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.open_count(), 4);
        assert!(notices.try_recv().is_err());
        assert_eq!(client.state(), ConnectionState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_counter_resets_after_successful_open() {
        // fail once, recover, then lose the link for good
        let transport = ScriptedTransport::with_script(&[false, true]);
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;
        assert_eq!(transport.open_count(), 2);

        transport.probe(0).emit(LinkEvent::Closed { clean: false });
        wait_for_state(&mut state_rx, ConnectionState::Failed).await;

        // the post-success failure run got its full budget of three attempts
        assert_eq!(transport.open_count(), 5);
        let notice = tokio::time::timeout(Duration::from_secs(60), notices.recv())
            .await
            .expect("no exhaustion notice")
            .expect("notice channel closed");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notices.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn clean_close_never_reconnects() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        transport.probe(0).emit(LinkEvent::Closed { clean: true });
        wait_for_state(&mut state_rx, ConnectionState::Closed).await;

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(transport.open_count(), 1);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_reconnect_and_is_idempotent() {
        let transport = ScriptedTransport::always_fail();
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        client.disconnect().await;
        client.disconnect().await;

        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Closed).await;

        // any timer armed by the aborted run must be dead
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(transport.open_count() <= 1);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn send_after_exhaustion_reports_the_terminal_state() {
        let transport = ScriptedTransport::always_fail();
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Failed).await;
        let _ = notices.recv().await;

        let err = client.send("anyone there").await.unwrap_err();
        assert!(matches!(err, ChatError::ReconnectExhausted));
        assert!(client.messages().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_connect_recovers_a_failed_session() {
        let transport = ScriptedTransport::with_script(&[false, false, false, false, true]);
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Failed).await;
        let _ = notices.recv().await;

        client.connect().await;
        wait_for_state(&mut state_rx, ConnectionState::Open).await;
        assert_eq!(transport.open_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn tools_frame_feeds_registry_and_notice() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        transport.probe(0).emit(LinkEvent::Frame(
            r#"{"type":"tools","tools":[
                {"name":"github.createIssue","description":"Create an issue","serverName":"github"},
                {"description":"missing name","serverName":"github"}
            ]}"#
            .into(),
        ));

        let mut tools_rx = client.subscribe_tools();
        let tools = tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                if !tools_rx.borrow().is_empty() {
                    return tools_rx.borrow().clone();
                }
                tools_rx.changed().await.expect("tools watch closed");
            }
        })
        .await
        .expect("registry never updated");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "github.createIssue");
        assert_eq!(tools[0].input_schema, ToolSchema::default());

        let notice = notices.recv().await.expect("no tools notice");
        assert_eq!(notice.level, NoticeLevel::Info);
        assert!(notice.body.contains("github.createIssue"));
    }

    #[tokio::test(start_paused = true)]
    async fn backend_error_is_a_notice_not_a_connection_fault() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, mut notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        transport.probe(0).emit(LinkEvent::Frame(
            r#"{"type":"error","message":"provider unavailable"}"#.into(),
        ));

        let notice = tokio::time::timeout(Duration::from_secs(60), notices.recv())
            .await
            .expect("no error notice")
            .expect("notice channel closed");
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.body, "provider unavailable");
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(transport.open_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_do_not_disturb_the_session() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        transport.probe(0).emit(LinkEvent::Frame("garbage".into()));
        transport
            .probe(0)
            .emit(LinkEvent::Frame(r#"{"type":"mystery"}"#.into()));
        transport.probe(0).emit(response_frame("still alive"));

        let mut messages_rx = client.subscribe_messages();
        let messages = wait_for_messages(&mut messages_rx, |m| !m.is_empty()).await;
        assert_eq!(messages[0].content, "still alive");
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn link_drop_resolves_the_pending_placeholder() {
        let transport = ScriptedTransport::with_script(&[true]);
        let (client, _notices) =
            ChatClient::with_transport(test_config(), Arc::new(transport.clone()));

        client.connect().await;
        let mut state_rx = client.subscribe_state();
        wait_for_state(&mut state_rx, ConnectionState::Open).await;

        client.send("anyone there").await.unwrap();
        transport.probe(0).emit(LinkEvent::Closed { clean: false });

        let mut messages_rx = client.subscribe_messages();
        let messages = wait_for_messages(&mut messages_rx, |m| {
            m.len() == 2 && m[1].content != PLACEHOLDER_CONTENT
        })
        .await;
        assert!(messages[1].error);
    }
}
