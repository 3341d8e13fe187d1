//! The presentation actor.
//!
//! [`PresentationActor`] owns everything the user sees: the action button
//! label, whether the button is busy, the paired device name, the latest
//! sample and the failure log. It consumes [`PresentationMessage`]s,
//! forwards intents to the connection actor, and hands a
//! [`PresentationState`] snapshot to a [`View`] after every change.
//!
//! The button walks through:
//!
//! ```text
//! Initializing… → Pair → Pairing… → Connect → Connecting… → Start → Starting… → Stop → Stopping…
//!                                      ▲                       ▲                            │
//!                                      └──── Disconnected      └────────── Stopped ─────────┘
//! ```

use std::fmt;

use time::OffsetDateTime;
use tokio::sync::mpsc;
use tracing::{debug, info};

use hrmon_types::HeartRateSample;

use crate::mailbox::{Mailbox, MailboxSender};
use crate::messages::{ConnectionMessage, Intent, Notification, PresentationMessage};

/// What the action button currently says.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionLabel {
    /// Waiting for the capability check.
    #[default]
    Initializing,
    Pair,
    Pairing,
    Connect,
    Connecting,
    Start,
    Starting,
    Stop,
    Stopping,
}

impl ActionLabel {
    /// The intent a press on this label submits, if the label is actionable.
    pub fn intent(self) -> Option<Intent> {
        match self {
            ActionLabel::Pair => Some(Intent::Pair),
            ActionLabel::Connect => Some(Intent::Connect),
            ActionLabel::Start => Some(Intent::Start),
            ActionLabel::Stop => Some(Intent::Stop),
            ActionLabel::Initializing
            | ActionLabel::Pairing
            | ActionLabel::Connecting
            | ActionLabel::Starting
            | ActionLabel::Stopping => None,
        }
    }

    /// The label shown while `intent` is in flight.
    pub fn in_progress(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Pair => Some(ActionLabel::Pairing),
            Intent::Connect => Some(ActionLabel::Connecting),
            Intent::Start => Some(ActionLabel::Starting),
            Intent::Stop => Some(ActionLabel::Stopping),
            Intent::Disconnect => None,
        }
    }
}

impl fmt::Display for ActionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ActionLabel::Initializing => "Initializing…",
            ActionLabel::Pair => "Pair",
            ActionLabel::Pairing => "Pairing…",
            ActionLabel::Connect => "Connect",
            ActionLabel::Connecting => "Connecting…",
            ActionLabel::Start => "Start",
            ActionLabel::Starting => "Starting…",
            ActionLabel::Stop => "Stop",
            ActionLabel::Stopping => "Stopping…",
        };
        f.write_str(text)
    }
}

/// Which step a failure log entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Init,
    Pair,
    Connect,
    Start,
    Stop,
    Decode,
}

impl FailureKind {
    /// The kind logged when `intent` fails.
    pub fn for_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::Pair => Some(FailureKind::Pair),
            Intent::Connect => Some(FailureKind::Connect),
            Intent::Start => Some(FailureKind::Start),
            Intent::Stop => Some(FailureKind::Stop),
            Intent::Disconnect => None,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureKind::Init => "init",
            FailureKind::Pair => "pair",
            FailureKind::Connect => "connect",
            FailureKind::Start => "start",
            FailureKind::Stop => "stop",
            FailureKind::Decode => "decode",
        };
        f.write_str(text)
    }
}

/// One entry in the failure log.
#[derive(Debug, Clone, PartialEq)]
pub struct FailureEntry {
    /// When the failure was recorded.
    pub at: OffsetDateTime,
    pub kind: FailureKind,
    /// Human-readable cause from the connection actor.
    pub cause: String,
}

impl fmt::Display for FailureEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.kind, self.cause)
    }
}

/// Snapshot handed to the [`View`].
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationState {
    pub label: ActionLabel,
    /// The button ignores input while set.
    pub busy: bool,
    /// Name of the paired sensor.
    pub device_name: Option<String>,
    /// Most recent decoded measurement.
    pub latest: Option<HeartRateSample>,
    /// Number of samples received; advances even when a sample repeats.
    pub samples: u64,
    /// Every failure reported so far, oldest first.
    pub failures: Vec<FailureEntry>,
}

impl Default for PresentationState {
    fn default() -> Self {
        Self {
            label: ActionLabel::Initializing,
            busy: true,
            device_name: None,
            latest: None,
            samples: 0,
            failures: Vec::new(),
        }
    }
}

/// Renders presentation state to the user.
pub trait View: Send + 'static {
    /// Called once at start and after every state change.
    fn render(&mut self, state: &PresentationState);
}

impl View for mpsc::UnboundedSender<PresentationState> {
    fn render(&mut self, state: &PresentationState) {
        if self.send(state.clone()).is_err() {
            debug!("View receiver dropped");
        }
    }
}

/// Actor that owns presentation state and forwards user intents.
pub struct PresentationActor<V: View> {
    mailbox: Mailbox<PresentationMessage>,
    connection: MailboxSender<ConnectionMessage>,
    view: V,
    state: PresentationState,
    /// The intent in flight and the label to restore if it fails.
    pending: Option<(Intent, ActionLabel)>,
}

impl<V: View> fmt::Debug for PresentationActor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationActor")
            .field("state", &self.state)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl<V: View> PresentationActor<V> {
    /// Create an actor consuming `mailbox` and forwarding to `connection`.
    pub fn new(
        mailbox: Mailbox<PresentationMessage>,
        connection: MailboxSender<ConnectionMessage>,
        view: V,
    ) -> Self {
        Self {
            mailbox,
            connection,
            view,
            state: PresentationState::default(),
            pending: None,
        }
    }

    /// Current presentation state.
    pub fn state(&self) -> &PresentationState {
        &self.state
    }

    /// Run the actor until its mailbox is closed.
    pub async fn run(mut self) {
        info!("PresentationActor started");
        self.view.render(&self.state);

        while let Some(message) = self.mailbox.pop().await {
            if self.handle(message) {
                self.view.render(&self.state);
            }
        }

        debug!("Presentation mailbox closed");
        info!("PresentationActor stopped");
    }

    /// Apply one message. Returns whether the state changed.
    pub fn handle(&mut self, message: PresentationMessage) -> bool {
        match message {
            PresentationMessage::Notification(notification) => self.notify(notification),
            PresentationMessage::Submit(intent) => self.submit(intent),
            PresentationMessage::Press => match self.state.label.intent() {
                Some(intent) if !self.state.busy => self.submit(intent),
                _ => {
                    debug!(label = %self.state.label, "Ignoring press");
                    false
                }
            },
        }
    }

    fn submit(&mut self, intent: Intent) -> bool {
        let Some(in_progress) = ActionLabel::in_progress(intent) else {
            // Disconnect is not a button action; it never marks the button busy.
            self.forward(intent);
            return false;
        };
        if self.state.busy {
            debug!(%intent, label = %self.state.label, "Dropping intent while busy");
            return false;
        }

        self.pending = Some((intent, self.state.label));
        self.state.label = in_progress;
        self.state.busy = true;
        self.forward(intent);
        true
    }

    fn notify(&mut self, notification: Notification) -> bool {
        match notification {
            Notification::Initialized => {
                self.state.label = ActionLabel::Pair;
                self.state.busy = false;
            }
            Notification::InitFailed(cause) => {
                self.record(FailureKind::Init, cause);
            }
            Notification::Paired(name) => {
                self.state.device_name = Some(name);
                self.settle(Intent::Pair, ActionLabel::Connect);
            }
            Notification::Connected => self.settle(Intent::Connect, ActionLabel::Start),
            Notification::Started => self.settle(Intent::Start, ActionLabel::Stop),
            Notification::Stopped => self.settle(Intent::Stop, ActionLabel::Start),
            Notification::Disconnected => {
                self.pending = None;
                self.state.label = ActionLabel::Connect;
                self.state.busy = false;
            }
            Notification::PairFailed(cause) => self.revert(Intent::Pair, cause),
            Notification::ConnectFailed(cause) => self.revert(Intent::Connect, cause),
            Notification::StartFailed(cause) => self.revert(Intent::Start, cause),
            Notification::StopFailed(cause) => self.revert(Intent::Stop, cause),
            Notification::Sample(sample) => {
                self.state.latest = Some(sample);
                self.state.samples += 1;
            }
            Notification::DecodeFailed(cause) => {
                self.record(FailureKind::Decode, cause);
            }
        }
        true
    }

    fn settle(&mut self, intent: Intent, label: ActionLabel) {
        if self.pending.is_some_and(|(pending, _)| pending == intent) {
            self.pending = None;
        }
        self.state.label = label;
        self.state.busy = self.pending.is_some();
    }

    fn revert(&mut self, intent: Intent, cause: String) {
        if let Some(kind) = FailureKind::for_intent(intent) {
            self.record(kind, cause);
        }
        match self.pending {
            Some((pending, previous)) if pending == intent => {
                self.pending = None;
                self.state.label = previous;
                self.state.busy = false;
            }
            _ => debug!(%intent, "Failure for an intent that is not pending"),
        }
    }

    fn record(&mut self, kind: FailureKind, cause: String) {
        debug!(%kind, %cause, "Recording failure");
        self.state.failures.push(FailureEntry {
            at: OffsetDateTime::now_utc(),
            kind,
            cause,
        });
    }

    fn forward(&self, intent: Intent) {
        if !self.connection.push(intent.into()) {
            debug!(%intent, "Connection mailbox closed, dropping intent");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::mailbox;

    struct NullView;

    impl View for NullView {
        fn render(&mut self, _state: &PresentationState) {}
    }

    fn actor() -> (PresentationActor<NullView>, Mailbox<ConnectionMessage>) {
        let (inbox, _tx) = mailbox();
        let (connection, connection_tx) = mailbox();
        (PresentationActor::new(inbox, connection_tx, NullView), connection)
    }

    fn ready() -> (PresentationActor<NullView>, Mailbox<ConnectionMessage>) {
        let (mut actor, connection) = actor();
        actor.handle(Notification::Initialized.into());
        (actor, connection)
    }

    #[test]
    fn test_label_display() {
        assert_eq!(ActionLabel::Initializing.to_string(), "Initializing…");
        assert_eq!(ActionLabel::Connect.to_string(), "Connect");
        assert_eq!(ActionLabel::Stopping.to_string(), "Stopping…");
    }

    #[test]
    fn test_label_intents() {
        assert_eq!(ActionLabel::Pair.intent(), Some(Intent::Pair));
        assert_eq!(ActionLabel::Stop.intent(), Some(Intent::Stop));
        assert_eq!(ActionLabel::Pairing.intent(), None);
        assert_eq!(ActionLabel::Initializing.intent(), None);
        assert_eq!(ActionLabel::in_progress(Intent::Start), Some(ActionLabel::Starting));
        assert_eq!(ActionLabel::in_progress(Intent::Disconnect), None);
    }

    #[test]
    fn test_initial_state_is_busy() {
        let (actor, _) = actor();
        assert_eq!(actor.state().label, ActionLabel::Initializing);
        assert!(actor.state().busy);
    }

    #[test]
    fn test_happy_path_labels() {
        let (mut actor, mut connection) = ready();
        let mut labels = vec![actor.state().label];

        let steps: Vec<PresentationMessage> = vec![
            PresentationMessage::Press,
            Notification::Paired("HRM".to_string()).into(),
            PresentationMessage::Press,
            Notification::Connected.into(),
            PresentationMessage::Press,
            Notification::Started.into(),
            PresentationMessage::Press,
            Notification::Stopped.into(),
        ];
        for step in steps {
            actor.handle(step);
            labels.push(actor.state().label);
        }

        assert_eq!(
            labels,
            vec![
                ActionLabel::Pair,
                ActionLabel::Pairing,
                ActionLabel::Connect,
                ActionLabel::Connecting,
                ActionLabel::Start,
                ActionLabel::Starting,
                ActionLabel::Stop,
                ActionLabel::Stopping,
                ActionLabel::Start,
            ]
        );
        assert!(!actor.state().busy);
        assert_eq!(actor.state().device_name.as_deref(), Some("HRM"));

        let forwarded: Vec<ConnectionMessage> =
            std::iter::from_fn(|| connection.try_pop()).collect();
        let expected: Vec<ConnectionMessage> = [
            Intent::Pair,
            Intent::Connect,
            Intent::Start,
            Intent::Stop,
        ]
        .into_iter()
        .map(ConnectionMessage::from)
        .collect();
        assert_eq!(forwarded, expected);
    }

    #[test]
    fn test_submit_while_busy_is_dropped() {
        let (mut actor, mut connection) = ready();
        assert!(actor.handle(Intent::Pair.into()));
        assert!(!actor.handle(Intent::Pair.into()));
        assert!(!actor.handle(PresentationMessage::Press));

        assert_eq!(connection.try_pop(), Some(Intent::Pair.into()));
        assert_eq!(connection.try_pop(), None);
        assert_eq!(actor.state().label, ActionLabel::Pairing);
    }

    #[test]
    fn test_press_while_initializing_is_ignored() {
        let (mut actor, mut connection) = actor();
        assert!(!actor.handle(PresentationMessage::Press));
        assert!(connection.try_pop().is_none());
    }

    #[test]
    fn test_failure_reverts_label_and_logs() {
        let (mut actor, _connection) = ready();
        actor.handle(PresentationMessage::Press);
        actor.handle(Notification::PairFailed("User cancelled".to_string()).into());

        let state = actor.state();
        assert_eq!(state.label, ActionLabel::Pair);
        assert!(!state.busy);
        assert_eq!(state.failures.len(), 1);
        assert_eq!(state.failures[0].kind, FailureKind::Pair);
        assert_eq!(state.failures[0].to_string(), "pair failed: User cancelled");
    }

    #[test]
    fn test_failure_reverts_to_label_before_submission() {
        let (mut actor, _connection) = ready();
        // A Start submitted while the button says Pair reverts to Pair.
        actor.handle(Intent::Start.into());
        assert_eq!(actor.state().label, ActionLabel::Starting);
        actor.handle(Notification::StartFailed("Cannot start while idle".to_string()).into());
        assert_eq!(actor.state().label, ActionLabel::Pair);
    }

    #[test]
    fn test_init_failure_keeps_initializing() {
        let (mut actor, _connection) = actor();
        actor.handle(Notification::InitFailed("no adapter".to_string()).into());

        let state = actor.state();
        assert_eq!(state.label, ActionLabel::Initializing);
        assert!(state.busy);
        assert_eq!(state.failures[0].kind, FailureKind::Init);
    }

    #[test]
    fn test_disconnected_returns_to_connect() {
        let (mut actor, _connection) = ready();
        for message in [
            PresentationMessage::Press,
            Notification::Paired("HRM".to_string()).into(),
            PresentationMessage::Press,
            Notification::Connected.into(),
            PresentationMessage::Press,
            Notification::Started.into(),
        ] {
            actor.handle(message);
        }
        actor.handle(Notification::Disconnected.into());

        assert_eq!(actor.state().label, ActionLabel::Connect);
        assert!(!actor.state().busy);
        assert_eq!(actor.state().device_name.as_deref(), Some("HRM"));
    }

    #[test]
    fn test_disconnect_forwarded_without_busy() {
        let (mut actor, mut connection) = ready();
        assert!(!actor.handle(Intent::Disconnect.into()));
        assert!(!actor.state().busy);
        assert_eq!(connection.try_pop(), Some(Intent::Disconnect.into()));
    }

    #[test]
    fn test_samples_and_decode_failures() {
        let (mut actor, _connection) = ready();
        actor.handle(Notification::Sample(HeartRateSample::new(61)).into());
        actor.handle(Notification::Sample(HeartRateSample::new(62)).into());
        actor.handle(Notification::DecodeFailed("Truncated frame".to_string()).into());

        let state = actor.state();
        assert_eq!(state.latest.as_ref().map(|s| s.bpm), Some(62));
        assert_eq!(state.samples, 2);
        assert_eq!(state.failures.len(), 1);
        assert_eq!(state.failures[0].kind, FailureKind::Decode);
        assert_eq!(state.label, ActionLabel::Pair);
    }

    #[tokio::test]
    async fn test_run_renders_every_change() {
        let (inbox, tx) = mailbox();
        let (_connection, connection_tx) = mailbox::<ConnectionMessage>();
        let (view, mut rendered) = mpsc::unbounded_channel();
        let task = tokio::spawn(PresentationActor::new(inbox, connection_tx, view).run());

        tx.push(Notification::Initialized.into());
        tx.push(PresentationMessage::Press);

        let first = rendered.recv().await.unwrap();
        assert_eq!(first.label, ActionLabel::Initializing);
        assert_eq!(rendered.recv().await.unwrap().label, ActionLabel::Pair);
        assert_eq!(rendered.recv().await.unwrap().label, ActionLabel::Pairing);

        tx.close();
        task.await.unwrap();
    }
}
