//! Wiring for a running pair of actors.
//!
//! A [`Session`] creates both mailboxes under one [`CancellationToken`],
//! spawns the [`ConnectionActor`] and [`PresentationActor`] on the tokio
//! runtime, and gives the UI layer a handle to feed them.
//!
//! ```no_run
//! use hrmon_core::{ActorConfig, Session, mock::MockBluetooth};
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main]
//! # async fn main() -> hrmon_core::Result<()> {
//! let (view, mut states) = mpsc::unbounded_channel();
//! let session = Session::spawn(MockBluetooth::new(), view, ActorConfig::default())?;
//!
//! session.press();
//! while let Some(state) = states.recv().await {
//!     println!("{}", state.label);
//! #   break;
//! }
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::connection::{ActorConfig, ConnectionActor};
use crate::error::Result;
use crate::mailbox::{MailboxSender, mailbox_with_token};
use crate::messages::{Intent, PresentationMessage};
use crate::presentation::{PresentationActor, View};
use crate::traits::Bluetooth;

/// Handle to a running pair of actors.
#[derive(Debug)]
pub struct Session {
    presentation: MailboxSender<PresentationMessage>,
    token: CancellationToken,
    connection_task: JoinHandle<()>,
    presentation_task: JoinHandle<()>,
}

impl Session {
    /// Spawn both actors.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<B, V>(bluetooth: B, view: V, config: ActorConfig) -> Result<Self>
    where
        B: Bluetooth,
        V: View,
    {
        config.validate()?;

        let token = CancellationToken::new();
        let (connection_inbox, connection_tx) = mailbox_with_token(token.child_token());
        let (presentation_inbox, presentation_tx) = mailbox_with_token(token.child_token());

        let connection = ConnectionActor::new(
            bluetooth,
            connection_inbox,
            presentation_tx.clone(),
            config,
        );
        let presentation = PresentationActor::new(presentation_inbox, connection_tx, view);

        let connection_task = tokio::spawn(connection.run());
        let presentation_task = tokio::spawn(presentation.run());
        info!("Session started");

        Ok(Self {
            presentation: presentation_tx,
            token,
            connection_task,
            presentation_task,
        })
    }

    /// Submit an intent, as if from a UI control.
    pub fn submit(&self, intent: Intent) -> bool {
        self.presentation.push(PresentationMessage::Submit(intent))
    }

    /// Press the action button.
    pub fn press(&self) -> bool {
        self.presentation.push(PresentationMessage::Press)
    }

    /// Whether the session has been shut down.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A token cancelled when the session shuts down.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Close both mailboxes and wait for the actors to stop.
    ///
    /// An operation already in flight in the connection actor finishes (or
    /// times out) before the actor observes the closed mailbox.
    pub async fn shutdown(self) {
        self.token.cancel();
        for (name, task) in [
            ("connection", self.connection_task),
            ("presentation", self.presentation_task),
        ] {
            if let Err(e) = task.await {
                warn!(actor = name, error = %e, "Actor task failed");
            }
        }
        info!("Session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use crate::mock::MockBluetooth;
    use crate::presentation::{ActionLabel, PresentationState};

    async fn wait_for(
        states: &mut mpsc::UnboundedReceiver<PresentationState>,
        label: ActionLabel,
    ) -> PresentationState {
        loop {
            let state = states.recv().await.expect("view closed");
            if state.label == label && (!state.busy || label == ActionLabel::Initializing) {
                return state;
            }
        }
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let (view, _states) = mpsc::unbounded_channel();
        let config = ActorConfig::default().pair_timeout(Duration::ZERO);
        let err = Session::spawn(MockBluetooth::new(), view, config).unwrap_err();
        assert!(err.to_string().contains("pair_timeout"));
    }

    #[tokio::test]
    async fn test_press_pairs() {
        let mock = MockBluetooth::builder().name("Session HRM").build();
        let (view, mut states) = mpsc::unbounded_channel();
        let session = Session::spawn(mock.clone(), view, ActorConfig::default()).unwrap();

        wait_for(&mut states, ActionLabel::Pair).await;
        assert!(session.press());
        let state = wait_for(&mut states, ActionLabel::Connect).await;
        assert_eq!(state.device_name.as_deref(), Some("Session HRM"));

        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_inputs() {
        let (view, _states) = mpsc::unbounded_channel();
        let session = Session::spawn(MockBluetooth::new(), view, ActorConfig::default()).unwrap();
        let token = session.cancellation_token();
        assert!(!session.is_closed());

        session.shutdown().await;

        assert!(token.is_cancelled());
    }
}
