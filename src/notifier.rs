//! Best-effort notification dispatcher
//!
//! Notices are queued by session workers and delivered by one background
//! task. A full queue or a failed delivery is logged and dropped; the
//! sender never waits.

use crate::access::ParticipantId;
use crate::runtime::ChatOutlet;
use crate::state_machine::Prompt;
use tokio::sync::mpsc;

/// Queue depth before notices are dropped
const QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTarget {
    /// The configured owner
    Owner,
    Participant(ParticipantId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub target: NoticeTarget,
    pub prompt: Prompt,
}

impl Notice {
    pub fn owner(prompt: Prompt) -> Self {
        Self {
            target: NoticeTarget::Owner,
            prompt,
        }
    }

    pub fn participant(participant: ParticipantId, prompt: Prompt) -> Self {
        Self {
            target: NoticeTarget::Participant(participant),
            prompt,
        }
    }
}

/// Sending side of the notification queue
#[derive(Debug, Clone)]
pub struct NotifierHandle {
    tx: mpsc::Sender<Notice>,
}

impl NotifierHandle {
    /// Queue without waiting
    pub fn enqueue(&self, notice: Notice) {
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(notice)) => {
                tracing::warn!(target_kind = ?notice.target, "Notification queue full, dropping notice");
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                tracing::error!(target_kind = ?notice.target, "Notifier stopped, dropping notice");
            }
        }
    }

    /// Handle plus the receiving end, for driving the queue by hand
    #[cfg(test)]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Notice>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

/// Background delivery task
pub struct Notifier<O> {
    outlet: O,
    owner: ParticipantId,
    rx: mpsc::Receiver<Notice>,
}

impl<O: ChatOutlet + 'static> Notifier<O> {
    /// Start the delivery task. It stops once every handle is dropped and
    /// the queue is drained.
    pub fn spawn(outlet: O, owner: ParticipantId) -> NotifierHandle {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let notifier = Self { outlet, owner, rx };
        tokio::spawn(notifier.run());
        NotifierHandle { tx }
    }

    async fn run(mut self) {
        tracing::info!("Notifier started");
        while let Some(notice) = self.rx.recv().await {
            let recipient = match notice.target {
                NoticeTarget::Owner => self.owner,
                NoticeTarget::Participant(participant) => participant,
            };
            match self.outlet.send(recipient, &notice.prompt).await {
                Ok(_) => tracing::debug!(recipient = %recipient, "Notice delivered"),
                Err(e) => {
                    tracing::warn!(recipient = %recipient, error = %e, "Notice delivery failed");
                }
            }
        }
        tracing::info!("Notifier stopped");
    }
}
