//! Update dispatch: a bounded queue between the webhook and the conversation
//! workers, and one sequential worker per conversation.
//!
//! Messages of one conversation are handled strictly in arrival order;
//! different conversations proceed concurrently. A worker that has been idle
//! for a while retires, and its successor waits for it to finish before
//! reading the conversation state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use teloxide::types::Update;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::session_store::ConversationId;

use super::message_handler::{ConversationFlow, IncomingMessage};

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Finished workers are pruned from the table every this many updates
const PRUNE_EVERY: u64 = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnqueueError {
    #[error("update queue is full")]
    Full,
    #[error("update queue is closed")]
    Closed,
}

/// Producer side of the bounded update queue
#[derive(Clone)]
pub struct UpdateQueue {
    sender: mpsc::Sender<Update>,
}

impl UpdateQueue {
    /// Enqueue without waiting; a full queue is reported, not awaited
    pub fn try_enqueue(&self, update: Update) -> Result<(), EnqueueError> {
        self.sender.try_send(update).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    pub fn capacity(&self) -> usize {
        self.sender.max_capacity()
    }
}

/// Create the update queue. A capacity of zero is raised to one.
pub fn update_queue(capacity: usize) -> (UpdateQueue, mpsc::Receiver<Update>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (UpdateQueue { sender }, receiver)
}

struct Worker {
    inbox: mpsc::UnboundedSender<IncomingMessage>,
    handle: JoinHandle<()>,
}

/// Routes queued updates to per-conversation workers
pub struct UpdateDispatcher {
    flow: Arc<ConversationFlow>,
    idle_timeout: Duration,
    workers: HashMap<ConversationId, Worker>,
    dispatched: u64,
}

impl UpdateDispatcher {
    pub fn new(flow: Arc<ConversationFlow>) -> Self {
        Self {
            flow,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            workers: HashMap::new(),
            dispatched: 0,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Consume the queue until every producer is gone, then wait for the
    /// workers to drain
    pub async fn run(mut self, mut updates: mpsc::Receiver<Update>) {
        info!("Update dispatcher started");
        while let Some(update) = updates.recv().await {
            self.dispatch(update);
        }
        info!(workers = self.workers.len(), "Update queue closed, draining workers");
        self.shutdown().await;
    }

    pub fn dispatch(&mut self, update: Update) {
        match IncomingMessage::from_update(&update) {
            Some(message) => self.route(message),
            None => debug!(update_id = update.id.0, "Skipping non-message update"),
        }
    }

    /// Hand a message to its conversation's worker, starting one if needed
    pub fn route(&mut self, message: IncomingMessage) {
        self.dispatched += 1;
        if self.dispatched % PRUNE_EVERY == 0 {
            self.prune_finished();
        }

        let chat_id = message.chat_id;
        let message = match self.workers.get(&chat_id) {
            Some(worker) => match worker.inbox.send(message) {
                Ok(()) => return,
                // The worker has retired; take the message back
                Err(mpsc::error::SendError(message)) => message,
            },
            None => message,
        };

        let predecessor = self.workers.remove(&chat_id).map(|worker| worker.handle);
        let (inbox, receiver) = mpsc::unbounded_channel();
        // Cannot fail: the receiver is alive until the worker task owns it
        let _ = inbox.send(message);

        let handle = tokio::spawn(run_worker(
            Arc::clone(&self.flow),
            chat_id,
            predecessor,
            receiver,
            self.idle_timeout,
        ));
        debug!(user_id = chat_id, "Started conversation worker");
        self.workers.insert(chat_id, Worker { inbox, handle });
    }

    /// Number of workers that have not finished yet
    pub fn active_workers(&self) -> usize {
        self.workers
            .values()
            .filter(|worker| !worker.handle.is_finished())
            .count()
    }

    fn prune_finished(&mut self) {
        let before = self.workers.len();
        self.workers.retain(|_, worker| !worker.handle.is_finished());
        let pruned = before - self.workers.len();
        if pruned > 0 {
            debug!(pruned, "Pruned finished conversation workers");
        }
    }

    /// Close every inbox and wait for the workers to finish what they hold
    pub async fn shutdown(&mut self) {
        let workers: Vec<_> = self.workers.drain().collect();
        for (chat_id, Worker { inbox, handle }) in workers {
            drop(inbox);
            if let Err(e) = handle.await {
                warn!(user_id = chat_id, error = %e, "Conversation worker ended abnormally");
            }
        }
    }
}

async fn run_worker(
    flow: Arc<ConversationFlow>,
    chat_id: ConversationId,
    predecessor: Option<JoinHandle<()>>,
    mut inbox: mpsc::UnboundedReceiver<IncomingMessage>,
    idle_timeout: Duration,
) {
    if let Some(predecessor) = predecessor {
        if let Err(e) = predecessor.await {
            warn!(user_id = chat_id, error = %e, "Previous conversation worker ended abnormally");
        }
    }

    let mut state = flow.initial_state(chat_id).await;

    loop {
        match tokio::time::timeout(idle_timeout, inbox.recv()).await {
            Ok(Some(message)) => state = flow.handle(state, message).await,
            Ok(None) => break,
            Err(_) => {
                // Refuse new messages, then finish the ones already queued
                inbox.close();
                while let Some(message) = inbox.recv().await {
                    state = flow.handle(state, message).await;
                }
                debug!(user_id = chat_id, state = ?state, "Conversation worker retired");
                break;
            }
        }
    }
}
