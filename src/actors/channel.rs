//! Named mailboxes and message delivery
//!
//! Actors address each other by [`ActorId`]. The [`Directory`] resolves a name
//! to the sending half of that actor's mailbox; the receiving half is the
//! actor's private [`Mailbox`].
//!
//! ## Delivery guarantees
//!
//! - One unbounded FIFO queue per receiver, so messages from one sender to one
//!   receiver arrive in send order
//! - [`Mailbox::receive_from`] waits for a message from one specific sender;
//!   anything else that arrives meanwhile is deferred, not dropped, and handed
//!   out later by [`Mailbox::receive`] / [`Mailbox::try_receive`] in arrival order
//! - No timeouts: a receive that is never satisfied suspends forever

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::trace;

use super::messages::{ActorId, Message, Performative};

/// Result type alias for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors that can occur while delivering messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// No actor is registered under this name
    UnknownReceiver(ActorId),

    /// The receiving actor has stopped
    ReceiverClosed(ActorId),

    /// The name is already taken
    DuplicateName(ActorId),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::UnknownReceiver(name) => write!(f, "no actor named '{}'", name),
            ChannelError::ReceiverClosed(name) => write!(f, "actor '{}' has stopped", name),
            ChannelError::DuplicateName(name) => {
                write!(f, "actor name '{}' is already registered", name)
            }
        }
    }
}

impl std::error::Error for ChannelError {}

/// Name service mapping actor names to their inboxes
///
/// Cheap to clone; all clones share the same registry.
#[derive(Clone, Default)]
pub struct Directory {
    routes: Arc<RwLock<HashMap<ActorId, UnboundedSender<Message>>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a name and return the mailbox that receives its messages
    pub fn register(&self, name: impl Into<ActorId>) -> ChannelResult<Mailbox> {
        let name = name.into();
        let mut routes = self.routes.write().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = routes.get(&name) {
            if !existing.is_closed() {
                return Err(ChannelError::DuplicateName(name));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        routes.insert(name.clone(), tx);
        trace!(actor = %name, "registered mailbox");

        Ok(Mailbox {
            owner: name,
            rx,
            deferred: VecDeque::new(),
        })
    }

    /// Whether a live actor is registered under `name`
    pub fn contains(&self, name: &ActorId) -> bool {
        self.routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Deliver a message to its receiver's mailbox
    pub fn send(&self, message: Message) -> ChannelResult<()> {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        let receiver = message.receiver().clone();

        let Some(tx) = routes.get(&receiver) else {
            return Err(ChannelError::UnknownReceiver(receiver));
        };

        trace!(
            from = %message.sender(),
            to = %receiver,
            performative = ?message.performative(),
            "delivering message"
        );

        tx.send(message)
            .map_err(|_| ChannelError::ReceiverClosed(receiver))
    }

    /// Sending side for the actor called `name`
    pub fn courier(&self, name: impl Into<ActorId>) -> Courier {
        Courier {
            me: name.into(),
            directory: self.clone(),
        }
    }
}

impl fmt::Debug for Directory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let routes = self.routes.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Directory")
            .field("actors", &routes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Sends messages on behalf of one actor
#[derive(Debug, Clone)]
pub struct Courier {
    me: ActorId,
    directory: Directory,
}

impl Courier {
    /// Name of the actor this courier sends for
    pub fn id(&self) -> &ActorId {
        &self.me
    }

    /// Send a new message to `receiver`
    pub fn send(
        &self,
        receiver: &ActorId,
        performative: Performative,
        content: impl Into<String>,
    ) -> ChannelResult<()> {
        self.directory.send(Message::new(
            self.me.clone(),
            receiver.clone(),
            performative,
            content,
        ))
    }

    /// Reply to a message this actor received
    pub fn reply(
        &self,
        to: &Message,
        performative: Performative,
        content: impl Into<String>,
    ) -> ChannelResult<()> {
        self.directory.send(to.reply(performative, content))
    }
}

/// Receiving side of an actor's inbox
#[derive(Debug)]
pub struct Mailbox {
    owner: ActorId,
    rx: UnboundedReceiver<Message>,
    deferred: VecDeque<Message>,
}

impl Mailbox {
    /// Name this mailbox is registered under
    pub fn owner(&self) -> &ActorId {
        &self.owner
    }

    /// Next message if one is already available
    pub fn try_receive(&mut self) -> Option<Message> {
        if let Some(message) = self.deferred.pop_front() {
            return Some(message);
        }

        match self.rx.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Wait for the next message from any sender
    ///
    /// Returns `None` once every sender has been dropped. Cancel safe.
    pub async fn receive(&mut self) -> Option<Message> {
        if let Some(message) = self.deferred.pop_front() {
            return Some(message);
        }

        self.rx.recv().await
    }

    /// Wait for the next message from `sender`
    ///
    /// Messages from other senders that arrive while waiting are kept in order
    /// and returned by later receives. Cancel safe: a message is either
    /// returned or deferred before the next suspension point.
    pub async fn receive_from(&mut self, sender: &ActorId) -> Option<Message> {
        if let Some(position) = self.deferred.iter().position(|m| m.sender() == sender) {
            return self.deferred.remove(position);
        }

        loop {
            let message = self.rx.recv().await?;

            if message.sender() == sender {
                return Some(message);
            }

            trace!(
                owner = %self.owner,
                from = %message.sender(),
                waiting_for = %sender,
                "deferring message"
            );
            self.deferred.push_back(message);
        }
    }

    /// Number of messages deferred by [`Mailbox::receive_from`]
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }
}
