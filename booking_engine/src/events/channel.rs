use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::*;
use tokio::sync::mpsc::{channel, Receiver, Sender};

/// A boxed async callback for an event of type `E`.
///
/// Handlers must be `Send + Sync` since they are invoked from spawned tasks. Wrap the async body in
/// `Box::pin` when subscribing.
pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// The consuming half of an event channel.
///
/// An `EventHandler` owns the receiver and the set of subscribed callbacks. Once every producer has
/// been handed out, call [`EventHandler::start_handler`] to spawn the dispatch loop.
pub struct EventHandler<E> {
    receiver: Receiver<E>,
    sender: Sender<E>,
    handlers: Vec<Handler<E>>,
}

impl<E> EventHandler<E>
where E: Clone + Send + 'static
{
    pub fn new(buffer_size: usize) -> Self {
        let (sender, receiver) = channel(buffer_size);
        Self { receiver, sender, handlers: Vec::new() }
    }

    /// Adds a callback to the list that fires for every event on this channel.
    pub fn subscribe(&mut self, handler: Handler<E>) {
        self.handlers.push(handler);
    }

    /// Creates a new producer for this channel. Producers are cheap to clone and can be handed to
    /// any task that needs to publish events.
    pub fn producer(&self) -> EventProducer<E> {
        EventProducer { sender: self.sender.clone() }
    }

    /// Consumes the handler and spawns the dispatch loop.
    ///
    /// Each incoming event is cloned to every subscriber, with each callback running in its own
    /// task. The loop ends when all producers have been dropped, after which it waits for any
    /// callbacks still in flight before returning.
    pub fn start_handler(self) -> tokio::task::JoinHandle<()> {
        let mut receiver = self.receiver;
        let handlers = self.handlers;
        // The handler holds its own sender so that producers can be created after construction.
        // Drop it here, or the receive loop would never terminate.
        drop(self.sender);
        tokio::spawn(async move {
            let jobs = Arc::new(AtomicUsize::new(0));
            while let Some(event) = receiver.recv().await {
                trace!("📨️ Event received. Dispatching to {} handler(s)", handlers.len());
                for handler in &handlers {
                    let handler = Arc::clone(handler);
                    let event = event.clone();
                    let jobs = Arc::clone(&jobs);
                    jobs.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        handler(event).await;
                        jobs.fetch_sub(1, Ordering::SeqCst);
                    });
                }
            }
            let outstanding = jobs.load(Ordering::SeqCst);
            if outstanding > 0 {
                debug!("📨️ Event channel closed. Waiting for {outstanding} handler task(s) to finish");
            }
            while jobs.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(25)).await;
            }
            debug!("📨️ Event handler terminated.");
        })
    }
}

/// The publishing half of an event channel.
#[derive(Clone)]
pub struct EventProducer<E> {
    sender: Sender<E>,
}

impl<E> EventProducer<E>
where E: Send + Sync + 'static
{
    /// Publishes an event to the channel, logging and discarding it if the channel is full or the
    /// handler has shut down. Event delivery is best effort and never blocks state transitions.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📨️ Could not publish event. {e}");
        }
    }
}
