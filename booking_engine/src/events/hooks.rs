use std::sync::Arc;

use crate::events::{
    channel::{EventHandler, EventProducer, Handler},
    event_types::*,
};

/// The set of callbacks to subscribe to booking lifecycle events.
///
/// Every hook is optional. Attach the ones you need with the builder methods and hand the result to
/// [`EventHandlers::new`].
///
/// ```ignore
/// let hooks = EventHooks::default().on_booking_confirmed(|ev| {
///     Box::pin(async move { println!("booking {} confirmed", ev.booking.id) })
/// });
/// ```
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_new_booking: Option<Handler<NewBookingEvent>>,
    pub on_booking_confirmed: Option<Handler<BookingConfirmedEvent>>,
    pub on_hold_expired: Option<Handler<HoldExpiredEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_booking_cancelled: Option<Handler<BookingCancelledEvent>>,
    pub on_payment_orphaned: Option<Handler<PaymentOrphanedEvent>>,
}

macro_rules! hook_setter {
    ($name:ident, $event:ty) => {
        pub fn $name<F>(mut self, hook: F) -> Self
        where F: Fn($event) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> + Send + Sync + 'static
        {
            self.$name = Some(Arc::new(hook));
            self
        }
    };
}

impl EventHooks {
    hook_setter!(on_new_booking, NewBookingEvent);

    hook_setter!(on_booking_confirmed, BookingConfirmedEvent);

    hook_setter!(on_hold_expired, HoldExpiredEvent);

    hook_setter!(on_payment_failed, PaymentFailedEvent);

    hook_setter!(on_booking_cancelled, BookingCancelledEvent);

    hook_setter!(on_payment_orphaned, PaymentOrphanedEvent);
}

/// One producer per event type. Cloning is cheap, so every API instance and worker task can carry
/// its own copy.
#[derive(Clone)]
pub struct EventProducers {
    pub new_booking_producer: EventProducer<NewBookingEvent>,
    pub booking_confirmed_producer: EventProducer<BookingConfirmedEvent>,
    pub hold_expired_producer: EventProducer<HoldExpiredEvent>,
    pub payment_failed_producer: EventProducer<PaymentFailedEvent>,
    pub booking_cancelled_producer: EventProducer<BookingCancelledEvent>,
    pub payment_orphaned_producer: EventProducer<PaymentOrphanedEvent>,
}

/// The bundle of event channels for the booking engine.
///
/// Construct one per process, collect the [`EventProducers`] you need, then call
/// [`EventHandlers::start_handlers`] to spawn the dispatch loops.
pub struct EventHandlers {
    pub new_booking_handler: EventHandler<NewBookingEvent>,
    pub booking_confirmed_handler: EventHandler<BookingConfirmedEvent>,
    pub hold_expired_handler: EventHandler<HoldExpiredEvent>,
    pub payment_failed_handler: EventHandler<PaymentFailedEvent>,
    pub booking_cancelled_handler: EventHandler<BookingCancelledEvent>,
    pub payment_orphaned_handler: EventHandler<PaymentOrphanedEvent>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let mut new_booking_handler = EventHandler::new(buffer_size);
        let mut booking_confirmed_handler = EventHandler::new(buffer_size);
        let mut hold_expired_handler = EventHandler::new(buffer_size);
        let mut payment_failed_handler = EventHandler::new(buffer_size);
        let mut booking_cancelled_handler = EventHandler::new(buffer_size);
        let mut payment_orphaned_handler = EventHandler::new(buffer_size);
        if let Some(hook) = hooks.on_new_booking {
            new_booking_handler.subscribe(hook);
        }
        if let Some(hook) = hooks.on_booking_confirmed {
            booking_confirmed_handler.subscribe(hook);
        }
        if let Some(hook) = hooks.on_hold_expired {
            hold_expired_handler.subscribe(hook);
        }
        if let Some(hook) = hooks.on_payment_failed {
            payment_failed_handler.subscribe(hook);
        }
        if let Some(hook) = hooks.on_booking_cancelled {
            booking_cancelled_handler.subscribe(hook);
        }
        if let Some(hook) = hooks.on_payment_orphaned {
            payment_orphaned_handler.subscribe(hook);
        }
        Self {
            new_booking_handler,
            booking_confirmed_handler,
            hold_expired_handler,
            payment_failed_handler,
            booking_cancelled_handler,
            payment_orphaned_handler,
        }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers {
            new_booking_producer: self.new_booking_handler.producer(),
            booking_confirmed_producer: self.booking_confirmed_handler.producer(),
            hold_expired_producer: self.hold_expired_handler.producer(),
            payment_failed_producer: self.payment_failed_handler.producer(),
            booking_cancelled_producer: self.booking_cancelled_handler.producer(),
            payment_orphaned_producer: self.payment_orphaned_handler.producer(),
        }
    }

    /// Spawns the dispatch loop for every channel.
    ///
    /// The returned handles resolve once all producers for the matching channel have been dropped
    /// and any in-flight callbacks have run to completion.
    pub fn start_handlers(self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            self.new_booking_handler.start_handler(),
            self.booking_confirmed_handler.start_handler(),
            self.hold_expired_handler.start_handler(),
            self.payment_failed_handler.start_handler(),
            self.booking_cancelled_handler.start_handler(),
            self.payment_orphaned_handler.start_handler(),
        ]
    }
}
