//! One-shot wait slots for callers blocked on a full pool
//!
//! Each blocked `get` owns the receiving half of a slot; the pool keeps the
//! sending half in its FIFO wait queue. A slot is fulfilled at most once.
//! Dropping the sending half without a delivery is the "pool closed" signal.

use crossbeam::channel;
use tokio::sync::oneshot;

/// What a waiter receives when its slot is fulfilled
#[derive(Debug)]
pub(crate) enum Delivery<R> {
    /// A resource handed over directly by `put`
    Resource(R),

    /// A reserved slot in `num_open`: the waiter must create the resource itself
    Permit,
}

/// Sending half held in the pool's wait queue
#[derive(Debug)]
enum SlotSender<R> {
    Thread(channel::Sender<Delivery<R>>),
    Task(oneshot::Sender<Delivery<R>>),
}

#[derive(Debug)]
pub(crate) struct WaitSlot<R> {
    id: u64,
    sender: SlotSender<R>,
}

impl<R> WaitSlot<R> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Deliver to the waiter. Hands the delivery back if the waiter is gone.
    pub fn fulfill(self, delivery: Delivery<R>) -> Result<(), Delivery<R>> {
        match self.sender {
            SlotSender::Thread(tx) => tx.send(delivery).map_err(|err| err.into_inner()),
            SlotSender::Task(tx) => tx.send(delivery),
        }
    }
}

/// Slot for a caller that parks its thread
pub(crate) fn blocking_slot<R>(id: u64) -> (WaitSlot<R>, channel::Receiver<Delivery<R>>) {
    let (tx, rx) = channel::bounded(1);
    (
        WaitSlot {
            id,
            sender: SlotSender::Thread(tx),
        },
        rx,
    )
}

/// Slot for a caller awaiting on a tokio task
pub(crate) fn async_slot<R>(id: u64) -> (WaitSlot<R>, oneshot::Receiver<Delivery<R>>) {
    let (tx, rx) = oneshot::channel();
    (
        WaitSlot {
            id,
            sender: SlotSender::Task(tx),
        },
        rx,
    )
}
