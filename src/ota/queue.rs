//! OTA Event Queue
//!
//! Bounded queue between the GATT write callback and the OTA task. The
//! callback cannot wait, so a write that does not fit is lost. The last slot
//! is kept for an [`OtaEvent::Overflow`] marker: the controller sees the loss
//! in order and fails the session instead of writing later chunks at a stale
//! offset. Data writes are dropped until the marker has been taken.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;

use crate::log::warn;
use crate::ota::OtaEvent;

/// A write that did not make it into the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventDropped;

pub struct EventQueue<M: RawMutex, const N: usize> {
    channel: Channel<M, OtaEvent, N>,
    overflowed: AtomicBool,
}

impl<M: RawMutex, const N: usize> EventQueue<M, N> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Queue an event from a context that cannot wait.
    ///
    /// Single producer: free capacity can only grow between the check and the send.
    pub fn push(&self, event: OtaEvent) -> Result<(), EventDropped> {
        if matches!(event, OtaEvent::Data(_)) && self.overflowed.load(Ordering::Acquire) {
            return Err(EventDropped);
        }
        if self.channel.free_capacity() > 1 && self.channel.try_send(event).is_ok() {
            return Ok(());
        }
        self.mark_lost();
        Err(EventDropped)
    }

    /// Queue a data write. Writes longer than a chunk count as lost.
    pub fn push_data(&self, chunk: &[u8]) -> Result<(), EventDropped> {
        match OtaEvent::data(chunk) {
            Some(event) => self.push(event),
            None => {
                warn!("OTA: data write of {} bytes exceeds the chunk size", chunk.len());
                self.mark_lost();
                Err(EventDropped)
            }
        }
    }

    /// Next event, waiting if the queue is empty
    pub async fn receive(&self) -> OtaEvent {
        let event = self.channel.receive().await;
        self.taken(event)
    }

    pub fn try_receive(&self) -> Option<OtaEvent> {
        self.channel.try_receive().ok().map(|event| self.taken(event))
    }

    /// Whether a loss is still waiting to be seen by the controller
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    fn mark_lost(&self) {
        if !self.overflowed.swap(true, Ordering::AcqRel) {
            warn!("OTA: event queue overflow, session will fail");
            // The reserved slot is free whenever no marker is pending
            let _ = self.channel.try_send(OtaEvent::Overflow);
        }
    }

    fn taken(&self, event: OtaEvent) -> OtaEvent {
        if matches!(event, OtaEvent::Overflow) {
            self.overflowed.store(false, Ordering::Release);
        }
        event
    }
}

impl<M: RawMutex, const N: usize> Default for EventQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}
