//! Update Session State
//!
//! The one long-lived session owned by the update controller. Nothing outside
//! the controller can mutate it: the mutators are crate-private and every
//! status change goes through [`UpdateSession::advance`], which enforces the
//! allowed edges.

use crate::core::status::{Status, StatusRecord};

/// Progress of the current (or last) update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateSession {
    status: Status,
    expected_size: u32,
    received_bytes: u32,
    partition_capacity: u32,
}

impl UpdateSession {
    /// Create an idle session for a staging partition of `partition_capacity` bytes
    pub const fn new(partition_capacity: u32) -> Self {
        Self {
            status: Status::Idle,
            expected_size: 0,
            received_bytes: 0,
            partition_capacity,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn expected_size(&self) -> u32 {
        self.expected_size
    }

    pub fn received_bytes(&self) -> u32 {
        self.received_bytes
    }

    pub fn partition_capacity(&self) -> u32 {
        self.partition_capacity
    }

    /// Bytes still expected before the image is complete
    pub fn remaining(&self) -> u32 {
        self.expected_size.saturating_sub(self.received_bytes)
    }

    /// Check `received <= expected <= capacity` for every status that carries a transfer.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            Status::Idle => self.received_bytes == 0 && self.expected_size == 0,
            Status::Error => true,
            _ => self.received_bytes <= self.expected_size && self.expected_size <= self.partition_capacity,
        }
    }

    /// Progress record for the status characteristic
    pub fn record(&self) -> StatusRecord {
        StatusRecord::encode(self.status, self.received_bytes, self.expected_size)
    }

    /// Back to the zero value. Capacity is kept.
    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.partition_capacity);
    }

    /// Fresh transfer of `size` bytes. The caller has already checked capacity.
    pub(crate) fn begin(&mut self, size: u32) {
        debug_assert!(size <= self.partition_capacity);
        self.reset();
        self.expected_size = size;
        self.advance(Status::Receiving);
    }

    /// Account for `len` committed bytes. Returns true when the image is complete.
    pub(crate) fn commit(&mut self, len: u32) -> bool {
        debug_assert!(len <= self.remaining());
        self.received_bytes += len;
        if self.received_bytes == self.expected_size {
            self.advance(Status::Received);
            true
        } else {
            false
        }
    }

    pub(crate) fn fail(&mut self) {
        self.advance(Status::Error);
    }

    /// Move to `next`.
    ///
    /// Callers go through `ota::transitions::admit` first, so the edge is
    /// legal. An illegal edge asserts in debug builds and lands in ERROR
    /// otherwise.
    pub(crate) fn advance(&mut self, next: Status) {
        debug_assert!(
            self.status.allows(next),
            "illegal status edge {:?} -> {:?}",
            self.status,
            next
        );
        self.status = if self.status.allows(next) { next } else { Status::Error };
    }
}
