//! Status Reporter
//!
//! Encodes the session into its 8-byte record and pushes it to the
//! notification side. The last record is kept so status reads return exactly
//! what was last notified.

use crate::core::session::UpdateSession;
use crate::core::status::StatusRecord;
use crate::log::debug;

/// Outbound notification primitive
pub trait StatusSink {
    fn publish(&mut self, record: &StatusRecord);
}

pub struct StatusReporter<S> {
    sink: S,
    current: StatusRecord,
}

impl<S: StatusSink> StatusReporter<S> {
    pub fn new(sink: S, session: &UpdateSession) -> Self {
        Self {
            sink,
            current: session.record(),
        }
    }

    /// Encode `session` and notify it
    pub fn report(&mut self, session: &UpdateSession) {
        self.current = session.record();
        debug!(
            "Status: {} {}/{}",
            session.status(),
            session.received_bytes(),
            session.expected_size()
        );
        self.sink.publish(&self.current);
    }

    /// Record returned on a status read
    pub fn current(&self) -> StatusRecord {
        self.current
    }
}
