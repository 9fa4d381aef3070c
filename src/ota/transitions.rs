//! Command admission table
//!
//! Every operation is checked against the current status here, before any
//! handler runs. Handlers never re-check preconditions.

use crate::core::protocol::Operation;
use crate::core::status::Status;
use crate::ota::error::OtaError;

/// Decide whether `operation` may run while the session is in `status`.
pub fn admit(status: Status, operation: Operation) -> Result<(), OtaError> {
    use Operation as Op;

    match (status, operation) {
        (_, Op::Start | Op::Reset | Op::Abort) => Ok(()),
        (Status::Receiving, Op::Data)
        | (Status::Received, Op::Verify)
        | (Status::Verified, Op::Flash)
        | (Status::Complete, Op::SwapAndReboot) => Ok(()),
        (status, operation) => Err(OtaError::SequenceViolation { status, operation }),
    }
}
