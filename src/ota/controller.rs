//! Update Controller
//!
//! Owns the update session and runs every data chunk and control command to
//! completion, one at a time. Each handled event ends with exactly one status
//! notification, success or failure. Unknown or malformed control writes are
//! dropped before they reach the session and notify nothing.

use core::convert::Infallible;

use embedded_storage_async::nor_flash::NorFlash;

use crate::core::protocol::{Command, Operation};
use crate::core::session::UpdateSession;
use crate::core::status::{Status, StatusRecord, MAX_REPORTABLE_SIZE};
use crate::core::system::SystemControl;
use crate::log::{debug, error, info, warn};
use crate::ota::error::OtaError;
use crate::ota::reporter::{StatusReporter, StatusSink};
use crate::ota::transitions::admit;
use crate::ota::verifier::staged_crc32;
use crate::ota::OtaEvent;
use crate::storage::StagingStore;

pub struct UpdateController<F, S, Y> {
    session: UpdateSession,
    store: StagingStore<F>,
    reporter: StatusReporter<S>,
    system: Y,
}

impl<F, S, Y> UpdateController<F, S, Y>
where
    F: NorFlash,
    S: StatusSink,
    Y: SystemControl,
{
    /// Build an idle controller on top of an opened staging store.
    pub fn new(store: StagingStore<F>, sink: S, system: Y) -> Self {
        let capacity = store.capacity();
        if capacity > MAX_REPORTABLE_SIZE {
            warn!(
                "OTA: staging capacity {} exceeds the 24-bit size field of the status record",
                capacity
            );
        }

        let session = UpdateSession::new(capacity);
        info!("OTA: controller ready, capacity {} bytes", capacity);

        Self {
            session,
            reporter: StatusReporter::new(sink, &session),
            store,
            system,
        }
    }

    pub fn session(&self) -> &UpdateSession {
        &self.session
    }

    /// Record served on a status read
    pub fn status_record(&self) -> StatusRecord {
        self.reporter.current()
    }

    /// Handle one queued event
    pub async fn dispatch(&mut self, event: OtaEvent) -> Result<(), OtaError> {
        match event {
            OtaEvent::Data(chunk) => self.handle_data(&chunk).await,
            OtaEvent::Control(command) => self.execute(command).await,
            OtaEvent::Overflow => self.finish(Operation::Data, Err(OtaError::EventsLost)),
        }
    }

    /// Append the next image chunk at the session cursor
    pub async fn handle_data(&mut self, chunk: &[u8]) -> Result<(), OtaError> {
        let result = match admit(self.session.status(), Operation::Data) {
            Ok(()) => self.append(chunk).await,
            Err(err) => Err(err),
        };
        self.finish(Operation::Data, result)
    }

    /// Parse and run a raw control write.
    ///
    /// Parse failures are returned without touching the session.
    pub async fn handle_control(&mut self, data: &[u8]) -> Result<(), OtaError> {
        let command = Command::parse(data).map_err(|err| {
            warn!("OTA: dropping control write: {}", err);
            OtaError::from(err)
        })?;
        self.execute(command).await
    }

    /// Run a decoded control command.
    ///
    /// A successful SWAP_AND_REBOOT does not return.
    pub async fn execute(&mut self, command: Command) -> Result<(), OtaError> {
        let operation = command.operation();
        if let Err(err) = admit(self.session.status(), operation) {
            return self.finish(operation, Err(err));
        }

        let result = match command {
            Command::Start { size } => self.start(size).await,
            Command::Verify { expected_crc } => self.verify(expected_crc).await,
            Command::Flash => {
                self.confirm();
                Ok(())
            }
            Command::Reset | Command::Abort => {
                self.session.reset();
                info!("OTA: session cleared by {}", operation);
                Ok(())
            }
            Command::SwapAndReboot => self.swap_and_reboot().await.map(|never| match never {}),
        };
        self.finish(operation, result)
    }

    fn finish(&mut self, operation: Operation, result: Result<(), OtaError>) -> Result<(), OtaError> {
        if let Err(err) = &result {
            error!("OTA: {} failed: {}", operation, err);
            self.session.fail();
        }
        self.reporter.report(&self.session);
        result
    }

    async fn start(&mut self, size: u32) -> Result<(), OtaError> {
        let capacity = self.session.partition_capacity();
        if size > capacity {
            return Err(OtaError::SizeExceedsCapacity {
                requested: size,
                capacity,
            });
        }

        self.store.erase(size).await?;
        self.session.begin(size);
        info!("OTA: receiving {} byte image", size);
        Ok(())
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<(), OtaError> {
        let received = self.session.received_bytes();
        let expected = self.session.expected_size();
        let overrun = OtaError::ChunkOverrun {
            received,
            chunk_len: u32::try_from(chunk.len()).unwrap_or(u32::MAX),
            expected,
        };

        let len = u32::try_from(chunk.len()).map_err(|_| overrun)?;
        let end = received
            .checked_add(len)
            .filter(|&end| end <= expected)
            .ok_or(overrun)?;

        self.store.write(received, chunk, end >= expected).await?;

        if self.session.commit(len) {
            info!("OTA: image received, {} bytes", end);
        } else {
            debug!("OTA: chunk of {} bytes, {}/{}", len, end, expected);
        }
        Ok(())
    }

    async fn verify(&mut self, expected_crc: Option<u32>) -> Result<(), OtaError> {
        self.session.advance(Status::Verifying);
        let computed = staged_crc32(&mut self.store, self.session.received_bytes()).await?;

        match expected_crc {
            Some(expected) if expected != computed => Err(OtaError::VerificationMismatch { expected, computed }),
            _ => {
                self.session.advance(Status::Verified);
                info!("OTA: image verified, CRC-32 0x{:08X}", computed);
                Ok(())
            }
        }
    }

    /// Confirmation step only. The image is already in place, the bootloader
    /// performs the copy.
    fn confirm(&mut self) {
        self.session.advance(Status::Flashing);
        self.session.advance(Status::Complete);
        info!("OTA: update complete, awaiting swap");
    }

    async fn swap_and_reboot(&mut self) -> Result<Infallible, OtaError> {
        self.store.mark_pending().await?;
        info!("OTA: image marked for swap, rebooting");
        self.system.settle().await;
        self.system.reset()
    }
}
