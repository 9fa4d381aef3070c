//! Common test utilities for the host test suite
//!
//! - `MemFlash`: RAM-backed NOR flash with NOR programming rules and fault injection
//! - `RecordingSink`: status sink that keeps every published record
//! - `FakeSystem`: restart hooks that count settles and panic on reset
//! - harness helpers wiring them into an `UpdateController`

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use embedded_storage_async::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use nrf52840_ota_firmware::core::status::StatusRecord;
use nrf52840_ota_firmware::core::system::SystemControl;
use nrf52840_ota_firmware::ota::{StatusSink, UpdateController};
use nrf52840_ota_firmware::storage::{Partition, StagingStore};

pub const PAGE_SIZE: usize = 4096;
pub const FLASH_SIZE: usize = 16 * PAGE_SIZE;

/// Staging slot used by the tests: 8 pages starting at page 2
pub const TEST_PARTITION: Partition = Partition::new(2 * PAGE_SIZE as u32, 8 * PAGE_SIZE as u32);

/// Image capacity of `TEST_PARTITION` (trailer page excluded)
pub const TEST_CAPACITY: u32 = 7 * PAGE_SIZE as u32;

/// Message carried by the `FakeSystem` reset panic
pub const RESET_PANIC: &str = "system reset";

#[derive(Default)]
struct Faults {
    erase: Cell<bool>,
    write: Cell<bool>,
    read: Cell<bool>,
}

/// In-memory NOR flash. Clones share the same memory.
#[derive(Clone)]
pub struct MemFlash {
    memory: Rc<RefCell<Vec<u8>>>,
    faults: Rc<Faults>,
    erases: Rc<RefCell<Vec<(u32, u32)>>>,
}

impl MemFlash {
    /// Fully erased device
    pub fn new() -> Self {
        Self::filled(0xFF)
    }

    /// Device holding stale data everywhere
    pub fn dirty() -> Self {
        Self::filled(0x00)
    }

    fn filled(byte: u8) -> Self {
        Self {
            memory: Rc::new(RefCell::new(vec![byte; FLASH_SIZE])),
            faults: Rc::new(Faults::default()),
            erases: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn fail_erase(&self, fail: bool) {
        self.faults.erase.set(fail);
    }

    pub fn fail_write(&self, fail: bool) {
        self.faults.write.set(fail);
    }

    pub fn fail_read(&self, fail: bool) {
        self.faults.read.set(fail);
    }

    /// Raw device bytes at absolute `offset`
    pub fn bytes(&self, offset: u32, len: usize) -> Vec<u8> {
        let memory = self.memory.borrow();
        memory[offset as usize..offset as usize + len].to_vec()
    }

    /// Bytes at `offset` relative to the test partition
    pub fn staged(&self, offset: u32, len: usize) -> Vec<u8> {
        self.bytes(TEST_PARTITION.offset + offset, len)
    }

    /// Absolute ranges erased so far
    pub fn erased_ranges(&self) -> Vec<(u32, u32)> {
        self.erases.borrow().clone()
    }
}

impl ErrorType for MemFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for MemFlash {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        if self.faults.read.get() {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        let end = start + bytes.len();
        if end > FLASH_SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.memory.borrow()[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl NorFlash for MemFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = PAGE_SIZE;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.faults.erase.get() {
            return Err(NorFlashErrorKind::Other);
        }
        let (start, end) = (from as usize, to as usize);
        if start % PAGE_SIZE != 0 || end % PAGE_SIZE != 0 || start > end {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if end > FLASH_SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.memory.borrow_mut()[start..end].fill(0xFF);
        self.erases.borrow_mut().push((from, to));
        Ok(())
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.faults.write.get() {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        if start % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let end = start + bytes.len();
        if end > FLASH_SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        // Programming can only clear bits
        for (cell, byte) in self.memory.borrow_mut()[start..end].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        Ok(())
    }
}

/// Keeps every published status record
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Rc<RefCell<Vec<StatusRecord>>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<StatusRecord> {
        self.records.borrow().clone()
    }

    pub fn count(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn last(&self) -> Option<StatusRecord> {
        self.records.borrow().last().copied()
    }
}

impl StatusSink for RecordingSink {
    fn publish(&mut self, record: &StatusRecord) {
        self.records.borrow_mut().push(*record);
    }
}

/// Restart hooks for the host: counts settles, panics on reset
#[derive(Clone, Default)]
pub struct FakeSystem {
    settles: Rc<Cell<u32>>,
    resets: Rc<Cell<u32>>,
}

impl FakeSystem {
    pub fn settles(&self) -> u32 {
        self.settles.get()
    }

    pub fn resets(&self) -> u32 {
        self.resets.get()
    }
}

impl SystemControl for FakeSystem {
    async fn settle(&mut self) {
        self.settles.set(self.settles.get() + 1);
    }

    fn reset(&mut self) -> ! {
        self.resets.set(self.resets.get() + 1);
        panic!("{}", RESET_PANIC);
    }
}

pub type TestController = UpdateController<MemFlash, RecordingSink, FakeSystem>;

/// Controller plus handles onto everything it drives
pub struct Harness {
    pub controller: TestController,
    pub flash: MemFlash,
    pub sink: RecordingSink,
    pub system: FakeSystem,
}

pub fn harness() -> Harness {
    harness_with(MemFlash::new())
}

pub fn harness_with(flash: MemFlash) -> Harness {
    let store = open_store(flash.clone());
    let sink = RecordingSink::default();
    let system = FakeSystem::default();
    let controller = UpdateController::new(store, sink.clone(), system.clone());
    Harness {
        controller,
        flash,
        sink,
        system,
    }
}

pub fn open_store(flash: MemFlash) -> StagingStore<MemFlash> {
    match StagingStore::open(flash, TEST_PARTITION) {
        Ok(store) => store,
        Err(e) => panic!("test partition rejected: {}", e),
    }
}

/// Drive a future to completion on the current thread
pub fn run<F: Future>(future: F) -> F::Output {
    embassy_futures::block_on(future)
}

/// Deterministic image bytes
pub fn test_image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
