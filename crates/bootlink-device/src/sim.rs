//! In-memory stand-ins for the device's hardware collaborators.
//!
//! Used by the test suites and by host-side loopback tests that run a
//! full server without a serial port.

use std::collections::{HashMap, VecDeque};

use bootlink_protocol::AppId;

use crate::platform::BootPlatform;
use crate::storage::{Partition, Storage, StorageError};
use crate::transport::{Transport, TransportError};

/// Byte transport backed by in-memory queues.
#[derive(Debug, Default)]
pub struct SimTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SimTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the device to receive.
    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    /// Drain everything the device has sent.
    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx)
    }
}

impl Transport for SimTransport {
    fn read_byte(&mut self) -> Result<Option<u8>, TransportError> {
        Ok(self.rx.pop_front())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.tx.extend_from_slice(bytes);
        Ok(())
    }
}

/// Partition layout of the reference target: 16 KiB bootloader at the
/// bottom of flash, then two equal application slots.
const APP1_PARTITION: Partition = Partition {
    start: 0x4000,
    end: 0x12000,
};
const APP2_PARTITION: Partition = Partition {
    start: 0x12000,
    end: 0x20000,
};

/// Flash storage backed by a page map.
///
/// The default partition table exposes the two application slots only,
/// as a flash-resident bootloader would: its own partition is not
/// erasable or writable through the command surface.
pub struct SimStorage {
    partitions: HashMap<AppId, Partition>,
    pages: HashMap<(AppId, u16), Vec<u8>>,
    erased: Vec<AppId>,
}

impl SimStorage {
    pub fn new() -> Self {
        let mut partitions = HashMap::new();
        partitions.insert(AppId::App1, APP1_PARTITION);
        partitions.insert(AppId::App2, APP2_PARTITION);
        SimStorage {
            partitions,
            pages: HashMap::new(),
            erased: Vec::new(),
        }
    }

    /// Add or replace a partition table entry.
    pub fn with_partition(mut self, id: AppId, partition: Partition) -> Self {
        self.partitions.insert(id, partition);
        self
    }

    /// Contents of a committed page, if it has been written.
    pub fn page(&self, id: AppId, page_no: u16) -> Option<&[u8]> {
        self.pages.get(&(id, page_no)).map(Vec::as_slice)
    }

    /// Number of pages committed so far.
    pub fn write_count(&self) -> usize {
        self.pages.len()
    }

    /// Partitions erased so far, in order.
    pub fn erased(&self) -> &[AppId] {
        &self.erased
    }
}

impl Default for SimStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for SimStorage {
    fn partition(&self, id: AppId) -> Option<Partition> {
        self.partitions.get(&id).copied()
    }

    fn erase(&mut self, id: AppId) -> Result<(), StorageError> {
        if !self.partitions.contains_key(&id) {
            return Err(StorageError::PartitionNotFound(id));
        }
        self.pages.retain(|&(page_id, _), _| page_id != id);
        self.erased.push(id);
        Ok(())
    }

    fn write_page(&mut self, id: AppId, page: &[u8], page_no: u16) -> Result<(), StorageError> {
        let partition = self
            .partitions
            .get(&id)
            .ok_or(StorageError::PartitionNotFound(id))?;

        let page_start = partition.start as usize + usize::from(page_no) * page.len();
        if page_start + page.len() > partition.end as usize {
            return Err(StorageError::PageOutOfRange { page: page_no });
        }

        self.pages.insert((id, page_no), page.to_vec());
        Ok(())
    }
}

/// Execution platform that records the hand-off instead of leaving the
/// process. `jump` unwinds after recording, since it cannot return.
#[derive(Debug, Default)]
pub struct SimPlatform {
    words: HashMap<u32, u32>,
    jumped: Option<(u32, u32)>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program a word of simulated memory.
    pub fn set_word(&mut self, addr: u32, value: u32) {
        self.words.insert(addr, value);
    }

    /// The recorded (sp, pc) hand-off, if `jump` fired.
    pub fn jumped(&self) -> Option<(u32, u32)> {
        self.jumped
    }
}

impl BootPlatform for SimPlatform {
    fn read_word(&self, addr: u32) -> u32 {
        // Unprogrammed flash reads back erased.
        self.words.get(&addr).copied().unwrap_or(0xFFFF_FFFF)
    }

    fn jump(&mut self, sp: u32, pc: u32) -> ! {
        self.jumped = Some((sp, pc));
        panic!("simulated jump to pc={pc:#010x}");
    }
}
