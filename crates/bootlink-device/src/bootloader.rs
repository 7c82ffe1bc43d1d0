//! Bootloader command logic.
//!
//! The bootloader owns two persistent resources: the staging page buffer
//! (a RAM mirror of one flash page) and the boot-selection state. Commands
//! mutate the staging buffer freely; nothing reaches flash until
//! `write_page` passes its CRC gate, and nothing boots until a partition
//! has been resolved by `set_boot_action` and armed by `boot`.

use bootlink_protocol::{AppId, BootAction, Status};
use crc::{Crc, CRC_32_ISO_HDLC};

use crate::platform::BootPlatform;
use crate::storage::{Storage, StorageError};

/// Page CRC (CRC-32/ISO-HDLC, the zlib polynomial).
static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Default flash page size, in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 256;

/// Bootloader state: staging page buffer, boot selection, and the storage
/// collaborator the commands operate through.
pub struct Bootloader<S: Storage> {
    storage: S,
    page_buffer: Box<[u8]>,
    boot_entry: Option<u32>,
    boot_enable: bool,
}

impl<S: Storage> Bootloader<S> {
    /// Create a bootloader with the default page size.
    pub fn new(storage: S) -> Self {
        Self::with_page_size(storage, DEFAULT_PAGE_SIZE)
    }

    /// Create a bootloader with an explicit flash page size.
    ///
    /// The staging buffer starts in the erased state (all 0xFF, matching
    /// unprogrammed flash) so page CRC checks are meaningful before the
    /// first explicit erase.
    pub fn with_page_size(storage: S, page_size: usize) -> Self {
        Bootloader {
            storage,
            page_buffer: vec![0xFF; page_size].into_boxed_slice(),
            boot_entry: None,
            boot_enable: false,
        }
    }

    /// Flash page size this bootloader stages.
    pub fn page_size(&self) -> usize {
        self.page_buffer.len()
    }

    /// Current staging buffer contents.
    pub fn page_buffer(&self) -> &[u8] {
        &self.page_buffer
    }

    /// The storage collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Liveness check.
    pub fn ping(&self) {
        log::debug!("ping");
    }

    /// Copy `data` into the staging buffer at `offset`.
    ///
    /// Rejects any offset/length pair that would run past the page,
    /// leaving the buffer untouched. Does not erase: callers layer chunks
    /// over whatever the buffer already holds.
    pub fn write_page_buffer(&mut self, offset: u16, data: &[u8]) -> Status {
        log::debug!("write_page_buffer offset={offset:#06x} len={}", data.len());

        let offset = usize::from(offset);
        if offset + data.len() > self.page_buffer.len() {
            return Status::OutOfBounds;
        }

        self.page_buffer[offset..offset + data.len()].copy_from_slice(data);
        Status::Ok
    }

    /// Reset the staging buffer to the erased state (all 0xFF).
    ///
    /// Touches only RAM; physical storage is unaffected. The 0xFF fill
    /// matches unprogrammed flash, so a page CRC computed over a partially
    /// filled buffer equals the CRC of the page flash will actually hold.
    pub fn erase_page_buffer(&mut self) {
        log::debug!("erase_page_buffer");
        self.page_buffer.fill(0xFF);
    }

    /// Erase an application partition.
    pub fn erase_app(&mut self, id: AppId) -> Status {
        log::debug!("erase_app {id:?}");

        match self.storage.erase(id) {
            Ok(()) => Status::Ok,
            Err(err) => {
                log::debug!("erase_app failed: {err}");
                status_from_storage(err)
            }
        }
    }

    /// Commit the staging buffer to flash page `page_no` of partition `id`.
    ///
    /// The commit is gated on `expected_crc` matching the CRC-32 of the
    /// entire staging buffer; on mismatch nothing is written. This is the
    /// integrity gate keeping a corrupted upload out of flash.
    pub fn write_page(&mut self, id: AppId, page_no: u16, expected_crc: u32) -> Status {
        log::debug!("write_page {id:?} page={page_no} crc={expected_crc:#010x}");

        let buffer_crc = CRC32.checksum(&self.page_buffer);
        if buffer_crc != expected_crc {
            log::debug!("page buffer crc {buffer_crc:#010x} does not match, refusing commit");
            return Status::CrcMismatch;
        }

        match self.storage.write_page(id, &self.page_buffer, page_no) {
            Ok(()) => Status::Ok,
            Err(err) => {
                log::debug!("write_page failed: {err}");
                status_from_storage(err)
            }
        }
    }

    /// Select the partition to execute on hand-off.
    ///
    /// Resolves the action's partition through storage and records its
    /// start address as the boot entry. An unsupported action or an
    /// unresolved partition fails without mutating the boot state.
    pub fn set_boot_action(&mut self, action: BootAction) -> Status {
        log::debug!("set_boot_action {action:?}");

        let id = match action {
            BootAction::App1 => AppId::App1,
            BootAction::App2 => AppId::App2,
            BootAction::Bootloader => AppId::Bootloader,
            BootAction::None => return Status::Failed,
        };

        match self.storage.partition(id) {
            Some(partition) => {
                self.boot_entry = Some(partition.start);
                Status::Ok
            }
            None => Status::NoPartition,
        }
    }

    /// Arm the boot hand-off.
    ///
    /// Only allowed once a boot entry has been resolved by a successful
    /// `set_boot_action`; the boot poll performs the actual transfer.
    pub fn boot(&mut self) -> Status {
        log::debug!("boot");

        if self.boot_entry.is_none() {
            return Status::NotConfigured;
        }

        self.boot_enable = true;
        Status::Ok
    }

    /// Whether the boot hand-off is armed.
    pub fn boot_enabled(&self) -> bool {
        self.boot_enable
    }

    /// The resolved boot entry address, if any.
    pub fn boot_entry(&self) -> Option<u32> {
        self.boot_entry
    }

    /// Perform the boot hand-off if it is armed.
    ///
    /// Called from the outer loop, outside the request/response cycle.
    /// When armed, reads the initial stack pointer and entry point from
    /// the two words at the boot entry and jumps; `jump` does not return.
    pub fn boot_poll(&self, platform: &mut impl BootPlatform) {
        if !self.boot_enable {
            return;
        }

        // boot() only arms once the entry is resolved.
        if let Some(entry) = self.boot_entry {
            let sp = platform.read_word(entry);
            let pc = platform.read_word(entry + 4);
            log::info!("booting from {entry:#010x} (sp={sp:#010x}, pc={pc:#010x})");
            platform.jump(sp, pc)
        }
    }
}

fn status_from_storage(err: StorageError) -> Status {
    match err {
        StorageError::PartitionNotFound(_) => Status::NoPartition,
        StorageError::PageOutOfRange { .. } => Status::OutOfBounds,
        StorageError::EraseFailed | StorageError::WriteFailed => Status::Failed,
    }
}
