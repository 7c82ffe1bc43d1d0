//! Flash storage collaborator boundary.
//!
//! The protocol core never touches flash registers; it resolves partitions,
//! requests erases, and commits staged pages through this trait. The
//! register-level sequencing, wait-for-ready polling, and status decoding
//! live behind the implementation.

use bootlink_protocol::AppId;
use thiserror::Error;

/// An address range owned by one partition id. Immutable per boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// First address of the partition.
    pub start: u32,
    /// First address past the partition.
    pub end: u32,
}

impl Partition {
    /// Size of the partition in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the partition covers no addresses.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Errors surfaced by a storage implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// No partition exists under the given id on this configuration.
    #[error("no partition for id {0:?}")]
    PartitionNotFound(AppId),

    /// The page number does not fit inside the partition.
    #[error("page {page} out of range for partition")]
    PageOutOfRange {
        /// Offending page number.
        page: u16,
    },

    /// The erase operation failed in hardware.
    #[error("partition erase failed")]
    EraseFailed,

    /// The page write failed in hardware.
    #[error("page write failed")]
    WriteFailed,
}

/// Partitioned flash as seen by the bootloader commands.
///
/// Erase and write may block on hardware completion; there is no timeout
/// or retry at this layer.
pub trait Storage {
    /// Resolve a partition id to its address range.
    fn partition(&self, id: AppId) -> Option<Partition>;

    /// Erase the whole partition.
    fn erase(&mut self, id: AppId) -> Result<(), StorageError>;

    /// Program one page of the partition from `page`.
    fn write_page(&mut self, id: AppId, page: &[u8], page_no: u16) -> Result<(), StorageError>;
}
