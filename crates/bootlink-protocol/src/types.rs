//! Shared wire vocabulary for bootloader method arguments and results.
//!
//! These enums are closed over their wire id spaces: raw bytes are mapped
//! through `from_wire`, and unrecognized values surface as failures instead
//! of being cast through.

use std::fmt;

/// Partition identifiers addressable over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppId {
    /// First application slot.
    App1,
    /// Second application slot.
    App2,
    /// The bootloader's own partition. Only resolvable on storage
    /// configurations that expose it (RAM-loaded builds in the original
    /// layout).
    Bootloader,
}

impl AppId {
    /// Wire id of this partition.
    pub fn to_wire(self) -> u8 {
        match self {
            AppId::App1 => 0,
            AppId::App2 => 1,
            AppId::Bootloader => 255,
        }
    }

    /// Map a wire id to a partition identifier.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(AppId::App1),
            1 => Some(AppId::App2),
            255 => Some(AppId::Bootloader),
            _ => None,
        }
    }
}

/// Logical choice of what to execute on boot hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootAction {
    /// No boot target. Recognized on the wire but never bootable.
    None,
    /// Boot the first application slot.
    App1,
    /// Boot the second application slot.
    App2,
    /// Re-enter the bootloader partition.
    Bootloader,
}

impl BootAction {
    /// Wire id of this action.
    pub fn to_wire(self) -> u8 {
        match self {
            BootAction::None => 0,
            BootAction::App1 => 1,
            BootAction::App2 => 2,
            BootAction::Bootloader => 3,
        }
    }

    /// Map a wire id to a boot action.
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(BootAction::None),
            1 => Some(BootAction::App1),
            2 => Some(BootAction::App2),
            3 => Some(BootAction::Bootloader),
            _ => None,
        }
    }
}

/// Signed status byte carried in command replies.
///
/// `Ok` is zero; every failure class has its own negative value so a peer
/// can tell a bounds rejection from a CRC gate rejection without knowing
/// which method produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command succeeded.
    Ok,
    /// Generic failure (unsupported argument, storage fault).
    Failed,
    /// Offset/length pair exceeds the page buffer.
    OutOfBounds,
    /// Page buffer CRC did not match the expected CRC; nothing was written.
    CrcMismatch,
    /// The requested partition could not be resolved.
    NoPartition,
    /// Boot requested before a boot action was configured.
    NotConfigured,
    /// A status byte this implementation does not know.
    Unknown(i8),
}

impl Status {
    /// Wire value of this status.
    pub fn to_wire(self) -> i8 {
        match self {
            Status::Ok => 0,
            Status::Failed => -1,
            Status::OutOfBounds => -2,
            Status::CrcMismatch => -3,
            Status::NoPartition => -4,
            Status::NotConfigured => -5,
            Status::Unknown(code) => code,
        }
    }

    /// Map a wire value to a status.
    pub fn from_wire(raw: i8) -> Self {
        match raw {
            0 => Status::Ok,
            -1 => Status::Failed,
            -2 => Status::OutOfBounds,
            -3 => Status::CrcMismatch,
            -4 => Status::NoPartition,
            -5 => Status::NotConfigured,
            code => Status::Unknown(code),
        }
    }

    /// Whether this status reports success.
    pub fn is_ok(self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::Failed => write!(f, "command failed"),
            Status::OutOfBounds => write!(f, "offset/length out of bounds"),
            Status::CrcMismatch => write!(f, "page buffer CRC mismatch"),
            Status::NoPartition => write!(f, "partition not found"),
            Status::NotConfigured => write!(f, "no boot action configured"),
            Status::Unknown(code) => write!(f, "unknown status ({code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_id_wire_round_trip() {
        for id in [AppId::App1, AppId::App2, AppId::Bootloader] {
            assert_eq!(AppId::from_wire(id.to_wire()), Some(id));
        }
        assert_eq!(AppId::from_wire(2), None);
        assert_eq!(AppId::from_wire(254), None);
    }

    #[test]
    fn test_boot_action_wire_round_trip() {
        for action in [
            BootAction::None,
            BootAction::App1,
            BootAction::App2,
            BootAction::Bootloader,
        ] {
            assert_eq!(BootAction::from_wire(action.to_wire()), Some(action));
        }
        assert_eq!(BootAction::from_wire(4), None);
    }

    #[test]
    fn test_status_wire_round_trip() {
        for status in [
            Status::Ok,
            Status::Failed,
            Status::OutOfBounds,
            Status::CrcMismatch,
            Status::NoPartition,
            Status::NotConfigured,
        ] {
            assert_eq!(Status::from_wire(status.to_wire()), status);
        }
        assert_eq!(Status::from_wire(-77), Status::Unknown(-77));
        assert!(!Status::Unknown(-77).is_ok());
    }
}
