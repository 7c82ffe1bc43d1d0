//! Device-side bootloader stack.
//!
//! Composes the shared wire protocol into a running device: a polled
//! server loop over a byte [`Transport`], a dispatch table routing decoded
//! messages to the bootloader service, and the [`Bootloader`] command
//! logic operating on a [`Storage`] flash abstraction. The boot hand-off
//! itself goes through [`BootPlatform`], so the whole stack runs hosted
//! for tests and tooling with the `sim` collaborators.

pub mod bootloader;
pub mod dispatch;
pub mod message;
pub mod platform;
pub mod server;
pub mod sim;
pub mod storage;
pub mod transport;

pub use bootloader::{Bootloader, DEFAULT_PAGE_SIZE};
pub use dispatch::DispatchError;
pub use message::Message;
pub use platform::BootPlatform;
pub use server::{PollStatus, Server, ServerError};
pub use storage::{Partition, Storage, StorageError};
pub use transport::{Transport, TransportError};
