//! Platform boot collaborator boundary.

/// Machine-level boot hand-off.
///
/// The boot poll reads the application's initial stack pointer and entry
/// point from its vector table through `read_word`, then transfers control
/// with `jump`. The actual register writes and branch instruction are the
/// implementation's concern.
pub trait BootPlatform {
    /// Read one 32-bit word from the given address.
    fn read_word(&self, addr: u32) -> u32;

    /// Transfer control to the application. Does not return.
    fn jump(&mut self, sp: u32, pc: u32) -> !;
}
