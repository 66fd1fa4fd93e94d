//! Interrupt-enable control and the idle primitive.

use x86::bits32::eflags::{self, EFlags};
use x86::io::outb;

#[inline]
pub fn enable_interrupt() {
    unsafe { x86::irq::enable() };
}

#[inline]
pub fn disable_interrupt() {
    unsafe { x86::irq::disable() };
}

#[inline]
pub fn interrupts_enabled() -> bool {
    unsafe { eflags::read() }.contains(EFlags::FLAGS_IF)
}

/// Enable interrupts and halt until the next one arrives.
#[inline]
pub fn wait_for_interrupt() {
    unsafe {
        x86::irq::enable();
        x86::halt();
    }
}

/// Masks every line on both legacy PICs. The loader may leave them
/// unmasked, and this kernel takes no hardware interrupts.
pub fn mask_pic() {
    unsafe {
        outb(0x21, 0xff);
        outb(0xa1, 0xff);
    }
}
