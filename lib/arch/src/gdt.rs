//! The flat GDT and the task-state segment.
//!
//! The entry stub runs on the loader's segments; this module installs the
//! real GDT, which adds the ring-3 segments and the TSS that supplies the
//! kernel stack on ring transitions.

use core::cell::SyncUnsafeCell;
use core::mem::size_of;

use x86::dtables::{self, DescriptorTablePointer};
use x86::segmentation::{self, SegmentSelector};
use x86::task;

/// Segment selector values. The low two bits are the RPL.
pub const KERNEL_CS: u16 = 0x08;
pub const KERNEL_DS: u16 = 0x10;
pub const USER_CS: u16 = 0x18 | 3;
pub const USER_DS: u16 = 0x20 | 3;
const TSS_SEL: u16 = 0x28;

/// 32-bit task-state segment. Only `esp0`/`ss0` matter; hardware task
/// switching is not used.
#[repr(C, packed)]
struct Tss {
    link: u32,
    esp0: u32,
    ss0: u32,
    _unused: [u32; 22],
    iomap_base: u16,
    _pad: u16,
}

static TSS: SyncUnsafeCell<Tss> = SyncUnsafeCell::new(Tss {
    link: 0,
    esp0: 0,
    ss0: KERNEL_DS as u32,
    _unused: [0; 22],
    iomap_base: size_of::<Tss>() as u16,
    _pad: 0,
});

static GDT: SyncUnsafeCell<[u64; 6]> = SyncUnsafeCell::new([0; 6]);

/// Builds a 4 KiB-granular flat segment descriptor.
const fn flat_descriptor(access: u64) -> u64 {
    // base 0, limit 0xfffff, granularity 4K, 32-bit
    0x000f_0000_0000_ffff | (access << 40) | (0xc << 52)
}

fn tss_descriptor(base: u32, limit: u32) -> u64 {
    let base = base as u64;
    let limit = limit as u64;
    (limit & 0xffff)
        | ((base & 0xff_ffff) << 16)
        | (0x89 << 40) // present, 32-bit available TSS
        | ((limit & 0xf_0000) << 32)
        | ((base & 0xff00_0000) << 32)
}

/// Installs the GDT and TSS and reloads every segment register.
///
/// # Safety
/// Must run once, before the first ring transition, with interrupts off.
pub unsafe fn init() {
    let gdt = unsafe { &mut *GDT.get() };
    gdt[1] = flat_descriptor(0x9a); // kernel code
    gdt[2] = flat_descriptor(0x92); // kernel data
    gdt[3] = flat_descriptor(0xfa); // user code
    gdt[4] = flat_descriptor(0xf2); // user data
    gdt[5] = tss_descriptor(TSS.get() as u32, size_of::<Tss>() as u32 - 1);

    let ptr = DescriptorTablePointer::new_from_slice(gdt);
    unsafe {
        dtables::lgdt(&ptr);
        let data = SegmentSelector::from_raw(KERNEL_DS);
        segmentation::load_ds(data);
        segmentation::load_es(data);
        segmentation::load_fs(data);
        segmentation::load_gs(data);
        segmentation::load_ss(data);
        // Far return to reload CS.
        core::arch::asm!(
            "push {sel}",
            "lea {tmp}, [2f]",
            "push {tmp}",
            "retf",
            "2:",
            sel = in(reg) KERNEL_CS as u32,
            tmp = out(reg) _,
        );
        task::load_tr(SegmentSelector::from_raw(TSS_SEL));
    }
}

/// Records the stack the CPU switches to on a user-to-kernel transition.
/// Called on every context switch to a thread that can enter user mode.
pub fn set_kernel_stack(esp0: usize) {
    unsafe { (*TSS.get()).esp0 = esp0 as u32 };
}
