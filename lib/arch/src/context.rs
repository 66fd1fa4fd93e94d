//! Saved machine context of a kernel thread and the switch primitive.

use core::arch::global_asm;

/// The state a descheduled thread resumes from.
///
/// `eip`/`esp` are captured by [`ctx_switch`]; `pd` is the physical address
/// of the page directory loaded on switch-in. The kernel stack bounds ride
/// along so the scheduler can program the TSS.
#[derive(Debug, Clone)]
#[repr(C)]
pub struct Context {
    pub eip: usize,
    pub esp: usize,
    pub pd: usize,
    pub kstack_base: usize,
    pub kstack_size: usize,
}

impl Context {
    pub const fn zeroed() -> Self {
        Self {
            eip: 0,
            esp: 0,
            pd: 0,
            kstack_base: 0,
            kstack_size: 0,
        }
    }
}

global_asm!(
    "
    .text
    .global __ctx_switch
// __ctx_switch(old: *mut Context, new: *const Context)
// Saves the callee-saved state of the caller into `old` and resumes `new`.
__ctx_switch:
    mov eax, [esp + 4]
    mov edx, [esp + 8]
    push ebp
    push ebx
    push esi
    push edi
    pushfd
    mov [eax + 4], esp
    lea ecx, [2f]
    mov [eax + 0], ecx
    mov ecx, [edx + 8]
    mov cr3, ecx
    mov esp, [edx + 4]
    jmp dword ptr [edx + 0]
2:
    popfd
    pop edi
    pop esi
    pop ebx
    pop ebp
    ret
"
);

unsafe extern "C" {
    fn __ctx_switch(old: *mut Context, new: *const Context);
}

/// Switches from the current thread to `new`, saving the suspension point
/// into `old`. Returns when something switches back to `old`.
///
/// # Safety
/// `new` must describe a runnable context whose page directory maps the
/// kernel half and whose stack is live.
pub unsafe fn ctx_switch(old: &mut Context, new: &Context) {
    unsafe { __ctx_switch(old, new) };
}
