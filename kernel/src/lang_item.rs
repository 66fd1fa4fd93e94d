use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    arch::interrupt::disable_interrupt();
    if let Some(location) = info.location() {
        crate::console::console_print(format_args!(
            "kernel panic at {}:{}: {}\n",
            location.file(),
            location.line(),
            info.message()
        ));
    } else {
        crate::console::console_print(format_args!("kernel panic: {}\n", info.message()));
    }
    loop {
        unsafe { x86::halt() };
    }
}
