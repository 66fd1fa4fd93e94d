#![no_std]

use crate_interface::call_interface;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Console output the logger writes through.
///
/// The kernel implements this with `#[crate_interface::impl_interface]`,
/// keeping this crate free of any dependency on the console driver.
#[crate_interface::def_interface]
pub trait LogIf: Send + Sync {
    fn print_record(record: &Record);
}

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            call_interface!(LogIf::print_record(record));
        }
    }

    fn flush(&self) {}
}

/// Installs the global logger. The level comes from the `LOG` environment
/// variable at build time; unset means off.
pub fn init() {
    static LOGGER: KernelLogger = KernelLogger;
    log::set_logger(&LOGGER).ok();
    log::set_max_level(match option_env!("LOG") {
        Some("trace") => LevelFilter::Trace,
        Some("debug") => LevelFilter::Debug,
        Some("info") => LevelFilter::Info,
        Some("warn") => LevelFilter::Warn,
        Some("error") => LevelFilter::Error,
        _ => LevelFilter::Off,
    });
}

/// ANSI color for a level, used by the kernel's console backend.
pub fn level_color(level: Level) -> u8 {
    match level {
        Level::Error => 31, // red
        Level::Warn => 93,  // bright yellow
        Level::Info => 36,  // cyan
        Level::Debug => 32, // green
        Level::Trace => 90, // bright black
    }
}
