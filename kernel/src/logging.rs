use log::Record;
use logger::{LogIf, level_color};

use crate::console::console_print;

struct LogIfImpl;

#[crate_interface::impl_interface]
impl LogIf for LogIfImpl {
    fn print_record(record: &Record) {
        console_print(format_args!(
            "\u{1b}[{}m[{:>5}] {}\u{1b}[0m\n",
            level_color(record.level()),
            record.level(),
            record.args()
        ));
    }
}
