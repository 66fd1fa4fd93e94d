/// Pid of the first process.
pub const INIT_PID: usize = 1;

/// Longest process name kept in the process structure.
pub const PROC_NAME_LEN: usize = 32;
