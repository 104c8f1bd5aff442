//! Process exit codes.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Operation failed or bad input
pub const NOT_FOUND: i32 = 2; // Object or plugin does not exist
