//! Process exit codes for the `asset-cache` binary.

pub const SUCCESS: i32 = 0;
pub const NOT_FOUND: i32 = 1; // Key or entry not cached
pub const ERROR: i32 = 2; // Bad config, bad input or I/O failure
