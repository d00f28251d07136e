//! Exit codes of the check-conditions binary
//!
//! Failures of the tool itself never share a code with "the cluster is
//! unhealthy", so automation can tell the two apart.

/// Success - nothing reported, the awaited line appeared, or the while-regex stopped matching
pub const SUCCESS: i32 = 0;

/// A single run reported at least one condition
pub const UNHEALTHY: i32 = 1;

/// Setup error - cluster unreachable, discovery failed on the first cycle, single run timed out
pub const SETUP_ERROR: i32 = 3;

/// Config error - malformed rule configuration or unparseable rule pattern
pub const CONFIG_ERROR: i32 = 4;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
