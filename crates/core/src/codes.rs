//! Stable machine-readable error codes returned to callers.
//!
//! `RKB*` codes are business rejections produced by the rule chain;
//! `RKS*` codes are service-side conditions.

/// Rule matched without a more specific code.
pub const RULE_REJECTED: &str = "RKB001";
/// Customer or account is on an active blacklist entry.
pub const BLACKLISTED: &str = "RKB002";
/// Amount, batch or scheduled-transfer limit exceeded.
pub const LIMIT_EXCEEDED: &str = "RKB003";
/// Transaction frequency exceeded.
pub const FREQUENCY_EXCEEDED: &str = "RKB004";
/// Aggregate risk score reached the reject threshold.
pub const SCORE_TOO_HIGH: &str = "RKB005";

/// Unexpected internal failure.
pub const INTERNAL: &str = "RKS001";
/// Analytical store unavailable for a read that has no fallback.
pub const STORE_UNAVAILABLE: &str = "RKS002";
/// Request failed validation.
pub const INVALID_REQUEST: &str = "RKS003";
