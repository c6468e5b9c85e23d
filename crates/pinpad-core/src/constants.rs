//! Core constants for the device abstraction layer.
//!
//! Every device call made by the workflow engine is bounded by one of the
//! timeouts defined here. Timeouts are grouped by operation class rather than
//! by individual command: a quick status query has a short bound, while
//! configuration package loads and reboots are allowed minutes.
//!
//! # Usage
//!
//! ```
//! use pinpad_core::constants::*;
//! use std::time::Duration;
//!
//! let timeout = Duration::from_millis(GET_STATUS_TIMEOUT);
//! assert!(timeout < Duration::from_millis(DEVICE_UPDATE_TIMEOUT));
//! ```

// ============================================================================
// Device Query Timeouts
// ============================================================================

/// Timeout for a device status query (milliseconds).
///
/// Status queries are issued after discovery and whenever a caller asks for
/// the terminal state. A healthy terminal answers well below this bound.
///
/// # Value: 5000ms
pub const GET_STATUS_TIMEOUT: u64 = 5_000;

/// Timeout for read-only device queries (milliseconds).
///
/// Covers security configuration, kernel checksums, version reports and
/// HMAC generation.
///
/// # Value: 10000ms
pub const DEVICE_QUERY_TIMEOUT: u64 = 10_000;

/// Timeout for retrieving the Sphere health file (milliseconds).
///
/// The terminal assembles the file before it can be transferred, which is
/// noticeably slower than a plain query.
///
/// # Value: 30000ms
pub const HEALTH_FILE_TIMEOUT: u64 = 30_000;

// ============================================================================
// Device Update Timeouts
// ============================================================================

/// Timeout for screen updates (milliseconds).
///
/// Applies to idle screen replacement and custom screen display.
///
/// # Value: 15000ms
pub const DISPLAY_UPDATE_TIMEOUT: u64 = 15_000;

/// Timeout for configuration changes (milliseconds).
///
/// Applies to configuration package loads, config slot locking/unlocking,
/// feature enablement tokens, HMAC key updates and clock changes.
///
/// # Value: 120000ms (2 minutes)
pub const DEVICE_UPDATE_TIMEOUT: u64 = 120_000;

/// Timeout for reboot requests (milliseconds).
///
/// Used both for the 24-hour reboot schedule and for the follow-up reboot
/// issued after a configuration change that requires one.
///
/// # Value: 60000ms
pub const DEVICE_REBOOT_TIMEOUT: u64 = 60_000;

/// Timeout for manual card entry (milliseconds).
///
/// The terminal waits for a cardholder to key in the card number, so this
/// bound is driven by human interaction rather than device speed.
///
/// # Value: 90000ms
pub const MANUAL_ENTRY_TIMEOUT: u64 = 90_000;

// ============================================================================
// Recovery and Discovery
// ============================================================================

/// Timeout for a single device recovery attempt (milliseconds).
///
/// # Value: 10000ms
pub const DEVICE_RECOVERY_TIMEOUT: u64 = 10_000;

/// Timeout for probing a candidate device during discovery (milliseconds).
///
/// Probing is a connection attempt followed by an identity query, so it
/// shares the recovery bound.
///
/// # Value: 10000ms
pub const DEVICE_PROBE_TIMEOUT: u64 = DEVICE_RECOVERY_TIMEOUT;

// ============================================================================
// Manufacturer Ordering
// ============================================================================

/// Sort order value that removes a manufacturer from discovery.
///
/// # Value: -1
pub const DISABLED_SORT_ORDER: i32 = -1;

// ============================================================================
// Error Codes
// ============================================================================

/// Error code attached when a device call exceeds its timeout.
pub const ERROR_DEVICE_TIMEOUT: &str = "DEVICE_TIMEOUT";

/// Error code attached when a device call is cancelled.
pub const ERROR_DEVICE_CANCELLED: &str = "DEVICE_CANCELLED";

/// Error code attached when a device call fails.
pub const ERROR_DEVICE_FAULT: &str = "DEVICE_FAULT";

/// Error code attached when the requested device is not connected.
pub const ERROR_DEVICE_NOT_FOUND: &str = "DEVICE_NOT_FOUND";

/// Error code attached when the follow-up reboot fails.
pub const ERROR_REBOOT_FAILED: &str = "REBOOT_FAILED";

/// Error code attached when an artifact could not be staged for upload.
pub const ERROR_SFTP_HANDOFF_FAILED: &str = "SFTP_HANDOFF_FAILED";
