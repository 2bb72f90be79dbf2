//! Default values for configuration fields.

// Default value functions for serde
pub(crate) fn default_max_wait_ms() -> u64 {
    300_000
}
pub(crate) fn default_stale_ms() -> u64 {
    30_000
}
pub(crate) fn default_refresh_ms() -> u64 {
    10_000
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    500
}
pub(crate) fn default_waiting_notify_interval_ms() -> u64 {
    10_000
}
pub(crate) fn default_store_retry_attempts() -> u32 {
    8
}
pub(crate) fn default_store_retry_base_ms() -> u64 {
    20
}
pub(crate) fn default_true() -> bool {
    true
}
