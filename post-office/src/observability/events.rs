//! Canonical structured event names used across `post-office`.

// Routing and delivery events.
pub const ROUTE_OK: &str = "route_ok";
pub const ROUTE_NO_BINDINGS: &str = "route_no_bindings";
pub const ROUTE_NO_MATCH: &str = "route_no_match";
pub const ROUTE_UNKNOWN_ADDRESS: &str = "route_unknown_address";
pub const ROUTE_REJECTED_BY_FLOW_CONTROL: &str = "route_rejected_by_flow_control";
pub const DELIVER: &str = "deliver";
pub const SCHEDULE_OK: &str = "schedule_ok";
pub const WILDCARD_FANOUT: &str = "wildcard_fanout";

// Structural lifecycle events.
pub const DESTINATION_ADD_OK: &str = "destination_add_ok";
pub const DESTINATION_REMOVE_OK: &str = "destination_remove_ok";
pub const BINDING_ADD_OK: &str = "binding_add_ok";
pub const BINDING_ADD_FAILED: &str = "binding_add_failed";
pub const BINDING_REMOVE_OK: &str = "binding_remove_ok";
pub const BINDING_REMOVE_FAILED: &str = "binding_remove_failed";
pub const SEND_LOCK_CREATE: &str = "send_lock_create";
pub const ACTIVATION_START: &str = "activation_start";
pub const ACTIVATION_OK: &str = "activation_ok";

// Duplicate detection events.
pub const DUPLICATE_CACHE_CREATED: &str = "duplicate_cache_created";
pub const DUPLICATE_CACHE_LOADED: &str = "duplicate_cache_loaded";

// Startup, shutdown and recovery events.
pub const POST_OFFICE_START: &str = "post_office_start";
pub const POST_OFFICE_START_OK: &str = "post_office_start_ok";
pub const POST_OFFICE_START_FAILED: &str = "post_office_start_failed";
pub const POST_OFFICE_STOP: &str = "post_office_stop";
pub const RECOVERY_STAGE: &str = "recovery_stage";
pub const RECOVERY_COMPLETE: &str = "recovery_complete";

// Background runtime events.
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";
pub const EXPIRY_SCANNER_STARTED: &str = "expiry_scanner_started";
pub const EXPIRY_SCANNER_STOPPED: &str = "expiry_scanner_stopped";
pub const EXPIRY_SCAN_DONE: &str = "expiry_scan_done";
pub const EXPIRY_QUEUE_FAILED: &str = "expiry_queue_failed";
pub const EXPIRY_QUEUE_PANICKED: &str = "expiry_queue_panicked";
