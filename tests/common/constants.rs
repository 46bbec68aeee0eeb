/// Maximum time to wait for the admin server to accept requests
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between readiness checks
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

pub const JOB_NAMES: [&str; 5] = [
    "rfm_scoring",
    "birthday_messages",
    "inactivity_messages",
    "recurring_tasks",
    "message_worker",
];
