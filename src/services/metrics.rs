use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

lazy_static! {
    pub static ref ANNOUNCEMENTS_CREATED: CounterVec = register_counter_vec!(
        "announcements_created_total",
        "Announcements stored, by type",
        &["type"]
    ).unwrap();

    pub static ref ANNOUNCEMENTS_DISABLED: CounterVec = register_counter_vec!(
        "announcements_disabled_total",
        "Disable requests accepted",
        &["had_message"]
    ).unwrap();

    pub static ref SUBMISSIONS_REJECTED: CounterVec = register_counter_vec!(
        "announcement_submissions_rejected_total",
        "Announcement submissions refused by the validation pipeline",
        &["kind"]
    ).unwrap();

    pub static ref RATE_LIMITED: CounterVec = register_counter_vec!(
        "api_rate_limited_total",
        "Requests answered with 429, by limiter tier",
        &["tier"]
    ).unwrap();

    pub static ref PUSH_SUBSCRIBERS: Gauge = register_gauge!(
        "announcement_push_subscribers",
        "WebSocket clients currently subscribed to announcement pushes"
    ).unwrap();
}

/// Registers every collector up front so `/metrics` lists them before
/// their first increment.
pub fn init() {
    lazy_static::initialize(&ANNOUNCEMENTS_CREATED);
    lazy_static::initialize(&ANNOUNCEMENTS_DISABLED);
    lazy_static::initialize(&SUBMISSIONS_REJECTED);
    lazy_static::initialize(&RATE_LIMITED);
    lazy_static::initialize(&PUSH_SUBSCRIBERS);
}
