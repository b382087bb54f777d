//! Lifecycle and perf invariants, with a record of which ones have fired.
//!
//! Every check panics when its condition is false. With the `ppt` feature a
//! passing check is also recorded, so a test can drive the public API and then
//! demand that a list of invariants was actually exercised.

#[cfg(feature = "ppt")]
use lazy_static::lazy_static;
#[cfg(feature = "ppt")]
use parking_lot::Mutex;
#[cfg(feature = "ppt")]
use std::collections::BTreeSet;

pub const STAGE_ORDER: u32 = 1;
pub const VALIDATION_GATE: u32 = 2;
pub const SCHEMA_CHECKED: u32 = 3;
pub const OUTPUT_CAPACITY: u32 = 4;
pub const FAILURE_TERMINAL: u32 = 5;
pub const PANIC_CONTAINED: u32 = 6;
pub const PERF_TIMER_MONOTONIC: u32 = 7;
pub const PERF_SETUP_UNTIMED: u32 = 8;
pub const PERF_STATISTIC_BOUNDED: u32 = 9;

/// Symbolic name of an invariant id, `"UNKNOWN"` for ids outside the table.
pub const fn invariant_name(id: u32) -> &'static str {
    match id {
        STAGE_ORDER => "STAGE_ORDER",
        VALIDATION_GATE => "VALIDATION_GATE",
        SCHEMA_CHECKED => "SCHEMA_CHECKED",
        OUTPUT_CAPACITY => "OUTPUT_CAPACITY",
        FAILURE_TERMINAL => "FAILURE_TERMINAL",
        PANIC_CONTAINED => "PANIC_CONTAINED",
        PERF_TIMER_MONOTONIC => "PERF_TIMER_MONOTONIC",
        PERF_SETUP_UNTIMED => "PERF_SETUP_UNTIMED",
        PERF_STATISTIC_BOUNDED => "PERF_STATISTIC_BOUNDED",
        _ => "UNKNOWN",
    }
}

fn violation(id: u32, message: &str, context: Option<&str>) -> String {
    let name = invariant_name(id);
    match context {
        Some(at) => format!("invariant {name} violated at {at}: {message}"),
        None => format!("invariant {name} violated: {message}"),
    }
}

#[cfg(feature = "ppt")]
lazy_static! {
    static ref FIRED: Mutex<BTreeSet<u32>> = Mutex::new(BTreeSet::new());
}

/// Panic with a named diagnostic unless `condition` holds; record the id when it does.
pub(crate) fn assert_invariant(id: u32, condition: bool, message: &str, context: Option<&str>) {
    if !condition {
        let report = violation(id, message, context);
        tracing::error!(invariant = invariant_name(id), "{report}");
        panic!("{report}");
    }
    #[cfg(feature = "ppt")]
    FIRED.lock().insert(id);
}

/// Panic naming every id in `required` that has not fired since the last clear.
#[cfg(feature = "ppt")]
pub fn contract_test(label: &str, required: &[u32]) {
    let missing: Vec<&str> = {
        let fired = FIRED.lock();
        required
            .iter()
            .filter(|&&id| !fired.contains(&id))
            .map(|&id| invariant_name(id))
            .collect()
    };
    if !missing.is_empty() {
        panic!("contract '{label}' never exercised: {}", missing.join(", "));
    }
}

#[cfg(not(feature = "ppt"))]
pub fn contract_test(_label: &str, _required: &[u32]) {}

/// Forget every recorded id.
#[cfg(feature = "ppt")]
pub fn clear_invariant_log() {
    FIRED.lock().clear();
}

#[cfg(not(feature = "ppt"))]
pub fn clear_invariant_log() {}
