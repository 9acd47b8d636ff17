//! Monotonic tick source used by the probes.

use std::time::Duration;

/// Fixed tick frequency: one tick is one nanosecond.
pub const TICKS_PER_SECOND: u64 = 1_000_000_000;

/// Read the monotonic clock in ticks.
#[inline]
pub fn now_ticks() -> i64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC cannot fail with a valid pointer
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as i64)
        .wrapping_mul(TICKS_PER_SECOND as i64)
        .wrapping_add(ts.tv_nsec as i64)
}

/// Convert a tick count to a `Duration`
#[inline]
pub fn ticks_to_duration(ticks: u64) -> Duration {
    Duration::new(
        ticks / TICKS_PER_SECOND,
        (ticks % TICKS_PER_SECOND) as u32,
    )
}
