// src/util.rs

/// Nanoseconds on a steady monotonic clock.
#[inline]
pub fn now_nanos() -> u64 {
    #[cfg(target_os = "linux")]
    {
        use nix::time::{clock_gettime, ClockId};
        if let Ok(ts) = clock_gettime(ClockId::CLOCK_MONOTONIC_RAW) {
            return (ts.tv_sec() as u64) * 1_000_000_000 + (ts.tv_nsec() as u64);
        }
    }
    // Fallback portable monotonic
    use std::time::Instant;
    static START: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);
    START.elapsed().as_nanos() as u64
}

#[inline]
pub const fn ns_to_us(ns: u64) -> u64 {
    ns / 1000
}

#[inline]
pub const fn us_to_ns(us: u64) -> u64 {
    us * 1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_nanos_is_monotone() {
        let a = now_nanos();
        let b = now_nanos();
        assert!(b >= a);
        assert!(a > 0);
    }

    #[test]
    fn unit_conversions() {
        assert_eq!(ns_to_us(1_500), 1);
        assert_eq!(us_to_ns(10), 10_000);
        assert_eq!(ns_to_us(us_to_ns(123)), 123);
    }
}
