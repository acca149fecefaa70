//! Wrapping millisecond timestamps and the clock seam.
//!
//! The controller never compares timestamps directly. Every elapsed-time
//! check is `now - mark` in modular `u32` arithmetic, so a counter rollover
//! (every ~49.7 days) yields the true elapsed duration instead of a huge or
//! negative value.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use link_arbiter_esp32::clock::Timestamp;
//!
//! let mark = Timestamp::from_millis(u32::MAX - 99);
//! let now = Timestamp::from_millis(100);
//! assert_eq!(now.elapsed_since(mark), Duration::from_millis(200));
//! ```

use std::fmt;
use std::time::Duration;

/// Monotonic millisecond counter value that wraps at `u32::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Timestamp(u32);

impl Timestamp {
    /// The counter origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Wrap a raw millisecond counter value.
    pub const fn from_millis(millis: u32) -> Self {
        Self(millis)
    }

    /// Raw millisecond counter value.
    pub const fn as_millis(self) -> u32 {
        self.0
    }

    /// Time elapsed from `mark` to `self`, modulo the counter width.
    pub fn elapsed_since(self, mark: Timestamp) -> Duration {
        Duration::from_millis(u64::from(self.0.wrapping_sub(mark.0)))
    }

    /// Timestamp `duration` after `self`, wrapping past the counter width.
    pub fn wrapping_add(self, duration: Duration) -> Self {
        // Truncation is the wrap.
        Self(self.0.wrapping_add(duration.as_millis() as u32))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Time source and blocking delay used by the controller.
///
/// Bounded waits inside bring-up and wired-loss recovery go through
/// [`Clock::delay`], which lets tests substitute a clock that advances
/// instantly.
pub trait Clock {
    /// Current counter value.
    fn now(&self) -> Timestamp;

    /// Block the caller for `duration`.
    fn delay(&mut self, duration: Duration);
}

/// Host clock backed by [`std::time::Instant`].
pub struct SystemClock {
    start: std::time::Instant,
    offset: u32,
}

impl SystemClock {
    /// Clock whose counter starts at zero.
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Clock whose counter starts at `offset` milliseconds.
    ///
    /// Starting close to `u32::MAX` exercises counter rollover within seconds.
    pub fn with_offset(offset: u32) -> Self {
        Self {
            start: std::time::Instant::now(),
            offset,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = self.start.elapsed().as_millis() as u32;
        Timestamp(self.offset.wrapping_add(millis))
    }

    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// ESP32 clock backed by the high-resolution `esp_timer`.
#[cfg(feature = "esp32")]
pub struct EspClock;

#[cfg(feature = "esp32")]
impl Clock for EspClock {
    fn now(&self) -> Timestamp {
        // esp_timer counts microseconds since boot as i64.
        let micros = unsafe { esp_idf_sys::esp_timer_get_time() };
        Timestamp((micros / 1000) as u32)
    }

    fn delay(&mut self, duration: Duration) {
        esp_idf_hal::delay::FreeRtos::delay_ms(duration.as_millis() as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_without_wrap() {
        let mark = Timestamp::from_millis(1_000);
        let now = Timestamp::from_millis(6_500);
        assert_eq!(now.elapsed_since(mark), Duration::from_millis(5_500));
    }

    #[test]
    fn test_elapsed_across_rollover() {
        let mark = Timestamp::from_millis(u32::MAX - 1_999);
        let now = Timestamp::from_millis(3_000);
        assert_eq!(now.elapsed_since(mark), Duration::from_millis(5_000));
    }

    #[test]
    fn test_elapsed_at_exact_rollover() {
        let mark = Timestamp::from_millis(u32::MAX);
        assert_eq!(
            Timestamp::ZERO.elapsed_since(mark),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_elapsed_same_instant_is_zero() {
        let t = Timestamp::from_millis(u32::MAX);
        assert_eq!(t.elapsed_since(t), Duration::ZERO);
    }

    #[test]
    fn test_elapsed_never_exceeds_counter_width() {
        // Every mark near the top of the range, observed just after the wrap,
        // must give a small elapsed value.
        for back in 0..64u32 {
            let mark = Timestamp::from_millis(u32::MAX - back);
            for forward in 0..64u32 {
                let now = Timestamp::from_millis(forward);
                let expected = u64::from(back) + u64::from(forward) + 1;
                assert_eq!(now.elapsed_since(mark).as_millis() as u64, expected);
            }
        }
    }

    #[test]
    fn test_wrapping_add() {
        let t = Timestamp::from_millis(u32::MAX - 10);
        let later = t.wrapping_add(Duration::from_millis(20));
        assert_eq!(later.as_millis(), 9);
        assert_eq!(later.elapsed_since(t), Duration::from_millis(20));
    }

    #[test]
    fn test_system_clock_offset_wraps() {
        let clock = SystemClock::with_offset(u32::MAX);
        let now = clock.now();
        // At most a few ms have passed; value is either MAX or already wrapped.
        assert!(now.elapsed_since(Timestamp::from_millis(u32::MAX)) < Duration::from_secs(5));
    }

    #[test]
    fn test_display() {
        assert_eq!(Timestamp::from_millis(42).to_string(), "42ms");
    }
}
