/// Ticks of 100 ns since the agent was initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    /// Ticks per microsecond.
    const TICKS_PER_US: u64 = 10;

    #[inline]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(&self) -> u64 {
        self.0
    }

    /// Whole microseconds elapsed since `earlier`.
    ///
    /// Zero if `earlier` is in the future.
    #[inline]
    pub fn micros_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0) / Self::TICKS_PER_US
    }
}

/// The monotonic clock of the agent, advanced
/// only by the firmware through `process`.
#[derive(Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timebase {
    now: Timestamp,
}

impl Timebase {
    pub const fn new() -> Self {
        Self {
            now: Timestamp::ZERO,
        }
    }

    /// Advance the clock by `timestep_100ns`.
    #[inline]
    pub fn step(&mut self, timestep_100ns: u32) {
        self.now = Timestamp(self.now.0.saturating_add(u64::from(timestep_100ns)));
    }

    #[inline]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Whether at least `timeout_us` elapsed since `since`.
    ///
    /// A timeout of zero never expires.
    pub fn has_expired(&self, since: Timestamp, timeout_us: u32) -> bool {
        timeout_us != 0 && self.now.micros_since(since) >= u64::from(timeout_us)
    }
}
