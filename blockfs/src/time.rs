//! The injected wall-clock capability: a 32-bit seconds value used only to stamp
//! inode modification times.

/// Produces the current time as seconds since an arbitrary epoch.
pub trait Clock {
	/// Returns the current time.
	fn now(&self) -> u32;
}

/// The default clock, backed by the host system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> u32 {
		utils::util::get_timestamp().as_secs() as u32
	}
}

/// A clock that always returns a fixed value, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u32);

impl Clock for FixedClock {
	fn now(&self) -> u32 {
		self.0
	}
}
