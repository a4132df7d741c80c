//! Lock + condition pair shared by the scheduler and every tile.
//!
//! Waiting and signalling both go through a live [`MonitorGuard`], so touching
//! the condition without holding the lock does not compile. The lock is not
//! reentrant: callers follow the scheduler → tile ordering and never take the
//! scheduler monitor while a tile guard is alive.

use std::{
	ops::{Deref, DerefMut},
	time::Duration,
};

use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct Monitor<T> {
	state: Mutex<T>,
	cond: Condvar,
}

impl<T> Monitor<T> {
	pub fn new(value: T) -> Self {
		Self {
			state: Mutex::new(value),
			cond: Condvar::new(),
		}
	}

	pub fn lock(&self) -> MonitorGuard<'_, T> {
		MonitorGuard {
			guard: self.state.lock(),
			cond: &self.cond,
		}
	}

	/// Runs `body` under the lock and wakes every waiter before unlocking.
	pub fn mutate_then_signal_all<R>(&self, body: impl FnOnce(&mut T) -> R) -> R {
		let mut guard = self.lock();
		let result = body(&mut guard);
		guard.signal_all();
		result
	}

	pub fn into_inner(self) -> T {
		self.state.into_inner()
	}
}

pub struct MonitorGuard<'a, T> {
	guard: MutexGuard<'a, T>,
	cond: &'a Condvar,
}

impl<T> MonitorGuard<'_, T> {
	/// Releases the lock, blocks until signalled, re-acquires.
	pub fn wait(&mut self) {
		self.cond.wait(&mut self.guard);
	}

	/// Like [`wait`](Self::wait) but gives up after `timeout`. Returns `false` on timeout.
	pub fn wait_for(&mut self, timeout: Duration) -> bool {
		!self.cond.wait_for(&mut self.guard, timeout).timed_out()
	}

	pub fn wait_while(&mut self, mut condition: impl FnMut(&mut T) -> bool) {
		while condition(&mut self.guard) {
			self.wait();
		}
	}

	pub fn signal_all(&self) -> usize {
		self.cond.notify_all()
	}

	pub fn signal_one(&self) -> bool {
		self.cond.notify_one()
	}
}

impl<T> Deref for MonitorGuard<'_, T> {
	type Target = T;

	fn deref(&self) -> &T {
		&self.guard
	}
}

impl<T> DerefMut for MonitorGuard<'_, T> {
	fn deref_mut(&mut self) -> &mut T {
		&mut self.guard
	}
}
