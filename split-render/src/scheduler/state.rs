use std::sync::Arc;

use crate::{
	config::{RenderConfig, RenderMode},
	error::RenderError,
};

/// Flags shared between the owner thread and the render thread. Only ever
/// touched under the scheduler monitor.
#[derive(Debug)]
pub struct SchedulerState {
	pub request_pause: bool,
	pub paused: bool,
	pub request_render: bool,
	pub render_complete: bool,
	pub request_exit: bool,
	pub exited: bool,
	pub lost_context: bool,
	pub render_mode: RenderMode,
	pub preserve_context_on_pause: bool,
	/// Why the render thread stopped, when it stopped on an error.
	pub failure: Option<Arc<str>>,
}

impl SchedulerState {
	pub fn new(config: &RenderConfig) -> Self {
		Self {
			request_pause: false,
			paused: false,
			request_render: false,
			render_complete: false,
			request_exit: false,
			exited: false,
			lost_context: false,
			render_mode: config.render_mode,
			preserve_context_on_pause: config.preserve_context_on_pause,
			failure: None,
		}
	}

	pub fn ready_to_draw(&self) -> bool {
		!self.paused && (self.request_render || self.render_mode == RenderMode::Continuous)
	}

	/// Adopts a pending pause request. Returns the new `paused` value when it flipped.
	pub fn take_pause_edge(&mut self) -> Option<bool> {
		if self.paused == self.request_pause {
			return None;
		}
		self.paused = self.request_pause;
		Some(self.paused)
	}

	/// Whether anything arrived that the next tick must look at right away.
	pub fn has_pending_request(&self) -> bool {
		self.request_exit || self.request_pause != self.paused || self.lost_context || self.request_render
	}

	pub fn exited_error(&self) -> RenderError {
		RenderError::ThreadExited {
			reason: self.failure.clone(),
		}
	}
}
