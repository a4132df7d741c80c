//! Lifecycle of the single shared graphics context.
//!
//! `ContextManager` is owned by the render thread. It moves between
//! not-started and started; `start` on a started manager and `finish` on a
//! stopped one are no-ops.

pub mod api;
pub mod chooser;
pub mod headless;

use std::{thread, time::Instant};

use tracing::{debug, info, trace, warn};

use crate::{
	config::{RenderConfig, SurfaceRetryPolicy},
	error::ContextError,
};
use api::{
	ConfigHandle, ContextHandle, DisplayHandle, ErrorCode, GraphicsApi, NativeDrawable, SurfaceAttrib,
	SurfaceHandle,
};
use chooser::ConfigChooser;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapOutcome {
	Success,
	ContextLost,
	Error(ErrorCode),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextSettings {
	pub client_version: i32,
	pub surface_retry: SurfaceRetryPolicy,
}

impl Default for ContextSettings {
	fn default() -> Self {
		Self::from(&RenderConfig::default())
	}
}

impl From<&RenderConfig> for ContextSettings {
	fn from(config: &RenderConfig) -> Self {
		Self {
			client_version: config.client_version,
			surface_retry: config.surface_retry,
		}
	}
}

#[derive(Clone, Copy, Debug)]
struct GraphicsContext {
	display: DisplayHandle,
	config: ConfigHandle,
	context: ContextHandle,
}

pub struct ContextManager {
	api: Box<dyn GraphicsApi>,
	chooser: Box<dyn ConfigChooser>,
	settings: ContextSettings,
	current: Option<GraphicsContext>,
}

impl ContextManager {
	pub fn new(
		api: impl GraphicsApi + 'static,
		chooser: impl ConfigChooser + 'static,
		settings: ContextSettings,
	) -> Self {
		Self {
			api: Box::new(api),
			chooser: Box::new(chooser),
			settings,
			current: None,
		}
	}

	pub fn is_started(&self) -> bool {
		self.current.is_some()
	}

	pub fn config(&self) -> Option<ConfigHandle> {
		self.current.map(|c| c.config)
	}

	pub fn context_handle(&self) -> Option<ContextHandle> {
		self.current.map(|c| c.context)
	}

	#[tracing::instrument(skip_all)]
	pub fn start(&mut self) -> Result<(), ContextError> {
		if self.current.is_some() {
			return Ok(());
		}
		let display = self.api.get_display().ok_or(ContextError::NoDisplay)?;
		let (major, minor) = self
			.api
			.initialize(display)
			.map_err(ContextError::Initialize)?;
		match self.create_context(display) {
			Ok(current) => {
				let client_version = self.api.context_client_version(display, current.context);
				info!(
					version = %format!("{major}.{minor}"),
					?client_version,
					context = ?current.context,
					"graphics context created"
				);
				self.current = Some(current);
				Ok(())
			}
			Err(e) => {
				self.api.terminate(display);
				Err(e)
			}
		}
	}

	fn create_context(&mut self, display: DisplayHandle) -> Result<GraphicsContext, ContextError> {
		let config = self.chooser.choose(self.api.as_mut(), display)?;
		debug!(?config, "config chosen");
		let context = self
			.api
			.create_context(display, config, self.settings.client_version)
			.map_err(ContextError::CreateContext)?;
		Ok(GraphicsContext {
			display,
			config,
			context,
		})
	}

	#[tracing::instrument(skip_all)]
	pub fn finish(&mut self) {
		let Some(current) = self.current.take() else {
			return;
		};
		self.api.destroy_context(current.display, current.context);
		self.api.terminate(current.display);
		info!(context = ?current.context, "graphics context released");
	}

	/// Creates a window surface, retrying while the platform refuses it
	/// transiently, until the retry deadline passes.
	pub fn create_surface(&mut self, drawable: NativeDrawable) -> Result<SurfaceHandle, ContextError> {
		let current = self.current.ok_or(ContextError::NotStarted)?;
		let retry = self.settings.surface_retry;
		let started = Instant::now();
		let mut attempts = 0;
		loop {
			attempts += 1;
			match self
				.api
				.create_window_surface(current.display, current.config, drawable)
			{
				Ok(surface) => return Ok(surface),
				Err(code) if code.is_transient() => {
					let elapsed = started.elapsed();
					if elapsed >= retry.deadline() {
						warn!(?drawable, attempts, ?elapsed, %code, "giving up on window surface");
						return Err(ContextError::SurfaceRetryExhausted { attempts, elapsed });
					}
					trace!(?drawable, attempts, %code, "window surface refused, retrying");
					thread::sleep(retry.interval().min(retry.deadline() - elapsed));
				}
				Err(code @ ErrorCode::BadNativeWindow) => return Err(ContextError::InvalidDrawable(code)),
				Err(code) => return Err(ContextError::CreateSurface(code)),
			}
		}
	}

	pub fn release_surface(&mut self, surface: SurfaceHandle) {
		match self.current {
			Some(current) => self.api.destroy_surface(current.display, surface),
			// Terminating the display already reclaimed it.
			None => warn!(?surface, "releasing surface after context finish"),
		}
	}

	pub fn make_current(&mut self, surface: SurfaceHandle) -> Result<(), ContextError> {
		self.bind(Some(surface))
	}

	pub fn make_no_surface_current(&mut self) -> Result<(), ContextError> {
		self.bind(None)
	}

	fn bind(&mut self, surface: Option<SurfaceHandle>) -> Result<(), ContextError> {
		let current = self.current.ok_or(ContextError::NotStarted)?;
		self
			.api
			.make_current(current.display, surface, current.context)
			.map_err(ContextError::MakeCurrent)
	}

	pub fn swap_buffers(&mut self, surface: SurfaceHandle) -> SwapOutcome {
		let Some(current) = self.current else {
			return SwapOutcome::Error(ErrorCode::NotInitialized);
		};
		match self.api.swap_buffers(current.display, surface) {
			Ok(()) => SwapOutcome::Success,
			Err(ErrorCode::ContextLost) => SwapOutcome::ContextLost,
			Err(code) => SwapOutcome::Error(code),
		}
	}

	/// -1 when the context is not started or the query fails.
	pub fn query_surface(&mut self, surface: SurfaceHandle, attrib: SurfaceAttrib) -> i32 {
		self
			.current
			.and_then(|current| self.api.query_surface(current.display, surface, attrib))
			.unwrap_or(-1)
	}
}
