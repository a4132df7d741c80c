//! Per-tile drawing surface and the intent flags the owner thread sets on it.

use std::{
	fmt,
	time::{Duration, Instant},
};

use crate::{
	context::{
		ContextManager, SwapOutcome,
		api::{ErrorCode, NativeDrawable, SurfaceAttrib, SurfaceHandle},
	},
	error::ContextError,
	ids::TileId,
	renderer::Renderer,
	sync::{Monitor, MonitorGuard},
};

/// Mutable state of one tile, only reachable through its [`SurfaceResource`] lock.
pub struct RenderTarget {
	renderer: Box<dyn Renderer>,
	drawable: NativeDrawable,
	width: i32,
	height: i32,
	size_changed: bool,
	release_requested: bool,
	surface: Option<SurfaceHandle>,
}

impl RenderTarget {
	fn new(renderer: Box<dyn Renderer>, drawable: NativeDrawable, width: i32, height: i32) -> Self {
		Self {
			renderer,
			drawable,
			width,
			height,
			// The renderer has never been told its size.
			size_changed: true,
			release_requested: false,
			surface: None,
		}
	}

	/// Returns whether the size actually changed.
	pub fn set_size(&mut self, width: i32, height: i32) -> bool {
		if width == self.width && height == self.height {
			return false;
		}
		self.width = width;
		self.height = height;
		self.size_changed = true;
		true
	}

	pub fn size(&self) -> (i32, i32) {
		(self.width, self.height)
	}

	pub fn size_changed(&self) -> bool {
		self.size_changed
	}

	pub fn drawable(&self) -> NativeDrawable {
		self.drawable
	}

	pub fn has_surface(&self) -> bool {
		self.surface.is_some()
	}

	pub fn request_release(&mut self) {
		self.release_requested = true;
	}

	pub fn release_requested(&self) -> bool {
		self.release_requested
	}

	pub fn renderer_mut(&mut self) -> &mut dyn Renderer {
		self.renderer.as_mut()
	}

	/// Creates the surface unless one exists. Returns whether it was created now.
	pub fn create_window_surface_if_absent(
		&mut self,
		ctx: &mut ContextManager,
	) -> Result<bool, ContextError> {
		if self.surface.is_some() {
			return Ok(false);
		}
		self.surface = Some(ctx.create_surface(self.drawable)?);
		Ok(true)
	}

	/// Returns whether a surface was destroyed.
	pub fn release(&mut self, ctx: &mut ContextManager) -> bool {
		match self.surface.take() {
			Some(surface) => {
				ctx.release_surface(surface);
				true
			}
			None => false,
		}
	}

	pub fn make_current(&self, ctx: &mut ContextManager) -> Result<(), ContextError> {
		let surface = self
			.surface
			.ok_or(ContextError::MakeCurrent(ErrorCode::BadSurface))?;
		ctx.make_current(surface)
	}

	pub fn swap(&self, ctx: &mut ContextManager) -> SwapOutcome {
		match self.surface {
			Some(surface) => ctx.swap_buffers(surface),
			None => SwapOutcome::Error(ErrorCode::BadSurface),
		}
	}

	/// Live surface width or height, -1 without a surface.
	pub fn surface_dimension(&self, ctx: &mut ContextManager, attrib: SurfaceAttrib) -> i32 {
		self
			.surface
			.map_or(-1, |surface| ctx.query_surface(surface, attrib))
	}

	/// Tells the renderer about a pending size change, exactly once per change.
	pub(crate) fn deliver_size_change(&mut self) {
		if self.size_changed {
			self.renderer.on_surface_changed(self.width, self.height);
			self.size_changed = false;
		}
	}
}

impl fmt::Debug for RenderTarget {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RenderTarget")
			.field("drawable", &self.drawable)
			.field("has_surface", &self.has_surface())
			.field("width", &self.width)
			.field("height", &self.height)
			.field("size_changed", &self.size_changed)
			.field("release_requested", &self.release_requested)
			.finish()
	}
}

pub struct SurfaceResource {
	id: TileId,
	target: Monitor<RenderTarget>,
}

impl SurfaceResource {
	pub fn new(
		id: TileId,
		renderer: Box<dyn Renderer>,
		drawable: NativeDrawable,
		width: i32,
		height: i32,
	) -> Self {
		Self {
			id,
			target: Monitor::new(RenderTarget::new(renderer, drawable, width, height)),
		}
	}

	pub fn id(&self) -> TileId {
		self.id
	}

	pub fn lock(&self) -> MonitorGuard<'_, RenderTarget> {
		self.target.lock()
	}

	pub fn set_size(&self, width: i32, height: i32) -> bool {
		self
			.target
			.mutate_then_signal_all(|target| target.set_size(width, height))
	}

	pub fn request_release(&self) {
		self.target.mutate_then_signal_all(RenderTarget::request_release);
	}

	pub fn release(&self, ctx: &mut ContextManager) -> bool {
		self.target.mutate_then_signal_all(|target| target.release(ctx))
	}

	pub fn has_surface(&self) -> bool {
		self.target.lock().has_surface()
	}

	/// Blocks until the render thread has destroyed this tile's surface or
	/// `timeout` passes. Returns whether the surface is gone.
	pub fn wait_released_for(&self, timeout: Duration) -> bool {
		let deadline = Instant::now() + timeout;
		let mut target = self.target.lock();
		while target.has_surface() {
			let now = Instant::now();
			if now >= deadline {
				return false;
			}
			target.wait_for(deadline - now);
		}
		true
	}
}

impl fmt::Debug for SurfaceResource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SurfaceResource")
			.field("id", &self.id)
			.field("target", &*self.target.lock())
			.finish()
	}
}
