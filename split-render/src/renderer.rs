//! Callbacks invoked on the render thread.

use crate::context::api::ConfigHandle;

/// Draws one tile. Every method runs on the render thread with the tile's
/// surface current, and only for that tile.
pub trait Renderer: Send {
	fn on_surface_created(&mut self, config: ConfigHandle);

	fn on_surface_changed(&mut self, width: i32, height: i32);

	fn on_draw_frame(&mut self);
}

/// Owner of state shared by every tile, such as a camera texture.
///
/// Both hooks run with the context current and no drawing surface bound.
pub trait ContextOwner: Send {
	/// Once per context lifetime, before any tile draws into it.
	fn on_context_created(&mut self) {}

	/// Once per tick in which at least one tile surface was (re)created,
	/// before that tile's `on_surface_created`.
	fn on_pre_draw(&mut self) {}
}

impl ContextOwner for () {}
