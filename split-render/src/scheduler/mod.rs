//! The render thread body.
//!
//! One tick reaps released tiles, applies pause/lost-context transitions under
//! the scheduler lock, then drops that lock and draws every tile under the
//! tile's own lock. Lock order is always scheduler, then tile; nothing the
//! draw phase learns is written back until its tile guard is gone.

pub mod handle;
pub mod state;

use std::{ops::ControlFlow, sync::Arc, thread, time::Duration};

use dashmap::DashMap;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, trace, warn};

use crate::{
	comms::render2owner::{RenderEvt, RenderEvtTx},
	config::RenderMode,
	context::{
		ContextManager, SwapOutcome,
		api::{SurfaceAttrib, format_error},
	},
	error::RenderError,
	ids::TileId,
	renderer::ContextOwner,
	surface::SurfaceResource,
	sync::Monitor,
};
use state::SchedulerState;

pub(crate) struct Shared {
	pub(crate) state: Monitor<SchedulerState>,
	pub(crate) tiles: DashMap<TileId, Arc<SurfaceResource>>,
}

impl Shared {
	pub(crate) fn new(state: SchedulerState) -> Self {
		Self {
			state: Monitor::new(state),
			tiles: DashMap::new(),
		}
	}

	/// Clones the tile handles out so no map shard stays locked while a tile lock is taken.
	pub(crate) fn snapshot(&self) -> Vec<Arc<SurfaceResource>> {
		self.tiles.iter().map(|entry| Arc::clone(entry.value())).collect()
	}

	pub(crate) fn tile(&self, id: TileId) -> Option<Arc<SurfaceResource>> {
		self.tiles.get(&id).map(|entry| Arc::clone(entry.value()))
	}
}

#[derive(Debug, Default)]
struct DrawPass {
	pre_draw_done: bool,
	drawn: usize,
	lost: bool,
}

pub(crate) struct RenderLoop {
	shared: Arc<Shared>,
	context: ContextManager,
	owner: Box<dyn ContextOwner>,
	events: RenderEvtTx,
	/// Whether `on_context_created` ran for the current context.
	context_announced: bool,
	idle_interval: Duration,
}

impl RenderLoop {
	pub(crate) fn new(
		shared: Arc<Shared>,
		context: ContextManager,
		owner: Box<dyn ContextOwner>,
		events: RenderEvtTx,
		idle_interval: Duration,
	) -> Self {
		Self {
			shared,
			context,
			owner,
			events,
			context_announced: false,
			idle_interval,
		}
	}

	#[tracing::instrument(skip_all)]
	pub(crate) fn run(mut self) -> Result<(), RenderError> {
		self.emit(RenderEvt::Started);
		let result = self.run_ticks();
		self.teardown(result.as_ref().err());
		result
	}

	fn run_ticks(&mut self) -> Result<(), RenderError> {
		while let ControlFlow::Continue(()) = self.tick()? {}
		Ok(())
	}

	fn tick(&mut self) -> Result<ControlFlow<()>, RenderError> {
		self.reap_released();

		let shared = Arc::clone(&self.shared);
		let mut state = shared.state.lock();
		if state.request_exit {
			return Ok(ControlFlow::Break(()));
		}

		if let Some(paused) = state.take_pause_edge() {
			if paused {
				self.release_all_surfaces();
				if !state.preserve_context_on_pause {
					self.release_context();
				}
				info!("render thread paused");
				self.emit(RenderEvt::Paused);
			} else {
				info!("render thread resumed");
				self.emit(RenderEvt::Resumed);
			}
			state.signal_all();
		}

		if std::mem::take(&mut state.lost_context) {
			debug!("recovering from lost context");
			self.release_all_surfaces();
			self.release_context();
			state.signal_all();
		}

		if !state.ready_to_draw() {
			state.wait();
			return Ok(ControlFlow::Continue(()));
		}

		if !self.context.is_started() {
			self.context.start()?;
			self.emit(RenderEvt::ContextCreated);
			state.signal_all();
		}
		self.release_resized_surfaces();
		state.request_render = false;
		drop(state);

		let pass = self.draw_tiles()?;

		let mut state = shared.state.lock();
		if pass.lost {
			// The interrupted frame is redrawn on the rebuilt context.
			state.lost_context = true;
			state.request_render = true;
		} else {
			state.render_complete = true;
		}
		state.signal_all();
		if pass.drawn == 0
			&& state.render_mode == RenderMode::Continuous
			&& !state.has_pending_request()
		{
			state.wait_for(self.idle_interval);
		}
		Ok(ControlFlow::Continue(()))
	}

	fn draw_tiles(&mut self) -> Result<DrawPass, RenderError> {
		let mut pass = DrawPass::default();
		if !self.context_announced {
			if !self.bind_no_surface(&mut pass)? {
				return Ok(pass);
			}
			self.owner.on_context_created();
			self.context_announced = true;
		}

		for tile in self.shared.snapshot() {
			let tile_id = tile.id();
			let mut target = tile.lock();
			if target.release_requested() {
				target.release(&mut self.context);
				target.signal_all();
				continue;
			}

			// Resized after the pre-draw sweep; the surface must follow before the renderer hears of it.
			if target.size_changed() && target.release(&mut self.context) {
				trace!(%tile_id, size = ?target.size(), "surface released for late resize");
			}

			let created = target.create_window_surface_if_absent(&mut self.context)?;
			if created {
				let width = target.surface_dimension(&mut self.context, SurfaceAttrib::Width);
				let height = target.surface_dimension(&mut self.context, SurfaceAttrib::Height);
				debug!(%tile_id, width, height, "tile surface created");
				if !pass.pre_draw_done {
					if !self.bind_no_surface(&mut pass)? {
						break;
					}
					self.owner.on_pre_draw();
					pass.pre_draw_done = true;
				}
			}
			if !target.has_surface() {
				warn!(%tile_id, "tile has no surface after creation attempt, skipping");
				continue;
			}

			match target.make_current(&mut self.context) {
				Ok(()) => {}
				Err(e) if e.is_context_lost() => {
					info!(%tile_id, "graphics context lost");
					self.emit(RenderEvt::ContextLost);
					pass.lost = true;
					break;
				}
				Err(e) => {
					warn!(%tile_id, "make current failed, releasing tile: {e}");
					target.request_release();
					target.signal_all();
					continue;
				}
			}

			if created && let Some(config) = self.context.config() {
				target.renderer_mut().on_surface_created(config);
			}
			target.deliver_size_change();
			target.renderer_mut().on_draw_frame();

			match target.swap(&mut self.context) {
				SwapOutcome::Success => {
					trace!(%tile_id, "frame swapped");
					pass.drawn += 1;
				}
				SwapOutcome::ContextLost => {
					info!(%tile_id, "graphics context lost");
					self.emit(RenderEvt::ContextLost);
					pass.lost = true;
				}
				SwapOutcome::Error(code) => {
					warn!(%tile_id, "{}", format_error("eglSwapBuffers", code));
					target.request_release();
					self.emit(RenderEvt::SwapFailed { tile_id, code });
				}
			}
			target.signal_all();
			if pass.lost {
				break;
			}
		}
		Ok(pass)
	}

	/// Binds the context with no drawing surface. Returns `false` when the
	/// context turned out to be lost.
	fn bind_no_surface(&mut self, pass: &mut DrawPass) -> Result<bool, RenderError> {
		match self.context.make_no_surface_current() {
			Ok(()) => Ok(true),
			Err(e) if e.is_context_lost() => {
				info!("graphics context lost while binding without surface");
				self.emit(RenderEvt::ContextLost);
				pass.lost = true;
				Ok(false)
			}
			Err(e) => Err(e.into()),
		}
	}

	/// Releases and forgets every tile whose owner asked for it.
	fn reap_released(&mut self) {
		for tile in self.shared.snapshot() {
			if !tile.lock().release_requested() {
				continue;
			}
			tile.release(&mut self.context);
			let tile_id = tile.id();
			self.shared.tiles.remove(&tile_id);
			debug!(%tile_id, "tile released");
			self.emit(RenderEvt::TileReleased { tile_id });
		}
	}

	fn release_resized_surfaces(&mut self) {
		for tile in self.shared.snapshot() {
			let mut target = tile.lock();
			if target.size_changed() && target.release(&mut self.context) {
				trace!(tile_id = %tile.id(), size = ?target.size(), "surface released for resize");
				target.signal_all();
			}
		}
	}

	fn release_all_surfaces(&mut self) {
		for tile in self.shared.snapshot() {
			tile.release(&mut self.context);
		}
	}

	fn release_context(&mut self) {
		if !self.context.is_started() {
			return;
		}
		self.context.finish();
		self.context_announced = false;
		self.emit(RenderEvt::ContextReleased);
	}

	#[tracing::instrument(skip_all)]
	fn teardown(&mut self, failure: Option<&RenderError>) {
		self.release_all_surfaces();
		self.release_context();
		self.shared.tiles.clear();
		let reason: Option<Arc<str>> = failure.map(|e| Arc::from(e.to_string()));
		if let Some(reason) = &reason {
			error!(%reason, "render thread failed");
			self.emit(RenderEvt::FatalError {
				reason: Arc::clone(reason),
			});
		}
		self.shared.state.mutate_then_signal_all(|state| {
			state.exited = true;
			state.failure = reason;
		});
		info!("render thread exited");
		self.emit(RenderEvt::Exited);
	}

	fn emit(&self, event: RenderEvt) {
		match self.events.try_send(event) {
			Ok(()) => {}
			Err(TrySendError::Full(event)) => warn!(?event, "owner event channel full, dropping event"),
			Err(TrySendError::Closed(_)) => {}
		}
	}
}

/// Marks the scheduler exited when the render thread unwinds without
/// reaching teardown, so blocked callers never wait on a dead thread.
pub(crate) struct ExitSignal(pub(crate) Arc<Shared>);

impl Drop for ExitSignal {
	fn drop(&mut self) {
		let panicked = thread::panicking();
		self.0.state.mutate_then_signal_all(|state| {
			if state.exited {
				return;
			}
			state.exited = true;
			if panicked && state.failure.is_none() {
				state.failure = Some(Arc::from("render thread panicked"));
			}
		});
	}
}
