//! Blocking API used by the thread that owns the tiles.

use std::{
	sync::Arc,
	thread::{self, JoinHandle},
	time::Duration,
};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{ExitSignal, RenderLoop, Shared, state::SchedulerState};
use crate::{
	comms::channels::{Channels, OwnerEnd},
	config::{RenderConfig, RenderMode},
	context::{
		ContextManager, ContextSettings,
		api::{GraphicsApi, NativeDrawable},
		chooser::{ComponentSizeChooser, ConfigChooser},
	},
	error::RenderError,
	ids::TileId,
	renderer::{ContextOwner, Renderer},
	surface::SurfaceResource,
	sync::MonitorGuard,
};

/// How often a caller blocked on a tile release re-checks that the render
/// thread is still alive.
const RELEASE_POLL: Duration = Duration::from_millis(50);

/// Owning handle of a render thread. Dropping it asks the thread to exit and joins it.
pub struct RenderThread {
	shared: Arc<Shared>,
	thread: Mutex<Option<JoinHandle<Result<(), RenderError>>>>,
}

impl RenderThread {
	/// Spawns a render thread choosing its config by `config.color`.
	pub fn spawn(
		config: &RenderConfig,
		api: impl GraphicsApi + 'static,
		owner: impl ContextOwner + 'static,
	) -> Result<(Self, OwnerEnd), RenderError> {
		Self::spawn_with_chooser(config, api, ComponentSizeChooser::new(config.color), owner)
	}

	pub fn spawn_with_chooser(
		config: &RenderConfig,
		api: impl GraphicsApi + 'static,
		chooser: impl ConfigChooser + 'static,
		owner: impl ContextOwner + 'static,
	) -> Result<(Self, OwnerEnd), RenderError> {
		let (owner_end, rendering_end) = Channels::with_capacity(config.event_capacity).split();
		let shared = Arc::new(Shared::new(SchedulerState::new(config)));
		let context = ContextManager::new(api, chooser, ContextSettings::from(config));
		let render_loop = RenderLoop::new(
			Arc::clone(&shared),
			context,
			Box::new(owner),
			rendering_end.into_parts(),
			config.idle_interval(),
		);
		let exit_signal = ExitSignal(Arc::clone(&shared));
		let thread = thread::Builder::new()
			.name(config.thread_name.clone())
			.spawn(move || {
				let _exit_signal = exit_signal;
				render_loop.run()
			})
			.map_err(RenderError::Spawn)?;
		debug!(thread = %config.thread_name, "render thread spawned");
		Ok((
			Self {
				shared,
				thread: Mutex::new(Some(thread)),
			},
			owner_end,
		))
	}

	/// Starts tracking a new tile. Its surface is created on the next draw tick.
	pub fn notify_surface_created(
		&self,
		renderer: impl Renderer + 'static,
		drawable: NativeDrawable,
		width: i32,
		height: i32,
	) -> Result<TileId, RenderError> {
		self.ensure_running()?;
		let tile_id = TileId::rand();
		let tile = SurfaceResource::new(tile_id, Box::new(renderer), drawable, width, height);
		self.shared.tiles.insert(tile_id, Arc::new(tile));
		debug!(%tile_id, ?drawable, width, height, "tile added");
		self.request_render()?;
		Ok(tile_id)
	}

	pub fn notify_surface_changed(&self, tile_id: TileId, width: i32, height: i32) -> Result<(), RenderError> {
		let tile = self.tile(tile_id)?;
		if tile.set_size(width, height) {
			debug!(%tile_id, width, height, "tile resized");
			self.request_render()?;
		}
		Ok(())
	}

	/// Marks the tile for release. The render thread destroys its surface and
	/// forgets it on its next tick.
	///
	/// A tile the render thread already dropped, for example after a failed
	/// swap, is treated as destroyed.
	pub fn notify_surface_destroyed(&self, tile_id: TileId) -> Result<(), RenderError> {
		let Some(tile) = self.tracked_tile(tile_id)? else {
			return Ok(());
		};
		tile.request_release();
		self.wake()
	}

	/// Like [`notify_surface_destroyed`](Self::notify_surface_destroyed), but
	/// returns only once the tile's drawing surface is gone.
	pub fn notify_surface_destroyed_and_wait(&self, tile_id: TileId) -> Result<(), RenderError> {
		let Some(tile) = self.tracked_tile(tile_id)? else {
			return Ok(());
		};
		tile.request_release();
		self.wake()?;
		while !tile.wait_released_for(RELEASE_POLL) {
			self.ensure_running()?;
		}
		Ok(())
	}

	/// Blocks until the render thread has released its surfaces and is paused.
	pub fn pause(&self) -> Result<(), RenderError> {
		let mut state = self.running_state()?;
		state.request_pause = true;
		state.signal_all();
		state.wait_while(|s| !s.exited && !s.paused);
		Self::unless_exited(&state)
	}

	/// Blocks until the render thread is unpaused and has run a draw tick.
	pub fn resume(&self) -> Result<(), RenderError> {
		let mut state = self.running_state()?;
		state.request_pause = false;
		state.request_render = true;
		state.render_complete = false;
		state.signal_all();
		state.wait_while(|s| !s.exited && (s.paused || !s.render_complete));
		Self::unless_exited(&state)
	}

	/// Asks for one more draw tick. Only needed in [`RenderMode::OnDemand`].
	pub fn request_render(&self) -> Result<(), RenderError> {
		let mut state = self.running_state()?;
		state.request_render = true;
		state.signal_all();
		Ok(())
	}

	pub fn set_render_mode(&self, mode: RenderMode) -> Result<(), RenderError> {
		let mut state = self.running_state()?;
		state.render_mode = mode;
		state.signal_all();
		Ok(())
	}

	/// Takes effect on the next pause.
	pub fn set_preserve_context_on_pause(&self, preserve: bool) -> Result<(), RenderError> {
		let mut state = self.running_state()?;
		state.preserve_context_on_pause = preserve;
		state.signal_all();
		Ok(())
	}

	/// Asks the render thread to tear down, waits for it, and returns how it ended.
	///
	/// Calling it again after the thread was joined reports the stored failure, if any.
	pub fn request_exit_and_wait(&self) -> Result<(), RenderError> {
		{
			let mut state = self.shared.state.lock();
			state.request_exit = true;
			state.signal_all();
			state.wait_while(|s| !s.exited);
		}
		let Some(thread) = self.thread.lock().take() else {
			let state = self.shared.state.lock();
			return match state.failure {
				Some(_) => Err(state.exited_error()),
				None => Ok(()),
			};
		};
		match thread.join() {
			Ok(result) => result,
			Err(_) => Err(RenderError::ThreadPanicked),
		}
	}

	pub fn is_paused(&self) -> bool {
		self.shared.state.lock().paused
	}

	pub fn is_exited(&self) -> bool {
		self.shared.state.lock().exited
	}

	pub fn render_mode(&self) -> RenderMode {
		self.shared.state.lock().render_mode
	}

	pub fn tile_count(&self) -> usize {
		self.shared.tiles.len()
	}

	pub fn contains_tile(&self, tile_id: TileId) -> bool {
		self.shared.tiles.contains_key(&tile_id)
	}

	/// Why the render thread stopped, once it stopped on an error.
	pub fn failure(&self) -> Option<Arc<str>> {
		self.shared.state.lock().failure.clone()
	}

	fn tile(&self, tile_id: TileId) -> Result<Arc<SurfaceResource>, RenderError> {
		self.tracked_tile(tile_id)?.ok_or(RenderError::UnknownTile(tile_id))
	}

	fn tracked_tile(&self, tile_id: TileId) -> Result<Option<Arc<SurfaceResource>>, RenderError> {
		self.ensure_running()?;
		let tile = self.shared.tile(tile_id);
		if tile.is_none() {
			debug!(%tile_id, "tile no longer tracked");
		}
		Ok(tile)
	}

	fn wake(&self) -> Result<(), RenderError> {
		self.running_state()?.signal_all();
		Ok(())
	}

	fn ensure_running(&self) -> Result<(), RenderError> {
		self.running_state().map(drop)
	}

	fn running_state(&self) -> Result<MonitorGuard<'_, SchedulerState>, RenderError> {
		let state = self.shared.state.lock();
		if state.exited || state.request_exit {
			return Err(state.exited_error());
		}
		Ok(state)
	}

	fn unless_exited(state: &SchedulerState) -> Result<(), RenderError> {
		if state.exited {
			return Err(state.exited_error());
		}
		Ok(())
	}
}

impl Drop for RenderThread {
	fn drop(&mut self) {
		if self.thread.get_mut().is_none() {
			return;
		}
		if let Err(e) = self.request_exit_and_wait() {
			warn!("render thread ended with error: {e}");
		}
	}
}
