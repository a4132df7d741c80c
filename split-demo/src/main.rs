//! Split camera preview: a column of color tiles drawn by one render thread,
//! sharing a simulated camera texture refreshed before each batch of new surfaces.

use std::{
	error::Error,
	sync::{
		Arc,
		atomic::{AtomicBool, Ordering},
	},
	thread,
	time::Duration,
};

use split_render::{
	ConfigHandle, ContextOwner, HeadlessApi, NativeDrawable, RenderConfig, RenderError, RenderEvt,
	RenderThread, Renderer, TileId,
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const TILE_COUNT: usize = 10;
const PREVIEW_SIZE: (i32, i32) = (320, 240);
const VSYNC: Duration = Duration::from_millis(16);

/// Fills its tile with red, green or blue depending on its position.
struct ColorTile {
	position: usize,
	viewport: (i32, i32),
	frames: u64,
}

impl ColorTile {
	fn new(position: usize) -> Self {
		Self {
			position,
			viewport: (0, 0),
			frames: 0,
		}
	}

	fn clear_color(&self) -> [f32; 4] {
		let channel = |n| if self.position % 3 == n { 1.0 } else { 0.0 };
		[channel(0), channel(1), channel(2), 1.0]
	}
}

impl Renderer for ColorTile {
	fn on_surface_created(&mut self, config: ConfigHandle) {
		debug!(position = self.position, ?config, "tile surface created");
	}

	fn on_surface_changed(&mut self, width: i32, height: i32) {
		debug!(position = self.position, width, height, "tile viewport changed");
		self.viewport = (width, height);
	}

	fn on_draw_frame(&mut self) {
		self.frames += 1;
		if self.frames % 60 == 0 {
			debug!(
				position = self.position,
				frames = self.frames,
				color = ?self.clear_color(),
				viewport = ?self.viewport,
				"tile cleared"
			);
		}
	}
}

/// Shared preview texture, marked dirty by the frame source whenever a new
/// camera frame lands.
struct CameraTexture {
	dirty: Arc<AtomicBool>,
	allocated: bool,
	updates: u64,
}

impl CameraTexture {
	fn new() -> (Self, Arc<AtomicBool>) {
		let dirty = Arc::new(AtomicBool::new(false));
		let texture = Self {
			dirty: Arc::clone(&dirty),
			allocated: false,
			updates: 0,
		};
		(texture, dirty)
	}
}

impl ContextOwner for CameraTexture {
	fn on_context_created(&mut self) {
		info!(reallocated = self.allocated, "camera texture allocated");
		self.allocated = true;
	}

	fn on_pre_draw(&mut self) {
		if self.dirty.swap(false, Ordering::AcqRel) {
			self.updates += 1;
			debug!(updates = self.updates, "camera texture updated");
		}
	}
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
	init_tracing();
	let config = load_config()?;
	info!(?config, "starting split preview");

	let api = HeadlessApi::new();
	api.set_swap_interval(VSYNC);
	let (camera, dirty) = CameraTexture::new();
	let (render, owner) = RenderThread::spawn(&config, api.clone(), camera)?;
	let render = Arc::new(render);

	let mut events = owner.into_parts();
	let event_task = tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			match event {
				RenderEvt::FatalError { reason } => error!(%reason, "render thread failed"),
				RenderEvt::SwapFailed { tile_id, code } => warn!(%tile_id, %code, "tile dropped"),
				RenderEvt::Exited => {
					info!("render thread exited");
					break;
				}
				other => debug!(event = ?other, "render event"),
			}
		}
	});

	let frame_source = tokio::spawn(async move {
		loop {
			tokio::time::sleep(Duration::from_millis(rand::random_range(25..40))).await;
			dirty.store(true, Ordering::Release);
		}
	});

	let scenario = {
		let render = Arc::clone(&render);
		let api = api.clone();
		tokio::task::spawn_blocking(move || run_scenario(&render, &api))
	};
	let outcome = scenario.await?;
	frame_source.abort();
	if let Err(e) = &outcome {
		error!("scenario failed: {e}");
	}
	if let Err(e) = render.request_exit_and_wait() {
		error!("render thread ended with error: {e}");
	}
	event_task.await?;

	let stats = api.stats();
	info!(
		swaps = stats.swaps,
		surfaces_created = stats.surfaces_created,
		surfaces_destroyed = stats.surfaces_destroyed,
		contexts_created = stats.contexts_created,
		"split preview finished"
	);
	outcome.map_err(Into::into)
}

/// Drives the render thread the way a scrolling list of previews would.
fn run_scenario(render: &RenderThread, api: &HeadlessApi) -> Result<(), RenderError> {
	let (width, height) = PREVIEW_SIZE;
	let mut tiles: Vec<(TileId, NativeDrawable)> = Vec::with_capacity(TILE_COUNT);
	for position in 0..TILE_COUNT {
		let drawable = api.create_drawable(width, height);
		let tile = render.notify_surface_created(ColorTile::new(position), drawable, width, height)?;
		tiles.push((tile, drawable));
	}
	render.resume()?;
	info!(tiles = tiles.len(), "tiles attached");
	thread::sleep(Duration::from_millis(300));

	for &(tile, drawable) in tiles.iter().take(3) {
		api.resize_drawable(drawable, width * 2, height * 2);
		render.notify_surface_changed(tile, width * 2, height * 2)?;
	}
	thread::sleep(Duration::from_millis(200));

	render.pause()?;
	info!("preview paused");
	thread::sleep(Duration::from_millis(100));
	render.resume()?;
	info!("preview resumed");
	thread::sleep(Duration::from_millis(200));

	for (tile, _) in tiles.drain(..4) {
		render.notify_surface_destroyed_and_wait(tile)?;
	}
	info!(remaining = render.tile_count(), "tiles scrolled away");
	thread::sleep(Duration::from_millis(200));
	Ok(())
}

fn init_tracing() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let registry = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer());
	#[cfg(feature = "tracy")]
	let registry = registry.with(tracing_tracy::TracyLayer::default());
	registry.init();
}

/// Reads a JSON config from the first argument, or falls back to the environment.
fn load_config() -> Result<RenderConfig, Box<dyn Error + Send + Sync>> {
	match std::env::args().nth(1) {
		Some(path) => {
			let text = std::fs::read_to_string(&path)?;
			Ok(serde_json::from_str(&text)?)
		}
		None => Ok(RenderConfig::from_env()),
	}
}
