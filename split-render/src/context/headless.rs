//! In-process [`GraphicsApi`] with no GPU behind it.
//!
//! Handles are minted from a counter, drawables are plain size records, and
//! every call is validated the way a strict EGL would validate it. Clones
//! share state, so a test or demo can keep one clone for fault injection and
//! inspection while the render thread owns another.

use std::{
	collections::{HashMap, VecDeque},
	sync::Arc,
	thread,
	time::Duration,
};

use parking_lot::Mutex;
use tracing::trace;

use super::{
	api::{
		AttribList, ConfigAttrib, ConfigHandle, ContextHandle, DisplayHandle, ErrorCode, GraphicsApi,
		NativeDrawable, SurfaceAttrib, SurfaceHandle,
	},
	chooser::ComponentSizes,
};

const DISPLAY: DisplayHandle = DisplayHandle(1);

/// Call counters, cumulative over the lifetime of the shared state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadlessStats {
	pub displays_initialized: u32,
	pub displays_terminated: u32,
	pub contexts_created: u32,
	pub contexts_destroyed: u32,
	pub surfaces_created: u32,
	pub surfaces_destroyed: u32,
	pub surface_refusals: u32,
	pub swaps: u32,
}

#[derive(Debug)]
struct HeadlessState {
	configs: Vec<ComponentSizes>,
	display_available: bool,
	initialized: bool,
	context_failure: Option<ErrorCode>,
	next_handle: u64,
	contexts: HashMap<ContextHandle, i32>,
	drawables: HashMap<NativeDrawable, (i32, i32)>,
	surfaces: HashMap<SurfaceHandle, NativeDrawable>,
	refusals_pending: u32,
	swap_errors: HashMap<NativeDrawable, VecDeque<ErrorCode>>,
	lose_context: bool,
	current: Option<(Option<SurfaceHandle>, ContextHandle)>,
	swap_interval: Duration,
	stats: HeadlessStats,
}

impl HeadlessState {
	fn mint(&mut self) -> u64 {
		self.next_handle += 1;
		self.next_handle
	}

	fn check_display(&self, display: DisplayHandle) -> Result<(), ErrorCode> {
		if display != DISPLAY {
			return Err(ErrorCode::BadDisplay);
		}
		if !self.initialized {
			return Err(ErrorCode::NotInitialized);
		}
		Ok(())
	}

	fn config(&self, config: ConfigHandle) -> Option<&ComponentSizes> {
		let index = usize::try_from(config.0).ok()?.checked_sub(1)?;
		self.configs.get(index)
	}
}

#[derive(Clone, Debug)]
pub struct HeadlessApi {
	inner: Arc<Mutex<HeadlessState>>,
}

impl HeadlessApi {
	/// An RGBA8888/D24S8 config followed by an RGB565/D16 one.
	pub fn new() -> Self {
		Self::with_configs(vec![
			ComponentSizes::new(8, 8, 8, 8, 24, 8),
			ComponentSizes::new(5, 6, 5, 0, 16, 0),
		])
	}

	pub fn with_configs(configs: Vec<ComponentSizes>) -> Self {
		Self {
			inner: Arc::new(Mutex::new(HeadlessState {
				configs,
				display_available: true,
				initialized: false,
				context_failure: None,
				next_handle: 0x100,
				contexts: HashMap::new(),
				drawables: HashMap::new(),
				surfaces: HashMap::new(),
				refusals_pending: 0,
				swap_errors: HashMap::new(),
				lose_context: false,
				current: None,
				swap_interval: Duration::ZERO,
				stats: HeadlessStats::default(),
			})),
		}
	}

	pub fn create_drawable(&self, width: i32, height: i32) -> NativeDrawable {
		let mut state = self.inner.lock();
		let drawable = NativeDrawable(state.mint());
		state.drawables.insert(drawable, (width, height));
		drawable
	}

	pub fn resize_drawable(&self, drawable: NativeDrawable, width: i32, height: i32) {
		if let Some(size) = self.inner.lock().drawables.get_mut(&drawable) {
			*size = (width, height);
		}
	}

	pub fn set_display_available(&self, available: bool) {
		self.inner.lock().display_available = available;
	}

	pub fn fail_context_creation(&self, code: Option<ErrorCode>) {
		self.inner.lock().context_failure = code;
	}

	/// The next `count` window surface creations are refused with `BadAlloc`.
	pub fn refuse_surfaces(&self, count: u32) {
		self.inner.lock().refusals_pending = count;
	}

	pub fn script_swap_error(&self, drawable: NativeDrawable, code: ErrorCode) {
		self
			.inner
			.lock()
			.swap_errors
			.entry(drawable)
			.or_default()
			.push_back(code);
	}

	/// The next swap on any surface reports a lost context.
	pub fn lose_context(&self) {
		self.inner.lock().lose_context = true;
	}

	/// Simulated vsync: every successful swap sleeps this long.
	pub fn set_swap_interval(&self, interval: Duration) {
		self.inner.lock().swap_interval = interval;
	}

	pub fn stats(&self) -> HeadlessStats {
		self.inner.lock().stats.clone()
	}

	pub fn live_contexts(&self) -> Vec<ContextHandle> {
		self.inner.lock().contexts.keys().copied().collect()
	}

	pub fn live_surfaces(&self) -> usize {
		self.inner.lock().surfaces.len()
	}

	pub fn surface_for(&self, drawable: NativeDrawable) -> Option<SurfaceHandle> {
		let state = self.inner.lock();
		state
			.surfaces
			.iter()
			.find(|(_, d)| **d == drawable)
			.map(|(s, _)| *s)
	}

	pub fn is_initialized(&self) -> bool {
		self.inner.lock().initialized
	}
}

impl Default for HeadlessApi {
	fn default() -> Self {
		Self::new()
	}
}

impl GraphicsApi for HeadlessApi {
	fn get_display(&mut self) -> Option<DisplayHandle> {
		self.inner.lock().display_available.then_some(DISPLAY)
	}

	fn initialize(&mut self, display: DisplayHandle) -> Result<(i32, i32), ErrorCode> {
		let mut state = self.inner.lock();
		if display != DISPLAY {
			return Err(ErrorCode::BadDisplay);
		}
		if !state.initialized {
			state.initialized = true;
			state.stats.displays_initialized += 1;
		}
		Ok((1, 4))
	}

	fn terminate(&mut self, display: DisplayHandle) {
		let mut state = self.inner.lock();
		if display == DISPLAY && state.initialized {
			state.initialized = false;
			state.current = None;
			state.stats.displays_terminated += 1;
		}
	}

	fn choose_configs(
		&mut self,
		display: DisplayHandle,
		attribs: &AttribList,
	) -> Result<Vec<ConfigHandle>, ErrorCode> {
		let state = self.inner.lock();
		state.check_display(display)?;
		let matches = state
			.configs
			.iter()
			.enumerate()
			.filter(|(_, sizes)| {
				attribs.iter().all(|(attrib, min)| match attrib {
					ConfigAttrib::RedSize => sizes.red >= *min,
					ConfigAttrib::GreenSize => sizes.green >= *min,
					ConfigAttrib::BlueSize => sizes.blue >= *min,
					ConfigAttrib::AlphaSize => sizes.alpha >= *min,
					ConfigAttrib::DepthSize => sizes.depth >= *min,
					ConfigAttrib::StencilSize => sizes.stencil >= *min,
				})
			})
			.map(|(index, _)| ConfigHandle(index as u64 + 1))
			.collect();
		Ok(matches)
	}

	fn config_attrib(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		attrib: ConfigAttrib,
	) -> Option<i32> {
		let state = self.inner.lock();
		state.check_display(display).ok()?;
		let sizes = state.config(config)?;
		Some(match attrib {
			ConfigAttrib::RedSize => sizes.red,
			ConfigAttrib::GreenSize => sizes.green,
			ConfigAttrib::BlueSize => sizes.blue,
			ConfigAttrib::AlphaSize => sizes.alpha,
			ConfigAttrib::DepthSize => sizes.depth,
			ConfigAttrib::StencilSize => sizes.stencil,
		})
	}

	fn create_context(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		client_version: i32,
	) -> Result<ContextHandle, ErrorCode> {
		let mut state = self.inner.lock();
		state.check_display(display)?;
		if state.config(config).is_none() {
			return Err(ErrorCode::BadConfig);
		}
		if let Some(code) = state.context_failure {
			return Err(code);
		}
		let context = ContextHandle(state.mint());
		state.contexts.insert(context, client_version);
		state.stats.contexts_created += 1;
		Ok(context)
	}

	fn destroy_context(&mut self, display: DisplayHandle, context: ContextHandle) {
		let mut state = self.inner.lock();
		if display != DISPLAY || state.contexts.remove(&context).is_none() {
			return;
		}
		if state.current.is_some_and(|(_, c)| c == context) {
			state.current = None;
		}
		state.stats.contexts_destroyed += 1;
	}

	fn context_client_version(
		&mut self,
		_display: DisplayHandle,
		context: ContextHandle,
	) -> Option<i32> {
		self.inner.lock().contexts.get(&context).copied()
	}

	fn create_window_surface(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		drawable: NativeDrawable,
	) -> Result<SurfaceHandle, ErrorCode> {
		let mut state = self.inner.lock();
		state.check_display(display)?;
		if state.config(config).is_none() {
			return Err(ErrorCode::BadConfig);
		}
		if !state.drawables.contains_key(&drawable) {
			return Err(ErrorCode::BadNativeWindow);
		}
		// A drawable still attached to a surface refuses a second one.
		if state.refusals_pending > 0 || state.surfaces.values().any(|d| *d == drawable) {
			state.refusals_pending = state.refusals_pending.saturating_sub(1);
			state.stats.surface_refusals += 1;
			return Err(ErrorCode::BadAlloc);
		}
		let surface = SurfaceHandle(state.mint());
		state.surfaces.insert(surface, drawable);
		state.stats.surfaces_created += 1;
		trace!(?surface, ?drawable, "headless surface created");
		Ok(surface)
	}

	fn destroy_surface(&mut self, display: DisplayHandle, surface: SurfaceHandle) {
		let mut state = self.inner.lock();
		if display != DISPLAY || state.surfaces.remove(&surface).is_none() {
			return;
		}
		if let Some((Some(current), _)) = state.current
			&& current == surface
		{
			state.current = None;
		}
		state.stats.surfaces_destroyed += 1;
	}

	fn make_current(
		&mut self,
		display: DisplayHandle,
		surface: Option<SurfaceHandle>,
		context: ContextHandle,
	) -> Result<(), ErrorCode> {
		let mut state = self.inner.lock();
		state.check_display(display)?;
		if !state.contexts.contains_key(&context) {
			return Err(ErrorCode::BadContext);
		}
		if let Some(surface) = surface
			&& !state.surfaces.contains_key(&surface)
		{
			return Err(ErrorCode::BadSurface);
		}
		state.current = Some((surface, context));
		Ok(())
	}

	fn swap_buffers(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> Result<(), ErrorCode> {
		let interval = {
			let mut state = self.inner.lock();
			state.check_display(display)?;
			let Some(drawable) = state.surfaces.get(&surface).copied() else {
				return Err(ErrorCode::BadSurface);
			};
			if state.current.map(|(s, _)| s) != Some(Some(surface)) {
				return Err(ErrorCode::BadSurface);
			}
			if std::mem::take(&mut state.lose_context) {
				return Err(ErrorCode::ContextLost);
			}
			if let Some(code) = state
				.swap_errors
				.get_mut(&drawable)
				.and_then(VecDeque::pop_front)
			{
				return Err(code);
			}
			state.stats.swaps += 1;
			state.swap_interval
		};
		if !interval.is_zero() {
			thread::sleep(interval);
		}
		Ok(())
	}

	fn query_surface(
		&mut self,
		display: DisplayHandle,
		surface: SurfaceHandle,
		attrib: SurfaceAttrib,
	) -> Option<i32> {
		let state = self.inner.lock();
		state.check_display(display).ok()?;
		let drawable = state.surfaces.get(&surface)?;
		let (width, height) = *state.drawables.get(drawable)?;
		Some(match attrib {
			SurfaceAttrib::Width => width,
			SurfaceAttrib::Height => height,
		})
	}
}
