use std::{
	sync::{Arc, Barrier},
	thread,
	time::{Duration, Instant},
};

use parking_lot::Mutex;
use split_render::{
	ConfigHandle, ContextError, ContextOwner, ErrorCode, HeadlessApi, OwnerEnd, RenderConfig, RenderError,
	RenderEvt, RenderMode, RenderThread, Renderer, SurfaceRetryPolicy, TileId,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Call {
	Created,
	Changed(i32, i32),
	Draw,
}

type Log = Arc<Mutex<Vec<(usize, Call)>>>;

struct Recording {
	index: usize,
	log: Log,
}

impl Renderer for Recording {
	fn on_surface_created(&mut self, _config: ConfigHandle) {
		self.log.lock().push((self.index, Call::Created));
	}

	fn on_surface_changed(&mut self, width: i32, height: i32) {
		self.log.lock().push((self.index, Call::Changed(width, height)));
	}

	fn on_draw_frame(&mut self) {
		self.log.lock().push((self.index, Call::Draw));
	}
}

#[derive(Clone, Default)]
struct OwnerCounts {
	context_created: Arc<Mutex<u32>>,
	pre_draw: Arc<Mutex<u32>>,
}

impl ContextOwner for OwnerCounts {
	fn on_context_created(&mut self) {
		*self.context_created.lock() += 1;
	}

	fn on_pre_draw(&mut self) {
		*self.pre_draw.lock() += 1;
	}
}

/// Holds the render thread inside `on_pre_draw` until the test has acted, once armed.
#[derive(Clone, Default)]
struct PreDrawGate(Arc<Mutex<Option<Arc<Barrier>>>>);

impl PreDrawGate {
	fn arm(&self) -> Arc<Barrier> {
		let barrier = Arc::new(Barrier::new(2));
		*self.0.lock() = Some(Arc::clone(&barrier));
		barrier
	}
}

impl ContextOwner for PreDrawGate {
	fn on_pre_draw(&mut self) {
		let Some(barrier) = self.0.lock().take() else {
			return;
		};
		barrier.wait();
		barrier.wait();
	}
}

fn on_demand() -> RenderConfig {
	RenderConfig {
		render_mode: RenderMode::OnDemand,
		..RenderConfig::default()
	}
}

fn spawn(config: RenderConfig, api: &HeadlessApi) -> (RenderThread, OwnerEnd) {
	RenderThread::spawn(&config, api.clone(), ()).unwrap()
}

fn calls_for(log: &Log, index: usize) -> Vec<Call> {
	log.lock()
		.iter()
		.filter(|(i, _)| *i == index)
		.map(|(_, call)| *call)
		.collect()
}

fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
	let deadline = Instant::now() + Duration::from_secs(5);
	while !condition() {
		assert!(Instant::now() < deadline, "timed out waiting for {what}");
		thread::sleep(Duration::from_millis(2));
	}
}

fn drain(owner: OwnerEnd) -> Vec<RenderEvt> {
	let mut rx = owner.into_parts();
	let mut events = Vec::new();
	while let Ok(event) = rx.try_recv() {
		events.push(event);
	}
	events
}

#[test]
fn exit_right_after_spawn_returns() {
	let api = HeadlessApi::new();
	let (render, owner) = spawn(RenderConfig::default(), &api);
	render.request_exit_and_wait().unwrap();
	assert!(render.is_exited());
	assert!(api.live_contexts().is_empty());
	let events = drain(owner);
	assert_eq!(events.first(), Some(&RenderEvt::Started));
	assert_eq!(events.last(), Some(&RenderEvt::Exited));
	// Joined already; a second call reports the same clean exit.
	render.request_exit_and_wait().unwrap();
}

#[test]
fn calls_after_exit_report_thread_exited() {
	let api = HeadlessApi::new();
	let (render, _owner) = spawn(on_demand(), &api);
	render.request_exit_and_wait().unwrap();
	let drawable = api.create_drawable(4, 4);
	let log = Log::default();
	let err = render
		.notify_surface_created(Recording { index: 0, log }, drawable, 4, 4)
		.unwrap_err();
	assert!(matches!(err, RenderError::ThreadExited { reason: None }));
	assert!(matches!(render.pause(), Err(RenderError::ThreadExited { .. })));
}

#[test]
fn concurrent_tiles_each_get_one_ordered_frame() {
	const TILES: usize = 8;
	let api = HeadlessApi::new();
	let (render, _owner) = spawn(on_demand(), &api);
	let log = Log::default();
	render.pause().unwrap();

	thread::scope(|scope| {
		for index in 0..TILES {
			let render = &render;
			let api = &api;
			let log = Arc::clone(&log);
			scope.spawn(move || {
				let drawable = api.create_drawable(10 + index as i32, 20);
				render
					.notify_surface_created(Recording { index, log }, drawable, 10 + index as i32, 20)
					.unwrap();
			});
		}
	});
	assert!(log.lock().is_empty());

	render.resume().unwrap();
	assert!(!render.is_paused());
	for index in 0..TILES {
		assert_eq!(
			calls_for(&log, index),
			vec![Call::Created, Call::Changed(10 + index as i32, 20), Call::Draw],
			"tile {index}"
		);
	}
	assert_eq!(api.stats().swaps, TILES as u32);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn pause_then_resume_leaves_thread_unpaused() {
	let api = HeadlessApi::new();
	let (render, owner) = spawn(RenderConfig::default(), &api);
	let log = Log::default();
	let drawable = api.create_drawable(32, 32);
	render
		.notify_surface_created(Recording { index: 0, log }, drawable, 32, 32)
		.unwrap();
	render.resume().unwrap();

	render.pause().unwrap();
	assert!(render.is_paused());
	assert_eq!(api.live_surfaces(), 0);
	// Context survives a pause by default.
	assert_eq!(api.live_contexts().len(), 1);

	render.resume().unwrap();
	assert!(!render.is_paused());
	assert!(api.surface_for(drawable).is_some());
	render.request_exit_and_wait().unwrap();

	let events = drain(owner);
	assert!(events.contains(&RenderEvt::Paused));
	assert!(events.contains(&RenderEvt::Resumed));
}

#[test]
fn pause_without_preservation_recreates_context() {
	let api = HeadlessApi::new();
	let config = RenderConfig {
		preserve_context_on_pause: false,
		..on_demand()
	};
	let owner_counts = OwnerCounts::default();
	let (render, _owner) = RenderThread::spawn(&config, api.clone(), owner_counts.clone()).unwrap();
	render.pause().unwrap();
	let log = Log::default();
	let drawable = api.create_drawable(16, 16);
	render
		.notify_surface_created(Recording { index: 0, log: Arc::clone(&log) }, drawable, 16, 16)
		.unwrap();
	render.resume().unwrap();
	let before = api.live_contexts();
	assert_eq!(before.len(), 1);

	render.pause().unwrap();
	assert!(api.live_contexts().is_empty());
	assert!(!api.is_initialized());

	render.resume().unwrap();
	let after = api.live_contexts();
	assert_eq!(after.len(), 1);
	assert_ne!(after, before);
	assert_eq!(*owner_counts.context_created.lock(), 2);
	// The renderer sees a fresh surface on the fresh context.
	assert_eq!(
		calls_for(&log, 0),
		vec![Call::Created, Call::Changed(16, 16), Call::Draw, Call::Created, Call::Draw]
	);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn lost_context_releases_everything_before_drawing_again() {
	let api = HeadlessApi::new();
	let owner_counts = OwnerCounts::default();
	let (render, owner) = RenderThread::spawn(&on_demand(), api.clone(), owner_counts.clone()).unwrap();
	render.pause().unwrap();
	let log = Log::default();
	for index in 0..3 {
		let drawable = api.create_drawable(8, 8);
		render
			.notify_surface_created(Recording { index, log: Arc::clone(&log) }, drawable, 8, 8)
			.unwrap();
	}
	render.resume().unwrap();
	assert_eq!(api.stats().surfaces_created, 3);
	let before_loss = log.lock().len();

	// Returns once the frame has been drawn on the rebuilt context.
	api.lose_context();
	render.resume().unwrap();
	let stats = api.stats();
	assert_eq!(stats.contexts_created, 2);
	assert_eq!(stats.contexts_destroyed, 1);
	assert_eq!(stats.surfaces_destroyed, 3);
	assert_eq!(stats.surfaces_created, 6);
	assert_eq!(*owner_counts.context_created.lock(), 2);

	// Only the first tile drew into the lost context; every tile then starts
	// over with a new surface before drawing.
	let since_loss = log.lock()[before_loss..].to_vec();
	let mut interrupted = 0;
	for index in 0..3 {
		let calls: Vec<Call> = since_loss
			.iter()
			.filter(|(i, _)| *i == index)
			.map(|(_, call)| *call)
			.collect();
		match calls.as_slice() {
			[Call::Created, Call::Draw] => {}
			[Call::Draw, Call::Created, Call::Draw] => interrupted += 1,
			other => panic!("tile {index}: {other:?}"),
		}
	}
	assert_eq!(interrupted, 1);
	render.request_exit_and_wait().unwrap();
	assert!(drain(owner).contains(&RenderEvt::ContextLost));
}

#[test]
fn requested_frame_lost_mid_pass_is_redrawn_for_every_tile() {
	let api = HeadlessApi::new();
	let (render, _owner) = spawn(on_demand(), &api);
	render.pause().unwrap();
	let log = Log::default();
	for index in 0..3 {
		let drawable = api.create_drawable(8, 8);
		render
			.notify_surface_created(Recording { index, log: Arc::clone(&log) }, drawable, 8, 8)
			.unwrap();
	}
	render.resume().unwrap();

	api.lose_context();
	render.request_render().unwrap();
	wait_until("every tile redrawn on the new context", || {
		(0..3).all(|index| {
			let calls = calls_for(&log, index);
			calls.iter().filter(|call| **call == Call::Created).count() == 2 && calls.last() == Some(&Call::Draw)
		})
	});
	assert_eq!(api.stats().contexts_created, 2);
	assert_eq!(api.live_surfaces(), 3);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn swap_error_releases_only_the_failing_tile() {
	let api = HeadlessApi::new();
	let (render, owner) = spawn(on_demand(), &api);
	render.pause().unwrap();
	let log = Log::default();
	let bad = api.create_drawable(8, 8);
	let good = api.create_drawable(8, 8);
	let bad_id = render
		.notify_surface_created(Recording { index: 0, log: Arc::clone(&log) }, bad, 8, 8)
		.unwrap();
	render
		.notify_surface_created(Recording { index: 1, log: Arc::clone(&log) }, good, 8, 8)
		.unwrap();
	render.resume().unwrap();

	api.script_swap_error(bad, ErrorCode::BadNativeWindow);
	render.resume().unwrap();
	render.resume().unwrap();

	assert!(!render.contains_tile(bad_id));
	assert_eq!(render.tile_count(), 1);
	assert!(api.surface_for(bad).is_none());
	assert!(api.surface_for(good).is_some());
	assert!(matches!(
		render.notify_surface_changed(bad_id, 1, 1),
		Err(RenderError::UnknownTile(id)) if id == bad_id
	));
	// The owner still reports the view going away; that is not an error.
	render.notify_surface_destroyed(bad_id).unwrap();
	render.notify_surface_destroyed_and_wait(bad_id).unwrap();
	render.request_exit_and_wait().unwrap();

	let events = drain(owner);
	assert!(events.contains(&RenderEvt::SwapFailed {
		tile_id: bad_id,
		code: ErrorCode::BadNativeWindow,
	}));
	assert!(events.contains(&RenderEvt::TileReleased { tile_id: bad_id }));
}

#[test]
fn surface_lifecycle_creates_and_releases_in_pairs() {
	let api = HeadlessApi::new();
	let (render, _owner) = spawn(on_demand(), &api);
	render.pause().unwrap();
	let log = Log::default();
	let drawable = api.create_drawable(100, 50);
	let tile = render
		.notify_surface_created(Recording { index: 0, log: Arc::clone(&log) }, drawable, 100, 50)
		.unwrap();
	render.resume().unwrap();
	render.notify_surface_changed(tile, 100, 50).unwrap();
	api.resize_drawable(drawable, 200, 80);
	render.notify_surface_changed(tile, 200, 80).unwrap();
	wait_until("frame at new size", || api.stats().swaps == 2);

	render.notify_surface_destroyed_and_wait(tile).unwrap();
	assert!(api.surface_for(drawable).is_none());
	wait_until("tile removal", || !render.contains_tile(tile));

	let stats = api.stats();
	assert_eq!(stats.surfaces_created, stats.surfaces_destroyed);
	assert_eq!(stats.surface_refusals, 0);
	assert_eq!(
		calls_for(&log, 0),
		vec![
			Call::Created,
			Call::Changed(100, 50),
			Call::Draw,
			Call::Created,
			Call::Changed(200, 80),
			Call::Draw,
		]
	);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn destroyed_tile_is_released_on_the_next_tick() {
	let api = HeadlessApi::new();
	let (render, owner) = spawn(on_demand(), &api);
	let drawable = api.create_drawable(8, 8);
	let tile = render
		.notify_surface_created(Recording { index: 0, log: Log::default() }, drawable, 8, 8)
		.unwrap();
	render.resume().unwrap();
	assert!(api.surface_for(drawable).is_some());

	render.notify_surface_destroyed(tile).unwrap();
	wait_until("tile removal", || !render.contains_tile(tile));
	assert!(api.surface_for(drawable).is_none());
	assert_eq!(api.live_surfaces(), 0);
	render.request_exit_and_wait().unwrap();
	assert!(drain(owner).contains(&RenderEvt::TileReleased { tile_id: tile }));
}

#[test]
fn resize_during_pass_recreates_surface_before_drawing() {
	let api = HeadlessApi::new();
	let gate = PreDrawGate::default();
	let (render, _owner) = RenderThread::spawn(&on_demand(), api.clone(), gate.clone()).unwrap();
	render.pause().unwrap();
	let log = Log::default();
	let resized = api.create_drawable(10, 10);
	let tile = render
		.notify_surface_created(Recording { index: 0, log: Arc::clone(&log) }, resized, 10, 10)
		.unwrap();
	render.resume().unwrap();
	let first_surface = api.surface_for(resized);
	assert!(first_surface.is_some());

	// A new tile makes the next pass run `on_pre_draw`; the resize lands there,
	// after the pass already checked sizes.
	let barrier = gate.arm();
	let added = api.create_drawable(8, 8);
	render
		.notify_surface_created(Recording { index: 1, log: Arc::clone(&log) }, added, 8, 8)
		.unwrap();
	barrier.wait();
	api.resize_drawable(resized, 20, 20);
	render.notify_surface_changed(tile, 20, 20).unwrap();
	barrier.wait();

	wait_until("surface recreated at new size", || {
		api.stats().surfaces_created == 3 && calls_for(&log, 0).contains(&Call::Changed(20, 20))
	});
	assert_ne!(api.surface_for(resized), first_surface);
	assert_eq!(api.stats().surfaces_destroyed, 1);
	let calls = calls_for(&log, 0);
	assert_eq!(calls.iter().filter(|call| **call == Call::Created).count(), 2);
	let recreated = calls.iter().rposition(|call| *call == Call::Created).unwrap();
	assert_eq!(calls[recreated + 1], Call::Changed(20, 20));
	assert!(!calls[..recreated].contains(&Call::Changed(20, 20)));
	render.request_exit_and_wait().unwrap();
}

#[test]
fn context_preservation_can_change_at_runtime() {
	let api = HeadlessApi::new();
	let owner_counts = OwnerCounts::default();
	let (render, _owner) = RenderThread::spawn(&on_demand(), api.clone(), owner_counts.clone()).unwrap();
	render.pause().unwrap();
	let drawable = api.create_drawable(8, 8);
	render
		.notify_surface_created(Recording { index: 0, log: Log::default() }, drawable, 8, 8)
		.unwrap();
	render.resume().unwrap();

	render.set_preserve_context_on_pause(false).unwrap();
	render.pause().unwrap();
	assert!(api.live_contexts().is_empty());

	render.resume().unwrap();
	assert_eq!(api.live_contexts().len(), 1);
	assert_eq!(*owner_counts.context_created.lock(), 2);

	render.set_preserve_context_on_pause(true).unwrap();
	render.pause().unwrap();
	assert_eq!(api.live_contexts().len(), 1);
	assert_eq!(api.live_surfaces(), 0);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn surface_retry_exhaustion_stops_the_thread() {
	let api = HeadlessApi::new();
	api.refuse_surfaces(u32::MAX);
	let config = RenderConfig {
		surface_retry: SurfaceRetryPolicy {
			interval_ms: 1,
			deadline_ms: 30,
		},
		..on_demand()
	};
	let (render, owner) = spawn(config, &api);
	let drawable = api.create_drawable(8, 8);
	render
		.notify_surface_created(Recording { index: 0, log: Log::default() }, drawable, 8, 8)
		.unwrap();

	let mut rx = owner.into_parts();
	let mut events = Vec::new();
	while let Some(event) = rx.blocking_recv() {
		let done = event == RenderEvt::Exited;
		events.push(event);
		if done {
			break;
		}
	}
	assert!(
		events.iter().any(|event| matches!(event, RenderEvt::FatalError { .. })),
		"{events:?}"
	);
	assert!(render.is_exited());
	assert!(api.stats().surface_refusals > 1);
	assert!(matches!(
		render.request_render(),
		Err(RenderError::ThreadExited { reason: Some(_) })
	));
	assert!(matches!(
		render.request_exit_and_wait(),
		Err(RenderError::Context(ContextError::SurfaceRetryExhausted { .. }))
	));
	assert_eq!(api.live_surfaces(), 0);
	assert!(api.live_contexts().is_empty());
}

#[test]
fn on_demand_draws_only_when_asked() {
	let api = HeadlessApi::new();
	let (render, _owner) = spawn(on_demand(), &api);
	let log = Log::default();
	let drawable = api.create_drawable(8, 8);
	render
		.notify_surface_created(Recording { index: 0, log: Arc::clone(&log) }, drawable, 8, 8)
		.unwrap();
	wait_until("first frame", || api.stats().swaps == 1);
	thread::sleep(Duration::from_millis(50));
	assert_eq!(api.stats().swaps, 1);

	render.request_render().unwrap();
	wait_until("requested frame", || api.stats().swaps == 2);

	render.set_render_mode(RenderMode::Continuous).unwrap();
	wait_until("free-running frames", || api.stats().swaps > 10);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn pre_draw_runs_once_per_batch_of_new_surfaces() {
	let api = HeadlessApi::new();
	let owner_counts = OwnerCounts::default();
	let (render, _owner) = RenderThread::spawn(&on_demand(), api.clone(), owner_counts.clone()).unwrap();
	render.pause().unwrap();
	let log = Log::default();
	for index in 0..4 {
		let drawable = api.create_drawable(8, 8);
		render
			.notify_surface_created(Recording { index, log: Arc::clone(&log) }, drawable, 8, 8)
			.unwrap();
	}
	render.resume().unwrap();
	assert_eq!(*owner_counts.pre_draw.lock(), 1);
	render.resume().unwrap();
	assert_eq!(*owner_counts.pre_draw.lock(), 1);
	assert_eq!(*owner_counts.context_created.lock(), 1);
	render.request_exit_and_wait().unwrap();
}

#[test]
fn fatal_start_error_is_observable() {
	let api = HeadlessApi::new();
	api.set_display_available(false);
	let (render, owner) = spawn(RenderConfig::default(), &api);
	let mut rx = owner.into_parts();
	assert_eq!(rx.blocking_recv(), Some(RenderEvt::Started));
	match rx.blocking_recv() {
		Some(RenderEvt::FatalError { reason }) => assert!(reason.contains("unable to get display")),
		other => panic!("unexpected event: {other:?}"),
	}
	assert_eq!(rx.blocking_recv(), Some(RenderEvt::Exited));

	assert!(render.is_exited());
	assert!(render.failure().is_some());
	assert!(matches!(
		render.resume(),
		Err(RenderError::ThreadExited { reason: Some(_) })
	));
	assert!(matches!(
		render.request_exit_and_wait(),
		Err(RenderError::Context(ContextError::NoDisplay))
	));
}

#[test]
fn dropping_the_handle_joins_the_thread() {
	let api = HeadlessApi::new();
	let (render, owner) = spawn(RenderConfig::default(), &api);
	let drawable = api.create_drawable(8, 8);
	let tile: TileId = render
		.notify_surface_created(Recording { index: 0, log: Log::default() }, drawable, 8, 8)
		.unwrap();
	render.resume().unwrap();
	assert!(render.contains_tile(tile));
	drop(render);
	assert_eq!(api.live_surfaces(), 0);
	assert!(api.live_contexts().is_empty());
	assert_eq!(drain(owner).last(), Some(&RenderEvt::Exited));
}
