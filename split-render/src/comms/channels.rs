use super::render2owner::{RenderEvtRx, RenderEvtTx};

/// Receiving side, held by the thread that created the tiles.
#[derive(Debug)]
pub struct OwnerEnd {
	events: RenderEvtRx,
}

impl OwnerEnd {
	pub fn new(events: RenderEvtRx) -> Self {
		Self { events }
	}

	pub fn into_parts(self) -> RenderEvtRx {
		self.events
	}
}

/// Sending side, moved onto the render thread.
#[derive(Debug)]
pub struct RenderingEnd {
	events: RenderEvtTx,
}

impl RenderingEnd {
	pub fn new(events: RenderEvtTx) -> Self {
		Self { events }
	}

	pub fn into_parts(self) -> RenderEvtTx {
		self.events
	}
}

pub struct Channels {
	owner_end: OwnerEnd,
	rendering_end: RenderingEnd,
}

impl Channels {
	pub fn with_capacity(capacity: usize) -> Self {
		let (evt_tx, evt_rx) = tokio::sync::mpsc::channel(capacity.max(1));
		Self {
			owner_end: OwnerEnd::new(evt_rx),
			rendering_end: RenderingEnd::new(evt_tx),
		}
	}

	pub fn split(self) -> (OwnerEnd, RenderingEnd) {
		(self.owner_end, self.rendering_end)
	}
}
