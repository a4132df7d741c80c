use std::sync::Arc;

use crate::{context::api::ErrorCode, ids::TileId};

/// Events emitted by the render thread back to whoever owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvt {
	/// The render thread is running and accepting tiles.
	Started,
	/// A fresh graphics context is current on the render thread.
	ContextCreated,
	/// The context was released, either on pause or on teardown.
	ContextReleased,
	/// A swap reported the context as lost; every surface is being recreated.
	ContextLost,
	Paused,
	Resumed,
	/// A tile's surface has been destroyed and the tile forgotten.
	TileReleased { tile_id: TileId },
	/// A swap failed for one tile; that tile alone is being released.
	SwapFailed { tile_id: TileId, code: ErrorCode },
	/// Rendering hit an unrecoverable condition and is shutting down.
	FatalError { reason: Arc<str> },
	/// The render thread finished teardown.
	Exited,
}

pub type RenderEvtRx = tokio::sync::mpsc::Receiver<RenderEvt>;
pub type RenderEvtTx = tokio::sync::mpsc::Sender<RenderEvt>;
