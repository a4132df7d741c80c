use std::{io, sync::Arc, time::Duration};

use thiserror::Error;

use crate::{context::api::ErrorCode, ids::TileId};

#[derive(Debug, Error)]
pub enum ContextError {
	#[error("unable to get display")]
	NoDisplay,

	#[error("display initialization failed: {0}")]
	Initialize(ErrorCode),

	#[error("config query failed: {0}")]
	ChooseConfig(ErrorCode),

	#[error("no configs match the requested attributes")]
	NoMatchingConfig,

	#[error("no config chosen")]
	NoConfigChosen,

	#[error("context creation failed: {0}")]
	CreateContext(ErrorCode),

	#[error("graphics context is not started")]
	NotStarted,

	#[error("invalid drawable: {0}")]
	InvalidDrawable(ErrorCode),

	#[error("failed to create window surface: {0}")]
	CreateSurface(ErrorCode),

	#[error("window surface still refused after {attempts} attempts over {elapsed:?}")]
	SurfaceRetryExhausted { attempts: u32, elapsed: Duration },

	#[error("make current failed: {0}")]
	MakeCurrent(ErrorCode),
}

impl ContextError {
	/// A context loss reported mid-operation is recovered by the scheduler
	/// rather than treated as fatal.
	pub fn is_context_lost(&self) -> bool {
		matches!(self, Self::MakeCurrent(ErrorCode::ContextLost))
	}
}

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("graphics context error: {0}")]
	Context(#[from] ContextError),

	#[error("failed to spawn render thread: {0}")]
	Spawn(#[source] io::Error),

	#[error("render thread has exited{}", exit_suffix(.reason))]
	ThreadExited { reason: Option<Arc<str>> },

	#[error("render thread panicked")]
	ThreadPanicked,

	#[error("unknown tile {0}")]
	UnknownTile(TileId),
}

fn exit_suffix(reason: &Option<Arc<str>>) -> String {
	reason.as_deref().map(|r| format!(": {r}")).unwrap_or_default()
}
