//! Render-thread scheduler multiplexing many tile surfaces over one graphics context.
//!
//! The owner thread talks to [`RenderThread`]; the render thread is the only
//! one that ever touches the [`GraphicsApi`].

pub mod comms;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod renderer;
pub mod scheduler;
pub mod surface;
pub mod sync;

pub use comms::{
	channels::OwnerEnd,
	render2owner::{RenderEvt, RenderEvtRx},
};
pub use config::{RenderConfig, RenderMode, SurfaceRetryPolicy};
pub use context::{
	ContextManager, ContextSettings, SwapOutcome,
	api::{ConfigHandle, ErrorCode, GraphicsApi, NativeDrawable},
	chooser::{ComponentSizeChooser, ComponentSizes, ConfigChooser},
	headless::HeadlessApi,
};
pub use error::{ContextError, RenderError};
pub use ids::TileId;
pub use renderer::{ContextOwner, Renderer};
pub use scheduler::handle::RenderThread;
