//! The graphics-context capability consumed by [`ContextManager`](super::ContextManager).
//!
//! Handles are opaque tokens minted by the implementation, the same way EGL
//! hands out `EGLDisplay`/`EGLConfig`/`EGLContext`/`EGLSurface` values. Only
//! the render thread ever calls into a `GraphicsApi`.

use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConfigHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceHandle(pub u64);

/// A platform window or texture target supplied by the windowing system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeDrawable(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigAttrib {
	RedSize,
	GreenSize,
	BlueSize,
	AlphaSize,
	DepthSize,
	StencilSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceAttrib {
	Width,
	Height,
}

/// Minimum attribute values a configuration must satisfy.
pub type AttribList = [(ConfigAttrib, i32)];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
	Success,
	NotInitialized,
	BadAccess,
	BadAlloc,
	BadAttribute,
	BadConfig,
	BadContext,
	BadCurrentSurface,
	BadDisplay,
	BadMatch,
	BadNativePixmap,
	BadNativeWindow,
	BadParameter,
	BadSurface,
	ContextLost,
	Other(i32),
}

impl ErrorCode {
	pub fn from_raw(raw: i32) -> Self {
		match raw {
			0x3000 => Self::Success,
			0x3001 => Self::NotInitialized,
			0x3002 => Self::BadAccess,
			0x3003 => Self::BadAlloc,
			0x3004 => Self::BadAttribute,
			0x3005 => Self::BadConfig,
			0x3006 => Self::BadContext,
			0x3007 => Self::BadCurrentSurface,
			0x3008 => Self::BadDisplay,
			0x3009 => Self::BadMatch,
			0x300A => Self::BadNativePixmap,
			0x300B => Self::BadNativeWindow,
			0x300C => Self::BadParameter,
			0x300D => Self::BadSurface,
			0x300E => Self::ContextLost,
			other => Self::Other(other),
		}
	}

	pub fn as_raw(self) -> i32 {
		match self {
			Self::Success => 0x3000,
			Self::NotInitialized => 0x3001,
			Self::BadAccess => 0x3002,
			Self::BadAlloc => 0x3003,
			Self::BadAttribute => 0x3004,
			Self::BadConfig => 0x3005,
			Self::BadContext => 0x3006,
			Self::BadCurrentSurface => 0x3007,
			Self::BadDisplay => 0x3008,
			Self::BadMatch => 0x3009,
			Self::BadNativePixmap => 0x300A,
			Self::BadNativeWindow => 0x300B,
			Self::BadParameter => 0x300C,
			Self::BadSurface => 0x300D,
			Self::ContextLost => 0x300E,
			Self::Other(raw) => raw,
		}
	}

	/// The platform refuses a window surface with `BadAlloc` while the drawable
	/// is still attached to a previous surface; it clears once teardown finishes.
	pub fn is_transient(self) -> bool {
		matches!(self, Self::BadAlloc)
	}
}

impl fmt::Display for ErrorCode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::Success => "EGL_SUCCESS",
			Self::NotInitialized => "EGL_NOT_INITIALIZED",
			Self::BadAccess => "EGL_BAD_ACCESS",
			Self::BadAlloc => "EGL_BAD_ALLOC",
			Self::BadAttribute => "EGL_BAD_ATTRIBUTE",
			Self::BadConfig => "EGL_BAD_CONFIG",
			Self::BadContext => "EGL_BAD_CONTEXT",
			Self::BadCurrentSurface => "EGL_BAD_CURRENT_SURFACE",
			Self::BadDisplay => "EGL_BAD_DISPLAY",
			Self::BadMatch => "EGL_BAD_MATCH",
			Self::BadNativePixmap => "EGL_BAD_NATIVE_PIXMAP",
			Self::BadNativeWindow => "EGL_BAD_NATIVE_WINDOW",
			Self::BadParameter => "EGL_BAD_PARAMETER",
			Self::BadSurface => "EGL_BAD_SURFACE",
			Self::ContextLost => "EGL_CONTEXT_LOST",
			Self::Other(raw) => return write!(f, "0x{raw:x}"),
		};
		f.write_str(name)
	}
}

pub fn format_error(function: &str, code: ErrorCode) -> String {
	format!("{function} failed: {code}")
}

pub trait GraphicsApi: Send {
	/// `None` when no display connection can be obtained.
	fn get_display(&mut self) -> Option<DisplayHandle>;

	/// Returns the implementation's (major, minor) version.
	fn initialize(&mut self, display: DisplayHandle) -> Result<(i32, i32), ErrorCode>;

	fn terminate(&mut self, display: DisplayHandle);

	/// Every configuration meeting `attribs`, in the implementation's preference order.
	fn choose_configs(
		&mut self,
		display: DisplayHandle,
		attribs: &AttribList,
	) -> Result<Vec<ConfigHandle>, ErrorCode>;

	fn config_attrib(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		attrib: ConfigAttrib,
	) -> Option<i32>;

	fn create_context(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		client_version: i32,
	) -> Result<ContextHandle, ErrorCode>;

	fn destroy_context(&mut self, display: DisplayHandle, context: ContextHandle);

	fn context_client_version(
		&mut self,
		_display: DisplayHandle,
		_context: ContextHandle,
	) -> Option<i32> {
		None
	}

	fn create_window_surface(
		&mut self,
		display: DisplayHandle,
		config: ConfigHandle,
		drawable: NativeDrawable,
	) -> Result<SurfaceHandle, ErrorCode>;

	fn destroy_surface(&mut self, display: DisplayHandle, surface: SurfaceHandle);

	/// `surface: None` binds the context with no drawing surface.
	fn make_current(
		&mut self,
		display: DisplayHandle,
		surface: Option<SurfaceHandle>,
		context: ContextHandle,
	) -> Result<(), ErrorCode>;

	fn swap_buffers(&mut self, display: DisplayHandle, surface: SurfaceHandle) -> Result<(), ErrorCode>;

	fn query_surface(
		&mut self,
		display: DisplayHandle,
		surface: SurfaceHandle,
		attrib: SurfaceAttrib,
	) -> Option<i32>;
}
