use std::time::Duration;

use serde::Deserialize;

use crate::context::chooser::ComponentSizes;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
	/// Draw every tick.
	#[default]
	Continuous,
	/// Draw only after a render request.
	OnDemand,
}

/// Bounds the retry loop around transient window-surface refusals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SurfaceRetryPolicy {
	pub interval_ms: u64,
	pub deadline_ms: u64,
}

impl SurfaceRetryPolicy {
	pub fn interval(&self) -> Duration {
		Duration::from_millis(self.interval_ms)
	}

	pub fn deadline(&self) -> Duration {
		Duration::from_millis(self.deadline_ms)
	}
}

impl Default for SurfaceRetryPolicy {
	fn default() -> Self {
		Self {
			interval_ms: 10,
			deadline_ms: 2000,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
	pub render_mode: RenderMode,
	pub preserve_context_on_pause: bool,
	pub client_version: i32,
	pub color: ComponentSizes,
	pub surface_retry: SurfaceRetryPolicy,
	/// Continuous-mode back-off after a tick with nothing to draw.
	pub idle_interval_ms: u64,
	pub event_capacity: usize,
	pub thread_name: String,
}

impl Default for RenderConfig {
	fn default() -> Self {
		Self {
			render_mode: RenderMode::Continuous,
			preserve_context_on_pause: true,
			client_version: 2,
			color: ComponentSizes::default(),
			surface_retry: SurfaceRetryPolicy::default(),
			idle_interval_ms: 16,
			event_capacity: 256,
			thread_name: "render-thread".to_string(),
		}
	}
}

impl RenderConfig {
	/// Defaults overlaid with `SPLIT_*` environment variables.
	pub fn from_env() -> Self {
		Self::default().with_env_overrides(|name| std::env::var(name).ok())
	}

	pub fn idle_interval(&self) -> Duration {
		Duration::from_millis(self.idle_interval_ms)
	}

	fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
		if let Some(mode) = var("SPLIT_RENDER_MODE") {
			self.render_mode = match mode.trim().to_ascii_lowercase().as_str() {
				"on_demand" | "on-demand" | "when_dirty" => RenderMode::OnDemand,
				_ => RenderMode::Continuous,
			};
		}
		self.preserve_context_on_pause = parse_bool(
			var("SPLIT_PRESERVE_CONTEXT").as_deref(),
			self.preserve_context_on_pause,
		);
		if let Some(ms) = var("SPLIT_SURFACE_RETRY_MS").and_then(|v| v.trim().parse().ok()) {
			self.surface_retry.interval_ms = ms;
		}
		if let Some(ms) = var("SPLIT_SURFACE_DEADLINE_MS").and_then(|v| v.trim().parse().ok()) {
			self.surface_retry.deadline_ms = ms;
		}
		self
	}
}

fn parse_bool(value: Option<&str>, default: bool) -> bool {
	match value {
		Some(v) => !matches!(
			v.trim().to_ascii_lowercase().as_str(),
			"0" | "false" | "off" | "no"
		),
		None => default,
	}
}
