//! Pluggable configuration selection.

use serde::Deserialize;
use tracing::debug;

use super::api::{ConfigAttrib, ConfigHandle, DisplayHandle, GraphicsApi};
use crate::error::ContextError;

/// Channel, depth and stencil sizes in bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ComponentSizes {
	pub red: i32,
	pub green: i32,
	pub blue: i32,
	pub alpha: i32,
	pub depth: i32,
	pub stencil: i32,
}

impl ComponentSizes {
	pub const fn new(red: i32, green: i32, blue: i32, alpha: i32, depth: i32, stencil: i32) -> Self {
		Self {
			red,
			green,
			blue,
			alpha,
			depth,
			stencil,
		}
	}

	/// As close to RGB565 as the display allows, optionally with a 16 bit depth buffer.
	pub const fn simple(with_depth_buffer: bool) -> Self {
		Self::new(4, 4, 4, 0, if with_depth_buffer { 16 } else { 0 }, 0)
	}

	pub fn attrib_list(&self) -> [(ConfigAttrib, i32); 6] {
		[
			(ConfigAttrib::RedSize, self.red),
			(ConfigAttrib::GreenSize, self.green),
			(ConfigAttrib::BlueSize, self.blue),
			(ConfigAttrib::AlphaSize, self.alpha),
			(ConfigAttrib::DepthSize, self.depth),
			(ConfigAttrib::StencilSize, self.stencil),
		]
	}

	/// Summed channel distance from `self`, or `None` when `candidate` lacks
	/// the required depth or stencil bits.
	pub fn distance(&self, candidate: &ComponentSizes) -> Option<u32> {
		if candidate.depth < self.depth || candidate.stencil < self.stencil {
			return None;
		}
		Some(
			candidate.red.abs_diff(self.red)
				+ candidate.green.abs_diff(self.green)
				+ candidate.blue.abs_diff(self.blue)
				+ candidate.alpha.abs_diff(self.alpha),
		)
	}
}

impl Default for ComponentSizes {
	fn default() -> Self {
		Self::simple(true)
	}
}

/// Minimum-distance candidate; ties keep the first one seen.
pub fn closest_config<C>(
	target: &ComponentSizes,
	candidates: impl IntoIterator<Item = (C, ComponentSizes)>,
) -> Option<C> {
	let mut closest: Option<(C, u32)> = None;
	for (config, sizes) in candidates {
		let Some(distance) = target.distance(&sizes) else {
			continue;
		};
		if closest.as_ref().is_none_or(|(_, best)| distance < *best) {
			closest = Some((config, distance));
		}
	}
	closest.map(|(config, _)| config)
}

pub trait ConfigChooser: Send {
	fn choose(
		&self,
		api: &mut dyn GraphicsApi,
		display: DisplayHandle,
	) -> Result<ConfigHandle, ContextError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ComponentSizeChooser {
	target: ComponentSizes,
}

impl ComponentSizeChooser {
	pub fn new(target: ComponentSizes) -> Self {
		Self { target }
	}

	pub fn simple(with_depth_buffer: bool) -> Self {
		Self::new(ComponentSizes::simple(with_depth_buffer))
	}

	pub fn target(&self) -> &ComponentSizes {
		&self.target
	}
}

impl ConfigChooser for ComponentSizeChooser {
	fn choose(
		&self,
		api: &mut dyn GraphicsApi,
		display: DisplayHandle,
	) -> Result<ConfigHandle, ContextError> {
		let configs = api
			.choose_configs(display, &self.target.attrib_list())
			.map_err(ContextError::ChooseConfig)?;
		if configs.is_empty() {
			return Err(ContextError::NoMatchingConfig);
		}
		debug!(count = configs.len(), "scoring candidate configs");
		let candidates: Vec<_> = configs
			.into_iter()
			.map(|config| (config, read_sizes(api, display, config)))
			.collect();
		closest_config(&self.target, candidates).ok_or(ContextError::NoConfigChosen)
	}
}

pub(crate) fn read_sizes(
	api: &mut dyn GraphicsApi,
	display: DisplayHandle,
	config: ConfigHandle,
) -> ComponentSizes {
	let mut attrib = |a| api.config_attrib(display, config, a).unwrap_or(0);
	ComponentSizes {
		red: attrib(ConfigAttrib::RedSize),
		green: attrib(ConfigAttrib::GreenSize),
		blue: attrib(ConfigAttrib::BlueSize),
		alpha: attrib(ConfigAttrib::AlphaSize),
		depth: attrib(ConfigAttrib::DepthSize),
		stencil: attrib(ConfigAttrib::StencilSize),
	}
}
