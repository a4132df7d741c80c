use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind} id `{value}`")]
pub struct ParseIdError {
	kind: &'static str,
	value: String,
}

/// Declares a random, prefixed, copyable identifier type named `<Name>Id`.
macro_rules! define_id_type {
	($name:ident, $prefix:literal) => {
		paste::paste! {
			#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
			pub struct [<$name Id>](u64);

			impl [<$name Id>] {
				pub const PREFIX: &'static str = $prefix;

				pub fn rand() -> Self {
					Self(rand::random())
				}

				pub const fn from_raw(raw: u64) -> Self {
					Self(raw)
				}

				pub const fn as_raw(self) -> u64 {
					self.0
				}
			}

			impl std::fmt::Display for [<$name Id>] {
				fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
					write!(f, "{}{:016x}", Self::PREFIX, self.0)
				}
			}

			impl std::str::FromStr for [<$name Id>] {
				type Err = $crate::ids::ParseIdError;

				fn from_str(s: &str) -> Result<Self, Self::Err> {
					let err = || $crate::ids::ParseIdError {
						kind: stringify!($name),
						value: s.to_string(),
					};
					let hex = s.strip_prefix(Self::PREFIX).ok_or_else(err)?;
					u64::from_str_radix(hex, 16).map(Self).map_err(|_| err())
				}
			}
		}
	};
}

define_id_type!(Tile, "tile_");
