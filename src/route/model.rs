use schemars::JsonSchema;
use serde::{Deserialize, Deserializer};
use uuid::Uuid;
use validator::Validate;

use crate::listing::{Limits, Window};

/// Page parameters shared by every listing.
///
/// Out-of-range values are normalized rather than rejected, see [`Window::new`].
#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PaginateInput {
	/// The page number to return (1-indexed).
	pub page: Option<i64>,
	/// The number of items to return per page.
	pub per_page: Option<i64>,
}

impl PaginateInput {
	pub fn window(&self, limits: Limits) -> Window {
		Window::new(self.page, self.per_page, limits)
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct IdInput {
	pub id: Uuid,
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
///
/// Use with `#[serde(default, deserialize_with = "nullable")]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
	T: Deserialize<'de>,
	D: Deserializer<'de>,
{
	Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::listing;

	#[derive(Deserialize)]
	struct Patch {
		#[serde(default, deserialize_with = "nullable")]
		value: Option<Option<i32>>,
	}

	#[test]
	fn test_paginate_window() {
		let paginate = PaginateInput {
			page: Some(2),
			per_page: Some(1000),
		};

		let window = paginate.window(listing::PUBLIC);

		assert_eq!(window.page, 2);
		assert_eq!(window.per_page, listing::PUBLIC.max);
		assert_eq!(window.offset(), listing::PUBLIC.max);
	}

	#[test]
	fn test_nullable_distinguishes_null() {
		let absent: Patch = serde_json::from_str("{}").unwrap();
		let null: Patch = serde_json::from_str(r#"{"value":null}"#).unwrap();
		let set: Patch = serde_json::from_str(r#"{"value":4}"#).unwrap();

		assert_eq!(absent.value, None);
		assert_eq!(null.value, Some(None));
		assert_eq!(set.value, Some(Some(4)));
	}
}
