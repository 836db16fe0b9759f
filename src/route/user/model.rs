use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
	listing::{Page, SortKey},
	route::recipe::model::RecipeView,
};

/// Which of the user's own recipes to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecipeStatus {
	#[default]
	All,
	Published,
	Draft,
}

impl RecipeStatus {
	/// The `is_published` value to filter on, if any.
	pub fn published(self) -> Option<bool> {
		match self {
			Self::All => None,
			Self::Published => Some(true),
			Self::Draft => Some(false),
		}
	}
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct OwnRecipesInput {
	pub page: Option<i64>,
	pub per_page: Option<i64>,
	#[serde(default)]
	pub status: RecipeStatus,
}

/// Favorites are listed by when they were added, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FavoriteSort;

impl SortKey for FavoriteSort {
	const DEFAULT: Self = Self;

	fn parse(_: &str) -> Option<Self> {
		None
	}

	fn column(self) -> &'static str {
		"fav.created_at"
	}
}

/// Recipes listed by creation time, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewestSort;

impl SortKey for NewestSort {
	const DEFAULT: Self = Self;

	fn parse(_: &str) -> Option<Self> {
		None
	}

	fn column(self) -> &'static str {
		"r.created_at"
	}
}

#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct DashboardStats {
	pub total_recipes: i64,
	pub published_recipes: i64,
	pub draft_recipes: i64,
	pub total_favorites: i64,
	pub total_views: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Dashboard {
	pub stats: DashboardStats,
	/// The five most recently created recipes, drafts included.
	pub recent_recipes: Vec<RecipeView>,
}

#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct PublicProfile {
	pub id: Uuid,
	pub username: String,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub bio: Option<String>,
	pub profile_image: Option<String>,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub recipe_count: i64,
	pub total_views: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ProfilePage {
	pub user: PublicProfile,
	pub recipes: Page<RecipeView>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct UsernameInput {
	pub username: String,
}
