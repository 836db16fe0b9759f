use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::{
	listing::SortKey,
	policy::Role,
	route::{auth::model::User, recipe::model::RecipeView, user::model::RecipeStatus},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
	#[default]
	All,
	Active,
	Inactive,
}

impl AccountStatus {
	pub fn active(self) -> Option<bool> {
		match self {
			Self::All => None,
			Self::Active => Some(true),
			Self::Inactive => Some(false),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleFilter {
	#[default]
	All,
	User,
	Admin,
}

impl RoleFilter {
	/// The stored role name to match, if any.
	pub fn role(self) -> Option<&'static str> {
		match self {
			Self::All => None,
			Self::User => Some("user"),
			Self::Admin => Some("admin"),
		}
	}
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UserListInput {
	pub page: Option<i64>,
	pub per_page: Option<i64>,
	/// Matches username, email, first and last name, case-insensitively.
	#[validate(length(max = 100))]
	pub search: Option<String>,
	#[serde(default)]
	pub status: AccountStatus,
	#[serde(default)]
	pub role: RoleFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserSort;

impl SortKey for UserSort {
	const DEFAULT: Self = Self;

	fn parse(_: &str) -> Option<Self> {
		None
	}

	fn column(self) -> &'static str {
		"u.created_at"
	}
}

#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RecipeListInput {
	pub page: Option<i64>,
	pub per_page: Option<i64>,
	/// Matches title and description, case-insensitively.
	#[validate(length(max = 100))]
	pub search: Option<String>,
	#[serde(default)]
	pub status: RecipeStatus,
	pub category: Option<String>,
	pub sort_by: Option<String>,
	pub sort_order: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RoleInput {
	pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResolveAction {
	/// Clears the report and keeps the review.
	Dismiss,
	/// Deletes the review.
	Delete,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ResolveInput {
	pub action: ResolveAction,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Resolution {
	pub review_id: Uuid,
	pub action: ResolveAction,
}

#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct SiteTotals {
	pub total_users: i64,
	pub active_users: i64,
	pub new_users_week: i64,
	pub new_users_month: i64,
	pub total_recipes: i64,
	pub published_recipes: i64,
	pub draft_recipes: i64,
	pub new_recipes_week: i64,
	pub new_recipes_month: i64,
	pub total_reviews: i64,
	pub reported_reviews: i64,
	pub new_reviews_week: i64,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct Dashboard {
	pub stats: SiteTotals,
	/// The five most viewed published recipes.
	pub popular_recipes: Vec<RecipeView>,
	/// The five most recently registered users.
	pub recent_users: Vec<User>,
}
