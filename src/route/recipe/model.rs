use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
	listing::SortKey,
	policy::Target,
	route::model::nullable,
};

pub const MAX_TITLE: u64 = 200;
pub const MAX_LABEL: u64 = 50;
pub const MAX_DIFFICULTY: u64 = 20;
pub const MAX_URL: u64 = 200;
pub const MAX_TAGS: u64 = 500;
pub const MAX_MINUTES: i32 = 100_000;

/// A recipe as it is stored.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Recipe {
	pub id: Uuid,
	pub user_id: Uuid,
	pub title: String,
	pub description: String,
	pub ingredients: Json<serde_json::Value>,
	pub instructions: Json<serde_json::Value>,
	pub category: String,
	pub cuisine_type: Option<String>,
	pub dietary_preference: Option<String>,
	pub difficulty_level: Option<String>,
	pub prep_time: Option<i32>,
	pub cook_time: Option<i32>,
	pub total_time: Option<i32>,
	pub servings: Option<i32>,
	pub calories_per_serving: Option<i32>,
	pub image_url: Option<String>,
	pub video_url: Option<String>,
	pub tags: Option<String>,
	pub is_featured: bool,
	pub is_published: bool,
	pub view_count: i64,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Recipe {
	pub fn target(&self) -> Target {
		Target::Recipe {
			owner: self.user_id,
			published: self.is_published,
		}
	}
}

/// A recipe joined with its author and review aggregates.
#[derive(Debug, sqlx::FromRow)]
pub struct RecipeRow {
	#[sqlx(flatten)]
	pub recipe: Recipe,
	pub author_username: String,
	pub author_profile_image: Option<String>,
	pub average_rating: f64,
	pub rating_count: i64,
	pub is_favorited: bool,
}

/// The public part of a user shown next to their content.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct Author {
	pub id: Uuid,
	pub username: String,
	pub profile_image: Option<String>,
}

/// A recipe as it is presented to clients.
#[derive(Debug, Serialize, JsonSchema)]
pub struct RecipeView {
	pub id: Uuid,
	pub user_id: Uuid,
	pub title: String,
	pub description: String,
	pub ingredients: Vec<String>,
	pub instructions: Vec<String>,
	pub category: String,
	pub cuisine_type: Option<String>,
	pub dietary_preference: Option<String>,
	pub difficulty_level: Option<String>,
	/// Minutes of preparation.
	pub prep_time: Option<i32>,
	/// Minutes of cooking.
	pub cook_time: Option<i32>,
	/// Preparation and cooking time combined.
	pub total_time: Option<i32>,
	pub servings: Option<i32>,
	pub calories_per_serving: Option<i32>,
	pub image_url: Option<String>,
	pub video_url: Option<String>,
	pub tags: Option<String>,
	pub is_featured: bool,
	pub is_published: bool,
	pub view_count: i64,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
	pub author: Author,
	/// Mean rating over all reviews, rounded to one decimal, or 0 without reviews.
	pub average_rating: f64,
	pub rating_count: i64,
	/// Whether the requesting user has favorited the recipe.
	pub is_favorited: bool,
}

/// Reads a stored ingredient or instruction list.
///
/// Anything other than an array of strings yields an empty list. A string
/// holding a serialized array is accepted as well.
pub fn steps(value: &serde_json::Value) -> Vec<String> {
	match value {
		serde_json::Value::Array(items) => items
			.iter()
			.map(|item| item.as_str().map(ToOwned::to_owned))
			.collect::<Option<Vec<_>>>()
			.unwrap_or_default(),
		serde_json::Value::String(text) => serde_json::from_str(text).unwrap_or_default(),
		_ => Vec::new(),
	}
}

/// `prep + cook` when both are known, otherwise whichever one is.
pub fn derive_total_time(prep_time: Option<i32>, cook_time: Option<i32>) -> Option<i32> {
	match (prep_time, cook_time) {
		(Some(prep), Some(cook)) => Some(prep.saturating_add(cook)),
		(Some(time), None) | (None, Some(time)) => Some(time),
		(None, None) => None,
	}
}

pub fn round_rating(average: f64) -> f64 {
	(average * 10.0).round() / 10.0
}

impl From<RecipeRow> for RecipeView {
	fn from(row: RecipeRow) -> Self {
		let recipe = row.recipe;

		Self {
			ingredients: steps(&recipe.ingredients),
			instructions: steps(&recipe.instructions),
			total_time: derive_total_time(recipe.prep_time, recipe.cook_time),
			author: Author {
				id: recipe.user_id,
				username: row.author_username,
				profile_image: row.author_profile_image,
			},
			average_rating: round_rating(row.average_rating),
			rating_count: row.rating_count,
			is_favorited: row.is_favorited,
			id: recipe.id,
			user_id: recipe.user_id,
			title: recipe.title,
			description: recipe.description,
			category: recipe.category,
			cuisine_type: recipe.cuisine_type,
			dietary_preference: recipe.dietary_preference,
			difficulty_level: recipe.difficulty_level,
			prep_time: recipe.prep_time,
			cook_time: recipe.cook_time,
			servings: recipe.servings,
			calories_per_serving: recipe.calories_per_serving,
			image_url: recipe.image_url,
			video_url: recipe.video_url,
			tags: recipe.tags,
			is_featured: recipe.is_featured,
			is_published: recipe.is_published,
			view_count: recipe.view_count,
			created_at: recipe.created_at,
			updated_at: recipe.updated_at,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeSort {
	CreatedAt,
	ViewCount,
	Title,
}

impl SortKey for RecipeSort {
	const DEFAULT: Self = Self::CreatedAt;

	fn parse(value: &str) -> Option<Self> {
		match value {
			"created_at" => Some(Self::CreatedAt),
			"view_count" => Some(Self::ViewCount),
			"title" => Some(Self::Title),
			_ => None,
		}
	}

	fn column(self) -> &'static str {
		match self {
			Self::CreatedAt => "r.created_at",
			Self::ViewCount => "r.view_count",
			Self::Title => "r.title",
		}
	}
}

/// Newest first is the only order for reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewSort;

impl SortKey for ReviewSort {
	const DEFAULT: Self = Self;

	fn parse(_: &str) -> Option<Self> {
		None
	}

	fn column(self) -> &'static str {
		"v.created_at"
	}
}

/// Search and filters for the public recipe listing.
#[derive(Debug, Default, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RecipeListInput {
	pub page: Option<i64>,
	pub per_page: Option<i64>,
	/// Matches title, description and ingredients, case-insensitively.
	#[validate(length(max = 100))]
	pub search: Option<String>,
	pub category: Option<String>,
	pub cuisine_type: Option<String>,
	pub dietary_preference: Option<String>,
	pub difficulty_level: Option<String>,
	pub featured: Option<bool>,
	/// One of `created_at`, `view_count` or `title`. Anything else sorts by
	/// creation time, newest first.
	pub sort_by: Option<String>,
	/// `asc` or `desc` (default).
	pub sort_order: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
	if value.trim().is_empty() {
		return Err(ValidationError::new("required"));
	}

	Ok(())
}

fn validate_steps(steps: &[String]) -> Result<(), ValidationError> {
	if steps.is_empty() || steps.iter().any(|step| step.trim().is_empty()) {
		return Err(ValidationError::new("steps must be a non-empty list of non-empty strings"));
	}

	Ok(())
}

fn trimmed(value: &str) -> String {
	value.trim().to_owned()
}

/// Trims a value, treating a blank string as absent.
fn present(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(ToOwned::to_owned)
}

fn trimmed_steps(steps: &[String]) -> Vec<String> {
	steps.iter().map(|step| trimmed(step)).collect()
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateRecipeInput {
	#[validate(length(max = 200), custom(function = "not_blank"))]
	pub title: String,
	#[validate(custom(function = "not_blank"))]
	pub description: String,
	#[validate(custom(function = "validate_steps"))]
	pub ingredients: Vec<String>,
	#[validate(custom(function = "validate_steps"))]
	pub instructions: Vec<String>,
	#[validate(length(max = 50), custom(function = "not_blank"))]
	pub category: String,
	#[validate(length(max = 50))]
	pub cuisine_type: Option<String>,
	#[validate(length(max = 50))]
	pub dietary_preference: Option<String>,
	#[validate(length(max = 20))]
	pub difficulty_level: Option<String>,
	#[validate(range(min = 0, max = 100_000))]
	pub prep_time: Option<i32>,
	#[validate(range(min = 0, max = 100_000))]
	pub cook_time: Option<i32>,
	#[validate(range(min = 1, max = 1000))]
	pub servings: Option<i32>,
	#[validate(range(min = 0, max = 100_000))]
	pub calories_per_serving: Option<i32>,
	#[validate(length(max = 200))]
	pub video_url: Option<String>,
	#[validate(length(max = 500))]
	pub tags: Option<String>,
	/// Defaults to `true`; drafts are only visible to their owner and admins.
	pub is_published: Option<bool>,
}

/// The normalized column values of a new recipe.
#[derive(Debug, PartialEq)]
pub struct NewRecipe {
	pub title: String,
	pub description: String,
	pub ingredients: Vec<String>,
	pub instructions: Vec<String>,
	pub category: String,
	pub cuisine_type: Option<String>,
	pub dietary_preference: Option<String>,
	pub difficulty_level: Option<String>,
	pub prep_time: Option<i32>,
	pub cook_time: Option<i32>,
	pub total_time: Option<i32>,
	pub servings: Option<i32>,
	pub calories_per_serving: Option<i32>,
	pub video_url: Option<String>,
	pub tags: Option<String>,
	pub is_published: bool,
}

impl CreateRecipeInput {
	pub fn normalize(self) -> NewRecipe {
		NewRecipe {
			title: trimmed(&self.title),
			description: trimmed(&self.description),
			ingredients: trimmed_steps(&self.ingredients),
			instructions: trimmed_steps(&self.instructions),
			category: trimmed(&self.category),
			cuisine_type: present(self.cuisine_type.as_deref()),
			dietary_preference: present(self.dietary_preference.as_deref()),
			difficulty_level: present(self.difficulty_level.as_deref()),
			prep_time: self.prep_time,
			cook_time: self.cook_time,
			total_time: derive_total_time(self.prep_time, self.cook_time),
			servings: Some(self.servings.unwrap_or(1)),
			calories_per_serving: self.calories_per_serving,
			video_url: present(self.video_url.as_deref()),
			tags: present(self.tags.as_deref()),
			is_published: self.is_published.unwrap_or(true),
		}
	}
}

/// A partial update. Absent fields are left untouched; `null` (or a blank
/// string) clears an optional field.
#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateRecipeInput {
	pub title: Option<String>,
	pub description: Option<String>,
	pub ingredients: Option<Vec<String>>,
	pub instructions: Option<Vec<String>>,
	pub category: Option<String>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<String>")]
	pub cuisine_type: Option<Option<String>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<String>")]
	pub dietary_preference: Option<Option<String>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<String>")]
	pub difficulty_level: Option<Option<String>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<i32>")]
	pub prep_time: Option<Option<i32>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<i32>")]
	pub cook_time: Option<Option<i32>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<i32>")]
	pub servings: Option<Option<i32>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<i32>")]
	pub calories_per_serving: Option<Option<i32>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<String>")]
	pub video_url: Option<Option<String>>,
	#[serde(default, deserialize_with = "nullable")]
	#[schemars(with = "Option<String>")]
	pub tags: Option<Option<String>>,
	pub is_published: Option<bool>,
}

fn check_length(
	errors: &mut ValidationErrors,
	field: &'static str,
	value: Option<&str>,
	max: u64,
) {
	if let Some(value) = value {
		if value.chars().count() as u64 > max {
			errors.add(field, ValidationError::new("length"));
		}
	}
}

fn check_range(
	errors: &mut ValidationErrors,
	field: &'static str,
	value: Option<i32>,
	min: i32,
	max: i32,
) {
	if let Some(value) = value {
		if !(min..=max).contains(&value) {
			errors.add(field, ValidationError::new("range"));
		}
	}
}

impl Validate for UpdateRecipeInput {
	fn validate(&self) -> Result<(), ValidationErrors> {
		let mut errors = ValidationErrors::new();

		for (field, value) in [
			("title", &self.title),
			("description", &self.description),
			("category", &self.category),
		] {
			if let Some(Err(error)) = value.as_deref().map(not_blank) {
				errors.add(field, error);
			}
		}

		for (field, value) in [
			("ingredients", &self.ingredients),
			("instructions", &self.instructions),
		] {
			if let Some(Err(error)) = value.as_deref().map(validate_steps) {
				errors.add(field, error);
			}
		}

		check_length(&mut errors, "title", self.title.as_deref(), MAX_TITLE);
		check_length(&mut errors, "category", self.category.as_deref(), MAX_LABEL);
		check_length(
			&mut errors,
			"cuisine_type",
			self.cuisine_type.clone().flatten().as_deref(),
			MAX_LABEL,
		);
		check_length(
			&mut errors,
			"dietary_preference",
			self.dietary_preference.clone().flatten().as_deref(),
			MAX_LABEL,
		);
		check_length(
			&mut errors,
			"difficulty_level",
			self.difficulty_level.clone().flatten().as_deref(),
			MAX_DIFFICULTY,
		);
		check_length(
			&mut errors,
			"video_url",
			self.video_url.clone().flatten().as_deref(),
			MAX_URL,
		);
		check_length(
			&mut errors,
			"tags",
			self.tags.clone().flatten().as_deref(),
			MAX_TAGS,
		);

		check_range(&mut errors, "prep_time", self.prep_time.flatten(), 0, MAX_MINUTES);
		check_range(&mut errors, "cook_time", self.cook_time.flatten(), 0, MAX_MINUTES);
		check_range(&mut errors, "servings", self.servings.flatten(), 1, 1000);
		check_range(
			&mut errors,
			"calories_per_serving",
			self.calories_per_serving.flatten(),
			0,
			MAX_MINUTES,
		);

		if errors.is_empty() {
			Ok(())
		} else {
			Err(errors)
		}
	}
}

fn merge_text(slot: &mut Option<String>, change: &Option<Option<String>>) {
	if let Some(change) = change {
		*slot = present(change.as_deref());
	}
}

fn merge<T: Copy>(slot: &mut Option<T>, change: Option<Option<T>>) {
	if let Some(change) = change {
		*slot = change;
	}
}

impl UpdateRecipeInput {
	/// Applies the present fields to `recipe` and re-derives its total time.
	pub fn apply(&self, recipe: &mut Recipe) {
		if let Some(title) = &self.title {
			recipe.title = trimmed(title);
		}

		if let Some(description) = &self.description {
			recipe.description = trimmed(description);
		}

		if let Some(ingredients) = &self.ingredients {
			recipe.ingredients = Json(serde_json::json!(trimmed_steps(ingredients)));
		}

		if let Some(instructions) = &self.instructions {
			recipe.instructions = Json(serde_json::json!(trimmed_steps(instructions)));
		}

		if let Some(category) = &self.category {
			recipe.category = trimmed(category);
		}

		merge_text(&mut recipe.cuisine_type, &self.cuisine_type);
		merge_text(&mut recipe.dietary_preference, &self.dietary_preference);
		merge_text(&mut recipe.difficulty_level, &self.difficulty_level);
		merge_text(&mut recipe.video_url, &self.video_url);
		merge_text(&mut recipe.tags, &self.tags);

		merge(&mut recipe.prep_time, self.prep_time);
		merge(&mut recipe.cook_time, self.cook_time);
		merge(&mut recipe.servings, self.servings);
		merge(&mut recipe.calories_per_serving, self.calories_per_serving);

		if let Some(is_published) = self.is_published {
			recipe.is_published = is_published;
		}

		recipe.total_time = derive_total_time(recipe.prep_time, recipe.cook_time);
	}
}

/// A review as it is stored, joined with its author and recipe title.
#[derive(Debug, sqlx::FromRow)]
pub struct ReviewRow {
	pub id: Uuid,
	pub user_id: Uuid,
	pub recipe_id: Uuid,
	pub rating: i32,
	pub comment: Option<String>,
	pub is_reported: bool,
	pub report_reason: Option<String>,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
	pub author_username: String,
	pub author_profile_image: Option<String>,
	pub recipe_title: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ReviewView {
	pub id: Uuid,
	pub recipe_id: Uuid,
	pub recipe_title: String,
	/// Between 1 and 5.
	pub rating: i32,
	pub comment: Option<String>,
	pub is_reported: bool,
	pub report_reason: Option<String>,
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
	pub user: Author,
}

impl From<ReviewRow> for ReviewView {
	fn from(row: ReviewRow) -> Self {
		Self {
			id: row.id,
			recipe_id: row.recipe_id,
			recipe_title: row.recipe_title,
			rating: row.rating,
			comment: row.comment,
			is_reported: row.is_reported,
			report_reason: row.report_reason,
			created_at: row.created_at,
			updated_at: row.updated_at,
			user: Author {
				id: row.user_id,
				username: row.author_username,
				profile_image: row.author_profile_image,
			},
		}
	}
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReviewInput {
	#[validate(range(min = 1, max = 5))]
	pub rating: i32,
	#[validate(length(max = 500))]
	pub comment: Option<String>,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReportInput {
	#[validate(length(min = 1, max = 200))]
	pub reason: String,
}

#[derive(Debug, Deserialize, Validate, JsonSchema)]
pub struct ReviewPath {
	/// The recipe id.
	pub id: Uuid,
	pub review_id: Uuid,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct FavoriteState {
	pub is_favorited: bool,
}
