//! SQL shared by every place that reads or writes recipes and reviews.

use sqlx::{types::Json, PgExecutor, Postgres, QueryBuilder};
use uuid::Uuid;

use super::model;

/// Columns of [`model::RecipeRow`] up to the bound viewer id.
const RECIPE_COLUMNS: &str = r#"
	SELECT r.*,
		u.username AS author_username,
		u.profile_image AS author_profile_image,
		COALESCE(stats.average_rating, 0)::float8 AS average_rating,
		stats.rating_count,
		EXISTS (
			SELECT 1 FROM favorite f WHERE f.recipe_id = r.id AND f.user_id = "#;

const RECIPE_JOINS: &str = r#"
	JOIN "user" u ON u.id = r.user_id
	LEFT JOIN LATERAL (
		SELECT AVG(v.rating)::float8 AS average_rating, COUNT(*) AS rating_count
		FROM review v WHERE v.recipe_id = r.id
	) stats ON true
"#;

pub const RECIPE_FROM: &str = "FROM recipe r";

/// Columns matched by the free-text recipe search.
pub const RECIPE_SEARCH: &[&str] = &["r.title", "r.description", "r.ingredients"];

/// Selects [`model::RecipeRow`]s from `from`, which must bind the recipe as `r`.
///
/// `viewer` decides `is_favorited`; no viewer means no recipe is favorited.
pub fn select_recipes(viewer: Option<Uuid>, from: &str) -> QueryBuilder<'static, Postgres> {
	let mut query = QueryBuilder::new(RECIPE_COLUMNS);

	query
		.push_bind(viewer)
		.push(") AS is_favorited ")
		.push(from)
		.push(RECIPE_JOINS);

	query
}

pub async fn fetch_recipe(
	executor: impl PgExecutor<'_>,
	id: Uuid,
	viewer: Option<Uuid>,
) -> Result<Option<model::RecipeRow>, sqlx::Error> {
	let mut query = select_recipes(viewer, RECIPE_FROM);

	query.push(" WHERE r.id = ").push_bind(id);
	query
		.build_query_as::<model::RecipeRow>()
		.fetch_optional(executor)
		.await
}

/// Loads a stored recipe and locks it for the rest of the transaction.
pub async fn lock_recipe(
	executor: impl PgExecutor<'_>,
	id: Uuid,
) -> Result<Option<model::Recipe>, sqlx::Error> {
	sqlx::query_as!(
		model::Recipe,
		r#"
			SELECT id, user_id, title, description,
				ingredients AS "ingredients: Json<serde_json::Value>",
				instructions AS "instructions: Json<serde_json::Value>",
				category, cuisine_type, dietary_preference, difficulty_level,
				prep_time, cook_time, total_time, servings, calories_per_serving,
				image_url, video_url, tags, is_featured, is_published, view_count,
				created_at, updated_at
			FROM recipe WHERE id = $1 FOR UPDATE
		"#,
		id
	)
	.fetch_optional(executor)
	.await
}

pub async fn insert_recipe(
	executor: impl PgExecutor<'_>,
	owner: Uuid,
	recipe: &model::NewRecipe,
	image_url: Option<&str>,
) -> Result<Uuid, sqlx::Error> {
	sqlx::query_scalar::<_, Uuid>(
		r#"
			INSERT INTO recipe (
				user_id, title, description, ingredients, instructions, category,
				cuisine_type, dietary_preference, difficulty_level,
				prep_time, cook_time, total_time, servings, calories_per_serving,
				image_url, video_url, tags, is_published
			)
			VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
			RETURNING id
		"#,
	)
	.bind(owner)
	.bind(&recipe.title)
	.bind(&recipe.description)
	.bind(Json(&recipe.ingredients))
	.bind(Json(&recipe.instructions))
	.bind(&recipe.category)
	.bind(&recipe.cuisine_type)
	.bind(&recipe.dietary_preference)
	.bind(&recipe.difficulty_level)
	.bind(recipe.prep_time)
	.bind(recipe.cook_time)
	.bind(recipe.total_time)
	.bind(recipe.servings)
	.bind(recipe.calories_per_serving)
	.bind(image_url)
	.bind(&recipe.video_url)
	.bind(&recipe.tags)
	.bind(recipe.is_published)
	.fetch_one(executor)
	.await
}

/// Writes every owner-editable column of `recipe` back.
pub async fn save_recipe(
	executor: impl PgExecutor<'_>,
	recipe: &model::Recipe,
) -> Result<(), sqlx::Error> {
	sqlx::query(
		r#"
			UPDATE recipe SET
				title = $2, description = $3, ingredients = $4, instructions = $5,
				category = $6, cuisine_type = $7, dietary_preference = $8,
				difficulty_level = $9, prep_time = $10, cook_time = $11,
				total_time = $12, servings = $13, calories_per_serving = $14,
				image_url = $15, video_url = $16, tags = $17, is_published = $18,
				updated_at = now()
			WHERE id = $1
		"#,
	)
	.bind(recipe.id)
	.bind(&recipe.title)
	.bind(&recipe.description)
	.bind(&recipe.ingredients)
	.bind(&recipe.instructions)
	.bind(&recipe.category)
	.bind(&recipe.cuisine_type)
	.bind(&recipe.dietary_preference)
	.bind(&recipe.difficulty_level)
	.bind(recipe.prep_time)
	.bind(recipe.cook_time)
	.bind(recipe.total_time)
	.bind(recipe.servings)
	.bind(recipe.calories_per_serving)
	.bind(&recipe.image_url)
	.bind(&recipe.video_url)
	.bind(&recipe.tags)
	.bind(recipe.is_published)
	.execute(executor)
	.await?;

	Ok(())
}

const REVIEW_COLUMNS: &str = r#"
	SELECT v.*,
		u.username AS author_username,
		u.profile_image AS author_profile_image,
		r.title AS recipe_title
"#;

const REVIEW_JOINS: &str = r#"
	JOIN "user" u ON u.id = v.user_id
	JOIN recipe r ON r.id = v.recipe_id
"#;

pub const REVIEW_FROM: &str = "FROM review v";

pub fn select_reviews() -> QueryBuilder<'static, Postgres> {
	let mut query = QueryBuilder::new(REVIEW_COLUMNS);

	query.push(REVIEW_FROM).push(REVIEW_JOINS);
	query
}

pub async fn fetch_review(
	executor: impl PgExecutor<'_>,
	id: Uuid,
) -> Result<Option<model::ReviewRow>, sqlx::Error> {
	let mut query = select_reviews();

	query.push(" WHERE v.id = ").push_bind(id);
	query
		.build_query_as::<model::ReviewRow>()
		.fetch_optional(executor)
		.await
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_viewer_is_the_first_bind() {
		let mut query = select_recipes(None, RECIPE_FROM);
		query.push(" WHERE r.id = ").push_bind(Uuid::nil());

		let sql = query.sql();

		assert!(sql.contains("f.user_id = $1) AS is_favorited FROM recipe r"));
		assert!(sql.ends_with("WHERE r.id = $2"));
	}

	#[test]
	fn test_select_from_favorites() {
		let query = select_recipes(
			Some(Uuid::nil()),
			"FROM favorite fav JOIN recipe r ON r.id = fav.recipe_id",
		);

		assert!(query
			.sql()
			.contains("FROM favorite fav JOIN recipe r ON r.id = fav.recipe_id"));
	}
}
