use aide::axum::{routing::get_with, ApiRouter};
use axum::extract::State;
use macros::route;
use schemars::JsonSchema;
use serde::Serialize;

use crate::{error::AppError, extract::Json, openapi::tag, AppState, Database};

/// Totals shown on the landing page. Drafts and their views are not counted.
#[derive(Debug, Serialize, JsonSchema, sqlx::FromRow)]
pub struct SiteStats {
	pub total_recipes: i64,
	pub total_users: i64,
	pub total_reviews: i64,
	pub total_views: i64,
}

pub fn routes() -> ApiRouter<AppState> {
	ApiRouter::new().api_route("/", get_with(get_stats, get_stats_docs))
}

/// Get site stats
/// Returns the number of published recipes, active users and reviews, and the
/// total views across published recipes.
#[route(tag = tag::STATS)]
pub async fn get_stats(State(database): State<Database>) -> Result<Json<SiteStats>, AppError> {
	let stats = sqlx::query_as::<_, SiteStats>(
		r#"
			SELECT
				(SELECT COUNT(*) FROM recipe WHERE is_published) AS total_recipes,
				(SELECT COUNT(*) FROM "user" WHERE is_active) AS total_users,
				(SELECT COUNT(*) FROM review) AS total_reviews,
				(SELECT COALESCE(SUM(view_count), 0)::int8 FROM recipe WHERE is_published) AS total_views
		"#,
	)
	.fetch_one(&database)
	.await?;

	Ok(Json(stats))
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_stats_count_published_only(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		create_recipe(&app, &owner, json!({ "is_published": false })).await;

		let id = recipe["id"].as_str().unwrap();
		app.get(&format!("/recipes/{id}")).await;

		let stats = app.get("/stats").await.json::<serde_json::Value>();

		assert_eq!(stats["total_recipes"], 1);
		assert_eq!(stats["total_users"], 1);
		assert_eq!(stats["total_reviews"], 0);
		assert_eq!(stats["total_views"], 1);
	}
}
