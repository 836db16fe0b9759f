use aide::axum::{routing::get_with, ApiRouter};

use crate::{
	error::{self, ErrorShape, Kind},
	AppState,
};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown user {0}")]
	UnknownUser(String),
}

pub type RouteError = error::RouteError<Error>;

impl ErrorShape for Error {
	fn kind(&self) -> Kind {
		match self {
			Self::UnknownUser(..) => Kind::NotFound,
		}
	}
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/favorites", get_with(get_favorites, get_favorites_docs))
		.api_route("/recipes", get_with(get_own_recipes, get_own_recipes_docs))
		.api_route("/dashboard", get_with(get_dashboard, get_dashboard_docs))
		.api_route(
			"/profile/:username",
			get_with(get_profile, get_profile_docs),
		)
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_own_recipes_by_status(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;

		create_recipe(&app, &owner, json!({ "title": "Draft", "is_published": false })).await;
		create_recipe(&app, &owner, json!({ "title": "Live" })).await;

		let drafts = app
			.get("/user/recipes")
			.add_query_param("status", "draft")
			.add_header(AUTHORIZATION, bearer(&owner))
			.await
			.json::<serde_json::Value>();

		assert_eq!(drafts["pagination"]["total"], 1);
		assert_eq!(drafts["items"][0]["title"], "Draft");

		let all = app
			.get("/user/recipes")
			.add_header(AUTHORIZATION, bearer(&owner))
			.await
			.json::<serde_json::Value>();

		assert_eq!(all["pagination"]["total"], 2);

		let response = app
			.get("/user/recipes")
			.add_query_param("status", "archived")
			.add_header(AUTHORIZATION, bearer(&owner))
			.await;

		assert_eq!(response.status_code(), 400);
	}

	#[sqlx::test]
	async fn test_favorites_and_dashboard(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;
		let fan = register(&app, "fan").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		app.post(&format!("/recipes/{id}/favorite"))
			.add_header(AUTHORIZATION, bearer(&fan))
			.await;

		let favorites = app
			.get("/user/favorites")
			.add_header(AUTHORIZATION, bearer(&fan))
			.await
			.json::<serde_json::Value>();

		assert_eq!(favorites["pagination"]["total"], 1);
		assert_eq!(favorites["items"][0]["is_favorited"], true);

		let dashboard = app
			.get("/user/dashboard")
			.add_header(AUTHORIZATION, bearer(&owner))
			.await
			.json::<serde_json::Value>();

		assert_eq!(dashboard["stats"]["total_recipes"], 1);
		assert_eq!(dashboard["stats"]["draft_recipes"], 0);
		assert_eq!(dashboard["stats"]["total_favorites"], 0);
		assert_eq!(dashboard["recent_recipes"][0]["id"], id);

		let response = app.get("/user/favorites").await;
		assert_eq!(response.status_code(), 401);
	}

	#[sqlx::test]
	async fn test_public_profile(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;

		create_recipe(&app, &owner, json!({})).await;
		create_recipe(&app, &owner, json!({ "is_published": false })).await;

		let profile = app
			.get("/user/profile/owner")
			.await
			.json::<serde_json::Value>();

		assert_eq!(profile["user"]["username"], "owner");
		assert_eq!(profile["user"]["recipe_count"], 1);
		assert_eq!(profile["recipes"]["pagination"]["total"], 1);
		assert!(profile["user"].get("email").is_none());

		let response = app.get("/user/profile/nobody").await;
		assert_eq!(response.status_code(), 404);
	}
}
