use std::borrow::Cow;

use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use uuid::Uuid;

use crate::{
	error::{self, ErrorShape, Kind},
	media, policy, AppState,
};

pub mod model;
pub mod query;
pub mod route;

pub const REVIEW_PAIR_CONSTRAINT: &str = "review_user_id_recipe_id_key";

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown recipe {0}")]
	UnknownRecipe(Uuid),
	#[error("unknown review {0}")]
	UnknownReview(Uuid),
	#[error("you have already reviewed this recipe")]
	DuplicateReview,
	#[error(transparent)]
	Denied(policy::Denied),
	#[error(transparent)]
	Image(media::Error),
}

pub type RouteError = error::RouteError<Error>;

impl ErrorShape for Error {
	fn kind(&self) -> Kind {
		match self {
			Self::UnknownRecipe(..) | Self::UnknownReview(..) => Kind::NotFound,
			Self::DuplicateReview => Kind::Conflict,
			Self::Denied(denied) => denied.kind(),
			Self::Image(error) => error.kind(),
		}
	}

	fn summary(&self) -> Cow<'static, str> {
		match self {
			Self::Image(error) => error.summary(),
			_ => self.kind().summary().into(),
		}
	}
}

/// Maps a violation of the one-review-per-user rule to [`Error::DuplicateReview`].
pub fn map_review_conflict(error: sqlx::Error) -> RouteError {
	if error::constraint(&error) == Some(REVIEW_PAIR_CONSTRAINT) {
		Error::DuplicateReview.into()
	} else {
		RouteError::from(error)
	}
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route(
			"/",
			get_with(get_recipes, get_recipes_docs).post_with(create_recipe, create_recipe_docs),
		)
		.api_route(
			"/:id",
			get_with(get_recipe, get_recipe_docs)
				.put_with(update_recipe, update_recipe_docs)
				.delete_with(delete_recipe, delete_recipe_docs),
		)
		.api_route(
			"/:id/reviews",
			get_with(get_reviews, get_reviews_docs).post_with(add_review, add_review_docs),
		)
		.api_route(
			"/:id/reviews/:review_id/report",
			post_with(report_review, report_review_docs),
		)
		.api_route(
			"/:id/favorite",
			post_with(toggle_favorite, toggle_favorite_docs),
		)
}

#[cfg(test)]
mod test {
	use crate::test::*;

	#[sqlx::test]
	async fn test_recipe_lifecycle(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;
		let stranger = register(&app, "stranger").await;

		let recipe = create_recipe(&app, &owner, json!({ "prep_time": 10, "cook_time": 25 })).await;
		let id = recipe["id"].as_str().unwrap();

		assert_eq!(recipe["total_time"], 35);
		assert_eq!(recipe["average_rating"], 0.0);
		assert_eq!(recipe["rating_count"], 0);
		assert_eq!(recipe["ingredients"], json!(["flour", "milk", "eggs"]));

		let response = app
			.put(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&stranger))
			.json(&json!({ "title": "Stolen" }))
			.await;

		assert_eq!(response.status_code(), 403);
		assert_eq!(response.json::<serde_json::Value>()["kind"], "forbidden");

		let response = app
			.put(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({ "cook_time": 5 }))
			.await;

		assert_eq!(response.status_code(), 200);

		let updated = response.json::<serde_json::Value>();
		assert_eq!(updated["total_time"], 15);
		assert_eq!(updated["title"], "Pancakes");

		let response = app
			.put(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({ "titel": "Typo" }))
			.await;

		assert_eq!(response.status_code(), 400);
		assert_eq!(response.json::<serde_json::Value>()["kind"], "validation_failed");

		let response = app
			.post("/recipes")
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({
				"title": "Waffles",
				"description": "Crisp",
				"ingredients": ["flour"],
				"instructions": ["bake"],
				"category": "breakfast",
				"servngs": 4,
			}))
			.await;

		assert_eq!(response.status_code(), 400);

		let response = app
			.delete(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&stranger))
			.await;

		assert_eq!(response.status_code(), 403);

		let response = app
			.delete(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.await;

		assert_eq!(response.status_code(), 204);

		let response = app.get(&format!("/recipes/{id}")).await;
		assert_eq!(response.status_code(), 404);
	}

	#[sqlx::test]
	async fn test_update_image_is_released_on_failure(pool: Database) {
		let images = scratch_images();
		let app = app_with_images(pool, images.clone());
		let owner = register(&app, "owner").await;
		let stranger = register(&app, "stranger").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		let response = app
			.put(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&stranger))
			.content_type(&multipart_content_type())
			.bytes(multipart(&json!({ "title": "Stolen" })))
			.await;

		assert_eq!(response.status_code(), 403);
		assert_eq!(stored_images(&images), 0);

		let missing = uuid::Uuid::new_v4();
		let response = app
			.put(&format!("/recipes/{missing}"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.content_type(&multipart_content_type())
			.bytes(multipart(&json!({ "title": "Nowhere" })))
			.await;

		assert_eq!(response.status_code(), 404);
		assert_eq!(stored_images(&images), 0);

		for title in ["With photo", "New photo"] {
			let response = app
				.put(&format!("/recipes/{id}"))
				.add_header(AUTHORIZATION, bearer(&owner))
				.content_type(&multipart_content_type())
				.bytes(multipart(&json!({ "title": title })))
				.await;

			assert_eq!(response.status_code(), 200);

			let updated = response.json::<serde_json::Value>();
			assert_eq!(updated["title"], title);
			assert!(updated["image_url"]
				.as_str()
				.unwrap()
				.starts_with(crate::media::PUBLIC_PREFIX));
			assert_eq!(stored_images(&images), 1);
		}

		let _ = std::fs::remove_dir_all(images.root());
	}

	#[sqlx::test]
	async fn test_admin_may_update_and_delete(pool: Database) {
		let app = app(pool.clone());
		let owner = register(&app, "owner").await;
		let admin = register_admin(&app, &pool, "admin").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		let response = app
			.put(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&admin))
			.json(&json!({ "title": "Moderated" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let response = app
			.delete(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&admin))
			.await;

		assert_eq!(response.status_code(), 204);
	}

	#[sqlx::test]
	async fn test_drafts_are_hidden(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;
		let stranger = register(&app, "stranger").await;

		let draft = create_recipe(&app, &owner, json!({ "is_published": false })).await;
		let id = draft["id"].as_str().unwrap();
		create_recipe(&app, &owner, json!({ "title": "Public" })).await;

		let response = app.get(&format!("/recipes/{id}")).await;
		assert_eq!(response.status_code(), 404);

		let response = app
			.get(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&stranger))
			.await;
		assert_eq!(response.status_code(), 404);

		let response = app
			.get(&format!("/recipes/{id}"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.await;
		assert_eq!(response.status_code(), 200);

		let listing = app.get("/recipes").await.json::<serde_json::Value>();
		assert_eq!(listing["pagination"]["total"], 1);
		assert_eq!(listing["items"][0]["title"], "Public");
	}

	#[sqlx::test]
	async fn test_view_count_increments_on_fetch_only(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		app.get("/recipes").await;
		app.get(&format!("/recipes/{id}")).await;
		let recipe = app.get(&format!("/recipes/{id}")).await.json::<serde_json::Value>();

		assert_eq!(recipe["view_count"], 2);

		let listing = app.get("/recipes").await.json::<serde_json::Value>();
		assert_eq!(listing["items"][0]["view_count"], 2);
	}

	#[sqlx::test]
	async fn test_reviews(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;
		let critic = register(&app, "critic").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		let response = app
			.post(&format!("/recipes/{id}/reviews"))
			.add_header(AUTHORIZATION, bearer(&critic))
			.json(&json!({ "rating": 6 }))
			.await;

		assert_eq!(response.status_code(), 400);

		let response = app
			.post(&format!("/recipes/{id}/reviews"))
			.add_header(AUTHORIZATION, bearer(&critic))
			.json(&json!({ "rating": 5, "comment": "Lovely" }))
			.await;

		assert_eq!(response.status_code(), 200);

		let review_id = response.json::<serde_json::Value>()["id"]
			.as_str()
			.unwrap()
			.to_owned();

		let response = app
			.post(&format!("/recipes/{id}/reviews"))
			.add_header(AUTHORIZATION, bearer(&critic))
			.json(&json!({ "rating": 1 }))
			.await;

		assert_eq!(response.status_code(), 409);
		assert_eq!(response.json::<serde_json::Value>()["kind"], "conflict");

		let response = app
			.post(&format!("/recipes/{id}/reviews"))
			.add_header(AUTHORIZATION, bearer(&critic))
			.json(&json!({ "rating": 9 }))
			.await;

		assert_eq!(response.status_code(), 409);

		let recipe = app.get(&format!("/recipes/{id}")).await.json::<serde_json::Value>();
		assert_eq!(recipe["average_rating"], 5.0);
		assert_eq!(recipe["rating_count"], 1);

		let reviews = app
			.get(&format!("/recipes/{id}/reviews"))
			.await
			.json::<serde_json::Value>();
		assert_eq!(reviews["pagination"]["total"], 1);
		assert_eq!(reviews["items"][0]["user"]["username"], "critic");

		let response = app
			.post(&format!("/recipes/{id}/reviews/{review_id}/report"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({ "reason": "spam" }))
			.await;

		assert_eq!(response.status_code(), 204);
	}

	#[sqlx::test]
	async fn test_reviews_of_hidden_drafts(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;
		let stranger = register(&app, "stranger").await;

		let draft = create_recipe(&app, &owner, json!({ "is_published": false })).await;
		let id = draft["id"].as_str().unwrap();

		let response = app
			.post(&format!("/recipes/{id}/reviews"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({ "rating": 4 }))
			.await;

		assert_eq!(response.status_code(), 200);

		let review_id = response.json::<serde_json::Value>()["id"]
			.as_str()
			.unwrap()
			.to_owned();

		let response = app
			.post(&format!("/recipes/{id}/reviews/{review_id}/report"))
			.add_header(AUTHORIZATION, bearer(&stranger))
			.json(&json!({ "reason": "spam" }))
			.await;

		assert_eq!(response.status_code(), 404);

		let reported = app
			.post(&format!("/recipes/{id}/reviews/{review_id}/report"))
			.add_header(AUTHORIZATION, bearer(&owner))
			.json(&json!({ "reason": "spam" }))
			.await;

		assert_eq!(reported.status_code(), 204);
	}

	#[sqlx::test]
	async fn test_toggle_favorite_twice(pool: Database) {
		let app = app(pool.clone());
		let owner = register(&app, "owner").await;

		let recipe = create_recipe(&app, &owner, json!({})).await;
		let id = recipe["id"].as_str().unwrap();

		for expected in [true, false] {
			let response = app
				.post(&format!("/recipes/{id}/favorite"))
				.add_header(AUTHORIZATION, bearer(&owner))
				.await;

			assert_eq!(response.status_code(), 200);
			assert_eq!(response.json::<serde_json::Value>()["is_favorited"], expected);
		}

		let favorites = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM favorite")
			.fetch_one(&pool)
			.await
			.unwrap();

		assert_eq!(favorites, 0);
	}

	#[sqlx::test]
	async fn test_listing_pages(pool: Database) {
		let app = app(pool);
		let owner = register(&app, "owner").await;

		for i in 0..5 {
			create_recipe(&app, &owner, json!({ "title": format!("Recipe {i}") })).await;
		}

		let page = app
			.get("/recipes")
			.add_query_param("per_page", 2)
			.add_query_param("page", 3)
			.add_query_param("sort_by", "title")
			.add_query_param("sort_order", "asc")
			.await
			.json::<serde_json::Value>();

		assert_eq!(page["pagination"]["pages"], 3);
		assert_eq!(page["items"].as_array().unwrap().len(), 1);
		assert_eq!(page["items"][0]["title"], "Recipe 4");

		let past = app
			.get("/recipes")
			.add_query_param("per_page", 2)
			.add_query_param("page", 4)
			.await
			.json::<serde_json::Value>();

		assert_eq!(past["items"].as_array().unwrap().len(), 0);
		assert_eq!(past["pagination"]["has_next"], false);
		assert_eq!(past["pagination"]["total"], 5);

		let search = app
			.get("/recipes")
			.add_query_param("search", "RECIPE 3")
			.await
			.json::<serde_json::Value>();

		assert_eq!(search["pagination"]["total"], 1);
	}
}
