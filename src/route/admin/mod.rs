use aide::axum::{
	routing::{delete_with, get_with, post_with, put_with},
	ApiRouter,
};
use uuid::Uuid;

use crate::{
	error::{self, ErrorShape, Kind},
	policy, AppState,
};

pub mod model;
pub mod route;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("unknown user {0}")]
	UnknownUser(Uuid),
	#[error("unknown recipe {0}")]
	UnknownRecipe(Uuid),
	#[error("unknown review {0}")]
	UnknownReview(Uuid),
	#[error(transparent)]
	Denied(policy::Denied),
}

pub type RouteError = error::RouteError<Error>;

impl ErrorShape for Error {
	fn kind(&self) -> Kind {
		match self {
			Self::UnknownUser(..) | Self::UnknownRecipe(..) | Self::UnknownReview(..) => {
				Kind::NotFound
			}
			Self::Denied(denied) => denied.kind(),
		}
	}
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/dashboard", get_with(get_dashboard, get_dashboard_docs))
		.api_route("/users", get_with(get_users, get_users_docs))
		.api_route(
			"/users/:id/toggle-status",
			post_with(toggle_user_status, toggle_user_status_docs),
		)
		.api_route(
			"/users/:id/role",
			put_with(change_user_role, change_user_role_docs),
		)
		.api_route("/recipes", get_with(get_recipes, get_recipes_docs))
		.api_route(
			"/recipes/:id",
			delete_with(delete_recipe, delete_recipe_docs),
		)
		.api_route(
			"/recipes/:id/toggle-featured",
			post_with(toggle_featured, toggle_featured_docs),
		)
		.api_route(
			"/recipes/:id/toggle-publish",
			post_with(toggle_published, toggle_published_docs),
		)
		.api_route(
			"/reviews/reported",
			get_with(get_reported_reviews, get_reported_reviews_docs),
		)
		.api_route(
			"/reviews/:id/resolve",
			post_with(resolve_report, resolve_report_docs),
		)
}
