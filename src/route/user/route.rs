use axum::extract::State;
use macros::route;

use crate::{
	extract::{Json, MaybeSession, Path, Query, Session},
	listing::{self, Criteria, Listing, Page, Sort},
	openapi::tag,
	route::{
		model::PaginateInput,
		recipe::{
			model::{RecipeRow, RecipeView},
			query,
		},
	},
	Database,
};

use super::{model, Error, RouteError};

const FAVORITES_FROM: &str = "FROM favorite fav JOIN recipe r ON r.id = fav.recipe_id";

/// Get favorites
/// Returns a page of the published recipes the authenticated user has
/// favorited, most recently favorited first.
#[route(tag = tag::USER)]
pub async fn get_favorites(
	State(database): State<Database>,
	session: Session,
	Query(paginate): Query<PaginateInput>,
) -> Result<Json<Page<RecipeView>>, RouteError> {
	let actor = session.actor();
	let listing = Listing::new(
		Criteria::new()
			.id("fav.user_id", actor.id)
			.flag("r.is_published", Some(true)),
		Sort::<model::FavoriteSort>::default(),
		paginate.window(listing::PUBLIC),
		"fav.id",
	);

	let page = listing
		.fetch::<RecipeRow>(
			&database,
			query::select_recipes(Some(actor.id), FAVORITES_FROM),
			FAVORITES_FROM,
		)
		.await?;

	Ok(Json(page.map(RecipeView::from)))
}

/// Get own recipes
/// Returns a page of the authenticated user's recipes, newest first,
/// optionally limited to published recipes or drafts.
#[route(tag = tag::USER)]
pub async fn get_own_recipes(
	State(database): State<Database>,
	session: Session,
	Query(input): Query<model::OwnRecipesInput>,
) -> Result<Json<Page<RecipeView>>, RouteError> {
	let actor = session.actor();
	let listing = Listing::new(
		Criteria::new()
			.id("r.user_id", actor.id)
			.flag("r.is_published", input.status.published()),
		Sort::<model::NewestSort>::default(),
		listing::Window::new(input.page, input.per_page, listing::PUBLIC),
		"r.id",
	);

	let page = listing
		.fetch::<RecipeRow>(
			&database,
			query::select_recipes(Some(actor.id), query::RECIPE_FROM),
			query::RECIPE_FROM,
		)
		.await?;

	Ok(Json(page.map(RecipeView::from)))
}

/// Get dashboard
/// Returns counts over the authenticated user's recipes and favorites along
/// with their five most recent recipes.
#[route(tag = tag::USER)]
pub async fn get_dashboard(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<model::Dashboard>, RouteError> {
	let actor = session.actor();

	let stats = sqlx::query_as::<_, model::DashboardStats>(
		r#"
			SELECT
				COUNT(*) AS total_recipes,
				COUNT(*) FILTER (WHERE is_published) AS published_recipes,
				COUNT(*) FILTER (WHERE NOT is_published) AS draft_recipes,
				(SELECT COUNT(*) FROM favorite WHERE user_id = $1) AS total_favorites,
				COALESCE(SUM(view_count), 0)::int8 AS total_views
			FROM recipe
			WHERE user_id = $1
		"#,
	)
	.bind(actor.id)
	.fetch_one(&database)
	.await?;

	let mut recent = query::select_recipes(Some(actor.id), query::RECIPE_FROM);

	recent
		.push(" WHERE r.user_id = ")
		.push_bind(actor.id)
		.push(" ORDER BY r.created_at DESC, r.id DESC LIMIT 5");

	let recent_recipes = recent
		.build_query_as::<RecipeRow>()
		.fetch_all(&database)
		.await?
		.into_iter()
		.map(RecipeView::from)
		.collect();

	Ok(Json(model::Dashboard {
		stats,
		recent_recipes,
	}))
}

/// Get public profile
/// Returns the public profile of an active user with a page of their
/// published recipes.
#[route(tag = tag::USER)]
pub async fn get_profile(
	State(database): State<Database>,
	session: MaybeSession,
	Path(model::UsernameInput { username }): Path<model::UsernameInput>,
	Query(paginate): Query<PaginateInput>,
) -> Result<Json<model::ProfilePage>, RouteError> {
	let user = sqlx::query_as::<_, model::PublicProfile>(
		r#"
			SELECT
				u.id, u.username, u.first_name, u.last_name, u.bio, u.profile_image, u.created_at,
				COUNT(r.id) AS recipe_count,
				COALESCE(SUM(r.view_count), 0)::int8 AS total_views
			FROM "user" u
			LEFT JOIN recipe r ON r.user_id = u.id AND r.is_published
			WHERE u.username = $1 AND u.is_active
			GROUP BY u.id
		"#,
	)
	.bind(&username)
	.fetch_optional(&database)
	.await?;

	let Some(user) = user else {
		return Err(Error::UnknownUser(username).into());
	};

	let listing = Listing::new(
		Criteria::new()
			.id("r.user_id", user.id)
			.flag("r.is_published", Some(true)),
		Sort::<model::NewestSort>::default(),
		paginate.window(listing::PUBLIC),
		"r.id",
	);

	let recipes = listing
		.fetch::<RecipeRow>(
			&database,
			query::select_recipes(session.actor().map(|actor| actor.id), query::RECIPE_FROM),
			query::RECIPE_FROM,
		)
		.await?;

	Ok(Json(model::ProfilePage {
		user,
		recipes: recipes.map(RecipeView::from),
	}))
}
