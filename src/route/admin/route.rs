use axum::{extract::State, http::StatusCode};
use macros::route;

use crate::{
	extract::{Json, Path, Query, Session},
	listing::{self, Criteria, Listing, Page, Sort, Window},
	openapi::tag,
	policy::{self, Actor, Operation, Target},
	route::{
		auth::model::User,
		model::{IdInput, PaginateInput},
		recipe::{self, model as recipe_model, query},
	},
	AppState, Database,
};

use super::{model, Error, RouteError};

const USER_FROM: &str = r#"FROM "user" u"#;
const USER_SEARCH: &[&str] = &["u.username", "u.email", "u.first_name", "u.last_name"];
const RECIPE_SEARCH: &[&str] = &["r.title", "r.description"];

/// Resolves the session to an actor allowed to use the admin area.
fn moderator(session: &Session) -> Result<Actor, RouteError> {
	let actor = session.actor();

	policy::check(Some(&actor), Operation::Moderate, Target::Site).map_err(Error::Denied)?;

	Ok(actor)
}

/// Get admin dashboard
/// Returns site-wide totals with the most viewed recipes and the newest users.
#[route(tag = tag::ADMIN)]
pub async fn get_dashboard(
	State(database): State<Database>,
	session: Session,
) -> Result<Json<model::Dashboard>, RouteError> {
	let actor = moderator(&session)?;

	let stats = sqlx::query_as::<_, model::SiteTotals>(
		r#"
			SELECT
				(SELECT COUNT(*) FROM "user") AS total_users,
				(SELECT COUNT(*) FROM "user" WHERE is_active) AS active_users,
				(SELECT COUNT(*) FROM "user" WHERE created_at > now() - interval '7 days') AS new_users_week,
				(SELECT COUNT(*) FROM "user" WHERE created_at > now() - interval '30 days') AS new_users_month,
				(SELECT COUNT(*) FROM recipe) AS total_recipes,
				(SELECT COUNT(*) FROM recipe WHERE is_published) AS published_recipes,
				(SELECT COUNT(*) FROM recipe WHERE NOT is_published) AS draft_recipes,
				(SELECT COUNT(*) FROM recipe WHERE created_at > now() - interval '7 days') AS new_recipes_week,
				(SELECT COUNT(*) FROM recipe WHERE created_at > now() - interval '30 days') AS new_recipes_month,
				(SELECT COUNT(*) FROM review) AS total_reviews,
				(SELECT COUNT(*) FROM review WHERE is_reported) AS reported_reviews,
				(SELECT COUNT(*) FROM review WHERE created_at > now() - interval '7 days') AS new_reviews_week
		"#,
	)
	.fetch_one(&database)
	.await?;

	let mut popular = query::select_recipes(Some(actor.id), query::RECIPE_FROM);

	popular.push(" WHERE r.is_published ORDER BY r.view_count DESC, r.id DESC LIMIT 5");

	let popular_recipes = popular
		.build_query_as::<recipe_model::RecipeRow>()
		.fetch_all(&database)
		.await?
		.into_iter()
		.map(recipe_model::RecipeView::from)
		.collect();

	let recent_users = sqlx::query_as::<_, User>(
		r#"SELECT * FROM "user" ORDER BY created_at DESC, id DESC LIMIT 5"#,
	)
	.fetch_all(&database)
	.await?;

	Ok(Json(model::Dashboard {
		stats,
		popular_recipes,
		recent_users,
	}))
}

/// Get users
/// Returns a page of all users, newest first, filtered by search, account
/// status and role.
#[route(tag = tag::ADMIN)]
pub async fn get_users(
	State(database): State<Database>,
	session: Session,
	Query(input): Query<model::UserListInput>,
) -> Result<Json<Page<User>>, RouteError> {
	moderator(&session)?;

	let listing = Listing::new(
		Criteria::new()
			.search(USER_SEARCH, input.search.as_deref())
			.flag("u.is_active", input.status.active())
			.equals("u.role::text", input.role.role()),
		Sort::<model::UserSort>::default(),
		Window::new(input.page, input.per_page, listing::ADMIN),
		"u.id",
	);

	let page = listing
		.fetch::<User>(
			&database,
			sqlx::QueryBuilder::new(format!("SELECT u.* {USER_FROM}")),
			USER_FROM,
		)
		.await?;

	Ok(Json(page))
}

/// Toggle user status
/// Activates a deactivated user or deactivates an active one. Deactivated
/// users can no longer log in and their sessions stop working. Admins cannot
/// deactivate themselves.
#[route(tag = tag::ADMIN)]
pub async fn toggle_user_status(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<Json<User>, RouteError> {
	let actor = moderator(&session)?;

	policy::check(Some(&actor), Operation::ToggleActive, Target::User(id)).map_err(Error::Denied)?;

	let user = sqlx::query_as!(
		User,
		r#"
			UPDATE "user" SET is_active = NOT is_active, updated_at = now() WHERE id = $1
			RETURNING id, email, password, username, first_name, last_name, bio,
				profile_image, role AS "role: crate::policy::Role", is_active, created_at, updated_at
		"#,
		id
	)
	.fetch_optional(&database)
	.await?
	.ok_or(Error::UnknownUser(id))?;

	tracing::info!(user = %id, admin = %actor.id, active = user.is_active, "toggled user status");

	Ok(Json(user))
}

/// Change user role
/// Sets the role of a user. Admins cannot demote themselves.
#[route(tag = tag::ADMIN)]
pub async fn change_user_role(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
	Json(input): Json<model::RoleInput>,
) -> Result<Json<User>, RouteError> {
	let actor = moderator(&session)?;

	policy::check(Some(&actor), Operation::ChangeRole(input.role), Target::User(id))
		.map_err(Error::Denied)?;

	let user = sqlx::query_as::<_, User>(
		r#"UPDATE "user" SET role = $2, updated_at = now() WHERE id = $1 RETURNING *"#,
	)
	.bind(id)
	.bind(input.role)
	.fetch_optional(&database)
	.await?
	.ok_or(Error::UnknownUser(id))?;

	tracing::info!(user = %id, admin = %actor.id, role = ?user.role, "changed user role");

	Ok(Json(user))
}

/// Get recipes
/// Returns a page of all recipes, drafts included, filtered by search,
/// publication status and category.
#[route(tag = tag::ADMIN)]
pub async fn get_recipes(
	State(database): State<Database>,
	session: Session,
	Query(input): Query<model::RecipeListInput>,
) -> Result<Json<Page<recipe_model::RecipeView>>, RouteError> {
	let actor = moderator(&session)?;

	let listing = Listing::new(
		Criteria::new()
			.search(RECIPE_SEARCH, input.search.as_deref())
			.flag("r.is_published", input.status.published())
			.equals("r.category", input.category.as_deref()),
		Sort::<recipe_model::RecipeSort>::parse(
			input.sort_by.as_deref(),
			input.sort_order.as_deref(),
		),
		Window::new(input.page, input.per_page, listing::ADMIN),
		"r.id",
	);

	let page = listing
		.fetch::<recipe_model::RecipeRow>(
			&database,
			query::select_recipes(Some(actor.id), query::RECIPE_FROM),
			query::RECIPE_FROM,
		)
		.await?;

	Ok(Json(page.map(recipe_model::RecipeView::from)))
}

/// Flips one flag of a recipe inside a transaction and returns the result.
async fn toggle_recipe(
	database: &Database,
	actor: &Actor,
	id: uuid::Uuid,
	operation: Operation,
	update: &'static str,
) -> Result<recipe_model::RecipeView, RouteError> {
	let mut tx = database.begin().await?;

	let recipe = query::lock_recipe(&mut *tx, id)
		.await?
		.ok_or(Error::UnknownRecipe(id))?;

	policy::check(Some(actor), operation, recipe.target()).map_err(Error::Denied)?;

	sqlx::query(update).bind(id).execute(&mut *tx).await?;

	let row = query::fetch_recipe(&mut *tx, id, Some(actor.id))
		.await?
		.ok_or(Error::UnknownRecipe(id))?;

	tx.commit().await?;

	Ok(row.into())
}

/// Toggle featured
/// Features or unfeatures a recipe.
#[route(tag = tag::ADMIN)]
pub async fn toggle_featured(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<Json<recipe_model::RecipeView>, RouteError> {
	let actor = moderator(&session)?;
	let view = toggle_recipe(
		&database,
		&actor,
		id,
		Operation::FeatureRecipe,
		"UPDATE recipe SET is_featured = NOT is_featured, updated_at = now() WHERE id = $1",
	)
	.await?;

	tracing::info!(recipe = %id, admin = %actor.id, featured = view.is_featured, "toggled featured");

	Ok(Json(view))
}

/// Toggle published
/// Publishes a draft or moves a published recipe back to drafts.
#[route(tag = tag::ADMIN)]
pub async fn toggle_published(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<Json<recipe_model::RecipeView>, RouteError> {
	let actor = moderator(&session)?;
	let view = toggle_recipe(
		&database,
		&actor,
		id,
		Operation::PublishRecipe,
		"UPDATE recipe SET is_published = NOT is_published, updated_at = now() WHERE id = $1",
	)
	.await?;

	tracing::info!(recipe = %id, admin = %actor.id, published = view.is_published, "toggled published");

	Ok(Json(view))
}

/// Delete recipe
/// Deletes any recipe with its reviews and favorites.
#[route(tag = tag::ADMIN, response(status = 204, description = "Recipe deleted."))]
pub async fn delete_recipe(
	State(state): State<AppState>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<StatusCode, recipe::RouteError> {
	let actor = session.actor();

	policy::check(Some(&actor), Operation::Moderate, Target::Site).map_err(recipe::Error::Denied)?;
	recipe::route::remove_recipe(&state, &actor, id).await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Get reported reviews
/// Returns a page of the reviews awaiting moderation, newest first.
#[route(tag = tag::ADMIN)]
pub async fn get_reported_reviews(
	State(database): State<Database>,
	session: Session,
	Query(paginate): Query<PaginateInput>,
) -> Result<Json<Page<recipe_model::ReviewView>>, RouteError> {
	moderator(&session)?;

	let listing = Listing::new(
		Criteria::new().flag("v.is_reported", Some(true)),
		Sort::<recipe_model::ReviewSort>::default(),
		paginate.window(listing::ADMIN),
		"v.id",
	);

	let page = listing
		.fetch::<recipe_model::ReviewRow>(&database, query::select_reviews(), query::REVIEW_FROM)
		.await?;

	Ok(Json(page.map(recipe_model::ReviewView::from)))
}

/// Resolve report
/// Either dismisses the report on a review, keeping the review, or deletes
/// the review.
#[route(tag = tag::ADMIN)]
pub async fn resolve_report(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
	Json(input): Json<model::ResolveInput>,
) -> Result<Json<model::Resolution>, RouteError> {
	let actor = moderator(&session)?;

	policy::check(Some(&actor), Operation::ResolveReport, Target::Review).map_err(Error::Denied)?;

	let result = match input.action {
		model::ResolveAction::Dismiss => {
			sqlx::query(
				r#"
					UPDATE review SET is_reported = false, report_reason = NULL, updated_at = now()
					WHERE id = $1
				"#,
			)
			.bind(id)
			.execute(&database)
			.await?
		}
		model::ResolveAction::Delete => {
			sqlx::query("DELETE FROM review WHERE id = $1")
				.bind(id)
				.execute(&database)
				.await?
		}
	};

	if result.rows_affected() == 0 {
		return Err(Error::UnknownReview(id).into());
	}

	tracing::info!(review = %id, admin = %actor.id, action = ?input.action, "resolved review report");

	Ok(Json(model::Resolution {
		review_id: id,
		action: input.action,
	}))
}
