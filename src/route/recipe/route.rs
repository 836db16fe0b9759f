use axum::{extract::State, http::StatusCode};
use macros::route;
use validator::Validate;

use crate::{
	extract::{Form, Json, MaybeSession, Path, Query, Session, Unchecked},
	listing::{self, Criteria, Listing, Page, Sort, Window},
	media::ImageStore,
	openapi::tag,
	policy::{self, Actor, Operation, Target},
	route::model::{IdInput, PaginateInput},
	AppState, Database,
};

use super::{model, query, Error, RouteError};

/// Returns the recipe if `actor` may see it. Hidden drafts look exactly like
/// missing recipes.
async fn visible_recipe(
	executor: impl sqlx::PgExecutor<'_>,
	actor: Option<&Actor>,
	id: uuid::Uuid,
) -> Result<model::RecipeRow, RouteError> {
	let row = query::fetch_recipe(executor, id, actor.map(|actor| actor.id))
		.await?
		.ok_or(Error::UnknownRecipe(id))?;

	if !policy::can(actor, Operation::ViewRecipe, row.recipe.target()) {
		return Err(Error::UnknownRecipe(id).into());
	}

	Ok(row)
}

/// Get recipes
/// Returns a page of published recipes matching the search and filters.
#[route(tag = tag::RECIPE)]
pub async fn get_recipes(
	State(database): State<Database>,
	session: MaybeSession,
	Query(input): Query<model::RecipeListInput>,
) -> Result<Json<Page<model::RecipeView>>, RouteError> {
	let listing = Listing::new(
		Criteria::new()
			.flag("r.is_published", Some(true))
			.flag("r.is_featured", input.featured)
			.search(query::RECIPE_SEARCH, input.search.as_deref())
			.equals("r.category", input.category.as_deref())
			.equals("r.cuisine_type", input.cuisine_type.as_deref())
			.equals("r.dietary_preference", input.dietary_preference.as_deref())
			.equals("r.difficulty_level", input.difficulty_level.as_deref()),
		Sort::<model::RecipeSort>::parse(input.sort_by.as_deref(), input.sort_order.as_deref()),
		Window::new(input.page, input.per_page, listing::PUBLIC),
		"r.id",
	);

	let page = listing
		.fetch::<model::RecipeRow>(
			&database,
			query::select_recipes(session.actor().map(|actor| actor.id), query::RECIPE_FROM),
			query::RECIPE_FROM,
		)
		.await?;

	Ok(Json(page.map(model::RecipeView::from)))
}

/// Get single recipe
/// Returns a recipe by its unique id and counts the view. Drafts are only
/// visible to their owner and admins.
#[route(tag = tag::RECIPE)]
pub async fn get_recipe(
	State(database): State<Database>,
	session: MaybeSession,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<Json<model::RecipeView>, RouteError> {
	let actor = session.actor();
	let row = visible_recipe(&database, actor.as_ref(), id).await?;

	let view_count = sqlx::query_scalar::<_, i64>(
		"UPDATE recipe SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
	)
	.bind(id)
	.fetch_optional(&database)
	.await?
	.ok_or(Error::UnknownRecipe(id))?;

	let mut view = model::RecipeView::from(row);
	view.view_count = view_count;

	Ok(Json(view))
}

async fn store_upload(
	images: &ImageStore,
	upload: Option<crate::extract::Upload>,
) -> Result<Option<String>, RouteError> {
	match upload {
		Some(upload) => Ok(Some(
			images
				.store(&upload.filename, upload.bytes)
				.await
				.map_err(Error::Image)?,
		)),
		None => Ok(None),
	}
}

/// Create recipe
/// Creates a new recipe owned by the authenticated user. Send JSON, or
/// `multipart/form-data` with the same document in a `recipe` part and an
/// optional `image` file.
#[route(tag = tag::RECIPE)]
pub async fn create_recipe(
	State(state): State<AppState>,
	session: Session,
	Form { input, upload }: Form<model::CreateRecipeInput>,
) -> Result<Json<model::RecipeView>, RouteError> {
	let actor = session.actor();
	let recipe = input.normalize();
	let image = store_upload(&state.images, upload).await?;

	let created = async {
		let mut tx = state.database.begin().await?;

		let id = query::insert_recipe(&mut *tx, actor.id, &recipe, image.as_deref()).await?;
		let row = query::fetch_recipe(&mut *tx, id, Some(actor.id))
			.await?
			.ok_or(Error::UnknownRecipe(id))?;

		tx.commit().await?;
		Ok::<_, RouteError>(row)
	}
	.await;

	match created {
		Ok(row) => {
			tracing::info!(recipe = %row.recipe.id, user = %actor.id, "created recipe");
			Ok(Json(row.into()))
		}
		Err(error) => {
			if let Some(image) = image {
				state.images.release(&image).await;
			}

			Err(error)
		}
	}
}

/// Update recipe
/// Updates the fields present in the request; absent fields are left as they
/// are. Only the owner and admins may update a recipe. A new image replaces
/// the previous one.
#[route(tag = tag::RECIPE)]
pub async fn update_recipe(
	State(state): State<AppState>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
	Form { input, upload }: Form<model::UpdateRecipeInput>,
) -> Result<Json<model::RecipeView>, RouteError> {
	let actor = session.actor();
	let image = store_upload(&state.images, upload).await?;

	let updated = async {
		let mut tx = state.database.begin().await?;

		let mut recipe = query::lock_recipe(&mut *tx, id)
			.await?
			.ok_or(Error::UnknownRecipe(id))?;

		policy::check(Some(&actor), Operation::UpdateRecipe, recipe.target())
			.map_err(Error::Denied)?;

		if input.is_published.is_some_and(|published| published != recipe.is_published) {
			policy::check(Some(&actor), Operation::PublishRecipe, recipe.target())
				.map_err(Error::Denied)?;
		}

		input.apply(&mut recipe);

		let replaced = match &image {
			Some(image) => recipe.image_url.replace(image.clone()),
			None => None,
		};

		query::save_recipe(&mut *tx, &recipe).await?;

		let row = query::fetch_recipe(&mut *tx, id, Some(actor.id))
			.await?
			.ok_or(Error::UnknownRecipe(id))?;

		tx.commit().await?;
		Ok::<_, RouteError>((row, replaced))
	}
	.await;

	match updated {
		Ok((row, replaced)) => {
			if let Some(replaced) = replaced {
				state.images.release(&replaced).await;
			}

			tracing::info!(recipe = %id, user = %actor.id, "updated recipe");
			Ok(Json(row.into()))
		}
		Err(error) => {
			// the stored upload is only referenced once the transaction commits
			if let Some(image) = image {
				state.images.release(&image).await;
			}

			Err(error)
		}
	}
}

/// Deletes a recipe together with its reviews and favorites, then releases
/// its image.
pub async fn remove_recipe(state: &AppState, actor: &Actor, id: uuid::Uuid) -> Result<(), RouteError> {
	let mut tx = state.database.begin().await?;

	let recipe = query::lock_recipe(&mut *tx, id)
		.await?
		.ok_or(Error::UnknownRecipe(id))?;

	policy::check(Some(actor), Operation::DeleteRecipe, recipe.target()).map_err(Error::Denied)?;

	sqlx::query("DELETE FROM recipe WHERE id = $1")
		.bind(id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	if let Some(image) = &recipe.image_url {
		state.images.release(image).await;
	}

	tracing::info!(recipe = %id, user = %actor.id, "deleted recipe");

	Ok(())
}

/// Delete recipe
/// Deletes a recipe with its reviews and favorites. Only the owner and admins
/// may delete a recipe.
#[route(tag = tag::RECIPE, response(status = 204, description = "Recipe deleted."))]
pub async fn delete_recipe(
	State(state): State<AppState>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<StatusCode, RouteError> {
	remove_recipe(&state, &session.actor(), id).await?;

	Ok(StatusCode::NO_CONTENT)
}

/// Get recipe reviews
/// Returns a page of the reviews of a recipe, newest first.
#[route(tag = tag::RECIPE)]
pub async fn get_reviews(
	State(database): State<Database>,
	session: MaybeSession,
	Path(IdInput { id }): Path<IdInput>,
	Query(paginate): Query<PaginateInput>,
) -> Result<Json<Page<model::ReviewView>>, RouteError> {
	visible_recipe(&database, session.actor().as_ref(), id).await?;

	let listing = Listing::new(
		Criteria::new().id("v.recipe_id", id),
		Sort::<model::ReviewSort>::default(),
		paginate.window(listing::REVIEWS),
		"v.id",
	);

	let page = listing
		.fetch::<model::ReviewRow>(&database, query::select_reviews(), query::REVIEW_FROM)
		.await?;

	Ok(Json(page.map(model::ReviewView::from)))
}

/// Add review
/// Rates a recipe between 1 and 5 with an optional comment. Each user may
/// review a recipe once; a second review is a conflict whatever its rating.
#[route(tag = tag::RECIPE)]
pub async fn add_review(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
	Unchecked(input): Unchecked<model::ReviewInput>,
) -> Result<Json<model::ReviewView>, RouteError> {
	let actor = session.actor();
	let mut tx = database.begin().await?;

	let recipe = visible_recipe(&mut *tx, Some(&actor), id).await?;

	policy::check(Some(&actor), Operation::ReviewRecipe, recipe.recipe.target())
		.map_err(Error::Denied)?;

	let reviewed = sqlx::query_scalar::<_, bool>(
		"SELECT EXISTS (SELECT 1 FROM review WHERE user_id = $1 AND recipe_id = $2)",
	)
	.bind(actor.id)
	.bind(id)
	.fetch_one(&mut *tx)
	.await?;

	if reviewed {
		return Err(Error::DuplicateReview.into());
	}

	input.validate()?;

	let comment = input
		.comment
		.as_deref()
		.map(str::trim)
		.filter(|comment| !comment.is_empty());

	let review_id = sqlx::query_scalar::<_, uuid::Uuid>(
		"INSERT INTO review (user_id, recipe_id, rating, comment) VALUES ($1, $2, $3, $4) RETURNING id",
	)
	.bind(actor.id)
	.bind(id)
	.bind(input.rating)
	.bind(comment)
	.fetch_one(&mut *tx)
	.await
	.map_err(super::map_review_conflict)?;

	let review = query::fetch_review(&mut *tx, review_id)
		.await?
		.ok_or(Error::UnknownReview(review_id))?;

	tx.commit().await?;

	tracing::info!(recipe = %id, user = %actor.id, rating = input.rating, "added review");

	Ok(Json(review.into()))
}

/// Report review
/// Flags a review of a recipe for moderation, with a reason. Reviews of
/// drafts the caller may not see are not found.
#[route(tag = tag::RECIPE, response(status = 204, description = "Review reported."))]
pub async fn report_review(
	State(database): State<Database>,
	session: Session,
	Path(model::ReviewPath { id, review_id }): Path<model::ReviewPath>,
	Json(input): Json<model::ReportInput>,
) -> Result<StatusCode, RouteError> {
	let actor = session.actor();

	visible_recipe(&database, Some(&actor), id).await?;
	policy::check(Some(&actor), Operation::ReportReview, Target::Review).map_err(Error::Denied)?;

	let result = sqlx::query(
		r#"
			UPDATE review SET is_reported = true, report_reason = $3, updated_at = now()
			WHERE id = $1 AND recipe_id = $2
		"#,
	)
	.bind(review_id)
	.bind(id)
	.bind(input.reason.trim())
	.execute(&database)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::UnknownReview(review_id).into());
	}

	tracing::info!(review = %review_id, user = %actor.id, "reported review");

	Ok(StatusCode::NO_CONTENT)
}

/// Toggle favorite
/// Adds the recipe to the authenticated user's favorites, or removes it if it
/// is already there. Returns the resulting state.
#[route(tag = tag::RECIPE)]
pub async fn toggle_favorite(
	State(database): State<Database>,
	session: Session,
	Path(IdInput { id }): Path<IdInput>,
) -> Result<Json<model::FavoriteState>, RouteError> {
	let actor = session.actor();
	let mut tx = database.begin().await?;

	let recipe = visible_recipe(&mut *tx, Some(&actor), id).await?;

	policy::check(Some(&actor), Operation::FavoriteRecipe, recipe.recipe.target())
		.map_err(Error::Denied)?;

	let removed = sqlx::query("DELETE FROM favorite WHERE user_id = $1 AND recipe_id = $2")
		.bind(actor.id)
		.bind(id)
		.execute(&mut *tx)
		.await?
		.rows_affected();

	if removed == 0 {
		sqlx::query(
			r#"
				INSERT INTO favorite (user_id, recipe_id) VALUES ($1, $2)
				ON CONFLICT (user_id, recipe_id) DO NOTHING
			"#,
		)
		.bind(actor.id)
		.bind(id)
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	Ok(Json(model::FavoriteState {
		is_favorited: removed == 0,
	}))
}
