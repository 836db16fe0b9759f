use aide::axum::IntoApiResponse;
use axum::{
	extract::State,
	http::{header, HeaderName, StatusCode},
};
use macros::route;
use uuid::Uuid;

use crate::{
	extract::{Json, Session},
	openapi::tag,
	policy::Role,
	session::{self, SessionTtl},
	AppState, Database,
};

use super::{hash_password, map_user_conflict, model, Error, RouteError};

async fn create_session(
	executor: impl sqlx::PgExecutor<'_>,
	user: model::User,
	SessionTtl(ttl): SessionTtl,
) -> Result<([(HeaderName, String); 1], Json<model::Authenticated>), RouteError> {
	let session = sqlx::query_as!(
		model::Session,
		"INSERT INTO session (user_id) VALUES ($1) RETURNING *",
		user.id
	)
	.fetch_one(executor)
	.await?;

	let cookie = session::create_cookie(session.id, ttl);

	Ok((
		[(header::SET_COOKIE, cookie.to_string())],
		Json(model::Authenticated {
			session_id: session.id,
			expires_at: session.created_at + ttl,
			user,
		}),
	))
}

/// Log in
/// Logs in to an account, returning a session id and an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Logged in successfully.", shape = "Json<model::Authenticated>"))]
pub async fn login(
	State(state): State<AppState>,
	Json(auth): Json<model::LoginInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user = sqlx::query_as!(
		model::User,
		r#"
			SELECT id, email, password, username, first_name, last_name, bio,
				profile_image, role AS "role: Role", is_active, created_at, updated_at
			FROM "user" WHERE email = $1
		"#,
		auth.email
	)
	.fetch_optional(&state.database)
	.await?;

	let Some(user) = user else {
		return Err(Error::InvalidEmailOrPassword.into());
	};

	let hashed = hash_password(&state.hasher, &auth.password, &user.id).map_err(Error::Argon)?;

	if user.password != hashed {
		return Err(Error::InvalidEmailOrPassword.into());
	}

	if !user.is_active {
		return Err(Error::AccountDisabled.into());
	}

	tracing::info!(user = %user.id, "logged in");

	create_session(&state.database, user, state.session_ttl).await
}

/// Log out
/// Logs out of the authenticated account and clears the session cookie.
#[route(tag = tag::AUTH, response(status = 204, description = "Logged out successfully."))]
pub async fn logout(
	State(database): State<Database>,
	session: Session,
) -> Result<impl IntoApiResponse, RouteError> {
	sqlx::query("DELETE FROM session WHERE id = $1")
		.bind(session.id)
		.execute(&database)
		.await?;

	Ok((
		[(header::SET_COOKIE, session::clear_cookie().to_string())],
		StatusCode::NO_CONTENT,
	))
}

/// Register account
/// Registers a new account, returning a session id and an associated session cookie.
#[route(tag = tag::AUTH, response(status = 200, description = "Registered successfully.", shape = "Json<model::Authenticated>"))]
pub async fn register(
	State(state): State<AppState>,
	Json(auth): Json<model::RegisterInput>,
) -> Result<impl IntoApiResponse, RouteError> {
	let user_id = Uuid::new_v4();
	let hashed = hash_password(&state.hasher, &auth.password, &user_id).map_err(Error::Argon)?;

	let mut tx = state.database.begin().await?;

	let user = sqlx::query_as::<_, model::User>(
		r#"
			INSERT INTO "user" (id, email, username, password, first_name, last_name, role)
			VALUES ($1, $2, $3, $4, NULLIF($5::text, ''), NULLIF($6::text, ''), $7)
			RETURNING *
		"#,
	)
	.bind(user_id)
	.bind(auth.email.trim())
	.bind(auth.username.trim())
	.bind(&hashed[..])
	.bind(auth.first_name.as_deref().map(str::trim))
	.bind(auth.last_name.as_deref().map(str::trim))
	.bind(Role::User)
	.fetch_one(&mut *tx)
	.await
	.map_err(map_user_conflict)?;

	let response = create_session(&mut *tx, user, state.session_ttl).await?;

	tx.commit().await?;

	tracing::info!(user = %user_id, "registered account");

	Ok(response)
}

/// Get user
/// Returns the authenticated user.
#[route(tag = tag::AUTH)]
pub async fn get_me(session: Session) -> Json<model::User> {
	Json(session.user)
}

/// Update user
/// Updates the authenticated user's profile. Absent fields are left untouched
/// and an empty string clears an optional field.
#[route(tag = tag::AUTH)]
pub async fn update_me(
	State(database): State<Database>,
	session: Session,
	Json(input): Json<model::UpdateUserInput>,
) -> Result<Json<model::User>, RouteError> {
	let user = sqlx::query_as::<_, model::User>(
		r#"
			UPDATE "user"
			SET
				email = COALESCE($1, email),
				username = COALESCE($2, username),
				first_name = CASE WHEN $3::text IS NULL THEN first_name ELSE NULLIF($3, '') END,
				last_name = CASE WHEN $4::text IS NULL THEN last_name ELSE NULLIF($4, '') END,
				bio = CASE WHEN $5::text IS NULL THEN bio ELSE NULLIF($5, '') END,
				profile_image = CASE WHEN $6::text IS NULL THEN profile_image ELSE NULLIF($6, '') END,
				updated_at = now()
			WHERE id = $7
			RETURNING *
		"#,
	)
	.bind(input.email.as_deref().map(str::trim))
	.bind(input.username.as_deref().map(str::trim))
	.bind(input.first_name.as_deref().map(str::trim))
	.bind(input.last_name.as_deref().map(str::trim))
	.bind(input.bio.as_deref().map(str::trim))
	.bind(input.profile_image.as_deref().map(str::trim))
	.bind(session.user.id)
	.fetch_one(&database)
	.await
	.map_err(map_user_conflict)?;

	Ok(Json(user))
}

/// Change password
/// Replaces the password of the authenticated user after checking the current
/// one. Every other session of the user is ended.
#[route(tag = tag::AUTH, response(status = 204, description = "Password changed."))]
pub async fn change_password(
	State(state): State<AppState>,
	session: Session,
	Json(input): Json<model::ChangePasswordInput>,
) -> Result<StatusCode, RouteError> {
	let user = &session.user;
	let current =
		hash_password(&state.hasher, &input.current_password, &user.id).map_err(Error::Argon)?;

	if user.password != current {
		return Err(Error::IncorrectPassword.into());
	}

	let hashed =
		hash_password(&state.hasher, &input.new_password, &user.id).map_err(Error::Argon)?;

	let mut tx = state.database.begin().await?;

	sqlx::query(r#"UPDATE "user" SET password = $1, updated_at = now() WHERE id = $2"#)
		.bind(&hashed[..])
		.bind(user.id)
		.execute(&mut *tx)
		.await?;

	sqlx::query("DELETE FROM session WHERE user_id = $1 AND id <> $2")
		.bind(user.id)
		.bind(session.id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	tracing::info!(user = %user.id, "changed password");

	Ok(StatusCode::NO_CONTENT)
}
