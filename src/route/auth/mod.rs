use aide::axum::{
	routing::{get_with, post_with},
	ApiRouter,
};
use argon2::Argon2;
use uuid::Uuid;

use crate::{
	config::Bootstrap,
	error::{self, Kind},
	policy::Role,
	AppState, Database,
};

pub mod model;
pub mod route;

pub const KEY_LENGTH: usize = 32;

/// An error that can occur during authentication.
///
/// Note that the messages are presented to the client, so they should not contain
/// sensitive information.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid email or password")]
	InvalidEmailOrPassword,
	#[error("current password is incorrect")]
	IncorrectPassword,
	#[error("account is deactivated")]
	AccountDisabled,
	#[error("password hashing failed")]
	Argon(#[from] argon2::Error),
	#[error("no session cookie or bearer token")]
	NoSession,
	#[error("invalid or expired session")]
	InvalidSession,
	#[error("username already taken")]
	UsernameTaken,
	#[error("email already taken")]
	EmailTaken,
}

pub type RouteError = error::RouteError<Error>;

impl error::ErrorShape for Error {
	fn kind(&self) -> Kind {
		match self {
			Self::InvalidEmailOrPassword | Self::NoSession | Self::InvalidSession => {
				Kind::Unauthorized
			}
			Self::IncorrectPassword => Kind::ValidationFailed,
			Self::AccountDisabled => Kind::Forbidden,
			Self::Argon(..) => Kind::Unexpected,
			Self::UsernameTaken | Self::EmailTaken => Kind::Conflict,
		}
	}
}

pub fn routes() -> ApiRouter<AppState> {
	use route::*;

	ApiRouter::new()
		.api_route("/login", post_with(login, login_docs))
		.api_route("/logout", get_with(logout, logout_docs))
		.api_route("/register", post_with(register, register_docs))
		.api_route(
			"/me",
			get_with(get_me, get_me_docs).put_with(update_me, update_me_docs),
		)
		.api_route(
			"/change-password",
			post_with(change_password, change_password_docs),
		)
}

/// Hashes a password with Argon2, using the user's id as a salt.
pub fn hash_password(
	hasher: &Argon2,
	password: &str,
	id: &Uuid,
) -> Result<[u8; KEY_LENGTH], argon2::Error> {
	let mut hash = [0; KEY_LENGTH];

	hasher.hash_password_into(password.as_bytes(), id.as_bytes(), &mut hash)?;
	Ok(hash)
}

/// Maps unique-constraint violations on the user table to their error.
pub fn map_user_conflict(error: sqlx::Error) -> RouteError {
	match error::constraint(&error) {
		Some("user_email_key") => Error::EmailTaken.into(),
		Some("user_username_key") => Error::UsernameTaken.into(),
		_ => RouteError::from(error),
	}
}

/// Creates the configured admin account unless its email is already known.
pub async fn bootstrap_admin(
	database: &Database,
	hasher: &Argon2<'static>,
	admin: &Bootstrap,
) -> Result<(), RouteError> {
	let exists = sqlx::query_scalar::<_, bool>(
		r#"SELECT EXISTS (SELECT 1 FROM "user" WHERE email = $1)"#,
	)
	.bind(&admin.email)
	.fetch_one(database)
	.await?;

	if exists {
		return Ok(());
	}

	let id = Uuid::new_v4();
	let hashed = hash_password(hasher, &admin.password, &id).map_err(Error::Argon)?;

	sqlx::query(
		r#"
			INSERT INTO "user" (id, email, username, password, role)
			VALUES ($1, $2, $3, $4, $5)
		"#,
	)
	.bind(id)
	.bind(&admin.email)
	.bind(&admin.username)
	.bind(&hashed[..])
	.bind(Role::Admin)
	.execute(database)
	.await
	.map_err(map_user_conflict)?;

	tracing::info!(email = %admin.email, "created admin account");

	Ok(())
}
