use std::str::FromStr;

use aide::OperationInput;
use axum::{
	extract::{FromRef, FromRequestParts},
	http::{header, request, HeaderMap},
};
use uuid::Uuid;

use crate::{
	error::RouteError,
	openapi::{SECURITY_SCHEME_BEARER, SECURITY_SCHEME_SESSION},
	policy::Actor,
	route::auth,
	session::{self, SessionTtl},
	Database,
};

pub const AUTHORIZATION_PREFIX: &str = "Bearer ";

/// Where the session id of a request came from, if anywhere.
fn session_id(headers: &HeaderMap) -> Result<Option<Uuid>, auth::Error> {
	if let Some(value) = headers.get(header::AUTHORIZATION) {
		let token = value
			.to_str()
			.ok()
			.and_then(|value| value.strip_prefix(AUTHORIZATION_PREFIX))
			.ok_or(auth::Error::InvalidSession)?;

		return Uuid::from_str(token.trim())
			.map(Some)
			.map_err(|_| auth::Error::InvalidSession);
	}

	let cookie = headers
		.get_all(header::COOKIE)
		.into_iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(cookie::Cookie::split_parse)
		.filter_map(Result::ok)
		.find(|cookie| cookie.name() == session::COOKIE_NAME);

	cookie
		.map(|cookie| Uuid::parse_str(cookie.value()).map_err(|_| auth::Error::InvalidSession))
		.transpose()
}

/// Extracts the session and related user from the request.
///
/// The session id is read from an `Authorization: Bearer <id>` header or the
/// session cookie. If neither is present, [`auth::Error::NoSession`] is returned.
/// If the session is unknown, expired or belongs to a deactivated account,
/// [`auth::Error::InvalidSession`] is returned.
///
/// ```rust
/// async fn route(session: Session) {
///   println!("{:?}", session.user);
/// }
/// ```
#[derive(Debug)]
pub struct Session {
	pub id: Uuid,
	pub user: auth::model::User,
}

impl Session {
	pub fn actor(&self) -> Actor {
		Actor {
			id: self.user.id,
			role: self.user.role,
		}
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
	Database: FromRef<S>,
	SessionTtl: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let session_id = session_id(&parts.headers)?.ok_or(auth::Error::NoSession)?;

		let database = Database::from_ref(state);
		let SessionTtl(ttl) = SessionTtl::from_ref(state);

		let user = sqlx::query_as::<_, auth::model::User>(
			r#"
				SELECT u.* FROM "user" u
				JOIN session s ON s.user_id = u.id
				WHERE s.id = $1 AND s.created_at > $2 AND u.is_active
			"#,
		)
		.bind(session_id)
		.bind(chrono::Utc::now() - ttl)
		.fetch_optional(&database)
		.await?;

		let user = user.ok_or(auth::Error::InvalidSession)?;

		Ok(Session {
			id: session_id,
			user,
		})
	}
}

impl OperationInput for Session {
	/// Operation input for the session extractor.
	///
	/// This adds a session requirement to the `OpenAPI` operation.
	fn operation_input(_ctx: &mut aide::gen::GenContext, operation: &mut aide::openapi::Operation) {
		operation.security.extend([
			[(SECURITY_SCHEME_SESSION.to_string(), Vec::new())]
				.into_iter()
				.collect(),
			[(SECURITY_SCHEME_BEARER.to_string(), Vec::new())]
				.into_iter()
				.collect(),
		]);
	}
}

/// Resolves the actor of a request that may be anonymous.
///
/// Yields `None` only when the request carries no credentials at all;
/// credentials that are present but invalid are rejected like [`Session`].
#[derive(Debug)]
pub struct MaybeSession(pub Option<Session>);

impl MaybeSession {
	pub fn actor(&self) -> Option<Actor> {
		self.0.as_ref().map(Session::actor)
	}
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for MaybeSession
where
	Database: FromRef<S>,
	SessionTtl: FromRef<S>,
	S: Sync + Send,
{
	type Rejection = RouteError<auth::Error>;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		if session_id(&parts.headers)?.is_none() {
			return Ok(Self(None));
		}

		Session::from_request_parts(parts, state)
			.await
			.map(|session| Self(Some(session)))
	}
}

impl OperationInput for MaybeSession {}
