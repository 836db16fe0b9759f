use uuid::Uuid;

pub const COOKIE_NAME: &str = "session";

/// How long a session stays valid after it is created.
#[derive(Debug, Clone, Copy)]
pub struct SessionTtl(pub chrono::Duration);

/// Creates a session cookie that expires together with the session.
pub fn create_cookie(session_id: Uuid, ttl: chrono::Duration) -> cookie::Cookie<'static> {
	cookie::Cookie::build((COOKIE_NAME, session_id.to_string()))
		.secure(!cfg!(debug_assertions))
		.http_only(true)
		.same_site(cookie::SameSite::Lax)
		.path("/")
		.max_age(cookie::time::Duration::seconds(ttl.num_seconds()))
		.into()
}

/// Creates an empty session cookie used to invalidate a previous one
pub fn clear_cookie() -> cookie::Cookie<'static> {
	cookie::Cookie::build(COOKIE_NAME)
		.http_only(true)
		.path("/")
		.max_age(cookie::time::Duration::ZERO)
		.into()
}
