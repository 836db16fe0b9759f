use aide::{
	openapi::{ApiKeyLocation, SecurityScheme, Tag},
	transform::TransformOpenApi,
};

use crate::{
	error::{ErrorResponse, FieldMessage, Kind},
	extract::Json,
	session,
};

pub const SECURITY_SCHEME_SESSION: &str = "Session";
pub const SECURITY_SCHEME_BEARER: &str = "Bearer";

pub mod tag {
	pub const AUTH: &str = "Auth";
	pub const RECIPE: &str = "Recipe";
	pub const USER: &str = "User";
	pub const ADMIN: &str = "Admin";
	pub const STATS: &str = "Stats";
}

pub fn docs(api: TransformOpenApi) -> TransformOpenApi {
	api.title("Recipe API")
		.summary("Share, rate and collect recipes")
		.description(
			"Users publish recipes, review and favorite each other's recipes, \
			 and administrators moderate users, recipes and reported reviews.",
		)
		.tag(Tag {
			name: tag::AUTH.into(),
			description: Some("Accounts and sessions".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::RECIPE.into(),
			description: Some("Recipes, reviews and favorites".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::USER.into(),
			description: Some("Personal dashboard and public profiles".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::ADMIN.into(),
			description: Some("Moderation, restricted to administrators".into()),
			..Default::default()
		})
		.tag(Tag {
			name: tag::STATS.into(),
			description: Some("Site-wide totals".into()),
			..Default::default()
		})
		.security_scheme(
			SECURITY_SCHEME_SESSION,
			SecurityScheme::ApiKey {
				location: ApiKeyLocation::Cookie,
				name: session::COOKIE_NAME.into(),
				description: Some("A user session cookie".into()),
				extensions: Default::default(),
			},
		)
		.security_scheme(
			SECURITY_SCHEME_BEARER,
			SecurityScheme::Http {
				scheme: "bearer".into(),
				bearer_format: Some("session id".into()),
				description: Some("The session id returned by login or register".into()),
				extensions: Default::default(),
			},
		)
		.default_response_with::<Json<ErrorResponse>, _>(|res| {
			res.example(ErrorResponse {
				kind: Kind::ValidationFailed,
				error: Kind::ValidationFailed.summary().into(),
				details: "one or more fields are invalid".into(),
				fields: vec![FieldMessage {
					field: "rating".into(),
					message: "range".into(),
				}],
			})
		})
}
