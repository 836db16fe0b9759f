use std::{borrow::Cow, convert::Infallible};

use aide::OperationOutput;
use axum::{
	body::Body,
	extract::{multipart, rejection},
	http::{Response, StatusCode},
	response::IntoResponse,
	Json,
};
use schemars::JsonSchema;
use serde::Serialize;

/// Machine-readable error category returned with every failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
	ValidationFailed,
	Unauthorized,
	Forbidden,
	NotFound,
	Conflict,
	Unexpected,
}

impl Kind {
	pub fn status(self) -> StatusCode {
		match self {
			Self::ValidationFailed => StatusCode::BAD_REQUEST,
			Self::Unauthorized => StatusCode::UNAUTHORIZED,
			Self::Forbidden => StatusCode::FORBIDDEN,
			Self::NotFound => StatusCode::NOT_FOUND,
			Self::Conflict => StatusCode::CONFLICT,
			Self::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	pub fn summary(self) -> &'static str {
		match self {
			Self::ValidationFailed => "invalid request",
			Self::Unauthorized => "authentication required",
			Self::Forbidden => "permission denied",
			Self::NotFound => "not found",
			Self::Conflict => "conflict",
			Self::Unexpected => "unexpected error",
		}
	}
}

/// A single field-level validation message.
#[derive(Debug, Serialize, JsonSchema)]
pub struct FieldMessage {
	pub field: String,
	pub message: String,
}

/// The body of every error response.
#[derive(Debug, Serialize, JsonSchema)]
pub struct ErrorResponse {
	pub kind: Kind,
	/// A human-readable summary of the failure.
	pub error: Cow<'static, str>,
	/// A diagnostic string describing what went wrong.
	pub details: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub fields: Vec<FieldMessage>,
}

/// Describes how a route-specific error is presented to the client.
///
/// The [`Display`](std::fmt::Display) output is used as the `details` field
/// unless [`ErrorShape::details`] is overridden, so it must not contain
/// sensitive information for kinds other than [`Kind::Unexpected`].
pub trait ErrorShape: std::error::Error {
	fn kind(&self) -> Kind;

	fn summary(&self) -> Cow<'static, str> {
		self.kind().summary().into()
	}

	fn details(&self) -> String {
		self.to_string()
	}
}

impl ErrorShape for Infallible {
	fn kind(&self) -> Kind {
		match *self {}
	}
}

/// Error type returned by handlers and extractors.
///
/// `E` is the error enum of the route module. Framework rejections, request
/// validation failures and database errors are shared by every module.
#[derive(Debug, thiserror::Error)]
pub enum RouteError<E> {
	#[error("validation error: {0}")]
	Validation(#[from] validator::ValidationErrors),
	#[error("json error: {0}")]
	Json(#[from] rejection::JsonRejection),
	#[error("query error: {0}")]
	Query(#[from] rejection::QueryRejection),
	#[error("path error: {0}")]
	Path(#[from] rejection::PathRejection),
	#[error("multipart error: {0}")]
	MultipartRejection(#[from] multipart::MultipartRejection),
	#[error("multipart error: {0}")]
	Multipart(#[from] multipart::MultipartError),
	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),
	#[error(transparent)]
	Route(E),
}

/// Rejection type of the extractors that are not tied to a route module.
pub type AppError = RouteError<Infallible>;

impl<E: ErrorShape> From<E> for RouteError<E> {
	fn from(error: E) -> Self {
		Self::Route(error)
	}
}

impl<E> RouteError<E> {
	/// Builds a [`Kind::ValidationFailed`] error for a single field.
	pub fn field(field: &'static str, code: &'static str) -> Self {
		let mut errors = validator::ValidationErrors::new();

		errors.add(field, validator::ValidationError::new(code));
		Self::Validation(errors)
	}
}

/// Returns the name of the constraint violated by a database error, if any.
pub fn constraint(error: &sqlx::Error) -> Option<&str> {
	match error {
		sqlx::Error::Database(error) => error.constraint(),
		_ => None,
	}
}

fn field_messages(errors: &validator::ValidationErrors) -> Vec<FieldMessage> {
	let mut messages = errors
		.field_errors()
		.into_iter()
		.flat_map(|(field, errors)| {
			errors.iter().map(move |error| FieldMessage {
				field: field.to_string(),
				message: error
					.message
					.as_ref()
					.map_or_else(|| error.code.to_string(), ToString::to_string),
			})
		})
		.collect::<Vec<_>>();

	messages.sort_by(|a, b| a.field.cmp(&b.field));
	messages
}

impl<E: ErrorShape> RouteError<E> {
	fn into_body(self) -> ErrorResponse {
		let invalid = |details: String| ErrorResponse {
			kind: Kind::ValidationFailed,
			error: Kind::ValidationFailed.summary().into(),
			details,
			fields: Vec::new(),
		};

		match self {
			Self::Validation(errors) => ErrorResponse {
				kind: Kind::ValidationFailed,
				error: Kind::ValidationFailed.summary().into(),
				fields: field_messages(&errors),
				details: "one or more fields are invalid".into(),
			},
			Self::Json(rejection) => invalid(rejection.body_text()),
			Self::Query(rejection) => invalid(rejection.body_text()),
			Self::Path(rejection) => invalid(rejection.body_text()),
			Self::MultipartRejection(rejection) => invalid(rejection.body_text()),
			Self::Multipart(error) => invalid(error.body_text()),
			Self::Database(error) => {
				tracing::error!(%error, "database error");

				ErrorResponse {
					kind: Kind::Unexpected,
					error: Kind::Unexpected.summary().into(),
					details: "an internal error occurred".into(),
					fields: Vec::new(),
				}
			}
			Self::Route(error) => {
				let kind = error.kind();
				let details = if kind == Kind::Unexpected {
					tracing::error!(%error, "unexpected route error");
					"an internal error occurred".into()
				} else {
					error.details()
				};

				ErrorResponse {
					kind,
					error: error.summary(),
					details,
					fields: Vec::new(),
				}
			}
		}
	}
}

impl<E: ErrorShape> IntoResponse for RouteError<E> {
	fn into_response(self) -> Response<Body> {
		let body = self.into_body();

		(body.kind.status(), Json(body)).into_response()
	}
}

impl<E> OperationOutput for RouteError<E> {
	type Inner = ErrorResponse;
}

#[cfg(test)]
mod test {
	use super::*;

	#[derive(Debug, thiserror::Error)]
	enum Sample {
		#[error("unknown thing {0}")]
		Unknown(u32),
		#[error("disk on fire")]
		Broken,
	}

	impl ErrorShape for Sample {
		fn kind(&self) -> Kind {
			match self {
				Self::Unknown(..) => Kind::NotFound,
				Self::Broken => Kind::Unexpected,
			}
		}
	}

	#[test]
	fn test_route_error_keeps_details() {
		let body = RouteError::from(Sample::Unknown(7)).into_body();

		assert_eq!(body.kind, Kind::NotFound);
		assert_eq!(body.details, "unknown thing 7");
		assert_eq!(body.kind.status(), StatusCode::NOT_FOUND);
	}

	#[test]
	fn test_unexpected_details_are_hidden() {
		let body = RouteError::from(Sample::Broken).into_body();

		assert_eq!(body.kind, Kind::Unexpected);
		assert!(!body.details.contains("fire"));
	}

	#[test]
	fn test_field_error_is_validation() {
		let body = RouteError::<Sample>::field("rating", "range").into_body();

		assert_eq!(body.kind, Kind::ValidationFailed);
		assert_eq!(body.fields.len(), 1);
		assert_eq!(body.fields[0].field, "rating");
		assert_eq!(body.fields[0].message, "range");
	}
}
