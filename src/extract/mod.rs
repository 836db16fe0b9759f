mod session;

pub use session::{MaybeSession, Session};

use aide::OperationIo;
use axum::{
	body::Body,
	extract::{FromRequest, FromRequestParts, Multipart, Request},
	http::{header, request, Response},
	response::IntoResponse,
};
use serde::de;
use validator::Validate;

use crate::error::AppError;

/// Extractor that deserializes a JSON body and validates it.
///
/// T must implement [`serde::de::DeserializeOwned`] and [`validator::Validate`]
/// in order to be used in an extractor.
///
/// ```rust
/// async fn route(Json(user): Json<User>) {
///   // ...
/// }
/// ```
#[derive(OperationIo)]
#[aide(
	input_with = "axum_jsonschema::Json<T>",
	output_with = "axum_jsonschema::Json<T>",
	json_schema
)]
pub struct Json<T>(pub T);

impl<T> IntoResponse for Json<T>
where
	T: serde::Serialize,
{
	fn into_response(self) -> Response<Body> {
		axum::extract::Json(self.0).into_response()
	}
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Json<T>
where
	T: de::DeserializeOwned + Validate,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let result = axum::extract::Json::<T>::from_request(req, state).await?.0;

		result.validate().map_err(Self::Rejection::Validation)?;
		Ok(Self(result))
	}
}

/// Extractor that deserializes a JSON body without validating it.
///
/// The handler calls [`Validate::validate`] itself, once the checks that
/// take precedence over malformed fields have passed.
#[derive(OperationIo)]
#[aide(input_with = "axum_jsonschema::Json<T>", json_schema)]
pub struct Unchecked<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Unchecked<T>
where
	T: de::DeserializeOwned,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		let axum::extract::Json(result) = axum::extract::Json::<T>::from_request(req, state).await?;

		Ok(Self(result))
	}
}

/// Extractor that deserializes a query string and validates it.
///
/// This is similar to [`Json<T>`], but does not consume the body.
///
/// ```rust
/// async fn route(Query(params): Query<Params>) {
///   // ...
/// }
/// ```
#[derive(OperationIo)]
#[aide(
	input_with = "axum::extract::Query<T>",
	output_with = "axum_jsonschema::Json<T>",
	json_schema
)]
pub struct Query<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Query<T>
where
	T: de::DeserializeOwned + Validate,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let result = axum::extract::Query::<T>::from_request_parts(parts, state)
			.await?
			.0;

		result.validate().map_err(Self::Rejection::Validation)?;
		Ok(Self(result))
	}
}

/// Extractor that deserializes a path parameter and validates it.
#[derive(OperationIo)]
#[aide(
	input_with = "axum::extract::Path<T>",
	output_with = "axum_jsonschema::Json<T>",
	json_schema
)]
pub struct Path<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for Path<T>
where
	T: de::DeserializeOwned + Validate + Send,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request_parts(
		parts: &mut request::Parts,
		state: &S,
	) -> Result<Self, Self::Rejection> {
		let result = axum::extract::Path::<T>::from_request_parts(parts, state)
			.await?
			.0;

		result.validate().map_err(Self::Rejection::Validation)?;
		Ok(Self(result))
	}
}

/// A file sent alongside a [`Form`].
#[derive(Debug)]
pub struct Upload {
	pub filename: String,
	pub bytes: Vec<u8>,
}

/// Name of the multipart part that carries the JSON document.
pub const FORM_DOCUMENT_PART: &str = "recipe";
/// Name of the multipart part that carries the optional image.
pub const FORM_IMAGE_PART: &str = "image";

/// Extractor for bodies that may carry an image.
///
/// Accepts either a plain JSON document, or `multipart/form-data` with the
/// document in a `recipe` part and an optional file in an `image` part.
/// The document is validated like [`Json<T>`].
#[derive(OperationIo)]
#[aide(input_with = "axum_jsonschema::Json<T>", json_schema)]
pub struct Form<T> {
	pub input: T,
	pub upload: Option<Upload>,
}

fn is_multipart(req: &Request) -> bool {
	req.headers()
		.get(header::CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.starts_with("multipart/form-data"))
}

#[axum::async_trait]
impl<T, S> FromRequest<S> for Form<T>
where
	T: de::DeserializeOwned + Validate + Send,
	S: Send + Sync,
{
	type Rejection = AppError;

	async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
		if !is_multipart(&req) {
			let Json(input) = Json::<T>::from_request(req, state).await?;

			return Ok(Self {
				input,
				upload: None,
			});
		}

		let mut multipart = Multipart::from_request(req, state).await?;
		let mut input = None;
		let mut upload = None;

		while let Some(field) = multipart.next_field().await? {
			let name = field.name().map(ToOwned::to_owned);

			match name.as_deref() {
				Some(FORM_DOCUMENT_PART) => {
					let text = field.text().await?;
					let document = serde_json::from_str::<T>(&text).map_err(|error| {
						let mut invalid = validator::ValidationError::new("invalid_json");
						invalid.message = Some(error.to_string().into());

						let mut errors = validator::ValidationErrors::new();
						errors.add(FORM_DOCUMENT_PART, invalid);
						AppError::Validation(errors)
					})?;

					input = Some(document);
				}
				Some(FORM_IMAGE_PART) => {
					let filename = field.file_name().map(ToOwned::to_owned);
					let bytes = field.bytes().await?;

					// browsers send an empty part when no file was chosen
					if let Some(filename) = filename.filter(|name| !name.is_empty()) {
						if !bytes.is_empty() {
							upload = Some(Upload {
								filename,
								bytes: bytes.to_vec(),
							});
						}
					}
				}
				_ => {}
			}
		}

		let input = input.ok_or_else(|| AppError::field(FORM_DOCUMENT_PART, "required"))?;

		input.validate()?;
		Ok(Self { input, upload })
	}
}
