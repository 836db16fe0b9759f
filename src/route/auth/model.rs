use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::policy::Role;

pub fn validate_username(username: &str) -> Result<(), ValidationError> {
	if username
		.chars()
		.any(|c| !(c.is_ascii_alphanumeric() || c == '_'))
	{
		return Err(ValidationError::new("username must be alphanumeric"));
	}

	Ok(())
}

/// A single user.
#[derive(Debug, Clone, Serialize, JsonSchema, sqlx::FromRow)]
pub struct User {
	/// The unique identifier of the user.
	pub id: Uuid,
	/// The user's email address, used for logging in.
	pub email: String,
	/// The hashed password.
	#[serde(skip)]
	pub password: Vec<u8>,
	/// The username that is displayed to the public.
	pub username: String,
	pub first_name: Option<String>,
	pub last_name: Option<String>,
	pub bio: Option<String>,
	/// A reference to the user's profile picture.
	pub profile_image: Option<String>,
	pub role: Role,
	/// Deactivated users cannot log in and their sessions no longer resolve.
	pub is_active: bool,
	/// The creation time of the user.
	pub created_at: chrono::DateTime<chrono::Utc>,
	pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Session {
	pub id: Uuid,
	#[allow(dead_code)]
	pub user_id: Uuid,
	pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A freshly created session.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Authenticated {
	/// The session id, usable as a bearer token.
	pub session_id: Uuid,
	/// When the session stops being accepted.
	pub expires_at: chrono::DateTime<chrono::Utc>,
	pub user: User,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct LoginInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 1, max = 128))]
	pub password: String,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RegisterInput {
	#[validate(email)]
	pub email: String,
	#[validate(length(min = 8, max = 128))]
	pub password: String,
	/// The username that is displayed to the public.
	#[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
	pub username: String,
	#[validate(length(max = 64))]
	pub first_name: Option<String>,
	#[validate(length(max = 64))]
	pub last_name: Option<String>,
}

/// Profile changes. Absent fields are left untouched, and an empty string
/// clears an optional field.
#[derive(Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserInput {
	#[validate(email)]
	pub email: Option<String>,
	#[validate(length(min = 3, max = 32), custom(function = "validate_username"))]
	pub username: Option<String>,
	#[validate(length(max = 64))]
	pub first_name: Option<String>,
	#[validate(length(max = 64))]
	pub last_name: Option<String>,
	#[validate(length(max = 1000))]
	pub bio: Option<String>,
	#[validate(length(max = 200))]
	pub profile_image: Option<String>,
}

#[derive(Deserialize, Validate, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordInput {
	#[validate(length(min = 1, max = 128))]
	pub current_password: String,
	#[validate(length(min = 8, max = 128))]
	pub new_password: String,
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_username_rules() {
		assert!(validate_username("chef_anna42").is_ok());
		assert!(validate_username("chef anna").is_err());
		assert!(validate_username("chef-anna").is_err());
		assert!(validate_username("шеф").is_err());
	}

	#[test]
	fn test_register_input_validation() {
		let input = RegisterInput {
			email: "not-an-email".into(),
			password: "short".into(),
			username: "ab".into(),
			first_name: None,
			last_name: None,
		};

		let errors = input.validate().unwrap_err();
		let fields = errors.field_errors();

		assert!(fields.contains_key("email"));
		assert!(fields.contains_key("password"));
		assert!(fields.contains_key("username"));
	}
}
