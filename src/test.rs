//! Helpers shared by the end-to-end route tests.

pub use axum::http::header::AUTHORIZATION;
use axum::{body::Bytes, http::HeaderValue};
use axum_test::TestServer;
pub use serde_json::json;
use serde_json::Value;

pub use crate::Database;
use crate::{media::ImageStore, session::SessionTtl, State};

pub const PASSWORD: &str = "hunter2hunter";

pub fn scratch_images() -> ImageStore {
	ImageStore::new(std::env::temp_dir().join(format!("recipe-test-{}", uuid::Uuid::new_v4())))
}

pub fn app(database: Database) -> TestServer {
	app_with_images(database, scratch_images())
}

pub fn app_with_images(database: Database, images: ImageStore) -> TestServer {
	let state = State {
		database,
		hasher: argon2::Argon2::default(),
		images,
		session_ttl: SessionTtl(chrono::Duration::hours(1)),
	};

	TestServer::new(crate::app(state, 1024 * 1024)).unwrap()
}

/// Builds the app around a pool that never connects, for requests that do
/// not reach the database.
pub fn offline_app() -> TestServer {
	let database = sqlx::postgres::PgPoolOptions::new()
		.connect_lazy("postgres://localhost/recipe")
		.unwrap();

	app(database)
}

/// Number of files currently held by `images`.
pub fn stored_images(images: &ImageStore) -> usize {
	std::fs::read_dir(images.root()).map_or(0, Iterator::count)
}

pub const BOUNDARY: &str = "recipe-test-boundary";

pub fn multipart_content_type() -> String {
	format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Encodes `document` as the `recipe` part of a multipart body, followed by
/// a small PNG in the `image` part.
pub fn multipart(document: &Value) -> Bytes {
	let mut png = std::io::Cursor::new(Vec::new());

	image::DynamicImage::new_rgb8(8, 8)
		.write_to(&mut png, image::ImageFormat::Png)
		.unwrap();

	let mut body = format!(
		"--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"recipe\"\r\n\r\n{document}\r\n\
		 --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"photo.png\"\r\n\
		 Content-Type: image/png\r\n\r\n"
	)
	.into_bytes();

	body.extend_from_slice(&png.into_inner());
	body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

	body.into()
}

pub fn bearer(token: &str) -> HeaderValue {
	HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
}

/// Registers `<name>@example.com` with [`PASSWORD`] and returns its session id.
pub async fn register(app: &TestServer, name: &str) -> String {
	let response = app
		.post("/auth/register")
		.json(&json!({
			"email": format!("{name}@example.com"),
			"username": name,
			"password": PASSWORD,
		}))
		.await;

	assert_eq!(response.status_code(), 200);

	response.json::<Value>()["session_id"]
		.as_str()
		.unwrap()
		.to_owned()
}

/// Registers a user and promotes them to admin.
pub async fn register_admin(app: &TestServer, database: &Database, name: &str) -> String {
	let token = register(app, name).await;

	sqlx::query(r#"UPDATE "user" SET role = 'admin' WHERE username = $1"#)
		.bind(name)
		.execute(database)
		.await
		.unwrap();

	token
}

/// Creates a pancake recipe as `token`, with `overrides` merged over the
/// default fields, and returns the created recipe.
pub async fn create_recipe(app: &TestServer, token: &str, overrides: Value) -> Value {
	let mut recipe = json!({
		"title": "Pancakes",
		"description": "Fluffy breakfast pancakes",
		"ingredients": ["flour", "milk", "eggs"],
		"instructions": ["Mix everything", "Fry in a hot pan"],
		"category": "breakfast",
	});

	if let (Some(recipe), Value::Object(overrides)) = (recipe.as_object_mut(), overrides) {
		recipe.extend(overrides);
	}

	let response = app
		.post("/recipes")
		.add_header(AUTHORIZATION, bearer(token))
		.json(&recipe)
		.await;

	assert_eq!(response.status_code(), 200);

	response.json::<Value>()
}
