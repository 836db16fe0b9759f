#![warn(clippy::pedantic)]

mod config;
mod error;
mod extract;
mod listing;
mod media;
mod openapi;
mod policy;
mod route;
mod session;
#[cfg(test)]
mod test;
mod trace;

use std::sync::Arc;

use aide::{axum::ApiRouter, openapi::OpenApi};
use argon2::Argon2;
use axum::{
	extract::DefaultBodyLimit,
	http::{header, HeaderValue, Method},
	Extension, Router,
};
use tower::ServiceBuilder;
use tower_http::{
	compression::CompressionLayer,
	cors::{Any, CorsLayer},
	request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
	services::ServeDir,
	set_header::SetResponseHeaderLayer,
	trace::TraceLayer,
};

use crate::{config::Config, media::ImageStore, session::SessionTtl};

pub type Database = sqlx::Pool<sqlx::Postgres>;
pub type AppState = State;

/// The shared application state.
///
/// Handlers extract the parts they need through [`axum::extract::FromRef`],
/// e.g. `State<Database>`.
#[derive(Clone, axum::extract::FromRef)]
pub struct State {
	pub database: Database,
	pub hasher: Argon2<'static>,
	pub images: ImageStore,
	pub session_ttl: SessionTtl,
}

/// Builds the complete HTTP application around `state`.
pub fn app(state: State, max_upload_bytes: usize) -> Router {
	aide::gen::extract_schemas(true);

	let mut api = OpenApi::default();
	let uploads = ServeDir::new(state.images.root());

	let router = ApiRouter::new()
		.nest("/auth", route::auth::routes())
		.nest("/recipes", route::recipe::routes())
		.nest("/user", route::user::routes())
		.nest("/admin", route::admin::routes())
		.nest("/stats", route::stats::routes())
		.nest("/docs", route::docs::routes())
		.finish_api_with(&mut api, openapi::docs);

	let cors = CorsLayer::new()
		.allow_origin(Any)
		.allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
		.allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

	let middleware = ServiceBuilder::new()
		.layer(CompressionLayer::new())
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(TraceLayer::new_for_http())
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(SetResponseHeaderLayer::overriding(
			header::X_CONTENT_TYPE_OPTIONS,
			HeaderValue::from_static("nosniff"),
		))
		.layer(SetResponseHeaderLayer::overriding(
			header::X_FRAME_OPTIONS,
			HeaderValue::from_static("DENY"),
		))
		.layer(SetResponseHeaderLayer::overriding(
			header::STRICT_TRANSPORT_SECURITY,
			HeaderValue::from_static("max-age=31536000; includeSubDomains"),
		));

	router
		.nest_service(media::PUBLIC_PREFIX, uploads)
		.layer(Extension(Arc::new(api)))
		.layer(DefaultBodyLimit::max(max_upload_bytes))
		.layer(middleware)
		.layer(cors)
		.with_state(state)
}

#[tokio::main]
async fn main() {
	dotenvy::dotenv().ok();

	let config = Config::from_env().expect("invalid configuration");
	let _guard = trace::init_tracing_subscriber(config.otlp_endpoint.as_deref())
		.expect("failed to initialize tracing");

	let database = Database::connect(&config.database_url)
		.await
		.expect("failed to connect to database");

	sqlx::migrate!()
		.run(&database)
		.await
		.expect("failed to run migrations");

	let hasher = Argon2::default();

	if let Some(admin) = &config.admin {
		route::auth::bootstrap_admin(&database, &hasher, admin)
			.await
			.expect("failed to create the admin account");
	}

	let state = State {
		database,
		hasher,
		images: ImageStore::new(config.upload_dir.clone()),
		session_ttl: SessionTtl(config.session_ttl),
	};

	let app = app(state, config.max_upload_bytes);

	let listener = tokio::net::TcpListener::bind((config.host, config.port))
		.await
		.expect("failed to bind to port");

	tracing::info!("listening on {}:{}", config.host, config.port);

	axum::serve(listener, app).await.expect("server error");
}
