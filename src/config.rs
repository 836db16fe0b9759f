use std::{net::IpAddr, path::PathBuf, str::FromStr};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "uploads/recipes";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("{0} must be set")]
	Missing(&'static str),
	#[error("{name} is invalid: {value:?}")]
	Invalid { name: &'static str, value: String },
}

/// Credentials for the admin account created at startup.
#[derive(Debug, Clone)]
pub struct Bootstrap {
	pub email: String,
	pub username: String,
	pub password: String,
}

/// Runtime configuration, read from the environment (and `.env`, if present).
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub host: IpAddr,
	pub port: u16,
	pub upload_dir: PathBuf,
	pub max_upload_bytes: usize,
	pub session_ttl: chrono::Duration,
	pub admin: Option<Bootstrap>,
	pub otlp_endpoint: Option<String>,
}

impl Config {
	pub fn from_env() -> Result<Self, Error> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Builds the configuration from an arbitrary variable source.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
		let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

		let database_url = var("DATABASE_URL").ok_or(Error::Missing("DATABASE_URL"))?;

		let admin = match (
			var("ADMIN_EMAIL"),
			var("ADMIN_USERNAME"),
			var("ADMIN_PASSWORD"),
		) {
			(Some(email), Some(username), Some(password)) => Some(Bootstrap {
				email,
				username,
				password,
			}),
			_ => None,
		};

		let session_ttl_hours = number("SESSION_TTL_HOURS", var("SESSION_TTL_HOURS"))?
			.unwrap_or(DEFAULT_SESSION_TTL_HOURS);

		if session_ttl_hours <= 0 {
			return Err(Error::Invalid {
				name: "SESSION_TTL_HOURS",
				value: session_ttl_hours.to_string(),
			});
		}

		Ok(Self {
			database_url,
			host: number("HOST", var("HOST"))?.unwrap_or(IpAddr::from([127, 0, 0, 1])),
			port: number("PORT", var("PORT"))?.unwrap_or(DEFAULT_PORT),
			upload_dir: var("UPLOAD_DIR").map_or_else(|| DEFAULT_UPLOAD_DIR.into(), PathBuf::from),
			max_upload_bytes: number("MAX_UPLOAD_BYTES", var("MAX_UPLOAD_BYTES"))?
				.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
			session_ttl: chrono::Duration::hours(session_ttl_hours),
			admin,
			otlp_endpoint: var("OTEL_EXPORTER_OTLP_ENDPOINT"),
		})
	}
}

fn number<T: FromStr>(name: &'static str, value: Option<String>) -> Result<Option<T>, Error> {
	value
		.map(|value| {
			value
				.trim()
				.parse()
				.map_err(|_| Error::Invalid { name, value })
		})
		.transpose()
}

#[cfg(test)]
mod test {
	use std::collections::HashMap;

	use super::*;

	fn config(vars: &[(&str, &str)]) -> Result<Config, Error> {
		let vars = vars
			.iter()
			.map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
			.collect::<HashMap<_, _>>();

		Config::from_lookup(|name| vars.get(name).cloned())
	}

	#[test]
	fn test_defaults() {
		let config = config(&[("DATABASE_URL", "postgres://localhost/recipes")]).unwrap();

		assert_eq!(config.port, 3000);
		assert_eq!(config.upload_dir, PathBuf::from("uploads/recipes"));
		assert_eq!(config.max_upload_bytes, 16 * 1024 * 1024);
		assert_eq!(config.session_ttl, chrono::Duration::hours(24));
		assert!(config.admin.is_none());
		assert!(config.otlp_endpoint.is_none());
	}

	#[test]
	fn test_missing_database_url() {
		assert!(matches!(config(&[]), Err(Error::Missing("DATABASE_URL"))));
	}

	#[test]
	fn test_invalid_port() {
		let result = config(&[("DATABASE_URL", "postgres://x"), ("PORT", "eighty")]);

		assert!(matches!(result, Err(Error::Invalid { name: "PORT", .. })));
	}

	#[test]
	fn test_admin_needs_all_fields() {
		let partial = config(&[
			("DATABASE_URL", "postgres://x"),
			("ADMIN_EMAIL", "admin@example.com"),
		])
		.unwrap();
		assert!(partial.admin.is_none());

		let full = config(&[
			("DATABASE_URL", "postgres://x"),
			("ADMIN_EMAIL", "admin@example.com"),
			("ADMIN_USERNAME", "admin"),
			("ADMIN_PASSWORD", "correct-horse"),
		])
		.unwrap();
		assert_eq!(full.admin.unwrap().username, "admin");
	}
}
