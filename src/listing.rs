//! Filtered, sorted and paginated reads.
//!
//! A [`Listing`] combines [`Criteria`], a [`Sort`] and a [`Window`] and renders
//! them onto a base `SELECT ... FROM ...` with [`QueryBuilder`]. Values are
//! always bound; column names only ever come from `&'static str` constants.

use schemars::JsonSchema;
use serde::Serialize;
use sqlx::{postgres::PgRow, FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::Database;

/// Page size defaults and upper bounds for one family of listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
	pub default: i64,
	pub max: i64,
}

pub const PUBLIC: Limits = Limits {
	default: 12,
	max: 50,
};

pub const REVIEWS: Limits = Limits {
	default: 10,
	max: 50,
};

pub const ADMIN: Limits = Limits {
	default: 20,
	max: 100,
};

/// A normalized page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
	pub page: i64,
	pub per_page: i64,
}

impl Window {
	/// Pages below 1 become 1, missing or non-positive sizes become the
	/// default, and sizes above the maximum are clamped to it.
	pub fn new(page: Option<i64>, per_page: Option<i64>, limits: Limits) -> Self {
		let per_page = match per_page {
			Some(size) if size >= 1 => size.min(limits.max),
			_ => limits.default,
		};

		Self {
			page: page.unwrap_or(1).max(1),
			per_page,
		}
	}

	pub fn offset(&self) -> i64 {
		(self.page - 1).saturating_mul(self.per_page)
	}

	pub fn limit(&self) -> i64 {
		self.per_page
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct Pagination {
	pub page: i64,
	pub per_page: i64,
	pub total: i64,
	pub pages: i64,
	pub has_next: bool,
	pub has_prev: bool,
}

impl Pagination {
	pub fn new(window: Window, total: i64) -> Self {
		let pages = if total <= 0 {
			0
		} else {
			(total + window.per_page - 1) / window.per_page
		};

		Self {
			page: window.page,
			per_page: window.per_page,
			total: total.max(0),
			pages,
			has_next: window.page < pages,
			has_prev: window.page > 1,
		}
	}
}

/// One page of a listing.
#[derive(Debug, Serialize, JsonSchema)]
pub struct Page<T> {
	pub items: Vec<T>,
	pub pagination: Pagination,
}

impl<T> Page<T> {
	pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
		Page {
			items: self.items.into_iter().map(f).collect(),
			pagination: self.pagination,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
	Asc,
	Desc,
}

impl Direction {
	/// Anything other than `asc` sorts descending.
	pub fn parse(value: Option<&str>) -> Self {
		match value.map(str::trim) {
			Some(value) if value.eq_ignore_ascii_case("asc") => Self::Asc,
			_ => Self::Desc,
		}
	}

	fn sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}
}

/// A closed set of columns a listing may be ordered by.
pub trait SortKey: Copy {
	const DEFAULT: Self;

	fn parse(value: &str) -> Option<Self>;

	fn column(self) -> &'static str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort<K> {
	pub key: K,
	pub direction: Direction,
}

impl<K: SortKey> Sort<K> {
	/// An unknown key falls back to the default key in descending order,
	/// ignoring the requested direction.
	pub fn parse(key: Option<&str>, direction: Option<&str>) -> Self {
		match key.map(str::trim).filter(|key| !key.is_empty()) {
			None => Self {
				key: K::DEFAULT,
				direction: Direction::parse(direction),
			},
			Some(key) => match K::parse(key) {
				Some(key) => Self {
					key,
					direction: Direction::parse(direction),
				},
				None => Self::default(),
			},
		}
	}
}

impl<K: SortKey> Default for Sort<K> {
	fn default() -> Self {
		Self {
			key: K::DEFAULT,
			direction: Direction::Desc,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
enum Condition {
	Equals(&'static str, String),
	Flag(&'static str, bool),
	Id(&'static str, Uuid),
	Search(&'static [&'static str], String),
}

/// Filter predicates, joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria {
	conditions: Vec<Condition>,
}

fn present(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|value| !value.is_empty())
}

/// Escapes `LIKE` metacharacters and wraps the term for a substring match.
fn like_pattern(term: &str) -> String {
	let mut pattern = String::with_capacity(term.len() + 2);

	pattern.push('%');
	for c in term.chars() {
		if matches!(c, '%' | '_' | '\\') {
			pattern.push('\\');
		}

		pattern.push(c);
	}
	pattern.push('%');

	pattern
}

impl Criteria {
	pub fn new() -> Self {
		Self::default()
	}

	/// Exact match. A blank or missing value adds nothing.
	pub fn equals(mut self, column: &'static str, value: Option<&str>) -> Self {
		if let Some(value) = present(value) {
			self.conditions
				.push(Condition::Equals(column, value.to_owned()));
		}

		self
	}

	pub fn flag(mut self, column: &'static str, value: Option<bool>) -> Self {
		if let Some(value) = value {
			self.conditions.push(Condition::Flag(column, value));
		}

		self
	}

	pub fn id(mut self, column: &'static str, id: Uuid) -> Self {
		self.conditions.push(Condition::Id(column, id));
		self
	}

	/// Case-insensitive substring match against any of `columns`.
	pub fn search(mut self, columns: &'static [&'static str], term: Option<&str>) -> Self {
		if let Some(term) = present(term) {
			self.conditions
				.push(Condition::Search(columns, like_pattern(term)));
		}

		self
	}

	pub fn is_empty(&self) -> bool {
		self.conditions.is_empty()
	}

	fn push_where(&self, query: &mut QueryBuilder<'static, Postgres>) {
		for (i, condition) in self.conditions.iter().enumerate() {
			query.push(if i == 0 { " WHERE " } else { " AND " });

			match condition {
				Condition::Equals(column, value) => {
					query.push(*column).push(" = ").push_bind(value.clone());
				}
				Condition::Flag(column, value) => {
					query.push(*column).push(" = ").push_bind(*value);
				}
				Condition::Id(column, id) => {
					query.push(*column).push(" = ").push_bind(*id);
				}
				Condition::Search(columns, pattern) => {
					query.push("(");
					for (j, column) in columns.iter().enumerate() {
						if j > 0 {
							query.push(" OR ");
						}

						query
							.push(*column)
							.push("::text ILIKE ")
							.push_bind(pattern.clone());
					}
					query.push(")");
				}
			}
		}
	}
}

/// A complete listing request against one entity collection.
#[derive(Debug, Clone)]
pub struct Listing<K> {
	pub criteria: Criteria,
	pub sort: Sort<K>,
	pub window: Window,
	/// Unique column appended to the ordering so pages never overlap.
	pub tiebreak: &'static str,
}

impl<K: SortKey> Listing<K> {
	pub fn new(criteria: Criteria, sort: Sort<K>, window: Window, tiebreak: &'static str) -> Self {
		Self {
			criteria,
			sort,
			window,
			tiebreak,
		}
	}

	/// `SELECT COUNT(*) <from> WHERE ...`
	pub fn count_query(&self, from: &str) -> QueryBuilder<'static, Postgres> {
		let mut query = QueryBuilder::new("SELECT COUNT(*) ");

		query.push(from);
		self.criteria.push_where(&mut query);
		query
	}

	/// Appends filters, ordering and the page window to `select`, which must
	/// end with its `FROM` clause.
	pub fn page_query(
		&self,
		mut select: QueryBuilder<'static, Postgres>,
	) -> QueryBuilder<'static, Postgres> {
		let direction = self.sort.direction.sql();

		self.criteria.push_where(&mut select);
		select
			.push(" ORDER BY ")
			.push(self.sort.key.column())
			.push(" ")
			.push(direction)
			.push(", ")
			.push(self.tiebreak)
			.push(" ")
			.push(direction)
			.push(" LIMIT ")
			.push_bind(self.window.limit())
			.push(" OFFSET ")
			.push_bind(self.window.offset());

		select
	}

	/// Runs the count and page queries.
	pub async fn fetch<T>(
		&self,
		database: &Database,
		select: QueryBuilder<'static, Postgres>,
		from: &str,
	) -> Result<Page<T>, sqlx::Error>
	where
		T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
	{
		let total = self
			.count_query(from)
			.build_query_scalar::<i64>()
			.fetch_one(database)
			.await?;

		let items = self
			.page_query(select)
			.build_query_as::<T>()
			.fetch_all(database)
			.await?;

		Ok(Page {
			items,
			pagination: Pagination::new(self.window, total),
		})
	}
}
