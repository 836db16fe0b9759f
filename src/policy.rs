//! Authorization decisions.
//!
//! Every workflow asks [`check`] before touching the store. The functions here
//! are pure: they only look at the actor and a small description of the target.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role that governs every authorization decision for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Admin,
}

/// The resolved identity a request executes on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
	pub id: Uuid,
	pub role: Role,
}

impl Actor {
	pub fn is_admin(&self) -> bool {
		self.role == Role::Admin
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	ViewRecipe,
	UpdateRecipe,
	DeleteRecipe,
	ReviewRecipe,
	FavoriteRecipe,
	ReportReview,
	FeatureRecipe,
	PublishRecipe,
	ChangeRole(Role),
	ToggleActive,
	ResolveReport,
	/// Admin listings and dashboards.
	Moderate,
}

/// What an operation is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
	Recipe { owner: Uuid, published: bool },
	User(Uuid),
	Review,
	Site,
}

/// Why an operation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denied {
	#[error("authentication required")]
	Unauthenticated,
	#[error("permission denied")]
	Forbidden,
	#[error("cannot deactivate your own account")]
	OwnActivation,
	#[error("cannot change your own admin role")]
	OwnRole,
}

impl Denied {
	/// Self-protection refusals are reported as invalid requests rather than
	/// missing permissions, since the actor does hold the admin role.
	pub fn kind(self) -> crate::error::Kind {
		use crate::error::Kind;

		match self {
			Self::Unauthenticated => Kind::Unauthorized,
			Self::Forbidden => Kind::Forbidden,
			Self::OwnActivation | Self::OwnRole => Kind::ValidationFailed,
		}
	}
}

/// Decides whether `actor` may perform `operation` on `target`.
pub fn check(actor: Option<&Actor>, operation: Operation, target: Target) -> Result<(), Denied> {
	let Some(actor) = actor else {
		return match (operation, target) {
			(Operation::ViewRecipe, Target::Recipe { published: true, .. }) => Ok(()),
			_ => Err(Denied::Unauthenticated),
		};
	};

	if actor.is_admin() {
		return match (operation, target) {
			(Operation::ToggleActive, Target::User(id)) if id == actor.id => {
				Err(Denied::OwnActivation)
			}
			(Operation::ChangeRole(role), Target::User(id))
				if id == actor.id && role != Role::Admin =>
			{
				Err(Denied::OwnRole)
			}
			_ => Ok(()),
		};
	}

	let allowed = match (operation, target) {
		(Operation::ViewRecipe, Target::Recipe { owner, published }) => {
			published || owner == actor.id
		}
		(
			Operation::UpdateRecipe | Operation::DeleteRecipe | Operation::PublishRecipe,
			Target::Recipe { owner, .. },
		) => owner == actor.id,
		(Operation::ReviewRecipe | Operation::FavoriteRecipe, Target::Recipe { .. })
		| (Operation::ReportReview, Target::Review) => true,
		_ => false,
	};

	if allowed {
		Ok(())
	} else {
		Err(Denied::Forbidden)
	}
}

/// Boolean form of [`check`].
pub fn can(actor: Option<&Actor>, operation: Operation, target: Target) -> bool {
	check(actor, operation, target).is_ok()
}

#[cfg(test)]
mod test {
	use super::*;

	fn actor(role: Role) -> Actor {
		Actor {
			id: Uuid::new_v4(),
			role,
		}
	}

	fn recipe(owner: Uuid, published: bool) -> Target {
		Target::Recipe { owner, published }
	}

	#[test]
	fn test_anonymous_sees_only_published() {
		let owner = Uuid::new_v4();

		assert!(can(None, Operation::ViewRecipe, recipe(owner, true)));
		assert_eq!(
			check(None, Operation::ViewRecipe, recipe(owner, false)),
			Err(Denied::Unauthenticated)
		);
		assert_eq!(
			check(None, Operation::FavoriteRecipe, recipe(owner, true)),
			Err(Denied::Unauthenticated)
		);
	}

	#[test]
	fn test_drafts_visible_to_owner_and_admin() {
		let owner = actor(Role::User);
		let stranger = actor(Role::User);
		let admin = actor(Role::Admin);
		let draft = recipe(owner.id, false);

		assert!(can(Some(&owner), Operation::ViewRecipe, draft));
		assert!(can(Some(&admin), Operation::ViewRecipe, draft));
		assert!(!can(Some(&stranger), Operation::ViewRecipe, draft));
	}

	#[test]
	fn test_update_and_delete_need_owner_or_admin() {
		let owner = actor(Role::User);
		let stranger = actor(Role::User);
		let admin = actor(Role::Admin);
		let target = recipe(owner.id, true);

		for operation in [Operation::UpdateRecipe, Operation::DeleteRecipe] {
			assert!(can(Some(&owner), operation, target));
			assert!(can(Some(&admin), operation, target));
			assert_eq!(
				check(Some(&stranger), operation, target),
				Err(Denied::Forbidden)
			);
		}
	}

	#[test]
	fn test_any_user_may_review_and_favorite() {
		let user = actor(Role::User);
		let target = recipe(Uuid::new_v4(), true);

		assert!(can(Some(&user), Operation::ReviewRecipe, target));
		assert!(can(Some(&user), Operation::FavoriteRecipe, target));
		assert!(can(Some(&user), Operation::ReportReview, Target::Review));
	}

	#[test]
	fn test_admin_only_operations() {
		let user = actor(Role::User);
		let admin = actor(Role::Admin);
		let other = Uuid::new_v4();

		let cases = [
			(Operation::FeatureRecipe, recipe(user.id, true)),
			(Operation::ToggleActive, Target::User(other)),
			(Operation::ChangeRole(Role::Admin), Target::User(other)),
			(Operation::ResolveReport, Target::Review),
			(Operation::Moderate, Target::Site),
		];

		for (operation, target) in cases {
			assert_eq!(
				check(Some(&user), operation, target),
				Err(Denied::Forbidden)
			);
			assert!(can(Some(&admin), operation, target));
		}
	}

	#[test]
	fn test_publish_own_recipe_only() {
		let owner = actor(Role::User);
		let stranger = actor(Role::User);
		let target = recipe(owner.id, false);

		assert!(can(Some(&owner), Operation::PublishRecipe, target));
		assert!(!can(Some(&stranger), Operation::PublishRecipe, target));
	}

	#[test]
	fn test_admin_self_protection() {
		let admin = actor(Role::Admin);
		let own = Target::User(admin.id);

		assert_eq!(
			check(Some(&admin), Operation::ToggleActive, own),
			Err(Denied::OwnActivation)
		);
		assert_eq!(
			check(Some(&admin), Operation::ChangeRole(Role::User), own),
			Err(Denied::OwnRole)
		);
		assert!(can(Some(&admin), Operation::ChangeRole(Role::Admin), own));
		assert_eq!(
			Denied::OwnActivation.kind(),
			crate::error::Kind::ValidationFailed
		);
	}
}
