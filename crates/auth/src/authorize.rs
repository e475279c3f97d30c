use thiserror::Error;

use warden_core::{ErrorKind, TenantId, UserId};

use crate::{Claims, Role};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The target lies outside the caller's tenant. Reported as absence so
    /// tenants cannot probe each other's identifiers.
    #[error("not found")]
    NotFound,
}

impl AuthzError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::Unauthorized => ErrorKind::AuthenticationFailure,
            AuthzError::Forbidden(_) => ErrorKind::Forbidden,
            AuthzError::NotFound => ErrorKind::NotFound,
        }
    }
}

/// Relation required between the caller and the target user.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubjectRule {
    Any,
    /// Target user must be the caller.
    SelfOnly,
    /// Target user must not be the caller.
    NotSelf,
}

/// Static authorization requirements of one operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Policy {
    pub operation: &'static str,
    pub roles: &'static [Role],
    pub subject: SubjectRule,
}

pub mod policies {
    use super::{Policy, SubjectRule};
    use crate::Role;

    const ADMIN: &[Role] = &[Role::TenantAdmin];

    pub const WHOAMI: Policy = Policy {
        operation: "whoami",
        roles: &Role::ALL,
        subject: SubjectRule::Any,
    };

    pub const DELETE_USER: Policy = Policy {
        operation: "delete_user",
        roles: ADMIN,
        subject: SubjectRule::NotSelf,
    };

    pub const UPDATE_USER: Policy = Policy {
        operation: "update_user",
        roles: ADMIN,
        subject: SubjectRule::SelfOnly,
    };

    pub const LIST_USERS: Policy = Policy {
        operation: "list_users",
        roles: ADMIN,
        subject: SubjectRule::Any,
    };

    pub const LIST_ROLES: Policy = Policy {
        operation: "list_roles",
        roles: ADMIN,
        subject: SubjectRule::Any,
    };

    pub const ISSUE_EMAIL_VERIFICATION: Policy = Policy {
        operation: "issue_email_verification",
        roles: ADMIN,
        subject: SubjectRule::Any,
    };
}

/// What an operation acts upon.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Target {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
}

impl Target {
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            user_id: None,
        }
    }

    pub fn user(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            tenant_id,
            user_id: Some(user_id),
        }
    }
}

/// Decide whether verified `claims` may perform `policy` against `target`.
///
/// - No IO
/// - No panics
/// - Tenant scope is checked before role and subject rules
pub fn authorize<'a>(
    claims: Option<&'a Claims>,
    policy: &Policy,
    target: &Target,
) -> Result<&'a Claims, AuthzError> {
    let claims = claims.ok_or(AuthzError::Unauthorized)?;

    if claims.tenant_id != target.tenant_id {
        return Err(AuthzError::NotFound);
    }

    if !policy.roles.contains(&claims.role) {
        return Err(AuthzError::Forbidden(format!(
            "role '{}' may not perform '{}'",
            claims.role, policy.operation
        )));
    }

    match (policy.subject, target.user_id) {
        (SubjectRule::SelfOnly, Some(user_id)) if user_id != claims.sub => Err(
            AuthzError::Forbidden(format!("'{}' is limited to the caller's own account", policy.operation)),
        ),
        (SubjectRule::NotSelf, Some(user_id)) if user_id == claims.sub => Err(
            AuthzError::Forbidden(format!("'{}' may not target the caller's own account", policy.operation)),
        ),
        (SubjectRule::SelfOnly | SubjectRule::NotSelf, None) => Err(AuthzError::Forbidden(format!(
            "'{}' requires a target user",
            policy.operation
        ))),
        _ => Ok(claims),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn claims(user: u64, tenant: u64, role: Role) -> Claims {
        let now = Utc::now();
        Claims {
            sub: UserId::new(user),
            tenant_id: TenantId::new(tenant),
            email: format!("u{user}@t{tenant}.test"),
            first_name: String::new(),
            last_name: String::new(),
            role,
            issued_at: now,
            expires_at: now + Duration::hours(1),
        }
    }

    #[test]
    fn missing_claims_are_unauthorized() {
        let err = authorize(None, &policies::WHOAMI, &Target::tenant(TenantId::new(1))).unwrap_err();
        assert_eq!(err, AuthzError::Unauthorized);
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailure);
    }

    #[test]
    fn cross_tenant_target_is_not_found_for_any_role() {
        for role in Role::ALL {
            let c = claims(1, 1, role);
            let target = Target::user(TenantId::new(2), UserId::new(5));
            assert_eq!(
                authorize(Some(&c), &policies::DELETE_USER, &target),
                Err(AuthzError::NotFound)
            );
        }
    }

    #[test]
    fn role_gate() {
        let admin = claims(1, 1, Role::TenantAdmin);
        let user = claims(2, 1, Role::TenantUser);
        let target = Target::tenant(TenantId::new(1));

        assert!(authorize(Some(&admin), &policies::LIST_USERS, &target).is_ok());
        assert!(matches!(
            authorize(Some(&user), &policies::LIST_USERS, &target),
            Err(AuthzError::Forbidden(_))
        ));
        assert!(authorize(Some(&user), &policies::WHOAMI, &target).is_ok());
    }

    #[test]
    fn delete_user_excludes_self() {
        let admin = claims(1, 1, Role::TenantAdmin);
        let tenant = TenantId::new(1);

        assert!(authorize(Some(&admin), &policies::DELETE_USER, &Target::user(tenant, UserId::new(2))).is_ok());
        assert!(matches!(
            authorize(Some(&admin), &policies::DELETE_USER, &Target::user(tenant, UserId::new(1))),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn update_user_is_self_only_for_admins() {
        let admin = claims(1, 1, Role::TenantAdmin);
        let user = claims(2, 1, Role::TenantUser);
        let tenant = TenantId::new(1);

        assert!(authorize(Some(&admin), &policies::UPDATE_USER, &Target::user(tenant, UserId::new(1))).is_ok());
        assert!(matches!(
            authorize(Some(&admin), &policies::UPDATE_USER, &Target::user(tenant, UserId::new(2))),
            Err(AuthzError::Forbidden(_))
        ));
        // Self, but not an admin.
        assert!(matches!(
            authorize(Some(&user), &policies::UPDATE_USER, &Target::user(tenant, UserId::new(2))),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn subject_rules_need_a_target_user() {
        let admin = claims(1, 1, Role::TenantAdmin);
        assert!(matches!(
            authorize(Some(&admin), &policies::DELETE_USER, &Target::tenant(TenantId::new(1))),
            Err(AuthzError::Forbidden(_))
        ));
    }
}
