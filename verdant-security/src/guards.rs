use verdant_core::Role;

use crate::role::RoleQuery;

/// Outcome of a role check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The role is still being resolved; render neither branch yet.
    Pending,
    Granted,
    Denied,
}

impl Access {
    pub fn is_granted(self) -> bool {
        self == Access::Granted
    }
}

/// Grants access when the resolved role is one of `required_roles`.
///
/// A disabled lookup (no principal) is denied once the identity has
/// finished loading; a failed lookup is denied.
#[derive(Debug, Clone)]
pub struct RoleGuard {
    pub required_roles: Vec<Role>,
}

impl RoleGuard {
    pub fn new(required_roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            required_roles: required_roles.into_iter().collect(),
        }
    }

    pub fn admin() -> Self {
        Self::new([Role::Admin])
    }

    pub fn seller() -> Self {
        Self::new([Role::Seller])
    }

    pub fn check(&self, query: &RoleQuery) -> Access {
        if query.is_loading() {
            return Access::Pending;
        }
        self.check_role(query.role().as_ref())
    }

    pub fn check_role(&self, role: Option<&Role>) -> Access {
        match role {
            Some(role) if self.required_roles.contains(role) => Access::Granted,
            _ => Access::Denied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_role_is_granted() {
        let guard = RoleGuard::new([Role::Admin, Role::Seller]);
        assert_eq!(guard.check_role(Some(&Role::Seller)), Access::Granted);
        assert_eq!(guard.check_role(Some(&Role::Customer)), Access::Denied);
        assert_eq!(guard.check_role(None), Access::Denied);
    }

    #[test]
    fn loading_identity_is_pending() {
        let guard = RoleGuard::admin();
        assert_eq!(guard.check(&RoleQuery::Disabled { loading: true }), Access::Pending);
        assert_eq!(guard.check(&RoleQuery::Disabled { loading: false }), Access::Denied);
    }
}
