//! Operator roles and the actor handle carried through mutations.

use serde::{Deserialize, Serialize};

/// Warehouse operator role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Picks items on the warehouse floor.
    Separator,
    /// Creates and confirms orders.
    Seller,
    /// Works the purchase queue.
    Buyer,
    /// Full access.
    Admin,
}

impl Role {
    /// Parse a role from its stored string form.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "separator" => Some(Self::Separator),
            "seller" => Some(Self::Seller),
            "buyer" => Some(Self::Buyer),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Storage/wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Separator => "separator",
            Self::Seller => "seller",
            Self::Buyer => "buyer",
            Self::Admin => "admin",
        }
    }

    /// Whether this role may manually complete an order.
    #[must_use]
    pub const fn can_complete_orders(&self) -> bool {
        matches!(self, Self::Admin | Self::Separator)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated operator performing a mutation.
///
/// The core only consumes the handle and role; identity management lives in
/// the auth subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Internal user handle.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Role.
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_is_case_insensitive() {
        assert_eq!(Role::from_str_case_insensitive("ADMIN"), Some(Role::Admin));
        assert_eq!(
            Role::from_str_case_insensitive("Separator"),
            Some(Role::Separator)
        );
        assert_eq!(Role::from_str_case_insensitive("intern"), None);
    }

    #[test]
    fn completion_permission() {
        assert!(Role::Admin.can_complete_orders());
        assert!(Role::Separator.can_complete_orders());
        assert!(!Role::Seller.can_complete_orders());
        assert!(!Role::Buyer.can_complete_orders());
    }
}
