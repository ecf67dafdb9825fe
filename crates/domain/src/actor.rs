//! Caller context passed into every mutating call.

use serde::{Deserialize, Serialize};

use crate::value_objects::CustomerId;

/// Role of the caller, as asserted by the surrounding session system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Operator,
}

/// Who is performing an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    /// A passenger acting on their own behalf.
    pub fn customer(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Customer,
        }
    }

    /// A SACCO operator or counter clerk.
    pub fn operator(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Operator,
        }
    }

    /// The engine itself, used for sweeps and gateway-driven transitions.
    pub fn system() -> Self {
        Self::operator("system")
    }

    /// Returns true if this actor may act on a booking owned by `owner`.
    ///
    /// Operators may act on any booking; customers only on their own.
    pub fn may_act_for(&self, owner: &CustomerId) -> bool {
        match self.role {
            Role::Operator => true,
            Role::Customer => self.id == owner.as_str(),
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.role {
            Role::Customer => write!(f, "customer:{}", self.id),
            Role::Operator => write!(f, "operator:{}", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_may_only_act_for_self() {
        let owner = CustomerId::new("cust-1");
        assert!(Actor::customer("cust-1").may_act_for(&owner));
        assert!(!Actor::customer("cust-2").may_act_for(&owner));
    }

    #[test]
    fn test_operator_may_act_for_anyone() {
        assert!(Actor::operator("clerk").may_act_for(&CustomerId::new("cust-1")));
        assert!(Actor::system().may_act_for(&CustomerId::new("cust-1")));
    }

    #[test]
    fn test_role_wire_format() {
        let json = serde_json::to_string(&Actor::operator("op-7")).unwrap();
        assert_eq!(json, r#"{"id":"op-7","role":"operator"}"#);
    }
}
