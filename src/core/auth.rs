// src/core/auth.rs - Departments, Capabilities, and Actor Context
//! Capability mapping for the administrative console
//!
//! Admin accounts belong to exactly one department, and each department
//! grants a fixed set of capabilities. The mapping is a closed enum-to-set
//! table behind the [`CapabilityMap`] trait so deployments can inject their
//! own matrix; nothing in the engines compares department names as strings,
//! and no actor identity is ever read from ambient state - callers pass an
//! explicit [`ActorContext`] into every engine operation.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

use crate::core::types::UserId;
use crate::EstoreError;

/// Administrative department an admin account belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Department {
    /// Analytics department
    Analyze,
    /// Order management department
    OrderManage,
    /// Product management department
    ProductManage,
    /// User management department
    UserManage,
}

impl Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analyze => write!(f, "ANALYZE"),
            Self::OrderManage => write!(f, "ORDER_MANAGE"),
            Self::ProductManage => write!(f, "PRODUCT_MANAGE"),
            Self::UserManage => write!(f, "USER_MANAGE"),
        }
    }
}

impl FromStr for Department {
    type Err = EstoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ANALYZE" => Ok(Self::Analyze),
            "ORDER_MANAGE" => Ok(Self::OrderManage),
            "PRODUCT_MANAGE" => Ok(Self::ProductManage),
            "USER_MANAGE" => Ok(Self::UserManage),
            _ => Err(EstoreError::Validation(format!("Invalid department: {s}"))),
        }
    }
}

/// A single permission a department can grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read and mutate orders, including status transitions and logistics
    ManageOrders,
    /// Run analytics views over any scope
    ViewAnalytics,
    /// Manage the product catalog
    ManageProducts,
    /// Manage user accounts
    ManageUsers,
}

/// Maps departments to the capabilities they grant
///
/// Injected into the engines as a collaborator; the engines never decide
/// membership themselves, only consult the map.
pub trait CapabilityMap: Send + Sync {
    /// Capabilities granted to the given department
    fn capabilities(&self, department: Department) -> &[Capability];

    /// Whether the department grants the given capability
    fn grants(&self, department: Department, capability: Capability) -> bool {
        self.capabilities(department).contains(&capability)
    }
}

/// Default department-to-capability matrix
///
/// Mirrors the console's standing departments: each department holds its own
/// management capability, and order management also sees analytics (order
/// dashboards embed aggregate views).
#[derive(Debug, Clone, Copy, Default)]
pub struct DepartmentDirectory;

impl CapabilityMap for DepartmentDirectory {
    fn capabilities(&self, department: Department) -> &[Capability] {
        match department {
            Department::Analyze => &[Capability::ViewAnalytics],
            Department::OrderManage => &[Capability::ManageOrders, Capability::ViewAnalytics],
            Department::ProductManage => &[Capability::ManageProducts],
            Department::UserManage => &[Capability::ManageUsers],
        }
    }
}

/// Identity and department of the actor performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    /// Admin user performing the operation
    pub user_id: UserId,
    /// Department the admin belongs to
    pub department: Department,
}

impl ActorContext {
    /// Create a new actor context
    pub fn new(user_id: UserId, department: Department) -> Self {
        Self {
            user_id,
            department,
        }
    }
}
