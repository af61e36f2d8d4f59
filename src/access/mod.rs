//! Role-based capability gating.
//!
//! Roles and capabilities are closed enumerations. The role table is built
//! once into an [`AccessPolicy`] at startup and never changes afterwards.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A caller's resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    HomeUser,
    ItAdmin,
    IspSupport,
}

/// A permission bit granted to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    BasicTest,
    SimpleResults,
    DetailedResults,
    History,
    Diagnostics,
    ReportSharing,
    /// Destroying history. Held only by the administrative role.
    ClearHistory,
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

/// Rejection for a role lacking a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("role '{role}' lacks the '{capability}' capability")]
pub struct AccessDenied {
    pub role: Role,
    pub capability: Capability,
}

/// Presentation data for a role.
#[derive(Debug, Clone, Serialize)]
pub struct RoleProfile {
    pub role: Role,
    pub name: &'static str,
    pub description: &'static str,
    pub capabilities: &'static [Capability],
}

impl Role {
    pub const ALL: [Role; 3] = [Role::HomeUser, Role::ItAdmin, Role::IspSupport];

    /// The least-privileged role, used for unset or unknown identifiers.
    pub const LEAST_PRIVILEGED: Role = Role::HomeUser;

    pub fn as_str(self) -> &'static str {
        match self {
            Role::HomeUser => "home_user",
            Role::ItAdmin => "it_admin",
            Role::IspSupport => "isp_support",
        }
    }

    pub fn profile(self) -> RoleProfile {
        use Capability::*;
        match self {
            Role::HomeUser => RoleProfile {
                role: self,
                name: "Home User",
                description: "Simple speed testing for personal use",
                capabilities: &[BasicTest, SimpleResults],
            },
            Role::ItAdmin => RoleProfile {
                role: self,
                name: "IT Administrator",
                description: "Network management and monitoring",
                capabilities: &[BasicTest, DetailedResults, History, Diagnostics, ClearHistory],
            },
            Role::IspSupport => RoleProfile {
                role: self,
                name: "ISP Customer Support",
                description: "Customer support and troubleshooting",
                capabilities: &[BasicTest, DetailedResults, History, Diagnostics, ReportSharing],
            },
        }
    }

    /// Resolve an optional role identifier, defaulting to the least-privileged role.
    pub fn resolve(identifier: Option<&str>) -> Role {
        identifier
            .and_then(|id| id.parse().ok())
            .unwrap_or(Self::LEAST_PRIVILEGED)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::BasicTest => "basic_test",
            Capability::SimpleResults => "simple_results",
            Capability::DetailedResults => "detailed_results",
            Capability::History => "history",
            Capability::Diagnostics => "diagnostics",
            Capability::ReportSharing => "report_sharing",
            Capability::ClearHistory => "clear_history",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Immutable role → capability table.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    grants: HashMap<Role, HashSet<Capability>>,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessPolicy {
    pub fn new() -> Self {
        let grants = Role::ALL
            .into_iter()
            .map(|role| (role, role.profile().capabilities.iter().copied().collect()))
            .collect();
        Self { grants }
    }

    pub fn authorize(&self, role: Role, capability: Capability) -> bool {
        self.grants
            .get(&role)
            .is_some_and(|caps| caps.contains(&capability))
    }

    /// Like [`authorize`](Self::authorize), as a `Result` for `?` use.
    pub fn require(&self, role: Role, capability: Capability) -> Result<(), AccessDenied> {
        if self.authorize(role, capability) {
            Ok(())
        } else {
            Err(AccessDenied { role, capability })
        }
    }

    pub fn profiles(&self) -> Vec<RoleProfile> {
        Role::ALL.into_iter().map(Role::profile).collect()
    }
}
