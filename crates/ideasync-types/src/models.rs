use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Founder,
    Investor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Founder => "founder",
            Self::Investor => "investor",
        }
    }

    /// The role on the other side of the marketplace.
    pub fn other(&self) -> Self {
        match self {
            Self::Founder => Self::Investor,
            Self::Investor => Self::Founder,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "founder" => Ok(Self::Founder),
            "investor" => Ok(Self::Investor),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

/// The signed-in identity as the client sees it. A read-only projection of
/// the backend's user record, refreshed on every auth change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub sector: String,
    pub founder_id: Uuid,
    pub funding_goal: Option<u64>,
    pub pitch_deck: Option<String>,
    pub contact_details: Option<String>,
}

impl Company {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.founder_id == user_id
    }
}

/// Editable company fields. Everything except identity and ownership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDraft {
    pub name: String,
    pub description: String,
    pub sector: String,
    pub funding_goal: Option<u64>,
    pub pitch_deck: Option<String>,
    pub contact_details: Option<String>,
}

impl From<&Company> for CompanyDraft {
    fn from(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            description: company.description.clone(),
            sector: company.sector.clone(),
            funding_goal: company.funding_goal,
            pitch_deck: company.pitch_deck.clone(),
            contact_details: company.contact_details.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestmentStatus {
    Saved,
    Invested,
}

impl InvestmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Saved => "saved",
            Self::Invested => "invested",
        }
    }
}

impl fmt::Display for InvestmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An investor's relationship to a company. At most one record exists per
/// (company_id, investor_id, status).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investment {
    pub id: Uuid,
    pub company_id: Uuid,
    pub investor_id: Uuid,
    pub amount: u64,
    pub status: InvestmentStatus,
}

/// Messages are immutable once sent, except for `read`, which only the
/// recipient may flip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Public profile row kept alongside the auth user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub email: Option<String>,
    pub name: String,
    pub role: Option<Role>,
}

pub const DEFAULT_MINIMUM_INVESTMENT: u64 = 10_000;
pub const DEFAULT_MAXIMUM_INVESTMENT: u64 = 100_000;

/// Investor preferences cached on the device. Advisory only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorProfile {
    pub full_name: String,
    pub bio: String,
    #[serde(default)]
    pub linked_in: String,
    pub investment_focus: String,
    pub minimum_investment: u64,
    pub maximum_investment: u64,
}

impl InvestorProfile {
    pub fn defaults_for(name: &str) -> Self {
        Self {
            full_name: name.to_string(),
            bio: String::new(),
            linked_in: String::new(),
            investment_focus: String::new(),
            minimum_investment: DEFAULT_MINIMUM_INVESTMENT,
            maximum_investment: DEFAULT_MAXIMUM_INVESTMENT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Founder".parse::<Role>().unwrap(), Role::Founder);
        assert_eq!(" investor ".parse::<Role>().unwrap(), Role::Investor);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Investor).unwrap(), "\"investor\"");
        assert_eq!(Role::Founder.other(), Role::Investor);
    }

    #[test]
    fn profile_defaults_match_form_defaults() {
        let profile = InvestorProfile::defaults_for("Ann");
        assert_eq!(profile.full_name, "Ann");
        assert_eq!(profile.minimum_investment, 10_000);
        assert_eq!(profile.maximum_investment, 100_000);
        assert!(profile.bio.is_empty());
    }
}
