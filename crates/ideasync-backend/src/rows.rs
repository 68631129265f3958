//! Table row shapes as the backend returns them, and the checked
//! conversion of each into a domain type.
//!
//! Nothing past this module sees raw JSON. A row that fails to convert is
//! logged and dropped from list results, and reported as an error when a
//! single row was asked for.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::warn;
use uuid::Uuid;

use ideasync_types::models::{Company, Investment, InvestmentStatus, Message, Profile, Role};

use crate::error::BackendError;

pub const COMPANIES: &str = "companies";
pub const INVESTMENTS: &str = "investments";
pub const MESSAGES: &str = "messages";
pub const PROFILES: &str = "profiles";
pub const USER_ROLES: &str = "user_roles";

#[derive(Debug, Deserialize)]
pub struct CompanyRow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sector: Option<String>,
    pub founder_id: Uuid,
    #[serde(default)]
    pub funding_goal: Option<Number>,
    #[serde(default)]
    pub pitch_deck: Option<String>,
    #[serde(default)]
    pub contact_details: Option<String>,
}

/// Insert/update payload for `companies`.
#[derive(Debug, Serialize)]
pub struct CompanyWrite<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub founder_id: Option<Uuid>,
    pub name: &'a str,
    pub description: &'a str,
    pub sector: &'a str,
    pub funding_goal: Option<u64>,
    pub pitch_deck: Option<&'a str>,
    pub contact_details: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct InvestmentRow {
    pub id: Uuid,
    pub company_id: Uuid,
    pub investor_id: Uuid,
    #[serde(default)]
    pub amount: Option<Number>,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct InvestmentWrite {
    pub company_id: Uuid,
    pub investor_id: Uuid,
    pub amount: u64,
    pub status: InvestmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct MessageRow {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageWrite<'a> {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub company_id: Uuid,
    pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ProfileRow {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserRoleRow {
    pub user_id: Uuid,
    pub role: String,
}

fn malformed(table: &'static str, reason: impl Into<String>) -> BackendError {
    BackendError::MalformedRow {
        table,
        reason: reason.into(),
    }
}

/// Whole, non-negative amounts only. The backend stores numerics, so a
/// fractional value means someone wrote the row outside this client.
fn whole_amount(table: &'static str, column: &str, value: &Number) -> Result<u64, BackendError> {
    if let Some(whole) = value.as_u64() {
        return Ok(whole);
    }
    match value.as_f64() {
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v < u64::MAX as f64 => Ok(v as u64),
        _ => Err(malformed(table, format!("{} must be a whole non-negative number, got {}", column, value))),
    }
}

impl TryFrom<CompanyRow> for Company {
    type Error = BackendError;

    fn try_from(row: CompanyRow) -> Result<Self, Self::Error> {
        if row.name.trim().is_empty() {
            return Err(malformed(COMPANIES, format!("company {} has no name", row.id)));
        }
        let funding_goal = row
            .funding_goal
            .map(|v| whole_amount(COMPANIES, "funding_goal", &v))
            .transpose()?;

        Ok(Company {
            id: row.id,
            name: row.name,
            description: row.description.unwrap_or_default(),
            sector: row.sector.unwrap_or_default(),
            founder_id: row.founder_id,
            funding_goal,
            pitch_deck: row.pitch_deck.filter(|s| !s.is_empty()),
            contact_details: row.contact_details.filter(|s| !s.is_empty()),
        })
    }
}

impl TryFrom<InvestmentRow> for Investment {
    type Error = BackendError;

    fn try_from(row: InvestmentRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "saved" => InvestmentStatus::Saved,
            "invested" => InvestmentStatus::Invested,
            other => return Err(malformed(INVESTMENTS, format!("unknown status '{}'", other))),
        };

        Ok(Investment {
            id: row.id,
            company_id: row.company_id,
            investor_id: row.investor_id,
            amount: row
                .amount
                .as_ref()
                .map(|v| whole_amount(INVESTMENTS, "amount", v))
                .transpose()?
                .unwrap_or(0),
            status,
        })
    }
}

impl TryFrom<MessageRow> for Message {
    type Error = BackendError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(Message {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            company_id: row.company_id,
            content: row.content,
            created_at: row.created_at,
            read: row.read,
        })
    }
}

impl TryFrom<ProfileRow> for Profile {
    type Error = BackendError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        // A profile with an unrecognised role is still a usable name card.
        let role = row.role.as_deref().and_then(|r| match r.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!("Profile {}: {}", row.id, e);
                None
            }
        });

        Ok(Profile {
            id: row.id,
            name: row.name.unwrap_or_default(),
            email: row.email,
            role,
        })
    }
}

impl TryFrom<UserRoleRow> for (Uuid, Role) {
    type Error = BackendError;

    fn try_from(row: UserRoleRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|e| malformed(USER_ROLES, e.to_string()))?;
        Ok((row.user_id, role))
    }
}

/// Decode and convert a single row.
pub fn parse_row<R, T>(table: &'static str, value: Value) -> Result<T, BackendError>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = BackendError>,
{
    let row: R = serde_json::from_value(value).map_err(|e| malformed(table, e.to_string()))?;
    T::try_from(row)
}

/// Decode and convert a result set, skipping rows that do not convert.
pub fn parse_rows<R, T>(table: &'static str, values: Vec<Value>) -> Vec<T>
where
    R: DeserializeOwned,
    T: TryFrom<R, Error = BackendError>,
{
    values
        .into_iter()
        .filter_map(|value| match parse_row::<R, T>(table, value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping row: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn company_row_fills_optional_columns() {
        let id = Uuid::new_v4();
        let founder = Uuid::new_v4();
        let company: Company = parse_row::<CompanyRow, _>(
            COMPANIES,
            json!({
                "id": id,
                "name": "TechNova",
                "description": null,
                "sector": "Technology",
                "founder_id": founder,
                "funding_goal": 500000,
                "pitch_deck": "",
                "created_at": "2025-01-01T00:00:00Z"
            }),
        )
        .unwrap();

        assert_eq!(company.id, id);
        assert_eq!(company.description, "");
        assert_eq!(company.funding_goal, Some(500_000));
        assert_eq!(company.pitch_deck, None);
        assert!(company.is_owned_by(founder));
    }

    #[test]
    fn negative_funding_goal_is_rejected() {
        let err = parse_row::<CompanyRow, Company>(
            COMPANIES,
            json!({
                "id": Uuid::new_v4(),
                "name": "Broken",
                "founder_id": Uuid::new_v4(),
                "funding_goal": -5
            }),
        )
        .unwrap_err();
        assert!(matches!(err, BackendError::MalformedRow { table: COMPANIES, .. }));
    }

    #[test]
    fn large_amounts_survive_the_round_trip() {
        let goal = (1u64 << 53) + 1;
        let company: Company = parse_row::<CompanyRow, _>(
            COMPANIES,
            json!({
                "id": Uuid::new_v4(),
                "name": "Big",
                "founder_id": Uuid::new_v4(),
                "funding_goal": goal
            }),
        )
        .unwrap();
        assert_eq!(company.funding_goal, Some(goal));

        let investment: Investment = parse_row::<InvestmentRow, _>(
            INVESTMENTS,
            json!({
                "id": Uuid::new_v4(),
                "company_id": Uuid::new_v4(),
                "investor_id": Uuid::new_v4(),
                "amount": u64::MAX,
                "status": "invested"
            }),
        )
        .unwrap();
        assert_eq!(investment.amount, u64::MAX);

        let whole_float: Company = parse_row::<CompanyRow, _>(
            COMPANIES,
            json!({
                "id": Uuid::new_v4(),
                "name": "Float",
                "founder_id": Uuid::new_v4(),
                "funding_goal": 250000.0
            }),
        )
        .unwrap();
        assert_eq!(whole_float.funding_goal, Some(250_000));

        assert!(
            parse_row::<CompanyRow, Company>(
                COMPANIES,
                json!({
                    "id": Uuid::new_v4(),
                    "name": "Fraction",
                    "founder_id": Uuid::new_v4(),
                    "funding_goal": 10.5
                }),
            )
            .is_err()
        );
    }

    #[test]
    fn list_parsing_skips_bad_rows() {
        let good = json!({
            "id": Uuid::new_v4(),
            "company_id": Uuid::new_v4(),
            "investor_id": Uuid::new_v4(),
            "amount": 0,
            "status": "saved"
        });
        let bad_status = json!({
            "id": Uuid::new_v4(),
            "company_id": Uuid::new_v4(),
            "investor_id": Uuid::new_v4(),
            "status": "pledged"
        });
        let missing_ids = json!({ "status": "saved" });

        let parsed: Vec<Investment> =
            parse_rows::<InvestmentRow, _>(INVESTMENTS, vec![good, bad_status, missing_ids]);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].status, InvestmentStatus::Saved);
    }

    #[test]
    fn user_role_row_requires_known_role() {
        let user = Uuid::new_v4();
        let ok: (Uuid, Role) =
            parse_row::<UserRoleRow, _>(USER_ROLES, json!({ "user_id": user, "role": "investor" })).unwrap();
        assert_eq!(ok, (user, Role::Investor));

        assert!(
            parse_row::<UserRoleRow, (Uuid, Role)>(USER_ROLES, json!({ "user_id": user, "role": "admin" }))
                .is_err()
        );
    }
}
