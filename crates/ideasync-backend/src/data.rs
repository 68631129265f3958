use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use ideasync_types::models::{Company, CompanyDraft, Investment, InvestmentStatus, Message, Profile, Role};

use crate::auth::AuthClient;
use crate::error::{BackendError, Result};
use crate::http::check;
use crate::rest::Query;
use crate::rows::{
    self, COMPANIES, CompanyRow, CompanyWrite, INVESTMENTS, InvestmentRow, InvestmentWrite, MESSAGES,
    MessageRow, MessageWrite, PROFILES, ProfileRow, USER_ROLES, UserRoleRow,
};

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub company_id: Uuid,
    pub content: String,
}

/// Typed access to the backend tables. Row policies still apply on the
/// server; methods that could be silently filtered by a policy report the
/// affected row (or its absence) so callers can tell.
#[async_trait]
pub trait DataBackend: Send + Sync {
    async fn list_companies(&self) -> Result<Vec<Company>>;

    async fn companies_by_founder(&self, founder_id: Uuid) -> Result<Vec<Company>>;

    async fn companies_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Company>>;

    async fn get_company(&self, id: Uuid) -> Result<Option<Company>>;

    async fn insert_company(&self, founder_id: Uuid, draft: &CompanyDraft) -> Result<Company>;

    /// `None` when no row both has this id and belongs to `founder_id`.
    async fn update_company(&self, id: Uuid, founder_id: Uuid, draft: &CompanyDraft) -> Result<Option<Company>>;

    async fn investments_for(&self, investor_id: Uuid, status: InvestmentStatus) -> Result<Vec<Investment>>;

    /// Insert or overwrite the (company, investor, status) record.
    async fn upsert_investment(
        &self,
        company_id: Uuid,
        investor_id: Uuid,
        status: InvestmentStatus,
        amount: u64,
    ) -> Result<Investment>;

    /// Returns how many records were removed.
    async fn delete_investment(&self, company_id: Uuid, investor_id: Uuid, status: InvestmentStatus) -> Result<usize>;

    /// Messages sent or received by `user_id`, newest first.
    async fn messages_for(&self, user_id: Uuid) -> Result<Vec<Message>>;

    async fn insert_message(&self, message: &NewMessage) -> Result<Message>;

    /// `false` when the message does not exist or `recipient_id` is not its
    /// recipient.
    async fn mark_message_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool>;

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>>;

    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>>;
}

/// [`DataBackend`] over the HTTP table API, authenticated as whoever the
/// shared [`AuthClient`] currently holds a session for.
pub struct DataClient {
    auth: Arc<AuthClient>,
}

impl DataClient {
    pub fn new(auth: Arc<AuthClient>) -> Self {
        Self { auth }
    }

    async fn send(
        &self,
        method: Method,
        table: &'static str,
        query: &Query,
        prefer: Option<&str>,
        body: Option<Value>,
    ) -> Result<Vec<Value>> {
        let token = self.auth.access_token().await?;
        let http = self.auth.http();
        let url = http.rest_url(table)?;

        let mut req = http
            .request(method, url, token.as_deref())
            .query(query.params());
        if let Some(prefer) = prefer {
            req = req.header("Prefer", prefer);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = check(req.send().await?).await?;
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Value>(&text) {
            Ok(Value::Array(rows)) => Ok(rows),
            Ok(row @ Value::Object(_)) => Ok(vec![row]),
            Ok(other) => Err(BackendError::MalformedRow {
                table,
                reason: format!("expected rows, got {}", other),
            }),
            Err(e) => Err(BackendError::MalformedRow {
                table,
                reason: e.to_string(),
            }),
        }
    }

    async fn select(&self, table: &'static str, query: Query) -> Result<Vec<Value>> {
        self.send(Method::GET, table, &query, None, None).await
    }

    async fn insert<B: Serialize + Sync>(&self, table: &'static str, body: &B) -> Result<Vec<Value>> {
        let body = to_body(table, body)?;
        self.send(Method::POST, table, &Query::new(), Some("return=representation"), Some(body))
            .await
    }

    async fn upsert<B: Serialize + Sync>(
        &self,
        table: &'static str,
        conflict_columns: &[&str],
        body: &B,
    ) -> Result<Vec<Value>> {
        let query = Query::new().on_conflict(conflict_columns);
        let body = to_body(table, body)?;
        self.send(
            Method::POST,
            table,
            &query,
            Some("resolution=merge-duplicates,return=representation"),
            Some(body),
        )
        .await
    }

    async fn update<B: Serialize + Sync>(&self, table: &'static str, query: Query, body: &B) -> Result<Vec<Value>> {
        let body = to_body(table, body)?;
        self.send(Method::PATCH, table, &query, Some("return=representation"), Some(body))
            .await
    }

    async fn delete(&self, table: &'static str, query: Query) -> Result<Vec<Value>> {
        self.send(Method::DELETE, table, &query, Some("return=representation"), None)
            .await
    }
}

fn to_body<B: Serialize>(table: &'static str, body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| BackendError::MalformedRow {
        table,
        reason: e.to_string(),
    })
}

fn single<T>(table: &'static str, mut rows: Vec<T>) -> Result<T> {
    if rows.is_empty() {
        return Err(BackendError::MalformedRow {
            table,
            reason: "write returned no row".to_string(),
        });
    }
    Ok(rows.swap_remove(0))
}

fn company_write<'a>(founder_id: Option<Uuid>, draft: &'a CompanyDraft) -> CompanyWrite<'a> {
    CompanyWrite {
        founder_id,
        name: draft.name.trim(),
        description: draft.description.trim(),
        sector: draft.sector.trim(),
        funding_goal: draft.funding_goal,
        pitch_deck: draft.pitch_deck.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        contact_details: draft.contact_details.as_deref().map(str::trim).filter(|s| !s.is_empty()),
    }
}

#[async_trait]
impl DataBackend for DataClient {
    async fn list_companies(&self) -> Result<Vec<Company>> {
        let rows = self.select(COMPANIES, Query::new().order("created_at", false)).await?;
        Ok(rows::parse_rows::<CompanyRow, _>(COMPANIES, rows))
    }

    async fn companies_by_founder(&self, founder_id: Uuid) -> Result<Vec<Company>> {
        let query = Query::new().eq("founder_id", founder_id).order("created_at", false);
        let rows = self.select(COMPANIES, query).await?;
        Ok(rows::parse_rows::<CompanyRow, _>(COMPANIES, rows))
    }

    async fn companies_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Company>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = self.select(COMPANIES, Query::new().in_list("id", ids)).await?;
        Ok(rows::parse_rows::<CompanyRow, _>(COMPANIES, rows))
    }

    async fn get_company(&self, id: Uuid) -> Result<Option<Company>> {
        let rows = self.select(COMPANIES, Query::new().eq("id", id)).await?;
        rows.into_iter()
            .next()
            .map(|row| rows::parse_row::<CompanyRow, _>(COMPANIES, row))
            .transpose()
    }

    async fn insert_company(&self, founder_id: Uuid, draft: &CompanyDraft) -> Result<Company> {
        let rows = self.insert(COMPANIES, &company_write(Some(founder_id), draft)).await?;
        let row = single(COMPANIES, rows)?;
        let company: Company = rows::parse_row::<CompanyRow, _>(COMPANIES, row)?;
        debug!("Created company {} for founder {}", company.id, founder_id);
        Ok(company)
    }

    async fn update_company(&self, id: Uuid, founder_id: Uuid, draft: &CompanyDraft) -> Result<Option<Company>> {
        let query = Query::new().eq("id", id).eq("founder_id", founder_id);
        let rows = self.update(COMPANIES, query, &company_write(None, draft)).await?;
        rows.into_iter()
            .next()
            .map(|row| rows::parse_row::<CompanyRow, _>(COMPANIES, row))
            .transpose()
    }

    async fn investments_for(&self, investor_id: Uuid, status: InvestmentStatus) -> Result<Vec<Investment>> {
        let query = Query::new()
            .eq("investor_id", investor_id)
            .eq("status", status)
            .order("created_at", true);
        let rows = self.select(INVESTMENTS, query).await?;
        Ok(rows::parse_rows::<InvestmentRow, _>(INVESTMENTS, rows))
    }

    async fn upsert_investment(
        &self,
        company_id: Uuid,
        investor_id: Uuid,
        status: InvestmentStatus,
        amount: u64,
    ) -> Result<Investment> {
        let body = InvestmentWrite {
            company_id,
            investor_id,
            amount,
            status,
        };
        let rows = self
            .upsert(INVESTMENTS, &["company_id", "investor_id", "status"], &body)
            .await?;
        rows::parse_row::<InvestmentRow, _>(INVESTMENTS, single(INVESTMENTS, rows)?)
    }

    async fn delete_investment(&self, company_id: Uuid, investor_id: Uuid, status: InvestmentStatus) -> Result<usize> {
        let query = Query::new()
            .eq("company_id", company_id)
            .eq("investor_id", investor_id)
            .eq("status", status);
        Ok(self.delete(INVESTMENTS, query).await?.len())
    }

    async fn messages_for(&self, user_id: Uuid) -> Result<Vec<Message>> {
        let query = Query::new()
            .or_eq(&[("recipient_id", user_id), ("sender_id", user_id)])
            .order("created_at", true);
        let rows = self.select(MESSAGES, query).await?;
        Ok(rows::parse_rows::<MessageRow, _>(MESSAGES, rows))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<Message> {
        let body = MessageWrite {
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            company_id: message.company_id,
            content: &message.content,
        };
        let rows = self.insert(MESSAGES, &body).await?;
        rows::parse_row::<MessageRow, _>(MESSAGES, single(MESSAGES, rows)?)
    }

    async fn mark_message_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool> {
        let query = Query::new().eq("id", id).eq("recipient_id", recipient_id);
        let rows = self
            .update(MESSAGES, query, &serde_json::json!({ "read": true }))
            .await?;
        Ok(!rows.is_empty())
    }

    async fn profiles_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let rows = self.select(PROFILES, Query::new().in_list("id", ids)).await?;
        Ok(rows::parse_rows::<ProfileRow, _>(PROFILES, rows))
    }

    async fn role_of(&self, user_id: Uuid) -> Result<Option<Role>> {
        let rows = self.select(USER_ROLES, Query::new().eq("user_id", user_id)).await?;
        let roles: Vec<(Uuid, Role)> = rows::parse_rows::<UserRoleRow, _>(USER_ROLES, rows);
        Ok(roles.into_iter().map(|(_, role)| role).next())
    }
}
