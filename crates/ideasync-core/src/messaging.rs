use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use ideasync_backend::{DataBackend, NewMessage};
use ideasync_types::models::{Message, Profile, Role};

use crate::error::{AppError, Result};
use crate::founder::UNKNOWN_USER;
use crate::session::SessionSynchronizer;
use crate::validation::validate_message;

pub const UNTITLED_COMPANY: &str = "Untitled Company";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A message as the viewer sees it, with names filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEntry {
    pub message: Message,
    pub company_name: String,
    pub counterpart_id: Uuid,
    pub counterpart_name: String,
    pub counterpart_role: Option<Role>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxView {
    Empty(&'static str),
    Entries(Vec<InboxEntry>),
}

impl InboxView {
    pub fn unread(&self) -> usize {
        match self {
            Self::Empty(_) => 0,
            Self::Entries(entries) => entries
                .iter()
                .filter(|e| e.direction == Direction::Incoming && !e.message.read)
                .count(),
        }
    }
}

pub fn empty_inbox_text(role: Role) -> &'static str {
    match role {
        Role::Investor => "Start by contacting founders about their startups",
        Role::Founder => "When investors contact you about your startup, messages will appear here",
    }
}

pub struct MessagingService {
    session: Arc<SessionSynchronizer>,
    data: Arc<dyn DataBackend>,
}

impl MessagingService {
    pub fn new(session: Arc<SessionSynchronizer>, data: Arc<dyn DataBackend>) -> Self {
        Self { session, data }
    }

    /// Message the founder of `company_id`.
    pub async fn send(&self, company_id: Uuid, content: &str) -> Result<Message> {
        let me = self.session.require_user()?;
        let content = validate_message(content)?;

        let company = self
            .data
            .get_company(company_id)
            .await?
            .ok_or(AppError::NotFound("Company"))?;

        let message = self
            .data
            .insert_message(&NewMessage {
                sender_id: me.id,
                recipient_id: company.founder_id,
                company_id,
                content: content.to_string(),
            })
            .await?;
        info!("{} messaged {} about {}", me.id, company.founder_id, company.id);
        Ok(message)
    }

    /// Messages I sent or received, newest first.
    pub async fn inbox(&self) -> Result<InboxView> {
        let me = self.session.require_user()?;
        let messages = self.data.messages_for(me.id).await?;
        if messages.is_empty() {
            return Ok(InboxView::Empty(empty_inbox_text(me.role)));
        }
        Ok(InboxView::Entries(self.entries(me.id, messages).await?))
    }

    /// Open one message, marking it read when it was sent to me.
    pub async fn open(&self, id: Uuid) -> Result<InboxEntry> {
        let me = self.session.require_user()?;
        let message = self
            .data
            .messages_for(me.id)
            .await?
            .into_iter()
            .find(|m| m.id == id)
            .ok_or(AppError::NotFound("Message"))?;

        let mut entries = self.entries(me.id, vec![message]).await?;
        let mut entry = entries.pop().ok_or(AppError::NotFound("Message"))?;

        if entry.direction == Direction::Incoming && !entry.message.read {
            if self.data.mark_message_read(id, me.id).await? {
                entry.message.read = true;
            } else {
                debug!("Message {} was not marked read", id);
            }
        }
        Ok(entry)
    }

    pub async fn unread_count(&self) -> Result<usize> {
        let me = self.session.require_user()?;
        Ok(self
            .data
            .messages_for(me.id)
            .await?
            .iter()
            .filter(|m| m.recipient_id == me.id && !m.read)
            .count())
    }

    async fn entries(&self, me: Uuid, messages: Vec<Message>) -> Result<Vec<InboxEntry>> {
        let mut company_ids: Vec<Uuid> = messages.iter().map(|m| m.company_id).collect();
        company_ids.sort();
        company_ids.dedup();
        let mut people: Vec<Uuid> = messages
            .iter()
            .map(|m| counterpart(me, m))
            .collect();
        people.sort();
        people.dedup();

        let companies: HashMap<Uuid, String> = self
            .data
            .companies_by_ids(&company_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let profiles: HashMap<Uuid, Profile> = self
            .data
            .profiles_by_ids(&people)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        Ok(messages
            .into_iter()
            .map(|message| {
                let other = counterpart(me, &message);
                let profile = profiles.get(&other);
                InboxEntry {
                    company_name: companies
                        .get(&message.company_id)
                        .cloned()
                        .unwrap_or_else(|| UNTITLED_COMPANY.to_string()),
                    counterpart_id: other,
                    counterpart_name: profile
                        .map(|p| p.name.clone())
                        .filter(|n| !n.trim().is_empty())
                        .unwrap_or_else(|| UNKNOWN_USER.to_string()),
                    counterpart_role: profile.and_then(|p| p.role),
                    direction: if message.recipient_id == me {
                        Direction::Incoming
                    } else {
                        Direction::Outgoing
                    },
                    message,
                }
            })
            .collect())
    }
}

fn counterpart(me: Uuid, message: &Message) -> Uuid {
    if message.sender_id == me {
        message.recipient_id
    } else {
        message.sender_id
    }
}
