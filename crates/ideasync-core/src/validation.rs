//! Form checks run before anything is sent to the backend.

use thiserror::Error;
use url::Url;

use ideasync_types::models::{CompanyDraft, InvestorProfile, Role};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const BIO_MIN_CHARS: usize = 10;
pub const BIO_MAX_CHARS: usize = 500;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Form field the message belongs to.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub name: String,
    pub role: Role,
}

fn is_web_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub fn validate_credentials(email: &str, password: &str) -> Result<()> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(ValidationError::new("email", "Please enter your email and password"));
    }
    Ok(())
}

pub fn validate_registration(form: &Registration) -> Result<()> {
    let email = form.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ValidationError::new("email", "Please enter a valid email address"));
    }
    if form.name.trim().is_empty() {
        return Err(ValidationError::new("name", "Please enter your name"));
    }
    if form.password != form.confirm_password {
        return Err(ValidationError::new("confirm_password", "Passwords do not match"));
    }
    if form.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::new(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    Ok(())
}

/// Funding goal needs no check here: it is unsigned by construction.
pub fn validate_company(draft: &CompanyDraft) -> Result<()> {
    for (field, value) in [
        ("name", &draft.name),
        ("description", &draft.description),
        ("sector", &draft.sector),
    ] {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "Please fill in all required fields"));
        }
    }

    if let Some(deck) = draft.pitch_deck.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
        if !is_web_url(deck) {
            return Err(ValidationError::new("pitch_deck", "Pitch deck must be a valid URL"));
        }
    }
    Ok(())
}

pub fn validate_investment(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(ValidationError::new("amount", "Investment amount must be a positive number"));
    }
    Ok(())
}

/// Returns the message body as it will be stored.
pub fn validate_message(content: &str) -> Result<&str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ValidationError::new("content", "Message cannot be empty"));
    }
    Ok(content)
}

pub fn validate_investor_profile(profile: &InvestorProfile) -> Result<()> {
    if char_len(&profile.full_name) < 2 {
        return Err(ValidationError::new("full_name", "Name must be at least 2 characters."));
    }

    let bio = char_len(&profile.bio);
    if bio < BIO_MIN_CHARS {
        return Err(ValidationError::new("bio", "Bio must be at least 10 characters."));
    }
    if bio > BIO_MAX_CHARS {
        return Err(ValidationError::new("bio", "Bio cannot exceed 500 characters."));
    }

    let linked_in = profile.linked_in.trim();
    if !linked_in.is_empty() && !is_web_url(linked_in) {
        return Err(ValidationError::new("linked_in", "Please enter a valid LinkedIn URL."));
    }

    if char_len(&profile.investment_focus) < 5 {
        return Err(ValidationError::new(
            "investment_focus",
            "Investment focus must be at least 5 characters.",
        ));
    }
    if profile.minimum_investment == 0 {
        return Err(ValidationError::new(
            "minimum_investment",
            "Minimum investment must be a positive number.",
        ));
    }
    if profile.maximum_investment == 0 {
        return Err(ValidationError::new(
            "maximum_investment",
            "Maximum investment must be a positive number.",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> CompanyDraft {
        CompanyDraft {
            name: "TechNova".into(),
            description: "Quantum widgets".into(),
            sector: "Technology".into(),
            funding_goal: Some(0),
            pitch_deck: None,
            contact_details: None,
        }
    }

    fn profile() -> InvestorProfile {
        InvestorProfile {
            full_name: "Grace Hopper".into(),
            bio: "Angel investor in developer tools.".into(),
            linked_in: String::new(),
            investment_focus: "Dev tools".into(),
            minimum_investment: 10_000,
            maximum_investment: 100_000,
        }
    }

    #[test]
    fn company_requires_core_fields() {
        assert!(validate_company(&company()).is_ok());

        let mut draft = company();
        draft.sector = "   ".into();
        let err = validate_company(&draft).unwrap_err();
        assert_eq!(err.field, "sector");
        assert_eq!(err.message, "Please fill in all required fields");
    }

    #[test]
    fn pitch_deck_must_be_a_link() {
        let mut draft = company();
        draft.pitch_deck = Some("my deck".into());
        assert_eq!(validate_company(&draft).unwrap_err().field, "pitch_deck");

        draft.pitch_deck = Some("https://example.com/deck.pdf".into());
        assert!(validate_company(&draft).is_ok());

        draft.pitch_deck = Some("  ".into());
        assert!(validate_company(&draft).is_ok());
    }

    #[test]
    fn registration_checks_password_confirmation() {
        let mut form = Registration {
            email: "a@x.com".into(),
            password: "pw123456".into(),
            confirm_password: "pw123456".into(),
            name: "Ann".into(),
            role: Role::Founder,
        };
        assert!(validate_registration(&form).is_ok());

        form.confirm_password = "pw1234567".into();
        assert_eq!(validate_registration(&form).unwrap_err().message, "Passwords do not match");

        form.password = "abc".into();
        form.confirm_password = "abc".into();
        assert_eq!(validate_registration(&form).unwrap_err().field, "password");
    }

    #[test]
    fn message_is_trimmed() {
        assert_eq!(validate_message("  hello \n").unwrap(), "hello");
        assert!(validate_message(" \t ").is_err());
    }

    #[test]
    fn investor_profile_bounds() {
        assert!(validate_investor_profile(&profile()).is_ok());

        let mut p = profile();
        p.bio = "x".repeat(501);
        assert_eq!(validate_investor_profile(&p).unwrap_err().message, "Bio cannot exceed 500 characters.");
        p.bio = "x".repeat(500);
        assert!(validate_investor_profile(&p).is_ok());

        let mut p = profile();
        p.linked_in = "linkedin.com/in/grace".into();
        assert_eq!(validate_investor_profile(&p).unwrap_err().field, "linked_in");
        p.linked_in = "https://www.linkedin.com/in/grace".into();
        assert!(validate_investor_profile(&p).is_ok());

        let mut p = profile();
        p.minimum_investment = 0;
        assert_eq!(validate_investor_profile(&p).unwrap_err().field, "minimum_investment");

        let mut p = profile();
        p.full_name = "G".into();
        assert_eq!(validate_investor_profile(&p).unwrap_err().field, "full_name");
    }

    #[test]
    fn investment_must_be_positive() {
        assert!(validate_investment(0).is_err());
        assert!(validate_investment(1).is_ok());
    }
}
