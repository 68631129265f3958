mod config;
mod output;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use ideasync_backend::SignUpOutcome;
use ideasync_core::founder::EditAccess;
use ideasync_core::validation::Registration;
use ideasync_core::{ALL_SECTORS, App, AppError, CompanyFilter, ConfirmOutcome};
use ideasync_db::Database;
use ideasync_types::models::{CompanyDraft, Role};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(author, version, about = "Match startup founders with investors")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Repeat of the password; defaults to it
        #[arg(long)]
        confirm_password: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_role)]
        role: Role,
    },
    Signin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Signout,
    /// Show who is signed in
    Whoami,
    /// Follow a confirmation link: pass its fragment (the part after `#`)
    Confirm { fragment: String },
    /// Resolve an app path the way the UI would
    Visit { path: String },
    /// Search listed companies
    Discover {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value = ALL_SECTORS)]
        sector: String,
    },
    Save { company_id: Uuid },
    Unsave { company_id: Uuid },
    Saved,
    Invest { company_id: Uuid, amount: u64 },
    /// Companies you founded
    Companies,
    #[command(subcommand)]
    Company(CompanyCommand),
    /// Founders working in your sectors
    Founders,
    #[command(subcommand)]
    Message(MessageCommand),
    Inbox,
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(clap::Args, Debug)]
struct CompanyFields {
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    sector: Option<String>,
    #[arg(long)]
    funding_goal: Option<u64>,
    #[arg(long)]
    pitch_deck: Option<String>,
    #[arg(long)]
    contact_details: Option<String>,
}

impl CompanyFields {
    fn apply(self, draft: &mut CompanyDraft) {
        if let Some(v) = self.name {
            draft.name = v;
        }
        if let Some(v) = self.description {
            draft.description = v;
        }
        if let Some(v) = self.sector {
            draft.sector = v;
        }
        if self.funding_goal.is_some() {
            draft.funding_goal = self.funding_goal;
        }
        if self.pitch_deck.is_some() {
            draft.pitch_deck = self.pitch_deck;
        }
        if self.contact_details.is_some() {
            draft.contact_details = self.contact_details;
        }
    }
}

#[derive(Subcommand, Debug)]
enum CompanyCommand {
    New(CompanyFields),
    /// Change fields of a company you own; omitted fields keep their value
    Edit {
        id: Uuid,
        #[command(flatten)]
        fields: CompanyFields,
    },
}

#[derive(Subcommand, Debug)]
enum MessageCommand {
    /// Write to the founder of a company
    Send { company_id: Uuid, content: String },
    /// Open a message, marking it read if it was sent to you
    Read { id: Uuid },
    Unread,
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Show,
    /// Update your investor profile draft; omitted fields keep their value
    Set {
        #[arg(long)]
        full_name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        linked_in: Option<String>,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long)]
        min: Option<u64>,
        #[arg(long)]
        max: Option<u64>,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ideasync=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    // Init local store
    let db = Arc::new(Database::open(&settings.db_path)?);

    let mut app = App::connect(&settings.backend, db)?;
    app.start().await;
    let state = app.session.ready().await;
    debug!("Session ready: {:?}", state);

    match run(&app, cli.command).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(app: &App, command: Command) -> Result<(), AppError> {
    match command {
        Command::Register {
            email,
            password,
            confirm_password,
            name,
            role,
        } => {
            let form = Registration {
                email,
                confirm_password: confirm_password.unwrap_or_else(|| password.clone()),
                password,
                name,
                role,
            };
            match app.register(&form).await? {
                SignUpOutcome::SignedIn => output::whoami(&app.session.current()),
                SignUpOutcome::ConfirmationRequired { .. } => {
                    println!("Registration successful. Check {} for a confirmation link.", form.email)
                }
            }
        }
        Command::Signin { email, password } => {
            app.session.login(&email, &password).await?;
            output::whoami(&app.session.current());
        }
        Command::Signout => {
            app.session.logout().await?;
            println!("Signed out.");
        }
        Command::Whoami => output::whoami(&app.session.current()),
        Command::Confirm { fragment } => match app.confirm_email(&fragment).await {
            ConfirmOutcome::Verified => {
                println!("Email verified.");
                output::whoami(&app.session.current());
            }
            ConfirmOutcome::Redirect(route) => println!("Redirecting to {}", route),
            ConfirmOutcome::Failed(reason) => println!("Verification failed: {}", reason),
        },
        Command::Visit { path } => output::visit(&app.visit(&path).await?),
        Command::Discover { search, sector } => {
            let companies = app.investor.discover(&CompanyFilter::new(search, sector)).await?;
            output::companies(&companies);
        }
        Command::Save { company_id } => {
            app.investor.save_company(company_id).await?;
            println!("Saved.");
        }
        Command::Unsave { company_id } => {
            if app.investor.unsave_company(company_id).await? {
                println!("Removed from saved companies.");
            } else {
                println!("That company was not saved.");
            }
        }
        Command::Saved => output::saved(&app.investor.saved_companies().await?),
        Command::Invest { company_id, amount } => {
            let investment = app.investor.invest(company_id, amount).await?;
            println!("Investment of {} recorded ({}).", investment.amount, investment.id);
        }
        Command::Companies => output::companies(&app.founder.my_companies().await?),
        Command::Company(CompanyCommand::New(fields)) => {
            let mut draft = CompanyDraft::default();
            fields.apply(&mut draft);
            let company = app.founder.create_company(&draft).await?;
            println!("Company created.");
            output::company(&company);
        }
        Command::Company(CompanyCommand::Edit { id, fields }) => {
            let mut draft = match app.founder.load_for_edit(id).await? {
                EditAccess::Granted(company) => CompanyDraft::from(&company),
                EditAccess::Denied { redirect, reason } => {
                    println!("{}. Redirecting to {}", reason, redirect);
                    return Ok(());
                }
            };
            fields.apply(&mut draft);
            let company = app.founder.update_company(id, &draft).await?;
            println!("Company updated.");
            output::company(&company);
        }
        Command::Founders => output::founders(&app.founder.other_founders().await?),
        Command::Message(MessageCommand::Send { company_id, content }) => {
            app.messaging.send(company_id, &content).await?;
            println!("Message sent.");
        }
        Command::Message(MessageCommand::Read { id }) => output::entry(&app.messaging.open(id).await?),
        Command::Message(MessageCommand::Unread) => {
            println!("{} unread", app.messaging.unread_count().await?)
        }
        Command::Inbox => output::inbox(&app.messaging.inbox().await?),
        Command::Profile(ProfileCommand::Show) => output::profile(&app.investor.load_profile().await?),
        Command::Profile(ProfileCommand::Set {
            full_name,
            bio,
            linked_in,
            focus,
            min,
            max,
        }) => {
            let mut profile = app.investor.load_profile().await?;
            if let Some(v) = full_name {
                profile.full_name = v;
            }
            if let Some(v) = bio {
                profile.bio = v;
            }
            if let Some(v) = linked_in {
                profile.linked_in = v;
            }
            if let Some(v) = focus {
                profile.investment_focus = v;
            }
            if let Some(v) = min {
                profile.minimum_investment = v;
            }
            if let Some(v) = max {
                profile.maximum_investment = v;
            }
            app.investor.save_profile(&profile).await?;
            println!("Profile saved.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_company_edit_with_partial_fields() {
        let id = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "ideasync",
            "company",
            "edit",
            &id.to_string(),
            "--name",
            "Acme Labs",
        ])
        .unwrap();
        let Command::Company(CompanyCommand::Edit { id: parsed, fields }) = cli.command else {
            panic!("wrong command");
        };
        assert_eq!(parsed, id);

        let mut draft = CompanyDraft {
            name: "Acme".into(),
            sector: "Fintech".into(),
            ..Default::default()
        };
        fields.apply(&mut draft);
        assert_eq!(draft.name, "Acme Labs");
        assert_eq!(draft.sector, "Fintech");
    }

    #[test]
    fn role_flag_is_checked() {
        assert!(Cli::try_parse_from([
            "ideasync", "register", "--email", "a@x.com", "--password", "pw123456", "--name", "Ann", "--role",
            "founder",
        ])
        .is_ok());
        assert!(Cli::try_parse_from([
            "ideasync", "register", "--email", "a@x.com", "--password", "pw123456", "--name", "Ann", "--role",
            "admin",
        ])
        .is_err());
    }
}
