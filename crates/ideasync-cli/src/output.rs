//! Plain-text rendering of core views for the terminal.

use ideasync_core::founder::FounderCard;
use ideasync_core::investor::SavedView;
use ideasync_core::messaging::{Direction, InboxEntry, InboxView};
use ideasync_core::pages::PageView;
use ideasync_core::{ConfirmOutcome, SessionState, Visit};
use ideasync_types::models::{Company, InvestorProfile};

pub fn whoami(state: &SessionState) {
    match state {
        SessionState::Loading => println!("Session still loading."),
        SessionState::SignedOut => println!("Not signed in."),
        SessionState::SignedIn(user) => println!("{} <{}> ({})", user.name, user.email, user.role),
    }
}

pub fn company(company: &Company) {
    println!("{}  {} [{}]", company.id, company.name, company.sector);
    println!("    {}", company.description);
    if let Some(goal) = company.funding_goal {
        println!("    Funding goal: {}", goal);
    }
    if let Some(deck) = &company.pitch_deck {
        println!("    Pitch deck: {}", deck);
    }
    if let Some(contact) = &company.contact_details {
        println!("    Contact: {}", contact);
    }
}

pub fn companies(companies: &[Company]) {
    if companies.is_empty() {
        println!("No companies found.");
    }
    for c in companies {
        company(c);
    }
}

pub fn saved(view: &SavedView) {
    match view {
        SavedView::Empty(text) => println!("{}", text),
        SavedView::Companies(list) => companies(list),
    }
}

pub fn founders(founders: &[FounderCard]) {
    if founders.is_empty() {
        println!("No founders found in this sector");
    }
    for f in founders {
        println!("{}  {} • {}", f.name, f.company, f.sector);
    }
}

pub fn entry(entry: &InboxEntry) {
    let (marker, label) = match entry.direction {
        Direction::Incoming if !entry.message.read => ("*", "From"),
        Direction::Incoming => (" ", "From"),
        Direction::Outgoing => (" ", "To"),
    };
    println!(
        "{} {}  {}: {}  re {}  {}",
        marker,
        entry.message.id,
        label,
        entry.counterpart_name,
        entry.company_name,
        entry.message.created_at.format("%Y-%m-%d %H:%M"),
    );
    println!("    {}", entry.message.content);
}

pub fn inbox(view: &InboxView) {
    match view {
        InboxView::Empty(text) => println!("{}", text),
        InboxView::Entries(entries) => {
            println!("{} unread", view.unread());
            for e in entries {
                entry(e);
            }
        }
    }
}

pub fn profile(profile: &InvestorProfile) {
    println!("Name:        {}", profile.full_name);
    println!("Bio:         {}", profile.bio);
    println!("LinkedIn:    {}", profile.linked_in);
    println!("Focus:       {}", profile.investment_focus);
    println!("Min ticket:  {}", profile.minimum_investment);
    println!("Max ticket:  {}", profile.maximum_investment);
}

pub fn visit(visit: &Visit) {
    let page = match visit {
        Visit::Wait => return println!("Loading..."),
        Visit::Redirect(route) => return println!("Redirect to {}", route),
        Visit::Page(page) => page,
    };

    match page {
        PageView::Home { user: Some(user) } => println!("Welcome back, {}.", user.name),
        PageView::Home { user: None } => println!("Welcome to ideasync. Sign in or register to get started."),
        PageView::SignIn => println!("Sign in with your email and password."),
        PageView::Register => println!("Create a founder or investor account."),
        PageView::ConfirmEmail(ConfirmOutcome::Verified) => println!("Email verified."),
        PageView::ConfirmEmail(ConfirmOutcome::Failed(reason)) => println!("Verification failed: {}", reason),
        PageView::ConfirmEmail(ConfirmOutcome::Redirect(route)) => println!("Redirect to {}", route),
        PageView::FounderDashboard(dash) => {
            println!("Founder dashboard for {}", dash.user.name);
            println!("\nYour companies");
            companies(&dash.companies);
            println!("\nFounders in your sectors");
            founders(&dash.other_founders);
            println!("\nMessages");
            inbox(&dash.inbox);
        }
        PageView::NewCompany { .. } => println!("New company form."),
        PageView::EditCompany { company_id, draft } => {
            println!("Editing {} ({})", draft.name, company_id);
            println!("    {} [{}]", draft.description, draft.sector);
        }
        PageView::InvestorDashboard(dash) => {
            println!("Investor dashboard for {}", dash.user.name);
            println!("Sectors: {}", dash.sectors.join(", "));
            println!("\nDiscover");
            companies(&dash.companies);
            println!("\nSaved");
            saved(&dash.saved);
            println!("\nProfile");
            profile(&dash.profile);
            println!("\nMessages");
            inbox(&dash.inbox);
        }
        PageView::NotFound { path } => println!("Page not found: {}", path),
    }
}
