use chrono::{TimeZone, Utc};
use ideasync_db::Database;
use ideasync_types::api::{AuthUser, Session, UserMetadata};
use ideasync_types::models::InvestorProfile;
use uuid::Uuid;

fn session(token: &str) -> Session {
    Session {
        access_token: token.to_string(),
        refresh_token: format!("{token}-refresh"),
        expires_at: Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap(),
        user: AuthUser {
            id: Uuid::new_v4(),
            email: Some("a@x.com".into()),
            user_metadata: UserMetadata {
                name: Some("Ann".into()),
                role: Some("founder".into()),
            },
            email_confirmed_at: None,
        },
    }
}

#[test]
fn session_cache_keeps_only_latest() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.load_session().unwrap().is_none());

    let first = session("first");
    db.store_session(&first).unwrap();
    let second = session("second");
    db.store_session(&second).unwrap();

    let loaded = db.load_session().unwrap().unwrap();
    assert_eq!(loaded, second);

    db.clear_session().unwrap();
    assert!(db.load_session().unwrap().is_none());
    // Clearing twice is harmless
    db.clear_session().unwrap();
}

#[test]
fn corrupt_session_row_is_discarded() {
    let db = Database::open_in_memory().unwrap();
    db.store_session(&session("ok")).unwrap();
    db.with_conn(|conn| {
        conn.execute("UPDATE session_cache SET user_json = 'not json'", [])?;
        Ok(())
    })
    .unwrap();

    assert!(db.load_session().unwrap().is_none());
    let remaining: i64 = db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM session_cache", [], |r| r.get(0))?))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn investor_profile_draft_is_per_user() {
    let db = Database::open_in_memory().unwrap();
    let ann = Uuid::new_v4();
    let bob = Uuid::new_v4();

    let mut profile = InvestorProfile::defaults_for("Ann");
    profile.bio = "Angel investor in climate tech".into();
    profile.investment_focus = "Seed climate".into();
    db.save_investor_profile(ann, &profile).unwrap();

    assert_eq!(db.load_investor_profile(ann).unwrap(), Some(profile.clone()));
    assert!(db.load_investor_profile(bob).unwrap().is_none());

    profile.maximum_investment = 250_000;
    db.save_investor_profile(ann, &profile).unwrap();
    assert_eq!(
        db.load_investor_profile(ann).unwrap().unwrap().maximum_investment,
        250_000
    );
}

#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ideasync.db");

    let cached = session("persisted");
    {
        let db = Database::open(&path).unwrap();
        db.store_session(&cached).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let loaded = db.load_session().unwrap().unwrap();
    assert_eq!(loaded.access_token, "persisted");
    assert_eq!(loaded.expires_at, cached.expires_at);
}
