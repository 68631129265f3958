//! Local store row types, mapped directly from SQLite rows.
//! Conversion into `ideasync-types` values happens in `queries`.

pub struct SessionRow {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
    pub user_json: String,
}

pub struct InvestorProfileRow {
    pub user_id: String,
    pub full_name: String,
    pub bio: String,
    pub linked_in: String,
    pub investment_focus: String,
    pub minimum_investment: i64,
    pub maximum_investment: i64,
}
