use std::fmt::Display;

/// Query string for the table API. Filters are ANDed; `or` groups are
/// the only way to express alternatives.
#[derive(Debug, Clone)]
pub struct Query {
    params: Vec<(String, String)>,
}

impl Default for Query {
    fn default() -> Self {
        Self::new()
    }
}

impl Query {
    pub fn new() -> Self {
        Self {
            params: vec![("select".to_string(), "*".to_string())],
        }
    }

    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value)));
        self
    }

    pub fn in_list<T: Display>(mut self, column: &str, values: &[T]) -> Self {
        let joined = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
        self.params.push((column.to_string(), format!("in.({})", joined)));
        self
    }

    /// `column = value` for any of the given pairs.
    pub fn or_eq<T: Display>(mut self, alternatives: &[(&str, T)]) -> Self {
        let joined = alternatives
            .iter()
            .map(|(column, value)| format!("{}.eq.{}", column, value))
            .collect::<Vec<_>>()
            .join(",");
        self.params.push(("or".to_string(), format!("({})", joined)));
        self
    }

    pub fn order(mut self, column: &str, descending: bool) -> Self {
        let direction = if descending { "desc" } else { "asc" };
        self.params.push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn on_conflict(mut self, columns: &[&str]) -> Self {
        self.params.push(("on_conflict".to_string(), columns.join(",")));
        self
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_postgrest_filters() {
        let q = Query::new()
            .eq("founder_id", "abc")
            .in_list("id", &[1, 2])
            .or_eq(&[("sender_id", "u"), ("recipient_id", "u")])
            .order("created_at", true);

        let params: Vec<(&str, &str)> = q.params().iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        assert_eq!(
            params,
            vec![
                ("select", "*"),
                ("founder_id", "eq.abc"),
                ("id", "in.(1,2)"),
                ("or", "(sender_id.eq.u,recipient_id.eq.u)"),
                ("order", "created_at.desc"),
            ]
        );
    }
}
