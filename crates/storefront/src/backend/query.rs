//! Row filters for table requests.

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Equality filters, ordering and limit for a table request.
///
/// Mirrors the subset of PostgREST query syntax the storefront uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    filters: Vec<(String, String)>,
    order: Option<(String, Order)>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep rows where `column` equals `value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.filters.push((column.to_owned(), value.to_string()));
        self
    }

    #[must_use]
    pub fn order_asc(mut self, column: &str) -> Self {
        self.order = Some((column.to_owned(), Order::Asc));
        self
    }

    #[must_use]
    pub fn order_desc(mut self, column: &str) -> Self {
        self.order = Some((column.to_owned(), Order::Desc));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn filters(&self) -> &[(String, String)] {
        &self.filters
    }

    #[must_use]
    pub fn ordering(&self) -> Option<(&str, Order)> {
        self.order.as_ref().map(|(c, o)| (c.as_str(), *o))
    }

    #[must_use]
    pub const fn max_rows(&self) -> Option<usize> {
        self.limit
    }

    /// Query-string pairs in PostgREST syntax.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), format!("eq.{value}")))
            .collect();

        if let Some((column, order)) = &self.order {
            let direction = match order {
                Order::Asc => "asc",
                Order::Desc => "desc",
            };
            pairs.push(("order".to_owned(), format!("{column}.{direction}")));
        }

        if let Some(limit) = self.limit {
            pairs.push(("limit".to_owned(), limit.to_string()));
        }

        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pairs() {
        let query = Query::new()
            .eq("user_id", "u-1")
            .order_desc("created_at")
            .limit(10);

        assert_eq!(
            query.to_pairs(),
            vec![
                ("user_id".to_owned(), "eq.u-1".to_owned()),
                ("order".to_owned(), "created_at.desc".to_owned()),
                ("limit".to_owned(), "10".to_owned()),
            ]
        );
    }

    #[test]
    fn test_empty_query_has_no_pairs() {
        assert!(Query::new().to_pairs().is_empty());
    }
}
