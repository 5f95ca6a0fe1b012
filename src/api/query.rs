//! Encoded-query builder for `sysparm_query`
//!
//! Segments are emitted as `^<field><op><value>` followed by
//! `^ORDERBY<field>`, in insertion order. Nothing is escaped here; the
//! transport escapes the whole string as a query parameter value.

/// One filter condition. The operator is passed through as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub field: String,
    pub operator: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryEncoder {
    predicates: Vec<Predicate>,
    sorts: Vec<String>,
}

impl QueryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality predicate (`field=value`)
    pub fn add_predicate(
        &mut self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.add_predicate_with_operator(field, "=", value)
    }

    pub fn add_predicate_with_operator(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut Self {
        self.predicates.push(Predicate {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    /// Ascending sort key; repeated calls add further keys
    pub fn add_sort(&mut self, field: impl Into<String>) -> &mut Self {
        self.sorts.push(field.into());
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn sorts(&self) -> &[String] {
        &self.sorts
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.sorts.is_empty()
    }

    pub fn encode(&self) -> String {
        let mut encoded = String::new();
        for p in &self.predicates {
            encoded.push('^');
            encoded.push_str(&p.field);
            encoded.push_str(&p.operator);
            encoded.push_str(&p.value);
        }
        for field in &self.sorts {
            encoded.push_str("^ORDERBY");
            encoded.push_str(field);
        }
        encoded
    }
}
