// Copyright (c) Microsoft Corporation. All rights reserved.
// Licensed under the MIT License.

//! Parameterized SQL queries.

use serde::Serialize;

/// A Cosmos DB SQL query with bound parameters.
///
/// Values are always sent as parameters, never spliced into the query text.
///
/// ```rust
/// # use azure_cosmos_rbac_access::Query;
/// let query = Query::from("SELECT * FROM c WHERE c.id = @id AND c.pk = @pk")
///     .with_parameter("@id", "u1")
///     .unwrap()
///     .with_parameter("@pk", "KeyAuth")
///     .unwrap();
/// assert_eq!(query.parameter("@pk"), Some(&serde_json::json!("KeyAuth")));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Query {
    #[serde(rename = "query")]
    text: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<QueryParameter>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct QueryParameter {
    name: String,
    value: serde_json::Value,
}

impl Query {
    /// Binds a parameter. Names include the leading `@`.
    pub fn with_parameter(
        mut self,
        name: impl Into<String>,
        value: impl Serialize,
    ) -> Result<Self, serde_json::Error> {
        self.parameters.push(QueryParameter {
            name: name.into(),
            value: serde_json::to_value(value)?,
        });
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Looks up a bound parameter by name.
    pub fn parameter(&self, name: &str) -> Option<&serde_json::Value> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.value)
    }

    /// The query in the form the Cosmos DB client sends.
    pub(crate) fn to_sdk(&self) -> azure_core::Result<azure_data_cosmos::Query> {
        self.parameters.iter().try_fold(
            azure_data_cosmos::Query::from(self.text.as_str()),
            |query, parameter| query.with_parameter(parameter.name.as_str(), &parameter.value),
        )
    }
}

impl From<&str> for Query {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Self {
            text,
            parameters: Vec::new(),
        }
    }
}

/// What to look for in a partition.
#[derive(Clone, Debug, PartialEq)]
pub enum ItemQuery {
    /// Documents whose `id` equals the value.
    IdEquals(String),

    /// An arbitrary parameterized query.
    Text(Query),
}

impl ItemQuery {
    /// Lowers the query to SQL with parameters.
    pub fn to_query(&self) -> Result<Query, serde_json::Error> {
        match self {
            ItemQuery::IdEquals(id) => {
                Query::from("SELECT * FROM c WHERE c.id = @id").with_parameter("@id", id)
            }
            ItemQuery::Text(query) => Ok(query.clone()),
        }
    }
}

impl From<Query> for ItemQuery {
    fn from(query: Query) -> Self {
        ItemQuery::Text(query)
    }
}

impl From<&str> for ItemQuery {
    fn from(text: &str) -> Self {
        ItemQuery::Text(Query::from(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_parameters() {
        let query = Query::from("SELECT * FROM c WHERE c.id = @id")
            .with_parameter("@id", "x' OR 1=1 --")
            .unwrap();
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "query": "SELECT * FROM c WHERE c.id = @id",
                "parameters": [{ "name": "@id", "value": "x' OR 1=1 --" }]
            })
        );
    }

    #[test]
    fn parameters_are_omitted_when_empty() {
        let json = serde_json::to_value(Query::from("SELECT * FROM c")).unwrap();
        assert_eq!(json, serde_json::json!({ "query": "SELECT * FROM c" }));
    }

    #[test]
    fn id_predicate_binds_the_id() {
        let query = ItemQuery::IdEquals("u1".into()).to_query().unwrap();
        assert_eq!(query.text(), "SELECT * FROM c WHERE c.id = @id");
        assert_eq!(query.parameter("@id"), Some(&serde_json::json!("u1")));
        assert!(!query.text().contains("u1"));
    }

    #[test]
    fn client_query_keeps_text_and_parameters() {
        let query = Query::from("SELECT * FROM c WHERE c.id IN (@id0, @id1)")
            .with_parameter("@id0", "u1")
            .unwrap()
            .with_parameter("@id1", 7)
            .unwrap();
        assert_eq!(
            serde_json::to_value(query.to_sdk().unwrap()).unwrap(),
            serde_json::to_value(&query).unwrap()
        );
    }
}
