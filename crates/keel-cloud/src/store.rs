use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aws::AwsError;
use crate::executor::{AwsExecutor, RealExecutor, args};

/// A stored row: attribute name → string value.
pub type Attributes = BTreeMap<String, String>;

/// Equality query against a secondary index.
#[derive(Debug, Clone, Copy)]
pub struct IndexQuery<'a> {
    pub index: &'a str,
    pub key: &'a str,
    pub value: &'a str,
    pub limit: usize,
    /// Newest (highest sort key) first.
    pub descending: bool,
}

/// Key-value record store with a secondary index, keyed by `id`.
#[allow(async_fn_in_trait)]
pub trait RecordStore: Send + Sync {
    async fn get(&self, table: &str, id: &str) -> Result<Option<Attributes>, StoreError>;

    async fn put(&self, table: &str, item: &Attributes) -> Result<(), StoreError>;

    async fn query_index(
        &self,
        table: &str,
        query: &IndexQuery<'_>,
    ) -> Result<Vec<Attributes>, StoreError>;
}

/// DynamoDB tables, driven through the aws CLI.
pub struct DynamoTable<E: AwsExecutor = RealExecutor> {
    executor: E,
}

impl DynamoTable<RealExecutor> {
    pub fn new() -> Self {
        Self {
            executor: RealExecutor::default(),
        }
    }
}

impl Default for DynamoTable<RealExecutor> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: AwsExecutor> DynamoTable<E> {
    pub fn with_executor(executor: E) -> Self {
        Self { executor }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum AttributeValue {
    S(String),
    N(String),
}

#[derive(Deserialize)]
struct GetItemOutput {
    #[serde(rename = "Item")]
    item: Option<BTreeMap<String, AttributeValue>>,
}

#[derive(Deserialize)]
struct QueryOutput {
    #[serde(rename = "Items", default)]
    items: Vec<BTreeMap<String, AttributeValue>>,
}

fn decode(item: BTreeMap<String, AttributeValue>) -> Attributes {
    item.into_iter()
        .map(|(k, v)| match v {
            AttributeValue::S(s) | AttributeValue::N(s) => (k, s),
        })
        .collect()
}

fn encode(item: &Attributes) -> BTreeMap<&str, AttributeValue> {
    item.iter()
        .map(|(k, v)| (k.as_str(), AttributeValue::S(v.clone())))
        .collect()
}

fn to_json<T: Serialize>(table: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Encode {
        table: table.to_owned(),
        source: e,
    })
}

impl<E: AwsExecutor> RecordStore for DynamoTable<E> {
    async fn get(&self, table: &str, id: &str) -> Result<Option<Attributes>, StoreError> {
        let key = to_json(table, &BTreeMap::from([("id", AttributeValue::S(id.to_owned()))]))?;

        let output = self
            .executor
            .exec(&args([
                "dynamodb",
                "get-item",
                "--table-name",
                table,
                "--key",
                &key,
                "--consistent-read",
                "--output",
                "json",
            ]))
            .await
            .map_err(|e| StoreError::Aws {
                table: table.to_owned(),
                source: e,
            })?;

        // The CLI prints nothing at all when the key is absent.
        if output.trim().is_empty() {
            return Ok(None);
        }

        let parsed: GetItemOutput =
            serde_json::from_str(&output).map_err(|e| StoreError::Decode {
                table: table.to_owned(),
                source: e,
            })?;

        Ok(parsed.item.map(decode))
    }

    async fn put(&self, table: &str, item: &Attributes) -> Result<(), StoreError> {
        let item = to_json(table, &encode(item))?;

        self.executor
            .exec(&args([
                "dynamodb",
                "put-item",
                "--table-name",
                table,
                "--item",
                &item,
            ]))
            .await
            .map_err(|e| StoreError::Aws {
                table: table.to_owned(),
                source: e,
            })?;

        Ok(())
    }

    async fn query_index(
        &self,
        table: &str,
        query: &IndexQuery<'_>,
    ) -> Result<Vec<Attributes>, StoreError> {
        let names = to_json(table, &BTreeMap::from([("#k", query.key)]))?;
        let values = to_json(
            table,
            &BTreeMap::from([(":v", AttributeValue::S(query.value.to_owned()))]),
        )?;
        let limit = query.limit.to_string();
        let direction = if query.descending {
            "--no-scan-index-forward"
        } else {
            "--scan-index-forward"
        };

        let output = self
            .executor
            .exec(&args([
                "dynamodb",
                "query",
                "--table-name",
                table,
                "--index-name",
                query.index,
                "--key-condition-expression",
                "#k = :v",
                "--expression-attribute-names",
                &names,
                "--expression-attribute-values",
                &values,
                direction,
                "--max-items",
                &limit,
                "--output",
                "json",
            ]))
            .await
            .map_err(|e| StoreError::Aws {
                table: table.to_owned(),
                source: e,
            })?;

        let parsed: QueryOutput =
            serde_json::from_str(&output).map_err(|e| StoreError::Decode {
                table: table.to_owned(),
                source: e,
            })?;

        Ok(parsed.items.into_iter().map(decode).collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record store request against {table} failed")]
    Aws { table: String, source: AwsError },

    #[error("could not decode response from {table}")]
    Decode {
        table: String,
        source: serde_json::Error,
    },

    #[error("could not encode request for {table}")]
    Encode {
        table: String,
        source: serde_json::Error,
    },
}
