use std::collections::HashMap;

use async_trait::async_trait;
use chrono::SecondsFormat;
use bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::customer::Customer;

pub const DEFAULT_DATABASE: &str = "test";
pub const DEFAULT_COLLECTION: &str = "clientes";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0}")]
    Driver(String),
    #[error("stored customer is malformed: {0}")]
    Decode(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(error: mongodb::error::Error) -> Self {
        StoreError::Driver(error.to_string())
    }
}

/// Read access to the customer collection.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Look up the single customer registered under `cpf`.
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError>;
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub uri: String,
    /// Overrides the database named in the connection string.
    pub database: Option<String>,
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            database: None,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }
}

/// Customer store backed by a MongoDB collection.
///
/// The driver connects lazily, so building the store does not touch the network.
#[derive(Clone)]
pub struct MongoCustomerStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
}

impl MongoCustomerStore {
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        let database = config
            .database
            .clone()
            .or_else(|| options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        options.app_name.get_or_insert_with(|| crate::SERVICE_NAME.to_string());

        let client = Client::with_options(options)?;
        let collection = client
            .database(&database)
            .collection::<Document>(&config.collection);

        Ok(Self {
            client,
            database,
            collection,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for MongoCustomerStore {
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError> {
        let document = self.collection.find_one(doc! { "cpf": cpf }, None).await?;
        document.map(customer_from_document).transpose()
    }
}

/// Convert a stored document into a [`Customer`].
///
/// Rendered the way the document is serialised for API clients: object ids
/// become hex strings and dates ISO 8601 strings at any depth. Everything else
/// uses relaxed extended JSON.
pub fn customer_from_document(document: Document) -> Result<Customer, StoreError> {
    let fields: Map<String, Value> = document
        .into_iter()
        .map(|(key, value)| (key, render_bson(value)))
        .collect();
    Customer::try_from(fields).map_err(|err| StoreError::Decode(err.to_string()))
}

fn render_bson(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(at) => {
            Value::String(at.to_chrono().to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        Bson::Document(document) => Value::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, render_bson(value)))
                .collect(),
        ),
        Bson::Array(items) => Value::Array(items.into_iter().map(render_bson).collect()),
        other => other.into_relaxed_extjson(),
    }
}

/// In-process customer store.
#[derive(Debug, Default)]
pub struct MemoryCustomerStore {
    customers: RwLock<HashMap<String, Customer>>,
}

impl MemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let customers = customers
            .into_iter()
            .map(|customer| (customer.cpf().to_string(), customer))
            .collect();
        Self {
            customers: RwLock::new(customers),
        }
    }

    pub async fn insert(&self, customer: Customer) {
        self.customers
            .write()
            .await
            .insert(customer.cpf().to_string(), customer);
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn find_by_cpf(&self, cpf: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.customers.read().await.get(cpf).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use bson::DateTime;
    use serde_json::json;

    #[test]
    fn document_ids_become_hex_strings() {
        let id = ObjectId::new();
        let document = doc! { "_id": id, "cpf": "12345678900", "name": "Ana", "age": 31 };

        let customer = customer_from_document(document).expect("customer");
        assert_eq!(customer.cpf(), "12345678900");
        assert_eq!(customer.get("_id"), Some(&json!(id.to_hex())));
        assert_eq!(customer.get("name"), Some(&json!("Ana")));
        assert_eq!(customer.get("age"), Some(&json!(31)));
    }

    #[test]
    fn nested_ids_and_dates_are_rendered_as_strings() {
        let reference = ObjectId::new();
        let tag = ObjectId::new();
        let document = doc! {
            "cpf": "1",
            "createdAt": DateTime::from_millis(1_700_000_000_000),
            "address": { "ref": reference, "since": DateTime::from_millis(1_700_000_000_123) },
            "tags": [tag, { "id": tag }],
            "score": 1.5,
        };

        let customer = customer_from_document(document).expect("customer");

        assert_eq!(
            customer.get("createdAt"),
            Some(&json!("2023-11-14T22:13:20.000Z"))
        );
        assert_eq!(
            customer.get("address"),
            Some(&json!({ "ref": reference.to_hex(), "since": "2023-11-14T22:13:20.123Z" }))
        );
        assert_eq!(
            customer.get("tags"),
            Some(&json!([tag.to_hex(), { "id": tag.to_hex() }]))
        );
        assert_eq!(customer.get("score"), Some(&json!(1.5)));
    }

    #[test]
    fn document_field_order_is_kept() {
        let id = ObjectId::new();
        let document = doc! { "_id": id, "cpf": "1", "zeta": 1, "alpha": 2 };

        let customer = customer_from_document(document).expect("customer");

        let keys: Vec<&str> = customer.fields().keys().map(String::as_str).collect();
        assert_eq!(keys, ["_id", "cpf", "zeta", "alpha"]);
    }

    #[test]
    fn document_without_string_cpf_is_rejected() {
        let err = customer_from_document(doc! { "name": "Ana" }).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        let err = customer_from_document(doc! { "cpf": 123 }).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[tokio::test]
    async fn memory_store_matches_exact_cpf() {
        let store = MemoryCustomerStore::with_customers([Customer::new("111")]);
        store.insert(Customer::new("222")).await;

        assert!(store.find_by_cpf("111").await.unwrap().is_some());
        assert!(store.find_by_cpf("222").await.unwrap().is_some());
        assert!(store.find_by_cpf("11").await.unwrap().is_none());
    }
}
