use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const CPF_FIELD: &str = "cpf";

#[derive(Debug, Error, PartialEq)]
pub enum InvalidCustomer {
    #[error("missing cpf field")]
    MissingCpf,
    #[error("cpf must be a string, found {0}")]
    NonStringCpf(Value),
}

/// A customer as stored in the customer collection.
///
/// Only `cpf` is interpreted. The record is kept as the store returned it,
/// field order included, and serialises back out unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct Customer {
    cpf: String,
    fields: Map<String, Value>,
}

impl Customer {
    pub fn new(cpf: impl Into<String>) -> Self {
        let cpf = cpf.into();
        let mut fields = Map::new();
        fields.insert(CPF_FIELD.to_string(), Value::String(cpf.clone()));
        Self { cpf, fields }
    }

    /// Append an attribute. The `cpf` key is fixed by [`Customer::new`] and
    /// is left untouched.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != CPF_FIELD {
            self.fields.insert(key, value.into());
        }
        self
    }

    pub fn cpf(&self) -> &str {
        &self.cpf
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

impl TryFrom<Map<String, Value>> for Customer {
    type Error = InvalidCustomer;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        let cpf = match fields.get(CPF_FIELD) {
            Some(Value::String(cpf)) => cpf.clone(),
            Some(other) => return Err(InvalidCustomer::NonStringCpf(other.clone())),
            None => return Err(InvalidCustomer::MissingCpf),
        };
        Ok(Self { cpf, fields })
    }
}

impl From<Customer> for Map<String, Value> {
    fn from(customer: Customer) -> Self {
        customer.fields
    }
}

/// Mask all but the last two characters of a CPF for log output.
pub fn mask_cpf(cpf: &str) -> String {
    let len = cpf.chars().count();
    cpf.chars()
        .enumerate()
        .map(|(idx, ch)| if idx + 2 < len { '*' } else { ch })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serialises_flat_with_attributes() {
        let customer = Customer::new("12345678900").with_attribute("name", "Ana");
        let value = serde_json::to_value(&customer).unwrap();
        assert_eq!(value, json!({ "cpf": "12345678900", "name": "Ana" }));
    }

    #[test]
    fn field_order_is_kept() {
        let customer: Customer =
            serde_json::from_str(r#"{"zeta":1,"cpf":"1","alpha":2}"#).unwrap();
        assert_eq!(
            serde_json::to_string(&customer).unwrap(),
            r#"{"zeta":1,"cpf":"1","alpha":2}"#
        );
    }

    #[test]
    fn deserialising_requires_a_string_cpf() {
        let customer: Customer =
            serde_json::from_value(json!({ "cpf": "1", "name": "Ana", "age": 31 })).unwrap();
        assert_eq!(customer.cpf(), "1");
        assert_eq!(customer.get("age"), Some(&json!(31)));

        assert!(serde_json::from_value::<Customer>(json!({ "name": "Ana" })).is_err());
        assert_eq!(
            Customer::try_from(json!({ "cpf": 7 }).as_object().cloned().unwrap()),
            Err(InvalidCustomer::NonStringCpf(json!(7)))
        );
    }

    #[test]
    fn cpf_cannot_be_overwritten_by_attribute() {
        let customer = Customer::new("1").with_attribute("cpf", "2");
        assert_eq!(customer.cpf(), "1");
        assert_eq!(customer.get("cpf"), Some(&json!("1")));
    }

    #[test]
    fn masks_all_but_last_two() {
        assert_eq!(mask_cpf("12345678900"), "*********00");
        assert_eq!(mask_cpf("7"), "7");
        assert_eq!(mask_cpf(""), "");
    }
}
