use graphql_parser::query::Value as GqlValue;
use serde_json::{Map, Number, Value};

/// Converts a GraphQL literal into JSON, substituting variables from `variables`.
///
/// Returns `None` only for a top-level variable that was not provided, so callers can
/// treat the argument as absent. Unset variables nested in lists or objects become `null`.
pub fn gql_value_to_json(value: &GqlValue<'_, String>, variables: &Map<String, Value>) -> Option<Value> {
  match value {
    GqlValue::Variable(name) => variables.get(name).cloned(),
    other => Some(gql_literal_to_json(other, variables)),
  }
}

fn gql_literal_to_json(value: &GqlValue<'_, String>, variables: &Map<String, Value>) -> Value {
  match value {
    GqlValue::Null => Value::Null,
    GqlValue::Variable(name) => variables.get(name).cloned().unwrap_or(Value::Null),
    GqlValue::Int(i) => i.as_i64().map(Value::from).unwrap_or(Value::Null),
    GqlValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
    GqlValue::String(s) => Value::String(s.clone()),
    GqlValue::Boolean(b) => Value::Bool(*b),
    GqlValue::Enum(e) => Value::String(e.clone()),
    GqlValue::List(list) => Value::Array(
      list
        .iter()
        .map(|item| gql_literal_to_json(item, variables))
        .collect(),
    ),
    GqlValue::Object(obj) => Value::Object(
      obj
        .iter()
        .map(|(k, v)| (k.clone(), gql_literal_to_json(v, variables)))
        .collect(),
    ),
  }
}

/// Converts a constant literal (no variables in scope), e.g. a schema default value.
pub fn gql_const_to_json(value: &GqlValue<'_, String>) -> Value {
  gql_literal_to_json(value, &Map::new())
}
