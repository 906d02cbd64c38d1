use graphql_parser::{parse_query, parse_schema};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use graphql_parser::query::ParseError;
pub use graphql_parser::schema::ParseError as SchemaParseError;

/// An error with a message and optional extensions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GraphQLError {
  /// The error message.
  pub message: String,
  /// Extensions to the error.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl std::fmt::Display for GraphQLError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl GraphQLError {
  pub fn new(message: &str) -> Self {
    GraphQLError {
      message: message.to_string(),
      extensions: None,
    }
  }
}

pub type ParsedGraphQLDocument = graphql_parser::query::Document<'static, String>;
pub type ParsedGraphQLSchema = graphql_parser::schema::Document<'static, String>;

/// The result envelope handed back to callers: data may be `null` alongside populated errors.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct GraphQLResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<GraphQLError>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Value>,
}

impl GraphQLResponse {
  pub fn new_data(data: Value) -> Self {
    GraphQLResponse {
      data: Some(data),
      errors: None,
      extensions: None,
    }
  }

  /// An empty data object, used as the remote result when nothing was delegated.
  pub fn empty() -> Self {
    Self::new_data(Value::Object(Map::new()))
  }

  pub fn new_error(error: &str) -> Self {
    GraphQLResponse {
      data: None,
      errors: Some(vec![GraphQLError::new(error)]),
      extensions: None,
    }
  }

  pub fn has_errors(&self) -> bool {
    self.errors.as_ref().is_some_and(|errors| !errors.is_empty())
  }
}

pub fn parse_graphql_operation(operation_str: &str) -> Result<ParsedGraphQLDocument, ParseError> {
  parse_query::<String>(operation_str).map(|v| v.into_static())
}

pub fn parse_graphql_schema(schema_str: &str) -> Result<ParsedGraphQLSchema, SchemaParseError> {
  parse_schema::<String>(schema_str).map(|v| v.into_static())
}
