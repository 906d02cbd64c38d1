use local_schema_common::graphql::GraphQLResponse;

/// Construction-time failures. These are fatal: no partial engine is built.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
  #[error("Multiple type definitions for type {0}")]
  SchemaConflict(String),
  #[error("Resolver field {field} of type {type_name} does not exist in your local schema")]
  UnknownResolverField { type_name: String, field: String },
}

/// A document that does not match the local type catalogue.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
  #[error("Unknown type \"{0}\".")]
  UnknownType(String),
  #[error("Cannot query type {0}")]
  UnknownRootType(String),
  #[error("Unknown fragment \"{0}\".")]
  UnknownFragment(String),
  #[error("Cannot spread fragment \"{0}\" within itself.")]
  FragmentCycle(String),
  #[error("Cannot query field \"{field}\" on type \"{type_name}\".")]
  UnknownField { field: String, type_name: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
  #[error(
    "Field \"{field}\" argument \"{argument}\" of type \"{argument_type}\" is required, but it was not provided."
  )]
  MissingArgument {
    field: String,
    argument: String,
    argument_type: String,
  },
  #[error(transparent)]
  Validation(#[from] ValidationError),
  #[error("{0}")]
  Resolver(anyhow::Error),
  #[error("Field \"{0}\" returned a stream outside of a subscription operation.")]
  UnexpectedStream(String),
  #[error("Subscription field \"{0}\" did not return a stream.")]
  NotAStream(String),
}

impl From<anyhow::Error> for ExecutionError {
  fn from(error: anyhow::Error) -> Self {
    ExecutionError::Resolver(error)
  }
}

impl From<ExecutionError> for GraphQLResponse {
  fn from(error: ExecutionError) -> Self {
    GraphQLResponse::new_error(&error.to_string())
  }
}

impl From<ValidationError> for GraphQLResponse {
  fn from(error: ValidationError) -> Self {
    GraphQLResponse::new_error(&error.to_string())
  }
}
