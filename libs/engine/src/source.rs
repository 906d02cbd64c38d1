use std::sync::Arc;

use futures::stream::LocalBoxStream;
use local_schema_common::graphql::{GraphQLResponse, ParsedGraphQLDocument};
use serde_json::{Map, Value};

/// A request travelling through the link: the document, its variables and an optional
/// per-request execution context.
#[derive(Debug, Clone)]
pub struct LocalOperation {
  pub query: Arc<ParsedGraphQLDocument>,
  pub variables: Map<String, Value>,
  pub context: Option<Value>,
}

impl LocalOperation {
  pub fn new(query: Arc<ParsedGraphQLDocument>) -> Self {
    Self {
      query,
      variables: Map::new(),
      context: None,
    }
  }

  pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
    self.variables = variables;
    self
  }

  pub fn with_context(mut self, context: Value) -> Self {
    self.context = Some(context);
    self
  }
}

pub enum RemoteResponse {
  Single(GraphQLResponse),
  Stream(LocalBoxStream<'static, GraphQLResponse>),
}

impl From<GraphQLResponse> for RemoteResponse {
  fn from(response: GraphQLResponse) -> Self {
    RemoteResponse::Single(response)
  }
}

/// The next hop that executes whatever part of a document is not resolved locally.
#[async_trait::async_trait(?Send)]
pub trait RemoteSource {
  async fn execute(&self, operation: LocalOperation) -> RemoteResponse;
}
