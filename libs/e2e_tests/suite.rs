use std::{cell::RefCell, sync::Once};

use futures::{stream, StreamExt};
use local_schema_common::graphql::{
  parse_graphql_operation, parse_graphql_schema, GraphQLResponse,
};
use local_schema_config::LocalSchemaConfig;
use local_schema_engine::{
  ContextSource, LocalOperation, LocalSchemaLink, LocalSchemaLinkOptions, RemoteResponse,
  RemoteSource, ResponseStream, Resolvers, SchemaError,
};
use local_schema_logger::{config::LoggerConfigFormat, logger_layer::build_logger};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static LOGGER: Once = Once::new();

/// Installs the compact logger once per test binary. Set `RUST_LOG` to see engine logs.
pub fn init_logger() {
  LOGGER.call_once(|| {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "off".to_string());
    if let Ok(layer) = build_logger(&LoggerConfigFormat::Compact, &filter, false) {
      let _ = tracing_subscriber::registry().with(layer).try_init();
    }
  });
}

/// Stands in for the next hop: records every forwarded document and replies with the
/// configured responses, as a single result or as a stream. A silent remote keeps its stream
/// open without ever answering.
#[derive(Default)]
pub struct MockRemote {
  pub forwarded: RefCell<Vec<String>>,
  pub responses: Vec<GraphQLResponse>,
  pub streamed: bool,
  pub silent: bool,
}

impl MockRemote {
  pub fn replying(response: GraphQLResponse) -> Self {
    Self {
      responses: vec![response],
      ..Default::default()
    }
  }

  pub fn streaming(responses: Vec<GraphQLResponse>) -> Self {
    Self {
      responses,
      streamed: true,
      ..Default::default()
    }
  }

  pub fn silent() -> Self {
    Self {
      silent: true,
      ..Default::default()
    }
  }

  pub fn forwarded(&self) -> Vec<String> {
    self.forwarded.borrow().clone()
  }
}

#[async_trait::async_trait(?Send)]
impl RemoteSource for MockRemote {
  async fn execute(&self, operation: LocalOperation) -> RemoteResponse {
    self
      .forwarded
      .borrow_mut()
      .push(normalize(&operation.query.to_string()));

    if self.silent {
      return RemoteResponse::Stream(stream::pending().boxed_local());
    }

    if self.streamed {
      RemoteResponse::Stream(stream::iter(self.responses.clone()).boxed_local())
    } else {
      RemoteResponse::Single(
        self
          .responses
          .first()
          .cloned()
          .unwrap_or_else(GraphQLResponse::empty),
      )
    }
  }
}

pub fn normalize(document: &str) -> String {
  document.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Without a next hop every field is resolved locally.
pub fn local_config() -> LocalSchemaConfig {
  LocalSchemaConfig {
    assume_local: true,
    ..LocalSchemaConfig::default()
  }
}

pub struct TestSuite {
  pub type_defs: Vec<&'static str>,
  pub resolvers: Resolvers,
  pub config: LocalSchemaConfig,
  pub context: Option<ContextSource>,
  pub remote: Option<Arc<MockRemote>>,
}

impl TestSuite {
  pub fn new(type_defs: &'static str, resolvers: Resolvers) -> Self {
    init_logger();

    Self {
      type_defs: vec![type_defs],
      resolvers,
      config: local_config(),
      context: None,
      remote: None,
    }
  }

  /// Delegates through `remote`, so only `@local` fields run in process.
  pub fn with_remote(mut self, remote: Arc<MockRemote>) -> Self {
    self.remote = Some(remote);
    self.config.assume_local = false;
    self
  }

  pub fn with_context(mut self, context: ContextSource) -> Self {
    self.context = Some(context);
    self
  }

  pub fn with_config(mut self, config: LocalSchemaConfig) -> Self {
    self.config = config;
    self
  }

  pub fn build(self) -> Result<(LocalSchemaLink, Option<Arc<MockRemote>>), SchemaError> {
    let type_defs = self
      .type_defs
      .iter()
      .map(|sdl| parse_graphql_schema(sdl).unwrap())
      .collect();

    let link = LocalSchemaLink::new(LocalSchemaLinkOptions {
      type_defs,
      resolvers: self.resolvers,
      context: self.context,
      config: self.config,
    })?;

    Ok((link, self.remote))
  }

  pub fn request(self, query: &str, variables: Value) -> ResponseStream {
    let (link, remote) = self.build().unwrap();
    send(&link, remote, query, variables)
  }

  pub async fn run(self, query: &str, variables: Value) -> Vec<GraphQLResponse> {
    self.request(query, variables).collect().await
  }
}

pub fn send(
  link: &LocalSchemaLink,
  remote: Option<Arc<MockRemote>>,
  query: &str,
  variables: Value,
) -> ResponseStream {
  let operation = LocalOperation::new(Arc::new(parse_graphql_operation(query).unwrap()))
    .with_variables(variables.as_object().cloned().unwrap_or_else(Map::new));

  link.request(
    operation,
    remote.map(|remote| remote as Arc<dyn RemoteSource>),
  )
}
