use std::{
  collections::HashMap,
  sync::{Arc, RwLock},
};

use futures::{
  future,
  stream::{self, LocalBoxStream, StreamExt},
};
use local_schema_common::{
  ast::OperationKind,
  graphql::{GraphQLResponse, ParsedGraphQLDocument, ParsedGraphQLSchema},
};
use local_schema_config::LocalSchemaConfig;
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::{
  catalogue::{merge_documents, TypeCatalogue},
  clean_result::clean_result,
  document::{split_document_by_directive, split_document_by_operation},
  error::SchemaError,
  executor::Executor,
  introspection::add_schema_resolvers,
  resolvers::{map_resolvers, Resolvers},
  source::{LocalOperation, RemoteResponse, RemoteSource},
  validate::validate,
};

pub type ResponseStream = LocalBoxStream<'static, GraphQLResponse>;

/// Where the execution context handed to resolvers comes from.
#[derive(Clone)]
pub enum ContextSource {
  Value(Value),
  /// Invoked once per local execution.
  Factory(Arc<dyn Fn() -> Value>),
}

impl ContextSource {
  pub fn produce(&self) -> Value {
    match self {
      ContextSource::Value(value) => value.clone(),
      ContextSource::Factory(factory) => factory(),
    }
  }
}

impl std::fmt::Debug for ContextSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ContextSource::Value(value) => f.debug_tuple("Value").field(value).finish(),
      ContextSource::Factory(_) => f.write_str("Factory"),
    }
  }
}

pub struct LocalSchemaLinkOptions {
  pub type_defs: Vec<ParsedGraphQLSchema>,
  pub resolvers: Resolvers,
  pub context: Option<ContextSource>,
  pub config: LocalSchemaConfig,
}

impl LocalSchemaLinkOptions {
  pub fn new(type_defs: Vec<ParsedGraphQLSchema>, resolvers: Resolvers) -> Self {
    Self {
      type_defs,
      resolvers,
      context: None,
      config: LocalSchemaConfig::default(),
    }
  }
}

/// The halves of one incoming document.
#[derive(Debug)]
struct SplitDocuments {
  local: Option<Arc<ParsedGraphQLDocument>>,
  remote: Option<Arc<ParsedGraphQLDocument>>,
  local_subscriptions: Option<Arc<ParsedGraphQLDocument>>,
  local_operations: Option<Arc<ParsedGraphQLDocument>>,
}

impl SplitDocuments {
  fn new(document: &Arc<ParsedGraphQLDocument>, config: &LocalSchemaConfig) -> Self {
    let (local, remote) = if config.assume_local {
      (Some(document.clone()), None)
    } else {
      split_document_by_directive(document, &config.directive)
    };

    let (local_subscriptions, local_operations) = match &local {
      Some(local) => split_document_by_operation(local, OperationKind::Subscription),
      None => (None, None),
    };

    Self {
      local,
      remote,
      local_subscriptions,
      local_operations,
    }
  }
}

type SplitCache = HashMap<usize, (Arc<ParsedGraphQLDocument>, Arc<SplitDocuments>)>;

struct LinkInner {
  executor: Executor,
  config: LocalSchemaConfig,
  context: Option<ContextSource>,
  split_cache: RwLock<SplitCache>,
}

/// Resolves the locally marked part of each document against in-process resolvers and
/// forwards the rest to the next hop.
#[derive(Clone)]
pub struct LocalSchemaLink {
  inner: Arc<LinkInner>,
}

impl LocalSchemaLink {
  /// Merges the schema documents and wraps the resolvers. Fails on conflicting type
  /// definitions and on resolvers for undeclared fields.
  pub fn new(options: LocalSchemaLinkOptions) -> Result<Self, SchemaError> {
    let merged = merge_documents(&options.type_defs)?;
    let catalogue = Arc::new(merged.catalogue);
    let mut resolvers = map_resolvers(options.resolvers, &merged.document, catalogue.clone())?;

    if options.config.introspection {
      add_schema_resolvers(&mut resolvers, &merged.document);
    }

    debug!(
      "local schema link ready, {} object types in catalogue",
      catalogue.len()
    );

    Ok(Self {
      inner: Arc::new(LinkInner {
        executor: Executor::new(Arc::new(resolvers), catalogue),
        config: options.config,
        context: options.context,
        split_cache: RwLock::new(HashMap::new()),
      }),
    })
  }

  pub fn catalogue(&self) -> &TypeCatalogue {
    self.inner.executor.catalogue()
  }

  /// Splits `document`, memoized per document instance for the lifetime of the link.
  fn split(&self, document: &Arc<ParsedGraphQLDocument>) -> Arc<SplitDocuments> {
    let key = Arc::as_ptr(document) as usize;

    match self.inner.split_cache.read() {
      Ok(cache) => {
        if let Some((_, split)) = cache.get(&key) {
          debug!("split cache hit");
          return split.clone();
        }
      }
      Err(err) => error!("split cache is poisoned, recomputing: {}", err),
    }

    let split = Arc::new(SplitDocuments::new(document, &self.inner.config));
    debug!(
      "split document: local={}, remote={}",
      split.local.is_some(),
      split.remote.is_some()
    );

    match self.inner.split_cache.write() {
      Ok(mut cache) => {
        cache.insert(key, (document.clone(), split.clone()));
      }
      Err(err) => error!("split cache is poisoned, not caching: {}", err),
    }

    split
  }

  /// Runs `operation`: documents without local fields go straight to `forward`, otherwise the
  /// remote half is forwarded first and every remote result feeds one local execution. A local
  /// half made only of subscriptions is opened immediately, next to the forwarded remote
  /// responses. The stream ends after the first error response without data.
  #[tracing::instrument(level = "trace", skip_all)]
  pub fn request(
    &self,
    operation: LocalOperation,
    forward: Option<Arc<dyn RemoteSource>>,
  ) -> ResponseStream {
    let split = self.split(&operation.query);

    if split.local.is_none() {
      return match forward {
        Some(forward) => forward_operation(forward, operation),
        None => single(GraphQLResponse::empty()),
      };
    }

    let forwarded = match (forward, &split.remote) {
      (Some(forward), Some(remote)) => {
        let mut remote_operation = operation.clone();
        remote_operation.query = remote.clone();
        Some(forward_operation(forward, remote_operation))
      }
      _ => None,
    };

    let inner = self.inner.clone();
    let LocalOperation {
      variables, context, ..
    } = operation;

    if split.local_operations.is_none() && split.local_subscriptions.is_some() {
      debug!("opening local subscriptions without waiting for the remote half");
      let local = inner.execute_local(split, GraphQLResponse::empty(), variables, context);

      return until_error(match forwarded {
        Some(remote) => stream::select(local, remote).boxed_local(),
        None => local,
      });
    }

    until_error(
      forwarded
        .unwrap_or_else(|| single(GraphQLResponse::empty()))
        .flat_map(move |remote| {
          inner
            .clone()
            .execute_local(split.clone(), remote, variables.clone(), context.clone())
        })
        .boxed_local(),
    )
  }
}

impl LinkInner {
  fn execute_local(
    self: Arc<Self>,
    split: Arc<SplitDocuments>,
    remote: GraphQLResponse,
    variables: Map<String, Value>,
    context: Option<Value>,
  ) -> ResponseStream {
    stream::once(async move {
      if self.config.validate_query {
        if let Err(err) = validate(split.local.as_deref(), self.executor.catalogue()) {
          error!("local document failed validation: {}", err);
          return single(err.into());
        }
      }

      let context = context
        .or_else(|| self.context.as_ref().map(ContextSource::produce))
        .unwrap_or(Value::Null);
      let root = remote
        .data
        .unwrap_or_else(|| Value::Object(Map::new()));
      let mut responses = Vec::new();

      if let Some(document) = &split.local_operations {
        match self
          .executor
          .execute(document, root.clone(), &variables, &context)
          .await
        {
          Ok(data) => {
            let mut response = GraphQLResponse::new_data(clean_result(&data, Some(document)));
            response.errors = remote.errors.clone();
            responses.push(single(response));
          }
          Err(err) => {
            error!("local execution failed: {}", err);
            return single(err.into());
          }
        }
      }

      if let Some(document) = split.local_subscriptions.clone() {
        match self
          .executor
          .subscribe(&document, root, &variables, &context)
          .await
        {
          Ok(payloads) => responses.push(
            payloads
              .map(move |payload| match payload {
                Ok(data) => GraphQLResponse::new_data(clean_result(&data, Some(&document))),
                Err(err) => {
                  error!("subscription failed: {}", err);
                  err.into()
                }
              })
              .boxed_local(),
          ),
          Err(err) => {
            error!("subscription setup failed: {}", err);
            responses.push(single(err.into()));
          }
        }
      }

      stream::iter(responses).flatten().boxed_local()
    })
    .flatten()
    .boxed_local()
  }
}

/// Passes responses through up to and including the first one carrying errors but no data.
fn until_error(responses: ResponseStream) -> ResponseStream {
  responses
    .scan(false, |ended, response| {
      if *ended {
        return future::ready(None);
      }
      *ended = response.data.is_none() && response.has_errors();
      future::ready(Some(response))
    })
    .boxed_local()
}

fn single(response: GraphQLResponse) -> ResponseStream {
  stream::once(future::ready(response)).boxed_local()
}

fn forward_operation(forward: Arc<dyn RemoteSource>, operation: LocalOperation) -> ResponseStream {
  stream::once(async move { forward.execute(operation).await })
    .flat_map(|response| match response {
      RemoteResponse::Single(response) => single(response),
      RemoteResponse::Stream(responses) => responses,
    })
    .boxed_local()
}
