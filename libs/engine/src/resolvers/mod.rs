use std::{collections::HashMap, future::Future, sync::Arc};

use futures::{
  future::{FutureExt, LocalBoxFuture},
  stream::LocalBoxStream,
};
use serde_json::{Map, Value};

use crate::document::selection::{FragmentMap, ParsedField};

mod mapper;

pub use mapper::map_resolvers;

/// Elements produced by a subscription source. An `Err` ends the stream.
pub type ValueStream = LocalBoxStream<'static, anyhow::Result<Value>>;

type ResolverFn = dyn Fn(ResolverParams) -> LocalBoxFuture<'static, anyhow::Result<ResolverOutput>>;
type SubscribeFn =
  dyn Fn(ResolverParams) -> LocalBoxFuture<'static, anyhow::Result<Option<ValueStream>>>;
type ResolveFn = dyn Fn(Value, ResolverParams) -> LocalBoxFuture<'static, anyhow::Result<Value>>;
pub type ScalarParser = Arc<dyn Fn(&Value) -> anyhow::Result<Value>>;

/// Query introspection info handed to every resolver call.
#[derive(Debug, Clone)]
pub struct ResolverInfo {
  pub parent_type: String,
  pub field: Arc<ParsedField>,
  pub fragment_map: Arc<FragmentMap>,
}

impl ResolverInfo {
  pub fn field_name(&self) -> &str {
    &self.field.name
  }
}

#[derive(Debug, Clone)]
pub struct ResolverParams {
  pub root: Value,
  pub args: Map<String, Value>,
  pub context: Value,
  pub info: ResolverInfo,
}

impl ResolverParams {
  pub fn arg(&self, name: &str) -> Option<&Value> {
    self.args.get(name)
  }
}

/// What a resolver call produced.
pub enum ResolverOutput {
  Value(Value),
  /// A long-lived producer, adapted into `Stream` by the resolver wrapper.
  Subscription(SubscriptionResolver),
  /// Field-keyed payloads of an adapted subscription.
  Stream(ValueStream),
}

impl From<Value> for ResolverOutput {
  fn from(value: Value) -> Self {
    ResolverOutput::Value(value)
  }
}

impl From<SubscriptionResolver> for ResolverOutput {
  fn from(resolver: SubscriptionResolver) -> Self {
    ResolverOutput::Subscription(resolver)
  }
}

impl std::fmt::Debug for ResolverOutput {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      ResolverOutput::Value(value) => f.debug_tuple("Value").field(value).finish(),
      ResolverOutput::Subscription(_) => f.write_str("Subscription"),
      ResolverOutput::Stream(_) => f.write_str("Stream"),
    }
  }
}

#[derive(Clone)]
pub struct FieldResolver {
  inner: Arc<ResolverFn>,
}

impl FieldResolver {
  pub fn new<F, Fut>(resolver: F) -> Self
  where
    F: Fn(ResolverParams) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<ResolverOutput>> + 'static,
  {
    Self {
      inner: Arc::new(move |params| resolver(params).boxed_local()),
    }
  }

  /// A resolver that computes its value synchronously.
  pub fn sync<F>(resolver: F) -> Self
  where
    F: Fn(ResolverParams) -> anyhow::Result<Value> + 'static,
  {
    Self {
      inner: Arc::new(move |params| {
        futures::future::ready(resolver(params).map(ResolverOutput::Value)).boxed_local()
      }),
    }
  }

  pub fn call(&self, params: ResolverParams) -> LocalBoxFuture<'static, anyhow::Result<ResolverOutput>> {
    (self.inner)(params)
  }
}

impl std::fmt::Debug for FieldResolver {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("FieldResolver")
  }
}

/// A `subscribe` source paired with an optional per-element `resolve` transform.
#[derive(Clone)]
pub struct SubscriptionResolver {
  subscribe: Arc<SubscribeFn>,
  resolve: Option<Arc<ResolveFn>>,
}

impl SubscriptionResolver {
  /// `subscribe` may yield `None`, which completes the subscription without data.
  pub fn new<F, Fut>(subscribe: F) -> Self
  where
    F: Fn(ResolverParams) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<Option<ValueStream>>> + 'static,
  {
    Self {
      subscribe: Arc::new(move |params| subscribe(params).boxed_local()),
      resolve: None,
    }
  }

  pub fn with_resolve<F, Fut>(mut self, resolve: F) -> Self
  where
    F: Fn(Value, ResolverParams) -> Fut + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + 'static,
  {
    self.resolve = Some(Arc::new(move |value, params| resolve(value, params).boxed_local()));
    self
  }

  pub fn subscribe(
    &self,
    params: ResolverParams,
  ) -> LocalBoxFuture<'static, anyhow::Result<Option<ValueStream>>> {
    (self.subscribe)(params)
  }

  /// Applies `resolve`, or passes the element through when there is none.
  pub fn transform(
    &self,
    value: Value,
    params: ResolverParams,
  ) -> LocalBoxFuture<'static, anyhow::Result<Value>> {
    match &self.resolve {
      Some(resolve) => resolve(value, params),
      None => futures::future::ready(Ok(value)).boxed_local(),
    }
  }
}

/// Type name to field name to resolver, plus parse functions for custom scalars.
#[derive(Clone, Default)]
pub struct Resolvers {
  pub(crate) types: HashMap<String, HashMap<String, FieldResolver>>,
  pub(crate) scalars: HashMap<String, ScalarParser>,
}

impl Resolvers {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn field(
    mut self,
    type_name: impl Into<String>,
    field_name: impl Into<String>,
    resolver: FieldResolver,
  ) -> Self {
    self.insert(type_name, field_name, resolver);
    self
  }

  pub fn scalar<F>(mut self, scalar_name: impl Into<String>, parse: F) -> Self
  where
    F: Fn(&Value) -> anyhow::Result<Value> + 'static,
  {
    self.scalars.insert(scalar_name.into(), Arc::new(parse));
    self
  }

  pub fn insert(
    &mut self,
    type_name: impl Into<String>,
    field_name: impl Into<String>,
    resolver: FieldResolver,
  ) -> Option<FieldResolver> {
    self
      .types
      .entry(type_name.into())
      .or_default()
      .insert(field_name.into(), resolver)
  }

  /// Inserts only when the slot is empty. Returns whether the resolver was added.
  pub fn insert_if_absent(
    &mut self,
    type_name: &str,
    field_name: &str,
    resolver: FieldResolver,
  ) -> bool {
    let fields = self.types.entry(type_name.to_string()).or_default();
    if fields.contains_key(field_name) {
      return false;
    }
    fields.insert(field_name.to_string(), resolver);
    true
  }

  pub fn get(&self, type_name: &str, field_name: &str) -> Option<&FieldResolver> {
    self
      .types
      .get(type_name)
      .and_then(|fields| fields.get(field_name))
  }

  pub fn contains(&self, type_name: &str, field_name: &str) -> bool {
    self.get(type_name, field_name).is_some()
  }
}

impl std::fmt::Debug for Resolvers {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Resolvers")
      .field(
        "types",
        &self
          .types
          .iter()
          .map(|(name, fields)| (name, fields.keys().collect::<Vec<_>>()))
          .collect::<HashMap<_, _>>(),
      )
      .field("scalars", &self.scalars.keys().collect::<Vec<_>>())
      .finish()
  }
}
