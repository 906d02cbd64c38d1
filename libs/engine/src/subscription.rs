use std::{
  pin::Pin,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
  task::{Context, Poll},
};

use futures::{future::LocalBoxFuture, FutureExt, Stream, StreamExt};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
  annotate::add_typenames,
  catalogue::{ObjectTypeDefinition, TypeCatalogue},
  resolvers::{ResolverParams, SubscriptionResolver, ValueStream},
};

/// Shared stop flag between a subscription stream and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub(crate) struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

/// Annotation target for emitted elements.
#[derive(Clone)]
pub struct SubscriptionTarget {
  pub object_type: ObjectTypeDefinition,
  pub catalogue: Arc<TypeCatalogue>,
}

enum AdapterState {
  Idle(LocalBoxFuture<'static, anyhow::Result<Option<ValueStream>>>),
  Pulling {
    source: ValueStream,
    in_flight: Option<LocalBoxFuture<'static, anyhow::Result<Value>>>,
  },
  Cancelled,
  Completed,
  Errored,
}

enum Step {
  Pending,
  Again,
  Continue(AdapterState),
  Emit(Value),
  Fail(anyhow::Error),
  Done(AdapterState),
}

/// Turns a pull-based subscription source into a stream of `{ fieldName: value }` payloads.
/// The token is checked before every emission: once cancelled, the source is dropped together
/// with any in-flight transform and nothing else is pulled.
pub struct SubscriptionStream {
  field_name: String,
  resolver: SubscriptionResolver,
  params: ResolverParams,
  target: Option<SubscriptionTarget>,
  token: CancellationToken,
  state: AdapterState,
}

impl SubscriptionStream {
  pub fn new(
    field_name: impl Into<String>,
    resolver: SubscriptionResolver,
    params: ResolverParams,
    target: Option<SubscriptionTarget>,
  ) -> Self {
    let setup = resolver.subscribe(params.clone());

    Self {
      field_name: field_name.into(),
      resolver,
      params,
      target,
      token: CancellationToken::new(),
      state: AdapterState::Idle(setup),
    }
  }

  pub(crate) fn cancellation_token(&self) -> CancellationToken {
    self.token.clone()
  }

  fn payload(&self, value: Value) -> Value {
    let value = match &self.target {
      Some(target) => add_typenames(
        &self.params.info.field,
        &self.params.info.fragment_map,
        &target.object_type,
        &target.catalogue,
        value,
      ),
      None => value,
    };

    let mut payload = Map::new();
    payload.insert(self.field_name.clone(), value);
    Value::Object(payload)
  }

  fn step(&mut self, cx: &mut Context<'_>) -> Step {
    match &mut self.state {
      AdapterState::Idle(setup) => match setup.poll_unpin(cx) {
        Poll::Pending => Step::Pending,
        Poll::Ready(Ok(Some(source))) => Step::Continue(AdapterState::Pulling {
          source,
          in_flight: None,
        }),
        Poll::Ready(Ok(None)) => {
          debug!("subscription \"{}\" resolved without a source", self.field_name);
          Step::Done(AdapterState::Completed)
        }
        Poll::Ready(Err(error)) => Step::Fail(error),
      },
      AdapterState::Pulling { source, in_flight } => {
        if let Some(transform) = in_flight {
          return match transform.poll_unpin(cx) {
            Poll::Pending => Step::Pending,
            Poll::Ready(Ok(value)) => {
              *in_flight = None;
              Step::Emit(value)
            }
            Poll::Ready(Err(error)) => Step::Fail(error),
          };
        }

        match source.poll_next_unpin(cx) {
          Poll::Pending => Step::Pending,
          Poll::Ready(None) => Step::Done(AdapterState::Completed),
          Poll::Ready(Some(Err(error))) => Step::Fail(error),
          Poll::Ready(Some(Ok(Value::Null))) => Step::Again,
          Poll::Ready(Some(Ok(value))) => {
            *in_flight = Some(self.resolver.transform(value, self.params.clone()));
            Step::Again
          }
        }
      }
      AdapterState::Cancelled | AdapterState::Completed | AdapterState::Errored => {
        Step::Done(AdapterState::Completed)
      }
    }
  }
}

impl Stream for SubscriptionStream {
  type Item = anyhow::Result<Value>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();

    loop {
      if this.token.is_cancelled() {
        if !matches!(this.state, AdapterState::Cancelled) {
          debug!("subscription \"{}\" cancelled", this.field_name);
          this.state = AdapterState::Cancelled;
        }
        return Poll::Ready(None);
      }

      if matches!(
        this.state,
        AdapterState::Cancelled | AdapterState::Completed | AdapterState::Errored
      ) {
        return Poll::Ready(None);
      }

      match this.step(cx) {
        Step::Pending => return Poll::Pending,
        Step::Again => {}
        Step::Continue(state) => this.state = state,
        Step::Emit(value) => {
          if this.token.is_cancelled() {
            continue;
          }
          return Poll::Ready(Some(Ok(this.payload(value))));
        }
        Step::Fail(error) => {
          this.state = AdapterState::Errored;
          return Poll::Ready(Some(Err(error)));
        }
        Step::Done(state) => {
          this.state = state;
          return Poll::Ready(None);
        }
      }
    }
  }
}

impl Drop for SubscriptionStream {
  fn drop(&mut self) {
    self.token.cancel();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalogue::merge_documents,
    document::selection::{FragmentMap, ParsedField},
    resolvers::ResolverInfo,
  };
  use futures::stream;
  use local_schema_common::graphql::{parse_graphql_operation, parse_graphql_schema};
  use graphql_parser::query::{Definition, OperationDefinition, Selection};
  use serde_json::json;
  use std::{cell::Cell, rc::Rc};

  fn params(query: &str) -> ResolverParams {
    let document = parse_graphql_operation(query).unwrap();
    let field: ParsedField = match &document.definitions[0] {
      Definition::Operation(OperationDefinition::Subscription(subscription)) => {
        match &subscription.selection_set.items[0] {
          Selection::Field(field) => field.clone(),
          _ => unreachable!(),
        }
      }
      _ => unreachable!(),
    };

    ResolverParams {
      root: json!({}),
      args: Map::new(),
      context: Value::Null,
      info: ResolverInfo {
        parent_type: "Subscription".to_string(),
        field: Arc::new(field),
        fragment_map: Arc::new(FragmentMap::new()),
      },
    }
  }

  fn counting_source(values: Vec<Value>, pulls: Rc<Cell<usize>>) -> ValueStream {
    stream::iter(values)
      .map(move |value| {
        pulls.set(pulls.get() + 1);
        Ok(value)
      })
      .boxed_local()
  }

  fn target() -> SubscriptionTarget {
    let merged = merge_documents(&[parse_graphql_schema(
      "type Subscription { ticks: Tick } type Tick { n: Int }",
    )
    .unwrap()])
    .unwrap();

    SubscriptionTarget {
      object_type: merged.catalogue.get("Tick").unwrap().clone(),
      catalogue: Arc::new(merged.catalogue),
    }
  }

  #[tokio::test]
  async fn emits_annotated_field_keyed_payloads() {
    let pulls = Rc::new(Cell::new(0));
    let source_pulls = pulls.clone();
    let resolver = SubscriptionResolver::new(move |_| {
      let source = counting_source(
        vec![json!({ "n": 1 }), Value::Null, json!({ "n": 2 })],
        source_pulls.clone(),
      );
      async move { anyhow::Ok(Some(source)) }
    });

    let values = SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), Some(target()))
      .collect::<Vec<_>>()
      .await
      .into_iter()
      .map(|item| item.unwrap())
      .collect::<Vec<_>>();

    assert_eq!(
      values,
      vec![
        json!({ "ticks": { "__typename": "Tick", "n": 1 } }),
        json!({ "ticks": { "__typename": "Tick", "n": 2 } })
      ]
    );
    assert_eq!(pulls.get(), 3);
  }

  #[tokio::test]
  async fn applies_resolve_transform() {
    let resolver = SubscriptionResolver::new(|_| async {
      Ok(Some(stream::iter(vec![Ok::<_, anyhow::Error>(json!(1)), Ok(json!(2))]).boxed_local()))
    })
    .with_resolve(|value, _| async move { Ok(json!({ "n": value.as_i64().unwrap_or(0) * 10 })) });

    let values = SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), None)
      .map(|item| item.unwrap())
      .collect::<Vec<_>>()
      .await;

    assert_eq!(
      values,
      vec![json!({ "ticks": { "n": 10 } }), json!({ "ticks": { "n": 20 } })]
    );
  }

  #[tokio::test]
  async fn cancellation_stops_pulling() {
    let pulls = Rc::new(Cell::new(0));
    let source_pulls = pulls.clone();
    let resolver = SubscriptionResolver::new(move |_| {
      let source = counting_source(
        vec![json!({ "n": 1 }), json!({ "n": 2 }), json!({ "n": 3 })],
        source_pulls.clone(),
      );
      async move { anyhow::Ok(Some(source)) }
    });

    let mut stream =
      SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), None);
    let token = stream.cancellation_token();

    assert_eq!(stream.next().await.unwrap().unwrap(), json!({ "ticks": { "n": 1 } }));
    assert_eq!(stream.next().await.unwrap().unwrap(), json!({ "ticks": { "n": 2 } }));

    token.cancel();

    assert!(stream.next().await.is_none());
    assert!(stream.next().await.is_none());
    assert_eq!(pulls.get(), 2);
  }

  #[test]
  fn dropping_the_stream_cancels_it() {
    let resolver = SubscriptionResolver::new(|_| async { anyhow::Ok(None) });
    let stream =
      SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), None);
    let token = stream.cancellation_token();

    assert!(!token.is_cancelled());
    drop(stream);
    assert!(token.is_cancelled());
  }

  #[tokio::test]
  async fn missing_source_completes_silently() {
    let resolver = SubscriptionResolver::new(|_| async { anyhow::Ok(None) });

    let mut stream =
      SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), None);

    assert!(stream.next().await.is_none());
  }

  #[tokio::test]
  async fn setup_failure_ends_with_error() {
    let resolver = SubscriptionResolver::new(|_| async {
      Err::<Option<ValueStream>, _>(anyhow::anyhow!("no feed"))
    });

    let mut stream =
      SubscriptionStream::new("ticks", resolver, params("subscription { ticks { n } }"), None);

    assert_eq!(stream.next().await.unwrap().unwrap_err().to_string(), "no feed");
    assert!(stream.next().await.is_none());
  }
}
