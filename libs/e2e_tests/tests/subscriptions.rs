use std::{cell::Cell, rc::Rc, sync::Arc, time::Duration};

use e2e::suite::{MockRemote, TestSuite};
use futures::{stream, StreamExt};
use local_schema_common::graphql::GraphQLResponse;
use local_schema_engine::{FieldResolver, ResolverOutput, Resolvers, SubscriptionResolver};
use serde_json::{json, Value};

const SCHEMA: &str = r#"
  type Query { ping: String }
  type Subscription { priceChanged(symbol: String!): Price }
  type Price { symbol: String amount: Float }
"#;

fn ticker(values: Vec<Value>, pulls: Rc<Cell<usize>>) -> Resolvers {
  Resolvers::new().field(
    "Subscription",
    "priceChanged",
    FieldResolver::new(move |_| {
      let values = values.clone();
      let pulls = pulls.clone();

      async move {
        anyhow::Ok(ResolverOutput::Subscription(
          SubscriptionResolver::new(move |_| {
            let pulls = pulls.clone();
            let source = stream::iter(values.clone())
              .map(move |value| {
                pulls.set(pulls.get() + 1);
                anyhow::Ok(value)
              })
              .boxed_local();

            async move { anyhow::Ok(Some(source)) }
          })
          .with_resolve(|value, params| async move {
            let symbol = params.arg("symbol").cloned().unwrap_or(Value::Null);
            anyhow::Ok(json!({ "symbol": symbol, "amount": value }))
          }),
        ))
      }
    }),
  )
}

#[tokio::test]
async fn emits_one_response_per_element() {
  let pulls = Rc::new(Cell::new(0));

  let responses = TestSuite::new(SCHEMA, ticker(vec![json!(1.5), Value::Null, json!(2.5)], pulls.clone()))
    .run(
      r#"subscription { priceChanged(symbol: "ACME") { __typename symbol amount } }"#,
      json!({}),
    )
    .await;

  assert_eq!(
    responses,
    vec![
      GraphQLResponse::new_data(json!({
        "priceChanged": { "__typename": "Price", "symbol": "ACME", "amount": 1.5 }
      })),
      GraphQLResponse::new_data(json!({
        "priceChanged": { "__typename": "Price", "symbol": "ACME", "amount": 2.5 }
      }))
    ]
  );
  assert_eq!(pulls.get(), 3);
}

#[tokio::test]
async fn unsubscribing_stops_the_source() {
  let pulls = Rc::new(Cell::new(0));

  let mut responses = TestSuite::new(
    SCHEMA,
    ticker(vec![json!(1), json!(2), json!(3)], pulls.clone()),
  )
  .request(
    r#"subscription { priceChanged(symbol: "ACME") { amount } }"#,
    json!({}),
  );

  assert_eq!(
    responses.next().await,
    Some(GraphQLResponse::new_data(json!({ "priceChanged": { "amount": 1 } })))
  );
  assert_eq!(
    responses.next().await,
    Some(GraphQLResponse::new_data(json!({ "priceChanged": { "amount": 2 } })))
  );

  drop(responses);

  assert!(pulls.get() <= 2);
}

#[tokio::test]
async fn empty_subscription_completes_without_data() {
  let resolvers = Resolvers::new().field(
    "Subscription",
    "priceChanged",
    FieldResolver::new(|_| async {
      anyhow::Ok(ResolverOutput::Subscription(SubscriptionResolver::new(
        |_| async { anyhow::Ok(None) },
      )))
    }),
  );

  let responses = TestSuite::new(SCHEMA, resolvers)
    .run(r#"subscription { priceChanged(symbol: "ACME") { amount } }"#, json!({}))
    .await;

  assert!(responses.is_empty());
}

#[tokio::test]
async fn setup_errors_end_the_stream() {
  let resolvers = Resolvers::new().field(
    "Subscription",
    "priceChanged",
    FieldResolver::new(|_| async {
      anyhow::Ok(ResolverOutput::Subscription(SubscriptionResolver::new(
        |_| async { Err::<Option<local_schema_engine::ValueStream>, _>(anyhow::anyhow!("feed closed")) },
      )))
    }),
  );

  let responses = TestSuite::new(SCHEMA, resolvers)
    .run(r#"subscription { priceChanged(symbol: "ACME") { amount } }"#, json!({}))
    .await;

  assert_eq!(responses, vec![GraphQLResponse::new_error("feed closed")]);
}

#[tokio::test]
async fn missing_subscription_argument_is_reported() {
  let responses = TestSuite::new(SCHEMA, ticker(vec![json!(1)], Rc::new(Cell::new(0))))
    .run("subscription { priceChanged { amount } }", json!({}))
    .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_error(
      "Field \"priceChanged\" argument \"symbol\" of type \"String!\" is required, but it was not provided."
    )]
  );
}

#[tokio::test]
async fn local_subscriptions_do_not_wait_for_the_remote_half() {
  let remote = Arc::new(MockRemote::silent());

  let mut responses = TestSuite::new(SCHEMA, ticker(vec![json!(1)], Rc::new(Cell::new(0))))
    .with_remote(remote.clone())
    .request(
      r#"subscription { priceChanged(symbol: "ACME") @local { amount } remoteTicks }"#,
      json!({}),
    );

  let first = tokio::time::timeout(Duration::from_secs(1), responses.next()).await;
  assert_eq!(
    first.ok().flatten(),
    Some(GraphQLResponse::new_data(json!({ "priceChanged": { "amount": 1 } })))
  );

  // The local source is done, the remote subscription stays open.
  let second = tokio::time::timeout(Duration::from_millis(50), responses.next()).await;
  assert!(second.is_err());
  assert_eq!(remote.forwarded(), vec!["subscription { remoteTicks }".to_string()]);
}
