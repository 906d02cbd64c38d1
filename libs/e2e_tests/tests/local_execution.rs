use e2e::suite::TestSuite;
use local_schema_common::graphql::GraphQLResponse;
use local_schema_engine::{FieldResolver, Resolvers};
use serde_json::{json, Value};
use std::{cell::RefCell, rc::Rc};

const ITEMS_SCHEMA: &str = r#"
  type Query { items: [Item!]! }
  type Item { id: ID!, label: String }
"#;

fn items_resolvers() -> Resolvers {
  Resolvers::new().field(
    "Query",
    "items",
    FieldResolver::sync(|_| Ok(json!([{ "id": "1", "label": "A", "internal": true }]))),
  )
}

#[tokio::test]
async fn executes_items_query() {
  let responses = TestSuite::new(ITEMS_SCHEMA, items_resolvers())
    .run("{ items { id label } }", json!({}))
    .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_data(
      json!({ "items": [{ "id": "1", "label": "A" }] })
    )]
  );
}

#[tokio::test]
async fn selected_typename_survives_shaping() {
  let responses = TestSuite::new(ITEMS_SCHEMA, items_resolvers())
    .run(
      "query Items { items { ...ItemFields } } fragment ItemFields on Item { __typename id }",
      json!({}),
    )
    .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_data(
      json!({ "items": [{ "__typename": "Item", "id": "1" }] })
    )]
  );
}

#[tokio::test]
async fn fills_argument_defaults() {
  let received = Rc::new(RefCell::new(Vec::<Value>::new()));
  let recorded = received.clone();
  let resolvers = Resolvers::new()
    .field(
      "Query",
      "widget",
      FieldResolver::sync(|_| Ok(json!({ "id": "w" }))),
    )
    .field(
      "Widget",
      "color",
      FieldResolver::sync(move |params| {
        let unit = params.arg("unit").cloned().unwrap_or(Value::Null);
        recorded.borrow_mut().push(unit.clone());
        Ok(unit)
      }),
    );

  let responses = TestSuite::new(
    r#"
    type Query { widget: Widget }
    type Widget { id: ID! color(unit: String = "hex"): String }
    "#,
    resolvers,
  )
  .run(
    r#"query ($unit: String) { widget { default: color rgb: color(unit: "rgb") fromVariable: color(unit: $unit) } }"#,
    json!({}),
  )
  .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_data(json!({
      "widget": { "default": "hex", "rgb": "rgb", "fromVariable": "hex" }
    }))]
  );
  assert_eq!(*received.borrow(), vec![json!("hex"), json!("rgb"), json!("hex")]);
}

#[tokio::test]
async fn missing_required_argument_is_a_query_error() {
  let responses = TestSuite::new(
    "type Query { item(id: ID!): Item } type Item { id: ID! }",
    Resolvers::new().field(
      "Query",
      "item",
      FieldResolver::sync(|_| Ok(json!({ "id": "1" }))),
    ),
  )
  .run("{ item { id } }", json!({}))
  .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_error(
      "Field \"item\" argument \"id\" of type \"ID!\" is required, but it was not provided."
    )]
  );
}

#[tokio::test]
async fn resolver_errors_surface_their_message() {
  let responses = TestSuite::new(
    ITEMS_SCHEMA,
    Resolvers::new().field(
      "Query",
      "items",
      FieldResolver::sync(|_| Err(anyhow::anyhow!("inventory offline"))),
    ),
  )
  .run("{ items { id } }", json!({}))
  .await;

  assert_eq!(responses, vec![GraphQLResponse::new_error("inventory offline")]);
}

#[tokio::test]
async fn custom_scalars_are_parsed() {
  let responses = TestSuite::new(
    "scalar Upper type Query { event: Event } type Event { name: Upper }",
    Resolvers::new()
      .scalar("Upper", |raw| {
        Ok(json!(raw.as_str().unwrap_or_default().to_uppercase()))
      })
      .field(
        "Query",
        "event",
        FieldResolver::sync(|_| Ok(json!({ "name": "launch" }))),
      ),
  )
  .run("{ event { name } }", json!({}))
  .await;

  assert_eq!(
    responses,
    vec![GraphQLResponse::new_data(json!({ "event": { "name": "LAUNCH" } }))]
  );
}

#[tokio::test]
async fn resolves_fields_declared_in_extensions() {
  let mut suite = TestSuite::new(
    "type Query { a: Int }",
    Resolvers::new()
      .field("Query", "a", FieldResolver::sync(|_| Ok(json!(1))))
      .field("Query", "b", FieldResolver::sync(|_| Ok(json!(2)))),
  );
  suite.type_defs.push("extend type Query { b: Int }");

  let responses = suite.run("{ a b }", json!({})).await;

  assert_eq!(responses, vec![GraphQLResponse::new_data(json!({ "a": 1, "b": 2 }))]);
}
