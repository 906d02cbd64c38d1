use std::{collections::HashMap, sync::Arc};

use futures::StreamExt;
use graphql_parser::schema::{Definition, InputValue, TypeDefinition};
use local_schema_common::{
  ast::get_type_name, graphql::ParsedGraphQLSchema, json::gql_const_to_json,
};
use serde_json::{Map, Value};
use tracing::debug;

use super::{FieldResolver, ResolverOutput, ResolverParams, Resolvers, ScalarParser};
use crate::{
  annotate::add_typenames,
  catalogue::{find_field, FieldDefinition, ObjectTypeDefinition, TypeCatalogue},
  error::{ExecutionError, SchemaError},
  subscription::{SubscriptionStream, SubscriptionTarget},
};

/// Everything a wrapped resolver needs at call time.
struct WrappedField {
  field_name: String,
  defaults: Map<String, Value>,
  required: Vec<InputValue<'static, String>>,
  target: Option<ObjectTypeDefinition>,
  catalogue: Arc<TypeCatalogue>,
}

impl WrappedField {
  fn new(field: &FieldDefinition, catalogue: &Arc<TypeCatalogue>) -> Self {
    let mut defaults = Map::new();
    let mut required = Vec::new();

    for argument in &field.arguments {
      match &argument.default_value {
        Some(default_value) => {
          defaults.insert(argument.name.clone(), gql_const_to_json(default_value));
        }
        None => required.push(argument.clone()),
      }
    }

    Self {
      field_name: field.name.clone(),
      defaults,
      required,
      target: catalogue.get(get_type_name(&field.field_type)).cloned(),
      catalogue: catalogue.clone(),
    }
  }

  fn check_required(&self, params: &ResolverParams) -> Result<(), ExecutionError> {
    match self
      .required
      .iter()
      .find(|argument| !params.args.contains_key(&argument.name))
    {
      Some(argument) => Err(ExecutionError::MissingArgument {
        field: params.info.field_name().to_string(),
        argument: argument.name.clone(),
        argument_type: argument.value_type.to_string(),
      }),
      None => Ok(()),
    }
  }

  fn merge_defaults(&self, args: Map<String, Value>) -> Map<String, Value> {
    let mut merged = self.defaults.clone();
    merged.extend(args);
    merged
  }

  fn complete(&self, output: ResolverOutput, params: ResolverParams) -> ResolverOutput {
    match output {
      ResolverOutput::Subscription(resolver) => {
        let target = self.target.as_ref().map(|object_type| SubscriptionTarget {
          object_type: object_type.clone(),
          catalogue: self.catalogue.clone(),
        });

        ResolverOutput::Stream(
          SubscriptionStream::new(self.field_name.clone(), resolver, params, target).boxed_local(),
        )
      }
      ResolverOutput::Value(value) => match &self.target {
        Some(object_type) => ResolverOutput::Value(add_typenames(
          &params.info.field,
          &params.info.fragment_map,
          object_type,
          &self.catalogue,
          value,
        )),
        None => ResolverOutput::Value(value),
      },
      stream => stream,
    }
  }
}

fn wrap(resolver: FieldResolver, field: Arc<WrappedField>) -> FieldResolver {
  FieldResolver::new(move |mut params: ResolverParams| {
    let resolver = resolver.clone();
    let field = field.clone();

    async move {
      field.check_required(&params)?;
      params.args = field.merge_defaults(std::mem::take(&mut params.args));

      let output = resolver.call(params.clone()).await?;
      anyhow::Ok(field.complete(output, params))
    }
  })
}

fn parse_scalar(parser: ScalarParser, field_name: String) -> FieldResolver {
  FieldResolver::sync(move |params| {
    let raw = params.root.get(&field_name).cloned().unwrap_or(Value::Null);
    parser(&raw)
  })
}

/// Wraps every resolver registered on a catalogued type with argument defaulting,
/// required-argument checks and result annotation, then fills in parse resolvers for fields
/// typed with a registered custom scalar. Resolvers on types outside the catalogue are kept
/// unwrapped.
#[tracing::instrument(level = "trace", skip_all)]
pub fn map_resolvers(
  resolvers: Resolvers,
  schema: &ParsedGraphQLSchema,
  catalogue: Arc<TypeCatalogue>,
) -> Result<Resolvers, SchemaError> {
  let Resolvers { types, scalars } = resolvers;
  let mut mapped: HashMap<String, HashMap<String, FieldResolver>> = HashMap::new();

  for (type_name, fields) in types {
    let Some(object_type) = catalogue.get(&type_name) else {
      mapped.insert(type_name, fields);
      continue;
    };

    let mut wrapped_fields = HashMap::with_capacity(fields.len());
    for (field_name, resolver) in fields {
      let field = find_field(object_type, &field_name).ok_or_else(|| {
        SchemaError::UnknownResolverField {
          type_name: type_name.clone(),
          field: field_name.clone(),
        }
      })?;

      let wrapped = wrap(resolver, Arc::new(WrappedField::new(field, &catalogue)));
      wrapped_fields.insert(field_name, wrapped);
    }

    mapped.insert(type_name, wrapped_fields);
  }

  let mut mapped = Resolvers {
    types: mapped,
    scalars,
  };

  for definition in &schema.definitions {
    let Definition::TypeDefinition(TypeDefinition::Scalar(scalar)) = definition else {
      continue;
    };
    let Some(parser) = mapped.scalars.get(&scalar.name).cloned() else {
      continue;
    };

    for object_type in catalogue.types() {
      for field in &object_type.fields {
        if get_type_name(&field.field_type) != scalar.name {
          continue;
        }

        if mapped.insert_if_absent(
          &object_type.name,
          &field.name,
          parse_scalar(parser.clone(), field.name.clone()),
        ) {
          debug!(
            "field \"{}.{}\" parses scalar \"{}\"",
            object_type.name, field.name, scalar.name
          );
        }
      }
    }
  }

  Ok(mapped)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    catalogue::merge_documents,
    document::selection::{FragmentMap, ParsedField},
    resolvers::{ResolverInfo, SubscriptionResolver},
  };
  use futures::stream;
  use graphql_parser::query::{Definition as QueryDefinition, OperationDefinition, Selection};
  use local_schema_common::graphql::{parse_graphql_operation, parse_graphql_schema};
  use serde_json::json;
  use std::{cell::RefCell, rc::Rc};

  const SCHEMA: &str = r#"
    scalar Date
    type Query {
      widget(id: ID!): Widget
      color(unit: String = "hex", sizes: [Int] = [1, 2], mode: Mode = DARK): String
      created: Date
      updated: Date
    }
    enum Mode { DARK LIGHT }
    type Widget { id: ID! created: Date }
    type Subscription { widgets: Widget }
  "#;

  fn mapped(resolvers: Resolvers) -> Result<Resolvers, SchemaError> {
    let merged = merge_documents(&[parse_graphql_schema(SCHEMA).unwrap()]).unwrap();
    map_resolvers(resolvers, &merged.document, Arc::new(merged.catalogue))
  }

  fn params(query: &str, root: Value, args: Value) -> ResolverParams {
    let document = parse_graphql_operation(query).unwrap();
    let field: ParsedField = match &document.definitions[0] {
      QueryDefinition::Operation(operation) => {
        let selection_set = match operation {
          OperationDefinition::SelectionSet(selection_set) => selection_set,
          OperationDefinition::Subscription(subscription) => &subscription.selection_set,
          _ => unreachable!(),
        };
        match &selection_set.items[0] {
          Selection::Field(field) => field.clone(),
          _ => unreachable!(),
        }
      }
      _ => unreachable!(),
    };

    ResolverParams {
      root,
      args: args.as_object().cloned().unwrap_or_default(),
      context: Value::Null,
      info: ResolverInfo {
        parent_type: "Query".to_string(),
        field: Arc::new(field),
        fragment_map: Arc::new(FragmentMap::new()),
      },
    }
  }

  async fn call_value(resolvers: &Resolvers, type_name: &str, field: &str, params: ResolverParams) -> Value {
    match resolvers.get(type_name, field).unwrap().call(params).await.unwrap() {
      ResolverOutput::Value(value) => value,
      other => panic!("unexpected output {:?}", other),
    }
  }

  #[test]
  fn rejects_resolver_for_unknown_field() {
    let error = mapped(Resolvers::new().field(
      "Widget",
      "bar",
      FieldResolver::sync(|_| Ok(Value::Null)),
    ))
    .unwrap_err();

    assert_eq!(
      error,
      SchemaError::UnknownResolverField {
        type_name: "Widget".to_string(),
        field: "bar".to_string()
      }
    );
    assert_eq!(
      error.to_string(),
      "Resolver field bar of type Widget does not exist in your local schema"
    );
  }

  #[tokio::test]
  async fn applies_argument_defaults() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let recorded = seen.clone();
    let resolvers = mapped(Resolvers::new().field(
      "Query",
      "color",
      FieldResolver::sync(move |params| {
        recorded.borrow_mut().push(Value::Object(params.args.clone()));
        Ok(json!("ok"))
      }),
    ))
    .unwrap();

    call_value(&resolvers, "Query", "color", params("{ color }", json!({}), json!({}))).await;
    call_value(
      &resolvers,
      "Query",
      "color",
      params("{ color(unit: \"rgb\") }", json!({}), json!({ "unit": "rgb" })),
    )
    .await;

    assert_eq!(
      *seen.borrow(),
      vec![
        json!({ "unit": "hex", "sizes": [1, 2], "mode": "DARK" }),
        json!({ "unit": "rgb", "sizes": [1, 2], "mode": "DARK" })
      ]
    );
  }

  #[tokio::test]
  async fn requires_arguments_without_defaults() {
    let resolvers = mapped(Resolvers::new().field(
      "Query",
      "widget",
      FieldResolver::sync(|_| Ok(json!({ "id": "1" }))),
    ))
    .unwrap();

    let error = resolvers
      .get("Query", "widget")
      .unwrap()
      .call(params("{ widget { id } }", json!({}), json!({})))
      .await
      .unwrap_err();

    assert_eq!(
      error.to_string(),
      "Field \"widget\" argument \"id\" of type \"ID!\" is required, but it was not provided."
    );
  }

  #[tokio::test]
  async fn annotates_object_results() {
    let resolvers = mapped(Resolvers::new().field(
      "Query",
      "widget",
      FieldResolver::sync(|params| Ok(json!({ "id": params.arg("id").cloned() }))),
    ))
    .unwrap();

    let value = call_value(
      &resolvers,
      "Query",
      "widget",
      params("{ widget(id: 7) { id } }", json!({}), json!({ "id": 7 })),
    )
    .await;

    assert_eq!(value, json!({ "__typename": "Widget", "id": 7 }));
  }

  #[tokio::test]
  async fn generates_scalar_parsers_without_overriding() {
    let resolvers = mapped(
      Resolvers::new()
        .scalar("Date", |raw| Ok(json!(format!("date:{}", raw.as_str().unwrap_or_default()))))
        .field("Query", "updated", FieldResolver::sync(|_| Ok(json!("explicit")))),
    )
    .unwrap();

    let root = json!({ "created": "2020", "updated": "2021" });
    assert_eq!(
      call_value(&resolvers, "Query", "created", params("{ created }", root.clone(), json!({}))).await,
      json!("date:2020")
    );
    assert_eq!(
      call_value(&resolvers, "Query", "updated", params("{ updated }", root.clone(), json!({}))).await,
      json!("explicit")
    );
    assert_eq!(
      call_value(
        &resolvers,
        "Widget",
        "created",
        params("{ created }", json!({ "created": "1999" }), json!({}))
      )
      .await,
      json!("date:1999")
    );
  }

  #[test]
  fn keeps_resolvers_of_unknown_types() {
    let resolvers = mapped(Resolvers::new().field(
      "Unrelated",
      "anything",
      FieldResolver::sync(|_| Ok(Value::Null)),
    ))
    .unwrap();

    assert!(resolvers.contains("Unrelated", "anything"));
  }

  #[tokio::test]
  async fn adapts_subscription_results() {
    let resolvers = mapped(Resolvers::new().field(
      "Subscription",
      "widgets",
      FieldResolver::new(|_| async {
        anyhow::Ok(ResolverOutput::Subscription(SubscriptionResolver::new(|_| async {
          anyhow::Ok(Some(
            stream::iter(vec![Ok::<_, anyhow::Error>(json!({ "id": "w1" }))]).boxed_local(),
          ))
        })))
      }),
    ))
    .unwrap();

    let output = resolvers
      .get("Subscription", "widgets")
      .unwrap()
      .call(params("subscription { widgets { id } }", json!({}), json!({})))
      .await
      .unwrap();

    let ResolverOutput::Stream(stream) = output else {
      panic!("expected a stream");
    };
    let values = stream.map(|item| item.unwrap()).collect::<Vec<_>>().await;

    assert_eq!(
      values,
      vec![json!({ "widgets": { "__typename": "Widget", "id": "w1" } })]
    );
  }
}
