use std::{collections::HashSet, sync::Arc};

use futures::{
  future::{FutureExt, LocalBoxFuture},
  stream::{self, LocalBoxStream, StreamExt},
};
use graphql_parser::query::{Definition, Directive, OperationDefinition, Selection, TypeCondition};
use local_schema_common::{
  ast::{
    find_directive, get_type_name, operation_selection_set, operation_variable_definitions,
    OperationKind, ParsedSelectionSet,
  },
  graphql::ParsedGraphQLDocument,
  json::{gql_const_to_json, gql_value_to_json},
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::{
  catalogue::TypeCatalogue,
  document::selection::{create_fragment_map, response_key, FragmentMap, ParsedField},
  error::ExecutionError,
  resolvers::{ResolverInfo, ResolverOutput, ResolverParams, Resolvers, ValueStream},
  subscription::SubscriptionStream,
  validate::TYPENAME_FIELD,
};

pub type ExecutionStream = LocalBoxStream<'static, Result<Value, ExecutionError>>;

/// Walks a document against the wrapped resolver table. Fields without a resolver read the
/// matching property of their parent value.
#[derive(Clone)]
pub struct Executor {
  resolvers: Arc<Resolvers>,
  catalogue: Arc<TypeCatalogue>,
}

impl Executor {
  pub fn new(resolvers: Arc<Resolvers>, catalogue: Arc<TypeCatalogue>) -> Self {
    Self {
      resolvers,
      catalogue,
    }
  }

  pub fn catalogue(&self) -> &TypeCatalogue {
    &self.catalogue
  }

  /// Executes every query and mutation operation of `document` against `root`, merging their
  /// results into one object.
  #[tracing::instrument(level = "trace", skip_all)]
  pub async fn execute(
    &self,
    document: &ParsedGraphQLDocument,
    root: Value,
    variables: &Map<String, Value>,
    context: &Value,
  ) -> Result<Value, ExecutionError> {
    let fragments = Arc::new(create_fragment_map(document));
    let mut data = Value::Object(Map::new());

    for operation in operations(document) {
      let kind = OperationKind::of(operation);
      let variables = with_variable_defaults(operation, variables);
      let scope = Scope {
        executor: self,
        fragments: fragments.clone(),
        variables: &variables,
        context,
      };

      let result = scope
        .execute_selection_set(
          operation_selection_set(operation),
          kind.root_type_name().to_string(),
          root.clone(),
        )
        .await?;

      merge_values(&mut data, result);
    }

    Ok(data)
  }

  /// Opens one stream per root field of every subscription operation in `document`. Each payload
  /// is completed against the field's selection before it is emitted.
  #[tracing::instrument(level = "trace", skip_all)]
  pub async fn subscribe(
    &self,
    document: &ParsedGraphQLDocument,
    root: Value,
    variables: &Map<String, Value>,
    context: &Value,
  ) -> Result<ExecutionStream, ExecutionError> {
    let fragments = Arc::new(create_fragment_map(document));
    let mut streams = Vec::new();

    for operation in operations(document) {
      if OperationKind::of(operation) != OperationKind::Subscription {
        continue;
      }

      let root_type = OperationKind::Subscription.root_type_name();
      let variables = with_variable_defaults(operation, variables);
      let scope = Scope {
        executor: self,
        fragments: fragments.clone(),
        variables: &variables,
        context,
      };

      let mut fields = Vec::new();
      scope.collect_fields(
        operation_selection_set(operation),
        root_type,
        &mut fields,
        &mut HashSet::new(),
      );

      for field in fields {
        if field.name == TYPENAME_FIELD {
          continue;
        }

        let source = scope.open_stream(field, root_type, &root).await?;
        let field = Arc::new(field.clone());
        let executor = self.clone();
        let fragments = fragments.clone();
        let variables = variables.clone();
        let context = context.clone();

        streams.push(
          source
            .then(move |payload| {
              let field = field.clone();
              let executor = executor.clone();
              let fragments = fragments.clone();
              let variables = variables.clone();
              let context = context.clone();

              async move {
                let payload = payload?;
                let scope = Scope {
                  executor: &executor,
                  fragments,
                  variables: &variables,
                  context: &context,
                };

                let value = payload.get(&field.name).cloned().unwrap_or(Value::Null);
                let value = scope.complete_value(&field, root_type, value).await?;

                let mut data = Map::new();
                data.insert(response_key(&field).to_string(), value);
                Ok::<_, ExecutionError>(Value::Object(data))
              }
            })
            .boxed_local(),
        );
      }
    }

    Ok(stream::iter(streams).flatten().boxed_local())
  }
}

fn operations(
  document: &ParsedGraphQLDocument,
) -> impl Iterator<Item = &OperationDefinition<'static, String>> {
  document
    .definitions
    .iter()
    .filter_map(|definition| match definition {
      Definition::Operation(operation) => Some(operation),
      Definition::Fragment(_) => None,
    })
}

fn with_variable_defaults(
  operation: &OperationDefinition<'static, String>,
  variables: &Map<String, Value>,
) -> Map<String, Value> {
  let mut effective = variables.clone();

  for definition in operation_variable_definitions(operation) {
    if effective.contains_key(&definition.name) {
      continue;
    }
    if let Some(default_value) = &definition.default_value {
      effective.insert(definition.name.clone(), gql_const_to_json(default_value));
    }
  }

  effective
}

/// Deep-merges objects so repeated selections of one response key combine their fields.
fn merge_values(target: &mut Value, source: Value) {
  match (target, source) {
    (Value::Object(target), Value::Object(source)) => {
      for (key, value) in source {
        match target.get_mut(&key) {
          Some(existing) => merge_values(existing, value),
          None => {
            target.insert(key, value);
          }
        }
      }
    }
    (Value::Array(target), Value::Array(source)) if target.len() == source.len() => {
      for (existing, value) in target.iter_mut().zip(source) {
        merge_values(existing, value);
      }
    }
    (target, source) => *target = source,
  }
}

struct Scope<'a> {
  executor: &'a Executor,
  fragments: Arc<FragmentMap>,
  variables: &'a Map<String, Value>,
  context: &'a Value,
}

impl<'a> Scope<'a> {
  fn execute_selection_set<'b>(
    &'b self,
    selection_set: &'b ParsedSelectionSet,
    parent_type: String,
    parent: Value,
  ) -> LocalBoxFuture<'b, Result<Value, ExecutionError>> {
    async move {
      if parent.is_null() {
        return Ok(Value::Null);
      }

      let parent_type = parent
        .get(TYPENAME_FIELD)
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(parent_type);

      let mut fields = Vec::new();
      self.collect_fields(selection_set, &parent_type, &mut fields, &mut HashSet::new());

      let mut result = Value::Object(Map::new());
      for field in fields {
        let key = response_key(field).to_string();

        let value = if field.name == TYPENAME_FIELD {
          Value::String(parent_type.clone())
        } else {
          let value = self.resolve_field(field, &parent_type, &parent).await?;
          self.complete_value(field, &parent_type, value).await?
        };

        let mut entry = Map::new();
        entry.insert(key, value);
        merge_values(&mut result, Value::Object(entry));
      }

      Ok(result)
    }
    .boxed_local()
  }

  fn collect_fields<'b>(
    &'b self,
    selection_set: &'b ParsedSelectionSet,
    parent_type: &str,
    fields: &mut Vec<&'b ParsedField>,
    visited: &mut HashSet<&'b str>,
  ) {
    for selection in &selection_set.items {
      match selection {
        Selection::Field(field) => {
          if self.should_include(&field.directives) {
            fields.push(field);
          }
        }
        Selection::InlineFragment(inline_fragment) => {
          if self.should_include(&inline_fragment.directives)
            && self.fragment_applies(inline_fragment.type_condition.as_ref(), parent_type)
          {
            self.collect_fields(&inline_fragment.selection_set, parent_type, fields, visited);
          }
        }
        Selection::FragmentSpread(spread) => {
          if !self.should_include(&spread.directives) {
            continue;
          }
          let Some(fragment) = self.fragments.get(&spread.fragment_name) else {
            debug!("skipping unknown fragment \"{}\"", spread.fragment_name);
            continue;
          };
          if self.fragment_applies(Some(&fragment.type_condition), parent_type)
            && visited.insert(fragment.name.as_str())
          {
            self.collect_fields(&fragment.selection_set, parent_type, fields, visited);
          }
        }
      }
    }
  }

  fn should_include(&self, directives: &[Directive<'static, String>]) -> bool {
    let condition = |name: &str| {
      find_directive(directives, name).and_then(|directive| {
        directive
          .arguments
          .iter()
          .find(|(argument, _)| argument == "if")
          .and_then(|(_, value)| gql_value_to_json(value, self.variables))
          .and_then(|value| value.as_bool())
      })
    };

    condition("skip") != Some(true) && condition("include") != Some(false)
  }

  /// An object type condition must name the parent. An interface condition applies when the
  /// parent implements it or no catalogued type does. Other conditions always apply.
  fn fragment_applies(&self, type_condition: Option<&TypeCondition<'static, String>>, parent_type: &str) -> bool {
    let Some(TypeCondition::On(condition)) = type_condition else {
      return true;
    };

    if condition == parent_type {
      return true;
    }

    if self.executor.catalogue.contains(condition) {
      return false;
    }

    let implemented = self
      .executor
      .catalogue
      .get(parent_type)
      .is_some_and(|object_type| object_type.implements_interfaces.contains(condition));

    implemented || !self.is_interface_of_other(condition, parent_type)
  }

  fn is_interface_of_other(&self, condition: &str, parent_type: &str) -> bool {
    self.executor.catalogue.types().any(|object_type| {
      object_type.name != parent_type
        && object_type
          .implements_interfaces
          .iter()
          .any(|interface| interface == condition)
    })
  }

  fn arguments(&self, field: &ParsedField) -> Map<String, Value> {
    field
      .arguments
      .iter()
      .filter_map(|(name, value)| {
        gql_value_to_json(value, self.variables).map(|value| (name.clone(), value))
      })
      .collect()
  }

  fn params(&self, field: &ParsedField, parent_type: &str, parent: &Value) -> ResolverParams {
    ResolverParams {
      root: parent.clone(),
      args: self.arguments(field),
      context: self.context.clone(),
      info: ResolverInfo {
        parent_type: parent_type.to_string(),
        field: Arc::new(field.clone()),
        fragment_map: self.fragments.clone(),
      },
    }
  }

  async fn resolve_field(
    &self,
    field: &ParsedField,
    parent_type: &str,
    parent: &Value,
  ) -> Result<Value, ExecutionError> {
    let Some(resolver) = self.executor.resolvers.get(parent_type, &field.name) else {
      return Ok(
        parent
          .get(response_key(field))
          .or_else(|| parent.get(&field.name))
          .cloned()
          .unwrap_or(Value::Null),
      );
    };

    match resolver.call(self.params(field, parent_type, parent)).await? {
      ResolverOutput::Value(value) => Ok(value),
      ResolverOutput::Subscription(_) | ResolverOutput::Stream(_) => {
        Err(ExecutionError::UnexpectedStream(field.name.clone()))
      }
    }
  }

  async fn open_stream(
    &self,
    field: &ParsedField,
    parent_type: &str,
    parent: &Value,
  ) -> Result<ValueStream, ExecutionError> {
    let resolver = self
      .executor
      .resolvers
      .get(parent_type, &field.name)
      .ok_or_else(|| ExecutionError::NotAStream(field.name.clone()))?;
    let params = self.params(field, parent_type, parent);

    match resolver.call(params.clone()).await? {
      ResolverOutput::Stream(stream) => Ok(stream),
      ResolverOutput::Subscription(subscription) => {
        Ok(SubscriptionStream::new(field.name.clone(), subscription, params, None).boxed_local())
      }
      ResolverOutput::Value(_) => Err(ExecutionError::NotAStream(field.name.clone())),
    }
  }

  async fn complete_value(
    &self,
    field: &ParsedField,
    parent_type: &str,
    value: Value,
  ) -> Result<Value, ExecutionError> {
    if field.selection_set.items.is_empty() {
      return Ok(value);
    }

    let declared_type = self
      .executor
      .catalogue
      .field(parent_type, &field.name)
      .map(|definition| get_type_name(&definition.field_type).to_string())
      .unwrap_or_default();

    self
      .complete_nested(&field.selection_set, declared_type, value)
      .await
  }

  fn complete_nested<'b>(
    &'b self,
    selection_set: &'b ParsedSelectionSet,
    declared_type: String,
    value: Value,
  ) -> LocalBoxFuture<'b, Result<Value, ExecutionError>> {
    async move {
      match value {
        Value::Array(items) => {
          let mut completed = Vec::with_capacity(items.len());
          for item in items {
            completed.push(
              self
                .complete_nested(selection_set, declared_type.clone(), item)
                .await?,
            );
          }
          Ok(Value::Array(completed))
        }
        Value::Object(_) => {
          self
            .execute_selection_set(selection_set, declared_type, value)
            .await
        }
        other => Ok(other),
      }
    }
    .boxed_local()
  }
}
