use std::collections::HashSet;

use graphql_parser::query::{Definition, Selection, SelectionSet};
use local_schema_common::{ast::operation_selection_set, graphql::ParsedGraphQLDocument};
use serde_json::{Map, Value};

use crate::{
  document::selection::{create_fragment_map, response_key, FragmentMap},
  validate::TYPENAME_FIELD,
};

/// Restricts `data` to exactly the fields the operations of `document` select. Every operation
/// projects into the same top-level object. Without a document, `data` is returned as-is.
#[tracing::instrument(level = "trace", skip_all)]
pub fn clean_result(data: &Value, document: Option<&ParsedGraphQLDocument>) -> Value {
  let Some(document) = document else {
    return data.clone();
  };

  let fragments = create_fragment_map(document);
  let mut cleaned = Map::new();

  for definition in &document.definitions {
    if let Definition::Operation(operation) = definition {
      if let Value::Object(projected) =
        project_selection_set(operation_selection_set(operation), data, &fragments)
      {
        cleaned.extend(projected);
      }
    }
  }

  Value::Object(cleaned)
}

fn project_selection_set(
  selection_set: &SelectionSet<'static, String>,
  data: &Value,
  fragments: &FragmentMap,
) -> Value {
  if data.is_null() {
    return Value::Null;
  }

  let mut projected = Map::new();
  project_into(selection_set, data, fragments, &mut HashSet::new(), &mut projected);
  Value::Object(projected)
}

/// `spreads` holds the fragments being expanded into the current level, a repeated spread adds
/// nothing and is skipped.
fn project_into<'f>(
  selection_set: &'f SelectionSet<'static, String>,
  data: &Value,
  fragments: &'f FragmentMap,
  spreads: &mut HashSet<&'f str>,
  projected: &mut Map<String, Value>,
) {
  if let Some(typename) = data.get(TYPENAME_FIELD).filter(|value| !value.is_null()) {
    projected.insert(TYPENAME_FIELD.to_string(), typename.clone());
  }

  for selection in &selection_set.items {
    match selection {
      Selection::InlineFragment(inline_fragment) => {
        project_into(&inline_fragment.selection_set, data, fragments, spreads, projected)
      }
      Selection::FragmentSpread(spread) => {
        if let Some(fragment) = fragments.get(&spread.fragment_name) {
          if spreads.insert(fragment.name.as_str()) {
            project_into(&fragment.selection_set, data, fragments, spreads, projected);
            spreads.remove(fragment.name.as_str());
          }
        }
      }
      Selection::Field(field) => {
        let key = response_key(field);
        let value = data.get(key).unwrap_or(&Value::Null);

        let value = if field.selection_set.items.is_empty() {
          value.clone()
        } else {
          project_value(&field.selection_set, value, fragments)
        };

        projected.insert(key.to_string(), value);
      }
    }
  }
}

fn project_value(
  selection_set: &SelectionSet<'static, String>,
  value: &Value,
  fragments: &FragmentMap,
) -> Value {
  match value {
    Value::Array(items) => Value::Array(
      items
        .iter()
        .map(|item| project_value(selection_set, item, fragments))
        .collect(),
    ),
    other => project_selection_set(selection_set, other, fragments),
  }
}
