use std::collections::{HashMap, HashSet};

use graphql_parser::query::{Definition, Field, FragmentDefinition, Selection, SelectionSet};
use local_schema_common::graphql::ParsedGraphQLDocument;

pub type ParsedField = Field<'static, String>;
pub type ParsedFragmentDefinition = FragmentDefinition<'static, String>;
pub type FragmentMap = HashMap<String, ParsedFragmentDefinition>;

pub fn create_fragment_map(document: &ParsedGraphQLDocument) -> FragmentMap {
  document
    .definitions
    .iter()
    .filter_map(|definition| match definition {
      Definition::Fragment(fragment) => Some((fragment.name.clone(), fragment.clone())),
      _ => None,
    })
    .collect()
}

/// Flattens a selection set into its fields, expanding inline fragments and spreads in place.
/// Spreads that do not resolve in `fragments` are skipped.
pub fn extend_selection<'a>(
  selection_set: &'a SelectionSet<'static, String>,
  fragments: &'a FragmentMap,
) -> Vec<&'a ParsedField> {
  let mut fields = Vec::new();
  let mut visiting = HashSet::new();
  collect_fields(selection_set, fragments, &mut visiting, &mut fields);
  fields
}

fn collect_fields<'a>(
  selection_set: &'a SelectionSet<'static, String>,
  fragments: &'a FragmentMap,
  visiting: &mut HashSet<&'a str>,
  fields: &mut Vec<&'a ParsedField>,
) {
  for selection in &selection_set.items {
    match selection {
      Selection::Field(field) => fields.push(field),
      Selection::InlineFragment(inline_fragment) => {
        collect_fields(&inline_fragment.selection_set, fragments, visiting, fields)
      }
      Selection::FragmentSpread(spread) => {
        if let Some(fragment) = fragments.get(&spread.fragment_name) {
          if visiting.insert(fragment.name.as_str()) {
            collect_fields(&fragment.selection_set, fragments, visiting, fields);
            visiting.remove(fragment.name.as_str());
          }
        }
      }
    }
  }
}

/// The key a field's value is stored under in a result: its alias, or its name.
pub fn response_key(field: &ParsedField) -> &str {
  field.alias.as_deref().unwrap_or(&field.name)
}

#[cfg(test)]
mod tests {
  use super::*;
  use local_schema_common::{ast::operation_selection_set, graphql::parse_graphql_operation};
  use graphql_parser::query::OperationDefinition;

  #[test]
  fn expands_fragments_in_place() {
    let document = parse_graphql_operation(
      r#"
      query {
        a
        ... on Query { b }
        ...Rest
        e: c
      }
      fragment Rest on Query { c ...More }
      fragment More on Query { d }
      "#,
    )
    .unwrap();
    let fragments = create_fragment_map(&document);
    let Definition::Operation(operation) = &document.definitions[0] else {
      panic!("expected an operation");
    };
    assert!(matches!(operation, OperationDefinition::Query(_)));

    let names = extend_selection(operation_selection_set(operation), &fragments)
      .into_iter()
      .map(response_key)
      .collect::<Vec<_>>();

    assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
  }
}
