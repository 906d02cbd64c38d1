use graphql_parser::query::{Definition, Selection, SelectionSet, TypeCondition};
use local_schema_common::{
  ast::{get_type_name, operation_selection_set, OperationKind},
  graphql::ParsedGraphQLDocument,
};

use crate::{
  catalogue::{find_field, ObjectTypeDefinition, TypeCatalogue},
  document::selection::{create_fragment_map, FragmentMap},
  error::ValidationError,
};

pub const TYPENAME_FIELD: &str = "__typename";
pub const SCHEMA_META_FIELD: &str = "__schema";
pub const TYPE_META_FIELD: &str = "__type";

/// Introspection types (`__Type`, `__Field`, ...) are not part of the catalogue but may
/// appear in type conditions.
fn is_known_type(catalogue: &TypeCatalogue, type_name: &str) -> bool {
  type_name.starts_with("__") || catalogue.contains(type_name)
}

/// Checks that every type, fragment and field referenced by `document` exists in `catalogue`.
/// Fails on the first problem found. A missing document is trivially valid.
#[tracing::instrument(level = "trace", skip_all)]
pub fn validate(
  document: Option<&ParsedGraphQLDocument>,
  catalogue: &TypeCatalogue,
) -> Result<(), ValidationError> {
  let Some(document) = document else {
    return Ok(());
  };

  let fragments = create_fragment_map(document);

  for definition in &document.definitions {
    if let Definition::Fragment(fragment) = definition {
      let TypeCondition::On(type_name) = &fragment.type_condition;
      if !is_known_type(catalogue, type_name) {
        return Err(ValidationError::UnknownType(type_name.clone()));
      }
    }
  }

  let validator = Validator {
    catalogue,
    fragments: &fragments,
  };

  for definition in &document.definitions {
    if let Definition::Operation(operation) = definition {
      let root_type_name = OperationKind::of(operation).root_type_name();
      let root_type = catalogue
        .get(root_type_name)
        .ok_or_else(|| ValidationError::UnknownRootType(root_type_name.to_string()))?;

      validator.selection_set(
        operation_selection_set(operation),
        root_type,
        true,
        &mut Vec::new(),
      )?;
    }
  }

  Ok(())
}

struct Validator<'a> {
  catalogue: &'a TypeCatalogue,
  fragments: &'a FragmentMap,
}

impl<'a> Validator<'a> {
  fn selection_set(
    &self,
    selection_set: &SelectionSet<'static, String>,
    current_type: &ObjectTypeDefinition,
    is_root: bool,
    spreads: &mut Vec<String>,
  ) -> Result<(), ValidationError> {
    for selection in &selection_set.items {
      match selection {
        Selection::InlineFragment(inline_fragment) => {
          if let Some(TypeCondition::On(type_name)) = &inline_fragment.type_condition {
            if !is_known_type(self.catalogue, type_name) {
              return Err(ValidationError::UnknownType(type_name.clone()));
            }
          }
          // Narrowing is not applied: the fragment is checked against the enclosing type.
          self.selection_set(&inline_fragment.selection_set, current_type, is_root, spreads)?;
        }
        Selection::FragmentSpread(spread) => {
          let fragment = self
            .fragments
            .get(&spread.fragment_name)
            .ok_or_else(|| ValidationError::UnknownFragment(spread.fragment_name.clone()))?;
          if spreads.contains(&fragment.name) {
            return Err(ValidationError::FragmentCycle(fragment.name.clone()));
          }

          spreads.push(fragment.name.clone());
          self.selection_set(&fragment.selection_set, current_type, is_root, spreads)?;
          spreads.pop();
        }
        Selection::Field(field) => {
          if field.name == TYPENAME_FIELD
            || (is_root && (field.name == SCHEMA_META_FIELD || field.name == TYPE_META_FIELD))
          {
            continue;
          }

          let field_definition =
            find_field(current_type, &field.name).ok_or_else(|| ValidationError::UnknownField {
              field: field.name.clone(),
              type_name: current_type.name.clone(),
            })?;

          if let Some(sub_type) = self.catalogue.get(get_type_name(&field_definition.field_type)) {
            if !field.selection_set.items.is_empty() {
              self.selection_set(&field.selection_set, sub_type, false, spreads)?;
            }
          }
        }
      }
    }

    Ok(())
  }
}
