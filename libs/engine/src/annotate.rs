use local_schema_common::ast::{get_type_name, is_deep_list_type};
use serde_json::Value;

use crate::{
  catalogue::{find_field, ObjectTypeDefinition, TypeCatalogue},
  document::selection::{extend_selection, response_key, FragmentMap, ParsedField},
  validate::TYPENAME_FIELD,
};

/// Injects `__typename` into every object node of `data` reachable through the selection of
/// `field`, starting with `object_type`. Arrays are annotated element-wise.
pub fn add_typenames(
  field: &ParsedField,
  fragments: &FragmentMap,
  object_type: &ObjectTypeDefinition,
  catalogue: &TypeCatalogue,
  data: Value,
) -> Value {
  match data {
    Value::Null => Value::Null,
    Value::Array(items) => Value::Array(
      items
        .into_iter()
        .map(|item| add_typenames(field, fragments, object_type, catalogue, item))
        .collect(),
    ),
    Value::Object(mut processed) => {
      for selection in extend_selection(&field.selection_set, fragments) {
        let key = response_key(selection);

        let Some(field_definition) = find_field(object_type, &selection.name) else {
          continue;
        };
        let Some(field_type) = catalogue.get(get_type_name(&field_definition.field_type)) else {
          continue;
        };

        let current = processed.get(key).cloned().unwrap_or(Value::Null);

        if is_deep_list_type(&field_definition.field_type) {
          if current.is_array() {
            processed.insert(
              key.to_string(),
              add_typenames(selection, fragments, field_type, catalogue, current),
            );
          }
          continue;
        }

        processed.insert(
          key.to_string(),
          add_typenames(selection, fragments, field_type, catalogue, current),
        );
      }

      processed.insert(
        TYPENAME_FIELD.to_string(),
        Value::String(object_type.name.clone()),
      );
      Value::Object(processed)
    }
    scalar => scalar,
  }
}
