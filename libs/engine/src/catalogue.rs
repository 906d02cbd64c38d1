use std::collections::HashMap;

use graphql_parser::schema::{
  Definition, Field, ObjectType, ObjectTypeExtension, TypeDefinition, TypeExtension,
};
use local_schema_common::graphql::ParsedGraphQLSchema;
use tracing::warn;

use crate::error::SchemaError;

pub type ObjectTypeDefinition = ObjectType<'static, String>;
pub type FieldDefinition = Field<'static, String>;

/// Type name to canonical (merged) object type definition.
#[derive(Debug, Clone, Default)]
pub struct TypeCatalogue {
  types: HashMap<String, ObjectTypeDefinition>,
}

impl TypeCatalogue {
  /// Builds the catalogue from the object type definitions of an already merged document.
  pub fn from_schema(schema: &ParsedGraphQLSchema) -> Self {
    let types = schema
      .definitions
      .iter()
      .filter_map(|definition| match definition {
        Definition::TypeDefinition(TypeDefinition::Object(object_type)) => {
          Some((object_type.name.clone(), object_type.clone()))
        }
        _ => None,
      })
      .collect();

    Self { types }
  }

  pub fn get(&self, type_name: &str) -> Option<&ObjectTypeDefinition> {
    self.types.get(type_name)
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.types.contains_key(type_name)
  }

  pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
    self
      .get(type_name)
      .and_then(|object_type| find_field(object_type, field_name))
  }

  pub fn types(&self) -> impl Iterator<Item = &ObjectTypeDefinition> {
    self.types.values()
  }

  pub fn len(&self) -> usize {
    self.types.len()
  }

  pub fn is_empty(&self) -> bool {
    self.types.is_empty()
  }
}

/// First declaration wins when extensions repeat a field name.
pub fn find_field<'a>(
  object_type: &'a ObjectTypeDefinition,
  field_name: &str,
) -> Option<&'a FieldDefinition> {
  object_type
    .fields
    .iter()
    .find(|field| field.name == field_name)
}

#[derive(Debug, Clone)]
pub struct MergedSchema {
  pub document: ParsedGraphQLSchema,
  pub catalogue: TypeCatalogue,
}

enum ObjectNode {
  Definition(ObjectTypeDefinition),
  Extension(ObjectTypeExtension<'static, String>),
}

/// Merges schema documents into one, collapsing object type extensions into their base
/// definition. Non-object definitions are kept as-is, in input order, followed by the merged
/// object types in first-encounter order.
#[tracing::instrument(level = "trace", skip_all)]
pub fn merge_documents(documents: &[ParsedGraphQLSchema]) -> Result<MergedSchema, SchemaError> {
  let mut order: Vec<String> = Vec::new();
  let mut nodes: HashMap<String, Vec<ObjectNode>> = HashMap::new();
  let mut definitions = Vec::new();

  for document in documents {
    for definition in &document.definitions {
      let (name, node) = match definition {
        Definition::TypeDefinition(TypeDefinition::Object(object_type)) => (
          object_type.name.clone(),
          ObjectNode::Definition(object_type.clone()),
        ),
        Definition::TypeExtension(TypeExtension::Object(extension)) => (
          extension.name.clone(),
          ObjectNode::Extension(extension.clone()),
        ),
        other => {
          definitions.push(other.clone());
          continue;
        }
      };

      if !nodes.contains_key(&name) {
        order.push(name.clone());
      }
      nodes.entry(name).or_default().push(node);
    }
  }

  for name in order {
    let Some(entries) = nodes.remove(&name) else {
      continue;
    };

    definitions.push(Definition::TypeDefinition(TypeDefinition::Object(
      merge_object_type(&name, entries)?,
    )));
  }

  let document = ParsedGraphQLSchema { definitions };
  let catalogue = TypeCatalogue::from_schema(&document);

  Ok(MergedSchema {
    document,
    catalogue,
  })
}

fn merge_object_type(
  name: &str,
  entries: Vec<ObjectNode>,
) -> Result<ObjectTypeDefinition, SchemaError> {
  let mut base: Option<ObjectTypeDefinition> = None;
  let mut extensions = Vec::new();

  for entry in entries {
    match entry {
      ObjectNode::Definition(definition) => {
        if base.is_some() {
          return Err(SchemaError::SchemaConflict(name.to_string()));
        }
        base = Some(definition);
      }
      ObjectNode::Extension(extension) => extensions.push(extension),
    }
  }

  // Only extensions: the first one is promoted to a synthetic base, its fields are appended below.
  let mut merged = match base {
    Some(definition) => definition,
    None => match extensions.first() {
      Some(first) => ObjectType {
        position: first.position,
        description: None,
        name: first.name.clone(),
        implements_interfaces: vec![],
        directives: vec![],
        fields: vec![],
      },
      None => return Err(SchemaError::SchemaConflict(name.to_string())),
    },
  };

  for extension in extensions {
    for interface in extension.implements_interfaces {
      if !merged.implements_interfaces.contains(&interface) {
        merged.implements_interfaces.push(interface);
      }
    }
    merged.directives.extend(extension.directives);

    for field in extension.fields {
      if find_field(&merged, &field.name).is_some() {
        warn!(
          "type \"{}\" declares field \"{}\" more than once, the first declaration is used",
          name, field.name
        );
      }
      merged.fields.push(field);
    }
  }

  Ok(merged)
}

#[cfg(test)]
mod tests {
  use super::*;
  use local_schema_common::graphql::parse_graphql_schema;

  fn field_names(catalogue: &TypeCatalogue, type_name: &str) -> Vec<String> {
    catalogue
      .get(type_name)
      .unwrap()
      .fields
      .iter()
      .map(|f| f.name.clone())
      .collect()
  }

  #[test]
  fn merges_extensions_in_order() {
    let documents = vec![
      parse_graphql_schema("type Query { a: String } scalar Date").unwrap(),
      parse_graphql_schema("extend type Query { b: String }").unwrap(),
      parse_graphql_schema("extend type Query { c: Date d: Int }").unwrap(),
    ];

    let merged = merge_documents(&documents).unwrap();

    assert_eq!(merged.catalogue.len(), 1);
    assert_eq!(field_names(&merged.catalogue, "Query"), vec!["a", "b", "c", "d"]);
    assert_eq!(merged.document.definitions.len(), 2);
    assert!(matches!(
      merged.document.definitions[0],
      Definition::TypeDefinition(TypeDefinition::Scalar(_))
    ));
  }

  #[test]
  fn extension_before_definition_keeps_base_fields_first() {
    let documents = vec![
      parse_graphql_schema("extend type Item { label: String }").unwrap(),
      parse_graphql_schema("type Item { id: ID! }").unwrap(),
    ];

    let merged = merge_documents(&documents).unwrap();

    assert_eq!(field_names(&merged.catalogue, "Item"), vec!["id", "label"]);
  }

  #[test]
  fn promotes_first_extension_without_base() {
    let documents = vec![parse_graphql_schema(
      "extend type Mutation { a: Int } extend type Mutation { b: Int }",
    )
    .unwrap()];

    let merged = merge_documents(&documents).unwrap();

    assert_eq!(field_names(&merged.catalogue, "Mutation"), vec!["a", "b"]);
  }

  #[test]
  fn rejects_duplicate_base_definitions() {
    for sdl in [
      vec!["type Foo { a: Int }", "type Foo { b: Int }"],
      vec!["extend type Foo { c: Int }", "type Foo { a: Int }", "type Foo { b: Int }"],
      vec!["type Foo { a: Int }", "extend type Foo { c: Int }", "type Foo { b: Int }"],
    ] {
      let documents = sdl
        .into_iter()
        .map(|s| parse_graphql_schema(s).unwrap())
        .collect::<Vec<_>>();

      assert_eq!(
        merge_documents(&documents).unwrap_err(),
        SchemaError::SchemaConflict("Foo".to_string())
      );
    }
  }

  #[test]
  fn keeps_duplicate_extension_fields() {
    let documents = vec![
      parse_graphql_schema("type Foo { a: Int }").unwrap(),
      parse_graphql_schema("extend type Foo { a: String }").unwrap(),
    ];

    let merged = merge_documents(&documents).unwrap();

    assert_eq!(field_names(&merged.catalogue, "Foo"), vec!["a", "a"]);
    assert_eq!(
      merged.catalogue.field("Foo", "a").unwrap().field_type.to_string(),
      "Int"
    );
  }
}
