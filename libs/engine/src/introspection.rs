use std::{collections::HashMap, sync::Arc};

use graphql_parser::schema::{
  Definition, Directive, DirectiveDefinition, EnumValue, Field, InputValue, ScalarType,
  SchemaDefinition, Type, TypeDefinition,
};
use local_schema_common::{ast::find_directive, graphql::ParsedGraphQLSchema, json::gql_const_to_json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
  resolvers::{FieldResolver, ResolverParams, Resolvers},
  validate::{SCHEMA_META_FIELD, TYPE_META_FIELD},
};

const BUILT_IN_SCALARS: [(&str, &str); 5] = [
  (
    "Int",
    "The `Int` scalar type represents non-fractional signed whole numeric values. Int can represent values between -(2^31) and 2^31 - 1.",
  ),
  (
    "Float",
    "The `Float` scalar type represents signed double-precision fractional values as specified by [IEEE 754](https://en.wikipedia.org/wiki/IEEE_floating_point).",
  ),
  (
    "String",
    "The `String` scalar type represents textual data, represented as UTF-8 character sequences. The String type is most often used by GraphQL to represent free-form human-readable text.",
  ),
  ("Boolean", "The `Boolean` scalar type represents `true` or `false`."),
  (
    "ID",
    "The `ID` scalar type represents a unique identifier, often used to refetch an object or as key for a cache. The ID type appears in a JSON response as a String; however, it is not intended to be human-readable. When expected as an input type, any string (such as `\"4\"`) or integer (such as `4`) input value will be accepted as an ID.",
  ),
];

const DEPRECATED_DIRECTIVE: &str = "deprecated";
const DEFAULT_DEPRECATION_REASON: &str = "No longer supported";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
enum TypeRef {
  Named(String),
  List(Box<TypeRef>),
  NonNull(Box<TypeRef>),
}

impl From<&Type<'static, String>> for TypeRef {
  fn from(value: &Type<'static, String>) -> Self {
    match value {
      Type::NamedType(name) => TypeRef::Named(name.clone()),
      Type::ListType(inner) => TypeRef::List(Box::new(inner.as_ref().into())),
      Type::NonNullType(inner) => TypeRef::NonNull(Box::new(inner.as_ref().into())),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
enum InputOwner {
  FieldArguments { type_name: String, field: usize },
  InputObject { type_name: String },
  DirectiveArguments { name: String },
}

/// Position of a schema member, stored as the `node` of a meta-type root value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum MetaNode {
  Type { of: TypeRef },
  Field { type_name: String, index: usize },
  InputValue { owner: InputOwner, index: usize },
  EnumValue { type_name: String, index: usize },
  Directive { name: String },
}

struct SchemaIndex {
  types: Vec<TypeDefinition<'static, String>>,
  positions: HashMap<String, usize>,
  directives: Vec<DirectiveDefinition<'static, String>>,
  schema_definition: Option<SchemaDefinition<'static, String>>,
}

fn type_definition_name<'a>(definition: &'a TypeDefinition<'static, String>) -> &'a str {
  match definition {
    TypeDefinition::Scalar(t) => &t.name,
    TypeDefinition::Object(t) => &t.name,
    TypeDefinition::Interface(t) => &t.name,
    TypeDefinition::Union(t) => &t.name,
    TypeDefinition::Enum(t) => &t.name,
    TypeDefinition::InputObject(t) => &t.name,
  }
}

fn type_definition_description<'a>(
  definition: &'a TypeDefinition<'static, String>,
) -> Option<&'a String> {
  match definition {
    TypeDefinition::Scalar(t) => t.description.as_ref(),
    TypeDefinition::Object(t) => t.description.as_ref(),
    TypeDefinition::Interface(t) => t.description.as_ref(),
    TypeDefinition::Union(t) => t.description.as_ref(),
    TypeDefinition::Enum(t) => t.description.as_ref(),
    TypeDefinition::InputObject(t) => t.description.as_ref(),
  }
}

impl SchemaIndex {
  fn new(schema: &ParsedGraphQLSchema) -> Self {
    let mut types: Vec<TypeDefinition<'static, String>> = Vec::new();
    let mut directives = Vec::new();
    let mut schema_definition = None;

    for definition in &schema.definitions {
      match definition {
        Definition::TypeDefinition(type_definition) => types.push(type_definition.clone()),
        Definition::DirectiveDefinition(directive) => directives.push(directive.clone()),
        Definition::SchemaDefinition(definition) => schema_definition = Some(definition.clone()),
        Definition::TypeExtension(_) => {}
      }
    }

    let built_ins = BUILT_IN_SCALARS
      .iter()
      .filter(|(name, _)| !types.iter().any(|t| type_definition_name(t) == *name))
      .map(|(name, description)| {
        let mut scalar = ScalarType::new(name.to_string());
        scalar.description = Some(description.to_string());
        TypeDefinition::Scalar(scalar)
      })
      .collect::<Vec<_>>();

    let types = built_ins.into_iter().chain(types).collect::<Vec<_>>();
    let positions = types
      .iter()
      .enumerate()
      .map(|(index, definition)| (type_definition_name(definition).to_string(), index))
      .collect();

    Self {
      types,
      positions,
      directives,
      schema_definition,
    }
  }

  fn find(&self, name: &str) -> Option<&TypeDefinition<'static, String>> {
    self.positions.get(name).map(|index| &self.types[*index])
  }

  fn root_type(&self, kind: &str) -> Value {
    let declared = self.schema_definition.as_ref().and_then(|definition| match kind {
      "Query" => definition.query.clone(),
      "Mutation" => definition.mutation.clone(),
      _ => definition.subscription.clone(),
    });

    self.type_root(&TypeRef::Named(declared.unwrap_or_else(|| kind.to_string())))
  }

  fn type_root(&self, type_ref: &TypeRef) -> Value {
    if let TypeRef::Named(name) = type_ref {
      if self.find(name).is_none() {
        return Value::Null;
      }
    }

    meta("__Type", MetaNode::Type { of: type_ref.clone() })
  }

  fn named(&self, type_ref: &TypeRef) -> Option<&TypeDefinition<'static, String>> {
    match type_ref {
      TypeRef::Named(name) => self.find(name),
      _ => None,
    }
  }

  fn fields(&self, type_name: &str) -> Option<&Vec<Field<'static, String>>> {
    match self.find(type_name)? {
      TypeDefinition::Object(t) => Some(&t.fields),
      TypeDefinition::Interface(t) => Some(&t.fields),
      _ => None,
    }
  }

  fn field(&self, type_name: &str, index: usize) -> anyhow::Result<&Field<'static, String>> {
    self
      .fields(type_name)
      .and_then(|fields| fields.get(index))
      .ok_or_else(|| anyhow::anyhow!("Field {} of type {} does not exist", index, type_name))
  }

  fn input_value(&self, owner: &InputOwner, index: usize) -> anyhow::Result<&InputValue<'static, String>> {
    let values = match owner {
      InputOwner::FieldArguments { type_name, field } => Some(&self.field(type_name, *field)?.arguments),
      InputOwner::InputObject { type_name } => match self.find(type_name) {
        Some(TypeDefinition::InputObject(t)) => Some(&t.fields),
        _ => None,
      },
      InputOwner::DirectiveArguments { name } => self.directive(name).ok().map(|d| &d.arguments),
    };

    values
      .and_then(|values| values.get(index))
      .ok_or_else(|| anyhow::anyhow!("Input value {} does not exist", index))
  }

  fn enum_value(&self, type_name: &str, index: usize) -> anyhow::Result<&EnumValue<'static, String>> {
    match self.find(type_name) {
      Some(TypeDefinition::Enum(t)) => t.values.get(index),
      _ => None,
    }
    .ok_or_else(|| anyhow::anyhow!("Enum value {} of type {} does not exist", index, type_name))
  }

  fn directive(&self, name: &str) -> anyhow::Result<&DirectiveDefinition<'static, String>> {
    self
      .directives
      .iter()
      .find(|directive| directive.name == name)
      .ok_or_else(|| anyhow::anyhow!("Directive {} does not exist", name))
  }
}

fn meta(typename: &str, node: MetaNode) -> Value {
  json!({ "__typename": typename, "node": node })
}

fn node(params: &ResolverParams) -> anyhow::Result<MetaNode> {
  let node = params.root.get("node").cloned().unwrap_or(Value::Null);
  Ok(serde_json::from_value(node)?)
}

fn type_ref(params: &ResolverParams) -> anyhow::Result<TypeRef> {
  match node(params)? {
    MetaNode::Type { of } => Ok(of),
    other => Err(anyhow::anyhow!("Expected a type, got {:?}", other)),
  }
}

fn include_deprecated(params: &ResolverParams) -> bool {
  params
    .arg("includeDeprecated")
    .and_then(Value::as_bool)
    .unwrap_or(false)
}

fn is_deprecated(directives: &[Directive<'static, String>]) -> bool {
  find_directive(directives, DEPRECATED_DIRECTIVE).is_some()
}

fn deprecation_reason(directives: &[Directive<'static, String>]) -> Value {
  let Some(directive) = find_directive(directives, DEPRECATED_DIRECTIVE) else {
    return Value::Null;
  };

  directive
    .arguments
    .iter()
    .find(|(name, _)| name == "reason")
    .map(|(_, reason)| gql_const_to_json(reason))
    .unwrap_or_else(|| Value::String(DEFAULT_DEPRECATION_REASON.to_string()))
}

fn optional_string(value: Option<&String>) -> Value {
  value.map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
}

fn register<F>(
  resolvers: &mut Resolvers,
  index: &Arc<SchemaIndex>,
  type_name: &str,
  field_name: &str,
  resolve: F,
) where
  F: Fn(&SchemaIndex, &ResolverParams) -> anyhow::Result<Value> + 'static,
{
  let index = index.clone();
  let resolver = FieldResolver::sync(move |params| resolve(&index, &params));

  if !resolvers.insert_if_absent(type_name, field_name, resolver) {
    debug!("keeping user resolver for \"{}.{}\"", type_name, field_name);
  }
}

/// Registers `Query.__schema`, `Query.__type` and resolvers for every meta-type field.
/// Slots that already hold a resolver are left untouched.
#[tracing::instrument(level = "trace", skip_all)]
pub fn add_schema_resolvers(resolvers: &mut Resolvers, schema: &ParsedGraphQLSchema) {
  let index = Arc::new(SchemaIndex::new(schema));

  register(resolvers, &index, "Query", SCHEMA_META_FIELD, |_, _| {
    Ok(json!({ "__typename": "__Schema" }))
  });
  register(resolvers, &index, "Query", TYPE_META_FIELD, |index, params| {
    let name = params
      .arg("name")
      .and_then(Value::as_str)
      .ok_or_else(|| anyhow::anyhow!("Argument \"name\" of \"__type\" must be a string"))?;
    Ok(index.type_root(&TypeRef::Named(name.to_string())))
  });

  add_schema_type(resolvers, &index);
  add_type_type(resolvers, &index);
  add_field_type(resolvers, &index);
  add_input_value_type(resolvers, &index);
  add_enum_value_type(resolvers, &index);
  add_directive_type(resolvers, &index);
}

fn add_schema_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__Schema", "description", |_, _| Ok(Value::Null));
  register(resolvers, index, "__Schema", "queryType", |index, _| Ok(index.root_type("Query")));
  register(resolvers, index, "__Schema", "mutationType", |index, _| {
    Ok(index.root_type("Mutation"))
  });
  register(resolvers, index, "__Schema", "subscriptionType", |index, _| {
    Ok(index.root_type("Subscription"))
  });
  register(resolvers, index, "__Schema", "types", |index, _| {
    Ok(Value::Array(
      index
        .types
        .iter()
        .map(|t| index.type_root(&TypeRef::Named(type_definition_name(t).to_string())))
        .collect(),
    ))
  });
  register(resolvers, index, "__Schema", "directives", |index, _| {
    Ok(Value::Array(
      index
        .directives
        .iter()
        .map(|d| meta("__Directive", MetaNode::Directive { name: d.name.clone() }))
        .collect(),
    ))
  });
}

fn add_type_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__Type", "kind", |index, params| {
    let kind = match type_ref(params)? {
      TypeRef::List(_) => "LIST",
      TypeRef::NonNull(_) => "NON_NULL",
      named => match index.named(&named) {
        Some(TypeDefinition::Scalar(_)) => "SCALAR",
        Some(TypeDefinition::Object(_)) => "OBJECT",
        Some(TypeDefinition::Interface(_)) => "INTERFACE",
        Some(TypeDefinition::Union(_)) => "UNION",
        Some(TypeDefinition::Enum(_)) => "ENUM",
        Some(TypeDefinition::InputObject(_)) => "INPUT_OBJECT",
        None => return Err(anyhow::anyhow!("Unknown kind {:?}", named)),
      },
    };
    Ok(Value::String(kind.to_string()))
  });

  register(resolvers, index, "__Type", "name", |_, params| {
    Ok(match type_ref(params)? {
      TypeRef::Named(name) => Value::String(name),
      _ => Value::Null,
    })
  });

  register(resolvers, index, "__Type", "description", |index, params| {
    Ok(optional_string(
      index
        .named(&type_ref(params)?)
        .and_then(type_definition_description),
    ))
  });

  register(resolvers, index, "__Type", "fields", |index, params| {
    let type_ref = type_ref(params)?;
    let Some(TypeDefinition::Object(_) | TypeDefinition::Interface(_)) = index.named(&type_ref)
    else {
      return Ok(Value::Null);
    };
    let TypeRef::Named(type_name) = type_ref else {
      return Ok(Value::Null);
    };
    let include_deprecated = include_deprecated(params);

    Ok(Value::Array(
      index
        .fields(&type_name)
        .into_iter()
        .flatten()
        .enumerate()
        .filter(|(_, field)| include_deprecated || !is_deprecated(&field.directives))
        .map(|(position, _)| {
          meta(
            "__Field",
            MetaNode::Field {
              type_name: type_name.clone(),
              index: position,
            },
          )
        })
        .collect(),
    ))
  });

  register(resolvers, index, "__Type", "interfaces", |index, params| {
    Ok(match index.named(&type_ref(params)?) {
      Some(TypeDefinition::Object(object_type)) => Value::Array(
        object_type
          .implements_interfaces
          .iter()
          .map(|name| index.type_root(&TypeRef::Named(name.clone())))
          .filter(|root| !root.is_null())
          .collect(),
      ),
      Some(TypeDefinition::Interface(_)) => Value::Array(vec![]),
      _ => Value::Null,
    })
  });

  register(resolvers, index, "__Type", "possibleTypes", |index, params| {
    let names: Vec<String> = match index.named(&type_ref(params)?) {
      Some(TypeDefinition::Union(union_type)) => union_type.types.clone(),
      Some(TypeDefinition::Interface(interface)) => index
        .types
        .iter()
        .filter_map(|t| match t {
          TypeDefinition::Object(object_type)
            if object_type.implements_interfaces.contains(&interface.name) =>
          {
            Some(object_type.name.clone())
          }
          _ => None,
        })
        .collect(),
      _ => return Ok(Value::Null),
    };

    Ok(Value::Array(
      names
        .into_iter()
        .map(|name| index.type_root(&TypeRef::Named(name)))
        .filter(|root| !root.is_null())
        .collect(),
    ))
  });

  register(resolvers, index, "__Type", "enumValues", |index, params| {
    let Some(TypeDefinition::Enum(enum_type)) = index.named(&type_ref(params)?) else {
      return Ok(Value::Null);
    };
    let include_deprecated = include_deprecated(params);

    Ok(Value::Array(
      enum_type
        .values
        .iter()
        .enumerate()
        .filter(|(_, value)| include_deprecated || !is_deprecated(&value.directives))
        .map(|(position, _)| {
          meta(
            "__EnumValue",
            MetaNode::EnumValue {
              type_name: enum_type.name.clone(),
              index: position,
            },
          )
        })
        .collect(),
    ))
  });

  register(resolvers, index, "__Type", "inputFields", |index, params| {
    let Some(TypeDefinition::InputObject(input_type)) = index.named(&type_ref(params)?) else {
      return Ok(Value::Null);
    };

    Ok(Value::Array(
      (0..input_type.fields.len())
        .map(|position| {
          meta(
            "__InputValue",
            MetaNode::InputValue {
              owner: InputOwner::InputObject {
                type_name: input_type.name.clone(),
              },
              index: position,
            },
          )
        })
        .collect(),
    ))
  });

  register(resolvers, index, "__Type", "ofType", |index, params| {
    Ok(match type_ref(params)? {
      TypeRef::List(inner) | TypeRef::NonNull(inner) => index.type_root(&inner),
      TypeRef::Named(_) => Value::Null,
    })
  });
}

fn field_node(params: &ResolverParams) -> anyhow::Result<(String, usize)> {
  match node(params)? {
    MetaNode::Field { type_name, index } => Ok((type_name, index)),
    other => Err(anyhow::anyhow!("Expected a field, got {:?}", other)),
  }
}

fn add_field_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__Field", "name", |index, params| {
    let (type_name, position) = field_node(params)?;
    Ok(Value::String(index.field(&type_name, position)?.name.clone()))
  });
  register(resolvers, index, "__Field", "description", |index, params| {
    let (type_name, position) = field_node(params)?;
    Ok(optional_string(index.field(&type_name, position)?.description.as_ref()))
  });
  register(resolvers, index, "__Field", "args", |index, params| {
    let (type_name, position) = field_node(params)?;
    let arguments = index.field(&type_name, position)?.arguments.len();

    Ok(Value::Array(
      (0..arguments)
        .map(|argument| {
          meta(
            "__InputValue",
            MetaNode::InputValue {
              owner: InputOwner::FieldArguments {
                type_name: type_name.clone(),
                field: position,
              },
              index: argument,
            },
          )
        })
        .collect(),
    ))
  });
  register(resolvers, index, "__Field", "type", |index, params| {
    let (type_name, position) = field_node(params)?;
    Ok(index.type_root(&(&index.field(&type_name, position)?.field_type).into()))
  });
  register(resolvers, index, "__Field", "isDeprecated", |index, params| {
    let (type_name, position) = field_node(params)?;
    Ok(Value::Bool(is_deprecated(
      &index.field(&type_name, position)?.directives,
    )))
  });
  register(resolvers, index, "__Field", "deprecationReason", |index, params| {
    let (type_name, position) = field_node(params)?;
    Ok(deprecation_reason(&index.field(&type_name, position)?.directives))
  });
}

fn input_value_node(params: &ResolverParams) -> anyhow::Result<(InputOwner, usize)> {
  match node(params)? {
    MetaNode::InputValue { owner, index } => Ok((owner, index)),
    other => Err(anyhow::anyhow!("Expected an input value, got {:?}", other)),
  }
}

fn add_input_value_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__InputValue", "name", |index, params| {
    let (owner, position) = input_value_node(params)?;
    Ok(Value::String(index.input_value(&owner, position)?.name.clone()))
  });
  register(resolvers, index, "__InputValue", "description", |index, params| {
    let (owner, position) = input_value_node(params)?;
    Ok(optional_string(index.input_value(&owner, position)?.description.as_ref()))
  });
  register(resolvers, index, "__InputValue", "type", |index, params| {
    let (owner, position) = input_value_node(params)?;
    Ok(index.type_root(&(&index.input_value(&owner, position)?.value_type).into()))
  });
  register(resolvers, index, "__InputValue", "defaultValue", |index, params| {
    let (owner, position) = input_value_node(params)?;
    Ok(
      index
        .input_value(&owner, position)?
        .default_value
        .as_ref()
        .map(|value| Value::String(value.to_string()))
        .unwrap_or(Value::Null),
    )
  });
}

fn enum_value_node(params: &ResolverParams) -> anyhow::Result<(String, usize)> {
  match node(params)? {
    MetaNode::EnumValue { type_name, index } => Ok((type_name, index)),
    other => Err(anyhow::anyhow!("Expected an enum value, got {:?}", other)),
  }
}

fn add_enum_value_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__EnumValue", "name", |index, params| {
    let (type_name, position) = enum_value_node(params)?;
    Ok(Value::String(index.enum_value(&type_name, position)?.name.clone()))
  });
  register(resolvers, index, "__EnumValue", "description", |index, params| {
    let (type_name, position) = enum_value_node(params)?;
    Ok(optional_string(index.enum_value(&type_name, position)?.description.as_ref()))
  });
  register(resolvers, index, "__EnumValue", "isDeprecated", |index, params| {
    let (type_name, position) = enum_value_node(params)?;
    Ok(Value::Bool(is_deprecated(
      &index.enum_value(&type_name, position)?.directives,
    )))
  });
  register(resolvers, index, "__EnumValue", "deprecationReason", |index, params| {
    let (type_name, position) = enum_value_node(params)?;
    Ok(deprecation_reason(&index.enum_value(&type_name, position)?.directives))
  });
}

fn directive_node(params: &ResolverParams) -> anyhow::Result<String> {
  match node(params)? {
    MetaNode::Directive { name } => Ok(name),
    other => Err(anyhow::anyhow!("Expected a directive, got {:?}", other)),
  }
}

fn add_directive_type(resolvers: &mut Resolvers, index: &Arc<SchemaIndex>) {
  register(resolvers, index, "__Directive", "name", |index, params| {
    Ok(Value::String(index.directive(&directive_node(params)?)?.name.clone()))
  });
  register(resolvers, index, "__Directive", "description", |index, params| {
    Ok(optional_string(
      index.directive(&directive_node(params)?)?.description.as_ref(),
    ))
  });
  register(resolvers, index, "__Directive", "locations", |index, params| {
    Ok(Value::Array(
      index
        .directive(&directive_node(params)?)?
        .locations
        .iter()
        .map(|location| Value::String(location.as_str().to_string()))
        .collect(),
    ))
  });
  register(resolvers, index, "__Directive", "args", |index, params| {
    let name = directive_node(params)?;
    let arguments = index.directive(&name)?.arguments.len();

    Ok(Value::Array(
      (0..arguments)
        .map(|argument| {
          meta(
            "__InputValue",
            MetaNode::InputValue {
              owner: InputOwner::DirectiveArguments { name: name.clone() },
              index: argument,
            },
          )
        })
        .collect(),
    ))
  });
  register(resolvers, index, "__Directive", "isRepeatable", |index, params| {
    Ok(Value::Bool(index.directive(&directive_node(params)?)?.repeatable))
  });
}
