use std::fmt::{Display, Formatter};

use graphql_parser::query::{Directive, OperationDefinition, SelectionSet, Type, VariableDefinition};
use serde::{Deserialize, Serialize};

pub type ParsedSelectionSet = SelectionSet<'static, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
  Query,
  Mutation,
  Subscription,
}

impl OperationKind {
  pub fn of(operation: &OperationDefinition<'_, String>) -> Self {
    match operation {
      OperationDefinition::SelectionSet(_) | OperationDefinition::Query(_) => OperationKind::Query,
      OperationDefinition::Mutation(_) => OperationKind::Mutation,
      OperationDefinition::Subscription(_) => OperationKind::Subscription,
    }
  }

  /// The conventional root type name for this kind, e.g. `Query`.
  pub fn root_type_name(&self) -> &'static str {
    match self {
      OperationKind::Query => "Query",
      OperationKind::Mutation => "Mutation",
      OperationKind::Subscription => "Subscription",
    }
  }
}

impl Display for OperationKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      OperationKind::Query => write!(f, "query"),
      OperationKind::Mutation => write!(f, "mutation"),
      OperationKind::Subscription => write!(f, "subscription"),
    }
  }
}

pub fn operation_selection_set<'a, 'b>(
  operation: &'b OperationDefinition<'a, String>,
) -> &'b SelectionSet<'a, String> {
  match operation {
    OperationDefinition::SelectionSet(s) => s,
    OperationDefinition::Query(q) => &q.selection_set,
    OperationDefinition::Mutation(m) => &m.selection_set,
    OperationDefinition::Subscription(s) => &s.selection_set,
  }
}

pub fn operation_variable_definitions<'a, 'b>(
  operation: &'b OperationDefinition<'a, String>,
) -> &'b [VariableDefinition<'a, String>] {
  match operation {
    OperationDefinition::SelectionSet(_) => &[],
    OperationDefinition::Query(q) => &q.variable_definitions,
    OperationDefinition::Mutation(m) => &m.variable_definitions,
    OperationDefinition::Subscription(s) => &s.variable_definitions,
  }
}

/// Copies an operation, replacing its top-level selection set.
pub fn with_selection_set<'a>(
  operation: &OperationDefinition<'a, String>,
  selection_set: SelectionSet<'a, String>,
) -> OperationDefinition<'a, String> {
  let mut copy = operation.clone();
  match &mut copy {
    OperationDefinition::SelectionSet(s) => *s = selection_set,
    OperationDefinition::Query(q) => q.selection_set = selection_set,
    OperationDefinition::Mutation(m) => m.selection_set = selection_set,
    OperationDefinition::Subscription(s) => s.selection_set = selection_set,
  }
  copy
}

pub fn has_directive(directives: &[Directive<'_, String>], name: &str) -> bool {
  directives.iter().any(|directive| directive.name == name)
}

pub fn find_directive<'a, 'b>(
  directives: &'b [Directive<'a, String>],
  name: &str,
) -> Option<&'b Directive<'a, String>> {
  directives.iter().find(|directive| directive.name == name)
}

/// The innermost named type, after stripping list and non-null wrappers.
pub fn get_type_name<'a>(field_type: &'a Type<'_, String>) -> &'a str {
  match field_type {
    Type::NamedType(name) => name,
    Type::ListType(inner) | Type::NonNullType(inner) => get_type_name(inner),
  }
}

/// Whether the type is a list, looking through a non-null wrapper.
pub fn is_deep_list_type(field_type: &Type<'_, String>) -> bool {
  match field_type {
    Type::NonNullType(inner) => is_deep_list_type(inner),
    Type::ListType(_) => true,
    Type::NamedType(_) => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_type_wrappers() {
    let t: Type<'static, String> = Type::NonNullType(Box::new(Type::ListType(Box::new(
      Type::NonNullType(Box::new(Type::NamedType("Item".to_string()))),
    ))));

    assert_eq!(get_type_name(&t), "Item");
    assert!(is_deep_list_type(&t));
    assert!(!is_deep_list_type(&Type::NamedType("Item".to_string())));
  }

  #[test]
  fn root_type_names() {
    assert_eq!(OperationKind::Query.root_type_name(), "Query");
    assert_eq!(OperationKind::Subscription.to_string(), "subscription");
  }
}
