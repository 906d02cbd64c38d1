use std::collections::{HashMap, HashSet};

use graphql_parser::query::{
  Definition, Directive, FragmentDefinition, OperationDefinition, Selection, SelectionSet,
};
use local_schema_common::{
  ast::{operation_selection_set, with_selection_set},
  graphql::ParsedGraphQLDocument,
};

type ParsedSelectionSet = SelectionSet<'static, String>;

/// What to do with a selection that is not already inside a kept subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  /// Remove the selection and everything below it.
  Drop,
  /// Copy the selection verbatim, including every fragment it reaches.
  KeepSubtree,
  /// Keep the selection only if something survives below it (or, for leaves, if the policy
  /// keeps leaves).
  Descend,
}

pub trait SelectionPolicy {
  fn decide(&self, directives: &[Directive<'static, String>]) -> Decision;
  fn keeps_leaves(&self) -> bool;
}

/// Copies `document` keeping the operations accepted by `keep_operation`, filtering their
/// selections through `policy`. Operations left empty are dropped, and only fragments reached
/// from a surviving spread are kept. Returns `None` when no operation survives.
pub fn filter_document<F>(
  document: &ParsedGraphQLDocument,
  keep_operation: F,
  policy: &dyn SelectionPolicy,
) -> Option<ParsedGraphQLDocument>
where
  F: Fn(&OperationDefinition<'static, String>) -> bool,
{
  let fragments = document
    .definitions
    .iter()
    .filter_map(|definition| match definition {
      Definition::Fragment(fragment) => Some((fragment.name.as_str(), fragment)),
      _ => None,
    })
    .collect::<HashMap<_, _>>();

  let mut filter = TreeFilter {
    policy,
    fragments,
    whole: HashSet::new(),
    partial: HashSet::new(),
    partial_contents: HashMap::new(),
    in_progress: HashSet::new(),
  };

  let mut definitions = Vec::new();

  for definition in &document.definitions {
    if let Definition::Operation(operation) = definition {
      if !keep_operation(operation) {
        continue;
      }

      let selection_set = filter.filter(operation_selection_set(operation));
      if !selection_set.items.is_empty() {
        definitions.push(Definition::Operation(with_selection_set(
          operation,
          selection_set,
        )));
      }
    }
  }

  if definitions.is_empty() {
    return None;
  }

  // Usage is only known once every operation was walked, fragments are pruned afterwards.
  for definition in &document.definitions {
    if let Definition::Fragment(fragment) = definition {
      if filter.whole.contains(fragment.name.as_str()) {
        definitions.push(Definition::Fragment(fragment.clone()));
      } else if filter.partial.contains(fragment.name.as_str()) {
        if let Some(Some(selection_set)) = filter.partial_contents.get(fragment.name.as_str()) {
          definitions.push(Definition::Fragment(FragmentDefinition {
            selection_set: selection_set.clone(),
            ..fragment.clone()
          }));
        }
      }
    }
  }

  Some(ParsedGraphQLDocument { definitions })
}

struct TreeFilter<'d, 'p> {
  policy: &'p dyn SelectionPolicy,
  fragments: HashMap<&'d str, &'d FragmentDefinition<'static, String>>,
  // Fragments reached from inside a kept subtree: emitted verbatim.
  whole: HashSet<&'d str>,
  // Fragments reached through a descending spread: emitted with their filtered contents.
  partial: HashSet<&'d str>,
  partial_contents: HashMap<&'d str, Option<ParsedSelectionSet>>,
  in_progress: HashSet<&'d str>,
}

impl<'d, 'p> TreeFilter<'d, 'p> {
  fn filter(&mut self, selection_set: &'d ParsedSelectionSet) -> ParsedSelectionSet {
    let mut items = Vec::with_capacity(selection_set.items.len());

    for selection in &selection_set.items {
      let directives = match selection {
        Selection::Field(field) => &field.directives,
        Selection::InlineFragment(inline_fragment) => &inline_fragment.directives,
        Selection::FragmentSpread(spread) => &spread.directives,
      };

      match self.policy.decide(directives) {
        Decision::Drop => {}
        Decision::KeepSubtree => {
          self.mark_whole(selection);
          items.push(selection.clone());
        }
        Decision::Descend => {
          if let Some(kept) = self.descend(selection) {
            items.push(kept);
          }
        }
      }
    }

    SelectionSet {
      span: selection_set.span,
      items,
    }
  }

  fn descend(&mut self, selection: &'d Selection<'static, String>) -> Option<Selection<'static, String>> {
    match selection {
      Selection::Field(field) => {
        if field.selection_set.items.is_empty() {
          return self.policy.keeps_leaves().then(|| selection.clone());
        }

        let children = self.filter(&field.selection_set);
        if children.items.is_empty() {
          return None;
        }

        let mut field = field.clone();
        field.selection_set = children;
        Some(Selection::Field(field))
      }
      Selection::InlineFragment(inline_fragment) => {
        let children = self.filter(&inline_fragment.selection_set);
        if children.items.is_empty() {
          return None;
        }

        let mut inline_fragment = inline_fragment.clone();
        inline_fragment.selection_set = children;
        Some(Selection::InlineFragment(inline_fragment))
      }
      Selection::FragmentSpread(spread) => {
        let Some((name, _)) = self.fragments.get_key_value(spread.fragment_name.as_str()) else {
          // Unknown fragments are left for validation to report.
          return self.policy.keeps_leaves().then(|| selection.clone());
        };
        let name = *name;

        if self.partial_fragment(name) {
          self.partial.insert(name);
          Some(selection.clone())
        } else {
          None
        }
      }
    }
  }

  /// Filters a fragment's contents once, returning whether anything survived.
  fn partial_fragment(&mut self, name: &'d str) -> bool {
    if let Some(contents) = self.partial_contents.get(name) {
      return contents.is_some();
    }

    let Some(fragment) = self.fragments.get(name).copied() else {
      return false;
    };

    // Cyclic spreads are invalid; stop instead of recursing forever.
    if !self.in_progress.insert(name) {
      return false;
    }
    let children = self.filter(&fragment.selection_set);
    self.in_progress.remove(name);

    let contents = (!children.items.is_empty()).then_some(children);
    let survived = contents.is_some();
    self.partial_contents.insert(name, contents);
    survived
  }

  fn mark_whole(&mut self, selection: &'d Selection<'static, String>) {
    match selection {
      Selection::Field(field) => self.mark_whole_set(&field.selection_set),
      Selection::InlineFragment(inline_fragment) => {
        self.mark_whole_set(&inline_fragment.selection_set)
      }
      Selection::FragmentSpread(spread) => {
        if let Some(fragment) = self.fragments.get(spread.fragment_name.as_str()).copied() {
          if self.whole.insert(fragment.name.as_str()) {
            self.mark_whole_set(&fragment.selection_set);
          }
        }
      }
    }
  }

  fn mark_whole_set(&mut self, selection_set: &'d ParsedSelectionSet) {
    for selection in &selection_set.items {
      self.mark_whole(selection);
    }
  }
}
