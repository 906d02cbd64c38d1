use std::sync::Arc;

use graphql_parser::query::Directive;
use local_schema_common::{ast::OperationKind, graphql::ParsedGraphQLDocument};

use super::{filter_document, Decision, DocumentsPair, SelectionPolicy};

struct WholeOperations;

impl SelectionPolicy for WholeOperations {
  fn decide(&self, _directives: &[Directive<'static, String>]) -> Decision {
    Decision::KeepSubtree
  }

  fn keeps_leaves(&self) -> bool {
    true
  }
}

/// Splits `document` into the operations of `kind` and all other operations, each half keeping
/// only the fragments its operations reach.
#[tracing::instrument(level = "trace", skip(document))]
pub fn split_document_by_operation(
  document: &ParsedGraphQLDocument,
  kind: OperationKind,
) -> DocumentsPair {
  let matching = filter_document(
    document,
    |operation| OperationKind::of(operation) == kind,
    &WholeOperations,
  );
  let other = filter_document(
    document,
    |operation| OperationKind::of(operation) != kind,
    &WholeOperations,
  );

  (matching.map(Arc::new), other.map(Arc::new))
}
