use std::sync::Arc;

use graphql_parser::query::Directive;
use local_schema_common::{ast::has_directive, graphql::ParsedGraphQLDocument};

use super::{filter_document, Decision, DocumentsPair, SelectionPolicy};

/// Marked selections are kept with everything below them. Unmarked selections survive only as
/// ancestors of a marked one.
struct LocalHalf<'a> {
  directive: &'a str,
}

impl SelectionPolicy for LocalHalf<'_> {
  fn decide(&self, directives: &[Directive<'static, String>]) -> Decision {
    match has_directive(directives, self.directive) {
      true => Decision::KeepSubtree,
      false => Decision::Descend,
    }
  }

  fn keeps_leaves(&self) -> bool {
    false
  }
}

/// Everything except the selections that carry the marker themselves.
struct RemainingHalf<'a> {
  directive: &'a str,
}

impl SelectionPolicy for RemainingHalf<'_> {
  fn decide(&self, directives: &[Directive<'static, String>]) -> Decision {
    match has_directive(directives, self.directive) {
      true => Decision::Drop,
      false => Decision::Descend,
    }
  }

  fn keeps_leaves(&self) -> bool {
    true
  }
}

/// Splits `document` into the part resolved locally (selections marked with `@directive`, and
/// everything nested below them) and the remaining part to delegate.
#[tracing::instrument(level = "trace", skip(document))]
pub fn split_document_by_directive(
  document: &ParsedGraphQLDocument,
  directive: &str,
) -> DocumentsPair {
  let local = filter_document(document, |_| true, &LocalHalf { directive });
  let remaining = filter_document(document, |_| true, &RemainingHalf { directive });

  (local.map(Arc::new), remaining.map(Arc::new))
}
