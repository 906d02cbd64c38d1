mod filter;
pub mod selection;
mod split_by_directive;
mod split_by_operation;

use std::sync::Arc;

use local_schema_common::graphql::ParsedGraphQLDocument;

pub use filter::{filter_document, Decision, SelectionPolicy};
pub use split_by_directive::split_document_by_directive;
pub use split_by_operation::split_document_by_operation;

/// `(matching, rest)` halves of a split; either side is `None` when nothing survived.
pub type DocumentsPair = (
  Option<Arc<ParsedGraphQLDocument>>,
  Option<Arc<ParsedGraphQLDocument>>,
);
