pub mod ast;
pub mod graphql;
pub mod json;
pub use graphql_parser::query::{Definition, Document, OperationDefinition, ParseError};
