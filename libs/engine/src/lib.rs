pub mod annotate;
pub mod catalogue;
pub mod clean_result;
pub mod document;
pub mod error;
pub mod executor;
pub mod introspection;
pub mod link;
pub mod resolvers;
pub mod source;
pub mod subscription;
pub mod validate;

pub use error::{ExecutionError, SchemaError, ValidationError};
pub use link::{ContextSource, LocalSchemaLink, LocalSchemaLinkOptions, ResponseStream};
pub use resolvers::{
  FieldResolver, ResolverInfo, ResolverOutput, ResolverParams, Resolvers, SubscriptionResolver,
  ValueStream,
};
pub use source::{LocalOperation, RemoteResponse, RemoteSource};
