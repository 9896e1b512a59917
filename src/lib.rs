pub mod api;
pub mod ast;
pub mod batch;
pub mod conditional;
pub mod config;
pub mod error;
pub mod expander;
pub mod include;
pub mod lexer;
pub mod macros;
pub mod parser;
pub mod schema;
pub mod source;
pub mod utils;
mod serialization;

pub use api::{resolve_file, resolve_str, OutputFormat, Resolution};
pub use ast::{DocumentNode, Number, Scalar, ValueKind};
pub use config::{PreDefinition, ResolveOptions};
pub use error::{ConfcError, ResolveError, ValidationError, ValidationReport};
pub use schema::{Schema, SchemaRule};
