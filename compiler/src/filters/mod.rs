//! Filter compiler
//!
//! Turns a nested, declarative filter body into a parameterized boolean SQL
//! predicate plus a table of bind values.
//!
//! ## Usage
//!
//! ```
//! use filter_compiler::filters::{Combinator, FilterCompiler, FilterDescriptor, FilterSet, Predicate};
//! use serde_json::json;
//!
//! let filters = FilterSet::new()
//!     .with("author", FilterDescriptor::reference("posts.author_id").with_class_name("User"))
//!     .with("created", FilterDescriptor::timestamp_range("posts.created_at"));
//! let mut compiler = FilterCompiler::new(filters);
//!
//! let body = json!({"author": {"only": ["User/1", "User/2"]}, "created": {"after": "2024-01-01"}});
//! let predicate = compiler.generate(&body, Combinator::All).unwrap();
//! assert_eq!(
//!     predicate,
//!     Predicate::Sql("((posts.author_id IN (:p1)) AND (posts.created_at > :p2))".to_string())
//! );
//! assert_eq!(compiler.params().len(), 2);
//! ```

mod adjust;
mod body;
mod compiler;
mod error;
mod params;
mod reference;
mod strategies;
mod types;

pub use body::{
    FilterBody, MAX_KEY_SEGMENTS, Membership, RequestParams, SetBody, dedup, difference,
    membership,
};
pub use compiler::{FilterCompiler, MAX_BODY_DEPTH};
pub use error::FilterError;
pub use params::{DEFAULT_PLACEHOLDER_PREFIX, SqlParams};
pub use reference::{ObjectRef, resolve_fingerprint, resolve_id};
pub use strategies::{RangeOp, generate_simple_clause};
pub use types::{
    BindValue, Combinator, Convert, ConvertFn, CustomGenerator, FilterDescriptor, FilterKind,
    FilterSet, ListSide, Predicate,
};
