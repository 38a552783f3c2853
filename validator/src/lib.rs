pub mod config;
pub mod error;
pub mod resolver;
pub mod scope;
pub mod validate;

pub use config::{Conformance, UnresolvedLabelPolicy, ValidatorConfig};
pub use error::{DiagnosticError, ValidationError};
pub use resolver::resolve;
pub use scope::{Scope, ScopeId, ScopeTree};
pub use validate::Validator;
