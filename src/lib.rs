//! JSONPath and regex rules for mapping token claims to principals.
//!
//! A rule pulls identifiers out of a decoded claim set (for example a JWT
//! payload) with a JSONPath query, optionally followed by a regex that
//! filters, rewrites and case-folds each extracted string:
//!
//! - `$.sub` - the subject claim as-is
//! - `$.user_info.email/([^@]+)@.*/$1/L` - lowercased email local part
//! - `$.groups[*]/^team-(.*)$/$1` - every `team-*` group, prefix stripped
//!
//! ## Configuration Example
//!
//! ```yaml
//! mappings:
//!   - name: "email-local-part"
//!     priority: 100
//!     rule: "$.email/([^@]+)@.*/$1/L"
//!   - name: "subject"
//!     rule: "$.sub"
//! ```

pub mod config;
pub mod mapper;
pub mod path;
pub mod rule;

pub use config::MapperConfig;
pub use mapper::{MapperError, Principal, PrincipalMapper, Resolution};
pub use path::{JsonPath, PathError};
pub use rule::{MappedJsonPath, RuleError};
