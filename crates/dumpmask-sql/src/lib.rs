//! # dumpmask-sql
//!
//! Masking engine for SQL dumps.
//!
//! This crate provides functionality to:
//! - Compile per-table, per-column masking templates
//! - Recognize `INSERT` statements in a dump and parse them with `sqlparser`
//! - Replace the literal values of configured columns with rendered templates
//! - Drive a whole dump through the rewriter, sequentially or in parallel
//!
//! ## How It Works
//!
//! With the rule `users.email: "{{ .First 3 }}***"`:
//!
//! **Before:**
//! ```sql
//! INSERT INTO users (id, email) VALUES (1, 'alice@example.com');
//! ```
//!
//! **After:**
//! ```sql
//! INSERT INTO users (id, email) VALUES (1, 'ali***');
//! ```
//!
//! ## Line Handling
//!
//! | Line                                  | Output                          |
//! |---------------------------------------|---------------------------------|
//! | not an `INSERT`                       | unchanged                       |
//! | `INSERT` that fails to parse          | unchanged, warning logged       |
//! | `INSERT` into a table without rules   | unchanged                       |
//! | `INSERT` without a column list        | unchanged, warning logged       |
//! | `INSERT` into a masked table          | re-serialized with masked cells |
//! | empty line                            | dropped                         |

pub mod error;
pub mod escape;
pub mod parser;
pub mod rewriter;
pub mod rules;
pub mod stream;
pub mod template;

pub use error::MaskError;
pub use parser::StatementParser;
pub use rewriter::{is_insert_candidate, LineOutput, Rewriter, Rewritten};
pub use rules::{MaskingRules, TableRules};
pub use stream::{StreamDriver, StreamStats};
pub use template::{CompiledTemplate, TemplateValue};
