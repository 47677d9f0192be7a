//! Template expander for mortar pages.
//!
//! Pages are plain text files. Two directives compose them: `extend` wraps a
//! page body in a template (handed over as `content`), and `include` renders
//! a part with its own variables. Expressions inside text are evaluated with
//! minijinja.

pub mod directive;
pub mod render;

pub use directive::{parse, Node, SyntaxError};
pub use minijinja::Value;
pub use render::{Expander, RenderError, Scope, CONTENT};
