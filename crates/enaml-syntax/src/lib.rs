//! Lexer, parser, AST and static analysis for the **Enaml** declarative
//! UI language (`.enaml`).
//!
//! This crate carries no runtime so that editors and linters can consume
//! it without pulling in the binding machinery.
//!
//! # Structure
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`lexer`] | `Lexer`, `Token`, `TokenKind`; indentation-aware token stream |
//! | [`ast`] | `Module`, `Component`, `Expression`, `Defn`, `Call` |
//! | [`expr`] | AST of the embedded expression language |
//! | [`parser`] | `parse_str`, `parse_expr`, `parse_statements` |
//! | [`operator`] | binding operator names and `BindingKind` |
//! | [`analyzer`] | `dependencies`: the `name.attr` pairs an expression reads |
//! | [`diagnostic`] | source excerpts for error reports |
//! | [`error`] | `SyntaxError` |
//!
//! # Quick start
//!
//! ```rust
//! use enaml_syntax::parse_str;
//!
//! let src = "\
//! Window:
//!     Field f:
//!         value := model.count
//! ";
//!
//! let module = parse_str(src).unwrap();
//! let window = module.components().next().unwrap();
//! assert_eq!(window.name, "Window");
//! assert_eq!(window.body.children[0].identifier.as_deref(), Some("f"));
//! ```

pub mod analyzer;
pub mod ast;
pub mod diagnostic;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod operator;
pub mod parser;

pub use analyzer::{Dependency, dependencies};
pub use ast::Module;
pub use error::{SyntaxError, SyntaxErrorKind};
pub use operator::BindingKind;
pub use parser::{parse_expr, parse_statements, parse_str};

#[cfg(test)]
mod parse_tests {
    use super::*;

    fn ok(src: &str) { parse_str(src).unwrap(); }
    fn err(src: &str) { parse_str(src).unwrap_err(); }

    #[test] fn empty_module() { ok(""); }
    #[test] fn comment_only() { ok("# nothing here\n"); }
    #[test] fn single_component() { ok("Window:\n    title = 'Hello'\n"); }
    #[test] fn nested_components() {
        ok("Window:\n    Container:\n        Label:\n            text = 'a'\n        Field:\n            value = 1\n");
    }
    #[test] fn all_binding_operators() {
        ok("Field:\n    a = 1\n    b << m.x\n    c := m.y\n    d >> print(msg.new)\n");
    }
    #[test] fn custom_operator() { ok("Field:\n    value <<< m.x\n"); }
    #[test] fn crlf_line_endings() { ok("Window:\r\n    title = 'x'\r\n"); }
    #[test] fn tab_indentation() { ok("Window:\n\ttitle = 'x'\n"); }
    #[test] fn multiline_expression() {
        ok("Label:\n    text = '%s and %s' % (\n        a.b,\n        c.d,\n    )\n");
    }
    #[test] fn string_formatting_rhs() { ok("Label:\n    text << 'Count: %d' % model.count\n"); }
    #[test] fn imports() { ok("import math\nfrom math import pi, sqrt\nWindow:\n    pass\n"); }
    #[test] fn docstring_module() { ok("\"\"\"Module docs.\"\"\"\nWindow:\n    pass\n"); }
    #[test] fn raw_python() { ok(":: python ::\nx = 1\n:: end ::\nWindow:\n    title = str(x)\n"); }
    #[test] fn defn_and_component() {
        ok("defn Pair(a, b=2):\n    Label(a)\n    Label(b)\nWindow:\n    pass\n");
    }
    #[test] fn lambda_rhs() { ok("PushButton:\n    clicked >> (lambda: None)()\n"); }
    #[test] fn conditional_rhs() { ok("Label:\n    text << 'on' if m.flag else 'off'\n"); }
    #[test] fn err_missing_block() { err("Window:\nField:\n"); }
    #[test] fn err_bad_indent() { err("Window:\n    a = 1\n  b = 2\n"); }
    #[test] fn err_deep_lhs() { err("Field:\n    a.b.c = 1\n"); }
    #[test] fn err_missing_rhs() { err("Field:\n    a = \n"); }
    #[test] fn err_unterminated_string() { err("Label:\n    text = 'oops\n"); }
    #[test] fn err_unterminated_python() { err(":: python ::\nx = 1\n"); }
    #[test] fn err_illegal_char() { err("Label:\n    text = `x`\n"); }
    #[test] fn err_binding_at_top_level() { err("value = 1\n"); }
}
