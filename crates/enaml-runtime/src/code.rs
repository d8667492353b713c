use std::collections::BTreeSet;
use std::fmt;

use enaml_syntax::expr::{Expr, ExprKind};
use enaml_syntax::{dependencies, Dependency};

use crate::error::Result;
use crate::eval::evaluate;
use crate::namespace::Scope;
use crate::value::Value;

/// A binding's right-hand side, ready to evaluate.
///
/// The dependency set is computed once, when the expression is compiled.
/// Evaluation errors carry the expression's source line.
pub struct CompiledExpr {
    expr: Expr,
    dependencies: BTreeSet<Dependency>,
    line: usize,
}

impl CompiledExpr {
    pub fn new(expr: Expr) -> Self {
        let dependencies = dependencies(&expr);
        let line = expr.line;
        Self { expr, dependencies, line }
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn dependencies(&self) -> &BTreeSet<Dependency> {
        &self.dependencies
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// The `(root, attr)` pair when the expression is exactly `root.attr`.
    pub fn as_attribute_ref(&self) -> Option<(&str, &str)> {
        match &self.expr.kind {
            ExprKind::Attribute { value, attr } => value.as_name().map(|root| (root, attr.as_str())),
            _ => None,
        }
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Value> {
        evaluate(&self.expr, scope).map_err(|e| e.at_line(self.line))
    }
}

impl fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("line", &self.line)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use enaml_syntax::parse_expr;

    fn compile(src: &str, line: usize) -> CompiledExpr {
        let mut expr = parse_expr(src).unwrap();
        expr.set_locations(line, 1);
        CompiledExpr::new(expr)
    }

    #[test]
    fn dependencies_are_precomputed() {
        let code = compile("model.count + other.value", 3);
        let deps: Vec<_> = code.dependencies().iter().map(|d| d.root.as_str()).collect();
        assert_eq!(deps, ["model", "other"]);
        assert_eq!(code.line(), 3);
    }

    #[test]
    fn attribute_ref_shape() {
        assert_eq!(compile("model.count", 1).as_attribute_ref(), Some(("model", "count")));
        assert_eq!(compile("model.a.b", 1).as_attribute_ref(), None);
        assert_eq!(compile("model", 1).as_attribute_ref(), None);
    }
}
