//! Static discovery of the `name.attr` pairs an expression reads.
//!
//! Only one level of attribute access hanging directly off a bare name is
//! tracked. `a.b` yields `(a, b)`; `a.b.c` yields nothing because `c` hangs
//! off the attribute `a.b`, not a name; `a.b()` yields nothing because the
//! attribute is called rather than read. Arguments, subscripts and operands
//! inside such chains are still visited, so `f(a.b)` yields `(a, b)`.

use std::collections::BTreeSet;

use crate::expr::{Expr, ExprKind};

/// One tracked read: the attribute `attr` of the object bound to `root`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Dependency {
    pub root: String,
    pub attr: String,
}

impl Dependency {
    pub fn new(root: impl Into<String>, attr: impl Into<String>) -> Self {
        Self { root: root.into(), attr: attr.into() }
    }
}

/// Returns the de-duplicated set of dependencies of `expr`.
pub fn dependencies(expr: &Expr) -> BTreeSet<Dependency> {
    let mut deps = BTreeSet::new();
    visit(expr, &mut deps);
    deps
}

fn visit(expr: &Expr, deps: &mut BTreeSet<Dependency>) {
    match &expr.kind {
        ExprKind::Attribute { value, attr } => match &value.kind {
            ExprKind::Name(root) => {
                deps.insert(Dependency::new(root.as_str(), attr.as_str()));
            }
            _ => visit_chain(value, deps),
        },
        ExprKind::Call { func, args, keywords } => {
            visit_chain(func, deps);
            args.iter().for_each(|a| visit(a, deps));
            keywords.iter().for_each(|(_, v)| visit(v, deps));
        }
        ExprKind::Subscript { value, index } => {
            visit(value, deps);
            visit(index, deps);
        }
        ExprKind::Name(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {}
        ExprKind::Unary { operand, .. } => visit(operand, deps),
        ExprKind::Binary { left, right, .. } => {
            visit(left, deps);
            visit(right, deps);
        }
        ExprKind::Compare { left, comparators, .. } => {
            visit(left, deps);
            comparators.iter().for_each(|c| visit(c, deps));
        }
        ExprKind::BoolOp { values, .. } => values.iter().for_each(|v| visit(v, deps)),
        ExprKind::IfExp { test, body, orelse } => {
            visit(test, deps);
            visit(body, deps);
            visit(orelse, deps);
        }
        ExprKind::List(items) | ExprKind::Tuple(items) => items.iter().for_each(|i| visit(i, deps)),
        ExprKind::Dict(pairs) => pairs.iter().for_each(|(k, v)| {
            visit(k, deps);
            visit(v, deps);
        }),
        ExprKind::Lambda { body, .. } => visit(body, deps),
    }
}

/// Walks the object part of an attribute chain or a callee. Attribute
/// accesses here are not reads of a name's attribute and are discarded.
fn visit_chain(expr: &Expr, deps: &mut BTreeSet<Dependency>) {
    match &expr.kind {
        ExprKind::Attribute { value, .. } => visit_chain(value, deps),
        ExprKind::Name(_) => {}
        _ => visit(expr, deps),
    }
}
