use crate::expr::{Expr, Stmt};
use crate::operator::OperatorRef;

// ── Module ────────────────────────────────────────────────────────────────

/// A parsed `.enaml` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub doc: Option<String>,
    pub body: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Import(Import),
    RawPython(RawPython),
    Component(Component),
    Defn(Defn),
}

impl Module {
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.body.iter().filter_map(|item| match item {
            Item::Component(c) => Some(c),
            _ => None,
        })
    }

    pub fn defns(&self) -> impl Iterator<Item = &Defn> {
        self.body.iter().filter_map(|item| match item {
            Item::Defn(d) => Some(d),
            _ => None,
        })
    }
}

// ── Imports and raw python ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Import {
    /// `import a.b as c`; one entry per comma-separated module.
    Modules { names: Vec<(String, Option<String>)>, line: usize },
    /// `from a.b import x as y`.
    From { module: String, names: Vec<(String, Option<String>)>, line: usize },
    /// `from a import *`.
    Star { module: String, line: usize },
}

impl Import {
    pub fn line(&self) -> usize {
        match self {
            Import::Modules { line, .. } | Import::From { line, .. } | Import::Star { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawPython {
    /// The block text, padded so its line numbers match the file.
    pub source: String,
    pub body: Vec<Stmt>,
    pub line: usize,
}

// ── Components ────────────────────────────────────────────────────────────

/// `Type [identifier]:` followed by an indented body.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub identifier: Option<String>,
    pub body: ComponentBody,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComponentBody {
    pub expressions: Vec<Expression>,
    pub children: Vec<Component>,
}

/// Left-hand side of a binding: `attr` or `root.attr`.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingTarget {
    pub root: Option<String>,
    pub leaf: String,
}

impl BindingTarget {
    pub fn dotted(&self) -> String {
        match &self.root {
            Some(root) => format!("{root}.{}", self.leaf),
            None => self.leaf.clone(),
        }
    }
}

/// One binding line inside a component body.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub lhs: BindingTarget,
    pub op: OperatorRef,
    pub rhs: Expr,
    pub line: usize,
}

// ── Definitions ───────────────────────────────────────────────────────────

/// `defn Name(params):`, a reusable parameterised block of calls.
#[derive(Debug, Clone, PartialEq)]
pub struct Defn {
    pub name: String,
    pub params: Params,
    pub doc: Option<String>,
    pub body: Vec<CallItem>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Params {
    pub names: Vec<String>,
    /// Defaults for the trailing parameters, aligned to the end of `names`.
    pub defaults: Vec<Expr>,
}

impl Params {
    pub fn required(&self) -> usize {
        self.names.len() - self.defaults.len()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallItem {
    Call(Call),
    Assignment(Assignment),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Positional(Expr),
    Keyword(String, Expr),
}

/// `name as alias` or `* as alias` after the unpack arrow.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    /// `None` captures the whole namespace.
    pub name: Option<String>,
    pub alias: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub name: String,
    pub arguments: Vec<Argument>,
    pub unpack: Vec<String>,
    pub captures: Vec<Capture>,
    pub body: Vec<CallItem>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// `attr`: binds `attr` on every component the enclosing call produced.
    Name(String),
    /// `name.attr`
    Attr { name: String, attr: String },
    /// `name[index].attr`
    Index { name: String, index: i64, attr: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: AssignTarget,
    pub op: OperatorRef,
    pub rhs: Expr,
    pub line: usize,
}
