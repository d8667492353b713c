//! AST for the embedded expression language used on the right-hand side of
//! bindings, in call arguments, and in raw python blocks.

// ── Expressions ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Int(i64),
    Float(f64),
    Str(String),
    Attribute { value: Box<Expr>, attr: String },
    Subscript { value: Box<Expr>, index: Box<Expr> },
    Call { func: Box<Expr>, args: Vec<Expr>, keywords: Vec<(String, Expr)> },
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { left: Box<Expr>, op: BinOp, right: Box<Expr> },
    /// `a < b <= c`; `ops.len() == comparators.len()`.
    Compare { left: Box<Expr>, ops: Vec<CmpOp>, comparators: Vec<Expr> },
    BoolOp { op: BoolOp, values: Vec<Expr> },
    IfExp { test: Box<Expr>, body: Box<Expr>, orelse: Box<Expr> },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    Lambda { params: Vec<String>, body: Box<Expr> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Pow,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Add,
    Sub,
    LShift,
    RShift,
    BitAnd,
    BitXor,
    BitOr,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Pow => "**",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::LShift => "<<",
            BinOp::RShift => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::BitOr => "|",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

impl Expr {
    pub fn new(kind: ExprKind, line: usize, col: usize) -> Self {
        Self { kind, line, col }
    }

    /// `Some(name)` when this is a bare name reference.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Name(n) => Some(n),
            _ => None,
        }
    }

    /// Forces `line` and `col` onto this node and every node below it, so
    /// errors raised while evaluating a sub-expression point at the line of
    /// the binding that owns it.
    pub fn set_locations(&mut self, line: usize, col: usize) {
        self.line = line;
        self.col = col;
        self.for_each_child_mut(&mut |child| child.set_locations(line, col));
    }

    fn for_each_child_mut(&mut self, f: &mut impl FnMut(&mut Expr)) {
        match &mut self.kind {
            ExprKind::Name(_) | ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) => {}
            ExprKind::Attribute { value, .. } => f(value),
            ExprKind::Subscript { value, index } => {
                f(value);
                f(index);
            }
            ExprKind::Call { func, args, keywords } => {
                f(func);
                args.iter_mut().for_each(&mut *f);
                keywords.iter_mut().for_each(|(_, v)| f(v));
            }
            ExprKind::Unary { operand, .. } => f(operand),
            ExprKind::Binary { left, right, .. } => {
                f(left);
                f(right);
            }
            ExprKind::Compare { left, comparators, .. } => {
                f(left);
                comparators.iter_mut().for_each(&mut *f);
            }
            ExprKind::BoolOp { values, .. } => values.iter_mut().for_each(&mut *f),
            ExprKind::IfExp { test, body, orelse } => {
                f(test);
                f(body);
                f(orelse);
            }
            ExprKind::List(items) | ExprKind::Tuple(items) => items.iter_mut().for_each(&mut *f),
            ExprKind::Dict(pairs) => pairs.iter_mut().for_each(|(k, v)| {
                f(k);
                f(v);
            }),
            ExprKind::Lambda { body, .. } => f(body),
        }
    }
}

// ── Statements ────────────────────────────────────────────────────────────

/// A simple statement from a raw python block.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Assign { target: String, value: Expr, line: usize },
    Expr(Expr),
    Pass,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(n: &str, line: usize) -> Expr {
        Expr::new(ExprKind::Name(n.into()), line, 0)
    }

    #[test]
    fn set_locations_reaches_every_node() {
        let mut e = Expr::new(
            ExprKind::Binary {
                left: Box::new(name("a", 1)),
                op: BinOp::Add,
                right: Box::new(Expr::new(
                    ExprKind::Call { func: Box::new(name("f", 1)), args: vec![name("b", 1)], keywords: vec![] },
                    1,
                    4,
                )),
            },
            1,
            0,
        );
        e.set_locations(12, 3);
        let ExprKind::Binary { left, right, .. } = &e.kind else { panic!() };
        assert_eq!((left.line, left.col), (12, 3));
        let ExprKind::Call { func, args, .. } = &right.kind else { panic!() };
        assert_eq!(func.line, 12);
        assert_eq!(args[0].line, 12);
    }
}
