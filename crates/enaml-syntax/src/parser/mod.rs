mod expression;

use std::collections::HashSet;

use crate::ast::{
    Argument, AssignTarget, Assignment, BindingTarget, Call, CallItem, Capture, Component,
    ComponentBody, Defn, Expression, Import, Item, Module, Params, RawPython,
};
use crate::error::SyntaxError;
use crate::expr::{Expr, Stmt};
use crate::lexer::{Keyword, Lexer, Op, Token, TokenKind};
use crate::operator::OperatorRef;

type PResult<T> = Result<T, SyntaxError>;

// ── Parser ────────────────────────────────────────────────────────────────

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn peek(&self) -> &TokenKind {
        self.tokens.get(self.pos).map(|t| &t.kind).unwrap_or(&TokenKind::EndMarker)
    }

    /// Look at the token `offset` positions ahead of current without consuming.
    fn peek_ahead(&self, offset: usize) -> &TokenKind {
        self.tokens.get(self.pos + offset).map(|t| &t.kind).unwrap_or(&TokenKind::EndMarker)
    }

    fn advance(&mut self) -> TokenKind {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, msg: impl Into<String>) -> SyntaxError {
        SyntaxError::syntax(msg, self.line())
    }

    fn unexpected(&self, expected: &str) -> SyntaxError {
        self.err(format!("invalid syntax: expected {expected}, got {}", self.peek()))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.to_string()))
        }
    }

    fn expect_op(&mut self, op: Op) -> PResult<()> {
        self.expect(&TokenKind::Op(op))
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.peek().clone() {
            TokenKind::Name(n) => {
                self.advance();
                Ok(n)
            }
            _ => Err(self.unexpected("a name")),
        }
    }

    fn at_keyword(&self, kw: Keyword) -> bool {
        self.peek() == &TokenKind::Keyword(kw)
    }

    /// `NEWLINE INDENT`, the opening of every block.
    fn expect_block_start(&mut self) -> PResult<()> {
        self.expect(&TokenKind::Newline)?;
        self.expect(&TokenKind::Indent)
    }

    /// A `STRING NEWLINE` pair at the current position, consumed if present.
    fn docstring(&mut self) -> Option<String> {
        if let (TokenKind::Str(s), TokenKind::Newline) = (self.peek(), self.peek_ahead(1)) {
            let doc = s.clone();
            self.pos += 2;
            Some(doc)
        } else {
            None
        }
    }

    // ── Module ────────────────────────────────────────────────────────────

    pub fn parse_module(&mut self) -> PResult<Module> {
        let doc = self.docstring();
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                }
                TokenKind::Keyword(Keyword::Import | Keyword::From) => {
                    body.push(Item::Import(self.parse_import()?));
                }
                TokenKind::PyBlockStart => body.push(Item::RawPython(self.parse_raw_python()?)),
                TokenKind::Keyword(Keyword::Defn) => body.push(Item::Defn(self.parse_defn()?)),
                TokenKind::Name(_) => body.push(Item::Component(self.parse_component()?)),
                _ => return Err(self.unexpected("a declaration")),
            }
        }
        Ok(Module { doc, body })
    }

    // ── Import ────────────────────────────────────────────────────────────

    fn dotted_name(&mut self) -> PResult<String> {
        let mut name = self.expect_name()?;
        while self.eat(&TokenKind::Op(Op::Dot)) {
            name.push('.');
            name.push_str(&self.expect_name()?);
        }
        Ok(name)
    }

    fn alias(&mut self) -> PResult<Option<String>> {
        if self.at_keyword(Keyword::As) {
            self.advance();
            Ok(Some(self.expect_name()?))
        } else {
            Ok(None)
        }
    }

    fn parse_import(&mut self) -> PResult<Import> {
        let line = self.line();
        let import = if self.at_keyword(Keyword::Import) {
            self.advance();
            let mut names = Vec::new();
            loop {
                let name = self.dotted_name()?;
                names.push((name, self.alias()?));
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            Import::Modules { names, line }
        } else {
            self.advance(); // consume `from`
            let module = self.dotted_name()?;
            self.expect(&TokenKind::Keyword(Keyword::Import))?;
            if self.eat(&TokenKind::Op(Op::Star)) {
                Import::Star { module, line }
            } else {
                let parens = self.eat(&TokenKind::LPar);
                let mut names = Vec::new();
                while let TokenKind::Name(_) = self.peek() {
                    let name = self.expect_name()?;
                    names.push((name, self.alias()?));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                if names.is_empty() {
                    return Err(self.unexpected("an imported name"));
                }
                if parens {
                    self.expect(&TokenKind::RPar)?;
                }
                Import::From { module, names, line }
            }
        };
        self.expect(&TokenKind::Newline)?;
        Ok(import)
    }

    // ── Raw python ────────────────────────────────────────────────────────

    fn parse_raw_python(&mut self) -> PResult<RawPython> {
        self.expect(&TokenKind::PyBlockStart)?;
        self.expect(&TokenKind::Newline)?;
        let line = self.line();
        let source = match self.advance() {
            TokenKind::PyBlock(text) => text,
            _ => return Err(self.err("invalid syntax in raw python block")),
        };
        self.expect(&TokenKind::PyBlockEnd)?;
        self.expect(&TokenKind::Newline)?;
        let body = parse_statements(&source)?;
        Ok(RawPython { source, body, line })
    }

    // ── Component ─────────────────────────────────────────────────────────

    fn parse_component(&mut self) -> PResult<Component> {
        let line = self.line();
        let name = self.expect_name()?;
        let identifier = match self.peek() {
            TokenKind::Name(_) => Some(self.expect_name()?),
            _ => None,
        };
        self.expect_op(Op::Colon)?;
        self.expect_block_start()?;

        let mut body = ComponentBody::default();
        while !self.eat(&TokenKind::Dedent) {
            if self.at_keyword(Keyword::Pass) {
                self.advance();
                self.expect(&TokenKind::Newline)?;
            } else if self.at_component_header() {
                body.children.push(self.parse_component()?);
            } else {
                body.expressions.push(self.parse_binding()?);
            }
        }
        Ok(Component { name, identifier, body, line })
    }

    /// `Name [Name] : NEWLINE`. Anything else starting with a name is a
    /// binding, including `attr : expr` with the colon operator.
    fn at_component_header(&self) -> bool {
        let colon_newline = |i: usize| {
            self.peek_ahead(i) == &TokenKind::Op(Op::Colon)
                && self.peek_ahead(i + 1) == &TokenKind::Newline
        };
        match (self.peek(), self.peek_ahead(1)) {
            (TokenKind::Name(_), TokenKind::Name(_)) => colon_newline(2),
            (TokenKind::Name(_), _) => colon_newline(1),
            _ => false,
        }
    }

    fn parse_operator(&mut self) -> PResult<OperatorRef> {
        let symbol = match self.peek() {
            TokenKind::Op(op) => op.symbol().to_string(),
            TokenKind::Operator(s) => s.clone(),
            _ => return Err(self.unexpected("an operator")),
        };
        let op = OperatorRef::new(symbol).ok_or_else(|| self.err("invalid operator"))?;
        self.advance();
        Ok(op)
    }

    /// Parses the expression after a binding operator and pins it to `line`.
    fn binding_rhs(&mut self, line: usize) -> PResult<Expr> {
        let mut rhs = self.parse_test()?;
        rhs.set_locations(line, 1);
        Ok(rhs)
    }

    fn parse_binding(&mut self) -> PResult<Expression> {
        let line = self.line();
        let first = self.expect_name()?;
        let lhs = if self.eat(&TokenKind::Op(Op::Dot)) {
            BindingTarget { root: Some(first), leaf: self.expect_name()? }
        } else {
            BindingTarget { root: None, leaf: first }
        };
        let op = self.parse_operator()?;
        let rhs = self.binding_rhs(line)?;
        self.expect(&TokenKind::Newline)?;
        Ok(Expression { lhs, op, rhs, line })
    }

    // ── Defn ──────────────────────────────────────────────────────────────

    fn parse_defn(&mut self) -> PResult<Defn> {
        let line = self.line();
        self.advance(); // consume `defn`
        let name = self.expect_name()?;
        let params = if self.peek() == &TokenKind::LPar {
            self.parse_params()?
        } else {
            Params::default()
        };
        self.expect_op(Op::Colon)?;
        self.expect_block_start()?;
        let doc = self.docstring();

        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if self.at_keyword(Keyword::Pass) {
                self.advance();
                self.expect(&TokenKind::Newline)?;
            } else {
                body.push(CallItem::Call(self.parse_call()?));
            }
        }
        Ok(Defn { name, params, doc, body, line })
    }

    fn parse_params(&mut self) -> PResult<Params> {
        let line = self.line();
        self.expect(&TokenKind::LPar)?;
        let mut params = Params::default();
        while self.peek() != &TokenKind::RPar {
            let name = self.expect_name()?;
            if params.names.contains(&name) {
                return Err(SyntaxError::syntax(
                    format!("duplicate parameter name `{name}` in defn"),
                    line,
                ));
            }
            if self.eat(&TokenKind::Op(Op::Equal)) {
                let mut default = self.parse_test()?;
                default.set_locations(line, 1);
                params.defaults.push(default);
            } else if !params.defaults.is_empty() {
                return Err(SyntaxError::syntax(
                    format!("Non keyword parameter `{name}` after keyword parameter"),
                    line,
                ));
            }
            params.names.push(name);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RPar)?;
        Ok(params)
    }

    // ── Call ──────────────────────────────────────────────────────────────

    fn parse_call(&mut self) -> PResult<Call> {
        let line = self.line();
        let name = self.expect_name()?;
        let arguments = if self.peek() == &TokenKind::LPar {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        let (unpack, captures) = if self.eat(&TokenKind::Op(Op::Unpack)) {
            self.parse_unpack_items()?
        } else {
            (Vec::new(), Vec::new())
        };

        // A call without a body ends at the newline.
        if self.eat(&TokenKind::Newline) {
            return Ok(Call { name, arguments, unpack, captures, body: Vec::new(), line });
        }
        self.expect_op(Op::Colon)?;
        self.expect_block_start()?;

        let mut body = Vec::new();
        while !self.eat(&TokenKind::Dedent) {
            if self.at_keyword(Keyword::Pass) {
                self.advance();
                self.expect(&TokenKind::Newline)?;
            } else if self.at_call() {
                body.push(CallItem::Call(self.parse_call()?));
            } else {
                body.push(CallItem::Assignment(self.parse_assignment()?));
            }
        }
        Ok(Call { name, arguments, unpack, captures, body, line })
    }

    fn at_call(&self) -> bool {
        match (self.peek(), self.peek_ahead(1)) {
            (TokenKind::Name(_), TokenKind::LPar | TokenKind::Op(Op::Unpack) | TokenKind::Newline) => true,
            (TokenKind::Name(_), TokenKind::Op(Op::Colon)) => self.peek_ahead(2) == &TokenKind::Newline,
            _ => false,
        }
    }

    fn parse_arguments(&mut self) -> PResult<Vec<Argument>> {
        let line = self.line();
        self.expect(&TokenKind::LPar)?;
        let mut arguments = Vec::new();
        let mut seen_keywords = HashSet::new();
        while self.peek() != &TokenKind::RPar {
            self.split_operator_at(self.pos + 1);
            let keyword = matches!(
                (self.peek(), self.peek_ahead(1)),
                (TokenKind::Name(_), TokenKind::Op(Op::Equal))
            );
            if keyword {
                let name = self.expect_name()?;
                self.advance(); // consume `=`
                if !seen_keywords.insert(name.clone()) {
                    return Err(SyntaxError::syntax(
                        format!("keyword argument `{name}` repeated"),
                        line,
                    ));
                }
                let mut value = self.parse_test()?;
                value.set_locations(line, 1);
                arguments.push(Argument::Keyword(name, value));
            } else {
                if !seen_keywords.is_empty() {
                    return Err(SyntaxError::syntax(
                        "non-keyword argument after keyword argument",
                        line,
                    ));
                }
                let mut value = self.parse_test()?;
                value.set_locations(line, 1);
                arguments.push(Argument::Positional(value));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RPar)?;
        Ok(arguments)
    }

    fn parse_unpack_items(&mut self) -> PResult<(Vec<String>, Vec<Capture>)> {
        let mut unpack = Vec::new();
        let mut captures: Vec<Capture> = Vec::new();
        loop {
            let line = self.line();
            let name = if self.eat(&TokenKind::Op(Op::Star)) {
                None
            } else {
                Some(self.expect_name()?)
            };
            if self.at_keyword(Keyword::As) {
                self.advance();
                let alias = self.expect_name()?;
                captures.push(Capture { name, alias });
            } else {
                let Some(name) = name else {
                    return Err(self.unexpected("`as`"));
                };
                if !captures.is_empty() {
                    return Err(SyntaxError::syntax(
                        format!("unpack names must come before namespace captures (got `{name}`)"),
                        line,
                    ));
                }
                unpack.push(name);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            // Trailing comma.
            if !matches!(self.peek(), TokenKind::Name(_) | TokenKind::Op(Op::Star)) {
                break;
            }
        }
        Ok((unpack, captures))
    }

    fn parse_assignment(&mut self) -> PResult<Assignment> {
        let line = self.line();
        let name = self.expect_name()?;
        let target = match self.peek() {
            TokenKind::Op(Op::Dot) => {
                self.advance();
                AssignTarget::Attr { name, attr: self.expect_name()? }
            }
            TokenKind::LSqb => {
                self.advance();
                let negative = self.eat(&TokenKind::Op(Op::Minus));
                let index = match self.advance() {
                    TokenKind::Number(text) => text
                        .parse::<i64>()
                        .map_err(|_| self.err("lhs index indices must be integers"))?,
                    _ => return Err(self.err("lhs index indices must be integers")),
                };
                self.expect(&TokenKind::RSqb)?;
                self.expect_op(Op::Dot)?;
                let attr = self.expect_name()?;
                let index = if negative { -index } else { index };
                AssignTarget::Index { name, index, attr }
            }
            _ => AssignTarget::Name(name),
        };
        let op = self.parse_operator()?;
        let rhs = self.binding_rhs(line)?;
        self.expect(&TokenKind::Newline)?;
        Ok(Assignment { target, op, rhs, line })
    }

    // ── Statements ────────────────────────────────────────────────────────

    fn parse_statement_list(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        loop {
            match self.peek() {
                TokenKind::EndMarker => break,
                TokenKind::Newline => {
                    self.advance();
                    continue;
                }
                TokenKind::Keyword(Keyword::Pass) => {
                    self.advance();
                    body.push(Stmt::Pass);
                }
                TokenKind::Name(_) if self.peek_ahead(1) == &TokenKind::Op(Op::Equal) => {
                    let line = self.line();
                    let target = self.expect_name()?;
                    self.advance(); // consume `=`
                    let value = self.parse_test()?;
                    body.push(Stmt::Assign { target, value, line });
                }
                _ => body.push(Stmt::Expr(self.parse_test()?)),
            }
            self.expect(&TokenKind::Newline)?;
        }
        Ok(body)
    }
}

// ── Entry points ──────────────────────────────────────────────────────────

/// Parses a complete `.enaml` source file.
pub fn parse_str(src: &str) -> Result<Module, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    log::trace!("lexed {} tokens", tokens.len());
    Parser::new(tokens).parse_module()
}

/// Parses a single expression, e.g. for evaluating `--set` values or for
/// tooling that works on binding right-hand sides.
pub fn parse_expr(src: &str) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser::new(tokens);
    let expr = parser.parse_test()?;
    parser.eat(&TokenKind::Newline);
    if parser.peek() != &TokenKind::EndMarker {
        return Err(parser.unexpected("end of expression"));
    }
    Ok(expr)
}

/// Parses simple statements (`name = expr`, `expr`, `pass`), one per line.
pub fn parse_statements(src: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser::new(tokens).parse_statement_list()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ComponentBody;
    use crate::expr::ExprKind;
    use crate::operator::BindingKind;
    use pretty_assertions::assert_eq;

    fn component(src: &str) -> Component {
        let module = parse_str(src).unwrap();
        module.components().next().cloned().unwrap()
    }

    fn defn(src: &str) -> Defn {
        let module = parse_str(src).unwrap();
        module.defns().next().cloned().unwrap()
    }

    // ── Components ────────────────────────────────────────────────────────

    #[test]
    fn component_with_identifier_and_children() {
        let c = component("Window main:\n    title = 'hi'\n    Field f:\n        value = 0\n");
        assert_eq!(c.name, "Window");
        assert_eq!(c.identifier.as_deref(), Some("main"));
        assert_eq!(c.body.expressions.len(), 1);
        assert_eq!(c.body.children.len(), 1);
        assert_eq!(c.body.children[0].identifier.as_deref(), Some("f"));
        assert_eq!(c.body.children[0].line, 3);
    }

    #[test]
    fn binding_kinds_are_recognized() {
        let c = component(
            "Field:\n    a = 1\n    b << x.y\n    c := m.count\n    d >> print(msg)\n",
        );
        let kinds: Vec<_> = c.body.expressions.iter().map(|e| e.op.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(BindingKind::Default),
                Some(BindingKind::Bind),
                Some(BindingKind::Delegate),
                Some(BindingKind::Notify),
            ]
        );
        assert_eq!(c.body.expressions[2].op.name, "__operator_ColonEqual__");
    }

    #[test]
    fn dotted_binding_target() {
        let c = component("Field:\n    font.size = 12\n");
        let lhs = &c.body.expressions[0].lhs;
        assert_eq!(lhs.root.as_deref(), Some("font"));
        assert_eq!(lhs.leaf, "size");
        assert_eq!(lhs.dotted(), "font.size");
    }

    #[test]
    fn custom_operator_binding() {
        let c = component("Field:\n    value <<< other.value\n");
        assert_eq!(c.body.expressions[0].op.name, "__operator_LessLessLess__");
        assert_eq!(c.body.expressions[0].op.kind(), None);
    }

    #[test]
    fn rhs_locations_point_at_binding_line() {
        let c = component("Window:\n    Label:\n        text = (\n            a.b\n        )\n");
        let e = &c.body.children[0].body.expressions[0];
        assert_eq!(e.line, 3);
        let ExprKind::Attribute { value, .. } = &e.rhs.kind else { panic!("{:?}", e.rhs) };
        assert_eq!(value.line, 3);
        assert_eq!(value.col, 1);
    }

    #[test]
    fn pass_only_body() {
        let c = component("Window:\n    pass\n");
        assert_eq!(c.body, ComponentBody::default());
    }

    #[test]
    fn colon_binding_is_not_a_child() {
        let c = component("Field:\n    value : 3\n");
        assert_eq!(c.body.expressions[0].op.name, "__operator_Colon__");
    }

    // ── Module items ──────────────────────────────────────────────────────

    #[test]
    fn module_docstring_and_imports() {
        let m = parse_str(
            "'''Demo.'''\nimport math\nfrom math import sqrt as root, pi\nfrom os import *\nWindow:\n    pass\n",
        )
        .unwrap();
        assert_eq!(m.doc.as_deref(), Some("Demo."));
        assert_eq!(m.body.len(), 4);
        assert_eq!(
            m.body[1],
            Item::Import(Import::From {
                module: "math".into(),
                names: vec![("sqrt".into(), Some("root".into())), ("pi".into(), None)],
                line: 3,
            })
        );
        assert!(matches!(m.body[2], Item::Import(Import::Star { .. })));
    }

    #[test]
    fn module_level_binding_is_rejected() {
        let e = parse_str("x = 1\n").unwrap_err();
        assert_eq!(e.line, 1);
    }

    #[test]
    fn raw_python_block_statements() {
        let m = parse_str(":: python ::\nscale = 2\nlabel = 'n' * scale\n:: end ::\nWindow:\n    pass\n")
            .unwrap();
        let Item::RawPython(raw) = &m.body[0] else { panic!() };
        assert_eq!(raw.body.len(), 2);
        let Stmt::Assign { target, line, .. } = &raw.body[1] else { panic!() };
        assert_eq!(target, "label");
        assert_eq!(*line, 3);
    }

    #[test]
    fn raw_python_error_has_file_line() {
        let e = parse_str("\n\n:: python ::\nok = 1\nbad = = 2\n:: end ::\n").unwrap_err();
        assert_eq!(e.line, 5);
    }

    // ── Defn ──────────────────────────────────────────────────────────────

    #[test]
    fn defn_with_params_and_calls() {
        let d = defn(
            "defn Form(label, value=0):\n    'Docs.'\n    Label(label):\n        pass\n    Field(value=value) -> f, * as ns:\n        value << f.text\n",
        );
        assert_eq!(d.name, "Form");
        assert_eq!(d.params.names, vec!["label", "value"]);
        assert_eq!(d.params.required(), 1);
        assert_eq!(d.doc.as_deref(), Some("Docs."));
        assert_eq!(d.body.len(), 2);
        let CallItem::Call(call) = &d.body[1] else { panic!() };
        assert_eq!(call.unpack, vec!["f"]);
        assert_eq!(call.captures, vec![Capture { name: None, alias: "ns".into() }]);
        assert!(matches!(call.arguments[0], Argument::Keyword(ref k, _) if k == "value"));
    }

    #[test]
    fn bare_call_without_body() {
        let d = defn("defn Pair():\n    Label\n    Field('x') -> f\n");
        assert_eq!(d.body.len(), 2);
    }

    #[test]
    fn assignment_targets() {
        let d = defn(
            "defn A():\n    Row() -> r:\n        text = 'all'\n        r.width = 10\n        r[-1].height = 4\n",
        );
        let CallItem::Call(call) = &d.body[0] else { panic!() };
        let targets: Vec<_> = call
            .body
            .iter()
            .map(|item| match item {
                CallItem::Assignment(a) => a.target.clone(),
                CallItem::Call(_) => panic!(),
            })
            .collect();
        assert_eq!(
            targets,
            vec![
                AssignTarget::Name("text".into()),
                AssignTarget::Attr { name: "r".into(), attr: "width".into() },
                AssignTarget::Index { name: "r".into(), index: -1, attr: "height".into() },
            ]
        );
    }

    #[test]
    fn duplicate_parameter() {
        let e = parse_str("defn A(x, x):\n    pass\n").unwrap_err();
        assert_eq!(e.message, "duplicate parameter name `x` in defn");
    }

    #[test]
    fn positional_after_default_parameter() {
        let e = parse_str("defn A(x=1, y):\n    pass\n").unwrap_err();
        assert_eq!(e.message, "Non keyword parameter `y` after keyword parameter");
    }

    #[test]
    fn repeated_keyword_argument() {
        let e = parse_str("defn A():\n    B(x=1, x=2)\n").unwrap_err();
        assert_eq!(e.message, "keyword argument `x` repeated");
        assert_eq!(e.line, 2);
    }

    #[test]
    fn positional_after_keyword_argument() {
        let e = parse_str("defn A():\n    B(x=1, 2)\n").unwrap_err();
        assert_eq!(e.message, "non-keyword argument after keyword argument");
    }

    #[test]
    fn unpack_after_capture() {
        let e = parse_str("defn A():\n    B() -> a as b, c\n").unwrap_err();
        assert!(e.message.starts_with("unpack names must come before namespace captures"));
    }

    #[test]
    fn syntax_error_carries_line() {
        let e = parse_str("Window:\n    title = \n").unwrap_err();
        assert_eq!(e.line, 2);
        assert!(!e.is_indentation());
    }

    #[test]
    fn indentation_error_passes_through() {
        let e = parse_str("Window:\n    a = 1\n      b = 2\n").unwrap_err();
        assert!(e.is_indentation());
    }
}
