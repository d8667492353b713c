use std::collections::VecDeque;
use std::fmt;

use crate::error::SyntaxError;

// ── Token ─────────────────────────────────────────────────────────────────

/// The standard operators. Any other run of operator characters lexes as
/// [`TokenKind::Operator`] and is only meaningful as a binding operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Amper,
    Circumflex,
    Colon,
    Dot,
    DoubleSlash,
    DoubleStar,
    EqEqual,
    Equal,
    Greater,
    GreaterEqual,
    LeftShift,
    Less,
    LessEqual,
    Minus,
    NotEqual,
    Percent,
    Plus,
    RightShift,
    Slash,
    Star,
    Tilde,
    VBar,
    DoubleColon,
    Ellipsis,
    /// `->`, introduces the unpack list of a call.
    Unpack,
}

const OPERATORS: &[(&str, Op)] = &[
    ("&", Op::Amper),
    ("^", Op::Circumflex),
    (":", Op::Colon),
    (".", Op::Dot),
    ("//", Op::DoubleSlash),
    ("**", Op::DoubleStar),
    ("==", Op::EqEqual),
    ("=", Op::Equal),
    (">", Op::Greater),
    (">=", Op::GreaterEqual),
    ("<<", Op::LeftShift),
    ("<", Op::Less),
    ("<=", Op::LessEqual),
    ("-", Op::Minus),
    ("!=", Op::NotEqual),
    ("%", Op::Percent),
    ("+", Op::Plus),
    (">>", Op::RightShift),
    ("/", Op::Slash),
    ("*", Op::Star),
    ("~", Op::Tilde),
    ("|", Op::VBar),
    ("::", Op::DoubleColon),
    ("...", Op::Ellipsis),
    ("->", Op::Unpack),
];

impl Op {
    pub fn from_symbol(symbol: &str) -> Option<Op> {
        OPERATORS.iter().find(|(s, _)| *s == symbol).map(|(_, op)| *op)
    }

    pub fn symbol(self) -> &'static str {
        OPERATORS
            .iter()
            .find(|(_, op)| *op == self)
            .map(|(s, _)| *s)
            .unwrap_or("?")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    And,
    As,
    Else,
    From,
    For,
    If,
    Import,
    In,
    Is,
    Lambda,
    Not,
    Or,
    Pass,
    Defn,
}

impl Keyword {
    fn from_word(word: &str) -> Option<Keyword> {
        Some(match word {
            "and" => Keyword::And,
            "as" => Keyword::As,
            "else" => Keyword::Else,
            "from" => Keyword::From,
            "for" => Keyword::For,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "in" => Keyword::In,
            "is" => Keyword::Is,
            "lambda" => Keyword::Lambda,
            "not" => Keyword::Not,
            "or" => Keyword::Or,
            "pass" => Keyword::Pass,
            "defn" => Keyword::Defn,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::And => "and",
            Keyword::As => "as",
            Keyword::Else => "else",
            Keyword::From => "from",
            Keyword::For => "for",
            Keyword::If => "if",
            Keyword::Import => "import",
            Keyword::In => "in",
            Keyword::Is => "is",
            Keyword::Lambda => "lambda",
            Keyword::Not => "not",
            Keyword::Or => "or",
            Keyword::Pass => "pass",
            Keyword::Defn => "defn",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Name(String),
    /// Numeric literal text, converted by the parser.
    Number(String),
    /// A fully decoded string literal.
    Str(String),
    /// The verbatim body of a `:: python ::` block, padded with leading
    /// newlines so its line numbers match the enclosing file.
    PyBlock(String),
    PyBlockStart,
    PyBlockEnd,
    Op(Op),
    /// A composite operator such as `:=` or `<<<`.
    Operator(String),
    Keyword(Keyword),
    Comma,
    LPar,
    RPar,
    LSqb,
    RSqb,
    LBrace,
    RBrace,
    Newline,
    Indent,
    Dedent,
    EndMarker,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Name(s) => write!(f, "name `{s}`"),
            TokenKind::Number(s) => write!(f, "number `{s}`"),
            TokenKind::Str(s) => write!(f, "string {s:?}"),
            TokenKind::PyBlock(_) => f.write_str("python block"),
            TokenKind::PyBlockStart => f.write_str("`:: python ::`"),
            TokenKind::PyBlockEnd => f.write_str("`:: end ::`"),
            TokenKind::Op(op) => write!(f, "`{}`", op.symbol()),
            TokenKind::Operator(s) => write!(f, "`{s}`"),
            TokenKind::Keyword(k) => write!(f, "`{}`", k.as_str()),
            TokenKind::Comma => f.write_str("`,`"),
            TokenKind::LPar => f.write_str("`(`"),
            TokenKind::RPar => f.write_str("`)`"),
            TokenKind::LSqb => f.write_str("`[`"),
            TokenKind::RSqb => f.write_str("`]`"),
            TokenKind::LBrace => f.write_str("`{`"),
            TokenKind::RBrace => f.write_str("`}`"),
            TokenKind::Newline => f.write_str("newline"),
            TokenKind::Indent => f.write_str("indent"),
            TokenKind::Dedent => f.write_str("dedent"),
            TokenKind::EndMarker => f.write_str("end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based source line.
    pub line: usize,
    /// First real token on its line.
    pub at_line_start: bool,
    /// First real token after `: NEWLINE`; must open a deeper block.
    pub must_indent: bool,
}

impl Token {
    fn synthetic(kind: TokenKind, line: usize) -> Self {
        Self { kind, line, at_line_start: false, must_indent: false }
    }
}

type LexResult<T> = Result<T, SyntaxError>;

// ── Raw scanner ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Raw {
    Tok(TokenKind),
    /// Leading whitespace, already tab-expanded to its column width.
    Ws(usize),
    /// One or more physical newlines.
    Newline(usize),
    StringStart { prefix: String, triple: bool },
    StringContinue(String),
    StringEnd,
    PyBlockContinue(String),
}

#[derive(Debug, Clone)]
struct RawToken {
    raw: Raw,
    line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Initial,
    Quoted { quote: char, triple: bool },
    RawPython,
}

const OPERATOR_CHARS: &str = "~!@%&/<>:=+-^$*?|.";

struct Scanner<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    paren_count: i32,
    at_line_start: bool,
    state: ScanState,
}

impl<'s> Scanner<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            paren_count: 0,
            at_line_start: true,
            state: ScanState::Initial,
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn take_while(&mut self, mut pred: impl FnMut(char) -> bool) -> &'s str {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if pred(c)) {
            self.advance();
        }
        &self.src[start..self.pos]
    }

    fn emit(&mut self, raw: Raw, line: usize) -> Option<LexResult<RawToken>> {
        self.at_line_start = matches!(raw, Raw::Newline(_) | Raw::Ws(_));
        Some(Ok(RawToken { raw, line }))
    }

    fn scan(&mut self) -> Option<LexResult<RawToken>> {
        match self.state {
            ScanState::Initial => self.scan_initial(),
            ScanState::Quoted { quote, triple } => self.scan_quoted(quote, triple),
            ScanState::RawPython => self.scan_raw_python(),
        }
    }

    fn scan_initial(&mut self) -> Option<LexResult<RawToken>> {
        loop {
            let ch = self.peek()?;
            let line = self.line;

            // `[ ]*#...` comments swallow their leading spaces.
            let spaces = self.rest().bytes().take_while(|b| *b == b' ').count();
            if self.rest()[spaces..].starts_with('#') {
                self.take_while(|c| c != '\n' && c != '\r');
                continue;
            }

            match ch {
                ' ' | '\t' | '\x0c' => {
                    let text = self.take_while(|c| matches!(c, ' ' | '\t' | '\x0c'));
                    if self.at_line_start && self.paren_count == 0 {
                        return self.emit(Raw::Ws(indent_width(text)), line);
                    }
                }
                '\\' if matches!(self.peek_at(1), Some('\n')) => {
                    self.pos += 2;
                    self.line += 1;
                }
                '\\' if self.rest().starts_with("\\\r\n") => {
                    self.pos += 3;
                    self.line += 1;
                }
                '\n' | '\r' => {
                    let text = self.take_while(|c| c == '\n' || c == '\r');
                    let count = text.matches('\n').count();
                    self.line += count;
                    if count > 0 && self.paren_count == 0 {
                        return self.emit(Raw::Newline(count), line);
                    }
                }
                '(' | '[' | '{' => {
                    self.advance();
                    self.paren_count += 1;
                    let kind = match ch {
                        '(' => TokenKind::LPar,
                        '[' => TokenKind::LSqb,
                        _ => TokenKind::LBrace,
                    };
                    return self.emit(Raw::Tok(kind), line);
                }
                ')' | ']' | '}' => {
                    self.advance();
                    self.paren_count -= 1;
                    let kind = match ch {
                        ')' => TokenKind::RPar,
                        ']' => TokenKind::RSqb,
                        _ => TokenKind::RBrace,
                    };
                    return self.emit(Raw::Tok(kind), line);
                }
                ',' => {
                    self.advance();
                    return self.emit(Raw::Tok(TokenKind::Comma), line);
                }
                _ => {
                    if let Some(tok) = self.scan_string_start() {
                        return Some(Ok(tok));
                    }
                    if self.scan_tag("python") {
                        self.state = ScanState::RawPython;
                        return self.emit(Raw::Tok(TokenKind::PyBlockStart), line);
                    }
                    if ch.is_ascii_digit()
                        || (ch == '.' && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()))
                    {
                        let text = self.scan_number();
                        return self.emit(Raw::Tok(TokenKind::Number(text)), line);
                    }
                    if ch.is_alphabetic() || ch == '_' {
                        let word = self.take_while(|c| c.is_alphanumeric() || c == '_');
                        let kind = match Keyword::from_word(word) {
                            Some(kw) => TokenKind::Keyword(kw),
                            None => TokenKind::Name(word.to_string()),
                        };
                        return self.emit(Raw::Tok(kind), line);
                    }
                    if OPERATOR_CHARS.contains(ch) {
                        let text = self.take_while(|c| OPERATOR_CHARS.contains(c));
                        let kind = match Op::from_symbol(text) {
                            Some(op) => TokenKind::Op(op),
                            None => TokenKind::Operator(text.to_string()),
                        };
                        return self.emit(Raw::Tok(kind), line);
                    }
                    return Some(Err(SyntaxError::syntax(
                        format!("Illegal character '{ch}'"),
                        line,
                    )));
                }
            }
        }
    }

    /// Matches `::[\t ]*<word>[\t ]*::[\t ]*` at the cursor.
    fn scan_tag(&mut self, word: &str) -> bool {
        let rest = self.rest();
        let Some(after) = rest.strip_prefix("::") else { return false };
        let after = after.trim_start_matches([' ', '\t']);
        let Some(after) = after.strip_prefix(word) else { return false };
        let after = after.trim_start_matches([' ', '\t']);
        let Some(after) = after.strip_prefix("::") else { return false };
        let after = after.trim_start_matches([' ', '\t']);
        self.pos += rest.len() - after.len();
        true
    }

    fn scan_string_start(&mut self) -> Option<RawToken> {
        let rest = self.rest();
        let prefix_len = rest
            .chars()
            .take(2)
            .take_while(|c| matches!(c, 'u' | 'U' | 'r' | 'R'))
            .count();
        let prefix = &rest[..prefix_len];
        let valid_prefix = matches!(
            prefix.to_ascii_lowercase().as_str(),
            "" | "u" | "r" | "ur"
        );
        if !valid_prefix {
            return None;
        }
        let body = &rest[prefix_len..];
        let quote = body.chars().next().filter(|c| *c == '\'' || *c == '"')?;
        let triple = body.starts_with(&quote.to_string().repeat(3));
        self.pos += prefix_len + if triple { 3 } else { 1 };
        self.state = ScanState::Quoted { quote, triple };
        self.at_line_start = false;
        Some(RawToken {
            raw: Raw::StringStart { prefix: prefix.to_string(), triple },
            line: self.line,
        })
    }

    fn scan_number(&mut self) -> String {
        let start = self.pos;
        if self.rest().starts_with("0x") || self.rest().starts_with("0X") {
            self.pos += 2;
            self.take_while(|c| c.is_ascii_hexdigit());
        } else {
            self.take_while(|c| c.is_ascii_digit());
            if self.peek() == Some('.') {
                self.advance();
                self.take_while(|c| c.is_ascii_digit());
            }
            if matches!(self.peek(), Some('e' | 'E')) {
                let sign = matches!(self.peek_at(1), Some('+' | '-'));
                let digit_at = if sign { 2 } else { 1 };
                if matches!(self.peek_at(digit_at), Some(c) if c.is_ascii_digit()) {
                    self.pos += digit_at;
                    self.take_while(|c| c.is_ascii_digit());
                }
            }
        }
        // Long and imaginary suffixes stay in the text; the parser decides.
        if matches!(self.peek(), Some('l' | 'L' | 'j' | 'J')) {
            self.advance();
        }
        self.src[start..self.pos].to_string()
    }

    fn scan_quoted(&mut self, quote: char, triple: bool) -> Option<LexResult<RawToken>> {
        let line = self.line;
        let ch = self.peek()?;
        if ch == '\\' {
            self.advance();
            let mut text = String::from('\\');
            if let Some(next) = self.advance() {
                if next == '\n' {
                    self.line += 1;
                }
                text.push(next);
            }
            return Some(Ok(RawToken { raw: Raw::StringContinue(text), line }));
        }
        if ch == quote {
            let closing = if triple { quote.to_string().repeat(3) } else { quote.to_string() };
            if self.rest().starts_with(&closing) {
                self.pos += closing.len();
                self.state = ScanState::Initial;
                return Some(Ok(RawToken { raw: Raw::StringEnd, line }));
            }
            self.advance();
            return Some(Ok(RawToken { raw: Raw::StringContinue(quote.to_string()), line }));
        }
        if !triple && (ch == '\n' || ch == '\r') {
            return Some(Err(SyntaxError::syntax(
                "EOL while scanning single-quoted string",
                line,
            )));
        }
        let text = self.take_while(|c| c != quote && c != '\\' && (triple || (c != '\n' && c != '\r')));
        self.line += text.matches('\n').count();
        Some(Ok(RawToken { raw: Raw::StringContinue(text.to_string()), line }))
    }

    fn scan_raw_python(&mut self) -> Option<LexResult<RawToken>> {
        let line = self.line;
        let ch = self.peek()?;
        if self.scan_tag("end") {
            self.state = ScanState::Initial;
            return self.emit(Raw::Tok(TokenKind::PyBlockEnd), line);
        }
        if ch == '\n' || ch == '\r' {
            let text = self.take_while(|c| c == '\n' || c == '\r');
            let count = text.matches('\n').count();
            self.line += count;
            return self.emit(Raw::Newline(count), line);
        }
        let text = self.take_while(|c| c != '\n' && c != '\r');
        self.emit(Raw::PyBlockContinue(text.to_string()), line)
    }
}

impl Iterator for Scanner<'_> {
    type Item = LexResult<RawToken>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan()
    }
}

/// Column width of leading whitespace. A form feed resets the count and
/// tabs advance to the next multiple of eight.
fn indent_width(ws: &str) -> usize {
    let ws = ws.rsplit('\x0c').next().unwrap_or("");
    ws.chars().fold(0, |col, c| if c == '\t' { col + 8 - col % 8 } else { col + 1 })
}

// ── Filter: python blocks ─────────────────────────────────────────────────

struct PyBlocks<I> {
    inner: I,
    pending: VecDeque<RawToken>,
}

impl<I: Iterator<Item = LexResult<RawToken>>> PyBlocks<I> {
    fn new(inner: I) -> Self {
        Self { inner, pending: VecDeque::new() }
    }

    fn require_newline(&mut self, tag: &str, line: usize) -> LexResult<RawToken> {
        match self.inner.next().transpose()? {
            Some(tok @ RawToken { raw: Raw::Newline(_), .. }) => Ok(tok),
            Some(tok) => Err(SyntaxError::syntax(
                format!("Newline required after a \"{tag}\" tag"),
                tok.line,
            )),
            None => Err(SyntaxError::syntax(
                format!("Newline required after a \"{tag}\" tag"),
                line,
            )),
        }
    }

    fn collect_block(&mut self, start_line: usize) -> LexResult<()> {
        let nl = self.require_newline(":: python ::", start_line)?;
        self.pending.push_back(nl);

        let mut text = "\n".repeat(start_line);
        let end = loop {
            match self.inner.next().transpose()? {
                Some(RawToken { raw: Raw::Newline(n), .. }) => text.push_str(&"\n".repeat(n)),
                Some(RawToken { raw: Raw::PyBlockContinue(chunk), .. }) => text.push_str(&chunk),
                Some(tok @ RawToken { raw: Raw::Tok(TokenKind::PyBlockEnd), .. }) => break tok,
                Some(other) => {
                    return Err(SyntaxError::syntax("Error in raw python block.", other.line));
                }
                None => {
                    return Err(SyntaxError::syntax(
                        "EOF while scanning raw python block",
                        start_line,
                    ));
                }
            }
        };

        self.pending.push_back(RawToken {
            raw: Raw::Tok(TokenKind::PyBlock(text)),
            line: start_line + 1,
        });
        let end_line = end.line;
        self.pending.push_back(end);
        let nl = self.require_newline(":: end ::", end_line)?;
        self.pending.push_back(nl);
        Ok(())
    }
}

impl<I: Iterator<Item = LexResult<RawToken>>> Iterator for PyBlocks<I> {
    type Item = LexResult<RawToken>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(tok) = self.pending.pop_front() {
            return Some(Ok(tok));
        }
        let tok = match self.inner.next()? {
            Ok(tok) => tok,
            Err(e) => return Some(Err(e)),
        };
        if tok.raw != Raw::Tok(TokenKind::PyBlockStart) {
            return Some(Ok(tok));
        }
        if let Err(e) = self.collect_block(tok.line) {
            return Some(Err(e));
        }
        Some(Ok(tok))
    }
}

// ── Filter: strings ───────────────────────────────────────────────────────

struct Strings<I> {
    inner: I,
}

impl<I: Iterator<Item = LexResult<RawToken>>> Strings<I> {
    fn collect_string(&mut self, prefix: &str, triple: bool, line: usize) -> LexResult<String> {
        let mut body = String::new();
        loop {
            match self.inner.next().transpose()? {
                Some(RawToken { raw: Raw::StringEnd, .. }) => break,
                Some(RawToken { raw: Raw::StringContinue(chunk), .. }) => body.push_str(&chunk),
                Some(other) => {
                    return Err(SyntaxError::syntax("invalid syntax in string literal", other.line));
                }
                None => {
                    let which = if triple { "triple" } else { "single" };
                    return Err(SyntaxError::syntax(
                        format!("EOF while scanning {which}-quoted string"),
                        line,
                    ));
                }
            }
        }
        let prefix = prefix.to_ascii_lowercase();
        if prefix.contains('r') {
            Ok(body)
        } else {
            decode_escapes(&body, prefix == "u", line)
        }
    }
}

impl<I: Iterator<Item = LexResult<RawToken>>> Iterator for Strings<I> {
    type Item = LexResult<RawToken>;

    fn next(&mut self) -> Option<Self::Item> {
        let tok = match self.inner.next()? {
            Ok(tok) => tok,
            Err(e) => return Some(Err(e)),
        };
        let Raw::StringStart { prefix, triple } = &tok.raw else {
            return Some(Ok(tok));
        };
        Some(
            self.collect_string(prefix, *triple, tok.line)
                .map(|s| RawToken { raw: Raw::Tok(TokenKind::Str(s)), line: tok.line }),
        )
    }
}

/// Decodes backslash escapes. Unknown escapes are kept verbatim.
fn decode_escapes(body: &str, unicode: bool, line: usize) -> LexResult<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(e) = chars.next() else {
            out.push('\\');
            break;
        };
        match e {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = e.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'x' => out.push(read_hex(&mut chars, 2, "\\x", line)?),
            'u' if unicode => out.push(read_hex(&mut chars, 4, "\\u", line)?),
            'U' if unicode => out.push(read_hex(&mut chars, 8, "\\U", line)?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn read_hex(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    digits: usize,
    escape: &str,
    line: usize,
) -> LexResult<char> {
    let mut value = 0u32;
    for _ in 0..digits {
        let d = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| SyntaxError::syntax(format!("invalid {escape} escape"), line))?;
        value = value * 16 + d;
    }
    char::from_u32(value)
        .ok_or_else(|| SyntaxError::syntax(format!("invalid {escape} escape"), line))
}

// ── Filter: indentation annotation ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum IndentState {
    No,
    May,
    Must,
}

/// A token on its way to the indentation synthesizer; still carries the
/// whitespace markers that never reach the parser.
#[derive(Debug, Clone)]
enum Marked {
    Ws(usize, usize),
    Newline { line: usize, at_line_start: bool },
    Real(Token),
}

struct Annotate<I> {
    inner: I,
    at_line_start: bool,
    indent: IndentState,
}

impl<I: Iterator<Item = LexResult<RawToken>>> Iterator for Annotate<I> {
    type Item = LexResult<Marked>;

    fn next(&mut self) -> Option<Self::Item> {
        let tok = match self.inner.next()? {
            Ok(tok) => tok,
            Err(e) => return Some(Err(e)),
        };
        let at_line_start = self.at_line_start;
        let marked = match tok.raw {
            Raw::Ws(width) => {
                self.at_line_start = true;
                Marked::Ws(width, tok.line)
            }
            Raw::Newline(_) => {
                self.at_line_start = true;
                if self.indent == IndentState::May {
                    self.indent = IndentState::Must;
                }
                Marked::Newline { line: tok.line, at_line_start }
            }
            Raw::Tok(TokenKind::Op(Op::Colon)) => {
                self.at_line_start = false;
                self.indent = IndentState::May;
                Marked::Real(Token {
                    kind: TokenKind::Op(Op::Colon),
                    line: tok.line,
                    at_line_start,
                    must_indent: false,
                })
            }
            Raw::Tok(kind) => {
                let must_indent = self.indent == IndentState::Must;
                self.at_line_start = false;
                self.indent = IndentState::No;
                Marked::Real(Token { kind, line: tok.line, at_line_start, must_indent })
            }
            other => {
                return Some(Err(SyntaxError::syntax(
                    format!("unexpected lexer state {other:?}"),
                    tok.line,
                )));
            }
        };
        Some(Ok(marked))
    }
}

// ── Filter: INDENT / DEDENT synthesis ─────────────────────────────────────

/// The last token pulled from upstream, used to decide whether a trailing
/// NEWLINE must be synthesized at end of input.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Last {
    Nothing,
    Ws { line: usize },
    Newline,
    Real { line: usize },
}

struct Indenter<I> {
    inner: I,
    levels: Vec<usize>,
    depth: usize,
    prev_was_ws: bool,
    last: Last,
    pending: VecDeque<Token>,
    finished: bool,
    failed: bool,
}

impl<I: Iterator<Item = LexResult<Marked>>> Indenter<I> {
    fn new(inner: I) -> Self {
        Self {
            inner,
            levels: vec![0],
            depth: 0,
            prev_was_ws: false,
            last: Last::Nothing,
            pending: VecDeque::new(),
            finished: false,
            failed: false,
        }
    }

    fn process(&mut self, token: Token) -> LexResult<()> {
        self.prev_was_ws = false;
        self.last = Last::Real { line: token.line };
        let top = self.levels.last().copied().unwrap_or(0);

        if token.must_indent {
            if self.depth <= top {
                return Err(SyntaxError::indentation("Expected an indented block.", token.line));
            }
            self.levels.push(self.depth);
            self.pending.push_back(Token::synthetic(TokenKind::Indent, token.line));
        } else if token.at_line_start {
            if self.depth > top {
                return Err(SyntaxError::indentation("Unexpected indent.", token.line));
            }
            if self.depth < top {
                let Some(i) = self.levels.iter().position(|l| *l == self.depth) else {
                    return Err(SyntaxError::indentation(
                        "Unindent does not match any outer level of indentation.",
                        token.line,
                    ));
                };
                while self.levels.len() > i + 1 {
                    self.levels.pop();
                    self.pending.push_back(Token::synthetic(TokenKind::Dedent, token.line));
                }
            }
        }
        self.pending.push_back(token);
        Ok(())
    }

    /// Trailing NEWLINE, remaining DEDENTs, then ENDMARKER.
    fn finish(&mut self) {
        let needs_newline = match self.last {
            Last::Nothing => true,
            Last::Newline => false,
            Last::Ws { line } => line == 1,
            Last::Real { .. } => true,
        };
        let line = match self.last {
            Last::Ws { line } | Last::Real { line } => line,
            _ => 1,
        };
        if needs_newline {
            self.pending.push_back(Token::synthetic(TokenKind::Newline, line));
        }
        while self.levels.len() > 1 {
            self.levels.pop();
            self.pending.push_back(Token::synthetic(TokenKind::Dedent, line));
        }
        self.pending.push_back(Token::synthetic(TokenKind::EndMarker, line));
        self.finished = true;
    }
}

impl<I: Iterator<Item = LexResult<Marked>>> Iterator for Indenter<I> {
    type Item = LexResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return Some(Ok(tok));
            }
            if self.finished || self.failed {
                return None;
            }
            match self.inner.next() {
                None => self.finish(),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                Some(Ok(Marked::Ws(width, line))) => {
                    self.depth = width;
                    self.prev_was_ws = true;
                    self.last = Last::Ws { line };
                }
                Some(Ok(Marked::Newline { line, at_line_start })) => {
                    self.depth = 0;
                    self.last = Last::Newline;
                    // Blank lines never reach the parser.
                    if self.prev_was_ws || at_line_start {
                        continue;
                    }
                    return Some(Ok(Token::synthetic(TokenKind::Newline, line)));
                }
                Some(Ok(Marked::Real(token))) => {
                    if let Err(e) = self.process(token) {
                        self.failed = true;
                        return Some(Err(e));
                    }
                }
            }
        }
    }
}

// ── Lexer ─────────────────────────────────────────────────────────────────

/// Lazy, single-pass token stream over `.enaml` source.
///
/// Iterating yields tokens until ENDMARKER, or a single error after which
/// the stream is exhausted. A lexer cannot be rewound; build a new one to
/// scan again.
pub struct Lexer<'s> {
    stream: Indenter<Annotate<Strings<PyBlocks<Scanner<'s>>>>>,
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str) -> Self {
        let raw = Scanner::new(src);
        let blocks = PyBlocks::new(raw);
        let strings = Strings { inner: blocks };
        let annotated = Annotate { inner: strings, at_line_start: true, indent: IndentState::No };
        Self { stream: Indenter::new(annotated) }
    }

    /// Runs the lexer to completion.
    pub fn tokenize(self) -> Result<Vec<Token>, SyntaxError> {
        self.collect()
    }

    /// The indentation stack. Holds only `[0]` once a well-formed input
    /// has been fully consumed.
    pub fn levels(&self) -> &[usize] {
        &self.stream.levels
    }
}

impl Iterator for Lexer<'_> {
    type Item = Result<Token, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.stream.next()
    }
}
