//! Binding operator names and their mapping onto the four binding kinds.

use std::fmt;

const OPERATOR_NAMES: &[(char, &str)] = &[
    ('~', "Tilde"),
    ('!', "Bang"),
    ('@', "At"),
    ('%', "Percent"),
    ('^', "Caret"),
    ('&', "Amper"),
    ('-', "Minus"),
    ('+', "Plus"),
    ('=', "Equal"),
    ('/', "Slash"),
    ('<', "Less"),
    ('>', "Greater"),
    (':', "Colon"),
    ('$', "Dollar"),
    ('*', "Star"),
    ('?', "Question"),
    ('|', "Bar"),
    ('.', "Dot"),
];

/// Maps an operator symbol to the dunder name used to look up its
/// implementation, e.g. `<<` becomes `__operator_LessLess__`.
///
/// Returns `None` when the symbol contains a character outside the operator
/// character class.
pub fn translate_operator(symbol: &str) -> Option<String> {
    let mut name = String::from("__operator_");
    for ch in symbol.chars() {
        let (_, part) = OPERATOR_NAMES.iter().find(|(c, _)| *c == ch)?;
        name.push_str(part);
    }
    name.push_str("__");
    Some(name)
}

/// Inverse of [`translate_operator`], used when reporting lookup failures.
pub fn operator_symbol(name: &str) -> Option<String> {
    let mut rest = name.strip_prefix("__operator_")?.strip_suffix("__")?;
    let mut symbol = String::new();
    while !rest.is_empty() {
        let (ch, part) = OPERATOR_NAMES.iter().find(|(_, p)| rest.starts_with(p))?;
        symbol.push(*ch);
        rest = &rest[part.len()..];
    }
    Some(symbol)
}

/// The four built-in binding behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// `=`: evaluated once, lazily, on first read.
    Default,
    /// `<<`: re-evaluated whenever a tracked dependency changes.
    Bind,
    /// `:=`: two-way link to another object's attribute.
    Delegate,
    /// `>>`: runs whenever the decorated attribute changes.
    Notify,
}

impl BindingKind {
    pub fn symbol(self) -> &'static str {
        match self {
            BindingKind::Default => "=",
            BindingKind::Bind => "<<",
            BindingKind::Delegate => ":=",
            BindingKind::Notify => ">>",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" => BindingKind::Default,
            "<<" => BindingKind::Bind,
            ":=" => BindingKind::Delegate,
            ">>" => BindingKind::Notify,
            _ => return None,
        })
    }

    pub fn all() -> [BindingKind; 4] {
        [BindingKind::Default, BindingKind::Bind, BindingKind::Delegate, BindingKind::Notify]
    }

    /// Whether the binding replaces the attribute's storage. Notifiers only
    /// observe.
    pub fn intercepts(self) -> bool {
        !matches!(self, BindingKind::Notify)
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An operator as written in source, with its translated lookup name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRef {
    pub symbol: String,
    pub name: String,
}

impl OperatorRef {
    pub fn new(symbol: impl Into<String>) -> Option<Self> {
        let symbol = symbol.into();
        let name = translate_operator(&symbol)?;
        Some(Self { symbol, name })
    }

    /// The built-in kind, if the symbol is one of the four standard ones.
    pub fn kind(&self) -> Option<BindingKind> {
        BindingKind::from_symbol(&self.symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_operators() {
        assert_eq!(translate_operator("=").as_deref(), Some("__operator_Equal__"));
        assert_eq!(translate_operator("<<").as_deref(), Some("__operator_LessLess__"));
        assert_eq!(translate_operator(":=").as_deref(), Some("__operator_ColonEqual__"));
        assert_eq!(translate_operator(">>").as_deref(), Some("__operator_GreaterGreater__"));
    }

    #[test]
    fn composite_operator() {
        assert_eq!(translate_operator("<<<").as_deref(), Some("__operator_LessLessLess__"));
        assert_eq!(translate_operator("$?").as_deref(), Some("__operator_DollarQuestion__"));
    }

    #[test]
    fn rejects_foreign_characters() {
        assert_eq!(translate_operator("a="), None);
    }

    #[test]
    fn symbol_round_trips_through_name() {
        assert_eq!(operator_symbol("__operator_ColonEqual__").as_deref(), Some(":="));
        assert_eq!(operator_symbol("__operator_Nope__"), None);
    }

    #[test]
    fn kinds() {
        assert_eq!(OperatorRef::new(":=").and_then(|o| o.kind()), Some(BindingKind::Delegate));
        assert_eq!(OperatorRef::new("<<<").and_then(|o| o.kind()), None);
        assert!(!BindingKind::Notify.intercepts());
    }
}
