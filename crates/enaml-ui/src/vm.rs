//! The stack machine that executes compiled `defn` bodies.
//!
//! The stack starts out holding a one-element tuple with a null
//! container. Every call site duplicates its parent sequence, pushes the
//! produced components, and finally hands them to the parent with
//! `ENAML_ADD_CHILDREN`. The components left on the null container are
//! the result of the run.

use std::fmt;
use std::rc::Rc;

use enaml_runtime::builtins;
use enaml_runtime::eval::subscript;
use enaml_runtime::toolkit::lookup_value;
use enaml_runtime::{ClassDef, Error, Namespace, ObjectRef, Result, Role, Scope, Toolkit, Value};

// ── Instructions ──────────────────────────────────────────────────────────

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    LoadGlobal = 0,
    LoadLocal = 1,
    LoadConst = 2,
    LoadGlobalsClosure = 3,
    LoadLocalsClosure = 4,
    StoreLocal = 5,
    Eval = 6,
    Call = 7,
    EnamlCall = 8,
    UnpackSequence = 9,
    EnamlAddChildren = 10,
    DupTop = 11,
    PopTop = 12,
    RotTwo = 13,
    GetItem = 14,
    GetIter = 15,
    ForIter = 16,
    JumpAbsolute = 17,
}

impl Opcode {
    const ALL: [Opcode; 18] = [
        Opcode::LoadGlobal,
        Opcode::LoadLocal,
        Opcode::LoadConst,
        Opcode::LoadGlobalsClosure,
        Opcode::LoadLocalsClosure,
        Opcode::StoreLocal,
        Opcode::Eval,
        Opcode::Call,
        Opcode::EnamlCall,
        Opcode::UnpackSequence,
        Opcode::EnamlAddChildren,
        Opcode::DupTop,
        Opcode::PopTop,
        Opcode::RotTwo,
        Opcode::GetItem,
        Opcode::GetIter,
        Opcode::ForIter,
        Opcode::JumpAbsolute,
    ];

    pub fn from_u8(byte: u8) -> Option<Opcode> {
        Self::ALL.get(usize::from(byte)).copied()
    }
}

/// The raw operand of an instruction.
#[derive(Debug, Clone)]
pub enum Operand {
    None,
    Name(String),
    Index(i64),
    Const(Value),
    Count(usize),
    Args(usize, usize),
}

/// Key of a `GET_ITEM`: a namespace/attribute name or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKey {
    Name(String),
    Index(i64),
}

#[derive(Clone)]
pub enum Instr {
    /// Pushes a name from globals, then the toolkit, then builtins.
    LoadGlobal(String),
    LoadLocal(String),
    LoadConst(Value),
    LoadGlobalsClosure,
    LoadLocalsClosure,
    StoreLocal(String),
    /// Pops compiled code and pushes its value.
    Eval,
    Call { args: usize, kwargs: usize },
    /// Like `Call`, but pushes the produced components, then their
    /// namespace.
    EnamlCall { args: usize, kwargs: usize },
    UnpackSequence(usize),
    EnamlAddChildren,
    DupTop,
    PopTop,
    RotTwo,
    GetItem(ItemKey),
    GetIter,
    /// Pushes the iterator back and then its next item, or pops it and
    /// jumps to the target when it is exhausted.
    ForIter(usize),
    JumpAbsolute(usize),
}

fn invalid_op() -> Error {
    Error::Vm("invalid VM op".into())
}

impl Instr {
    /// Decodes a raw `(opcode, operand)` pair.
    pub fn from_parts(op: u8, operand: Operand) -> Result<Instr> {
        let op = Opcode::from_u8(op).ok_or_else(invalid_op)?;
        Ok(match (op, operand) {
            (Opcode::LoadGlobal, Operand::Name(n)) => Instr::LoadGlobal(n),
            (Opcode::LoadLocal, Operand::Name(n)) => Instr::LoadLocal(n),
            (Opcode::LoadConst, Operand::Const(v)) => Instr::LoadConst(v),
            (Opcode::LoadGlobalsClosure, Operand::None) => Instr::LoadGlobalsClosure,
            (Opcode::LoadLocalsClosure, Operand::None) => Instr::LoadLocalsClosure,
            (Opcode::StoreLocal, Operand::Name(n)) => Instr::StoreLocal(n),
            (Opcode::Eval, Operand::None) => Instr::Eval,
            (Opcode::Call, Operand::Args(args, kwargs)) => Instr::Call { args, kwargs },
            (Opcode::EnamlCall, Operand::Args(args, kwargs)) => Instr::EnamlCall { args, kwargs },
            (Opcode::UnpackSequence, Operand::Count(n)) if n > 0 => Instr::UnpackSequence(n),
            (Opcode::EnamlAddChildren, Operand::None) => Instr::EnamlAddChildren,
            (Opcode::DupTop, Operand::None) => Instr::DupTop,
            (Opcode::PopTop, Operand::None) => Instr::PopTop,
            (Opcode::RotTwo, Operand::None) => Instr::RotTwo,
            (Opcode::GetItem, Operand::Name(n)) => Instr::GetItem(ItemKey::Name(n)),
            (Opcode::GetItem, Operand::Index(i)) => Instr::GetItem(ItemKey::Index(i)),
            (Opcode::GetIter, Operand::None) => Instr::GetIter,
            (Opcode::ForIter, Operand::Count(t)) => Instr::ForIter(t),
            (Opcode::JumpAbsolute, Operand::Count(t)) => Instr::JumpAbsolute(t),
            _ => return Err(invalid_op()),
        })
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::LoadGlobal(_) => Opcode::LoadGlobal,
            Instr::LoadLocal(_) => Opcode::LoadLocal,
            Instr::LoadConst(_) => Opcode::LoadConst,
            Instr::LoadGlobalsClosure => Opcode::LoadGlobalsClosure,
            Instr::LoadLocalsClosure => Opcode::LoadLocalsClosure,
            Instr::StoreLocal(_) => Opcode::StoreLocal,
            Instr::Eval => Opcode::Eval,
            Instr::Call { .. } => Opcode::Call,
            Instr::EnamlCall { .. } => Opcode::EnamlCall,
            Instr::UnpackSequence(_) => Opcode::UnpackSequence,
            Instr::EnamlAddChildren => Opcode::EnamlAddChildren,
            Instr::DupTop => Opcode::DupTop,
            Instr::PopTop => Opcode::PopTop,
            Instr::RotTwo => Opcode::RotTwo,
            Instr::GetItem(_) => Opcode::GetItem,
            Instr::GetIter => Opcode::GetIter,
            Instr::ForIter(_) => Opcode::ForIter,
            Instr::JumpAbsolute(_) => Opcode::JumpAbsolute,
        }
    }
}

impl fmt::Debug for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::LoadGlobal(n) => write!(f, "LOAD_GLOBAL {n}"),
            Instr::LoadLocal(n) => write!(f, "LOAD_LOCAL {n}"),
            Instr::LoadConst(v) => write!(f, "LOAD_CONST {}", v.repr()),
            Instr::LoadGlobalsClosure => f.write_str("LOAD_GLOBALS_CLOSURE"),
            Instr::LoadLocalsClosure => f.write_str("LOAD_LOCALS_CLOSURE"),
            Instr::StoreLocal(n) => write!(f, "STORE_LOCAL {n}"),
            Instr::Eval => f.write_str("EVAL"),
            Instr::Call { args, kwargs } => write!(f, "CALL ({args}, {kwargs})"),
            Instr::EnamlCall { args, kwargs } => write!(f, "ENAML_CALL ({args}, {kwargs})"),
            Instr::UnpackSequence(n) => write!(f, "UNPACK_SEQUENCE {n}"),
            Instr::EnamlAddChildren => f.write_str("ENAML_ADD_CHILDREN"),
            Instr::DupTop => f.write_str("DUP_TOP"),
            Instr::PopTop => f.write_str("POP_TOP"),
            Instr::RotTwo => f.write_str("ROT_TWO"),
            Instr::GetItem(ItemKey::Name(n)) => write!(f, "GET_ITEM {n}"),
            Instr::GetItem(ItemKey::Index(i)) => write!(f, "GET_ITEM [{i}]"),
            Instr::GetIter => f.write_str("GET_ITER"),
            Instr::ForIter(t) => write!(f, "FOR_ITER -> {t}"),
            Instr::JumpAbsolute(t) => write!(f, "JUMP_ABSOLUTE -> {t}"),
        }
    }
}

// ── Machine ───────────────────────────────────────────────────────────────

enum Slot {
    Value(Value),
    Iter(std::vec::IntoIter<Value>),
}

struct Machine<'a> {
    stack: Vec<Slot>,
    globals: &'a Rc<Namespace>,
    locals: &'a Rc<Namespace>,
    toolkit: &'a Rc<dyn Toolkit>,
}

impl Machine<'_> {
    fn push(&mut self, value: Value) {
        self.stack.push(Slot::Value(value));
    }

    fn pop_slot(&mut self) -> Result<Slot> {
        self.stack.pop().ok_or_else(|| Error::Vm("stack underflow".into()))
    }

    fn pop(&mut self) -> Result<Value> {
        match self.pop_slot()? {
            Slot::Value(v) => Ok(v),
            Slot::Iter(_) => Err(Error::Vm("expected a value on the stack, found an iterator".into())),
        }
    }

    fn scope(&self) -> Scope {
        Scope::new(Rc::clone(self.globals), Rc::clone(self.locals), Rc::clone(self.toolkit))
    }

    fn load_global(&self, name: &str) -> Result<Value> {
        self.globals
            .get(name)
            .or_else(|| lookup_value(self.toolkit, name))
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| Error::Name(format!("name `{name}` is not defined")))
    }

    /// Pops `kwargs` name/value pairs and then `args` positionals, both in
    /// source order.
    fn pop_arguments(&mut self, args: usize, kwargs: usize) -> Result<(Vec<Value>, Vec<(String, Value)>)> {
        let mut keywords = Vec::with_capacity(kwargs);
        for _ in 0..kwargs {
            let value = self.pop()?;
            let name = self.pop()?;
            let name = name
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| Error::Vm(format!("keyword name must be a string, not {}", name.type_name())))?;
            keywords.push((name, value));
        }
        keywords.reverse();
        let mut positional = Vec::with_capacity(args);
        for _ in 0..args {
            positional.push(self.pop()?);
        }
        positional.reverse();
        Ok((positional, keywords))
    }

    fn unpack(&mut self, n: usize) -> Result<()> {
        let value = self.pop()?;
        let items = value
            .as_sequence()
            .ok_or_else(|| Error::Type(format!("cannot unpack a {}", value.type_name())))?
            .to_vec();
        if n == 1 {
            match <[Value; 1]>::try_from(items) {
                Ok([single]) => self.push(single),
                Err(_) => self.push(value),
            }
            return Ok(());
        }
        match items.len() {
            len if len == n => {
                for item in items.into_iter().rev() {
                    self.push(item);
                }
                Ok(())
            }
            len if len > n => Err(Error::Value("too many values to unpack".into())),
            len => Err(Error::Value(format!("need more than {len} values to unpack"))),
        }
    }

    fn add_children(&mut self) -> Result<()> {
        let children = self.pop()?;
        let parent = self.pop()?;
        let parents = parent
            .as_sequence()
            .ok_or_else(|| Error::Vm(format!("children parent must be a sequence, not {}", parent.type_name())))?;
        let [parent] = parents else {
            return Err(Error::Vm("cannot add children to a sequence".into()));
        };
        let parent = parent
            .as_object()
            .ok_or_else(|| Error::Type(format!("cannot add children to a {}", parent.type_name())))?;
        for child in builtins::iterate(&children)? {
            let child = child
                .as_object()
                .ok_or_else(|| Error::Type(format!("a {} is not a component", child.type_name())))?;
            match child.role() {
                Role::Meta => parent.add_meta(child.clone()),
                _ => parent.add_child(child)?,
            }
        }
        Ok(())
    }

    fn get_item(&mut self, key: &ItemKey) -> Result<()> {
        let container = self.pop()?;
        let item = match (key, &container) {
            (ItemKey::Name(name), Value::Namespace(ns)) => {
                ns.get(name).ok_or_else(|| Error::Key(format!("'{name}'")))?
            }
            (ItemKey::Name(name), Value::Dict(_)) => subscript(&container, &Value::str(name))?,
            (ItemKey::Name(name), _) => container.getattr(name)?,
            (ItemKey::Index(i), _) => subscript(&container, &Value::Int(*i))?,
        };
        self.push(item);
        Ok(())
    }

    fn step(&mut self, instr: &Instr) -> Result<Option<usize>> {
        match instr {
            Instr::LoadGlobal(name) => {
                let value = self.load_global(name)?;
                self.push(value);
            }
            Instr::LoadLocal(name) => {
                let value = self.locals.get(name).ok_or_else(|| Error::Name(format!("name `{name}` is not defined")))?;
                self.push(value);
            }
            Instr::LoadConst(value) => self.push(value.clone()),
            Instr::LoadGlobalsClosure => self.push(Value::Namespace(Rc::clone(self.globals))),
            Instr::LoadLocalsClosure => self.push(Value::Namespace(Rc::clone(self.locals))),
            Instr::StoreLocal(name) => {
                let value = self.pop()?;
                self.locals.insert(name.as_str(), value);
            }
            Instr::Eval => {
                let Value::Code(code) = self.pop()? else {
                    return Err(Error::Vm("EVAL expects compiled code".into()));
                };
                let value = code.evaluate(&self.scope())?;
                self.push(value);
            }
            Instr::Call { args, kwargs } => {
                let (args, kwargs) = self.pop_arguments(*args, *kwargs)?;
                let callable = self.pop()?;
                let result = callable.call(args, kwargs)?;
                self.push(result);
            }
            Instr::EnamlCall { args, kwargs } => {
                let (args, kwargs) = self.pop_arguments(*args, *kwargs)?;
                let callable = self.pop()?;
                let (components, ns) = callable.enaml_call(args, kwargs)?;
                self.push(Value::tuple(components.into_iter().map(Value::Object)));
                self.push(Value::Namespace(ns));
            }
            Instr::UnpackSequence(n) => self.unpack(*n)?,
            Instr::EnamlAddChildren => self.add_children()?,
            Instr::DupTop => {
                let top = self.pop()?;
                self.push(top.clone());
                self.push(top);
            }
            Instr::PopTop => {
                self.pop_slot()?;
            }
            Instr::RotTwo => {
                let first = self.pop_slot()?;
                let second = self.pop_slot()?;
                self.stack.push(first);
                self.stack.push(second);
            }
            Instr::GetItem(key) => self.get_item(key)?,
            Instr::GetIter => {
                let value = self.pop()?;
                let items = builtins::iterate(&value)?;
                self.stack.push(Slot::Iter(items.into_iter()));
            }
            Instr::ForIter(target) => {
                let Slot::Iter(mut iter) = self.pop_slot()? else {
                    return Err(Error::Vm("FOR_ITER expects an iterator".into()));
                };
                match iter.next() {
                    Some(item) => {
                        self.stack.push(Slot::Iter(iter));
                        self.push(item);
                    }
                    None => return Ok(Some(*target)),
                }
            }
            Instr::JumpAbsolute(target) => return Ok(Some(*target)),
        }
        Ok(None)
    }
}

/// Runs `code` and returns the components it produced, detached from the
/// null container.
pub fn run(
    code: &[Instr],
    globals: &Rc<Namespace>,
    locals: &Rc<Namespace>,
    toolkit: &Rc<dyn Toolkit>,
) -> Result<Vec<ObjectRef>> {
    let null = ClassDef::build("NullComponent", Role::Container).finish().instantiate();
    let sentinel = Value::tuple([Value::Object(null.clone())]);
    let mut machine = Machine { stack: vec![Slot::Value(sentinel.clone())], globals, locals, toolkit };

    let mut pc = 0;
    while let Some(instr) = code.get(pc) {
        log::trace!("{pc:>4}  {instr:?}  (depth {})", machine.stack.len());
        pc = match machine.step(instr)? {
            Some(target) => target,
            None => pc + 1,
        };
    }

    match machine.stack.as_slice() {
        [Slot::Value(top)] if top.is(&sentinel) => {}
        other => return Err(Error::Vm(format!("unbalanced stack: {} items left", other.len()))),
    }

    let components = null.children();
    for child in &components {
        null.remove_child(child)?;
    }
    Ok(components)
}
