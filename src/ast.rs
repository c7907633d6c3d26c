use rustc_hash::FxHashMap;

use crate::intern::{Interner, NameId};

/// Maximum statement nesting depth accepted by the backend.
pub const MAX_BODY_DEPTH: u32 = 255;
/// Maximum expression nesting depth accepted by the backend.
pub const MAX_EXPR_DEPTH: u32 = 255;

// ══════════════════════════════════════════════════════════════
// Top-Level
// ══════════════════════════════════════════════════════════════

/// One source file: an ordered list of top-level declarations.
#[derive(Debug, Clone)]
pub struct File {
    pub decls: Vec<Decl>,
}

/// A top-level declaration in a file.
#[derive(Debug, Clone)]
pub enum Decl {
    Struct(StructDecl),
    Func(FuncDecl),
    Status(StatusDecl),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// A recoverable suspension signal.
    Status,
    /// A fatal error.
    Error,
}

/// A `status "..."` or `error "..."` declaration.
#[derive(Debug, Clone)]
pub struct StatusDecl {
    pub keyword: StatusKind,
    /// The string-literal token of the status message, quotes included.
    pub message: NameId,
    pub public: bool,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: NameId,
    pub fields: Vec<Field>,
    pub public: bool,
    pub suspendible: bool,
}

/// A struct field or function input parameter.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: NameId,
    pub xtype: TypeExpr,
    /// Constant-folded default value, if the field declares one.
    pub default_value: Option<i128>,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    /// The struct this function is a method of, if any.
    pub receiver: Option<NameId>,
    pub name: NameId,
    pub in_fields: Vec<Field>,
    pub body: Vec<Stmt>,
    pub public: bool,
    pub suspendible: bool,
}

// ══════════════════════════════════════════════════════════════
// Types
// ══════════════════════════════════════════════════════════════

/// The base name of a type: a built-in scalar, a built-in I/O buffer, or a
/// package-level struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Usize,
    Bool,
    Buf1,
    Buf2,
    Ident(NameId),
}

/// A type expression. Refinement bounds arrive constant-folded from the
/// bounds checker; array lengths likewise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Base {
        name: TypeName,
        /// Optional `[min..max]` refinement bounds.
        bounds: [Option<i128>; 2],
    },
    Ptr {
        inner: Box<TypeExpr>,
    },
    Array {
        length: i128,
        inner: Box<TypeExpr>,
    },
}

impl TypeExpr {
    pub fn base(name: TypeName) -> TypeExpr {
        TypeExpr::Base {
            name,
            bounds: [None, None],
        }
    }

    pub fn refined(name: TypeName, min: Option<i128>, max: Option<i128>) -> TypeExpr {
        TypeExpr::Base {
            name,
            bounds: [min, max],
        }
    }

    pub fn ptr(inner: TypeExpr) -> TypeExpr {
        TypeExpr::Ptr {
            inner: Box::new(inner),
        }
    }

    pub fn array(length: i128, inner: TypeExpr) -> TypeExpr {
        TypeExpr::Array {
            length,
            inner: Box::new(inner),
        }
    }

    pub fn is_refined(&self) -> bool {
        matches!(self, TypeExpr::Base { bounds, .. } if bounds.iter().any(Option::is_some))
    }

    pub fn is_bool(&self) -> bool {
        matches!(
            self,
            TypeExpr::Base {
                name: TypeName::Bool,
                ..
            }
        )
    }

    /// The type at the innermost position, peeling pointers and arrays.
    pub fn innermost(&self) -> &TypeExpr {
        match self {
            TypeExpr::Base { .. } => self,
            TypeExpr::Ptr { inner } | TypeExpr::Array { inner, .. } => inner.innermost(),
        }
    }

    /// Source-syntax rendering, used only in error messages.
    pub fn display(&self, tm: &Interner) -> String {
        match self {
            TypeExpr::Base { name, bounds } => {
                let base = match name {
                    TypeName::I8 => "i8",
                    TypeName::I16 => "i16",
                    TypeName::I32 => "i32",
                    TypeName::I64 => "i64",
                    TypeName::U8 => "u8",
                    TypeName::U16 => "u16",
                    TypeName::U32 => "u32",
                    TypeName::U64 => "u64",
                    TypeName::Usize => "usize",
                    TypeName::Bool => "bool",
                    TypeName::Buf1 => "buf1",
                    TypeName::Buf2 => "buf2",
                    TypeName::Ident(id) => tm.resolve(*id),
                };
                match bounds {
                    [None, None] => base.to_string(),
                    [min, max] => {
                        let b = |o: &Option<i128>| {
                            o.map(|v| v.to_string()).unwrap_or_default()
                        };
                        format!("{base}[{}..{}]", b(min), b(max))
                    }
                }
            }
            TypeExpr::Ptr { inner } => format!("ptr {}", inner.display(tm)),
            TypeExpr::Array { length, inner } => {
                format!("[{length}] {}", inner.display(tm))
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Statements
// ══════════════════════════════════════════════════════════════

/// Identity of a `while` loop, assigned by the parser. Break/continue jumps
/// name their target loop by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Eq,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    ShiftLEq,
    ShiftREq,
    AmpEq,
    /// Bit-clear compound assignment `~^=`.
    AmpHatEq,
    PipeEq,
    HatEq,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assert {
        condition: Expr,
    },
    Assign {
        op: AssignOp,
        lhs: Expr,
        rhs: Expr,
    },
    Expr(Expr),
    If(IfStmt),
    Jump {
        keyword: JumpKind,
        target: LoopId,
    },
    Return {
        /// The quoted message token of a declared status, or `None` for a
        /// plain `return` (which yields "ok").
        status: Option<NameId>,
    },
    Var {
        name: NameId,
        xtype: TypeExpr,
        value: Option<Expr>,
    },
    While(WhileStmt),
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: Expr,
    pub body_if_true: Vec<Stmt>,
    pub body_if_false: Vec<Stmt>,
    pub else_if: Option<Box<IfStmt>>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub label: LoopId,
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub has_break: bool,
    pub has_continue: bool,
}

// ══════════════════════════════════════════════════════════════
// Expressions
// ══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Plus,
    Minus,
    Star,
    Slash,
    ShiftL,
    ShiftR,
    Amp,
    /// Bit-clear `~^`.
    AmpHat,
    Pipe,
    Hat,
    NotEq,
    LessThan,
    LessEq,
    EqEq,
    GreaterEq,
    GreaterThan,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssocOp {
    Plus,
    Star,
    Amp,
    Pipe,
    Hat,
    And,
    Or,
}

/// A named call argument, e.g. the `x:v_byte` in `in.dst.write_u8?(x:v_byte)`.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: NameId,
    pub value: Expr,
}

/// An expression together with the annotations the type and bounds checkers
/// leave on it. The backend re-checks none of them.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    /// The resolved type. Pseudo-receivers (`this`, `in`) and method
    /// selectors have no C-relevant type and carry `None`.
    pub mtype: Option<TypeExpr>,
    /// Constant-folded value, if the checker proved one.
    pub const_value: Option<i128>,
    /// The subtree contains a suspendible call.
    pub suspendible: bool,
    /// This node itself is a `foo?()` call.
    pub call_suspendible: bool,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A literal constant; `const_value` holds it.
    Literal,
    /// The pseudo-receiver `this`.
    This,
    /// The pseudo-struct `in` of function inputs.
    In,
    Ident(NameId),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Associative {
        op: AssocOp,
        args: Vec<Expr>,
    },
    /// The cast `lhs as to`.
    As {
        lhs: Box<Expr>,
        to: TypeExpr,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Arg>,
        /// The call was written `foo!()`: impure but not suspendible.
        impure: bool,
    },
    Index {
        lhs: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        lhs: Box<Expr>,
        from: Option<Box<Expr>>,
        to: Option<Box<Expr>>,
    },
    Dot {
        lhs: Box<Expr>,
        name: NameId,
    },
}

impl Expr {
    fn new(kind: ExprKind, mtype: Option<TypeExpr>, suspendible: bool) -> Expr {
        Expr {
            kind,
            mtype,
            const_value: None,
            suspendible,
            call_suspendible: false,
        }
    }

    pub fn literal(value: i128, mtype: TypeExpr) -> Expr {
        Expr {
            kind: ExprKind::Literal,
            mtype: Some(mtype),
            const_value: Some(value),
            suspendible: false,
            call_suspendible: false,
        }
    }

    pub fn bool_literal(value: bool) -> Expr {
        Expr::literal(i128::from(value), TypeExpr::base(TypeName::Bool))
    }

    pub fn this() -> Expr {
        Expr::new(ExprKind::This, None, false)
    }

    pub fn in_token() -> Expr {
        Expr::new(ExprKind::In, None, false)
    }

    pub fn ident(name: NameId, mtype: TypeExpr) -> Expr {
        Expr::new(ExprKind::Ident(name), Some(mtype), false)
    }

    pub fn unary(op: UnaryOp, operand: Expr, mtype: TypeExpr) -> Expr {
        let suspendible = operand.suspendible;
        Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            Some(mtype),
            suspendible,
        )
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, mtype: TypeExpr) -> Expr {
        let suspendible = lhs.suspendible || rhs.suspendible;
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Some(mtype),
            suspendible,
        )
    }

    pub fn associative(op: AssocOp, args: Vec<Expr>, mtype: TypeExpr) -> Expr {
        let suspendible = args.iter().any(|a| a.suspendible);
        Expr::new(
            ExprKind::Associative { op, args },
            Some(mtype),
            suspendible,
        )
    }

    pub fn cast(lhs: Expr, to: TypeExpr) -> Expr {
        let suspendible = lhs.suspendible;
        let mtype = to.clone();
        Expr::new(
            ExprKind::As {
                lhs: Box::new(lhs),
                to,
            },
            Some(mtype),
            suspendible,
        )
    }

    pub fn call_pure(callee: Expr, args: Vec<Arg>, mtype: TypeExpr) -> Expr {
        Expr::call(callee, args, mtype, false, false)
    }

    pub fn call_impure(callee: Expr, args: Vec<Arg>, mtype: TypeExpr) -> Expr {
        Expr::call(callee, args, mtype, true, false)
    }

    pub fn call_suspendible(callee: Expr, args: Vec<Arg>, mtype: TypeExpr) -> Expr {
        Expr::call(callee, args, mtype, false, true)
    }

    fn call(
        callee: Expr,
        args: Vec<Arg>,
        mtype: TypeExpr,
        impure: bool,
        call_suspendible: bool,
    ) -> Expr {
        let suspendible = call_suspendible
            || callee.suspendible
            || args.iter().any(|a| a.value.suspendible);
        Expr {
            kind: ExprKind::Call {
                callee: Box::new(callee),
                args,
                impure,
            },
            mtype: Some(mtype),
            const_value: None,
            suspendible,
            call_suspendible,
        }
    }

    pub fn index(lhs: Expr, index: Expr, mtype: TypeExpr) -> Expr {
        let suspendible = lhs.suspendible || index.suspendible;
        Expr::new(
            ExprKind::Index {
                lhs: Box::new(lhs),
                index: Box::new(index),
            },
            Some(mtype),
            suspendible,
        )
    }

    pub fn slice(lhs: Expr, from: Option<Expr>, to: Option<Expr>) -> Expr {
        let suspendible = lhs.suspendible
            || from.as_ref().is_some_and(|e| e.suspendible)
            || to.as_ref().is_some_and(|e| e.suspendible);
        Expr::new(
            ExprKind::Slice {
                lhs: Box::new(lhs),
                from: from.map(Box::new),
                to: to.map(Box::new),
            },
            None,
            suspendible,
        )
    }

    pub fn dot(lhs: Expr, name: NameId) -> Expr {
        let suspendible = lhs.suspendible;
        Expr::new(
            ExprKind::Dot {
                lhs: Box::new(lhs),
                name,
            },
            None,
            suspendible,
        )
    }

    /// Contained sub-expressions in source evaluation order: LHS, then MHS,
    /// then RHS, then the argument list.
    pub fn sub_exprs(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal | ExprKind::This | ExprKind::In | ExprKind::Ident(_) => {
                Vec::new()
            }
            ExprKind::Unary { operand, .. } => vec![operand],
            ExprKind::Binary { lhs, rhs, .. } => vec![lhs, rhs],
            ExprKind::Associative { args, .. } => args.iter().collect(),
            ExprKind::As { lhs, .. } => vec![lhs],
            ExprKind::Call { callee, args, .. } => {
                let mut subs: Vec<&Expr> = vec![callee];
                subs.extend(args.iter().map(|a| &a.value));
                subs
            }
            ExprKind::Index { lhs, index } => vec![lhs, index],
            ExprKind::Slice { lhs, from, to } => {
                let mut subs: Vec<&Expr> = vec![lhs];
                subs.extend(from.iter().map(|e| &**e));
                subs.extend(to.iter().map(|e| &**e));
                subs
            }
            ExprKind::Dot { lhs, .. } => vec![lhs],
        }
    }

    /// Source-syntax rendering, used only in error messages.
    pub fn display(&self, tm: &Interner) -> String {
        match &self.kind {
            ExprKind::Literal => self
                .const_value
                .map(|v| v.to_string())
                .unwrap_or_default(),
            ExprKind::This => "this".to_string(),
            ExprKind::In => "in".to_string(),
            ExprKind::Ident(id) => tm.resolve(*id).to_string(),
            ExprKind::Unary { op, operand } => {
                let op = match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Minus => "-",
                    UnaryOp::Not => "not ",
                };
                format!("{op}{}", operand.display(tm))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                format!(
                    "({} {} {})",
                    lhs.display(tm),
                    binary_op_display(*op),
                    rhs.display(tm)
                )
            }
            ExprKind::Associative { op, args } => {
                let op = match op {
                    AssocOp::Plus => "+",
                    AssocOp::Star => "*",
                    AssocOp::Amp => "&",
                    AssocOp::Pipe => "|",
                    AssocOp::Hat => "^",
                    AssocOp::And => "and",
                    AssocOp::Or => "or",
                };
                let parts: Vec<String> = args.iter().map(|a| a.display(tm)).collect();
                format!("({})", parts.join(&format!(" {op} ")))
            }
            ExprKind::As { lhs, to } => {
                format!("({} as {})", lhs.display(tm), to.display(tm))
            }
            ExprKind::Call { callee, args, impure } => {
                let mark = if self.call_suspendible {
                    "?"
                } else if *impure {
                    "!"
                } else {
                    ""
                };
                let parts: Vec<String> = args
                    .iter()
                    .map(|a| format!("{}:{}", tm.resolve(a.name), a.value.display(tm)))
                    .collect();
                format!("{}{mark}({})", callee.display(tm), parts.join(", "))
            }
            ExprKind::Index { lhs, index } => {
                format!("{}[{}]", lhs.display(tm), index.display(tm))
            }
            ExprKind::Slice { lhs, from, to } => {
                let part = |o: &Option<Box<Expr>>| {
                    o.as_ref().map(|e| e.display(tm)).unwrap_or_default()
                };
                format!("{}[{}:{}]", lhs.display(tm), part(from), part(to))
            }
            ExprKind::Dot { lhs, name } => {
                format!("{}.{}", lhs.display(tm), tm.resolve(*name))
            }
        }
    }
}

fn binary_op_display(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Plus => "+",
        BinaryOp::Minus => "-",
        BinaryOp::Star => "*",
        BinaryOp::Slash => "/",
        BinaryOp::ShiftL => "<<",
        BinaryOp::ShiftR => ">>",
        BinaryOp::Amp => "&",
        BinaryOp::AmpHat => "~^",
        BinaryOp::Pipe => "|",
        BinaryOp::Hat => "^",
        BinaryOp::NotEq => "!=",
        BinaryOp::LessThan => "<",
        BinaryOp::LessEq => "<=",
        BinaryOp::EqEq => "==",
        BinaryOp::GreaterEq => ">=",
        BinaryOp::GreaterThan => ">",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

// ══════════════════════════════════════════════════════════════
// Struct ordering
// ══════════════════════════════════════════════════════════════

/// Topologically sort structs so that a struct appears after every struct
/// its fields mention, seeded by declaration order for determinism. Returns
/// `None` if the embedding relation has a cycle.
pub fn topological_sort_structs<'a>(
    structs: &[&'a StructDecl],
) -> Option<Vec<&'a StructDecl>> {
    let mut index: FxHashMap<NameId, usize> = FxHashMap::default();
    for (i, n) in structs.iter().enumerate() {
        index.insert(n.name, i);
    }

    // 0 = unvisited, 1 = on the visit stack, 2 = done.
    let mut state = vec![0u8; structs.len()];
    let mut sorted = Vec::with_capacity(structs.len());
    for i in 0..structs.len() {
        if !visit(i, structs, &index, &mut state, &mut sorted) {
            return None;
        }
    }
    Some(sorted)
}

fn visit<'a>(
    i: usize,
    structs: &[&'a StructDecl],
    index: &FxHashMap<NameId, usize>,
    state: &mut [u8],
    sorted: &mut Vec<&'a StructDecl>,
) -> bool {
    match state[i] {
        2 => return true,
        1 => return false,
        _ => {}
    }
    state[i] = 1;
    for f in &structs[i].fields {
        if let TypeExpr::Base {
            name: TypeName::Ident(id),
            ..
        } = f.xtype.innermost()
        {
            if let Some(&j) = index.get(id) {
                if !visit(j, structs, index, state, sorted) {
                    return false;
                }
            }
        }
    }
    state[i] = 2;
    sorted.push(structs[i]);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_struct(name: NameId, field_of: Option<NameId>) -> StructDecl {
        let fields = match field_of {
            Some(id) => vec![Field {
                name,
                xtype: TypeExpr::base(TypeName::Ident(id)),
                default_value: None,
            }],
            None => Vec::new(),
        };
        StructDecl {
            name,
            fields,
            public: false,
            suspendible: true,
        }
    }

    #[test]
    fn topological_sort_orders_embedded_first() {
        let mut tm = Interner::new();
        let outer = tm.intern("outer");
        let inner = tm.intern("inner");

        let a = named_struct(outer, Some(inner));
        let b = named_struct(inner, None);
        let sorted = topological_sort_structs(&[&a, &b]).unwrap();
        assert_eq!(sorted[0].name, inner);
        assert_eq!(sorted[1].name, outer);
    }

    #[test]
    fn topological_sort_rejects_cycles() {
        let mut tm = Interner::new();
        let a_name = tm.intern("a");
        let b_name = tm.intern("b");

        let a = named_struct(a_name, Some(b_name));
        let b = named_struct(b_name, Some(a_name));
        assert!(topological_sort_structs(&[&a, &b]).is_none());
    }

    #[test]
    fn suspendible_flag_propagates_through_builders() {
        let mut tm = Interner::new();
        let src = tm.intern("src");
        let read_u8 = tm.intern("read_u8");

        let call = Expr::call_suspendible(
            Expr::dot(Expr::dot(Expr::in_token(), src), read_u8),
            Vec::new(),
            TypeExpr::base(TypeName::U8),
        );
        assert!(call.suspendible);
        assert!(call.call_suspendible);

        let sum = Expr::binary(
            BinaryOp::Plus,
            Expr::literal(1, TypeExpr::base(TypeName::U8)),
            call,
            TypeExpr::base(TypeName::U8),
        );
        assert!(sum.suspendible);
        assert!(!sum.call_suspendible);
    }
}
