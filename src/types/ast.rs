//! The parsed syntax tree. A plain tagged-union AST (§9 Design Notes: "Visitor
//! explosion" — this crate uses `match`, not per-variant `accept`/`visit` dispatch).

use crate::symbol::Symbol;

/// A unique, non-zero, pre-order-assigned id. The universal key for every semantic
/// side table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Hands out node ids in construction order, i.e. pre-order, as the parser builds
/// each node bottom-up-but-numbered-top-down (a node's id is allocated before its
/// children are parsed, matching "assigned by a single pre-order traversal").
#[derive(Default)]
pub struct NodeIdGen(u32);

impl NodeIdGen {
    pub fn new() -> Self { NodeIdGen(0) }
    pub fn next(&mut self) -> NodeId {
        self.0 += 1;
        NodeId(self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LiteralKind {
    Number,
    Str,
    Char,
    Bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BinaryOp {
    Add, Sub, Mul, Div, Rem,
    And, Or, Xor,
    AndAnd, OrOr,
    Eq, Ne, Lt, Gt, Le, Ge,
    Shl, Shr,
    Assign,
    AddAssign, SubAssign, MulAssign, DivAssign, RemAssign,
    AndAssign, OrAssign, XorAssign,
    ShlAssign, ShrAssign,
}

impl BinaryOp {
    /// The family of an operator, used by pass 4 to choose legality rules.
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AddAssign | BinaryOp::SubAssign | BinaryOp::MulAssign
                | BinaryOp::DivAssign | BinaryOp::RemAssign
                | BinaryOp::AndAssign | BinaryOp::OrAssign | BinaryOp::XorAssign
                | BinaryOp::ShlAssign | BinaryOp::ShrAssign
        )
    }

    /// The underlying arithmetic/bitwise/shift op a compound assignment performs
    /// before storing, or `None` for plain `=`.
    pub fn compound_op(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AddAssign => BinaryOp::Add,
            BinaryOp::SubAssign => BinaryOp::Sub,
            BinaryOp::MulAssign => BinaryOp::Mul,
            BinaryOp::DivAssign => BinaryOp::Div,
            BinaryOp::RemAssign => BinaryOp::Rem,
            BinaryOp::AndAssign => BinaryOp::And,
            BinaryOp::OrAssign => BinaryOp::Or,
            BinaryOp::XorAssign => BinaryOp::Xor,
            BinaryOp::ShlAssign => BinaryOp::Shl,
            BinaryOp::ShrAssign => BinaryOp::Shr,
            _ => return None,
        })
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge)
    }
    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::AndAnd | BinaryOp::OrOr)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOp {
    Neg,
    Not,
    Ref,
    RefMut,
    Deref,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefKind {
    None,
    Ref,
    RefMut,
}

/// How a method/associated function binds its first implicit argument.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ReceiverKind {
    None,
    ByValue,
    Ref,
    RefMut,
}

#[derive(Debug)]
pub struct ExprNode {
    pub id: NodeId,
    pub kind: ExprKind,
}

pub type Expr = Box<ExprNode>;

#[derive(Debug)]
pub enum ExprKind {
    Literal(LiteralKind, String),
    Identifier(Symbol),
    Binary(BinaryOp, Expr, Expr),
    Unary(UnaryOp, Expr),
    Call(Expr, Vec<Expr>),
    Field(Expr, Symbol),
    Struct(Symbol, Vec<(Symbol, Expr)>),
    Index(Expr, Expr),
    Block(Block),
    If(Expr, Block, Option<Block>),
    While(Expr, Block),
    Loop(Block),
    Return(Option<Expr>),
    Break(Option<Expr>),
    Continue(Option<Expr>),
    Cast(Expr, crate::types::ast::Type),
    /// `Base::name`, e.g. an associated const or an enum variant.
    Path(crate::types::ast::Type, Symbol),
    SelfExpr,
    Unit,
    Array(Vec<Expr>),
    /// `[elem; size]`.
    RepeatArray(Expr, Expr),
}

/// A brace-delimited sequence of statements with an optional trailing expression.
#[derive(Debug)]
pub struct Block {
    pub id: NodeId,
    pub statements: Vec<Stmt>,
    /// The final expression statement with no trailing semicolon, if any.
    pub tail: Option<Stmt>,
}

#[derive(Debug)]
pub struct StmtNode {
    pub id: NodeId,
    pub kind: StmtKind,
}

pub type Stmt = Box<StmtNode>;

#[derive(Debug)]
pub enum StmtKind {
    Let { pattern: Pattern, ty: Option<Type>, init: Option<Expr> },
    Expr { expr: Expr, has_semi: bool },
    Item(Item),
}

#[derive(Debug)]
pub struct PatternNode {
    pub id: NodeId,
    pub kind: PatternKind,
}

pub type Pattern = Box<PatternNode>;

#[derive(Debug)]
pub enum PatternKind {
    Identifier { name: Symbol, mutable: bool, by_ref: RefKind },
}

#[derive(Debug)]
pub struct TypeNode {
    pub id: NodeId,
    pub kind: TypeKind,
}

pub type Type = Box<TypeNode>;

#[derive(Debug)]
pub enum TypeKind {
    Path { name: Symbol, reference: RefKind },
    Array { elem: Type, size: Expr, reference: RefKind },
    Unit,
    SelfType,
}

#[derive(Debug)]
pub struct ItemNode {
    pub id: NodeId,
    pub kind: ItemKind,
}

pub type Item = Box<ItemNode>;

#[derive(Debug)]
pub struct FnParam {
    pub pattern: Pattern,
    pub ty: Type,
}

#[derive(Debug)]
pub struct FnSig {
    pub name: Symbol,
    pub receiver: ReceiverKind,
    pub params: Vec<FnParam>,
    pub return_type: Option<Type>,
    pub body: Block,
}

#[derive(Debug)]
pub struct StructField {
    pub name: Symbol,
    pub ty: Type,
}

#[derive(Debug)]
pub enum ItemKind {
    Fn(FnSig),
    Struct { name: Symbol, fields: Vec<StructField> },
    Enum { name: Symbol, variants: Vec<Symbol> },
    Impl { struct_name: Symbol, items: Vec<Item> },
    Const { name: Symbol, ty: Type, value: Expr },
}
