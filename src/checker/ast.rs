use super::lexer::Span;

/// Dense id of an expression or pattern node, assigned by the parser.
///
/// An identifier pattern shares its id with its `Ident`, and a function
/// expression shares its id with its `Function`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Dense id of a function (declaration, expression, arrow or method).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

impl FuncId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A whole source file.
#[derive(Debug, Clone)]
pub struct Program {
    pub body: Vec<Stmt>,
    pub node_count: usize,
    pub function_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Var,
    Let,
    Const,
}

impl VarKind {
    pub fn keyword(self) -> &'static str {
        match self {
            VarKind::Var => "var",
            VarKind::Let => "let",
            VarKind::Const => "const",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Declarator {
    pub target: Pattern,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ForInit {
    Var {
        kind: VarKind,
        declarators: Vec<Declarator>,
    },
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        kind: VarKind,
        declarators: Vec<Declarator>,
        span: Span,
    },
    Function(Function),
    Return {
        argument: Option<Expr>,
        span: Span,
    },
    If {
        test: Expr,
        consequent: Box<Stmt>,
        alternate: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        test: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    DoWhile {
        body: Box<Stmt>,
        test: Expr,
        span: Span,
    },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        span: Span,
    },
    Block(Block),
    Expr(Expr),
    Break(Span),
    Continue(Span),
    Empty(Span),
}

#[derive(Debug, Clone)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Block(Block),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Function {
    pub node: NodeId,
    pub func: FuncId,
    pub name: Option<Ident>,
    pub params: Vec<Pattern>,
    pub body: FunctionBody,
    pub is_arrow: bool,
    /// A `function` declaration statement (not an expression or method).
    pub is_declaration: bool,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: NodeId,
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum PatternKind {
    Ident(Ident),
    Array(Vec<Option<Pattern>>),
    Object(Vec<PatternProp>),
    /// `left = right` default value.
    Assign { left: Box<Pattern>, right: Box<Expr> },
    Rest(Box<Pattern>),
}

#[derive(Debug, Clone)]
pub enum PatternProp {
    Prop { key: String, value: Pattern },
    Rest(Pattern),
}

impl Pattern {
    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            PatternKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    /// The identifier of `x` or `x = default`.
    pub fn simple_name(&self) -> Option<&Ident> {
        match &self.kind {
            PatternKind::Ident(ident) => Some(ident),
            PatternKind::Assign { left, .. } => left.as_ident(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateElement {
    pub cooked: String,
    pub raw: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Template {
    pub quasis: Vec<TemplateElement>,
    pub expressions: Vec<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Spread {
    pub id: NodeId,
    pub argument: Box<Expr>,
    pub span: Span,
}

/// Array element or call argument.
#[derive(Debug, Clone)]
pub enum Element {
    Expr(Expr),
    Spread(Spread),
}

impl Element {
    pub fn id(&self) -> NodeId {
        match self {
            Element::Expr(expr) => expr.id,
            Element::Spread(spread) => spread.id,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Element::Expr(expr) => expr.span,
            Element::Spread(spread) => spread.span,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PropKey {
    Name(String),
    Computed(Box<Expr>),
}

impl PropKey {
    pub fn name(&self) -> Option<&str> {
        match self {
            PropKey::Name(name) => Some(name),
            PropKey::Computed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Property {
    KeyValue {
        key: PropKey,
        value: Expr,
        shorthand: bool,
    },
    Method {
        key: PropKey,
        function: Function,
    },
    Spread(Spread),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    Not,
    Typeof,
    Void,
    Delete,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
            UnaryOp::Typeof => "typeof",
            UnaryOp::Void => "void",
            UnaryOp::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Increment,
    Decrement,
}

impl UpdateOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UpdateOp::Increment => "++",
            UpdateOp::Decrement => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    In,
    Instanceof,
}

impl BinaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::In => "in",
            BinaryOp::Instanceof => "instanceof",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone)]
pub enum MemberProp {
    Name(String),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone)]
pub enum AssignTarget {
    Pattern(Pattern),
    Member(Box<Expr>),
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Number(f64),
    BigInt(String),
    Str(String),
    Bool(bool),
    Null,
    Regex {
        pattern: String,
        flags: String,
    },
    Template(Template),
    TaggedTemplate {
        tag: Box<Expr>,
        quasi: Template,
    },
    Ident(Ident),
    Array(Vec<Option<Element>>),
    Object(Vec<Property>),
    Function(Function),
    Unary {
        op: UnaryOp,
        argument: Box<Expr>,
    },
    Update {
        op: UpdateOp,
        prefix: bool,
        argument: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    Assign {
        target: AssignTarget,
        value: Box<Expr>,
    },
    Sequence(Vec<Expr>),
    Call {
        callee: Box<Expr>,
        arguments: Vec<Element>,
    },
    New {
        callee: Box<Expr>,
        arguments: Vec<Element>,
    },
    Member {
        object: Box<Expr>,
        property: MemberProp,
    },
    This,
}

impl Expr {
    pub fn as_ident(&self) -> Option<&Ident> {
        match &self.kind {
            ExprKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match &self.kind {
            ExprKind::Function(function) => Some(function),
            _ => None,
        }
    }
}
