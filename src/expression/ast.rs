/// Syntax tree of a password expression.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    None,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Name(String),
    Attribute { target: Box<Expr>, name: String },
    Call { callee: Box<Expr>, args: Vec<Expr> },
    Index { target: Box<Expr>, index: Box<Expr> },
    Slice {
        target: Box<Expr>,
        start: Option<Box<Expr>>,
        end: Option<Box<Expr>>,
    },
    Negate(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// Postfix operation following a primary expression.
#[derive(Debug)]
pub(crate) enum Suffix {
    Attribute(String),
    Call(Vec<Expr>),
    Index(Expr),
    Slice(Option<Expr>, Option<Expr>),
}

impl Suffix {
    pub(crate) fn apply(self, target: Expr) -> Expr {
        let target = Box::new(target);
        match self {
            Suffix::Attribute(name) => Expr::Attribute { target, name },
            Suffix::Call(args) => Expr::Call { callee: target, args },
            Suffix::Index(index) => Expr::Index {
                target,
                index: Box::new(index),
            },
            Suffix::Slice(start, end) => Expr::Slice {
                target,
                start: start.map(Box::new),
                end: end.map(Box::new),
            },
        }
    }
}
