//! Abstract syntax tree
//!
//! The tree doubles as the sandbox's class file format: the compiler fills in
//! the resolution slots ([`Binding`], [`CallTarget`], [`TypeRef::provider`])
//! and serializes the annotated declaration. Spans are not serialized so that
//! moving a declaration inside its unit does not change its class bytes.

use serde::{Deserialize, Serialize};

use crate::util::span::Span;

/// Declaration modifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modifier {
    Public,
    Private,
    Protected,
    Static,
    Final,
    Abstract,
}

impl Modifier {
    /// Keyword text
    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Public => "public",
            Modifier::Private => "private",
            Modifier::Protected => "protected",
            Modifier::Static => "static",
            Modifier::Final => "final",
            Modifier::Abstract => "abstract",
        }
    }
}

/// Modifier occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierUse {
    pub modifier: Modifier,
    #[serde(skip)]
    pub span: Span,
}

/// Written type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub args: Vec<TypeRef>,
    /// Class declaring the type, for user classes
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(skip)]
    pub span: Span,
}

impl TypeRef {
    /// Type as written, generics included
    pub fn written(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            let args: Vec<String> = self.args.iter().map(TypeRef::written).collect();
            format!("{}<{}>", self.name, args.join(", "))
        }
    }

    /// Type with generic arguments erased
    pub fn erased(&self) -> &str {
        &self.name
    }

    /// Every type name mentioned, arguments included
    pub fn names(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        for arg in &self.args {
            names.extend(arg.names());
        }
        names
    }
}

/// Method parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub ty: TypeRef,
    pub name: String,
}

/// Variable or field declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub modifiers: Vec<ModifierUse>,
    pub ty: TypeRef,
    pub name: String,
    pub init: Option<Expr>,
    #[serde(skip)]
    pub name_span: Span,
    #[serde(skip)]
    pub span: Span,
}

/// Method declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDecl {
    pub modifiers: Vec<ModifierUse>,
    pub ret: TypeRef,
    pub name: String,
    pub params: Vec<Param>,
    pub body: Block,
    #[serde(skip)]
    pub name_span: Span,
    #[serde(skip)]
    pub span: Span,
}

impl MethodDecl {
    /// Parameter types as written, e.g. `int, List<String>`
    pub fn parameter_text(&self) -> String {
        let types: Vec<String> = self.params.iter().map(|p| p.ty.written()).collect();
        types.join(", ")
    }

    /// Parameter types with generics erased, e.g. `(int,List)`
    pub fn erased_signature(&self) -> String {
        let types: Vec<&str> = self.params.iter().map(|p| p.ty.erased()).collect();
        format!("({})", types.join(","))
    }
}

/// Class declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDecl {
    pub modifiers: Vec<ModifierUse>,
    pub name: String,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<MethodDecl>,
    #[serde(skip)]
    pub name_span: Span,
    #[serde(skip)]
    pub span: Span,
}

impl ClassDecl {
    /// Find a method by name and erased signature
    pub fn method(
        &self,
        name: &str,
        signature: &str,
    ) -> Option<&MethodDecl> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.erased_signature() == signature)
    }

    /// Find a field by name
    pub fn field(
        &self,
        name: &str,
    ) -> Option<&VarDecl> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Block of statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    #[serde(skip)]
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    Local(VarDecl),
    Expr(Expr),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    Return {
        value: Option<Expr>,
        #[serde(skip)]
        span: Span,
    },
    Throw(Expr),
    Block(Block),
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Operator text
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnOp {
    Neg,
    Not,
}

/// What a bare name refers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Binding {
    #[default]
    Unbound,
    /// Local variable or parameter
    Local,
    /// Field of the enclosing class
    Field,
    /// Top-level variable declared by the named class
    Global(String),
}

/// What a call invokes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CallTarget {
    #[default]
    Unbound,
    /// Method of the enclosing class, by erased signature
    Member(String),
    /// Top-level method declared by the named class
    Global(String),
    /// Library function, by qualified name
    Native(String),
    /// Stub standing in for a body that is not compiled yet
    Stub,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(skip)]
    pub span: Span,
}

/// Expression kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    Null,
    Name {
        name: String,
        #[serde(default)]
        binding: Binding,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
        #[serde(default)]
        target: CallTarget,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        args: Vec<Expr>,
        /// Erased signature of the selected method
        #[serde(default)]
        signature: String,
    },
    Field {
        receiver: Box<Expr>,
        name: String,
    },
    New {
        class: String,
        #[serde(default)]
        provider: Option<String>,
    },
}

/// Name of the intrinsic corralled bodies call
pub const STUB_CALL: &str = "__stub__";

/// One top-level snippet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Import {
        path: Vec<String>,
        wildcard: bool,
        #[serde(skip)]
        span: Span,
    },
    Class(ClassDecl),
    Method(MethodDecl),
    Var(VarDecl),
    Stmt(Stmt),
}

impl Item {
    /// Qualified import path, with `.*` for wildcards
    pub fn import_path(&self) -> Option<String> {
        match self {
            Item::Import { path, wildcard, .. } => {
                let mut joined = path.join(".");
                if *wildcard {
                    joined.push_str(".*");
                }
                Some(joined)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(
        name: &str,
        args: Vec<TypeRef>,
    ) -> TypeRef {
        TypeRef {
            name: name.to_string(),
            args,
            provider: None,
            span: Span::default(),
        }
    }

    #[test]
    fn test_written_and_erased_types() {
        let list = ty("Map", vec![ty("String", vec![]), ty("List", vec![ty("int", vec![])])]);
        assert_eq!(list.written(), "Map<String, List<int>>");
        assert_eq!(list.erased(), "Map");
        assert_eq!(list.names(), vec!["Map", "String", "List", "int"]);
    }

    #[test]
    fn test_spans_are_not_serialized() {
        let mut a = ty("int", vec![]);
        let mut b = a.clone();
        a.span = Span::new(1, 4);
        b.span = Span::new(10, 13);
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }
}
