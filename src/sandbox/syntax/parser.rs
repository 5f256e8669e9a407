//! Recursive-descent parser with precedence climbing for binary operators

use super::ast::*;
use super::lexer::{tokenize, LexError, Token, TokenKind};
use crate::util::span::Span;

/// Parse error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },
    #[error("{message}")]
    Invalid { message: String, span: Span },
}

impl ParseError {
    /// Location of the error
    pub fn span(&self) -> Span {
        match self {
            ParseError::Lex(err) => err.span(),
            ParseError::Expected { span, .. } | ParseError::Invalid { span, .. } => *span,
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// Binding power levels
const BP_OR: u8 = 10;
const BP_AND: u8 = 20;
const BP_EQ: u8 = 30;
const BP_CMP: u8 = 40;
const BP_ADD: u8 = 50;
const BP_MUL: u8 = 60;

/// Parse exactly one top-level item
pub fn parse_item(source: &str) -> ParseResult<Item> {
    let mut parser = Parser::new(tokenize(source)?);
    let item = parser.item()?;
    parser.expect_eof()?;
    Ok(item)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn at(
        &self,
        kind: &TokenKind,
    ) -> bool {
        self.kind() == kind
    }

    fn bump(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn skip(
        &mut self,
        kind: &TokenKind,
    ) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expected<T>(
        &self,
        expected: &str,
    ) -> ParseResult<T> {
        Err(ParseError::Expected {
            expected: expected.to_string(),
            found: self.kind().describe(),
            span: self.current().span,
        })
    }

    fn expect(
        &mut self,
        kind: TokenKind,
    ) -> ParseResult<Span> {
        if self.at(&kind) {
            Ok(self.bump().span)
        } else {
            self.expected(&kind.describe())
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        match self.kind().clone() {
            TokenKind::Identifier(name) => Ok((name, self.bump().span)),
            _ => self.expected("identifier"),
        }
    }

    fn expect_eof(&mut self) -> ParseResult<()> {
        if self.at(&TokenKind::Eof) {
            Ok(())
        } else {
            self.expected("end of snippet")
        }
    }

    fn previous_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.span.end)
            .unwrap_or(0)
    }

    fn span_from(
        &self,
        start: usize,
    ) -> Span {
        Span::new(start, self.previous_end().max(start))
    }

    // ---- items ----

    fn item(&mut self) -> ParseResult<Item> {
        let start = self.current().span.start;
        if self.skip(&TokenKind::KwImport) {
            return self.import(start);
        }

        let modifiers = self.modifiers();
        if self.at(&TokenKind::KwClass) {
            return Ok(Item::Class(self.class(start, modifiers)?));
        }
        if self.looks_like_declaration() {
            let ty = self.type_ref()?;
            let (name, name_span) = self.expect_identifier()?;
            if self.at(&TokenKind::LParen) {
                return Ok(Item::Method(self.method(start, modifiers, ty, name, name_span)?));
            }
            return Ok(Item::Var(self.var_rest(start, modifiers, ty, name, name_span)?));
        }
        if let Some(first) = modifiers.first() {
            return Err(ParseError::Invalid {
                message: format!("expected a declaration after '{}'", first.modifier.as_str()),
                span: first.span,
            });
        }
        Ok(Item::Stmt(self.statement(true)?))
    }

    fn import(
        &mut self,
        start: usize,
    ) -> ParseResult<Item> {
        let mut path = vec![self.expect_identifier()?.0];
        let mut wildcard = false;
        while self.skip(&TokenKind::Dot) {
            if self.skip(&TokenKind::Star) {
                wildcard = true;
                break;
            }
            path.push(self.expect_identifier()?.0);
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(Item::Import {
            path,
            wildcard,
            span: self.span_from(start),
        })
    }

    fn modifiers(&mut self) -> Vec<ModifierUse> {
        let mut modifiers = Vec::new();
        loop {
            let modifier = match self.kind() {
                TokenKind::KwPublic => Modifier::Public,
                TokenKind::KwPrivate => Modifier::Private,
                TokenKind::KwProtected => Modifier::Protected,
                TokenKind::KwStatic => Modifier::Static,
                TokenKind::KwFinal => Modifier::Final,
                TokenKind::KwAbstract => Modifier::Abstract,
                _ => return modifiers,
            };
            let span = self.bump().span;
            modifiers.push(ModifierUse { modifier, span });
        }
    }

    fn class(
        &mut self,
        start: usize,
        modifiers: Vec<ModifierUse>,
    ) -> ParseResult<ClassDecl> {
        self.expect(TokenKind::KwClass)?;
        let (name, name_span) = self.expect_identifier()?;
        self.expect(TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return self.expected("'}'");
            }
            let member_start = self.current().span.start;
            let member_modifiers = self.modifiers();
            let ty = self.type_ref()?;
            let (member, member_span) = self.expect_identifier()?;
            if self.at(&TokenKind::LParen) {
                methods.push(self.method(member_start, member_modifiers, ty, member, member_span)?);
            } else {
                fields.push(self.var_rest(member_start, member_modifiers, ty, member, member_span)?);
            }
        }
        self.expect(TokenKind::RBrace)?;

        Ok(ClassDecl {
            modifiers,
            name,
            fields,
            methods,
            name_span,
            span: self.span_from(start),
        })
    }

    fn method(
        &mut self,
        start: usize,
        modifiers: Vec<ModifierUse>,
        ret: TypeRef,
        name: String,
        name_span: Span,
    ) -> ParseResult<MethodDecl> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                let ty = self.type_ref()?;
                let (name, _) = self.expect_identifier()?;
                params.push(Param { ty, name });
                if !self.skip(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        let body = self.block()?;
        Ok(MethodDecl {
            modifiers,
            ret,
            name,
            params,
            body,
            name_span,
            span: self.span_from(start),
        })
    }

    fn var_rest(
        &mut self,
        start: usize,
        modifiers: Vec<ModifierUse>,
        ty: TypeRef,
        name: String,
        name_span: Span,
    ) -> ParseResult<VarDecl> {
        let init = if self.skip(&TokenKind::Assign) {
            Some(self.expression()?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(VarDecl {
            modifiers,
            ty,
            name,
            init,
            name_span,
            span: self.span_from(start),
        })
    }

    /// Speculatively parse `Type name` without consuming anything
    fn looks_like_declaration(&mut self) -> bool {
        let saved = self.pos;
        let matches = self.type_ref().is_ok() && matches!(self.kind(), TokenKind::Identifier(_));
        self.pos = saved;
        matches
    }

    fn type_ref(&mut self) -> ParseResult<TypeRef> {
        let start = self.current().span.start;
        let (name, _) = self.expect_identifier()?;
        let mut args = Vec::new();
        if self.skip(&TokenKind::Lt) {
            loop {
                args.push(self.type_ref()?);
                if !self.skip(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Gt)?;
        }
        Ok(TypeRef {
            name,
            args,
            provider: None,
            span: self.span_from(start),
        })
    }

    // ---- statements ----

    fn block(&mut self) -> ParseResult<Block> {
        let start = self.expect(TokenKind::LBrace)?.start;
        let mut stmts = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            if self.at(&TokenKind::Eof) {
                return self.expected("'}'");
            }
            stmts.push(self.statement(false)?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Block {
            stmts,
            span: self.span_from(start),
        })
    }

    /// A top-level expression statement may omit its semicolon
    fn statement(
        &mut self,
        top_level: bool,
    ) -> ParseResult<Stmt> {
        let start = self.current().span.start;
        match self.kind().clone() {
            TokenKind::LBrace => Ok(Stmt::Block(self.block()?)),
            TokenKind::KwIf => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let then_branch = Box::new(self.statement(false)?);
                let else_branch = if self.skip(&TokenKind::KwElse) {
                    Some(Box::new(self.statement(false)?))
                } else {
                    None
                };
                Ok(Stmt::If {
                    cond,
                    then_branch,
                    else_branch,
                })
            }
            TokenKind::KwWhile => {
                self.bump();
                self.expect(TokenKind::LParen)?;
                let cond = self.expression()?;
                self.expect(TokenKind::RParen)?;
                let body = Box::new(self.statement(false)?);
                Ok(Stmt::While { cond, body })
            }
            TokenKind::KwReturn => {
                self.bump();
                let value = if self.at(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            TokenKind::KwThrow => {
                self.bump();
                let value = self.expression()?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Stmt::Throw(value))
            }
            _ if !top_level && self.looks_like_declaration() => {
                let ty = self.type_ref()?;
                let (name, name_span) = self.expect_identifier()?;
                Ok(Stmt::Local(self.var_rest(start, Vec::new(), ty, name, name_span)?))
            }
            _ => {
                let expr = self.expression()?;
                if !(top_level && self.at(&TokenKind::Eof)) {
                    self.expect(TokenKind::Semicolon)?;
                }
                Ok(Stmt::Expr(expr))
            }
        }
    }

    // ---- expressions ----

    fn expression(&mut self) -> ParseResult<Expr> {
        let target = self.binary(0)?;
        if !self.at(&TokenKind::Assign) {
            return Ok(target);
        }
        let assign_span = self.bump().span;
        if !matches!(target.kind, ExprKind::Name { .. } | ExprKind::Field { .. }) {
            return Err(ParseError::Invalid {
                message: "invalid assignment target".to_string(),
                span: target.span.to(assign_span),
            });
        }
        let value = self.expression()?;
        let span = target.span.to(value.span);
        Ok(Expr {
            kind: ExprKind::Assign {
                target: Box::new(target),
                value: Box::new(value),
            },
            span,
        })
    }

    fn binary_op(&self) -> Option<(BinOp, u8)> {
        let op = match self.kind() {
            TokenKind::Or => (BinOp::Or, BP_OR),
            TokenKind::And => (BinOp::And, BP_AND),
            TokenKind::EqEq => (BinOp::Eq, BP_EQ),
            TokenKind::Neq => (BinOp::Ne, BP_EQ),
            TokenKind::Lt => (BinOp::Lt, BP_CMP),
            TokenKind::Le => (BinOp::Le, BP_CMP),
            TokenKind::Gt => (BinOp::Gt, BP_CMP),
            TokenKind::Ge => (BinOp::Ge, BP_CMP),
            TokenKind::Plus => (BinOp::Add, BP_ADD),
            TokenKind::Minus => (BinOp::Sub, BP_ADD),
            TokenKind::Star => (BinOp::Mul, BP_MUL),
            TokenKind::Slash => (BinOp::Div, BP_MUL),
            TokenKind::Percent => (BinOp::Rem, BP_MUL),
            _ => return None,
        };
        Some(op)
    }

    fn binary(
        &mut self,
        min_bp: u8,
    ) -> ParseResult<Expr> {
        let mut lhs = self.unary()?;
        while let Some((op, bp)) = self.binary_op() {
            if bp <= min_bp {
                break;
            }
            self.bump();
            let rhs = self.binary(bp)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.kind() {
            TokenKind::Minus => UnOp::Neg,
            TokenKind::Not => UnOp::Not,
            _ => return self.postfix(),
        };
        let start = self.bump().span;
        let expr = self.unary()?;
        let span = start.to(expr.span);
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                expr: Box::new(expr),
            },
            span,
        })
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.skip(&TokenKind::Dot) {
            let (name, name_span) = self.expect_identifier()?;
            if self.at(&TokenKind::LParen) {
                let args = self.arguments()?;
                let span = expr.span.to(Span::new(name_span.start, self.previous_end()));
                expr = Expr {
                    kind: ExprKind::MethodCall {
                        receiver: Box::new(expr),
                        method: name,
                        args,
                        signature: String::new(),
                    },
                    span,
                };
            } else {
                let span = expr.span.to(name_span);
                expr = Expr {
                    kind: ExprKind::Field {
                        receiver: Box::new(expr),
                        name,
                    },
                    span,
                };
            }
        }
        Ok(expr)
    }

    fn arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.at(&TokenKind::RParen) {
            loop {
                args.push(self.expression()?);
                if !self.skip(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let start = self.current().span.start;
        let kind = match self.kind().clone() {
            TokenKind::IntLiteral(v) => {
                self.bump();
                ExprKind::Int(v)
            }
            TokenKind::DoubleLiteral(v) => {
                self.bump();
                ExprKind::Double(v)
            }
            TokenKind::StringLiteral(v) => {
                self.bump();
                ExprKind::Str(v)
            }
            TokenKind::KwTrue => {
                self.bump();
                ExprKind::Bool(true)
            }
            TokenKind::KwFalse => {
                self.bump();
                ExprKind::Bool(false)
            }
            TokenKind::KwNull => {
                self.bump();
                ExprKind::Null
            }
            TokenKind::Identifier(name) => {
                self.bump();
                if self.at(&TokenKind::LParen) {
                    ExprKind::Call {
                        callee: name,
                        args: self.arguments()?,
                        target: CallTarget::Unbound,
                    }
                } else {
                    ExprKind::Name {
                        name,
                        binding: Binding::Unbound,
                    }
                }
            }
            TokenKind::KwNew => {
                self.bump();
                let (class, _) = self.expect_identifier()?;
                self.expect(TokenKind::LParen)?;
                self.expect(TokenKind::RParen)?;
                ExprKind::New { class, provider: None }
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expression()?;
                self.expect(TokenKind::RParen)?;
                return Ok(Expr {
                    kind: inner.kind,
                    span: self.span_from(start),
                });
            }
            _ => return self.expected("expression"),
        };
        Ok(Expr {
            kind,
            span: self.span_from(start),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_imports() {
        let item = parse_item("import lib.math.*;").unwrap();
        assert_eq!(item.import_path().as_deref(), Some("lib.math.*"));
        let item = parse_item("import lib.text.upper;").unwrap();
        assert_eq!(item.import_path().as_deref(), Some("lib.text.upper"));
    }

    #[test]
    fn test_method_declaration() {
        let Item::Method(method) = parse_item("int timesx(int v) { return v * x; }").unwrap() else {
            panic!("expected method");
        };
        assert_eq!(method.name, "timesx");
        assert_eq!(method.parameter_text(), "int");
        assert_eq!(method.body.stmts.len(), 1);
        assert_eq!(method.name_span, Span::new(4, 10));
    }

    #[test]
    fn test_generic_parameters() {
        let Item::Method(method) = parse_item("int size(List<String> xs, Map<String, int> m) { return 0; }").unwrap() else {
            panic!("expected method");
        };
        assert_eq!(method.parameter_text(), "List<String>, Map<String, int>");
        assert_eq!(method.erased_signature(), "(List,Map)");
    }

    #[test]
    fn test_class_with_members() {
        let Item::Class(class) = parse_item("public class A { B b; int n = 1; int get() { return n; } }").unwrap() else {
            panic!("expected class");
        };
        assert_eq!(class.modifiers[0].modifier, Modifier::Public);
        assert_eq!(class.fields.len(), 2);
        assert_eq!(class.methods[0].name, "get");
    }

    #[test]
    fn test_variables_and_expressions() {
        assert!(matches!(parse_item("int x;").unwrap(), Item::Var(VarDecl { init: None, .. })));
        assert!(matches!(parse_item("String s = \"a\" + 1;").unwrap(), Item::Var(VarDecl { init: Some(_), .. })));
        assert!(matches!(
            parse_item("x = 3;").unwrap(),
            Item::Stmt(Stmt::Expr(Expr {
                kind: ExprKind::Assign { .. },
                ..
            }))
        ));
        assert!(matches!(parse_item("x < y").unwrap(), Item::Stmt(Stmt::Expr(_))));
    }

    #[test]
    fn test_precedence() {
        let Item::Stmt(Stmt::Expr(expr)) = parse_item("1 + 2 * 3 == 7 && !done").unwrap() else {
            panic!("expected expression");
        };
        let ExprKind::Binary { op: BinOp::And, lhs, .. } = expr.kind else {
            panic!("expected &&");
        };
        assert!(matches!(lhs.kind, ExprKind::Binary { op: BinOp::Eq, .. }));
    }

    #[test]
    fn test_statements() {
        let item = parse_item("while (i < 3) { int j = i; i = i + 1; }").unwrap();
        assert!(matches!(item, Item::Stmt(Stmt::While { .. })));
        let item = parse_item("if (a) x = 1; else { throw \"no\"; }").unwrap();
        assert!(matches!(item, Item::Stmt(Stmt::If { else_branch: Some(_), .. })));
    }

    #[test]
    fn test_local_declarations_in_bodies() {
        let Item::Method(method) = parse_item("int sq(int n) { List<int> xs; int m = n * n; m = m; return m; }").unwrap() else {
            panic!("expected method");
        };
        assert!(matches!(method.body.stmts[0], Stmt::Local(VarDecl { init: None, .. })));
        assert!(matches!(method.body.stmts[1], Stmt::Local(VarDecl { init: Some(_), .. })));
        assert!(matches!(method.body.stmts[2], Stmt::Expr(_)));
        assert!(matches!(method.body.stmts[3], Stmt::Return { .. }));
    }

    #[test]
    fn test_instance_calls() {
        let Item::Stmt(Stmt::Expr(expr)) = parse_item("new A().b.get(1, 2)").unwrap() else {
            panic!("expected expression");
        };
        let ExprKind::MethodCall { receiver, args, .. } = expr.kind else {
            panic!("expected method call");
        };
        assert_eq!(args.len(), 2);
        assert!(matches!(receiver.kind, ExprKind::Field { .. }));
    }

    #[test]
    fn test_errors_carry_spans() {
        let err = parse_item("int f( { }").unwrap_err();
        assert!(matches!(err, ParseError::Expected { .. }));
        assert_eq!(err.span(), Span::new(7, 8));

        let err = parse_item("static x = 1;").unwrap_err();
        assert!(err.to_string().contains("after 'static'"));

        let err = parse_item("1 = 2;").unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));

        assert!(parse_item("int x = 1; int y = 2;").is_err());
    }
}
