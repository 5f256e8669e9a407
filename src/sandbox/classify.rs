//! Source classifier
//!
//! Turns raw input into [`SnippetDraft`]s: sub-kind, key name, parameter text,
//! guts, the corralled form of classes, and the names the snippet refers to.

use indexmap::IndexSet;

use crate::engine::{SnippetDraft, SubKind};
use crate::sandbox::syntax::ast::*;
use crate::sandbox::syntax::{parse_item, split_snippets};
use crate::util::diagnostic::{codes, Diagnostic};
use crate::util::span::Span;

/// Body of every stubbed method
pub const STUB_BODY: &str = "{ __stub__(); }";

/// Split `input` and classify every snippet in it
pub fn classify(input: &str) -> Vec<SnippetDraft> {
    split_snippets(input).into_iter().map(classify_snippet).collect()
}

/// Classify one snippet source
pub fn classify_snippet(source: &str) -> SnippetDraft {
    let source = source.trim();
    let mut draft = SnippetDraft {
        source: source.to_string(),
        sub_kind: SubKind::Unknown,
        name: None,
        unit_name: None,
        parameter_types: None,
        guts: source.to_string(),
        corralled: None,
        declare_references: Vec::new(),
        body_references: Vec::new(),
        diagnostics: Vec::new(),
    };

    let item = match parse_item(source) {
        Ok(item) => item,
        Err(err) => {
            draft.diagnostics.push(Diagnostic::error(codes::SYNTAX, err.to_string(), Some(err.span())));
            return draft;
        }
    };

    let mut declared = References::default();
    let mut body = References::default();
    match &item {
        Item::Import { path, wildcard, .. } => {
            draft.sub_kind = if *wildcard {
                SubKind::WildcardImport
            } else {
                SubKind::SingleImport
            };
            draft.name = item.import_path();
            draft.unit_name = if *wildcard {
                Some("*".to_string())
            } else {
                path.last().cloned()
            };
        }
        Item::Class(class) => {
            draft.sub_kind = SubKind::Class;
            draft.name = Some(class.name.clone());
            draft.corralled = Some(corral_class(source, class));
            ignored_modifiers(&class.modifiers, &mut draft.diagnostics);
            for field in &class.fields {
                declared.type_ref(&field.ty);
                if let Some(init) = &field.init {
                    body.expr(init);
                }
            }
            for method in &class.methods {
                declared.signature(method);
                body.block(&method.body);
            }
        }
        Item::Method(method) => {
            draft.sub_kind = SubKind::Method;
            draft.name = Some(method.name.clone());
            draft.parameter_types = Some(method.parameter_text());
            ignored_modifiers(&method.modifiers, &mut draft.diagnostics);
            declared.signature(method);
            body.block(&method.body);
        }
        Item::Var(var) => {
            draft.sub_kind = if var.init.is_some() {
                SubKind::VarDeclarationWithInitializer
            } else {
                SubKind::VarDeclaration
            };
            draft.name = Some(var.name.clone());
            ignored_modifiers(&var.modifiers, &mut draft.diagnostics);
            declared.type_ref(&var.ty);
            if let Some(init) = &var.init {
                body.expr(init);
            }
        }
        Item::Stmt(stmt) => {
            draft.sub_kind = match stmt {
                Stmt::Expr(Expr {
                    kind: ExprKind::Assign { .. },
                    ..
                }) => SubKind::Assignment,
                Stmt::Expr(_) => SubKind::Expression,
                _ => SubKind::Statement,
            };
            body.stmt(stmt);
        }
    }

    draft.declare_references = declared.into_vec();
    draft.body_references = body.into_vec();
    draft
}

/// Top-level access and static modifiers mean nothing in a shell
fn ignored_modifiers(
    modifiers: &[ModifierUse],
    diagnostics: &mut Vec<Diagnostic>,
) {
    for m in modifiers {
        if matches!(
            m.modifier,
            Modifier::Public | Modifier::Private | Modifier::Protected | Modifier::Static
        ) {
            diagnostics.push(Diagnostic::warning(
                codes::IGNORED_MODIFIER,
                format!("modifier '{}' not permitted in top-level declarations, ignored", m.modifier.as_str()),
                Some(m.span),
            ));
        }
    }
}

/// Class text with every method body stubbed and field initializers removed
fn corral_class(
    source: &str,
    class: &ClassDecl,
) -> String {
    let mut edits: Vec<(Span, &str)> = Vec::new();
    for field in &class.fields {
        if let Some(init) = &field.init {
            edits.push((Span::new(field.name_span.end, init.span.end), ""));
        }
    }
    for method in &class.methods {
        edits.push((method.body.span, STUB_BODY));
    }
    edits.sort_by_key(|(span, _)| span.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for (span, replacement) in edits {
        out.push_str(&source[cursor..span.start]);
        out.push_str(replacement);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}

/// Ordered set of referenced names
#[derive(Default)]
struct References(IndexSet<String>);

impl References {
    fn into_vec(self) -> Vec<String> {
        self.0.into_iter().collect()
    }

    fn add(
        &mut self,
        name: &str,
    ) {
        self.0.insert(name.to_string());
    }

    fn type_ref(
        &mut self,
        ty: &TypeRef,
    ) {
        for name in ty.names() {
            self.add(name);
        }
    }

    fn signature(
        &mut self,
        method: &MethodDecl,
    ) {
        self.type_ref(&method.ret);
        for param in &method.params {
            self.type_ref(&param.ty);
        }
    }

    fn block(
        &mut self,
        block: &Block,
    ) {
        for stmt in &block.stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(
        &mut self,
        stmt: &Stmt,
    ) {
        match stmt {
            Stmt::Local(var) => {
                self.type_ref(&var.ty);
                if let Some(init) = &var.init {
                    self.expr(init);
                }
            }
            Stmt::Expr(expr) | Stmt::Throw(expr) => self.expr(expr),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.expr(cond);
                self.stmt(then_branch);
                if let Some(other) = else_branch {
                    self.stmt(other);
                }
            }
            Stmt::While { cond, body } => {
                self.expr(cond);
                self.stmt(body);
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }
            Stmt::Block(block) => self.block(block),
        }
    }

    fn expr(
        &mut self,
        expr: &Expr,
    ) {
        match &expr.kind {
            ExprKind::Name { name, .. } => self.add(name),
            ExprKind::Unary { expr, .. } => self.expr(expr),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::Assign { target, value } => {
                self.expr(target);
                self.expr(value);
            }
            ExprKind::Call { callee, args, .. } => {
                self.add(callee);
                args.iter().for_each(|a| self.expr(a));
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.expr(receiver);
                args.iter().for_each(|a| self.expr(a));
            }
            ExprKind::Field { receiver, .. } => self.expr(receiver),
            ExprKind::New { class, .. } => self.add(class),
            ExprKind::Int(_) | ExprKind::Double(_) | ExprKind::Bool(_) | ExprKind::Str(_) | ExprKind::Null => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declarations() {
        let draft = classify_snippet("int timesx(int v) { return v * x; }");
        assert_eq!(draft.sub_kind, SubKind::Method);
        assert_eq!(draft.name.as_deref(), Some("timesx"));
        assert_eq!(draft.parameter_types.as_deref(), Some("int"));
        assert_eq!(draft.declare_references, vec!["int"]);
        assert_eq!(draft.body_references, vec!["v", "x"]);
        assert!(draft.corralled.is_none());

        assert_eq!(classify_snippet("int x;").sub_kind, SubKind::VarDeclaration);
        assert_eq!(classify_snippet("int x = y;").sub_kind, SubKind::VarDeclarationWithInitializer);
    }

    #[test]
    fn test_statements_and_expressions() {
        assert_eq!(classify_snippet("x = 3;").sub_kind, SubKind::Assignment);
        assert_eq!(classify_snippet("x + 1").sub_kind, SubKind::Expression);
        assert_eq!(classify_snippet("while (false) { }").sub_kind, SubKind::Statement);
        let draft = classify_snippet("if (ok) { go(); }");
        assert_eq!(draft.body_references, vec!["ok", "go"]);
        assert!(draft.name.is_none());
    }

    #[test]
    fn test_imports() {
        let draft = classify_snippet("import lib.math.*;");
        assert_eq!(draft.sub_kind, SubKind::WildcardImport);
        assert_eq!(draft.name.as_deref(), Some("lib.math.*"));
        assert_eq!(draft.unit_name.as_deref(), Some("*"));

        let draft = classify_snippet("import lib.text.upper;");
        assert_eq!(draft.sub_kind, SubKind::SingleImport);
        assert_eq!(draft.unit_name.as_deref(), Some("upper"));
    }

    #[test]
    fn test_class_corralled_form() {
        let draft = classify_snippet("class A { B b; int n = f(); int get() { return g(b); } }");
        assert_eq!(draft.sub_kind, SubKind::Class);
        assert_eq!(
            draft.corralled.as_deref(),
            Some("class A { B b; int n; int get() { __stub__(); } }")
        );
        assert_eq!(draft.declare_references, vec!["B", "int"]);
        assert_eq!(draft.body_references, vec!["f", "g", "b"]);
    }

    #[test]
    fn test_syntax_errors_and_warnings() {
        let draft = classify_snippet("int f( {");
        assert_eq!(draft.sub_kind, SubKind::Unknown);
        assert_eq!(draft.diagnostics[0].code, codes::SYNTAX);

        let draft = classify_snippet("public static int one() { return 1; }");
        assert_eq!(draft.sub_kind, SubKind::Method);
        assert_eq!(draft.diagnostics.len(), 2);
        assert!(draft.diagnostics.iter().all(|d| !d.is_error()));
    }

    #[test]
    fn test_classify_splits_input() {
        let drafts = classify("int x = 6; int timesx(int v) { return v * x; } timesx(7)");
        let kinds: Vec<SubKind> = drafts.iter().map(|d| d.sub_kind).collect();
        assert_eq!(
            kinds,
            vec![SubKind::VarDeclarationWithInitializer, SubKind::Method, SubKind::Expression]
        );
    }
}
