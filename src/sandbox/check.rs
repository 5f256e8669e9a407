//! Type checker
//!
//! Checks the `//@unit` section of a wrapped unit against the declarations in
//! its `//@extern` sections and fills in the resolution slots of the tree
//! (bindings, call targets, type providers). Names that cannot be found are
//! reported with [`Diagnostic::unresolved`] so the engine can tell them apart
//! from every other error.

use std::collections::HashMap;

use crate::sandbox::library::{Library, NativeFunction};
use crate::sandbox::syntax::ast::*;
use crate::sandbox::syntax::parse_item;
use crate::sandbox::types::{Ty, GENERICS};
use crate::sandbox::wrap::{parse_sections, MalformedUnit, Section};
use crate::util::diagnostic::{codes, Diagnostic};
use crate::util::span::Span;

/// Written type name that asks for inference
const INFERRED: &str = "var";

/// Top-level variable
///
/// `declared` is the type the variable stores; `inferred` is the type reads
/// are checked against. They differ only for `var` declarations whose
/// initializer type is not denotable.
#[derive(Debug, Clone)]
pub struct VarSymbol {
    pub provider: String,
    pub declared: Ty,
    pub inferred: Ty,
    pub is_final: bool,
}

/// Top-level method
#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub provider: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
}

/// User class
#[derive(Debug, Clone)]
pub struct ClassSymbol {
    pub provider: String,
    pub decl: ClassDecl,
}

/// Declarations visible to one unit
#[derive(Debug, Default)]
pub struct Environment {
    classes: HashMap<String, ClassSymbol>,
    methods: HashMap<String, Vec<MethodSymbol>>,
    vars: HashMap<String, VarSymbol>,
    natives: HashMap<&'static str, &'static NativeFunction>,
}

impl Environment {
    /// Environment holding every parsable extern declaration
    pub fn from_sections(externs: &[Section<'_>]) -> Self {
        let items: Vec<(&str, Item)> = externs
            .iter()
            .filter_map(|s| parse_item(s.text).ok().map(|item| (s.class_name, item)))
            .collect();

        let mut env = Self::default();
        for (_, item) in &items {
            if let Item::Import { path, wildcard, .. } = item {
                env.import(path, *wildcard);
            }
        }
        for (provider, item) in &items {
            if let Item::Class(class) = item {
                env.add_class(provider, class);
            }
        }
        for (provider, item) in &items {
            match item {
                Item::Method(method) => env.add_method(provider, method),
                Item::Var(var) => env.add_var(provider, var),
                _ => {}
            }
        }
        env
    }

    /// Make the unit's own declaration visible to itself
    pub fn declare_own(
        &mut self,
        provider: &str,
        item: &Item,
    ) {
        match item {
            Item::Class(class) => self.add_class(provider, class),
            Item::Method(method) => self.add_method(provider, method),
            _ => {}
        }
    }

    /// Bring library functions into scope; false if the path names nothing
    fn import(
        &mut self,
        path: &[String],
        wildcard: bool,
    ) -> bool {
        let library = Library::get();
        let joined = path.join(".");
        if wildcard {
            let functions = library.package(&joined);
            for function in &functions {
                self.natives.insert(function.simple_name(), function);
            }
            !functions.is_empty()
        } else if let Some(function) = library.function(&joined) {
            self.natives.insert(function.simple_name(), function);
            true
        } else {
            false
        }
    }

    fn add_class(
        &mut self,
        provider: &str,
        class: &ClassDecl,
    ) {
        self.classes.insert(
            class.name.clone(),
            ClassSymbol {
                provider: provider.to_string(),
                decl: class.clone(),
            },
        );
    }

    fn add_method(
        &mut self,
        provider: &str,
        method: &MethodDecl,
    ) {
        let symbol = MethodSymbol {
            provider: provider.to_string(),
            params: method.params.iter().map(|p| self.type_of(&p.ty)).collect(),
            ret: self.type_of(&method.ret),
        };
        self.methods.entry(method.name.clone()).or_default().push(symbol);
    }

    fn add_var(
        &mut self,
        provider: &str,
        var: &VarDecl,
    ) {
        let (declared, inferred) = if is_inferred(&var.ty) {
            let ty = var
                .init
                .clone()
                .map(|mut init| Checker::new(self).expr(&mut init))
                .unwrap_or(Ty::Error);
            (ty.denotable(), ty)
        } else {
            let ty = self.type_of(&var.ty);
            (ty.clone(), ty)
        };
        self.vars.insert(
            var.name.clone(),
            VarSymbol {
                provider: provider.to_string(),
                declared,
                inferred,
                is_final: var.modifiers.iter().any(|m| m.modifier == Modifier::Final),
            },
        );
    }

    /// Resolve a written type without reporting; unknown names become errors
    pub fn type_of(
        &self,
        ty: &TypeRef,
    ) -> Ty {
        if let Some(builtin) = Ty::builtin(&ty.name) {
            return builtin;
        }
        if GENERICS.iter().any(|(name, _)| *name == ty.name) {
            return Ty::Generic {
                name: ty.name.clone(),
                args: ty.args.iter().map(|a| self.type_of(a)).collect(),
            };
        }
        match self.classes.get(&ty.name) {
            Some(class) => Ty::Class {
                name: ty.name.clone(),
                provider: class.provider.clone(),
            },
            None => Ty::Error,
        }
    }

    pub fn var(
        &self,
        name: &str,
    ) -> Option<&VarSymbol> {
        self.vars.get(name)
    }

    pub fn class(
        &self,
        name: &str,
    ) -> Option<&ClassSymbol> {
        self.classes.get(name)
    }
}

fn is_inferred(ty: &TypeRef) -> bool {
    ty.name == INFERRED && ty.args.is_empty()
}

/// Result of checking one unit
#[derive(Debug, Clone)]
pub struct Checked {
    /// Annotated tree; `None` if the unit section did not parse
    pub item: Option<Item>,
    /// Diagnostics in unit coordinates
    pub diagnostics: Vec<Diagnostic>,
    /// Erased parameter signature of a method whose signature resolved
    pub erased_signature: Option<String>,
}

impl Checked {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

/// Check the unit section of a wrapped unit
pub fn check_unit(source: &str) -> Result<Checked, MalformedUnit> {
    let sections = parse_sections(source)?;
    let offset = sections.unit.offset;
    let mut item = match parse_item(sections.unit.text) {
        Ok(item) => item,
        Err(err) => {
            return Ok(Checked {
                item: None,
                diagnostics: vec![Diagnostic::error(
                    codes::SYNTAX,
                    err.to_string(),
                    Some(err.span().shifted(offset)),
                )],
                erased_signature: None,
            })
        }
    };

    let mut env = Environment::from_sections(&sections.externs);
    env.declare_own(sections.unit.class_name, &item);
    let mut checker = Checker::new(&env);
    let erased_signature = checker.item(&mut item);
    let diagnostics = checker
        .diagnostics
        .into_iter()
        .map(|d| {
            let span = d.span.map(|s| s.shifted(offset));
            d.with_span(span)
        })
        .collect();

    Ok(Checked {
        item: Some(item),
        diagnostics,
        erased_signature,
    })
}

/// Callable candidate during overload selection
struct Candidate {
    params: Vec<Ty>,
    ret: Ty,
    target: CallTarget,
}

/// What an assignable name refers to
struct Slot {
    binding: Binding,
    read: Ty,
    storage: Ty,
    is_final: bool,
}

struct Checker<'e> {
    env: &'e Environment,
    diagnostics: Vec<Diagnostic>,
    scopes: Vec<HashMap<String, Ty>>,
    class: Option<&'e ClassSymbol>,
    return_ty: Option<Ty>,
}

impl<'e> Checker<'e> {
    fn new(env: &'e Environment) -> Self {
        Self {
            env,
            diagnostics: Vec::new(),
            scopes: Vec::new(),
            class: None,
            return_ty: None,
        }
    }

    fn error(
        &mut self,
        code: &'static str,
        message: impl Into<String>,
        span: Span,
    ) {
        self.diagnostics.push(Diagnostic::error(code, message, Some(span)));
    }

    fn unresolved(
        &mut self,
        name: &str,
        what: &str,
        span: Span,
    ) {
        self.diagnostics.push(Diagnostic::unresolved(name, what, Some(span)));
    }

    fn mismatch(
        &mut self,
        found: &Ty,
        expected: &Ty,
        span: Span,
    ) {
        self.error(
            codes::TYPE_MISMATCH,
            format!("incompatible types: {} cannot be converted to {}", found, expected),
            span,
        );
    }

    fn scoped<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.scopes.push(HashMap::new());
        let result = f(self);
        self.scopes.pop();
        result
    }

    fn declare_local(
        &mut self,
        name: &str,
        ty: Ty,
        span: Span,
    ) {
        let duplicate = self.scopes.iter().any(|scope| scope.contains_key(name));
        if duplicate {
            self.error(
                codes::ILLEGAL,
                format!("variable {} is already defined", name),
                span,
            );
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), ty);
        }
    }

    // ---- declarations ----

    fn item(
        &mut self,
        item: &mut Item,
    ) -> Option<String> {
        match item {
            Item::Import { path, wildcard, span } => {
                let span = *span;
                let mut env = Environment::default();
                if !env.import(path, *wildcard) {
                    let joined = path.join(".");
                    let what = if *wildcard { "package" } else { "symbol" };
                    self.unresolved(&joined, what, span);
                }
                None
            }
            Item::Class(class) => {
                self.class_decl(class);
                None
            }
            Item::Method(method) => {
                if self.method(method) {
                    Some(method.erased_signature())
                } else {
                    None
                }
            }
            Item::Var(var) => {
                self.modifiers(&var.modifiers);
                self.declared_name(&var.name, var.name_span);
                self.var_decl(var, true);
                None
            }
            Item::Stmt(stmt) => {
                self.scoped(|c| c.stmt(stmt));
                None
            }
        }
    }

    fn modifiers(
        &mut self,
        modifiers: &[ModifierUse],
    ) {
        for m in modifiers {
            if m.modifier == Modifier::Abstract {
                self.error(codes::ILLEGAL, "abstract declarations are not supported", m.span);
            }
        }
    }

    fn declared_name(
        &mut self,
        name: &str,
        span: Span,
    ) {
        if name.starts_with("__") {
            self.error(
                codes::RESERVED,
                format!("'{}' is reserved for generated code", name),
                span,
            );
        }
    }

    /// Resolve and annotate a written type
    fn type_ref(
        &mut self,
        ty: &mut TypeRef,
        allow_void: bool,
    ) -> Ty {
        let span = ty.span;
        if let Some(builtin) = Ty::builtin(&ty.name) {
            if !ty.args.is_empty() {
                self.error(
                    codes::ILLEGAL,
                    format!("type {} does not take parameters", ty.name),
                    span,
                );
            }
            if builtin == Ty::Void && !allow_void {
                self.error(codes::ILLEGAL, "'void' type not allowed here", span);
                return Ty::Error;
            }
            return builtin;
        }

        if let Some(&(name, arity)) = GENERICS.iter().find(|(name, _)| *name == ty.name) {
            let args: Vec<Ty> = ty.args.iter_mut().map(|a| self.type_ref(a, false)).collect();
            if args.len() != arity {
                self.error(
                    codes::ILLEGAL,
                    format!("wrong number of type arguments for {}; required {}", name, arity),
                    span,
                );
            }
            return Ty::Generic {
                name: name.to_string(),
                args,
            };
        }

        match self.env.classes.get(&ty.name) {
            Some(class) => {
                if !ty.args.is_empty() {
                    self.error(
                        codes::ILLEGAL,
                        format!("type {} does not take parameters", ty.name),
                        span,
                    );
                }
                ty.provider = Some(class.provider.clone());
                Ty::Class {
                    name: ty.name.clone(),
                    provider: class.provider.clone(),
                }
            }
            None => {
                let name = ty.name.clone();
                self.unresolved(&name, "class", span);
                Ty::Error
            }
        }
    }

    /// Check a variable or field; returns the storage type
    fn var_decl(
        &mut self,
        var: &mut VarDecl,
        allow_inferred: bool,
    ) -> Ty {
        if allow_inferred && is_inferred(&var.ty) {
            return match &mut var.init {
                Some(init) => {
                    let ty = self.expr(init);
                    if ty == Ty::Void {
                        self.error(codes::TYPE_MISMATCH, "cannot infer type: initializer is void", init.span);
                        Ty::Error
                    } else {
                        ty.denotable()
                    }
                }
                None => {
                    self.error(
                        codes::ILLEGAL,
                        format!("cannot infer type for '{}' without an initializer", var.name),
                        var.span,
                    );
                    Ty::Error
                }
            };
        }

        let ty = self.type_ref(&mut var.ty, false);
        if let Some(init) = &mut var.init {
            let found = self.expr(init);
            if !found.assignable_to(&ty) {
                self.mismatch(&found, &ty, init.span);
            }
        }
        ty
    }

    /// Check a method; returns true if its signature resolved
    fn method(
        &mut self,
        method: &mut MethodDecl,
    ) -> bool {
        self.modifiers(&method.modifiers);
        self.declared_name(&method.name, method.name_span);
        let before = self.diagnostics.len();
        let ret = self.type_ref(&mut method.ret, true);

        self.scopes.push(HashMap::new());
        for param in &mut method.params {
            let ty = self.type_ref(&mut param.ty, false);
            let span = param.ty.span;
            self.declare_local(&param.name, ty, span);
        }
        let signature_resolved = !self.diagnostics[before..].iter().any(Diagnostic::is_error);

        let saved = self.return_ty.replace(ret.clone());
        for stmt in &mut method.body.stmts {
            self.stmt(stmt);
        }
        self.return_ty = saved;
        self.scopes.pop();

        if ret != Ty::Void && ret != Ty::Error && block_completes(&method.body) {
            let end = method.body.span.end;
            self.error(
                codes::ILLEGAL,
                "missing return statement",
                Span::new(end.saturating_sub(1), end),
            );
        }
        signature_resolved
    }

    fn class_decl(
        &mut self,
        class: &mut ClassDecl,
    ) {
        self.modifiers(&class.modifiers);
        self.declared_name(&class.name, class.name_span);
        let env = self.env;
        let saved = self.class;
        self.class = env.classes.get(&class.name);

        let mut seen_fields: Vec<String> = Vec::new();
        for field in &mut class.fields {
            self.modifiers(&field.modifiers);
            if seen_fields.contains(&field.name) {
                self.error(
                    codes::ILLEGAL,
                    format!("variable {} is already defined in class {}", field.name, class.name),
                    field.name_span,
                );
            }
            seen_fields.push(field.name.clone());
            if is_inferred(&field.ty) {
                self.error(codes::ILLEGAL, "'var' is not allowed here", field.ty.span);
                continue;
            }
            self.scoped(|c| c.var_decl(field, false));
        }

        let mut seen_methods: Vec<(String, String)> = Vec::new();
        for method in &mut class.methods {
            let key = (method.name.clone(), method.erased_signature());
            if seen_methods.contains(&key) {
                self.error(
                    codes::ILLEGAL,
                    format!("method {}{} is already defined in class {}", key.0, key.1, class.name),
                    method.name_span,
                );
            }
            seen_methods.push(key);
            self.method(method);
        }
        self.class = saved;
    }

    // ---- statements ----

    fn stmt(
        &mut self,
        stmt: &mut Stmt,
    ) {
        match stmt {
            Stmt::Local(var) => {
                let ty = self.var_decl(var, true);
                let span = var.name_span;
                self.declare_local(&var.name, ty, span);
            }
            Stmt::Expr(expr) => {
                self.expr(expr);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.condition(cond);
                self.scoped(|c| c.stmt(then_branch));
                if let Some(other) = else_branch {
                    self.scoped(|c| c.stmt(other));
                }
            }
            Stmt::While { cond, body } => {
                self.condition(cond);
                self.scoped(|c| c.stmt(body));
            }
            Stmt::Return { value, span } => {
                let span = *span;
                match (self.return_ty.clone(), value) {
                    (None, _) => self.error(codes::ILLEGAL, "return outside method", span),
                    (Some(Ty::Void), Some(value)) => {
                        let value_span = value.span;
                        self.expr(value);
                        self.error(codes::TYPE_MISMATCH, "cannot return a value from a void method", value_span);
                    }
                    (Some(Ty::Void), None) | (Some(Ty::Error), None) => {}
                    (Some(expected), None) => {
                        self.error(codes::TYPE_MISMATCH, format!("missing return value of type {}", expected), span);
                    }
                    (Some(expected), Some(value)) => {
                        let found = self.expr(value);
                        if !found.assignable_to(&expected) {
                            self.mismatch(&found, &expected, value.span);
                        }
                    }
                }
            }
            Stmt::Throw(expr) => {
                let ty = self.expr(expr);
                if ty == Ty::Void {
                    self.error(codes::TYPE_MISMATCH, "cannot throw a void value", expr.span);
                }
            }
            Stmt::Block(block) => self.scoped(|c| {
                for stmt in &mut block.stmts {
                    c.stmt(stmt);
                }
            }),
        }
    }

    fn condition(
        &mut self,
        cond: &mut Expr,
    ) {
        let ty = self.expr(cond);
        if !ty.assignable_to(&Ty::Boolean) {
            self.mismatch(&ty, &Ty::Boolean, cond.span);
        }
    }

    // ---- expressions ----

    fn lookup(
        &self,
        name: &str,
    ) -> Option<Slot> {
        if let Some(ty) = self.scopes.iter().rev().find_map(|scope| scope.get(name)) {
            return Some(Slot {
                binding: Binding::Local,
                read: ty.clone(),
                storage: ty.clone(),
                is_final: false,
            });
        }
        if let Some(field) = self.class.and_then(|class| class.decl.field(name)) {
            let ty = self.env.type_of(&field.ty);
            return Some(Slot {
                binding: Binding::Field,
                read: ty.clone(),
                storage: ty,
                is_final: false,
            });
        }
        self.env.vars.get(name).map(|var| Slot {
            binding: Binding::Global(var.provider.clone()),
            read: var.inferred.clone(),
            storage: var.declared.clone(),
            is_final: var.is_final,
        })
    }

    fn expr(
        &mut self,
        expr: &mut Expr,
    ) -> Ty {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Int(_) => Ty::Int,
            ExprKind::Double(_) => Ty::Double,
            ExprKind::Bool(_) => Ty::Boolean,
            ExprKind::Str(_) => Ty::Str,
            ExprKind::Null => Ty::Null,
            ExprKind::Name { name, binding } => match self.lookup(name) {
                Some(slot) => {
                    *binding = slot.binding;
                    slot.read
                }
                None => {
                    let name = name.clone();
                    self.unresolved(&name, "variable", span);
                    Ty::Error
                }
            },
            ExprKind::Unary { op, expr: inner } => {
                let op = *op;
                let ty = self.expr(inner);
                match op {
                    UnOp::Neg if ty.is_numeric() => ty,
                    UnOp::Not if ty.assignable_to(&Ty::Boolean) => Ty::Boolean,
                    _ => {
                        let symbol = if op == UnOp::Neg { "-" } else { "!" };
                        self.error(
                            codes::TYPE_MISMATCH,
                            format!("bad operand type {} for unary operator '{}'", ty, symbol),
                            span,
                        );
                        Ty::Error
                    }
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let l = self.expr(lhs);
                let r = self.expr(rhs);
                self.binary(op, &l, &r, span)
            }
            ExprKind::Assign { target, value } => self.assign(target, value, span),
            ExprKind::Call { callee, args, target } => {
                let arg_types: Vec<Ty> = args.iter_mut().map(|a| self.expr(a)).collect();
                if callee.as_str() == STUB_CALL {
                    *target = CallTarget::Stub;
                    return Ty::Void;
                }
                let callee = callee.clone();
                match self.call(&callee, &arg_types, span) {
                    Some(candidate) => {
                        *target = candidate.target;
                        candidate.ret
                    }
                    None => Ty::Error,
                }
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
                signature,
            } => {
                let receiver_ty = self.expr(receiver);
                let arg_types: Vec<Ty> = args.iter_mut().map(|a| self.expr(a)).collect();
                let method = method.clone();
                match self.instance_call(&receiver_ty, &method, &arg_types, span) {
                    Some(candidate) => {
                        if let CallTarget::Member(erased) = candidate.target {
                            *signature = erased;
                        }
                        candidate.ret
                    }
                    None => Ty::Error,
                }
            }
            ExprKind::Field { receiver, name } => {
                let receiver_ty = self.expr(receiver);
                let name = name.clone();
                self.field_of(&receiver_ty, &name, span)
            }
            ExprKind::New { class, provider } => match self.env.classes.get(class.as_str()) {
                Some(symbol) => {
                    *provider = Some(symbol.provider.clone());
                    Ty::Class {
                        name: class.clone(),
                        provider: symbol.provider.clone(),
                    }
                }
                None => {
                    let class = class.clone();
                    self.unresolved(&class, "class", span);
                    Ty::Error
                }
            },
        }
    }

    fn binary(
        &mut self,
        op: BinOp,
        l: &Ty,
        r: &Ty,
        span: Span,
    ) -> Ty {
        let ok = match op {
            BinOp::Add if (*l == Ty::Str || *r == Ty::Str) && *l != Ty::Void && *r != Ty::Void => return Ty::Str,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                if l.is_numeric() && r.is_numeric() {
                    return l.numeric_join(r);
                }
                false
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => l.is_numeric() && r.is_numeric(),
            BinOp::Eq | BinOp::Ne => {
                (l.is_numeric() && r.is_numeric())
                    || (*l != Ty::Void && *r != Ty::Void && (l.assignable_to(r) || r.assignable_to(l)))
            }
            BinOp::And | BinOp::Or => l.assignable_to(&Ty::Boolean) && r.assignable_to(&Ty::Boolean),
        };
        if !ok {
            self.error(
                codes::TYPE_MISMATCH,
                format!("bad operand types for binary operator '{}': {} and {}", op.as_str(), l, r),
                span,
            );
            return Ty::Error;
        }
        Ty::Boolean
    }

    fn assign(
        &mut self,
        target: &mut Expr,
        value: &mut Expr,
        span: Span,
    ) -> Ty {
        let found = self.expr(value);
        let target_span = target.span;
        let storage = match &mut target.kind {
            ExprKind::Name { name, binding } => match self.lookup(name) {
                Some(slot) => {
                    if slot.is_final {
                        let name = name.clone();
                        self.error(
                            codes::ILLEGAL,
                            format!("cannot assign a value to final variable {}", name),
                            target_span,
                        );
                    }
                    *binding = slot.binding;
                    slot.storage
                }
                None => {
                    let name = name.clone();
                    self.unresolved(&name, "variable", target_span);
                    return Ty::Error;
                }
            },
            ExprKind::Field { receiver, name } => {
                let receiver_ty = self.expr(receiver);
                let name = name.clone();
                self.field_of(&receiver_ty, &name, target_span)
            }
            _ => {
                self.error(codes::ILLEGAL, "invalid assignment target", span);
                return Ty::Error;
            }
        };
        if !found.assignable_to(&storage) {
            self.mismatch(&found, &storage, value.span);
        }
        storage
    }

    /// Candidates for a bare call: class members, then top-level methods,
    /// then imported library functions
    fn call(
        &mut self,
        name: &str,
        args: &[Ty],
        span: Span,
    ) -> Option<Candidate> {
        let env = self.env;
        let mut candidates: Vec<Candidate> = Vec::new();
        if let Some(class) = self.class {
            candidates.extend(class.decl.methods.iter().filter(|m| m.name == name).map(|m| Candidate {
                params: m.params.iter().map(|p| env.type_of(&p.ty)).collect(),
                ret: env.type_of(&m.ret),
                target: CallTarget::Member(m.erased_signature()),
            }));
        }
        if candidates.is_empty() {
            if let Some(methods) = env.methods.get(name) {
                candidates.extend(methods.iter().map(|m| Candidate {
                    params: m.params.clone(),
                    ret: m.ret.clone(),
                    target: CallTarget::Global(m.provider.clone()),
                }));
            }
        }
        if candidates.is_empty() {
            if let Some(native) = env.natives.get(name) {
                candidates.push(Candidate {
                    params: native.params.clone(),
                    ret: native.ret.clone(),
                    target: CallTarget::Native(native.qualified_name.to_string()),
                });
            }
        }
        if candidates.is_empty() {
            self.unresolved(name, "method", span);
            return None;
        }
        self.select(name, candidates, args, span)
    }

    fn instance_call(
        &mut self,
        receiver: &Ty,
        name: &str,
        args: &[Ty],
        span: Span,
    ) -> Option<Candidate> {
        let env = self.env;
        let class = match receiver {
            Ty::Error => return None,
            Ty::Class { name: class, .. } => env.classes.get(class)?,
            other => {
                self.error(
                    codes::TYPE_MISMATCH,
                    format!("cannot call method {} on a value of type {}", name, other),
                    span,
                );
                return None;
            }
        };
        let candidates: Vec<Candidate> = class
            .decl
            .methods
            .iter()
            .filter(|m| m.name == name)
            .map(|m| Candidate {
                params: m.params.iter().map(|p| env.type_of(&p.ty)).collect(),
                ret: env.type_of(&m.ret),
                target: CallTarget::Member(m.erased_signature()),
            })
            .collect();
        if candidates.is_empty() {
            self.unresolved(name, "method", span);
            return None;
        }
        self.select(name, candidates, args, span)
    }

    fn field_of(
        &mut self,
        receiver: &Ty,
        name: &str,
        span: Span,
    ) -> Ty {
        let class = match receiver {
            Ty::Error => return Ty::Error,
            Ty::Class { name: class, .. } => self.env.classes.get(class),
            _ => None,
        };
        match class {
            Some(class) => match class.decl.field(name) {
                Some(field) => self.env.type_of(&field.ty),
                None => {
                    self.unresolved(name, "field", span);
                    Ty::Error
                }
            },
            None => {
                self.error(
                    codes::TYPE_MISMATCH,
                    format!("a value of type {} has no field {}", receiver, name),
                    span,
                );
                Ty::Error
            }
        }
    }

    /// Exact matches win over matches that need widening
    fn select(
        &mut self,
        name: &str,
        candidates: Vec<Candidate>,
        args: &[Ty],
        span: Span,
    ) -> Option<Candidate> {
        let arity: Vec<Candidate> = candidates.into_iter().filter(|c| c.params.len() == args.len()).collect();
        let exact = arity.iter().position(|c| c.params.iter().zip(args).all(|(p, a)| p == a || *a == Ty::Error));
        let applicable = exact.or_else(|| arity.iter().position(|c| c.params.iter().zip(args).all(|(p, a)| a.assignable_to(p))));
        match applicable {
            Some(index) => arity.into_iter().nth(index),
            None => {
                let found: Vec<String> = args.iter().map(Ty::to_string).collect();
                self.error(
                    codes::BAD_CALL,
                    format!("method {} cannot be applied to ({})", name, found.join(", ")),
                    span,
                );
                None
            }
        }
    }
}

/// A stub call never returns normally
fn stmt_completes(stmt: &Stmt) -> bool {
    match stmt {
        Stmt::Return { .. } | Stmt::Throw(_) => false,
        Stmt::Expr(Expr {
            kind: ExprKind::Call { callee, .. },
            ..
        }) => callee.as_str() != STUB_CALL,
        Stmt::Block(block) => block_completes(block),
        Stmt::If {
            then_branch,
            else_branch: Some(other),
            ..
        } => stmt_completes(then_branch) || stmt_completes(other),
        Stmt::While {
            cond: Expr {
                kind: ExprKind::Bool(true),
                ..
            },
            ..
        } => false,
        _ => true,
    }
}

fn block_completes(block: &Block) -> bool {
    block.stmts.iter().all(stmt_completes)
}
