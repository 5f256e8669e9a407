//! Tree-walking interpreter over loaded class files
//!
//! Runs with the host state borrowed for the duration of one invocation.
//! Top-level variables live in `statics`, keyed by the class that declares
//! them, so a redefined class keeps its value. The stop flag is polled on
//! every loop iteration and every call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::sandbox::classfile::ClassFile;
use crate::sandbox::library::Library;
use crate::sandbox::syntax::ast::*;
use crate::sandbox::value::{Instance, Trap, Value};

/// Deepest call chain before a `StackOverflowError`
pub const MAX_CALL_DEPTH: usize = 256;

type Exec<T> = Result<T, Trap>;

/// Initial value of a slot of type `ty`
pub fn default_value(ty: &TypeRef) -> Value {
    match ty.name.as_str() {
        "int" => Value::Int(0),
        "double" => Value::Double(0.0),
        "boolean" => Value::Bool(false),
        _ => Value::Null,
    }
}

/// Widen ints stored into `double` slots
fn coerce(
    value: Value,
    slot_type: &str,
) -> Value {
    match (value, slot_type) {
        (Value::Int(v), "double") => Value::Double(v as f64),
        (value, _) => value,
    }
}

fn exception(message: impl Into<String>) -> Trap {
    Trap::Exception(message.into())
}

fn null_pointer() -> Trap {
    exception("java.lang.NullPointerException")
}

/// Local variable and the type name it was declared with
struct Local {
    value: Value,
    slot_type: String,
}

/// Activation of one member
struct Frame {
    scopes: Vec<HashMap<String, Local>>,
    this: Option<Arc<Mutex<Instance>>>,
    /// Class file running the code
    owner: String,
    /// Member reported when a stub is reached
    member: String,
}

impl Frame {
    fn new(
        owner: &str,
        member: &str,
        this: Option<Arc<Mutex<Instance>>>,
    ) -> Self {
        Self {
            scopes: vec![HashMap::new()],
            this,
            owner: owner.to_string(),
            member: member.to_string(),
        }
    }

    fn declare(
        &mut self,
        name: &str,
        slot_type: &str,
        value: Value,
    ) {
        let slot_type = match (slot_type, &value) {
            ("var", Value::Double(_)) => "double",
            (ty, _) => ty,
        };
        let value = coerce(value, slot_type);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(
                name.to_string(),
                Local {
                    value,
                    slot_type: slot_type.to_string(),
                },
            );
        }
    }

    fn local(
        &mut self,
        name: &str,
    ) -> Option<&mut Local> {
        self.scopes.iter_mut().rev().find_map(|scope| scope.get_mut(name))
    }

    fn this(&self) -> Exec<&Arc<Mutex<Instance>>> {
        self.this
            .as_ref()
            .ok_or_else(|| Trap::Internal(format!("no instance in {}", self.member)))
    }
}

/// Interpreter over the loaded classes
pub struct Interpreter<'h> {
    classes: &'h HashMap<String, ClassFile>,
    statics: &'h mut HashMap<String, Value>,
    console: &'h mut Vec<String>,
    stop: &'h AtomicBool,
    depth: usize,
}

impl<'h> Interpreter<'h> {
    pub fn new(
        classes: &'h HashMap<String, ClassFile>,
        statics: &'h mut HashMap<String, Value>,
        console: &'h mut Vec<String>,
        stop: &'h AtomicBool,
    ) -> Self {
        Self {
            classes,
            statics,
            console,
            stop,
            depth: 0,
        }
    }

    fn class_file(
        &self,
        name: &str,
    ) -> Exec<&'h ClassFile> {
        let classes: &'h HashMap<String, ClassFile> = self.classes;
        classes
            .get(name)
            .ok_or_else(|| Trap::Internal(format!("class {} is not loaded", name)))
    }

    fn check_stop(&self) -> Exec<()> {
        if self.stop.load(Ordering::Relaxed) {
            Err(Trap::Stopped)
        } else {
            Ok(())
        }
    }

    /// Run the entry point of an executable class; returns its value
    pub fn run_entry(
        &mut self,
        class_name: &str,
    ) -> Exec<Value> {
        let file = self.class_file(class_name)?;
        let mut frame = Frame::new(class_name, class_name, None);
        match &file.item {
            Item::Var(var) => {
                frame.member = var.name.clone();
                let value = match &var.init {
                    Some(init) => self.expr(&mut frame, init)?,
                    None => default_value(&var.ty),
                };
                let ty = static_type(var, &value);
                let value = coerce(value, &ty);
                self.statics.insert(class_name.to_string(), value.clone());
                Ok(value)
            }
            Item::Stmt(Stmt::Expr(expr)) => self.expr(&mut frame, expr),
            Item::Stmt(stmt) => match self.stmt(&mut frame, stmt) {
                Ok(()) => Ok(Value::Void),
                Err(Trap::Return(_)) => Ok(Value::Void),
                Err(other) => Err(other),
            },
            _ => Err(Trap::Internal(format!("class {} has no entry point", class_name))),
        }
    }

    // ---- statements ----

    fn block(
        &mut self,
        frame: &mut Frame,
        block: &Block,
    ) -> Exec<()> {
        frame.scopes.push(HashMap::new());
        let result = block.stmts.iter().try_for_each(|stmt| self.stmt(frame, stmt));
        frame.scopes.pop();
        result
    }

    fn stmt(
        &mut self,
        frame: &mut Frame,
        stmt: &Stmt,
    ) -> Exec<()> {
        match stmt {
            Stmt::Local(var) => {
                let value = match &var.init {
                    Some(init) => self.expr(frame, init)?,
                    None => default_value(&var.ty),
                };
                frame.declare(&var.name, &var.ty.name, value);
                Ok(())
            }
            Stmt::Expr(expr) => self.expr(frame, expr).map(|_| ()),
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.condition(frame, cond)? {
                    self.scoped(frame, then_branch)
                } else if let Some(other) = else_branch {
                    self.scoped(frame, other)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body } => {
                while self.condition(frame, cond)? {
                    self.check_stop()?;
                    self.scoped(frame, body)?;
                }
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.expr(frame, value)?,
                    None => Value::Void,
                };
                Err(Trap::Return(value))
            }
            Stmt::Throw(expr) => {
                let value = self.expr(frame, expr)?;
                match value {
                    Value::Null => Err(null_pointer()),
                    other => Err(exception(other.to_text())),
                }
            }
            Stmt::Block(block) => self.block(frame, block),
        }
    }

    fn scoped(
        &mut self,
        frame: &mut Frame,
        stmt: &Stmt,
    ) -> Exec<()> {
        frame.scopes.push(HashMap::new());
        let result = self.stmt(frame, stmt);
        frame.scopes.pop();
        result
    }

    fn condition(
        &mut self,
        frame: &mut Frame,
        cond: &Expr,
    ) -> Exec<bool> {
        self.expr(frame, cond)?
            .as_bool()
            .ok_or_else(|| Trap::Internal("condition is not a boolean".to_string()))
    }

    // ---- expressions ----

    fn expr(
        &mut self,
        frame: &mut Frame,
        expr: &Expr,
    ) -> Exec<Value> {
        match &expr.kind {
            ExprKind::Int(v) => Ok(Value::Int(*v)),
            ExprKind::Double(v) => Ok(Value::Double(*v)),
            ExprKind::Bool(v) => Ok(Value::Bool(*v)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Name { name, binding } => self.read(frame, name, binding),
            ExprKind::Unary { op, expr } => {
                let value = self.expr(frame, expr)?;
                match (op, value) {
                    (UnOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
                    (UnOp::Neg, Value::Double(v)) => Ok(Value::Double(-v)),
                    (UnOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
                    (_, other) => Err(Trap::Internal(format!("bad unary operand {}", other))),
                }
            }
            ExprKind::Binary {
                op: BinOp::And,
                lhs,
                rhs,
            } => Ok(Value::Bool(self.condition(frame, lhs)? && self.condition(frame, rhs)?)),
            ExprKind::Binary { op: BinOp::Or, lhs, rhs } => {
                Ok(Value::Bool(self.condition(frame, lhs)? || self.condition(frame, rhs)?))
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let l = self.expr(frame, lhs)?;
                let r = self.expr(frame, rhs)?;
                binary(*op, l, r)
            }
            ExprKind::Assign { target, value } => {
                let value = self.expr(frame, value)?;
                self.assign(frame, target, value)
            }
            ExprKind::Call { callee, args, target } => {
                let args = self.arguments(frame, args)?;
                self.call(frame, callee, target, args)
            }
            ExprKind::MethodCall {
                receiver,
                method,
                args,
                signature,
            } => {
                let receiver = self.expr(frame, receiver)?;
                let args = self.arguments(frame, args)?;
                let Value::Object(instance) = receiver else {
                    return Err(null_pointer());
                };
                self.call_member(instance, method, signature, args)
            }
            ExprKind::Field { receiver, name } => match self.expr(frame, receiver)? {
                Value::Object(instance) => {
                    let instance = instance.lock();
                    instance
                        .fields
                        .get(name)
                        .cloned()
                        .ok_or_else(|| Trap::Internal(format!("{} has no field {}", instance.type_name, name)))
                }
                _ => Err(null_pointer()),
            },
            ExprKind::New { class, provider } => {
                let provider = provider
                    .as_deref()
                    .ok_or_else(|| Trap::Internal(format!("class {} was not linked", class)))?;
                self.instantiate(provider)
            }
        }
    }

    fn arguments(
        &mut self,
        frame: &mut Frame,
        args: &[Expr],
    ) -> Exec<Vec<Value>> {
        args.iter().map(|a| self.expr(frame, a)).collect()
    }

    fn read(
        &self,
        frame: &mut Frame,
        name: &str,
        binding: &Binding,
    ) -> Exec<Value> {
        let missing = || Trap::Internal(format!("variable {} is not bound", name));
        match binding {
            Binding::Local => frame.local(name).map(|l| l.value.clone()).ok_or_else(missing),
            Binding::Field => frame.this()?.lock().fields.get(name).cloned().ok_or_else(missing),
            Binding::Global(provider) => self.statics.get(provider).cloned().ok_or_else(missing),
            Binding::Unbound => Err(missing()),
        }
    }

    fn assign(
        &mut self,
        frame: &mut Frame,
        target: &Expr,
        value: Value,
    ) -> Exec<Value> {
        match &target.kind {
            ExprKind::Name { name, binding } => match binding {
                Binding::Local => {
                    let local = frame
                        .local(name)
                        .ok_or_else(|| Trap::Internal(format!("variable {} is not bound", name)))?;
                    local.value = coerce(value, &local.slot_type);
                    Ok(local.value.clone())
                }
                Binding::Field => {
                    let this = Arc::clone(frame.this()?);
                    self.store_field(&this, name, value)
                }
                Binding::Global(provider) => {
                    let file = self.class_file(provider)?;
                    let value = match &file.item {
                        Item::Var(var) => coerce(value, &static_type(var, self.statics.get(provider).unwrap_or(&Value::Null))),
                        _ => value,
                    };
                    self.statics.insert(provider.clone(), value.clone());
                    Ok(value)
                }
                Binding::Unbound => Err(Trap::Internal(format!("variable {} is not bound", name))),
            },
            ExprKind::Field { receiver, name } => match self.expr(frame, receiver)? {
                Value::Object(instance) => self.store_field(&instance, name, value),
                _ => Err(null_pointer()),
            },
            _ => Err(Trap::Internal("invalid assignment target".to_string())),
        }
    }

    fn store_field(
        &self,
        instance: &Arc<Mutex<Instance>>,
        name: &str,
        value: Value,
    ) -> Exec<Value> {
        let class_name = instance.lock().class_name.clone();
        let slot_type = self
            .class_file(&class_name)?
            .class()
            .and_then(|class| class.field(name))
            .map(|field| field.ty.name.clone())
            .unwrap_or_default();
        let value = coerce(value, &slot_type);
        instance.lock().fields.insert(name.to_string(), value.clone());
        Ok(value)
    }

    fn instantiate(
        &mut self,
        provider: &str,
    ) -> Exec<Value> {
        let file = self.class_file(provider)?;
        let class = file
            .class()
            .ok_or_else(|| Trap::Internal(format!("{} does not declare a class", provider)))?;
        let fields: IndexMap<String, Value> = class
            .fields
            .iter()
            .map(|f| (f.name.clone(), default_value(&f.ty)))
            .collect();
        let instance = Arc::new(Mutex::new(Instance {
            class_name: provider.to_string(),
            type_name: class.name.clone(),
            fields,
        }));

        let mut frame = Frame::new(provider, &class.name, Some(Arc::clone(&instance)));
        for field in &class.fields {
            if let Some(init) = &field.init {
                let value = self.expr(&mut frame, init)?;
                self.store_field(&instance, &field.name, value)?;
            }
        }
        Ok(Value::Object(instance))
    }

    fn call(
        &mut self,
        frame: &mut Frame,
        callee: &str,
        target: &CallTarget,
        args: Vec<Value>,
    ) -> Exec<Value> {
        match target {
            CallTarget::Stub => Err(Trap::Unresolved {
                class_name: frame.owner.clone(),
                member: frame.member.clone(),
            }),
            CallTarget::Member(signature) => {
                let this = Arc::clone(frame.this()?);
                self.call_member(this, callee, signature, args)
            }
            CallTarget::Global(provider) => {
                let file = self.class_file(provider)?;
                let method = file
                    .method()
                    .ok_or_else(|| Trap::Internal(format!("{} does not declare a method", provider)))?;
                self.invoke(provider, &method.name, method, None, args)
            }
            CallTarget::Native(qualified_name) => {
                self.check_stop()?;
                let function = Library::get()
                    .function(qualified_name)
                    .ok_or_else(|| Trap::Internal(format!("no library function {}", qualified_name)))?;
                let args: Vec<Value> = args
                    .into_iter()
                    .zip(&function.params)
                    .map(|(value, ty)| coerce(value, &ty.to_string()))
                    .collect();
                (function.handler)(&args, self.console)
            }
            CallTarget::Unbound => Err(Trap::Internal(format!("call to {} is not linked", callee))),
        }
    }

    fn call_member(
        &mut self,
        instance: Arc<Mutex<Instance>>,
        name: &str,
        signature: &str,
        args: Vec<Value>,
    ) -> Exec<Value> {
        let class_name = instance.lock().class_name.clone();
        let file = self.class_file(&class_name)?;
        let class = file
            .class()
            .ok_or_else(|| Trap::Internal(format!("{} does not declare a class", class_name)))?;
        let method = class
            .method(name, signature)
            .ok_or_else(|| Trap::Internal(format!("{} has no method {}{}", class.name, name, signature)))?;
        let member = format!("{}.{}", class.name, name);
        self.invoke(&class_name, &member, method, Some(instance), args)
    }

    fn invoke(
        &mut self,
        owner: &str,
        member: &str,
        method: &MethodDecl,
        this: Option<Arc<Mutex<Instance>>>,
        args: Vec<Value>,
    ) -> Exec<Value> {
        self.check_stop()?;
        if self.depth >= MAX_CALL_DEPTH {
            return Err(exception("java.lang.StackOverflowError"));
        }

        let mut frame = Frame::new(owner, member, this);
        for (param, value) in method.params.iter().zip(args) {
            frame.declare(&param.name, &param.ty.name, value);
        }
        self.depth += 1;
        let result = self.block(&mut frame, &method.body);
        self.depth -= 1;
        match result {
            Ok(()) => Ok(Value::Void),
            Err(Trap::Return(value)) => Ok(coerce(value, &method.ret.name)),
            Err(other) => Err(other),
        }
    }
}

/// Slot type of a top-level variable; `var` takes the kind of its value
fn static_type(
    var: &VarDecl,
    current: &Value,
) -> String {
    match (var.ty.name.as_str(), current) {
        ("var", Value::Double(_)) => "double".to_string(),
        (name, _) => name.to_string(),
    }
}

fn binary(
    op: BinOp,
    l: Value,
    r: Value,
) -> Exec<Value> {
    if op == BinOp::Add && (matches!(l, Value::Str(_)) || matches!(r, Value::Str(_))) {
        return Ok(Value::Str(format!("{}{}", l.to_text(), r.to_text())));
    }
    match op {
        BinOp::Eq => return Ok(Value::Bool(l.same(&r))),
        BinOp::Ne => return Ok(Value::Bool(!l.same(&r))),
        _ => {}
    }

    if let (Value::Int(a), Value::Int(b)) = (&l, &r) {
        let (a, b) = (*a, *b);
        let value = match op {
            BinOp::Add => Value::Int(a.wrapping_add(b)),
            BinOp::Sub => Value::Int(a.wrapping_sub(b)),
            BinOp::Mul => Value::Int(a.wrapping_mul(b)),
            BinOp::Div | BinOp::Rem if b == 0 => return Err(exception("java.lang.ArithmeticException: / by zero")),
            BinOp::Div => Value::Int(a.wrapping_div(b)),
            BinOp::Rem => Value::Int(a.wrapping_rem(b)),
            BinOp::Lt => Value::Bool(a < b),
            BinOp::Le => Value::Bool(a <= b),
            BinOp::Gt => Value::Bool(a > b),
            BinOp::Ge => Value::Bool(a >= b),
            BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => {
                return Err(Trap::Internal(format!("'{}' is not arithmetic", op.as_str())))
            }
        };
        return Ok(value);
    }

    let (Some(a), Some(b)) = (l.as_double(), r.as_double()) else {
        return Err(Trap::Internal(format!(
            "bad operands for '{}': {} and {}",
            op.as_str(),
            l,
            r
        )));
    };
    let value = match op {
        BinOp::Add => Value::Double(a + b),
        BinOp::Sub => Value::Double(a - b),
        BinOp::Mul => Value::Double(a * b),
        BinOp::Div => Value::Double(a / b),
        BinOp::Rem => Value::Double(a % b),
        BinOp::Lt => Value::Bool(a < b),
        BinOp::Le => Value::Bool(a <= b),
        BinOp::Gt => Value::Bool(a > b),
        BinOp::Ge => Value::Bool(a >= b),
        BinOp::Eq | BinOp::Ne | BinOp::And | BinOp::Or => {
            return Err(Trap::Internal(format!("'{}' is not arithmetic", op.as_str())))
        }
    };
    Ok(value)
}
