//! Tree-walking evaluator
//!
//! Evaluates the syntax tree directly against the context's heap. Every
//! intermediate value is kept on the value stack while anything that could
//! run script or host code is in progress, so a collector pass started from
//! inside a host function sees all of them as roots.
//!
//! Call protocol: the callee, the `this` value and the arguments are pushed
//! in that order. [`Context::invoke`] replaces the whole group with the
//! result, or removes it and reports [`Thrown`] with the exception stored in
//! the context.

use std::rc::Rc;

use tracing::trace;

use crate::context::Context;
use crate::error::{ErrorKind, ScriptError};
use crate::gc::ObjectId;
use crate::parser::ast::{
    BinaryOp, CatchClause, Declarator, Expr, ForInTarget, ForInit, FunctionDef, LogicalOp,
    Program, Stmt, SwitchCase, UnaryOp,
};
use crate::runtime::{Function, HeapObject, HostFunction, Nargs, ObjectKind};
use crate::suite::MethodSuite;
use crate::value::Value;
use crate::vm::ops::{strict_equals, to_boolean, to_int32};

/// Deepest native recursion of statements, expressions and calls combined
pub(crate) const MAX_NESTING: usize = 200;

const STACK_EXCEEDED: &str = "maximum call stack size exceeded";

/// Marker for a pending exception; the thrown value lives in `Context::thrown`
#[derive(Debug)]
pub(crate) struct Thrown;

pub(crate) type Flow<T> = Result<T, Thrown>;

/// How a statement finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Normal,
    /// The return value is on top of the stack
    Return,
    Break,
    Continue,
}

/// Assignment target
enum Reference {
    Var(Rc<str>),
    /// Property of the object held in stack slot `object`
    Property { object: usize, key: Rc<str> },
}

/// Name of a callee for "is not a function" messages
fn describe_callee(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.to_string(),
        Expr::Member(object, name) => format!("{}.{name}", describe_callee(object)),
        Expr::Index(object, _) => format!("{}[...]", describe_callee(object)),
        Expr::This => "this".to_string(),
        _ => "expression".to_string(),
    }
}

impl Context {
    // ---- exceptions ----

    pub(crate) fn new_error_object(&mut self, kind: ErrorKind, name: &str, message: &str) -> ObjectId {
        let mut object = HeapObject::new(ObjectKind::Error(kind));
        object.properties.set("name", Value::string(name));
        object.properties.set("message", Value::string(message));
        self.heap.alloc(object)
    }

    /// Throw a new error object of the given class
    pub(crate) fn throw_error(&mut self, kind: ErrorKind, message: impl Into<String>) -> Thrown {
        let message = message.into();
        let id = self.new_error_object(kind, kind.name(), &message);
        self.throw_value(Value::Object(id))
    }

    pub(crate) fn throw_value(&mut self, value: Value) -> Thrown {
        self.thrown = Some(value);
        Thrown
    }

    /// Rethrow a host-side error as an error object, keeping its name
    pub(crate) fn throw_script_error(&mut self, err: &ScriptError) -> Thrown {
        let kind = err.kind().unwrap_or(ErrorKind::Error);
        let id = self.new_error_object(kind, &err.name, &err.message);
        self.throw_value(Value::Object(id))
    }

    pub(crate) fn take_thrown(&mut self) -> Value {
        self.thrown.take().unwrap_or_default()
    }

    /// Describe a thrown value for host code
    pub(crate) fn script_error_from_value(&self, value: &Value) -> ScriptError {
        if let Value::Object(id) = value {
            if let Some(ObjectKind::Error(kind)) = self.heap.get(*id).map(|o| &o.kind) {
                let name = match self.object_get(*id, "name") {
                    Value::Undefined => kind.name().to_string(),
                    name => self.to_display_string(&name),
                };
                let message = match self.object_get(*id, "message") {
                    Value::Undefined => String::new(),
                    message => self.to_display_string(&message),
                };
                return ScriptError { name, message };
            }
        }
        ScriptError::new(ErrorKind::Error, self.to_display_string(value))
    }

    // ---- scopes ----

    fn current_scope(&self) -> Option<ObjectId> {
        self.scopes.last().copied().flatten()
    }

    /// `this` of the innermost script code
    pub(crate) fn this_value(&self) -> Value {
        match self.current_scope().and_then(|id| self.heap.get(id)).map(|o| &o.kind) {
            Some(ObjectKind::Scope { this, .. }) => this.clone(),
            _ => Value::Object(self.global),
        }
    }

    fn scope_parent(&self, id: ObjectId) -> Option<ObjectId> {
        match self.heap.get(id).map(|o| &o.kind) {
            Some(ObjectKind::Scope { parent, .. }) => *parent,
            _ => None,
        }
    }

    fn lookup_var(&self, name: &str) -> Option<Value> {
        let mut scope = self.current_scope();
        while let Some(id) = scope {
            if let Some(value) = self.heap.get(id).and_then(|o| o.properties.get(name)) {
                return Some(value.clone());
            }
            scope = self.scope_parent(id);
        }
        self.heap
            .get(self.global)
            .and_then(|g| g.properties.get(name))
            .cloned()
    }

    /// Assign to the nearest binding, creating a global if there is none
    fn assign_var(&mut self, name: &str, value: Value) {
        let mut scope = self.current_scope();
        while let Some(id) = scope {
            if let Some(object) = self.heap.get_mut(id) {
                if object.properties.contains(name) {
                    object.properties.set(name, value);
                    return;
                }
            }
            scope = self.scope_parent(id);
        }
        if let Some(global) = self.heap.get_mut(self.global) {
            global.properties.set(name, value);
        }
    }

    fn make_closure(&mut self, def: &Rc<FunctionDef>) -> ObjectId {
        let scope = self.current_scope();
        self.heap.alloc(HeapObject::new(ObjectKind::Function(Function::Closure {
            def: Rc::clone(def),
            scope,
        })))
    }

    pub(crate) fn is_callable_value(&self, value: &Value) -> bool {
        value
            .as_object()
            .and_then(|id| self.heap.get(id))
            .is_some_and(|o| o.is_callable())
    }

    fn is_constructor_value(&self, value: &Value) -> bool {
        matches!(
            value
                .as_object()
                .and_then(|id| self.heap.get(id))
                .and_then(|o| o.as_function()),
            Some(Function::Closure { .. } | Function::Host { .. })
        )
    }

    #[inline]
    fn pop_value(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    #[inline]
    fn top_value(&self) -> Value {
        self.stack.peek().cloned().unwrap_or_default()
    }

    // ---- programs and calls ----

    /// Run a script as global code, leaving its completion value on the stack
    pub(crate) fn run_program(&mut self, program: &Program) -> Flow<()> {
        let slot = self.stack.len();
        self.stack.push(Value::Undefined);
        let saved_slot = self.completion_slot.replace(slot);
        self.scopes.push(None);

        for name in &program.var_names {
            let declared = self
                .heap
                .get(self.global)
                .is_some_and(|g| g.properties.contains(name));
            if !declared {
                self.assign_var(name, Value::Undefined);
            }
        }
        for def in &program.functions {
            let closure = self.make_closure(def);
            if let Some(name) = &def.name {
                self.assign_var(name, Value::Object(closure));
            }
        }

        let result = self.exec_block(&program.body);
        self.scopes.pop();
        self.completion_slot = saved_slot;

        match result {
            Ok(_) => {
                self.stack.truncate(slot + 1);
                Ok(())
            }
            Err(thrown) => {
                self.stack.truncate(slot);
                Err(thrown)
            }
        }
    }

    /// Whether one more call fits under both depth limits
    pub(crate) fn can_call(&self) -> bool {
        self.call_depth < self.config.max_call_depth && self.nesting < MAX_NESTING
    }

    /// Run `f` one native recursion level deeper
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Flow<T>) -> Flow<T> {
        if self.nesting >= MAX_NESTING {
            return Err(self.throw_error(ErrorKind::RangeError, STACK_EXCEEDED));
        }
        self.nesting += 1;
        let result = f(self);
        self.nesting -= 1;
        result
    }

    /// Call the function below `this` and `nargs` arguments on the stack
    pub(crate) fn invoke(&mut self, nargs: usize, construct: bool) -> Flow<()> {
        let base = self.stack.len() - nargs - 2;

        if !self.can_call() {
            self.stack.truncate(base);
            return Err(self.throw_error(ErrorKind::RangeError, STACK_EXCEEDED));
        }
        if self.stack.len() > self.config.max_stack_values {
            self.stack.truncate(base);
            return Err(self.throw_error(ErrorKind::RangeError, "value stack limit exceeded"));
        }

        let function = self
            .stack
            .get_abs(base)
            .and_then(Value::as_object)
            .and_then(|id| self.heap.get(id))
            .and_then(|o| o.as_function())
            .cloned();
        let Some(function) = function else {
            self.stack.truncate(base);
            return Err(self.throw_error(ErrorKind::TypeError, "not a function"));
        };

        if construct {
            if let Function::Method { name, .. } = &function {
                let message = format!("{name} is not a constructor");
                self.stack.truncate(base);
                return Err(self.throw_error(ErrorKind::TypeError, message));
            }
            let this = self.heap.alloc(HeapObject::new(ObjectKind::Plain));
            self.stack.set_abs(base + 1, Value::Object(this));
        }

        self.call_depth += 1;
        self.nesting += 1;
        let result = match &function {
            Function::Closure { def, scope } => self.call_closure(base, def, *scope),
            Function::Host { name, func, nargs } => self.call_host(base, name, func, *nargs),
            Function::Method { suite, name } => self.call_suite_method(base, *suite, name),
        };
        self.nesting -= 1;
        self.call_depth -= 1;

        match result {
            Ok(()) => {
                let mut value = self.pop_value();
                if construct && !value.is_object() {
                    value = self.stack.get_abs(base + 1).cloned().unwrap_or_default();
                }
                self.stack.truncate(base);
                self.stack.push(value);
                Ok(())
            }
            Err(thrown) => {
                self.stack.truncate(base);
                Err(thrown)
            }
        }
    }

    fn call_closure(
        &mut self,
        base: usize,
        def: &Rc<FunctionDef>,
        parent: Option<ObjectId>,
    ) -> Flow<()> {
        // non-strict code sees the global object for a missing receiver
        let this = match self.stack.get_abs(base + 1) {
            Some(value) if !value.is_nullish() => value.clone(),
            _ => Value::Object(self.global),
        };
        let args_start = (base + 2).min(self.stack.len());

        let mut scope = HeapObject::new(ObjectKind::Scope { parent, this });
        if def.is_expression {
            if let Some(name) = &def.name {
                let callee = self.stack.get_abs(base).cloned().unwrap_or_default();
                scope.properties.set(name, callee);
            }
        }
        if def.uses_arguments {
            let args = self.stack.values()[args_start..].to_vec();
            let arguments = self.heap.alloc(HeapObject::new(ObjectKind::Array(args)));
            scope.properties.set("arguments", Value::Object(arguments));
        }
        for (i, param) in def.params.iter().enumerate() {
            let value = self.stack.get_abs(base + 2 + i).cloned().unwrap_or_default();
            scope.properties.set(param, value);
        }
        for name in &def.var_names {
            if !scope.properties.contains(name) {
                scope.properties.set(name, Value::Undefined);
            }
        }

        let scope_id = self.heap.alloc(scope);
        self.scopes.push(Some(scope_id));
        for inner in &def.functions {
            let closure = self.make_closure(inner);
            if let (Some(name), Some(object)) = (&inner.name, self.heap.get_mut(scope_id)) {
                object.properties.set(name, Value::Object(closure));
            }
        }

        let saved_slot = self.completion_slot.take();
        let result = self.exec_block(&def.body);
        self.completion_slot = saved_slot;
        self.scopes.pop();

        if result? != Completion::Return {
            self.stack.push(Value::Undefined);
        }
        Ok(())
    }

    /// Trampoline into a host function
    ///
    /// The function sees a frame holding only its arguments. Its result is
    /// the top of that frame when it reports at least one pushed value.
    pub(crate) fn call_host(
        &mut self,
        base: usize,
        name: &str,
        func: &HostFunction,
        nargs: Nargs,
    ) -> Flow<()> {
        let prev_bottom = self.stack.enter_frame(base + 2);
        if let Nargs::Fixed(n) = nargs {
            self.stack.resize_frame(n);
        }
        trace!(function = name, nargs = self.stack.top(), "calling host function");

        self.host_frames.push(base + 1);
        let result = func(self);
        self.host_frames.pop();

        let outcome = match result {
            Ok(0) => Ok(Value::Undefined),
            Ok(count) => {
                let available = self.stack.top();
                if count <= available {
                    Ok(self.top_value())
                } else {
                    Err(ScriptError::new(
                        ErrorKind::TypeError,
                        format!("{name} returned {count} values but pushed {available}"),
                    ))
                }
            }
            Err(err) => Err(err.to_script_error()),
        };
        self.stack.leave_frame(prev_bottom);

        match outcome {
            Ok(value) => {
                self.stack.push(value);
                Ok(())
            }
            Err(err) => {
                trace!(function = name, error = %err, "host function failed");
                Err(self.throw_script_error(&err))
            }
        }
    }

    /// Dispatch a suite method through the registry entry of its proxy
    fn call_suite_method(&mut self, base: usize, suite: ObjectId, name: &Rc<str>) -> Flow<()> {
        let Some(handle) = self.heap.get(suite).and_then(|o| o.host_handle()) else {
            return Err(self.throw_error(ErrorKind::TypeError, format!("{name} has no method suite")));
        };
        let func = match self.registry.lookup_as::<MethodSuite>(handle) {
            Ok(methods) => methods.get(name).cloned(),
            Err(err) => {
                let err = err.to_script_error();
                return Err(self.throw_script_error(&err));
            }
        };
        let Some(func) = func else {
            return Err(self.throw_error(ErrorKind::TypeError, format!("{name} is not a function")));
        };
        self.call_host(base, name, &func, Nargs::Variadic)
    }

    // ---- statements ----

    fn exec_block(&mut self, stmts: &[Stmt]) -> Flow<Completion> {
        for stmt in stmts {
            let completion = self.exec_stmt(stmt)?;
            if completion != Completion::Normal {
                return Ok(completion);
            }
        }
        Ok(Completion::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Flow<Completion> {
        self.nested(|ctx| ctx.exec_stmt_kind(stmt))
    }

    fn exec_stmt_kind(&mut self, stmt: &Stmt) -> Flow<Completion> {
        match stmt {
            Stmt::Empty => Ok(Completion::Normal),
            Stmt::Expr(expr) => {
                let value = self.eval_pop(expr)?;
                if let Some(slot) = self.completion_slot {
                    self.stack.set_abs(slot, value);
                }
                Ok(Completion::Normal)
            }
            Stmt::Var(decls) => {
                self.exec_declarations(decls)?;
                Ok(Completion::Normal)
            }
            Stmt::Block(body) => self.exec_block(body),
            Stmt::If(test, then, otherwise) => {
                let test = self.eval_pop(test)?;
                if to_boolean(&test) {
                    self.exec_stmt(then)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise)
                } else {
                    Ok(Completion::Normal)
                }
            }
            Stmt::While(test, body) => {
                while to_boolean(&self.eval_pop(test)?) {
                    if let Some(exit) = self.exec_loop_body(body)? {
                        return Ok(exit);
                    }
                }
                Ok(Completion::Normal)
            }
            Stmt::DoWhile(body, test) => {
                loop {
                    if let Some(exit) = self.exec_loop_body(body)? {
                        return Ok(exit);
                    }
                    if !to_boolean(&self.eval_pop(test)?) {
                        return Ok(Completion::Normal);
                    }
                }
            }
            Stmt::For {
                init,
                test,
                update,
                body,
            } => self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body),
            Stmt::ForIn {
                target,
                object,
                body,
            } => self.exec_for_in(target, object, body),
            Stmt::Switch(discriminant, cases) => self.exec_switch(discriminant, cases),
            Stmt::Break => Ok(Completion::Break),
            Stmt::Continue => Ok(Completion::Continue),
            Stmt::Return(value) => {
                match value {
                    Some(expr) => self.eval_expr(expr)?,
                    None => self.stack.push(Value::Undefined),
                }
                Ok(Completion::Return)
            }
            Stmt::Throw(expr) => {
                let value = self.eval_pop(expr)?;
                Err(self.throw_value(value))
            }
            Stmt::Try {
                block,
                catch,
                finally,
            } => self.exec_try(block, catch.as_ref(), finally.as_deref()),
        }
    }

    fn exec_declarations(&mut self, decls: &[Declarator]) -> Flow<()> {
        for (name, init) in decls {
            if let Some(init) = init {
                let value = self.eval_pop(init)?;
                self.assign_var(name, value);
            }
        }
        Ok(())
    }

    /// Run a loop body, returning the completion that ends the loop, if any
    fn exec_loop_body(&mut self, body: &Stmt) -> Flow<Option<Completion>> {
        Ok(match self.exec_stmt(body)? {
            Completion::Break => Some(Completion::Normal),
            Completion::Return => Some(Completion::Return),
            Completion::Normal | Completion::Continue => None,
        })
    }

    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
    ) -> Flow<Completion> {
        match init {
            Some(ForInit::Var(decls)) => self.exec_declarations(decls)?,
            Some(ForInit::Expr(expr)) => {
                self.eval_pop(expr)?;
            }
            None => {}
        }
        loop {
            if let Some(test) = test {
                if !to_boolean(&self.eval_pop(test)?) {
                    return Ok(Completion::Normal);
                }
            }
            if let Some(exit) = self.exec_loop_body(body)? {
                return Ok(exit);
            }
            if let Some(update) = update {
                self.eval_pop(update)?;
            }
        }
    }

    fn exec_for_in(&mut self, target: &ForInTarget, object: &Expr, body: &Stmt) -> Flow<Completion> {
        let slot = self.stack.len();
        self.eval_expr(object)?;
        let object = self.top_value();
        let keys = self.own_keys(&object);

        let mut result = Ok(Completion::Normal);
        for key in keys {
            // keys deleted by the body are skipped
            if let Value::Object(id) = object {
                if !self.object_has(id, &key) {
                    continue;
                }
            }
            let assigned = match target {
                ForInTarget::Var(name) => {
                    self.assign_var(name, Value::String(key));
                    Ok(())
                }
                ForInTarget::Expr(expr) => self.assign_to(expr, Value::String(key)),
            };
            if let Err(thrown) = assigned {
                result = Err(thrown);
                break;
            }
            match self.exec_loop_body(body) {
                Ok(None) => {}
                Ok(Some(exit)) => {
                    result = Ok(exit);
                    break;
                }
                Err(thrown) => {
                    result = Err(thrown);
                    break;
                }
            }
        }

        match result {
            Ok(Completion::Return) => {
                self.stack.remove_abs(slot);
            }
            Ok(_) => self.stack.truncate(slot),
            Err(_) => {}
        }
        result
    }

    fn exec_switch(&mut self, discriminant: &Expr, cases: &[SwitchCase]) -> Flow<Completion> {
        let slot = self.stack.len();
        self.eval_expr(discriminant)?;

        let mut start = None;
        for (i, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let value = self.eval_pop(test)?;
                let discriminant = self.stack.get_abs(slot).cloned().unwrap_or_default();
                if strict_equals(&discriminant, &value) {
                    start = Some(i);
                    break;
                }
            }
        }
        let start = start.or_else(|| cases.iter().position(|case| case.test.is_none()));

        let mut completion = Completion::Normal;
        if let Some(start) = start {
            for case in &cases[start..] {
                completion = self.exec_block(&case.body)?;
                if completion != Completion::Normal {
                    break;
                }
            }
        }

        if completion == Completion::Return {
            self.stack.remove_abs(slot);
        } else {
            self.stack.truncate(slot);
        }
        Ok(match completion {
            Completion::Break => Completion::Normal,
            other => other,
        })
    }

    fn exec_try(
        &mut self,
        block: &[Stmt],
        catch: Option<&CatchClause>,
        finally: Option<&[Stmt]>,
    ) -> Flow<Completion> {
        let base = self.stack.len();
        let mut result = self.exec_block(block);

        let caught = if result.is_err() { catch } else { None };
        if let Some(clause) = caught {
            self.stack.truncate(base);
            let exception = self.take_thrown();
            let this = self.this_value();
            let mut scope = HeapObject::new(ObjectKind::Scope {
                parent: self.current_scope(),
                this,
            });
            if let Some(param) = &clause.param {
                scope.properties.set(param, exception);
            }
            let scope_id = self.heap.alloc(scope);
            self.scopes.push(Some(scope_id));
            result = self.exec_block(&clause.body);
            self.scopes.pop();
        }

        let Some(finally) = finally else {
            return result;
        };

        // keep a pending return value or exception rooted in slot `base`
        let pending = match &result {
            Ok(Completion::Return) => true,
            Err(_) => {
                self.stack.truncate(base);
                let exception = self.take_thrown();
                self.stack.push(exception);
                true
            }
            Ok(_) => false,
        };

        match self.exec_block(finally)? {
            Completion::Normal => {}
            other => {
                if pending {
                    self.stack.remove_abs(base);
                }
                return Ok(other);
            }
        }

        if result.is_err() {
            let exception = self.pop_value();
            return Err(self.throw_value(exception));
        }
        result
    }

    // ---- expressions ----

    /// Evaluate and pop in one step
    fn eval_pop(&mut self, expr: &Expr) -> Flow<Value> {
        self.eval_expr(expr)?;
        Ok(self.pop_value())
    }

    /// Evaluate `expr`, pushing exactly one value on success
    fn eval_expr(&mut self, expr: &Expr) -> Flow<()> {
        self.nested(|ctx| ctx.eval_expr_kind(expr))
    }

    fn eval_expr_kind(&mut self, expr: &Expr) -> Flow<()> {
        match expr {
            Expr::Number(n) => self.stack.push(Value::Number(*n)),
            Expr::String(s) => self.stack.push(Value::String(Rc::clone(s))),
            Expr::Bool(b) => self.stack.push(Value::Bool(*b)),
            Expr::Null => self.stack.push(Value::Null),
            Expr::This => {
                let this = self.this_value();
                self.stack.push(this);
            }
            Expr::Ident(name) => return self.eval_ident(name),
            Expr::Array(elements) => return self.eval_array(elements),
            Expr::Object(props) => return self.eval_object(props),
            Expr::Function(def) => {
                let closure = self.make_closure(def);
                self.stack.push(Value::Object(closure));
            }
            Expr::Unary(op, operand) => return self.eval_unary(*op, operand),
            Expr::Update {
                increment,
                prefix,
                target,
            } => return self.eval_update(*increment, *prefix, target),
            Expr::Binary(op, left, right) => return self.eval_binary(*op, left, right),
            Expr::Logical(op, left, right) => return self.eval_logical(*op, left, right),
            Expr::Assign { op, target, value } => return self.eval_assign(*op, target, value),
            Expr::Conditional(test, then, otherwise) => {
                let test = self.eval_pop(test)?;
                return self.eval_expr(if to_boolean(&test) { then } else { otherwise });
            }
            Expr::Member(object, name) => {
                let target = self.eval_pop(object)?;
                let value = self.get_property(&target, name)?;
                self.stack.push(value);
            }
            Expr::Index(object, key) => return self.eval_index(object, key),
            Expr::Call(callee, args) => return self.eval_call(callee, args),
            Expr::New(callee, args) => return self.eval_new(callee, args),
            Expr::Sequence(exprs) => return self.eval_sequence(exprs),
        }
        Ok(())
    }

    fn eval_ident(&mut self, name: &str) -> Flow<()> {
        match self.lookup_var(name) {
            Some(value) => {
                self.stack.push(value);
                Ok(())
            }
            None => Err(self.throw_error(ErrorKind::ReferenceError, format!("{name} is not defined"))),
        }
    }

    fn eval_array(&mut self, elements: &[Option<Expr>]) -> Flow<()> {
        let id = self.heap.alloc(HeapObject::new(ObjectKind::Array(Vec::with_capacity(
            elements.len(),
        ))));
        self.stack.push(Value::Object(id));
        for element in elements {
            let value = match element {
                Some(expr) => self.eval_pop(expr)?,
                None => Value::Undefined,
            };
            if let Some(ObjectKind::Array(items)) = self.heap.get_mut(id).map(|o| &mut o.kind) {
                items.push(value);
            }
        }
        Ok(())
    }

    fn eval_object(&mut self, props: &[(Rc<str>, Expr)]) -> Flow<()> {
        let id = self.heap.alloc(HeapObject::new(ObjectKind::Plain));
        self.stack.push(Value::Object(id));
        for (key, expr) in props {
            let value = self.eval_pop(expr)?;
            self.object_put(id, key, value)?;
        }
        Ok(())
    }

    fn eval_index(&mut self, object: &Expr, key: &Expr) -> Flow<()> {
        self.eval_expr(object)?;
        self.eval_expr(key)?;
        let key = self.pop_value();
        let target = self.pop_value();
        let key = self.to_property_key(&key);
        let value = self.get_property(&target, &key)?;
        self.stack.push(value);
        Ok(())
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr) -> Flow<()> {
        let result = match op {
            UnaryOp::TypeOf => {
                // `typeof undeclared` is not a ReferenceError
                let value = match operand {
                    Expr::Ident(name) => self.lookup_var(name).unwrap_or_default(),
                    _ => self.eval_pop(operand)?,
                };
                Value::string(self.type_of(&value))
            }
            UnaryOp::Delete => return self.eval_delete(operand),
            UnaryOp::Void => {
                self.eval_pop(operand)?;
                Value::Undefined
            }
            UnaryOp::Not => Value::Bool(!to_boolean(&self.eval_pop(operand)?)),
            UnaryOp::Neg => {
                let value = self.eval_pop(operand)?;
                Value::Number(-self.to_number_value(&value))
            }
            UnaryOp::Plus => {
                let value = self.eval_pop(operand)?;
                Value::Number(self.to_number_value(&value))
            }
            UnaryOp::BitNot => {
                let value = self.eval_pop(operand)?;
                Value::from(!to_int32(self.to_number_value(&value)))
            }
        };
        self.stack.push(result);
        Ok(())
    }

    fn eval_delete(&mut self, operand: &Expr) -> Flow<()> {
        let (target, key) = match operand {
            Expr::Member(object, name) => (self.eval_pop(object)?, Rc::clone(name)),
            Expr::Index(object, key) => {
                self.eval_expr(object)?;
                let key = self.eval_pop(key)?;
                let target = self.pop_value();
                let key = self.to_property_key(&key);
                (target, key)
            }
            // declared bindings cannot be deleted
            Expr::Ident(_) => {
                self.stack.push(Value::Bool(false));
                return Ok(());
            }
            other => {
                self.eval_pop(other)?;
                self.stack.push(Value::Bool(true));
                return Ok(());
            }
        };
        let deleted = match target {
            Value::Undefined | Value::Null => {
                let what = self.to_display_string(&target);
                return Err(self.throw_error(
                    ErrorKind::TypeError,
                    format!("cannot delete property '{key}' of {what}"),
                ));
            }
            Value::Object(id) => self.object_delete(id, &key),
            _ => true,
        };
        self.stack.push(Value::Bool(deleted));
        Ok(())
    }

    fn eval_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Flow<()> {
        self.eval_expr(left)?;
        self.eval_expr(right)?;
        let right = self.pop_value();
        let left = self.pop_value();
        let result = self.binary_op(op, &left, &right)?;
        self.stack.push(result);
        Ok(())
    }

    fn eval_logical(&mut self, op: LogicalOp, left: &Expr, right: &Expr) -> Flow<()> {
        self.eval_expr(left)?;
        let truthy = to_boolean(&self.top_value());
        let short_circuit = match op {
            LogicalOp::And => !truthy,
            LogicalOp::Or => truthy,
        };
        if short_circuit {
            return Ok(());
        }
        self.pop_value();
        self.eval_expr(right)
    }

    fn eval_sequence(&mut self, exprs: &[Expr]) -> Flow<()> {
        let Some((last, rest)) = exprs.split_last() else {
            self.stack.push(Value::Undefined);
            return Ok(());
        };
        for expr in rest {
            self.eval_pop(expr)?;
        }
        self.eval_expr(last)
    }

    /// Evaluate an assignment target, leaving its object (if any) on the stack
    fn eval_ref(&mut self, target: &Expr) -> Flow<Reference> {
        match target {
            Expr::Ident(name) => Ok(Reference::Var(Rc::clone(name))),
            Expr::Member(object, name) => {
                let slot = self.stack.len();
                self.eval_expr(object)?;
                Ok(Reference::Property {
                    object: slot,
                    key: Rc::clone(name),
                })
            }
            Expr::Index(object, key) => {
                let slot = self.stack.len();
                self.eval_expr(object)?;
                let key = self.eval_pop(key)?;
                Ok(Reference::Property {
                    object: slot,
                    key: self.to_property_key(&key),
                })
            }
            _ => Err(self.throw_error(ErrorKind::ReferenceError, "invalid assignment target")),
        }
    }

    fn get_ref(&mut self, reference: &Reference) -> Flow<Value> {
        match reference {
            Reference::Var(name) => match self.lookup_var(name) {
                Some(value) => Ok(value),
                None => Err(self.throw_error(ErrorKind::ReferenceError, format!("{name} is not defined"))),
            },
            Reference::Property { object, key } => {
                let target = self.stack.get_abs(*object).cloned().unwrap_or_default();
                self.get_property(&target, key)
            }
        }
    }

    fn put_ref(&mut self, reference: &Reference, value: Value) -> Flow<()> {
        match reference {
            Reference::Var(name) => {
                self.assign_var(name, value);
                Ok(())
            }
            Reference::Property { object, key } => {
                let target = self.stack.get_abs(*object).cloned().unwrap_or_default();
                self.put_property(&target, key, value)
            }
        }
    }

    fn assign_to(&mut self, target: &Expr, value: Value) -> Flow<()> {
        let base = self.stack.len();
        self.stack.push(value);
        let reference = self.eval_ref(target)?;
        let value = self.stack.get_abs(base).cloned().unwrap_or_default();
        self.put_ref(&reference, value)?;
        self.stack.truncate(base);
        Ok(())
    }

    fn eval_assign(&mut self, op: Option<BinaryOp>, target: &Expr, value: &Expr) -> Flow<()> {
        let base = self.stack.len();
        let reference = self.eval_ref(target)?;
        match op {
            None => self.eval_expr(value)?,
            Some(op) => {
                let current = self.get_ref(&reference)?;
                self.stack.push(current);
                self.eval_expr(value)?;
                let right = self.pop_value();
                let left = self.pop_value();
                let result = self.binary_op(op, &left, &right)?;
                self.stack.push(result);
            }
        }
        let result = self.top_value();
        self.put_ref(&reference, result.clone())?;
        self.stack.truncate(base);
        self.stack.push(result);
        Ok(())
    }

    fn eval_update(&mut self, increment: bool, prefix: bool, target: &Expr) -> Flow<()> {
        let base = self.stack.len();
        let reference = self.eval_ref(target)?;
        let old = self.get_ref(&reference)?;
        let old = self.to_number_value(&old);
        let new = if increment { old + 1.0 } else { old - 1.0 };
        self.put_ref(&reference, Value::Number(new))?;
        self.stack.truncate(base);
        self.stack.push(Value::Number(if prefix { new } else { old }));
        Ok(())
    }

    /// Push the callee and the receiver for a call expression
    fn eval_callee(&mut self, callee: &Expr) -> Flow<()> {
        let base = self.stack.len();
        match callee {
            Expr::Member(object, name) => {
                self.eval_expr(object)?;
                let target = self.top_value();
                let func = self.get_property(&target, name)?;
                self.stack.insert_abs(base, func);
            }
            Expr::Index(object, key) => {
                self.eval_expr(object)?;
                let key = self.eval_pop(key)?;
                let key = self.to_property_key(&key);
                let target = self.top_value();
                let func = self.get_property(&target, &key)?;
                self.stack.insert_abs(base, func);
            }
            _ => {
                self.eval_expr(callee)?;
                self.stack.push(Value::Undefined);
            }
        }
        Ok(())
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Flow<()> {
        let base = self.stack.len();
        self.eval_callee(callee)?;
        for arg in args {
            self.eval_expr(arg)?;
        }
        let func = self.stack.get_abs(base).cloned().unwrap_or_default();
        if !self.is_callable_value(&func) {
            self.stack.truncate(base);
            let name = describe_callee(callee);
            return Err(self.throw_error(ErrorKind::TypeError, format!("{name} is not a function")));
        }
        self.invoke(args.len(), false)
    }

    fn eval_new(&mut self, callee: &Expr, args: &[Expr]) -> Flow<()> {
        let base = self.stack.len();
        self.eval_expr(callee)?;
        self.stack.push(Value::Undefined);
        for arg in args {
            self.eval_expr(arg)?;
        }
        let func = self.stack.get_abs(base).cloned().unwrap_or_default();
        if !self.is_constructor_value(&func) {
            self.stack.truncate(base);
            let name = describe_callee(callee);
            return Err(self.throw_error(ErrorKind::TypeError, format!("{name} is not a constructor")));
        }
        self.invoke(args.len(), true)
    }
}
