//! JavaScript execution context
//!
//! The Context is the main entry point for the engine. It owns the heap, the
//! value stack, the global object and the host object registry, and provides
//! the evaluation entry points. The stack API lives in `api/`.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::config::ContextConfig;
use crate::error::{Error, ErrorKind, Result, ScriptError};
use crate::gc::{GcStats, Heap, ObjectId};
use crate::parser::parse_program;
use crate::registry::HostRegistry;
use crate::runtime::{Function, HeapObject, HostFunction, Nargs, ObjectKind};
use crate::suite::MethodSuite;
use crate::value::Value;
use crate::vm::ValueStack;

/// JavaScript execution context
///
/// One engine instance. Everything allocated by scripts, and every host
/// value handed to them, belongs to exactly one Context and is released when
/// it is destroyed.
pub struct Context {
    pub(crate) heap: Heap,
    pub(crate) stack: ValueStack,
    pub(crate) registry: HostRegistry,
    pub(crate) global: ObjectId,
    /// Scope chain heads of the active script calls, `None` for global code
    pub(crate) scopes: Vec<Option<ObjectId>>,
    /// Absolute stack slots holding `this` of the active host calls
    pub(crate) host_frames: Vec<usize>,
    /// Pending exception
    pub(crate) thrown: Option<Value>,
    /// Rescued objects whose finalizer has not been called yet
    pub(crate) finalize_queue: Vec<ObjectId>,
    /// Slot receiving expression statement values of the running program
    pub(crate) completion_slot: Option<usize>,
    pub(crate) call_depth: usize,
    /// Native recursion depth of the evaluator
    pub(crate) nesting: usize,
    pub(crate) config: ContextConfig,
}

impl Context {
    /// Create a context with the default configuration
    pub fn new() -> Self {
        Self::with_config(ContextConfig::default())
    }

    /// Create a context with custom limits
    pub fn with_config(config: ContextConfig) -> Self {
        let mut heap = Heap::new();
        let global = heap.alloc(HeapObject::new(ObjectKind::Plain));
        let mut ctx = Context {
            heap,
            stack: ValueStack::new(config.stack_capacity),
            registry: HostRegistry::new(),
            global,
            scopes: Vec::new(),
            host_frames: Vec::new(),
            thrown: None,
            finalize_queue: Vec::new(),
            completion_slot: None,
            call_depth: 0,
            nesting: 0,
            config,
        };
        ctx.install_globals();
        debug!(
            stack_capacity = ctx.config.stack_capacity,
            max_call_depth = ctx.config.max_call_depth,
            "context created"
        );
        ctx
    }

    fn install_globals(&mut self) {
        let mut globals = vec![
            ("undefined", Value::Undefined),
            ("NaN", Value::Number(f64::NAN)),
            ("Infinity", Value::Number(f64::INFINITY)),
        ];
        for kind in ErrorKind::ALL {
            let constructor = self.alloc_host_function(kind.name(), error_constructor(kind), Nargs::Fixed(1));
            globals.push((kind.name(), Value::Object(constructor)));
        }
        if let Some(global) = self.heap.get_mut(self.global) {
            for (name, value) in globals {
                global.properties.set(name, value);
            }
        }
    }

    pub(crate) fn alloc_host_function(&mut self, name: &str, func: HostFunction, nargs: Nargs) -> ObjectId {
        self.heap.alloc(HeapObject::new(ObjectKind::Function(Function::Host {
            name: Rc::from(name),
            func,
            nargs,
        })))
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    /// Evaluate source code as global code
    ///
    /// On success the completion value is pushed. On failure nothing is
    /// pushed and the context stays usable.
    pub fn eval_string(&mut self, source: &str) -> Result<()> {
        let program = parse_program(source).map_err(ScriptError::from)?;
        self.run_program(&program).map_err(|_| self.take_error())
    }

    /// Evaluate source code, pushing the thrown value on failure
    pub fn peval_string(&mut self, source: &str) -> Result<()> {
        let result = match parse_program(source) {
            Ok(program) => self.run_program(&program).map_err(|_| self.take_thrown()),
            Err(err) => {
                let err = ScriptError::from(err);
                let id = self.new_error_object(ErrorKind::SyntaxError, &err.name, &err.message);
                Err(Value::Object(id))
            }
        };
        result.map_err(|exception| {
            let err = self.script_error_from_value(&exception);
            self.stack.push(exception);
            Error::Script(err)
        })
    }

    /// Evaluate `source` to a function and call it with a proxy exposing
    /// `suite` as its only argument
    ///
    /// The call's result is pushed. Script functions must declare exactly
    /// one parameter.
    pub fn eval_with(&mut self, source: &str, suite: MethodSuite) -> Result<()> {
        self.eval_string(source)?;
        let expected = "function of one parameter";
        let callee = self.stack.peek().cloned().unwrap_or_default();
        let function = callee
            .as_object()
            .and_then(|id| self.heap.get(id))
            .and_then(|o| o.as_function());
        let mismatch = match function {
            None => Some(self.type_of(&callee).to_string()),
            Some(Function::Closure { def, .. }) if def.params.len() != 1 => {
                Some(format!("function of {} parameters", def.params.len()))
            }
            Some(_) => None,
        };
        if let Some(found) = mismatch {
            self.stack.pop();
            return Err(Error::type_mismatch(expected, found));
        }
        self.push_method_suite(suite);
        self.call(1)
    }

    /// Convert the pending exception into a host error
    pub(crate) fn take_error(&mut self) -> Error {
        let exception = self.take_thrown();
        Error::Script(self.script_error_from_value(&exception))
    }

    fn roots(&self) -> Vec<ObjectId> {
        let mut roots: Vec<ObjectId> = self.stack.values().iter().filter_map(Value::as_object).collect();
        roots.extend(self.scopes.iter().flatten().copied());
        roots.extend(self.finalize_queue.iter().copied());
        roots.extend(self.thrown.as_ref().and_then(Value::as_object));
        roots.push(self.global);
        roots
    }

    /// Run one collector pass
    ///
    /// Host proxies that became unreachable release their registry entry in
    /// this pass. Objects with a finalizer get it called once and are freed
    /// by a later pass, so two passes reclaim everything unreachable.
    pub fn gc(&mut self) -> GcStats {
        let roots = self.roots();
        let sweep = self.heap.collect(roots);

        let mut stats = GcStats {
            freed: sweep.freed,
            ..GcStats::default()
        };
        for handle in sweep.released {
            match self.registry.release(handle) {
                Ok(_) => stats.handles_released += 1,
                Err(_) => warn!(%handle, "swept host proxy has no registry entry"),
            }
        }
        self.finalize_queue.extend(sweep.to_finalize);
        stats.finalizers_run = self.run_finalizers();
        stats.live_objects = self.heap.len();

        debug!(
            freed = stats.freed,
            live = stats.live_objects,
            finalizers = stats.finalizers_run,
            released = stats.handles_released,
            "gc pass complete"
        );
        stats
    }

    /// Call queued finalizers
    ///
    /// At the call depth limit the queue is left as is; queued objects stay
    /// rooted and the next pass with room to call runs them.
    fn run_finalizers(&mut self) -> usize {
        if !self.finalize_queue.is_empty() && !self.can_call() {
            debug!(queued = self.finalize_queue.len(), "finalizers deferred at call depth limit");
            return 0;
        }
        let mut count = 0;
        while let Some(id) = self.finalize_queue.pop() {
            let Some(finalizer) = self.heap.get(id).and_then(|o| o.finalizer) else {
                continue;
            };
            self.stack.push(Value::Object(finalizer));
            self.stack.push(Value::Undefined);
            self.stack.push(Value::Object(id));
            match self.invoke(1, false) {
                Ok(()) => {
                    self.stack.pop();
                }
                Err(_) => {
                    let err = self.take_error();
                    warn!(object = %id, error = %err, "finalizer threw");
                }
            }
            count += 1;
        }
        count
    }

    /// Number of live heap objects, including the global object
    pub fn object_count(&self) -> usize {
        self.heap.len()
    }

    /// Host values currently handed to scripts
    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    /// Tear down the context
    ///
    /// Frees the heap and drops every registry entry. Script finalizers do
    /// not run.
    pub fn destroy(self) {
        drop(self);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.stack.clear();
        self.finalize_queue.clear();
        let released = self.registry.clear();
        debug!(objects = self.heap.len(), released, "context destroyed");
    }
}

/// `Error`, `TypeError` and friends; callable with or without `new`
fn error_constructor(kind: ErrorKind) -> HostFunction {
    Rc::new(move |ctx: &mut Context| {
        let message = if ctx.is_undefined(0) {
            String::new()
        } else {
            ctx.to_string(0)?
        };
        ctx.push_error_object(kind, &message);
        Ok(1)
    })
}
