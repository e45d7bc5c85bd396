//! JavaScript function types
//!
//! This module implements the different callable kinds:
//! - Closures (script functions with their captured scope)
//! - Host functions (Rust closures called through the stack API)
//! - Methods (trampolines into a method suite held by a host proxy)

use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::Result;
use crate::gc::ObjectId;
use crate::parser::ast::FunctionDef;

/// Host function signature
///
/// The function reads its arguments from the current frame of the value
/// stack (index 0 is the first argument) and returns how many result values
/// it pushed. Zero means the call evaluates to `undefined`; otherwise the
/// value on top of the frame is the result.
pub type HostFunction = Rc<dyn Fn(&mut Context) -> Result<usize>>;

/// Argument count policy for a host function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nargs {
    /// The frame is padded with `undefined` or truncated to exactly this many
    Fixed(usize),
    /// The frame holds every argument the caller passed
    Variadic,
}

/// A callable heap object
#[derive(Clone)]
pub enum Function {
    /// Script function
    Closure {
        def: Rc<FunctionDef>,
        /// Scope the function was created in, `None` for global code
        scope: Option<ObjectId>,
    },
    /// Native function
    Host {
        name: Rc<str>,
        func: HostFunction,
        nargs: Nargs,
    },
    /// Named entry of the method suite stored in `suite`
    ///
    /// `suite` is the host proxy holding the suite, so the trampoline keeps
    /// the suite alive for as long as the method itself is reachable.
    Method { suite: ObjectId, name: Rc<str> },
}

impl Function {
    /// Function name, empty for anonymous closures
    pub fn name(&self) -> &str {
        match self {
            Function::Closure { def, .. } => def.name.as_deref().unwrap_or(""),
            Function::Host { name, .. } | Function::Method { name, .. } => name,
        }
    }

    /// Declared parameter count, as reported by `length`
    pub fn length(&self) -> usize {
        match self {
            Function::Closure { def, .. } => def.params.len(),
            Function::Host { nargs, .. } => match nargs {
                Nargs::Fixed(n) => *n,
                Nargs::Variadic => 0,
            },
            Function::Method { .. } => 0,
        }
    }

    #[inline]
    pub fn is_closure(&self) -> bool {
        matches!(self, Function::Closure { .. })
    }

    /// Visit the heap objects this function keeps alive
    pub fn trace(&self, visit: &mut dyn FnMut(ObjectId)) {
        match self {
            Function::Closure { scope, .. } => {
                if let Some(scope) = scope {
                    visit(*scope);
                }
            }
            Function::Host { .. } => {}
            Function::Method { suite, .. } => visit(*suite),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Closure { def, scope } => f
                .debug_struct("Closure")
                .field("name", &def.name)
                .field("params", &def.params)
                .field("scope", scope)
                .finish(),
            Function::Host { name, nargs, .. } => f
                .debug_struct("Host")
                .field("name", name)
                .field("nargs", nargs)
                .finish(),
            Function::Method { suite, name } => f
                .debug_struct("Method")
                .field("suite", suite)
                .field("name", name)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_function_metadata() {
        let func: HostFunction = Rc::new(|_ctx| Ok(0));
        let f = Function::Host {
            name: Rc::from("print"),
            func,
            nargs: Nargs::Fixed(2),
        };

        assert_eq!(f.name(), "print");
        assert_eq!(f.length(), 2);
        assert!(!f.is_closure());
        assert!(format!("{f:?}").contains("print"));
    }

    #[test]
    fn test_variadic_length() {
        let f = Function::Host {
            name: Rc::from("log"),
            func: Rc::new(|_ctx| Ok(0)),
            nargs: Nargs::Variadic,
        };
        assert_eq!(f.length(), 0);
    }
}
