//! jsbridge - an embeddable JavaScript engine with a Duktape-style stack API
//!
//! The engine is driven entirely through a value stack addressed by signed
//! indices, and it lets host values cross into scripts safely:
//!
//! - host values are registered in a per-context [`HostRegistry`] and seen by
//!   scripts as opaque proxies
//! - a [`MethodSuite`] exposes a set of host functions as one script object
//! - the collector releases the registry entry of every proxy it frees, so
//!   host-side tracking is reclaimed once scripts let go of a value
//!
//! # Features
//! - ES5-flavoured subset: closures, objects, arrays, exceptions
//! - Non-moving mark-sweep collector that runs only when asked
//! - Script finalizers with a two-pass reclamation bound
//!
//! # Example
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use jsbridge::{Context, MethodSuite};
//!
//! let counter = Rc::new(Cell::new(0));
//! let state = Rc::clone(&counter);
//! let suite = MethodSuite::new().method("inc", move |ctx| {
//!     state.set(state.get() + 1);
//!     ctx.push_int(state.get());
//!     Ok(1)
//! });
//!
//! let mut ctx = Context::new();
//! ctx.eval_with("(function (o) { o.inc(); return o.inc(); })", suite).unwrap();
//! assert_eq!(ctx.get_int(-1).unwrap(), 2);
//!
//! ctx.pop().unwrap();
//! ctx.gc();
//! assert!(ctx.registry().is_empty());
//! ```

// Core modules
pub mod config;
pub mod context;
pub mod error;
pub mod registry;
pub mod suite;
pub mod value;

// Garbage collector
pub mod gc;

// Parser
pub mod parser;

// Object model
pub mod runtime;

// Stack API
mod api;

// Evaluator
mod vm;

// Utilities
mod util;

// Re-export main types
pub use config::ContextConfig;
pub use context::Context;
pub use error::{Error, ErrorKind, Result, ScriptError};
pub use gc::GcStats;
pub use registry::{Handle, HostRegistry};
pub use runtime::{HostFunction, Nargs};
pub use suite::MethodSuite;
pub use value::{Type, Value};
