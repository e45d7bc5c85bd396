//! Calling functions from the host
//!
//! Plain calls report a script exception as `Err(Error::Script)` and leave
//! nothing on the stack. Protected calls (`pcall*`) push the thrown value in
//! place of the result before returning the error, mirroring Duktape's
//! `duk_pcall` convention. Either way the call group is consumed.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::Value;

impl Context {
    /// Call the function below `nargs` arguments with `this` undefined
    ///
    /// Stack: `[... func arg1 .. argN]` becomes `[... result]`.
    pub fn call(&mut self, nargs: usize) -> Result<()> {
        self.require_values(nargs + 1)?;
        let this_slot = self.stack.len() - nargs;
        self.stack.insert_abs(this_slot, Value::Undefined);
        self.invoke(nargs, false).map_err(|_| self.take_error())
    }

    /// Protected form of [`call`](Self::call)
    pub fn pcall(&mut self, nargs: usize) -> Result<()> {
        self.require_values(nargs + 1)?;
        let this_slot = self.stack.len() - nargs;
        self.stack.insert_abs(this_slot, Value::Undefined);
        self.protected_invoke(nargs)
    }

    /// Call with an explicit `this`
    ///
    /// Stack: `[... func this arg1 .. argN]` becomes `[... result]`.
    pub fn call_method(&mut self, nargs: usize) -> Result<()> {
        self.require_values(nargs + 2)?;
        self.invoke(nargs, false).map_err(|_| self.take_error())
    }

    /// Protected form of [`call_method`](Self::call_method)
    pub fn pcall_method(&mut self, nargs: usize) -> Result<()> {
        self.require_values(nargs + 2)?;
        self.protected_invoke(nargs)
    }

    /// Call `target[key]` with the object at `index` as `this`
    ///
    /// Stack: `[... arg1 .. argN]` becomes `[... result]`.
    pub fn call_prop(&mut self, index: i32, key: &str, nargs: usize) -> Result<()> {
        self.prepare_prop_call(index, key, nargs)?;
        self.invoke(nargs, false).map_err(|_| self.take_error())
    }

    /// Protected form of [`call_prop`](Self::call_prop)
    pub fn pcall_prop(&mut self, index: i32, key: &str, nargs: usize) -> Result<()> {
        self.prepare_prop_call(index, key, nargs)?;
        self.protected_invoke(nargs)
    }

    fn prepare_prop_call(&mut self, index: i32, key: &str, nargs: usize) -> Result<()> {
        self.require_values(nargs)?;
        let target = self.value_at(index)?.clone();
        if target.is_nullish() {
            return Err(Error::NotObject(index));
        }
        let func = self.get_property(&target, key).map_err(|_| self.take_error())?;
        let args_start = self.stack.len() - nargs;
        self.stack.insert_abs(args_start, target);
        self.stack.insert_abs(args_start, func);
        Ok(())
    }

    fn protected_invoke(&mut self, nargs: usize) -> Result<()> {
        if self.invoke(nargs, false).is_ok() {
            return Ok(());
        }
        let exception = self.take_thrown();
        let err = self.script_error_from_value(&exception);
        self.stack.push(exception);
        Err(Error::Script(err))
    }
}
