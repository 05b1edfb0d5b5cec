//! Native (built-in) functions (§4.7). A native is a plain function pointer: list
//! mutation natives (`append`, `delete`) work directly on the `Rc<RefCell<ObjList>>`
//! reachable through their argument, and `readFile` needs the string interner to
//! hand back a canonical `ObjString` for the bytes it reads, so every native gets
//! a `&mut StringInterner` alongside its arguments.

use std::rc::Rc;

use crate::object::{ObjString, StringInterner};
use crate::value::Value;

/// `-1` as the arity means variadic (waives the argument-count check), matching
/// the contract in §4.7.
pub type NativeFn = fn(args: &[Value], interner: &mut StringInterner) -> Result<Value, String>;

#[derive(Debug)]
pub struct ObjNative {
    pub name: Rc<ObjString>,
    pub arity: i32,
    pub function: NativeFn,
}

impl ObjNative {
    pub fn new(name: Rc<ObjString>, arity: i32, function: NativeFn) -> Self {
        Self {
            name,
            arity,
            function,
        }
    }
}
