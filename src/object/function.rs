//! Compiled function bodies (§3). Populated once by the compiler as it finishes
//! a function scope, then read-only for the rest of the program's life.

use std::fmt;
use std::rc::Rc;

use crate::chunk::Chunk;
use crate::object::ObjString;

#[derive(Debug)]
pub struct ObjFunction {
    pub arity: u8,
    pub upvalue_count: u8,
    pub chunk: Chunk,
    pub name: Option<Rc<ObjString>>,
}

impl ObjFunction {
    pub fn new(name: Option<Rc<ObjString>>, arity: u8, upvalue_count: u8, chunk: Chunk) -> Self {
        Self {
            arity,
            upvalue_count,
            chunk,
            name,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_ref().map(|n| n.as_str()).unwrap_or("script")
    }
}

impl fmt::Display for ObjFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name.as_str()),
            None => write!(f, "<script>"),
        }
    }
}
