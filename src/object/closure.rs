//! Runtime pairing of a `Function` with the upvalues captured at the instant of
//! its creation (§3, §4.2).

use std::cell::RefCell;
use std::rc::Rc;

use crate::object::{ObjFunction, Upvalue};

#[derive(Debug)]
pub struct ObjClosure {
    pub function: Rc<ObjFunction>,
    pub upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl ObjClosure {
    pub fn new(function: Rc<ObjFunction>, upvalues: Vec<Rc<RefCell<Upvalue>>>) -> Self {
        Self { function, upvalues }
    }
}
