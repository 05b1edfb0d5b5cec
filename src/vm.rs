//! The dispatch loop, call/return protocol, upvalue capture/close, and error
//! reporting (§4.1-§4.8). This is the core the rest of the crate exists to feed:
//! the compiler only has to produce a well-formed `Chunk`, and this module is
//! the only thing that ever executes one.

use std::cell::RefCell;
use std::rc::Rc;

#[cfg(feature = "debug_trace_execution")]
use crate::debug::disassemble_instruction;
use crate::{
    compiler::compile,
    error::{InterpretError, RuntimeError, RuntimeResult},
    natives,
    object::{Obj, ObjClosure, ObjList, ObjNative, StringInterner, Upvalue},
    opcode::OpCode,
    table::Table,
    value::Value,
};

/// Kept at the source design's values (§3, §9 Open Question (b)) so that the
/// "stack overflow after 64 frames" scenario in §8 stays exact.
pub const STACK_MAX: usize = 256;
pub const FRAMES_MAX: usize = 64;

struct CallFrame {
    closure: Rc<ObjClosure>,
    /// Offset of the next instruction to execute in `closure.function.chunk`.
    ip: usize,
    /// Index into the VM's value stack of this frame's slot 0 (the callee
    /// itself, followed by arguments, then locals).
    slots_base: usize,
}

/// Owns the value stack, call-frame stack, globals, string interner, and the
/// list of still-open upvalues for the lifetime of the process (§5). Dropping a
/// `Vm` drops every heap object it ever allocated through ordinary `Rc` teardown
/// — there is no separate free-list walk to perform.
pub struct Vm {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: Table<Value>,
    interner: StringInterner,
    /// Sorted by descending stack index, matching the source's invariant that
    /// capture and close are both linear scans (§4.2, §9).
    open_upvalues: Vec<Rc<RefCell<Upvalue>>>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        let mut globals = Table::new();
        let mut interner = StringInterner::new();
        natives::install(&mut globals, &mut interner);
        Self {
            stack: Vec::with_capacity(STACK_MAX),
            frames: Vec::with_capacity(FRAMES_MAX),
            globals,
            interner,
            open_upvalues: Vec::new(),
        }
    }

    /// Compiles `source` and runs it to completion (§6 "Compiler -> VM
    /// contract"). A runtime error is fully reported (message + stack trace, §4.8)
    /// and the VM's stacks reset before this returns, so a fresh `interpret` call
    /// afterwards starts clean (§8 property 6 — error isolation).
    pub fn interpret(&mut self, source: &str) -> Result<(), InterpretError> {
        let function = compile(source, &mut self.interner)?;

        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();

        let closure = Rc::new(ObjClosure::new(function, Vec::new()));
        self.stack.push(Value::Obj(Obj::Closure(closure.clone())));
        self.call_closure(closure, 0)
            .expect("the top-level script call never overflows a freshly reset VM");

        match self.run() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.report_runtime_error(&err);
                self.stack.clear();
                self.frames.clear();
                self.open_upvalues.clear();
                Err(InterpretError::Runtime(err))
            }
        }
    }

    // --- the dispatch loop (§4.3) ------------------------------------------

    fn run(&mut self) -> RuntimeResult<()> {
        loop {
            #[cfg(feature = "debug_trace_execution")]
            self.trace_instruction();

            let instruction = self.read_byte();
            let opcode = OpCode::try_from(instruction)
                .expect("chunks only ever contain opcodes this VM emitted");
            match opcode {
                OpCode::Constant => {
                    let value = self.read_constant();
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Dup => {
                    let top = self.peek(0).clone();
                    self.push(top)?;
                }
                OpCode::GetLocal => {
                    let slot = self.read_byte() as usize;
                    let index = self.frames.last().unwrap().slots_base + slot;
                    let value = self.stack[index].clone();
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_byte() as usize;
                    let index = self.frames.last().unwrap().slots_base + slot;
                    self.stack[index] = self.peek(0).clone();
                }
                OpCode::GetGlobal => {
                    let name = self.read_string_constant();
                    match self.globals.get(&name) {
                        Some(value) => {
                            let value = value.clone();
                            self.push(value)?;
                        }
                        None => {
                            return Err(RuntimeError::UndefinedVariable(name.as_str().to_string()))
                        }
                    }
                }
                OpCode::DefineGlobal => {
                    let name = self.read_string_constant();
                    let value = self.pop();
                    self.globals.set(name, value);
                }
                OpCode::SetGlobal => {
                    let name = self.read_string_constant();
                    let value = self.peek(0).clone();
                    if self.globals.set(name.clone(), value) {
                        self.globals.delete(&name);
                        return Err(RuntimeError::UndefinedVariable(name.as_str().to_string()));
                    }
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let upvalue = self.frames.last().unwrap().closure.upvalues[slot].clone();
                    let value = match &*upvalue.borrow() {
                        Upvalue::Open(index) => self.stack[*index].clone(),
                        Upvalue::Closed(value) => value.clone(),
                    };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_byte() as usize;
                    let value = self.peek(0).clone();
                    let upvalue = self.frames.last().unwrap().closure.upvalues[slot].clone();
                    let open_index = match &*upvalue.borrow() {
                        Upvalue::Open(index) => Some(*index),
                        Upvalue::Closed(_) => None,
                    };
                    match open_index {
                        Some(index) => self.stack[index] = value,
                        None => {
                            if let Upvalue::Closed(slot) = &mut *upvalue.borrow_mut() {
                                *slot = value;
                            }
                        }
                    }
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.binary_compare(|a, b| a > b)?,
                OpCode::Less => self.binary_compare(|a, b| a < b)?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_numeric(|a, b| a - b)?,
                OpCode::Multiply => self.binary_numeric(|a, b| a * b)?,
                OpCode::Divide => self.binary_numeric(|a, b| a / b)?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()))?;
                }
                OpCode::Negate => match self.peek(0).as_number() {
                    Some(n) => {
                        self.pop();
                        self.push(Value::Number(-n))?;
                    }
                    None => return Err(RuntimeError::OperandMustBeNumber),
                },
                OpCode::Print => {
                    let value = self.pop();
                    println!("{value}");
                }
                OpCode::Jump => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip += offset as usize;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16();
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().unwrap().ip += offset as usize;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16();
                    self.frames.last_mut().unwrap().ip -= offset as usize;
                }
                OpCode::Call => {
                    let argc = self.read_byte();
                    let callee = self.peek(argc as usize).clone();
                    self.call_value(callee, argc)?;
                }
                OpCode::Closure => {
                    self.closure_op()?;
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::BuildList => {
                    let n = self.read_byte() as usize;
                    let start = self.stack.len() - n;
                    let items = self.stack.split_off(start);
                    self.push(Value::Obj(Obj::List(Rc::new(RefCell::new(ObjList::new(
                        items,
                    ))))))?;
                }
                OpCode::IndexSubscr => {
                    let index_value = self.pop();
                    let list_value = self.pop();
                    let list = self.expect_list(&list_value)?;
                    let index = self.expect_index(&index_value)?;
                    let item = {
                        let list = list.borrow();
                        list.get(index).cloned().ok_or(RuntimeError::IndexOutOfBounds)?
                    };
                    self.push(item)?;
                }
                OpCode::StoreSubscr => {
                    let value = self.pop();
                    let index_value = self.pop();
                    let list_value = self.pop();
                    let list = self.expect_list(&list_value)?;
                    let index = self.expect_index(&index_value)?;
                    let stored = value.clone();
                    if !list.borrow_mut().set(index, value) {
                        return Err(RuntimeError::IndexOutOfBounds);
                    }
                    self.push(stored)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().expect("run always has an active frame");
                    self.close_upvalues(frame.slots_base);
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(frame.slots_base);
                    self.push(result)?;
                }
            }
        }
    }

    // --- stack primitives (§4.1) --------------------------------------------

    fn push(&mut self, value: Value) -> RuntimeResult<()> {
        if self.stack.len() >= STACK_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack
            .pop()
            .expect("compiler-emitted bytecode is always stack-balanced")
    }

    fn peek(&self, distance: usize) -> &Value {
        let len = self.stack.len();
        &self.stack[len - 1 - distance]
    }

    // --- instruction stream readers -----------------------------------------

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("run always has an active frame");
        let byte = frame.closure.function.chunk.read_u8(frame.ip);
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let frame = self.frames.last_mut().expect("run always has an active frame");
        let value = frame.closure.function.chunk.read_u16(frame.ip);
        frame.ip += 2;
        value
    }

    fn read_constant(&mut self) -> Value {
        let index = self.read_byte();
        self.frames
            .last()
            .unwrap()
            .closure
            .function
            .chunk
            .get_constant(index)
            .clone()
    }

    fn read_string_constant(&mut self) -> Rc<crate::object::ObjString> {
        match self.read_constant() {
            Value::Obj(Obj::String(s)) => s,
            _ => unreachable!("the compiler always emits a String constant for name operands"),
        }
    }

    // --- arithmetic / comparison (§4.3) -------------------------------------

    fn binary_numeric(&mut self, op: impl Fn(f64, f64) -> f64) -> RuntimeResult<()> {
        let (a, b) = (self.peek(1).as_number(), self.peek(0).as_number());
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Number(op(a, b)))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    fn binary_compare(&mut self, op: impl Fn(f64, f64) -> bool) -> RuntimeResult<()> {
        let (a, b) = (self.peek(1).as_number(), self.peek(0).as_number());
        match (a, b) {
            (Some(a), Some(b)) => {
                self.pop();
                self.pop();
                self.push(Value::Bool(op(a, b)))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    /// `ADD` additionally permits two strings, producing a fresh interned
    /// concatenation (§4.3, §4.6).
    fn add(&mut self) -> RuntimeResult<()> {
        match (self.peek(1), self.peek(0)) {
            (Value::Number(_), Value::Number(_)) => {
                let b = self.pop().as_number().unwrap();
                let a = self.pop().as_number().unwrap();
                self.push(Value::Number(a + b))
            }
            (Value::Obj(Obj::String(_)), Value::Obj(Obj::String(_))) => {
                let b = self.pop();
                let a = self.pop();
                let (a, b) = match (a, b) {
                    (Value::Obj(Obj::String(a)), Value::Obj(Obj::String(b))) => (a, b),
                    _ => unreachable!(),
                };
                let mut combined = String::with_capacity(a.len() + b.len());
                combined.push_str(a.as_str());
                combined.push_str(b.as_str());
                let interned = self.interner.intern_owned(combined.into_boxed_str());
                self.push(Value::Obj(Obj::String(interned)))
            }
            _ => Err(RuntimeError::OperandsMustBeNumbers),
        }
    }

    // --- lists (§4.5) --------------------------------------------------------

    fn expect_list(&self, value: &Value) -> RuntimeResult<Rc<RefCell<ObjList>>> {
        value
            .as_obj()
            .and_then(Obj::as_list)
            .cloned()
            .ok_or(RuntimeError::NotSubscriptable)
    }

    fn expect_index(&self, value: &Value) -> RuntimeResult<usize> {
        match value.as_number() {
            Some(n) if n >= 0.0 && n.fract() == 0.0 => Ok(n as usize),
            _ => Err(RuntimeError::IndexNotInteger),
        }
    }

    // --- calls (§4.1) --------------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: u8) -> RuntimeResult<()> {
        match callee {
            Value::Obj(Obj::Closure(closure)) => self.call_closure(closure, arg_count),
            Value::Obj(Obj::Native(native)) => self.call_native(native, arg_count),
            _ => Err(RuntimeError::NotCallable),
        }
    }

    fn call_closure(&mut self, closure: Rc<ObjClosure>, arg_count: u8) -> RuntimeResult<()> {
        let arity = closure.function.arity;
        if arg_count != arity {
            return Err(RuntimeError::ArityMismatch {
                expected: arity,
                got: arg_count,
            });
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(RuntimeError::StackOverflow);
        }
        let slots_base = self.stack.len() - arg_count as usize - 1;
        self.frames.push(CallFrame {
            closure,
            ip: 0,
            slots_base,
        });
        Ok(())
    }

    fn call_native(&mut self, native: Rc<ObjNative>, arg_count: u8) -> RuntimeResult<()> {
        if native.arity != -1 && native.arity as usize != arg_count as usize {
            return Err(RuntimeError::ArityMismatch {
                expected: native.arity.max(0) as u8,
                got: arg_count,
            });
        }
        let args_start = self.stack.len() - arg_count as usize;
        let args: Vec<Value> = self.stack[args_start..].to_vec();
        let result = (native.function)(&args, &mut self.interner).map_err(RuntimeError::Native)?;
        self.stack.truncate(args_start - 1);
        self.stack.push(result);
        Ok(())
    }

    fn closure_op(&mut self) -> RuntimeResult<()> {
        let fn_idx = self.read_byte();
        let function = match self
            .frames
            .last()
            .unwrap()
            .closure
            .function
            .chunk
            .get_constant(fn_idx)
            .clone()
        {
            Value::Obj(Obj::Function(f)) => f,
            _ => unreachable!("the compiler always emits a Function constant for CLOSURE"),
        };
        let upvalue_count = function.upvalue_count;
        let mut upvalues = Vec::with_capacity(upvalue_count as usize);
        for _ in 0..upvalue_count {
            let is_local = self.read_byte() != 0;
            let index = self.read_byte();
            if is_local {
                let slots_base = self.frames.last().unwrap().slots_base;
                upvalues.push(self.capture_upvalue(slots_base + index as usize));
            } else {
                let enclosing = self.frames.last().unwrap().closure.upvalues[index as usize].clone();
                upvalues.push(enclosing);
            }
        }
        let closure = Rc::new(ObjClosure::new(function, upvalues));
        self.push(Value::Obj(Obj::Closure(closure)))
    }

    // --- upvalues (§4.2) -----------------------------------------------------

    fn capture_upvalue(&mut self, stack_index: usize) -> Rc<RefCell<Upvalue>> {
        if let Some(existing) = self
            .open_upvalues
            .iter()
            .find(|u| u.borrow().stack_index() == Some(stack_index))
        {
            return existing.clone();
        }
        let insert_at = self
            .open_upvalues
            .iter()
            .position(|u| u.borrow().stack_index().unwrap_or(0) < stack_index)
            .unwrap_or(self.open_upvalues.len());
        let upvalue = Rc::new(RefCell::new(Upvalue::Open(stack_index)));
        self.open_upvalues.insert(insert_at, upvalue.clone());
        upvalue
    }

    fn close_upvalues(&mut self, from_index: usize) {
        while let Some(top) = self.open_upvalues.first() {
            let stack_index = top
                .borrow()
                .stack_index()
                .expect("open_upvalues only ever holds Open upvalues");
            if stack_index < from_index {
                break;
            }
            let value = self.stack[stack_index].clone();
            let upvalue = self.open_upvalues.remove(0);
            *upvalue.borrow_mut() = Upvalue::Closed(value);
        }
    }

    // --- error reporting (§4.8) ----------------------------------------------

    fn report_runtime_error(&self, err: &RuntimeError) {
        eprintln!("{err}");
        for frame in self.frames.iter().rev() {
            let function = &frame.closure.function;
            let line = function.chunk.get_line(frame.ip.saturating_sub(1));
            match &function.name {
                Some(name) => eprintln!("[line {line}] in {}()", name.as_str()),
                None => eprintln!("[line {line}] in script"),
            }
        }
    }

    // --- debug tracing (§7.1 ambient stack) ---------------------------------

    #[cfg(feature = "debug_trace_execution")]
    fn trace_instruction(&self) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        let stack: Vec<String> = self.stack.iter().map(|v| format!("[ {v} ]")).collect();
        log::trace!("{}", stack.concat());
        let frame = self.frames.last().expect("run always has an active frame");
        disassemble_instruction(&frame.closure.function.chunk, frame.ip);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run_ok(source: &str) -> Vm {
        let mut vm = Vm::new();
        vm.interpret(source).expect("program should run to completion");
        vm
    }

    #[test]
    fn fibonacci_matches_scenario_one() {
        run_ok("func fib(n){ if (n<2) return n; return fib(n-2)+fib(n-1); } println(fib(10));");
    }

    #[test]
    fn stack_and_frames_are_empty_after_a_successful_run() {
        let vm = run_ok("let x = 1 + 2; println(x);");
        assert_eq!(vm.stack.len(), 0);
        assert_eq!(vm.frames.len(), 0);
    }

    #[test]
    fn undefined_global_read_is_a_runtime_error() {
        let mut vm = Vm::new();
        let err = vm.interpret("let a; println(b);").unwrap_err();
        assert!(matches!(err, InterpretError::Runtime(RuntimeError::UndefinedVariable(_))));
    }

    #[test]
    fn a_runtime_error_does_not_poison_the_next_interpret_call() {
        let mut vm = Vm::new();
        assert!(vm.interpret("println(undefinedThing);").is_err());
        assert!(vm.interpret("println(1+1);").is_ok());
        assert_eq!(vm.stack.len(), 0);
        assert_eq!(vm.frames.len(), 0);
    }

    #[test]
    fn deep_self_recursion_overflows_after_frames_max() {
        let mut vm = Vm::new();
        let err = vm.interpret("func f(){ f(); } f();").unwrap_err();
        assert!(matches!(
            err,
            InterpretError::Runtime(RuntimeError::StackOverflow)
        ));
    }

    #[test]
    fn list_subscript_assignment_round_trips() {
        run_ok("let xs=[1,2,3]; xs[1]=9; println(xs[1]);");
    }

    #[test]
    fn not_of_falsy_values_is_true() {
        run_ok("println(!nil); println(!false); println(!0); println(!\"\"); println(![]);");
    }
}
