//! The built-in set (§4.7): a small registry installed into globals at VM
//! construction. Each native is a plain `fn`, matching `object::native::NativeFn`;
//! `append`/`delete` work directly on the `Rc<RefCell<ObjList>>` reachable
//! through their first argument, and `readFile` goes through the VM's string
//! interner so it hands back a canonical `ObjString` (§4.6).

use std::fmt::Write as _;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::object::{NativeFn, Obj, ObjNative, StringInterner};
use crate::table::Table;
use crate::value::Value;

/// Bound on `readFile` (§9 Open Question (c)): the source loads the whole file
/// into memory with no cap at all; this implementation refuses anything larger
/// rather than exhausting the process.
const MAX_READ_FILE_BYTES: u64 = 16 * 1024 * 1024;

pub fn install(globals: &mut Table<Value>, interner: &mut StringInterner) {
    register(globals, interner, "clock", 0, clock);
    register(globals, interner, "readFile", 1, read_file);
    register(globals, interner, "println", -1, println_native);
    register(globals, interner, "append", 2, append);
    register(globals, interner, "delete", 2, delete);
}

fn register(
    globals: &mut Table<Value>,
    interner: &mut StringInterner,
    name: &str,
    arity: i32,
    function: NativeFn,
) {
    let name = interner.intern(name);
    let native = ObjNative::new(name.clone(), arity, function);
    globals.set(name, Value::Obj(Obj::Native(Rc::new(native))));
}

fn clock(_args: &[Value], _interner: &mut StringInterner) -> Result<Value, String> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| e.to_string())?;
    Ok(Value::Number(elapsed.as_secs_f64()))
}

fn read_file(args: &[Value], interner: &mut StringInterner) -> Result<Value, String> {
    let path = args
        .first()
        .and_then(|v| v.as_obj())
        .and_then(Obj::as_string)
        .ok_or_else(|| "readFile() expects a string path.".to_string())?;

    let metadata = std::fs::metadata(path.as_str())
        .map_err(|e| format!("could not stat '{}': {e}", path.as_str()))?;
    if metadata.len() > MAX_READ_FILE_BYTES {
        return Err(format!(
            "'{}' is {} bytes, over the {}-byte readFile limit.",
            path.as_str(),
            metadata.len(),
            MAX_READ_FILE_BYTES
        ));
    }

    let contents = std::fs::read_to_string(path.as_str())
        .map_err(|e| format!("could not read '{}': {e}", path.as_str()))?;
    Ok(Value::Obj(Obj::String(
        interner.intern_owned(contents.into_boxed_str()),
    )))
}

fn println_native(args: &[Value], _interner: &mut StringInterner) -> Result<Value, String> {
    let mut line = String::new();
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{arg}");
    }
    println!("{line}");
    Ok(Value::Nil)
}

fn append(args: &[Value], _interner: &mut StringInterner) -> Result<Value, String> {
    let list = args
        .first()
        .and_then(|v| v.as_obj())
        .and_then(Obj::as_list)
        .ok_or_else(|| "append() expects a list as its first argument.".to_string())?;
    let value = args.get(1).cloned().unwrap_or(Value::Nil);
    list.borrow_mut().append(value);
    Ok(Value::Nil)
}

fn delete(args: &[Value], _interner: &mut StringInterner) -> Result<Value, String> {
    let list = args
        .first()
        .and_then(|v| v.as_obj())
        .and_then(Obj::as_list)
        .ok_or_else(|| "delete() expects a list as its first argument.".to_string())?;
    let index = args
        .get(1)
        .and_then(Value::as_number)
        .ok_or_else(|| "delete() expects a numeric index as its second argument.".to_string())?;
    if index < 0.0 || index.fract() != 0.0 {
        return Err("delete() index must be a non-negative integer.".to_string());
    }
    list.borrow_mut()
        .delete(index as usize)
        .map(|_| Value::Nil)
        .ok_or_else(|| "delete() index out of bounds.".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjList;
    use std::cell::RefCell;
    use pretty_assertions::assert_eq;

    #[test]
    fn clock_returns_a_nonnegative_number() {
        let mut interner = StringInterner::new();
        let result = clock(&[], &mut interner).unwrap();
        assert!(matches!(result, Value::Number(n) if n >= 0.0));
    }

    #[test]
    fn append_grows_the_underlying_list() {
        let mut interner = StringInterner::new();
        let list = Rc::new(RefCell::new(ObjList::new(vec![Value::Number(1.0)])));
        let args = [Value::Obj(Obj::List(list.clone())), Value::Number(2.0)];
        append(&args, &mut interner).unwrap();
        assert_eq!(list.borrow().len(), 2);
    }

    #[test]
    fn delete_out_of_bounds_is_a_native_error() {
        let mut interner = StringInterner::new();
        let list = Rc::new(RefCell::new(ObjList::new(vec![])));
        let args = [Value::Obj(Obj::List(list)), Value::Number(0.0)];
        assert!(delete(&args, &mut interner).is_err());
    }
}
