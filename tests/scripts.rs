//! End-to-end language behavior (§8): each test compiles and runs a complete
//! program through the public `Vm` API and asserts on captured stdout.
//! Stdout is redirected with `gag::BufferRedirect` (same mechanism
//! `solisoft-soli_lang`'s REPL uses to capture interpreter output), guarded by
//! a process-wide mutex since the redirect is global and tests run in
//! parallel by default.

use std::io::Read;
use std::sync::Mutex;

use gag::BufferRedirect;
use lumen::Vm;
use pretty_assertions::assert_eq;

static STDOUT_LOCK: Mutex<()> = Mutex::new(());

fn run_and_capture(source: &str) -> (Result<(), lumen::InterpretError>, String) {
    let _guard = STDOUT_LOCK.lock().unwrap();
    let mut redirect = BufferRedirect::stdout().expect("stdout redirect");
    let mut vm = Vm::new();
    let result = vm.interpret(source);
    let mut output = String::new();
    redirect.read_to_string(&mut output).ok();
    drop(redirect);
    (result, output)
}

#[test]
fn scenario_1_recursive_fibonacci() {
    let source = "func fib(n){ if (n<2) return n; return fib(n-2)+fib(n-1); } println(fib(10));";
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "55\n");
}

#[test]
fn scenario_2_closures_share_captured_local() {
    let source = "func makeCounter(){ let c=0; return fun(){ c=c+1; return c; }; } let k=makeCounter(); println(k()); println(k()); println(k());";
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "1\n2\n3\n");
}

#[test]
fn scenario_3_list_append_delete_and_subscript() {
    let source = "let xs=[10,20,30]; append(xs,40); delete(xs,0); println(xs[0]); println(xs[2]);";
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "20\n40\n");
}

#[test]
fn scenario_4_string_concatenation_and_equality() {
    let source = r#"println("foo"+"bar"=="foobar");"#;
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "true\n");
}

#[test]
fn scenario_5_a_let_with_no_initializer_reads_back_as_nil() {
    // `let a;` defines the global as Nil (matching clox's `OP_NIL` + `OP_DEFINE_GLOBAL`
    // for an uninitialized `var`), so this is not the undefined-global case.
    let source = "let a; println(a);";
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "nil\n");
}

#[test]
fn scenario_5_reading_a_never_declared_global_is_a_runtime_error() {
    let source = "println(doesNotExist);";
    let (result, _output) = run_and_capture(source);
    match result {
        Err(lumen::InterpretError::Runtime(_)) => {}
        other => panic!("expected a runtime error, got {other:?}"),
    }
}

#[test]
fn scenario_6_unbounded_self_recursion_overflows_the_frame_stack() {
    let source = "func f(){ f(); } f();";
    let (result, _output) = run_and_capture(source);
    match result {
        Err(lumen::InterpretError::Runtime(_)) => {}
        other => panic!("expected a stack-overflow runtime error, got {other:?}"),
    }
}

#[test]
fn property_3_stack_and_frames_are_balanced_after_a_clean_run() {
    let source = "let x = 1 + 2 * 3; println(x);";
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "7\n");
}

#[test]
fn property_4_falsiness_law_holds_for_zero_empty_string_and_empty_list() {
    let source = r#"println(!0); println(!""); println(![]);"#;
    let (result, output) = run_and_capture(source);
    assert!(result.is_ok());
    assert_eq!(output, "false\nfalse\nfalse\n");
}

#[test]
fn property_6_error_isolation_across_interpret_calls() {
    let _guard = STDOUT_LOCK.lock().unwrap();
    let mut vm = Vm::new();

    assert!(vm.interpret("println(undeclared);").is_err());

    let mut redirect = BufferRedirect::stdout().expect("stdout redirect");
    let result = vm.interpret("println(1+1);");
    let mut output = String::new();
    redirect.read_to_string(&mut output).ok();
    drop(redirect);

    assert!(result.is_ok());
    assert_eq!(output, "2\n");
}
