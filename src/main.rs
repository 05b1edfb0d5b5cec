//! CLI / REPL driver (§6): reads a file or runs an interactive REPL, feeding
//! each unit of source to `Vm::interpret`. Only this module's argument parsing
//! and process exit codes are normative; everything interesting happens in the
//! library crate.

use std::process::ExitCode;

use clap::Parser;
use lumen::InterpretError;
use lumen::Vm;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// A small dynamically-typed, lexically-scoped scripting language.
#[derive(Parser)]
#[command(name = "lumen", version, about, long_about = None)]
struct Cli {
    /// Script file to run. Omit to start the REPL.
    path: Option<String>,

    /// Force-enable instruction tracing for this run (still requires the
    /// `debug_trace_execution` feature to be compiled in; see SPEC_FULL.md §7.2).
    #[arg(short, long)]
    trace: bool,

    /// Documented-but-inert: the value stack depth is a compile-time constant
    /// (see `vm::STACK_MAX`, §9 Open Question (b)). Passing a mismatched value
    /// logs a warning and is otherwise ignored.
    #[arg(long = "max-stack")]
    max_stack: Option<usize>,

    /// Documented-but-inert counterpart to `--max-stack` for call-frame depth
    /// (see `vm::FRAMES_MAX`).
    #[arg(long = "max-frames")]
    max_frames: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    if cli.trace {
        if cfg!(feature = "debug_trace_execution") {
            std::env::set_var("RUST_LOG", "trace");
        } else {
            log::warn!("--trace has no effect: build with --features debug_trace_execution to enable it");
        }
    }
    if let Some(n) = cli.max_stack {
        log::warn!("--max-stack={n} is inert; the value stack is a compile-time constant (vm::STACK_MAX)");
    }
    if let Some(n) = cli.max_frames {
        log::warn!("--max-frames={n} is inert; the frame stack is a compile-time constant (vm::FRAMES_MAX)");
    }

    match cli.path {
        Some(path) => run_file(&path),
        None => {
            run_repl();
            ExitCode::SUCCESS
        }
    }
}

fn run_file(path: &str) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("could not read '{path}': {err}");
            return ExitCode::from(74);
        }
    };

    let mut vm = Vm::new();
    match vm.interpret(&source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // A runtime error has already printed its own message and stack trace
            // inside `interpret` (§4.8); a compile error hasn't been printed yet.
            if let InterpretError::Compile(ref compile_err) = err {
                eprintln!("{compile_err}");
            }
            let code = exit_code(&err);
            ExitCode::from(code)
        }
    }
}

fn run_repl() {
    println!("lumen {} -- Ctrl-D to exit", env!("CARGO_PKG_VERSION"));
    let mut vm = Vm::new();
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(err) => {
            log::warn!("falling back to basic line input: {err}");
            run_repl_basic(&mut vm);
            return;
        }
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                // A runtime error here is reported by `interpret` itself (§4.8);
                // a compile error isn't, so print it here before looping.
                if let Err(InterpretError::Compile(err)) = vm.interpret(&line) {
                    eprintln!("{err}");
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }
}

fn run_repl_basic(vm: &mut Vm) {
    use std::io::{self, BufRead, Write};
    let stdin = io::stdin();
    loop {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                if !line.trim().is_empty() {
                    if let Err(InterpretError::Compile(err)) = vm.interpret(&line) {
                        eprintln!("{err}");
                    }
                }
            }
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }
}

fn exit_code(err: &InterpretError) -> u8 {
    err.exit_code() as u8
}
