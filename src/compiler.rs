//! Single-pass Pratt compiler (§2 names the compiler an out-of-scope external
//! collaborator of the VM core: only its `compile(source) -> Function |
//! CompileError` contract is specified). Implemented here in clox's classic
//! shape — a table of prefix/infix parse functions keyed by token kind, walked
//! by precedence climbing — so the crate is a runnable language end to end.

use std::rc::Rc;

use crate::chunk::Chunk;
use crate::error::{CompileError, CompileResult};
use crate::lexer::Scanner;
use crate::object::{Obj, ObjFunction, ObjString, StringInterner};
use crate::opcode::OpCode;
use crate::token::{Precedence, Token, TokenKind};
use crate::value::Value;

const MAX_ARGS: usize = 255;
const MAX_LOCALS: usize = 256;
const MAX_UPVALUES: usize = 256;
const MAX_CONSTANTS: usize = 256;

/// Compiles `source` into a top-level script function, interning identifiers
/// and string literals into `interner` as it goes (§4.6, §9 "the compiler and
/// the VM agree on which intern table ... to use").
pub fn compile(source: &str, interner: &mut StringInterner) -> CompileResult<Rc<ObjFunction>> {
    Compiler::new(source, interner).run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    Script,
    Function,
}

struct Local<'src> {
    name: &'src str,
    depth: i32,
    is_captured: bool,
}

#[derive(Debug, Clone, Copy)]
struct UpvalueDesc {
    index: u8,
    is_local: bool,
}

struct FunctionScope<'src> {
    kind: FunctionKind,
    name: Option<Rc<ObjString>>,
    arity: u8,
    chunk: Chunk,
    upvalues: Vec<UpvalueDesc>,
    locals: Vec<Local<'src>>,
    scope_depth: i32,
}

impl<'src> FunctionScope<'src> {
    fn new(kind: FunctionKind, name: Option<Rc<ObjString>>) -> Self {
        // Slot 0 is reserved for the closure/receiver value (§4.1); it has no
        // name a user identifier can ever match.
        Self {
            kind,
            name,
            arity: 0,
            chunk: Chunk::new(),
            upvalues: Vec::new(),
            locals: vec![Local {
                name: "",
                depth: 0,
                is_captured: false,
            }],
            scope_depth: 0,
        }
    }
}

type ParseFn<'src> = fn(&mut Compiler<'src>, bool);

struct ParseRule<'src> {
    prefix: Option<ParseFn<'src>>,
    infix: Option<ParseFn<'src>>,
    precedence: Precedence,
}

fn get_rule<'src>(kind: TokenKind) -> ParseRule<'src> {
    use TokenKind::*;
    match kind {
        LeftParen => ParseRule {
            prefix: Some(Compiler::grouping),
            infix: Some(Compiler::call),
            precedence: Precedence::Call,
        },
        LeftBracket => ParseRule {
            prefix: Some(Compiler::list_literal),
            infix: Some(Compiler::subscript),
            precedence: Precedence::Call,
        },
        Minus => ParseRule {
            prefix: Some(Compiler::unary),
            infix: Some(Compiler::binary),
            precedence: Precedence::Term,
        },
        Plus => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Term,
        },
        Slash | Star => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Factor,
        },
        Bang => ParseRule {
            prefix: Some(Compiler::unary),
            infix: None,
            precedence: Precedence::None,
        },
        BangEqual | EqualEqual => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Equality,
        },
        Greater | GreaterEqual | Less | LessEqual => ParseRule {
            prefix: None,
            infix: Some(Compiler::binary),
            precedence: Precedence::Comparison,
        },
        Identifier => ParseRule {
            prefix: Some(Compiler::variable),
            infix: None,
            precedence: Precedence::None,
        },
        String => ParseRule {
            prefix: Some(Compiler::string),
            infix: None,
            precedence: Precedence::None,
        },
        Number => ParseRule {
            prefix: Some(Compiler::number),
            infix: None,
            precedence: Precedence::None,
        },
        And => ParseRule {
            prefix: None,
            infix: Some(Compiler::and_),
            precedence: Precedence::And,
        },
        Or => ParseRule {
            prefix: None,
            infix: Some(Compiler::or_),
            precedence: Precedence::Or,
        },
        False | True | Nil => ParseRule {
            prefix: Some(Compiler::literal),
            infix: None,
            precedence: Precedence::None,
        },
        Fun => ParseRule {
            prefix: Some(Compiler::fun_expression),
            infix: None,
            precedence: Precedence::None,
        },
        _ => ParseRule {
            prefix: None,
            infix: None,
            precedence: Precedence::None,
        },
    }
}

struct Compiler<'src> {
    scanner: Scanner<'src>,
    previous: Token<'src>,
    current: Token<'src>,
    had_error: bool,
    panic_mode: bool,
    first_error: Option<CompileError>,
    scopes: Vec<FunctionScope<'src>>,
    interner: &'src mut StringInterner,
}

impl<'src> Compiler<'src> {
    fn new(source: &'src str, interner: &'src mut StringInterner) -> Self {
        let dummy = Token {
            kind: TokenKind::Eof,
            lexeme: "",
            line: 1,
        };
        Self {
            scanner: Scanner::new(source),
            previous: dummy,
            current: dummy,
            had_error: false,
            panic_mode: false,
            first_error: None,
            scopes: vec![FunctionScope::new(FunctionKind::Script, None)],
            interner,
        }
    }

    fn run(mut self) -> CompileResult<Rc<ObjFunction>> {
        self.advance();
        while !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::Eof, "Expected end of expression.");
        let (function, _upvalues) = self.end_function_scope();
        match self.first_error {
            Some(err) => Err(err),
            None => Ok(function),
        }
    }

    // --- token stream -----------------------------------------------------

    fn advance(&mut self) {
        self.previous = self.current;
        loop {
            self.current = self.scanner.scan_token();
            if self.current.kind != TokenKind::Error {
                break;
            }
            let message = self.current.lexeme.to_string();
            self.error_at_current(&message);
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if !self.check(kind) {
            return false;
        }
        self.advance();
        true
    }

    fn consume(&mut self, kind: TokenKind, message: &str) {
        if self.current.kind == kind {
            self.advance();
            return;
        }
        self.error_at_current(message);
    }

    fn error_at_current(&mut self, message: &str) {
        self.error_at(self.current, message);
    }

    fn error(&mut self, message: &str) {
        self.error_at(self.previous, message);
    }

    fn error_at(&mut self, token: Token<'src>, message: &str) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        self.had_error = true;
        if self.first_error.is_none() {
            self.first_error = Some(CompileError::new(token.line, message.to_string()));
        }
    }

    fn synchronize(&mut self) {
        self.panic_mode = false;
        while self.current.kind != TokenKind::Eof {
            if self.previous.kind == TokenKind::Semicolon {
                return;
            }
            match self.current.kind {
                TokenKind::Func
                | TokenKind::Let
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Print
                | TokenKind::Return => return,
                _ => {}
            }
            self.advance();
        }
    }

    // --- scope bookkeeping --------------------------------------------------

    fn current_scope(&self) -> &FunctionScope<'src> {
        self.scopes.last().expect("compiler always has an active scope")
    }

    fn current_scope_mut(&mut self) -> &mut FunctionScope<'src> {
        self.scopes
            .last_mut()
            .expect("compiler always has an active scope")
    }

    fn current_chunk(&mut self) -> &mut Chunk {
        &mut self.current_scope_mut().chunk
    }

    fn line(&self) -> u32 {
        self.previous.line
    }

    fn begin_scope(&mut self) {
        self.current_scope_mut().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        self.current_scope_mut().scope_depth -= 1;
        let depth = self.current_scope().scope_depth;
        loop {
            let should_pop = self
                .current_scope()
                .locals
                .last()
                .map(|local| local.depth > depth)
                .unwrap_or(false);
            if !should_pop {
                break;
            }
            let captured = self.current_scope_mut().locals.pop().unwrap().is_captured;
            if captured {
                self.emit_op(OpCode::CloseUpvalue);
            } else {
                self.emit_op(OpCode::Pop);
            }
        }
    }

    // --- emitters ------------------------------------------------------------

    fn emit_op(&mut self, op: OpCode) {
        let line = self.line();
        self.current_chunk().write_op(op, line);
    }

    fn emit_op_u8(&mut self, op: OpCode, arg: u8) {
        let line = self.line();
        self.current_chunk().write_op_u8(op, arg, line);
    }

    fn emit_byte(&mut self, byte: u8) {
        let line = self.line();
        self.current_chunk().write_byte(byte, line);
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        let line = self.line();
        self.current_chunk().write_jump(op, line)
    }

    fn patch_jump(&mut self, offset: usize) {
        self.current_chunk().patch_jump(offset);
    }

    fn emit_loop(&mut self, loop_start: usize) {
        let line = self.line();
        self.current_chunk().write_loop(loop_start, line);
    }

    fn emit_constant(&mut self, value: Value) {
        let idx = self.make_constant(value);
        self.emit_op_u8(OpCode::Constant, idx);
    }

    /// Adds `value` to the current chunk's constant pool, reporting a
    /// `CompileError` instead of panicking (`Chunk::add_constant` panics past
    /// the one-byte operand width) when the pool is already full.
    fn make_constant(&mut self, value: Value) -> u8 {
        if self.current_chunk().constant_count() >= MAX_CONSTANTS {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        self.current_chunk().add_constant(value)
    }

    fn emit_return(&mut self) {
        self.emit_op(OpCode::Nil);
        self.emit_op(OpCode::Return);
    }

    // --- variables -----------------------------------------------------------

    fn identifier_constant(&mut self, name: &str) -> u8 {
        let rc = self.interner.intern(name);
        self.make_constant(Value::Obj(Obj::String(rc)))
    }

    /// Reserves a binding for the just-consumed identifier token
    /// (`self.previous`): a constant-pool slot for a global, or a fresh local
    /// in the current function scope.
    fn declare_variable_get_global(&mut self) -> Option<u8> {
        let name_tok = self.previous;
        if self.current_scope().scope_depth == 0 {
            return Some(self.identifier_constant(name_tok.lexeme));
        }
        self.declare_local(name_tok.lexeme);
        None
    }

    fn declare_local(&mut self, name: &'src str) {
        let scope_depth = self.current_scope().scope_depth;
        let mut duplicate = false;
        for local in self.current_scope().locals.iter().rev() {
            if local.depth != -1 && local.depth < scope_depth {
                break;
            }
            if local.name == name {
                duplicate = true;
                break;
            }
        }
        if duplicate {
            self.error("Already a variable with this name in this scope.");
            return;
        }
        if self.current_scope().locals.len() >= MAX_LOCALS {
            self.error("Too many local variables in function.");
            return;
        }
        self.current_scope_mut().locals.push(Local {
            name,
            depth: -1,
            is_captured: false,
        });
    }

    fn mark_initialized(&mut self) {
        let scope = self.current_scope_mut();
        if scope.scope_depth == 0 {
            return;
        }
        let depth = scope.scope_depth;
        if let Some(local) = scope.locals.last_mut() {
            local.depth = depth;
        }
    }

    fn define_variable(&mut self, global: Option<u8>) {
        match global {
            Some(idx) => self.emit_op_u8(OpCode::DefineGlobal, idx),
            None => self.mark_initialized(),
        }
    }

    fn resolve_local(&mut self, scope_idx: usize, name: &str) -> Option<u8> {
        let mut found: Option<(usize, bool)> = None;
        for (i, local) in self.scopes[scope_idx].locals.iter().enumerate().rev() {
            if local.name == name {
                found = Some((i, local.depth == -1));
                break;
            }
        }
        match found {
            Some((_, true)) => {
                self.error("Can't read local variable in its own initializer.");
                None
            }
            Some((i, false)) => Some(i as u8),
            None => None,
        }
    }

    fn resolve_upvalue(&mut self, scope_idx: usize, name: &str) -> Option<u8> {
        if scope_idx == 0 {
            return None;
        }
        let enclosing_idx = scope_idx - 1;
        if let Some(local_idx) = self.resolve_local(enclosing_idx, name) {
            self.scopes[enclosing_idx].locals[local_idx as usize].is_captured = true;
            return Some(self.add_upvalue(scope_idx, local_idx, true));
        }
        if let Some(up_idx) = self.resolve_upvalue(enclosing_idx, name) {
            return Some(self.add_upvalue(scope_idx, up_idx, false));
        }
        None
    }

    fn add_upvalue(&mut self, scope_idx: usize, index: u8, is_local: bool) -> u8 {
        {
            let upvalues = &self.scopes[scope_idx].upvalues;
            for (i, up) in upvalues.iter().enumerate() {
                if up.index == index && up.is_local == is_local {
                    return i as u8;
                }
            }
        }
        if self.scopes[scope_idx].upvalues.len() >= MAX_UPVALUES {
            self.error("Too many closure variables in function.");
            return 0;
        }
        self.scopes[scope_idx].upvalues.push(UpvalueDesc { index, is_local });
        (self.scopes[scope_idx].upvalues.len() - 1) as u8
    }

    fn named_variable(&mut self, name: &str, can_assign: bool) {
        let scope_idx = self.scopes.len() - 1;
        let (get_op, set_op, arg) = if let Some(slot) = self.resolve_local(scope_idx, name) {
            (OpCode::GetLocal, OpCode::SetLocal, slot)
        } else if let Some(slot) = self.resolve_upvalue(scope_idx, name) {
            (OpCode::GetUpvalue, OpCode::SetUpvalue, slot)
        } else {
            let idx = self.identifier_constant(name);
            (OpCode::GetGlobal, OpCode::SetGlobal, idx)
        };

        if can_assign && self.match_kind(TokenKind::Equal) {
            self.expression();
            self.emit_op_u8(set_op, arg);
        } else {
            self.emit_op_u8(get_op, arg);
        }
    }

    // --- functions -------------------------------------------------------

    fn function(&mut self, kind: FunctionKind, name: Option<Rc<ObjString>>) {
        self.scopes.push(FunctionScope::new(kind, name));
        self.begin_scope();

        self.consume(TokenKind::LeftParen, "Expected '(' after function name.");
        if !self.check(TokenKind::RightParen) {
            loop {
                let arity = self.current_scope().arity + 1;
                self.current_scope_mut().arity = arity;
                if arity as usize > MAX_ARGS {
                    self.error_at_current("Can't have more than 255 parameters.");
                }
                self.consume(TokenKind::Identifier, "Expected parameter name.");
                let global = self.declare_variable_get_global();
                self.define_variable(global);
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after parameters.");
        self.consume(TokenKind::LeftBrace, "Expected '{' before function body.");
        self.block();

        let (function, upvalues) = self.end_function_scope();
        let fn_idx = self.make_constant(Value::Obj(Obj::Function(function)));
        self.emit_op_u8(OpCode::Closure, fn_idx);
        for up in upvalues {
            self.emit_byte(up.is_local as u8);
            self.emit_byte(up.index);
        }
    }

    fn end_function_scope(&mut self) -> (Rc<ObjFunction>, Vec<UpvalueDesc>) {
        self.emit_return();
        let scope = self.scopes.pop().expect("ending a scope that was never begun");
        let upvalue_count = scope.upvalues.len() as u8;
        let function = ObjFunction::new(scope.name, scope.arity, upvalue_count, scope.chunk);
        (Rc::new(function), scope.upvalues)
    }

    // --- declarations and statements -----------------------------------------

    fn declaration(&mut self) {
        if self.match_kind(TokenKind::Func) {
            self.func_declaration();
        } else if self.match_kind(TokenKind::Let) {
            self.let_declaration();
        } else {
            self.statement();
        }
        if self.panic_mode {
            self.synchronize();
        }
    }

    fn func_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expected function name.");
        let name_tok = self.previous;
        let global = self.declare_variable_get_global();
        self.mark_initialized();
        let name = self.interner.intern(name_tok.lexeme);
        self.function(FunctionKind::Function, Some(name));
        self.define_variable(global);
    }

    fn let_declaration(&mut self) {
        self.consume(TokenKind::Identifier, "Expected variable name.");
        let global = self.declare_variable_get_global();
        if self.match_kind(TokenKind::Equal) {
            self.expression();
        } else {
            self.emit_op(OpCode::Nil);
        }
        self.consume(TokenKind::Semicolon, "Expected ';' after variable declaration.");
        self.define_variable(global);
    }

    fn statement(&mut self) {
        if self.match_kind(TokenKind::Print) {
            self.print_statement();
        } else if self.match_kind(TokenKind::If) {
            self.if_statement();
        } else if self.match_kind(TokenKind::While) {
            self.while_statement();
        } else if self.match_kind(TokenKind::Return) {
            self.return_statement();
        } else if self.match_kind(TokenKind::LeftBrace) {
            self.begin_scope();
            self.block();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn block(&mut self) {
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            self.declaration();
        }
        self.consume(TokenKind::RightBrace, "Expected '}' after block.");
    }

    fn print_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expected ';' after value.");
        self.emit_op(OpCode::Print);
    }

    fn expression_statement(&mut self) {
        self.expression();
        self.consume(TokenKind::Semicolon, "Expected ';' after expression.");
        self.emit_op(OpCode::Pop);
    }

    fn if_statement(&mut self) {
        self.consume(TokenKind::LeftParen, "Expected '(' after 'if'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ')' after condition.");

        let then_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();

        let else_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(then_jump);
        self.emit_op(OpCode::Pop);

        if self.match_kind(TokenKind::Else) {
            self.statement();
        }
        self.patch_jump(else_jump);
    }

    fn while_statement(&mut self) {
        let loop_start = self.current_chunk().len();
        self.consume(TokenKind::LeftParen, "Expected '(' after 'while'.");
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ')' after condition.");

        let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_jump);
        self.emit_op(OpCode::Pop);
    }

    fn return_statement(&mut self) {
        if self.current_scope().kind == FunctionKind::Script {
            self.error("Can't return from top-level code.");
        }
        if self.match_kind(TokenKind::Semicolon) {
            self.emit_return();
        } else {
            self.expression();
            self.consume(TokenKind::Semicolon, "Expected ';' after return value.");
            self.emit_op(OpCode::Return);
        }
    }

    // --- expressions -----------------------------------------------------

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();
        let prefix_rule = get_rule(self.previous.kind).prefix;
        let can_assign = precedence <= Precedence::Assignment;
        match prefix_rule {
            Some(rule) => rule(self, can_assign),
            None => {
                self.error("Expected an expression.");
                return;
            }
        }

        while precedence <= get_rule(self.current.kind).precedence {
            self.advance();
            if let Some(rule) = get_rule(self.previous.kind).infix {
                rule(self, can_assign);
            }
        }

        if can_assign && self.match_kind(TokenKind::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    fn grouping(&mut self, _can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightParen, "Expected ')' after expression.");
    }

    fn number(&mut self, _can_assign: bool) {
        let value: f64 = self
            .previous
            .lexeme
            .parse()
            .expect("scanner only produces well-formed numeric lexemes");
        self.emit_constant(Value::Number(value));
    }

    fn string(&mut self, _can_assign: bool) {
        let lexeme = self.previous.lexeme;
        let content = &lexeme[1..lexeme.len() - 1];
        let rc = self.interner.intern(content);
        self.emit_constant(Value::Obj(Obj::String(rc)));
    }

    fn literal(&mut self, _can_assign: bool) {
        match self.previous.kind {
            TokenKind::False => self.emit_op(OpCode::False),
            TokenKind::True => self.emit_op(OpCode::True),
            TokenKind::Nil => self.emit_op(OpCode::Nil),
            _ => unreachable!("literal() dispatched for a non-literal token"),
        }
    }

    fn variable(&mut self, can_assign: bool) {
        let name = self.previous.lexeme;
        self.named_variable(name, can_assign);
    }

    fn unary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        self.parse_precedence(Precedence::Unary);
        match operator {
            TokenKind::Minus => self.emit_op(OpCode::Negate),
            TokenKind::Bang => self.emit_op(OpCode::Not),
            _ => unreachable!("unary() dispatched for a non-unary operator"),
        }
    }

    fn binary(&mut self, _can_assign: bool) {
        let operator = self.previous.kind;
        let precedence = get_rule(operator).precedence;
        self.parse_precedence(precedence.next());
        match operator {
            TokenKind::Plus => self.emit_op(OpCode::Add),
            TokenKind::Minus => self.emit_op(OpCode::Subtract),
            TokenKind::Star => self.emit_op(OpCode::Multiply),
            TokenKind::Slash => self.emit_op(OpCode::Divide),
            TokenKind::EqualEqual => self.emit_op(OpCode::Equal),
            TokenKind::BangEqual => {
                self.emit_op(OpCode::Equal);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Greater => self.emit_op(OpCode::Greater),
            TokenKind::GreaterEqual => {
                self.emit_op(OpCode::Less);
                self.emit_op(OpCode::Not);
            }
            TokenKind::Less => self.emit_op(OpCode::Less),
            TokenKind::LessEqual => {
                self.emit_op(OpCode::Greater);
                self.emit_op(OpCode::Not);
            }
            _ => unreachable!("binary() dispatched for a non-binary operator"),
        }
    }

    fn and_(&mut self, _can_assign: bool) {
        let end_jump = self.emit_jump(OpCode::JumpIfFalse);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_jump);
    }

    fn or_(&mut self, _can_assign: bool) {
        let else_jump = self.emit_jump(OpCode::JumpIfFalse);
        let end_jump = self.emit_jump(OpCode::Jump);
        self.patch_jump(else_jump);
        self.emit_op(OpCode::Pop);
        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_jump);
    }

    fn call(&mut self, _can_assign: bool) {
        let argc = self.argument_list();
        self.emit_op_u8(OpCode::Call, argc);
    }

    fn argument_list(&mut self) -> u8 {
        let mut count: usize = 0;
        if !self.check(TokenKind::RightParen) {
            loop {
                self.expression();
                if count == MAX_ARGS {
                    self.error("Can't have more than 255 arguments.");
                }
                count += 1;
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expected ')' after arguments.");
        count as u8
    }

    fn list_literal(&mut self, _can_assign: bool) {
        let mut count: usize = 0;
        if !self.check(TokenKind::RightBracket) {
            loop {
                self.expression();
                if count == MAX_ARGS {
                    self.error("Can't have more than 255 elements in a list literal.");
                }
                count += 1;
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightBracket, "Expected ']' after list elements.");
        self.emit_op_u8(OpCode::BuildList, count as u8);
    }

    fn subscript(&mut self, can_assign: bool) {
        self.expression();
        self.consume(TokenKind::RightBracket, "Expected ']' after index.");
        if can_assign && self.match_kind(TokenKind::Equal) {
            self.expression();
            self.emit_op(OpCode::StoreSubscr);
        } else {
            self.emit_op(OpCode::IndexSubscr);
        }
    }

    fn fun_expression(&mut self, _can_assign: bool) {
        self.function(FunctionKind::Function, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::StringInterner;

    #[test]
    fn overflowing_the_constant_pool_is_a_compile_error_not_a_panic() {
        let mut interner = StringInterner::new();
        let mut source = String::new();
        for i in 0..300 {
            source.push_str(&format!("println({i});"));
        }
        let err = compile(&source, &mut interner).expect_err("300 distinct statements should overflow a 256-slot constant pool");
        assert!(err.message.contains("Too many constants"));
    }

    #[test]
    fn a_small_program_compiles_without_overflowing_the_constant_pool() {
        let mut interner = StringInterner::new();
        let result = compile("let x = 1 + 2; println(x);", &mut interner);
        assert!(result.is_ok());
    }
}
