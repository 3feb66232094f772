//! Recursive-descent parser for ALAN-2022
//!
//! One function per non-terminal; the single lookahead token is pulled from
//! the scanner on demand. The parser is the sole active agent of the
//! pipeline: semantic actions bind identifiers in the symbol table, check
//! types, and emit code inline as productions are recognized. There is no
//! AST and no separate analysis pass.
//!
//! Grammar (`{X}` repetition, `[X]` option):
//!
//! ```text
//! source     ::= "source" id { funcdef } body
//! funcdef    ::= "function" id "(" [ type id { "," type id } ] ")"
//!                [ "to" type ] body
//! body       ::= "begin" { vardef } statements "end"
//! type       ::= ("boolean" | "integer") [ "array" ]
//! vardef     ::= type id { "," id } ";"
//! statements ::= "relax" | statement { ";" statement }
//! statement  ::= assign | call | if | input | leave | output | while
//! assign     ::= id [ "[" simple "]" ] ":=" ( expr | "array" simple )
//! call       ::= "call" id "(" [ expr { "," expr } ] ")"
//! if         ::= "if" expr "then" statements
//!                { "elsif" expr "then" statements }
//!                [ "else" statements ] "end"
//! input      ::= "get" id [ "[" simple "]" ]
//! leave      ::= "leave" [ expr ]
//! output     ::= "put" ( string | expr ) { "." ( string | expr ) }
//! while      ::= "while" expr "do" statements "end"
//! expr       ::= simple [ relop simple ]
//! simple     ::= [ "-" ] term { addop term }
//! term       ::= factor { mulop factor }
//! factor     ::= id [ "[" simple "]" | "(" [ expr { "," expr } ] ")" ]
//!              | number | "(" expr ")" | "not" factor | "true" | "false"
//! ```

use crate::codegen::{CodeGen, Opcode};
use crate::error::CompileError;
use crate::scanner::Scanner;
use crate::symbols::SymbolTable;
use crate::token::{Pos, Token, TokenKind};
use crate::types::{BaseType, IdProp, ValType};

/// True when `kind` can start an expression.
fn starts_expr(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Minus
            | TokenKind::Id(_)
            | TokenKind::Num(_)
            | TokenKind::LPar
            | TokenKind::Not
            | TokenKind::True
            | TokenKind::False
    )
}

/// The compare-then-branch opcode for a relational operator token.
fn relop_opcode(kind: &TokenKind) -> Option<Opcode> {
    match kind {
        TokenKind::Eq => Some(Opcode::IfIcmpeq),
        TokenKind::Ne => Some(Opcode::IfIcmpne),
        TokenKind::Lt => Some(Opcode::IfIcmplt),
        TokenKind::Le => Some(Opcode::IfIcmple),
        TokenKind::Gt => Some(Opcode::IfIcmpgt),
        TokenKind::Ge => Some(Opcode::IfIcmpge),
        _ => None,
    }
}

fn incompatible(pos: Pos, want: impl std::fmt::Display, found: impl std::fmt::Display) -> CompileError {
    CompileError::at(
        pos,
        format!("incompatible types (expected {}, but found {})", want, found),
    )
}

/// The parser and its compilation context: scanner, lookahead token, symbol
/// table and code emitter.
pub struct Parser {
    scanner: Scanner,
    token: Token,
    symbols: SymbolTable,
    code: CodeGen,
    /// Declared return value type of the function being parsed; `None` in
    /// `main` and in procedures.
    current_ret: Option<ValType>,
}

impl Parser {
    /// Create a parser over `source` and fetch the first token.
    pub fn new(source: &str) -> Result<Self, CompileError> {
        let mut scanner = Scanner::new(source);
        let token = scanner.get_token()?;
        Ok(Parser {
            scanner,
            token,
            symbols: SymbolTable::new(),
            code: CodeGen::new(),
            current_ret: None,
        })
    }

    /// Parse the whole compilation unit and hand back the emitter holding
    /// the completed bodies.
    pub fn parse(mut self) -> Result<CodeGen, CompileError> {
        self.parse_source()?;
        if self.token.kind != TokenKind::Eof {
            return Err(CompileError::at(
                self.token.pos,
                format!("expected end-of-file, but found {}", self.token.kind),
            ));
        }
        Ok(self.code)
    }

    fn advance(&mut self) -> Result<(), CompileError> {
        self.token = self.scanner.get_token()?;
        Ok(())
    }

    fn expect(&mut self, want: TokenKind) -> Result<(), CompileError> {
        if self.token.kind.matches(&want) {
            self.advance()
        } else {
            Err(CompileError::at(
                self.token.pos,
                format!("expected {}, but found {}", want, self.token.kind),
            ))
        }
    }

    fn expect_id(&mut self) -> Result<(String, Pos), CompileError> {
        match &self.token.kind {
            TokenKind::Id(name) => {
                let name = name.clone();
                let pos = self.token.pos;
                self.advance()?;
                Ok((name, pos))
            }
            kind => Err(CompileError::at(
                self.token.pos,
                format!("expected identifier, but found {}", kind),
            )),
        }
    }

    fn lookup(&self, name: &str, pos: Pos) -> Result<IdProp, CompileError> {
        self.symbols
            .find_name(name)
            .cloned()
            .ok_or_else(|| CompileError::at(pos, format!("unknown identifier {}", name)))
    }

    fn require_boolean(&self, t: ValType, pos: Pos) -> Result<(), CompileError> {
        if t == ValType::BOOLEAN {
            Ok(())
        } else if t.is_array() {
            Err(CompileError::at(pos, "expected scalar value, but found array"))
        } else {
            Err(incompatible(pos, "boolean", t))
        }
    }

    fn require_integer(&self, t: ValType, pos: Pos) -> Result<(), CompileError> {
        if t == ValType::INTEGER {
            Ok(())
        } else if t.is_array() {
            Err(CompileError::at(pos, "expected scalar value, but found array"))
        } else {
            Err(incompatible(pos, "integer", t))
        }
    }

    /// source ::= "source" id { funcdef } body
    fn parse_source(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Source)?;
        let (name, _) = self.expect_id()?;
        self.code.set_class_name(&name);

        while self.token.kind == TokenKind::Function {
            self.parse_funcdef()?;
        }

        self.code.init_body("main", None);
        self.parse_body()?;
        self.code.gen_instr(Opcode::Return);
        self.code.close_body(self.symbols.get_variables_width());
        Ok(())
    }

    /// funcdef ::= "function" id "(" [ type id { "," type id } ] ")"
    ///             [ "to" type ] body
    fn parse_funcdef(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Function)?;
        let (name, name_pos) = self.expect_id()?;
        self.expect(TokenKind::LPar)?;

        // Parameters are collected before the subroutine scope exists.
        let mut params: Vec<(String, ValType, Pos)> = Vec::new();
        if matches!(self.token.kind, TokenKind::Boolean | TokenKind::Integer) {
            loop {
                let typ = self.parse_type()?;
                let (id, pos) = self.expect_id()?;
                params.push((id, typ, pos));
                if self.token.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RPar)?;

        let mut ret = ValType::procedure();
        if self.token.kind == TokenKind::To {
            self.advance()?;
            let mut typ = self.parse_type()?;
            typ.set_as_callable();
            ret = typ;
        }

        let prop = IdProp::callable(ret, params.iter().map(|(_, typ, _)| *typ).collect());
        if !self.symbols.open_subroutine(&name, prop.clone()) {
            return Err(CompileError::at(
                name_pos,
                format!("multiple defenition of {}", name),
            ));
        }
        self.code.init_body(&name, Some(&prop));

        // Drain the parameter list into the fresh scope, in declaration
        // order, so the parameters take the first frame slots.
        for (id, typ, pos) in params {
            let offset = self.symbols.get_variables_width();
            if !self.symbols.insert_name(&id, IdProp::variable(typ, offset)) {
                return Err(CompileError::at(pos, format!("multiple defenition of {}", id)));
            }
        }

        self.current_ret = (ret.base() != BaseType::Void).then(|| ret.return_type());
        self.parse_body()?;
        self.code.gen_instr(Opcode::Return);
        self.code.close_body(self.symbols.get_variables_width());
        self.symbols.close_subroutine();
        self.current_ret = None;
        Ok(())
    }

    /// type ::= ("boolean" | "integer") [ "array" ]
    fn parse_type(&mut self) -> Result<ValType, CompileError> {
        let mut typ = match self.token.kind {
            TokenKind::Boolean => ValType::BOOLEAN,
            TokenKind::Integer => ValType::INTEGER,
            ref kind => {
                return Err(CompileError::at(
                    self.token.pos,
                    format!("expected type, but found {}", kind),
                ));
            }
        };
        self.advance()?;
        if self.token.kind == TokenKind::Array {
            self.advance()?;
            typ.set_as_array();
        }
        Ok(typ)
    }

    /// body ::= "begin" { vardef } statements "end"
    fn parse_body(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Begin)?;
        while matches!(self.token.kind, TokenKind::Boolean | TokenKind::Integer) {
            self.parse_vardef()?;
        }
        self.parse_statements()?;
        self.expect(TokenKind::End)
    }

    /// vardef ::= type id [ "array" ] { "," id [ "array" ] } ";"
    ///
    /// The `array` marker may trail an identifier as well as the base type;
    /// a trailing marker applies to that identifier only.
    fn parse_vardef(&mut self) -> Result<(), CompileError> {
        let typ = self.parse_type()?;
        loop {
            let (id, pos) = self.expect_id()?;
            let mut id_typ = typ;
            if self.token.kind == TokenKind::Array {
                self.advance()?;
                id_typ.set_as_array();
            }
            let offset = self.symbols.get_variables_width();
            if !self.symbols.insert_name(&id, IdProp::variable(id_typ, offset)) {
                return Err(CompileError::at(pos, format!("multiple defenition of {}", id)));
            }
            if self.token.kind == TokenKind::Comma {
                self.advance()?;
            } else {
                break;
            }
        }
        self.expect(TokenKind::Semicolon)
    }

    /// statements ::= "relax" | statement { ";" statement }
    fn parse_statements(&mut self) -> Result<(), CompileError> {
        if self.token.kind == TokenKind::Relax {
            return self.advance();
        }
        self.parse_statement()?;
        while self.token.kind == TokenKind::Semicolon {
            self.advance()?;
            self.parse_statement()?;
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), CompileError> {
        match &self.token.kind {
            TokenKind::Id(_) => self.parse_assign(),
            TokenKind::Call => self.parse_call(),
            TokenKind::If => self.parse_if(),
            TokenKind::Get => self.parse_input(),
            TokenKind::Leave => self.parse_leave(),
            TokenKind::Put => self.parse_output(),
            TokenKind::While => self.parse_while(),
            kind => Err(CompileError::at(
                self.token.pos,
                format!("expected statement, but found {}", kind),
            )),
        }
    }

    /// assign ::= id [ "[" simple "]" ] ":=" ( expr | "array" simple )
    fn parse_assign(&mut self) -> Result<(), CompileError> {
        let (name, pos) = self.expect_id()?;
        let prop = self.lookup(&name, pos)?;
        if !prop.typ.is_variable() {
            return Err(CompileError::at(pos, format!("{} is not a variable", name)));
        }

        // A subscripted target loads the array reference and the subscript
        // before the right-hand side is emitted.
        let mut subscripted = false;
        if self.token.kind == TokenKind::LBrack {
            if !prop.typ.is_array() {
                return Err(CompileError::at(pos, format!("{} is not an array", name)));
            }
            subscripted = true;
            self.code.gen_load_object(prop.offset);
            self.advance()?;
            let index_pos = self.token.pos;
            let index = self.parse_simple()?;
            self.require_integer(index, index_pos)?;
            self.expect(TokenKind::RBrack)?;
        }

        self.expect(TokenKind::Gets)?;

        if self.token.kind == TokenKind::Array {
            // id := array simple: allocate a fresh array of the declared
            // element type, sized by the expression.
            let alloc_pos = self.token.pos;
            if subscripted {
                let element = ValType::new(prop.typ.base());
                return Err(incompatible(alloc_pos, element, prop.typ));
            }
            if !prop.typ.is_array() {
                return Err(CompileError::at(pos, format!("{} is not an array", name)));
            }
            self.advance()?;
            let size_pos = self.token.pos;
            let size = self.parse_simple()?;
            self.require_integer(size, size_pos)?;
            self.code.gen_newarray(prop.typ.base());
            self.code.gen_store_object(prop.offset);
        } else if starts_expr(&self.token.kind) {
            let rhs_pos = self.token.pos;
            let rhs = self.parse_expr()?;
            if subscripted {
                let element = ValType::new(prop.typ.base());
                if rhs != element {
                    return Err(incompatible(rhs_pos, element, rhs));
                }
                self.code.gen_array_store(prop.typ.base());
            } else {
                if rhs != prop.typ {
                    return Err(incompatible(rhs_pos, prop.typ, rhs));
                }
                if prop.typ.is_array() {
                    self.code.gen_store_object(prop.offset);
                } else {
                    self.code.gen_store(prop.offset);
                }
            }
        } else {
            return Err(CompileError::at(
                self.token.pos,
                format!("expected expression or array allocation, but found {}", self.token.kind),
            ));
        }
        Ok(())
    }

    /// call ::= "call" id "(" [ expr { "," expr } ] ")"
    fn parse_call(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Call)?;
        let (name, pos) = self.expect_id()?;
        let prop = self.lookup(&name, pos)?;
        if !prop.typ.is_callable() || prop.typ.base() != BaseType::Void {
            return Err(CompileError::at(pos, format!("{} is not a procedure", name)));
        }
        self.parse_arguments(&name, &prop)?;
        self.code.gen_call(&name, &prop);
        Ok(())
    }

    /// Parse a parenthesized argument list, checking arity and types
    /// against the callee's signature.
    fn parse_arguments(&mut self, name: &str, prop: &IdProp) -> Result<(), CompileError> {
        self.expect(TokenKind::LPar)?;
        let mut count = 0;
        if self.token.kind != TokenKind::RPar {
            loop {
                if count >= prop.nparams() {
                    return Err(CompileError::at(
                        self.token.pos,
                        format!("too many arguments in call to {}", name),
                    ));
                }
                let arg_pos = self.token.pos;
                let arg = self.parse_expr()?;
                let want = prop.params[count];
                if arg != want {
                    return Err(incompatible(arg_pos, want, arg));
                }
                count += 1;
                if self.token.kind == TokenKind::Comma {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        if count < prop.nparams() {
            return Err(CompileError::at(
                self.token.pos,
                format!("too few arguments in call to {}", name),
            ));
        }
        self.expect(TokenKind::RPar)
    }

    /// if ::= "if" expr "then" statements { "elsif" expr "then" statements }
    ///        [ "else" statements ] "end"
    ///
    /// Each branch tests into its own `next` label; every branch body jumps
    /// to the single `end` label.
    fn parse_if(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::If)?;
        let done = self.code.get_label();
        loop {
            let cond_pos = self.token.pos;
            let cond = self.parse_expr()?;
            self.require_boolean(cond, cond_pos)?;
            let next = self.code.get_label();
            self.code.gen_branch(Opcode::Ifeq, next);
            self.expect(TokenKind::Then)?;
            self.parse_statements()?;
            self.code.gen_branch(Opcode::Goto, done);
            self.code.gen_label(next);
            if self.token.kind == TokenKind::Elsif {
                self.advance()?;
            } else {
                break;
            }
        }
        if self.token.kind == TokenKind::Else {
            self.advance()?;
            self.parse_statements()?;
        }
        self.expect(TokenKind::End)?;
        self.code.gen_label(done);
        Ok(())
    }

    /// input ::= "get" id [ "[" simple "]" ]
    fn parse_input(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Get)?;
        let (name, pos) = self.expect_id()?;
        let prop = self.lookup(&name, pos)?;
        if !prop.typ.is_variable() {
            return Err(CompileError::at(pos, format!("{} is not a variable", name)));
        }
        if self.token.kind == TokenKind::LBrack {
            if !prop.typ.is_array() {
                return Err(CompileError::at(pos, format!("{} is not an array", name)));
            }
            self.code.gen_load_object(prop.offset);
            self.advance()?;
            let index_pos = self.token.pos;
            let index = self.parse_simple()?;
            self.require_integer(index, index_pos)?;
            self.expect(TokenKind::RBrack)?;
            self.code.gen_read(prop.typ.base());
            self.code.gen_array_store(prop.typ.base());
        } else {
            if prop.typ.is_array() {
                return Err(CompileError::at(pos, "expected scalar value, but found array"));
            }
            self.code.gen_read(prop.typ.base());
            self.code.gen_store(prop.offset);
        }
        Ok(())
    }

    /// leave ::= "leave" [ expr ]
    fn parse_leave(&mut self) -> Result<(), CompileError> {
        let leave_pos = self.token.pos;
        self.expect(TokenKind::Leave)?;
        if starts_expr(&self.token.kind) {
            let expr_pos = self.token.pos;
            let value = self.parse_expr()?;
            match self.current_ret {
                Some(want) => {
                    if value != want {
                        return Err(incompatible(expr_pos, want, value));
                    }
                    if want.is_array() {
                        self.code.gen_instr(Opcode::Areturn);
                    } else {
                        self.code.gen_instr(Opcode::Ireturn);
                    }
                }
                None => return Err(incompatible(expr_pos, "void", value)),
            }
        } else {
            match self.current_ret {
                Some(want) => return Err(incompatible(leave_pos, want, "void")),
                None => self.code.gen_instr(Opcode::Return),
            }
        }
        Ok(())
    }

    /// output ::= "put" ( string | expr ) { "." ( string | expr ) }
    fn parse_output(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::Put)?;
        loop {
            if let TokenKind::Str(text) = &self.token.kind {
                let text = text.clone();
                self.advance()?;
                self.code.gen_print_string(&text);
            } else if starts_expr(&self.token.kind) {
                let item_pos = self.token.pos;
                let item = self.parse_expr()?;
                if item.is_array() {
                    return Err(CompileError::at(item_pos, "expected scalar value, but found array"));
                }
                self.code.gen_print(item.base());
            } else {
                return Err(CompileError::at(
                    self.token.pos,
                    format!("expected expression or string, but found {}", self.token.kind),
                ));
            }
            if self.token.kind == TokenKind::Concat {
                self.advance()?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// while ::= "while" expr "do" statements "end"
    fn parse_while(&mut self) -> Result<(), CompileError> {
        self.expect(TokenKind::While)?;
        let start = self.code.get_label();
        let done = self.code.get_label();
        self.code.gen_label(start);
        let cond_pos = self.token.pos;
        let cond = self.parse_expr()?;
        self.require_boolean(cond, cond_pos)?;
        self.code.gen_branch(Opcode::Ifeq, done);
        self.expect(TokenKind::Do)?;
        self.parse_statements()?;
        self.expect(TokenKind::End)?;
        self.code.gen_branch(Opcode::Goto, start);
        self.code.gen_label(done);
        Ok(())
    }

    /// expr ::= simple [ relop simple ]
    fn parse_expr(&mut self) -> Result<ValType, CompileError> {
        let mut t = self.parse_simple()?;
        if let Some(op) = relop_opcode(&self.token.kind) {
            let op_pos = self.token.pos;
            let ordered = matches!(
                self.token.kind,
                TokenKind::Lt | TokenKind::Le | TokenKind::Gt | TokenKind::Ge
            );
            self.advance()?;
            let rhs = self.parse_simple()?;
            if t.is_array() || rhs.is_array() {
                return Err(CompileError::at(op_pos, "expected scalar value, but found array"));
            }
            if ordered {
                if !t.is_integer() || !rhs.is_integer() {
                    return Err(incompatible(op_pos, "integer", "boolean"));
                }
            } else if t.base() != rhs.base() {
                return Err(incompatible(op_pos, t, rhs));
            }
            self.code.gen_cmp(op);
            t = ValType::BOOLEAN;
        }
        Ok(t)
    }

    /// simple ::= [ "-" ] term { addop term }
    ///
    /// A leading minus is lowered as `0 - term`.
    fn parse_simple(&mut self) -> Result<ValType, CompileError> {
        let negated = self.token.kind == TokenKind::Minus;
        if negated {
            self.advance()?;
            self.code.gen_const(0);
        }
        let first_pos = self.token.pos;
        let mut t = self.parse_term()?;
        if negated {
            self.require_integer(t, first_pos)?;
            self.code.gen_instr(Opcode::Isub);
        }
        loop {
            let op = match self.token.kind {
                TokenKind::Plus => Opcode::Iadd,
                TokenKind::Minus => Opcode::Isub,
                TokenKind::Or => Opcode::Ior,
                _ => break,
            };
            let op_pos = self.token.pos;
            let want = if op == Opcode::Ior {
                ValType::BOOLEAN
            } else {
                ValType::INTEGER
            };
            self.advance()?;
            let rhs = self.parse_term()?;
            if t.is_array() || rhs.is_array() {
                return Err(CompileError::at(op_pos, "expected scalar value, but found array"));
            }
            if t != want {
                return Err(incompatible(op_pos, want, t));
            }
            if rhs != want {
                return Err(incompatible(op_pos, want, rhs));
            }
            self.code.gen_instr(op);
            t = want;
        }
        Ok(t)
    }

    /// term ::= factor { mulop factor }
    fn parse_term(&mut self) -> Result<ValType, CompileError> {
        let mut t = self.parse_factor()?;
        loop {
            let op = match self.token.kind {
                TokenKind::And => Opcode::Iand,
                TokenKind::Star => Opcode::Imul,
                TokenKind::Slash => Opcode::Idiv,
                TokenKind::Rem => Opcode::Irem,
                _ => break,
            };
            let op_pos = self.token.pos;
            let want = if op == Opcode::Iand {
                ValType::BOOLEAN
            } else {
                ValType::INTEGER
            };
            self.advance()?;
            let rhs = self.parse_factor()?;
            if t.is_array() || rhs.is_array() {
                return Err(CompileError::at(op_pos, "expected scalar value, but found array"));
            }
            if t != want {
                return Err(incompatible(op_pos, want, t));
            }
            if rhs != want {
                return Err(incompatible(op_pos, want, rhs));
            }
            self.code.gen_instr(op);
            t = want;
        }
        Ok(t)
    }

    /// factor ::= id [ "[" simple "]" | "(" [ expr { "," expr } ] ")" ]
    ///          | number | "(" expr ")" | "not" factor | "true" | "false"
    fn parse_factor(&mut self) -> Result<ValType, CompileError> {
        match &self.token.kind {
            TokenKind::Id(_) => {
                let (name, pos) = self.expect_id()?;
                let prop = self.lookup(&name, pos)?;
                if prop.typ.is_callable() {
                    if self.token.kind != TokenKind::LPar {
                        return Err(CompileError::at(pos, format!("{} is not a variable", name)));
                    }
                    if prop.typ.base() == BaseType::Void {
                        return Err(CompileError::at(pos, format!("{} is not a function", name)));
                    }
                    self.parse_arguments(&name, &prop)?;
                    self.code.gen_call(&name, &prop);
                    Ok(prop.typ.return_type())
                } else if self.token.kind == TokenKind::LBrack {
                    if !prop.typ.is_array() {
                        return Err(CompileError::at(pos, format!("{} is not an array", name)));
                    }
                    self.code.gen_load_object(prop.offset);
                    self.advance()?;
                    let index_pos = self.token.pos;
                    let index = self.parse_simple()?;
                    self.require_integer(index, index_pos)?;
                    self.expect(TokenKind::RBrack)?;
                    self.code.gen_array_load(prop.typ.base());
                    Ok(ValType::new(prop.typ.base()))
                } else if self.token.kind == TokenKind::LPar {
                    Err(CompileError::at(pos, format!("{} is not a function", name)))
                } else {
                    if prop.typ.is_array() {
                        self.code.gen_load_object(prop.offset);
                    } else {
                        self.code.gen_load(prop.offset);
                    }
                    Ok(prop.typ)
                }
            }
            TokenKind::Num(value) => {
                let value = *value;
                self.advance()?;
                self.code.gen_const(value);
                Ok(ValType::INTEGER)
            }
            TokenKind::LPar => {
                self.advance()?;
                let t = self.parse_expr()?;
                self.expect(TokenKind::RPar)?;
                Ok(t)
            }
            TokenKind::Not => {
                self.advance()?;
                let operand_pos = self.token.pos;
                let t = self.parse_factor()?;
                self.require_boolean(t, operand_pos)?;
                // not x == x xor 1 on a materialized 0/1
                self.code.gen_const(1);
                self.code.gen_instr(Opcode::Ixor);
                Ok(ValType::BOOLEAN)
            }
            TokenKind::True => {
                self.advance()?;
                self.code.gen_const(1);
                Ok(ValType::BOOLEAN)
            }
            TokenKind::False => {
                self.advance()?;
                self.code.gen_const(0);
                Ok(ValType::BOOLEAN)
            }
            kind => Err(CompileError::at(
                self.token.pos,
                format!("expected factor, but found {}", kind),
            )),
        }
    }
}
