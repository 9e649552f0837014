//! Recursive-descent/Pratt parser over the token stream (`spec.md` §4.2).
//!
//! The whole token stream is lexed up front into a `Vec<Token>` (scripts are
//! bounded by the host before ever reaching `parse`, so this is not itself a
//! resource-exhaustion vector) which makes the one piece of real lookahead
//! this grammar needs — disambiguating `(a, b) => …` from a parenthesized
//! expression — a cheap index save/restore instead of a re-lexing dance.

use std::rc::Rc;

pub use crate::lexer::SyntaxError;
use crate::{
    ast::*,
    lexer::{Keyword, Lexer, Tok, Token},
};

/// Maximum expression/statement nesting depth accepted by the parser.
///
/// Protects the parser (and the tree-walking interpreter that will later
/// recurse over the same shape) from stack overflow on adversarial input
/// such as `((((((...))))))`.
pub const MAX_NESTING_DEPTH: u32 = 512;

/// Whether a `/` encountered right after `prev` starts a regex literal
/// (rather than a division operator), following the same "value expected
/// next" rule real ES lexers use for this disambiguation: a `/` is division
/// when the previous token could have ended an expression (identifier,
/// literal, `this`, or a closing `)`/`]`/`}`), and a regex literal start in
/// every other position, including the very first token of the program.
fn regex_allowed_after(prev: Option<&Tok>) -> bool {
    !matches!(
        prev,
        Some(Tok::Ident(_))
            | Some(Tok::Number(_))
            | Some(Tok::Str(_))
            | Some(Tok::TemplateTail(_))
            | Some(Tok::NoSubTemplate(_))
            | Some(Tok::Keyword(Keyword::This))
            | Some(Tok::Keyword(Keyword::True))
            | Some(Tok::Keyword(Keyword::False))
            | Some(Tok::Keyword(Keyword::Null))
            | Some(Tok::Keyword(Keyword::Undefined))
            | Some(Tok::Punct(")"))
            | Some(Tok::Punct("]"))
            | Some(Tok::Punct("}"))
    )
}

fn tokenize(src: &str, filename: Rc<str>) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(src, filename);
    let mut out: Vec<Token> = Vec::new();
    loop {
        let regex_allowed = regex_allowed_after(out.last().map(|t| &t.tok));
        let tok = lexer.next_token(regex_allowed)?;
        let is_eof = tok.tok == Tok::Eof;
        out.push(tok);
        if is_eof {
            break;
        }
    }
    Ok(out)
}

pub fn parse(src: &str, filename: &str) -> Result<Program, SyntaxError> {
    let filename: Rc<str> = Rc::from(filename);
    let tokens = tokenize(src, filename.clone())?;
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let body = parser.parse_statements_until_eof()?;
    Ok(Program { body, filename })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: u32,
}

impl Parser {
    fn cur(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn cur_loc(&self) -> crate::source::CodeLoc {
        self.cur().loc.clone()
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError { loc: self.cur_loc(), message: message.into() }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.err("Maximum expression nesting depth exceeded"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.cur().tok, Tok::Punct(x) if *x == p)
    }

    fn is_keyword(&self, kw: Keyword) -> bool {
        matches!(&self.cur().tok, Tok::Keyword(k) if *k == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> Result<(), SyntaxError> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(self.err(format!("Expected '{p}'")))
        }
    }

    fn eat_keyword(&mut self, kw: Keyword) -> bool {
        if self.is_keyword(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_ident(&mut self) -> Result<String, SyntaxError> {
        match self.advance().tok {
            Tok::Ident(s) => Ok(s),
            // Contextual keywords are legal binding names in this subset.
            Tok::Keyword(Keyword::Of) => Ok("of".to_owned()),
            _ => Err(self.err("Expected identifier")),
        }
    }

    /// Consumes a statement-terminating `;`, applying the pragmatic ASI rule
    /// documented in `SPEC_FULL.md` §4.1: a newline, `}`, or EOF also ends a
    /// statement.
    fn consume_semicolon(&mut self) -> Result<(), SyntaxError> {
        if self.eat_punct(";") {
            return Ok(());
        }
        if self.is_punct("}") || matches!(self.cur().tok, Tok::Eof) || self.cur().newline_before {
            return Ok(());
        }
        Err(self.err("Expected ';'"))
    }

    // ---- statements ----

    fn parse_statements_until_eof(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        let mut out = Vec::new();
        while !matches!(self.cur().tok, Tok::Eof) {
            out.push(self.parse_statement()?);
        }
        Ok(out)
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, SyntaxError> {
        self.expect_punct("{")?;
        let mut out = Vec::new();
        while !self.is_punct("}") {
            if matches!(self.cur().tok, Tok::Eof) {
                return Err(self.err("Unexpected end of input, expected '}'"));
            }
            out.push(self.parse_statement()?);
        }
        self.expect_punct("}")?;
        Ok(out)
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        self.enter()?;
        let result = self.parse_statement_inner();
        self.leave();
        result
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        if self.is_punct("{") {
            let body = self.parse_block()?;
            return Ok(Rc::new(Node::new(loc, StmtKind::Block(body))));
        }
        if self.is_punct(";") {
            self.advance();
            return Ok(Rc::new(Node::new(loc, StmtKind::Empty)));
        }
        if let Tok::Keyword(kw) = self.cur().tok {
            match kw {
                Keyword::Var | Keyword::Let | Keyword::Const => return self.parse_var_decl_stmt(),
                Keyword::Function => return self.parse_function_decl(),
                Keyword::If => return self.parse_if(),
                Keyword::For => return self.parse_for(),
                Keyword::While => return self.parse_while(),
                Keyword::Do => return self.parse_do_while(),
                Keyword::Break => return self.parse_break_continue(true),
                Keyword::Continue => return self.parse_break_continue(false),
                Keyword::Return => return self.parse_return(),
                Keyword::Switch => return self.parse_switch(),
                Keyword::Try => return self.parse_try(),
                Keyword::Throw => return self.parse_throw(),
                _ => {}
            }
        }
        // Labeled statement: Identifier ':' Statement
        if let Tok::Ident(name) = self.cur().tok.clone() {
            if matches!(&self.tokens[self.pos + 1].tok, Tok::Punct(":")) {
                self.advance();
                self.advance();
                let body = self.parse_statement()?;
                return Ok(Rc::new(Node::new(loc, StmtKind::Labeled(name, Box::new(body)))));
            }
        }
        let expr = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Rc::new(Node::new(loc, StmtKind::Expr(expr))))
    }

    fn decl_kind(&mut self) -> DeclKind {
        match self.advance().tok {
            Tok::Keyword(Keyword::Var) => DeclKind::Var,
            Tok::Keyword(Keyword::Let) => DeclKind::Let,
            Tok::Keyword(Keyword::Const) => DeclKind::Const,
            _ => unreachable!("decl_kind called on non-declaration token"),
        }
    }

    fn parse_var_decl_stmt(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        let kind = self.decl_kind();
        let declarators = self.parse_var_declarators()?;
        self.consume_semicolon()?;
        Ok(Rc::new(Node::new(loc, StmtKind::VarDecl(kind, declarators))))
    }

    fn parse_var_declarators(&mut self) -> Result<Vec<VarDeclarator>, SyntaxError> {
        let mut out = Vec::new();
        loop {
            let pattern = self.parse_binding_pattern()?;
            let init = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            out.push(VarDeclarator { pattern, init });
            if !self.eat_punct(",") {
                break;
            }
        }
        Ok(out)
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        if self.is_punct("[") {
            return self.parse_array_pattern();
        }
        if self.is_punct("{") {
            return self.parse_object_pattern();
        }
        Ok(Pattern::Identifier(self.expect_ident()?))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        self.expect_punct("[")?;
        let mut elems = Vec::new();
        while !self.is_punct("]") {
            if self.eat_punct(",") {
                elems.push(None);
                continue;
            }
            let rest = self.eat_punct("...");
            let pattern = self.parse_binding_pattern()?;
            let default = if !rest && self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            elems.push(Some(ArrayPatternElement { pattern, default, rest }));
            if !self.is_punct("]") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("]")?;
        Ok(Pattern::Array(elems))
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, SyntaxError> {
        self.expect_punct("{")?;
        let mut props = Vec::new();
        let mut rest = None;
        while !self.is_punct("}") {
            if self.eat_punct("...") {
                rest = Some(self.expect_ident()?);
                break;
            }
            let (key, shorthand_name) = self.parse_property_key()?;
            let pattern = if self.eat_punct(":") {
                self.parse_binding_pattern()?
            } else {
                Pattern::Identifier(shorthand_name.ok_or_else(|| self.err("Expected ':' in destructuring pattern"))?)
            };
            let default = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            props.push(ObjectPatternProp { key, pattern, default });
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("}")?;
        Ok(Pattern::Object(props, rest))
    }

    /// Parses an object-literal/pattern key, returning the plain identifier
    /// name too (usable as the implicit value for shorthand properties).
    fn parse_property_key(&mut self) -> Result<(PropertyKey, Option<String>), SyntaxError> {
        if self.eat_punct("[") {
            let expr = self.parse_assignment()?;
            self.expect_punct("]")?;
            return Ok((PropertyKey::Computed(expr), None));
        }
        match self.advance().tok {
            Tok::Ident(name) => Ok((PropertyKey::Ident(name.clone()), Some(name))),
            Tok::Str(s) => Ok((PropertyKey::Ident(s), None)),
            Tok::Number(n) => Ok((PropertyKey::Ident(crate::value::number_to_string(n)), None)),
            Tok::Keyword(kw) => {
                let name = keyword_as_ident(kw);
                Ok((PropertyKey::Ident(name.clone()), Some(name)))
            }
            _ => Err(self.err("Expected property key")),
        }
    }

    fn parse_function_decl(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let name = self.expect_ident()?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let def = Rc::new(FunctionDef { name: Some(name), params, body });
        Ok(Rc::new(Node::new(loc, StmtKind::FunctionDecl(def))))
    }

    fn parse_params(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.expect_punct("(")?;
        let mut out = Vec::new();
        while !self.is_punct(")") {
            let rest = self.eat_punct("...");
            let pattern = self.parse_binding_pattern()?;
            let default = if !rest && self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            out.push(Param { pattern, default, rest });
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct(")")?;
        Ok(out)
    }

    fn parse_if(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate =
            if self.eat_keyword(Keyword::Else) { Some(Box::new(self.parse_statement()?)) } else { None };
        Ok(Rc::new(Node::new(loc, StmtKind::If { test, consequent, alternate })))
    }

    fn parse_while(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Rc::new(Node::new(loc, StmtKind::While { test, body })))
    }

    fn parse_do_while(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let body = Box::new(self.parse_statement()?);
        if !self.eat_keyword(Keyword::While) {
            return Err(self.err("Expected 'while' after 'do' block"));
        }
        self.expect_punct("(")?;
        let test = self.parse_expression()?;
        self.expect_punct(")")?;
        self.consume_semicolon()?;
        Ok(Rc::new(Node::new(loc, StmtKind::DoWhile { body, test })))
    }

    fn parse_for(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        self.expect_punct("(")?;

        let decl_kind = match self.cur().tok {
            Tok::Keyword(Keyword::Var) => Some(DeclKind::Var),
            Tok::Keyword(Keyword::Let) => Some(DeclKind::Let),
            Tok::Keyword(Keyword::Const) => Some(DeclKind::Const),
            _ => None,
        };

        if self.is_punct(";") {
            self.advance();
            return self.parse_for_rest(loc, None);
        }

        if let Some(kind) = decl_kind {
            self.advance();
            let pattern = self.parse_binding_pattern()?;
            if self.eat_keyword(Keyword::In) {
                let object = self.parse_expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Rc::new(Node::new(loc, StmtKind::ForIn { decl_kind: Some(kind), pattern, object, body })));
            }
            if self.eat_keyword(Keyword::Of) {
                let iterable = self.parse_assignment()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Rc::new(Node::new(loc, StmtKind::ForOf {
                    decl_kind: Some(kind),
                    pattern,
                    iterable,
                    body,
                })));
            }
            let init = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
            let mut declarators = vec![VarDeclarator { pattern, init }];
            while self.eat_punct(",") {
                let pattern = self.parse_binding_pattern()?;
                let init = if self.eat_punct("=") { Some(self.parse_assignment()?) } else { None };
                declarators.push(VarDeclarator { pattern, init });
            }
            self.expect_punct(";")?;
            return self.parse_for_rest(loc, Some(ForInit::Decl(kind, declarators)));
        }

        // A bare identifier immediately followed by `in`/`of` is a for-in/for-of
        // target; anything else falls through to a general expression (the ES
        // grammar's `noIn` restriction reduces, for this subset, to just
        // special-casing the identifier case before committing to a full
        // relational-expression parse that would otherwise eat the `in`).
        if let Tok::Ident(name) = self.cur().tok.clone() {
            let next_is_in = matches!(&self.tokens[self.pos + 1].tok, Tok::Keyword(Keyword::In));
            let next_is_of = matches!(&self.tokens[self.pos + 1].tok, Tok::Keyword(Keyword::Of));
            if next_is_in || next_is_of {
                self.advance();
                self.advance();
                let pattern = Pattern::Identifier(name);
                if next_is_in {
                    let object = self.parse_expression()?;
                    self.expect_punct(")")?;
                    let body = Box::new(self.parse_statement()?);
                    return Ok(Rc::new(Node::new(loc, StmtKind::ForIn { decl_kind: None, pattern, object, body })));
                }
                let iterable = self.parse_assignment()?;
                self.expect_punct(")")?;
                let body = Box::new(self.parse_statement()?);
                return Ok(Rc::new(Node::new(loc, StmtKind::ForOf { decl_kind: None, pattern, iterable, body })));
            }
        }
        let expr = self.parse_expression()?;
        self.expect_punct(";")?;
        self.parse_for_rest(loc, Some(ForInit::Expr(expr)))
    }

    fn parse_for_rest(&mut self, loc: crate::source::CodeLoc, init: Option<ForInit>) -> Result<Stmt, SyntaxError> {
        let test = if !self.is_punct(";") { Some(self.parse_expression()?) } else { None };
        self.expect_punct(";")?;
        let update = if !self.is_punct(")") { Some(self.parse_expression()?) } else { None };
        self.expect_punct(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Rc::new(Node::new(loc, StmtKind::For { init, test, update, body })))
    }

    fn parse_break_continue(&mut self, is_break: bool) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let label = if !self.cur().newline_before {
            if let Tok::Ident(name) = self.cur().tok.clone() {
                self.advance();
                Some(name)
            } else {
                None
            }
        } else {
            None
        };
        self.consume_semicolon()?;
        let kind = if is_break { StmtKind::Break(label) } else { StmtKind::Continue(label) };
        Ok(Rc::new(Node::new(loc, kind)))
    }

    fn parse_return(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let value = if self.is_punct(";") || self.is_punct("}") || matches!(self.cur().tok, Tok::Eof) || self.cur().newline_before
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(Rc::new(Node::new(loc, StmtKind::Return(value))))
    }

    fn parse_throw(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let value = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Rc::new(Node::new(loc, StmtKind::Throw(value))))
    }

    fn parse_switch(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        self.expect_punct("(")?;
        let discriminant = self.parse_expression()?;
        self.expect_punct(")")?;
        self.expect_punct("{")?;
        let mut cases = Vec::new();
        while !self.is_punct("}") {
            let test = if self.eat_keyword(Keyword::Case) {
                let e = self.parse_expression()?;
                self.expect_punct(":")?;
                Some(e)
            } else if self.eat_keyword(Keyword::Default) {
                self.expect_punct(":")?;
                None
            } else {
                return Err(self.err("Expected 'case' or 'default'"));
            };
            let mut body = Vec::new();
            while !self.is_punct("}") && !self.is_keyword(Keyword::Case) && !self.is_keyword(Keyword::Default) {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect_punct("}")?;
        Ok(Rc::new(Node::new(loc, StmtKind::Switch { discriminant, cases })))
    }

    fn parse_try(&mut self) -> Result<Stmt, SyntaxError> {
        let loc = self.cur_loc();
        self.advance();
        let block = self.parse_block()?;
        let handler = if self.eat_keyword(Keyword::Catch) {
            let param = if self.eat_punct("(") {
                let p = self.parse_binding_pattern()?;
                self.expect_punct(")")?;
                Some(p)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };
        let finalizer = if self.eat_keyword(Keyword::Finally) { Some(self.parse_block()?) } else { None };
        if handler.is_none() && finalizer.is_none() {
            return Err(self.err("Missing catch or finally after try"));
        }
        Ok(Rc::new(Node::new(loc, StmtKind::Try { block, handler, finalizer })))
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        let first = self.parse_assignment()?;
        if !self.is_punct(",") {
            return Ok(first);
        }
        let loc = first.loc.clone();
        let mut parts = vec![first];
        while self.eat_punct(",") {
            parts.push(self.parse_assignment()?);
        }
        Ok(Rc::new(Node::new(loc, ExprKind::Sequence(parts))))
    }

    fn parse_assignment(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let result = self.parse_assignment_inner();
        self.leave();
        result
    }

    fn parse_assignment_inner(&mut self) -> Result<Expr, SyntaxError> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        let left = self.parse_conditional()?;
        let op = match &self.cur().tok {
            Tok::Punct("=") => Some(AssignOp::Assign),
            Tok::Punct("+=") => Some(AssignOp::Add),
            Tok::Punct("-=") => Some(AssignOp::Sub),
            Tok::Punct("*=") => Some(AssignOp::Mul),
            Tok::Punct("/=") => Some(AssignOp::Div),
            Tok::Punct("%=") => Some(AssignOp::Mod),
            Tok::Punct("**=") => Some(AssignOp::Pow),
            Tok::Punct("&=") => Some(AssignOp::BitAnd),
            Tok::Punct("|=") => Some(AssignOp::BitOr),
            Tok::Punct("^=") => Some(AssignOp::BitXor),
            Tok::Punct("<<=") => Some(AssignOp::Shl),
            Tok::Punct(">>=") => Some(AssignOp::Shr),
            Tok::Punct("&&=") => Some(AssignOp::And),
            Tok::Punct("||=") => Some(AssignOp::Or),
            Tok::Punct("??=") => Some(AssignOp::NullishCoalesce),
            _ => None,
        };
        let Some(op) = op else { return Ok(left) };
        let loc = left.loc.clone();
        self.advance();
        let right = self.parse_assignment()?;
        Ok(Rc::new(Node::new(loc, ExprKind::Assign(op, left, right))))
    }

    /// Tries to parse `(params) => body` or `ident => body`, restoring the
    /// parser position if this does not turn out to be an arrow function.
    fn try_parse_arrow(&mut self) -> Result<Option<Expr>, SyntaxError> {
        let loc = self.cur_loc();
        if let Tok::Ident(name) = self.cur().tok.clone() {
            if matches!(&self.tokens[self.pos + 1].tok, Tok::Punct("=>")) {
                self.advance();
                self.advance();
                let params = vec![Param { pattern: Pattern::Identifier(name), default: None, rest: false }];
                let body = self.parse_arrow_body()?;
                return Ok(Some(Rc::new(Node::new(loc, ExprKind::Arrow { params, body }))));
            }
            return Ok(None);
        }
        if !self.is_punct("(") {
            return Ok(None);
        }
        let start = self.pos;
        if let Ok(params) = self.try_parse_params_for_arrow() {
            if self.is_punct("=>") {
                self.advance();
                let body = self.parse_arrow_body()?;
                return Ok(Some(Rc::new(Node::new(loc, ExprKind::Arrow { params, body }))));
            }
        }
        self.pos = start;
        Ok(None)
    }

    fn try_parse_params_for_arrow(&mut self) -> Result<Vec<Param>, SyntaxError> {
        self.parse_params()
    }

    fn parse_arrow_body(&mut self) -> Result<ArrowBody, SyntaxError> {
        if self.is_punct("{") {
            Ok(ArrowBody::Block(self.parse_block()?))
        } else {
            Ok(ArrowBody::Expr(self.parse_assignment()?))
        }
    }

    fn parse_conditional(&mut self) -> Result<Expr, SyntaxError> {
        let test = self.parse_nullish()?;
        if !self.eat_punct("?") {
            return Ok(test);
        }
        let loc = test.loc.clone();
        let consequent = self.parse_assignment()?;
        self.expect_punct(":")?;
        let alternate = self.parse_assignment()?;
        Ok(Rc::new(Node::new(loc, ExprKind::Conditional { test, consequent, alternate })))
    }

    fn parse_nullish(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_logical_or()?;
        while self.eat_punct("??") {
            let right = self.parse_logical_or()?;
            let loc = left.loc.clone();
            left = Rc::new(Node::new(loc, ExprKind::Logical(LogicalOp::NullishCoalesce, left, right)));
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_logical_and()?;
        while self.eat_punct("||") {
            let right = self.parse_logical_and()?;
            let loc = left.loc.clone();
            left = Rc::new(Node::new(loc, ExprKind::Logical(LogicalOp::Or, left, right)));
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_bitor()?;
        while self.eat_punct("&&") {
            let right = self.parse_bitor()?;
            let loc = left.loc.clone();
            left = Rc::new(Node::new(loc, ExprKind::Logical(LogicalOp::And, left, right)));
        }
        Ok(left)
    }

    fn parse_bin_level(
        &mut self,
        mut next: impl FnMut(&mut Self) -> Result<Expr, SyntaxError>,
        ops: &[(&'static str, BinOp)],
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        'outer: loop {
            for (p, op) in ops {
                if self.is_punct(p) {
                    self.advance();
                    let right = next(self)?;
                    let loc = left.loc.clone();
                    left = Rc::new(Node::new(loc, ExprKind::Binary(*op, left, right)));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(left)
    }

    fn parse_bitor(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_bitxor, &[("|", BinOp::BitOr)])
    }

    fn parse_bitxor(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_bitand, &[("^", BinOp::BitXor)])
    }

    fn parse_bitand(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_equality, &[("&", BinOp::BitAnd)])
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_relational, &[
            ("===", BinOp::StrictEq),
            ("!==", BinOp::StrictNotEq),
            ("==", BinOp::Eq),
            ("!=", BinOp::NotEq),
        ])
    }

    fn parse_relational(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_shift()?;
        loop {
            let op = if self.is_punct("<=") {
                BinOp::LtEq
            } else if self.is_punct(">=") {
                BinOp::GtEq
            } else if self.is_punct("<") {
                BinOp::Lt
            } else if self.is_punct(">") {
                BinOp::Gt
            } else if self.is_keyword(Keyword::Instanceof) {
                BinOp::Instanceof
            } else if self.is_keyword(Keyword::In) {
                BinOp::In
            } else {
                break;
            };
            self.advance();
            let right = self.parse_shift()?;
            let loc = left.loc.clone();
            left = Rc::new(Node::new(loc, ExprKind::Binary(op, left, right)));
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_additive, &[(">>>", BinOp::UShr), ("<<", BinOp::Shl), (">>", BinOp::Shr)])
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_multiplicative, &[("+", BinOp::Add), ("-", BinOp::Sub)])
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_bin_level(Self::parse_exponent, &[("*", BinOp::Mul), ("/", BinOp::Div), ("%", BinOp::Mod)])
    }

    fn parse_exponent(&mut self) -> Result<Expr, SyntaxError> {
        let left = self.parse_unary()?;
        if self.eat_punct("**") {
            let right = self.parse_exponent()?;
            let loc = left.loc.clone();
            return Ok(Rc::new(Node::new(loc, ExprKind::Binary(BinOp::Pow, left, right))));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.cur_loc();
        let op = match &self.cur().tok {
            Tok::Punct("-") => Some(UnOp::Neg),
            Tok::Punct("+") => Some(UnOp::Plus),
            Tok::Punct("!") => Some(UnOp::Not),
            Tok::Punct("~") => Some(UnOp::BitNot),
            Tok::Keyword(Keyword::Typeof) => Some(UnOp::Typeof),
            Tok::Keyword(Keyword::Void) => Some(UnOp::Void),
            Tok::Keyword(Keyword::Delete) => Some(UnOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Rc::new(Node::new(loc, ExprKind::Unary(op, expr))));
        }
        if self.is_punct("++") || self.is_punct("--") {
            let op = if self.is_punct("++") { UpdateOp::Increment } else { UpdateOp::Decrement };
            self.advance();
            let target = self.parse_unary()?;
            return Ok(Rc::new(Node::new(loc, ExprKind::Update { op, prefix: true, target })));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_call_or_member(true)?;
        if !self.cur().newline_before && (self.is_punct("++") || self.is_punct("--")) {
            let op = if self.is_punct("++") { UpdateOp::Increment } else { UpdateOp::Decrement };
            let loc = expr.loc.clone();
            self.advance();
            return Ok(Rc::new(Node::new(loc, ExprKind::Update { op, prefix: false, target: expr })));
        }
        Ok(expr)
    }

    fn parse_call_or_member(&mut self, allow_call: bool) -> Result<Expr, SyntaxError> {
        let loc = self.cur_loc();
        let mut expr = if self.eat_keyword(Keyword::New) {
            let callee = self.parse_call_or_member(false)?;
            let args = if self.is_punct("(") { self.parse_arguments()? } else { Vec::new() };
            Rc::new(Node::new(loc.clone(), ExprKind::New { callee, args }))
        } else {
            self.parse_primary()?
        };
        loop {
            if self.eat_punct(".") {
                let name = self.expect_ident()?;
                let loc = expr.loc.clone();
                expr = Rc::new(Node::new(loc, ExprKind::Member { object: expr, property: name, optional: false }));
            } else if self.eat_punct("?.") {
                if self.is_punct("(") {
                    if !allow_call {
                        break;
                    }
                    let args = self.parse_arguments()?;
                    let loc = expr.loc.clone();
                    expr = Rc::new(Node::new(loc, ExprKind::Call { callee: expr, args, optional: true }));
                    continue;
                }
                if self.eat_punct("[") {
                    let prop = self.parse_expression()?;
                    self.expect_punct("]")?;
                    let loc = expr.loc.clone();
                    expr = Rc::new(Node::new(loc, ExprKind::ComputedMember {
                        object: expr,
                        property: prop,
                        optional: true,
                    }));
                    continue;
                }
                let name = self.expect_ident()?;
                let loc = expr.loc.clone();
                expr = Rc::new(Node::new(loc, ExprKind::Member { object: expr, property: name, optional: true }));
            } else if self.eat_punct("[") {
                let prop = self.parse_expression()?;
                self.expect_punct("]")?;
                let loc = expr.loc.clone();
                expr =
                    Rc::new(Node::new(loc, ExprKind::ComputedMember { object: expr, property: prop, optional: false }));
            } else if allow_call && self.is_punct("(") {
                let args = self.parse_arguments()?;
                let loc = expr.loc.clone();
                expr = Rc::new(Node::new(loc, ExprKind::Call { callee: expr, args, optional: false }));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_arguments(&mut self) -> Result<Vec<ArrayElement>, SyntaxError> {
        self.expect_punct("(")?;
        let mut out = Vec::new();
        while !self.is_punct(")") {
            if self.eat_punct("...") {
                out.push(ArrayElement::Spread(self.parse_assignment()?));
            } else {
                out.push(ArrayElement::Item(self.parse_assignment()?));
            }
            if !self.is_punct(")") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct(")")?;
        Ok(out)
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let result = self.parse_primary_inner();
        self.leave();
        result
    }

    fn parse_primary_inner(&mut self) -> Result<Expr, SyntaxError> {
        let loc = self.cur_loc();
        match self.cur().tok.clone() {
            Tok::Punct("/") | Tok::Punct("/=") => Err(self.err("Regular expression literals are not supported")),
            Tok::Number(n) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Number(n)))))
            }
            Tok::Str(s) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Str(s)))))
            }
            Tok::NoSubTemplate(s) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Template(vec![TemplatePart::Str(s)]))))
            }
            Tok::TemplateHead(s) => self.parse_template(loc, s),
            Tok::Keyword(Keyword::True) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Bool(true)))))
            }
            Tok::Keyword(Keyword::False) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Bool(false)))))
            }
            Tok::Keyword(Keyword::Null) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Null))))
            }
            Tok::Keyword(Keyword::Undefined) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Literal(Literal::Undefined))))
            }
            Tok::Keyword(Keyword::This) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::This)))
            }
            Tok::Keyword(Keyword::Function) => self.parse_function_expr(loc),
            Tok::Ident(name) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Identifier(name))))
            }
            Tok::Keyword(Keyword::Of) => {
                self.advance();
                Ok(Rc::new(Node::new(loc, ExprKind::Identifier("of".to_owned()))))
            }
            Tok::Punct("(") => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Tok::Punct("[") => self.parse_array_literal(loc),
            Tok::Punct("{") => self.parse_object_literal(loc),
            _ => Err(self.err(format!("Unexpected token {:?}", self.cur().tok))),
        }
    }

    fn parse_function_expr(&mut self, loc: crate::source::CodeLoc) -> Result<Expr, SyntaxError> {
        self.advance();
        let name = if let Tok::Ident(n) = self.cur().tok.clone() {
            self.advance();
            Some(n)
        } else {
            None
        };
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        Ok(Rc::new(Node::new(loc, ExprKind::Function(Rc::new(FunctionDef { name, params, body })))))
    }

    fn parse_template(&mut self, loc: crate::source::CodeLoc, head: String) -> Result<Expr, SyntaxError> {
        self.advance();
        let mut parts = vec![TemplatePart::Str(head)];
        loop {
            parts.push(TemplatePart::Expr(self.parse_expression()?));
            match self.advance().tok {
                Tok::TemplateMiddle(s) => parts.push(TemplatePart::Str(s)),
                Tok::TemplateTail(s) => {
                    parts.push(TemplatePart::Str(s));
                    break;
                }
                _ => return Err(self.err("Malformed template literal")),
            }
        }
        Ok(Rc::new(Node::new(loc, ExprKind::Template(parts))))
    }

    fn parse_array_literal(&mut self, loc: crate::source::CodeLoc) -> Result<Expr, SyntaxError> {
        self.advance();
        let mut elems = Vec::new();
        while !self.is_punct("]") {
            if self.is_punct(",") {
                self.advance();
                elems.push(None);
                continue;
            }
            if self.eat_punct("...") {
                elems.push(Some(ArrayElement::Spread(self.parse_assignment()?)));
            } else {
                elems.push(Some(ArrayElement::Item(self.parse_assignment()?)));
            }
            if !self.is_punct("]") {
                self.eat_punct(",");
            }
        }
        self.expect_punct("]")?;
        Ok(Rc::new(Node::new(loc, ExprKind::Array(elems))))
    }

    fn parse_object_literal(&mut self, loc: crate::source::CodeLoc) -> Result<Expr, SyntaxError> {
        self.advance();
        let mut props = Vec::new();
        while !self.is_punct("}") {
            if self.eat_punct("...") {
                props.push(ObjectProp::Spread(self.parse_assignment()?));
            } else {
                let (key, shorthand_name) = self.parse_property_key()?;
                if self.is_punct("(") {
                    let computed = key_is_computed(&key);
                    let params = self.parse_params()?;
                    let body = self.parse_block()?;
                    props.push(ObjectProp::Method { key, computed, func: Rc::new(FunctionDef { name: None, params, body }) });
                } else if self.eat_punct(":") {
                    let computed = key_is_computed(&key);
                    let value = self.parse_assignment()?;
                    props.push(ObjectProp::KeyValue { key, value, computed });
                } else if let Some(name) = shorthand_name {
                    props.push(ObjectProp::Shorthand(name));
                } else {
                    return Err(self.err("Expected ':' in object literal"));
                }
            }
            if !self.is_punct("}") {
                self.expect_punct(",")?;
            }
        }
        self.expect_punct("}")?;
        Ok(Rc::new(Node::new(loc, ExprKind::Object(props))))
    }
}

fn key_is_computed(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::Computed(_))
}

fn keyword_as_ident(kw: Keyword) -> String {
    kw.as_str().to_owned()
}
