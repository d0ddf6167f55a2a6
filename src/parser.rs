//! Recursive-descent parser with precedence climbing for binary operators
//! (SPEC_FULL.md §3.1b). Produces the AST in `types::ast`, assigning every node's
//! `NodeId` via a single `NodeIdGen` shared across the whole parse.

use crate::error::{CompileError, Result};
use crate::lexer::{Lexer, Token, TokenKind};
use crate::symbol::{self, Symbol};
use crate::types::ast::*;

pub fn parse_program(src: &str) -> Result<(Vec<Item>, NodeIdGen)> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser { tokens, pos: 0, ids: NodeIdGen::new(), no_struct_literal: false };
    let mut items = Vec::new();
    while parser.peek().kind != TokenKind::Eof {
        items.push(parser.parse_item()?);
    }
    Ok((items, parser.ids))
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    ids: NodeIdGen,
    /// Set while parsing a condition (`if`/`while`), where a bare `{` must start a
    /// block rather than a struct literal.
    no_struct_literal: bool,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn bump(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            let tok = self.peek();
            Err(CompileError::syntax(format!(
                "expected {kind:?}, found {:?} (`{}`) at line {}", tok.kind, tok.text, tok.line
            )))
        }
    }

    fn intern_ident(&mut self) -> Result<Symbol> {
        let tok = self.expect(TokenKind::Ident)?;
        Ok(symbol::intern(&tok.text))
    }

    // ---- items ----

    fn parse_item(&mut self) -> Result<Item> {
        let id = self.ids.next();
        let kind = match self.peek_kind() {
            TokenKind::KwFn => ItemKind::Fn(self.parse_fn_sig()?),
            TokenKind::KwStruct => self.parse_struct()?,
            TokenKind::KwEnum => self.parse_enum()?,
            TokenKind::KwImpl => self.parse_impl()?,
            TokenKind::KwConst => self.parse_const()?,
            _ => {
                let tok = self.peek();
                return Err(CompileError::syntax(format!(
                    "expected an item, found {:?} at line {}", tok.kind, tok.line
                )));
            }
        };
        Ok(Box::new(ItemNode { id, kind }))
    }

    fn parse_fn_sig(&mut self) -> Result<FnSig> {
        self.expect(TokenKind::KwFn)?;
        let name = self.intern_ident()?;
        self.expect(TokenKind::LParen)?;
        let mut receiver = ReceiverKind::None;
        let mut params = Vec::new();
        let mut first = true;
        while !self.at(TokenKind::RParen) {
            if first && self.looks_like_self_param() {
                receiver = self.parse_receiver()?;
            } else {
                params.push(self.parse_fn_param()?);
            }
            first = false;
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        let return_type = if self.eat(TokenKind::Arrow) { Some(self.parse_type()?) } else { None };
        let body = self.parse_block()?;
        Ok(FnSig { name, receiver, params, return_type, body })
    }

    fn looks_like_self_param(&self) -> bool {
        match self.peek_kind() {
            TokenKind::KwSelfLower => true,
            TokenKind::Amp => {
                let next = self.tokens[self.pos + 1].kind;
                next == TokenKind::KwSelfLower
                    || (next == TokenKind::KwMut && self.tokens[self.pos + 2].kind == TokenKind::KwSelfLower)
            }
            _ => false,
        }
    }

    fn parse_receiver(&mut self) -> Result<ReceiverKind> {
        if self.eat(TokenKind::Amp) {
            if self.eat(TokenKind::KwMut) {
                self.expect(TokenKind::KwSelfLower)?;
                Ok(ReceiverKind::RefMut)
            } else {
                self.expect(TokenKind::KwSelfLower)?;
                Ok(ReceiverKind::Ref)
            }
        } else {
            self.expect(TokenKind::KwSelfLower)?;
            Ok(ReceiverKind::ByValue)
        }
    }

    fn parse_fn_param(&mut self) -> Result<FnParam> {
        let pattern = self.parse_pattern()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        Ok(FnParam { pattern, ty })
    }

    fn parse_pattern(&mut self) -> Result<Pattern> {
        let id = self.ids.next();
        let mutable = self.eat(TokenKind::KwMut);
        let name = self.intern_ident()?;
        Ok(Box::new(PatternNode { id, kind: PatternKind::Identifier { name, mutable, by_ref: RefKind::None } }))
    }

    fn parse_type(&mut self) -> Result<Type> {
        let id = self.ids.next();
        let reference = if self.eat(TokenKind::Amp) {
            if self.eat(TokenKind::KwMut) { RefKind::RefMut } else { RefKind::Ref }
        } else {
            RefKind::None
        };
        let kind = if self.eat(TokenKind::LBracket) {
            let elem = self.parse_type()?;
            self.expect(TokenKind::Semi)?;
            let size = self.parse_expr()?;
            self.expect(TokenKind::RBracket)?;
            TypeKind::Array { elem, size, reference }
        } else if self.eat(TokenKind::LParen) {
            self.expect(TokenKind::RParen)?;
            TypeKind::Unit
        } else if self.eat(TokenKind::KwSelfUpper) {
            TypeKind::SelfType
        } else {
            let name = self.intern_ident()?;
            TypeKind::Path { name, reference }
        };
        Ok(Box::new(TypeNode { id, kind }))
    }

    fn parse_struct(&mut self) -> Result<ItemKind> {
        self.expect(TokenKind::KwStruct)?;
        let name = self.intern_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let fname = self.intern_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push(StructField { name: fname, ty });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ItemKind::Struct { name, fields })
    }

    fn parse_enum(&mut self) -> Result<ItemKind> {
        self.expect(TokenKind::KwEnum)?;
        let name = self.intern_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.at(TokenKind::RBrace) {
            variants.push(self.intern_ident()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ItemKind::Enum { name, variants })
    }

    fn parse_impl(&mut self) -> Result<ItemKind> {
        self.expect(TokenKind::KwImpl)?;
        let struct_name = self.intern_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut items = Vec::new();
        while !self.at(TokenKind::RBrace) {
            items.push(self.parse_item()?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ItemKind::Impl { struct_name, items })
    }

    fn parse_const(&mut self) -> Result<ItemKind> {
        self.expect(TokenKind::KwConst)?;
        let name = self.intern_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semi)?;
        Ok(ItemKind::Const { name, ty, value })
    }

    // ---- blocks and statements ----

    fn parse_block(&mut self) -> Result<Block> {
        let id = self.ids.next();
        self.expect(TokenKind::LBrace)?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = false;
        let mut statements = Vec::new();
        let mut tail = None;
        while !self.at(TokenKind::RBrace) {
            if matches!(self.peek_kind(), TokenKind::KwFn | TokenKind::KwStruct | TokenKind::KwEnum | TokenKind::KwImpl | TokenKind::KwConst) {
                let sid = self.ids.next();
                let item = self.parse_item()?;
                statements.push(Box::new(StmtNode { id: sid, kind: StmtKind::Item(item) }));
                continue;
            }
            if self.at(TokenKind::KwLet) {
                statements.push(self.parse_let_stmt()?);
                continue;
            }
            let sid = self.ids.next();
            let needs_semi_optional = matches!(
                self.peek_kind(),
                TokenKind::LBrace | TokenKind::KwIf | TokenKind::KwWhile | TokenKind::KwLoop
            );
            let expr = self.parse_expr()?;
            if self.eat(TokenKind::Semi) {
                statements.push(Box::new(StmtNode { id: sid, kind: StmtKind::Expr { expr, has_semi: true } }));
            } else if self.at(TokenKind::RBrace) {
                tail = Some(Box::new(StmtNode { id: sid, kind: StmtKind::Expr { expr, has_semi: false } }));
                break;
            } else if needs_semi_optional {
                statements.push(Box::new(StmtNode { id: sid, kind: StmtKind::Expr { expr, has_semi: false } }));
            } else {
                return Err(CompileError::syntax(format!(
                    "expected `;` after expression statement at line {}", self.peek().line
                )));
            }
        }
        self.expect(TokenKind::RBrace)?;
        self.no_struct_literal = saved;
        Ok(Block { id, statements, tail })
    }

    fn parse_let_stmt(&mut self) -> Result<Stmt> {
        let id = self.ids.next();
        self.expect(TokenKind::KwLet)?;
        let pattern = self.parse_pattern()?;
        let ty = if self.eat(TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        let init = if self.eat(TokenKind::Eq) { Some(self.parse_expr()?) } else { None };
        self.expect(TokenKind::Semi)?;
        Ok(Box::new(StmtNode { id, kind: StmtKind::Let { pattern, ty, init } }))
    }

    // ---- expressions ----

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Result<Expr> {
        let lhs = self.parse_or()?;
        let op = match self.peek_kind() {
            TokenKind::Eq => BinaryOp::Assign,
            TokenKind::PlusEq => BinaryOp::AddAssign,
            TokenKind::MinusEq => BinaryOp::SubAssign,
            TokenKind::StarEq => BinaryOp::MulAssign,
            TokenKind::SlashEq => BinaryOp::DivAssign,
            TokenKind::PercentEq => BinaryOp::RemAssign,
            TokenKind::AmpEq => BinaryOp::AndAssign,
            TokenKind::PipeEq => BinaryOp::OrAssign,
            TokenKind::CaretEq => BinaryOp::XorAssign,
            TokenKind::ShlEq => BinaryOp::ShlAssign,
            TokenKind::ShrEq => BinaryOp::ShrAssign,
            _ => return Ok(lhs),
        };
        let id = self.ids.next();
        self.bump();
        let rhs = self.parse_assignment()?;
        Ok(Box::new(ExprNode { id, kind: ExprKind::Binary(op, lhs, rhs) }))
    }

    fn parse_binary_level(&mut self, level: usize) -> Result<Expr> {
        const LEVELS: &[&[(TokenKind, BinaryOp)]] = &[
            &[(TokenKind::PipePipe, BinaryOp::OrOr)],
            &[(TokenKind::AmpAmp, BinaryOp::AndAnd)],
            &[
                (TokenKind::EqEq, BinaryOp::Eq), (TokenKind::Ne, BinaryOp::Ne),
                (TokenKind::Lt, BinaryOp::Lt), (TokenKind::Gt, BinaryOp::Gt),
                (TokenKind::Le, BinaryOp::Le), (TokenKind::Ge, BinaryOp::Ge),
            ],
            &[(TokenKind::Pipe, BinaryOp::Or)],
            &[(TokenKind::Caret, BinaryOp::Xor)],
            &[(TokenKind::Amp, BinaryOp::And)],
            &[(TokenKind::Shl, BinaryOp::Shl), (TokenKind::Shr, BinaryOp::Shr)],
            &[(TokenKind::Plus, BinaryOp::Add), (TokenKind::Minus, BinaryOp::Sub)],
            &[(TokenKind::Star, BinaryOp::Mul), (TokenKind::Slash, BinaryOp::Div), (TokenKind::Percent, BinaryOp::Rem)],
        ];
        if level == LEVELS.len() {
            return self.parse_cast();
        }
        let mut lhs = self.parse_binary_level(level + 1)?;
        loop {
            let found = LEVELS[level].iter().find(|(k, _)| self.at(*k)).copied();
            match found {
                Some((_, op)) => {
                    let id = self.ids.next();
                    self.bump();
                    let rhs = self.parse_binary_level(level + 1)?;
                    lhs = Box::new(ExprNode { id, kind: ExprKind::Binary(op, lhs, rhs) });
                }
                None => break,
            }
        }
        Ok(lhs)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        self.parse_binary_level(0)
    }

    fn parse_cast(&mut self) -> Result<Expr> {
        let mut expr = self.parse_unary()?;
        while self.eat(TokenKind::KwAs) {
            let id = self.ids.next();
            let ty = self.parse_type()?;
            expr = Box::new(ExprNode { id, kind: ExprKind::Cast(expr, ty) });
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let id = self.ids.next();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Amp => {
                if self.tokens[self.pos + 1].kind == TokenKind::KwMut {
                    self.bump();
                    self.bump();
                    let operand = self.parse_unary()?;
                    return Ok(Box::new(ExprNode { id, kind: ExprKind::Unary(UnaryOp::RefMut, operand) }));
                }
                Some(UnaryOp::Ref)
            }
            _ => None,
        };
        match op {
            Some(op) => {
                self.bump();
                let operand = self.parse_unary()?;
                Ok(Box::new(ExprNode { id, kind: ExprKind::Unary(op, operand) }))
            }
            None => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    let id = self.ids.next();
                    self.bump();
                    let name = self.intern_ident()?;
                    if self.at(TokenKind::LParen) {
                        let args = self.parse_call_args()?;
                        let callee = Box::new(ExprNode { id, kind: ExprKind::Field(expr, name) });
                        let call_id = self.ids.next();
                        expr = Box::new(ExprNode { id: call_id, kind: ExprKind::Call(callee, args) });
                    } else {
                        expr = Box::new(ExprNode { id, kind: ExprKind::Field(expr, name) });
                    }
                }
                TokenKind::LParen => {
                    let id = self.ids.next();
                    let args = self.parse_call_args()?;
                    expr = Box::new(ExprNode { id, kind: ExprKind::Call(expr, args) });
                }
                TokenKind::LBracket => {
                    let id = self.ids.next();
                    self.bump();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket)?;
                    expr = Box::new(ExprNode { id, kind: ExprKind::Index(expr, index) });
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(TokenKind::RParen) {
            args.push(self.parse_expr()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let id = self.ids.next();
        match self.peek_kind() {
            TokenKind::Number => {
                let tok = self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Literal(LiteralKind::Number, tok.text) }))
            }
            TokenKind::Str => {
                let tok = self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Literal(LiteralKind::Str, tok.text) }))
            }
            TokenKind::Char => {
                let tok = self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Literal(LiteralKind::Char, tok.text) }))
            }
            TokenKind::KwTrue => {
                self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Literal(LiteralKind::Bool, "true".to_string()) }))
            }
            TokenKind::KwFalse => {
                self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Literal(LiteralKind::Bool, "false".to_string()) }))
            }
            TokenKind::KwSelfLower => {
                self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::SelfExpr }))
            }
            TokenKind::LParen => {
                self.bump();
                let saved = self.no_struct_literal;
                self.no_struct_literal = false;
                if self.eat(TokenKind::RParen) {
                    self.no_struct_literal = saved;
                    return Ok(Box::new(ExprNode { id, kind: ExprKind::Unit }));
                }
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.no_struct_literal = saved;
                Ok(inner)
            }
            TokenKind::LBracket => {
                self.bump();
                let saved = self.no_struct_literal;
                self.no_struct_literal = false;
                if self.eat(TokenKind::RBracket) {
                    self.no_struct_literal = saved;
                    return Ok(Box::new(ExprNode { id, kind: ExprKind::Array(Vec::new()) }));
                }
                let first = self.parse_expr()?;
                let node = if self.eat(TokenKind::Semi) {
                    let size = self.parse_expr()?;
                    ExprKind::RepeatArray(first, size)
                } else {
                    let mut elems = vec![first];
                    while self.eat(TokenKind::Comma) {
                        if self.at(TokenKind::RBracket) {
                            break;
                        }
                        elems.push(self.parse_expr()?);
                    }
                    ExprKind::Array(elems)
                };
                self.expect(TokenKind::RBracket)?;
                self.no_struct_literal = saved;
                Ok(Box::new(ExprNode { id, kind: node }))
            }
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                Ok(Box::new(ExprNode { id, kind: ExprKind::Block(block) }))
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(),
            TokenKind::KwLoop => {
                self.bump();
                let body = self.parse_block()?;
                Ok(Box::new(ExprNode { id, kind: ExprKind::Loop(body) }))
            }
            TokenKind::KwReturn => {
                self.bump();
                let value = self.parse_optional_trailing_expr()?;
                Ok(Box::new(ExprNode { id, kind: ExprKind::Return(value) }))
            }
            TokenKind::KwBreak => {
                self.bump();
                let value = self.parse_optional_trailing_expr()?;
                Ok(Box::new(ExprNode { id, kind: ExprKind::Break(value) }))
            }
            TokenKind::KwContinue => {
                self.bump();
                Ok(Box::new(ExprNode { id, kind: ExprKind::Continue(None) }))
            }
            TokenKind::KwSelfUpper | TokenKind::Ident => self.parse_ident_led_expr(id),
            _ => {
                let tok = self.peek();
                Err(CompileError::syntax(format!(
                    "unexpected token {:?} (`{}`) at line {}", tok.kind, tok.text, tok.line
                )))
            }
        }
    }

    /// An expression in `return`/`break` position whose value is omitted whenever
    /// the next token cannot start one (end of statement or block).
    fn parse_optional_trailing_expr(&mut self) -> Result<Option<Expr>> {
        if matches!(self.peek_kind(), TokenKind::Semi | TokenKind::RBrace | TokenKind::Comma | TokenKind::RParen) {
            Ok(None)
        } else {
            Ok(Some(self.parse_expr()?))
        }
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let id = self.ids.next();
        self.expect(TokenKind::KwIf)?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = true;
        let cond = self.parse_expr()?;
        self.no_struct_literal = saved;
        let then_block = self.parse_block()?;
        let else_block = if self.eat(TokenKind::KwElse) {
            if self.at(TokenKind::KwIf) {
                let block_id = self.ids.next();
                let stmt_id = self.ids.next();
                let inner = self.parse_if()?;
                Some(Block { id: block_id, statements: Vec::new(), tail: Some(Box::new(StmtNode {
                    id: stmt_id, kind: StmtKind::Expr { expr: inner, has_semi: false },
                })) })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Box::new(ExprNode { id, kind: ExprKind::If(cond, then_block, else_block) }))
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let id = self.ids.next();
        self.expect(TokenKind::KwWhile)?;
        let saved = self.no_struct_literal;
        self.no_struct_literal = true;
        let cond = self.parse_expr()?;
        self.no_struct_literal = saved;
        let body = self.parse_block()?;
        Ok(Box::new(ExprNode { id, kind: ExprKind::While(cond, body) }))
    }

    /// Handles bare identifiers, `Type::name` paths, and `Name { .. }` struct literals.
    fn parse_ident_led_expr(&mut self, id: NodeId) -> Result<Expr> {
        let name = if self.eat(TokenKind::KwSelfUpper) {
            symbol::intern("Self")
        } else {
            self.intern_ident()?
        };
        if self.eat(TokenKind::ColonColon) {
            let member = self.intern_ident()?;
            let ty_id = self.ids.next();
            let ty = Box::new(TypeNode { id: ty_id, kind: TypeKind::Path { name, reference: RefKind::None } });
            return Ok(Box::new(ExprNode { id, kind: ExprKind::Path(ty, member) }));
        }
        if self.at(TokenKind::LBrace) && !self.no_struct_literal {
            return self.parse_struct_literal(id, name);
        }
        Ok(Box::new(ExprNode { id, kind: ExprKind::Identifier(name) }))
    }

    fn parse_struct_literal(&mut self, id: NodeId, name: Symbol) -> Result<Expr> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let fname = self.intern_ident()?;
            let value = if self.eat(TokenKind::Colon) {
                self.parse_expr()?
            } else {
                let shorthand_id = self.ids.next();
                Box::new(ExprNode { id: shorthand_id, kind: ExprKind::Identifier(fname) })
            };
            fields.push((fname, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Box::new(ExprNode { id, kind: ExprKind::Struct(name, fields) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_main() {
        let (items, _) = parse_program("fn main() { }").unwrap();
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].kind, ItemKind::Fn(_)));
    }

    #[test]
    fn parses_let_and_if_expr_statement() {
        let src = "fn f() -> i32 { let mut x = 1; if x > 0 { x = x + 1; } x }";
        let (items, _) = parse_program(src).unwrap();
        let ItemKind::Fn(sig) = &items[0].kind else { panic!() };
        assert_eq!(sig.body.statements.len(), 2);
        assert!(sig.body.tail.is_some());
    }

    #[test]
    fn parses_struct_and_impl_with_method() {
        let src = "struct Point { x: i32, y: i32 } impl Point { fn sum(&self) -> i32 { self.x + self.y } }";
        let (items, _) = parse_program(src).unwrap();
        assert!(matches!(items[0].kind, ItemKind::Struct { .. }));
        let ItemKind::Impl { items: methods, .. } = &items[1].kind else { panic!() };
        let ItemKind::Fn(sig) = &methods[0].kind else { panic!() };
        assert_eq!(sig.receiver, ReceiverKind::Ref);
    }

    #[test]
    fn parses_array_repeat_and_index() {
        let src = "fn f() { let a = [0; 3]; let b = a[0]; }";
        let (items, _) = parse_program(src).unwrap();
        let ItemKind::Fn(sig) = &items[0].kind else { panic!() };
        assert_eq!(sig.body.statements.len(), 2);
    }
}
