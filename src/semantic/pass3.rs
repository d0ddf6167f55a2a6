//! Pass 3 (SPEC_FULL.md §4.1.3-4.1.4): evaluates every `const` item so its value
//! is available regardless of whether anything references it, then runs a
//! bottom-up control-flow outcome visitor over every function body, populating
//! `Program::node_outcomes` and rejecting `break`/`continue` outside a loop.

use crate::error::{CompileError, Result};
use crate::types::ast::*;
use crate::types::outcome::OutcomeState;
use crate::types::ConstId;

use super::{constfold, Program};

pub fn compute_outcomes(items: &[Item], prog: &mut Program) -> Result<()> {
    for i in 0..prog.consts.len() {
        constfold::eval_const_id(items, prog, ConstId(i as u32))?;
    }

    let mut p = Pass3 { prog, loop_depth: 0 };
    for item in items {
        p.walk_top_item(item)?;
    }
    Ok(())
}

struct Pass3<'p> {
    prog: &'p mut Program,
    loop_depth: u32,
}

impl<'p> Pass3<'p> {
    fn walk_top_item(&mut self, item: &Item) -> Result<()> {
        match &item.kind {
            ItemKind::Fn(sig) => {
                let saved = self.loop_depth;
                self.loop_depth = 0;
                let result = self.block_outcome(&sig.body);
                self.loop_depth = saved;
                result.map(|_| ())
            }
            ItemKind::Impl { items, .. } => {
                for inner in items {
                    self.walk_top_item(inner)?;
                }
                Ok(())
            }
            ItemKind::Struct { .. } | ItemKind::Enum { .. } | ItemKind::Const { .. } => Ok(()),
        }
    }

    fn block_outcome(&mut self, block: &Block) -> Result<OutcomeState> {
        let mut acc = OutcomeState::NEXT;
        for stmt in &block.statements {
            let so = self.stmt_outcome(stmt)?;
            acc = OutcomeState::seq(acc, so);
        }
        if let Some(tail) = &block.tail {
            let to = self.stmt_outcome(tail)?;
            acc = OutcomeState::seq(acc, to);
        }
        self.prog.node_outcomes.insert(block.id, acc);
        Ok(acc)
    }

    fn stmt_outcome(&mut self, stmt: &Stmt) -> Result<OutcomeState> {
        let o = match &stmt.kind {
            StmtKind::Let { init, .. } => match init {
                Some(e) => self.expr_outcome(e)?,
                None => OutcomeState::NEXT,
            },
            StmtKind::Expr { expr, .. } => self.expr_outcome(expr)?,
            StmtKind::Item(item) => {
                self.walk_top_item(item)?;
                OutcomeState::NEXT
            }
        };
        self.prog.node_outcomes.insert(stmt.id, o);
        Ok(o)
    }

    fn expr_outcome(&mut self, expr: &Expr) -> Result<OutcomeState> {
        let o = match &expr.kind {
            ExprKind::Literal(..) | ExprKind::Identifier(_) | ExprKind::SelfExpr | ExprKind::Unit | ExprKind::Path(..) => {
                OutcomeState::NEXT
            }
            ExprKind::Binary(_, l, r) => {
                let lo = self.expr_outcome(l)?;
                let ro = self.expr_outcome(r)?;
                OutcomeState::seq(lo, ro)
            }
            ExprKind::Unary(_, e) => self.expr_outcome(e)?,
            ExprKind::Call(callee, args) => {
                let mut acc = self.expr_outcome(callee)?;
                for a in args {
                    acc = OutcomeState::seq(acc, self.expr_outcome(a)?);
                }
                acc
            }
            ExprKind::Field(base, _) => self.expr_outcome(base)?,
            ExprKind::Struct(_, fields) => {
                let mut acc = OutcomeState::NEXT;
                for (_, v) in fields {
                    acc = OutcomeState::seq(acc, self.expr_outcome(v)?);
                }
                acc
            }
            ExprKind::Index(base, idx) => {
                let bo = self.expr_outcome(base)?;
                let io = self.expr_outcome(idx)?;
                OutcomeState::seq(bo, io)
            }
            ExprKind::Block(block) => self.block_outcome(block)?,
            ExprKind::If(cond, then_b, else_b) => {
                let co = self.expr_outcome(cond)?;
                let to = self.block_outcome(then_b)?;
                let eo = match else_b {
                    Some(e) => Some(self.block_outcome(e)?),
                    None => None,
                };
                OutcomeState::if_merge(co, to, eo)
            }
            ExprKind::While(cond, body) => {
                let co = self.expr_outcome(cond)?;
                self.loop_depth += 1;
                let bo = self.block_outcome(body);
                self.loop_depth -= 1;
                OutcomeState::while_loop(co, bo?)
            }
            ExprKind::Loop(body) => {
                self.loop_depth += 1;
                let bo = self.block_outcome(body);
                self.loop_depth -= 1;
                OutcomeState::loop_loop(bo?)
            }
            ExprKind::Return(v) => {
                let inner = match v {
                    Some(e) => self.expr_outcome(e)?,
                    None => OutcomeState::NEXT,
                };
                OutcomeState::seq(inner, OutcomeState::RETURN)
            }
            ExprKind::Break(v) => {
                if self.loop_depth == 0 {
                    return Err(CompileError::semantic("`break` outside of a loop".to_string()));
                }
                let inner = match v {
                    Some(e) => self.expr_outcome(e)?,
                    None => OutcomeState::NEXT,
                };
                OutcomeState::seq(inner, OutcomeState::BREAK)
            }
            ExprKind::Continue(v) => {
                if self.loop_depth == 0 {
                    return Err(CompileError::semantic("`continue` outside of a loop".to_string()));
                }
                let inner = match v {
                    Some(e) => self.expr_outcome(e)?,
                    None => OutcomeState::NEXT,
                };
                OutcomeState::seq(inner, OutcomeState::CONTINUE)
            }
            ExprKind::Cast(e, _) => self.expr_outcome(e)?,
            ExprKind::Array(elems) => {
                let mut acc = OutcomeState::NEXT;
                for e in elems {
                    acc = OutcomeState::seq(acc, self.expr_outcome(e)?);
                }
                acc
            }
            ExprKind::RepeatArray(elem, size) => {
                let eo = self.expr_outcome(elem)?;
                let so = self.expr_outcome(size)?;
                OutcomeState::seq(eo, so)
            }
        };
        self.prog.node_outcomes.insert(expr.id, o);
        Ok(o)
    }
}
