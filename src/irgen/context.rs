//! Per-function and per-loop generation state (SPEC_FULL.md §4.4).

use hashbrown::HashMap;

use crate::types::ir::IrValue;
use crate::types::LetId;

/// The two blocks and (optional) result slot a `break`/`continue` inside the
/// innermost enclosing loop needs.
pub struct LoopContext {
    pub continue_target: usize,
    pub break_target: usize,
    /// `Some` only for a `loop { ... }` whose `break <value>` produces a result
    /// (`while` loops always evaluate to `()`, so they never need one).
    pub break_slot: Option<IrValue>,
}

pub struct FunctionContext {
    pub return_block: usize,
    /// `None` for a function returning `()`/never falling through with a value.
    pub return_slot: Option<IrValue>,
    /// The receiver's own stack slot, addressed by `self` and `SelfExpr`.
    pub self_slot: Option<IrValue>,
    pub let_slots: HashMap<LetId, IrValue>,
    pub loop_stack: Vec<LoopContext>,
}
