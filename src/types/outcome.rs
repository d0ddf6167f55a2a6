//! The control-flow outcome lattice (SPEC_FULL.md §3.6).

use bitflags::bitflags;

bitflags! {
    /// Which control outcomes a node may produce. `DIVERGE` is the empty set: no bit
    /// set means the node never falls through, returns, breaks, or continues —
    /// execution simply never reaches past it any other way (e.g. an infinite loop
    /// with no reachable break).
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct OutcomeState: u8 {
        const NEXT     = 0b0001;
        const RETURN   = 0b0010;
        const BREAK    = 0b0100;
        const CONTINUE = 0b1000;
    }
}

impl OutcomeState {
    pub const DIVERGE: OutcomeState = OutcomeState::empty();

    pub fn can_continue(self) -> bool {
        self.contains(OutcomeState::NEXT)
    }

    /// `seq(a, b)`: `a` if `a` cannot fall through, else `(a \ NEXT) ∪ b`.
    pub fn seq(a: OutcomeState, b: OutcomeState) -> OutcomeState {
        if !a.can_continue() {
            a
        } else {
            (a - OutcomeState::NEXT) | b
        }
    }

    /// `if c then T else E`, with a missing `else` acting like `{NEXT}`.
    pub fn if_merge(cond: OutcomeState, then_branch: OutcomeState, else_branch: Option<OutcomeState>) -> OutcomeState {
        let else_branch = else_branch.unwrap_or(OutcomeState::NEXT);
        OutcomeState::seq(cond, then_branch | else_branch)
    }

    /// `while c { B }`: the loop itself always has NEXT (the body may not run).
    pub fn while_loop(cond: OutcomeState, body: OutcomeState) -> OutcomeState {
        let body_without_loop_bits = body - (OutcomeState::BREAK | OutcomeState::CONTINUE);
        OutcomeState::seq(cond, OutcomeState::NEXT | body_without_loop_bits)
    }

    /// `loop { B }`: NEXT only appears if the body can break; otherwise the loop
    /// diverges, carrying through RETURN if the body can return.
    pub fn loop_loop(body: OutcomeState) -> OutcomeState {
        if body.contains(OutcomeState::BREAK) {
            let non_loop_bits = body - (OutcomeState::BREAK | OutcomeState::CONTINUE);
            OutcomeState::NEXT | non_loop_bits
        } else {
            body & OutcomeState::RETURN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_short_circuits_on_diverging_left() {
        let a = OutcomeState::RETURN;
        let b = OutcomeState::NEXT;
        assert_eq!(OutcomeState::seq(a, b), OutcomeState::RETURN);
    }

    #[test]
    fn seq_merges_when_left_continues() {
        let a = OutcomeState::NEXT;
        let b = OutcomeState::RETURN;
        assert_eq!(OutcomeState::seq(a, b), OutcomeState::RETURN);
    }

    #[test]
    fn while_always_has_next() {
        let cond = OutcomeState::NEXT;
        let body = OutcomeState::BREAK | OutcomeState::CONTINUE;
        let result = OutcomeState::while_loop(cond, body);
        assert!(result.contains(OutcomeState::NEXT));
        assert!(!result.contains(OutcomeState::BREAK));
        assert!(!result.contains(OutcomeState::CONTINUE));
    }

    #[test]
    fn loop_without_break_diverges() {
        let body = OutcomeState::RETURN;
        assert_eq!(OutcomeState::loop_loop(body), OutcomeState::RETURN);
    }

    #[test]
    fn loop_with_break_has_next() {
        let body = OutcomeState::BREAK | OutcomeState::RETURN;
        let result = OutcomeState::loop_loop(body);
        assert!(result.contains(OutcomeState::NEXT));
        assert!(result.contains(OutcomeState::RETURN));
        assert!(!result.contains(OutcomeState::BREAK));
    }
}
