// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! When a running program suspends again.

use std::fmt;

/// Where the execution thread is, as far as stepping cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Frame depth (`main` runs at 1)
    pub depth: usize,
    /// Source line of the instruction, if annotated
    pub line: Option<u32>,
    /// Source column of the instruction, if annotated
    pub column: Option<u32>,
}

/// The kinds of step a controller can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Suspend before the next instruction, wherever it is
    Into,
    /// Suspend at the next instruction not deeper than the current frame
    Over,
    /// Suspend once the current frame has returned
    Out,
    /// Like `Over`, but only once the source line changes
    PastLine,
    /// Like `Over`, but only once the source line or column changes
    PastColumn,
}

/// Condition checked before every instruction while the program runs.
///
/// `should_suspend` is a pure function of the condition and the position,
/// so it can be inspected and tested without a running program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeCondition {
    /// Run until a breakpoint or an explicit suspend
    #[default]
    Never,
    /// Suspend before the next instruction
    Always,
    /// Suspend at depth `<= depth`
    StepOver {
        /// Depth the step started at
        depth: usize,
    },
    /// Suspend at depth `< depth`
    StepOut {
        /// Depth the step started at
        depth: usize,
    },
    /// Suspend at depth `< depth`, or at `depth` on a different line
    PastLine {
        /// Depth the step started at
        depth: usize,
        /// Line the step started on
        line: Option<u32>,
    },
    /// Suspend at depth `< depth`, or at `depth` on a different position
    PastColumn {
        /// Depth the step started at
        depth: usize,
        /// Line the step started on
        line: Option<u32>,
        /// Column the step started on
        column: Option<u32>,
    },
}

impl ResumeCondition {
    /// The condition for a step taken from `from`.
    pub fn for_step(kind: StepKind, from: Position) -> Self {
        let depth = from.depth;
        match kind {
            StepKind::Into => ResumeCondition::Always,
            StepKind::Over => ResumeCondition::StepOver { depth },
            StepKind::Out => ResumeCondition::StepOut { depth },
            StepKind::PastLine => ResumeCondition::PastLine {
                depth,
                line: from.line,
            },
            StepKind::PastColumn => ResumeCondition::PastColumn {
                depth,
                line: from.line,
                column: from.column,
            },
        }
    }

    /// Whether the program should suspend before the instruction at `at`.
    pub fn should_suspend(&self, at: Position) -> bool {
        match *self {
            ResumeCondition::Never => false,
            ResumeCondition::Always => true,
            ResumeCondition::StepOver { depth } => at.depth <= depth,
            ResumeCondition::StepOut { depth } => at.depth < depth,
            ResumeCondition::PastLine { depth, line } => {
                at.depth < depth || (at.depth == depth && at.line.is_some() && at.line != line)
            }
            ResumeCondition::PastColumn {
                depth,
                line,
                column,
            } => {
                at.depth < depth
                    || (at.depth == depth
                        && at.line.is_some()
                        && (at.line, at.column) != (line, column))
            }
        }
    }
}

impl fmt::Display for ResumeCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeCondition::Never => write!(f, "run"),
            ResumeCondition::Always => write!(f, "step"),
            ResumeCondition::StepOver { depth } => write!(f, "step over (depth {})", depth),
            ResumeCondition::StepOut { depth } => write!(f, "step out (depth {})", depth),
            ResumeCondition::PastLine { depth, .. } => write!(f, "step past line (depth {})", depth),
            ResumeCondition::PastColumn { depth, .. } => {
                write!(f, "step past column (depth {})", depth)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(depth: usize, line: Option<u32>, column: Option<u32>) -> Position {
        Position {
            depth,
            line,
            column,
        }
    }

    #[test]
    fn test_never_and_always() {
        assert!(!ResumeCondition::Never.should_suspend(at(1, None, None)));
        assert!(ResumeCondition::Always.should_suspend(at(9, None, None)));
    }

    #[test]
    fn test_step_over_never_stops_deeper() {
        let cond = ResumeCondition::for_step(StepKind::Over, at(2, Some(1), None));
        assert!(!cond.should_suspend(at(3, Some(1), None)));
        assert!(!cond.should_suspend(at(7, None, None)));
        assert!(cond.should_suspend(at(2, Some(1), None)));
        assert!(cond.should_suspend(at(1, None, None)));
    }

    #[test]
    fn test_step_out() {
        let cond = ResumeCondition::for_step(StepKind::Out, at(2, None, None));
        assert!(!cond.should_suspend(at(2, None, None)));
        assert!(!cond.should_suspend(at(3, None, None)));
        assert!(cond.should_suspend(at(1, None, None)));
    }

    #[test]
    fn test_step_past_line() {
        let cond = ResumeCondition::for_step(StepKind::PastLine, at(1, Some(4), Some(2)));
        assert!(!cond.should_suspend(at(1, Some(4), Some(9))));
        assert!(!cond.should_suspend(at(1, None, None)));
        assert!(!cond.should_suspend(at(2, Some(10), Some(1))));
        assert!(cond.should_suspend(at(1, Some(5), Some(1))));
        assert!(cond.should_suspend(at(0, None, None)));
    }

    #[test]
    fn test_step_past_column() {
        let cond = ResumeCondition::for_step(StepKind::PastColumn, at(1, Some(4), Some(2)));
        assert!(!cond.should_suspend(at(1, Some(4), Some(2))));
        assert!(cond.should_suspend(at(1, Some(4), Some(3))));
        assert!(cond.should_suspend(at(1, Some(5), Some(2))));
    }
}
