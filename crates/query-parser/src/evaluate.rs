use itertools::Itertools;

use crate::error::InvalidPostfix;
use crate::Operator;

/// One entry of a postfix list ready for evaluation: an operand that has been
/// substituted for a word token, or an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Item<T> {
    Operand(T),
    Operator(Operator),
}

/// The meaning given to the boolean operators during evaluation.
///
/// The evaluator is generic over this trait: the same postfix list runs once
/// over document-id lists to compute the result set and once per candidate
/// document over occurrence counts to compute its score. `NOT` is unary but
/// needs the ambient universe, which the implementation captures.
pub trait Semantics {
    type Operand;

    fn and(&self, lhs: Self::Operand, rhs: Self::Operand) -> Self::Operand;
    fn or(&self, lhs: Self::Operand, rhs: Self::Operand) -> Self::Operand;
    fn not(&self, operand: Self::Operand) -> Self::Operand;
}

/// Evaluates a postfix item list, consuming it from the tail.
pub fn evaluate<S: Semantics>(
    postfix: &mut Vec<Item<S::Operand>>,
    semantics: &S,
) -> Result<S::Operand, InvalidPostfix> {
    match postfix.pop().ok_or(InvalidPostfix)? {
        Item::Operand(operand) => Ok(operand),
        Item::Operator(Operator::Not) => {
            let operand = evaluate(postfix, semantics)?;
            Ok(semantics.not(operand))
        }
        Item::Operator(Operator::And) => {
            let rhs = evaluate(postfix, semantics)?;
            let lhs = evaluate(postfix, semantics)?;
            Ok(semantics.and(lhs, rhs))
        }
        Item::Operator(Operator::Or) => {
            let rhs = evaluate(postfix, semantics)?;
            let lhs = evaluate(postfix, semantics)?;
            Ok(semantics.or(lhs, rhs))
        }
        // parentheses never survive the conversion
        Item::Operator(_) => Err(InvalidPostfix),
    }
}

/// Set interpretation: operands are ordered, duplicate-free id lists.
pub struct SetSemantics<'a, T> {
    /// Every possible element; `NOT` is the difference against it.
    pub universe: &'a [T],
}

impl<T: PartialEq + Clone> Semantics for SetSemantics<'_, T> {
    type Operand = Vec<T>;

    /// Intersection, keeping the order of the left operand.
    fn and(&self, lhs: Vec<T>, rhs: Vec<T>) -> Vec<T> {
        lhs.into_iter().filter(|x| rhs.contains(x)).collect()
    }

    /// Left and right interleaved, the remainder appended; elements already
    /// present on the left are dropped from the right beforehand.
    fn or(&self, lhs: Vec<T>, rhs: Vec<T>) -> Vec<T> {
        let rhs: Vec<T> = rhs.into_iter().filter(|x| !lhs.contains(x)).collect();
        lhs.into_iter().interleave(rhs).collect()
    }

    fn not(&self, operand: Vec<T>) -> Vec<T> {
        self.universe.iter().filter(|x| !operand.contains(x)).cloned().collect()
    }
}

/// Integer interpretation used for scoring: operands are occurrence counts.
///
/// The arithmetic is the fixed scoring convention, not a consequence of the
/// set semantics; changing it changes every ranking.
pub struct CountSemantics {
    /// Total number of tokens in the document under scoring.
    pub total: i64,
}

impl Semantics for CountSemantics {
    type Operand = i64;

    fn and(&self, lhs: i64, rhs: i64) -> i64 {
        (lhs - rhs).abs()
    }

    fn or(&self, lhs: i64, rhs: i64) -> i64 {
        lhs + rhs
    }

    fn not(&self, operand: i64) -> i64 {
        self.total - operand
    }
}
