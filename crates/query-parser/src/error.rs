use thiserror::Error;

/// Errors reported while turning a raw query into a postfix token list.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInput),
    /// The quit keyword was found in the expression.
    #[error("quit requested")]
    QuitRequested,
}

/// A query that cannot be converted. These are user errors: the console
/// reports them and prompts again.
#[derive(Debug, Error)]
pub enum InvalidInput {
    #[error("the query is empty")]
    EmptyQuery,
    #[error("unequal number of quotes")]
    UnbalancedQuotes,
    #[error("a quoted phrase must be separated from the surrounding words by whitespace")]
    MisplacedQuote,
    #[error("unequal number of parenthesis")]
    UnbalancedParenthesis,
    #[error("the query cannot start with `{0}`")]
    LeadingOperator(String),
    #[error("the query cannot end with `{0}`")]
    TrailingOperator(String),
    #[error("wrong syntax: `{0} {1}`")]
    AdjacentOperators(String, String),
    #[error("wrong syntax")]
    Truncated,
}

/// `pop` or `top` was called on an empty [`Stack`](crate::Stack).
#[derive(Debug, Error)]
#[error("the stack is empty")]
pub struct StackEmpty;

/// A postfix item list that does not reduce to a single operand.
///
/// Lists built from [`BooleanQuery::parse`](crate::BooleanQuery::parse)
/// output always reduce; hitting this means the caller assembled the items
/// by hand and got the shape wrong.
#[derive(Debug, Error)]
#[error("malformed postfix expression")]
pub struct InvalidPostfix;
