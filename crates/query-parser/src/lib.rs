//! Parser for the boolean query language of the search console.
//!
//! ```text
//! expression = term (("AND" | "OR" | WS) term)*
//! term       = ["NOT"] (word | phrase | "(" expression ")")
//! phrase     = '"' word (WS word)* '"'
//! word       = anything free of `& | ! ( )` and whitespace
//! ```
//!
//! The conversion works on the raw string, in order:
//!
//! 1. keyword substitution: `AND` → `&`, `OR` → `|`, `NOT` → `!`, and the
//!    phrase marker `$` is stripped. The substitution is literal,
//!    case-sensitive and applies to the whole string, so a keyword embedded
//!    in a word is rewritten too (`HANDY` reads `H AND Y`);
//! 2. the `QUIT` sentinel check on the substituted string;
//! 3. phrase extraction: every `"…"` span becomes a generated `$_KEY-N`
//!    token and its cleaned text is stored in the phrase map under `_KEY-N`;
//! 4. implicit `&` between adjacent words and in front of every unary `!`;
//! 5. shunting-yard conversion to a postfix token list, with a validity pass
//!    keyed off the empty-string artifacts of the character tokenizer.
//!
//! Evaluation of a postfix list is generic over [`Semantics`]: the search
//! side substitutes posting lists and runs [`SetSemantics`], the ranking
//! side substitutes occurrence counts and runs [`CountSemantics`].

mod error;
mod evaluate;
mod stack;

use std::collections::HashMap;
use std::fmt;
use std::mem;

pub use error::{Error, InvalidInput, InvalidPostfix, StackEmpty};
pub use evaluate::{evaluate, CountSemantics, Item, Semantics, SetSemantics};
pub use stack::Stack;

/// Marker distinguishing generated phrase keys from plain words.
pub const PHRASE_MARKER: char = '$';

const QUIT_KEYWORD: &str = "QUIT";

/// Keyword substitutions applied to the raw expression, in this order.
const KEYWORDS: [(&str, &str); 4] = [("AND", "&"), ("OR", "|"), ("NOT", "!"), ("$", "")];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Not,
    OpenParen,
    CloseParen,
}

impl Operator {
    fn from_char(c: char) -> Option<Operator> {
        match c {
            '&' => Some(Operator::And),
            '|' => Some(Operator::Or),
            '!' => Some(Operator::Not),
            '(' => Some(Operator::OpenParen),
            ')' => Some(Operator::CloseParen),
            _ => None,
        }
    }

    /// Recognizes a token that is exactly one operator character.
    fn from_token(token: &str) -> Option<Operator> {
        let mut chars = token.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Operator::from_char(c),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Operator::And => '&',
            Operator::Or => '|',
            Operator::Not => '!',
            Operator::OpenParen => '(',
            Operator::CloseParen => ')',
        }
    }

    fn priority(self) -> u8 {
        match self {
            Operator::OpenParen | Operator::CloseParen => 100,
            Operator::Not => 10,
            Operator::And => 5,
            Operator::Or => 1,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// One token of a converted query, ready for operand substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A plain word, or a generated phrase key starting with [`PHRASE_MARKER`].
    Word(String),
    Operator(Operator),
}

impl Token {
    pub fn is_phrase_key(&self) -> bool {
        matches!(self, Token::Word(word) if word.starts_with(PHRASE_MARKER))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => f.write_str(word),
            Token::Operator(operator) => write!(f, "{operator}"),
        }
    }
}

/// A parsed boolean query: the postfix token list plus the phrases that were
/// replaced by generated keys.
#[derive(Debug, Default)]
pub struct BooleanQuery {
    pub postfix: Vec<Token>,
    /// Phrase text by key, stored without the leading marker.
    pub phrases: HashMap<String, String>,
}

impl BooleanQuery {
    pub fn parse(expression: &str) -> Result<BooleanQuery, Error> {
        let mut phrases = HashMap::new();
        let mut tokens = validate_expression(expression, &mut phrases)?;
        insert_implied_and(&mut tokens);
        let postfix = convert_postfix(&tokens)?;
        Ok(BooleanQuery { postfix, phrases })
    }

    /// Looks up a phrase by its generated key, with or without the marker.
    pub fn phrase(&self, key: &str) -> Option<&str> {
        let key = key.strip_prefix(PHRASE_MARKER).unwrap_or(key);
        self.phrases.get(key).map(String::as_str)
    }
}

/// Substitutes keywords, extracts phrases and inserts the implicit `&`
/// between words, then splits the expression into tokens. Segments between
/// two adjacent operator characters come out as empty strings; the validity
/// pass in [`convert_postfix`] keys off those artifacts.
fn validate_expression(
    expression: &str,
    phrases: &mut HashMap<String, String>,
) -> Result<Vec<String>, Error> {
    if expression.trim().is_empty() {
        return Err(InvalidInput::EmptyQuery.into());
    }

    let mut expression = expression.to_owned();
    for (keyword, sign) in KEYWORDS {
        expression = expression.replace(keyword, sign);
    }

    if expression.contains(QUIT_KEYWORD) {
        return Err(Error::QuitRequested);
    }

    let expression = replace_phrases(&expression, phrases)?;

    let expression = if !expression.contains(['&', '|', '!']) {
        expression.split_whitespace().collect::<Vec<_>>().join("&")
    } else {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let mut joined = String::with_capacity(expression.len());
        for (i, part) in parts.iter().enumerate() {
            joined.push_str(part);
            if is_operand(part) && parts.get(i + 1).is_some_and(|next| is_operand(next)) {
                joined.push('&');
            }
        }
        joined
    };

    Ok(tokenize(&expression))
}

fn is_operand(token: &str) -> bool {
    Operator::from_token(token).is_none()
}

fn tokenize(expression: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in expression.chars() {
        if Operator::from_char(c).is_some() {
            tokens.push(mem::take(&mut word));
            tokens.push(c.to_string());
        } else {
            word.push(c);
        }
    }
    tokens.push(word);
    tokens
}

/// Replaces every quoted span with a generated `$_KEY-N` token.
///
/// A quote must open at the start of the expression or after whitespace, and
/// close at the end or before whitespace. The stored phrase text is the span
/// without its quotes, with operator characters and markers removed, trimmed.
fn replace_phrases(
    expression: &str,
    phrases: &mut HashMap<String, String>,
) -> Result<String, InvalidInput> {
    let chars: Vec<char> = expression.chars().collect();
    let mut output = String::with_capacity(expression.len());
    let mut key_counter = 1usize;
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '"' {
            output.push(chars[i]);
            i += 1;
            continue;
        }
        if i > 0 && !chars[i - 1].is_whitespace() {
            return Err(InvalidInput::MisplacedQuote);
        }
        let close = chars[i + 1..]
            .iter()
            .position(|&c| c == '"')
            .map(|offset| i + 1 + offset)
            .ok_or(InvalidInput::UnbalancedQuotes)?;
        if close + 1 < chars.len() && !chars[close + 1].is_whitespace() {
            return Err(InvalidInput::MisplacedQuote);
        }

        let key = format!("{PHRASE_MARKER}_KEY-{key_counter}");
        key_counter += 1;
        let phrase: String = chars[i + 1..close]
            .iter()
            .filter(|&&c| !matches!(c, '&' | '|' | '!' | PHRASE_MARKER))
            .collect();
        phrases.insert(key[1..].to_owned(), phrase.trim().to_owned());
        output.push_str(&key);
        i = close + 1;
    }

    Ok(output)
}

/// Inserts the implied `&` in front of every `!` that directly follows an
/// operand, so that `python NOT class` reads `python AND NOT class`.
fn insert_implied_and(tokens: &mut Vec<String>) {
    let positions: Vec<usize> = tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| {
            if token != "!" || i == 0 {
                return None;
            }
            let prev = &tokens[i - 1];
            if !prev.is_empty() {
                is_operand(prev).then_some(i)
            } else {
                (i >= 2 && is_operand(&tokens[i - 2])).then_some(i)
            }
        })
        .collect();

    for (inserted, position) in positions.into_iter().enumerate() {
        tokens.insert(position + inserted, "&".to_owned());
    }
}

fn legal_after_operator(token: &str) -> bool {
    token == "(" || token == "!"
}

fn legal_before_operator(token: &str) -> bool {
    token == ")"
}

/// Shunting-yard conversion of the validated token list.
///
/// The empty-string artifacts mark spots where two operator characters were
/// adjacent in the expression; they drive the remaining syntax checks. A `)`
/// directly followed by `!` gets an `&` injected between the two.
fn convert_postfix(tokens: &[String]) -> Result<Vec<Token>, Error> {
    let mut output = Vec::new();
    let mut stack = Stack::new();

    for (i, token) in tokens.iter().enumerate() {
        let mut operator = Operator::from_token(token);

        if operator.is_none() && !token.is_empty() {
            output.push(Token::Word(token.clone()));
            continue;
        }

        if token.is_empty() {
            if i == 0 {
                let next = tokens.get(i + 1).ok_or(InvalidInput::Truncated)?;
                if !legal_after_operator(next) {
                    return Err(InvalidInput::LeadingOperator(next.clone()).into());
                }
            } else if i == tokens.len() - 1 {
                let prev = &tokens[i - 1];
                if !legal_before_operator(prev) {
                    return Err(InvalidInput::TrailingOperator(prev.clone()).into());
                }
            } else {
                let prev = &tokens[i - 1];
                let next = &tokens[i + 1];
                if legal_before_operator(prev) && next == "(" {
                    return Err(InvalidInput::AdjacentOperators(prev.clone(), next.clone()).into());
                }
                if legal_before_operator(prev) && next == "!" {
                    operator = Some(Operator::And);
                }
                if !legal_before_operator(prev) && !legal_after_operator(next) {
                    return Err(InvalidInput::AdjacentOperators(prev.clone(), next.clone()).into());
                }
                if prev == "!" && next == "!" {
                    return Err(InvalidInput::AdjacentOperators(prev.clone(), next.clone()).into());
                }
            }
        }

        let Some(operator) = operator else { continue };

        if operator == Operator::CloseParen {
            if stack.is_empty() {
                return Err(InvalidInput::UnbalancedParenthesis.into());
            }
            loop {
                let top = stack.pop().map_err(|_| InvalidInput::UnbalancedParenthesis)?;
                if top == Operator::OpenParen {
                    break;
                }
                output.push(Token::Operator(top));
            }
            continue;
        }

        loop {
            match stack.top() {
                Ok(&top) if top != Operator::OpenParen && top.priority() >= operator.priority() => {
                    output.push(Token::Operator(top));
                    let _ = stack.pop();
                }
                _ => break,
            }
        }
        stack.push(operator);
    }

    while let Ok(operator) = stack.pop() {
        if operator == Operator::OpenParen {
            return Err(InvalidInput::UnbalancedParenthesis.into());
        }
        output.push(Token::Operator(operator));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;

    #[track_caller]
    fn p(expression: &str) -> String {
        let query = BooleanQuery::parse(expression).unwrap();
        query.postfix.iter().map(|token| token.to_string()).collect::<Vec<_>>().join(" ")
    }

    #[track_caller]
    fn err(expression: &str) -> String {
        match BooleanQuery::parse(expression).unwrap_err() {
            Error::InvalidInput(error) => error.to_string(),
            Error::QuitRequested => S("quit requested"),
        }
    }

    #[test]
    fn keywords_and_signs() {
        insta::assert_snapshot!(p("python AND class"), @"python class &");
        insta::assert_snapshot!(p("python & class"), @"python class &");
        insta::assert_snapshot!(p("python OR java"), @"python java |");
        insta::assert_snapshot!(p("NOT class"), @"class !");
        insta::assert_snapshot!(p("python"), @"python");
    }

    #[test]
    fn implicit_conjunction() {
        assert_eq!(p("a b c"), p("a AND b AND c"));
        assert_eq!(p("a NOT b"), p("a AND NOT b"));
        insta::assert_snapshot!(p("a b c"), @"a b & c &");
        insta::assert_snapshot!(p("a NOT b"), @"a b ! &");
        // adjacent words inside parentheses are conjoined too
        insta::assert_snapshot!(p("a OR (b c)"), @"a b c & |");
    }

    #[test]
    fn precedence_and_parentheses() {
        insta::assert_snapshot!(p("a OR b AND c"), @"a b c & |");
        insta::assert_snapshot!(p("(a OR b) AND c"), @"a b | c &");
        insta::assert_snapshot!(p("a AND NOT b OR c"), @"a b ! & c |");
        insta::assert_snapshot!(p("(a) AND NOT (b OR c)"), @"a b c | ! &");
        insta::assert_snapshot!(p("(a OR b) NOT c"), @"a b | c ! &");
    }

    #[test]
    fn phrases() {
        let query = BooleanQuery::parse("\"big bad wolf\" AND hunter").unwrap();
        let postfix =
            query.postfix.iter().map(|token| token.to_string()).collect::<Vec<_>>().join(" ");
        insta::assert_snapshot!(postfix, @"$_KEY-1 hunter &");
        assert_eq!(query.phrase("$_KEY-1"), Some("big bad wolf"));
        assert_eq!(query.phrase("_KEY-1"), Some("big bad wolf"));

        let query = BooleanQuery::parse("\"lazy dog\" OR \"quick fox\"").unwrap();
        assert_eq!(query.phrase("_KEY-1"), Some("lazy dog"));
        assert_eq!(query.phrase("_KEY-2"), Some("quick fox"));

        // keywords inside a phrase are substituted, then the signs stripped
        let query = BooleanQuery::parse("\"to AND or NOT\"").unwrap();
        assert_eq!(query.phrase("_KEY-1"), Some("to  or"));
    }

    #[test]
    fn quit_sentinel() {
        assert!(matches!(BooleanQuery::parse("QUIT").unwrap_err(), Error::QuitRequested));
        assert!(matches!(BooleanQuery::parse("a AND QUIT").unwrap_err(), Error::QuitRequested));
        // the check runs before phrase extraction, so quotes do not hide it
        assert!(matches!(BooleanQuery::parse("\"QUIT\"").unwrap_err(), Error::QuitRequested));
    }

    #[test]
    fn embedded_keywords_are_rewritten() {
        // whole-string substitution: HANDY reads H AND Y
        insta::assert_snapshot!(p("HANDY"), @"H Y &");
        insta::assert_snapshot!(err("ANDREW"), @"the query cannot start with `&`");
    }

    #[test]
    fn invalid_expressions() {
        insta::assert_snapshot!(err(""), @"the query is empty");
        insta::assert_snapshot!(err("   "), @"the query is empty");
        insta::assert_snapshot!(err("a AND"), @"the query cannot end with `&`");
        insta::assert_snapshot!(err("AND b"), @"the query cannot start with `&`");
        insta::assert_snapshot!(err("a AND AND b"), @"wrong syntax: `& &`");
        insta::assert_snapshot!(err("a NOT NOT b"), @"wrong syntax: `! !`");
        insta::assert_snapshot!(err("(a"), @"unequal number of parenthesis");
        insta::assert_snapshot!(err("a)"), @"unequal number of parenthesis");
        insta::assert_snapshot!(err("(a)(b)"), @"wrong syntax: `) (`");
        insta::assert_snapshot!(err("\"unclosed"), @"unequal number of quotes");
        insta::assert_snapshot!(
            err("tail\"no space\""),
            @"a quoted phrase must be separated from the surrounding words by whitespace"
        );
    }
}
