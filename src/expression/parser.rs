use super::ExpressionError;
use super::ast::{Expr, Suffix};

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while};
use nom::character::complete::{char, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, cut, map, not, opt, recognize, value, verify};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{fold_many0, many0_count, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated};
use nom::{IResult, Input, Parser};
use nom_locate::LocatedSpan;

pub(crate) type ParserInput<'a> = LocatedSpan<&'a str>;
pub(crate) type NomError<'a> = nom::error::Error<ParserInput<'a>>;
pub(crate) type NomResult<'a, O, E = NomError<'a>> = IResult<ParserInput<'a>, O, E>;

/// Longest accepted expression, in bytes.
pub const MAX_SOURCE_LEN: usize = 1024;
/// Deepest accepted nesting of parentheses and brackets.
pub const MAX_NESTING: usize = 32;

const RESERVED: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif", "else", "except",
    "finally", "for", "from", "global", "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass",
    "raise", "return", "try", "while", "with", "yield", "True", "False", "None",
];

#[inline]
fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

#[inline]
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn symbol<'a>(c: char) -> impl Parser<ParserInput<'a>, Output = char, Error = NomError<'a>> {
    terminated(char(c), multispace0)
}

fn keyword<'a>(word: &'static str) -> impl Parser<ParserInput<'a>, Output = ParserInput<'a>, Error = NomError<'a>> {
    terminated(terminated(tag(word), not(satisfy(is_ident_char))), multispace0)
}

fn name(input: ParserInput) -> NomResult<String> {
    map(
        verify(
            terminated(recognize(pair(satisfy(is_ident_start), take_while(is_ident_char))), multispace0),
            |name: &ParserInput| !RESERVED.contains(name.fragment()),
        ),
        |name: ParserInput| name.fragment().to_string(),
    )
    .parse(input)
}

fn number(input: ParserInput) -> NomResult<Expr> {
    let (rest, digits) = terminated(recognize(pair(digit1, opt(pair(char('.'), digit1)))), multispace0).parse(input)?;
    let digits = *digits.fragment();

    let number = if digits.contains('.') {
        digits.parse::<f64>().ok().map(Expr::Real)
    } else {
        digits.parse::<i64>().ok().map(Expr::Integer)
    };

    match number {
        Some(number) => Ok((rest, number)),
        None => Err(nom::Err::Failure(NomError::from_error_kind(input, ErrorKind::Digit))),
    }
}

/// Quoted string with `'` or `"`; recognises the escapes `\\`, `\'`, `\"`,
/// `\n`, `\r` and `\t` and keeps any other backslash as written.
fn string_literal(input: ParserInput) -> NomResult<String> {
    let (body, quote) = alt((char('\''), char('"'))).parse(input)?;

    let mut text = String::new();
    let mut chars = body.fragment().char_indices();
    while let Some((index, c)) = chars.next() {
        if c == quote {
            let rest = body.take_from(index + c.len_utf8());
            let (rest, _) = multispace0::<ParserInput, NomError>(rest)?;
            return Ok((rest, text));
        }
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 'r')) => text.push('\r'),
                Some((_, 't')) => text.push('\t'),
                Some((_, escaped @ ('\\' | '\'' | '"'))) => text.push(escaped),
                Some((_, other)) => {
                    text.push('\\');
                    text.push(other);
                }
                None => break,
            },
            '\r' | '\n' => break,
            c => text.push(c),
        }
    }

    // Unterminated literal.
    Err(nom::Err::Failure(NomError::from_error_kind(input, ErrorKind::Char)))
}

fn primary(input: ParserInput) -> NomResult<Expr> {
    alt((
        map(string_literal, Expr::String),
        number,
        value(Expr::Boolean(true), keyword("True")),
        value(Expr::Boolean(false), keyword("False")),
        value(Expr::None, keyword("None")),
        map(name, Expr::Name),
        delimited(symbol('('), or_expr, cut(symbol(')'))),
    ))
    .parse(input)
}

fn arguments(input: ParserInput) -> NomResult<Vec<Expr>> {
    terminated(separated_list0(symbol(','), or_expr), opt(symbol(','))).parse(input)
}

fn subscript(input: ParserInput) -> NomResult<Suffix> {
    let (rest, start) = opt(or_expr).parse(input)?;
    let (rest, colon) = opt(symbol(':')).parse(rest)?;
    match (start, colon) {
        (Some(index), None) => Ok((rest, Suffix::Index(index))),
        (None, None) => Err(nom::Err::Error(NomError::from_error_kind(rest, ErrorKind::Verify))),
        (start, Some(_)) => {
            let (rest, end) = opt(or_expr).parse(rest)?;
            Ok((rest, Suffix::Slice(start, end)))
        }
    }
}

fn suffix(input: ParserInput) -> NomResult<Suffix> {
    alt((
        map(preceded(symbol('.'), cut(name)), Suffix::Attribute),
        map(delimited(symbol('('), arguments, cut(symbol(')'))), Suffix::Call),
        delimited(symbol('['), cut(subscript), cut(symbol(']'))),
    ))
    .parse(input)
}

fn postfix(input: ParserInput) -> NomResult<Expr> {
    let (mut rest, mut expr) = primary(input)?;
    loop {
        match suffix(rest) {
            Ok((next, op)) => {
                expr = op.apply(expr);
                rest = next;
            }
            Err(nom::Err::Error(_)) => return Ok((rest, expr)),
            Err(err) => return Err(err),
        }
    }
}

fn unary(input: ParserInput) -> NomResult<Expr> {
    let (rest, negations) = many0_count(symbol('-')).parse(input)?;
    let (rest, expr) = postfix(rest)?;
    // Collapse runs of signs; an even run still rejects non-numeric operands.
    let expr = match negations {
        0 => expr,
        n if n % 2 == 1 => Expr::Negate(Box::new(expr)),
        _ => Expr::Negate(Box::new(Expr::Negate(Box::new(expr)))),
    };
    Ok((rest, expr))
}

fn sum(input: ParserInput) -> NomResult<Expr> {
    let (rest, first) = unary(input)?;
    fold_many0(
        preceded(symbol('+'), cut(unary)),
        move || first.clone(),
        |lhs, rhs| Expr::Add(Box::new(lhs), Box::new(rhs)),
    )
    .parse(rest)
}

fn and_expr(input: ParserInput) -> NomResult<Expr> {
    let (rest, first) = sum(input)?;
    fold_many0(
        preceded(keyword("and"), cut(sum)),
        move || first.clone(),
        |lhs, rhs| Expr::And(Box::new(lhs), Box::new(rhs)),
    )
    .parse(rest)
}

fn or_expr(input: ParserInput) -> NomResult<Expr> {
    let (rest, first) = and_expr(input)?;
    fold_many0(
        preceded(keyword("or"), cut(and_expr)),
        move || first.clone(),
        |lhs, rhs| Expr::Or(Box::new(lhs), Box::new(rhs)),
    )
    .parse(rest)
}

/// Deepest bracket nesting outside of string literals.
fn nesting_depth(source: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    let mut quote = None;
    let mut escaped = false;

    for c in source.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    deepest
}

fn syntax_error(source: &str, offset: usize) -> ExpressionError {
    let found: String = source.get(offset..).unwrap_or_default().chars().take(16).collect();
    ExpressionError::Syntax {
        offset,
        found: if found.is_empty() { "end of input".to_string() } else { found },
    }
}

pub(crate) fn parse(source: &str) -> Result<Expr, ExpressionError> {
    if source.len() > MAX_SOURCE_LEN {
        return Err(ExpressionError::TooLong {
            length: source.len(),
            limit: MAX_SOURCE_LEN,
        });
    }
    if nesting_depth(source) > MAX_NESTING {
        return Err(ExpressionError::TooDeep { limit: MAX_NESTING });
    }

    match all_consuming(preceded(multispace0, or_expr)).parse(ParserInput::new(source)) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(syntax_error(source, err.input.location_offset())),
        Err(nom::Err::Incomplete(_)) => Err(syntax_error(source, source.len())),
    }
}
