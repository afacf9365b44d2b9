//! Formula parser built on nom.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or         := and ("||" and)*
//! and        := comparison ("&&" comparison)*
//! comparison := additive (("==" | "!=" | ">=" | "<=" | ">" | "<") additive)*
//! additive   := term (("+" | "-") term)*
//! term       := unary (("*" | "/") unary)*
//! unary      := "!" unary | "-" unary | primary
//! primary    := "(" or ")" | text | call | attribute | number
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while},
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::{all_consuming, map, opt, recognize, value},
    multi::{fold_many0, many0_count, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};

use super::ast::{BinOp, Expr, ParseError, UnaryOp};

type Res<'a, O> = IResult<&'a str, O>;

impl Expr {
    /// Parse a formula string into an expression tree
    pub fn parse(source: &str) -> Result<Expr, ParseError> {
        if source.trim().is_empty() {
            return Err(ParseError {
                message: "empty formula".to_string(),
            });
        }
        all_consuming(ws(or_expr))
            .parse(source)
            .map(|(_, expr)| expr)
            .map_err(|e| ParseError {
                message: format!("'{}': {}", source, e),
            })
    }
}

fn ws<'a, O, F>(inner: F) -> impl Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>
where
    F: Parser<&'a str, Output = O, Error = nom::error::Error<&'a str>>,
{
    delimited(multispace0, inner, multispace0)
}

fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> Res<'a, Expr>,
    operator: fn(&'a str) -> Res<'a, BinOp>,
) -> Res<'a, Expr> {
    let (input, first) = operand(input)?;
    fold_many0(
        pair(operator, operand),
        move || first.clone(),
        |left, (op, right)| Expr::binary(op, left, right),
    )
    .parse(input)
}

fn or_expr(input: &str) -> Res<'_, Expr> {
    left_assoc(input, and_expr, or_op)
}

fn and_expr(input: &str) -> Res<'_, Expr> {
    left_assoc(input, comparison, and_op)
}

fn comparison(input: &str) -> Res<'_, Expr> {
    left_assoc(input, additive, comparison_op)
}

fn additive(input: &str) -> Res<'_, Expr> {
    left_assoc(input, term, additive_op)
}

fn term(input: &str) -> Res<'_, Expr> {
    left_assoc(input, unary, term_op)
}

fn or_op(input: &str) -> Res<'_, BinOp> {
    value(BinOp::Or, ws(tag("||"))).parse(input)
}

fn and_op(input: &str) -> Res<'_, BinOp> {
    value(BinOp::And, ws(tag("&&"))).parse(input)
}

fn comparison_op(input: &str) -> Res<'_, BinOp> {
    ws(alt((
        value(BinOp::Eq, tag("==")),
        value(BinOp::Neq, tag("!=")),
        value(BinOp::Gte, tag(">=")),
        value(BinOp::Lte, tag("<=")),
        value(BinOp::Gt, tag(">")),
        value(BinOp::Lt, tag("<")),
    )))
    .parse(input)
}

fn additive_op(input: &str) -> Res<'_, BinOp> {
    ws(alt((value(BinOp::Add, char('+')), value(BinOp::Sub, char('-'))))).parse(input)
}

fn term_op(input: &str) -> Res<'_, BinOp> {
    ws(alt((value(BinOp::Mul, char('*')), value(BinOp::Div, char('/'))))).parse(input)
}

fn unary(input: &str) -> Res<'_, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| Expr::unary(UnaryOp::Not, e)),
        map(preceded(ws(char('-')), unary), |e| Expr::unary(UnaryOp::Neg, e)),
        primary,
    ))
    .parse(input)
}

fn primary(input: &str) -> Res<'_, Expr> {
    ws(alt((
        delimited(char('('), or_expr, ws(char(')'))),
        map(text_literal, |s: &str| Expr::Text(s.to_string())),
        call_or_attribute,
        map(double, Expr::Number),
    )))
    .parse(input)
}

fn text_literal(input: &str) -> Res<'_, &str> {
    alt((
        delimited(char('\''), take_while(|c| c != '\''), char('\'')),
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
    ))
    .parse(input)
}

fn identifier(input: &str) -> Res<'_, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0_count(alt((alphanumeric1, tag("_")))),
    ))
    .parse(input)
}

fn call_or_attribute(input: &str) -> Res<'_, Expr> {
    let (input, name) = identifier(input)?;
    let (input, args) = opt(delimited(
        ws(char('(')),
        separated_list0(ws(char(',')), or_expr),
        char(')'),
    ))
    .parse(input)?;

    let expr = match args {
        Some(args) => Expr::Function {
            name: name.to_string(),
            args,
        },
        None => Expr::Attr(name.to_string()),
    };
    Ok((input, expr))
}
