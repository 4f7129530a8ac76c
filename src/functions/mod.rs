//! The built-in ledger vocabulary.
//!
//! Every built-in pops its operands from the top of its [`Operands`] view,
//! validates them against the [`Context`], and then either mutates the context,
//! pushes a result, or fails. Syntax lines in the docs read bottom to top,
//! followed by what the function leaves behind.

mod accounts;
mod balance;
mod transaction;
mod transfer;

pub use accounts::{add_notes, close, open, tag, tag_commodity, untag};
pub use balance::{assert, assert_lot, assert_lots_sum, close_lot};
pub use transaction::{xact, Transaction};
pub use transfer::{create_lot, lot, set_comment, xfer, xfer_exch, Transfer};

use crate::parse::Operands;
use crate::utils::parse_date_field;
use crate::{Account, Commodity, Context, Date, Error, ErrorType};
use std::fmt;

/// A value on the operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Transfer(Box<Transfer>),
}

impl Value {
    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn is_transfer(&self) -> bool {
        matches!(self, Value::Transfer(_))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Transfer> for Value {
    fn from(t: Transfer) -> Self {
        Value::Transfer(Box::new(t))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{:?}", s),
            Value::Transfer(t) => write!(f, "{}", t),
        }
    }
}

/// The signature shared by every built-in.
pub type Builtin = fn(&str, Operands<'_, Value>, &mut Context) -> Result<(), Error>;

/// Every built-in, by the name ledgers call it with.
pub const CORE_FUNCTIONS: [(&str, Builtin); 19] = [
    ("add-notes", add_notes),
    ("assert", assert),
    ("assert-lot", assert_lot),
    ("assert-lots-sum", assert_lots_sum),
    ("close", close),
    ("close-lot", close_lot),
    ("comment", comment),
    ("commodity", commodity),
    ("create-lot", create_lot),
    ("date", date),
    ("lot", lot),
    ("open", open),
    ("set-comment", set_comment),
    ("tag", tag),
    ("tag-commodity", tag_commodity),
    ("untag", untag),
    ("xact", xact),
    ("xfer", xfer),
    ("xfer-exch", xfer_exch),
];

pub(crate) fn fail(r#type: ErrorType, fn_name: &str, msg: impl fmt::Display) -> Error {
    Error::new(r#type, format!("{}: {}", fn_name, msg))
}

/// Unwraps a text operand.
pub(crate) fn text(fn_name: &str, value: Value, what: &str) -> Result<String, Error> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(fail(
            ErrorType::Operand,
            fn_name,
            format!("non-string {}: {}", what, other),
        )),
    }
}

/// Unwraps a transfer operand.
pub(crate) fn transfer_operand(fn_name: &str, value: Value) -> Result<Transfer, Error> {
    match value {
        Value::Transfer(t) => Ok(*t),
        other => Err(fail(
            ErrorType::Operand,
            fn_name,
            format!("operand is not a transfer: {}", other),
        )),
    }
}

/// Pops `N` operands that must all be text.
pub(crate) fn pop_texts<const N: usize>(
    fn_name: &str,
    op: &mut Operands<'_, Value>,
    names: [&str; N],
) -> Result<[String; N], Error> {
    let values = op.pop_exact(N, fn_name, &names.join(", "))?;
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (i, (value, what)) in values.into_iter().zip(names).enumerate() {
        out[i] = text(fn_name, value, what)?;
    }
    Ok(out)
}

/// Pops the trailing run of text operands. Values below the first non-text
/// value belong to someone else.
pub(crate) fn pop_trailing_texts(op: &mut Operands<'_, Value>) -> Vec<String> {
    let n = op.count_trailing(Value::is_text);
    op.pop(n)
        .into_iter()
        .filter_map(|v| match v {
            Value::Text(s) => Some(s),
            Value::Transfer(_) => None,
        })
        .collect()
}

/// Looks up an account that exists and is open.
pub(crate) fn live_account<'c>(
    ctx: &'c Context,
    fn_name: &str,
    name: &str,
) -> Result<&'c Account, Error> {
    match ctx.accounts.get(name) {
        None => Err(fail(
            ErrorType::Account,
            fn_name,
            format!("nonexistent account: {}", name),
        )),
        Some(a) if a.is_closed() => Err(fail(
            ErrorType::Account,
            fn_name,
            format!("closed account: {}", name),
        )),
        Some(a) => Ok(a),
    }
}

pub(crate) fn live_account_mut<'c>(
    ctx: &'c mut Context,
    fn_name: &str,
    name: &str,
) -> Result<&'c mut Account, Error> {
    live_account(ctx, fn_name, name)?;
    ctx.accounts
        .get_mut(name)
        .ok_or_else(|| fail(ErrorType::Account, fn_name, format!("nonexistent account: {}", name)))
}

pub(crate) fn known_commodity<'c>(
    ctx: &'c Context,
    fn_name: &str,
    name: &str,
    what: &str,
) -> Result<&'c Commodity, Error> {
    ctx.commodities.get(name).ok_or_else(|| {
        fail(
            ErrorType::Commodity,
            fn_name,
            format!("nonexistent {}: {}", what, name),
        )
    })
}

/// Pops one string comment from the operand stack. The comment must be the
/// only operand in scope.
///
/// Syntax: `STRING comment ->`
pub fn comment(fn_name: &str, mut op: Operands<'_, Value>, _ctx: &mut Context) -> Result<(), Error> {
    match op.len() {
        0 => Err(fail(ErrorType::Operand, fn_name, "no operands given")),
        1 => text(fn_name, op.pop(1).remove(0), "operand").map(|_| ()),
        n => Err(fail(
            ErrorType::Operand,
            fn_name,
            format!("exactly one operand required, but {} given", n),
        )),
    }
}

/// Creates a commodity.
///
/// Syntax: `NAME DESCRIPTION commodity ->`
pub fn commodity(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [name, description] = pop_texts(
        fn_name,
        &mut op,
        ["commodity name", "description"],
    )?;
    if ctx.commodities.contains_key(&name) {
        return Err(fail(
            ErrorType::Duplicate,
            fn_name,
            format!("commodity already exists: {}", name),
        ));
    }
    let commodity = Commodity::new(&name, &description, ctx.date);
    ctx.commodities.insert(name, commodity);
    Ok(())
}

/// Sets the current date. The clock never moves backwards.
///
/// Syntax: `YEAR MONTH DAY date ->`
pub fn date(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [year, month, day] = pop_texts(fn_name, &mut op, ["year", "month", "day"])?;
    let with_name = |e: Error| fail(e.r#type, fn_name, e.msg);
    let y: i32 = parse_date_field(&year, "year").map_err(with_name)?;
    let m: u32 = parse_date_field(&month, "month").map_err(with_name)?;
    let d: u32 = parse_date_field(&day, "day").map_err(with_name)?;
    let new_date = Date::from_ymd_opt(y, m, d).ok_or_else(|| {
        fail(
            ErrorType::Date,
            fn_name,
            format!("invalid date {}-{}-{}", year, month, day),
        )
    })?;
    if let Some(current) = ctx.date {
        if new_date < current {
            return Err(fail(
                ErrorType::Date,
                fn_name,
                format!(
                    "specified date {} is before current date {}",
                    new_date, current
                ),
            ));
        }
    }
    ctx.date = Some(new_date);
    Ok(())
}
