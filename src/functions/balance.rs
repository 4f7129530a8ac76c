use super::{fail, known_commodity, live_account, live_account_mut, pop_texts, Value};
use crate::ledger::missing_lot_message;
use crate::parse::Operands;
use crate::utils::parse_decimal;
use crate::{Account, Context, Decimal, Error, ErrorType};

/// Pops and resolves the operands shared by the balance assertions.
fn assertion_operands<'c>(
    fn_name: &str,
    ctx: &'c Context,
    account: &str,
    amount: &str,
    commodity: &str,
) -> Result<(&'c Account, Decimal), Error> {
    let amount = parse_decimal(amount).map_err(|e| fail(e.r#type, fn_name, e.msg))?;
    let acct = live_account(ctx, fn_name, account)?;
    known_commodity(ctx, fn_name, commodity, "commodity")?;
    Ok((acct, amount))
}

fn mismatch(fn_name: &str, msg: String) -> Error {
    fail(ErrorType::Assertion, fn_name, msg)
}

fn overflow(fn_name: &str) -> Error {
    fail(ErrorType::Number, fn_name, "amount overflow")
}

/// Returns `held - asserted`, failing if the difference cannot be represented.
fn difference(fn_name: &str, held: Decimal, asserted: Decimal) -> Result<Decimal, Error> {
    held.checked_sub(asserted).ok_or_else(|| overflow(fn_name))
}

/// Checks the balance of one lot. A lot with no entry for the commodity holds
/// zero.
fn check_lot(
    fn_name: &str,
    acct: &Account,
    lot: &str,
    amount: Decimal,
    commodity: &str,
) -> Result<(), Error> {
    let label = if lot.is_empty() {
        format!("default lot in account {}", acct.name())
    } else {
        format!("lot \"{}\" in account {}", lot, acct.name())
    };
    match acct.lot(lot, commodity) {
        None if amount.is_zero() => Ok(()),
        None => Err(mismatch(
            fn_name,
            format!("{} does not have {}", label, commodity),
        )),
        Some(l) if l.balance().amount == amount => Ok(()),
        Some(l) => Err(mismatch(
            fn_name,
            format!(
                "{} has {}, not asserted amount {} {} (difference of {})",
                label,
                l.balance(),
                amount,
                commodity,
                difference(fn_name, l.balance().amount, amount)?
            ),
        )),
    }
}

/// Asserts the balance of a commodity in an account's default lot.
///
/// Syntax: `ACCOUNT AMOUNT COMMODITY assert ->`
pub fn assert(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [account, amount, commodity] = pop_texts(
        fn_name,
        &mut op,
        ["account name", "amount", "commodity name"],
    )?;
    let (acct, amount) = assertion_operands(fn_name, ctx, &account, &amount, &commodity)?;
    if !acct.lots().contains_key("") {
        return Err(fail(
            ErrorType::Lot,
            fn_name,
            missing_lot_message(&account, ""),
        ));
    }
    check_lot(fn_name, acct, "", amount, &commodity)
}

/// Asserts the balance of a commodity in a named lot. A nonexistent lot
/// passes only a zero assertion.
///
/// Syntax: `ACCOUNT LOT AMOUNT COMMODITY assert-lot ->`
pub fn assert_lot(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [account, lot, amount, commodity] = pop_texts(
        fn_name,
        &mut op,
        ["account name", "lot name", "amount", "commodity name"],
    )?;
    let (acct, amount) = assertion_operands(fn_name, ctx, &account, &amount, &commodity)?;
    if !acct.lots().contains_key(&lot) {
        if amount.is_zero() {
            return Ok(());
        }
        return Err(fail(
            ErrorType::Lot,
            fn_name,
            missing_lot_message(&account, &lot),
        ));
    }
    check_lot(fn_name, acct, &lot, amount, &commodity)
}

/// Asserts the sum of a commodity across every lot of an account.
///
/// Syntax: `ACCOUNT AMOUNT COMMODITY assert-lots-sum ->`
pub fn assert_lots_sum(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [account, amount, commodity] = pop_texts(
        fn_name,
        &mut op,
        ["account name", "amount", "commodity name"],
    )?;
    let (acct, amount) = assertion_operands(fn_name, ctx, &account, &amount, &commodity)?;
    let sum = acct.lots_sum(&commodity).ok_or_else(|| overflow(fn_name))?;
    if sum != amount {
        return Err(mismatch(
            fn_name,
            format!(
                "lots in account {} have a total of {} {}, not asserted amount {} {} (difference of {})",
                account,
                sum,
                commodity,
                amount,
                commodity,
                difference(fn_name, sum, amount)?
            ),
        ));
    }
    Ok(())
}

/// Removes a lot whose every commodity balance is zero.
///
/// Syntax: `ACCOUNT LOT close-lot ->`
pub fn close_lot(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [account, lot] = pop_texts(fn_name, &mut op, ["account name", "lot name"])?;
    let acct = live_account_mut(ctx, fn_name, &account)?;
    let by_commodity = acct.lots.get(&lot).ok_or_else(|| {
        fail(
            ErrorType::Lot,
            fn_name,
            format!("nonexistent lot \"{}\" in account {}", lot, account),
        )
    })?;
    if let Some(held) = by_commodity.values().find(|l| !l.balance().amount.is_zero()) {
        return Err(fail(
            ErrorType::Lot,
            fn_name,
            format!(
                "cannot close lot \"{}\" in account {} because it has {}",
                lot,
                account,
                held.balance()
            ),
        ));
    }
    acct.lots.remove(&lot);
    Ok(())
}
