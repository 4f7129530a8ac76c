use super::{
    fail, known_commodity, live_account, pop_texts, text, transfer_operand, Value,
};
use crate::parse::Operands;
use crate::utils::parse_decimal;
use crate::{Context, Decimal, Error, ErrorType, ExchangeRate, Quantity};
use std::fmt;

/// One signed movement of a quantity into or out of one lot of one account.
/// Transfers live on the operand stack until `xact` consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub account: String,
    /// Target lot; empty for the default lot.
    pub lot: String,
    /// Whether `xact` should create `lot` if it does not exist yet.
    pub create_lot: bool,
    pub quantity: Quantity,
    pub exchange_rate: Option<ExchangeRate>,
    pub comment: Option<String>,
}

impl Transfer {
    /// Returns the quantity this transfer contributes to its transaction's
    /// balance: the total price of an exchange, otherwise the quantity itself.
    pub fn balancing_quantity(&self) -> &Quantity {
        self.exchange_rate
            .as_ref()
            .map_or(&self.quantity, |rate| &rate.total_price)
    }
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transfer of {} to {}", self.quantity, self.account)?;
        if !self.lot.is_empty() {
            write!(f, " lot \"{}\"", self.lot)?;
        }
        if let Some(rate) = &self.exchange_rate {
            write!(f, " {}", rate)?;
        }
        Ok(())
    }
}

fn parse_amount(fn_name: &str, amount: &str) -> Result<Decimal, Error> {
    parse_decimal(amount).map_err(|e| fail(e.r#type, fn_name, e.msg))
}

/// Builds a default-lot transfer after checking the account and commodity.
fn new_transfer(
    fn_name: &str,
    ctx: &Context,
    account: String,
    amount: &str,
    commodity: String,
) -> Result<Transfer, Error> {
    let amount = parse_amount(fn_name, amount)?;
    let acct = live_account(ctx, fn_name, &account)?;
    known_commodity(ctx, fn_name, &commodity, "commodity")?;
    if !acct.allows(&commodity) {
        return Err(fail(
            ErrorType::Commodity,
            fn_name,
            format!("cannot transfer {} to or from account {}", commodity, account),
        ));
    }
    Ok(Transfer {
        account,
        lot: String::new(),
        create_lot: false,
        quantity: Quantity::new(amount, commodity),
        exchange_rate: None,
        comment: None,
    })
}

/// Pushes a transfer to the default lot without an exchange rate.
///
/// Syntax: `ACCOUNT AMOUNT COMMODITY xfer -> Transfer`
pub fn xfer(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let [account, amount, commodity] = pop_texts(
        fn_name,
        &mut op,
        ["account name", "quantity", "commodity name"],
    )?;
    let transfer = new_transfer(fn_name, ctx, account, &amount, commodity)?;
    op.push(transfer.into());
    Ok(())
}

/// Pushes a transfer to the default lot that carries an exchange rate.
///
/// Syntax: `ACCOUNT AMOUNT COMMODITY UNIT-AMOUNT UNIT-COMMODITY TOTAL-AMOUNT
/// TOTAL-COMMODITY xfer-exch -> Transfer`
pub fn xfer_exch(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    if op.count_trailing(Value::is_text) < 7 {
        return Err(fail(
            ErrorType::Operand,
            fn_name,
            "account name, quantity, commodity name, unit price amount, unit price commodity name, \
             total price amount, and total price commodity name operands are required, but too few given",
        ));
    }
    let [account, amount, commodity, unit_amount, unit_commodity, total_amount, total_commodity] =
        pop_texts(
            fn_name,
            &mut op,
            [
                "account name",
                "quantity",
                "commodity name",
                "unit price amount",
                "unit price commodity name",
                "total price amount",
                "total price commodity name",
            ],
        )?;
    let unit = parse_amount(fn_name, &unit_amount)?;
    let total = parse_amount(fn_name, &total_amount)?;
    let mut transfer = new_transfer(fn_name, ctx, account, &amount, commodity)?;
    known_commodity(ctx, fn_name, &unit_commodity, "unit price commodity")?;
    known_commodity(ctx, fn_name, &total_commodity, "total price commodity")?;
    transfer.exchange_rate = Some(ExchangeRate {
        unit_price: Quantity::new(unit, unit_commodity),
        total_price: Quantity::new(total, total_commodity),
    });
    op.push(transfer.into());
    Ok(())
}

/// Pops a transfer and a lot name, checking that the transfer's account is
/// still open.
fn pop_transfer_and_lot(
    fn_name: &str,
    op: &mut Operands<'_, Value>,
    ctx: &Context,
) -> Result<(Transfer, String), Error> {
    let mut values = op
        .pop_exact(2, fn_name, "transfer and lot name")?
        .into_iter();
    let (first, second) = match (values.next(), values.next()) {
        (Some(first), Some(second)) => (first, second),
        _ => return Err(fail(ErrorType::Operand, fn_name, "too few operands given")),
    };
    let transfer = transfer_operand(fn_name, first)?;
    let lot = text(fn_name, second, "lot name")?;
    if ctx
        .accounts
        .get(&transfer.account)
        .map_or(true, |a| a.is_closed())
    {
        return Err(fail(
            ErrorType::Account,
            fn_name,
            format!("transfer refers to closed account: {}", transfer.account),
        ));
    }
    Ok((transfer, lot))
}

/// Targets a transfer at an existing lot.
///
/// Syntax: `Transfer LOT lot -> Transfer`
pub fn lot(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let (mut transfer, lot) = pop_transfer_and_lot(fn_name, &mut op, ctx)?;
    let exists = ctx
        .accounts
        .get(&transfer.account)
        .map_or(false, |a| a.lots().contains_key(&lot));
    if !exists {
        return Err(fail(
            ErrorType::Lot,
            fn_name,
            format!(
                "account {} does not have a lot named \"{}\"",
                transfer.account, lot
            ),
        ));
    }
    transfer.lot = lot;
    op.push(transfer.into());
    Ok(())
}

/// Targets a transfer at a lot that `xact` will create. The lot must not
/// already hold the transfer's commodity.
///
/// Syntax: `Transfer LOT create-lot -> Transfer`
pub fn create_lot(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let (mut transfer, lot) = pop_transfer_and_lot(fn_name, &mut op, ctx)?;
    let taken = ctx
        .accounts
        .get(&transfer.account)
        .and_then(|a| a.lot(&lot, &transfer.quantity.commodity))
        .is_some();
    if taken {
        return Err(fail(
            ErrorType::Duplicate,
            fn_name,
            format!(
                "lot {} already contains {}",
                lot, transfer.quantity.commodity
            ),
        ));
    }
    transfer.lot = lot;
    transfer.create_lot = true;
    op.push(transfer.into());
    Ok(())
}

/// Sets or replaces a transfer's comment.
///
/// Syntax: `Transfer COMMENT set-comment -> Transfer`
pub fn set_comment(fn_name: &str, mut op: Operands<'_, Value>, _ctx: &mut Context) -> Result<(), Error> {
    let mut values = op
        .pop_exact(2, fn_name, "transfer and comment string")?
        .into_iter();
    if let (Some(first), Some(second)) = (values.next(), values.next()) {
        let mut transfer = transfer_operand(fn_name, first)?;
        transfer.comment = Some(text(fn_name, second, "comment")?);
        op.push(transfer.into());
    }
    Ok(())
}
