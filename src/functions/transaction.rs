use super::{fail, Transfer, Value};
use crate::ledger::{amount_overflow, missing_lot_message};
use crate::parse::Operands;
use crate::{format_date, Context, Decimal, Error, ErrorType, Quantity};
use log::debug;
use std::collections::{HashMap, HashSet};

/// A balanced set of transfers, built by `xact` from the operand stack and
/// applied to the context at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub entity: String,
    pub description: String,
    pub transfers: Vec<Transfer>,
    pub notes: HashMap<String, String>,
}

fn operand_error(msg: impl Into<String>) -> Error {
    Error::new(ErrorType::Operand, msg)
}

fn expect_text(value: Option<Value>, what: &str) -> Result<String, Error> {
    match value {
        Some(Value::Text(s)) => Ok(s),
        Some(other) => Err(operand_error(format!("non-string {}: {}", what, other))),
        None => Err(operand_error(format!("{} operand is required", what))),
    }
}

impl Transaction {
    /// Pops `ENTITY DESCRIPTION Transfer+ (NOTE-NAME NOTE-VALUE)*` and checks
    /// that the transfers balance. Notes are the trailing run of text
    /// operands; the transfers are the run of transfer values beneath them.
    ///
    /// Operand counts are checked before anything is popped. Errors are not
    /// prefixed with a function name.
    pub fn from_operands(op: &mut Operands<'_, Value>) -> Result<Self, Error> {
        let values = op.values();
        let num_notes = op.count_trailing(Value::is_text);
        let num_transfers = values[..values.len() - num_notes]
            .iter()
            .rev()
            .take_while(|v| v.is_transfer())
            .count();
        match values.len() - num_notes - num_transfers {
            0 => return Err(operand_error("entity and description operands are required")),
            1 => return Err(operand_error("description operand is required")),
            _ => {}
        }
        if num_transfers < 2 {
            return Err(operand_error("there must be at least two transfers"));
        }
        if num_notes % 2 != 0 {
            return Err(operand_error(format!(
                "the number of notes must be a multiple of two, got {}",
                num_notes
            )));
        }

        let mut values = op.pop(num_transfers + num_notes + 2).into_iter();
        let entity = expect_text(values.next(), "entity")?;
        let description = expect_text(values.next(), "description")?;
        let mut transfers = Vec::with_capacity(num_transfers);
        let mut texts = Vec::with_capacity(num_notes);
        for value in values {
            match value {
                Value::Transfer(t) => transfers.push(*t),
                Value::Text(s) => texts.push(s),
            }
        }
        check_balance(&transfers)?;
        let mut notes = HashMap::with_capacity(num_notes / 2);
        let mut texts = texts.into_iter();
        while let (Some(name), Some(value)) = (texts.next(), texts.next()) {
            notes.insert(name, value);
        }
        Ok(Transaction {
            entity,
            description,
            transfers,
            notes,
        })
    }

    /// Applies every transfer to its account. Every target and every
    /// resulting balance is checked before any balance changes, so a failed
    /// transaction leaves `ctx` untouched.
    pub fn execute(&self, ctx: &mut Context) -> Result<(), Error> {
        self.validate(ctx)?;
        let date = ctx.date;
        for transfer in &self.transfers {
            let account = ctx.accounts.get_mut(&transfer.account).ok_or_else(|| {
                Error::new(
                    ErrorType::Account,
                    format!("nonexistent account: {}", transfer.account),
                )
            })?;
            if transfer.create_lot {
                account.create_lot(&transfer.lot);
            }
            account.deposit(
                &transfer.lot,
                &transfer.quantity,
                transfer.exchange_rate.as_ref(),
                date,
            )?;
        }
        debug!(
            "{} {} \"{}\": {} transfers",
            format_date(date),
            self.entity,
            self.description,
            self.transfers.len()
        );
        Ok(())
    }

    fn validate(&self, ctx: &Context) -> Result<(), Error> {
        let mut created: HashSet<(&str, &str)> = HashSet::new();
        let mut balances: HashMap<(&str, &str, &str), Decimal> = HashMap::new();
        for transfer in &self.transfers {
            let account = match ctx.accounts.get(&transfer.account) {
                Some(a) if !a.is_closed() => a,
                Some(_) => {
                    return Err(Error::new(
                        ErrorType::Account,
                        format!("transfer refers to closed account: {}", transfer.account),
                    ))
                }
                None => {
                    return Err(Error::new(
                        ErrorType::Account,
                        format!("nonexistent account: {}", transfer.account),
                    ))
                }
            };
            let key = (transfer.account.as_str(), transfer.lot.as_str());
            if !account.lots().contains_key(&transfer.lot) && !created.contains(&key) {
                if !transfer.create_lot {
                    return Err(Error::new(
                        ErrorType::Lot,
                        missing_lot_message(&transfer.account, &transfer.lot),
                    ));
                }
                created.insert(key);
            }
            let commodity = transfer.quantity.commodity.as_str();
            let balance = balances
                .entry((key.0, key.1, commodity))
                .or_insert_with(|| account.balance(key.1, commodity).unwrap_or_default());
            *balance = balance
                .checked_add(transfer.quantity.amount)
                .ok_or_else(amount_overflow)?;
        }
        Ok(())
    }
}

/// Checks that the transfers share one commodity and sum to zero, using each
/// transfer's total price when it carries an exchange rate.
fn check_balance(transfers: &[Transfer]) -> Result<(), Error> {
    let (first, rest) = match transfers.split_first() {
        Some(split) => split,
        None => return Err(operand_error("there must be at least two transfers")),
    };
    let mut sum: Quantity = first.balancing_quantity().clone();
    for transfer in rest {
        let q = transfer.balancing_quantity();
        if q.commodity != sum.commodity {
            return Err(Error::new(
                ErrorType::NotBalanced,
                format!(
                    "transfer to {} uses commodity {} but transfer to {} uses {}",
                    transfer.account, q.commodity, first.account, sum.commodity
                ),
            ));
        }
        sum.amount = sum
            .amount
            .checked_add(q.amount)
            .ok_or_else(amount_overflow)?;
    }
    if !sum.amount.is_zero() {
        return Err(Error::new(
            ErrorType::NotBalanced,
            format!("transfers sum to {}, not zero", sum),
        ));
    }
    Ok(())
}

/// Executes a transaction.
///
/// Syntax: `ENTITY DESCRIPTION Transfer+ (NOTE-NAME NOTE-VALUE)* xact ->`
pub fn xact(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    Transaction::from_operands(&mut op)
        .and_then(|t| t.execute(ctx))
        .map_err(|e| fail(e.r#type, fn_name, e.msg))
}
