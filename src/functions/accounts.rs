use super::{fail, known_commodity, live_account_mut, pop_texts, pop_trailing_texts, Value};
use crate::parse::Operands;
use crate::{Account, Context, Error, ErrorType, Tagged};

fn count_trailing_texts(op: &Operands<'_, Value>) -> usize {
    op.count_trailing(Value::is_text)
}

/// Opens an account, optionally restricted to the listed commodities. Opening
/// a closed account replaces it with a fresh one.
///
/// Syntax: `NAME COMMODITY* open ->`
pub fn open(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    if count_trailing_texts(&op) < 1 {
        return Err(fail(ErrorType::Operand, fn_name, "no operands given"));
    }
    let mut names = pop_trailing_texts(&mut op).into_iter();
    let name = names.next().unwrap_or_default();
    if !Account::is_valid_name(&name) {
        return Err(fail(
            ErrorType::Account,
            fn_name,
            format!(
                "account does not start with \"Assets:\", \"Liabilities:\", \"Income:\", \
                 \"Expenses:\", or \"Equity:\", and is not named \"Equity\": {}",
                name
            ),
        ));
    }
    if ctx.accounts.get(&name).map_or(false, |a| !a.is_closed()) {
        return Err(fail(
            ErrorType::Duplicate,
            fn_name,
            format!("account already exists: {}", name),
        ));
    }
    let mut account = Account::new(&name, ctx.date);
    for commodity in names {
        known_commodity(ctx, fn_name, &commodity, "commodity")?;
        account.commodities.insert(commodity);
    }
    ctx.insert_account(account);
    Ok(())
}

/// Closes an account. Every lot must be empty.
///
/// Syntax: `ACCOUNT close ->`
pub fn close(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    if op.is_empty() {
        return Err(fail(ErrorType::Operand, fn_name, "no operands given"));
    }
    let [name] = pop_texts(fn_name, &mut op, ["account name"])?;
    let date = ctx.date;
    let account = match ctx.accounts.get_mut(&name) {
        None => {
            return Err(fail(
                ErrorType::Account,
                fn_name,
                format!("nonexistent account: {}", name),
            ))
        }
        Some(a) if a.is_closed() => {
            return Err(fail(
                ErrorType::Account,
                fn_name,
                format!("account is already closed: {}", name),
            ))
        }
        Some(a) => a,
    };
    if let Some(lot) = account.nonzero_lot() {
        return Err(fail(
            ErrorType::Lot,
            fn_name,
            format!(
                "cannot close account {} because lot \"{}\" has {}",
                name,
                lot.name(),
                lot.balance()
            ),
        ));
    }
    account.close(date);
    Ok(())
}

/// Merges note name/value pairs into an account's notes.
///
/// Syntax: `ACCOUNT (NOTE-NAME NOTE-VALUE)* add-notes ->`
pub fn add_notes(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let n = count_trailing_texts(&op);
    if n < 1 {
        return Err(fail(
            ErrorType::Operand,
            fn_name,
            "account name operand required, but no operands given",
        ));
    }
    if (n - 1) % 2 != 0 {
        return Err(fail(
            ErrorType::Operand,
            fn_name,
            "note name and note value operand pairs required, but odd number of operands given",
        ));
    }
    let mut values = pop_trailing_texts(&mut op).into_iter();
    let name = values.next().unwrap_or_default();
    let account = live_account_mut(ctx, fn_name, &name)?;
    while let (Some(key), Some(value)) = (values.next(), values.next()) {
        account.notes.insert(key, value);
    }
    Ok(())
}

/// Pops the entity name and its tags, requiring at least one tag.
fn pop_tags(
    fn_name: &str,
    op: &mut Operands<'_, Value>,
    entity: &str,
) -> Result<(String, Vec<String>), Error> {
    if count_trailing_texts(op) < 2 {
        return Err(fail(
            ErrorType::Operand,
            fn_name,
            format!(
                "{} name and at least one tag operand required, but too few operands given",
                entity
            ),
        ));
    }
    let mut values = pop_trailing_texts(op);
    let tags = values.split_off(1);
    let name = values.pop().unwrap_or_default();
    Ok((name, tags))
}

fn tagging_nonexistent(fn_name: &str, entity: &str, name: &str) -> Error {
    let r#type = if entity == "account" {
        ErrorType::Account
    } else {
        ErrorType::Commodity
    };
    fail(
        r#type,
        fn_name,
        format!("tagging nonexistent {}: {}", entity, name),
    )
}

/// Checks that `name` is an open account, with the tagging wording for a
/// missing one.
fn taggable_account(fn_name: &str, ctx: &Context, name: &str) -> Result<(), Error> {
    match ctx.accounts.get(name) {
        None => Err(tagging_nonexistent(fn_name, "account", name)),
        Some(a) if a.is_closed() => Err(fail(
            ErrorType::Account,
            fn_name,
            format!("closed account: {}", name),
        )),
        Some(_) => Ok(()),
    }
}

/// Tags an open account.
///
/// Syntax: `ACCOUNT TAG+ tag ->`
pub fn tag(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let (name, tags) = pop_tags(fn_name, &mut op, "account")?;
    taggable_account(fn_name, ctx, &name)?;
    for tag in tags {
        ctx.index_tag(&tag, Tagged::Account(name.clone()));
        if let Some(account) = ctx.accounts.get_mut(&name) {
            account.tags.insert(tag);
        }
    }
    Ok(())
}

/// Tags a commodity.
///
/// Syntax: `COMMODITY TAG+ tag-commodity ->`
pub fn tag_commodity(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let (name, tags) = pop_tags(fn_name, &mut op, "commodity")?;
    if !ctx.commodities.contains_key(&name) {
        return Err(tagging_nonexistent(fn_name, "commodity", &name));
    }
    for tag in tags {
        ctx.index_tag(&tag, Tagged::Commodity(name.clone()));
        if let Some(commodity) = ctx.commodities.get_mut(&name) {
            commodity.tags.insert(tag);
        }
    }
    Ok(())
}

/// Removes tags from an open account. Tags the account does not carry are
/// ignored.
///
/// Syntax: `ACCOUNT TAG+ untag ->`
pub fn untag(fn_name: &str, mut op: Operands<'_, Value>, ctx: &mut Context) -> Result<(), Error> {
    let (name, tags) = pop_tags(fn_name, &mut op, "account")?;
    taggable_account(fn_name, ctx, &name)?;
    let entity = Tagged::Account(name.clone());
    for tag in tags {
        ctx.unindex_tag(&tag, &entity);
        if let Some(account) = ctx.accounts.get_mut(&name) {
            account.tags.remove(&tag);
        }
    }
    Ok(())
}
