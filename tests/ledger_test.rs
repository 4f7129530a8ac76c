//! Ledger programs run end to end through [`Parser`].

use rpnbook::functions;
use rpnbook::{Context, Date, Decimal, Error, ErrorType, Flow, Outcome, Parser, Transaction};
use std::str::FromStr;

const PRELUDE: &str = r#"
2021 1 1 date
USD "US dollars" commodity
JPY "Japanese yen" commodity
Assets:A open
Assets:B USD open
Equity open
"#;

fn run(src: &str) -> Result<Context, Error> {
    let mut parser = Parser::default();
    parser.parse_str(src)?;
    Ok(parser.into_context())
}

fn ledger(body: &str) -> Context {
    run(&format!("{}{}", PRELUDE, body)).unwrap()
}

fn ledger_err(body: &str) -> Error {
    run(&format!("{}{}", PRELUDE, body)).unwrap_err()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn balance(ctx: &Context, account: &str, lot: &str, commodity: &str) -> Option<Decimal> {
    ctx.accounts()[account].balance(lot, commodity)
}

#[test]
fn dates_move_forward_only() {
    let ctx = ledger("2021 1 1 date 2021 3 15 date");
    assert_eq!(ctx.date(), Date::from_ymd_opt(2021, 3, 15));

    let err = ledger_err("2021 1 2 date 2020 12 31 date");
    assert_eq!(err.r#type, ErrorType::Date);
    assert!(err.msg.contains("is before current date 2021-01-02"));

    assert_eq!(ledger_err("2021 2 29 date").r#type, ErrorType::Date);
    let err = ledger_err("twenty 1 1 date");
    assert_eq!(err.msg, "date: illegal year twenty: invalid digit found in string");
}

#[test]
fn commodities_are_unique() {
    let ctx = ledger("");
    let usd = &ctx.commodities()["USD"];
    assert_eq!(usd.description(), "US dollars");
    assert_eq!(usd.creation_date(), Date::from_ymd_opt(2021, 1, 1));

    let err = ledger_err("USD \"again\" commodity");
    assert_eq!(err.r#type, ErrorType::Duplicate);
    assert_eq!(err.msg, "commodity: commodity already exists: USD");
}

#[test]
fn open_checks_names_and_commodities() {
    let ctx = ledger("Liabilities:Card USD JPY open");
    assert_eq!(ctx.accounts()["Liabilities:Card"].commodities().len(), 2);
    assert!(ctx.accounts()["Assets:A"].commodities().is_empty());

    assert_eq!(ledger_err("Bank open").r#type, ErrorType::Account);
    assert_eq!(ledger_err("Assets:A open").r#type, ErrorType::Duplicate);
    let err = ledger_err("Assets:C XYZ open");
    assert_eq!(err.msg, "open: nonexistent commodity: XYZ");
    assert_eq!(ledger_err("open").r#type, ErrorType::Operand);
}

#[test]
fn close_requires_empty_lots() {
    let body = "\"e\" \"fund\" Assets:A 5 USD xfer Equity -5 USD xfer xact\n";
    let err = ledger_err(&format!("{}Assets:A close", body));
    assert_eq!(err.r#type, ErrorType::Lot);
    assert_eq!(
        err.msg,
        "close: cannot close account Assets:A because lot \"\" has 5 USD"
    );

    let ctx = ledger(&format!(
        "{}\"e\" \"unfund\" Assets:A -5 USD xfer Equity 5 USD xfer xact\nAssets:A close",
        body
    ));
    let account = &ctx.accounts()["Assets:A"];
    assert!(account.is_closed());
    assert_eq!(account.closing_date(), Date::from_ymd_opt(2021, 1, 1));

    let err = ledger_err("Assets:A close Assets:A close");
    assert_eq!(err.msg, "close: account is already closed: Assets:A");
    assert_eq!(ledger_err("Assets:Z close").r#type, ErrorType::Account);
}

#[test]
fn closing_before_any_date() {
    let ctx = run("Assets:A open Assets:A close").unwrap();
    assert!(ctx.accounts()["Assets:A"].is_closed());
    assert_eq!(ctx.accounts()["Assets:A"].closing_date(), None);
}

#[test]
fn closed_accounts_reject_use_and_can_reopen() {
    let err = ledger_err("Assets:A close Assets:A 1 USD xfer");
    assert_eq!(err.msg, "xfer: closed account: Assets:A");

    let ctx = ledger("Assets:A old tag Assets:A close 2021 2 1 date Assets:A open");
    let account = &ctx.accounts()["Assets:A"];
    assert!(!account.is_closed());
    assert_eq!(account.creation_date(), Date::from_ymd_opt(2021, 2, 1));
    assert!(account.tags().is_empty());
    assert!(ctx.tags().get("old").is_none());
}

#[test]
fn xfer_validates_its_operands() {
    let err = ledger_err("Assets:Z 1 USD xfer");
    assert_eq!(err.r#type, ErrorType::Account);
    assert_eq!(err.msg, "xfer: nonexistent account: Assets:Z");

    let err = ledger_err("Assets:A 1 XYZ xfer");
    assert_eq!(err.r#type, ErrorType::Commodity);

    let err = ledger_err("Assets:B 1 JPY xfer");
    assert_eq!(err.msg, "xfer: cannot transfer JPY to or from account Assets:B");

    let err = ledger_err("Assets:A 1x USD xfer");
    assert_eq!(err.r#type, ErrorType::Number);

    let err = ledger_err("Assets:A 1 xfer");
    assert_eq!(err.r#type, ErrorType::Operand);
}

#[test]
fn xact_moves_balances() {
    let ctx = ledger(
        "\"Employer\" \"salary\" Assets:A 1,000.50 USD xfer Assets:B 20 USD xfer Equity -1020.50 USD xfer xact",
    );
    assert_eq!(balance(&ctx, "Assets:A", "", "USD"), Some(dec("1000.5")));
    assert_eq!(balance(&ctx, "Assets:B", "", "USD"), Some(dec("20")));
    assert_eq!(balance(&ctx, "Equity", "", "USD"), Some(dec("-1020.5")));
    assert_eq!(balance(&ctx, "Assets:A", "", "JPY"), Some(Decimal::ZERO));
}

#[test]
fn decimal_sums_are_exact() {
    let mut body = String::new();
    for _ in 0..10 {
        body.push_str("\"e\" \"d\" Assets:A 0.1 USD xfer Equity -0.1 USD xfer xact\n");
    }
    body.push_str("Assets:A 1 USD assert Equity -1.0 USD assert");
    ledger(&body);
}

#[test]
fn unbalanced_xact_changes_nothing() {
    let mut parser = Parser::default();
    let err = parser
        .parse_str(&format!(
            "{}\"e\" \"d\" Assets:A 5 USD xfer Equity -4 USD xfer xact",
            PRELUDE
        ))
        .unwrap_err();
    assert_eq!(err.r#type, ErrorType::NotBalanced);
    assert_eq!(err.msg, "xact: transfers sum to 1 USD, not zero");
    assert_eq!(balance(parser.context(), "Assets:A", "", "USD"), Some(Decimal::ZERO));

    let err = ledger_err("\"e\" \"d\" Assets:A 5 USD xfer Equity -5 JPY xfer xact");
    assert_eq!(err.r#type, ErrorType::NotBalanced);
    assert!(err.msg.contains("uses commodity JPY"));
}

const MAX: &str = "79228162514264337593543950335";

#[test]
fn overflowing_amounts_are_errors() {
    let fund = format!(
        "\"e\" \"d\" Assets:A {max} USD xfer Equity -{max} USD xfer xact\n",
        max = MAX
    );
    let mut parser = Parser::default();
    let err = parser
        .parse_str(&format!("{}{}{}", PRELUDE, fund, fund))
        .unwrap_err();
    assert_eq!(err.r#type, ErrorType::Number);
    assert_eq!(err.msg, "xact: amount overflow");
    assert_eq!(err.line, 9);
    assert_eq!(balance(parser.context(), "Assets:A", "", "USD"), Some(Decimal::MAX));
    assert_eq!(balance(parser.context(), "Equity", "", "USD"), Some(-Decimal::MAX));

    let err = ledger_err(&format!(
        "\"e\" \"d\" Assets:A {max} USD xfer Equity {max} USD xfer xact",
        max = MAX
    ));
    assert_eq!(err.msg, "xact: amount overflow");

    let err = ledger_err(&format!("{}Assets:A -{} USD assert", fund, MAX));
    assert_eq!(err.r#type, ErrorType::Number);
    assert_eq!(err.msg, "assert: amount overflow");

    let err = ledger_err(&format!("{}Assets:A \"\" -{} USD assert-lot", fund, MAX));
    assert_eq!(err.msg, "assert-lot: amount overflow");

    let err = ledger_err(&format!(
        "\"e\" \"d\" Assets:A {max} USD xfer one create-lot Equity -{max} USD xfer xact\n\
         \"e\" \"d\" Assets:A {max} USD xfer two create-lot Assets:B -{max} USD xfer xact\n\
         Assets:A 0 USD assert-lots-sum",
        max = MAX
    ));
    assert_eq!(err.r#type, ErrorType::Number);
    assert_eq!(err.msg, "assert-lots-sum: amount overflow");
}

#[test]
fn amounts_are_never_rounded() {
    let err = ledger_err(
        "\"e\" \"d\" Assets:A 0.00000000000000000000000000001 USD xfer Equity 0 USD xfer xact",
    );
    assert_eq!(err.r#type, ErrorType::Number);
    assert!(err
        .msg
        .starts_with("xfer: illegal decimal value 0.00000000000000000000000000001"));
}

#[test]
fn xact_operand_shapes() {
    let err = ledger_err("\"e\" \"d\" Assets:A 0 USD xfer xact");
    assert_eq!(err.msg, "xact: there must be at least two transfers");

    let err = ledger_err("\"d\" Assets:A 0 USD xfer Equity 0 USD xfer xact");
    assert_eq!(err.msg, "xact: description operand is required");

    let err = ledger_err("Assets:A 0 USD xfer Equity 0 USD xfer xact");
    assert_eq!(err.msg, "xact: entity and description operands are required");

    let err = ledger_err("\"e\" \"d\" Assets:A 0 USD xfer Equity 0 USD xfer memo xact");
    assert_eq!(
        err.msg,
        "xact: the number of notes must be a multiple of two, got 1"
    );
}

#[test]
fn scopes_hide_outer_operands() {
    let err = ledger_err("\"e\" \"d\" ( Assets:A 1 USD xfer Equity -1 USD xfer xact )");
    assert_eq!(err.msg, "xact: entity and description operands are required");

    let err = ledger_err("( Assets:A 1 USD xfer )");
    assert_eq!(err.r#type, ErrorType::Syntax);
    assert_eq!(err.msg, "1 unconsumed operands at closing parenthesis");

    ledger("\"e\" \"d\" Assets:A 1 USD xfer ( \"first\" comment ) Equity -1 USD xfer xact");
}

#[test]
fn lots_are_created_and_used() {
    let ctx = ledger(
        "\"e\" \"buy\" Assets:A 10 USD xfer lot1 create-lot Equity -10 USD xfer xact\n\
         \"e\" \"sell\" Assets:A -4 USD xfer lot1 lot Equity 4 USD xfer xact\n\
         Assets:A lot1 6 USD assert-lot\n\
         Assets:A 6 USD assert-lots-sum\n\
         Assets:A 0 USD assert\n\
         Assets:A nolot 0 USD assert-lot\n",
    );
    let lot = ctx.accounts()["Assets:A"].lot("lot1", "USD").unwrap();
    assert_eq!(lot.balance().amount, dec("6"));
    assert_eq!(lot.creation_date(), Date::from_ymd_opt(2021, 1, 1));

    let err = ledger_err("Assets:A 1 USD xfer nolot lot");
    assert_eq!(err.r#type, ErrorType::Lot);
    assert_eq!(
        err.msg,
        "lot: account Assets:A does not have a lot named \"nolot\""
    );

    let err = ledger_err(
        "\"e\" \"buy\" Assets:A 10 USD xfer lot1 create-lot Equity -10 USD xfer xact\n\
         Assets:A 1 USD xfer lot1 create-lot",
    );
    assert_eq!(err.r#type, ErrorType::Duplicate);
    assert_eq!(err.msg, "create-lot: lot lot1 already contains USD");

    let err = ledger_err("Assets:A nolot 1 USD assert-lot");
    assert_eq!(err.r#type, ErrorType::Lot);
}

#[test]
fn one_xact_can_create_and_reuse_a_lot() {
    let ctx = ledger(
        "\"e\" \"d\" Assets:A 1 USD xfer new create-lot Assets:A 2 USD xfer new create-lot \
         Equity -3 USD xfer xact",
    );
    assert_eq!(balance(&ctx, "Assets:A", "new", "USD"), Some(dec("3")));
}

#[test]
fn xact_checks_every_lot_before_applying() {
    let mut parser = Parser::default();
    let err = parser
        .parse_str(&format!(
            "{}\"e\" \"d\" Assets:A 0 USD xfer lot1 create-lot Equity 0 USD xfer xact\n\
             \"e\" \"d\" Equity -1 USD xfer Assets:A 1 USD xfer lot1 lot \
             ( Assets:A lot1 close-lot ) xact",
            PRELUDE
        ))
        .unwrap_err();
    assert_eq!(err.r#type, ErrorType::Lot);
    assert_eq!(
        err.msg,
        "xact: account Assets:A does not have a lot named \"lot1\""
    );
    assert_eq!(balance(parser.context(), "Equity", "", "USD"), Some(Decimal::ZERO));
}

#[test]
fn close_lot_requires_zero_balance() {
    let body = "\"e\" \"d\" Assets:A 3 USD xfer l create-lot Equity -3 USD xfer xact\n";
    let err = ledger_err(&format!("{}Assets:A l close-lot", body));
    assert_eq!(
        err.msg,
        "close-lot: cannot close lot \"l\" in account Assets:A because it has 3 USD"
    );

    let ctx = ledger(&format!(
        "{}\"e\" \"d\" Assets:A -3 USD xfer l lot Equity 3 USD xfer xact Assets:A l close-lot",
        body
    ));
    assert!(!ctx.accounts()["Assets:A"].lots().contains_key("l"));

    let err = ledger_err("Assets:A l close-lot");
    assert_eq!(err.msg, "close-lot: nonexistent lot \"l\" in account Assets:A");
}

#[test]
fn default_lot_can_be_closed() {
    let err = ledger_err("Assets:A \"\" close-lot Assets:A 0 USD assert");
    assert_eq!(err.r#type, ErrorType::Lot);
    assert_eq!(err.msg, "assert: account Assets:A does not have a default lot");

    let err = ledger_err("Assets:A \"\" close-lot \"e\" \"d\" Assets:A 1 USD xfer Equity -1 USD xfer xact");
    assert_eq!(err.msg, "xact: account Assets:A does not have a default lot");

    let ctx = ledger("Assets:A \"\" close-lot Assets:A close");
    assert!(ctx.accounts()["Assets:A"].is_closed());
}

#[test]
fn exchanges_record_rates() {
    let ctx = ledger(
        "\"FX\" \"buy yen\" Assets:A 1,000 JPY 0.01 USD 10 USD xfer-exch yen create-lot \
         Assets:B -10 USD xfer xact",
    );
    let lot = ctx.accounts()["Assets:A"].lot("yen", "JPY").unwrap();
    assert_eq!(lot.balance().amount, dec("1000"));
    let rate = lot.exchange_rate().as_ref().unwrap();
    assert_eq!(rate.unit_price.to_string(), "0.01 USD");
    assert_eq!(rate.total_price.to_string(), "10 USD");
    assert_eq!(balance(&ctx, "Assets:B", "", "USD"), Some(dec("-10")));

    let err = ledger_err("Assets:A 1,000 JPY 0.01 USD xfer-exch");
    assert_eq!(err.r#type, ErrorType::Operand);
    let err = ledger_err("Assets:A 1 JPY 1 XYZ 1 USD xfer-exch");
    assert_eq!(err.msg, "xfer-exch: nonexistent unit price commodity: XYZ");
}

#[test]
fn assertions_report_differences() {
    let err = ledger_err("Assets:A 5 USD assert");
    assert_eq!(err.r#type, ErrorType::Assertion);
    assert_eq!(err.msg, "assert: default lot in account Assets:A does not have USD");

    let body = "\"e\" \"d\" Assets:A 5 USD xfer Equity -5 USD xfer xact\n";
    let err = ledger_err(&format!("{}Assets:A 4 USD assert", body));
    assert_eq!(
        err.msg,
        "assert: default lot in account Assets:A has 5 USD, not asserted amount 4 USD (difference of 1)"
    );

    let err = ledger_err(&format!("{}Assets:A 4 USD assert-lots-sum", body));
    assert_eq!(
        err.msg,
        "assert-lots-sum: lots in account Assets:A have a total of 5 USD, not asserted amount 4 USD (difference of 1)"
    );

    let err = ledger_err("Assets:A close Assets:A 0 USD assert");
    assert_eq!(err.msg, "assert: closed account: Assets:A");
    let err = ledger_err("Assets:A 0 XYZ assert");
    assert_eq!(err.msg, "assert: nonexistent commodity: XYZ");
}

#[test]
fn tagging_is_idempotent() {
    let ctx = ledger(
        "Assets:A t1 t2 tag Assets:A t1 tag USD t1 tag-commodity USD t1 tag-commodity\n\
         Assets:A t2 missing untag",
    );
    assert_eq!(ctx.tags()["t1"].len(), 2);
    assert!(ctx.tags().get("t2").is_none());
    assert!(ctx.tags().get("missing").is_none());
    let tags = ctx.accounts()["Assets:A"].tags();
    assert_eq!(tags.len(), 1);
    assert!(tags.contains("t1"));
    assert!(ctx.commodities()["USD"].tags().contains("t1"));
}

#[test]
fn tagging_errors() {
    let err = ledger_err("Assets:Z t tag");
    assert_eq!(err.msg, "tag: tagging nonexistent account: Assets:Z");
    let err = ledger_err("XYZ t tag-commodity");
    assert_eq!(err.msg, "tag-commodity: tagging nonexistent commodity: XYZ");
    let err = ledger_err("Assets:A tag");
    assert_eq!(err.r#type, ErrorType::Operand);
    let err = ledger_err("Assets:A close Assets:A t untag");
    assert_eq!(err.msg, "untag: closed account: Assets:A");
}

#[test]
fn notes_merge() {
    let ctx = ledger("Assets:A bank First number 123 add-notes Assets:A bank Second add-notes Assets:A add-notes");
    let notes = ctx.accounts()["Assets:A"].notes();
    assert_eq!(notes["bank"], "Second");
    assert_eq!(notes["number"], "123");

    let err = ledger_err("Assets:A bank add-notes");
    assert_eq!(err.r#type, ErrorType::Operand);
    assert_eq!(ledger_err("Assets:Z a b add-notes").r#type, ErrorType::Account);
}

#[test]
fn comments_take_exactly_one_text() {
    ledger("\"a comment\" comment ( \"xact\" comment )");
    assert_eq!(ledger_err("comment").msg, "comment: no operands given");
    assert_eq!(
        ledger_err("a b comment").msg,
        "comment: exactly one operand required, but 2 given"
    );
    assert_eq!(
        ledger_err("Assets:A 1 USD xfer comment").r#type,
        ErrorType::Operand
    );
}

#[test]
fn silence_skips_everything_in_its_scope() {
    let ctx = ledger("( silence Assets:Z 100 USD xfer \"not\" even valid xact ( ) ) Assets:C open");
    assert!(ctx.accounts().contains_key("Assets:C"));
    assert!(!ctx.accounts().contains_key("Assets:Z"));

    assert_eq!(ledger_err("silence").r#type, ErrorType::Syntax);
    assert_eq!(ledger_err("( silence").msg, "1 unclosed parentheses at EOF");
    assert_eq!(ledger_err("( \"silence\" )").r#type, ErrorType::Syntax);
}

#[test]
fn errors_carry_the_line() {
    let err = run("2021 1 1 date\n\nAssets:Z close\n").unwrap_err();
    assert_eq!(err.line, 3);
    assert_eq!(err.to_string(), "3: close: nonexistent account: Assets:Z");

    let err = run("\"multi\nline\" \"unterminated").unwrap_err();
    assert_eq!(err.r#type, ErrorType::Lex);
    assert_eq!(err.line, 2);
}

#[test]
fn wrapped_xact_observes_transactions() {
    let mut seen: Vec<Transaction> = vec![];
    let mut parser = Parser::default();
    parser.register("xact", |fn_name, mut op, ctx: &mut Context| {
        let xact = Transaction::from_operands(&mut op)
            .map_err(|e| Error::new(e.r#type, format!("{}: {}", fn_name, e.msg)))?;
        xact.execute(ctx)?;
        seen.push(xact);
        Ok(Flow::Continue)
    });
    let outcome = parser
        .parse_str(&format!(
            "{}\"Shop\" \"gift\" Assets:A -5 USD xfer \"for Sam\" set-comment Equity 5 USD xfer \
             receipt 42 xact",
            PRELUDE
        ))
        .unwrap();
    assert_eq!(outcome, Outcome::Finished);
    drop(parser);

    assert_eq!(seen.len(), 1);
    let xact = &seen[0];
    assert_eq!(xact.entity, "Shop");
    assert_eq!(xact.description, "gift");
    assert_eq!(xact.notes["receipt"], "42");
    assert_eq!(xact.transfers[0].comment.as_deref(), Some("for Sam"));
    assert_eq!(xact.transfers[1].comment, None);
}

#[test]
fn wrapped_date_cuts_off_the_ledger() {
    let cutoff = Date::from_ymd_opt(2021, 6, 30);
    let mut parser = Parser::default();
    parser.register("date", move |fn_name, op, ctx: &mut Context| {
        functions::date(fn_name, op, ctx)?;
        Ok(if ctx.date() > cutoff {
            Flow::Stop
        } else {
            Flow::Continue
        })
    });
    let outcome = parser
        .parse_str(&format!(
            "{}2021 6 30 date Assets:C open 2021 7 1 date Assets:D open ( unfinished",
            PRELUDE
        ))
        .unwrap();
    assert_eq!(outcome, Outcome::Stopped);
    let ctx = parser.into_context();
    assert!(ctx.accounts().contains_key("Assets:C"));
    assert!(!ctx.accounts().contains_key("Assets:D"));
}
