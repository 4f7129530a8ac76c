//! Property-based tests for ledger programs.
//!
//! These tests verify invariants hold for arbitrary inputs using proptest.

use proptest::prelude::*;
use rpnbook::{Context, Date, Decimal, Error, ErrorType, Parser};

const PRELUDE: &str = "2021 1 1 date USD \"US dollars\" commodity Equity open\n";

fn run(src: &str) -> (Result<(), Error>, Context) {
    let mut parser = Parser::default();
    let result = parser.parse_str(src).map(|_| ());
    (result, parser.into_context())
}

fn arb_cents() -> impl Strategy<Value = i64> {
    -1_000_000i64..1_000_000i64
}

fn amount(cents: i64) -> String {
    Decimal::new(cents, 2).to_string()
}

/// Builds a balanced nesting of scopes from open/close steps, with a comment
/// inside some of them.
fn balanced_scopes(steps: &[(bool, bool)]) -> String {
    let mut src = String::new();
    let mut depth = 0;
    for &(open, comment) in steps {
        if open {
            src.push_str("( ");
            depth += 1;
        } else if depth > 0 {
            src.push_str(") ");
            depth -= 1;
        }
        if comment {
            src.push_str("\"note\" comment ");
        }
    }
    for _ in 0..depth {
        src.push_str(") ");
    }
    src
}

fn open_accounts(n: usize) -> String {
    (0..n).map(|i| format!("Assets:A{} open\n", i)).collect()
}

proptest! {
    #[test]
    fn balanced_scopes_finish(steps in prop::collection::vec(any::<(bool, bool)>(), 0..40)) {
        let src = balanced_scopes(&steps);
        prop_assert!(run(&src).0.is_ok());

        let err = run(&format!("{} )", src)).0.unwrap_err();
        prop_assert_eq!(err.r#type, ErrorType::Syntax);
        let err = run(&format!("{} (", src)).0.unwrap_err();
        prop_assert_eq!(err.r#type, ErrorType::Syntax);
        let err = run(&format!("{} leftover", src)).0.unwrap_err();
        prop_assert_eq!(err.r#type, ErrorType::Syntax);
    }

    #[test]
    fn silenced_scopes_never_call(words in prop::collection::vec("[a-z-]{1,8}", 0..20)) {
        let src = format!("( silence {} fail xact close )", words.join(" "));
        prop_assert!(run(&src).0.is_ok());
    }

    #[test]
    fn zero_sum_xact_applies_every_transfer(amounts in prop::collection::vec(arb_cents(), 1..8)) {
        let mut src = format!("{}{}\"e\" \"d\"", PRELUDE, open_accounts(amounts.len()));
        for (i, cents) in amounts.iter().enumerate() {
            src.push_str(&format!(" Assets:A{} {} USD xfer", i, amount(*cents)));
        }
        let total: i64 = amounts.iter().sum();
        src.push_str(&format!(" Equity {} USD xfer xact", amount(-total)));

        let (result, ctx) = run(&src);
        prop_assert!(result.is_ok());
        for (i, cents) in amounts.iter().enumerate() {
            let name = format!("Assets:A{}", i);
            prop_assert_eq!(ctx.accounts()[&name].balance("", "USD"), Some(Decimal::new(*cents, 2)));
        }
    }

    #[test]
    fn unbalanced_xact_changes_nothing(
        amounts in prop::collection::vec(arb_cents(), 1..8),
        offset in (1i64..1000).prop_flat_map(|n| prop_oneof![Just(n), Just(-n)]),
    ) {
        let mut src = format!("{}{}\"e\" \"d\"", PRELUDE, open_accounts(amounts.len()));
        for (i, cents) in amounts.iter().enumerate() {
            src.push_str(&format!(" Assets:A{} {} USD xfer", i, amount(*cents)));
        }
        let total: i64 = amounts.iter().sum();
        src.push_str(&format!(" Equity {} USD xfer xact", amount(offset - total)));

        let (result, ctx) = run(&src);
        prop_assert_eq!(result.unwrap_err().r#type, ErrorType::NotBalanced);
        for account in ctx.accounts().values() {
            prop_assert_eq!(account.balance("", "USD"), Some(Decimal::ZERO));
        }
    }

    #[test]
    fn lots_sum_matches_every_lot(amounts in prop::collection::vec(arb_cents(), 1..8)) {
        let total: i64 = amounts.iter().sum();
        let mut src = format!("{}Assets:A open\n\"e\" \"d\"", PRELUDE);
        for (i, cents) in amounts.iter().enumerate() {
            src.push_str(&format!(" Assets:A {} USD xfer lot{} create-lot", amount(*cents), i));
        }
        src.push_str(&format!(" Equity {} USD xfer xact\n", amount(-total)));
        src.push_str(&format!("Assets:A {} USD assert-lots-sum\n", amount(total)));
        for (i, cents) in amounts.iter().enumerate() {
            src.push_str(&format!("Assets:A lot{} {} USD assert-lot\n", i, amount(*cents)));
        }
        prop_assert!(run(&src).0.is_ok());
    }

    #[test]
    fn tagging_twice_is_tagging_once(tags in prop::collection::vec("t_[a-z]{1,6}", 1..6), times in 1usize..4) {
        let mut src = format!("{}Assets:A open\n", PRELUDE);
        for _ in 0..times {
            src.push_str(&format!("Assets:A {} tag\n", tags.join(" ")));
        }
        let (result, ctx) = run(&src);
        prop_assert!(result.is_ok());
        for tag in &tags {
            prop_assert_eq!(ctx.tags()[tag].len(), 1);
            prop_assert!(ctx.accounts()["Assets:A"].tags().contains(tag));
        }

        src.push_str(&format!("Assets:A {} untag Assets:A {} untag\n", tags.join(" "), tags.join(" ")));
        let (result, ctx) = run(&src);
        prop_assert!(result.is_ok());
        prop_assert!(ctx.tags().is_empty());
    }

    #[test]
    fn the_clock_never_goes_back(
        first in (2000i32..2030, 1u32..13, 1u32..29),
        second in (2000i32..2030, 1u32..13, 1u32..29),
    ) {
        let src = format!(
            "{} {} {} date {} {} {} date",
            first.0, first.1, first.2, second.0, second.1, second.2
        );
        let mut parser = Parser::default();
        let result = parser.parse_str(&src);
        let first = Date::from_ymd_opt(first.0, first.1, first.2);
        let second = Date::from_ymd_opt(second.0, second.1, second.2);
        if second < first {
            prop_assert_eq!(result.unwrap_err().r#type, ErrorType::Date);
            prop_assert_eq!(parser.context().date(), first);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(parser.context().date(), second);
        }
    }
}
