pub use chrono::NaiveDate as Date;
use getset::{CopyGetters, Getters};
pub use rust_decimal::Decimal;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Kinds of errors that `rpnbook` encounters while running a ledger.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// The input could not be read.
    Io,
    /// The input ended inside an escape or a quoted string.
    Lex,
    /// Unbalanced scopes, leftover operands, or misplaced `silence`.
    Syntax,
    /// A function received too few operands or an operand of the wrong kind.
    Operand,
    /// A malformed decimal amount.
    Number,
    /// A malformed date, or a date that moves the clock backwards.
    Date,
    /// A nonexistent, closed, or misnamed account.
    Account,
    /// A nonexistent commodity, or one an account does not allow.
    Commodity,
    /// A nonexistent lot, or a lot that cannot be closed.
    Lot,
    /// Transfers that do not share a commodity or do not sum to zero.
    NotBalanced,
    /// A balance assertion that does not hold.
    Assertion,
    /// Creating something that already exists.
    Duplicate,
}

/// A fatal error, carrying the input line at which it was detected.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("{line}: {msg}")]
pub struct Error {
    pub msg: String,
    pub line: usize,
    pub r#type: ErrorType,
}

impl Error {
    /// Creates an error that is not yet attributed to a line.
    pub fn new(r#type: ErrorType, msg: impl Into<String>) -> Self {
        Error {
            msg: msg.into(),
            line: 0,
            r#type,
        }
    }

    /// Attributes the error to `line` unless it already carries one.
    pub fn at_line(mut self, line: usize) -> Self {
        if self.line == 0 {
            self.line = line;
        }
        self
    }
}

/// A [`Decimal`] amount of a named commodity.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantity {
    pub amount: Decimal,
    pub commodity: String,
}

impl Quantity {
    pub fn new(amount: Decimal, commodity: impl Into<String>) -> Self {
        Quantity {
            amount,
            commodity: commodity.into(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.commodity)
    }
}

/// The unit price and the total price of an exchange.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeRate {
    pub unit_price: Quantity,
    pub total_price: Quantity,
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@ {} @@ {}", self.unit_price, self.total_price)
    }
}

/// Formats an optional date, printing nothing for the zero date.
pub fn format_date(date: Option<Date>) -> String {
    date.map_or_else(String::new, |d| d.to_string())
}

/// A commodity registered by the `commodity` function.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Commodity {
    /// Returns the unique name of the commodity.
    #[getset(get = "pub")]
    pub(crate) name: String,

    /// Returns the human-readable description.
    #[getset(get = "pub")]
    pub(crate) description: String,

    /// Returns the ledger date at which the commodity was created, or `None`
    /// if it was created before the first `date`.
    #[getset(get_copy = "pub")]
    pub(crate) creation_date: Option<Date>,

    /// Returns the tags attached to this commodity.
    #[getset(get = "pub")]
    pub(crate) tags: HashSet<String>,
}

impl Commodity {
    pub fn new(name: &str, description: &str, creation_date: Option<Date>) -> Self {
        Commodity {
            name: name.to_string(),
            description: description.to_string(),
            creation_date,
            tags: HashSet::new(),
        }
    }
}

/// A running balance of one commodity inside one named lot of an account.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Lot {
    /// Returns the lot name. The default lot has an empty name.
    #[getset(get = "pub")]
    pub(crate) name: String,

    /// Returns the ledger date at which the lot entry was created.
    #[getset(get_copy = "pub")]
    pub(crate) creation_date: Option<Date>,

    /// Returns the running balance.
    #[getset(get = "pub")]
    pub(crate) balance: Quantity,

    /// Returns the exchange rate recorded when an exchange created the lot.
    #[getset(get = "pub")]
    pub(crate) exchange_rate: Option<ExchangeRate>,
}

/// Lot name -> commodity name -> lot. The empty lot name is the default lot.
pub type LotMap = HashMap<String, HashMap<String, Lot>>;

/// An account and everything attached to it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct Account {
    /// Returns the unique account name.
    #[getset(get = "pub")]
    pub(crate) name: String,

    /// Returns the date of the `open` that created this account.
    #[getset(get_copy = "pub")]
    pub(crate) creation_date: Option<Date>,

    /// Returns the ledger date of the `close`, if there was one. An account
    /// closed before the first `date` has no closing date.
    #[getset(get_copy = "pub")]
    pub(crate) closing_date: Option<Date>,

    pub(crate) closed: bool,

    /// Returns the allowed commodities of this account. If there are no
    /// limitations, an empty set is returned.
    #[getset(get = "pub")]
    pub(crate) commodities: HashSet<String>,

    /// Returns every lot of the account, keyed by lot name then commodity.
    #[getset(get = "pub")]
    pub(crate) lots: LotMap,

    /// Returns the tags attached to this account.
    #[getset(get = "pub")]
    pub(crate) tags: HashSet<String>,

    /// Returns the free-form notes attached by `add-notes`.
    #[getset(get = "pub")]
    pub(crate) notes: HashMap<String, String>,
}

pub(crate) const ACCOUNT_PREFIXES: [&str; 5] =
    ["Assets:", "Liabilities:", "Income:", "Expenses:", "Equity:"];

impl Account {
    /// Creates an open account holding an empty default lot.
    pub fn new(name: &str, creation_date: Option<Date>) -> Self {
        let mut lots = LotMap::new();
        lots.insert(String::new(), HashMap::new());
        Account {
            name: name.to_string(),
            creation_date,
            closing_date: None,
            closed: false,
            commodities: HashSet::new(),
            lots,
            tags: HashSet::new(),
            notes: HashMap::new(),
        }
    }

    /// Returns true if `name` starts with one of the five root account types
    /// or is exactly `Equity`.
    pub fn is_valid_name(name: &str) -> bool {
        name == "Equity" || ACCOUNT_PREFIXES.iter().any(|p| name.starts_with(p))
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Marks the account closed as of `date`.
    pub(crate) fn close(&mut self, date: Option<Date>) {
        self.closed = true;
        self.closing_date = date;
    }

    /// Returns true if the account accepts transfers of `commodity`.
    pub fn allows(&self, commodity: &str) -> bool {
        self.commodities.is_empty() || self.commodities.contains(commodity)
    }

    pub fn lot(&self, lot: &str, commodity: &str) -> Option<&Lot> {
        self.lots.get(lot).and_then(|by_commodity| by_commodity.get(commodity))
    }

    /// Returns the balance of `commodity` in `lot`, or `None` if the lot does
    /// not exist. A lot without an entry for the commodity holds zero.
    pub fn balance(&self, lot: &str, commodity: &str) -> Option<Decimal> {
        self.lots.get(lot).map(|by_commodity| {
            by_commodity
                .get(commodity)
                .map_or(Decimal::ZERO, |l| l.balance.amount)
        })
    }

    /// Sums the balance of `commodity` across every lot of the account, or
    /// returns `None` if the sum overflows.
    pub fn lots_sum(&self, commodity: &str) -> Option<Decimal> {
        self.lots
            .values()
            .filter_map(|by_commodity| by_commodity.get(commodity))
            .try_fold(Decimal::ZERO, |sum, l| sum.checked_add(l.balance.amount))
    }

    /// Returns the first lot entry, if any, holding a nonzero balance.
    pub fn nonzero_lot(&self) -> Option<&Lot> {
        self.lots
            .values()
            .flat_map(|by_commodity| by_commodity.values())
            .find(|l| !l.balance.amount.is_zero())
    }

    /// Adds `quantity` to `lot`, creating the per-commodity entry if needed.
    /// Fails if the lot itself does not exist or the balance overflows.
    pub(crate) fn deposit(
        &mut self,
        lot: &str,
        quantity: &Quantity,
        exchange_rate: Option<&ExchangeRate>,
        date: Option<Date>,
    ) -> Result<(), Error> {
        let by_commodity = self.lots.get_mut(lot).ok_or_else(|| {
            Error::new(ErrorType::Lot, missing_lot_message(&self.name, lot))
        })?;
        match by_commodity.get_mut(&quantity.commodity) {
            Some(existing) => {
                existing.balance.amount = existing
                    .balance
                    .amount
                    .checked_add(quantity.amount)
                    .ok_or_else(amount_overflow)?;
            }
            None => {
                by_commodity.insert(
                    quantity.commodity.clone(),
                    Lot {
                        name: lot.to_string(),
                        creation_date: date,
                        balance: quantity.clone(),
                        exchange_rate: exchange_rate.cloned(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Makes sure a lot named `lot` exists.
    pub(crate) fn create_lot(&mut self, lot: &str) {
        self.lots.entry(lot.to_string()).or_default();
    }
}

pub(crate) fn amount_overflow() -> Error {
    Error::new(ErrorType::Number, "amount overflow")
}

pub(crate) fn missing_lot_message(account: &str, lot: &str) -> String {
    if lot.is_empty() {
        format!("account {} does not have a default lot", account)
    } else {
        format!("account {} does not have a lot named \"{}\"", account, lot)
    }
}

/// An entity that can carry tags.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tagged {
    Account(String),
    Commodity(String),
}

impl Tagged {
    pub fn name(&self) -> &str {
        match self {
            Tagged::Account(name) | Tagged::Commodity(name) => name,
        }
    }
}

/// The complete state a ledger builds while it runs. After a successful run it
/// is the read-only snapshot consumed by reports.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default, Getters, CopyGetters)]
pub struct Context {
    /// Returns the current ledger date, or `None` before the first `date`.
    #[getset(get_copy = "pub")]
    pub(crate) date: Option<Date>,

    /// Returns every account ever opened, keyed by name.
    #[getset(get = "pub")]
    pub(crate) accounts: HashMap<String, Account>,

    /// Returns every commodity, keyed by name.
    #[getset(get = "pub")]
    pub(crate) commodities: HashMap<String, Commodity>,

    /// Returns the tag index: tag name -> tagged entities in tagging order.
    #[getset(get = "pub")]
    pub(crate) tags: HashMap<String, Vec<Tagged>>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    /// Records `entity` under `tag`, at most once.
    pub(crate) fn index_tag(&mut self, tag: &str, entity: Tagged) {
        let tagged = self.tags.entry(tag.to_string()).or_default();
        if !tagged.contains(&entity) {
            tagged.push(entity);
        }
    }

    /// Removes `entity` from `tag`, dropping the tag once nothing carries it.
    pub(crate) fn unindex_tag(&mut self, tag: &str, entity: &Tagged) {
        if let Some(tagged) = self.tags.get_mut(tag) {
            tagged.retain(|t| t != entity);
            if tagged.is_empty() {
                self.tags.remove(tag);
            }
        }
    }

    /// Installs a fresh account, replacing a closed one of the same name.
    pub(crate) fn insert_account(&mut self, account: Account) {
        if let Some(old) = self.accounts.remove(&account.name) {
            let entity = Tagged::Account(old.name.clone());
            for tag in &old.tags {
                self.unindex_tag(tag, &entity);
            }
        }
        self.accounts.insert(account.name.clone(), account);
    }
}
