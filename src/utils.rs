//! Useful functions for parsing operands.

use crate::{Decimal, Error, ErrorType};
use std::str::FromStr;

/// Parses a [`Decimal`](crate::Decimal) from a [`&str`], ignoring thousands
/// separators. Numbers that cannot be represented without rounding are
/// rejected.
pub fn parse_decimal(num_str: &str) -> Result<Decimal, Error> {
    let stripped = num_str.replace(',', "");
    Decimal::from_str_exact(&stripped).map_err(|e| {
        Error::new(
            ErrorType::Number,
            format!("illegal decimal value {}: {}", num_str, e),
        )
    })
}

/// Parses one field of a `date` call.
pub fn parse_date_field<T: FromStr>(field: &str, what: &str) -> Result<T, Error>
where
    T::Err: std::fmt::Display,
{
    field.parse::<T>().map_err(|e| {
        Error::new(ErrorType::Date, format!("illegal {} {}: {}", what, field, e))
    })
}
