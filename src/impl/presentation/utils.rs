use iso_currency::Currency;
use num_format::{Locale, ToFormattedString as _};

/// Standard number decimal places for the given currency
/// (ex. JPY = 0, USD = 2).
pub(crate) fn decimal_places(currency: Currency) -> usize {
    currency.exponent().unwrap_or(0) as usize
}

/// Format cash amount with currency code, correct number of decimal places and
/// thousands separators, ex. `-1,234.50 TWD`.
///
/// Always uses the en locale ('.' as decimal mark) regardless of currency.
pub(crate) fn format_amount(amount: f64, currency: Currency) -> String {
    format!("{} {}", format_number(amount, currency), currency.code())
}

/// Same as `format_amount`, without the currency code.
pub(crate) fn format_number(amount: f64, currency: Currency) -> String {
    let decimal_places = decimal_places(currency);
    let factor = 10f64.powi(decimal_places as i32);
    let minor_units = (amount.abs() * factor).round() as u64;
    let sign = if amount < 0.0 && minor_units > 0 { "-" } else { "" };
    let integer_part = (minor_units / factor as u64).to_formatted_string(&Locale::en);
    if decimal_places == 0 {
        format!("{}{}", sign, integer_part)
    } else {
        format!(
            "{}{}.{:0decimal_places$}",
            sign,
            integer_part,
            minor_units % factor as u64
        )
    }
}
