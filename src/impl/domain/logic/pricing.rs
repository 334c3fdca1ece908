use std::collections::HashMap;

use fractic_server_error::ServerError;
use iso_currency::Currency;

use crate::{
    entities::{CartLine, Category, CategoryId, CategoryKind},
    errors::{EmptyCart, EntityNotFound, InvalidCategoryRule, InvalidInput},
};

use crate::domain::entities::transaction::NewTransactionItem;

/// Largest quantity a single cart line may carry.
pub(crate) const MAX_LINE_QUANTITY: u32 = 1000;

/// Result of pricing a cart, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PricedCart {
    pub(crate) items: Vec<NewTransactionItem>,
    pub(crate) gross_sales: f64,
    /// Positive sum of all discount items.
    pub(crate) discount_total: f64,
    pub(crate) donation_total: f64,
    /// Other income excluding donations.
    pub(crate) other_total: f64,
    /// Product units sold.
    pub(crate) item_count: i64,
}

pub(crate) struct PriceCalculator<'a> {
    currency: Currency,
    donation_category_name: &'a str,
}

impl PricedCart {
    pub(crate) fn net_sales(&self) -> f64 {
        self.gross_sales - self.discount_total
    }

    pub(crate) fn other_income_total(&self) -> f64 {
        self.donation_total + self.other_total
    }

    /// Amount the customer pays.
    pub(crate) fn amount_due(&self) -> f64 {
        self.net_sales() + self.other_income_total()
    }
}

impl<'a> PriceCalculator<'a> {
    pub(crate) fn new(currency: Currency, donation_category_name: &'a str) -> Self {
        Self {
            currency,
            donation_category_name,
        }
    }

    /// Expands the keyed-in lines into items, applying the discount rules of
    /// the given categories (all belonging to the same location).
    pub(crate) fn evaluate(
        &self,
        lines: &[CartLine],
        categories: &[Category],
    ) -> Result<PricedCart, ServerError> {
        let by_id: HashMap<CategoryId, &Category> = categories.iter().map(|c| (c.id, c)).collect();
        let mut cart = PricedCart {
            items: Vec::new(),
            gross_sales: 0.0,
            discount_total: 0.0,
            donation_total: 0.0,
            other_total: 0.0,
            item_count: 0,
        };

        // Products and other income first, so that discounts can see the
        // complete set of units regardless of the order they were keyed in.
        let mut units: HashMap<CategoryId, Vec<f64>> = HashMap::new();
        let mut discount_lines = Vec::new();
        for line in lines {
            let category = by_id.get(&line.category_id).ok_or_else(|| {
                EntityNotFound::new("Category", &line.category_id.to_string())
            })?;
            if line.quantity == 0 {
                return Err(InvalidInput::new("quantity", "must be at least 1"));
            }
            if line.quantity > MAX_LINE_QUANTITY {
                return Err(InvalidInput::new(
                    "quantity",
                    &format!("must be at most {}", MAX_LINE_QUANTITY),
                ));
            }
            if !line.value.is_finite() {
                return Err(InvalidInput::new("value", "must be a finite number"));
            }
            match &category.kind {
                CategoryKind::Product => {
                    if line.value < 0.0 {
                        return Err(InvalidInput::new("price", "must not be negative"));
                    }
                    if line.value == 0.0 {
                        continue;
                    }
                    for _ in 0..line.quantity {
                        cart.items.push(NewTransactionItem {
                            category_id: Some(category.id),
                            price: line.value,
                        });
                        units.entry(category.id).or_default().push(line.value);
                    }
                    cart.gross_sales += line.value * line.quantity as f64;
                    cart.item_count += line.quantity as i64;
                }
                CategoryKind::OtherIncome => {
                    if line.value <= 0.0 {
                        return Err(InvalidInput::new("amount", "must be greater than zero"));
                    }
                    for _ in 0..line.quantity {
                        cart.items.push(NewTransactionItem {
                            category_id: Some(category.id),
                            price: line.value,
                        });
                    }
                    let total = line.value * line.quantity as f64;
                    if category.name == self.donation_category_name {
                        cart.donation_total += total;
                    } else {
                        cart.other_total += total;
                    }
                }
                _ => discount_lines.push((line, *category)),
            }
        }

        for (line, category) in discount_lines {
            let discount = self.discount_for(line, category, &by_id, &units, cart.gross_sales)?;
            // Discounts never take net sales below zero.
            let allowed = discount.min(cart.gross_sales - cart.discount_total);
            if allowed <= 0.0 {
                continue;
            }
            cart.items.push(NewTransactionItem {
                category_id: Some(category.id),
                price: -allowed,
            });
            cart.discount_total += allowed;
        }

        if cart.items.is_empty() {
            return Err(EmptyCart::new());
        }
        Ok(cart)
    }

    /// Positive discount amount produced by a single discount line.
    fn discount_for(
        &self,
        line: &CartLine,
        category: &Category,
        by_id: &HashMap<CategoryId, &Category>,
        units: &HashMap<CategoryId, Vec<f64>>,
        product_subtotal: f64,
    ) -> Result<f64, ServerError> {
        if let Some(target) = category.kind.target() {
            match by_id.get(&target) {
                Some(t) if t.kind == CategoryKind::Product => {}
                _ => {
                    return Err(InvalidCategoryRule::new(
                        &category.name,
                        "target must be a product category of the same location",
                    ))
                }
            }
        }
        let target_units = |target: &CategoryId| -> Vec<f64> {
            let mut v = units.get(target).cloned().unwrap_or_default();
            v.sort_by(|a, b| b.total_cmp(a));
            v
        };
        let amount = match &category.kind {
            CategoryKind::DiscountFixed => line.value.abs() * line.quantity as f64,
            CategoryKind::DiscountPercent => {
                if line.value <= 0.0 || line.value > 100.0 {
                    return Err(InvalidInput::new("percentage", "must be in (0, 100]"));
                }
                product_subtotal * line.value / 100.0
            }
            CategoryKind::BuyNGetM {
                target,
                buy_n,
                get_m,
            } => {
                if *buy_n == 0 || *get_m == 0 {
                    return Err(InvalidCategoryRule::new(
                        &category.name,
                        "n and m must be at least 1",
                    ));
                }
                let chunk = buy_n.checked_add(*get_m).ok_or_else(|| {
                    InvalidCategoryRule::new(&category.name, "n and m are too large")
                })? as usize;
                target_units(target)
                    .chunks_exact(chunk)
                    .map(|c| c[*buy_n as usize..].iter().sum::<f64>())
                    .sum()
            }
            CategoryKind::BuyXGetXMinus1 { target } => {
                let sorted = target_units(target);
                let free = sorted.len().saturating_sub(1) / 2;
                sorted[sorted.len() - free..].iter().sum()
            }
            CategoryKind::BuyOddEven {
                target,
                percent_off,
            } => {
                if *percent_off <= 0.0 || *percent_off > 100.0 {
                    return Err(InvalidCategoryRule::new(
                        &category.name,
                        "percent off must be in (0, 100]",
                    ));
                }
                target_units(target)
                    .chunks_exact(2)
                    .map(|pair| pair[1] * percent_off / 100.0)
                    .sum()
            }
            CategoryKind::Product | CategoryKind::OtherIncome => 0.0,
        };
        Ok(round_amount(amount, self.currency))
    }
}

/// Rounds to the currency's minor units (ex. whole yen for JPY).
pub(crate) fn round_amount(amount: f64, currency: Currency) -> f64 {
    let factor = 10_f64.powi(currency.exponent().unwrap_or(0) as i32);
    (amount * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::LocationId;
    use pretty_assertions::assert_eq;

    const DONATION: &str = "捐款";

    fn category(id: i64, name: &str, kind: CategoryKind) -> Category {
        Category {
            id: CategoryId(id),
            location_id: LocationId(1),
            name: name.to_string(),
            color: "#cccccc".to_string(),
            kind,
        }
    }

    fn categories() -> Vec<Category> {
        vec![
            category(1, "Books", CategoryKind::Product),
            category(2, "Clothes", CategoryKind::Product),
            category(3, "Fixed", CategoryKind::DiscountFixed),
            category(4, "Percent", CategoryKind::DiscountPercent),
            category(
                5,
                "Buy2Get1",
                CategoryKind::BuyNGetM {
                    target: CategoryId(1),
                    buy_n: 2,
                    get_m: 1,
                },
            ),
            category(
                6,
                "BuyXGetXMinus1",
                CategoryKind::BuyXGetXMinus1 {
                    target: CategoryId(1),
                },
            ),
            category(
                7,
                "OddEven",
                CategoryKind::BuyOddEven {
                    target: CategoryId(2),
                    percent_off: 50.0,
                },
            ),
            category(8, DONATION, CategoryKind::OtherIncome),
            category(9, "Bags", CategoryKind::OtherIncome),
            category(
                10,
                "Broken",
                CategoryKind::BuyXGetXMinus1 {
                    target: CategoryId(3),
                },
            ),
        ]
    }

    fn calc() -> PriceCalculator<'static> {
        PriceCalculator::new(Currency::TWD, DONATION)
    }

    #[test]
    fn products_expand_to_units() {
        let cart = calc()
            .evaluate(&[CartLine::new(CategoryId(1), 3, 50.0)], &categories())
            .unwrap();
        assert_eq!(cart.items.len(), 3);
        assert_eq!(cart.gross_sales, 150.0);
        assert_eq!(cart.item_count, 3);
        assert_eq!(cart.net_sales(), 150.0);
    }

    #[test]
    fn fixed_and_percent_discounts() {
        let cart = calc()
            .evaluate(
                &[
                    CartLine::new(CategoryId(1), 2, 100.0),
                    CartLine::single(CategoryId(3), -30.0),
                    CartLine::single(CategoryId(4), 15.0),
                ],
                &categories(),
            )
            .unwrap();
        assert_eq!(cart.discount_total, 60.0);
        assert_eq!(cart.net_sales(), 140.0);
    }

    #[test]
    fn buy_n_get_m_frees_cheapest_in_complete_chunks() {
        let cart = calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(1), 100.0),
                    CartLine::single(CategoryId(1), 80.0),
                    CartLine::single(CategoryId(1), 60.0),
                    CartLine::single(CategoryId(1), 40.0),
                    CartLine::single(CategoryId(5), 0.0),
                ],
                &categories(),
            )
            .unwrap();
        // [100, 80, 60] -> 60 free; [40] is incomplete.
        assert_eq!(cart.discount_total, 60.0);
    }

    #[test]
    fn buy_x_get_x_minus_one() {
        let lines: Vec<CartLine> = [50.0, 40.0, 30.0, 20.0, 10.0]
            .into_iter()
            .map(|p| CartLine::single(CategoryId(1), p))
            .chain(std::iter::once(CartLine::single(CategoryId(6), 0.0)))
            .collect();
        let cart = calc().evaluate(&lines, &categories()).unwrap();
        // floor((5 - 1) / 2) = 2 cheapest free.
        assert_eq!(cart.discount_total, 30.0);
    }

    #[test]
    fn odd_even_discounts_cheaper_unit_of_each_pair() {
        let cart = calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(2), 200.0),
                    CartLine::single(CategoryId(2), 100.0),
                    CartLine::single(CategoryId(2), 300.0),
                    CartLine::single(CategoryId(7), 0.0),
                ],
                &categories(),
            )
            .unwrap();
        // [300, 200] -> 100 off; 100 pays full.
        assert_eq!(cart.discount_total, 100.0);
    }

    #[test]
    fn discounts_are_capped_at_gross_sales() {
        let cart = calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(1), 50.0),
                    CartLine::single(CategoryId(3), 80.0),
                ],
                &categories(),
            )
            .unwrap();
        assert_eq!(cart.discount_total, 50.0);
        assert_eq!(cart.net_sales(), 0.0);
    }

    #[test]
    fn other_income_is_split_by_donation_name() {
        let cart = calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(8), 100.0),
                    CartLine::new(CategoryId(9), 2, 5.0),
                ],
                &categories(),
            )
            .unwrap();
        assert_eq!(cart.donation_total, 100.0);
        assert_eq!(cart.other_total, 10.0);
        assert_eq!(cart.item_count, 0);
        assert_eq!(cart.amount_due(), 110.0);
    }

    #[test]
    fn zero_priced_products_are_dropped_and_empty_cart_rejected() {
        assert!(calc()
            .evaluate(&[CartLine::single(CategoryId(1), 0.0)], &categories())
            .is_err());
        assert!(calc().evaluate(&[], &categories()).is_err());
    }

    #[test]
    fn rule_targeting_non_product_is_rejected() {
        assert!(calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(1), 10.0),
                    CartLine::single(CategoryId(10), 0.0),
                ],
                &categories(),
            )
            .is_err());
    }

    #[test]
    fn oversized_quantities_are_rejected() {
        assert!(calc()
            .evaluate(
                &[CartLine::new(CategoryId(1), MAX_LINE_QUANTITY, 1.0)],
                &categories()
            )
            .is_ok());
        assert!(calc()
            .evaluate(&[CartLine::new(CategoryId(1), u32::MAX, 1.0)], &categories())
            .is_err());
        assert!(calc()
            .evaluate(&[CartLine::new(CategoryId(3), 1001, -1.0)], &categories())
            .is_err());
    }

    #[test]
    fn overflowing_buy_n_get_m_rule_is_rejected() {
        let mut with_rule = categories();
        with_rule.push(category(
            11,
            "Huge",
            CategoryKind::BuyNGetM {
                target: CategoryId(1),
                buy_n: u32::MAX,
                get_m: 1,
            },
        ));
        assert!(calc()
            .evaluate(
                &[
                    CartLine::single(CategoryId(1), 10.0),
                    CartLine::single(CategoryId(11), 0.0),
                ],
                &with_rule,
            )
            .is_err());
    }

    #[test]
    fn unknown_category_is_rejected() {
        assert!(calc()
            .evaluate(&[CartLine::single(CategoryId(99), 10.0)], &categories())
            .is_err());
    }

    #[test]
    fn rounding_follows_currency() {
        assert_eq!(round_amount(12.5, Currency::JPY), 13.0);
        assert_eq!(round_amount(12.346, Currency::USD), 12.35);
    }
}
