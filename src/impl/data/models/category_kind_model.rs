use serde_derive::{Deserialize, Serialize};

use crate::entities::{CategoryId, CategoryKind};

/// Category kind as written in an import file (RON), with rule targets given
/// by category name, ex. `BuyNGetM(target: "Books", buy_n: 2, get_m: 1)`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) enum CategoryKindModel {
    Product,
    DiscountFixed,
    DiscountPercent,
    BuyNGetM {
        target: String,
        buy_n: u32,
        get_m: u32,
    },
    BuyXGetXMinus1 {
        target: String,
    },
    BuyOddEven {
        target: String,
        percent_off: f64,
    },
    OtherIncome,
}

impl CategoryKindModel {
    pub(crate) fn target_name(&self) -> Option<&str> {
        match self {
            CategoryKindModel::BuyNGetM { target, .. }
            | CategoryKindModel::BuyXGetXMinus1 { target }
            | CategoryKindModel::BuyOddEven { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Resolves the target name; `target` must be `Some` for rule kinds.
    pub(crate) fn resolve(self, target: Option<CategoryId>) -> Option<CategoryKind> {
        Some(match self {
            CategoryKindModel::Product => CategoryKind::Product,
            CategoryKindModel::DiscountFixed => CategoryKind::DiscountFixed,
            CategoryKindModel::DiscountPercent => CategoryKind::DiscountPercent,
            CategoryKindModel::OtherIncome => CategoryKind::OtherIncome,
            CategoryKindModel::BuyNGetM { buy_n, get_m, .. } => CategoryKind::BuyNGetM {
                target: target?,
                buy_n,
                get_m,
            },
            CategoryKindModel::BuyXGetXMinus1 { .. } => {
                CategoryKind::BuyXGetXMinus1 { target: target? }
            }
            CategoryKindModel::BuyOddEven { percent_off, .. } => CategoryKind::BuyOddEven {
                target: target?,
                percent_off,
            },
        })
    }
}

/// JSON stored in the `rule` column of rule categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct StoredRuleModel {
    pub(crate) target_category_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) buy_n: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) get_m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) percent_off: Option<f64>,
}

/// Splits a kind into its `category_type` and `rule` column values.
pub(crate) fn to_columns(kind: &CategoryKind) -> Result<(&'static str, Option<String>), serde_json::Error> {
    let rule = match kind {
        CategoryKind::BuyNGetM {
            target,
            buy_n,
            get_m,
        } => Some(StoredRuleModel {
            target_category_id: target.0,
            buy_n: Some(*buy_n),
            get_m: Some(*get_m),
            percent_off: None,
        }),
        CategoryKind::BuyXGetXMinus1 { target } => Some(StoredRuleModel {
            target_category_id: target.0,
            buy_n: None,
            get_m: None,
            percent_off: None,
        }),
        CategoryKind::BuyOddEven {
            target,
            percent_off,
        } => Some(StoredRuleModel {
            target_category_id: target.0,
            buy_n: None,
            get_m: None,
            percent_off: Some(*percent_off),
        }),
        _ => None,
    };
    Ok((kind.type_key(), rule.map(|r| serde_json::to_string(&r)).transpose()?))
}

/// Rebuilds a kind from its column values. Returns a description of the
/// problem for unknown types or missing rule parameters.
pub(crate) fn from_columns(type_key: &str, rule: Option<&str>) -> Result<CategoryKind, String> {
    let rule = rule
        .map(serde_json::from_str::<StoredRuleModel>)
        .transpose()
        .map_err(|e| format!("invalid rule JSON: {}", e))?;
    let need_rule = || rule.clone().ok_or_else(|| format!("{} requires a rule", type_key));
    Ok(match type_key {
        "product" => CategoryKind::Product,
        "discount_fixed" => CategoryKind::DiscountFixed,
        "discount_percent" => CategoryKind::DiscountPercent,
        "other_income" => CategoryKind::OtherIncome,
        "buy_n_get_m" => {
            let r = need_rule()?;
            CategoryKind::BuyNGetM {
                target: CategoryId(r.target_category_id),
                buy_n: r.buy_n.unwrap_or(1),
                get_m: r.get_m.unwrap_or(1),
            }
        }
        "buy_x_get_x_minus_1" => CategoryKind::BuyXGetXMinus1 {
            target: CategoryId(need_rule()?.target_category_id),
        },
        "buy_odd_even" => {
            let r = need_rule()?;
            CategoryKind::BuyOddEven {
                target: CategoryId(r.target_category_id),
                percent_off: r.percent_off.unwrap_or(50.0),
            }
        }
        other => return Err(format!("unknown category type '{}'", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn columns_round_trip_rule_kinds() {
        let kind = CategoryKind::BuyOddEven {
            target: CategoryId(7),
            percent_off: 30.0,
        };
        let (type_key, rule) = to_columns(&kind).unwrap();
        assert_eq!(type_key, "buy_odd_even");
        assert_eq!(from_columns(type_key, rule.as_deref()).unwrap(), kind);
    }

    #[test]
    fn rule_kinds_without_rule_are_rejected() {
        assert!(from_columns("buy_n_get_m", None).is_err());
        assert!(from_columns("mystery", None).is_err());
    }

    #[test]
    fn parses_ron_with_target_names() {
        let model: CategoryKindModel =
            ron::from_str(r#"BuyNGetM(target: "Books", buy_n: 2, get_m: 1)"#).unwrap();
        assert_eq!(model.target_name(), Some("Books"));
        assert_eq!(
            model.resolve(Some(CategoryId(3))),
            Some(CategoryKind::BuyNGetM {
                target: CategoryId(3),
                buy_n: 2,
                get_m: 1,
            })
        );
    }
}
