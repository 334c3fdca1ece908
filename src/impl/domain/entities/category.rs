use super::location::LocationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(pub(crate) i64);

/// How a category button affects the cart.
///
/// Rule kinds (`BuyNGetM`, `BuyXGetXMinus1`, `BuyOddEven`) always point at a
/// `Product` category of the same location, and produce a single discount
/// line computed from the units of that target in the cart.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryKind {
    Product,
    DiscountFixed,
    DiscountPercent,
    BuyNGetM {
        target: CategoryId,
        buy_n: u32,
        get_m: u32,
    },
    BuyXGetXMinus1 {
        target: CategoryId,
    },
    BuyOddEven {
        target: CategoryId,
        percent_off: f64,
    },
    OtherIncome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub location_id: LocationId,
    pub name: String,
    pub color: String,
    pub kind: CategoryKind,
}

/// Fields supplied when adding or editing a category.
#[derive(Debug, Clone)]
pub struct CategorySpec {
    pub name: String,
    pub color: String,
    pub kind: CategoryKind,
}

// --

impl CategoryId {
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CategoryKind {
    /// Key stored in the `category_type` column.
    pub fn type_key(&self) -> &'static str {
        match self {
            CategoryKind::Product => "product",
            CategoryKind::DiscountFixed => "discount_fixed",
            CategoryKind::DiscountPercent => "discount_percent",
            CategoryKind::BuyNGetM { .. } => "buy_n_get_m",
            CategoryKind::BuyXGetXMinus1 { .. } => "buy_x_get_x_minus_1",
            CategoryKind::BuyOddEven { .. } => "buy_odd_even",
            CategoryKind::OtherIncome => "other_income",
        }
    }

    pub fn target(&self) -> Option<CategoryId> {
        match self {
            CategoryKind::BuyNGetM { target, .. }
            | CategoryKind::BuyXGetXMinus1 { target }
            | CategoryKind::BuyOddEven { target, .. } => Some(*target),
            _ => None,
        }
    }

    pub fn is_rule(&self) -> bool {
        self.target().is_some()
    }
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, color: impl Into<String>, kind: CategoryKind) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            kind,
        }
    }
}
