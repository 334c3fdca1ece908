use std::sync::LazyLock;

use base64::Engine as _;
use fractic_server_error::ServerError;
use regex::Regex;

use crate::{
    entities::{Category, CategoryId, CategoryKind, CategorySpec},
    errors::{InvalidCategoryRule, InvalidInput, InvalidSignature},
};

static SLUG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("hardcoded regex should be valid"));
static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").expect("hardcoded regex should be valid"));
static COLOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("hardcoded regex should be valid"));
static SLUG_SEPARATOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{Han}a-zA-Z0-9]+").expect("hardcoded regex should be valid")
});

pub(crate) const MAX_LOCATION_NAME_LEN: usize = 50;
pub(crate) const MAX_NOTES_LEN: usize = 200;
pub(crate) const MAX_USERNAME_LEN: usize = 64;
const SIGNATURE_PREFIX: &str = "data:image/png;base64,";

pub(crate) fn validate_slug(slug: &str) -> Result<(), ServerError> {
    if slug.chars().count() > MAX_LOCATION_NAME_LEN || !SLUG_REGEX.is_match(slug) {
        return Err(InvalidInput::new(
            "slug",
            "only lowercase letters, digits and inner dashes are allowed",
        ));
    }
    Ok(())
}

pub(crate) fn validate_location_name(name: &str) -> Result<(), ServerError> {
    let len = name.trim().chars().count();
    if len == 0 || len > MAX_LOCATION_NAME_LEN {
        return Err(InvalidInput::new("name", "must be between 1 and 50 characters"));
    }
    Ok(())
}

pub(crate) fn validate_username(username: &str) -> Result<(), ServerError> {
    if username.len() > MAX_USERNAME_LEN || !USERNAME_REGEX.is_match(username) {
        return Err(InvalidInput::new(
            "username",
            "must start with a letter and contain only letters, digits, '.' or '_'",
        ));
    }
    Ok(())
}

pub(crate) fn validate_color(color: &str) -> Result<(), ServerError> {
    if !COLOR_REGEX.is_match(color) {
        return Err(InvalidInput::new("color", "expected #rrggbb"));
    }
    Ok(())
}

pub(crate) fn validate_notes(notes: Option<&str>) -> Result<(), ServerError> {
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(InvalidInput::new("notes", "must be at most 200 characters"));
    }
    Ok(())
}

/// Non-negative, finite cash amount.
pub(crate) fn validate_cash(field: &str, amount: f64) -> Result<(), ServerError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(InvalidInput::new(field, "must be a non-negative amount"));
    }
    Ok(())
}

/// Accepts `data:image/png;base64,<payload>` with a decodable payload.
pub(crate) fn validate_signature(role: &str, signature: &str) -> Result<(), ServerError> {
    let payload = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .ok_or_else(|| InvalidSignature::new(role))?;
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| InvalidSignature::with_debug(role, &e))?;
    Ok(())
}

/// Checks a category against the other categories of its location.
/// `own_id` is set when editing, so a rule cannot target itself.
pub(crate) fn validate_category(
    spec: &CategorySpec,
    location_categories: &[Category],
    own_id: Option<CategoryId>,
) -> Result<(), ServerError> {
    if spec.name.trim().is_empty() {
        return Err(InvalidInput::new("name", "must not be empty"));
    }
    validate_color(&spec.color)?;
    let rule_error = |details: &str| InvalidCategoryRule::new(&spec.name, details);
    match spec.kind {
        CategoryKind::BuyNGetM { buy_n, get_m, .. } if buy_n == 0 || get_m == 0 => {
            return Err(rule_error("buy and free quantities must be at least 1"));
        }
        CategoryKind::BuyNGetM { buy_n, get_m, .. } if buy_n.checked_add(get_m).is_none() => {
            return Err(rule_error("buy and free quantities are too large"));
        }
        CategoryKind::BuyOddEven { percent_off, .. }
            if !(percent_off > 0.0 && percent_off <= 100.0) =>
        {
            return Err(rule_error("percent off must be in (0, 100]"));
        }
        _ => {}
    }
    if let Some(target) = spec.kind.target() {
        let valid_target = Some(target) != own_id
            && location_categories
                .iter()
                .any(|c| c.id == target && c.kind == CategoryKind::Product);
        if !valid_target {
            return Err(rule_error(
                "target must be a product category of the same location",
            ));
        }
    }
    Ok(())
}

/// Builds a URL-friendly slug from a (possibly Chinese) name. Han characters
/// are kept as-is.
pub(crate) fn generate_slug(name: &str) -> String {
    SLUG_SEPARATOR_REGEX
        .replace_all(name, "-")
        .to_lowercase()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugs() {
        assert!(validate_slug("taipei-main").is_ok());
        assert!(validate_slug("a1").is_ok());
        assert!(validate_slug("-taipei").is_err());
        assert!(validate_slug("Taipei").is_err());
        assert!(validate_slug("tai--pei").is_err());
    }

    #[test]
    fn generated_slugs() {
        assert_eq!(generate_slug("  Main Store #2 "), "main-store-2");
        assert_eq!(generate_slug("台北 店"), "台北-店");
    }

    #[test]
    fn usernames() {
        assert!(validate_username("alice.w_1").is_ok());
        assert!(validate_username("1alice").is_err());
        assert!(validate_username("al ice").is_err());
    }

    #[test]
    fn signatures() {
        assert!(validate_signature("operator", "data:image/png;base64,aGVsbG8=").is_ok());
        assert!(validate_signature("operator", "data:image/png;base64,***").is_err());
        assert!(validate_signature("operator", "aGVsbG8=").is_err());
    }

    #[test]
    fn category_rules_must_target_products() {
        let location = crate::entities::LocationId(1);
        let existing = vec![
            Category {
                id: CategoryId(1),
                location_id: location,
                name: "Books".into(),
                color: "#112233".into(),
                kind: CategoryKind::Product,
            },
            Category {
                id: CategoryId(2),
                location_id: location,
                name: "Coupon".into(),
                color: "#112233".into(),
                kind: CategoryKind::DiscountFixed,
            },
        ];
        let rule = |kind| CategorySpec::new("Promo", "#445566", kind);

        assert!(validate_category(
            &rule(CategoryKind::BuyNGetM { target: CategoryId(1), buy_n: 2, get_m: 1 }),
            &existing,
            None
        )
        .is_ok());
        assert!(validate_category(
            &rule(CategoryKind::BuyNGetM { target: CategoryId(1), buy_n: 0, get_m: 1 }),
            &existing,
            None
        )
        .is_err());
        assert!(validate_category(
            &rule(CategoryKind::BuyNGetM { target: CategoryId(1), buy_n: u32::MAX, get_m: 1 }),
            &existing,
            None
        )
        .is_err());
        assert!(validate_category(
            &rule(CategoryKind::BuyXGetXMinus1 { target: CategoryId(2) }),
            &existing,
            None
        )
        .is_err());
        assert!(validate_category(
            &rule(CategoryKind::BuyOddEven { target: CategoryId(1), percent_off: 120.0 }),
            &existing,
            None
        )
        .is_err());
        assert!(validate_category(
            &rule(CategoryKind::BuyXGetXMinus1 { target: CategoryId(1) }),
            &existing,
            Some(CategoryId(1))
        )
        .is_err());
    }

    #[test]
    fn amounts_and_colors() {
        assert!(validate_cash("opening_cash", 0.0).is_ok());
        assert!(validate_cash("opening_cash", -1.0).is_err());
        assert!(validate_cash("opening_cash", f64::NAN).is_err());
        assert!(validate_color("#1a2B3c").is_ok());
        assert!(validate_color("red").is_err());
    }
}
