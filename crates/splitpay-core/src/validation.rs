//! # Validation Module
//!
//! Sanitizing and validation of every externally supplied value.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP boundary (apps/api)                                     │
//! │  ├── Body must be JSON (else 400 "Invalid JSON")                       │
//! │  └── Fields arrive as untyped serde_json::Value                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Coerce + range check + normalize                                  │
//! │  └── Failure is `None`, never a panic or an Err                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── UNIQUE share codes, foreign keys                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here is total and side-effect free. Callers turn a `None`
//! into the right [`ValidationError`](crate::ValidationError) for the field.
//!
//! ## Usage
//! ```rust
//! use serde_json::json;
//! use splitpay_core::validation::{sanitize_text, validate_phone};
//!
//! assert_eq!(sanitize_text(&json!("<b>Bob</b>")), "Bob");
//! assert_eq!(validate_phone(&json!("(555) 123-4567")).as_deref(), Some("5551234567"));
//! ```

use serde_json::Value;

use crate::money::Money;
use crate::types::Percentage;
use crate::{MAX_IDENTIFIER_LENGTH, MAX_INPUT_AMOUNT_CENTS, MAX_PARTICIPANTS, MAX_TEXT_LENGTH};

// =============================================================================
// Text
// =============================================================================

/// Sanitizes free text from a `&str`.
///
/// ## Rules
/// - Anything shaped like a tag (`<` … `>`) is removed, text between tags kept
/// - Leading/trailing whitespace trimmed
/// - Truncated to [`MAX_TEXT_LENGTH`] characters
///
/// ## Example
/// ```rust
/// use splitpay_core::validation::sanitize_str;
///
/// assert_eq!(sanitize_str("<script>alert(1)</script>Bob"), "alert(1)Bob");
/// assert_eq!(sanitize_str("  Tacos & Co  "), "Tacos & Co");
/// ```
pub fn sanitize_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(open) = rest.find('<') {
        match rest[open..].find('>') {
            Some(close) => {
                out.push_str(&rest[..open]);
                rest = &rest[open + close + 1..];
            }
            // An unclosed '<' is ordinary text
            None => break,
        }
    }
    out.push_str(rest);

    out.trim().chars().take(MAX_TEXT_LENGTH).collect()
}

/// Sanitizes an untyped value. Anything that is not a string becomes `""`.
pub fn sanitize_text(input: &Value) -> String {
    match input {
        Value::String(s) => sanitize_str(s),
        _ => String::new(),
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Validates an opaque identifier (split id, participant id, share code).
///
/// ## Rules
/// - 1 to [`MAX_IDENTIFIER_LENGTH`] characters
/// - ASCII letters, digits, `-` and `_` only
///
/// ## Example
/// ```rust
/// use splitpay_core::validation::validate_identifier_str;
///
/// assert!(validate_identifier_str("k3x9q2m7ab").is_some());
/// assert!(validate_identifier_str("../etc/passwd").is_none());
/// assert!(validate_identifier_str(&"a".repeat(51)).is_none());
/// ```
pub fn validate_identifier_str(input: &str) -> Option<String> {
    if input.is_empty() || input.len() > MAX_IDENTIFIER_LENGTH {
        return None;
    }

    if !input
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return None;
    }

    Some(input.to_string())
}

/// Validates an untyped identifier; non-strings are invalid.
pub fn validate_identifier(input: &Value) -> Option<String> {
    match input {
        Value::String(s) => validate_identifier_str(s),
        _ => None,
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// Coerces a JSON number or numeric string to a finite `f64`.
///
/// Booleans, null, arrays, objects and blank strings do not coerce.
fn coerce_number(input: &Value) -> Option<f64> {
    let num = match input {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };

    num.is_finite().then_some(num)
}

/// Validates a monetary amount given in dollars.
///
/// ## Rules
/// - Must coerce to a finite number
/// - Must be within 0 to 1,000,000 inclusive
/// - Rounded to the cent
///
/// This is the single place a float becomes [`Money`]; everything downstream
/// is integer cents.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use splitpay_core::validation::validate_monetary_amount;
///
/// assert_eq!(validate_monetary_amount(&json!(12.345)).unwrap().cents(), 1235);
/// assert_eq!(validate_monetary_amount(&json!("30")).unwrap().cents(), 3000);
/// assert!(validate_monetary_amount(&json!(-1)).is_none());
/// assert!(validate_monetary_amount(&json!("abc")).is_none());
/// ```
pub fn validate_monetary_amount(input: &Value) -> Option<Money> {
    let num = coerce_number(input)?;

    // Range applies to the amount as given, not the rounded cents
    if num < 0.0 || num > MAX_INPUT_AMOUNT_CENTS as f64 / 100.0 {
        return None;
    }

    Some(Money::from_cents((num * 100.0).round() as i64))
}

/// Validates a percentage in the range [0, 100].
///
/// The result keeps two decimal places of precision (basis points).
pub fn validate_percentage(input: &Value) -> Option<Percentage> {
    let num = coerce_number(input)?;

    if !(0.0..=100.0).contains(&num) {
        return None;
    }

    Some(Percentage::from_bps((num * 100.0).round() as u32))
}

// =============================================================================
// Phone Numbers
// =============================================================================

/// Normalizes and validates a phone number.
///
/// ## Rules
/// - Only strings are accepted
/// - Everything except digits is stripped; a `+` survives only as the
///   first character
/// - Valid when 10 to 16 digits remain
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use splitpay_core::validation::validate_phone;
///
/// assert_eq!(validate_phone(&json!("+1 (555) 123-4567")).as_deref(), Some("+15551234567"));
/// assert!(validate_phone(&json!("123")).is_none());
/// ```
pub fn validate_phone(input: &Value) -> Option<String> {
    let raw = match input {
        Value::String(s) => s.trim(),
        _ => return None,
    };

    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if !(10..=16).contains(&digits.len()) {
        return None;
    }

    if raw.starts_with('+') {
        Some(format!("+{}", digits))
    } else {
        Some(digits)
    }
}

// =============================================================================
// Participant Lists
// =============================================================================

/// One validated entry of a create-split participant list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantInput {
    pub name: String,
    pub phone: Option<String>,
    /// Explicit share; `None` means "split the rest equally".
    pub amount: Option<Money>,
}

/// Treats `null`, a missing key and `""` as "not provided".
fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Validates the participant list of a create-split request.
///
/// ## Rules
/// - Must be an array of 1 to [`MAX_PARTICIPANTS`] objects
/// - Each `name` must sanitize to a non-empty string
/// - `phone` and `amount` are optional; when provided they must be valid
/// - One bad entry rejects the whole list (no partial acceptance)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Create Split form                                                      │
/// │                                                                         │
/// │  [{name:"Ana"}, {name:"Ben", phone:"555 123 4567"}, {name:"Cy",        │
/// │   amount: 12.5}]                                                        │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_participant_list ← THIS FUNCTION                             │
/// │       │                                                                 │
/// │       ├── any entry bad? → None → 400 "Invalid participants data"      │
/// │       │                                                                 │
/// │       └── OK → Vec<ParticipantInput> → share computation               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_participant_list(input: &Value) -> Option<Vec<ParticipantInput>> {
    let entries = input.as_array()?;
    if entries.is_empty() || entries.len() > MAX_PARTICIPANTS {
        return None;
    }

    entries
        .iter()
        .map(|entry| {
            let obj = entry.as_object()?;

            let name = sanitize_text(obj.get("name").unwrap_or(&Value::Null));
            if name.is_empty() {
                return None;
            }

            let phone = match obj.get("phone") {
                p if is_absent(p) => None,
                Some(p) => Some(validate_phone(p)?),
                None => None,
            };

            let amount = match obj.get("amount") {
                a if is_absent(a) => None,
                Some(a) => Some(validate_monetary_amount(a)?),
                None => None,
            };

            Some(ParticipantInput {
                name,
                phone,
                amount,
            })
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_strips_tags() {
        assert_eq!(
            sanitize_text(&json!("<script>alert(1)</script>Bob")),
            "alert(1)Bob"
        );
        assert_eq!(sanitize_str("a < b"), "a < b");
        assert_eq!(sanitize_str("<<b>>x"), ">x");
    }

    #[test]
    fn test_sanitize_non_text_is_empty() {
        assert_eq!(sanitize_text(&json!(42)), "");
        assert_eq!(sanitize_text(&json!(null)), "");
        assert_eq!(sanitize_text(&json!(["Bob"])), "");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(800);
        assert_eq!(sanitize_str(&long).chars().count(), MAX_TEXT_LENGTH);
    }

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier(&json!("550e8400-e29b-41d4-a716-446655440000")).is_some());
        assert!(validate_identifier(&json!("abc_DEF-123")).is_some());

        assert!(validate_identifier(&json!("")).is_none());
        assert!(validate_identifier(&json!("has space")).is_none());
        assert!(validate_identifier(&json!("a/b")).is_none());
        assert!(validate_identifier(&json!(123)).is_none());
        assert!(validate_identifier(&json!("a".repeat(51))).is_none());
        assert!(validate_identifier(&json!("a".repeat(50))).is_some());
    }

    #[test]
    fn test_validate_monetary_amount() {
        assert_eq!(validate_monetary_amount(&json!(100)).unwrap().cents(), 10_000);
        assert_eq!(validate_monetary_amount(&json!(0)).unwrap().cents(), 0);
        assert_eq!(validate_monetary_amount(&json!(" 19.99 ")).unwrap().cents(), 1999);
        assert_eq!(
            validate_monetary_amount(&json!(1_000_000)).unwrap().cents(),
            100_000_000
        );

        assert!(validate_monetary_amount(&json!(1_000_000.01)).is_none());
        assert!(validate_monetary_amount(&json!(-0.5)).is_none());
        assert!(validate_monetary_amount(&json!("NaN")).is_none());
        assert!(validate_monetary_amount(&json!("inf")).is_none());
        assert!(validate_monetary_amount(&json!("")).is_none());
        assert!(validate_monetary_amount(&json!(true)).is_none());
        assert!(validate_monetary_amount(&json!(null)).is_none());
    }

    #[test]
    fn test_validate_monetary_amount_range_before_rounding() {
        // Would round to 0 cents or exactly the cap
        assert!(validate_monetary_amount(&json!(-0.001)).is_none());
        assert!(validate_monetary_amount(&json!(-0.004)).is_none());
        assert!(validate_monetary_amount(&json!("-0.001")).is_none());
        assert!(validate_monetary_amount(&json!(1_000_000.004)).is_none());

        assert_eq!(validate_monetary_amount(&json!(0.004)).unwrap().cents(), 0);
        assert_eq!(
            validate_monetary_amount(&json!(999_999.996)).unwrap().cents(),
            100_000_000
        );
    }

    #[test]
    fn test_validate_monetary_amount_is_idempotent() {
        for raw in [json!(0.1), json!(12.345), json!("7.005"), json!(999_999.999)] {
            let Some(first) = validate_monetary_amount(&raw) else {
                continue;
            };
            let again = validate_monetary_amount(&json!(first.to_decimal_string())).unwrap();
            assert_eq!(first, again);

            let as_number = first.cents() as f64 / 100.0;
            assert_eq!(validate_monetary_amount(&json!(as_number)).unwrap(), first);
        }
    }

    #[test]
    fn test_validate_percentage() {
        assert_eq!(validate_percentage(&json!(20)).unwrap().bps(), 2000);
        assert_eq!(validate_percentage(&json!("12.5")).unwrap().bps(), 1250);
        assert_eq!(validate_percentage(&json!(0)).unwrap().bps(), 0);
        assert_eq!(validate_percentage(&json!(100)).unwrap().bps(), 10_000);

        assert!(validate_percentage(&json!(100.01)).is_none());
        assert!(validate_percentage(&json!(-1)).is_none());
        assert!(validate_percentage(&json!("twenty")).is_none());
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(
            validate_phone(&json!("(555) 123-4567")).as_deref(),
            Some("5551234567")
        );
        assert_eq!(
            validate_phone(&json!("+44 20 7946 0958")).as_deref(),
            Some("+442079460958")
        );
        // '+' only counts at the start
        assert_eq!(
            validate_phone(&json!("555+123+4567")).as_deref(),
            Some("5551234567")
        );

        assert!(validate_phone(&json!("123")).is_none());
        assert!(validate_phone(&json!("1".repeat(17))).is_none());
        assert!(validate_phone(&json!(5551234567_u64)).is_none());
    }

    #[test]
    fn test_validate_participant_list() {
        let list = validate_participant_list(&json!([
            { "name": "Ana" },
            { "name": " <i>Ben</i> ", "phone": "555-123-4567" },
            { "name": "Cy", "amount": 12.5, "phone": "" },
        ]))
        .unwrap();

        assert_eq!(list.len(), 3);
        assert_eq!(list[1].name, "Ben");
        assert_eq!(list[1].phone.as_deref(), Some("5551234567"));
        assert_eq!(list[2].amount, Some(Money::from_cents(1250)));
        assert_eq!(list[2].phone, None);
    }

    #[test]
    fn test_validate_participant_list_rejects_whole_list() {
        assert!(validate_participant_list(&json!([])).is_none());
        assert!(validate_participant_list(&json!("Ana")).is_none());
        assert!(validate_participant_list(&json!([{ "name": "Ana" }, "Ben"])).is_none());
        assert!(validate_participant_list(&json!([{ "name": "Ana" }, { "name": "<b></b>" }])).is_none());
        assert!(validate_participant_list(&json!([{ "name": "Ana", "phone": "12" }])).is_none());
        assert!(validate_participant_list(&json!([{ "name": "Ana", "amount": -3 }])).is_none());

        let too_many: Vec<Value> = (0..51).map(|i| json!({ "name": format!("P{}", i) })).collect();
        assert!(validate_participant_list(&Value::Array(too_many)).is_none());
    }
}
