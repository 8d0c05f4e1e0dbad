//! Splits free-text ingredient lines into quantity, unit and name.

use std::sync::OnceLock;

use domains::IngredientInput;
use serde::{Deserialize, Serialize};

const UNITS: &[&str] = &[
    "tablespoons", "tablespoon", "teaspoons", "teaspoon", "cups", "cup", "ounces", "ounce",
    "pounds", "pound", "liters", "liter", "milliliters", "milliliter", "cloves", "clove",
    "slices", "slice", "pinches", "pinch", "tbsp", "tsp", "oz", "lb", "kg", "g", "ml", "l",
    "quarts", "quart", "pints", "pint", "gallons", "gallon", "sticks", "stick", "cans", "can",
    "packages", "package", "bunch", "bunches", "heads", "head", "sprigs", "sprig", "strips",
    "strip", "pieces", "piece", "large", "medium", "small",
];

/// Longest first, so `tablespoons` wins over `tablespoon` and `tbsp` over `t`.
fn units_longest_first() -> &'static [&'static str] {
    static SORTED: OnceLock<Vec<&'static str>> = OnceLock::new();
    SORTED.get_or_init(|| {
        let mut units = UNITS.to_vec();
        units.sort_by(|a, b| b.len().cmp(&a.len()));
        units
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub name: String,
}

impl From<ParsedIngredient> for IngredientInput {
    fn from(parsed: ParsedIngredient) -> Self {
        IngredientInput {
            quantity: parsed.quantity,
            unit: parsed.unit,
            name: Some(parsed.name),
        }
    }
}

fn is_quantity_char(c: char) -> bool {
    c.is_ascii_digit()
        || c.is_whitespace()
        || matches!(
            c,
            '/' | '.' | '-' | '\u{2009}' | '\u{00bc}'..='\u{00be}' | '\u{2150}'..='\u{215e}'
        )
}

/// Parses one line. A line that would leave no name comes back whole as the name.
pub fn parse_ingredient(line: &str) -> ParsedIngredient {
    let line = line.trim();
    let fallback = || ParsedIngredient {
        quantity: None,
        unit: None,
        name: line.to_string(),
    };

    let split = line.find(|c: char| !is_quantity_char(c)).unwrap_or(line.len());
    let quantity = Some(line[..split].trim()).filter(|q| !q.is_empty()).map(str::to_string);
    let mut rest = line[split..].trim_start();

    let mut unit = None;
    for candidate in units_longest_first() {
        let Some(head) = rest.get(..candidate.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(candidate) {
            continue;
        }
        let boundary = rest[candidate.len()..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c == '.');
        if boundary {
            unit = Some(candidate.to_string());
            rest = &rest[candidate.len()..];
            break;
        }
    }

    let name = rest.strip_prefix('.').unwrap_or(rest).trim();
    if name.is_empty() {
        return fallback();
    }
    ParsedIngredient {
        quantity,
        unit,
        name: name.to_string(),
    }
}

/// Parses every non-blank line, in order.
pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> Vec<ParsedIngredient> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .map(parse_ingredient)
        .collect()
}
