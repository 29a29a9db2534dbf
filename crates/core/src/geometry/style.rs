//! Computed style subset used by the visibility evaluator.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The `display` value of an element's computed style.
///
/// Only `none` matters to visibility, so values outside the common set
/// (`-webkit-box`, `ruby`, `table-row-group`, ...) are kept verbatim as
/// [`Display::Other`] and count as displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Display {
    None,
    Block,
    Inline,
    InlineBlock,
    Flex,
    InlineFlex,
    Grid,
    InlineGrid,
    FlowRoot,
    ListItem,
    Contents,
    Table,
    TableRow,
    TableCell,
    Other(String),
}

impl Display {
    pub fn as_str(&self) -> &str {
        match self {
            Display::None => "none",
            Display::Block => "block",
            Display::Inline => "inline",
            Display::InlineBlock => "inline-block",
            Display::Flex => "flex",
            Display::InlineFlex => "inline-flex",
            Display::Grid => "grid",
            Display::InlineGrid => "inline-grid",
            Display::FlowRoot => "flow-root",
            Display::ListItem => "list-item",
            Display::Contents => "contents",
            Display::Table => "table",
            Display::TableRow => "table-row",
            Display::TableCell => "table-cell",
            Display::Other(value) => value,
        }
    }
}

impl FromStr for Display {
    type Err = Error;

    /// Parse a computed `display` value.
    ///
    /// Only an empty value is rejected; unrecognised keywords become
    /// [`Display::Other`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        Ok(match value.as_str() {
            "" => return Err(Error::UnsupportedValue("display: empty value".into())),
            "none" => Display::None,
            "block" => Display::Block,
            "inline" => Display::Inline,
            "inline-block" => Display::InlineBlock,
            "flex" => Display::Flex,
            "inline-flex" => Display::InlineFlex,
            "grid" => Display::Grid,
            "inline-grid" => Display::InlineGrid,
            "flow-root" => Display::FlowRoot,
            "list-item" => Display::ListItem,
            "contents" => Display::Contents,
            "table" => Display::Table,
            "table-row" => Display::TableRow,
            "table-cell" => Display::TableCell,
            _ => Display::Other(value),
        })
    }
}

impl TryFrom<String> for Display {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Display> for String {
    fn from(display: Display) -> Self {
        display.as_str().to_string()
    }
}

/// The `visibility` keyword of an element's computed style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    Visible,
    Hidden,
    Collapse,
}

impl FromStr for Visibility {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "visible" => Visibility::Visible,
            "hidden" => Visibility::Hidden,
            "collapse" => Visibility::Collapse,
            other => return Err(Error::UnsupportedValue(format!("visibility: {other}"))),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputedStyle {
    pub display: Display,
    pub visibility: Visibility,
    pub opacity: f64,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self { display: Display::Block, visibility: Visibility::Visible, opacity: 1.0 }
    }
}

impl ComputedStyle {
    /// Parse the three computed-style strings a host reports.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedValue` for an empty `display` or an unknown
    /// `visibility` keyword, and `Error::InvalidInput` for an opacity that is
    /// not a finite number.
    pub fn parse(display: &str, visibility: &str, opacity: &str) -> Result<Self, Error> {
        let opacity: f64 = opacity
            .trim()
            .parse()
            .ok()
            .filter(|value: &f64| value.is_finite())
            .ok_or_else(|| Error::InvalidInput(format!("opacity is not a finite number: {opacity:?}")))?;
        Ok(Self { display: display.parse()?, visibility: visibility.parse()?, opacity })
    }

    /// Whether the style alone hides the element, regardless of geometry.
    pub fn hides_element(&self) -> bool {
        self.display == Display::None || self.visibility != Visibility::Visible || self.opacity <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_computed_style() {
        let style = ComputedStyle::parse("inline-block", "visible", "0.75").unwrap();
        assert_eq!(style.display, Display::InlineBlock);
        assert_eq!(style.visibility, Visibility::Visible);
        assert_eq!(style.opacity, 0.75);
        assert!(!style.hides_element());
    }

    #[test]
    fn test_uncommon_display_values_are_displayed() {
        for keyword in ["-webkit-box", "-webkit-inline-box", "inline-table", "table-row-group", "ruby"] {
            let style = ComputedStyle::parse(keyword, "visible", "1").unwrap();
            assert_eq!(style.display, Display::Other(keyword.to_string()));
            assert!(!style.hides_element(), "{keyword} should not hide");

            let json = serde_json::json!({"display": keyword, "visibility": "visible", "opacity": 1.0});
            let style: ComputedStyle = serde_json::from_value(json).unwrap();
            assert_eq!(style.display.as_str(), keyword);
        }
    }

    #[test]
    fn test_display_serde_uses_css_keywords() {
        let style = ComputedStyle::parse("Inline-Flex", "visible", "1").unwrap();
        let json = serde_json::to_value(&style).unwrap();
        assert_eq!(json["display"], "inline-flex");

        let style: ComputedStyle =
            serde_json::from_value(serde_json::json!({"display": "none", "visibility": "visible", "opacity": 1.0}))
                .unwrap();
        assert!(style.hides_element());
    }

    #[test]
    fn test_rejected_keywords() {
        let err = ComputedStyle::parse("  ", "visible", "1").unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue(_)));

        let err = "obscured".parse::<Visibility>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue(_)));
    }

    #[test]
    fn test_bad_opacity_is_invalid_input() {
        for opacity in ["half", "NaN", "inf", "-inf"] {
            let err = ComputedStyle::parse("block", "visible", opacity).unwrap_err();
            assert!(matches!(err, Error::InvalidInput(_)), "{opacity}");
        }
    }

    #[test]
    fn test_hiding_styles() {
        let base = ComputedStyle::default();
        assert!(ComputedStyle { display: Display::None, ..base.clone() }.hides_element());
        assert!(ComputedStyle { visibility: Visibility::Hidden, ..base.clone() }.hides_element());
        assert!(ComputedStyle { visibility: Visibility::Collapse, ..base.clone() }.hides_element());
        assert!(ComputedStyle { opacity: 0.0, ..base.clone() }.hides_element());
        assert!(!ComputedStyle { opacity: 0.01, ..base }.hides_element());
    }
}
