//! Class and style normalization.
//!
//! `class` accepts a string, a list (nested freely) or a map of
//! name → truthy value. `style` accepts a map, a CSS text string, or a list
//! of either. Both are normalized when a vnode is created so diffs compare
//! canonical values.

use indexmap::IndexMap;

use super::props::PropValue;

/// Normalized style declarations.
pub type StyleMap = IndexMap<String, PropValue>;

/// Flatten a class value into a space separated string.
pub fn normalize_class(value: &PropValue) -> String {
    let mut out = String::new();
    collect_classes(value, &mut out);
    out
}

fn collect_classes(value: &PropValue, out: &mut String) {
    match value {
        PropValue::Str(s) => push_class(out, s),
        PropValue::List(items) => {
            for item in items {
                collect_classes(item, out);
            }
        }
        PropValue::Map(map) => {
            for (name, enabled) in map {
                if enabled.is_truthy() {
                    push_class(out, name);
                }
            }
        }
        _ => {}
    }
}

fn push_class(out: &mut String, name: &str) {
    let name = name.trim();
    if name.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(name);
}

/// Merge a style value into one declaration map. Later entries win.
pub fn normalize_style(value: &PropValue) -> Option<StyleMap> {
    match value {
        PropValue::Map(map) => Some(map.clone()),
        PropValue::Str(css) => Some(
            parse_string_style(css)
                .into_iter()
                .map(|(k, v)| (k, PropValue::Str(v)))
                .collect(),
        ),
        PropValue::List(items) => {
            let mut merged = StyleMap::new();
            for item in items {
                if let Some(style) = normalize_style(item) {
                    merged.extend(style);
                }
            }
            Some(merged)
        }
        _ => None,
    }
}

/// Parse `color: red; background: url(a;b)` into declarations.
///
/// Semicolons inside parentheses do not split.
pub fn parse_string_style(css: &str) -> IndexMap<String, String> {
    let mut out = IndexMap::new();
    for item in split_declarations(css) {
        if let Some((key, value)) = item.split_once(':') {
            let key = key.trim();
            if !key.is_empty() {
                out.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    out
}

fn split_declarations(css: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in css.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                parts.push(&css[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&css[start..]);
    parts
}

/// Serialize declarations as `key:value;` pairs with hyphenated keys.
///
/// Custom properties (`--name`) keep their spelling. Null values are skipped.
pub fn stringify_style(style: &StyleMap) -> String {
    let mut out = String::new();
    for (key, value) in style {
        if !matches!(value, PropValue::Str(_) | PropValue::Int(_) | PropValue::Float(_)) {
            continue;
        }
        if key.starts_with("--") {
            out.push_str(key);
        } else {
            out.push_str(&hyphenate(key));
        }
        out.push(':');
        out.push_str(&value.to_string());
        out.push(';');
    }
    out
}

/// `fontSize` → `font-size`.
pub fn hyphenate(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for ch in name.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vnode::props;

    #[test]
    fn test_normalize_class_variants() {
        let value = PropValue::List(vec![
            "a".into(),
            PropValue::Map(props([("b", true), ("c", false)])),
            PropValue::List(vec![" d ".into()]),
        ]);
        assert_eq!(normalize_class(&value), "a b d");
        assert_eq!(normalize_class(&PropValue::Null), "");
    }

    #[test]
    fn test_parse_string_style_respects_parens() {
        let parsed = parse_string_style("color: red; background: url(a;b) ;; width:1px");
        assert_eq!(parsed.get("color").map(String::as_str), Some("red"));
        assert_eq!(parsed.get("background").map(String::as_str), Some("url(a;b)"));
        assert_eq!(parsed.get("width").map(String::as_str), Some("1px"));
        assert_eq!(parsed.len(), 3);
    }

    #[test]
    fn test_normalize_style_merges_list() {
        let value = PropValue::List(vec![
            PropValue::Map(props([("color", "red"), ("fontSize", "12px")])),
            "color: blue".into(),
        ]);
        let style = normalize_style(&value).unwrap_or_default();
        assert_eq!(stringify_style(&style), "color:blue;font-size:12px;");
    }

    #[test]
    fn test_stringify_keeps_custom_properties() {
        let style: StyleMap = props([("--mainColor", PropValue::from("red")), ("gap", PropValue::Null)]);
        assert_eq!(stringify_style(&style), "--mainColor:red;");
    }
}
