//! Anchor-identity normalization.
//!
//! Some implementations label anchors with order-assigned integers (`&1`,
//! `&2`, …) instead of the names used in the document. To compare anchor
//! identity rather than spelling, named anchors are numbered in order of
//! first definition and every anchor/alias token for that name is rewritten.
//!
//! Only the property section of an event line is considered: tokens after
//! the event kind and before the scalar value. Scalar text that happens to
//! contain `&` or `*` is never touched.

use std::collections::HashMap;

/// Renumber named anchors in first-definition order.
#[must_use]
pub fn renumber(text: &str) -> String {
    let numbering = assign_numbers(text);
    if numbering.is_empty() {
        return text.to_string();
    }

    text.split('\n')
        .map(|line| rewrite_line(line, &numbering))
        .collect::<Vec<_>>()
        .join("\n")
}

fn assign_numbers(text: &str) -> HashMap<&str, usize> {
    let mut numbering = HashMap::new();
    for line in text.split('\n') {
        for token in property_tokens(line) {
            if let Some(name) = token.strip_prefix('&')
                && name.starts_with(|c: char| c.is_ascii_alphabetic())
                && !numbering.contains_key(name)
            {
                let next = numbering.len() + 1;
                numbering.insert(name, next);
            }
        }
    }
    numbering
}

/// Tokens between the event kind and the first value token.
fn property_tokens(line: &str) -> impl Iterator<Item = &str> {
    line.split(' ')
        .skip(1)
        .take_while(|token| !token.starts_with([':', '\'', '"', '|', '>']))
}

fn rewrite_line(line: &str, numbering: &HashMap<&str, usize>) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_properties = true;
    for (index, token) in line.split(' ').enumerate() {
        if index > 0 {
            out.push(' ');
        }
        if index > 0 && token.starts_with([':', '\'', '"', '|', '>']) {
            in_properties = false;
        }
        if index > 0 && in_properties {
            let mut chars = token.chars();
            if let Some(sigil @ ('&' | '*')) = chars.next()
                && let Some(number) = numbering.get(chars.as_str())
            {
                out.push(sigil);
                out.push_str(&number.to_string());
                continue;
            }
        }
        out.push_str(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_follow_first_definition_order() {
        let text = "+MAP &top\n=VAL &first :a\n=ALI *first\n=VAL &second :b\n=ALI *top";
        assert_eq!(
            renumber(text),
            "+MAP &1\n=VAL &2 :a\n=ALI *2\n=VAL &3 :b\n=ALI *1"
        );
    }

    #[test]
    fn prefix_names_are_not_confused() {
        let text = "=VAL &a :x\n=VAL &ab :y\n=ALI *ab\n=ALI *a";
        assert_eq!(renumber(text), "=VAL &1 :x\n=VAL &2 :y\n=ALI *2\n=ALI *1");
    }

    #[test]
    fn scalar_text_is_untouched() {
        let text = "=VAL &a :see &a and *a";
        assert_eq!(renumber(text), "=VAL &1 :see &a and *a");
    }

    #[test]
    fn redefinition_keeps_first_number() {
        let text = "=VAL &a :x\n=VAL &a :y\n=ALI *a";
        assert_eq!(renumber(text), "=VAL &1 :x\n=VAL &1 :y\n=ALI *1");
    }

    #[test]
    fn alias_before_definition_maps_to_later_anchor() {
        let text = "=ALI *a\n=VAL &a :x";
        assert_eq!(renumber(text), "=ALI *1\n=VAL &1 :x");
    }

    #[test]
    fn numeric_anchors_are_not_renumbered() {
        let text = "=VAL &1 :x\n=ALI *1";
        assert_eq!(renumber(text), text);
    }

    #[test]
    fn text_without_anchors_is_unchanged() {
        let text = "+STR\n+DOC\n=VAL :foo\n-DOC\n-STR";
        assert_eq!(renumber(text), text);
    }
}
