//! Identifier case conversion.
//!
//! J5 names are `UpperCamel` (schemas) and `lowerCamel` (properties); proto
//! fields are `snake_case` and enum values `UPPER_SNAKE`.

/// `fooBarID` → `foo_bar_id`, `FooBar` → `foo_bar`.
pub fn to_snake(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                None => false,
                Some(p) if p == '_' => false,
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                Some(_) => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn to_upper_snake(name: &str) -> String {
    to_snake(name).to_ascii_uppercase()
}

/// `foo_bar` → `FooBar`. Existing capitals are kept.
pub fn to_upper_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `FooBar` → `fooBar`.
pub fn to_lower_camel(name: &str) -> String {
    let camel = to_upper_camel(name);
    let mut chars = camel.chars();
    match chars.next() {
        Some(first) => first.to_ascii_lowercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn snake_handles_acronyms() {
        assert_eq!(to_snake("fooId"), "foo_id");
        assert_eq!(to_snake("FooBar"), "foo_bar");
        assert_eq!(to_snake("HTTPServer"), "http_server");
        assert_eq!(to_snake("fooID"), "foo_id");
        assert_eq!(to_snake("already_snake"), "already_snake");
        assert_eq!(to_snake("v2Thing"), "v2_thing");
    }

    #[test]
    fn upper_snake_for_enum_prefixes() {
        assert_eq!(to_upper_snake("FooStatus"), "FOO_STATUS");
    }

    #[test]
    fn camel_conversions() {
        assert_eq!(to_upper_camel("foo_bar"), "FooBar");
        assert_eq!(to_upper_camel("fooBar"), "FooBar");
        assert_eq!(to_lower_camel("FooBar"), "fooBar");
        assert_eq!(to_lower_camel(""), "");
    }

    proptest! {
        #[test]
        fn snake_survives_a_camel_round_trip(words in prop::collection::vec("[a-z][a-z0-9]{1,5}", 1..5)) {
            let snake = words.join("_");
            prop_assert_eq!(to_snake(&to_lower_camel(&snake)), snake.clone());
            prop_assert_eq!(to_snake(&to_upper_camel(&snake)), snake);
        }
    }
}
