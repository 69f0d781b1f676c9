use std::collections::HashMap;

/// Replaces every key of `replacements` appearing in `text` with its value.
///
/// Longer keys are matched first, so a UUID never loses part of itself to a
/// shorter identifier that happens to be its prefix. Replaced spans are not
/// rescanned.
pub fn multireplace(text: &str, replacements: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = replacements.keys().collect();
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut output = String::with_capacity(text.len());
    let mut remaining = text;

    'outer: while !remaining.is_empty() {
        for key in &keys {
            if remaining.starts_with(key.as_str()) {
                output.push_str(&replacements[*key]);
                remaining = &remaining[key.len()..];
                continue 'outer;
            }
        }

        let mut chars = remaining.chars();
        if let Some(c) = chars.next() {
            output.push(c);
        }
        remaining = chars.as_str();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn longest_key_wins() {
        let replacements = map(&[("ab", "AB"), ("abc", "ABC")]);
        assert_eq!(multireplace("hey abc", &replacements), "hey ABC");
    }

    #[test]
    fn replaced_text_is_not_rescanned() {
        let replacements = map(&[("old", "older")]);
        assert_eq!(multireplace("old old", &replacements), "older older");
    }

    #[test]
    fn uuids_swap_in_place() {
        let replacements = map(&[(
            "f5fa1db1-366f-4a04-b1c6-3935e8717a6b",
            "9e47a743-69d0-4f18-9a2c-4b57ba55cd6f",
        )]);
        let line = "search --fs-uuid f5fa1db1-366f-4a04-b1c6-3935e8717a6b --set=root";
        assert_eq!(
            multireplace(line, &replacements),
            "search --fs-uuid 9e47a743-69d0-4f18-9a2c-4b57ba55cd6f --set=root"
        );
    }
}
