//! Schema-name handling: generic-instantiation strings and table-name validity.

/// A generic instantiation written as a string, `Wrapper<Inner, Map<K, V>>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericName {
    pub base: String,
    pub args: Vec<String>,
}

/// Splits `Base<A, B<C>>` at its outermost angle brackets, then splits the arguments on
/// commas that are not nested inside `<>`, `()`, `[]` or `{}`.
///
/// Returns `None` for plain names and for strings whose brackets do not balance.
pub fn parse_type_name(name: &str) -> Option<GenericName> {
    let name = name.trim();
    let open = name.find('<')?;
    if !name.ends_with('>') {
        return None;
    }
    let base = name[..open].trim();
    if base.is_empty() {
        return None;
    }
    let inner = &name[open + 1..name.len() - 1];

    let mut args = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' | '(' | '[' | '{' => depth += 1,
            '>' | ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            ',' if depth == 0 => {
                args.push(inner[start..i].trim().to_string());
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    let last = inner[start..].trim();
    if !last.is_empty() {
        args.push(last.to_string());
    }
    if args.is_empty() || args.iter().any(|a| a.is_empty()) {
        return None;
    }

    Some(GenericName {
        base: base.to_string(),
        args,
    })
}

/// Whether `name` may appear as a key of the named-schema table
pub fn is_valid_schema_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Generic placeholders: a single uppercase letter, or `T` followed by an uppercase-led name
pub fn is_generic_placeholder(name: &str) -> bool {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(first), None) => first.is_ascii_uppercase(),
        (Some('T'), Some(second)) => second.is_ascii_uppercase(),
        _ => false,
    }
}
