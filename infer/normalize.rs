// ========================================================================================
//                              PROXY VALUE NORMALIZATION
// ========================================================================================
//
// Reference tables are keyed by canonical strings: bare upper-case letters for names
// and fixed-width, zero-padded digit strings for geography codes. Every free-text
// proxy value passes through here before a lookup. A value that cannot be brought
// into canonical form normalizes to `None` and will never resolve.

use crate::types::Resolution;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Generational suffixes that are dropped when they trail a name after whitespace.
const NAME_SUFFIXES: [&str; 5] = ["JR", "SR", "II", "III", "IV"];

/// Canonicalizes first names and surnames into table keys.
///
/// The value is trimmed, diacritics are folded away (`"Peña"` becomes `"PENA"`),
/// the result is upper-cased, a trailing generational suffix is removed, and every
/// remaining non-alphabetic character is dropped (`"o'brien jr."` becomes `"OBRIEN"`).
///
/// A letter with no ASCII base form (`"Đặng"`, `"李"`) makes the whole value
/// unresolvable rather than silently shortening it into a different key.
pub fn normalize_name(raw: &str) -> Option<String> {
    let folded: String = raw.trim().nfkd().filter(|c| !is_combining_mark(*c)).collect();
    let upper = folded.to_uppercase();
    let without_suffix = strip_suffix(&upper);
    let mut canonical = String::with_capacity(without_suffix.len());
    for c in without_suffix.chars() {
        if c.is_ascii_alphabetic() {
            canonical.push(c);
        } else if c.is_alphabetic() {
            return None;
        }
    }
    (!canonical.is_empty()).then_some(canonical)
}

fn strip_suffix(name: &str) -> &str {
    let Some((head, last)) = name.rsplit_once(char::is_whitespace) else {
        return name;
    };
    let token = last.trim_end_matches('.');
    let token = token.trim_end_matches(',');
    if NAME_SUFFIXES.contains(&token) && !head.trim().is_empty() {
        head.trim_end().trim_end_matches(',')
    } else {
        name
    }
}

/// Canonicalizes a geography code to the fixed width of `resolution`.
///
/// Codes are trimmed and left-padded with zeros. Codes containing anything other
/// than ASCII digits, or longer than the resolution width, return `None`.
pub fn normalize_geography(raw: &str, resolution: Resolution) -> Option<String> {
    let trimmed = raw.trim();
    let width = resolution.code_width();
    if trimmed.is_empty() || trimmed.len() > width || !trimmed.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    Some(format!("{trimmed:0>width$}"))
}

/// Normalizes a column of names.
pub fn normalize_names<S: AsRef<str>>(raw: &[S]) -> Vec<Option<String>> {
    raw.iter().map(|s| normalize_name(s.as_ref())).collect()
}

/// Normalizes a column of geography codes.
pub fn normalize_geographies<S: AsRef<str>>(
    raw: &[S],
    resolution: Resolution,
) -> Vec<Option<String>> {
    raw.iter()
        .map(|s| normalize_geography(s.as_ref(), resolution))
        .collect()
}
