//! URL slugs for news articles.
//!
//! Cyrillic titles are transliterated to Latin before normalization, so
//! "Открытие нового маршрута!" becomes `otkrytie-novogo-marshruta`.

/// Lowercase Cyrillic letters and their Latin spelling.
const TRANSLIT: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "yo"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "i"),
    ('й', "y"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "yu"),
    ('я', "ya"),
];

fn transliterate(c: char) -> Option<&'static str> {
    TRANSLIT
        .iter()
        .find(|(cyr, _)| *cyr == c)
        .map(|(_, latin)| *latin)
}

/// Derive a URL-safe slug from an article title.
///
/// The result contains only `[a-z0-9-]`, never starts or ends with a hyphen
/// and never contains two hyphens in a row. Applying it twice gives the same
/// result as applying it once. Distinct titles may map to the same slug.
pub fn generate_slug(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut latin = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        match transliterate(c) {
            Some(replacement) => latin.push_str(replacement),
            None => latin.push(c),
        }
    }

    // Keep [a-z0-9], whitespace and hyphens; whitespace runs and hyphen
    // runs both become a single hyphen.
    let mut slug = String::with_capacity(latin.len());
    let mut pending_hyphen = false;
    for c in latin.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    slug
}

/// True when `slug` is already in normalized form.
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
