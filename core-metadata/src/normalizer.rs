//! Title cleanup and search-variant generation.
//!
//! Collection titles carry release annotations (`Halo 2 [Platinum Hits]`,
//! `Ico (PAL)`) and numbering styles that external catalogs spell
//! differently. [`normalize`] produces the canonical title; [`variants`] and
//! [`scrape_variants`] expand it into the ordered list of strings the
//! orchestrator tries against each source.

use deunicode::deunicode;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Zero-padded numeral followed by a colon or whitespace ("007: ...", "02 ...").
static RE_LEADING_ZEROS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b0+(\d+)([:\s])").expect("Invalid regex"));

/// Anything that is not a latin letter or digit.
static RE_NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("Invalid regex"));

/// Words dropped from the slug-style scrape variant.
const STOPWORDS: &[&str] = &["the", "a", "an", "of", "and", "or"];

/// Variants of this length or shorter are never searched for.
const MIN_VARIANT_CHARS: usize = 3;

/// Strip bracketed annotations, collapse whitespace and trim.
///
/// Only matched `[...]` / `(...)` pairs are removed; a stray bracket stays.
/// Trailing `-`, `:`, `,` and `/` are trimmed too, so a separator that
/// introduced a removed annotation (`Halo 2 - [Beta]`) does not survive.
/// Applying `normalize` to its own output returns the same string.
pub fn normalize(raw: &str) -> String {
    let stripped = strip_annotations(raw);
    collapse_whitespace(&stripped)
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | ',' | '/'))
        .to_string()
}

/// Ordered, de-duplicated search variants for a structured catalog.
///
/// The canonical title always comes first. Derived strings follow:
/// colon removed, colon replaced by a space, zero-padded numerals unpadded,
/// and for subtitled titles the subtitle alone and both halves rejoined.
pub fn variants(raw: &str) -> Vec<String> {
    let canonical = normalize(raw);
    let mut out = VariantList::new(&canonical);

    let colon_removed = collapse_whitespace(&canonical.replace(':', ""));
    let colon_spaced = collapse_whitespace(&canonical.replace(':', " "));
    out.push(&colon_removed);
    out.push(&colon_spaced);

    out.push(&unpad_numerals(&canonical));
    out.push(&unpad_numerals(&colon_spaced));

    if let Some((head, tail)) = canonical.split_once(':') {
        out.push(tail);
        out.push(&format!("{} {}", head.trim(), tail.trim()));
    }

    out.into_vec()
}

/// Variants for HTML search pages, which tolerate looser input.
///
/// Extends [`variants`] with a lowercase alphanumeric form, the same form
/// without stopwords, and as a last resort the final two words and the final
/// word on their own.
pub fn scrape_variants(raw: &str) -> Vec<String> {
    let base = variants(raw);
    let canonical = match base.first() {
        Some(c) => c.clone(),
        None => return base,
    };

    let mut out = VariantList::from_existing(base);

    let simple = search_form(&canonical);
    out.push(&simple);

    let words: Vec<&str> = simple.split(' ').filter(|w| !w.is_empty()).collect();
    let without_stopwords: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !STOPWORDS.contains(w))
        .collect();
    if !without_stopwords.is_empty() {
        out.push(&without_stopwords.join(" "));
    }

    if words.len() >= 3 {
        out.push(&words[words.len() - 2..].join(" "));
    }
    if words.len() >= 2 {
        out.push(words[words.len() - 1]);
    }

    out.into_vec()
}

/// Lowercase ASCII form with every run of punctuation turned into one space.
pub fn search_form(title: &str) -> String {
    let lowered = deunicode(title).to_lowercase();
    RE_NON_ALNUM.replace_all(&lowered, " ").trim().to_string()
}

/// URL slug: lowercase ASCII words joined by `-`.
pub fn slugify(title: &str) -> String {
    search_form(title).replace(' ', "-")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unpad_numerals(s: &str) -> String {
    RE_LEADING_ZEROS.replace_all(s, "$1$2").to_string()
}

/// Remove every matched bracket or parenthesis pair together with its content.
fn strip_annotations(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut removed = vec![false; chars.len()];
    let mut open: Vec<(char, usize)> = Vec::new();

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '[' | '(' => open.push((c, i)),
            ']' | ')' => {
                let opener = if c == ']' { '[' } else { '(' };
                if let Some(pos) = open.iter().rposition(|(o, _)| *o == opener) {
                    let start = open[pos].1;
                    open.truncate(pos);
                    removed[start..=i].iter_mut().for_each(|r| *r = true);
                }
            }
            _ => {}
        }
    }

    chars
        .iter()
        .zip(removed)
        .map(|(&c, gone)| if gone { ' ' } else { c })
        .collect()
}

/// Keeps insertion order and drops repeats and too-short entries.
struct VariantList {
    items: Vec<String>,
    seen: HashSet<String>,
}

impl VariantList {
    fn new(canonical: &str) -> Self {
        let mut list = Self {
            items: Vec::new(),
            seen: HashSet::new(),
        };
        // A very short canonical title ("Ys") is still a real title.
        if !canonical.is_empty() {
            list.seen.insert(canonical.to_lowercase());
            list.items.push(canonical.to_string());
        }
        list
    }

    fn from_existing(items: Vec<String>) -> Self {
        let seen = items.iter().map(|s| s.to_lowercase()).collect();
        Self { items, seen }
    }

    fn push(&mut self, candidate: &str) {
        let candidate = collapse_whitespace(candidate);
        if candidate.chars().count() < MIN_VARIANT_CHARS {
            return;
        }
        if self.seen.insert(candidate.to_lowercase()) {
            self.items.push(candidate);
        }
    }

    fn into_vec(self) -> Vec<String> {
        self.items
    }
}
