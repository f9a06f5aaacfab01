// src/normalize/headers.rs
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::records::RawRow;

static CAMEL_BOUNDARY: OnceCell<Regex> = OnceCell::new();
static SEPARATORS: OnceCell<Regex> = OnceCell::new();

fn camel_boundary() -> &'static Regex {
    CAMEL_BOUNDARY
        .get_or_init(|| Regex::new(r"([a-z0-9])([A-Z])").expect("camel-case pattern should compile"))
}

fn separators() -> &'static Regex {
    SEPARATORS.get_or_init(|| Regex::new(r"[\s_\-]+").expect("separator pattern should compile"))
}

/// Canonical spelling of a header: camelCase split, `_`/`-`/whitespace runs
/// collapsed to one space, lower-cased.
pub fn canonical_header(name: &str) -> String {
    let split = camel_boundary().replace_all(name.trim(), "$1 $2");
    separators()
        .replace_all(&split, " ")
        .trim()
        .to_lowercase()
}

/// Finds the value of one logical field among a row's columns.
#[derive(Debug, Clone)]
pub struct HeaderResolver {
    aliases: Vec<String>,
    /// Canonical forms of `aliases`, present only with loose matching on.
    canonical: Option<Vec<String>>,
}

impl HeaderResolver {
    pub fn new(aliases: &[String], loose: bool) -> Self {
        let canonical = loose.then(|| {
            let mut seen: Vec<String> = Vec::with_capacity(aliases.len());
            for alias in aliases {
                let c = canonical_header(alias);
                if !seen.contains(&c) {
                    seen.push(c);
                }
            }
            seen
        });
        Self {
            aliases: aliases.to_vec(),
            canonical,
        }
    }

    /// First alias present with a non-empty value, exact spellings before
    /// canonical ones.
    pub fn resolve<'a>(&self, row: &'a RawRow) -> Option<&'a str> {
        let exact = self
            .aliases
            .iter()
            .filter_map(|alias| non_empty(row.get(alias)))
            .next();
        if exact.is_some() {
            return exact;
        }

        let canonical = self.canonical.as_ref()?;
        for want in canonical {
            // sorted so the pick does not depend on map iteration order
            let mut hits: Vec<(&String, &String)> = row
                .iter()
                .filter(|(k, v)| !v.trim().is_empty() && canonical_header(k) == *want)
                .collect();
            hits.sort_by(|a, b| a.0.cmp(b.0));
            if let Some(&(_, v)) = hits.first() {
                return Some(v.as_str());
            }
        }
        None
    }
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.trim().is_empty())
}
