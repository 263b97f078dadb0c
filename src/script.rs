// C5: cleans scavenged/structured script candidates, dedups by canonical
// form keeping the longest variant, and assigns deterministic names.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

const REQUIRED_KEYWORDS: [&str; 15] = [
    "function", "local", "end", "print", "--", "if", "then", "else", "for", "while", "script",
    "game", "workspace", "require", "module",
];

const STRONG_SIGNAL_KEYWORDS: [&str; 4] = ["function", "return", "local", "require"];

struct ScriptCandidate {
    original: String,
    cleaned: String,
}

pub struct NamedScript {
    pub name: String,
    pub body: String,
}

// Strips NULs, requires at least one Lua-ish keyword, strips per-line
// whitespace and drops empty lines, then rejects anything too short.
fn clean(text: &str) -> Option<String> {
    let stripped = text.replace('\0', "");
    if !REQUIRED_KEYWORDS.iter().any(|kw| stripped.contains(kw)) {
        return None;
    }

    let cleaned = stripped
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if cleaned.len() < 10 {
        return None;
    }
    if cleaned.len() < 120 && !STRONG_SIGNAL_KEYWORDS.iter().any(|kw| cleaned.contains(kw)) {
        return None;
    }
    Some(cleaned)
}

// Whitespace-collapsed form used only as the dedup hash key.
fn canonical_form(cleaned: &str) -> String {
    let mut out = String::with_capacity(cleaned.len());
    let mut last_was_space = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(ch);
            last_was_space = false;
        }
    }
    out.trim().to_string()
}

fn hash_canonical(canonical: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hasher.finalize().into()
}

fn extract_between(text: &str, open: &str, close: &str) -> Option<String> {
    let start = text.find(open)? + open.len();
    let rest = &text[start..];
    let end = rest.find(close)?;
    Some(rest[..end].to_string())
}

fn derive_name(original: &str) -> String {
    if let Some(name) = extract_between(original, "Name\">", "<") {
        if !name.is_empty() {
            return name;
        }
    }
    if let Some(name) = extract_between(original, "Script name=\"", "\"") {
        if !name.is_empty() {
            return name;
        }
    }
    "script".to_string()
}

struct Canonicalizer {
    entries: Vec<ScriptCandidate>,
    index_by_hash: HashMap<[u8; 32], usize>,
}

impl Canonicalizer {
    fn new() -> Self {
        Canonicalizer {
            entries: Vec::new(),
            index_by_hash: HashMap::new(),
        }
    }

    fn add(&mut self, original: &str) {
        let Some(cleaned) = clean(original) else {
            return;
        };
        let hash = hash_canonical(&canonical_form(&cleaned));
        match self.index_by_hash.get(&hash) {
            Some(&idx) if self.entries[idx].cleaned.len() >= cleaned.len() => {}
            Some(&idx) => {
                self.entries[idx] = ScriptCandidate {
                    original: original.to_string(),
                    cleaned,
                };
            }
            None => {
                let idx = self.entries.len();
                self.index_by_hash.insert(hash, idx);
                self.entries.push(ScriptCandidate {
                    original: original.to_string(),
                    cleaned,
                });
            }
        }
    }

    // Sorts by cleaned length descending, ties broken by insertion order.
    fn finish(self) -> Vec<ScriptCandidate> {
        let mut indexed: Vec<(usize, ScriptCandidate)> = self.entries.into_iter().enumerate().collect();
        indexed.sort_by(|a, b| b.1.cleaned.len().cmp(&a.1.cleaned.len()).then(a.0.cmp(&b.0)));
        indexed.into_iter().map(|(_, c)| c).collect()
    }
}

// Cleans, dedups, and names every candidate. Input order only matters for
// tie-breaking equal-length canonical collisions.
pub fn canonicalize(candidates: impl IntoIterator<Item = String>) -> Vec<NamedScript> {
    let mut canonicalizer = Canonicalizer::new();
    for candidate in candidates {
        canonicalizer.add(&candidate);
    }
    canonicalizer
        .finish()
        .into_iter()
        .enumerate()
        .map(|(index, candidate)| NamedScript {
            name: format!("{}_{}", derive_name(&candidate.original), index),
            body: candidate.cleaned,
        })
        .collect()
}
