//! `$text` matching.
//!
//! The `$search` string splits into double-quoted phrases and loose words.
//! Every phrase must appear as a substring of some string field; at least one
//! positive word must equal a token drawn from the document's string fields,
//! and no negated word (a `-` prefix) may. Query and document tokens are both
//! Porter-stemmed so inflected forms still meet; stemming lowercases, so
//! under `$caseSensitive` only already-lowercase tokens are stemmed.

use crate::common::document::Document;
use crate::common::Value;
use crate::errors::{DolomiteError, DolomiteResult, ErrorKind};

/// Evaluates a `$text` operand against a candidate document.
pub fn evaluate(doc: &Document, spec: &Document) -> DolomiteResult<bool> {
    let search = spec
        .get("$search")
        .and_then(Value::as_string)
        .ok_or_else(|| {
            DolomiteError::new("$text requires a string $search", ErrorKind::Client)
        })?;
    let case_sensitive = spec
        .get("$caseSensitive")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let query = Query::parse(search, case_sensitive);
    let strings = collect_strings(doc, case_sensitive);

    for phrase in &query.phrases {
        if !strings.iter().any(|s| s.contains(phrase.as_str())) {
            return Ok(false);
        }
    }

    if query.words.is_empty() && query.negated.is_empty() {
        return Ok(!query.phrases.is_empty());
    }

    let mut document_tokens: Vec<String> = Vec::new();
    for string in &strings {
        for token in tokenize(string) {
            push_token_forms(token, case_sensitive, &mut document_tokens);
        }
    }

    for negated in &query.negated {
        if document_tokens.iter().any(|t| t == negated) {
            return Ok(false);
        }
    }
    if query.words.is_empty() {
        return Ok(true);
    }
    Ok(query
        .words
        .iter()
        .any(|word| document_tokens.iter().any(|t| t == word)))
}

struct Query {
    phrases: Vec<String>,
    words: Vec<String>,
    negated: Vec<String>,
}

impl Query {
    fn parse(search: &str, case_sensitive: bool) -> Query {
        let search = if case_sensitive {
            search.to_string()
        } else {
            search.to_lowercase()
        };

        let mut phrases = Vec::new();
        let mut remainder = String::new();
        let mut in_phrase = false;
        let mut current = String::new();
        for c in search.chars() {
            if c == '"' {
                if in_phrase {
                    phrases.push(std::mem::take(&mut current));
                } else {
                    remainder.push(' ');
                }
                in_phrase = !in_phrase;
            } else if in_phrase {
                current.push(c);
            } else {
                remainder.push(c);
            }
        }
        // An unterminated phrase is dropped.

        let mut words = Vec::new();
        let mut negated = Vec::new();
        for raw in remainder.split_whitespace() {
            let (target, negate) = match raw.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (raw, false),
            };
            for token in tokenize(target) {
                let out = if negate { &mut negated } else { &mut words };
                push_token_forms(token, case_sensitive, out);
            }
        }
        Query {
            phrases,
            words,
            negated,
        }
    }
}

/// Gathers every string reachable in the document, descending through nested
/// documents and arrays. Binary data is not text-searchable.
fn collect_strings(doc: &Document, case_sensitive: bool) -> Vec<String> {
    let mut strings = Vec::new();
    for value in doc.values() {
        collect_from_value(value, case_sensitive, &mut strings);
    }
    strings
}

fn collect_from_value(value: &Value, case_sensitive: bool, out: &mut Vec<String>) {
    match value {
        Value::String(s) | Value::Symbol(s) => {
            if case_sensitive {
                out.push(s.clone());
            } else {
                out.push(s.to_lowercase());
            }
        }
        Value::Document(doc) => {
            for nested in doc.values() {
                collect_from_value(nested, case_sensitive, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_from_value(item, case_sensitive, out);
            }
        }
        _ => {}
    }
}

/// Records the raw token and, when sound, its stemmed form. Stemming
/// lowercases its input, so under case sensitivity only already-lowercase
/// tokens may contribute a stem.
fn push_token_forms(token: String, case_sensitive: bool, out: &mut Vec<String>) {
    if !case_sensitive || !token.chars().any(char::is_uppercase) {
        out.push(stem(&token));
    }
    out.push(token);
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Porter stemming, the classic five-step suffix stripper. Operates on
/// lowercase ASCII words; anything else passes through unchanged.
pub fn stem(word: &str) -> String {
    let word = word.to_lowercase();
    if word.len() <= 2 || !word.bytes().all(|b| b.is_ascii_lowercase()) {
        return word;
    }
    let mut w: Vec<u8> = word.into_bytes();
    step_1a(&mut w);
    step_1b(&mut w);
    step_1c(&mut w);
    step_2(&mut w);
    step_3(&mut w);
    step_4(&mut w);
    step_5(&mut w);
    String::from_utf8(w).unwrap_or_default()
}

fn is_consonant(w: &[u8], i: usize) -> bool {
    match w[i] {
        b'a' | b'e' | b'i' | b'o' | b'u' => false,
        b'y' => i == 0 || !is_consonant(w, i - 1),
        _ => true,
    }
}

/// The measure m: the number of vowel-consonant sequences in w[..len].
fn measure(w: &[u8], len: usize) -> usize {
    let mut m = 0;
    let mut i = 0;
    while i < len && is_consonant(w, i) {
        i += 1;
    }
    loop {
        if i >= len {
            return m;
        }
        while i < len && !is_consonant(w, i) {
            i += 1;
        }
        if i >= len {
            return m;
        }
        m += 1;
        while i < len && is_consonant(w, i) {
            i += 1;
        }
    }
}

fn has_vowel(w: &[u8], len: usize) -> bool {
    (0..len).any(|i| !is_consonant(w, i))
}

fn ends_double_consonant(w: &[u8]) -> bool {
    let n = w.len();
    n >= 2 && w[n - 1] == w[n - 2] && is_consonant(w, n - 1)
}

/// consonant-vowel-consonant ending, where the final consonant is not w, x
/// or y.
fn ends_cvc(w: &[u8], len: usize) -> bool {
    if len < 3 {
        return false;
    }
    let c = w[len - 1];
    is_consonant(w, len - 1)
        && !is_consonant(w, len - 2)
        && is_consonant(w, len - 3)
        && c != b'w'
        && c != b'x'
        && c != b'y'
}

fn ends_with(w: &[u8], suffix: &str) -> bool {
    w.len() >= suffix.len() && &w[w.len() - suffix.len()..] == suffix.as_bytes()
}

fn replace_suffix(w: &mut Vec<u8>, suffix: &str, replacement: &str) {
    let stem_len = w.len() - suffix.len();
    w.truncate(stem_len);
    w.extend_from_slice(replacement.as_bytes());
}

fn try_rule(w: &mut Vec<u8>, suffix: &str, replacement: &str, min_measure: usize) -> bool {
    if !ends_with(w, suffix) {
        return false;
    }
    let stem_len = w.len() - suffix.len();
    if measure(w, stem_len) > min_measure {
        replace_suffix(w, suffix, replacement);
    }
    true
}

fn step_1a(w: &mut Vec<u8>) {
    if ends_with(w, "sses") {
        replace_suffix(w, "sses", "ss");
    } else if ends_with(w, "ies") {
        replace_suffix(w, "ies", "i");
    } else if !ends_with(w, "ss") && ends_with(w, "s") {
        w.truncate(w.len() - 1);
    }
}

fn step_1b(w: &mut Vec<u8>) {
    if ends_with(w, "eed") {
        if measure(w, w.len() - 3) > 0 {
            w.truncate(w.len() - 1);
        }
        return;
    }
    let stripped = if ends_with(w, "ed") && has_vowel(w, w.len() - 2) {
        w.truncate(w.len() - 2);
        true
    } else if ends_with(w, "ing") && has_vowel(w, w.len() - 3) {
        w.truncate(w.len() - 3);
        true
    } else {
        false
    };
    if !stripped {
        return;
    }
    if ends_with(w, "at") || ends_with(w, "bl") || ends_with(w, "iz") {
        w.push(b'e');
    } else if ends_double_consonant(w) {
        let last = w[w.len() - 1];
        if last != b'l' && last != b's' && last != b'z' {
            w.truncate(w.len() - 1);
        }
    } else if measure(w, w.len()) == 1 && ends_cvc(w, w.len()) {
        w.push(b'e');
    }
}

fn step_1c(w: &mut Vec<u8>) {
    if ends_with(w, "y") && has_vowel(w, w.len() - 1) {
        let n = w.len();
        w[n - 1] = b'i';
    }
}

fn step_2(w: &mut Vec<u8>) {
    const RULES: [(&str, &str); 20] = [
        ("ational", "ate"),
        ("tional", "tion"),
        ("enci", "ence"),
        ("anci", "ance"),
        ("izer", "ize"),
        ("abli", "able"),
        ("alli", "al"),
        ("entli", "ent"),
        ("eli", "e"),
        ("ousli", "ous"),
        ("ization", "ize"),
        ("ation", "ate"),
        ("ator", "ate"),
        ("alism", "al"),
        ("iveness", "ive"),
        ("fulness", "ful"),
        ("ousness", "ous"),
        ("aliti", "al"),
        ("iviti", "ive"),
        ("biliti", "ble"),
    ];
    for (suffix, replacement) in RULES {
        if try_rule(w, suffix, replacement, 0) {
            return;
        }
    }
}

fn step_3(w: &mut Vec<u8>) {
    const RULES: [(&str, &str); 7] = [
        ("icate", "ic"),
        ("ative", ""),
        ("alize", "al"),
        ("iciti", "ic"),
        ("ical", "ic"),
        ("ful", ""),
        ("ness", ""),
    ];
    for (suffix, replacement) in RULES {
        if try_rule(w, suffix, replacement, 0) {
            return;
        }
    }
}

fn step_4(w: &mut Vec<u8>) {
    const SUFFIXES: [&str; 18] = [
        "al", "ance", "ence", "er", "ic", "able", "ible", "ant", "ement", "ment", "ent", "ou",
        "ism", "ate", "iti", "ous", "ive", "ize",
    ];
    for suffix in SUFFIXES {
        if ends_with(w, suffix) {
            let stem_len = w.len() - suffix.len();
            if measure(w, stem_len) > 1 {
                w.truncate(stem_len);
            }
            return;
        }
    }
    // -ion only after s or t
    if ends_with(w, "ion") {
        let stem_len = w.len() - 3;
        if stem_len > 0
            && (w[stem_len - 1] == b's' || w[stem_len - 1] == b't')
            && measure(w, stem_len) > 1
        {
            w.truncate(stem_len);
        }
    }
}

fn step_5(w: &mut Vec<u8>) {
    if ends_with(w, "e") {
        let stem_len = w.len() - 1;
        let m = measure(w, stem_len);
        if m > 1 || (m == 1 && !ends_cvc(w, stem_len)) {
            w.truncate(stem_len);
        }
    }
    if ends_double_consonant(w) && w[w.len() - 1] == b'l' && measure(w, w.len()) > 1 {
        w.truncate(w.len() - 1);
    }
}
