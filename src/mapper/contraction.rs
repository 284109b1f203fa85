//! Resolution of broken-up contractions
//!
//! N-gram corpora frequently split contractions over several tokens
//! (`"don 't"`, `"don ' t"`, `"don t"`) or drop the apostrophe entirely
//! (`"dont"`). Given a list of contraction templates in a tiny regex dialect
//! (literals, parenthesized `|`-alternation, a literal `'` marking the
//! apostrophe), this mapper rewrites every recognized spelling back to the
//! canonical one, and removes phrases where an n-gram boundary cut a
//! contraction in half (`"won '"`, `"' t open"`).
//!
//! Templates are enumerated into all the literal words they can produce once
//! at construction. The original formulation compiled the enumeration into
//! case-insensitive regexes whose boundary assertions (`(?<= |\A)`,
//! `(?= |\z)`) are lookarounds; those assertions are exactly token boundaries
//! in a single-space-separated phrase, so the hot path here walks the token
//! list with explicit window lookups instead, which needs no lookaround
//! support and keeps the per-phrase cost at `O(words)` hash lookups.

use super::{Mapped, PhraseMapper};
use crate::Frequency;
use anyhow::{ensure, Context};
use rustc_hash::{FxHashMap, FxHashSet};
use unicase::UniCase;

/// Mapper normalizing known contractions to their canonical spelling
#[derive(Debug)]
pub struct ContractionMapper {
    /// Canonical spellings of every known contraction, e.g. `don't`
    contractions: FxHashSet<UniCase<String>>,

    /// Apostrophe-less spelling -> byte index where the apostrophe belongs
    ///
    /// Only filled from `n't` templates: restoring `dont` is safe, while
    /// restoring `well` or `id` would mangle ordinary words.
    missing_apostrophe: FxHashMap<UniCase<String>, usize>,

    /// Words that may precede a dangling apostrophe at the end of a phrase
    prefixes: FxHashSet<UniCase<String>>,

    /// Words that may follow a dangling apostrophe at the start of a phrase
    suffixes: FxHashSet<UniCase<String>>,
}
//
impl ContractionMapper {
    /// Compile a list of contraction templates
    ///
    /// Each template contains exactly one `'` and may use parenthesized
    /// alternation, e.g. `(he|she|it)'s`.
    pub fn new<I>(templates: I) -> crate::Result<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut contractions = FxHashSet::default();
        let mut missing_apostrophe = FxHashMap::default();
        let mut prefixes = FxHashSet::default();
        let mut suffixes = FxHashSet::default();

        for template in templates {
            let template = template.as_ref().trim();
            if template.is_empty() {
                continue;
            }
            let apostrophe = template
                .find('\'')
                .with_context(|| format!("contraction template {template:?} has no apostrophe"))?;

            for word in enumerate_template(template)? {
                // Apostrophe-less n't spellings are unambiguous enough to fix
                if word.ends_with("n't") {
                    let index = word.find('\'').expect("enumerated from the apostrophe");
                    missing_apostrophe.insert(UniCase::new(word.replace('\'', "")), index);
                }
                contractions.insert(UniCase::new(word));
            }
            for prefix in enumerate_template(&template[..apostrophe])? {
                if !prefix.is_empty() {
                    prefixes.insert(UniCase::new(prefix));
                }
            }
            for suffix in enumerate_template(&template[apostrophe + 1..])? {
                if !suffix.is_empty() {
                    suffixes.insert(UniCase::new(suffix));
                }
            }
        }

        Ok(Self {
            contractions,
            missing_apostrophe,
            prefixes,
            suffixes,
        })
    }

    /// Truth that an n-gram boundary cut a contraction in half here
    fn is_incomplete(&self, words: &[&str]) -> bool {
        // A recognized prefix followed by a dangling apostrophe at the end
        if let Some((&last, rest)) = words.split_last() {
            if last == "'" {
                if let Some(&previous) = rest.last() {
                    if self.prefixes.contains(&UniCase::new(previous.to_owned())) {
                        return true;
                    }
                }
            } else if let Some(stem) = last.strip_suffix('\'') {
                if !stem.is_empty() && self.prefixes.contains(&UniCase::new(stem.to_owned())) {
                    return true;
                }
            }
        }
        // A dangling apostrophe followed by a recognized suffix at the start
        if let Some((&first, rest)) = words.split_first() {
            if first == "'" {
                if let Some(&next) = rest.first() {
                    if self.suffixes.contains(&UniCase::new(next.to_owned())) {
                        return true;
                    }
                }
            } else if let Some(stem) = first.strip_prefix('\'') {
                if !stem.is_empty() && self.suffixes.contains(&UniCase::new(stem.to_owned())) {
                    return true;
                }
            }
        }
        false
    }

    /// Truth that joining `a` and `b` yields a known contraction
    ///
    /// Returns the joined spelling, built from the original tokens so their
    /// casing survives.
    fn try_join(&self, a: &str, b: &str) -> Option<String> {
        let has_apostrophe = a.ends_with('\'') || b.starts_with('\'');
        let candidate = if has_apostrophe {
            UniCase::new(format!("{a}{b}"))
        } else {
            UniCase::new(format!("{a}'{b}"))
        };
        self.contractions
            .contains(&candidate)
            .then(|| candidate.into_inner())
    }

    /// Rewrite the token stream, resolving every recognized spelling
    fn rewrite(&self, words: &[&str]) -> Vec<String> {
        let mut out = Vec::with_capacity(words.len());
        let mut i = 0;
        while i < words.len() {
            let word = words[i];

            // Three-token spellings: "don ' t", "Tom ' s"
            if i + 2 < words.len() && words[i + 1] == "'" {
                let (a, b) = (word, words[i + 2]);
                let candidate = UniCase::new(format!("{a}'{b}"));
                if self.contractions.contains(&candidate)
                    || (ends_in_n(a) && b.eq_ignore_ascii_case("t"))
                    || b.eq_ignore_ascii_case("s")
                {
                    out.push(candidate.into_inner());
                    i += 3;
                    continue;
                }
            }

            // Two-token spellings: "don 't", "don' t", "don t", "boy 's"
            if i + 1 < words.len() {
                let (a, b) = (word, words[i + 1]);
                if let Some(joined) = self.try_join(a, b) {
                    out.push(joined);
                    i += 2;
                    continue;
                }
                let generic_nt = (b.eq_ignore_ascii_case("'t") && ends_in_n(a))
                    || (b.eq_ignore_ascii_case("t")
                        && a.len() > 1
                        && a.ends_with('\'')
                        && ends_in_n(&a[..a.len() - 1]));
                let generic_s = b.eq_ignore_ascii_case("'s")
                    || (b.eq_ignore_ascii_case("s") && a.ends_with('\''));
                if generic_nt || generic_s {
                    out.push(format!("{a}{b}"));
                    i += 2;
                    continue;
                }
            }

            // One-token apostrophe-less spellings: "dont"
            if let Some(&index) = self
                .missing_apostrophe
                .get(&UniCase::new(word.to_owned()))
            {
                if word.is_char_boundary(index) {
                    out.push(format!("{}'{}", &word[..index], &word[index..]));
                    i += 1;
                    continue;
                }
            }

            out.push(word.to_owned());
            i += 1;
        }
        out
    }

    /// Join a trailing possessive: `Charls '` becomes `Charls'`
    fn join_possessive(words: &mut Vec<String>) {
        let mut i = 1;
        while i < words.len() {
            if words[i] == "'" && words[i - 1].ends_with(['s', 'S']) {
                let apostrophe = words.remove(i);
                words[i - 1].push_str(&apostrophe);
            } else {
                i += 1;
            }
        }
    }
}
//
impl PhraseMapper for ContractionMapper {
    fn name(&self) -> &str {
        "contractions"
    }

    fn map<'p>(&self, phrase: &'p str, _frequency: Frequency) -> Mapped<'p> {
        let words = phrase.split(' ').collect::<Vec<_>>();

        // Phrases with incomplete contractions cannot be repaired
        if self.is_incomplete(&words) {
            return Mapped::Removed;
        }

        let mut rewritten = self.rewrite(&words);
        Self::join_possessive(&mut rewritten);

        let result = rewritten.join(" ");
        if result == phrase {
            Mapped::unchanged(phrase)
        } else {
            Mapped::rewritten(result)
        }
    }
}

/// Truth that a word ends with the letter `n`
fn ends_in_n(word: &str) -> bool {
    word.ends_with(['n', 'N'])
}

/// All literal words a contraction template can produce
fn enumerate_template(template: &str) -> crate::Result<Vec<String>> {
    let chars = template.chars().collect::<Vec<_>>();
    let mut alternatives = Vec::new();
    let (consumed, closed) = parse_alternation(&chars, 0, &mut alternatives)
        .with_context(|| format!("parsing contraction template {template:?}"))?;
    ensure!(
        !closed && consumed == chars.len(),
        "unbalanced parentheses in contraction template {template:?}"
    );
    let mut words = Vec::new();
    for alternative in &alternatives {
        let mut builders = vec![String::new()];
        expand_concatenation(&mut builders, alternative);
        words.append(&mut builders);
    }
    Ok(words)
}

/// One parsed element of a template: a literal run or an alternation group
#[derive(Debug)]
enum Element {
    Literal(String),
    Alternation(Vec<Concatenation>),
}

/// A sequence of elements that are matched one after the other
#[derive(Debug)]
struct Concatenation(Vec<Element>);

/// Recursive-descent parse of a `|`-separated alternation
///
/// Parsing starts at `start` and stops at a closing parenthesis or the end of
/// the template. Returns the number of consumed characters and whether the
/// stop was a closing parenthesis, which lets callers distinguish a finished
/// group from input that simply ran out.
fn parse_alternation(
    chars: &[char],
    start: usize,
    out: &mut Vec<Concatenation>,
) -> crate::Result<(usize, bool)> {
    let mut index = start;
    let mut closed = false;
    let mut concat: Vec<Element> = Vec::new();
    while index < chars.len() {
        let c = chars[index];
        index += 1;
        if c == ')' {
            closed = true;
            break;
        }
        match c {
            '(' => {
                let mut alternatives = Vec::new();
                let (consumed, inner_closed) = parse_alternation(chars, index, &mut alternatives)?;
                index += consumed;
                ensure!(inner_closed, "alternation group is missing its ')'");
                if alternatives.len() == 1 {
                    // A group without | is just its contents
                    concat.extend(
                        alternatives
                            .pop()
                            .expect("just checked there is one alternative")
                            .0,
                    );
                } else {
                    concat.push(Element::Alternation(alternatives));
                }
            }
            '|' => out.push(Concatenation(std::mem::take(&mut concat))),
            c => {
                if let Some(Element::Literal(last)) = concat.last_mut() {
                    last.push(c);
                } else {
                    concat.push(Element::Literal(c.to_string()));
                }
            }
        }
    }
    out.push(Concatenation(concat));
    Ok((index - start, closed))
}

/// Append every expansion of a concatenation to every builder
///
/// This is the cartesian product over alternation groups: each group
/// multiplies the builder set by its number of alternatives.
fn expand_concatenation(builders: &mut Vec<String>, concat: &Concatenation) {
    for element in &concat.0 {
        match element {
            Element::Literal(value) => {
                for builder in builders.iter_mut() {
                    builder.push_str(value);
                }
            }
            Element::Alternation(alternatives) => {
                let original = std::mem::take(builders);
                for alternative in alternatives {
                    let mut branch = original.clone();
                    expand_concatenation(&mut branch, alternative);
                    builders.append(&mut branch);
                }
            }
        }
    }
}
