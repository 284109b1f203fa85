//! The library of standard phrase mappers
//!
//! Each function builds one ready-to-chain [`PhraseMapper`]. Construction can
//! be expensive (pattern compilation, blacklist combination expansion), the
//! per-record hot path never is.

use super::{matcher::SubstringMatcher, named, Mapped, PhraseMapper};
use crate::Frequency;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Convert phrases to lower case
///
/// Example: `"You'll make it"` becomes `"you'll make it"`
pub fn to_lower_case() -> Arc<dyn PhraseMapper> {
    named("to-lower-case", |phrase, _freq| {
        if phrase.chars().any(char::is_uppercase) {
            Mapped::rewritten(phrase.to_lowercase())
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

// https://en.wikipedia.org/wiki/Apostrophe
const UNICODE_APOSTROPHES: [char; 4] = ['\u{2019}', '\u{02B9}', '\u{2032}', '\u{2035}'];

/// Replace Unicode apostrophe look-alikes with the ASCII apostrophe
pub fn normalize_apostrophes() -> Arc<dyn PhraseMapper> {
    replace_chars("normalize-apostrophes", &UNICODE_APOSTROPHES, '\'')
}

// https://en.wikipedia.org/wiki/Hyphen#Unicode
const UNICODE_HYPHENS: [char; 3] = ['\u{00AD}', '\u{2010}', '\u{2011}'];

/// Replace Unicode hyphen look-alikes with the ASCII hyphen
pub fn normalize_hyphens() -> Arc<dyn PhraseMapper> {
    replace_chars("normalize-hyphens", &UNICODE_HYPHENS, '-')
}

fn replace_chars(
    name: &'static str,
    from: &'static [char],
    to: char,
) -> Arc<dyn PhraseMapper> {
    named(name, move |phrase, _freq| {
        if phrase.contains(from) {
            Mapped::rewritten(
                phrase
                    .chars()
                    .map(|c| if from.contains(&c) { to } else { c })
                    .collect(),
            )
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove one leading double quote from each word that has one
///
/// Example: `"fo"o ""bar"` becomes `fo"o "bar"`, while a lone `"` stays.
pub fn remove_leading_double_quote() -> Arc<dyn PhraseMapper> {
    named("remove-leading-double-quote", |phrase, _freq| {
        if !phrase.contains('"') {
            return Mapped::unchanged(phrase);
        }
        let mut changed = false;
        let words = phrase
            .split(' ')
            .map(|word| {
                if word.len() > 1 && word.starts_with('"') {
                    changed = true;
                    &word[1..]
                } else {
                    word
                }
            })
            .collect::<Vec<_>>();
        if changed {
            Mapped::rewritten(words.join(" "))
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Join two consecutive words when the second starts with an apostrophe
///
/// Example: `"You 'll make it"` becomes `"You'll make it"`
pub fn join_words_with_leading_apostrophe() -> Arc<dyn PhraseMapper> {
    named("join-words-with-leading-apostrophe", |phrase, _freq| {
        if phrase.contains(" '") {
            Mapped::rewritten(phrase.replace(" '", "'"))
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Isolate commas as their own words and collapse the resulting spaces
///
/// Example: `"foo, bar"` becomes `"foo , bar"`
pub fn explode_commas() -> Arc<dyn PhraseMapper> {
    named("explode-commas", |phrase, _freq| {
        if phrase.contains(',') {
            let spread = phrase.replace(',', " , ");
            Mapped::rewritten(spread.split_whitespace().collect::<Vec<_>>().join(" "))
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Give surrounding commas of a word their own word
///
/// Example: `",foo,,"` becomes `", foo, ,"`
pub fn split_surrounding_commas() -> Arc<dyn PhraseMapper> {
    named("split-surrounding-commas", |phrase, _freq| {
        if !phrase.contains(',') {
            return Mapped::unchanged(phrase);
        }
        let mut changed = false;
        let words = phrase
            .split(' ')
            .map(|word| {
                if word.len() <= 1 || !(word.starts_with(',') || word.ends_with(',')) {
                    return word.to_owned();
                }
                changed = true;
                if word == ",," {
                    return ", ,".to_owned();
                }
                let mut split = word.to_owned();
                if split.starts_with(',') {
                    split = format!(", {}", &split[1..]);
                }
                if split.ends_with(',') {
                    split = format!("{} ,", &split[..split.len() - 1]);
                }
                split
            })
            .collect::<Vec<_>>();
        if changed {
            Mapped::rewritten(words.join(" "))
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases containing control characters
///
/// This covers `\x00`-`\x1F` as well as DEL and the C1 range `\x7F`-`\x9F`.
pub fn remove_control_characters() -> Arc<dyn PhraseMapper> {
    named("remove-control-characters", |phrase, _freq| {
        let control = |c: char| c < ' ' || ('\u{7F}'..='\u{9F}').contains(&c);
        if phrase.chars().any(control) {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases containing a word that is an HTML entity such as `&amp;`
pub fn remove_html_entities() -> Arc<dyn PhraseMapper> {
    filter_by_words("remove-html-entities", |word| {
        !(word.len() > 1 && word.starts_with('&') && word.ends_with(';'))
    })
}

/// Remove phrases that contain at least one character outside Latin-1
///
/// The Latin-1 character set covers the code points `[0, 255]`, the widest
/// repertoire an index builder with 1-byte character types can store.
pub fn remove_non_latin1() -> Arc<dyn PhraseMapper> {
    named("remove-non-latin1", |phrase, _freq| {
        if phrase.chars().any(|c| c as u32 > 255) {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases whose frequency is below a minimum
pub fn min_frequency(minimum: u64) -> Arc<dyn PhraseMapper> {
    named("min-frequency", move |phrase, frequency: Frequency| {
        if frequency.get() < minimum {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

// Email addresses can be just about anything which contains an @
fn contains_email(lower: &str) -> bool {
    let bytes = lower.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, &b)| b == b'@' && i > 0 && i + 1 < bytes.len())
}

const ALL_COUNTRY_TLD: &str = "a[cdefgilmoqrstuwxz]|b[abdefghijmnorstwyz]|c[acdfghiklmnoruvwxyz]|d[ejkmoz]|e[cegrstu]|f[ijkmor]|g[adefghilmnpqrstuwy]|h[kmnrtu]|i[delmnoqrst]|j[emop]|k[eghimnprwyz]|l[abcikrstuvy]|m[acdeghklmnopqrstuvwxyz]|n[acefgilopruz]|om|p[aefghklmnrstwy]|qa|r[eosuw]|s[abcdeghiklmnorstuvxyz]|t[cdfghjklmnortvwz]|u[agksyz]|v[aceginu]|w[fs]|y[et]|z[amw]";

/// Remove phrases that contain URLs or email addresses
pub fn remove_urls_and_emails() -> Arc<dyn PhraseMapper> {
    // Some of the more common domains, per
    // https://w3techs.com/technologies/overview/top_level_domain/all
    let url_pattern = Regex::new(&format!(
        "www\\.|https?:|ftps?:|\\.(?:com|org|net|edu|gov|xyz|moe|club|online|pro|site|top|shop|info|biz|{ALL_COUNTRY_TLD})\\b"
    ))
    .expect("the URL pattern should be a valid regex");
    named("remove-urls-and-emails", move |phrase, _freq| {
        let lower = phrase.to_lowercase();
        if contains_email(&lower) || url_pattern.is_match(&lower) {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases that contain file names
pub fn remove_file_names() -> Arc<dyn PhraseMapper> {
    let file_pattern = Regex::new(
        "\\.(?:exe|dll|bin|msi|bat|com|jar|pkg|apk|ini|ai|ico|jpg|jpeg|png|gif|bmp|webp|tif|tag|ps|odp|pps|ppt|pptx|pdf|doc|docx|xml|csv|sql|zip|rar|tar|gz|7z|iso|webm|mov|mkv|mpg|mpeg|mp3|acc|ogg|wav|wmv|mid|midi|mp4|avi|vlc|html|htm|php|asp|aspx|js|css)\\b",
    )
    .expect("the file name pattern should be a valid regex");
    named("remove-file-names", move |phrase, _freq| {
        if file_pattern.is_match(&phrase.to_lowercase()) {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases with more than `n` words
pub fn max_n_gram(n: usize) -> Arc<dyn PhraseMapper> {
    named("max-n-gram", move |phrase, _freq| {
        let words = phrase.bytes().filter(|&b| b == b' ').count() + 1;
        if words > n {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases containing a word for which the predicate returns `false`
pub fn filter_by_words<P>(name: &'static str, keep_word: P) -> Arc<dyn PhraseMapper>
where
    P: Fn(&str) -> bool + Send + Sync + 'static,
{
    named(name, move |phrase, _freq| {
        if phrase.split(' ').all(&keep_word) {
            Mapped::unchanged(phrase)
        } else {
            Mapped::Removed
        }
    })
}

/// Remove phrases containing a blacklisted word
///
/// A word is blacklisted if it appears in `words`, or if it can be written as
/// a concatenation of up to `repeat` blacklisted words. With `"` and `?`
/// blacklisted and `repeat = 3`, the words `"""`, `"?"`, `"?` and `??` are
/// all blacklisted too.
///
/// The combination set has `O(|words|.pow(repeat))` entries and is expanded
/// once at construction, so keep `repeat` small.
pub fn blacklist(
    words: impl IntoIterator<Item = impl AsRef<str>>,
    repeat: usize,
) -> Arc<dyn PhraseMapper> {
    let base = words
        .into_iter()
        .map(|w| w.as_ref().to_owned())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>();
    let blacklisted = all_combinations(&base, repeat)
        .into_iter()
        .collect::<FxHashSet<_>>();
    filter_by_words("blacklist", move |word| !blacklisted.contains(word))
}

/// All concatenations of up to `repeat` of the given words
fn all_combinations(words: &[String], repeat: usize) -> Vec<String> {
    let mut combinations = words.to_vec();
    let mut start = 0;
    for _ in 1..repeat {
        let size = combinations.len();
        for i in start..size {
            let prefix = combinations[i].clone();
            for word in words {
                combinations.push(format!("{prefix}{word}"));
            }
        }
        start = size;
    }
    combinations
}

/// Remove phrases containing a word that is not whitelisted
pub fn whitelist(words: impl IntoIterator<Item = impl AsRef<str>>) -> Arc<dyn PhraseMapper> {
    let whitelisted = words
        .into_iter()
        .map(|w| w.as_ref().into())
        .collect::<FxHashSet<Box<str>>>();
    filter_by_words("whitelist", move |word| whitelisted.contains(word))
}

/// Remove phrases in which a blacklisted string occurs anywhere
///
/// Unlike [`blacklist`], this matches substrings: blacklisting `--` removes
/// `foo--bar`, which a word-level blacklist of `-` would keep.
pub fn super_blacklist(
    strings: impl IntoIterator<Item = impl AsRef<str>>,
) -> Arc<dyn PhraseMapper> {
    let matcher = SubstringMatcher::new(strings);
    named("super-blacklist", move |phrase, _freq| {
        if matcher.matches_anywhere(phrase) {
            Mapped::Removed
        } else {
            Mapped::unchanged(phrase)
        }
    })
}

/// Remove phrases with sentinel markers from the Google Web corpus
///
/// This covers `<s>`, `</s>`, `<unk>` and their capitalized variants.
pub fn remove_google_web_markers() -> Arc<dyn PhraseMapper> {
    let markers: FxHashSet<&'static str> = ["<s>", "<S>", "</s>", "</S>", "<unk>", "<UNK>"]
        .into_iter()
        .collect();
    filter_by_words("remove-google-web-markers", move |word| {
        !markers.contains(word)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::check_mapper;

    #[test]
    fn lower_casing() {
        check_mapper(
            &to_lower_case(),
            &["already lower"],
            &[],
            &[("You'll make it", "you'll make it"), ("ÄÖÜ", "äöü")],
        );
    }

    #[test]
    fn apostrophe_and_hyphen_normalization() {
        check_mapper(
            &normalize_apostrophes(),
            &["don't"],
            &[],
            &[("don\u{2019}t", "don't")],
        );
        check_mapper(
            &normalize_hyphens(),
            &["foo-bar"],
            &[],
            &[("foo\u{2010}bar", "foo-bar")],
        );
    }

    #[test]
    fn leading_double_quote_removal() {
        check_mapper(
            &remove_leading_double_quote(),
            &["\" foo", "plain"],
            &[],
            &[("\"fo\"o \"\"bar\"", "fo\"o \"bar\"")],
        );
    }

    #[test]
    fn apostrophe_word_joining() {
        check_mapper(
            &join_words_with_leading_apostrophe(),
            &["nothing here"],
            &[],
            &[
                ("You 'll make it", "You'll make it"),
                ("don 't", "don't"),
            ],
        );
    }

    #[test]
    fn comma_explosion() {
        check_mapper(
            &explode_commas(),
            &["no commas"],
            &[],
            &[
                ("foo, bar", "foo , bar"),
                (",foo,,", ", foo , ,"),
            ],
        );
    }

    #[test]
    fn surrounding_comma_splitting() {
        check_mapper(
            &split_surrounding_commas(),
            &["no commas", ","],
            &[],
            &[("foo,", "foo ,"), (",foo,,", ", foo, ,")],
        );
    }

    #[test]
    fn control_character_removal() {
        check_mapper(
            &remove_control_characters(),
            &["clean phrase"],
            &["tab\there", "bell\u{7}", "c1 range\u{85}"],
            &[],
        );
    }

    #[test]
    fn html_entity_removal() {
        check_mapper(
            &remove_html_entities(),
            &["ampersand & semicolon ;", "&&"],
            &["copy &amp; paste", "&gt;", "&;"],
            &[],
        );
    }

    #[test]
    fn url_and_email_removal() {
        check_mapper(
            &remove_urls_and_emails(),
            &["plain phrase", "@ alone", "trailing @"],
            &[
                "mail me at foo@example.org",
                "see www.example.com",
                "https://example.org",
                "visit example.de today",
            ],
            &[],
        );
    }

    #[test]
    fn file_name_removal() {
        check_mapper(
            &remove_file_names(),
            &["no files here", "csv without dot"],
            &["run setup.exe now", "open report.pdf", "index.html"],
            &[],
        );
    }

    #[test]
    fn non_latin1_removal() {
        check_mapper(
            &remove_non_latin1(),
            &["café au lait", "plain"],
            &["日本語", "emoji 😀"],
            &[],
        );
    }

    #[test]
    fn frequency_cutoff() {
        // check_mapper runs with frequency 100
        check_mapper(&min_frequency(100), &["kept"], &[], &[]);
        check_mapper(&min_frequency(101), &[], &["removed"], &[]);
    }

    #[test]
    fn max_n_gram_boundary() {
        for n in 1..=5 {
            let mapper = max_n_gram(n);
            let exactly_n = vec!["word"; n].join(" ");
            let one_more = vec!["word"; n + 1].join(" ");
            check_mapper(&mapper, &[exactly_n.as_str()], &[one_more.as_str()], &[]);
        }
    }

    #[test]
    fn word_blacklist() {
        let blacklisted = [".", "-", "(", ")", "\"", "'"];

        let single = blacklist(blacklisted, 1);
        check_mapper(
            &single,
            &["foo bar", "foo-bar", "Dr.", "()"],
            &[".", "(", ")", "-", "foo -", "- foo", "- foo -", "foo - bar"],
            &[],
        );

        let repeated = blacklist(blacklisted, 4);
        check_mapper(
            &repeated,
            &["()()-"],
            &["()()", "-.-.", "-.-. foo", "foo -.-. foo"],
            &[],
        );
    }

    #[test]
    fn blacklist_combinatorics() {
        // With repeat = 2, "-." is a combination but "-.-" is not
        let mapper = blacklist([".", "-"], 2);
        check_mapper(&mapper, &["-.-"], &["-."], &[]);
    }

    #[test]
    fn word_whitelist() {
        let mapper = whitelist(["foo", "bar"]);
        check_mapper(&mapper, &["foo bar", "foo"], &["foo baz", "qux"], &[]);
    }

    #[test]
    fn super_blacklist_matches_substrings() {
        let blacklisted = [".", "-", "(", ")", "\"", "'"];
        let mapper = super_blacklist(blacklisted);
        check_mapper(
            &mapper,
            &["foo bar"],
            &[
                ".", "(", ")", "-", "foo -", "- foo", "- foo -", "foo - bar",
                // These are kept by the word-level blacklist
                "foo-bar", "Dr.",
            ],
            &[],
        );

        // The documented "--" example
        let double_hyphen = super_blacklist(["--"]);
        check_mapper(&double_hyphen, &["foo-bar"], &["foo--bar"], &[]);
    }

    #[test]
    fn google_web_marker_removal() {
        check_mapper(
            &remove_google_web_markers(),
            &["ordinary phrase", "<ss>"],
            &["<s> foo", "foo </S>", "the <unk> token"],
            &[],
        );
    }
}
