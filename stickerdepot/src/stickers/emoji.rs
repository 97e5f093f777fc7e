//! Splitting sticker emoji hints into individual emoji.

use crate::store::EMOJI_LIST_PREFIX;

const ZWJ: char = '\u{200D}';

fn extends_previous(c: char) -> bool {
    matches!(c,
        '\u{FE0E}' | '\u{FE0F}'          // variation selectors
        | '\u{20E3}'                     // combining keycap
        | '\u{1F3FB}'..='\u{1F3FF}'      // skin tones
        | '\u{E0020}'..='\u{E007F}'      // tag sequences
        | ZWJ)
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

/// Splits `hint` into emoji, keeping modifier, ZWJ and flag sequences
/// together. Whitespace is dropped and duplicates are removed in order.
pub fn emoji_characters(hint: &str) -> Vec<String> {
    let mut clusters: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut joined = false;
    let mut indicators = 0;

    for c in hint.chars() {
        if c.is_whitespace() {
            if !current.is_empty() {
                clusters.push(std::mem::take(&mut current));
            }
            joined = false;
            indicators = 0;
            continue;
        }

        let flag_pair = is_regional_indicator(c) && indicators == 1;
        if current.is_empty() || joined || extends_previous(c) || flag_pair {
            current.push(c);
        } else {
            clusters.push(std::mem::take(&mut current));
            current.push(c);
            indicators = 0;
        }

        joined = c == ZWJ;
        if is_regional_indicator(c) {
            indicators += 1;
        }
    }
    if !current.is_empty() {
        clusters.push(current);
    }

    let mut seen = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        if !seen.contains(&cluster) {
            seen.push(cluster);
        }
    }
    seen
}

/// Name of the string list holding sticker keys for `emoji`.
pub(super) fn emoji_list_name(emoji: &str) -> String {
    format!("{EMOJI_LIST_PREFIX}{emoji}")
}
