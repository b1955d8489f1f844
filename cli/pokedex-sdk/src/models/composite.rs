use pokedex_catalog::types::DescriptionEntry;
use pokedex_catalog::{EntityDetail, SpeciesInfo};
use serde::Serialize;

const PREFERRED_LANGUAGE: &str = "en";

/// Detail screen view model: full detail plus the selected description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeDetail {
    pub detail: EntityDetail,
    pub description: Option<String>,
}

impl CompositeDetail {
    pub fn new(detail: EntityDetail, species: &SpeciesInfo) -> Self {
        Self {
            detail,
            description: select_description(&species.description_entries),
        }
    }
}

/// Pick the description to show and normalize its whitespace.
///
/// The last English entry wins, otherwise the first entry overall.
/// Returns [None] only if there are no entries.
pub fn select_description(entries: &[DescriptionEntry]) -> Option<String> {
    entries
        .iter()
        .rev()
        .find(|entry| entry.language_code.eq_ignore_ascii_case(PREFERRED_LANGUAGE))
        .or_else(|| entries.first())
        .map(|entry| normalize_description(&entry.text))
}

fn is_line_break(c: char) -> bool {
    matches!(c, '\n' | '\u{000C}')
}

/// Flatten line breaks and collapse double spaces once.
///
/// A newline or form feed becomes a single space, or disappears if it
/// already borders a space. Double spaces are then merged in a single
/// non-overlapping pass, so runs of four spaces end up as two.
pub fn normalize_description(text: &str) -> String {
    let chars = text.chars().collect::<Vec<_>>();
    let mut flattened = String::with_capacity(text.len());

    for (i, &c) in chars.iter().enumerate() {
        if !is_line_break(c) {
            flattened.push(c);
            continue;
        }
        let space_before = flattened.ends_with(' ');
        let space_after = chars.get(i + 1) == Some(&' ');
        if !space_before && !space_after {
            flattened.push(' ');
        }
    }

    flattened.replace("  ", " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use pokedex_catalog::EntityId;
    use pokedex_catalog::types::Sprites;
    use pretty_assertions::assert_eq;

    use super::*;

    fn entries(raw: &[(&str, &str)]) -> Vec<DescriptionEntry> {
        raw.iter()
            .map(|(text, lang)| DescriptionEntry::new(*text, *lang))
            .collect()
    }

    #[test]
    fn last_english_entry_is_selected() {
        let entries = entries(&[("A", "fr"), ("B", "en"), ("C", "en")]);
        assert_eq!(select_description(&entries).as_deref(), Some("C"));
    }

    #[test]
    fn language_match_ignores_case() {
        let entries = entries(&[("A", "fr"), ("B", "EN"), ("C", "de")]);
        assert_eq!(select_description(&entries).as_deref(), Some("B"));
    }

    #[test]
    fn falls_back_to_first_entry() {
        assert_eq!(
            select_description(&entries(&[("A", "fr")])).as_deref(),
            Some("A")
        );
        assert_eq!(
            select_description(&entries(&[("A", "fr"), ("B", "ja")])).as_deref(),
            Some("A")
        );
    }

    #[test]
    fn no_entries_no_description() {
        assert_eq!(select_description(&[]), None);
    }

    #[test]
    fn line_breaks_become_single_spaces() {
        assert_eq!(
            normalize_description("line1\nline2\u{000C}  end"),
            "line1 line2 end"
        );
        assert_eq!(normalize_description("a\nb\u{000C}c"), "a b c");
        assert_eq!(normalize_description("\nedge\n"), "edge");
    }

    #[test]
    fn double_spaces_collapse_once() {
        assert_eq!(normalize_description("a  b"), "a b");
        assert_eq!(normalize_description("a    b"), "a  b");
        assert_eq!(normalize_description("a   b"), "a  b");
    }

    #[test]
    fn selected_text_is_normalized() {
        let entries = entries(&[("A\nseed\u{000C}on its back.", "en")]);
        assert_eq!(
            select_description(&entries).as_deref(),
            Some("A seed on its back.")
        );
    }

    #[test]
    fn composite_carries_detail_and_description() {
        let detail = EntityDetail {
            id: EntityId::new(1).unwrap(),
            name: "bulbasaur".to_string(),
            sprites: Sprites::default(),
            types: vec![],
            stats: vec![],
        };
        let species = SpeciesInfo {
            description_entries: entries(&[("A strange seed", "en")]),
        };

        let composite = CompositeDetail::new(detail.clone(), &species);
        assert_eq!(composite, CompositeDetail {
            detail,
            description: Some("A strange seed".to_string()),
        });
    }
}
