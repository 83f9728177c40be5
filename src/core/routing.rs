//! Per-request tool selection.

use std::collections::BTreeSet;

use crate::providers::Tool;

/// Location and navigation terms. Words match whole words; a trailing `*`
/// matches any word starting with the stem; spaces separate consecutive words.
const MAP_KEYWORDS: &[&str] = &[
    // Spanish
    "mapa", "mapas", "ubicaci*", "dónde", "donde", "llegar", "calle", "calles", "ruta",
    "rutas", "ir a", "localiza*",
    // English
    "map", "maps", "location", "where", "address", "route", "routes", "directions", "get to",
    "street", "nearby", "locate",
];

/// Terms that turn a prompt with an attached image into an edit request.
const EDIT_KEYWORDS: &[&str] = &["editar*", "edit", "editing"];

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn word_matches(word: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(stem) => word.starts_with(stem),
        None => word == pattern,
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let words = words(text);
    keywords.iter().any(|keyword| {
        let parts: Vec<&str> = keyword.split(' ').collect();
        words.windows(parts.len()).any(|window| {
            window
                .iter()
                .zip(&parts)
                .all(|(word, pattern)| word_matches(word, pattern))
        })
    })
}

pub fn needs_maps(prompt: &str) -> bool {
    contains_any(prompt, MAP_KEYWORDS)
}

pub fn is_edit_request(prompt: &str) -> bool {
    contains_any(prompt, EDIT_KEYWORDS)
}

/// Search is always enabled; maps is added for location questions.
pub fn tools_for_prompt(prompt: &str) -> BTreeSet<Tool> {
    let mut tools = BTreeSet::from([Tool::Search]);
    if needs_maps(prompt) {
        tools.insert(Tool::Maps);
    }
    tools
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_always_enabled() {
        assert_eq!(tools_for_prompt("tell me a joke"), BTreeSet::from([Tool::Search]));
        assert_eq!(tools_for_prompt(""), BTreeSet::from([Tool::Search]));
    }

    #[test]
    fn location_questions_enable_maps() {
        for prompt in [
            "¿Dónde queda el ministerio?",
            "Cómo LLEGAR a la plaza",
            "What is the ADDRESS of the registry office?",
            "show me a map of Lisbon",
        ] {
            assert!(tools_for_prompt(prompt).contains(&Tool::Maps), "{prompt}");
        }
    }

    #[test]
    fn edit_keyword_is_case_insensitive() {
        assert!(is_edit_request("Editar: quita el fondo"));
        assert!(is_edit_request("please EDIT this"));
        assert!(!is_edit_request("describe this picture"));
        assert!(is_edit_request("¿Puedes editarla con más luz?"));
    }

    #[test]
    fn edit_needs_a_whole_word() {
        for prompt in [
            "what is the credit limit on this card?",
            "which edition of the gazette is this?",
            "summarize the editorial",
        ] {
            assert!(!is_edit_request(prompt), "{prompt}");
        }
    }

    #[test]
    fn map_words_inside_other_words_do_not_enable_maps() {
        for prompt in [
            "convert this bitmap to text",
            "somewhere over the rainbow",
            "my router keeps rebooting",
            "irá a decidir mañana el tribunal",
        ] {
            assert!(!needs_maps(prompt), "{prompt}");
        }
    }

    #[test]
    fn stems_and_phrases_enable_maps() {
        for prompt in [
            "ubicación del registro civil",
            "localizar la oficina",
            "quiero ir a la plaza",
            "how do I get to the station",
        ] {
            assert!(needs_maps(prompt), "{prompt}");
        }
    }
}
