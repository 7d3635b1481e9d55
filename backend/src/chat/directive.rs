//! Inline media directives
//!
//! Model output may carry one tag asking for an extra asset:
//!
//! ```text
//! directive := "[[" kind ":" prompt "]]"
//! kind      := IMAGE | VIDEO | AUDIO | SPEECH      (case-insensitive)
//! prompt    := any text not containing "]]", trimmed, non-empty
//! ```
//!
//! Malformed tags stay in the text untouched.

use crate::chat::models::MediaKind;
use serde::Serialize;

const OPEN: &str = "[[";
const CLOSE: &str = "]]";

/// A typed media request found in generated text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaDirective {
    /// Media to produce
    pub kind: MediaKind,
    /// Prompt (or, for audio, the text to speak)
    pub prompt: String,
}

/// Result of [`parse_directive`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    /// The first well-formed directive
    pub directive: MediaDirective,
    /// Input text with that directive removed
    pub remaining_text: String,
}

fn parse_kind(raw: &str) -> Option<MediaKind> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "IMAGE" => Some(MediaKind::Image),
        "VIDEO" => Some(MediaKind::Video),
        "AUDIO" | "SPEECH" => Some(MediaKind::Audio),
        _ => None,
    }
}

/// Parse the body between `[[` and `]]`
fn parse_body(body: &str) -> Option<MediaDirective> {
    let (kind, prompt) = body.split_once(':')?;
    let kind = parse_kind(kind)?;
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return None;
    }
    Some(MediaDirective {
        kind,
        prompt: prompt.to_string(),
    })
}

/// Find the first well-formed directive in `text`
pub fn parse_directive(text: &str) -> Option<ParsedDirective> {
    let mut search_from = 0;

    while let Some(rel_open) = text[search_from..].find(OPEN) {
        let open = search_from + rel_open;
        let body_start = open + OPEN.len();
        let rel_close = text[body_start..].find(CLOSE)?;
        let close = body_start + rel_close;

        if let Some(directive) = parse_body(&text[body_start..close]) {
            let before = text[..open].trim_end();
            let after = text[close + CLOSE.len()..].trim_start();
            let remaining_text = match (before.is_empty(), after.is_empty()) {
                (true, _) => after.to_string(),
                (_, true) => before.to_string(),
                _ => format!("{}\n\n{}", before, after),
            };
            return Some(ParsedDirective {
                directive,
                remaining_text,
            });
        }

        search_from = body_start;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_image_directive_and_strips_it() {
        let parsed =
            parse_directive("Here you go!\n[[IMAGE: a red fox in snow]]\nEnjoy.").unwrap();
        assert_eq!(parsed.directive.kind, MediaKind::Image);
        assert_eq!(parsed.directive.prompt, "a red fox in snow");
        assert_eq!(parsed.remaining_text, "Here you go!\n\nEnjoy.");
    }

    #[test]
    fn test_kind_is_case_insensitive_and_speech_aliases_audio() {
        let parsed = parse_directive("[[speech: hello there]]").unwrap();
        assert_eq!(parsed.directive.kind, MediaKind::Audio);
        assert_eq!(parsed.remaining_text, "");

        let parsed = parse_directive("[[ Video :  waves ]] done").unwrap();
        assert_eq!(parsed.directive.kind, MediaKind::Video);
        assert_eq!(parsed.directive.prompt, "waves");
        assert_eq!(parsed.remaining_text, "done");
    }

    #[test]
    fn test_malformed_tags_are_skipped() {
        assert!(parse_directive("plain answer").is_none());
        assert!(parse_directive("[[IMAGE: unterminated").is_none());
        assert!(parse_directive("[[IMAGE:   ]]").is_none());
        assert!(parse_directive("[[GIF: cat]]").is_none());

        let parsed = parse_directive("see [[note]] then [[IMAGE: cat]]").unwrap();
        assert_eq!(parsed.directive.prompt, "cat");
        assert_eq!(parsed.remaining_text, "see [[note]] then");
    }

    #[test]
    fn test_only_first_directive_is_taken() {
        let parsed = parse_directive("[[IMAGE: one]] and [[VIDEO: two]]").unwrap();
        assert_eq!(parsed.directive.kind, MediaKind::Image);
        assert_eq!(parsed.remaining_text, "and [[VIDEO: two]]");
    }
}
