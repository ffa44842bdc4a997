//! Inline effect-tag parsing.
//!
//! Tags use the `{{effect}}text{{effect}}` form, optionally with an intensity:
//! `{{shake:3}}text{{shake}}`. Opening and closing tags share the same name
//! (case-insensitive); a scan keeps a stack of open tags and emits an effect
//! span when the matching name recurs. Span offsets are char offsets into the
//! tag-stripped ("clean") text, produced in the same pass.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Inline effects story text may request. Rendering them is the UI's job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextEffectKind {
    Shake,
    Wave,
    Pulse,
    Glow,
    Rainbow,
    Fade,
    Emphasis,
}

impl TextEffectKind {
    /// Case-insensitive tag-name lookup. Unknown names are unsupported
    /// effects, reported and skipped by the scanner.
    pub fn from_tag(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "shake" => Self::Shake,
            "wave" => Self::Wave,
            "pulse" => Self::Pulse,
            "glow" => Self::Glow,
            "rainbow" => Self::Rainbow,
            "fade" => Self::Fade,
            "emphasis" | "em" => Self::Emphasis,
            _ => return None,
        })
    }

    pub fn tag_name(self) -> &'static str {
        match self {
            Self::Shake => "shake",
            Self::Wave => "wave",
            Self::Pulse => "pulse",
            Self::Glow => "glow",
            Self::Rainbow => "rainbow",
            Self::Fade => "fade",
            Self::Emphasis => "emphasis",
        }
    }

    fn default_intensity(self) -> f32 {
        match self {
            Self::Shake | Self::Wave => 1.0,
            Self::Pulse | Self::Glow | Self::Rainbow | Self::Fade | Self::Emphasis => 0.5,
        }
    }

    fn default_duration(self) -> Option<f32> {
        match self {
            // Fade runs once; the rest loop until the scene changes.
            Self::Fade => Some(1.2),
            _ => None,
        }
    }

    fn default_color(self) -> Option<&'static str> {
        match self {
            Self::Glow => Some("#ffd700"),
            Self::Emphasis => Some("#ff5555"),
            _ => None,
        }
    }
}

impl fmt::Display for TextEffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_name())
    }
}

/// One resolved effect span. `start`/`end` are char offsets into the clean
/// text (`start..end`, end exclusive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEffect {
    pub kind: TextEffectKind,
    pub start: usize,
    pub end: usize,
    pub intensity: f32,
    pub duration: Option<f32>,
    pub color: Option<String>,
}

/// Problems found while scanning tags. These are reported, never thrown: the
/// scan always yields usable clean text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagError {
    UnsupportedEffect { tag: String },
    UnmatchedOpenTag { tag: String },
}

impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagError::UnsupportedEffect { tag } => write!(f, "unsupported effect tag '{tag}'"),
            TagError::UnmatchedOpenTag { tag } => write!(f, "unmatched opening tag '{tag}'"),
        }
    }
}

/// Output of one tag scan.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TagScan {
    pub clean: String,
    pub effects: Vec<TextEffect>,
    pub errors: Vec<TagError>,
}

struct OpenTag {
    kind: TextEffectKind,
    clean_start: usize,
    intensity: f32,
}

/// Scan raw text in one pass, producing clean text plus effect spans in
/// clean-text coordinates.
pub fn scan_tags(raw: &str) -> TagScan {
    let mut scan = TagScan::default();
    let mut stack: Vec<OpenTag> = Vec::new();
    let mut clean_chars = 0usize;

    let mut rest = raw;
    while !rest.is_empty() {
        let Some(open_rel) = rest.find("{{") else {
            push_clean(&mut scan.clean, &mut clean_chars, rest);
            break;
        };
        let Some(close_rel) = rest[open_rel + 2..].find("}}") else {
            // Unterminated tag: the remainder is literal text.
            push_clean(&mut scan.clean, &mut clean_chars, rest);
            break;
        };

        push_clean(&mut scan.clean, &mut clean_chars, &rest[..open_rel]);
        let body = &rest[open_rel + 2..open_rel + 2 + close_rel];
        handle_tag(body, clean_chars, &mut stack, &mut scan);
        rest = &rest[open_rel + 2 + close_rel + 2..];
    }

    for open in stack {
        scan.errors.push(TagError::UnmatchedOpenTag {
            tag: open.kind.tag_name().to_string(),
        });
    }
    scan.effects.sort_by_key(|effect| (effect.start, effect.end));
    scan
}

/// Strip all `{{...}}` tags, keeping only displayable text.
pub fn remove_tags(raw: &str) -> String {
    scan_tags(raw).clean
}

fn push_clean(clean: &mut String, clean_chars: &mut usize, chunk: &str) {
    clean.push_str(chunk);
    *clean_chars += chunk.chars().count();
}

fn handle_tag(body: &str, clean_chars: usize, stack: &mut Vec<OpenTag>, scan: &mut TagScan) {
    let (name, intensity_part) = match body.split_once(':') {
        Some((name, value)) => (name.trim(), Some(value.trim())),
        None => (body.trim(), None),
    };

    let Some(kind) = TextEffectKind::from_tag(name) else {
        scan.errors.push(TagError::UnsupportedEffect { tag: body.to_string() });
        return;
    };

    // Same name already open => this is the closing tag.
    if let Some(pos) = stack.iter().rposition(|open| open.kind == kind) {
        let open = stack.remove(pos);
        scan.effects.push(TextEffect {
            kind,
            start: open.clean_start,
            end: clean_chars,
            intensity: open.intensity,
            duration: kind.default_duration(),
            color: kind.default_color().map(str::to_string),
        });
        return;
    }

    let intensity = intensity_part
        .and_then(|raw| raw.parse::<f32>().ok())
        .unwrap_or_else(|| kind.default_intensity());
    stack.push(OpenTag {
        kind,
        clean_start: clean_chars,
        intensity,
    });
}

/// A contiguous run of clean text whose active-effect set is constant.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub effects: Vec<TextEffect>,
}

/// Split clean text into runs wherever the set of active effects changes.
pub fn segment_text(clean: &str, effects: &[TextEffect]) -> Vec<Segment> {
    let chars: Vec<char> = clean.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let active_at = |idx: usize| -> Vec<usize> {
        effects
            .iter()
            .enumerate()
            .filter(|(_, effect)| effect.start <= idx && idx < effect.end)
            .map(|(n, _)| n)
            .collect()
    };

    let mut segments = Vec::new();
    let mut run_start = 0usize;
    let mut run_active = active_at(0);
    for idx in 1..chars.len() {
        let active = active_at(idx);
        if active != run_active {
            segments.push(Segment {
                text: chars[run_start..idx].iter().collect(),
                effects: run_active.iter().map(|&n| effects[n].clone()).collect(),
            });
            run_start = idx;
            run_active = active;
        }
    }
    segments.push(Segment {
        text: chars[run_start..].iter().collect(),
        effects: run_active.iter().map(|&n| effects[n].clone()).collect(),
    });
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let scan = scan_tags("The stairwell goes down.");
        assert_eq!(scan.clean, "The stairwell goes down.");
        assert!(scan.effects.is_empty());
        assert!(scan.errors.is_empty());
    }

    #[test]
    fn paired_tags_yield_clean_offsets() {
        let scan = scan_tags("The {{shake}}floor gives way{{shake}} below.");
        assert_eq!(scan.clean, "The floor gives way below.");
        assert_eq!(scan.effects.len(), 1);
        let effect = &scan.effects[0];
        assert_eq!(effect.kind, TextEffectKind::Shake);
        assert_eq!(effect.start, 4);
        assert_eq!(effect.end, 19);
    }

    #[test]
    fn intensity_parameter_is_parsed() {
        let scan = scan_tags("{{wave:2.5}}ripples{{wave}}");
        assert_eq!(scan.effects.len(), 1);
        assert!((scan.effects[0].intensity - 2.5).abs() < f32::EPSILON);
    }

    #[test]
    fn closing_tag_name_is_case_insensitive() {
        let scan = scan_tags("{{Shake}}tremor{{SHAKE}}");
        assert_eq!(scan.clean, "tremor");
        assert_eq!(scan.effects.len(), 1);
        assert!(scan.errors.is_empty());
    }

    #[test]
    fn unsupported_effect_is_reported_and_skipped() {
        let scan = scan_tags("{{sparkle}}hello{{sparkle}}");
        assert_eq!(scan.clean, "hello");
        assert!(scan.effects.is_empty());
        // Both occurrences are unknown tags; neither reaches the stack.
        assert_eq!(
            scan.errors,
            vec![
                TagError::UnsupportedEffect {
                    tag: "sparkle".to_string()
                },
                TagError::UnsupportedEffect {
                    tag: "sparkle".to_string()
                },
            ]
        );
    }

    #[test]
    fn unmatched_open_tag_is_reported() {
        let scan = scan_tags("{{glow}}forever bright");
        assert_eq!(scan.clean, "forever bright");
        assert!(scan.effects.is_empty());
        assert_eq!(
            scan.errors,
            vec![TagError::UnmatchedOpenTag {
                tag: "glow".to_string()
            }]
        );
    }

    #[test]
    fn nested_tags_produce_overlapping_spans() {
        let scan = scan_tags("{{wave}}ab{{shake}}cd{{shake}}ef{{wave}}");
        assert_eq!(scan.clean, "abcdef");
        assert_eq!(scan.effects.len(), 2);
        let shake = scan.effects.iter().find(|e| e.kind == TextEffectKind::Shake).unwrap();
        let wave = scan.effects.iter().find(|e| e.kind == TextEffectKind::Wave).unwrap();
        assert_eq!((shake.start, shake.end), (2, 4));
        assert_eq!((wave.start, wave.end), (0, 6));
    }

    #[test]
    fn multibyte_text_uses_char_offsets() {
        let scan = scan_tags("바닥이 {{shake}}흔들린다{{shake}}!");
        assert_eq!(scan.clean, "바닥이 흔들린다!");
        assert_eq!(scan.effects.len(), 1);
        assert_eq!((scan.effects[0].start, scan.effects[0].end), (4, 8));
    }

    #[test]
    fn remove_tags_leaves_no_braces_for_well_formed_pairs() {
        let clean = remove_tags("a {{shake}}b{{shake}} c {{wave:3}}d{{wave}}");
        assert!(!clean.contains("{{"));
        assert!(!clean.contains("}}"));
        assert_eq!(clean, "a b c d");
    }

    #[test]
    fn segmentation_splits_on_active_set_boundaries() {
        let scan = scan_tags("{{wave}}ab{{shake}}cd{{shake}}ef{{wave}}gh");
        let segments = segment_text(&scan.clean, &scan.effects);
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["ab", "cd", "ef", "gh"]);
        assert_eq!(segments[0].effects.len(), 1);
        assert_eq!(segments[1].effects.len(), 2);
        assert_eq!(segments[2].effects.len(), 1);
        assert!(segments[3].effects.is_empty());
    }

    #[test]
    fn segmentation_of_plain_text_is_one_run() {
        let segments = segment_text("nothing fancy", &[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "nothing fancy");
        assert!(segments[0].effects.is_empty());
    }
}
