//! Immediate-danger detection for raw user text.
//!
//! A best-effort lexical heuristic, not a safety guarantee. It scans for a
//! fixed set of phrases in four groups:
//!
//! - Explicit threats: "going to kill", "threatened to kill", "in danger"
//! - Weapons: gun, firearm, knife, weapon
//! - Strangulation: strangle, choke, "couldn't breathe"
//! - Urgency: "right now", "outside my door", "breaking in"
//!
//! # Limitations
//!
//! False negatives are expected: paraphrases, misspellings and other
//! languages are not covered. False positives are tolerated ("begun"
//! contains "gun"); the caller only uses a hit to surface emergency
//! resources.
//!
//! Patterns carry no anchors or word boundaries, so a match keeps matching
//! when any text is added before or after it.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Category of a matched danger pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerSignal {
    ExplicitThreat,
    Weapon,
    Strangulation,
    Urgency,
}

impl DangerSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitThreat => "explicit_threat",
            Self::Weapon => "weapon",
            Self::Strangulation => "strangulation",
            Self::Urgency => "urgency",
        }
    }
}

const EXPLICIT_THREAT: &str = r"(?i)going\s+to\s+kill|gonna\s+kill|threaten(?:ed|ing|s)?\s+to\s+kill|kill\s+(?:me|us|my|the\s+kids)|wants?\s+me\s+dead|in\s+(?:immediate\s+)?danger|not\s+safe|unsafe|going\s+to\s+hurt\s+(?:me|us)|fear\s+for\s+my\s+life|afraid\s+for\s+my\s+life";

const WEAPON: &str = r"(?i)gun|firearm|pistol|rifle|knife|knives|weapon|machete";

const STRANGULATION: &str =
    r"(?i)strangl|chok(?:e|ed|es|ing)|throat|couldn.?t\s+breathe|can.?t\s+breathe|cannot\s+breathe|suffocat";

const URGENCY: &str = r"(?i)right\s+now|outside\s+(?:my|the)\s+(?:door|house|home|window|apartment)|breaking\s+in|broke\s+in|on\s+(?:his|her|their)\s+way\s+(?:here|over)|call(?:ing)?\s+911|emergency";

static PATTERNS: LazyLock<Vec<(DangerSignal, Regex)>> = LazyLock::new(|| {
    [
        (DangerSignal::ExplicitThreat, EXPLICIT_THREAT),
        (DangerSignal::Weapon, WEAPON),
        (DangerSignal::Strangulation, STRANGULATION),
        (DangerSignal::Urgency, URGENCY),
    ]
    .into_iter()
    .map(|(signal, pattern)| {
        let re = Regex::new(pattern).expect("danger patterns are valid regexes");
        (signal, re)
    })
    .collect()
});

/// True if any danger pattern matches `text`. Empty text never matches.
pub fn detect_immediate_danger(text: &str) -> bool {
    PATTERNS.iter().any(|(_, re)| re.is_match(text))
}

/// Every signal category that matches `text`, in a fixed order.
pub fn danger_signals(text: &str) -> Vec<DangerSignal> {
    PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(signal, _)| *signal)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HITS: &[&str] = &[
        "He said he is going to kill me",
        "she THREATENED TO KILL the dog",
        "he has a gun in the car",
        "he pulled a knife",
        "he choked me until I passed out",
        "I couldn't breathe",
        "he is outside my door right now",
        "I'm in danger",
    ];

    const MISSES: &[&str] = &[
        "",
        "We separated last year and I want custody arrangements",
        "He sends me rude messages",
        "I need help filling out the petition",
    ];

    #[test]
    fn empty_is_safe() {
        assert!(!detect_immediate_danger(""));
        assert!(danger_signals("").is_empty());
    }

    #[test]
    fn known_phrases_match() {
        for text in HITS {
            assert!(detect_immediate_danger(text), "expected a match for {text:?}");
        }
    }

    #[test]
    fn ordinary_text_does_not_match() {
        for text in MISSES {
            assert!(!detect_immediate_danger(text), "unexpected match for {text:?}");
        }
    }

    #[test]
    fn case_insensitive() {
        assert!(detect_immediate_danger("HE HAS A GUN"));
        assert!(detect_immediate_danger("Right Now"));
    }

    proptest! {
        #[test]
        fn surrounding_text_keeps_a_match(
            prefix in any::<String>(),
            hit in prop::sample::select(HITS),
            suffix in any::<String>(),
        ) {
            let wrapped = format!("{prefix}{hit}{suffix}");
            prop_assert!(detect_immediate_danger(&wrapped));
            prop_assert!(danger_signals(hit)
                .iter()
                .all(|signal| danger_signals(&wrapped).contains(signal)));
        }

        #[test]
        fn any_text_is_scanned_without_panicking(text in any::<String>()) {
            prop_assert_eq!(detect_immediate_danger(&text), !danger_signals(&text).is_empty());
        }
    }

    #[test]
    fn signals_are_categorised() {
        assert_eq!(danger_signals("he has a gun"), vec![DangerSignal::Weapon]);
        assert_eq!(
            danger_signals("he strangled me and he is breaking in right now"),
            vec![DangerSignal::Strangulation, DangerSignal::Urgency]
        );
        assert_eq!(
            danger_signals("he is going to kill me with a knife"),
            vec![DangerSignal::ExplicitThreat, DangerSignal::Weapon]
        );
    }

    #[test]
    fn arbitrary_input_does_not_panic() {
        let inputs = [
            "\u{0}".to_string(),
            "🔪🔪".to_string(),
            "{{{{".to_string(),
            "ß".repeat(1000),
        ];
        for text in &inputs {
            let _ = detect_immediate_danger(text);
            let _ = danger_signals(text);
        }
        assert!(detect_immediate_danger("\u{feff}gun"));
    }
}
