//! Draft planning: assignment requirements and the word budget
//!
//! Targets are derived once by the planning sub-step and propagated as fixed
//! parameters to every body-section sub-step in that run; sub-steps never
//! coordinate with each other at execution time.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Requirements pulled from the assignment by the planning sub-step.
/// Field defaults double as the documented parse-failure fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssayRequirements {
    #[serde(default = "default_word_count")]
    pub required_word_count: u32,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default)]
    pub key_requirements: Vec<String>,

    #[serde(default = "default_sections")]
    pub suggested_sections: Vec<String>,

    #[serde(default = "default_level")]
    pub academic_level: String,

    #[serde(default = "default_citation_style")]
    pub citation_style: String,
}

impl Default for EssayRequirements {
    fn default() -> Self {
        Self {
            required_word_count: default_word_count(),
            topic: default_topic(),
            key_requirements: Vec::new(),
            suggested_sections: default_sections(),
            academic_level: default_level(),
            citation_style: default_citation_style(),
        }
    }
}

fn default_word_count() -> u32 {
    2000
}

fn default_topic() -> String {
    "Essay".to_string()
}

fn default_sections() -> Vec<String> {
    [
        "Introduction",
        "Literature Review",
        "Analysis",
        "Discussion",
        "Conclusion",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_level() -> String {
    "undergraduate".to_string()
}

fn default_citation_style() -> String {
    "APA".to_string()
}

impl EssayRequirements {
    /// Suggested sections with conclusion and references filtered out - those
    /// are produced by dedicated sub-steps and would otherwise duplicate.
    /// Handles numbered headings like "5. Conclusion".
    pub fn body_sections(&self) -> Vec<String> {
        let sections: Vec<String> = self
            .suggested_sections
            .iter()
            .filter(|s| {
                let lower = s.to_lowercase();
                !lower.contains("conclusion") && !lower.contains("reference")
            })
            .cloned()
            .collect();

        if sections.is_empty() {
            ["Background", "Analysis", "Discussion", "Implications"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            sections
        }
    }
}

static WORD_COUNT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(\d{3,5})\s*words?",        // "2000 words" (commas stripped first)
        r"word\s*count[:\s]+(\d+)",   // "word count: 1500"
        r"(\d+)\s*word\s*count",      // "1500 word count"
        r"minimum\s*(\d+)",           // "minimum 1500"
        r"at\s*least\s*(\d+)",        // "at least 2000"
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Failed to compile word count pattern"))
    .collect()
});

/// Word-count override found in user steering instructions. Instructions
/// take precedence over whatever the planner extracted from the assignment.
pub fn word_count_override(instructions: &str) -> Option<u32> {
    let normalized = instructions.to_lowercase().replace(',', "");

    for pattern in WORD_COUNT_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(&normalized) {
            if let Some(value) = captures.get(1) {
                if let Ok(count) = value.as_str().parse::<u32>() {
                    return Some(count);
                }
            }
        }
    }

    None
}

/// Fixed per-part word targets for one drafting run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBudget {
    pub total: u32,
    pub intro: u32,
    pub conclusion: u32,
    pub per_section: u32,
}

impl WordBudget {
    /// 10% introduction, 10% conclusion, remainder split evenly across the
    /// body sections
    pub fn derive(total: u32, section_count: usize) -> Self {
        let intro = total / 10;
        let conclusion = total / 10;
        let body = total.saturating_sub(intro + conclusion);
        let per_section = if section_count > 0 {
            body / section_count as u32
        } else {
            500
        };

        Self {
            total,
            intro,
            conclusion,
            per_section,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_fallback_defaults() {
        let requirements: EssayRequirements = serde_json::from_str("{}").unwrap();

        assert_eq!(requirements.required_word_count, 2000);
        assert_eq!(requirements.topic, "Essay");
        assert_eq!(requirements.academic_level, "undergraduate");
        assert_eq!(requirements.citation_style, "APA");
        assert_eq!(requirements.suggested_sections.len(), 5);
    }

    #[test]
    fn test_body_sections_filter_conclusion_and_references() {
        let requirements = EssayRequirements {
            suggested_sections: vec![
                "Background".to_string(),
                "Analysis".to_string(),
                "5. Conclusion".to_string(),
                "References".to_string(),
            ],
            ..Default::default()
        };

        let sections = requirements.body_sections();
        assert_eq!(sections, vec!["Background", "Analysis"]);
    }

    #[test]
    fn test_body_sections_never_empty() {
        let requirements = EssayRequirements {
            suggested_sections: vec!["Conclusion".to_string()],
            ..Default::default()
        };

        let sections = requirements.body_sections();
        assert_eq!(sections.len(), 4);
        assert_eq!(sections[0], "Background");
    }

    #[test]
    fn test_word_count_override_patterns() {
        assert_eq!(word_count_override("Please write 2,500 words"), Some(2500));
        assert_eq!(word_count_override("word count: 1500"), Some(1500));
        assert_eq!(word_count_override("1500 word count please"), Some(1500));
        assert_eq!(word_count_override("minimum 1800"), Some(1800));
        assert_eq!(word_count_override("at least 2000 on this topic"), Some(2000));
        assert_eq!(word_count_override("focus on the UK case study"), None);
    }

    #[test]
    fn test_word_budget_split() {
        let budget = WordBudget::derive(2000, 4);

        assert_eq!(budget.intro, 200);
        assert_eq!(budget.conclusion, 200);
        assert_eq!(budget.per_section, 400);
    }

    #[test]
    fn test_word_budget_with_no_sections() {
        let budget = WordBudget::derive(2000, 0);
        assert_eq!(budget.per_section, 500);
    }
}
