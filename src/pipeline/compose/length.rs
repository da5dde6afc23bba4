use serde::Serialize;

use super::types::RefinementAnswer;

/// One rendered page (A4, 11pt, single spacing) in chars.
pub const CHARS_PER_PAGE: usize = 3500;

/// Documents of at least this many pages are written section by section.
pub const MULTI_PASS_MIN_PAGES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthLabel {
    Short,
    Medium,
    Long,
    VeryLong,
}

impl LengthLabel {
    /// Recognize a declared length. Page ranges win over words.
    pub fn parse(preference: &str) -> Option<Self> {
        let p = preference.trim().to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| p.contains(n));

        if has(&["20-40", "20 à 40", "20 a 40", "20 to 40"]) {
            Some(Self::VeryLong)
        } else if has(&["10-20", "10 à 20", "10 a 20", "10 to 20"]) {
            Some(Self::Long)
        } else if has(&["5-10", "5 à 10", "5 a 10", "5 to 10"]) {
            Some(Self::Medium)
        } else if has(&["1-5", "1 à 5", "1 a 5", "1 to 5"]) {
            Some(Self::Short)
        } else if has(&["very long", "very_long", "verylong", "très long", "tres long"]) {
            Some(Self::VeryLong)
        } else if has(&["long"]) {
            Some(Self::Long)
        } else if has(&["medium", "moyen"]) {
            Some(Self::Medium)
        } else if has(&["short", "court"]) {
            Some(Self::Short)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    SinglePass,
    MultiPass,
}

/// Size targets for one document, fixed for the whole composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LengthPlan {
    pub label: LengthLabel,
    pub min_pages: usize,
    pub max_pages: usize,
    pub min_chars: usize,
    pub max_chars: usize,
    pub min_words: usize,
    pub max_words: usize,
    pub min_sections: usize,
    pub max_sections: usize,
    pub words_per_section: usize,
    pub strategy: GenerationStrategy,
}

impl LengthPlan {
    /// Human label, e.g. "10-20 pages".
    pub fn display_label(&self) -> String {
        format!("{}-{} pages", self.min_pages, self.max_pages)
    }

    pub fn is_multi_pass(&self) -> bool {
        self.strategy == GenerationStrategy::MultiPass
    }
}

/// Maps a declared length onto section and word targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct LengthPlanner;

impl LengthPlanner {
    pub const DEFAULT_LABEL: LengthLabel = LengthLabel::Medium;

    pub fn plan(&self, preference: Option<&str>) -> LengthPlan {
        let label = preference
            .and_then(LengthLabel::parse)
            .unwrap_or(Self::DEFAULT_LABEL);
        let plan = Self::plan_for(label);
        tracing::debug!(
            label = %plan.display_label(),
            sections_min = plan.min_sections,
            sections_max = plan.max_sections,
            strategy = ?plan.strategy,
            "Length plan"
        );
        plan
    }

    pub fn plan_for(label: LengthLabel) -> LengthPlan {
        // (pages, words, sections, words per section)
        let ((min_pages, max_pages), (min_words, max_words), (min_sections, max_sections), wps) =
            match label {
                LengthLabel::Short => ((1, 5), (550, 2750), (3, 5), 450),
                LengthLabel::Medium => ((5, 10), (2750, 5500), (5, 8), 600),
                LengthLabel::Long => ((10, 20), (5500, 11000), (8, 15), 700),
                LengthLabel::VeryLong => ((20, 40), (11000, 22000), (15, 25), 850),
            };
        LengthPlan {
            label,
            min_pages,
            max_pages,
            min_chars: min_pages * CHARS_PER_PAGE,
            max_chars: max_pages * CHARS_PER_PAGE,
            min_words,
            max_words,
            min_sections,
            max_sections,
            words_per_section: wps,
            strategy: if min_pages >= MULTI_PASS_MIN_PAGES {
                GenerationStrategy::MultiPass
            } else {
                GenerationStrategy::SinglePass
            },
        }
    }
}

/// The answer to the "how many pages" question, if one was asked.
pub fn length_preference_from_answers(answers: &[RefinementAnswer]) -> Option<&str> {
    answers
        .iter()
        .find(|a| {
            let q = a.question.to_lowercase();
            q.contains("pages") || q.contains("combien") || q.contains("how many")
        })
        .map(|a| a.answer.as_str())
}
