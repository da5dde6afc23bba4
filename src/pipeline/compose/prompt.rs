use std::fmt::Write;

use super::length::LengthPlan;
use super::types::{CompositionRequest, RefinementAnswer, SectionPlan, UploadedContent};
use crate::pipeline::evidence::EvidencePassage;

/// Evidence passages are cut to this many chars in prompts.
pub const EVIDENCE_EXCERPT_CHARS: usize = 800;

/// Uploaded documents are cut to this many chars in prompts.
pub const UPLOADED_EXCERPT_CHARS: usize = 2000;

const UNKNOWN_ANSWER_MARKERS: &[&str] = &[
    "je ne sais pas",
    "don't know",
    "dont know",
    "do not know",
    "not sure",
    "no idea",
];

const WRITER_SYSTEM_PROMPT: &str = "You are an expert writer producing long-form, well-sourced documents. \
Write fluent, developed prose. Ground factual statements in the supplied evidence and never invent sources.";

/// An answer that carries no information.
pub fn is_unknown_answer(answer: &str) -> bool {
    let a = answer.trim().to_lowercase();
    a.is_empty() || UNKNOWN_ANSWER_MARKERS.iter().any(|m| a.contains(m))
}

pub fn filter_answers(answers: &[RefinementAnswer]) -> Vec<&RefinementAnswer> {
    answers
        .iter()
        .filter(|a| !is_unknown_answer(&a.answer))
        .collect()
}

/// Analysis-depth guidance keyed on the page floor.
pub fn depth_instruction(plan: &LengthPlan) -> Option<&'static str> {
    if plan.min_pages >= 20 {
        Some(
            "REQUIRED DEPTH (very long document):\n\
             - Exhaustive, critical analysis of every aspect\n\
             - Historical context, current state and outlook\n\
             - Multiple viewpoints, arguments and counter-arguments\n\
             - Concrete examples and case studies",
        )
    } else if plan.min_pages >= 10 {
        Some(
            "REQUIRED DEPTH (long document):\n\
             - Thorough analysis of each aspect\n\
             - Detailed examples and nuanced discussion\n\
             - Explicit links between sections",
        )
    } else if plan.min_pages >= 5 {
        Some(
            "REQUIRED DEPTH (medium document):\n\
             - Detailed treatment of the essential points\n\
             - At least one concrete example per section",
        )
    } else {
        None
    }
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

fn push_profile(prompt: &mut String, request: &CompositionRequest<'_>) {
    let attributes = request.profile.attributes();
    if attributes.is_empty() {
        return;
    }
    prompt.push_str("<AUDIENCE>\n");
    for (label, value) in attributes {
        let _ = writeln!(prompt, "{label}: {value}");
    }
    prompt.push_str("</AUDIENCE>\n\n");
}

fn push_answers(prompt: &mut String, answers: &[RefinementAnswer]) {
    prompt.push_str("<CLARIFICATIONS>\n");
    let kept = filter_answers(answers);
    if kept.is_empty() {
        prompt.push_str("No additional detail was supplied.\n");
    }
    for a in kept {
        let _ = writeln!(prompt, "- {}: {}", a.question.trim(), a.answer.trim());
    }
    prompt.push_str("</CLARIFICATIONS>\n\n");
}

fn push_uploaded(prompt: &mut String, uploaded: &[UploadedContent]) {
    if uploaded.is_empty() {
        return;
    }
    prompt.push_str(
        "<PROVIDED_DOCUMENTS>\nThese documents were supplied by the requester. \
         They take PRIORITY over external evidence.\n",
    );
    for doc in uploaded {
        let _ = writeln!(
            prompt,
            "--- {} ---\n{}",
            doc.filename,
            excerpt(&doc.content, UPLOADED_EXCERPT_CHARS).trim()
        );
    }
    prompt.push_str("</PROVIDED_DOCUMENTS>\n\n");
}

fn push_evidence(prompt: &mut String, evidence: &[EvidencePassage]) {
    if evidence.is_empty() {
        return;
    }
    prompt.push_str("<EVIDENCE>\n");
    for passage in evidence {
        let _ = writeln!(
            prompt,
            "[{}] {} ({})\n{}\n",
            passage.number(),
            passage.citation.title,
            passage.citation.source_type.display_label(),
            excerpt(passage.text(), EVIDENCE_EXCERPT_CHARS).trim()
        );
    }
    prompt.push_str("</EVIDENCE>\n\n");
    prompt.push_str(
        "CITATION RULES:\n\
         - Every factual claim taken from the evidence MUST carry its bracket number, e.g. [1] or [2][3].\n\
         - Only use numbers listed in EVIDENCE. Never invent a citation.\n\n",
    );
}

fn push_context(prompt: &mut String, request: &CompositionRequest<'_>) {
    push_profile(prompt, request);
    let _ = writeln!(prompt, "REQUEST: \"{}\"\n", request.query.trim());
    push_answers(prompt, request.answers);
    push_uploaded(prompt, request.uploaded);
    push_evidence(prompt, request.evidence);
}

/// One-call prompt asking for the FULL DOCUMENT as JSON.
pub fn build_single_pass_prompt(request: &CompositionRequest<'_>, plan: &LengthPlan) -> String {
    let mut prompt = String::with_capacity(8 * 1024);
    prompt.push_str(WRITER_SYSTEM_PROMPT);
    prompt.push_str("\n\n");
    push_context(&mut prompt, request);

    let _ = write!(
        prompt,
        "TARGETS FOR THE FULL DOCUMENT ({label}):\n\
         - Between {min_s} and {max_s} sections\n\
         - Between {min_w} and {max_w} words in total ({min_c}-{max_c} characters)\n\
         - EACH section at least {wps} words\n\n",
        label = plan.display_label(),
        min_s = plan.min_sections,
        max_s = plan.max_sections,
        min_w = plan.min_words,
        max_w = plan.max_words,
        min_c = plan.min_chars,
        max_c = plan.max_chars,
        wps = plan.words_per_section,
    );
    if let Some(depth) = depth_instruction(plan) {
        prompt.push_str(depth);
        prompt.push_str("\n\n");
    }

    let _ = write!(
        prompt,
        "Reply with JSON only, in exactly this shape:\n\
         {{\n  \"title\": \"Document title\",\n  \"sections\": [\n    \
         {{\"title\": \"Section title\", \"content\": \"Section prose (at least {wps} words)\"}}\n  ]\n}}\n",
        wps = plan.words_per_section,
    );
    prompt
}

/// OUTLINE request for multi-pass generation.
pub fn build_plan_prompt(request: &CompositionRequest<'_>, plan: &LengthPlan) -> String {
    let mut prompt = String::with_capacity(2 * 1024);
    prompt.push_str(WRITER_SYSTEM_PROMPT);
    prompt.push_str("\n\n");
    push_profile(&mut prompt, request);
    let _ = write!(
        prompt,
        "Produce a detailed OUTLINE for a {label} document ({min_w}-{max_w} words) on:\n\
         \"{query}\"\n\n\
         The outline MUST contain between {min_s} and {max_s} main sections. \
         Each section will later be developed in {wps}+ words.\n\n\
         Reply with JSON only:\n\
         {{\n  \"title\": \"Document title\",\n  \"sections\": [\"Section 1\", \"Section 2\"]\n}}\n",
        label = plan.display_label(),
        min_w = plan.min_words,
        max_w = plan.max_words,
        query = request.query.trim(),
        min_s = plan.min_sections,
        max_s = plan.max_sections,
        wps = plan.words_per_section,
    );
    prompt
}

/// Prose-only request for one planned section.
pub fn build_section_prompt(
    request: &CompositionRequest<'_>,
    plan: &LengthPlan,
    outline: &[SectionPlan],
    index: usize,
) -> String {
    let mut prompt = String::with_capacity(8 * 1024);
    prompt.push_str(WRITER_SYSTEM_PROMPT);
    prompt.push_str("\n\n");
    push_context(&mut prompt, request);

    let title = outline.get(index).map(|s| s.title.as_str()).unwrap_or_default();
    let _ = write!(
        prompt,
        "SECTION TO WRITE: \"{title}\" (section {n} of {total})\n",
        n = index + 1,
        total = outline.len(),
    );
    let others: Vec<&str> = outline
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != index)
        .map(|(_, s)| s.title.as_str())
        .collect();
    if !others.is_empty() {
        let _ = writeln!(
            prompt,
            "Other parts of the document (do not repeat their content): {}",
            others.join("; ")
        );
    }
    let _ = write!(
        prompt,
        "\nRULES:\n\
         - At least {wps} words\n\
         - Flowing paragraphs only, NO bulleted lists\n\
         - Develop each idea with explanations, concrete examples and nuance\n\n\
         Reply with the section prose only: no heading, no JSON.\n",
        wps = plan.words_per_section,
    );
    prompt
}

/// Paragraph used when one section's generation fails.
pub fn section_placeholder(title: &str, query: &str) -> String {
    format!(
        "This section covers {} in the context of: {}.",
        title.to_lowercase(),
        query.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::compose::length::{LengthLabel, LengthPlanner};
    use crate::pipeline::compose::types::UserProfile;
    use crate::pipeline::evidence::{Citation, EvidenceChunk, ScoredEvidence};
    use crate::pipeline::sources::{
        SourceLocator, SourceMetadata, SourceOrigin, SourceType,
    };

    fn passage(number: usize, text: &str) -> EvidencePassage {
        let metadata = SourceMetadata {
            origin: SourceOrigin::External,
            title: format!("Source {number}"),
            locator: SourceLocator::Url("https://fr.wikipedia.org/wiki/X".into()),
            reliability_score: 0.7,
            source_type: SourceType::Encyclopedia,
            domain: Some("wikipedia.org".into()),
            fetched_at: None,
        };
        EvidencePassage {
            citation: Citation {
                number,
                title: metadata.title.clone(),
                locator: metadata.locator.clone(),
                source_type: metadata.source_type,
                origin: metadata.origin,
                domain: metadata.domain.clone(),
                reliability_score: 0.7,
            },
            evidence: ScoredEvidence {
                chunk: EvidenceChunk {
                    text: text.into(),
                    source_id: "s".into(),
                    char_offset: 0,
                    metadata,
                },
                lexical_score: 1.0,
                reliability_score: 0.7,
                final_score: 0.5,
            },
        }
    }

    fn answer(q: &str, a: &str) -> RefinementAnswer {
        RefinementAnswer {
            question: q.into(),
            answer: a.into(),
        }
    }

    #[test]
    fn unknown_answers_are_dropped() {
        let answers = vec![
            answer("Public ?", "Je ne sais pas"),
            answer("Angle ?", "Économique"),
            answer("Ton ?", "  "),
            answer("Sources ?", "I don't know"),
        ];
        let kept = filter_answers(&answers);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].answer, "Économique");
    }

    #[test]
    fn single_pass_prompt_carries_constraints_and_citation_rules() {
        let profile = UserProfile::default();
        let evidence = vec![passage(1, "La santé publique."), passage(2, "L'IA en médecine.")];
        let answers = vec![answer("Public ?", "je ne sais pas")];
        let request = CompositionRequest {
            query: "impact de l'IA sur la santé",
            profile: &profile,
            evidence: &evidence,
            answers: &answers,
            uploaded: &[],
        };
        let plan = LengthPlanner::plan_for(LengthLabel::Medium);
        let prompt = build_single_pass_prompt(&request, &plan);

        assert!(prompt.contains("Between 5 and 8 sections"));
        assert!(prompt.contains("at least 600 words"));
        assert!(prompt.contains("[1] Source 1"));
        assert!(prompt.contains("CITATION RULES"));
        assert!(prompt.contains("No additional detail was supplied."));
        assert!(prompt.contains("\"sections\""));
        assert!(prompt.contains("REQUIRED DEPTH (medium document)"));
        assert!(!prompt.contains("PROVIDED_DOCUMENTS"));
    }

    #[test]
    fn no_citation_rules_without_evidence() {
        let profile = UserProfile::default();
        let request = CompositionRequest {
            query: "q",
            profile: &profile,
            evidence: &[],
            answers: &[],
            uploaded: &[],
        };
        let plan = LengthPlanner::plan_for(LengthLabel::Short);
        let prompt = build_single_pass_prompt(&request, &plan);
        assert!(!prompt.contains("CITATION RULES"));
        assert!(depth_instruction(&plan).is_none());
    }

    #[test]
    fn uploaded_content_is_prioritized_and_capped() {
        let profile = UserProfile::default();
        let uploaded = vec![UploadedContent {
            filename: "notes.txt".into(),
            content: "x".repeat(5000),
        }];
        let request = CompositionRequest {
            query: "q",
            profile: &profile,
            evidence: &[],
            answers: &[],
            uploaded: &uploaded,
        };
        let prompt = build_single_pass_prompt(&request, &LengthPlanner::plan_for(LengthLabel::Short));
        assert!(prompt.contains("PRIORITY over external evidence"));
        assert!(prompt.contains(&"x".repeat(UPLOADED_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"x".repeat(UPLOADED_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn evidence_excerpts_are_capped() {
        let profile = UserProfile::default();
        let evidence = vec![passage(1, &"é".repeat(1000))];
        let request = CompositionRequest {
            query: "q",
            profile: &profile,
            evidence: &evidence,
            answers: &[],
            uploaded: &[],
        };
        let prompt = build_single_pass_prompt(&request, &LengthPlanner::plan_for(LengthLabel::Short));
        assert!(prompt.contains(&"é".repeat(EVIDENCE_EXCERPT_CHARS)));
        assert!(!prompt.contains(&"é".repeat(EVIDENCE_EXCERPT_CHARS + 1)));
    }

    #[test]
    fn section_prompt_is_prose_only_and_names_siblings() {
        let profile = UserProfile {
            role: Some("Teacher".into()),
            ..UserProfile::default()
        };
        let request = CompositionRequest {
            query: "climat",
            profile: &profile,
            evidence: &[],
            answers: &[],
            uploaded: &[],
        };
        let plan = LengthPlanner::plan_for(LengthLabel::Long);
        let outline = vec![SectionPlan::new("Origines"), SectionPlan::new("Effets")];
        let prompt = build_section_prompt(&request, &plan, &outline, 1);

        assert!(prompt.contains("SECTION TO WRITE: \"Effets\" (section 2 of 2)"));
        assert!(prompt.contains("do not repeat their content): Origines"));
        assert!(prompt.contains("At least 700 words"));
        assert!(prompt.contains("NO bulleted lists"));
        assert!(prompt.contains("Role: Teacher"));
        assert!(!prompt.contains("\"sections\""));
    }

    #[test]
    fn profile_field_and_objective_reach_every_writing_prompt() {
        let profile = UserProfile {
            domain: Some("oceanography".into()),
            expertise: Some("beginner".into()),
            education: Some("high school".into()),
            objective: Some("prepare a class presentation".into()),
            ..UserProfile::default()
        };
        let request = CompositionRequest {
            query: "les courants marins",
            profile: &profile,
            evidence: &[],
            answers: &[],
            uploaded: &[],
        };
        let plan = LengthPlanner::plan_for(LengthLabel::Long);
        let outline = vec![SectionPlan::new("Origines"), SectionPlan::new("Effets")];

        for prompt in [
            build_single_pass_prompt(&request, &plan),
            build_plan_prompt(&request, &plan),
            build_section_prompt(&request, &plan, &outline, 0),
        ] {
            assert!(prompt.contains("Field: oceanography"));
            assert!(prompt.contains("Expertise: beginner"));
            assert!(prompt.contains("Education: high school"));
            assert!(prompt.contains("Objective: prepare a class presentation"));
        }
    }

    #[test]
    fn plan_prompt_bounds_section_count() {
        let profile = UserProfile::default();
        let request = CompositionRequest {
            query: "climat",
            profile: &profile,
            evidence: &[],
            answers: &[],
            uploaded: &[],
        };
        let prompt = build_plan_prompt(&request, &LengthPlanner::plan_for(LengthLabel::Long));
        assert!(prompt.contains("OUTLINE"));
        assert!(prompt.contains("between 8 and 15 main sections"));
    }
}
