//! Evidence card rendering.
//!
//! A card is the denormalised text of one selected paper, the exact string
//! that gets embedded and stored.

use chrono::Utc;
use evidex_common::{CategoryConfig, ScoredCandidate};
use evidex_db::EvidenceCard;

/// Abstract excerpt length, in characters.
pub const ABSTRACT_EXCERPT_CHARS: usize = 1200;

pub const TRUNCATION_MARKER: &str = "…[truncated]";

/// Subtopics whose cards carry a fixed safety note.
const SAFETY_CAVEATS: &[(&[&str], &str)] = &[
    (
        &["ocd_harm", "harm_ocd", "intrusive_thoughts"],
        "Safety note: intrusive harm-related thoughts in OCD are ego-dystonic and are not \
         a sign of intent. Do not encourage reassurance seeking or checking; refer to a \
         clinician experienced in ERP.",
    ),
    (
        &["bipolar", "mania", "bipolar_mania"],
        "Safety note: signs of mania (little need for sleep, racing thoughts, risky \
         behaviour) warrant prompt contact with a prescriber. Never suggest stopping or \
         changing mood-stabilising medication.",
    ),
    (
        &["ptsd", "trauma", "ptsd_trauma"],
        "Safety note: do not prompt detailed recounting of traumatic events outside a \
         clinical setting. Offer grounding and refer to trauma-focused care.",
    ),
    (
        &["self_harm", "suicidality", "suicide", "suicide_prevention"],
        "Safety note: if there is any risk of self-harm or suicide, direct the person to \
         local emergency services or a crisis line immediately.",
    ),
    (
        &["eating_disorders", "eating_disorder", "anorexia", "bulimia", "binge_eating"],
        "Safety note: avoid numbers for weight, calories or BMI. Eating disorders carry \
         serious medical risk; recommend assessment by a specialist team.",
    ),
];

fn normalise_subtopic(subtopic: &str) -> String {
    subtopic
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Caveat text for a safety-sensitive subtopic.
pub fn safety_caveat(subtopic: &str) -> Option<&'static str> {
    let key = normalise_subtopic(subtopic);
    SAFETY_CAVEATS
        .iter()
        .find(|(keys, _)| keys.contains(&key.as_str()))
        .map(|(_, text)| *text)
}

/// First `max_chars` characters of `text`, with the truncation marker when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", text[..cut].trim_end(), TRUNCATION_MARKER),
    }
}

/// Renders the card text for one selected paper.
pub fn render_card(category_name: &str, scored: &ScoredCandidate, abstract_text: Option<&str>) -> String {
    let c = &scored.candidate;
    let year = c
        .publication_year()
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let citations = c
        .citations
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let types = if c.publication_types.is_empty() {
        "n/a".to_string()
    } else {
        c.publication_types.join(", ")
    };

    let mut lines = vec![
        format!("[{} › {}]", category_name, c.subtopic),
        format!("Title: {}", c.title),
        format!("Year: {year} | Citations: {citations}"),
        format!("Publication types: {types}"),
    ];
    if let Some(journal) = &c.journal {
        lines.push(format!("Journal: {journal}"));
    }
    if !c.authors.is_empty() {
        lines.push(format!("Authors: {}", c.authors));
    }
    match abstract_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => lines.push(format!("Abstract: {}", excerpt(text, ABSTRACT_EXCERPT_CHARS))),
        None => lines.push("Abstract: not available".to_string()),
    }
    if let Some(caveat) = safety_caveat(&c.subtopic) {
        lines.push(caveat.to_string());
    }
    lines.join("\n")
}

/// The persisted record for a rendered, embedded card.
pub fn evidence_card(
    category: &CategoryConfig,
    scored: &ScoredCandidate,
    card_text: String,
    embedding: Vec<f32>,
) -> EvidenceCard {
    let c = &scored.candidate;
    EvidenceCard {
        pmid: c.pmid.clone(),
        doi: c.doi.clone(),
        category_id: category.id.clone(),
        subtopic: c.subtopic.clone(),
        title: c.title.clone(),
        authors: c.authors.clone(),
        journal: c.journal.clone(),
        pub_date: c.pub_date.clone(),
        publication_types: c.publication_types.clone(),
        citations: c.citations,
        open_access: c.open_access,
        concepts: c.concepts.clone(),
        quality_score: scored.score(),
        card_text,
        embedding,
        imported_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidex_common::CandidateRecord;
    use pretty_assertions::assert_eq;

    fn scored(subtopic: &str) -> ScoredCandidate {
        let mut c = CandidateRecord::new("111", subtopic);
        c.title = "CBT for GAD".into();
        c.pub_date = Some("2021 Mar".into());
        c.citations = Some(154);
        c.publication_types = vec!["Meta-Analysis".into()];
        c.journal = Some("J Anxiety Disord".into());
        c.authors = "Smith J, Doe A".into();
        ScoredCandidate::new(c, 1.2)
    }

    #[test]
    fn test_render_card_layout() {
        let card = render_card("Anxiety Disorders", &scored("gad"), Some("Short abstract."));
        assert_eq!(
            card,
            "[Anxiety Disorders › gad]\n\
             Title: CBT for GAD\n\
             Year: 2021 | Citations: 154\n\
             Publication types: Meta-Analysis\n\
             Journal: J Anxiety Disord\n\
             Authors: Smith J, Doe A\n\
             Abstract: Short abstract."
        );
    }

    #[test]
    fn test_long_abstract_is_truncated_by_chars() {
        let long = "é".repeat(ABSTRACT_EXCERPT_CHARS + 50);
        let card = render_card("Anxiety", &scored("gad"), Some(&long));
        let abstract_line = card.lines().find(|l| l.starts_with("Abstract: ")).unwrap();
        assert!(abstract_line.ends_with(TRUNCATION_MARKER));
        let body = abstract_line.trim_start_matches("Abstract: ").trim_end_matches(TRUNCATION_MARKER);
        assert_eq!(body.chars().count(), ABSTRACT_EXCERPT_CHARS);
    }

    #[test]
    fn test_exact_length_is_not_marked() {
        let text = "a".repeat(ABSTRACT_EXCERPT_CHARS);
        assert_eq!(excerpt(&text, ABSTRACT_EXCERPT_CHARS), text);
    }

    #[test]
    fn test_missing_abstract_and_unknown_citations() {
        let mut s = scored("gad");
        s.candidate.citations = None;
        let card = render_card("Anxiety", &s, None);
        assert!(card.contains("Citations: unknown"));
        assert!(card.contains("Abstract: not available"));
    }

    #[test]
    fn test_safety_caveat_appended_for_sensitive_subtopic() {
        let card = render_card("Mood", &scored("Bipolar-Mania"), None);
        assert!(card.ends_with(safety_caveat("bipolar_mania").unwrap()));
        assert!(safety_caveat("self-harm").is_some());
        assert!(safety_caveat("gad").is_none());
    }

    #[test]
    fn test_evidence_card_copies_fields() {
        let s = scored("gad");
        let category = evidex_common::CategoryConfig {
            id: "anxiety".into(),
            name: "Anxiety".into(),
            target_count: 1,
            sub_queries: vec![],
            min_citations: 0,
            date_ranges: vec![],
        };
        let card = evidence_card(&category, &s, "text".into(), vec![0.5; 3]);
        assert_eq!(card.pmid, "111");
        assert_eq!(card.category_id, "anxiety");
        assert_eq!(card.citations, Some(154));
        assert_eq!(card.quality_score, 1.2);
        assert_eq!(card.embedding.len(), 3);
    }
}
