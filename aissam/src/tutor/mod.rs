//! Subject-scoped prompt assembly for the tutoring response generator.
//!
//! Everything here is a pure function of its inputs; the HTTP client that
//! actually talks to the model lives in the server crate.

mod prompts;

/// The closed set of tutoring subjects. Unknown catalog names resolve to
/// [`Subject::Math`], whose template doubles as the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subject {
    Math,
    English,
    Korean,
    SocialStudies,
    Science,
}

impl Subject {
    pub const ALL: [Subject; 5] = [
        Subject::Math,
        Subject::English,
        Subject::Korean,
        Subject::SocialStudies,
        Subject::Science,
    ];

    pub fn from_name(name: &str) -> Option<Subject> {
        match name {
            "수학" => Some(Subject::Math),
            "영어" => Some(Subject::English),
            "국어" => Some(Subject::Korean),
            "사회탐구" => Some(Subject::SocialStudies),
            "과학탐구" => Some(Subject::Science),
            _ => None,
        }
    }

    /// Catalog name to subject, falling back to the default template.
    pub fn resolve(name: &str) -> Subject {
        Subject::from_name(name).unwrap_or(Subject::Math)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Subject::Math => "수학",
            Subject::English => "영어",
            Subject::Korean => "국어",
            Subject::SocialStudies => "사회탐구",
            Subject::Science => "과학탐구",
        }
    }

    /// The full instruction template for this subject.
    pub fn template(&self) -> &'static str {
        match self {
            Subject::Math => prompts::MATH_TEMPLATE,
            Subject::English => prompts::ENGLISH_TEMPLATE,
            Subject::Korean => prompts::KOREAN_TEMPLATE,
            Subject::SocialStudies => prompts::SOCIAL_TEMPLATE,
            Subject::Science => prompts::SCIENCE_TEMPLATE,
        }
    }

    /// Affect-bearing phrases the subject's template reacts to with
    /// encouragement instead of a refusal.
    pub fn encouragement_cues(&self) -> &'static [&'static str] {
        match self {
            Subject::Math => &["수학이 어려워요", "공부가 힘들어요"],
            Subject::English => &["영어가 어려워요", "공부가 힘들어요"],
            Subject::Korean => &["국어가 어려워요", "공부가 힘들어요"],
            Subject::SocialStudies => &["사회가 어려워요", "공부가 힘들어요"],
            Subject::Science => &["과학이 어려워요", "공부가 힘들어요"],
        }
    }
}

/// One prior turn of a session, as fed into prompt assembly.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub content: String,
    pub is_user: bool,
}

impl TranscriptEntry {
    pub fn new(content: impl Into<String>, is_user: bool) -> Self {
        TranscriptEntry {
            content: content.into(),
            is_user,
        }
    }
}

/// Render prior turns as `speaker: text` lines inside the conversation
/// frame. Turns with no text (image-only) contribute nothing; when nothing
/// renders, the frame is omitted entirely.
pub fn render_transcript(history: &[TranscriptEntry]) -> String {
    let mut lines = String::new();
    for entry in history {
        let text = entry.content.trim();
        if text.is_empty() {
            continue;
        }
        let speaker = if entry.is_user { "학생" } else { "AI 선생님" };
        lines.push_str(speaker);
        lines.push_str(": ");
        lines.push_str(text);
        lines.push('\n');
    }

    if lines.is_empty() {
        String::new()
    } else {
        format!(
            "{}{}{}",
            prompts::TRANSCRIPT_HEADER,
            lines,
            prompts::TRANSCRIPT_FOOTER
        )
    }
}

/// Compose the full generation prompt: subject template, framed transcript,
/// the image or text guidance block, then the student's question.
pub fn build_prompt(
    subject: Subject,
    question: &str,
    history: &[TranscriptEntry],
    has_image: bool,
) -> String {
    let template = subject.template();
    let context = render_transcript(history);

    if has_image {
        format!(
            "{template}\n\n{context}{guidance}\n\n학생 질문: {question}\n\n{closing}",
            guidance = prompts::IMAGE_GUIDANCE,
            closing = prompts::IMAGE_CLOSING,
        )
    } else {
        format!(
            "{template}\n\n{context}{guidance}\n\n학생 질문: {question}",
            guidance = prompts::TEXT_GUIDANCE,
        )
    }
}

/// Prompt for the weak-topic analysis over a student's recent questions.
/// Needs at least 3 questions; only the last 10 are considered.
pub fn build_pattern_prompt(questions: &[String]) -> Option<String> {
    if questions.len() < 3 {
        return None;
    }

    let start = questions.len().saturating_sub(10);
    let listed = questions[start..]
        .iter()
        .map(|q| format!("- {q}"))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "{}{}{}",
        prompts::PATTERN_HEADER,
        listed,
        prompts::PATTERN_FOOTER
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve_to_their_subject() {
        assert_eq!(Subject::resolve("수학"), Subject::Math);
        assert_eq!(Subject::resolve("영어"), Subject::English);
        assert_eq!(Subject::resolve("국어"), Subject::Korean);
        assert_eq!(Subject::resolve("사회탐구"), Subject::SocialStudies);
        assert_eq!(Subject::resolve("과학탐구"), Subject::Science);
    }

    #[test]
    fn display_names_roundtrip_through_resolve() {
        for subject in Subject::ALL {
            assert_eq!(Subject::resolve(subject.display_name()), subject);
        }
    }

    #[test]
    fn unknown_name_falls_back_to_math_deterministically() {
        assert_eq!(Subject::resolve("체육"), Subject::Math);
        assert_eq!(Subject::resolve(""), Subject::Math);
        assert_eq!(
            Subject::resolve("음악").template(),
            Subject::Math.template()
        );
    }

    #[test]
    fn every_template_carries_refusal_and_cues() {
        for subject in Subject::ALL {
            let template = subject.template();
            assert!(
                template.contains("관련된 질문만 답변해드릴 수 있습니다"),
                "{subject:?} template is missing its refusal sentence"
            );
            for cue in subject.encouragement_cues() {
                assert!(
                    template.contains(cue),
                    "{subject:?} template is missing cue {cue:?}"
                );
            }
        }
    }

    #[test]
    fn transcript_skips_image_only_turns() {
        let history = vec![
            TranscriptEntry::new("이차방정식이 뭐예요?", true),
            TranscriptEntry::new("", true),
            TranscriptEntry::new("   ", false),
            TranscriptEntry::new("근의 공식부터 살펴봅시다.", false),
        ];
        let rendered = render_transcript(&history);
        assert!(rendered.contains("학생: 이차방정식이 뭐예요?"));
        assert!(rendered.contains("AI 선생님: 근의 공식부터 살펴봅시다."));
        assert_eq!(rendered.matches(": ").count(), 2);
    }

    #[test]
    fn transcript_frame_omitted_when_nothing_renders() {
        assert_eq!(render_transcript(&[]), "");
        let image_only = vec![TranscriptEntry::new("", true)];
        assert_eq!(render_transcript(&image_only), "");
    }

    #[test]
    fn text_prompt_embeds_template_context_and_question() {
        let history = vec![TranscriptEntry::new("x^2은 뭐예요?", true)];
        let prompt = build_prompt(Subject::Math, "그럼 x^3은요?", &history, false);
        assert!(prompt.starts_with(Subject::Math.template()));
        assert!(prompt.contains("=== 이전 대화 내용 ==="));
        assert!(prompt.contains("학생: x^2은 뭐예요?"));
        assert!(prompt.ends_with("학생 질문: 그럼 x^3은요?"));
    }

    #[test]
    fn image_prompt_instructs_immediate_solving() {
        let prompt = build_prompt(Subject::Science, "이 문제 풀어주세요", &[], true);
        assert!(prompt.contains("즉시 풀이 시작"));
        assert!(prompt.ends_with("이미지의 문제를 분석하고 즉시 풀이를 시작하세요."));
    }

    #[test]
    fn pattern_prompt_requires_three_questions() {
        let two = vec!["q1".to_string(), "q2".to_string()];
        assert!(build_pattern_prompt(&two).is_none());

        let three = vec!["q1".to_string(), "q2".to_string(), "q3".to_string()];
        assert!(build_pattern_prompt(&three).is_some());
    }

    #[test]
    fn pattern_prompt_keeps_only_last_ten() {
        let questions: Vec<String> = (1..=12).map(|i| format!("질문 {i}")).collect();
        let prompt = build_pattern_prompt(&questions).unwrap();
        assert!(!prompt.contains("- 질문 2\n"));
        assert!(prompt.contains("- 질문 3"));
        assert!(prompt.contains("- 질문 12"));
    }
}
