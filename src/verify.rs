//! Answer checking.
//!
//! A user's answer is first compared with the extracted one after
//! normalisation (trim, lowercase, collapse whitespace). Only when that fails
//! and a reference answer exists is the model asked whether the two mean the
//! same thing. Each such question costs one verification call.

use crate::error::{CallKind, QuizError};
use crate::pipeline::payload::ExtractionRequest;
use crate::pipeline::reply::{strip_code_fence, ExtractionResult, QnaPair};
use crate::prompts;
use crate::session::Session;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Result of checking one answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// The user left the answer empty.
    Unanswered,
    /// Normalised text equals the extracted answer.
    Match,
    /// The material had no answer to compare against.
    NoReference,
    /// The model judged the answer.
    Judged { equivalent: bool, explanation: String },
}

impl Verdict {
    /// `Some(true)` for a correct answer, `Some(false)` for a wrong one,
    /// `None` when there was nothing to decide.
    pub fn is_correct(&self) -> Option<bool> {
        match self {
            Verdict::Match => Some(true),
            Verdict::Judged { equivalent, .. } => Some(*equivalent),
            Verdict::Unanswered | Verdict::NoReference => None,
        }
    }
}

/// The user's answers keyed by question index. Lives for one checking step.
pub type UserAnswers = BTreeMap<usize, String>;

/// Per-question outcome of [`check_all`].
#[derive(Debug)]
pub enum CheckOutcome {
    Verdict(Verdict),
    /// The verification call for this question failed.
    Error(QuizError),
}

impl CheckOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self, CheckOutcome::Error(_))
    }
}

/// Trim, lowercase, and collapse runs of whitespace to one space.
pub fn normalize_answer(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check one answer, calling the model only when the strings differ.
pub async fn check_answer(
    session: &Session,
    pair: &QnaPair,
    user_answer: &str,
) -> Result<Verdict, QuizError> {
    let given = normalize_answer(user_answer);
    if given.is_empty() {
        return Ok(Verdict::Unanswered);
    }

    let Some(expected) = pair.answer.as_deref() else {
        return Ok(Verdict::NoReference);
    };

    if given == normalize_answer(expected) {
        debug!("Exact match for {:?}", pair.question);
        return Ok(Verdict::Match);
    }

    let request = ExtractionRequest::from_text(prompts::verification_prompt(
        &pair.question,
        expected,
        user_answer.trim(),
    ));
    let reply = session
        .provider()
        .complete(CallKind::Verification, &request)
        .await?;

    let (equivalent, explanation) = parse_judgement(&reply)?;
    Ok(Verdict::Judged {
        equivalent,
        explanation,
    })
}

/// Check every answered question in index order.
///
/// Indices past the end of `result.qna` are ignored. A failed verification
/// call is recorded for its question and the remaining checks still run.
pub async fn check_all(
    session: &Session,
    result: &ExtractionResult,
    answers: &UserAnswers,
) -> Vec<(usize, CheckOutcome)> {
    let mut outcomes = Vec::with_capacity(answers.len());
    for (&idx, answer) in answers {
        let Some(pair) = result.qna.get(idx) else {
            warn!("Ignoring answer for unknown question {}", idx);
            continue;
        };
        let outcome = match check_answer(session, pair, answer).await {
            Ok(v) => CheckOutcome::Verdict(v),
            Err(e) => {
                warn!("Could not verify answer {}: {}", idx + 1, e);
                CheckOutcome::Error(e)
            }
        };
        outcomes.push((idx, outcome));
    }

    let failed = outcomes.iter().filter(|(_, o)| o.is_error()).count();
    info!("Checked {} answers ({} failed)", outcomes.len(), failed);
    outcomes
}

#[derive(Deserialize)]
struct Judgement {
    equivalent: serde_json::Value,
    #[serde(default)]
    explanation: Option<String>,
}

/// Read the verification reply.
///
/// The prompt asks for `{"equivalent": bool, "explanation": "..."}`. A reply
/// that instead starts with yes/no (or true/false, correct/incorrect) is
/// accepted, with the rest of the text as the explanation.
pub fn parse_judgement(reply: &str) -> Result<(bool, String), QuizError> {
    let body = strip_code_fence(reply);

    if let Ok(j) = serde_json::from_str::<Judgement>(body) {
        let equivalent = match &j.equivalent {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => word_verdict(s),
            _ => None,
        };
        if let Some(equivalent) = equivalent {
            return Ok((equivalent, j.explanation.unwrap_or_default().trim().to_string()));
        }
    }

    if body.starts_with('{') {
        return Err(QuizError::ParseFailed {
            call: CallKind::Verification,
            detail: format!("verification reply lacks a boolean \"equivalent\": {}", preview(body)),
        });
    }

    let first = body
        .split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .unwrap_or_default();
    match word_verdict(first) {
        Some(equivalent) => {
            let rest = body[body.find(first).map_or(0, |i| i + first.len())..]
                .trim_start_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
                .trim()
                .to_string();
            Ok((equivalent, rest))
        }
        None => Err(QuizError::ParseFailed {
            call: CallKind::Verification,
            detail: format!("unrecognised verification reply: {}", preview(body)),
        }),
    }
}

fn word_verdict(word: &str) -> Option<bool> {
    match word.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "correct" | "equivalent" => Some(true),
        "no" | "false" | "incorrect" | "wrong" => Some(false),
        _ => None,
    }
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ChatProvider;
    use crate::config::ExtractorConfig;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};

    /// Replies from a queue and records the kind of each call.
    struct Scripted {
        replies: Mutex<Vec<Result<String, u16>>>,
        calls: Mutex<Vec<CallKind>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, u16>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .rev()
                        .map(|r| r.map(str::to_string))
                        .collect(),
                ),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatProvider for Scripted {
        fn complete<'a>(
            &'a self,
            call: CallKind,
            _request: &'a ExtractionRequest,
        ) -> BoxFuture<'a, Result<String, QuizError>> {
            self.calls.lock().unwrap().push(call);
            let next = self.replies.lock().unwrap().pop();
            let out = match next {
                Some(Ok(s)) => Ok(s),
                Some(Err(status)) => Err(QuizError::Api {
                    call,
                    message: format!("upstream error {status}"),
                }),
                None => Err(QuizError::EmptyReply { call }),
            };
            async move { out }.boxed()
        }
    }

    fn session(provider: Arc<Scripted>) -> Session {
        let config = ExtractorConfig::builder().provider(provider).build().unwrap();
        Session::open(Some("sk-test"), config).unwrap()
    }

    fn pair(q: &str, a: Option<&str>) -> QnaPair {
        QnaPair {
            question: q.into(),
            answer: a.map(str::to_string),
        }
    }

    #[test]
    fn normalisation() {
        assert_eq!(normalize_answer("  Paris "), "paris");
        assert_eq!(normalize_answer("New\t  York\nCity"), "new york city");
        assert_eq!(normalize_answer("   "), "");
    }

    #[tokio::test]
    async fn trailing_space_matches_without_call() {
        let provider = Scripted::new(vec![]);
        let s = session(provider.clone());
        let v = check_answer(&s, &pair("Capital of France?", Some("Paris")), "Paris ")
            .await
            .unwrap();
        assert_eq!(v, Verdict::Match);
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_answer_is_unanswered() {
        let provider = Scripted::new(vec![]);
        let s = session(provider.clone());
        let v = check_answer(&s, &pair("Q?", Some("A")), "  ").await.unwrap();
        assert_eq!(v, Verdict::Unanswered);
        assert_eq!(v.is_correct(), None);
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn no_reference_makes_no_call() {
        let provider = Scripted::new(vec![]);
        let s = session(provider.clone());
        let v = check_answer(&s, &pair("Q?", None), "something").await.unwrap();
        assert_eq!(v, Verdict::NoReference);
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn mismatch_asks_the_model() {
        let provider = Scripted::new(vec![Ok(
            r#"{"equivalent": true, "explanation": "Same city."}"#,
        )]);
        let s = session(provider.clone());
        let v = check_answer(&s, &pair("Capital of France?", Some("Paris")), "paris, france")
            .await
            .unwrap();
        assert_eq!(
            v,
            Verdict::Judged {
                equivalent: true,
                explanation: "Same city.".into()
            }
        );
        assert_eq!(
            provider.calls.lock().unwrap().as_slice(),
            [CallKind::Verification]
        );
    }

    #[tokio::test]
    async fn check_all_keeps_going_after_a_failure() {
        let provider = Scripted::new(vec![Err(502), Ok("No. Those are different planets.")]);
        let s = session(provider.clone());
        let result = ExtractionResult {
            passage: String::new(),
            qna: vec![
                pair("Largest planet?", Some("Jupiter")),
                pair("Closest planet to the sun?", Some("Mercury")),
                pair("Red planet?", Some("Mars")),
            ],
        };
        let answers: UserAnswers = [
            (0, "Saturn".to_string()),
            (1, "Venus".to_string()),
            (2, "mars".to_string()),
            (9, "ignored".to_string()),
        ]
        .into_iter()
        .collect();

        let outcomes = check_all(&s, &result, &answers).await;
        assert_eq!(outcomes.len(), 3);

        match &outcomes[0] {
            (0, CheckOutcome::Error(e)) => {
                assert_eq!(e.call_kind(), Some(CallKind::Verification))
            }
            other => panic!("unexpected: {other:?}"),
        }
        match &outcomes[1] {
            (1, CheckOutcome::Verdict(Verdict::Judged { equivalent, explanation })) => {
                assert!(!equivalent);
                assert_eq!(explanation, "Those are different planets.");
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(outcomes[2], (2, CheckOutcome::Verdict(Verdict::Match))));
        assert_eq!(provider.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_judgement_is_a_verification_failure() {
        let provider = Scripted::new(vec![Ok("Partially, it depends.")]);
        let s = session(provider.clone());
        let err = check_answer(&s, &pair("Boiling point of water?", Some("100 C")), "hot")
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::ParseFailed { .. }));
        assert_eq!(err.call_kind(), Some(CallKind::Verification));
        assert!(!err.is_local());
    }

    #[test]
    fn judgement_json_in_fence() {
        let (eq, why) =
            parse_judgement("```json\n{\"equivalent\": false, \"explanation\": \"No.\"}\n```")
                .unwrap();
        assert!(!eq);
        assert_eq!(why, "No.");
    }

    #[test]
    fn judgement_string_flag() {
        let (eq, why) = parse_judgement(r#"{"equivalent": "yes"}"#).unwrap();
        assert!(eq);
        assert_eq!(why, "");
    }

    #[test]
    fn judgement_plain_words() {
        assert_eq!(
            parse_judgement("Yes, both name the same river.").unwrap(),
            (true, "both name the same river.".to_string())
        );
        assert!(!parse_judgement("Incorrect").unwrap().0);
    }

    #[test]
    fn judgement_unrecognised() {
        assert!(matches!(
            parse_judgement("Maybe?"),
            Err(QuizError::ParseFailed { .. })
        ));
        assert!(matches!(
            parse_judgement(r#"{"equivalent": 3}"#),
            Err(QuizError::ParseFailed { .. })
        ));
    }
}
