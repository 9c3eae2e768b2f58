//! Study controller: runs tasks against the gateway and drives the quiz
//! lifecycle of a session.
//!
//! Every failure leaves the session's quiz untouched. The only field written
//! before validation is `button_clicked`, which records that the user
//! pressed the main button even if the input was blank.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::QuizParsing;
use crate::error::{GatewayErrorKind, Result, StudyError};
use crate::gateway::InferenceGateway;
use crate::prompt::{build_prompt, Prompt, Task};
use crate::quiz::{parse_quiz, ParsedQuiz, Verdict};
use crate::session::{QuizKey, Session};
use crate::view::{Outcome, QuizQuestionView};

/// Runs study tasks for sessions.
#[derive(Clone)]
pub struct StudyController {
    gateway: Arc<dyn InferenceGateway>,
    parsing: QuizParsing,
}

impl std::fmt::Debug for StudyController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StudyController")
            .field("parsing", &self.parsing)
            .finish_non_exhaustive()
    }
}

impl StudyController {
    /// Creates a controller over `gateway`.
    #[must_use]
    pub fn new(gateway: Arc<dyn InferenceGateway>, parsing: QuizParsing) -> Self {
        Self { gateway, parsing }
    }

    /// How quiz replies are turned into questions.
    #[must_use]
    pub const fn parsing(&self) -> QuizParsing {
        self.parsing
    }

    /// Runs `task` on `raw_text` for `session`.
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` for blank text (no gateway call is made), or the
    /// gateway's error if generation fails.
    pub async fn run(&self, session: &mut Session, raw_text: &str, task: Task) -> Result<Outcome> {
        session.button_clicked = true;
        session.touch();

        let id = session.id();
        let prompt = build_prompt(raw_text, task).map_err(|e| {
            debug!(session = %id, %task, "Rejected blank input");
            e
        })?;
        info!(session = %id, %task, input_len = raw_text.len(), "Running task");

        match task {
            Task::Summarize | Task::Explain => Ok(Outcome::Text {
                task,
                heading: task.heading().to_string(),
                text: self.generate_text(&prompt).await?,
            }),
            Task::GenerateQuestions => {
                let mut questions = Vec::with_capacity(task.calls());
                for _ in 0..task.calls() {
                    questions.push(self.generate_text(&prompt).await?);
                }
                Ok(Outcome::Questions {
                    heading: task.heading().to_string(),
                    questions,
                })
            }
            Task::Quiz => self.run_quiz(session, &prompt).await,
        }
    }

    async fn run_quiz(&self, session: &mut Session, prompt: &Prompt) -> Result<Outcome> {
        let heading = Task::Quiz.heading().to_string();

        if session.quiz.is_generated() {
            debug!(session = %session.id(), "Quiz already generated, reusing it");
            return Ok(Outcome::Quiz {
                heading,
                questions: QuizQuestionView::from_quiz(&session.quiz),
                generated: false,
                warnings: Vec::new(),
            });
        }

        let reply = self.generate_text(prompt).await?;
        let parsed = match self.parsing {
            QuizParsing::Structured => parse_quiz(&reply),
            QuizParsing::Placeholder => ParsedQuiz::placeholder(&reply),
        };
        for warning in &parsed.warnings {
            warn!(session = %session.id(), %warning, "Skipped quiz block");
        }

        let count = parsed.items.len();
        session.quiz.populate(parsed.items)?;
        session.touch();
        info!(
            session = %session.id(),
            questions = count,
            fallback = parsed.fallback,
            "Quiz generated"
        );

        Ok(Outcome::Quiz {
            heading,
            questions: QuizQuestionView::from_quiz(&session.quiz),
            generated: true,
            warnings: parsed.warnings,
        })
    }

    /// Records a quiz selection. No model call is made.
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuizKey` or `OptionNotOffered`.
    pub fn select(&self, session: &mut Session, key: QuizKey, option: &str) -> Result<()> {
        session.quiz.select(key, option)?;
        session.touch();
        debug!(session = %session.id(), %key, "Selection recorded");
        Ok(())
    }

    /// Checks the selection for `key`. Never changes the session.
    ///
    /// # Errors
    ///
    /// Returns `UnknownQuizKey` or `NoSelection`.
    pub fn check(&self, session: &Session, key: QuizKey) -> Result<Verdict> {
        let verdict = session.quiz.check(key)?;
        debug!(session = %session.id(), %key, correct = verdict.is_correct(), "Answer checked");
        Ok(verdict)
    }

    async fn generate_text(&self, prompt: &Prompt) -> Result<String> {
        let generations = self
            .gateway
            .generate(prompt.as_str(), &prompt.options())
            .await
            .map_err(|e| {
                warn!(task = %prompt.task(), error = %e, "Generation failed");
                e
            })?;

        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .ok_or_else(|| {
                StudyError::inference(GatewayErrorKind::Decode, "gateway returned no generations")
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use tokio::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::gateway::{Generation, GenerationOptions};
    use crate::quiz::PLACEHOLDER_ANSWER;
    use crate::session::QuizPhase;

    /// Replays queued replies and records every call.
    #[derive(Default)]
    struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<(String, GenerationOptions)>>,
    }

    impl ScriptedGateway {
        fn with_replies(replies: impl IntoIterator<Item = Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::default(),
            })
        }

        async fn calls(&self) -> Vec<(String, GenerationOptions)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl InferenceGateway for ScriptedGateway {
        async fn generate(
            &self,
            prompt: &str,
            options: &GenerationOptions,
        ) -> Result<Vec<Generation>> {
            self.calls
                .lock()
                .await
                .push((prompt.to_string(), *options));
            let reply = self
                .replies
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok("default reply".to_string()));
            reply.map(|text| vec![Generation::new(text)])
        }
    }

    fn controller(gateway: &Arc<ScriptedGateway>, parsing: QuizParsing) -> StudyController {
        StudyController::new(Arc::clone(gateway) as Arc<dyn InferenceGateway>, parsing)
    }

    const STRUCTURED_REPLY: &str = "\
What is the capital of France?
A) Paris
B) London
C) Berlin
D) Madrid
A

Which gas do plants absorb?
A) Oxygen
B) Carbon dioxide
C) Nitrogen
D) Helium
B";

    #[tokio::test]
    async fn test_summarize_scenario() {
        let gateway = ScriptedGateway::with_replies([Ok("Plants make energy.".to_string())]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let outcome = controller
            .run(&mut session, "Photosynthesis converts light to energy.", Task::Summarize)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Text {
                task: Task::Summarize,
                heading: "Summary:".to_string(),
                text: "Plants make energy.".to_string(),
            }
        );
        let calls = gateway.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "Summarize the following text concisely and avoid repetition: Photosynthesis converts light to energy."
        );
        assert_eq!(calls[0].1.max_length, 150);
        assert_eq!(calls[0].1.min_length, Some(30));
        assert_eq!(calls[0].1.num_return_sequences, 1);
        assert!(session.button_clicked);
    }

    #[tokio::test]
    async fn test_generate_questions_makes_three_calls() {
        let gateway = ScriptedGateway::with_replies([
            Ok("q1".to_string()),
            Ok("q2".to_string()),
            Ok("q3".to_string()),
        ]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let outcome = controller
            .run(&mut session, "cells", Task::GenerateQuestions)
            .await
            .unwrap();

        assert!(matches!(
            &outcome,
            Outcome::Questions { questions, .. } if questions == &["q1", "q2", "q3"]
        ));
        assert_eq!(gateway.calls().await.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_input_never_calls_gateway() {
        let gateway = ScriptedGateway::with_replies([]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        for task in Task::ALL {
            let result = controller.run(&mut session, "   ", task).await;
            assert!(matches!(result, Err(StudyError::EmptyInput)));
        }

        assert!(gateway.calls().await.is_empty());
        assert!(session.button_clicked);
        assert_eq!(session.quiz.phase(), QuizPhase::Empty);
    }

    #[tokio::test]
    async fn test_quiz_placeholder_scenario() {
        let gateway = ScriptedGateway::with_replies([Ok("some quiz text".to_string())]);
        let controller = controller(&gateway, QuizParsing::Placeholder);
        let mut session = Session::new();

        let outcome = controller
            .run(&mut session, "Cells divide.", Task::Quiz)
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Quiz { generated: true, .. }));
        assert_eq!(gateway.calls().await.len(), 1);
        assert_eq!(session.quiz.questions().len(), 1);
        assert_eq!(session.quiz.questions()[0].text, "some quiz text");
        assert_eq!(session.quiz.answers()[0], PLACEHOLDER_ANSWER);
    }

    #[tokio::test]
    async fn test_quiz_generation_is_idempotent() {
        let gateway = ScriptedGateway::with_replies([Ok(STRUCTURED_REPLY.to_string())]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let first = controller
            .run(&mut session, "geography", Task::Quiz)
            .await
            .unwrap();
        let second = controller
            .run(&mut session, "something else", Task::Quiz)
            .await
            .unwrap();

        assert_eq!(gateway.calls().await.len(), 1);
        assert_eq!(session.quiz.questions().len(), 2);
        assert_eq!(session.quiz.answers().len(), 2);
        assert!(matches!(first, Outcome::Quiz { generated: true, .. }));
        assert!(matches!(
            second,
            Outcome::Quiz { generated: false, ref questions, .. } if questions.len() == 2
        ));
    }

    #[tokio::test]
    async fn test_unparseable_quiz_falls_back_with_warning() {
        let gateway = ScriptedGateway::with_replies([Ok("no structure here".to_string())]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let outcome = controller
            .run(&mut session, "topic", Task::Quiz)
            .await
            .unwrap();

        assert!(matches!(
            &outcome,
            Outcome::Quiz { warnings, .. } if !warnings.is_empty()
        ));
        assert_eq!(session.quiz.answers(), [PLACEHOLDER_ANSWER]);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_session_unchanged() {
        let gateway = ScriptedGateway::with_replies([
            Err(StudyError::inference_timeout(120)),
            Ok(STRUCTURED_REPLY.to_string()),
        ]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let err = controller
            .run(&mut session, "topic", Task::Quiz)
            .await
            .unwrap_err();
        assert!(matches!(err, StudyError::InferenceTimeout { .. }));
        assert_eq!(session.quiz.phase(), QuizPhase::Empty);

        assert_ok!(controller.run(&mut session, "topic", Task::Quiz).await);
        assert_eq!(session.quiz.questions().len(), 2);
    }

    #[tokio::test]
    async fn test_questions_failure_midway_is_reported() {
        let gateway = ScriptedGateway::with_replies([
            Ok("q1".to_string()),
            Err(StudyError::model_unavailable("m", "loading")),
        ]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        let result = controller
            .run(&mut session, "cells", Task::GenerateQuestions)
            .await;
        assert!(matches!(result, Err(StudyError::ModelUnavailable { .. })));
        assert_eq!(gateway.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn test_select_then_check_incorrect() {
        let gateway = ScriptedGateway::with_replies([Ok("anything".to_string())]);
        let controller = controller(&gateway, QuizParsing::Placeholder);
        let mut session = Session::new();
        controller
            .run(&mut session, "topic", Task::Quiz)
            .await
            .unwrap();
        let key = QuizKey::new(0);
        let questions_before = session.quiz.questions().to_vec();

        assert_ok!(controller.select(&mut session, key, "Option B: Incorrect Option 1"));
        let verdict = controller.check(&session, key).unwrap();

        assert_eq!(
            verdict,
            Verdict::Incorrect {
                correct_answer: "Option A: Correct Answer".to_string()
            }
        );
        assert_eq!(session.quiz.questions(), questions_before.as_slice());
        assert_eq!(gateway.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn test_select_and_check_errors() {
        let gateway = ScriptedGateway::with_replies([Ok(STRUCTURED_REPLY.to_string())]);
        let controller = controller(&gateway, QuizParsing::Structured);
        let mut session = Session::new();

        assert_err!(controller.select(&mut session, QuizKey::new(0), "A) Paris"));

        controller
            .run(&mut session, "geography", Task::Quiz)
            .await
            .unwrap();

        assert!(matches!(
            controller.check(&session, QuizKey::new(0)),
            Err(StudyError::NoSelection { .. })
        ));
        assert!(matches!(
            controller.select(&mut session, QuizKey::new(1), "Z) nope"),
            Err(StudyError::OptionNotOffered { .. })
        ));
        assert_ok!(controller.select(&mut session, QuizKey::new(1), "B) Carbon dioxide"));
        assert_eq!(
            controller.check(&session, QuizKey::new(1)).unwrap(),
            Verdict::Correct
        );
    }
}
