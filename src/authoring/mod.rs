pub mod generator;
pub mod parser;

use crate::{
    error::{QuizError, QuizResult},
    models::quiz::{GenerateQuizRequest, Quiz},
    services::{content::ContentService, quizzes::{NewQuiz, QuizService}},
};

use generator::QuestionGenerator;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;

/// Generates questions from stored content or raw text and saves them as a draft quiz.
///
/// Partially usable replies are accepted with the questions that parsed; a reply
/// with no usable question is rejected.
pub async fn generate_draft(
    generator: &dyn QuestionGenerator,
    contents: &ContentService,
    quizzes: &QuizService,
    req: GenerateQuizRequest,
) -> QuizResult<Quiz> {
    let source = match (&req.content_id, &req.text) {
        (Some(content_id), _) => contents.source_text(content_id, req.chunk_index).await?,
        (None, Some(text)) => text.clone(),
        (None, None) => {
            return Err(QuizError::InvalidQuizContent(
                "either contentId or text is required".to_string(),
            ));
        }
    };

    let count = req.question_count.unwrap_or(DEFAULT_QUESTION_COUNT);
    let mut questions = generator
        .generate_questions(&source, &req.grade_level, &req.subject, count)
        .await?;

    if questions.is_empty() {
        return Err(QuizError::InvalidQuizContent(
            "the generator returned no usable questions".to_string(),
        ));
    }
    questions.truncate(count as usize);

    quizzes
        .create_with_questions(
            NewQuiz {
                title: req.title,
                subject: Some(req.subject),
                grade_level: Some(req.grade_level),
                cohort: req.class_id,
                created_by: req.teacher_id,
            },
            questions,
        )
        .await
}
