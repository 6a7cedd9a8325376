use anyhow::Result;
use sea_orm::{ActiveValue, DatabaseConnection, EntityTrait};

use crate::entities::{prelude::*, quizzes};
use quiz_types::QuestionSnapshot;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Quiz {
    pub id: String,
    pub title: String,
    pub questions: Vec<QuestionSnapshot>,
}

pub struct QuizRepository {
    db: DatabaseConnection,
}

impl QuizRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn find_quiz_by_id(&self, id: &str) -> Result<Option<Quiz>> {
        let Some(model) = Quizzes::find_by_id(id.to_string()).one(&self.db).await? else {
            return Ok(None);
        };

        let questions: Vec<QuestionSnapshot> = serde_json::from_str(&model.questions)?;
        Ok(Some(Quiz {
            id: model.id,
            title: model.title,
            questions,
        }))
    }

    pub async fn create_quiz(&self, quiz: &Quiz) -> Result<()> {
        let model = quizzes::ActiveModel {
            id: ActiveValue::Set(quiz.id.clone()),
            title: ActiveValue::Set(quiz.title.clone()),
            questions: ActiveValue::Set(serde_json::to_string(&quiz.questions)?),
            created_at: ActiveValue::Set(chrono::Utc::now().into()),
        };

        Quizzes::insert(model).exec(&self.db).await?;
        Ok(())
    }
}
