use thiserror::Error;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("nothing to plan: no resolved intents")]
    Empty,

    #[error("action '{0}' appears twice in one plan")]
    DuplicateAction(String),
}
