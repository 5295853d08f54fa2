use crate::session::SessionState;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Rule table error: {0}")]
    Matcher(#[from] router_matcher::MatcherError),

    #[error("Plan error: {0}")]
    Plan(#[from] router_planner::PlanError),

    #[error("Feedback store error: {0}")]
    Feedback(#[from] router_feedback::FeedbackError),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("no executor attached")]
    NoExecutor,

    #[error("invalid session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}
