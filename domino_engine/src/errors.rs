//! Engine error taxonomy.
//!
//! Player-initiated operations surface these directly. Scheduler-fired
//! callbacks never do; they treat state mismatches as benign no-ops and only
//! report transport-level failures.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::scheduler::SchedulerError;
use crate::store::StoreError;

/// Wire-level error category, mirrored by the HTTP layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    Unauthenticated,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    ResourceExhausted,
    AlreadyExists,
    PermissionDenied,
    Internal,
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("tournament template {0} not found")]
    TemplateNotFound(String),

    #[error("game {0} not found")]
    GameNotFound(String),

    #[error("user {0} not found")]
    UserNotFound(String),

    #[error("user {user_id} is not seated in game {game_id}")]
    PlayerNotSeated { game_id: String, user_id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("partnership games require picking team A or B")]
    TeamRequired,

    #[error("tournament is not accepting entries")]
    TemplateClosed,

    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance { available: i64, required: i64 },

    #[error("already seated at this table")]
    AlreadySeated,

    #[error("already enrolled in this tournament")]
    AlreadyEnrolled,

    #[error("refunds are closed once the round has started")]
    RefundWindowClosed,

    #[error("ready toggling is only allowed while the table is full and idle")]
    NotInReadyPhase,

    #[error("game is not in progress")]
    GameNotInProgress,

    #[error("not your turn")]
    OutOfTurn,

    #[error("tile is not in your hand")]
    TileNotInHand,

    #[error("tile does not match either open end")]
    IllegalMove,

    #[error("the opening move must be the double six")]
    MustOpenWithDoubleSix,

    #[error("you have playable tiles and cannot pass")]
    HasValidMoves,

    #[error("turn order unavailable")]
    TurnOrderUnavailable,

    #[error("admin privileges required")]
    AdminRequired,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("ledger error: {0}")]
    Ledger(LedgerError),
}

impl From<LedgerError> for EngineError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                available,
                required,
                ..
            } => Self::InsufficientBalance {
                available,
                required,
            },
            LedgerError::AccountNotFound(user_id) => Self::UserNotFound(user_id),
            other => Self::Ledger(other),
        }
    }
}

impl EngineError {
    /// Map onto the wire taxonomy.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::TemplateNotFound(_)
            | Self::GameNotFound(_)
            | Self::UserNotFound(_)
            | Self::PlayerNotSeated { .. } => ErrorCode::NotFound,
            Self::InvalidArgument(_)
            | Self::TeamRequired
            | Self::TileNotInHand
            | Self::IllegalMove => ErrorCode::InvalidArgument,
            Self::TemplateClosed
            | Self::AlreadyEnrolled
            | Self::RefundWindowClosed
            | Self::NotInReadyPhase
            | Self::GameNotInProgress
            | Self::OutOfTurn
            | Self::MustOpenWithDoubleSix
            | Self::HasValidMoves
            | Self::TurnOrderUnavailable => ErrorCode::FailedPrecondition,
            Self::InsufficientBalance { .. } => ErrorCode::ResourceExhausted,
            Self::AlreadySeated => ErrorCode::AlreadyExists,
            Self::AdminRequired => ErrorCode::PermissionDenied,
            Self::Scheduler(err) => match err {
                SchedulerError::QueueNotFound(_) => ErrorCode::NotFound,
                SchedulerError::PermissionDenied(_) => ErrorCode::PermissionDenied,
                SchedulerError::Backend(_) => ErrorCode::Internal,
            },
            Self::Store(_) | Self::Ledger(_) => ErrorCode::Internal,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
