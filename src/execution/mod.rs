// Order execution and position lifecycle module
pub mod agent;
pub mod executor;
pub mod gateway;
pub mod paper;
pub mod position_manager;
pub mod price_feed;

pub use agent::{AgentParts, AgentSettings, CycleOutcome, CycleReport, TradingAgent};
pub use executor::{ExecutionAction, ExecutionDecision, Executor};
pub use gateway::{with_retry, ExchangeGateway, RateLimitedGateway, RetryPolicy};
pub use paper::PaperGateway;
pub use position_manager::{
    ClosedTrade, ExitReason, PendingExit, Position, PositionManager, PositionStatus,
};
pub use price_feed::{FeedUpdate, PriceFeed};
