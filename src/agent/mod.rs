//! Agent module - the event planning conversation graph
//!
//! Conversation state, the router, the graph nodes, checkpointing and the
//! executor that ties them together, plus the per-thread service clients
//! talk to.

pub mod checkpoint;
pub mod executor;
pub mod feed;
pub mod graph;
pub mod kind;
pub mod nodes;
pub mod router;
pub mod service;
pub mod state;

pub use checkpoint::{Checkpoint, Checkpointer, FileCheckpointer, MemoryCheckpointer};
pub use executor::{GraphExecutor, ResumeDecision, RunOutcome, RunStatus};
pub use feed::{FeedEvent, StateFeed, StateSubscriber};
pub use graph::{Edge, GraphSpec, Node};
pub use kind::AgentKind;
pub use nodes::perform::{APPROVED, CANCEL};
pub use nodes::{NodeContext, PerformReport};
pub use router::{route, RouteTable, Step};
pub use service::AgentService;
pub use state::{ConversationState, SearchProgress, SessionContext};
