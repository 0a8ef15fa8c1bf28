//! Reflexion 层：Actor、Evaluator、Reflector、有界记忆、响应解析与试验主循环

pub mod actor;
pub mod clock;
pub mod evaluator;
pub mod events;
pub mod loop_;
pub mod memory;
pub mod parser;
pub mod prompts;
pub mod reflector;
pub mod types;

pub use actor::{Actor, NO_VALID_OUTPUT};
pub use clock::{Clock, FixedClock, SystemClock};
pub use evaluator::{Evaluator, DEFAULT_EVALUATION_TEMPERATURE};
pub use events::ReflexionEvent;
pub use loop_::{aggregate, improvement_rate, EventSender, ReflexionStream, TrialOrchestrator};
pub use memory::{push_bounded, Memory};
pub use reflector::Reflector;
pub use types::{
    Action, ActionKind, CriterionScore, Evaluation, Reflection, Task, TaskDefaults, TaskRequest,
    TaskResult, TaskType, Trajectory, TrialRecord,
};
