//! Dataflow stages, their combinator algebra and the phase structure of a
//! sequence module.

mod aggregator;
mod emit;
mod lower;
mod module;
mod pipeline;
pub mod spec;
mod stage;

pub use aggregator::{Aggregator, AggregatorProxy, Phase};
pub use module::{SeqModule, DEFAULT_SOURCE};
pub use pipeline::{Link, Node, Pipeline};
pub use spec::{ModuleSpec, SourceSpec};
pub use stage::{Stage, StageKind, FAIL, PASS};
