//! The combinator algebra.
//!
//! `a | b` feeds `b` from the default slot of `a`; `a & vec![b, c]` tees the
//! value map of `a` into every branch. `||` and `&&` cannot be overloaded,
//! so their validating forms are [`Pipeline::validate`] and
//! [`Pipeline::validate_fork`].

use crate::stage::Stage;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pipeline {
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Output slot of the upstream link feeding this one; the default slot
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// Skip this link (and the rest of the chain) for records whose input
    /// slot is flagged invalid.
    #[serde(default)]
    pub guard: bool,
    pub node: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Stage(Stage),
    /// Every branch receives the same upstream values; downstream of the
    /// fork sees them unchanged.
    Fork(Vec<Pipeline>),
}

impl Pipeline {
    pub fn new(stage: Stage) -> Self {
        Self {
            links: vec![Link {
                slot: None,
                guard: false,
                node: Node::Stage(stage),
            }],
        }
    }

    /// A pipeline that starts by forking its input.
    pub fn forked(branches: Vec<Pipeline>) -> Self {
        Self {
            links: vec![Link {
                slot: None,
                guard: false,
                node: Node::Fork(branches),
            }],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn then(mut self, next: impl Into<Pipeline>) -> Self {
        self.append(next.into(), None, false);
        self
    }

    pub fn fork(mut self, branches: Vec<Pipeline>) -> Self {
        self.attach_fork(branches, None, false);
        self
    }

    /// `self || next`
    pub fn validate(mut self, next: impl Into<Pipeline>) -> Self {
        self.append(next.into(), None, true);
        self
    }

    /// `self && branches`
    pub fn validate_fork(mut self, branches: Vec<Pipeline>) -> Self {
        self.attach_fork(branches, None, true);
        self
    }

    pub(crate) fn append(&mut self, next: Pipeline, slot: Option<String>, guard: bool) {
        let mut links = next.links.into_iter();
        if let Some(mut first) = links.next() {
            first.slot = slot.or(first.slot);
            first.guard |= guard;
            self.links.push(first);
        }
        self.links.extend(links);
    }

    pub(crate) fn attach_fork(&mut self, branches: Vec<Pipeline>, slot: Option<String>, guard: bool) {
        self.links.push(Link {
            slot,
            guard,
            node: Node::Fork(branches),
        });
    }
}

impl From<Stage> for Pipeline {
    fn from(stage: Stage) -> Self {
        Pipeline::new(stage)
    }
}

impl<T: Into<Pipeline>> BitOr<T> for Pipeline {
    type Output = Pipeline;

    fn bitor(self, rhs: T) -> Pipeline {
        self.then(rhs)
    }
}

impl<T: Into<Pipeline>> BitOr<T> for Stage {
    type Output = Pipeline;

    fn bitor(self, rhs: T) -> Pipeline {
        Pipeline::new(self).then(rhs)
    }
}

impl BitAnd<Vec<Pipeline>> for Pipeline {
    type Output = Pipeline;

    fn bitand(self, branches: Vec<Pipeline>) -> Pipeline {
        self.fork(branches)
    }
}

impl BitAnd<Vec<Pipeline>> for Stage {
    type Output = Pipeline;

    fn bitand(self, branches: Vec<Pipeline>) -> Pipeline {
        Pipeline::new(self).fork(branches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage_names(pipeline: &Pipeline) -> Vec<String> {
        pipeline
            .links
            .iter()
            .map(|link| match &link.node {
                Node::Stage(stage) => stage.name.clone(),
                Node::Fork(branches) => format!("fork/{}", branches.len()),
            })
            .collect()
    }

    #[test]
    fn sequential_composition_flattens() {
        let pipeline = (Stage::print().named("a") | Stage::print().named("b"))
            | (Stage::print().named("c") | Stage::print().named("d"));
        assert_eq!(stage_names(&pipeline), vec!["a", "b", "c", "d"]);
        assert!(pipeline.links.iter().all(|link| !link.guard));
    }

    #[test]
    fn validation_guards_only_the_joining_link() {
        let pipeline = Pipeline::new(Stage::print().named("a"))
            .then(Stage::print().named("b"))
            .validate(Stage::print().named("c") | Stage::print().named("d"));
        let guards = pipeline.links.iter().map(|link| link.guard).collect::<Vec<_>>();
        assert_eq!(guards, vec![false, false, true, false]);
    }

    #[test]
    fn fork_is_a_single_link() {
        let pipeline = Stage::print().named("a")
            & vec![Pipeline::new(Stage::print()), Pipeline::new(Stage::print())];
        assert_eq!(stage_names(&pipeline), vec!["a", "fork/2"]);
        let guarded = Pipeline::new(Stage::print()).validate_fork(vec![]);
        assert!(guarded.links[1].guard);
    }
}
