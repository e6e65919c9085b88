use crate::pipeline::Pipeline;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use sq_core::span::Span;
use sq_core::{structural, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Prologue, before the first record.
    #[display("once")]
    Once,
    /// Once per record of every source.
    #[display("main")]
    Main,
    /// Epilogue, after the input is exhausted or abandoned.
    #[display("last")]
    Last,
}

/// Ordered pipelines of one phase.
#[derive(Debug, Clone)]
pub struct Aggregator {
    phase: Phase,
    pipelines: Vec<Pipeline>,
    sealed: bool,
}

impl Aggregator {
    pub(crate) fn new(phase: Phase) -> Self {
        Self {
            phase,
            pipelines: Vec::new(),
            sealed: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pipelines(&self) -> &[Pipeline] {
        &self.pipelines
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Registers a pipeline and returns its index for [`Self::at`].
    pub fn add(&mut self, pipeline: impl Into<Pipeline>) -> Result<usize> {
        self.ensure_open()?;
        let pipeline = pipeline.into();
        if pipeline.is_empty() {
            structural!(Span::null(), "cannot add an empty pipeline to `{}`", self.phase);
        }
        self.pipelines.push(pipeline);
        Ok(self.pipelines.len() - 1)
    }

    /// `aggregator & branches`
    pub fn fork(&mut self, branches: Vec<Pipeline>) -> Result<usize> {
        self.add(Pipeline::forked(branches))
    }

    /// `aggregator || pipeline`
    pub fn validate(&mut self, pipeline: impl Into<Pipeline>) -> Result<usize> {
        let mut pipeline = pipeline.into();
        if let Some(first) = pipeline.links.first_mut() {
            first.guard = true;
        }
        self.add(pipeline)
    }

    /// `aggregator && branches`
    pub fn validate_fork(&mut self, branches: Vec<Pipeline>) -> Result<usize> {
        let mut pipeline = Pipeline::forked(branches);
        if let Some(first) = pipeline.links.first_mut() {
            first.guard = true;
        }
        self.add(pipeline)
    }

    /// Selects the pipeline registered at `index` for further composition.
    pub fn at(&mut self, index: usize) -> Result<AggregatorProxy<'_>> {
        self.ensure_open()?;
        let phase = self.phase;
        let count = self.pipelines.len();
        if count == 0 {
            structural!(Span::null(), "`{}` has no pipeline to select", phase);
        }
        match self.pipelines.get_mut(index) {
            Some(pipeline) => Ok(AggregatorProxy {
                pipeline,
                slot: None,
            }),
            None => structural!(
                Span::null(),
                "`{}` has {} pipelines, cannot select #{}",
                phase,
                count,
                index
            ),
        }
    }

    /// Selects output slot `name` of the most recently added pipeline.
    pub fn last_slot(&mut self, name: impl Into<String>) -> Result<AggregatorProxy<'_>> {
        let last = self.pipelines.len().saturating_sub(1);
        Ok(self.at(last)?.slot(name))
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            structural!(
                Span::null(),
                "cannot attach to `{}` after code generation has started",
                self.phase
            );
        }
        Ok(())
    }
}

/// Extends one registered pipeline, reading from a chosen output slot of
/// its last stage.
pub struct AggregatorProxy<'a> {
    pipeline: &'a mut Pipeline,
    slot: Option<String>,
}

impl<'a> AggregatorProxy<'a> {
    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slot = Some(name.into());
        self
    }

    pub fn pipe(self, next: impl Into<Pipeline>) {
        self.pipeline.append(next.into(), self.slot, false);
    }

    pub fn validate(self, next: impl Into<Pipeline>) {
        self.pipeline.append(next.into(), self.slot, true);
    }

    pub fn fork(self, branches: Vec<Pipeline>) {
        self.pipeline.attach_fork(branches, self.slot, false);
    }

    pub fn validate_fork(self, branches: Vec<Pipeline>) {
        self.pipeline.attach_fork(branches, self.slot, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;

    #[test]
    fn selecting_from_an_empty_aggregator_is_structural() {
        let mut main = Aggregator::new(Phase::Main);
        assert_eq!(main.at(0).err().map(|e| e.code()), Some("structural"));
    }

    #[test]
    fn indexed_composition_extends_the_selected_pipeline() -> Result<()> {
        let mut main = Aggregator::new(Phase::Main);
        main.add(Stage::partition(sq_core::ast::Expr::bool(true)))?;
        main.add(Stage::print())?;
        main.at(0)?.slot("fail").validate(Stage::print());
        let first = &main.pipelines()[0];
        assert_eq!(first.len(), 2);
        assert_eq!(first.links[1].slot.as_deref(), Some("fail"));
        assert!(first.links[1].guard);
        assert_eq!(main.pipelines()[1].len(), 1);
        assert_eq!(main.at(2).err().map(|e| e.code()), Some("structural"));
        Ok(())
    }

    #[test]
    fn last_slot_targets_the_newest_pipeline() -> Result<()> {
        let mut main = Aggregator::new(Phase::Main);
        assert_eq!(main.last_slot("pass").err().map(|e| e.code()), Some("structural"));
        main.add(Stage::print())?;
        main.add(Stage::partition(sq_core::ast::Expr::bool(true)))?;
        main.last_slot("pass")?.pipe(Stage::print());
        assert_eq!(main.pipelines()[0].len(), 1);
        let newest = &main.pipelines()[1];
        assert_eq!(newest.len(), 2);
        assert_eq!(newest.links[1].slot.as_deref(), Some("pass"));
        assert!(!newest.links[1].guard);
        Ok(())
    }

    #[test]
    fn sealed_aggregator_rejects_pipelines() {
        let mut last = Aggregator::new(Phase::Last);
        last.seal();
        assert_eq!(
            last.add(Stage::print()).err().map(|e| e.code()),
            Some("structural")
        );
    }
}
