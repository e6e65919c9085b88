use crate::config::PipelineOptions;
use crate::error::{PipelineDiagnostics, PipelineError};
use std::marker::PhantomData;

pub trait PipelineStage {
    type SrcCtx;
    type DstCtx;

    fn name(&self) -> &'static str;
    fn run(
        &self,
        context: Self::SrcCtx,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<Self::DstCtx, PipelineError>;
}

type StageFn<Src, Dst> =
    dyn Fn(Src, &mut PipelineDiagnostics, &PipelineOptions) -> Result<Dst, PipelineError>;

/// A chain of stages taking `Src` to `Dst`.
pub struct Pipeline<Src, Dst> {
    stages: Vec<&'static str>,
    run: Box<StageFn<Src, Dst>>,
}

impl<Src, Dst> Pipeline<Src, Dst> {
    pub fn run(
        &self,
        context: Src,
        diagnostics: &mut PipelineDiagnostics,
        options: &PipelineOptions,
    ) -> Result<Dst, PipelineError> {
        (self.run)(context, diagnostics, options)
    }

    /// Stage names in execution order.
    pub fn stages(&self) -> &[&'static str] {
        &self.stages
    }
}

pub struct PipelineBuilder<Src, Dst> {
    pipeline: Pipeline<Src, Dst>,
    _marker: PhantomData<(Src, Dst)>,
}

impl<Src> PipelineBuilder<Src, Src> {
    pub fn new() -> Self {
        let run = |context: Src, _diagnostics: &mut PipelineDiagnostics, _options: &PipelineOptions| {
            Ok(context)
        };
        Self {
            pipeline: Pipeline {
                stages: Vec::new(),
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }
}

impl<Src> Default for PipelineBuilder<Src, Src> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Src, Mid> PipelineBuilder<Src, Mid> {
    pub fn add_stage<Next, S>(self, stage: S) -> PipelineBuilder<Src, Next>
    where
        S: PipelineStage<SrcCtx = Mid, DstCtx = Next> + 'static,
        Src: 'static,
        Mid: 'static,
        Next: 'static,
    {
        let name = stage.name();
        let previous = self.pipeline.run;
        let mut stages = self.pipeline.stages;
        stages.push(name);
        let run = move |context: Src, diagnostics: &mut PipelineDiagnostics, options: &PipelineOptions| {
            let mid = previous(context, diagnostics, options)?;
            tracing::info!("[pipeline] running stage {}", name);
            let mark = diagnostics.items.len();
            let result = stage.run(mid, diagnostics, options);
            diagnostics.tag_stage(mark, name);
            match result {
                Ok(next) => Ok(next),
                Err(err) if err.stage == name => Err(err),
                Err(err) => Err(PipelineError::new(name, err.message)),
            }
        };

        PipelineBuilder {
            pipeline: Pipeline {
                stages,
                run: Box::new(run),
            },
            _marker: PhantomData,
        }
    }

    pub fn build(self) -> Pipeline<Src, Mid> {
        self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sq_core::diagnostics::Diagnostic;

    struct Double;

    impl PipelineStage for Double {
        type SrcCtx = i64;
        type DstCtx = i64;

        fn name(&self) -> &'static str {
            "double"
        }

        fn run(
            &self,
            context: i64,
            diagnostics: &mut PipelineDiagnostics,
            _options: &PipelineOptions,
        ) -> Result<i64, PipelineError> {
            diagnostics.push(Diagnostic::warning("doubling"));
            Ok(context * 2)
        }
    }

    struct Reject;

    impl PipelineStage for Reject {
        type SrcCtx = i64;
        type DstCtx = String;

        fn name(&self) -> &'static str {
            "reject"
        }

        fn run(
            &self,
            context: i64,
            _diagnostics: &mut PipelineDiagnostics,
            _options: &PipelineOptions,
        ) -> Result<String, PipelineError> {
            if context > 10 {
                // the wrong stage name is corrected by the builder
                return Err(PipelineError::new("inner", "too large"));
            }
            Ok(context.to_string())
        }
    }

    #[test]
    fn stages_run_in_order_and_tag_diagnostics() -> Result<(), PipelineError> {
        let pipeline = PipelineBuilder::new()
            .add_stage(Double)
            .add_stage(Double)
            .add_stage(Reject)
            .build();
        assert_eq!(pipeline.stages(), &["double", "double", "reject"]);

        let mut diagnostics = PipelineDiagnostics::default();
        let out = pipeline.run(2, &mut diagnostics, &PipelineOptions::check())?;
        assert_eq!(out, "8");
        assert_eq!(diagnostics.items.len(), 2);
        assert_eq!(diagnostics.items[0].source_context.as_deref(), Some("double"));
        Ok(())
    }

    #[test]
    fn errors_carry_the_failing_stage() {
        let pipeline = PipelineBuilder::new().add_stage(Double).add_stage(Reject).build();
        let mut diagnostics = PipelineDiagnostics::default();
        let err = pipeline
            .run(6, &mut diagnostics, &PipelineOptions::check())
            .unwrap_err();
        assert_eq!(err, PipelineError::new("reject", "too large"));
        assert_eq!(err.to_string(), "[reject] too large");
    }
}
