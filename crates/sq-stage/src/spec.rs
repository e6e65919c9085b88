//! JSON description of a sequence module, as produced by the front end.

use crate::module::SeqModule;
use crate::pipeline::Pipeline;
use serde::{Deserialize, Serialize};
use sq_core::ast::Program;
use sq_core::types::SeqKind;
use sq_core::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: SeqKind,
}

fn default_kind() -> SeqKind {
    SeqKind::Str
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    #[serde(default)]
    pub prelude: Program,
    #[serde(default)]
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub once: Vec<Pipeline>,
    pub main: Vec<Pipeline>,
    #[serde(default)]
    pub last: Vec<Pipeline>,
}

impl ModuleSpec {
    pub fn into_module(self) -> Result<SeqModule> {
        let mut module = SeqModule::new(self.name);
        module.set_prelude(self.prelude)?;
        for source in self.sources {
            module.source(source.name, source.kind)?;
        }
        for pipeline in self.once {
            module.once.add(pipeline)?;
        }
        for pipeline in self.main {
            module.main.add(pipeline)?;
        }
        for pipeline in self.last {
            module.last.add(pipeline)?;
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use pretty_assertions::assert_eq;

    #[test]
    fn spec_survives_json() -> Result<()> {
        let spec = ModuleSpec {
            name: "m".into(),
            prelude: Program::default(),
            sources: vec![SourceSpec {
                name: "reads.txt".into(),
                kind: SeqKind::Seq,
            }],
            once: vec![],
            main: vec![Pipeline::new(Stage::filter(sq_core::ast::Expr::bool(true))).validate(Stage::print())],
            last: vec![],
        };
        let json = serde_json::to_string(&spec)?;
        let parsed: ModuleSpec = serde_json::from_str(&json)?;
        assert_eq!(parsed, spec);
        let module = parsed.into_module()?;
        assert_eq!(module.main.len(), 1);
        assert_eq!(module.sources().len(), 1);
        Ok(())
    }

    #[test]
    fn minimal_spec_needs_only_name_and_main() -> Result<()> {
        let parsed: ModuleSpec = serde_json::from_str(r#"{"name": "m", "main": []}"#)?;
        let module = parsed.into_module()?;
        assert_eq!(module.sources()[0].name, crate::module::DEFAULT_SOURCE);
        Ok(())
    }
}
