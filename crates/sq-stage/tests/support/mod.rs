#![allow(dead_code)]
use sq_core::ast::{BinOp, Expr};
use sq_interpret::{MemorySource, OutputBuffer, RecordSource, Vm};
use sq_stage::SeqModule;

pub fn len_of_input() -> Expr {
    Expr::call(Expr::ident("len"), vec![Expr::ellipsis()])
}

pub fn longer_than(n: i64) -> Expr {
    Expr::binary(BinOp::Gt, len_of_input(), Expr::int(n))
}

/// Compiles `module` and runs it with one in-memory reader per slice of
/// records, returning the printed output.
pub fn run(module: &mut SeqModule, sources: Vec<Vec<&str>>) -> eyre::Result<String> {
    let compiled = module.compile()?;
    compiled.verify().map_err(|e| eyre::eyre!(e))?;
    let readers = sources
        .into_iter()
        .map(|records| Box::new(MemorySource::new(records)) as Box<dyn RecordSource>)
        .collect();
    let out = OutputBuffer::new();
    Vm::new(&compiled)
        .with_output(out.clone())
        .with_sources(readers)
        .run_main()?;
    Ok(out.contents())
}
