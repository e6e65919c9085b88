//! Types every stage against the values flowing into it.

use crate::pipeline::{Link, Node, Pipeline};
use crate::stage::{Stage, StageKind, FAIL, PASS};
use sq_core::ast;
use sq_core::hir;
use sq_core::id::GlobalId;
use sq_core::span::Span;
use sq_core::types::Type;
use sq_core::{not_found, structural, type_mismatch, Result};
use sq_optimize::error::ensure_type;
use sq_optimize::Transformer;

/// Static shape of a value map: which slots exist and what they carry.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SlotTypes {
    pub default: Option<Type>,
    pub named: Vec<(String, Type)>,
}

impl SlotTypes {
    pub fn single(ty: Option<Type>) -> Self {
        Self {
            default: ty,
            named: Vec::new(),
        }
    }

    fn select(&self, slot: Option<&str>, upstream: &str) -> Result<Option<Type>> {
        match slot {
            None => Ok(self.default.clone()),
            Some(name) => match self.named.iter().find(|(slot, _)| slot == name) {
                Some((_, ty)) => Ok(Some(ty.clone())),
                None => not_found!(Span::null(), "`{}` has no output slot `{}`", upstream, name),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoweredPipeline {
    pub links: Vec<LoweredLink>,
}

#[derive(Debug, Clone)]
pub(crate) struct LoweredLink {
    pub slot: Option<String>,
    pub guard: bool,
    pub node: LoweredNode,
}

#[derive(Debug, Clone)]
pub(crate) enum LoweredNode {
    Stage(StageOp),
    Fork(Vec<LoweredPipeline>),
}

#[derive(Debug, Clone)]
pub(crate) enum StageOp {
    Expr(hir::Expr),
    Filter(hir::Expr),
    Partition(hir::Expr),
    Branch(Vec<(String, hir::Expr)>),
    Cell(GlobalId, Type),
    Assign(GlobalId, hir::Expr),
    Print,
    Halt(Option<hir::Expr>),
}

pub(crate) fn lower_pipeline(
    transformer: &mut Transformer,
    pipeline: &Pipeline,
    input: &SlotTypes,
) -> Result<(LoweredPipeline, SlotTypes)> {
    let mut current = input.clone();
    let mut upstream = "the pipeline input".to_string();
    let mut links = Vec::with_capacity(pipeline.links.len());
    for Link { slot, guard, node } in &pipeline.links {
        let selected = current.select(slot.as_deref(), &upstream)?;
        let node = match node {
            Node::Stage(stage) => {
                let (op, output) = lower_stage(transformer, stage, selected)?;
                current = output;
                upstream = format!("stage `{}`", stage.name);
                LoweredNode::Stage(op)
            }
            Node::Fork(branches) => {
                // a fork without a slot hands every branch the whole map
                let branch_input = match slot {
                    None => current.clone(),
                    Some(_) => SlotTypes::single(selected),
                };
                let branches = branches
                    .iter()
                    .map(|branch| lower_pipeline(transformer, branch, &branch_input).map(|(b, _)| b))
                    .collect::<Result<Vec<_>>>()?;
                LoweredNode::Fork(branches)
            }
        };
        links.push(LoweredLink {
            slot: slot.clone(),
            guard: *guard,
            node,
        });
    }
    Ok((LoweredPipeline { links }, current))
}

fn lower_stage(
    transformer: &mut Transformer,
    stage: &Stage,
    input: Option<Type>,
) -> Result<(StageOp, SlotTypes)> {
    let passthrough = SlotTypes::single(input.clone());
    match &stage.kind {
        StageKind::Expr(expr) => {
            let expr = match &input {
                Some(ty) => transformer.transform_stage(expr, ty)?,
                None => transformer.transform_without_input(expr)?,
            };
            let output = Some(expr.ty.clone()).filter(|ty| !ty.is_void());
            Ok((StageOp::Expr(expr), SlotTypes::single(output)))
        }
        StageKind::Filter(pred) => {
            let ty = required_input(stage, &input)?;
            let pred = predicate(transformer, stage, pred, ty)?;
            Ok((StageOp::Filter(pred), passthrough))
        }
        StageKind::Partition(pred) => {
            let ty = required_input(stage, &input)?;
            let pred = predicate(transformer, stage, pred, ty)?;
            let output = SlotTypes {
                default: Some(ty.clone()),
                named: vec![(PASS.to_string(), ty.clone()), (FAIL.to_string(), ty.clone())],
            };
            Ok((StageOp::Partition(pred), output))
        }
        StageKind::Branch(arms) => {
            let ty = required_input(stage, &input)?;
            let mut lowered: Vec<(String, hir::Expr)> = Vec::with_capacity(arms.len());
            for (name, arm) in arms {
                if lowered.iter().any(|(existing, _)| existing == name) {
                    structural!(arm.span, "stage `{}` declares slot `{}` twice", stage.name, name);
                }
                lowered.push((name.clone(), transformer.transform_with_input(arm, ty)?));
            }
            let output = SlotTypes {
                default: input.clone(),
                named: lowered
                    .iter()
                    .map(|(name, arm)| (name.clone(), arm.ty.clone()))
                    .collect(),
            };
            Ok((StageOp::Branch(lowered), output))
        }
        StageKind::Cell(name) => match transformer.lookup_global(name) {
            Some((id, ty)) => Ok((StageOp::Cell(id, ty.clone()), SlotTypes::single(Some(ty)))),
            None => not_found!(Span::null(), "no module variable `{}` for stage `{}`", name, stage.name),
        },
        StageKind::Assign { global, value } => {
            let value = match &input {
                Some(ty) => transformer.transform_with_input(value, ty)?,
                None => transformer.transform_without_input(value)?,
            };
            if value.ty.is_void() {
                type_mismatch!(value.span, "cannot store a void value into `{}`", global);
            }
            let id = match transformer.lookup_global(global) {
                Some((id, ty)) => {
                    ensure_type(value.span, &format!("assignment to `{}`", global), &ty, &value.ty)?;
                    id
                }
                None => transformer.declare_global(global, value.ty.clone()),
            };
            Ok((StageOp::Assign(id, value), passthrough))
        }
        StageKind::Print => {
            required_input(stage, &input)?;
            Ok((StageOp::Print, passthrough))
        }
        StageKind::Halt(cond) => {
            let cond = match (cond, &input) {
                (Some(cond), Some(ty)) => Some(predicate(transformer, stage, cond, ty)?),
                (Some(cond), None) => {
                    let cond = transformer.transform_without_input(cond)?;
                    ensure_type(cond.span, "halt condition", &Type::bool(), &cond.ty)?;
                    Some(cond)
                }
                (None, _) => None,
            };
            Ok((StageOp::Halt(cond), passthrough))
        }
    }
}

fn required_input<'t>(stage: &Stage, input: &'t Option<Type>) -> Result<&'t Type> {
    match input {
        Some(ty) => Ok(ty),
        None => structural!(Span::null(), "stage `{}` has no input value", stage.name),
    }
}

fn predicate(
    transformer: &mut Transformer,
    stage: &Stage,
    pred: &ast::Expr,
    input: &Type,
) -> Result<hir::Expr> {
    let pred = transformer.transform_with_input(pred, input)?;
    ensure_type(
        pred.span,
        &format!("predicate of stage `{}`", stage.name),
        &Type::bool(),
        &pred.ty,
    )?;
    Ok(pred)
}
