#![no_main]

//! Feeds arbitrary stored values and instructions through the pure engine.
//!
//! Checks: `apply` never panics, never mutates its input, and in-place
//! actions (update/delete/replace) never grow a collection.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::json;

use mirage_core::engine::apply;
use mirage_core::entity::{Entity, identify_by};
use mirage_core::instruction::{Instruction, Patch, Selector};
use mirage_core::value::StoredValue;

#[derive(Arbitrary, Debug)]
struct FuzzItem {
    id: u8,
    v: i32,
}

impl FuzzItem {
    fn entity(&self) -> Entity {
        json!({"id": self.id.to_string(), "v": self.v})
    }
}

#[derive(Arbitrary, Debug)]
enum FuzzShape {
    Collection(Vec<FuzzItem>),
    Single(FuzzItem),
    Pages(Vec<Vec<FuzzItem>>),
}

#[derive(Arbitrary, Debug)]
enum FuzzOp {
    Prepend(FuzzItem),
    Append(FuzzItem),
    UpdateById(u8),
    UpdateBelow(i32),
    DeleteById(u8),
    DeleteBelow(i32),
    ReplaceById(u8, FuzzItem),
    EmptySelectorDelete,
}

#[derive(Arbitrary, Debug)]
struct Case {
    shape: FuzzShape,
    op: FuzzOp,
}

fn value_of(shape: &FuzzShape) -> StoredValue {
    match shape {
        FuzzShape::Collection(items) => {
            StoredValue::collection(items.iter().map(FuzzItem::entity))
        }
        FuzzShape::Single(item) => StoredValue::single(item.entity()),
        FuzzShape::Pages(pages) => {
            StoredValue::pages(pages.iter().map(|p| p.iter().map(FuzzItem::entity).collect()))
        }
    }
}

fn instruction_of(op: &FuzzOp) -> Instruction {
    match op {
        FuzzOp::Prepend(item) => Instruction::prepend(item.entity()),
        FuzzOp::Append(item) => Instruction::append(item.entity()),
        FuzzOp::UpdateById(id) => Instruction::update(
            Selector::by_id(id.to_string()),
            Patch::Merge(json!({"touched": true})),
        ),
        FuzzOp::UpdateBelow(cut) => {
            let cut = *cut;
            Instruction::update(
                Selector::by_predicate(move |e| e["v"].as_i64().unwrap_or(0) < i64::from(cut)),
                Patch::transform(|e| {
                    let mut out = e.clone();
                    out["v"] = json!(0);
                    out
                }),
            )
        }
        FuzzOp::DeleteById(id) => Instruction::delete(Selector::by_id(id.to_string())),
        FuzzOp::DeleteBelow(cut) => {
            let cut = *cut;
            Instruction::delete(Selector::by_predicate(move |e| {
                e["v"].as_i64().unwrap_or(0) < i64::from(cut)
            }))
        }
        FuzzOp::ReplaceById(id, item) => {
            Instruction::replace(Selector::by_id(id.to_string()), item.entity())
        }
        FuzzOp::EmptySelectorDelete => Instruction::delete(Selector::none()),
    }
}

fuzz_target!(|case: Case| {
    let value = value_of(&case.shape);
    let before = value.clone();
    let instruction = instruction_of(&case.op);
    let identify = identify_by("id");

    let next = apply(&value, &instruction, Some(&identify));

    assert_eq!(value, before, "apply must not mutate its input");

    let grew = matches!(
        case.op,
        FuzzOp::Prepend(_) | FuzzOp::Append(_)
    );
    if !grew {
        assert!(
            next.item_count() <= before.item_count(),
            "in-place actions never grow a value"
        );
    }
});
