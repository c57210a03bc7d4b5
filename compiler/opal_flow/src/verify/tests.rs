#![allow(clippy::expect_used, reason = "tests can panic")]

use pretty_assertions::assert_eq;

use opal_bind::testing::Fixture;
use opal_ir::syntax::{SynCatch, SynStmtKind};
use opal_ir::{ConstantValue, OpNode, Span, SynStmtId, TypeId};

use super::*;
use crate::graph::RegionId;
use crate::test_helpers::{b, build};

fn malformed_message(result: Result<(), FlowError>) -> String {
    match result {
        Err(FlowError::Malformed(message)) => message,
        other => panic!("expected a malformed graph, got {other:?}"),
    }
}

fn empty_body() -> ControlFlowGraph {
    let mut f = Fixture::new("{ }");
    let open = f.find("{");
    let close = f.find("}");
    let body = f.block(open, &[], close);
    build(&f, body)
}

/// `{ return; }`: entry, one block, exit.
fn one_block() -> ControlFlowGraph {
    let mut f = Fixture::new("{ return; }");
    let open = f.find("{");
    let ret = f.find("return;");
    let ret = f.stmt(SynStmtKind::Return(None), ret);
    let close = f.find("}");
    let body = f.block(open, &[ret], close);
    build(&f, body)
}

/// `try { } catch { } finally { }` with the handlers chosen by the flags.
fn guarded(with_catch: bool, with_finally: bool) -> ControlFlowGraph {
    let mut f = Fixture::new("try { } catch { } finally { }");
    let whole = f.span_of(&f.source.clone());
    let empty = |f: &mut Fixture| -> SynStmtId {
        let open = f.find("{");
        let close = f.find("}");
        f.block(open, &[], close)
    };
    let body = empty(&mut f);
    let catch_start = f.find("catch");
    let handler = empty(&mut f);
    let catches = if with_catch {
        f.catches(&[SynCatch {
            exception_type: None,
            local: None,
            body: handler,
            span: catch_start.merge(f.stmt_span(handler)),
        }])
    } else {
        opal_ir::syntax::SynCatchRange::EMPTY
    };
    f.skip("finally");
    let finally = empty(&mut f);
    let stmt = f.stmt(
        SynStmtKind::Try {
            body,
            catches,
            finally: with_finally.then_some(finally),
        },
        whole,
    );
    build(&f, stmt)
}

fn literal(graph: &mut ControlFlowGraph) -> OpId {
    graph.ops.push(
        OpNode::new(OpKind::Literal, Some(TypeId::INT32), Span::DUMMY)
            .with_constant(Some(ConstantValue::Int32(0))),
    )
}

#[test]
fn built_graphs_verify() {
    assert_eq!(verify(&empty_body()), Ok(()));
    assert_eq!(verify(&one_block()), Ok(()));
    assert_eq!(verify(&guarded(true, true)), Ok(()));
}

#[test]
fn stale_predecessors_are_rejected() {
    let mut graph = empty_body();
    graph.blocks[1].predecessors.clear();
    let message = malformed_message(verify(&graph));
    assert!(message.contains("predecessors"), "{message}");
}

#[test]
fn ordinals_must_match_positions() {
    let mut graph = one_block();
    graph.blocks[1].ordinal = b(5);
    let message = malformed_message(verify(&graph));
    assert!(message.contains("ordinal"), "{message}");
}

#[test]
fn only_the_exit_may_lack_a_successor() {
    let mut graph = one_block();
    graph.blocks[1].fall_through = None;
    graph.blocks[2].predecessors.clear();
    let message = malformed_message(verify(&graph));
    assert!(message.contains("no successor"), "{message}");
}

#[test]
fn block_outside_its_region_is_rejected() {
    let mut graph = guarded(true, false);
    // B3 follows the statement; the catch region holds only B2.
    let catch = graph
        .regions_of_kind(RegionKind::Catch)
        .next()
        .map(|region| region.id)
        .expect("catch region");
    graph.blocks[3].region = catch;
    let message = malformed_message(verify(&graph));
    assert!(message.contains("outside its region"), "{message}");
}

#[test]
fn handler_entry_with_a_predecessor_is_rejected() {
    let mut graph = guarded(true, false);
    // Send the protected block into the catch handler instead of past it.
    let after = graph.blocks[1]
        .fall_through
        .as_ref()
        .and_then(|branch| branch.destination)
        .expect("protected block continues after the statement");
    assert_eq!(after, b(3));
    if let Some(branch) = graph.blocks[1].fall_through.as_mut() {
        branch.destination = Some(b(2));
    }
    graph.blocks[2].predecessors = vec![b(1)];
    graph.blocks[3].predecessors = vec![b(2)];

    let message = malformed_message(verify(&graph));
    assert!(message.contains("entered by a branch"), "{message}");
}

#[test]
fn regular_edge_out_of_finally_is_rejected() {
    let mut graph = guarded(false, true);
    // B1 protected, B2 finally, B3 after.
    if let Some(branch) = graph.blocks[2].fall_through.as_mut() {
        branch.semantics = BranchSemantics::Regular;
        branch.destination = Some(b(3));
    }
    graph.blocks[3].predecessors = vec![b(1), b(2)];

    let message = malformed_message(verify(&graph));
    assert!(message.contains("out of finally"), "{message}");
}

#[test]
fn capture_read_before_it_is_produced() {
    let mut graph = one_block();
    let id = CaptureId::new(7);
    let read = graph.ops.push(OpNode::new(
        OpKind::FlowCaptureReference { id },
        Some(TypeId::INT32),
        Span::DUMMY,
    ));
    graph.blocks[1].statements.insert(0, read);

    assert_eq!(
        verify(&graph),
        Err(FlowError::CaptureWithoutProducer { id })
    );
}

#[test]
fn capture_must_belong_to_a_region() {
    let mut graph = one_block();
    let id = CaptureId::new(0);
    let value = literal(&mut graph);
    let capture = graph.ops.push(OpNode::new(
        OpKind::FlowCapture { id, value },
        None,
        Span::DUMMY,
    ));
    graph.blocks[1].statements.insert(0, capture);
    let message = malformed_message(verify(&graph));
    assert!(message.contains("belongs to no region"), "{message}");

    graph.regions[0].captures.push(id);
    assert_eq!(verify(&graph), Ok(()));
    assert_eq!(graph.region(RegionId::ROOT).captures, vec![id]);
}
