#![allow(clippy::expect_used, reason = "Tests can panic")]
//! End-to-end scenarios: resolved syntax through the IR builder into a
//! flow graph.

use pretty_assertions::assert_eq;

use opal_bind::testing::Fixture;
use opal_diagnostic::ErrorCode;
use opal_flow::{
    build_graph, BasicBlock, BlockId, BranchSemantics, ControlFlowGraph, DumpContext, FlowContext,
    FlowOptions, RegionKind,
};
use opal_ir::syntax::{SynExprKind, SynStmtKind};
use opal_ir::{CaptureId, ConstantValue, OpId, OpKind, SynStmtId, TypeId};

fn build(f: &Fixture, body: SynStmtId) -> ControlFlowGraph {
    let bound = f.bind_body(body);
    assert!(bound.diagnostics.is_empty(), "{:?}", bound.diagnostics);
    let ctx = FlowContext::new(&f.types, &f.symbols, &f.interner);
    build_graph(&ctx, &bound.ops, bound.root, &FlowOptions::default())
        .expect("flow graph should build")
}

fn dump(f: &Fixture, graph: &ControlFlowGraph) -> String {
    graph.dump(&DumpContext::new(&f.types, &f.symbols, &f.interner).with_source(&f.source))
}

fn codes(graph: &ControlFlowGraph) -> Vec<ErrorCode> {
    graph.diagnostics.iter().map(|d| d.code).collect()
}

fn next(block: &BasicBlock) -> Option<BlockId> {
    block.fall_through.as_ref().and_then(|branch| branch.destination)
}

fn capture(graph: &ControlFlowGraph, stmt: OpId) -> (CaptureId, OpId) {
    match graph.ops.kind(stmt) {
        OpKind::FlowCapture { id, value } => (id, value),
        other => panic!("expected a flow capture, found {other:?}"),
    }
}

/// Look through implicit conversions.
fn strip(graph: &ControlFlowGraph, mut op: OpId) -> OpId {
    while let OpKind::Conversion { operand, .. } = graph.ops.kind(op) {
        op = operand;
    }
    op
}

/// The value assigned by `ExpressionStatement(SimpleAssignment(_, value))`.
fn assigned_value(graph: &ControlFlowGraph, stmt: OpId) -> OpId {
    let OpKind::ExpressionStatement { expr } = graph.ops.kind(stmt) else {
        panic!("expected an expression statement");
    };
    let OpKind::SimpleAssignment { value, .. } = graph.ops.kind(expr) else {
        panic!("expected an assignment");
    };
    strip(graph, value)
}

/// Every `Invalid` statement in the graph.
fn invalid_statements(graph: &ControlFlowGraph) -> usize {
    graph
        .blocks
        .iter()
        .flat_map(|block| &block.statements)
        .filter(|&&stmt| matches!(graph.ops.kind(stmt), OpKind::Invalid { .. }))
        .count()
}

fn labeled_empty(f: &mut Fixture, label: &str, text: &str) -> SynStmtId {
    let span = f.find(text);
    let name = f.name(label);
    let empty = f.stmt(SynStmtKind::Empty, span);
    f.stmt(SynStmtKind::Labeled { label: name, body: empty }, span)
}

fn goto(f: &mut Fixture, label: &str, text: &str) -> SynStmtId {
    let span = f.find(text);
    let name = f.name(label);
    f.stmt(SynStmtKind::Goto(name), span)
}

fn bare_return(f: &mut Fixture) -> SynStmtId {
    let span = f.find("return;");
    f.stmt(SynStmtKind::Return(None), span)
}

#[test]
fn construct_argument_is_captured_before_the_element_branch() {
    let mut f = Fixture::new("s = [with(c), b ? 1 : 2];");
    let set = f.hash_set(TypeId::INT32);
    let s = f.param("s", set);
    let c = f.param("c", TypeId::INT32);
    let b = f.param("b", TypeId::BOOL);
    let target = f.param_ref(s);
    let open = f.find("[");
    let keyword = f.find("with");
    f.skip("(");
    let capacity = f.param_ref(c);
    let arg = f.arg(capacity);
    let paren = f.find(")");
    let clause = f.with_clause(keyword, &[arg], paren);
    let cond = f.param_ref(b);
    let when_true = f.int(1);
    let when_false = f.int(2);
    let element = f.expr(
        SynExprKind::Conditional {
            cond,
            when_true,
            when_false,
        },
        f.expr_span(cond).merge(f.expr_span(when_false)),
        Some(TypeId::INT32),
    );
    let close = f.find("]");
    let literal = f.collection(open, Some(clause), &[element], close, Some(set));
    let assign = f.expr(
        SynExprKind::Assign {
            target,
            value: literal,
        },
        f.expr_span(target).merge(close),
        Some(set),
    );
    let semi = f.find(";");
    let stmt = f.expr_stmt(assign, semi);
    let graph = build(&f, stmt);

    // B1 evaluates the target and the capacity, then tests `b`.
    let first = graph.block(BlockId::new(1));
    let ids: Vec<u32> = first
        .statements
        .iter()
        .map(|&s| capture(&graph, s).0.raw())
        .collect();
    assert_eq!(ids, vec![0, 1]);
    let (_, capacity) = capture(&graph, first.statements[1]);
    assert!(matches!(graph.ops.kind(capacity), OpKind::ParameterReference(_)));
    assert!(first.conditional.is_some());

    // Both arms feed one capture.
    for arm in [2, 3] {
        let block = graph.block(BlockId::new(arm));
        assert_eq!(capture(&graph, block.statements[0]).0, CaptureId::new(2));
        assert_eq!(next(block), Some(BlockId::new(4)));
    }

    let merged = graph.block(BlockId::new(4));
    let OpKind::CollectionExpression {
        construct_method,
        construct_args,
        elements,
    } = graph.ops.kind(assigned_value(&graph, merged.statements[0]))
    else {
        panic!("expected the collection expression");
    };
    assert!(construct_method.is_some());
    let args = graph.ops.list(construct_args);
    assert_eq!(args.len(), 1);
    let OpKind::Argument { value, .. } = graph.ops.kind(args[0]) else {
        panic!("expected an argument");
    };
    assert_eq!(
        graph.ops.kind(strip(&graph, value)),
        OpKind::FlowCaptureReference {
            id: CaptureId::new(1)
        }
    );
    let elements = graph.ops.list(elements);
    assert_eq!(
        graph.ops.kind(strip(&graph, elements[0])),
        OpKind::FlowCaptureReference {
            id: CaptureId::new(2)
        }
    );
    assert_eq!(graph.capture_count, 3);
    assert_eq!(graph.region(opal_flow::RegionId::new(1)).captures.len(), 3);
}

#[test]
fn constant_positions_stay_in_place_around_a_branch() {
    let mut f = Fixture::new("a = new int[2] { 1, b ? 2 : 3 };");
    let array = f.types.array(TypeId::INT32, 1);
    let a = f.param("a", array);
    let b = f.param("b", TypeId::BOOL);
    let target = f.param_ref(a);
    let new = f.find("new");
    let size = f.int(2);
    let open = f.find("{");
    let one = f.int(1);
    let cond = f.param_ref(b);
    let when_true = f.int(2);
    let when_false = f.int(3);
    let element = f.expr(
        SynExprKind::Conditional {
            cond,
            when_true,
            when_false,
        },
        f.expr_span(cond).merge(f.expr_span(when_false)),
        Some(TypeId::INT32),
    );
    let close = f.find("}");
    let init = f.initializer(open, &[one, element], close);
    let creation = f.array_creation(new, TypeId::INT32, 1, &[size], Some(init), close);
    let assign = f.expr(
        SynExprKind::Assign {
            target,
            value: creation,
        },
        f.expr_span(target).merge(close),
        Some(array),
    );
    let semi = f.find(";");
    let stmt = f.expr_stmt(assign, semi);
    let graph = build(&f, stmt);

    // Only the assignment target needs a capture before the split.
    assert_eq!(graph.capture_count, 2);
    let first = graph.block(BlockId::new(1));
    assert_eq!(first.statements.len(), 1);
    assert_eq!(capture(&graph, first.statements[0]).0, CaptureId::new(0));

    let merged = graph.block(BlockId::new(4));
    let OpKind::ArrayCreation { sizes, initializer } =
        graph.ops.kind(assigned_value(&graph, merged.statements[0]))
    else {
        panic!("expected the array creation");
    };
    let sizes = graph.ops.list(sizes);
    assert_eq!(graph.ops.constant(sizes[0]), Some(ConstantValue::Int32(2)));
    let OpKind::ArrayInitializer { elements } = graph.ops.kind(initializer) else {
        panic!("expected the initializer");
    };
    let elements = graph.ops.list(elements);
    assert_eq!(
        graph.ops.constant(strip(&graph, elements[0])),
        Some(ConstantValue::Int32(1))
    );
    assert_eq!(
        graph.ops.kind(strip(&graph, elements[1])),
        OpKind::FlowCaptureReference {
            id: CaptureId::new(1)
        }
    );
    assert!(!graph.ops.is_invalid(initializer));
}

#[test]
fn resolved_goto_is_one_edge_and_no_invalid_node() {
    let mut f = Fixture::new("{ goto L; return; L: ; }");
    let open = f.find("{");
    let jump = goto(&mut f, "L", "goto L;");
    let ret = bare_return(&mut f);
    let label = labeled_empty(&mut f, "L", "L: ;");
    let close = f.find("}");
    let body = f.block(open, &[jump, ret, label], close);
    let graph = build(&f, body);

    assert!(graph.diagnostics.is_empty());
    assert_eq!(invalid_statements(&graph), 0);
    let goto_block = graph.block(BlockId::new(1));
    assert_eq!(next(goto_block), Some(BlockId::new(3)));
    assert!(goto_block.conditional.is_none());
    assert_eq!(graph.block(BlockId::new(3)).predecessors, vec![BlockId::new(1)]);
}

#[test]
fn undeclared_goto_falls_through() {
    let mut f = Fixture::new("{ goto M; return; }");
    let open = f.find("{");
    let jump = goto(&mut f, "M", "goto M;");
    let ret = bare_return(&mut f);
    let close = f.find("}");
    let body = f.block(open, &[jump, ret], close);
    let graph = build(&f, body);

    assert_eq!(codes(&graph), vec![ErrorCode::CS0159]);
    assert_eq!(invalid_statements(&graph), 1);
    // The invalid jump and the return share a block: no edge was added.
    assert_eq!(graph.blocks.len(), 3);
    let block = graph.block(BlockId::new(1));
    assert_eq!(block.statements.len(), 1);
    assert_eq!(
        block.fall_through.as_ref().map(|branch| branch.semantics),
        Some(BranchSemantics::Return)
    );
}

#[test]
fn code_behind_a_duplicate_label_is_kept_unreachable() {
    let mut f = Fixture::new("{ goto L; L: ; return; L: ; }");
    let open = f.find("{");
    let jump = goto(&mut f, "L", "goto L;");
    let first = labeled_empty(&mut f, "L", "L: ;");
    let ret = bare_return(&mut f);
    let second = labeled_empty(&mut f, "L", "L: ;");
    let close = f.find("}");
    let body = f.block(open, &[jump, first, ret, second], close);
    let graph = build(&f, body);

    assert_eq!(codes(&graph), vec![ErrorCode::CS0140]);
    assert_eq!(graph.blocks.len(), 5);
    assert_eq!(next(graph.block(BlockId::new(1))), Some(BlockId::new(2)));
    let dead = graph.block(BlockId::new(3));
    assert!(!dead.is_reachable);
    assert!(dead.predecessors.is_empty());
    assert!(dump(&f, &graph).contains("Block[B3] - Block [UnReachable]"));
    assert!(graph.exit().is_reachable);
}

#[test]
fn no_edge_leaves_a_finally_abnormally() {
    let mut f = Fixture::new("{ L: ; try { } finally { goto L; } }");
    let open = f.find("{");
    let label = labeled_empty(&mut f, "L", "L: ;");
    let start = f.find("try");
    let body_open = f.find("{");
    let body_close = f.find("}");
    let body = f.block(body_open, &[], body_close);
    f.skip("finally");
    let finally_open = f.find("{");
    let jump = goto(&mut f, "L", "goto L;");
    let finally_close = f.find("}");
    let finally = f.block(finally_open, &[jump], finally_close);
    let guarded = f.stmt(
        SynStmtKind::Try {
            body,
            catches: opal_ir::syntax::SynCatchRange::EMPTY,
            finally: Some(finally),
        },
        start.merge(finally_close),
    );
    let close = f.find("}");
    let outer = f.block(open, &[label, guarded], close);
    let graph = build(&f, outer);

    assert_eq!(codes(&graph), vec![ErrorCode::CS0157]);
    let handler = graph
        .regions_of_kind(RegionKind::Finally)
        .next()
        .expect("finally region");
    for block in &graph.blocks {
        if !handler.contains(block.ordinal) {
            continue;
        }
        let edges = block
            .conditional
            .iter()
            .map(|c| &c.branch)
            .chain(block.fall_through.iter());
        for branch in edges {
            let escapes = branch
                .destination
                .is_some_and(|dest| !handler.contains(dest));
            assert!(!escapes, "B{} leaves the finally handler", block.ordinal);
        }
    }
}

#[test]
fn nested_lambda_numbers_its_own_captures() {
    let mut f = Fixture::new("p = b ? 1 : 2; () => { p = b ? 3 : 4; };");
    let p = f.param("p", TypeId::INT32);
    let b = f.param("b", TypeId::BOOL);
    let method = f.function(opal_ir::MethodKind::Lambda, "lambda", TypeId::VOID);

    let conditional_assignment = |f: &mut Fixture, values: (i32, i32)| -> SynStmtId {
        let target = f.param_ref(p);
        let cond = f.param_ref(b);
        let when_true = f.int(values.0);
        let when_false = f.int(values.1);
        let value = f.expr(
            SynExprKind::Conditional {
                cond,
                when_true,
                when_false,
            },
            f.expr_span(cond).merge(f.expr_span(when_false)),
            Some(TypeId::INT32),
        );
        let assign = f.expr(
            SynExprKind::Assign { target, value },
            f.expr_span(target).merge(f.expr_span(when_false)),
            Some(TypeId::INT32),
        );
        let semi = f.find(";");
        f.expr_stmt(assign, semi)
    };

    let outer_open = f.span_of("p = b");
    let first = conditional_assignment(&mut f, (1, 2));
    let start = f.find("()");
    let open = f.find("{");
    let inner = conditional_assignment(&mut f, (3, 4));
    let close = f.find("}");
    let lambda_body = f.block(open, &[inner], close);
    let lambda = f.expr(
        SynExprKind::Lambda {
            method,
            body: lambda_body,
        },
        start.merge(close),
        None,
    );
    let semi = f.find(";");
    let second = f.expr_stmt(lambda, semi);
    let body = f.block(outer_open, &[first, second], semi);
    let graph = build(&f, body);

    assert_eq!(graph.capture_count, 2);
    assert_eq!(graph.nested.len(), 1);
    let nested = &graph.nested[0].graph;
    assert_eq!(nested.capture_count, 2);
    let first_capture = nested
        .blocks
        .iter()
        .flat_map(|block| &block.statements)
        .find_map(|&stmt| match nested.ops.kind(stmt) {
            OpKind::FlowCapture { id, .. } => Some(id),
            _ => None,
        });
    assert_eq!(first_capture, Some(CaptureId::new(0)));
}

/// `{ <label> try { goto L; } finally { } }`, where `<label>` is either
/// `L:` labeling the try itself or `L: ;` in front of it.
fn retry_loop(source: &str, label_owns_try: bool) -> (Fixture, ControlFlowGraph) {
    let mut f = Fixture::new(source);
    let open = f.find("{");
    let label_start = f.find("L:");
    let label_name = f.name("L");
    let empty = (!label_owns_try).then(|| {
        let semi = f.find(";");
        let empty = f.stmt(SynStmtKind::Empty, semi);
        f.stmt(
            SynStmtKind::Labeled {
                label: label_name,
                body: empty,
            },
            label_start.merge(semi),
        )
    });
    let start = f.find("try");
    let body_open = f.find("{");
    let jump = goto(&mut f, "L", "goto L;");
    let body_close = f.find("}");
    let body = f.block(body_open, &[jump], body_close);
    f.skip("finally");
    let finally_open = f.find("{");
    let finally_close = f.find("}");
    let finally = f.block(finally_open, &[], finally_close);
    let guarded = f.stmt(
        SynStmtKind::Try {
            body,
            catches: opal_ir::syntax::SynCatchRange::EMPTY,
            finally: Some(finally),
        },
        start.merge(finally_close),
    );
    let stmts = match empty {
        Some(labeled) => vec![labeled, guarded],
        None => {
            let span = label_start.merge(finally_close);
            vec![f.stmt(
                SynStmtKind::Labeled {
                    label: label_name,
                    body: guarded,
                },
                span,
            )]
        }
    };
    let close = f.find("}");
    let outer = f.block(open, &stmts, close);
    let graph = build(&f, outer);
    (f, graph)
}

fn assert_goto_leaves_through_finally(graph: &ControlFlowGraph) {
    assert!(graph.diagnostics.is_empty());
    assert_eq!(opal_flow::verify(graph), Ok(()));

    let group = graph
        .regions_of_kind(RegionKind::TryAndFinally)
        .next()
        .expect("try/finally region");
    let protected = graph
        .regions_of_kind(RegionKind::Try)
        .next()
        .expect("try region");
    let handler = graph
        .regions_of_kind(RegionKind::Finally)
        .next()
        .expect("finally region");

    // The label keeps its own block in front of the protected region.
    let label = BlockId::new(1);
    assert_eq!(graph.block(label).region, graph.root_region().id);
    assert!(!group.contains(label));
    assert_eq!(next(graph.block(label)), Some(protected.first_block));

    let jump = graph
        .block(protected.first_block)
        .fall_through
        .as_ref()
        .expect("goto edge");
    assert_eq!(jump.semantics, BranchSemantics::Regular);
    assert_eq!(jump.destination, Some(label));
    assert_eq!(jump.finalizing.as_slice(), &[handler.id]);
    assert_eq!(jump.leaving.as_slice(), &[protected.id, group.id]);
    assert!(jump.entering.is_empty());
    assert_eq!(
        graph.block(label).predecessors,
        vec![BlockId::new(0), protected.first_block]
    );
}

#[test]
fn goto_to_the_label_of_its_own_try_runs_the_finally() {
    let (f, graph) = retry_loop("{ L: try { goto L; } finally { } }", true);
    assert_goto_leaves_through_finally(&graph);
    let text = dump(&f, &graph);
    assert!(text.contains("Finalizing: {R3}"), "{text}");
    assert!(text.contains("Leaving: {R2} {R1}"), "{text}");
}

#[test]
fn goto_to_a_label_before_the_try_runs_the_finally() {
    let (_, graph) = retry_loop("{ L: ; try { goto L; } finally { } }", false);
    assert_goto_leaves_through_finally(&graph);
}
