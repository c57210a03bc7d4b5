use pretty_assertions::assert_eq;

use opal_diagnostic::ErrorCode;
use opal_ir::syntax::{SynExprKind, SynStmtKind};
use opal_ir::{BinaryOp, ConstantValue, MethodKind, OpKind, TypeId, UnaryOp};

use crate::testing::{codes, Fixture};

#[test]
fn call_fills_default_argument() {
    let mut f = Fixture::new("M(1)");
    let a = f.param_symbol("a", TypeId::INT32, None);
    let b = f.param_symbol("b", TypeId::INT32, Some(ConstantValue::Int32(5)));
    let m = f.method("M", TypeId::INT32, &[a, b]);
    let start = f.find("M");
    let one = f.int(1);
    let end = f.find(")");
    let arg = f.arg(one);
    let call = f.call(start, m, &[arg], end);
    let bound = f.bind_expr(call, None);

    assert!(bound.diagnostics.is_empty());
    assert_eq!(
        f.dump_root(&bound),
        "\
IInvocationOperation (System.Int32 C.M(System.Int32 a, [System.Int32 b = 5])) (OperationKind.Invocation, Type: System.Int32) (Syntax: 'M(1)')
  Instance Receiver:
    null
  Arguments(2):
      IArgumentOperation (ArgumentKind.Explicit, Matching Parameter: a) (OperationKind.Argument, Type: null) (Syntax: '1')
        ILiteralOperation (OperationKind.Literal, Type: System.Int32, Constant: 1) (Syntax: '1')
        InConversion: CommonConversion (Exists: True, IsIdentity: True, IsNumeric: False, IsReference: False, IsUserDefined: False) (MethodSymbol: null)
        OutConversion: CommonConversion (Exists: True, IsIdentity: True, IsNumeric: False, IsReference: False, IsUserDefined: False) (MethodSymbol: null)
      IArgumentOperation (ArgumentKind.DefaultValue, Matching Parameter: b) (OperationKind.Argument, Type: null, IsImplicit) (Syntax: 'M(1)')
        ILiteralOperation (OperationKind.Literal, Type: System.Int32, Constant: 5, IsImplicit) (Syntax: 'M(1)')
        InConversion: CommonConversion (Exists: True, IsIdentity: True, IsNumeric: False, IsReference: False, IsUserDefined: False) (MethodSymbol: null)
        OutConversion: CommonConversion (Exists: True, IsIdentity: True, IsNumeric: False, IsReference: False, IsUserDefined: False) (MethodSymbol: null)
"
    );
}

#[test]
fn call_with_too_many_arguments() {
    let mut f = Fixture::new("M(1, 2)");
    let a = f.param_symbol("a", TypeId::INT32, None);
    let m = f.method("M", TypeId::VOID, &[a]);
    let start = f.find("M");
    let one = f.int(1);
    let two = f.int(2);
    let end = f.find(")");
    let args = [f.arg(one), f.arg(two)];
    let call = f.call(start, m, &args, end);
    let bound = f.bind_expr(call, None);

    assert_eq!(
        f.diagnostics(&bound),
        vec!["(1,1): error CS1501: No overload for method 'M' takes 2 arguments"]
    );
    let OpKind::Invocation { args, .. } = bound.ops.kind(bound.root) else {
        panic!("expected an invocation");
    };
    let args = bound.ops.list(args);
    assert_eq!(args.len(), 2);
    assert!(args
        .iter()
        .all(|&a| matches!(bound.ops.kind(a), OpKind::Literal)));
}

#[test]
fn call_argument_widens() {
    let mut f = Fixture::new("M(1)");
    let a = f.param_symbol("a", TypeId::DOUBLE, None);
    let m = f.method("M", TypeId::VOID, &[a]);
    let start = f.find("M");
    let one = f.int(1);
    let end = f.find(")");
    let arg = f.arg(one);
    let call = f.call(start, m, &[arg], end);
    let bound = f.bind_expr(call, None);

    let OpKind::Invocation { args, .. } = bound.ops.kind(bound.root) else {
        panic!("expected an invocation");
    };
    let OpKind::Argument { value, .. } = bound.ops.kind(bound.ops.list(args)[0]) else {
        panic!("expected an argument");
    };
    assert_eq!(bound.ops.ty(value), Some(TypeId::DOUBLE));
    assert_eq!(bound.ops.constant(value), Some(ConstantValue::double(1.0)));
}

#[test]
fn coalesce_unwraps_nullable() {
    let mut f = Fixture::new("n ?? 0");
    let nullable = f.types.nullable(TypeId::INT32);
    let n = f.param("n", nullable);
    let left = f.param_ref(n);
    let zero = f.int(0);
    let span = f.expr_span(left).merge(f.expr_span(zero));
    let coalesce = f.expr(
        SynExprKind::Coalesce { left, right: zero },
        span,
        Some(TypeId::INT32),
    );
    let bound = f.bind_expr(coalesce, None);

    assert!(bound.diagnostics.is_empty());
    let OpKind::Coalesce {
        value,
        when_null,
        value_conversion,
    } = bound.ops.kind(bound.root)
    else {
        panic!("expected a coalesce");
    };
    assert!(value_conversion.is_identity());
    assert_eq!(bound.ops.ty(value), Some(nullable));
    assert_eq!(bound.ops.ty(when_null), Some(TypeId::INT32));
    assert_eq!(bound.ops.ty(bound.root), Some(TypeId::INT32));
}

#[test]
fn coalesce_converts_value_to_result() {
    let mut f = Fixture::new("s ?? o");
    let s = f.param("s", TypeId::STRING);
    let o = f.param("o", TypeId::OBJECT);
    let left = f.param_ref(s);
    let right = f.param_ref(o);
    let span = f.expr_span(left).merge(f.expr_span(right));
    let coalesce = f.expr(
        SynExprKind::Coalesce { left, right },
        span,
        Some(TypeId::OBJECT),
    );
    let bound = f.bind_expr(coalesce, None);

    let OpKind::Coalesce {
        value_conversion, ..
    } = bound.ops.kind(bound.root)
    else {
        panic!("expected a coalesce");
    };
    assert!(value_conversion.is_reference());
}

#[test]
fn binary_widens_narrower_operand() {
    let mut f = Fixture::new("i + l");
    let i = f.param("i", TypeId::INT32);
    let l = f.param("l", TypeId::INT64);
    let left = f.param_ref(i);
    let right = f.param_ref(l);
    let span = f.expr_span(left).merge(f.expr_span(right));
    let sum = f.expr(
        SynExprKind::Binary {
            op: BinaryOp::Add,
            left,
            right,
        },
        span,
        None,
    );
    let bound = f.bind_expr(sum, None);

    let OpKind::Binary { left, right, .. } = bound.ops.kind(bound.root) else {
        panic!("expected a binary operation");
    };
    assert!(matches!(bound.ops.kind(left), OpKind::Conversion { .. }));
    assert!(bound.ops.is_implicit(left));
    assert_eq!(bound.ops.ty(left), Some(TypeId::INT64));
    assert!(matches!(bound.ops.kind(right), OpKind::ParameterReference(_)));
    assert_eq!(bound.ops.ty(bound.root), Some(TypeId::INT64));
}

#[test]
fn comparison_is_bool() {
    let mut f = Fixture::new("i < 2");
    let i = f.param("i", TypeId::INT32);
    let left = f.param_ref(i);
    let right = f.int(2);
    let span = f.expr_span(left).merge(f.expr_span(right));
    let less = f.expr(
        SynExprKind::Binary {
            op: BinaryOp::LessThan,
            left,
            right,
        },
        span,
        None,
    );
    let bound = f.bind_expr(less, None);

    assert_eq!(bound.ops.ty(bound.root), Some(TypeId::BOOL));
}

#[test]
fn not_operand_must_be_bool() {
    let mut f = Fixture::new("!i");
    let i = f.param("i", TypeId::INT32);
    let bang = f.find("!");
    let operand = f.param_ref(i);
    let span = bang.merge(f.expr_span(operand));
    let not = f.expr(SynExprKind::Not(operand), span, None);
    let bound = f.bind_expr(not, None);

    assert_eq!(
        f.diagnostics(&bound),
        vec!["(1,2): error CS0029: Cannot implicitly convert type 'int' to 'bool'"]
    );
    let OpKind::Unary { op, .. } = bound.ops.kind(bound.root) else {
        panic!("expected a unary operation");
    };
    assert_eq!(op, UnaryOp::Not);
    assert_eq!(bound.ops.ty(bound.root), Some(TypeId::BOOL));
    assert!(bound.ops.is_invalid(bound.root));
}

#[test]
fn assignment_converts_value() {
    let mut f = Fixture::new("l = 1");
    let l = f.param("l", TypeId::INT64);
    let target = f.param_ref(l);
    let one = f.int(1);
    let span = f.expr_span(target).merge(f.expr_span(one));
    let assign = f.expr(SynExprKind::Assign { target, value: one }, span, None);
    let bound = f.bind_expr(assign, None);

    let OpKind::SimpleAssignment { value, .. } = bound.ops.kind(bound.root) else {
        panic!("expected an assignment");
    };
    assert_eq!(bound.ops.ty(value), Some(TypeId::INT64));
    assert_eq!(bound.ops.constant(value), Some(ConstantValue::Int64(1)));
    assert_eq!(bound.ops.ty(bound.root), Some(TypeId::INT64));
}

#[test]
fn error_expression_keeps_children() {
    let mut f = Fixture::new("oops(1)");
    let whole = f.span_of("oops(1)");
    let one = f.int(1);
    let children = f.list_of(&[one]);
    let error = f.expr(SynExprKind::Error { children }, whole, None);
    let bound = f.bind_expr(error, None);

    assert_eq!(codes(&bound.diagnostics), Vec::<ErrorCode>::new());
    let OpKind::Invalid { children } = bound.ops.kind(bound.root) else {
        panic!("expected an invalid operation");
    };
    assert_eq!(bound.ops.list(children).len(), 1);
    assert!(bound.ops.is_invalid(bound.root));
    assert!(!bound.ops.is_invalid(bound.ops.list(children)[0]));
}

#[test]
fn lambda_body_is_bound() {
    let mut f = Fixture::new("() => 1");
    let method = f.function(MethodKind::Lambda, "lambda", TypeId::INT32);
    let whole = f.span_of("() => 1");
    let one = f.int(1);
    let ret = f.stmt(SynStmtKind::Return(Some(one)), f.expr_span(one));
    let lambda = f.expr(SynExprKind::Lambda { method, body: ret }, whole, None);
    let bound = f.bind_expr(lambda, None);

    let OpKind::AnonymousFunction { method: bound_method, body } = bound.ops.kind(bound.root)
    else {
        panic!("expected an anonymous function");
    };
    assert_eq!(bound_method, method);
    let OpKind::Return { value } = bound.ops.kind(body) else {
        panic!("expected a return");
    };
    assert_eq!(bound.ops.constant(value), Some(ConstantValue::Int32(1)));
}

#[test]
fn conditional_access_binds_receiver_and_access() {
    let mut f = Fixture::new("s?.M()");
    let s = f.param("s", TypeId::STRING);
    let m = f.method("M", TypeId::INT32, &[]);
    let result = f.types.nullable(TypeId::INT32);
    let receiver = f.param_ref(s);
    let dot = f.find(".");
    let instance = f.expr(SynExprKind::ConditionalReceiver, dot, Some(TypeId::STRING));
    let start = f.find("M");
    let end = f.find(")");
    let access = f.expr(
        SynExprKind::Call {
            method: m,
            receiver: Some(instance),
            args: opal_ir::syntax::SynArgRange::EMPTY,
        },
        start.merge(end),
        Some(TypeId::INT32),
    );
    let whole = f.span_of("s?.M()");
    let expr = f.expr(
        SynExprKind::ConditionalAccess { receiver, access },
        whole,
        Some(result),
    );
    let bound = f.bind_expr(expr, None);

    assert!(bound.diagnostics.is_empty());
    let OpKind::ConditionalAccess {
        operation,
        when_not_null,
    } = bound.ops.kind(bound.root)
    else {
        panic!("expected a conditional access");
    };
    assert_eq!(bound.ops.ty(bound.root), Some(result));
    assert!(matches!(bound.ops.kind(operation), OpKind::ParameterReference(p) if p == s));
    let OpKind::Invocation { instance, .. } = bound.ops.kind(when_not_null) else {
        panic!("expected an invocation");
    };
    assert!(matches!(bound.ops.kind(instance), OpKind::ConditionalAccessInstance));
    assert!(bound.ops.is_implicit(instance));
    assert_eq!(bound.ops.ty(instance), Some(TypeId::STRING));
}

/// Standard conversions, except that nothing converts from the error type.
struct NoErrorConversions;

impl crate::ConversionOracle for NoErrorConversions {
    fn classify(
        &self,
        types: &opal_ir::TypePool,
        from: Option<TypeId>,
        constant: Option<ConstantValue>,
        to: TypeId,
    ) -> opal_ir::Conversion {
        if from.is_some_and(|ty| types.is_error(ty)) {
            return opal_ir::Conversion::NONE;
        }
        crate::ConversionOracle::classify(&crate::StandardConversions, types, from, constant, to)
    }
}

fn bind_error_operand(report_follow_on: bool) -> crate::BoundBody {
    let mut f = Fixture::new("broken");
    let broken = f.param("broken", TypeId::ERROR);
    let operand = f.param_ref(broken);
    let options = crate::BindOptions {
        report_follow_on,
        ..crate::BindOptions::default()
    };
    crate::bind_expr_with(
        &f.context(),
        operand,
        Some(TypeId::INT32),
        &options,
        &NoErrorConversions,
    )
}

#[test]
fn conversion_from_the_error_type_is_a_follow_on() {
    let bound = bind_error_operand(true);

    assert_eq!(codes(&bound.diagnostics), vec![ErrorCode::CS0029]);
    assert!(bound.diagnostics[0].follow_on);
    assert!(bound.ops.is_invalid(bound.root));
}

#[test]
fn follow_on_errors_can_be_left_unreported() {
    let bound = bind_error_operand(false);

    assert!(bound.diagnostics.is_empty());
    assert!(matches!(bound.ops.kind(bound.root), OpKind::Conversion { .. }));
    assert!(bound.ops.is_invalid(bound.root));
}
