use super::*;

#[test]
fn test_error_code_display() {
    assert_eq!(ErrorCode::CS0847.to_string(), "CS0847");
    assert_eq!(ErrorCode::E9001.as_str(), "E9001");
}

#[test]
fn test_all_variants_classified() {
    for code in ErrorCode::ALL {
        let classes = [
            code.is_bind_error(),
            code.is_flow_error(),
            code.is_internal_error(),
        ];
        assert_eq!(
            classes.iter().filter(|c| **c).count(),
            1,
            "{code} must belong to exactly one phase"
        );
    }
}

#[test]
fn test_construct_argument_errors_are_bind_errors() {
    for code in ErrorCode::ALL {
        if code.is_construct_argument_error() {
            assert!(code.is_bind_error(), "{code}");
        }
    }
    assert!(ErrorCode::CS9405.is_construct_argument_error());
    assert!(!ErrorCode::CS0847.is_construct_argument_error());
}

#[test]
fn test_parse_round_trips_every_code() {
    for code in ErrorCode::ALL {
        assert_eq!(code.as_str().parse::<ErrorCode>(), Ok(*code));
    }
    assert_eq!("cs0159".parse::<ErrorCode>(), Ok(ErrorCode::CS0159));
    assert_eq!("CS9999".parse::<ErrorCode>(), Err(()));
}
