mod common;

use common::fixture;
use mirror_rs::value::Value;
use mirror_rs::{MirrorConfig, ReflectionError};

#[test]
fn variadic_trailing_arguments_are_packed() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let object = f.universe.object_type();

    let args = [
        Value::from("a"),
        Value::I32(2),
        Value::Char('c'),
        Value::from("d"),
        Value::Bool(true),
        Value::F64(1.5),
    ];
    let packed = mirror.invoke_method(&gadget, "pack_echo", &args).unwrap();
    let expected = Value::new_array(
        object,
        vec![
            Value::I32(2),
            Value::Char('c'),
            Value::from("d"),
            Value::Bool(true),
            Value::F64(1.5),
        ],
    );
    assert_eq!(packed, expected);

    // zero trailing arguments become a zero-length array
    let empty = mirror
        .invoke_method(&gadget, "pack_echo", &[Value::from("a")])
        .unwrap();
    assert_eq!(empty, Value::new_array(object, vec![]));
}

#[test]
fn exact_array_argument_passes_through_unpacked() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let object = f.universe.object_type();

    let original = Value::new_array(object, vec![Value::from("x"), Value::from("y")]);
    let result = mirror
        .invoke_method(&gadget, "pack_echo", &[Value::from("a"), original.clone()])
        .unwrap();
    match (&result, &original) {
        (Value::Array(out), Value::Array(input)) => assert!(out.ptr_eq(input)),
        _ => panic!("expected the original array back, got {result:?}"),
    }
}

#[test]
fn null_arguments_match_any_parameter() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let object = f.universe.object_type();

    let result = mirror
        .invoke_method(
            &gadget,
            "pack_echo",
            &[Value::from("a"), Value::Null, Value::from("b")],
        )
        .unwrap();
    assert_eq!(
        result,
        Value::new_array(object, vec![Value::Null, Value::from("b")])
    );
}

#[test]
fn boxed_and_value_arguments_interchange() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    // value-kind parameters accept boxed arguments
    let from_boxed = mirror
        .invoke_method(
            &gadget,
            "boxed_parameters",
            &[Value::I32(1).boxed(), Value::F64(5.5)],
        )
        .unwrap();
    assert_eq!(from_boxed, Value::F64(6.5));

    // boxed-kind parameters accept value arguments
    let from_value = mirror
        .invoke_method(&gadget, "value_parameters", &[Value::I32(9)])
        .unwrap();
    assert_eq!(from_value, Value::I32(9));

    // an unrelated boxed kind does not match a value-kind parameter
    let err = mirror
        .invoke_method(
            &gadget,
            "boxed_parameters",
            &[Value::F64(1.0).boxed(), Value::F64(5.5)],
        )
        .unwrap_err();
    assert!(matches!(err, ReflectionError::MemberNotFound(_)), "{err}");
}

#[test]
fn subtype_member_shadows_supertype_member() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let described = mirror.invoke_method(&gadget, "describe", &[]).unwrap();
    assert_eq!(described, Value::from("gadget"));

    // resolving against the explicit supertype picks its declaration
    let base = mirror
        .invoke_method_as(&gadget, f.widget, "describe", &[])
        .unwrap();
    assert_eq!(base, Value::from("widget"));
}

#[test]
fn ancestor_member_is_found_by_walking() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let result = mirror.invoke_method(&gadget, "base_only", &[]).unwrap();
    assert_eq!(result, Value::I32(7));

    // the exact-owner variant never consults the ancestry
    let err = mirror
        .invoke_method_as(&gadget, f.gadget, "base_only", &[])
        .unwrap_err();
    assert!(matches!(err, ReflectionError::MemberNotFound(_)), "{err}");
}

#[test]
fn default_interface_method_is_reachable() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let greeting = mirror.invoke_method(&gadget, "greet", &[]).unwrap();
    assert_eq!(greeting, Value::from("hello from default"));
}

#[test]
fn static_invocation() {
    let f = fixture();
    let mirror = f.mirror();

    let joined = mirror
        .invoke_static_method(f.gadget, "concat", &[Value::from("x"), Value::from("y")])
        .unwrap();
    assert_eq!(joined, Value::from("xy"));

    // the member exists but is not static
    let err = mirror
        .invoke_static_method(f.gadget, "describe", &[])
        .unwrap_err();
    assert!(matches!(err, ReflectionError::MemberNotFound(_)), "{err}");

    // a static member invoked through an instance ignores the receiver
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let via_instance = mirror
        .invoke_method(&gadget, "concat", &[Value::from("a"), Value::from("b")])
        .unwrap();
    assert_eq!(via_instance, Value::from("ab"));
}

#[test]
fn invocation_failures_carry_the_cause() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let err = mirror
        .invoke_method(&gadget, "error_throwing_method", &[])
        .unwrap_err();
    match err {
        ReflectionError::InvocationFailure(msg) => assert!(msg.contains("boom"), "{msg}"),
        other => panic!("expected InvocationFailure, got {other}"),
    }
}

#[test]
fn malformed_and_missing_member_names() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let missing = mirror
        .invoke_method(&gadget, "no_such_method", &[])
        .unwrap_err();
    assert!(matches!(missing, ReflectionError::MemberNotFound(_)), "{missing}");

    let invalid = mirror
        .invoke_method(&gadget, "!invalid name!", &[])
        .unwrap_err();
    assert!(matches!(invalid, ReflectionError::IllegalArgument(_)), "{invalid}");

    let on_null = mirror.invoke_method(&Value::Null, "describe", &[]).unwrap_err();
    assert!(matches!(on_null, ReflectionError::IllegalArgument(_)), "{on_null}");
}

#[test]
fn overload_ambiguity_respects_policy() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    // both combine overloads accept (String, String)
    let err = mirror
        .invoke_method(&gadget, "combine", &[Value::from("a"), Value::from("b")])
        .unwrap_err();
    assert!(matches!(err, ReflectionError::AmbiguousCall(_)), "{err}");

    // a null first argument keeps both overloads alive too
    let err = mirror
        .invoke_method(&gadget, "combine", &[Value::Null, Value::from("b")])
        .unwrap_err();
    assert!(matches!(err, ReflectionError::AmbiguousCall(_)), "{err}");

    // with the policy enabled the first declaration wins
    let permissive = f.mirror_with(MirrorConfig::new().allow_ambiguous_calls(true));
    let chosen = permissive
        .invoke_method(&gadget, "combine", &[Value::from("a"), Value::from("b")])
        .unwrap();
    assert_eq!(chosen, Value::from("object-first"));
}

#[test]
fn covariant_return_duplicates_accept_first_declaration() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();

    let handle = mirror.invoke_method(&gadget, "get_handle", &[]).unwrap();
    assert_eq!(handle, Value::from("first"));
}

#[test]
fn spread_over_array_parameter_is_rejected_not_guessed() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let object = f.universe.object_type();

    let err = mirror
        .invoke_method(
            &gadget,
            "fingerprint",
            &[Value::from("a"), Value::from("b"), Value::from("c")],
        )
        .unwrap_err();
    assert!(matches!(err, ReflectionError::AmbiguousCall(_)), "{err}");

    // passing the array explicitly is unambiguous
    let arr = Value::new_array(object, vec![Value::from("a"), Value::from("b")]);
    let result = mirror.invoke_method(&gadget, "fingerprint", &[arr]).unwrap();
    assert_eq!(result, Value::I64(2));
}

#[test]
fn construction_with_variadic_constructor() {
    let f = fixture();
    let mirror = f.mirror();
    let string = f.universe.string_type();

    let gadget = mirror
        .new_instance(
            f.gadget,
            &[Value::from("A"), Value::from("var"), Value::from("args")],
        )
        .unwrap();
    let label = mirror.get_field_value(&gadget, "label").unwrap();
    assert_eq!(
        label,
        Value::new_array(
            string,
            vec![Value::from("A"), Value::from("var"), Value::from("args")]
        )
    );

    // with no arguments the fixed-arity constructor wins and the label
    // keeps its default
    let plain = mirror.new_instance(f.gadget, &[]).unwrap();
    assert_eq!(mirror.get_field_value(&plain, "label").unwrap(), Value::Null);
}

#[test]
fn abstract_types_cannot_be_instantiated() {
    let f = fixture();
    let mirror = f.mirror();

    let err = mirror.new_instance(f.abstract_thing, &[]).unwrap_err();
    assert!(matches!(err, ReflectionError::InstantiationFailure(_)), "{err}");
}

#[test]
fn enum_constants_resolve_by_name() {
    let f = fixture();
    let mirror = f.mirror();

    let green = mirror.get_enum(f.color, "GREEN").unwrap();
    assert_eq!(green, mirror.get_enum(f.color, "GREEN").unwrap());
    assert_eq!(green.as_enum().map(|e| e.ordinal), Some(1));

    let missing = mirror.get_enum(f.color, "MAGENTA").unwrap_err();
    assert!(matches!(missing, ReflectionError::MemberNotFound(_)), "{missing}");

    let not_an_enum = mirror.get_enum(f.widget, "RED").unwrap_err();
    assert!(matches!(not_an_enum, ReflectionError::IllegalArgument(_)), "{not_an_enum}");
}

#[test]
fn resolved_handles_are_directly_invocable() {
    let f = fixture();
    let mirror = f.mirror();
    let gadget = mirror.new_instance(f.gadget, &[]).unwrap();
    let int32 = f.universe.primitive(mirror_rs::types::ValueKind::I32);
    let float64 = f.universe.primitive(mirror_rs::types::ValueKind::F64);

    let method = mirror
        .get_method_by_name(f.gadget, "boxed_parameters", &[int32, float64])
        .unwrap();
    let result = mirror
        .invoke_resolved(&method, Some(&gadget), &[Value::I32(2), Value::F64(0.5)])
        .unwrap();
    assert_eq!(result, Value::F64(2.5));

    // receivers are type-checked against the declaring type
    let err = mirror
        .invoke_resolved(&method, Some(&Value::from("not a gadget")), &[Value::I32(1), Value::F64(0.0)])
        .unwrap_err();
    assert!(matches!(err, ReflectionError::IllegalArgument(_)), "{err}");
}
