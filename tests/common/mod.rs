//! Shared fixture universe for the integration tests: a small class
//! hierarchy with overloads, variadic members, interface defaults, and an
//! enum, mirroring the shapes the engine has to resolve in practice.

use std::sync::Arc;

use mirror_rs::types::{TypeId, ValueKind};
use mirror_rs::universe::{ClassSpec, ConstructorSpec, FieldSpec, InterfaceSpec, MethodSpec};
use mirror_rs::value::Value;
use mirror_rs::{Mirror, MirrorConfig, Universe};

pub struct Fixture {
    pub universe: Arc<Universe>,
    pub collection: TypeId,
    pub greeter: TypeId,
    pub int_list: TypeId,
    pub float_set: TypeId,
    pub widget: TypeId,
    pub gadget: TypeId,
    pub abstract_thing: TypeId,
    pub color: TypeId,
}

impl Fixture {
    pub fn mirror(&self) -> Mirror {
        Mirror::with_defaults(Arc::clone(&self.universe))
    }

    pub fn mirror_with(&self, config: MirrorConfig) -> Mirror {
        Mirror::new(Arc::clone(&self.universe), config)
    }
}

pub fn fixture() -> Fixture {
    let universe = Universe::new();
    let string = universe.string_type();
    let object = universe.object_type();
    let int32 = universe.primitive(ValueKind::I32);
    let int64 = universe.primitive(ValueKind::I64);
    let float64 = universe.primitive(ValueKind::F64);
    let boxed_int32 = universe.boxed(ValueKind::I32);
    let void = universe.void_type();
    let string_array = universe.array_of(string);
    let object_array = universe.array_of(object);

    let collection = universe.declare("Collection").unwrap();
    let greeter = universe.declare("Greeter").unwrap();
    let int_list = universe.declare("IntList").unwrap();
    let float_set = universe.declare("FloatSet").unwrap();
    let widget = universe.declare("Widget").unwrap();
    let gadget = universe.declare("Gadget").unwrap();
    let abstract_thing = universe.declare("AbstractThing").unwrap();
    let color = universe.declare("Color").unwrap();

    universe.define_interface(collection, InterfaceSpec::new()).unwrap();
    universe
        .define_interface(
            greeter,
            InterfaceSpec::new().method(
                MethodSpec::new("greet", string)
                    .body(|_, _, _| Ok(Value::from("hello from default"))),
            ),
        )
        .unwrap();

    universe
        .define_class(int_list, ClassSpec::new().implements(collection))
        .unwrap();
    universe
        .define_class(float_set, ClassSpec::new().implements(collection))
        .unwrap();

    universe
        .define_class(
            widget,
            ClassSpec::new()
                .field(
                    FieldSpec::new("meaning_of_life", int32)
                        .private_()
                        .initial(Value::I32(42)),
                )
                .field(
                    FieldSpec::new("answer", int32)
                        .static_()
                        .final_()
                        .initial(Value::I32(21)),
                )
                .field(
                    FieldSpec::new("greeting", string)
                        .private_()
                        .initial(Value::from("Hi")),
                )
                .method(
                    MethodSpec::new("describe", string).body(|_, _, _| Ok(Value::from("widget"))),
                )
                .method(MethodSpec::new("base_only", int32).body(|_, _, _| Ok(Value::I32(7))))
                .constructor(ConstructorSpec::new()),
        )
        .unwrap();

    universe
        .define_class(
            gadget,
            ClassSpec::new()
                .extends(widget)
                .implements(greeter)
                .field(FieldSpec::new("label", string_array).final_())
                .field(FieldSpec::new("float_set", float_set))
                .field(FieldSpec::new("int_list", int_list))
                .constructor(ConstructorSpec::new())
                .constructor(
                    ConstructorSpec::new()
                        .params([string_array])
                        .variadic()
                        .body(move |u, recv, args| {
                            let obj = recv
                                .and_then(Value::as_object)
                                .ok_or_else(|| "constructor needs a receiver".to_string())?;
                            let label = u
                                .declared_field(gadget, "label")
                                .ok_or_else(|| "label field missing".to_string())?;
                            obj.write_slot(&label, args.first().cloned().unwrap_or(Value::Null));
                            Ok(Value::Null)
                        }),
                )
                .method(
                    MethodSpec::new("describe", string).body(|_, _, _| Ok(Value::from("gadget"))),
                )
                .method(
                    MethodSpec::new("pack_echo", object_array)
                        .params([string, object_array])
                        .variadic()
                        .body(|_, _, args| Ok(args.get(1).cloned().unwrap_or(Value::Null))),
                )
                .method(
                    MethodSpec::new("error_throwing_method", void)
                        .body(|_, _, _| Err("boom".to_string())),
                )
                .method(
                    MethodSpec::new("boxed_parameters", float64)
                        .params([int32, float64])
                        .body(|_, _, args| {
                            let a = args
                                .first()
                                .and_then(Value::as_i32)
                                .ok_or_else(|| "expected an int".to_string())?;
                            let b = args
                                .get(1)
                                .and_then(Value::as_f64)
                                .ok_or_else(|| "expected a float".to_string())?;
                            Ok(Value::F64(a as f64 + b))
                        }),
                )
                .method(
                    MethodSpec::new("value_parameters", int32)
                        .params([boxed_int32])
                        .body(|_, _, args| {
                            let v = args
                                .first()
                                .and_then(Value::as_i32)
                                .ok_or_else(|| "expected an int".to_string())?;
                            Ok(Value::I32(v))
                        }),
                )
                .method(
                    MethodSpec::new("combine", string)
                        .params([object, string])
                        .body(|_, _, _| Ok(Value::from("object-first"))),
                )
                .method(
                    MethodSpec::new("combine", string)
                        .params([string, object])
                        .body(|_, _, _| Ok(Value::from("string-first"))),
                )
                .method(
                    MethodSpec::new("get_handle", object).body(|_, _, _| Ok(Value::from("first"))),
                )
                .method(
                    MethodSpec::new("get_handle", widget).body(|_, _, _| Ok(Value::from("second"))),
                )
                .method(
                    MethodSpec::new("get_handle", gadget).body(|_, _, _| Ok(Value::from("third"))),
                )
                .method(
                    MethodSpec::new("fingerprint", int64)
                        .params([object_array])
                        .body(|_, _, args| {
                            let arr = args
                                .first()
                                .and_then(Value::as_array)
                                .ok_or_else(|| "expected an array".to_string())?;
                            Ok(Value::I64(arr.len() as i64))
                        }),
                )
                .method(
                    MethodSpec::new("concat", string)
                        .params([string_array])
                        .static_()
                        .variadic()
                        .body(|_, _, args| {
                            let arr = args
                                .first()
                                .and_then(Value::as_array)
                                .ok_or_else(|| "expected an array".to_string())?;
                            let joined: String = arr
                                .to_vec()
                                .iter()
                                .filter_map(|v| v.as_str().map(str::to_string))
                                .collect();
                            Ok(Value::from(joined))
                        }),
                )
                .method(
                    MethodSpec::new("render", string)
                        .params([int32, int32])
                        .body(|_, _, _| Ok(Value::from("render"))),
                )
                .method(
                    MethodSpec::new("render_all", string)
                        .params([int32, int32])
                        .body(|_, _, _| Ok(Value::from("render_all"))),
                ),
        )
        .unwrap();

    universe
        .define_class(
            abstract_thing,
            ClassSpec::new().abstract_().constructor(ConstructorSpec::new()),
        )
        .unwrap();

    universe.define_enum(color, &["RED", "GREEN", "BLUE"]).unwrap();

    Fixture {
        universe: Arc::new(universe),
        collection,
        greeter,
        int_list,
        float_set,
        widget,
        gadget,
        abstract_thing,
        color,
    }
}
