#[cfg(feature = "serde")]
mod serde_tests {
    use serde_json::json;
    use templet::{
        CompileError, Context, LoadError, RenderError, Template, TempletError, TempletInterface,
        TempletEngine, Value,
    };

    #[test]
    #[ntest::timeout(100)]
    fn test_value_from_json() {
        let value: Value = serde_json::from_value(json!({
            "name": "Ned",
            "age": 42,
            "score": 1.5,
            "tags": ["a", "b"],
            "nothing": null,
            "active": true,
        }))
        .unwrap();

        let Value::Map(map) = &value else {
            panic!("expected a map, got {value:?}");
        };
        assert_eq!(map["name"], Value::from("Ned"));
        assert_eq!(map["age"], Value::Int(42));
        assert_eq!(map["score"], Value::Float(1.5));
        assert_eq!(map["tags"], Value::from(vec!["a", "b"]));
        assert_eq!(map["nothing"], Value::None);
        assert_eq!(map["active"], Value::Bool(true));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_value_to_json() {
        let value = Value::from(vec![Value::from(1), Value::from("two"), Value::None]);
        assert_eq!(serde_json::to_value(&value).unwrap(), json!([1, "two", null]));

        let function = Value::from_fn(Ok);
        assert_eq!(serde_json::to_value(&function).unwrap(), json!("<function>"));
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_context_serialization() {
        let context = Context::new()
            .with("name", "Ned")
            .with("items", vec![1, 2, 3]);

        let serialized = serde_json::to_string(&context).unwrap();
        assert_eq!(serialized, r#"{"items":[1,2,3],"name":"Ned"}"#);

        let deserialized: Context = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, context);
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_render_json_context() {
        let context: Context = serde_json::from_value(json!({
            "user": { "name": "Ned", "age": 42 },
            "items": [{ "name": "pen" }, { "name": "ink" }],
        }))
        .unwrap();

        let template = Template::new(
            "{{ user.name }} ({{ user.age }}): {% for item in items %}{{ item.name }} {% endfor %}",
        )
        .unwrap();
        assert_eq!(template.render(&context).unwrap(), "Ned (42): pen ink ");
    }

    #[test]
    #[ntest::timeout(100)]
    fn test_error_serialization() {
        let mut engine = TempletEngine::new();
        let err = engine.add_template("bad", "{% if x %}").unwrap_err();

        let serialized = serde_json::to_string(&err).unwrap();
        let deserialized: TempletError = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, err);

        let render = RenderError::UndefinedVariable {
            name: "x".to_string(),
        };
        let json = serde_json::to_value(&render).unwrap();
        assert_eq!(json, json!({ "UndefinedVariable": { "name": "x" } }));

        let load: LoadError = serde_json::from_value(json!({ "NotFound": { "path": "a" } })).unwrap();
        assert_eq!(load.to_string(), "template 'a' not found");

        let compile: Result<CompileError, _> = serde_json::from_str("{}");
        assert!(compile.is_err());
    }
}
