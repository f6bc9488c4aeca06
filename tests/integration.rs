
use std::collections::BTreeMap;

use fixtures::{
    Person, generate_random_whitespace, generate_random_whitespace_at_least_one, get_engine,
    second, templates_dir, upper,
};
use templet::{
    CompileErrorKind, Compiler, Context, FileLoader, LoadError, RenderError, Template,
    TempletError, TempletInterface, Value, compile,
};

#[test]
#[ntest::timeout(100)]
fn test_literal_text_passes_through() {
    let text = "Hello, 100% plain text.\n{ not a marker } and {{ unterminated";
    let template = Template::new(text).unwrap();
    assert_eq!(template.render(&Context::new()).unwrap(), text);
}

#[test]
#[ntest::timeout(100)]
fn test_basic_substitution() {
    let mut engine = get_engine();
    engine
        .add_template("Template A", "Hello, {{name}}!")
        .unwrap();

    let missing = engine.context("Template A", &Context::new());
    assert_eq!(missing, vec!["name"]);

    let context = Context::new().with("name", "Ned");
    let rendered = engine.render("Template A", Some(&context)).unwrap();

    assert_eq!(
        rendered, "Hello, Ned!",
        "Rendered string should match the template."
    );
}

#[test]
#[ntest::timeout(100)]
fn test_missing_variable() {
    let template = Template::new("Hi, {{name}}!").unwrap();
    assert_eq!(
        template.render(&Context::new()),
        Err(RenderError::UndefinedVariable {
            name: "name".to_string()
        })
    );

    let mut engine = get_engine();
    engine.add_template("Template A", "Hi, {{name}}!").unwrap();
    assert!(matches!(
        engine.render("Template A", None),
        Err(TempletError::Render(RenderError::UndefinedVariable { .. }))
    ));
}

#[test]
#[ntest::timeout(100)]
fn test_pipe_chaining() {
    let template = Template::new("{{name|upper|second}}").unwrap();
    let context = Context::new()
        .with("name", "Ned")
        .with("upper", upper())
        .with("second", second());
    assert_eq!(template.render(&context).unwrap(), "E");
}

#[test]
#[ntest::timeout(100)]
fn test_reusable_template_with_defaults() {
    let template = compile(
        "{{name|upper}}{{punct}}",
        [Context::new().with("upper", upper()).with("punct", "!")],
    )
    .unwrap();

    assert_eq!(template.required_variables().count(), 3);
    assert_eq!(
        template
            .render(&Context::new().with("name", "Ned"))
            .unwrap(),
        "NED!"
    );
    assert_eq!(
        template
            .render(&Context::new().with("name", "Ben"))
            .unwrap(),
        "BEN!"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_dotted_access() {
    let person = Value::from_object(Person {
        name: "Ned",
        nickname: "Neddy",
    });
    let dict = BTreeMap::from([("a", Value::from(17)), ("inner", Value::from(vec![1, 2]))]);
    let context = Context::new().with("obj", person).with("dict", dict);

    let template =
        Template::new("{{obj.name}}/{{obj.nickname}}/{{obj.greet}}/{{dict.a}}/{{dict.inner}}")
            .unwrap();
    assert_eq!(
        template.render(&context).unwrap(),
        "Ned/Neddy/Hi, I'm Ned/17/[1, 2]"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_nested_dotted_access() {
    let inner = BTreeMap::from([("obj", BTreeMap::from([("a", "deep")]))]);
    let context = Context::new().with("obj2", inner);
    let template = Template::new("{{ obj2.obj.a }}").unwrap();
    assert_eq!(template.render(&context).unwrap(), "deep");
    assert_eq!(
        template.required_variables().collect::<Vec<_>>(),
        vec!["obj2"]
    );
}

#[test]
#[ntest::timeout(100)]
fn test_basic_iteration() {
    let template = format!(
        "{{%{}for{}cat{}in{}cats{}%}}Greetings {{{{{}cat{}}}}}\n{{%{}endfor{}%}}",
        generate_random_whitespace(),
        generate_random_whitespace_at_least_one(),
        generate_random_whitespace_at_least_one(),
        generate_random_whitespace_at_least_one(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
        generate_random_whitespace(),
    );

    dbg!(&template);

    let mut engine = get_engine();
    engine.add_template("Template A", template).unwrap();

    let missing = engine.context("Template A", &Context::new());
    assert_eq!(missing, vec!["cats"], "loop variables are never required");

    let context = Context::new().with("cats", vec!["Fluffy", "Whiskers", "Mittens"]);
    let rendered = engine.render("Template A", Some(&context)).unwrap();
    assert_eq!(
        rendered,
        "Greetings Fluffy\nGreetings Whiskers\nGreetings Mittens\n"
    );
}

#[test]
#[ntest::timeout(100)]
fn test_empty_loop() {
    let template = Template::new("Look: {% for n in nums %}{{n}}, {% endfor %}done.").unwrap();
    let context = Context::new().with("nums", Vec::<i64>::new());
    assert_eq!(template.render(&context).unwrap(), "Look: done.");
}

#[test]
#[ntest::timeout(100)]
fn test_non_iterable_passed_to_loop() {
    let template = Template::new("{% for n in nums %}{{n}}{% endfor %}").unwrap();
    let context = Context::new().with("nums", true);
    assert_eq!(
        template.render(&context),
        Err(RenderError::NotIterable {
            kind: "bool".to_string()
        })
    );
}

#[test]
#[ntest::timeout(100)]
fn test_if_nested_in_for() {
    let template = Template::new(
        "{% for n in nums %}{% if n > 2 %}big{% elif n == 2 %}two{% else %}small{% endif %} {% endfor %}",
    )
    .unwrap();
    let context = Context::new().with("nums", vec![1, 2, 3]);
    assert_eq!(template.render(&context).unwrap(), "small two big ");
}

#[test]
#[ntest::timeout(100)]
fn test_if_with_object_attributes() {
    let template = Template::new(
        "{% for p in people %}{% if p.name == 'Ned' %}{{ p.greet }}{% else %}{{ p.nickname }}{% endif %};{% endfor %}",
    )
    .unwrap();
    let people = vec![
        Value::from_object(Person {
            name: "Ned",
            nickname: "Neddy",
        }),
        Value::from_object(Person {
            name: "Ben",
            nickname: "Benny",
        }),
    ];
    let context = Context::new().with("people", people);
    assert_eq!(template.render(&context).unwrap(), "Hi, I'm Ned;Benny;");
}

#[test]
#[ntest::timeout(100)]
fn test_logical_operators() {
    let cases = [
        ("{% if a and b %}yes{% else %}no{% endif %}", true, false, "no"),
        ("{% if a or b %}yes{% else %}no{% endif %}", false, true, "yes"),
        ("{% if not a %}yes{% else %}no{% endif %}", true, true, "no"),
        ("{% if a && !b %}yes{% else %}no{% endif %}", true, false, "yes"),
        ("{% if a || b %}yes{% else %}no{% endif %}", false, false, "no"),
    ];
    for (source, a, b, expected) in cases {
        let context = Context::new().with("a", a).with("b", b);
        let rendered = Template::new(source).unwrap().render(&context).unwrap();
        assert_eq!(rendered, expected, "for {source:?} with a={a} b={b}");
    }
}

#[test]
#[ntest::timeout(100)]
fn test_two_variable_loops() {
    let template = Template::new(
        "{% for k, v in pairs %}{{k}}:{{v}} {% endfor %}|{% for k , v in dict.items %}{{k}}={{v}} {% endfor %}",
    )
    .unwrap();
    let context = Context::new()
        .with("pairs", vec![("a", 1), ("b", 2)])
        .with("dict", BTreeMap::from([("x", "1"), ("y", "2")]));
    assert_eq!(
        template.render(&context).unwrap(),
        "a:1 b:2 |x=1 y=2 "
    );
}

#[test]
#[ntest::timeout(100)]
fn test_mismatched_end_tag_is_a_compile_error() {
    let err = Template::new("{% if x %}...{% endfor %}").unwrap_err();
    assert_eq!(
        err.kind,
        CompileErrorKind::MismatchedEndTag {
            expected: "if".to_string()
        }
    );
    assert_eq!(err.token, "{% endfor %}");

    let mut engine = get_engine();
    assert!(matches!(
        engine.add_template("bad", "{% for x in y %}"),
        Err(TempletError::Compile(_))
    ));
}

#[test]
#[ntest::timeout(100)]
fn test_compile_errors() {
    let cases = [
        ("{% endif %}", CompileErrorKind::TooManyEnds),
        (
            "{% while x %}",
            CompileErrorKind::UnknownTag {
                keyword: "while".to_string(),
            },
        ),
        (
            "{% for x from y %}{% endfor %}",
            CompileErrorKind::Malformed {
                what: "for".to_string(),
            },
        ),
        (
            "{{ 9lives }}",
            CompileErrorKind::InvalidName {
                name: "9lives".to_string(),
            },
        ),
    ];
    for (source, kind) in cases {
        assert_eq!(Template::new(source).unwrap_err().kind, kind, "for {source:?}");
    }
}

#[test]
#[ntest::timeout(100)]
fn test_inheritance_override_and_super() {
    let mut engine = get_engine();
    engine
        .add_template("base", "<h1>{% block title %}Default{% endblock %}</h1>")
        .unwrap();
    engine
        .add_template(
            "custom",
            "{% extends \"base\" %}{% block title %}Custom{% endblock %}",
        )
        .unwrap();
    engine
        .add_template(
            "extra",
            "{% extends \"base\" %}{% block title %}{{ super() }}Extra{% endblock %}",
        )
        .unwrap();

    assert_eq!(engine.render("base", None).unwrap(), "<h1>Default</h1>");
    assert_eq!(engine.render("custom", None).unwrap(), "<h1>Custom</h1>");
    assert_eq!(engine.render("extra", None).unwrap(), "<h1>DefaultExtra</h1>");
}

#[test]
#[ntest::timeout(100)]
fn test_inheritance_errors() {
    let mut engine = get_engine();
    engine
        .add_template("base", "{% block a %}A{% endblock %}{% block b %}B{% endblock %}")
        .unwrap();

    let cases = [
        (
            "{% extends 'base' %}{% block c %}{% endblock %}",
            CompileErrorKind::UnknownBlock {
                name: "c".to_string(),
            },
        ),
        (
            "{% extends 'base' %}stray",
            CompileErrorKind::OutsideBlock,
        ),
        (
            "{% extends 'missing' %}",
            CompileErrorKind::BaseTemplate(LoadError::NotFound {
                path: "missing".to_string(),
            }),
        ),
    ];
    for (i, (source, kind)) in cases.into_iter().enumerate() {
        match engine.add_template(format!("child{i}"), source) {
            Err(TempletError::Compile(err)) => assert_eq!(err.kind, kind, "for {source:?}"),
            other => panic!("expected a compile error for {source:?}, got {other:?}"),
        }
    }
}

#[test]
#[ntest::timeout(1000)]
fn test_file_loader_inheritance() {
    let compiler = Compiler::new().loader(FileLoader::new(templates_dir()));
    let source = std::fs::read_to_string(templates_dir().join("child.html")).unwrap();
    let template = compiler.compile(&source).unwrap();

    let mut required: Vec<_> = template.required_variables().collect();
    required.sort_unstable();
    assert_eq!(required, vec!["body", "site"]);

    let context = Context::new().with("site", "Blog").with("body", "Welcome");
    assert_eq!(
        template.render(&context).unwrap(),
        "<title>Default | Blog</title>\n<body>Welcome</body>\n"
    );
}

#[test]
#[ntest::timeout(1000)]
fn test_concurrent_renders() {
    let template = compile(
        "{% for n in nums %}{{ n }}{{ sep }}{% endfor %}",
        [Context::new().with("sep", ",")],
    )
    .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8_i64)
            .map(|i| {
                let template = &template;
                scope.spawn(move || {
                    let nums: Vec<i64> = (0..=i).collect();
                    template.render(&Context::new().with("nums", nums)).unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let expected: String = (0..=i).map(|n| format!("{n},")).collect();
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
#[ntest::timeout(100)]
fn test_whitespace_handling() {
    let template = Template::new("  {{   name   }}  \n\t{%   if   flag   %}x{%endif%}").unwrap();
    let context = Context::new().with("name", "Ned").with("flag", true);
    assert_eq!(template.render(&context).unwrap(), "  Ned  \n\tx");
}

#[test]
#[ntest::timeout(100)]
fn test_comments_are_dropped() {
    let template = Template::new("a{# {{ ignored }} {% if %} #}b").unwrap();
    assert_eq!(template.required_variables().count(), 0);
    assert_eq!(template.render(&Context::new()).unwrap(), "ab");
}
