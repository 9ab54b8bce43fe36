use super::*;

fn root(selector: &str) -> QueryDescription {
    QueryDescription::new()
        .prepend_constructor("constructor", vec![])
        .append_call("findElement", vec![selector.into()])
}

#[test]
fn test_counts_calls_and_scripts() {
    let description = QueryDescription::new()
        .append_script("someCustomScript({})")
        .append_call("call", vec![CallArgument::Null]);
    assert_eq!(description.len(), 2);
}

#[test]
fn test_extends_only_chains_appended_onto_the_prefix() {
    let title = root("#title");
    let text = title.append_call("getText", vec![]);
    assert!(text.extends(&title));
    assert!(title.extends(&title));
    assert!(!title.extends(&text));
    // Same calls, recorded separately
    assert!(!root("#title").append_call("getText", vec![]).extends(&title));
}

#[test]
fn test_build_call_without_arguments() {
    let description = QueryDescription::new().append_call("query", vec![]);
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(call.script, "query()");
    assert!(call.arguments.is_empty());
    assert_eq!(description.build_description(0), "query()");
}

#[test]
fn test_plain_values_move_into_argument_array() {
    let description = QueryDescription::new().append_call("query", vec!["something".into()]);
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(call.script, "query(_args[0])");
    assert_eq!(call.arguments, vec![json!("something")]);
    assert_eq!(description.build_description(0), r#"query("something")"#);
}

#[test]
fn test_regex_renders_as_literal() {
    let description =
        QueryDescription::new().append_call("query", vec![RegexArg::new("regex", "i").into()]);
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(call.script, "query(/regex/i)");
    assert!(call.arguments.is_empty());
    assert_eq!(description.build_description(0), "query(/regex/i)");
}

#[test]
fn test_function_source_is_inlined_without_coverage_counters() {
    let source = "function doAlert() {/* istanbul ignore next */cov_2x8f.s[0]++;cov_2x8f.f[1]++;alert(100) }";
    let description =
        QueryDescription::new().append_call("call", vec![CallArgument::Function(source.into())]);
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(call.script, "call(function doAlert() {alert(100) })");
    assert_eq!(
        description.build_description(0),
        "call(function doAlert() {alert(100) })"
    );
}

#[test]
fn test_raw_script_is_kept_verbatim() {
    let description = QueryDescription::new().append_script("script(...)");
    assert_eq!(description.build(vec![], 0).unwrap().script, "script(...)");
    assert_eq!(description.build_description(0), "script(...)");
}

#[test]
fn test_embedded_query_renders_its_own_chain() {
    let embedded = QueryDescription::new()
        .prepend_constructor("constructor", vec![])
        .append_call("whileAgeBetween", vec![2i64.into(), 25i64.into()]);
    let description = QueryDescription::new().append_call("waitFor", vec![embedded.into()]);
    assert_eq!(
        description.build_description(0),
        "waitFor(whileAgeBetween(2, 25))"
    );
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(
        call.script,
        "waitFor(constructor().whileAgeBetween(_args[0], _args[1]))"
    );
    assert_eq!(call.arguments, vec![json!(2), json!(25)]);
}

#[test]
fn test_sub_query_renders_only_its_own_calls() {
    let parent = root("root");
    let child_parent = parent.clone();
    let description = parent.append_call(
        "waitFor",
        vec![
            SubQueryInfo::new(&parent, move || {
                SubQuery::Single(child_parent.append_call("findElement", vec!["child".into()]))
            })
            .into(),
        ],
    );
    assert_eq!(
        description.build_description(0),
        r#"constructor().findElement("root").waitFor(q => q.findElement("child"))"#
    );
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(
        call.script,
        "constructor().findElement(_args[0]).waitFor(q => q.findElement(_args[1]))"
    );
    assert_eq!(call.arguments, vec![json!("root"), json!("child")]);
}

#[test]
fn test_sub_query_map_renders_as_object_literal() {
    let parent = root("root");
    let child_parent = parent.clone();
    let description = parent.append_call(
        "waitFor",
        vec![
            SubQueryInfo::new(&parent, move || {
                SubQuery::Map(vec![
                    (
                        "propertyOne".to_string(),
                        SubQuery::Single(
                            child_parent.append_call("findElement", vec!["child-1".into()]),
                        ),
                    ),
                    (
                        "propertyTwo".to_string(),
                        SubQuery::Single(
                            child_parent.append_call("findElement", vec!["child-2".into()]),
                        ),
                    ),
                ])
            })
            .into(),
        ],
    );
    assert_eq!(
        description.build_description(0),
        "constructor().findElement(\"root\").waitFor(q => ({\n  \"propertyOne\": q.findElement(\"child-1\"),\n  \"propertyTwo\": q.findElement(\"child-2\")\n}))"
    );
    let call = description.build(vec![], 0).unwrap();
    assert_eq!(
        call.script,
        "constructor().findElement(_args[0]).waitFor(q => ({\n  \"propertyOne\": q.findElement(_args[1]),\n  \"propertyTwo\": q.findElement(_args[2])\n}))"
    );
    assert_eq!(
        call.arguments,
        vec![json!("root"), json!("child-1"), json!("child-2")]
    );
}

#[test]
fn test_sub_query_list_renders_as_array_literal() {
    let parent = QueryDescription::new();
    let child_parent = parent.clone();
    let description = parent.append_call(
        "sequence",
        vec![
            SubQueryInfo::new(&parent, move || {
                SubQuery::List(vec![
                    SubQuery::Single(child_parent.append_call("click", vec![])),
                    SubQuery::Single(child_parent.append_call("submit", vec![])),
                ])
            })
            .into(),
        ],
    );
    assert_eq!(
        description.build_description(0),
        "sequence(q => ([\n  q.click(),\n  q.submit()\n]))"
    );
}

#[test]
fn test_appending_leaves_receiver_unchanged() {
    let base = root("root");
    let before = base.build(vec![], 0).unwrap();
    let before_description = base.build_description(0);

    let _extended = base.append_call("getText", vec![]);
    let _prefixed = base.prepend_constructor("other", vec![]);

    assert_eq!(base.build(vec![], 0).unwrap(), before);
    assert_eq!(base.build_description(0), before_description);
    assert_eq!(base.len(), 2);
}

#[test]
fn test_rendering_is_idempotent() {
    let description = root("root").append_call("matches", vec![RegexArg::new("a+", "g").into()]);
    assert_eq!(
        description.build(vec![], 0).unwrap(),
        description.build(vec![], 0).unwrap()
    );
    assert_eq!(
        description.build_description(1),
        description.build_description(1)
    );
}

#[test]
fn test_skip_drops_leading_calls() {
    let description = root("root").append_call("getText", vec![]);
    assert_eq!(
        description.build_description(1),
        r#"findElement("root").getText()"#
    );
}

#[test]
fn test_native_closure_cannot_be_rendered_as_script() {
    let description = QueryDescription::new().append_call(
        "execute",
        vec![CallArgument::Native(NativeFn::new(|_| Ok(QueryValue::Null)))],
    );
    let err = description.build(vec![], 0).unwrap_err();
    assert!(err.is(ErrorKind::Argument));
    assert_eq!(description.build_description(0), "execute(<native fn>)");
}
