#![no_main]

use libfuzzer_sys::fuzz_target;

// Wraps arbitrary text into a DOCTYPE with internal and external entities and checks
// that guarded output never contains the replacement text of a declared entity.
fuzz_target!(|data: &[u8]| {
    if data.len() > 16 * 1024 {
        return;
    }
    let body = String::from_utf8_lossy(data);
    let xml = format!(
        "<!DOCTYPE r [<!ENTITY secret \"SECRET-MARKER\">\
         <!ENTITY ext SYSTEM \"file:///etc/passwd\">]>\
         <r>{body}&secret;&ext;</r>"
    );
    if let Ok(doc) = xml_metadata::from_str_with_options(&xml, &Default::default()) {
        let rendered = serde_json::to_string(&doc.value).unwrap_or_default();
        if !body.contains("SECRET-MARKER") {
            assert!(!rendered.contains("SECRET-MARKER"), "internal entity expanded: {rendered}");
        }
        assert!(doc.is_suspect());
    }
});
