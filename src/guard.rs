//! Entity defense guard.
//!
//! The tokenizer reports DOCTYPE content and entity references as separate events;
//! nothing is expanded behind our back. This guard decides what each of them turns
//! into:
//!
//! - DOCTYPE content is discarded (advisory [`Advisory::DoctypeDiscarded`]).
//! - External entity declarations are reported ([`Advisory::ExternalEntityDeclared`])
//!   and never fetched, whatever the configuration.
//! - The five predefined entities and character references are always resolved.
//! - Any other reference expands to nothing and is reported
//!   ([`Advisory::EntityRejected`]).
//!
//! With the guard switched off (`Options::disable_external_entities = false`),
//! internal entities declared in the DOCTYPE are expanded one level deep: their
//! replacement text is inserted literally, references inside it are not expanded
//! again. Unknown references then fail the parse like in any validating-free XML
//! processor.
//!
//! Advisories never abort the parse. They are returned next to the produced value
//! so that the caller can treat the whole document as suspect.

use std::borrow::Cow;
use std::fmt;

use ahash::AHashMap;
use quick_xml::escape::resolve_xml_entity;
use tracing::warn;

use crate::error::Error;
use crate::location::Location;

/// A security-relevant construct that was neutralized while parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advisory {
    /// A DOCTYPE declaration was read and its content ignored.
    DoctypeDiscarded {
        location: Location,
    },
    /// The DOCTYPE declares an entity backed by an external resource.
    ExternalEntityDeclared {
        name: String,
        system_id: String,
        location: Location,
    },
    /// A reference to a non-predefined entity was replaced by nothing.
    EntityRejected {
        name: String,
        location: Location,
    },
}

impl Advisory {
    pub fn location(&self) -> Location {
        match self {
            Advisory::DoctypeDiscarded { location }
            | Advisory::ExternalEntityDeclared { location, .. }
            | Advisory::EntityRejected { location, .. } => *location,
        }
    }
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Advisory::DoctypeDiscarded { location } => {
                write!(f, "DOCTYPE declaration discarded at {location}")
            }
            Advisory::ExternalEntityDeclared {
                name,
                system_id,
                location,
            } => write!(
                f,
                "external entity `{name}` ({system_id}) declared at {location}, not resolved"
            ),
            Advisory::EntityRejected { name, location } => {
                write!(f, "entity reference `&{name};` rejected at {location}")
            }
        }
    }
}

/// Summary of what the guard saw during one parse (even if nothing was rejected).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuardReport {
    /// Every neutralized construct, in document order.
    pub advisories: Vec<Advisory>,
    /// Number of DOCTYPE declarations encountered.
    pub doctypes: usize,
    /// Number of entity declarations found in DOCTYPE content (internal and external).
    pub declared_entities: usize,
    /// Number of entity references that expanded to nothing.
    pub rejected_references: usize,
}

impl GuardReport {
    /// True when the document contained anything the guard had to neutralize.
    pub fn is_suspect(&self) -> bool {
        !self.advisories.is_empty()
    }
}

/// How an entity declared in a DOCTYPE is defined.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum EntityValue {
    Internal(String),
    External { system_id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct EntityDeclaration {
    pub(crate) name: String,
    /// Declared with `%`, usable only inside the DTD.
    pub(crate) parameter: bool,
    pub(crate) value: EntityValue,
}

/// Per-parse entity policy. Constructed before the first byte is read.
#[derive(Debug)]
pub(crate) struct EntityGuard {
    enabled: bool,
    internal: AHashMap<String, String>,
    external: AHashMap<String, String>,
    report: GuardReport,
}

impl EntityGuard {
    pub(crate) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            internal: AHashMap::new(),
            external: AHashMap::new(),
            report: GuardReport::default(),
        }
    }

    /// Observe the content of a `<!DOCTYPE ...>` declaration.
    pub(crate) fn observe_doctype(&mut self, content: &str, location: Location) {
        self.report.doctypes += 1;
        if self.enabled {
            self.record(Advisory::DoctypeDiscarded { location });
        }
        for decl in scan_entity_declarations(content) {
            self.report.declared_entities += 1;
            match decl.value {
                EntityValue::External { system_id } => {
                    self.record(Advisory::ExternalEntityDeclared {
                        name: decl.name.clone(),
                        system_id: system_id.clone(),
                        location,
                    });
                    if !decl.parameter {
                        self.external.insert(decl.name, system_id);
                    }
                }
                EntityValue::Internal(text) => {
                    if !self.enabled && !decl.parameter {
                        self.internal.entry(decl.name).or_insert(text);
                    }
                }
            }
        }
    }

    /// Resolve the entity reference `&name;` into the text it stands for.
    pub(crate) fn resolve(
        &mut self,
        name: &str,
        location: Location,
    ) -> Result<Cow<'static, str>, Error> {
        if let Some(code) = name.strip_prefix('#') {
            return resolve_char_ref(code, location).map(|ch| Cow::Owned(ch.to_string()));
        }
        if let Some(text) = resolve_xml_entity(name) {
            return Ok(Cow::Borrowed(text));
        }
        if !self.enabled {
            if let Some(text) = self.internal.get(name) {
                return Ok(Cow::Owned(text.clone()));
            }
            if !self.external.contains_key(name) {
                return Err(Error::malformed(
                    format!("undefined entity `&{name};`"),
                    location,
                ));
            }
        }
        self.report.rejected_references += 1;
        self.record(Advisory::EntityRejected {
            name: name.to_owned(),
            location,
        });
        Ok(Cow::Borrowed(""))
    }

    /// Replace every `&...;` reference in an attribute value.
    pub(crate) fn unescape<'s>(
        &mut self,
        raw: &'s str,
        location: Location,
    ) -> Result<Cow<'s, str>, Error> {
        if !raw.contains('&') {
            return Ok(Cow::Borrowed(raw));
        }
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(amp) = rest.find('&') {
            out.push_str(&rest[..amp]);
            let after = &rest[amp + 1..];
            let Some(semi) = after.find(';') else {
                return Err(Error::malformed(
                    "unterminated entity reference in attribute value",
                    location,
                ));
            };
            out.push_str(&self.resolve(&after[..semi], location)?);
            rest = &after[semi + 1..];
        }
        out.push_str(rest);
        Ok(Cow::Owned(out))
    }

    pub(crate) fn into_report(self) -> GuardReport {
        self.report
    }

    fn record(&mut self, advisory: Advisory) {
        warn!(advisory = %advisory, "security advisory");
        self.report.advisories.push(advisory);
    }
}

fn resolve_char_ref(code: &str, location: Location) -> Result<char, Error> {
    let parsed = match code.strip_prefix('x') {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => code.parse::<u32>().ok(),
    };
    parsed
        .filter(|value| *value != 0)
        .and_then(char::from_u32)
        .ok_or_else(|| {
            Error::malformed(format!("invalid character reference `&#{code};`"), location)
        })
}

/// Find `<!ENTITY ...>` declarations in DOCTYPE content.
///
/// Parameter entities (`<!ENTITY % name ...>`) are returned too but never expanded:
/// they only matter inside the DTD, which is never interpreted.
pub(crate) fn scan_entity_declarations(dtd: &str) -> Vec<EntityDeclaration> {
    const KEYWORD: &str = "<!ENTITY";
    let mut found = Vec::new();
    let mut rest = dtd;
    while let Some(idx) = rest.find(KEYWORD) {
        rest = &rest[idx + KEYWORD.len()..];
        if let Some((decl, tail)) = entity_declaration(rest) {
            found.push(decl);
            rest = tail;
        }
    }
    found
}

/// Parse one declaration body following `<!ENTITY`. Returns the declaration and the
/// text after its literal or external identifier.
fn entity_declaration(body: &str) -> Option<(EntityDeclaration, &str)> {
    let mut cursor = body.trim_start();
    let parameter = match cursor.strip_prefix('%') {
        Some(after) => {
            cursor = after.trim_start();
            true
        }
        None => false,
    };
    let name_len = cursor
        .find(|c: char| c.is_whitespace() || c == '>')
        .unwrap_or(cursor.len());
    if name_len == 0 {
        return None;
    }
    let name = cursor[..name_len].to_owned();
    cursor = cursor[name_len..].trim_start();

    let (value, tail) = if let Some((literal, tail)) = quoted(cursor) {
        (EntityValue::Internal(literal.to_owned()), tail)
    } else if let Some(after) = cursor.strip_prefix("SYSTEM") {
        let (system_id, tail) = quoted(after.trim_start())?;
        let system_id = system_id.to_owned();
        (EntityValue::External { system_id }, tail)
    } else if let Some(after) = cursor.strip_prefix("PUBLIC") {
        let (_, tail) = quoted(after.trim_start())?;
        let (system_id, tail) = quoted(tail.trim_start())?;
        let system_id = system_id.to_owned();
        (EntityValue::External { system_id }, tail)
    } else {
        return None;
    };
    Some((
        EntityDeclaration {
            name,
            parameter,
            value,
        },
        tail,
    ))
}

/// Split a leading `"..."` or `'...'` literal off `s`, returning `(inner, tail)`.
fn quoted(s: &str) -> Option<(&str, &str)> {
    let quote = s.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &s[1..];
    let end = body.find(quote)?;
    Some((&body[..end], &body[end + 1..]))
}
