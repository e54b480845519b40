use std::fmt;
use std::sync::Arc;

use ahash::AHashSet;
use serde_json::Value;

use crate::path::NodePath;

/// Hook that may rewrite or drop a key/value pair before it is merged into its parent.
///
/// Called with the current node path, the key (element name, prefixed attribute key,
/// text key or language code) and the value. Returning `None` drops the pair.
pub type Postprocessor =
    Arc<dyn Fn(&NodePath, &str, Value) -> Option<(String, Value)> + Send + Sync + 'static>;

/// Element names whose value is always emitted as a sequence, even for a single
/// occurrence.
///
/// ```rust
/// use xml_metadata::ForceList;
///
/// let list = ForceList::from_iter(["email", "url"]);
/// assert!(list.contains("email"));
/// assert!(!list.contains("name"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ForceList {
    names: AHashSet<String>,
}

impl ForceList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeatable elements of the language-resource metadata record schema.
    ///
    /// Record consumers map these onto typed collections, so they must arrive as
    /// sequences regardless of how many occurrences a particular record has.
    pub fn metadata_record() -> Self {
        METADATA_RECORD_REPEATABLE.iter().copied().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ForceList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl<S: Into<String>> Extend<S> for ForceList {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.names.extend(iter.into_iter().map(Into::into));
    }
}

const METADATA_RECORD_REPEATABLE: &[&str] = &[
    "domainSetInfo",
    "evaluationCriteria",
    "inputInfoType_model.resourceType",
    "relationInfo",
    "domainSetInfo.domainId",
    "annotationInfo",
    "validationInfo",
    "textClassificationInfo",
    "telephoneNumber",
    "requiredLRs",
    "annotationManual",
    "metadataLanguageName",
    "appropriatenessForDSI",
    "evaluationTool",
    "operatingSystem",
    "metadataLanguageId",
    "originalSource",
    "documentation",
    "segmentationLevel",
    "encodingLevel",
    "variant",
    "fundingCountryId",
    "funder",
    "languageSetInfo",
    "inputInfoType_model.annotationType",
    "outputInfoType_model.annotationType",
    "affiliation",
    "fundingType",
    "validator",
    "identifier",
    "theoreticModel",
    "creationTool",
    "distributionInfo",
    "licenceInfo",
    "evaluationLevel",
    "sizePerLanguage",
    "languageVarietyName",
    "restrictionsOfUse",
    "domainSetInfo.domain",
    "contactPerson",
    "evaluationReport",
    "outputInfoType_model.resourceType",
    "domainSetInfo.subdomainId",
    "evaluationMeasure",
    "keywords",
    "fundingCountry",
    "url",
    "author",
    "iprHolder",
    "annotationTool",
    "email",
    "requiredSoftware",
    "domainInfo",
    "languageVarietyInfo",
    "conformanceToStandardsBestPractices",
    "characterEncodingInfo",
    "extratextualInformation",
    "textFormatInfo",
    "distributionMedium",
    "corpusTextInfo",
    "implementationLanguage",
    "publisher",
    "externalRef",
    "languageInfo",
    "resourceCreator",
    "evaluator",
    "executionLocation",
    "domainSetInfo.subdomain",
    "samplesLocation",
    "linguisticInformation",
    "function",
    "fundingProject",
    "downloadLocation",
    "sizeInfo",
    "editor",
    "task",
    "extraTextualInformationUnit",
    "metadataCreator",
    "validationReport",
    "outputInfoType_model.mediaType",
];

/// Deserializer configuration.
///
/// Built once and shared by reference; a parse never mutates it.
///
/// ```rust
/// use xml_metadata::{ForceList, Options};
///
/// let options = xml_metadata::options! {
///     force_list: ForceList::from_iter(["keywords"]),
///     strip_whitespace: false,
/// };
/// assert_eq!(options.attribute_prefix, "@");
/// assert!(options.disable_external_entities);
/// ```
#[derive(Clone)]
pub struct Options {
    /// Encoding label (WHATWG names such as `utf-8`, `iso-8859-1`, `windows-1252`).
    ///
    /// Text input must be representable in it. Byte input without a BOM or an
    /// `encoding` pseudo-attribute in its XML declaration is decoded with it.
    pub encoding: String,
    /// Nesting depth at which items are completed. `0` means the whole document.
    pub depth_cutoff: usize,
    /// Prefix for ordinary attribute keys.
    pub attribute_prefix: String,
    /// Key for an element's own text when no language promotion applies.
    pub text_key: String,
    /// Trim leading and trailing whitespace of element text; whitespace-only text
    /// becomes absent.
    pub strip_whitespace: bool,
    /// Separator used when an element's text arrives in several fragments (e.g.
    /// interleaved with child elements).
    pub text_separator: String,
    /// Element names always emitted as sequences.
    pub force_list: ForceList,
    /// Attribute whose value replaces the text key (language-key promotion).
    pub language_attribute: String,
    /// Entity defense: discard DOCTYPE content and refuse every non-predefined entity.
    ///
    /// Turning this off expands internal entities declared in the DOCTYPE. External
    /// entities are never fetched either way.
    pub disable_external_entities: bool,
    /// Include attributes in produced values. Node paths carry them regardless.
    pub xml_attributes: bool,
    /// Represent text-only elements as `{text_key: text}` rather than bare text.
    pub force_text_key: bool,
    /// Optional key/value rewrite hook applied before every merge.
    pub postprocessor: Option<Postprocessor>,
    /// If true (default), entry points that hold the input in memory wrap
    /// malformed-document errors with a rendered source window.
    pub with_snippet: bool,
    /// Horizontal crop radius (in characters) for snippet windows. `0` disables
    /// snippet wrapping.
    pub crop_radius: usize,
}

impl Options {
    /// Defaults plus the repeatable elements of the metadata record schema as the
    /// force list.
    pub fn metadata_record() -> Self {
        Self {
            force_list: ForceList::metadata_record(),
            ..Self::default()
        }
    }

    /// Registers a postprocessor hook. Any thread-safe closure can be used.
    ///
    /// ```rust
    /// use xml_metadata::Options;
    ///
    /// // Drop every `comment` element.
    /// let options = Options::default()
    ///     .with_postprocessor(|_path, key, value| {
    ///         (key != "comment").then(|| (key.to_owned(), value))
    ///     });
    /// assert!(options.postprocessor.is_some());
    /// ```
    pub fn with_postprocessor<F>(mut self, hook: F) -> Self
    where
        F: Fn(&NodePath, &str, serde_json::Value) -> Option<(String, serde_json::Value)>
            + Send
            + Sync
            + 'static,
    {
        self.postprocessor = Some(Arc::new(hook));
        self
    }

    /// The configured language attribute as it appears among prefixed keys.
    pub(crate) fn language_key(&self) -> String {
        format!("{}{}", self.attribute_prefix, self.language_attribute)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            encoding: "utf-8".to_owned(),
            depth_cutoff: 0,
            attribute_prefix: "@".to_owned(),
            text_key: "#text".to_owned(),
            strip_whitespace: true,
            text_separator: String::new(),
            force_list: ForceList::default(),
            language_attribute: "lang".to_owned(),
            disable_external_entities: true,
            xml_attributes: true,
            force_text_key: false,
            postprocessor: None,
            with_snippet: true,
            crop_radius: 64,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("encoding", &self.encoding)
            .field("depth_cutoff", &self.depth_cutoff)
            .field("attribute_prefix", &self.attribute_prefix)
            .field("text_key", &self.text_key)
            .field("strip_whitespace", &self.strip_whitespace)
            .field("text_separator", &self.text_separator)
            .field("force_list", &self.force_list.len())
            .field("language_attribute", &self.language_attribute)
            .field("disable_external_entities", &self.disable_external_entities)
            .field("xml_attributes", &self.xml_attributes)
            .field("force_text_key", &self.force_text_key)
            .field("postprocessor", &if self.postprocessor.is_some() { "set" } else { "none" })
            .field("with_snippet", &self.with_snippet)
            .field("crop_radius", &self.crop_radius)
            .finish()
    }
}
