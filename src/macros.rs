//! Public macros for constructing option structs without relying on struct literal syntax.
//!
//! These keep call sites ergonomic while allowing [`crate::Options`] to gain fields
//! without forcing breaking changes.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let options = xml_metadata::options! {
///     depth_cutoff: 2,
///     text_key: "_text".to_owned(),
/// };
/// assert_eq!(options.depth_cutoff, 2);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}

/// Construct a [`crate::ForceList`] from element names.
///
/// ```rust
/// let list = xml_metadata::force_list!["email", "url"];
/// assert!(list.contains("url"));
/// ```
#[macro_export]
macro_rules! force_list {
    ( $( $name:expr ),* $(,)? ) => {{
        let mut list = $crate::ForceList::new();
        $(
            list.insert($name);
        )*
        list
    }};
}
