//! Major format revisions selected by the header tag

use std::fmt;

/// Structure substitutions applied when resolving descriptions for MD33 files
const MD33_SUBSTITUTIONS: &[(&str, &str)] = &[("Reference", "SmallReference")];

/// Major format revision of a container file.
///
/// The two dialects share one schema. They only differ in how nested
/// `Reference` fields are laid out, which is decided once when a
/// description is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    /// `MD34` files, the dialect the schema sizes are declared for
    #[default]
    Md34,
    /// Legacy `MD33` files with 8-byte references
    Md33,
}

impl Dialect {
    /// The dialect declared sizes are checked against
    pub const PRIMARY: Dialect = Dialect::Md34;

    /// Header structure name, which is also the file's leading tag
    pub fn header_tag(self) -> &'static str {
        match self {
            Dialect::Md34 => "MD34",
            Dialect::Md33 => "MD33",
        }
    }

    /// Select a dialect from a header tag by its trailing two digits
    pub fn from_header_tag(tag: &str) -> Option<Self> {
        let digits = tag.strip_prefix("MD")?;
        match digits {
            "34" => Some(Dialect::Md34),
            "33" => Some(Dialect::Md33),
            _ => None,
        }
    }

    /// Structure name to use in place of `name` under this dialect
    pub fn substitute<'a>(self, name: &'a str) -> &'a str {
        let table: &[(&str, &str)] = match self {
            Dialect::Md34 => &[],
            Dialect::Md33 => MD33_SUBSTITUTIONS,
        };
        table
            .iter()
            .find(|(from, _)| *from == name)
            .map(|(_, to)| *to)
            .unwrap_or(name)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_header_tag() {
        assert_eq!(Dialect::from_header_tag("MD34"), Some(Dialect::Md34));
        assert_eq!(Dialect::from_header_tag("MD33"), Some(Dialect::Md33));
        assert_eq!(Dialect::from_header_tag("MD35"), None);
        assert_eq!(Dialect::from_header_tag("XX34"), None);
    }

    #[test]
    fn test_substitute() {
        assert_eq!(Dialect::Md34.substitute("Reference"), "Reference");
        assert_eq!(Dialect::Md33.substitute("Reference"), "SmallReference");
        assert_eq!(Dialect::Md33.substitute("VEC3"), "VEC3");
    }
}
