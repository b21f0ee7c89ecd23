//! Name-compression resolver for Callgrind symbol tables.
//!
//! Callgrind may shorten repeated file and function names by binding
//! them to numeric tokens: `(1) /a/b.php` defines token 1, a later
//! `(1)` refers back to it. File names and function names use two
//! disjoint token tables.

use std::collections::HashMap;

/// Which compression table a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Names appearing after `fl=`
    File,
    /// Names appearing after `fn=` or `cfn=`
    Function,
}

/// The three shapes a compressed name specification can take
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressedName<'a> {
    /// `(N) name` - bind token N to the name
    Define { token: u32, name: &'a str },
    /// `(N)` - refer back to a previously bound name
    Reference { token: u32 },
    /// Anything else - the input is the name itself
    Literal(&'a str),
}

/// Classify a trimmed name specification into one of the three shapes
///
/// **Public** - pure parsing step, useful on its own in tests
pub fn classify(spec: &str) -> CompressedName<'_> {
    if let Some(rest) = spec.strip_prefix('(') {
        if let Some(close) = rest.find(')') {
            let digits = &rest[..close];
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                if let Ok(token) = digits.parse::<u32>() {
                    let name = rest[close + 1..].trim();
                    if name.is_empty() {
                        return CompressedName::Reference { token };
                    }
                    return CompressedName::Define { token, name };
                }
            }
        }
    }
    CompressedName::Literal(spec)
}

/// Token tables for one parsing run
///
/// Owned by the preprocessor instance; the tables live exactly as long
/// as one parse.
#[derive(Debug, Default)]
pub struct CompressionTables {
    files: HashMap<u32, String>,
    functions: HashMap<u32, String>,
}

impl CompressionTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a name specification against the table for `kind`
    ///
    /// Defines bind their token and return the name. References return
    /// the bound name; an unbound reference returns the raw input
    /// unchanged (malformed but survivable). Literals pass through.
    pub fn resolve(&mut self, kind: NameKind, spec: &str) -> String {
        let spec = spec.trim();
        let table = match kind {
            NameKind::File => &mut self.files,
            NameKind::Function => &mut self.functions,
        };
        match classify(spec) {
            CompressedName::Define { token, name } => {
                table.insert(token, name.to_string());
                name.to_string()
            }
            CompressedName::Reference { token } => match table.get(&token) {
                Some(name) => name.clone(),
                None => spec.to_string(),
            },
            CompressedName::Literal(name) => name.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_shapes() {
        assert_eq!(
            classify("(1) foo"),
            CompressedName::Define { token: 1, name: "foo" }
        );
        assert_eq!(classify("(12)"), CompressedName::Reference { token: 12 });
        assert_eq!(classify("plain_name"), CompressedName::Literal("plain_name"));
        // Not a valid token: parentheses without digits
        assert_eq!(classify("() x"), CompressedName::Literal("() x"));
        assert_eq!(classify("(a) x"), CompressedName::Literal("(a) x"));
    }

    #[test]
    fn test_define_then_reference() {
        let mut tables = CompressionTables::new();
        assert_eq!(tables.resolve(NameKind::Function, "(1) foo"), "foo");
        assert_eq!(tables.resolve(NameKind::Function, "(1)"), "foo");
        assert_eq!(tables.resolve(NameKind::Function, "(2) bar"), "bar");
        assert_eq!(tables.resolve(NameKind::Function, "(1)"), "foo");
    }

    #[test]
    fn test_unbound_reference_passes_through() {
        let mut tables = CompressionTables::new();
        assert_eq!(tables.resolve(NameKind::File, "(9)"), "(9)");
    }

    #[test]
    fn test_tables_are_disjoint() {
        let mut tables = CompressionTables::new();
        tables.resolve(NameKind::File, "(1) /a/b.php");
        // Token 1 in the function table is still unbound
        assert_eq!(tables.resolve(NameKind::Function, "(1)"), "(1)");
        assert_eq!(tables.resolve(NameKind::File, "(1)"), "/a/b.php");
    }
}
