use std::fmt;

/// A class name that can be rendered in both JVM internal form
/// (`com/foo/Bar`) and source form (`com.foo.Bar`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName {
    internal: String,
}

impl ClassName {
    /// Accepts either form.
    pub fn new(name: &str) -> Self {
        ClassName {
            internal: name.replace('.', "/"),
        }
    }

    pub fn bytecode_name(&self) -> &str {
        &self.internal
    }

    pub fn full_name_with_dots(&self) -> String {
        self.internal.replace('/', ".")
    }

    pub fn simple_name(&self) -> &str {
        self.internal.rsplit('/').next().unwrap_or(&self.internal)
    }

    pub fn package_with_dots(&self) -> String {
        match self.internal.rfind('/') {
            Some(i) => self.internal[..i].replace('/', "."),
            None => String::new(),
        }
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name_with_dots())
    }
}
