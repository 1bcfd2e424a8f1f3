use serde::{Deserialize, Serialize};

/// Source language of the editor buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    JavaScript,
    TypeScript,
}

impl Dialect {
    pub const ALL: [Dialect; 2] = [Dialect::JavaScript, Dialect::TypeScript];

    pub fn name(self) -> &'static str {
        match self {
            Dialect::JavaScript => "JavaScript",
            Dialect::TypeScript => "TypeScript",
        }
    }

    pub fn is_typed(self) -> bool {
        matches!(self, Dialect::TypeScript)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
