//! Contextual member hints: guess the type left of a dot, look up its
//! members, and drive the popup that offers them.

pub mod catalog;
pub mod overlay;
pub mod resolver;

/// Coarse type of the expression a hint is requested for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeGuess {
    Array,
    String,
    Number,
    Object,
    Function,
    Boolean,
    /// No receiver: free functions and keywords.
    General,
}

impl TypeGuess {
    /// Popup header title.
    pub fn label(self) -> &'static str {
        match self {
            TypeGuess::Array => "Array",
            TypeGuess::String => "String",
            TypeGuess::Number => "Number",
            TypeGuess::Object => "Object",
            TypeGuess::Function => "Function",
            TypeGuess::Boolean => "Boolean",
            TypeGuess::General => "General",
        }
    }
}
