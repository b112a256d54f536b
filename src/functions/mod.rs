//! Special functions: value objects that contribute a ready-made fragment
//! instead of a plain field/value pair.

pub mod aggregate;
pub mod matching;
pub mod mutation;

pub use aggregate::{ArrayLength, Count, Max, Min};
pub use matching::ArrayContains;
pub use mutation::{ArrayPull, ArrayPush, Increment};

use bson::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum SpecialFunction {
    ArrayContains(ArrayContains),
    ArrayLength(ArrayLength),
    Count(Count),
    Increment(Increment),
    Max(Max),
    Min(Min),
    ArrayPush(ArrayPush),
    ArrayPull(ArrayPull),
}

impl SpecialFunction {
    #[must_use]
    pub fn as_document(&self) -> Document {
        match self {
            Self::ArrayContains(f) => f.as_document(),
            Self::ArrayLength(f) => f.as_document(),
            Self::Count(f) => f.as_document(),
            Self::Increment(f) => f.as_document(),
            Self::Max(f) => f.as_document(),
            Self::Min(f) => f.as_document(),
            Self::ArrayPush(f) => f.as_document(),
            Self::ArrayPull(f) => f.as_document(),
        }
    }
}

macro_rules! special_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for SpecialFunction {
                fn from(f: $variant) -> Self {
                    Self::$variant(f)
                }
            }
        )*
    };
}

special_from!(ArrayContains, ArrayLength, Count, Increment, Max, Min, ArrayPush, ArrayPull);
