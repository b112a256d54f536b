use bson::{Bson, Document, doc};

/// Filter leaf matching arrays that hold at least one of the needles.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayContains {
    pub field: String,
    pub needles: Vec<Bson>,
}

impl ArrayContains {
    /// A single scalar is treated as a one-element needle list.
    pub fn new(field: impl Into<String>, needles: impl Into<Bson>) -> Self {
        let needles = match needles.into() {
            Bson::Array(values) => values,
            scalar => vec![scalar],
        };
        Self { field: field.into(), needles }
    }

    #[must_use]
    pub fn as_document(&self) -> Document {
        let mut out = Document::new();
        out.insert(
            self.field.clone(),
            doc! { "$exists": true, "$elemMatch": { "$in": self.needles.clone() } },
        );
        out
    }
}
