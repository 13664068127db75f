//! Validation outcomes and the collector that records why an operation is
//! not valid.

use std::fmt;

/// How bad a mutation component is.  Ordered most severe first, so the
/// minimum of several results is the one to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValidationResult {
    /// Structurally nonsensical regardless of document or schema.
    IllFormed,
    /// Well-formed, but the current document cannot accept it.
    InvalidDocument,
    /// Acceptable to the document, but forbidden by the schema.
    InvalidSchema,
    Valid,
}

impl ValidationResult {
    pub fn is_valid(self) -> bool {
        self == ValidationResult::Valid
    }

    pub fn is_ill_formed(self) -> bool {
        self == ValidationResult::IllFormed
    }

    pub fn is_invalid_document(self) -> bool {
        self == ValidationResult::InvalidDocument
    }

    pub fn is_invalid_schema(self) -> bool {
        self == ValidationResult::InvalidSchema
    }

    /// The more severe of the two.
    pub fn merge_with(self, other: ValidationResult) -> ValidationResult {
        self.min(other)
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationResult::IllFormed => "ill-formed",
            ValidationResult::InvalidDocument => "invalid document",
            ValidationResult::InvalidSchema => "invalid schema",
            ValidationResult::Valid => "valid",
        })
    }
}

/// One reason why an operation is not valid, with the positions at which it
/// was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub result: ValidationResult,
    pub description: String,
    pub original_pos: usize,
    pub resulting_pos: usize,
}

impl Violation {
    pub fn new(
        result: ValidationResult,
        description: impl Into<String>,
        original_pos: usize,
        resulting_pos: usize,
    ) -> Self {
        Self {
            result,
            description: description.into(),
            original_pos,
            resulting_pos,
        }
    }

    pub fn description(&self) -> String {
        format!(
            "{} at original document position {} / resulting document position {}",
            self.description, self.original_pos, self.resulting_pos
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Accumulates violations by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViolationCollector {
    ill_formed: Vec<Violation>,
    invalid_document: Vec<Violation>,
    invalid_schema: Vec<Violation>,
}

impl ViolationCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `v`; a `Valid` violation is ignored.
    pub fn add(&mut self, v: Violation) {
        match v.result {
            ValidationResult::IllFormed => self.ill_formed.push(v),
            ValidationResult::InvalidDocument => self.invalid_document.push(v),
            ValidationResult::InvalidSchema => self.invalid_schema.push(v),
            ValidationResult::Valid => {}
        }
    }

    pub fn ill_formed(&self) -> &[Violation] {
        &self.ill_formed
    }

    pub fn invalid_document(&self) -> &[Violation] {
        &self.invalid_document
    }

    pub fn invalid_schema(&self) -> &[Violation] {
        &self.invalid_schema
    }

    pub fn is_valid(&self) -> bool {
        self.validation_result().is_valid()
    }

    pub fn is_ill_formed(&self) -> bool {
        self.validation_result().is_ill_formed()
    }

    /// The most severe result recorded, `Valid` if none.
    pub fn validation_result(&self) -> ValidationResult {
        if !self.ill_formed.is_empty() {
            ValidationResult::IllFormed
        } else if !self.invalid_document.is_empty() {
            ValidationResult::InvalidDocument
        } else if !self.invalid_schema.is_empty() {
            ValidationResult::InvalidSchema
        } else {
            ValidationResult::Valid
        }
    }

    /// The first violation of the most severe kind, prefixed with its kind.
    pub fn first_description(&self) -> Option<String> {
        if let Some(v) = self.ill_formed.first() {
            Some(format!("ill-formed: {}", v.description()))
        } else if let Some(v) = self.invalid_document.first() {
            Some(format!("invalid operation: {}", v.description()))
        } else {
            self.invalid_schema
                .first()
                .map(|v| format!("schema violation: {}", v.description()))
        }
    }
}

impl fmt::Display for ViolationCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ViolationCollector[")?;
        let all = self
            .ill_formed
            .iter()
            .chain(&self.invalid_document)
            .chain(&self.invalid_schema);
        for (i, v) in all.enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", v.result, v.description())?;
        }
        f.write_str("]")
    }
}
