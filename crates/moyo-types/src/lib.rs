//! Identifier newtypes shared across the clinical data-store boundary.
//!
//! Every entity in the clinical record (patients, concepts, encounter types,
//! programs, encounters, observations) is identified by a stable numeric id
//! assigned by the persistence layer. These wrappers exist so that an
//! encounter id can never be passed where a concept id is expected; the
//! compiler enforces what column-name conventions enforce in the database.
//!
//! Ids serialize transparently as their underlying number, display as plain
//! digits, and parse strictly (no surrounding text, only an optional sign
//! handled by the integer parser itself).

/// Errors that can occur when parsing an identifier from text.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// The input was not a number in range for the identifier type.
    #[error("invalid {kind}: '{input}' is not a valid numeric id")]
    NotNumeric { kind: &'static str, input: String },
}

macro_rules! id_type {
    ($(#[$outer:meta])* $name:ident($raw:ty)) => {
        $(#[$outer])*
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($raw);

        impl $name {
            /// Wraps a raw database id.
            pub const fn new(value: $raw) -> Self {
                Self(value)
            }

            /// Returns the raw database id.
            pub const fn value(self) -> $raw {
                self.0
            }
        }

        impl From<$raw> for $name {
            fn from(value: $raw) -> Self {
                Self(value)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<$raw>().map(Self).map_err(|_| IdError::NotNumeric {
                    kind: stringify!($name),
                    input: s.to_string(),
                })
            }
        }
    };
}

id_type! {
    /// Identifies a patient (the person enrolled in clinical programs).
    PatientId(i32)
}

id_type! {
    /// Identifies an entry in the controlled clinical vocabulary.
    ConceptId(i32)
}

id_type! {
    /// Identifies a named encounter category.
    EncounterTypeId(i32)
}

id_type! {
    /// Identifies a clinical program (a named care pathway).
    ProgramId(i32)
}

id_type! {
    /// Identifies a single recorded encounter.
    EncounterId(i32)
}

id_type! {
    /// Identifies a clinic location.
    LocationId(i32)
}

id_type! {
    /// Identifies a single recorded observation. Observation tables grow far
    /// faster than any other, hence the wider integer.
    ObsId(i64)
}
