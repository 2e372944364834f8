//! Descriptor-DSL to JSON Schema compilation.
//!
//! Callers describe the expected output as a plain JSON object whose leaves
//! are descriptor strings of the form `"<TypeKeyword>[ optional] |
//! <description-or-JSON-array>"`. The compiler turns that into a JSON Schema
//! document suitable for backend-native enforcement or prompt guidance.
//!
//! | Keyword | Compiles to |
//! |-----------|-----------------------------------------------|
//! | String | `{"type": "string"}` |
//! | Number | `{"type": "number"}` |
//! | Boolean | `{"type": "boolean"}` |
//! | Naming | `{"type": "string", "maxLength": 80}` |
//! | Paragraph | `{"type": "string"}` (unbounded) |
//! | Enum | `{"enum": [...]}` from the JSON array segment |
//!
//! `optional` makes the field nullable and drops it from the parent's
//! `required` list. Array values are written as `[<itemDescriptor>]`; a
//! trailing `"optional"` marks the array nullable, and an item slot that is
//! itself an array with a trailing `"anyOf"` compiles to a union of the listed
//! item schemas. An object carrying the `__is_record` sentinel compiles to a
//! dynamic-key map schema derived from its one sample entry.

mod compiler;

pub use compiler::{compile, RECORD_SENTINEL};
