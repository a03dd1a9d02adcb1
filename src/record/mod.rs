pub mod descriptor;
pub mod field_kind;

pub use descriptor::{
    MemberDescriptor, MemberKind, Modifier, Record, TypeDescriptor, TypeSet, canonical_type_text,
};
pub use field_kind::{Cardinality, FieldKind, FieldPlan, IdKind, PlannedField};
