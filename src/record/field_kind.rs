use super::descriptor::{MemberDescriptor, Modifier, TypeDescriptor};
use crate::core::{FormError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

/// How a form builder has to treat one record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Id(IdKind),
    ElementCollection { element: String },
    ToMany { target: String, cardinality: Cardinality },
    ToOne { target: String, cardinality: Cardinality },
    Embedded { type_name: String },
    Money,
    Plain { type_name: String },
}

impl FieldKind {
    /// Resolves the kind of `member`. Methods and transient fields have none.
    ///
    /// Checks run in a fixed order: id, element collection, to-many,
    /// to-one, embedded, money, plain.
    pub fn resolve(member: &MemberDescriptor) -> Result<Option<FieldKind>> {
        if !member.is_field() || member.has(Modifier::Transient) {
            return Ok(None);
        }
        let ty = member.declared_type.as_str();

        if member.has(Modifier::Id) {
            let inner = generic_argument(ty, "Option").unwrap_or(ty);
            let kind = match last_segment(inner) {
                "i64" => IdKind::Signed,
                "u64" => IdKind::Unsigned,
                other => {
                    return Err(FormError::unsupported_field(
                        &member.name,
                        format!("id fields must be i64 or u64, found '{other}'"),
                    ));
                }
            };
            return Ok(Some(FieldKind::Id(kind)));
        }

        if member.has(Modifier::ElementCollection) {
            let element = require_vec(member)?;
            return Ok(Some(FieldKind::ElementCollection { element }));
        }

        for (modifier, cardinality) in [
            (Modifier::OneToMany, Cardinality::OneToMany),
            (Modifier::ManyToMany, Cardinality::ManyToMany),
        ] {
            if member.has(modifier) {
                let target = require_vec(member)?;
                return Ok(Some(FieldKind::ToMany { target, cardinality }));
            }
        }

        for (modifier, cardinality) in [
            (Modifier::OneToOne, Cardinality::OneToOne),
            (Modifier::ManyToOne, Cardinality::ManyToOne),
        ] {
            if member.has(modifier) {
                let target = generic_argument(ty, "Option").unwrap_or(ty).to_string();
                return Ok(Some(FieldKind::ToOne { target, cardinality }));
            }
        }

        if member.has(Modifier::Embedded) {
            return Ok(Some(FieldKind::Embedded {
                type_name: ty.to_string(),
            }));
        }

        if member.has(Modifier::Money) {
            return Ok(Some(FieldKind::Money));
        }

        Ok(Some(FieldKind::Plain {
            type_name: ty.to_string(),
        }))
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, FieldKind::ToMany { .. } | FieldKind::ToOne { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedField {
    pub name: String,
    pub kind: FieldKind,
}

/// Field kinds of one record type, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    pub type_id: String,
    pub fields: Vec<PlannedField>,
}

impl FieldPlan {
    pub fn resolve(descriptor: &TypeDescriptor) -> Result<Self> {
        let mut fields = Vec::new();
        for member in descriptor.fields() {
            if let Some(kind) = FieldKind::resolve(member)? {
                fields.push(PlannedField {
                    name: member.name.clone(),
                    kind,
                });
            }
        }

        let id_count = fields
            .iter()
            .filter(|field| matches!(field.kind, FieldKind::Id(_)))
            .count();
        if id_count > 1 {
            return Err(FormError::unsupported_field(
                &descriptor.type_id,
                format!("{id_count} id fields declared, expected at most one"),
            ));
        }

        Ok(Self {
            type_id: descriptor.type_id.clone(),
            fields,
        })
    }

    pub fn id_field(&self) -> Option<&PlannedField> {
        self.fields
            .iter()
            .find(|field| matches!(field.kind, FieldKind::Id(_)))
    }

    pub fn get(&self, name: &str) -> Option<&PlannedField> {
        self.fields.iter().find(|field| field.name == name)
    }
}

fn require_vec(member: &MemberDescriptor) -> Result<String> {
    generic_argument(&member.declared_type, "Vec")
        .map(str::to_string)
        .ok_or_else(|| {
            FormError::unsupported_field(
                &member.name,
                format!("expected a Vec<_> field, found '{}'", member.declared_type),
            )
        })
}

/// `Vec<Address>` with wrapper `Vec` gives `Address`. Paths such as
/// `std::vec::Vec<Address>` match on their last segment.
fn generic_argument<'a>(ty: &'a str, wrapper: &str) -> Option<&'a str> {
    let open = ty.find('<')?;
    let inner = ty[open + 1..].strip_suffix('>')?;
    (last_segment(&ty[..open]) == wrapper).then_some(inner)
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, ty: &str, modifiers: &[Modifier]) -> MemberDescriptor {
        MemberDescriptor::field(name, ty, modifiers.iter().copied())
    }

    #[test]
    fn test_generic_argument() {
        assert_eq!(generic_argument("Vec<String>", "Vec"), Some("String"));
        assert_eq!(generic_argument("std::vec::Vec<Option<u8>>", "Vec"), Some("Option<u8>"));
        assert_eq!(generic_argument("Option<Vec<u8>>", "Vec"), None);
        assert_eq!(generic_argument("String", "Vec"), None);
    }

    #[test]
    fn test_id_must_be_64_bit_integer() {
        let id = field("id", "Option<i64>", &[Modifier::Id]);
        assert_eq!(FieldKind::resolve(&id).unwrap(), Some(FieldKind::Id(IdKind::Signed)));

        let id = field("id", "u64", &[Modifier::Id]);
        assert_eq!(FieldKind::resolve(&id).unwrap(), Some(FieldKind::Id(IdKind::Unsigned)));

        let id = field("id", "String", &[Modifier::Id]);
        assert!(matches!(
            FieldKind::resolve(&id),
            Err(FormError::UnsupportedField { .. })
        ));
    }

    #[test]
    fn test_relations_resolve_targets() {
        let tags = field("tags", "Vec<String>", &[Modifier::ElementCollection]);
        assert_eq!(
            FieldKind::resolve(&tags).unwrap(),
            Some(FieldKind::ElementCollection { element: "String".to_string() })
        );

        let orders = field("orders", "Vec<Order>", &[Modifier::OneToMany]);
        assert_eq!(
            FieldKind::resolve(&orders).unwrap(),
            Some(FieldKind::ToMany {
                target: "Order".to_string(),
                cardinality: Cardinality::OneToMany,
            })
        );

        let company = field("company", "Option<Company>", &[Modifier::ManyToOne]);
        assert_eq!(
            FieldKind::resolve(&company).unwrap(),
            Some(FieldKind::ToOne {
                target: "Company".to_string(),
                cardinality: Cardinality::ManyToOne,
            })
        );

        let bad = field("orders", "Order", &[Modifier::ManyToMany]);
        assert!(FieldKind::resolve(&bad).is_err());
    }

    #[test]
    fn test_methods_and_transient_fields_are_skipped() {
        let method = MemberDescriptor::method("name", "fn(&self) -> String", [Modifier::Public]);
        assert_eq!(FieldKind::resolve(&method).unwrap(), None);

        let cache = field("cache", "Vec<u8>", &[Modifier::Transient, Modifier::ElementCollection]);
        assert_eq!(FieldKind::resolve(&cache).unwrap(), None);
    }

    #[test]
    fn test_plan_rejects_two_ids() {
        let descriptor = TypeDescriptor::new("app::Pair", "Pair")
            .field("left", "i64", [Modifier::Id])
            .field("right", "i64", [Modifier::Id]);
        assert!(FieldPlan::resolve(&descriptor).is_err());
    }

    #[test]
    fn test_plan_keeps_declaration_order() {
        let descriptor = TypeDescriptor::new("app::Invoice", "Invoice")
            .field("id", "i64", [Modifier::Id])
            .field("address", "Address", [Modifier::Embedded])
            .field("total", "Amount", [Modifier::Money])
            .field("note", "String", [Modifier::Private]);
        let plan = FieldPlan::resolve(&descriptor).unwrap();

        let kinds: Vec<_> = plan.fields.iter().map(|f| f.kind.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                FieldKind::Id(IdKind::Signed),
                FieldKind::Embedded { type_name: "Address".to_string() },
                FieldKind::Money,
                FieldKind::Plain { type_name: "String".to_string() },
            ]
        );
        assert_eq!(plan.id_field().map(|f| f.name.as_str()), Some("id"));
    }
}
