//! Structural checksums of record types.
//!
//! A member hash is derived from the member's kind, name, declared type and
//! modifier set through SHA-256, so the value is identical across processes,
//! platforms and compiler versions. A type checksum is the wrapping sum of
//! its member hashes and therefore independent of member order.

use crate::record::{MemberDescriptor, TypeDescriptor, TypeSet};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

const UNIT_SEPARATOR: u8 = 0x1f;

pub type FingerprintSet = BTreeMap<String, i64>;

pub fn member_hash(member: &MemberDescriptor) -> i64 {
    let modifiers = member
        .modifiers
        .iter()
        .map(|modifier| modifier.as_str())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(",");

    let mut hasher = Sha256::new();
    hasher.update(member.kind.as_str().as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(member.name.as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(member.declared_type.as_bytes());
    hasher.update([UNIT_SEPARATOR]);
    hasher.update(modifiers.as_bytes());
    let digest = hasher.finalize();

    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(prefix)
}

/// Sum of the structural hashes of every member declared on `ty`.
pub fn compute_checksum(ty: &TypeDescriptor) -> i64 {
    let checksum = ty
        .members
        .iter()
        .map(member_hash)
        .fold(0i64, i64::wrapping_add);
    debug!(type_id = %ty.type_id, members = ty.members.len(), checksum, "computed schema checksum");
    checksum
}

pub fn compute_fingerprint_set(types: &TypeSet) -> FingerprintSet {
    types
        .iter()
        .map(|ty| (ty.type_id.clone(), compute_checksum(ty)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Modifier;

    fn person() -> TypeDescriptor {
        TypeDescriptor::new("app::Person", "Person")
            .field("id", "i64", [Modifier::Public, Modifier::Id])
            .field("name", "String", [Modifier::Public])
            .method("display_name", "fn(&self) -> String", [Modifier::Public])
    }

    #[test]
    fn test_checksum_is_deterministic() {
        assert_eq!(compute_checksum(&person()), compute_checksum(&person()));
    }

    #[test]
    fn test_checksum_ignores_member_order() {
        let mut reversed = person();
        reversed.members.reverse();
        assert_eq!(compute_checksum(&person()), compute_checksum(&reversed));
    }

    #[test]
    fn test_checksum_tracks_type_modifier_and_kind() {
        let base = compute_checksum(&person());

        let mut retyped = person();
        retyped.members[1].declared_type = "Option<String>".to_string();
        assert_ne!(base, compute_checksum(&retyped));

        let mut private = person();
        private.members[1].modifiers = [Modifier::Private].into_iter().collect();
        assert_ne!(base, compute_checksum(&private));

        let as_method = MemberDescriptor::method("name", "String", [Modifier::Public]);
        let as_field = MemberDescriptor::field("name", "String", [Modifier::Public]);
        assert_ne!(member_hash(&as_method), member_hash(&as_field));
    }

    #[test]
    fn test_known_hash_value_is_pinned() {
        // Existing snapshots depend on this exact encoding.
        let member = MemberDescriptor::field("id", "i64", [Modifier::Id]);
        assert_eq!(member_hash(&member), -3421686858646175467);
        let separators_matter = MemberDescriptor::field("i", "d\u{1f}i64", [Modifier::Id]);
        assert_ne!(member_hash(&member), member_hash(&separators_matter));
    }

    #[test]
    fn test_empty_type_has_zero_checksum() {
        assert_eq!(compute_checksum(&TypeDescriptor::new("app::Empty", "Empty")), 0);
    }

    #[test]
    fn test_fingerprint_set_keys_by_type_id() {
        let set = TypeSet::from_descriptors([person(), TypeDescriptor::new("app::Tag", "Tag")]).unwrap();
        let fingerprints = compute_fingerprint_set(&set);
        assert_eq!(fingerprints.len(), 2);
        assert_eq!(fingerprints["app::Person"], compute_checksum(&person()));
        assert_eq!(fingerprints["app::Tag"], 0);
    }
}
