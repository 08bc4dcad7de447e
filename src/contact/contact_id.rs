// Copyright (c) 2021 Marco Boneberger
// Licensed under the EUPL-1.2-or-later

//! Contains the ContactId type.
use std::cmp::Ordering;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Identifies a contact between a body of robot 1 and a body of robot 2.
///
/// Contacts are ordered lexicographically by
/// `(r1_index, r1_body_id, r2_index, r2_body_id, surface)`.
/// The default value uses `-1` for every field and means "unset".
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId {
    /// index of robot 1 in the robot collection
    pub r1_index: i32,
    /// index of robot 2 in the robot collection
    pub r2_index: i32,
    /// body id of robot 1
    pub r1_body_id: i32,
    /// body id of robot 2
    pub r2_body_id: i32,
    /// surface number, allows several contacts between the same bodies
    pub surface: i32,
}

impl ContactId {
    pub fn new(r1_index: i32, r2_index: i32, r1_body_id: i32, r2_body_id: i32, surface: i32) -> Self {
        ContactId {
            r1_index,
            r2_index,
            r1_body_id,
            r2_body_id,
            surface,
        }
    }

    fn key(&self) -> (i32, i32, i32, i32, i32) {
        (
            self.r1_index,
            self.r1_body_id,
            self.r2_index,
            self.r2_body_id,
            self.surface,
        )
    }

    /// true if this is the "unset" sentinel
    pub fn is_unset(&self) -> bool {
        *self == ContactId::default()
    }
}

impl Default for ContactId {
    fn default() -> Self {
        ContactId::new(-1, -1, -1, -1, -1)
    }
}

impl PartialOrd for ContactId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContactId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "({}, {}) <-> ({}, {}) surface {}",
            self.r1_index, self.r1_body_id, self.r2_index, self.r2_body_id, self.surface
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::contact::contact_id::ContactId;
    use std::collections::BTreeMap;

    fn ids() -> Vec<ContactId> {
        let mut ids = Vec::new();
        for r1 in 0..2 {
            for r2 in 0..2 {
                for b1 in 0..2 {
                    for b2 in 0..2 {
                        for s in 0..2 {
                            ids.push(ContactId::new(r1, r2, b1, b2, s));
                        }
                    }
                }
            }
        }
        ids.push(ContactId::default());
        ids
    }

    #[test]
    fn default_is_unset() {
        let id = ContactId::default();
        assert!(id.is_unset());
        assert_eq!(id, ContactId::new(-1, -1, -1, -1, -1));
        assert!(!ContactId::new(0, 1, 2, 3, 0).is_unset());
    }

    #[test]
    fn equality_is_field_wise() {
        let a = ContactId::new(0, 1, 2, 3, 4);
        assert_eq!(a, ContactId::new(0, 1, 2, 3, 4));
        assert_ne!(a, ContactId::new(0, 1, 2, 3, 5));
        assert_ne!(a, ContactId::new(1, 0, 2, 3, 4));
    }

    #[test]
    fn strict_total_order() {
        let ids = ids();
        for a in ids.iter() {
            assert!(!(a < a));
            for b in ids.iter() {
                // exactly one of <, ==, > holds
                let relations = [a < b, a == b, a > b];
                assert_eq!(relations.iter().filter(|r| **r).count(), 1);
                assert_eq!(a == b, b == a);
                for c in ids.iter() {
                    if a < b && b < c {
                        assert!(a < c);
                    }
                    if a == b && b == c {
                        assert_eq!(a, c);
                    }
                }
            }
        }
    }

    #[test]
    fn body_of_robot_1_before_robot_2() {
        // r1_body_id is compared before r2_index
        let a = ContactId::new(0, 1, 0, 0, 0);
        let b = ContactId::new(0, 0, 1, 0, 0);
        assert!(a < b);
        let c = ContactId::new(0, 0, 1, 0, 1);
        let d = ContactId::new(0, 0, 1, 1, 0);
        assert!(c < d);
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = BTreeMap::new();
        map.insert(ContactId::new(0, 1, 3, 0, 0), "left foot");
        map.insert(ContactId::new(0, 1, 2, 0, 0), "right foot");
        let names: Vec<&str> = map.values().copied().collect();
        assert_eq!(names, vec!["right foot", "left foot"]);
    }
}
