//! Secure entities reachable through the monitor and the table that maps
//! owning entity numbers onto them.

use core::fmt;

/// The 6-bit owning entity number field of an SMC function identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwningEntityNumber(pub u8);

impl OwningEntityNumber {
    pub const MASK: u8 = 0x3f;

    pub const TSP: Self = Self(0x32);
    pub const CUSTOM: Self = Self(0x3d);
    pub const OPTEE: Self = Self(0x3e);
}

/// Closed set of secure payloads the monitor hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecureEntity {
    /// Test Secure Payload.
    Tsp,
    /// OP-TEE OS.
    OpTee,
    /// In-monitor applet host.
    Custom,
}

impl SecureEntity {
    pub const ALL: [Self; 3] = [Self::Tsp, Self::OpTee, Self::Custom];

    pub const fn oen(self) -> OwningEntityNumber {
        match self {
            Self::Tsp => OwningEntityNumber::TSP,
            Self::OpTee => OwningEntityNumber::OPTEE,
            Self::Custom => OwningEntityNumber::CUSTOM,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Tsp => "TSP",
            Self::OpTee => "OP-TEE",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for SecureEntity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable OEN → entity map, built once at startup.
#[derive(Debug)]
pub struct SecureEntityTable {
    entries: [(OwningEntityNumber, SecureEntity); 3],
}

impl SecureEntityTable {
    /// Table with every hosted entity at its standard OEN.
    pub const fn new() -> Self {
        let [a, b, c] = SecureEntity::ALL;
        Self {
            entries: [(a.oen(), a), (b.oen(), b), (c.oen(), c)],
        }
    }

    pub fn lookup(&self, oen: OwningEntityNumber) -> Option<SecureEntity> {
        self.entries
            .iter()
            .find(|(number, _)| *number == oen)
            .map(|(_, entity)| *entity)
    }

    pub fn entries(&self) -> impl Iterator<Item = (OwningEntityNumber, SecureEntity)> + '_ {
        self.entries.iter().copied()
    }
}

impl Default for SecureEntityTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_numbers() {
        let table = SecureEntityTable::new();
        assert_eq!(table.lookup(OwningEntityNumber(0x32)), Some(SecureEntity::Tsp));
        assert_eq!(table.lookup(OwningEntityNumber(0x3e)), Some(SecureEntity::OpTee));
        assert_eq!(table.lookup(OwningEntityNumber(0x3d)), Some(SecureEntity::Custom));
    }

    #[test]
    fn test_unassigned_numbers_miss() {
        let table = SecureEntityTable::new();
        for oen in [0x00, 0x01, 0x04, 0x30, 0x3f] {
            assert_eq!(table.lookup(OwningEntityNumber(oen)), None);
        }
        assert_eq!(table.entries().count(), SecureEntity::ALL.len());
    }
}
