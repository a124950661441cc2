//! Campus emergency contacts.
//!
//! This directory is compiled in so that it is available with no network at
//! all. The locator view always includes it, whatever else has failed.

use serde::Serialize;

/// A phone number to call in an emergency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EmergencyContact {
    pub name: &'static str,
    pub number: &'static str,
    /// Shown in the "urgent" group at the top of the list.
    pub urgent: bool,
}

impl EmergencyContact {
    /// A `tel:` link for the first number listed.
    pub fn tel_link(&self) -> String {
        let first = self.number.split('/').next().unwrap_or(self.number);
        let digits: String = first.chars().filter(|c| c.is_ascii_digit() || *c == '+').collect();
        format!("tel:{digits}")
    }
}

pub static EMERGENCY_CONTACTS: [EmergencyContact; 8] = [
    EmergencyContact {
        name: "Security Office",
        number: "0725 471487",
        urgent: true,
    },
    EmergencyContact {
        name: "Director of Students' Affairs",
        number: "020 8704470",
        urgent: false,
    },
    EmergencyContact {
        name: "Private Advisor for Sexual Assault",
        number: "0798 416091",
        urgent: true,
    },
    EmergencyContact {
        name: "Health Unit (24/7)",
        number: "0712 345678",
        urgent: true,
    },
    EmergencyContact {
        name: "Fire Emergency",
        number: "999",
        urgent: true,
    },
    EmergencyContact {
        name: "Accommodation Office",
        number: "0723 456789",
        urgent: false,
    },
    EmergencyContact {
        name: "National GBV Hotline",
        number: "1195",
        urgent: true,
    },
    EmergencyContact {
        name: "Police Emergency",
        number: "999 / 112",
        urgent: true,
    },
];

/// Contacts to show first.
pub fn urgent() -> impl Iterator<Item = &'static EmergencyContact> {
    EMERGENCY_CONTACTS.iter().filter(|c| c.urgent)
}

/// Remaining contacts.
pub fn other() -> impl Iterator<Item = &'static EmergencyContact> {
    EMERGENCY_CONTACTS.iter().filter(|c| !c.urgent)
}
