use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// The string form is used on the wire (serde) and in SQLite columns.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$(Self::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.as_str()))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: DatabaseError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

str_enum!(Role {
    Superadmin => "superadmin",
    CenterAdmin => "centeradmin",
    Doctor => "doctor",
    Receptionist => "receptionist",
    LabStaff => "lab_staff",
});

impl Role {
    /// Roles stored in the per-center `users` table.
    pub fn is_center_role(&self) -> bool {
        matches!(self, Self::CenterAdmin | Self::Doctor | Self::Receptionist)
    }
}

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(Urgency {
    Normal => "normal",
    Urgent => "urgent",
    Emergency => "emergency",
});

str_enum!(TestRequestStatus {
    Pending => "Pending",
    Assigned => "Assigned",
    SampleCollectionScheduled => "Sample_Collection_Scheduled",
    SampleCollected => "Sample_Collected",
    InLabTesting => "In_Lab_Testing",
    TestingCompleted => "Testing_Completed",
    ReportGenerated => "Report_Generated",
    ReportSent => "Report_Sent",
    Completed => "Completed",
    Cancelled => "Cancelled",
});

impl TestRequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

str_enum!(BillingStatus {
    NotGenerated => "not_generated",
    Generated => "generated",
    Paid => "paid",
});

str_enum!(FollowUpKind {
    AllergicRhinitis => "allergic_rhinitis",
    AllergicConjunctivitis => "allergic_conjunctivitis",
    AllergicBronchitis => "allergic_bronchitis",
    AtopicDermatitis => "atopic_dermatitis",
    General => "general",
});

// Tables an authenticated account id may live in, in lookup order.
str_enum!(AccountSource {
    Users => "users",
    SuperadminDoctors => "superadmin_doctors",
    SuperadminReceptionists => "superadmin_receptionists",
    LabStaff => "lab_staff",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_wire_strings_round_trip() {
        for status in TestRequestStatus::ALL {
            let parsed = TestRequestStatus::from_str(status.as_str()).unwrap();
            assert_eq!(&parsed, status);
        }
        assert_eq!(
            TestRequestStatus::SampleCollectionScheduled.as_str(),
            "Sample_Collection_Scheduled"
        );
    }

    #[test]
    fn unknown_value_is_invalid_enum() {
        let err = Role::from_str("janitor").unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidEnum { .. }));
    }

    #[test]
    fn serde_uses_string_form() {
        let json = serde_json::to_string(&TestRequestStatus::InLabTesting).unwrap();
        assert_eq!(json, "\"In_Lab_Testing\"");
        let role: Role = serde_json::from_str("\"centeradmin\"").unwrap();
        assert_eq!(role, Role::CenterAdmin);
        assert!(serde_json::from_str::<Gender>("\"unknown\"").is_err());
    }

    #[test]
    fn terminal_statuses() {
        assert!(TestRequestStatus::Completed.is_terminal());
        assert!(TestRequestStatus::Cancelled.is_terminal());
        assert!(!TestRequestStatus::ReportSent.is_terminal());
    }

    #[test]
    fn center_roles_exclude_superadmin_and_lab() {
        assert!(Role::Doctor.is_center_role());
        assert!(!Role::Superadmin.is_center_role());
        assert!(!Role::LabStaff.is_center_role());
    }
}
