//! metadata::permissions
//!
//! Permission set transforms.
//!
//! Field permissions are keyed by `field`, class accesses by `apexClass`.
//! A keyed element that already exists has its flags updated in place;
//! otherwise a new element is inserted after the last sibling of its tag.

use std::str::FromStr;

use log::info;

use super::transform::{EntityTransform, TransformOutcome};
use super::{MetadataDocument, MetadataError};

/// Requested access to one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccess {
    pub field: String,
    pub editable: bool,
}

impl FieldAccess {
    pub fn read(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            editable: false,
        }
    }

    pub fn edit(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            editable: true,
        }
    }
}

/// Parses `Object.Field__c` or `Object.Field__c:edit` / `:read`.
impl FromStr for FieldAccess {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, access) = match s.rsplit_once(':') {
            Some((field, access)) => (field.trim(), access.trim()),
            None => (s.trim(), "read"),
        };
        if field.is_empty() {
            return Err(format!("missing field name in '{}'", s));
        }
        match access {
            "read" => Ok(FieldAccess::read(field)),
            "edit" => Ok(FieldAccess::edit(field)),
            other => Err(format!("unknown access '{}' for field {} (expected read or edit)", other, field)),
        }
    }
}

/// Grants field and Apex class access in permission sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPermissionSetPermissions {
    fields: Vec<FieldAccess>,
    classes: Vec<String>,
}

impl AddPermissionSetPermissions {
    pub fn new(fields: Vec<FieldAccess>, classes: Vec<String>) -> Self {
        Self { fields, classes }
    }

    fn grant_field(
        &self,
        document: &mut MetadataDocument,
        access: &FieldAccess,
    ) -> Result<bool, MetadataError> {
        let editable = if access.editable { "true" } else { "false" };
        match document.find_keyed("fieldPermissions", "field", &access.field) {
            Some(existing) => {
                let edit_changed = document.set_child_text(existing, "editable", editable)?;
                let read_changed = document.set_child_text(existing, "readable", "true")?;
                Ok(edit_changed || read_changed)
            }
            None => {
                let index = document.new_tag_index("fieldPermissions");
                let element = document.build_element(
                    "fieldPermissions",
                    &[
                        ("editable", editable),
                        ("field", access.field.as_str()),
                        ("readable", "true"),
                    ],
                )?;
                document.insert_top_level(index, element)?;
                Ok(true)
            }
        }
    }

    fn grant_class(
        &self,
        document: &mut MetadataDocument,
        class: &str,
    ) -> Result<bool, MetadataError> {
        match document.find_keyed("classAccesses", "apexClass", class) {
            Some(existing) => document.set_child_text(existing, "enabled", "true"),
            None => {
                let index = document.new_tag_index("classAccesses");
                let element = document.build_element(
                    "classAccesses",
                    &[("apexClass", class), ("enabled", "true")],
                )?;
                document.insert_top_level(index, element)?;
                Ok(true)
            }
        }
    }
}

impl EntityTransform for AddPermissionSetPermissions {
    fn entity(&self) -> &str {
        "PermissionSet"
    }

    fn transform(
        &self,
        document: &mut MetadataDocument,
        member: &str,
    ) -> Result<TransformOutcome, MetadataError> {
        let mut changes = 0;
        for access in &self.fields {
            if self.grant_field(document, access)? {
                changes += 1;
            }
        }
        for class in &self.classes {
            if self.grant_class(document, class)? {
                changes += 1;
            }
        }
        info!("Granted {} permissions in permission set {}", changes, member);
        Ok(TransformOutcome::Keep)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERMSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<PermissionSet xmlns="http://soap.sforce.com/2006/04/metadata">
    <classAccesses>
        <apexClass>Existing</apexClass>
        <enabled>false</enabled>
    </classAccesses>
    <fieldPermissions>
        <editable>false</editable>
        <field>Account.Existing__c</field>
        <readable>true</readable>
    </fieldPermissions>
    <hasActivationRequired>false</hasActivationRequired>
    <label>Admin</label>
</PermissionSet>
"#;

    fn apply(transform: &AddPermissionSetPermissions) -> String {
        let mut document = MetadataDocument::parse(PERMSET).unwrap();
        transform.transform(&mut document, "Admin").unwrap();
        document.to_xml_string().unwrap()
    }

    mod field_access {
        use super::*;

        #[test]
        fn parse_forms() {
            assert_eq!("Account.Foo__c".parse::<FieldAccess>().unwrap(), FieldAccess::read("Account.Foo__c"));
            assert_eq!("Account.Foo__c:edit".parse::<FieldAccess>().unwrap(), FieldAccess::edit("Account.Foo__c"));
            assert!("Account.Foo__c:write".parse::<FieldAccess>().is_err());
            assert!(":edit".parse::<FieldAccess>().is_err());
        }
    }

    #[test]
    fn inserts_new_field_permission_after_existing() {
        let transform =
            AddPermissionSetPermissions::new(vec![FieldAccess::edit("Contact.New__c")], vec![]);
        let xml = apply(&transform);

        assert!(xml.contains("<fieldPermissions><editable>true</editable><field>Contact.New__c</field><readable>true</readable></fieldPermissions>"));
        let existing = xml.find("Account.Existing__c").unwrap();
        let added = xml.find("Contact.New__c").unwrap();
        let activation = xml.find("<hasActivationRequired>").unwrap();
        assert!(existing < added && added < activation);
    }

    #[test]
    fn updates_existing_field_permission() {
        let transform =
            AddPermissionSetPermissions::new(vec![FieldAccess::edit("Account.Existing__c")], vec![]);
        let xml = apply(&transform);

        assert_eq!(xml.matches("<fieldPermissions>").count(), 1);
        assert!(xml.contains("<editable>true</editable>"));
    }

    #[test]
    fn class_access_enabled_or_added() {
        let transform = AddPermissionSetPermissions::new(
            vec![],
            vec!["Existing".to_string(), "Fresh".to_string()],
        );
        let xml = apply(&transform);

        assert_eq!(xml.matches("<classAccesses>").count(), 2);
        assert!(!xml.contains("<enabled>false</enabled>"));
        assert!(xml.contains("<classAccesses><apexClass>Fresh</apexClass><enabled>true</enabled></classAccesses>"));
    }
}
