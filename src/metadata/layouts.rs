//! metadata::layouts
//!
//! Page layout transforms.

use log::{debug, info};

use super::transform::{EntityTransform, TransformOutcome};
use super::{MetadataDocument, MetadataError};

/// Adds a related list to page layouts that do not already show it.
///
/// The new `relatedLists` element is placed after the last existing one
/// (or first, when the layout has none). Its children follow the schema
/// order: `customButtons`, `excludeButtons`, `fields`, `relatedList`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRelatedList {
    related_list: String,
    fields: Vec<String>,
    excluded_buttons: Vec<String>,
    custom_buttons: Vec<String>,
}

impl AddRelatedList {
    pub fn new(related_list: impl Into<String>) -> Self {
        Self {
            related_list: related_list.into(),
            fields: Vec::new(),
            excluded_buttons: Vec::new(),
            custom_buttons: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_excluded_buttons(mut self, buttons: Vec<String>) -> Self {
        self.excluded_buttons = buttons;
        self
    }

    pub fn with_custom_buttons(mut self, buttons: Vec<String>) -> Self {
        self.custom_buttons = buttons;
        self
    }

    pub fn related_list(&self) -> &str {
        &self.related_list
    }
}

impl EntityTransform for AddRelatedList {
    fn entity(&self) -> &str {
        "Layout"
    }

    fn transform(
        &self,
        document: &mut MetadataDocument,
        member: &str,
    ) -> Result<TransformOutcome, MetadataError> {
        if document
            .find_keyed("relatedLists", "relatedList", &self.related_list)
            .is_some()
        {
            debug!("Layout {} already has related list {}", member, self.related_list);
            return Ok(TransformOutcome::Keep);
        }

        let mut children: Vec<(&str, &str)> = Vec::new();
        children.extend(self.custom_buttons.iter().map(|b| ("customButtons", b.as_str())));
        children.extend(self.excluded_buttons.iter().map(|b| ("excludeButtons", b.as_str())));
        children.extend(self.fields.iter().map(|f| ("fields", f.as_str())));
        children.push(("relatedList", self.related_list.as_str()));

        let index = document.new_tag_index("relatedLists");
        let element = document.build_element("relatedLists", &children)?;
        document.insert_top_level(index, element)?;

        info!("Adding related list {} to layout {}", self.related_list, member);
        Ok(TransformOutcome::Keep)
    }
}
