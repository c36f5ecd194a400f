//! metadata::document
//!
//! A parsed metadata document.
//!
//! Wraps an [`xot::Xot`] arena holding one XML document whose elements live
//! in the metadata namespace. Lookups are namespace-qualified; elements the
//! caller creates are placed in the same namespace so they serialize without
//! a prefix under the root's default namespace declaration.
//!
//! # Formatting
//!
//! Text nodes the caller does not touch round-trip unchanged. Inserted
//! top-level elements reuse the indentation of the root's first child.
//! Elements built by [`MetadataDocument::build_element`] are written
//! compactly.

use xot::{NamespaceId, NameId, Node, Xot};

use super::{MetadataError, MD_NAMESPACE};

const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

/// An XML metadata document.
pub struct MetadataDocument {
    xot: Xot,
    document: Node,
    root: Node,
    namespace: NamespaceId,
}

impl std::fmt::Debug for MetadataDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataDocument")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl MetadataDocument {
    /// Parse a document.
    ///
    /// # Errors
    ///
    /// Returns `MetadataError::Xml` if the text is not well-formed or does
    /// not use the metadata namespace.
    pub fn parse(text: &str) -> Result<Self, MetadataError> {
        let mut xot = Xot::new();
        let document = xot
            .parse(text)
            .map_err(|e| MetadataError::Xml(e.to_string()))?;
        let root = xot
            .document_element(document)
            .map_err(|e| MetadataError::Xml(e.to_string()))?;
        let namespace = xot.namespace(MD_NAMESPACE).ok_or_else(|| {
            MetadataError::Xml(format!("document is not in the {} namespace", MD_NAMESPACE))
        })?;

        Ok(Self {
            xot,
            document,
            root,
            namespace,
        })
    }

    /// An empty document whose root element is `root`.
    pub fn new(root: &str) -> Result<Self, MetadataError> {
        Self::parse(&format!("{}\n<{} xmlns=\"{}\"/>", XML_DECLARATION, root, MD_NAMESPACE))
    }

    /// The document element.
    pub fn root(&self) -> Node {
        self.root
    }

    /// Whether the document element is named `tag`.
    pub fn root_is(&self, tag: &str) -> bool {
        self.is_named(self.root, tag)
    }

    fn name(&self, tag: &str) -> Option<NameId> {
        self.xot.name_ns(tag, self.namespace)
    }

    fn is_named(&self, node: Node, tag: &str) -> bool {
        match (self.xot.element(node), self.name(tag)) {
            (Some(element), Some(name)) => element.name() == name,
            _ => false,
        }
    }

    /// Element children of `parent` named `tag`.
    pub fn child_elements(&self, parent: Node, tag: &str) -> Vec<Node> {
        self.xot
            .children(parent)
            .filter(|child| self.is_named(*child, tag))
            .collect()
    }

    /// Elements named `tag` anywhere below the root, in document order.
    pub fn elements_named(&self, tag: &str) -> Vec<Node> {
        self.xot
            .descendants(self.root)
            .filter(|node| self.is_named(*node, tag))
            .collect()
    }

    /// Concatenated text content of an element's direct text children.
    pub fn text(&self, node: Node) -> String {
        self.xot
            .children(node)
            .filter_map(|child| self.xot.text_str(child))
            .collect()
    }

    /// Text of the first child element named `tag`.
    pub fn child_text(&self, parent: Node, tag: &str) -> Option<String> {
        self.child_elements(parent, tag)
            .first()
            .map(|child| self.text(*child).trim().to_string())
    }

    /// First element named `tag` whose `key_tag` child has text `key`.
    ///
    /// Keyed elements are how metadata documents identify list entries,
    /// e.g. `relatedLists` keyed by `relatedList`.
    pub fn find_keyed(&self, tag: &str, key_tag: &str, key: &str) -> Option<Node> {
        self.elements_named(tag)
            .into_iter()
            .find(|node| self.child_text(*node, key_tag).as_deref() == Some(key))
    }

    /// Insertion index for a new top-level element named `tag`.
    ///
    /// One past the last top-level element with that tag, or 0 when there is
    /// none. Indexes count element children of the root only.
    pub fn new_tag_index(&self, tag: &str) -> usize {
        self.top_level_elements()
            .iter()
            .rposition(|node| self.is_named(*node, tag))
            .map(|index| index + 1)
            .unwrap_or(0)
    }

    fn top_level_elements(&self) -> Vec<Node> {
        self.xot
            .children(self.root)
            .filter(|child| self.xot.element(*child).is_some())
            .collect()
    }

    /// Replace an element's content with a single text node.
    pub fn set_text(&mut self, node: Node, value: &str) -> Result<(), MetadataError> {
        let children: Vec<Node> = self.xot.children(node).collect();
        for child in children {
            self.xot.remove(child).map_err(xml_error)?;
        }
        self.xot.append_text(node, value).map_err(xml_error)
    }

    /// Set the text of the first child named `tag`, appending one if absent.
    ///
    /// Returns whether the document changed.
    pub fn set_child_text(
        &mut self,
        parent: Node,
        tag: &str,
        value: &str,
    ) -> Result<bool, MetadataError> {
        match self.child_elements(parent, tag).first().copied() {
            Some(child) => {
                if self.text(child).trim() == value {
                    return Ok(false);
                }
                self.set_text(child, value)?;
            }
            None => {
                let child = self.build_element(tag, &[])?;
                self.xot.append_text(child, value).map_err(xml_error)?;
                self.xot.append(parent, child).map_err(xml_error)?;
            }
        }
        Ok(true)
    }

    /// Create a detached element with simple text children.
    ///
    /// Children are appended in the order given.
    pub fn build_element(
        &mut self,
        tag: &str,
        children: &[(&str, &str)],
    ) -> Result<Node, MetadataError> {
        let name = self.xot.add_name_ns(tag, self.namespace);
        let element = self.xot.new_element(name);
        for (child_tag, text) in children {
            let child_name = self.xot.add_name_ns(child_tag, self.namespace);
            let child = self.xot.new_element(child_name);
            self.xot.append_text(child, text).map_err(xml_error)?;
            self.xot.append(element, child).map_err(xml_error)?;
        }
        Ok(element)
    }

    /// Insert a detached element among the root's element children.
    ///
    /// `index` counts element children; an index past the end appends after
    /// the last element.
    pub fn insert_top_level(&mut self, index: usize, element: Node) -> Result<(), MetadataError> {
        let elements = self.top_level_elements();
        let indent = elements
            .first()
            .and_then(|first| self.xot.previous_sibling(*first))
            .and_then(|prev| self.xot.text_str(prev))
            .filter(|text| text.trim().is_empty())
            .map(str::to_string);

        if let Some(reference) = elements.get(index).copied() {
            self.xot.insert_before(reference, element).map_err(xml_error)?;
            if let Some(indent) = indent {
                let spacer = self.xot.new_text(&indent);
                self.xot.insert_after(element, spacer).map_err(xml_error)?;
            }
        } else if let Some(last) = elements.last().copied() {
            self.xot.insert_after(last, element).map_err(xml_error)?;
            if let Some(indent) = indent {
                let spacer = self.xot.new_text(&indent);
                self.xot.insert_before(element, spacer).map_err(xml_error)?;
            }
        } else {
            self.xot.append(self.root, element).map_err(xml_error)?;
        }
        Ok(())
    }

    /// Serialize with an XML declaration and a trailing newline.
    pub fn to_xml_string(&self) -> Result<String, MetadataError> {
        let body = self.xot.to_string(self.document).map_err(xml_error)?;
        let mut out = if body.trim_start().starts_with("<?xml") {
            body
        } else {
            format!("{}\n{}", XML_DECLARATION, body.trim_start())
        };
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

fn xml_error(e: xot::Error) -> MetadataError {
    MetadataError::Xml(e.to_string())
}
