//! Transport-neutral message content tree
//!
//! Mailbox gateways decode their wire payloads into this tree so that body
//! extraction never has to know about base64, MIME boundaries or API JSON.

/// A node in a message's content tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    /// A multipart container (e.g. `multipart/alternative`)
    Container {
        mime_type: String,
        children: Vec<ContentNode>,
    },
    /// A leaf part with its decoded payload bytes
    Leaf { mime_type: String, data: Vec<u8> },
}

impl ContentNode {
    pub fn container(mime_type: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self::Container {
            mime_type: mime_type.into(),
            children,
        }
    }

    pub fn leaf(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self::Leaf {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Leaf holding UTF-8 text
    pub fn text(mime_type: impl Into<String>, text: String) -> Self {
        Self::leaf(mime_type, text.into_bytes())
    }

    pub fn mime_type(&self) -> &str {
        match self {
            Self::Container { mime_type, .. } | Self::Leaf { mime_type, .. } => mime_type,
        }
    }

    /// Direct children; always empty for a leaf
    pub fn children(&self) -> &[ContentNode] {
        match self {
            Self::Container { children, .. } => children,
            Self::Leaf { .. } => &[],
        }
    }

    /// Whether the MIME type matches `essence` (parameters like `; charset=` ignored)
    pub fn is_type(&self, essence: &str) -> bool {
        self.mime_type()
            .split(';')
            .next()
            .is_some_and(|t| t.trim().eq_ignore_ascii_case(essence))
    }

    /// Depth-first, document-order iterator over the leaves of the tree
    pub fn leaves(&self) -> Leaves<'_> {
        Leaves { stack: vec![self] }
    }
}

/// Iterator returned by [`ContentNode::leaves`]
///
/// Uses an explicit stack so deeply nested messages cannot overflow the call
/// stack.
pub struct Leaves<'a> {
    stack: Vec<&'a ContentNode>,
}

impl<'a> Iterator for Leaves<'a> {
    type Item = &'a ContentNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                ContentNode::Leaf { .. } => return Some(node),
                ContentNode::Container { children, .. } => {
                    self.stack.extend(children.iter().rev());
                }
            }
        }
        None
    }
}
