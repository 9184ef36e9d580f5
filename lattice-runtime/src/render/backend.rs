//! Backend primitives.
//!
//! The renderer never touches a concrete node tree itself. Everything it
//! does to the host goes through a [`Backend`], which hands out opaque
//! handles and performs the structural mutations.

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::BackendError;
use crate::reactive::Value;

/// The host primitive set a renderer is built over.
///
/// Every primitive may fail; failures propagate unchanged to whoever called
/// `render` or flushed the scheduler.
pub trait Backend: Send + Sync + 'static {
    /// Opaque reference to a host node.
    type Handle: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    fn create_element(&self, tag: &str) -> Result<Self::Handle, BackendError>;

    fn create_text(&self, text: &str) -> Result<Self::Handle, BackendError>;

    fn create_comment(&self, text: &str) -> Result<Self::Handle, BackendError>;

    /// Insert `node` into `parent` before `anchor`, or at the end when there
    /// is no anchor. Inserting an attached node moves it.
    fn insert(
        &self,
        node: &Self::Handle,
        parent: &Self::Handle,
        anchor: Option<&Self::Handle>,
    ) -> Result<(), BackendError>;

    /// Detach `node` from its parent. Detached nodes are left alone.
    fn remove(&self, node: &Self::Handle) -> Result<(), BackendError>;

    /// Replace all of an element's content with a single text payload.
    fn set_element_text(&self, element: &Self::Handle, text: &str) -> Result<(), BackendError>;

    /// Update the content of a text node.
    fn set_text(&self, node: &Self::Handle, text: &str) -> Result<(), BackendError>;

    /// Apply one property change. `next == None` removes the property.
    fn patch_prop(
        &self,
        element: &Self::Handle,
        key: &str,
        prev: Option<&Value>,
        next: Option<&Value>,
    ) -> Result<(), BackendError>;

    fn parent_node(&self, node: &Self::Handle) -> Option<Self::Handle>;

    fn next_sibling(&self, node: &Self::Handle) -> Option<Self::Handle>;
}
