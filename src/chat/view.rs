//! Client view state: the ordered list of rendered bubbles.

use super::render::RenderedMessage;

/// Ordered, append-only sequence of rendered messages.
///
/// Only two mutations exist: replace everything (history load) and append
/// at the end (live message). Entries are never re-sorted.
#[derive(Debug, Default)]
pub struct MessageView {
    items: Vec<RenderedMessage>,
}

impl MessageView {
    /// Clear the view, then add `items` in the given order.
    pub fn replace(&mut self, items: impl IntoIterator<Item = RenderedMessage>) {
        self.items.clear();
        self.items.extend(items);
    }

    /// Append one message at the end.
    pub fn push(&mut self, item: RenderedMessage) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[RenderedMessage] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest entry, the one a viewer scrolls to.
    pub fn latest(&self) -> Option<&RenderedMessage> {
        self.items.last()
    }
}
