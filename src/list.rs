use std::marker::PhantomData;

use crate::block::Block;

/// Link to a free block, `None` terminates the list.
pub(crate) type Link = Option<Block>;

/// One segregated free list.
///
/// The list is intrusive: the links are stored in the payload of the free
/// blocks themselves, which is unused while the block is free. The list only
/// owns its head, so pushing and removing never allocate.
///
/// ```text
///  head
///   |
///   v
/// +------+ next_free +------+ next_free +------+
/// | Free | --------> | Free | --------> | Free | --> None
/// |      | <-------- |      | <-------- |      |
/// +------+ prev_free +------+ prev_free +------+
/// ```
///
/// An empty list has no head at all, there is no shared dummy block to point at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FreeList {
    head: Link,
}

pub(crate) struct Iter<'a> {
    current: Link,
    marker: PhantomData<&'a FreeList>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { head: None }
    }

    #[inline]
    pub fn first(&self) -> Link {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Pushes `block` at the head of the list.
    ///
    /// This is the only way blocks enter a list, so the most recently freed
    /// block of a class is always the first one handed out again.
    pub fn push_front(&mut self, block: Block) {
        block.set_next_free(self.head);
        block.set_prev_free_link(None);

        if let Some(head) = self.head {
            head.set_prev_free_link(Some(block));
        }

        self.head = Some(block);
    }

    /// Unlinks `block`, which must be a member of this list.
    pub fn remove(&mut self, block: Block) {
        let next = block.next_free();
        let prev = block.prev_free();

        if let Some(next) = next {
            next.set_prev_free_link(prev);
        }

        match prev {
            Some(prev) => prev.set_next_free(next),
            None => {
                debug_assert_eq!(self.head, Some(block), "block is not in this list");
                self.head = next;
            }
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            current: self.head,
            marker: PhantomData,
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        self.current = block.next_free();

        Some(block)
    }
}

impl<'a> IntoIterator for &'a FreeList {
    type Item = Block;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
