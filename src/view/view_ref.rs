use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use super::View;

/// Shared handle to a session-attached view.
///
/// Every lookup of the same id within one unit of work returns a clone of the
/// same handle, so in-place edits are visible to all holders. Equality is
/// reference identity. Handles are not `Send`: a view belongs to the thread
/// running its unit of work.
pub struct ViewRef<V> {
    id: Rc<str>,
    cell: Rc<RefCell<V>>,
}

impl<V: View> ViewRef<V> {
    /// Wrap a detached view. Sessions normally create handles themselves.
    pub fn new(view: V) -> Self {
        let id = view.id().to_string();
        ViewRef::with_id(&id, view)
    }
}

impl<V> ViewRef<V> {
    pub(crate) fn with_id(id: &str, view: V) -> Self {
        ViewRef {
            id: Rc::from(id),
            cell: Rc::new(RefCell::new(view)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Immutably borrow the view. Panics if it is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, V> {
        self.cell.borrow()
    }

    /// Mutably borrow the view. Panics if it is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, V> {
        self.cell.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, V>, BorrowError> {
        self.cell.try_borrow()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, V>, BorrowMutError> {
        self.cell.try_borrow_mut()
    }

    /// True when both handles point at the same in-memory view.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<V> Clone for ViewRef<V> {
    fn clone(&self) -> Self {
        ViewRef {
            id: Rc::clone(&self.id),
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<V> PartialEq for ViewRef<V> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<V> Eq for ViewRef<V> {}

impl<V: fmt::Debug> fmt::Debug for ViewRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_borrow() {
            Ok(view) => f.debug_tuple("ViewRef").field(&*view).finish(),
            Err(_) => f
                .debug_tuple("ViewRef")
                .field(&format_args!("{} <borrowed>", self.id))
                .finish(),
        }
    }
}
