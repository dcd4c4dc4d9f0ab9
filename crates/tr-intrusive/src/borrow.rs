use std::fmt;
use std::ops::Deref;

/// Either a borrow of a value someone else owns or a locally owned value.
///
/// Borrowing a `StrongRef` this way reads the object without touching its
/// counts; the owned form is for the cases where a fresh value had to be
/// produced anyway.
pub enum BorrowView<'a, T> {
    Borrowed(&'a T),
    Owned(T),
}

impl<'a, T> BorrowView<'a, T> {
    pub fn borrowed(value: &'a T) -> Self {
        BorrowView::Borrowed(value)
    }

    pub fn owned(value: T) -> Self {
        BorrowView::Owned(value)
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, BorrowView::Borrowed(_))
    }

    pub fn into_owned(self) -> T
    where
        T: Clone,
    {
        match self {
            BorrowView::Borrowed(value) => value.clone(),
            BorrowView::Owned(value) => value,
        }
    }
}

impl<T> Deref for BorrowView<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            BorrowView::Borrowed(value) => value,
            BorrowView::Owned(value) => value,
        }
    }
}

impl<T> AsRef<T> for BorrowView<'_, T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: Clone> Clone for BorrowView<'_, T> {
    fn clone(&self) -> Self {
        match self {
            BorrowView::Borrowed(value) => BorrowView::Borrowed(value),
            BorrowView::Owned(value) => BorrowView::Owned(value.clone()),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        match (&mut *self, source) {
            (BorrowView::Owned(dst), BorrowView::Owned(src)) => dst.clone_from(src),
            _ => *self = source.clone(),
        }
    }
}

impl<'a, T> From<&'a T> for BorrowView<'a, T> {
    fn from(value: &'a T) -> Self {
        BorrowView::Borrowed(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for BorrowView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BorrowView::Borrowed(value) => f.debug_tuple("Borrowed").field(value).finish(),
            BorrowView::Owned(value) => f.debug_tuple("Owned").field(value).finish(),
        }
    }
}
