use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::transaction::state::TransactionState;

/// Tracks the transaction running on behalf of one caller so that transactions
/// started further down the call chain can embed themselves into it.
///
/// Contexts are per thread of control and not `Send`.
pub struct TransactionContext {
    embeddable: bool,
    current: RefCell<Weak<RefCell<TransactionState>>>,
}

impl TransactionContext {
    /// A context that lets transactions nest into a running one.
    pub fn embeddable() -> Rc<Self> {
        Rc::new(TransactionContext {
            embeddable: true,
            current: RefCell::new(Weak::new()),
        })
    }

    /// A context that refuses nesting with `TransactionNested`.
    pub fn standalone() -> Rc<Self> {
        Rc::new(TransactionContext {
            embeddable: false,
            current: RefCell::new(Weak::new()),
        })
    }

    pub fn is_embeddable(&self) -> bool {
        self.embeddable
    }

    pub fn has_parent(&self) -> bool {
        self.current.borrow().strong_count() > 0
    }

    pub(crate) fn parent(&self) -> Option<Rc<RefCell<TransactionState>>> {
        self.current.borrow().upgrade()
    }

    pub(crate) fn register(&self, state: &Rc<RefCell<TransactionState>>) {
        *self.current.borrow_mut() = Rc::downgrade(state);
    }

    pub(crate) fn unregister(&self) {
        *self.current.borrow_mut() = Weak::new();
    }
}
