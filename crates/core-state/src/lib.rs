//! Reactive session state: atoms, computed cells, and persistence.
//!
//! The core runs single-threaded in one event loop, so the atom store is
//! a plain `Rc<RefCell<_>>` observer pattern — no locks, no channels.
//! Each atom holds a value and a subscriber list; `computed` cells
//! register an upstream subscription and re-derive on every upstream
//! change. Persisted atoms write through a [`Storage`] abstraction with a
//! JSON encoding; when the backing store is unusable the session keeps
//! running on in-memory atoms only.
//!
//! Mutation authority (one owner per atom, everyone else subscribes):
//! * quiz logic appends to `responses`,
//! * controls own `active_domain` and `question_mode`,
//! * the estimator owner swaps `estimates` (whole arrays, never in-place),
//! * the recommender owns the snapshot/difference/running maps,
//! * persistence owns `mapper:schema`.

mod atom;
mod persist;
mod session;
mod storage;

pub use atom::{Atom, Computed, SubscriptionId};
pub use persist::{
    ExportBlob, ImportError, KEY_RESPONSES, KEY_SCHEMA, KEY_WATCHED, ProgressRestored,
    SCHEMA_VERSION, export_blob, parse_export,
};
pub use session::{SessionAtoms, TransitionState};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError, open_or_memory};
