//! JSON snapshots of in-memory state, written to and read back from the dump file.

use error_chain::ChainedError;
use serde_json::Value;

/// A record that is written into a state dump as JSON and rebuilt from it.
pub trait StateHandling<E: ChainedError>: Sized {
    fn new_from_json(data: Value) -> Result<Self, E>;

    fn dump_state(&self) -> Result<Value, E>;
}

/// A shared container (usually behind an `Arc`) that guards its own contents, so a dump is
/// loaded into it in place through `&self`.
pub trait SimpleStateHandling<E: ChainedError> {
    fn dump_state(&self) -> Result<Value, E>;

    /// Replaces the whole contents. On error the previous contents are kept.
    fn load_state(&self, data: Value) -> Result<(), E>;
}
